//! Exiftool-backed [`MetadataReader`].
//!
//! Reads `exiftool -j -G1 -struct -a <path>` output for each path and
//! resolves the grouped JSON against the configured field mapping. With
//! stay-open enabled one [`StayOpenExiftool`] process serves every read; a
//! one-shot [`ToolCommand`] is used otherwise, and whenever that process
//! breaks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sb_core::config::ExiftoolConfig;
use sb_core::metadata::{Metadata, MetadataFields};
use sb_core::{Error, Result};

use crate::command::ToolCommand;
use crate::raw::{parse_exiftool_json, RawMetadata};
use crate::reader::MetadataReader;
use crate::resolve::resolve;
use crate::stay_open::StayOpenExiftool;

const EXIFTOOL: &str = "exiftool";

/// A reader backed by the `exiftool` CLI.
#[derive(Debug, Clone)]
pub struct ExiftoolReader {
    program: PathBuf,
    timeout: Duration,
    fields: MetadataFields,
    stay_open: Option<Arc<StayOpenExiftool>>,
}

impl ExiftoolReader {
    /// A reader starting one exiftool process per path.
    pub fn new(program: PathBuf, timeout: Duration, fields: MetadataFields) -> Self {
        Self {
            program,
            timeout,
            fields,
            stay_open: None,
        }
    }

    /// Serve reads from one long-lived `-stay_open` process.
    pub fn with_stay_open(mut self) -> Self {
        self.stay_open = Some(Arc::new(StayOpenExiftool::new(
            self.program.clone(),
            self.timeout,
        )));
        self
    }

    /// Build a reader from config, discovering exiftool on `PATH` when no
    /// explicit path is configured.
    pub fn from_config(config: &ExiftoolConfig, fields: MetadataFields) -> Result<Self> {
        let program = match &config.path {
            Some(path) => path.clone(),
            None => which::which(EXIFTOOL)
                .map_err(|e| Error::tool(EXIFTOOL, format!("not found on PATH: {e}")))?,
        };
        let reader = Self::new(
            program,
            Duration::from_secs(config.timeout_secs.max(1)),
            fields,
        );
        Ok(if config.stay_open {
            reader.with_stay_open()
        } else {
            reader
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn is_stay_open(&self) -> bool {
        self.stay_open.is_some()
    }

    /// Raw grouped values for a single file.
    pub async fn read_raw(&self, path: &Path) -> Result<RawMetadata> {
        let stdout = match &self.stay_open {
            Some(tool) => match tool.read(path).await {
                Ok(stdout) => stdout,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "stay-open exiftool failed, falling back to one-shot"
                    );
                    self.read_once(path).await?
                }
            },
            None => self.read_once(path).await?,
        };
        parse_exiftool_json(&stdout)
    }

    async fn read_once(&self, path: &Path) -> Result<String> {
        let output = ToolCommand::new(self.program.clone())
            .args(["-j", "-G1", "-struct", "-a"])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await?;
        Ok(output.stdout)
    }

    /// Stop the stay-open process, if one is running.
    pub async fn shutdown(&self) -> Result<()> {
        match &self.stay_open {
            Some(tool) => tool.shutdown().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataReader for ExiftoolReader {
    fn name(&self) -> &'static str {
        EXIFTOOL
    }

    async fn extract(&self, paths: &[PathBuf]) -> Result<Metadata> {
        if paths.is_empty() {
            return Err(Error::Metadata("no paths to read".into()));
        }

        let mut metadata = Metadata::new();
        for path in paths {
            let raw = self.read_raw(path).await?;
            tracing::trace!(path = %path.display(), keys = raw.len(), "exiftool read");
            metadata.merge(resolve(&raw, &self.fields));
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sb_core::metadata::default_fields;

    #[test]
    fn explicit_path_skips_discovery() {
        let config = ExiftoolConfig {
            path: Some(PathBuf::from("/opt/exiftool/exiftool")),
            timeout_secs: 0,
            stay_open: false,
        };
        let reader = ExiftoolReader::from_config(&config, default_fields()).unwrap();
        assert_eq!(reader.program(), Path::new("/opt/exiftool/exiftool"));
        assert_eq!(reader.timeout, Duration::from_secs(1));
        assert!(!reader.is_stay_open());

        let config = ExiftoolConfig {
            stay_open: true,
            ..config
        };
        let reader = ExiftoolReader::from_config(&config, default_fields()).unwrap();
        assert!(reader.is_stay_open());
    }

    #[tokio::test]
    async fn missing_binary_is_item_level_error() {
        let reader = ExiftoolReader::new(
            PathBuf::from("/nonexistent/exiftool"),
            Duration::from_secs(1),
            default_fields(),
        );
        let err = reader
            .extract(&[PathBuf::from("/tmp/a.jpg")])
            .await
            .unwrap_err();
        assert_matches!(err, Error::Tool { .. });
        assert!(err.is_item_level());
    }

    #[tokio::test]
    async fn no_paths_is_metadata_error() {
        let reader = ExiftoolReader::new(
            PathBuf::from(EXIFTOOL),
            Duration::from_secs(1),
            default_fields(),
        );
        assert_matches!(reader.extract(&[]).await, Err(Error::Metadata(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stay_open_reader_merges_file_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let program = crate::stay_open::tests::fake_exiftool(dir.path());
        let image = dir.path().join("a.jpg");
        let sidecar = dir.path().join("a.jpg.xmp");
        std::fs::write(&image, b"x").unwrap();
        std::fs::write(&sidecar, b"x").unwrap();

        let reader =
            ExiftoolReader::new(program, Duration::from_secs(5), default_fields()).with_stay_open();
        let md = reader.extract(&[image, sidecar]).await.unwrap();
        assert_eq!(md.text(sb_core::metadata::CAMERA), Some("X-T5"));
        reader.shutdown().await.unwrap();

        let starts = std::fs::read_to_string(dir.path().join("starts")).unwrap();
        assert_eq!(starts.lines().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_stay_open_falls_back_to_one_shot() {
        use std::os::unix::fs::PermissionsExt;

        // Exits at once in stay-open mode, answers normally otherwise.
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("exiftool");
        std::fs::write(
            &program,
            "#!/bin/sh\ncase \"$1\" in -stay_open) exit 0;; esac\nprintf '[{\"IFD0:Model\": \"X-T5\"}]\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let reader =
            ExiftoolReader::new(program, Duration::from_secs(5), default_fields()).with_stay_open();
        let raw = reader.read_raw(&dir.path().join("a.jpg")).await.unwrap();
        assert_eq!(raw["ifd0:model"].value, serde_json::json!("X-T5"));
    }
}
