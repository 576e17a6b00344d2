//! Loading and validating the TOML configuration.
//!
//! The types themselves live in [`sb_core::config`] so the pipeline crates
//! can consume them; this module owns file discovery, `~` expansion and the
//! checks that only make sense for a whole file.

pub use sb_core::config::*;

use anyhow::{Context, Result};
use sb_rules::RuleGroup;
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    expand_paths(&mut config);

    let hash = config
        .sync
        .metadata_hash()
        .context("Failed to hash metadata field mapping")?;
    tracing::debug!(
        fields = config.sync.metadata_fields().len(),
        schema_hash = %hash,
        "metadata fields loaded"
    );

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./shutterbox.toml",
        "./config.toml",
        "~/.config/shutterbox/config.toml",
        "/etc/shutterbox/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// A sync needs somewhere to look.
pub fn require_roots(config: &Config) -> Result<()> {
    if config.filesystem.roots.is_empty() {
        anyhow::bail!("No filesystem roots configured; add a [filesystem.roots.<name>] section");
    }
    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn expand_paths(config: &mut Config) {
    config.database.path = expand(&config.database.path);
    config.filesystem.derivatives = expand(&config.filesystem.derivatives);
    for root in config.filesystem.roots.values_mut() {
        root.root = expand(&root.root);
    }
    if let Some(exiftool) = config.sync.exiftool.path.as_mut() {
        *exiftool = expand(exiftool);
    }
}

/// Log rule groups that will be skipped at run time.
fn warn_if_broken(what: &str, group: &RuleGroup) {
    if let Err(e) = group.compile() {
        tracing::warn!("{} does not compile and will be skipped: {}", what, e);
    }
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    for (name, root) in &config.filesystem.roots {
        if root.root.as_os_str().is_empty() {
            anyhow::bail!("Root '{}' has an empty path", name);
        }
        if !root.root.exists() {
            tracing::warn!("Root '{}' does not exist: {:?}", name, root.root);
        }
    }

    for (i, scope) in config.sync.paths.iter().enumerate() {
        if !config.filesystem.roots.contains_key(&scope.root) {
            anyhow::bail!(
                "Path filter {} names unknown root '{}'",
                i + 1,
                scope.root
            );
        }
        warn_if_broken(
            &format!("Path filter {} ({}:/{})", i + 1, scope.root, scope.path),
            &scope.filters,
        );
    }

    for (i, rule) in config.sync.acl.iter().enumerate() {
        if rule.rules.is_empty() {
            tracing::warn!("ACL rule {} ({}) has no rule groups and will be skipped", i + 1, rule.role);
        }
        for group in &rule.rules {
            warn_if_broken(&format!("ACL rule {} ({})", i + 1, rule.role), group);
        }
    }

    if let Some(panorama) = &config.sync.panorama {
        warn_if_broken("Panorama rule", panorama);
    }

    for field in config.sync.metadata.fields.values() {
        if field.sources.is_empty() {
            anyhow::bail!("Metadata fields must name at least one source");
        }
    }

    for d in &config.derivatives {
        if d.name.trim().is_empty() {
            anyhow::bail!("Derivative without a name");
        }
        let sized = match d.mode {
            ResizeMode::Fit => d.max_width > 0 || d.max_height > 0,
            ResizeMode::Crop => d.max_width > 0 && d.max_height > 0,
        };
        if !sized {
            anyhow::bail!("Derivative '{}' needs a positive size", d.name);
        }
    }
    let mut names: Vec<&str> = config.derivatives.iter().map(|d| d.name.as_str()).collect();
    names.sort_unstable();
    if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
        anyhow::bail!("Derivative '{}' is defined twice", w[0]);
    }

    if config.render.workers == 0 {
        anyhow::bail!("render.workers must be at least 1");
    }

    Ok(())
}
