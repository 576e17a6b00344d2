//! A long-lived `exiftool -stay_open True -@ -` process.
//!
//! Each request is written to stdin as one argument per line, terminated by
//! `-execute`. Exiftool answers with the JSON for that request followed by a
//! `{ready}` line. Requests are serialized by a lock; a request that fails
//! or times out kills the process and the next one starts a fresh one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use sb_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

const TOOL: &str = "exiftool";
const READY: &str = "{ready}";

fn io_error(e: std::io::Error) -> Error {
    Error::tool(TOOL, format!("stay-open I/O error: {e}"))
}

#[derive(Debug)]
struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    fn spawn(program: &Path) -> Result<Self> {
        let mut child = Command::new(program)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(TOOL, format!("failed to spawn: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::tool(TOOL, "stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool(TOOL, "stdout was not captured"))?;

        tracing::debug!(program = %program.display(), "started stay-open exiftool");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn request(&mut self, path: &Path) -> Result<String> {
        let request = format!(
            "-j\n-G1\n-struct\n-a\n{}\n-execute\n",
            path.to_string_lossy()
        );
        self.stdin
            .write_all(request.as_bytes())
            .await
            .map_err(io_error)?;
        self.stdin.flush().await.map_err(io_error)?;

        let mut output = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await.map_err(io_error)? == 0 {
                return Err(Error::tool(TOOL, "stay-open process exited"));
            }
            if line.trim() == READY {
                return Ok(output);
            }
            output.push_str(&line);
        }
    }

    async fn close(mut self) -> Result<()> {
        self.stdin
            .write_all(b"-stay_open\nFalse\n")
            .await
            .map_err(io_error)?;
        drop(self.stdin);
        self.child.wait().await.map_err(io_error)?;
        Ok(())
    }
}

/// One exiftool process shared by every read.
#[derive(Debug)]
pub struct StayOpenExiftool {
    program: PathBuf,
    timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl StayOpenExiftool {
    /// The process is started lazily by the first [`read`](Self::read).
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            timeout,
            session: Mutex::new(None),
        }
    }

    /// Raw `-j -G1 -struct -a` output for `path`.
    ///
    /// A file exiftool cannot read yields empty output, not an error; only
    /// a broken or stuck process does.
    pub async fn read(&self, path: &Path) -> Result<String> {
        let mut guard = self.session.lock().await;
        let mut session = match guard.take() {
            Some(session) => session,
            None => Session::spawn(&self.program)?,
        };

        match tokio::time::timeout(self.timeout, session.request(path)).await {
            Ok(Ok(output)) => {
                *guard = Some(session);
                Ok(output)
            }
            // Dropping the session kills the process.
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Err(Error::tool(
                TOOL,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }

    /// Ask a running process to exit and wait for it.
    pub async fn shutdown(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await?;
            tracing::debug!("stopped stay-open exiftool");
        }
        Ok(())
    }
}
