use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{ImportSource, SourceStream, VerifyPackage};

/// A package sitting on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImportSource for LocalFileSource {
    async fn open(&self) -> io::Result<SourceStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Delegates verification to an external program.
///
/// The package path is appended to `args`; exit status 0 means the package
/// is trusted. The child is killed if verification is cancelled.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandVerifier {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl VerifyPackage for CommandVerifier {
    async fn verify_package(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program.to_string_lossy()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} rejected {}: {} {}",
                self.program.to_string_lossy(),
                path.display(),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn local_source_streams_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pick.zip");
        std::fs::write(&path, b"PK-bytes").unwrap();

        let source = LocalFileSource::new(&path);
        let mut stream = source.open().await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"PK-bytes");
    }

    #[tokio::test]
    async fn missing_local_source_fails_to_open() {
        let source = LocalFileSource::new("/nonexistent/pick.zip");
        assert!(source.open().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_verifier_follows_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.zip");
        std::fs::write(&path, b"x").unwrap();

        CommandVerifier::new("true").verify_package(&path).await.unwrap();
        assert!(CommandVerifier::new("false").verify_package(&path).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_verifier_receives_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.zip");
        std::fs::write(&path, b"x").unwrap();

        // `test -f <path>` passes only if the path argument arrives
        CommandVerifier::new("test")
            .arg("-f")
            .verify_package(&path)
            .await
            .unwrap();
    }
}
