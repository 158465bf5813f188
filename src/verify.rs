//! Package verification with cleanup.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::host::VerifyPackage;

#[derive(Debug, Error)]
pub enum VerificationError {
    /// The package failed verification and was removed.
    #[error("verification of {} failed, file has been deleted", .path.display())]
    FileDeleted {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The primitive failed and the file was already gone; its error is kept as is.
    #[error(transparent)]
    Rejected(anyhow::Error),

    #[error("verification of {} failed and the file could not be deleted", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("verification of {} was cancelled", .path.display())]
    Cancelled { path: PathBuf },
}

/// Runs the platform verifier and removes packages it rejects.
#[derive(Clone)]
pub struct PackageVerifier {
    primitive: Arc<dyn VerifyPackage>,
}

impl PackageVerifier {
    pub fn new(primitive: Arc<dyn VerifyPackage>) -> Self {
        Self { primitive }
    }

    /// Verify `path`.
    ///
    /// On rejection the file is deleted if it still exists. If it is already
    /// gone the primitive's error is returned unchanged. Cancellation drops
    /// the verification future and leaves the file alone.
    pub async fn verify(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), VerificationError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VerificationError::Cancelled { path: path.to_path_buf() });
            }
            result = self.primitive.verify_package(path) => result,
        };

        let source = match result {
            Ok(()) => {
                debug!(path = %path.display(), "package verified");
                return Ok(());
            }
            Err(e) => e,
        };

        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            // Gone, or we cannot tell; report the primitive's own error
            Ok(false) | Err(_) => return Err(VerificationError::Rejected(source)),
        }

        warn!(path = %path.display(), error = %source, "verification failed, deleting package");
        match tokio::fs::remove_file(path).await {
            Ok(()) => Err(VerificationError::FileDeleted {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VerificationError::Rejected(source))
            }
            Err(e) => Err(VerificationError::Cleanup {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    struct Accept;

    #[async_trait]
    impl VerifyPackage for Accept {
        async fn verify_package(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct Reject;

    #[async_trait]
    impl VerifyPackage for Reject {
        async fn verify_package(&self, _path: &Path) -> Result<()> {
            bail!("signature does not match any trusted key")
        }
    }

    /// Removes the package itself before failing.
    struct ConsumeAndReject;

    #[async_trait]
    impl VerifyPackage for ConsumeAndReject {
        async fn verify_package(&self, path: &Path) -> Result<()> {
            std::fs::remove_file(path)?;
            bail!("package truncated")
        }
    }

    struct Hang;

    #[async_trait]
    impl VerifyPackage for Hang {
        async fn verify_package(&self, _path: &Path) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn package() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("localUpdate.zip");
        std::fs::write(&path, b"PK").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn accepted_package_stays() {
        let (_dir, path) = package();
        PackageVerifier::new(Arc::new(Accept))
            .verify(&path, &CancellationToken::new())
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn rejected_package_is_deleted() {
        let (_dir, path) = package();
        let err = PackageVerifier::new(Arc::new(Reject))
            .verify(&path, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VerificationError::FileDeleted { .. }));
        assert!(err.to_string().ends_with("file has been deleted"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn primitive_error_kept_when_file_already_gone() {
        let (_dir, path) = package();
        let err = PackageVerifier::new(Arc::new(ConsumeAndReject))
            .verify(&path, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VerificationError::Rejected(_)));
        assert_eq!(err.to_string(), "package truncated");
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_stalled_verifier() {
        let (_dir, path) = package();
        let cancel = CancellationToken::new();
        let verifier = PackageVerifier::new(Arc::new(Hang));

        let task = {
            let cancel = cancel.clone();
            let path = path.clone();
            tokio::spawn(async move { verifier.verify(&path, &cancel).await })
        };
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, VerificationError::Cancelled { .. }));
        assert!(path.exists());
    }
}
