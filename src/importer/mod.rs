//! Local update import.
//!
//! [`Importer`] turns a package picked by the user into a verified
//! [`UpdateRecord`] and asks the install service to apply it:
//!
//! ```text
//! pick ─► Started ─► copy ─► verify ─► read timestamp ─► register ─► install ─► Completed
//!                     │        │                            │           │
//!                     └────────┴──── any error ─────────────┴───────────┴─► Notice + Completed(None)
//! ```
//!
//! Every handled pick produces exactly one [`ImportEvent::Started`] followed
//! later by exactly one [`ImportEvent::Completed`], both tagged with the
//! import's id. At most one import runs at a time; a pick arriving while one
//! is running is refused with [`ImportError::Busy`].

mod copy;
mod error;


pub use error::{ImportError, TimestampError};

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ImporterConfig;
use crate::host::{
    ImportSource, InstallTrigger, Localizer, MIME_ZIP, PickRequest, PickerHost, REQUEST_PICK,
    UpdateRegistry, VerifyPackage,
};
use crate::metadata::extract_timestamp;
use crate::model::{LOCAL_ID, UpdateRecord};
use crate::verify::PackageVerifier;
use crate::zip::read_entry_to_string;

/// Identifies one import attempt in [`ImportEvent`]s.
pub type ImportId = u64;

/// Notifications for the UI, delivered in order on the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// Sent before any I/O happens.
    Started { id: ImportId },
    /// Transient failure message for the user; precedes a failed `Completed`.
    Notice { id: ImportId, message: String },
    /// The last event of an import. `None` means it failed or was cancelled.
    Completed {
        id: ImportId,
        record: Option<UpdateRecord>,
    },
}

/// Result code of the document picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    Ok,
    Canceled,
}

/// External capabilities the importer needs.
#[derive(Clone)]
pub struct Services {
    pub verifier: Arc<dyn VerifyPackage>,
    pub registry: Arc<dyn UpdateRegistry>,
    pub installer: Arc<dyn InstallTrigger>,
    pub localizer: Arc<dyn Localizer>,
    /// Needed only for [`Importer::start_picker`]
    pub picker: Option<Arc<dyn PickerHost>>,
}

#[derive(Debug)]
enum ImportState {
    Idle,
    Importing {
        id: ImportId,
        cancel: CancellationToken,
    },
}

struct Inner {
    config: ImporterConfig,
    verifier: PackageVerifier,
    registry: Arc<dyn UpdateRegistry>,
    installer: Arc<dyn InstallTrigger>,
    localizer: Arc<dyn Localizer>,
    picker: Option<Arc<dyn PickerHost>>,
    events: mpsc::UnboundedSender<ImportEvent>,
    state: Mutex<ImportState>,
    next_id: AtomicU64,
}

/// Imports locally picked update packages. Cheap to clone.
#[derive(Clone)]
pub struct Importer {
    inner: Arc<Inner>,
}

impl Importer {
    /// Create an importer and the channel its events arrive on.
    pub fn new(
        config: ImporterConfig,
        services: Services,
    ) -> (Self, mpsc::UnboundedReceiver<ImportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            config,
            verifier: PackageVerifier::new(services.verifier),
            registry: services.registry,
            installer: services.installer,
            localizer: services.localizer,
            picker: services.picker,
            events,
            state: Mutex::new(ImportState::Idle),
            next_id: AtomicU64::new(1),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.inner.config
    }

    /// Ask the UI to show a document picker limited to ZIP files. The
    /// selection comes back through [`handle_pick_result`](Self::handle_pick_result).
    pub fn start_picker(&self) -> anyhow::Result<()> {
        let picker = self
            .inner
            .picker
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no document picker available"))?;
        picker.open_document(PickRequest {
            request_code: REQUEST_PICK,
            mime_type: MIME_ZIP,
        })
    }

    /// Handle the document picker's answer.
    ///
    /// Returns `Ok(false)` without side effects if the result is not a
    /// successful pick for this importer. Otherwise emits `Started`, starts
    /// the import in the background and returns `Ok(true)`. Fails with
    /// [`ImportError::Busy`], emitting nothing, if an import is running.
    pub fn handle_pick_result(
        &self,
        request_code: i32,
        outcome: PickOutcome,
        source: Option<Box<dyn ImportSource>>,
    ) -> Result<bool, ImportError> {
        if outcome != PickOutcome::Ok || request_code != REQUEST_PICK {
            return Ok(false);
        }
        let Some(source) = source else {
            warn!("picker returned no document");
            return Ok(false);
        };
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ImportError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let id = {
            let mut state = self.inner.lock_state();
            if let ImportState::Importing { id, .. } = *state {
                warn!(running = id, "import already running");
                return Err(ImportError::Busy);
            }
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            *state = ImportState::Importing {
                id,
                cancel: cancel.clone(),
            };
            id
        };

        info!(id, source = %source.name(), "import started");
        self.inner.emit(ImportEvent::Started { id });

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            // Run the import as its own task so a panic surfaces as a JoinError
            let worker = {
                let inner = Arc::clone(&inner);
                let cancel = cancel.clone();
                tokio::spawn(async move { inner.import(id, source, &cancel).await })
            };
            let result = match worker.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(ImportError::WorkerPanicked),
                Err(_) => Err(ImportError::Cancelled),
            };
            inner.finish(id, result, cancel.is_cancelled());
        });

        Ok(true)
    }

    /// Interrupt the running import, if any.
    ///
    /// The importer is idle again as soon as this returns; the interrupted
    /// worker stops at its next check and still reports `Completed(None)`.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock_state();
        match std::mem::replace(&mut *state, ImportState::Idle) {
            ImportState::Importing { id, cancel } => {
                info!(id, "cancelling import");
                cancel.cancel();
                true
            }
            ImportState::Idle => false,
        }
    }

    pub fn is_importing(&self) -> bool {
        matches!(*self.inner.lock_state(), ImportState::Importing { .. })
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, ImportState> {
        // The state is a plain enum; a panic elsewhere cannot leave it half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ImportEvent) {
        if self.events.send(event).is_err() {
            debug!("import event dropped, no listener");
        }
    }

    async fn import(
        &self,
        id: ImportId,
        source: Box<dyn ImportSource>,
        cancel: &CancellationToken,
    ) -> Result<UpdateRecord, ImportError> {
        let (staged, _) = copy::copy_into(
            &*source,
            &self.config.download_dir,
            self.config.buffer_size,
            cancel,
        )
        .await?;
        drop(source);

        self.verifier.verify(&staged, cancel).await?;
        ensure_not_cancelled(cancel)?;

        let timestamp = match read_build_timestamp(&staged, &self.config.metadata_path, cancel).await {
            Ok(timestamp) => timestamp,
            Err(e) => {
                ensure_not_cancelled(cancel)?;
                if e.is_missing() {
                    warn!(archive = %staged.display(), entry = %self.config.metadata_path, error = %e, "no build timestamp, using current time");
                } else {
                    error!(archive = %staged.display(), entry = %self.config.metadata_path, error = %e, "failed to read build timestamp, using current time");
                }
                now_millis()
            }
        };

        let dest = self.config.managed_file_path();
        let file_size = tokio::fs::metadata(&staged)
            .await
            .map_err(|e| ImportError::Copy {
                name: staged.display().to_string(),
                dest: dest.clone(),
                source: e,
            })?
            .len();

        let name = self.localizer.local_update_label();
        let version = format!("{} ({})", name, self.localizer.format_build_date(timestamp));
        let record = UpdateRecord::local_verified(name, version, dest, file_size, timestamp);

        self.commit(id, staged, &record, cancel)?;

        if let Err(e) = self.installer.request_install(LOCAL_ID) {
            if let Err(rollback) = self.registry.delete_update(LOCAL_ID) {
                warn!(error = %rollback, "failed to unregister imported update");
            }
            return Err(ImportError::Install(e));
        }

        Ok(record)
    }

    /// Move the checked package onto the managed file and register it.
    ///
    /// Runs under the state lock: once `cancel()` has returned, the import it
    /// cancelled can no longer touch the managed file or the registry.
    fn commit(
        &self,
        id: ImportId,
        staged: tempfile::TempPath,
        record: &UpdateRecord,
        cancel: &CancellationToken,
    ) -> Result<(), ImportError> {
        let state = self.lock_state();
        let current = matches!(*state, ImportState::Importing { id: running, .. } if running == id);
        if !current || cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        staged.persist(&record.file).map_err(|e| ImportError::Copy {
            name: e.path.display().to_string(),
            dest: record.file.clone(),
            source: e.error,
        })?;
        debug!(id, dest = %record.file.display(), "package moved into place");

        match self.registry.add_update(record.clone(), false) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ImportError::Register(anyhow::anyhow!(
                "registry kept its existing '{}' entry",
                record.download_id
            ))),
            Err(e) => Err(ImportError::Register(e)),
        }
    }

    fn finish(
        &self,
        id: ImportId,
        result: Result<UpdateRecord, ImportError>,
        cancelled: bool,
    ) {
        let cancelled = cancelled || matches!(&result, Err(e) if e.is_cancelled());
        {
            let mut state = self.lock_state();
            // A cancelled import must not reset a newer one
            if matches!(*state, ImportState::Importing { id: current, .. } if current == id) {
                if result.is_err() && !cancelled {
                    self.discard_managed_file();
                }
                *state = ImportState::Idle;
            }
        }

        match result {
            Ok(record) => {
                info!(id, version = %record.version, size = record.file_size, "import completed");
                self.emit(ImportEvent::Completed {
                    id,
                    record: Some(record),
                });
            }
            Err(e) if cancelled => {
                info!(id, error = %e, "import cancelled");
                self.emit(ImportEvent::Completed { id, record: None });
            }
            Err(e) => {
                error!(id, error = %e, cause = ?std::error::Error::source(&e), "failed to import update package");
                self.emit(ImportEvent::Notice {
                    id,
                    message: self.localizer.import_failure_notice(),
                });
                self.emit(ImportEvent::Completed { id, record: None });
            }
        }
    }

    /// Called with the state lock held, like [`commit`](Self::commit).
    fn discard_managed_file(&self) {
        let path = self.config.managed_file_path();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed unverified package"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove unverified package"),
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), ImportError> {
    if cancel.is_cancelled() {
        return Err(ImportError::Cancelled);
    }
    Ok(())
}

/// Read the build timestamp from the manifest entry of the package at `path`.
pub async fn read_build_timestamp(
    path: &Path,
    metadata_path: &str,
    cancel: &CancellationToken,
) -> Result<i64, TimestampError> {
    let manifest = read_entry_to_string(path, metadata_path, cancel).await?;
    Ok(extract_timestamp(&manifest)?)
}

/// Wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
