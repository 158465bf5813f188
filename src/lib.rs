//! # update-importer
//!
//! Imports an OTA update package picked from local storage into the updater.
//!
//! The package is copied to a fixed location in the download directory,
//! checked by the platform's package verifier, and its build timestamp is
//! read from the `META-INF/com/android/metadata` manifest. The result is a
//! verified [`UpdateRecord`] that is registered with the update list and
//! handed to the install service.
//!
//! ## Features
//!
//! - One cancellable background import at a time, with explicit `Busy` refusal
//! - Exactly one `Started` and one `Completed` event per import
//! - Rejected or failed packages never stay on disk
//! - Random-access ZIP reading (ZIP64, STORED, DEFLATE, CRC-32 checks)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use update_importer::host::{
//!     ChannelInstallTrigger, CommandVerifier, DefaultLocalizer, InMemoryRegistry,
//!     LocalFileSource, REQUEST_PICK,
//! };
//! use update_importer::{ImportEvent, Importer, ImporterConfig, PickOutcome, Services};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (installer, _installs) = ChannelInstallTrigger::new();
//!     let (importer, mut events) = Importer::new(
//!         ImporterConfig::new("/data/updates"),
//!         Services {
//!             verifier: Arc::new(CommandVerifier::new("verify-ota")),
//!             registry: Arc::new(InMemoryRegistry::new()),
//!             installer: Arc::new(installer),
//!             localizer: Arc::new(DefaultLocalizer),
//!             picker: None,
//!         },
//!     );
//!
//!     let source = Box::new(LocalFileSource::new("ota.zip"));
//!     importer.handle_pick_result(REQUEST_PICK, PickOutcome::Ok, Some(source))?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let ImportEvent::Completed { record, .. } = event {
//!             println!("{:?}", record.map(|r| r.version));
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod host;
pub mod importer;
pub mod io;
pub mod metadata;
pub mod model;
pub mod verify;
pub mod zip;

pub use cli::Cli;
pub use config::ImporterConfig;
pub use importer::{ImportError, ImportEvent, ImportId, Importer, PickOutcome, Services};
pub use io::{LocalFileReader, ReadAt};
pub use model::{LOCAL_ID, PersistentStatus, UpdateRecord, UpdateStatus};
pub use verify::{PackageVerifier, VerificationError};
pub use zip::{ArchiveError, ZipExtractor, ZipFileEntry};
