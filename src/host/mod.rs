//! Capabilities the importer consumes from its surroundings.
//!
//! The importer only talks to these traits. The submodules provide the
//! implementations used by the command-line front end; an embedding updater
//! supplies its own.

mod locale;
mod local;
mod registry;

pub use local::{CommandVerifier, LocalFileSource};
pub use locale::DefaultLocalizer;
pub use registry::{ChannelInstallTrigger, InMemoryRegistry, InstallRequest};

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::model::UpdateRecord;

/// Request code identifying the document picker opened by the importer.
pub const REQUEST_PICK: i32 = 9061;

/// MIME type the document picker is restricted to.
pub const MIME_ZIP: &str = "application/zip";

/// Byte stream produced by an [`ImportSource`].
pub type SourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// A resource picked by the user, read exactly once.
#[async_trait]
pub trait ImportSource: Send + Sync {
    async fn open(&self) -> io::Result<SourceStream>;

    /// Human readable name for logs
    fn name(&self) -> String;
}

/// The platform's package verification primitive.
///
/// Treated as trusted and opaque: `Ok` means the package may be installed.
#[async_trait]
pub trait VerifyPackage: Send + Sync {
    async fn verify_package(&self, path: &Path) -> Result<()>;
}

/// The updater's list of known updates.
pub trait UpdateRegistry: Send + Sync {
    /// Add `record`. Returns `false` when an existing record was kept instead.
    fn add_update(&self, record: UpdateRecord, available_online: bool) -> Result<bool>;

    fn get_update(&self, download_id: &str) -> Option<UpdateRecord>;

    /// Forget the update and remove its file.
    fn delete_update(&self, download_id: &str) -> Result<bool>;
}

/// Signals the long-running install service.
pub trait InstallTrigger: Send + Sync {
    fn request_install(&self, download_id: &str) -> Result<()>;
}

pub trait Localizer: Send + Sync {
    /// Display name for an imported package
    fn local_update_label(&self) -> String;

    /// Medium-format date for an epoch-millis timestamp
    fn format_build_date(&self, epoch_millis: i64) -> String;

    /// Transient notice shown when an import fails
    fn import_failure_notice(&self) -> String;
}

/// What the importer asks the UI to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    pub request_code: i32,
    pub mime_type: &'static str,
}

/// Presents a document picker; the pick arrives later through
/// [`Importer::handle_pick_result`](crate::Importer::handle_pick_result).
pub trait PickerHost: Send + Sync {
    fn open_document(&self, request: PickRequest) -> Result<()>;
}
