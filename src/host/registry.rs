use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{InstallTrigger, UpdateRegistry};
use crate::model::UpdateRecord;

/// Process-local update list.
///
/// A record listed by the server is never replaced by one that is not;
/// everything else is replaced, so a re-import refreshes the local record.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    updates: Mutex<HashMap<String, UpdateRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UpdateRegistry for InMemoryRegistry {
    fn add_update(&self, mut record: UpdateRecord, available_online: bool) -> Result<bool> {
        let mut updates = self
            .updates
            .lock()
            .map_err(|_| anyhow!("update registry poisoned"))?;

        if let Some(existing) = updates.get(&record.download_id) {
            if existing.available_online && !available_online {
                debug!(id = %record.download_id, "keeping server-listed update");
                return Ok(false);
            }
        }

        record.available_online = available_online;
        info!(id = %record.download_id, version = %record.version, "update added");
        updates.insert(record.download_id.clone(), record);
        Ok(true)
    }

    fn get_update(&self, download_id: &str) -> Option<UpdateRecord> {
        self.updates.lock().ok()?.get(download_id).cloned()
    }

    fn delete_update(&self, download_id: &str) -> Result<bool> {
        let removed = self
            .updates
            .lock()
            .map_err(|_| anyhow!("update registry poisoned"))?
            .remove(download_id);

        let Some(record) = removed else {
            return Ok(false);
        };
        match std::fs::remove_file(&record.file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %record.file.display(), error = %e, "failed to delete update file"),
        }
        info!(id = %download_id, "update deleted");
        Ok(true)
    }
}

/// Message sent to the install service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub download_id: String,
}

/// Forwards install requests to whoever drives installation.
#[derive(Debug, Clone)]
pub struct ChannelInstallTrigger {
    tx: mpsc::UnboundedSender<InstallRequest>,
}

impl ChannelInstallTrigger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InstallRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InstallTrigger for ChannelInstallTrigger {
    fn request_install(&self, download_id: &str) -> Result<()> {
        self.tx
            .send(InstallRequest {
                download_id: download_id.to_string(),
            })
            .map_err(|_| anyhow!("install service is not running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LOCAL_ID;
    use std::path::PathBuf;

    fn record(id: &str, file: PathBuf) -> UpdateRecord {
        let mut r = UpdateRecord::local_verified("n".into(), "v".into(), file, 1, 1);
        r.download_id = id.to_string();
        r
    }

    #[test]
    fn local_record_replaces_previous_local_record() {
        let registry = InMemoryRegistry::new();
        let mut first = record(LOCAL_ID, "/a".into());
        first.timestamp = 1;
        let mut second = record(LOCAL_ID, "/a".into());
        second.timestamp = 2;

        assert!(registry.add_update(first, false).unwrap());
        assert!(registry.add_update(second, false).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_update(LOCAL_ID).unwrap().timestamp, 2);
    }

    #[test]
    fn server_record_is_not_replaced_by_local_one() {
        let registry = InMemoryRegistry::new();
        registry.add_update(record("abc", "/s".into()), true).unwrap();

        assert!(!registry.add_update(record("abc", "/l".into()), false).unwrap());
        let kept = registry.get_update("abc").unwrap();
        assert!(kept.available_online);
        assert_eq!(kept.file, PathBuf::from("/s"));
    }

    #[test]
    fn delete_removes_record_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("localUpdate.zip");
        std::fs::write(&file, b"zip").unwrap();

        let registry = InMemoryRegistry::new();
        registry.add_update(record(LOCAL_ID, file.clone()), false).unwrap();

        assert!(registry.delete_update(LOCAL_ID).unwrap());
        assert!(!file.exists());
        assert!(registry.is_empty());
        assert!(!registry.delete_update(LOCAL_ID).unwrap());
    }

    #[tokio::test]
    async fn install_requests_are_forwarded() {
        let (trigger, mut rx) = ChannelInstallTrigger::new();
        trigger.request_install(LOCAL_ID).unwrap();
        assert_eq!(rx.recv().await.unwrap().download_id, LOCAL_ID);

        drop(rx);
        assert!(trigger.request_install(LOCAL_ID).is_err());
    }
}
