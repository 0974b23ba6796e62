//! ==============================================================================
//! store.rs - the latest snapshot
//! ==============================================================================
//!
//! purpose:
//!     holds the last device list and the last auxiliary payload, and pokes
//!     the renderer whenever either is replaced.
//!
//! the value behind the lock is only ever swapped whole, so a reader sees
//! either the old snapshot or the new one, never a mix.
//!
//! relationships:
//!     - written by: poller.rs (device list), companion.rs and main.rs
//!       (auxiliary payload)
//!     - read by: host.rs (redraw loop), main.rs (json api)
//!
//! ==============================================================================

use crate::domain::{AuxiliaryPayload, DeviceRecord, Snapshot};

use std::sync::Arc;
use tokio::sync::RwLock;

/// the hook the store calls after every change
///
/// implementations must not block; the actual redraw happens elsewhere.
pub trait RedrawNotifier: Send + Sync {
    fn request_redraw(&self);
}

#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Snapshot>>,
    notifier: Arc<dyn RedrawNotifier>,
}

impl SnapshotStore {
    pub fn new(notifier: Arc<dyn RedrawNotifier>) -> Self {
        Self { inner: Arc::new(RwLock::new(Snapshot::default())), notifier }
    }

    /// replace the device list; always signals, even if nothing changed
    pub async fn set_devices(&self, devices: Vec<DeviceRecord>) {
        {
            let mut guard = self.inner.write().await;
            guard.devices = Some(devices);
        }
        self.notifier.request_redraw();
    }

    pub async fn set_auxiliary(&self, payload: AuxiliaryPayload) {
        {
            let mut guard = self.inner.write().await;
            guard.auxiliary = Some(payload);
        }
        self.notifier.request_redraw();
    }

    /// copy of the current snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    #[allow(dead_code)]
    pub async fn has_data(&self) -> bool {
        self.inner.read().await.has_data()
    }
}
