//! companion helper
//!
//! receives every successfully fetched device list from the poller and
//! answers through the auxiliary channel with the time it saw it. the
//! widget shows that as "Updated at ...".

use crate::domain::{AuxiliaryPayload, DeviceRecord};
use crate::store::SnapshotStore;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

/// device lists waiting for the companion; the poller drops extras
pub const QUEUE_DEPTH: usize = 4;

pub fn payload_for(devices: &[DeviceRecord], now: DateTime<Local>) -> AuxiliaryPayload {
    let mut payload = AuxiliaryPayload::new(now.format("%Y-%m-%d %H:%M:%S").to_string());
    payload.extra.insert("devices".to_string(), serde_json::json!(devices.len()));
    payload
}

/// spawn the companion task and hand back the sender for the poller
pub fn spawn(store: SnapshotStore) -> mpsc::Sender<Vec<DeviceRecord>> {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(run(rx, store));
    tx
}

async fn run(mut rx: mpsc::Receiver<Vec<DeviceRecord>>, store: SnapshotStore) {
    while let Some(devices) = rx.recv().await {
        let payload = payload_for(&devices, Local::now());
        tracing::debug!("companion: updated at {}", payload.date);
        store.set_auxiliary(payload).await;
    }
    tracing::debug!("companion: poller gone, stopping");
}
