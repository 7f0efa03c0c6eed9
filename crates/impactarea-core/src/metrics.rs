//! Network transfer accounting shared by the fetchers and the exporter

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Byte counters for one processing run.
///
/// Clones share the same counters, so a meter can be handed to every client
/// taking part in a run.
#[derive(Debug, Clone, Default)]
pub struct TransferMeter {
    downloaded: Arc<AtomicU64>,
    uploaded: Arc<AtomicU64>,
}

impl TransferMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_download(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }
}
