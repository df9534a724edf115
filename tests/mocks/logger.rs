//! Request logger that always fails

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use switchyard::store::{RequestLogger, RequestRecord, StoreError, StoreResult};

/// Rejects every record and counts the attempts
#[derive(Default)]
pub struct FailingLogger {
    attempts: AtomicUsize,
}

impl FailingLogger {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestLogger for FailingLogger {
    async fn log_request(&self, _record: &RequestRecord) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Pool("request log unavailable".to_string()))
    }
}
