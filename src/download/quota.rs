//! Quota gates for synchronous downloads

use crate::error::{DownloadError, Result};
use crate::types::Caller;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Admission control for estimated download sizes
///
/// `admit` either records the consumption against the caller and returns
/// `Ok`, or fails with [`DownloadError::QuotaExceeded`] without recording
/// anything.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    /// Charge `bytes` to `caller` for the download `request_id`
    async fn admit(&self, caller: &Caller, bytes: u64, request_id: &str) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Gate that admits everything
#[derive(Clone, Copy, Debug, Default)]
pub struct UnlimitedQuota;

#[async_trait]
impl QuotaGate for UnlimitedQuota {
    async fn admit(&self, _caller: &Caller, _bytes: u64, _request_id: &str) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "unlimited"
    }
}

/// Fixed byte budget per key name, held in memory for the process lifetime
#[derive(Debug)]
pub struct ByteBudgetQuota {
    limit: u64,
    used: Mutex<HashMap<String, u64>>,
}

impl ByteBudgetQuota {
    /// Gate allowing each key `limit` bytes in total
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: Mutex::new(HashMap::new()),
        }
    }

    /// Bytes `key_name` may still consume
    pub async fn remaining(&self, key_name: &str) -> u64 {
        let used = self.used.lock().await;
        self.limit
            .saturating_sub(used.get(key_name).copied().unwrap_or(0))
    }
}

#[async_trait]
impl QuotaGate for ByteBudgetQuota {
    async fn admit(&self, caller: &Caller, bytes: u64, request_id: &str) -> Result<()> {
        let mut used = self.used.lock().await;
        let consumed = used.entry(caller.name.clone()).or_insert(0);
        let remaining = self.limit.saturating_sub(*consumed);

        if bytes > remaining {
            tracing::warn!(
                key_name = %caller.name,
                request_id = %request_id,
                requested = bytes,
                remaining,
                "download refused by quota"
            );
            return Err(DownloadError::QuotaExceeded {
                key_name: caller.name.clone(),
                requested: bytes,
                remaining,
            }
            .into());
        }

        *consumed += bytes;
        tracing::debug!(
            key_name = %caller.name,
            request_id = %request_id,
            charged = bytes,
            remaining = remaining - bytes,
            "quota charged"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "byte-budget"
    }
}
