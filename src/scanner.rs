//! Confirmation-delayed, range-bounded log scanning
//!
//! One filtered `eth_getLogs` per tick, never past the confirmation-safe
//! head and never wider than the provider's range limit. Window math is kept
//! pure so the cursor invariants are testable without a node.

use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use eyre::Result;

use crate::rpc_pool::{EndpointPool, EvmEndpoint};

/// Inclusive block range for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl ScanWindow {
    /// Number of blocks covered (bounds are inclusive).
    pub fn span(&self) -> u64 {
        self.to_block - self.from_block + 1
    }
}

/// Compute the next scan window, or `None` when nothing new is final yet.
///
/// The window starts at the cursor and is clamped both to the safe head and
/// to `max_range` blocks, so `to_block <= safe_latest` always holds and the
/// cursor advances by at most `max_range` per tick.
pub fn scan_window(from_block: u64, safe_latest: u64, max_range: u64) -> Option<ScanWindow> {
    if from_block > safe_latest {
        return None;
    }
    let to_block = safe_latest.min(from_block + max_range - 1);
    Some(ScanWindow {
        from_block,
        to_block,
    })
}

/// Current chain head minus the confirmation depth, through the pool.
pub async fn safe_latest(
    pool: &mut EndpointPool<EvmEndpoint>,
    confirmations: u64,
) -> Result<u64> {
    let (latest, _) = pool
        .try_call(|endpoint, _| async move { Ok(endpoint.provider.get_block_number().await?) })
        .await?;
    Ok(latest.saturating_sub(confirmations))
}

/// Fetch logs for `contract` + `topic0` over the window, through the pool.
pub async fn fetch_logs(
    pool: &mut EndpointPool<EvmEndpoint>,
    contract: Address,
    topic0: B256,
    window: ScanWindow,
) -> Result<Vec<Log>> {
    let filter = Filter::new()
        .address(contract)
        .event_signature(topic0)
        .from_block(window.from_block)
        .to_block(window.to_block);

    let (logs, _) = pool
        .try_call(|endpoint, _| {
            let filter = filter.clone();
            async move { Ok(endpoint.provider.get_logs(&filter).await?) }
        })
        .await?;
    Ok(logs)
}
