//! Per-chain RPC endpoint pool with fallback and identity eviction
//!
//! Endpoints are tried in configured priority order. An endpoint that reports
//! the wrong chain identity is evicted for the lifetime of the process: a
//! misconfigured URL pointing at another network must never serve a scan or
//! carry a transaction. Every other failure is transient: the call falls
//! through to the next endpoint and the slot stays in the rotation.

use std::future::Future;
use std::sync::Arc;

use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use thiserror::Error;
use tracing::{debug, warn};

/// Pool-level failures, distinguished from per-endpoint operation errors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no live {label} endpoints remain in the pool")]
    Empty { label: String },
    #[error("all {label} endpoints failed; last error: {last_error}")]
    Exhausted { label: String, last_error: String },
}

/// Minimal identity surface an endpoint must expose. Production endpoints
/// answer with `eth_chainId`; tests substitute fakes.
#[async_trait]
pub trait ChainIdentity {
    async fn chain_id(&self) -> Result<u64>;
}

/// A single JSON-RPC endpoint: its URL plus a shared read provider.
pub struct EvmEndpoint {
    pub url: String,
    pub provider: RootProvider<Http<Client>>,
}

impl EvmEndpoint {
    pub fn connect(url: &str) -> Result<Self> {
        let parsed = url
            .parse()
            .wrap_err_with(|| format!("Invalid RPC URL: {url}"))?;
        Ok(Self {
            url: url.to_string(),
            provider: ProviderBuilder::new().on_http(parsed),
        })
    }
}

#[async_trait]
impl ChainIdentity for EvmEndpoint {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }
}

struct Slot<T> {
    endpoint: Arc<T>,
    alive: bool,
    /// Chain identity confirmed against `expected_chain_id`
    verified: bool,
}

/// Ordered endpoint pool for one chain.
pub struct EndpointPool<T> {
    label: String,
    expected_chain_id: u64,
    slots: Vec<Slot<T>>,
}

/// Errors whose message marks an endpoint as answering for the wrong chain.
pub fn is_identity_mismatch(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("network changed")
        || lower.contains("wrong network")
        || lower.contains("chain id mismatch")
        || lower.contains("unexpected chain")
}

impl<T: ChainIdentity + Send + Sync> EndpointPool<T> {
    pub fn new(label: impl Into<String>, expected_chain_id: u64, endpoints: Vec<T>) -> Self {
        Self {
            label: label.into(),
            expected_chain_id,
            slots: endpoints
                .into_iter()
                .map(|endpoint| Slot {
                    endpoint: Arc::new(endpoint),
                    alive: true,
                    verified: false,
                })
                .collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    /// Endpoints still in the rotation.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    pub fn total_count(&self) -> usize {
        self.slots.len()
    }

    fn evict(&mut self, index: usize, reason: &str) {
        self.slots[index].alive = false;
        warn!(
            chain = %self.label,
            endpoint = index,
            reason,
            remaining = self.live_count(),
            "Evicting RPC endpoint (permanent for this process)"
        );
    }

    /// Run `op` against the first live endpoint that accepts it, falling
    /// through on transient failures. Returns the result together with the
    /// index of the endpoint that served it.
    pub async fn try_call<F, Fut, R>(&mut self, mut op: F) -> Result<(R, usize), PoolError>
    where
        F: FnMut(Arc<T>, usize) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        if self.live_count() == 0 {
            return Err(PoolError::Empty {
                label: self.label.clone(),
            });
        }

        let mut last_error: Option<String> = None;

        for index in 0..self.slots.len() {
            if !self.slots[index].alive {
                continue;
            }

            if !self.slots[index].verified {
                match self.slots[index].endpoint.chain_id().await {
                    Ok(id) if id == self.expected_chain_id => {
                        self.slots[index].verified = true;
                    }
                    Ok(id) => {
                        self.evict(
                            index,
                            &format!("chain id {id}, expected {}", self.expected_chain_id),
                        );
                        last_error = Some(format!(
                            "endpoint #{index} reported chain id {id}, expected {}",
                            self.expected_chain_id
                        ));
                        continue;
                    }
                    Err(e) => {
                        // Identity unknown; leave the slot unverified and
                        // let a later call probe it again.
                        debug!(
                            chain = %self.label,
                            endpoint = index,
                            error = %e,
                            "Endpoint identity probe failed, trying next"
                        );
                        last_error = Some(e.to_string());
                        continue;
                    }
                }
            }

            match op(Arc::clone(&self.slots[index].endpoint), index).await {
                Ok(result) => return Ok((result, index)),
                Err(e) => {
                    let message = e.to_string();
                    if is_identity_mismatch(&message) {
                        self.evict(index, &message);
                    } else {
                        debug!(
                            chain = %self.label,
                            endpoint = index,
                            error = %message,
                            "Endpoint call failed, trying next"
                        );
                    }
                    last_error = Some(message);
                }
            }
        }

        Err(PoolError::Exhausted {
            label: self.label.clone(),
            last_error: last_error.unwrap_or_else(|| "all endpoints failed".to_string()),
        })
    }
}

/// Build a pool of HTTP endpoints for one chain from its config.
pub fn connect_pool(
    label: &str,
    expected_chain_id: u64,
    urls: &[String],
) -> Result<EndpointPool<EvmEndpoint>> {
    let endpoints = urls
        .iter()
        .map(|url| EvmEndpoint::connect(url))
        .collect::<Result<Vec<_>>>()?;
    Ok(EndpointPool::new(label, expected_chain_id, endpoints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeEndpoint {
        chain_id: u64,
        /// Calls that fail before the endpoint starts succeeding
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FakeEndpoint {
        fn new(chain_id: u64, failures: u32) -> Self {
            Self {
                chain_id,
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainIdentity for FakeEndpoint {
        async fn chain_id(&self) -> Result<u64> {
            Ok(self.chain_id)
        }
    }

    async fn run_op(endpoint: Arc<FakeEndpoint>) -> Result<u64> {
        endpoint.calls.fetch_add(1, Ordering::SeqCst);
        if endpoint.failures.load(Ordering::SeqCst) > 0 {
            endpoint.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(eyre!("connection reset"));
        }
        Ok(endpoint.chain_id)
    }

    #[tokio::test]
    async fn first_endpoint_serves_when_healthy() {
        let mut pool = EndpointPool::new(
            "sepolia",
            11155111,
            vec![FakeEndpoint::new(11155111, 0), FakeEndpoint::new(11155111, 0)],
        );
        let (result, index) = pool.try_call(|e, _| run_op(e)).await.unwrap();
        assert_eq!(result, 11155111);
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn wrong_chain_endpoint_is_evicted_permanently() {
        // Scenario: endpoint #0 answers for mainnet, expected Sepolia.
        let mut pool = EndpointPool::new(
            "sepolia",
            11155111,
            vec![FakeEndpoint::new(1, 0), FakeEndpoint::new(11155111, 0)],
        );

        let (_, index) = pool.try_call(|e, _| run_op(e)).await.unwrap();
        assert_eq!(index, 1);
        assert_eq!(pool.live_count(), 1);

        // Later calls never touch the evicted slot again.
        for _ in 0..3 {
            let (_, index) = pool.try_call(|e, _| run_op(e)).await.unwrap();
            assert_eq!(index, 1);
        }
        assert_eq!(pool.slots[0].endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transient_failure_falls_through_without_eviction() {
        let mut pool = EndpointPool::new(
            "amoy",
            80002,
            vec![FakeEndpoint::new(80002, 1), FakeEndpoint::new(80002, 0)],
        );

        let (_, index) = pool.try_call(|e, _| run_op(e)).await.unwrap();
        assert_eq!(index, 1);
        assert_eq!(pool.live_count(), 2);

        // Endpoint #0 recovered; priority order puts it back in front.
        let (_, index) = pool.try_call(|e, _| run_op(e)).await.unwrap();
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn identity_mismatch_error_message_evicts() {
        let mut pool = EndpointPool::new(
            "amoy",
            80002,
            vec![FakeEndpoint::new(80002, 0), FakeEndpoint::new(80002, 0)],
        );

        let result = pool
            .try_call(|e, index| async move {
                if index == 0 {
                    Err::<u64, _>(eyre!("network changed: 80002 => 1"))
                } else {
                    run_op(e).await
                }
            })
            .await
            .unwrap();
        assert_eq!(result.1, 1);
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_pool_reports_aggregate_error() {
        let mut pool = EndpointPool::new(
            "sepolia",
            11155111,
            vec![FakeEndpoint::new(11155111, 10), FakeEndpoint::new(11155111, 10)],
        );
        let err = pool.try_call(|e, _| run_op(e)).await.unwrap_err();
        match err {
            PoolError::Exhausted { label, last_error } => {
                assert_eq!(label, "sepolia");
                assert!(last_error.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Pool is not reset; both endpoints remain for the next tick.
        assert_eq!(pool.live_count(), 2);
    }

    #[tokio::test]
    async fn fully_evicted_pool_is_empty() {
        let mut pool = EndpointPool::new("sepolia", 11155111, vec![FakeEndpoint::new(1, 0)]);
        let err = pool.try_call(|e, _| run_op(e)).await.unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
        assert_eq!(pool.live_count(), 0);

        let err = pool.try_call(|e, _| run_op(e)).await.unwrap_err();
        assert!(matches!(err, PoolError::Empty { .. }));
    }

    #[test]
    fn identity_mismatch_detection() {
        assert!(is_identity_mismatch("network changed: 1 => 11155111"));
        assert!(is_identity_mismatch("Wrong network configured"));
        assert!(!is_identity_mismatch("connection timeout"));
        assert!(!is_identity_mismatch("execution reverted"));
    }
}
