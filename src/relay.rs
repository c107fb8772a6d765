//! The relayer orchestrator
//!
//! Drives one direction at a time: scan, decode, idempotency guard,
//! execute, advance cursor, persist. Forward and reverse ticks are
//! strictly sequential within an iteration; that ordering is the only
//! concurrency control the shared state file needs, because nothing else
//! ever writes it. A tick failure is logged and surfaced through the health
//! endpoint; it never takes the loop down.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::json_abi::{Event, Function};
use alloy::primitives::Address;
use chrono::Utc;
use eyre::{Result, WrapErr};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::abi::{self, CallContext, ContractAbi};
use crate::config::{ChainConfig, Config, Mode};
use crate::executor::{CallPlan, ExecOutcome, Executor, TxErrorClass};
use crate::guard::{self, GuardDecision};
use crate::metrics::Metrics;
use crate::rpc_pool::{connect_pool, EndpointPool, EvmEndpoint};
use crate::scanner::{self, scan_window, ScanWindow};
use crate::server::{
    ContractsInfo, EndpointCounts, HealthSnapshot, LastActivity, RpcInfo, RuntimeInfo,
    SharedHealth,
};
use crate::state::{DirectionState, ProcessedRecord, RelayerState, StateStore};

/// Relay direction for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one tick did, for catch-up progress tracking.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub window: Option<ScanWindow>,
    pub relayed: usize,
}

/// One side of the bridge: its pool, contract and scan parameters.
struct ChainSide {
    label: &'static str,
    bridge: Address,
    pool: EndpointPool<EvmEndpoint>,
    confirmations: u64,
    max_range: u64,
    /// `processedNonces(uint)` view, if this side's contract exposes one
    processed_view: Option<Function>,
}

impl ChainSide {
    fn build(label: &'static str, config: &ChainConfig, contract_abi: &ContractAbi) -> Result<Self> {
        let bridge = Address::from_str(&config.bridge_address)
            .wrap_err_with(|| format!("Invalid {label} bridge address"))?;
        Ok(Self {
            label,
            bridge,
            pool: connect_pool(label, config.chain_id, &config.rpc_urls)?,
            confirmations: config.confirmations,
            max_range: config.max_range,
            processed_view: contract_abi.processed_nonces_view().cloned(),
        })
    }
}

pub struct Relayer {
    mode: Mode,
    poll_interval: Duration,
    catch_up: bool,
    lookback_blocks: u64,
    source_chain_id: u64,
    target_chain_id: u64,
    mint_gas_limit: u64,
    unlock_gas_limit: u64,
    source: ChainSide,
    target: ChainSide,
    lock_event: Event,
    return_event: Event,
    mint_function: Function,
    unlock_function: Function,
    executor: Executor,
    store: StateStore,
    state: RelayerState,
    last: LastActivity,
    health: SharedHealth,
    metrics: Arc<Metrics>,
}

impl Relayer {
    /// Resolve ABIs, build pools, and load persisted state. Everything here
    /// is fail-fast: a bad address, an unreadable ABI, or a forced name that
    /// does not exist aborts startup before any state is written.
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let source_abi = ContractAbi::load(&config.source.abi_path)?;
        let target_abi = ContractAbi::load(&config.target.abi_path)?;

        let lock_event = abi::pick_event(
            &source_abi,
            config.relayer.lock_event.as_deref(),
            abi::LOCK_EVENT_KEYWORDS,
            abi::RETURN_EVENT_KEYWORDS,
            abi::LOCK_EVENT_ACTION_KEYWORDS,
            "lock",
        )?;
        let return_event = abi::pick_event(
            &target_abi,
            config.relayer.return_event.as_deref(),
            abi::RETURN_EVENT_KEYWORDS,
            &[],
            abi::RETURN_EVENT_KEYWORDS,
            "return",
        )?;
        let mint_function = abi::pick_function(
            &target_abi,
            config.relayer.mint_function.as_deref(),
            abi::MINT_FUNCTION_KEYWORDS,
            abi::MINT_ACTION_KEYWORDS,
            3,
            "mint",
        )?;
        let unlock_function = abi::pick_function(
            &source_abi,
            config.relayer.unlock_function.as_deref(),
            abi::UNLOCK_FUNCTION_KEYWORDS,
            abi::UNLOCK_ACTION_KEYWORDS,
            2,
            "unlock",
        )?;

        info!(
            event = %lock_event.signature(),
            topic0 = %format!("0x{}", hex::encode(abi::event_topic0(&lock_event))),
            "Forward: watching lock event"
        );
        info!(function = %mint_function.signature(), "Forward: mint call");
        info!(
            event = %return_event.signature(),
            topic0 = %format!("0x{}", hex::encode(abi::event_topic0(&return_event))),
            "Reverse: watching return event"
        );
        info!(function = %unlock_function.signature(), "Reverse: unlock call");

        let source = ChainSide::build("source", &config.source, &source_abi)?;
        let target = ChainSide::build("target", &config.target, &target_abi)?;

        let executor = Executor::new(
            &config.relayer.private_key,
            config.relayer.max_retries,
            config.relayer.retry_delay_ms,
            config.relayer.dry_run,
        )?;
        info!(relayer_address = %executor.address(), "Executor initialized");

        let store = StateStore::new(&config.relayer.state_file);
        let state = store.load(
            config.relayer.reset_state,
            RelayerState::with_overrides(config.source.from_block, config.target.from_block),
        );
        info!(
            path = %store.path().display(),
            forward_next = state.forward.cursor.next_block,
            reverse_next = state.reverse.cursor.next_block,
            "State loaded (0 = auto)"
        );

        let runtime = RuntimeInfo {
            mode: config.relayer.mode.to_string(),
            contracts: ContractsInfo {
                source_bridge: config.source.bridge_address.clone(),
                target_bridge: config.target.bridge_address.clone(),
            },
            rpc: RpcInfo {
                source: config.source.rpc_urls.clone(),
                target: config.target.rpc_urls.clone(),
            },
            state_file: config.relayer.state_file.clone(),
        };

        let endpoints = EndpointCounts {
            source_alive: source.pool.live_count(),
            source_total: source.pool.total_count(),
            target_alive: target.pool.live_count(),
            target_total: target.pool.total_count(),
        };

        let health = Arc::new(RwLock::new(HealthSnapshot {
            runtime,
            last: LastActivity::default(),
            endpoints,
            state: state.clone(),
        }));

        Ok(Self {
            mode: config.relayer.mode,
            poll_interval: Duration::from_millis(config.relayer.poll_interval_ms),
            catch_up: config.relayer.catch_up,
            lookback_blocks: config.relayer.lookback_blocks,
            source_chain_id: config.source.chain_id,
            target_chain_id: config.target.chain_id,
            mint_gas_limit: config.relayer.mint_gas_limit,
            unlock_gas_limit: config.relayer.unlock_gas_limit,
            source,
            target,
            lock_event,
            return_event,
            mint_function,
            unlock_function,
            executor,
            store,
            state,
            last: LastActivity::default(),
            health,
            metrics,
        })
    }

    /// Shared snapshot handle for the health server.
    pub fn health_handle(&self) -> SharedHealth {
        Arc::clone(&self.health)
    }

    /// Main loop: forward tick, reverse tick, publish, sleep. Exits on the
    /// shutdown signal after one final synchronous state flush.
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        if self.catch_up && self.run_catch_up(&mut shutdown).await {
            return self.flush_and_stop();
        }

        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            mode = %self.mode,
            "Entering poll loop"
        );

        loop {
            self.iteration().await;

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.flush_and_stop()
    }

    fn flush_and_stop(&mut self) -> Result<()> {
        self.persist()?;
        info!("State persisted, relayer stopped");
        Ok(())
    }

    /// One poll iteration: both enabled directions, strictly in order.
    async fn iteration(&mut self) {
        let mut failed = false;
        if self.mode.runs_forward() {
            if let Err(e) = self.tick(Direction::Forward).await {
                self.record_error(Direction::Forward, e);
                failed = true;
            } else {
                self.last.forward_at = Some(Utc::now());
            }
        }
        if self.mode.runs_reverse() {
            if let Err(e) = self.tick(Direction::Reverse).await {
                self.record_error(Direction::Reverse, e);
                failed = true;
            } else {
                self.last.reverse_at = Some(Utc::now());
            }
        }
        if !failed {
            self.last.error = None;
        }
        self.publish_health().await;
    }

    /// Initial chunked backfill over the lookback window, reusing the normal
    /// tick pipeline until both directions reach the safe head. Returns true
    /// when interrupted by the shutdown signal.
    async fn run_catch_up(&mut self, shutdown: &mut mpsc::Receiver<()>) -> bool {
        info!(lookback = self.lookback_blocks, "Catch-up: backfilling before polling");

        if self.mode.runs_forward() {
            if let Err(e) = self.init_lookback_cursor(Direction::Forward).await {
                self.record_error(Direction::Forward, e);
            }
        }
        if self.mode.runs_reverse() {
            if let Err(e) = self.init_lookback_cursor(Direction::Reverse).await {
                self.record_error(Direction::Reverse, e);
            }
        }

        loop {
            let mut pending = false;

            if self.mode.runs_forward() {
                match self.tick(Direction::Forward).await {
                    Ok(report) => pending |= report.window.is_some(),
                    Err(e) => self.record_error(Direction::Forward, e),
                }
            }
            if self.mode.runs_reverse() {
                match self.tick(Direction::Reverse).await {
                    Ok(report) => pending |= report.window.is_some(),
                    Err(e) => self.record_error(Direction::Reverse, e),
                }
            }
            self.publish_health().await;

            if shutdown.try_recv().is_ok() {
                info!("Shutdown signal received during catch-up");
                return true;
            }
            if !pending {
                info!("Catch-up complete");
                return false;
            }
        }
    }

    /// Point an auto cursor at `safe_head - lookback` instead of the safe
    /// head itself. Persisted cursors are left alone: catch-up never
    /// rewinds past work.
    async fn init_lookback_cursor(&mut self, direction: Direction) -> Result<()> {
        let (side, dir_state) = match direction {
            Direction::Forward => (&mut self.source, &mut self.state.forward),
            Direction::Reverse => (&mut self.target, &mut self.state.reverse),
        };
        if dir_state.cursor.next_block != 0 {
            return Ok(());
        }
        let safe = scanner::safe_latest(&mut side.pool, side.confirmations).await?;
        // .max(1) keeps the result off the 0 = auto sentinel
        dir_state.cursor.next_block = safe.saturating_sub(self.lookback_blocks).max(1);
        info!(
            direction = %direction,
            from_block = dir_state.cursor.next_block,
            safe_head = safe,
            "Catch-up window initialized"
        );
        Ok(())
    }

    /// Run one direction's tick to completion and persist the state.
    async fn tick(&mut self, direction: Direction) -> Result<TickReport> {
        let ctx_ids = (self.source_chain_id, self.target_chain_id);
        let report = match direction {
            Direction::Forward => {
                run_tick(
                    direction,
                    &mut self.source,
                    &mut self.target,
                    &self.lock_event,
                    &self.mint_function,
                    self.mint_gas_limit,
                    ctx_ids,
                    &self.executor,
                    &mut self.state.forward,
                    &self.metrics,
                )
                .await?
            }
            Direction::Reverse => {
                run_tick(
                    direction,
                    &mut self.target,
                    &mut self.source,
                    &self.return_event,
                    &self.unlock_function,
                    self.unlock_gas_limit,
                    ctx_ids,
                    &self.executor,
                    &mut self.state.reverse,
                    &self.metrics,
                )
                .await?
            }
        };

        // Persist every tick, events or not, so cursors always make forward
        // progress across restarts.
        self.persist()?;
        Ok(report)
    }

    fn persist(&mut self) -> Result<()> {
        self.state.updated_at = Some(Utc::now());
        self.store.save(&self.state)
    }

    fn record_error(&mut self, direction: Direction, error: eyre::Report) {
        error!(direction = %direction, error = %error, "Tick failed");
        self.metrics
            .tick_errors_total
            .with_label_values(&[direction.as_str()])
            .inc();
        self.last.error = Some(format!("[{direction}] {error}"));
        self.last.error_at = Some(Utc::now());
    }

    async fn publish_health(&self) {
        self.metrics
            .last_scanned_block
            .with_label_values(&["source"])
            .set(self.state.forward.cursor.last_seen_block as i64);
        self.metrics
            .last_scanned_block
            .with_label_values(&["target"])
            .set(self.state.reverse.cursor.last_seen_block as i64);
        self.metrics
            .endpoints_alive
            .with_label_values(&["source"])
            .set(self.source.pool.live_count() as i64);
        self.metrics
            .endpoints_alive
            .with_label_values(&["target"])
            .set(self.target.pool.live_count() as i64);

        let mut snapshot = self.health.write().await;
        snapshot.state = self.state.clone();
        snapshot.last = self.last.clone();
        snapshot.endpoints = EndpointCounts {
            source_alive: self.source.pool.live_count(),
            source_total: self.source.pool.total_count(),
            target_alive: self.target.pool.live_count(),
            target_total: self.target.pool.total_count(),
        };
    }
}

/// The tick pipeline for one direction: scan the window on `scan_side`,
/// relay each decoded transfer onto `exec_side`, advance the cursor
/// unconditionally once the window has been processed.
#[allow(clippy::too_many_arguments)]
async fn run_tick(
    direction: Direction,
    scan_side: &mut ChainSide,
    exec_side: &mut ChainSide,
    event: &Event,
    function: &Function,
    gas_limit: u64,
    (source_chain_id, target_chain_id): (u64, u64),
    executor: &Executor,
    dir_state: &mut DirectionState,
    metrics: &Metrics,
) -> Result<TickReport> {
    let safe = scanner::safe_latest(&mut scan_side.pool, scan_side.confirmations).await?;

    if dir_state.cursor.next_block == 0 {
        // Auto cursor: no historical backfill, start at the safe head.
        dir_state.cursor.next_block = safe;
        debug!(direction = %direction, block = safe, "Cursor auto-resolved to safe head");
    }

    let Some(window) = scan_window(dir_state.cursor.next_block, safe, scan_side.max_range) else {
        return Ok(TickReport {
            window: None,
            relayed: 0,
        });
    };

    let logs = scanner::fetch_logs(
        &mut scan_side.pool,
        scan_side.bridge,
        abi::event_topic0(event),
        window,
    )
    .await?;
    dir_state.cursor.last_seen_block = window.to_block;

    if !logs.is_empty() {
        info!(
            direction = %direction,
            chain = scan_side.label,
            event = %event.name,
            count = logs.len(),
            from_block = window.from_block,
            to_block = window.to_block,
            "Found transfer logs"
        );
    }

    let mut relayed = 0;
    for log in &logs {
        let transfer = match abi::decode_transfer(event, log.data()) {
            Ok(transfer) => transfer,
            Err(e) => {
                // Accepted trade-off: the cursor still advances past this
                // block range, so the loss is surfaced loudly here.
                warn!(
                    direction = %direction,
                    tx = ?log.transaction_hash,
                    log_index = ?log.log_index,
                    error = %e,
                    "Skipping undecodable log"
                );
                metrics.undecodable_logs_total.inc();
                continue;
            }
        };

        let nonce_key = transfer.nonce.to_string();
        let decision = guard::check_nonce(
            dir_state,
            &mut exec_side.pool,
            exec_side.bridge,
            exec_side.processed_view.as_ref(),
            transfer.nonce,
        )
        .await;
        if let GuardDecision::Skip(reason) = decision {
            info!(direction = %direction, nonce = %nonce_key, reason = %reason, "Skipping transfer");
            metrics
                .events_skipped_total
                .with_label_values(&[direction.as_str()])
                .inc();
            continue;
        }

        let ctx = CallContext {
            recipient: transfer.actor,
            amount: transfer.amount,
            nonce: transfer.nonce,
            source_chain_id,
            target_chain_id,
        };
        let plan = match CallPlan::build(exec_side.bridge, function, &ctx, gas_limit) {
            Ok(plan) => plan,
            Err(e) => {
                // Auto-detected functions were probed buildable at startup.
                error!(direction = %direction, nonce = %nonce_key, error = %e, "Failed to build call");
                continue;
            }
        };

        let source_tx = log
            .transaction_hash
            .map(|h| format!("{h:#x}"))
            .unwrap_or_default();
        info!(
            direction = %direction,
            nonce = %nonce_key,
            amount = %transfer.amount,
            to = %transfer.actor,
            call = %plan.signature(),
            source_tx = %source_tx,
            "Relaying transfer"
        );

        match executor.execute(&mut exec_side.pool, &plan).await {
            ExecOutcome::DryRun => {}
            ExecOutcome::Executed {
                tx_hash,
                block_number,
                endpoint,
            } => {
                info!(
                    direction = %direction,
                    nonce = %nonce_key,
                    source_tx = %source_tx,
                    dest_tx = %tx_hash,
                    block = block_number,
                    endpoint,
                    "Transfer relayed"
                );
                dir_state.mark_skipped(nonce_key.clone(), "already processed (relayed)".to_string());
                dir_state.cursor.last_processed = Some(ProcessedRecord {
                    nonce: nonce_key,
                    block_number,
                    source_tx,
                    dest_tx: tx_hash,
                });
                metrics
                    .events_relayed_total
                    .with_label_values(&[direction.as_str()])
                    .inc();
                relayed += 1;
            }
            ExecOutcome::SimulationRevert(reason) => {
                // Left unprocessed; no retry budget consumed, no cache entry.
                warn!(
                    direction = %direction,
                    nonce = %nonce_key,
                    reason = %reason,
                    "Simulation reverted, transfer not submitted"
                );
                metrics
                    .events_failed_total
                    .with_label_values(&[direction.as_str()])
                    .inc();
            }
            ExecOutcome::NonRetryable { class, message } => {
                let reason = match class {
                    TxErrorClass::AlreadyProcessed => "already processed (revert)".to_string(),
                    _ => format!("non-retryable revert: {message}"),
                };
                warn!(
                    direction = %direction,
                    nonce = %nonce_key,
                    error = %message,
                    "Non-retryable failure, nonce recorded"
                );
                dir_state.mark_skipped(nonce_key, reason);
                metrics
                    .events_failed_total
                    .with_label_values(&[direction.as_str()])
                    .inc();
            }
            ExecOutcome::Exhausted(message) => {
                warn!(
                    direction = %direction,
                    nonce = %nonce_key,
                    error = %message,
                    "Retries exhausted, transfer left for a later re-scan"
                );
                metrics
                    .events_failed_total
                    .with_label_values(&[direction.as_str()])
                    .inc();
            }
        }
    }

    dir_state.cursor.next_block = window.to_block + 1;
    Ok(TickReport {
        window: Some(window),
        relayed,
    })
}
