//! Transaction execution: simulate, submit, confirm
//!
//! Every execution goes through a read-only simulation first; a revert there
//! aborts the attempt without touching the retry budget. Submission uses the
//! caller-configured gas limit; provider gas estimation is never consulted,
//! it fails in provider-specific ways for perfectly valid calls. Submit and
//! confirm are retried a bounded number of times with a fixed delay, except
//! for on-chain guard reverts (duplicate nonce, paused bridge), which are
//! abandoned immediately.

use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::Function;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use eyre::{Result, WrapErr};
use tracing::{info, warn};

use crate::abi::{self, CallContext};
use crate::rpc_pool::{EndpointPool, EvmEndpoint};

/// A fully resolved call, built fresh per event.
#[derive(Debug, Clone)]
pub struct CallPlan {
    pub to: Address,
    pub function: Function,
    pub args: Vec<DynSolValue>,
    pub calldata: Bytes,
    pub gas_limit: u64,
}

impl CallPlan {
    pub fn build(
        to: Address,
        function: &Function,
        ctx: &CallContext,
        gas_limit: u64,
    ) -> Result<Self> {
        let args = abi::build_args(function, ctx)?;
        let calldata = Bytes::from(abi::encode_call(function, &args)?);
        Ok(Self {
            to,
            function: function.clone(),
            args,
            calldata,
            gas_limit,
        })
    }

    /// `name(type,type,…)` for logs.
    pub fn signature(&self) -> String {
        self.function.signature()
    }
}

/// Classification of a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxErrorClass {
    /// The destination already consumed this nonce
    AlreadyProcessed,
    /// The contract is paused; the on-chain guard rejected the call
    Paused,
    /// Anything else: worth another attempt
    Retryable,
}

/// Classify a failure message against the on-chain guard reasons.
pub fn classify_tx_error(message: &str) -> TxErrorClass {
    let lower = message.to_lowercase();

    if lower.contains("already processed")
        || lower.contains("already-processed")
        || lower.contains("already executed")
        || lower.contains("already known")
    {
        return TxErrorClass::AlreadyProcessed;
    }

    if lower.contains("paused") {
        return TxErrorClass::Paused;
    }

    TxErrorClass::Retryable
}

/// Result of one execution pipeline run for one event.
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// Dry-run mode: the call was logged, nothing was sent
    DryRun,
    Executed {
        tx_hash: String,
        block_number: u64,
        endpoint: usize,
    },
    /// Read-only simulation failed; no transaction was submitted and no
    /// retry budget was consumed
    SimulationRevert(String),
    /// On-chain guard revert; abandoned without further retries
    NonRetryable {
        class: TxErrorClass,
        message: String,
    },
    /// Retry budget exhausted; the event stays unprocessed
    Exhausted(String),
}

pub struct Executor {
    signer: PrivateKeySigner,
    max_retries: u32,
    retry_delay: Duration,
    dry_run: bool,
}

impl Executor {
    pub fn new(private_key: &str, max_retries: u32, retry_delay_ms: u64, dry_run: bool) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.parse().wrap_err("Invalid private key")?;
        Ok(Self {
            signer,
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
            dry_run,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Run the full pipeline for one plan: dry-run gate, simulation,
    /// retried submit + confirm.
    pub async fn execute(
        &self,
        pool: &mut EndpointPool<EvmEndpoint>,
        plan: &CallPlan,
    ) -> ExecOutcome {
        if self.dry_run {
            info!(
                chain = pool.label(),
                call = %plan.signature(),
                to = %plan.to,
                gas_limit = plan.gas_limit,
                "Dry run: would submit"
            );
            return ExecOutcome::DryRun;
        }

        if let Err(message) = self.simulate(pool, plan).await {
            // Revert reason verbatim; the guard reasons short-circuit here
            // just as they would on submission.
            return match classify_tx_error(&message) {
                TxErrorClass::Retryable => ExecOutcome::SimulationRevert(message),
                class => ExecOutcome::NonRetryable { class, message },
            };
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.submit_and_confirm(pool, plan).await {
                Ok((tx_hash, block_number, endpoint)) => {
                    return ExecOutcome::Executed {
                        tx_hash,
                        block_number,
                        endpoint,
                    };
                }
                Err(message) => {
                    let class = classify_tx_error(&message);
                    if class != TxErrorClass::Retryable {
                        return ExecOutcome::NonRetryable { class, message };
                    }
                    warn!(
                        chain = pool.label(),
                        call = %plan.signature(),
                        attempt,
                        max = self.max_retries,
                        error = %message,
                        "Submission failed"
                    );
                    last_error = message;
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        ExecOutcome::Exhausted(last_error)
    }

    /// Read-only `eth_call` with the resolved arguments and the relayer as
    /// caller, so sender-sensitive guards behave as they will on submission.
    async fn simulate(
        &self,
        pool: &mut EndpointPool<EvmEndpoint>,
        plan: &CallPlan,
    ) -> Result<(), String> {
        let mut tx = TransactionRequest::default()
            .with_to(plan.to)
            .with_input(plan.calldata.clone());
        tx.from = Some(self.signer.address());

        pool.try_call(|endpoint, _| {
            let tx = tx.clone();
            async move { Ok(endpoint.provider.call(&tx).await?) }
        })
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
    }

    async fn submit_and_confirm(
        &self,
        pool: &mut EndpointPool<EvmEndpoint>,
        plan: &CallPlan,
    ) -> Result<(String, u64, usize), String> {
        let signer = self.signer.clone();
        let to = plan.to;
        let calldata = plan.calldata.clone();
        let gas_limit = plan.gas_limit;

        let ((tx_hash, block_number), endpoint) = pool
            .try_call(move |endpoint, _| {
                let signer = signer.clone();
                let calldata = calldata.clone();
                async move {
                    let wallet = EthereumWallet::from(signer);
                    let provider = ProviderBuilder::new()
                        .with_recommended_fillers()
                        .wallet(wallet)
                        .on_http(endpoint.url.parse().wrap_err("Invalid RPC URL")?);

                    let tx = TransactionRequest::default()
                        .with_to(to)
                        .with_input(calldata)
                        .with_gas_limit(gas_limit);

                    let pending = provider
                        .send_transaction(tx)
                        .await
                        .wrap_err("Failed to send transaction")?;
                    let tx_hash = *pending.tx_hash();
                    info!(tx_hash = %tx_hash, "Transaction sent, waiting for inclusion");

                    let receipt = pending
                        .get_receipt()
                        .await
                        .wrap_err("Failed to get receipt")?;
                    if !receipt.status() {
                        return Err(eyre::eyre!("transaction {tx_hash:#x} reverted on-chain"));
                    }

                    Ok((
                        format!("{tx_hash:#x}"),
                        receipt.block_number.unwrap_or_default(),
                    ))
                }
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok((tx_hash, block_number, endpoint))
    }
}
