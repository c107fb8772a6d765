//! Two-phase idempotency guard
//!
//! Cheapest check first: a local skip-cache hit costs nothing; otherwise, if
//! the destination contract exposes a `processedNonces(uint)` view, one
//! `eth_call` settles it. Contracts without the view pass through, and the
//! executor's simulate-then-submit path catches duplicates via the on-chain
//! revert.

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::Function;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use eyre::{eyre, Result};
use tracing::{debug, warn};

use crate::rpc_pool::{EndpointPool, EvmEndpoint};
use crate::state::DirectionState;

/// Outcome of the guard for one nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Skip(String),
}

/// Phase (a): local skip cache only, no network.
pub fn check_local(direction: &DirectionState, nonce: &U256) -> Option<String> {
    direction.skip_reason(&nonce.to_string()).cloned()
}

/// Both phases. A remote `true` marks the skip cache so the next delivery of
/// the same nonce never reaches the network again. A failing view call is
/// logged and treated as "unknown"; execution still simulates first.
pub async fn check_nonce(
    direction: &mut DirectionState,
    pool: &mut EndpointPool<EvmEndpoint>,
    contract: Address,
    processed_view: Option<&Function>,
    nonce: U256,
) -> GuardDecision {
    if let Some(reason) = check_local(direction, &nonce) {
        debug!(nonce = %nonce, reason = %reason, "Skipping nonce (cached)");
        return GuardDecision::Skip(reason);
    }

    let Some(view) = processed_view else {
        return GuardDecision::Proceed;
    };

    match query_processed(pool, contract, view, nonce).await {
        Ok(true) => {
            let reason = "already processed (destination view)".to_string();
            direction.mark_skipped(nonce.to_string(), reason.clone());
            GuardDecision::Skip(reason)
        }
        Ok(false) => GuardDecision::Proceed,
        Err(e) => {
            warn!(
                nonce = %nonce,
                error = %e,
                "processedNonces check failed, deferring to simulation"
            );
            GuardDecision::Proceed
        }
    }
}

/// `processedNonces(nonce)` through the pool.
async fn query_processed(
    pool: &mut EndpointPool<EvmEndpoint>,
    contract: Address,
    view: &Function,
    nonce: U256,
) -> Result<bool> {
    let DynSolType::Uint(bits) = view.inputs[0].resolve()? else {
        return Err(eyre!("processedNonces parameter is not an integer"));
    };
    let calldata = view.abi_encode_input(&[DynSolValue::Uint(nonce, bits)])?;

    let tx = TransactionRequest::default()
        .with_to(contract)
        .with_input(Bytes::from(calldata));

    let (output, _) = pool
        .try_call(|endpoint, _| {
            let tx = tx.clone();
            async move { Ok(endpoint.provider.call(&tx).await?) }
        })
        .await?;

    let values = view.abi_decode_output(&output, true)?;
    match values.first() {
        Some(DynSolValue::Bool(processed)) => Ok(*processed),
        _ => Err(eyre!("processedNonces did not return a bool")),
    }
}
