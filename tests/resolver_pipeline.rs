//! End-to-end coverage of the resolution pipeline against realistic
//! deployment artifacts, plus restart/idempotency behavior that spans
//! modules: resolution, plan building, the skip-cache guard, and state
//! persistence.

use aegis_relayer::abi::{
    self, CallContext, ContractAbi, LOCK_EVENT_ACTION_KEYWORDS, LOCK_EVENT_KEYWORDS,
    MINT_ACTION_KEYWORDS, MINT_FUNCTION_KEYWORDS, RETURN_EVENT_KEYWORDS,
    UNLOCK_ACTION_KEYWORDS, UNLOCK_FUNCTION_KEYWORDS,
};
use aegis_relayer::executor::CallPlan;
use aegis_relayer::guard;
use aegis_relayer::scanner::scan_window;
use aegis_relayer::state::{RelayerState, StateStore};
use alloy::primitives::{address, U256};

/// A SourceBridge deployment artifact: locks tokens, unlocks on return.
const SOURCE_BRIDGE_ARTIFACT: &str = r#"{
  "contractName": "SourceBridge",
  "abi": [
    {"type":"constructor","stateMutability":"nonpayable","inputs":[{"name":"token","type":"address"}]},
    {"type":"event","name":"Locked","inputs":[
        {"name":"user","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false},
        {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
    {"type":"event","name":"Unlocked","inputs":[
        {"name":"user","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false},
        {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
    {"type":"function","name":"lock","stateMutability":"nonpayable","inputs":[
        {"name":"amount","type":"uint256"}],"outputs":[]},
    {"type":"function","name":"unlockFromBurn","stateMutability":"nonpayable","inputs":[
        {"name":"to","type":"address"},
        {"name":"amount","type":"uint256"},
        {"name":"nonce","type":"uint256"}],"outputs":[]},
    {"type":"function","name":"processedNonces","stateMutability":"view","inputs":[
        {"name":"nonce","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"pause","stateMutability":"nonpayable","inputs":[],"outputs":[]}
  ]
}"#;

/// A TargetBridge deployment artifact with V2-style naming: mints wrapped
/// tokens on arrival, emits ReturnRequested on burn.
const TARGET_BRIDGE_ARTIFACT: &str = r#"{
  "contractName": "TargetBridge",
  "abi": [
    {"type":"event","name":"Minted","inputs":[
        {"name":"to","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false},
        {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
    {"type":"event","name":"ReturnRequested","inputs":[
        {"name":"user","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false},
        {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
    {"type":"function","name":"mintFromSource","stateMutability":"nonpayable","inputs":[
        {"name":"to","type":"address"},
        {"name":"amount","type":"uint256"},
        {"name":"nonce","type":"uint256"},
        {"name":"srcChainId","type":"uint256"}],"outputs":[]},
    {"type":"function","name":"requestReturn","stateMutability":"nonpayable","inputs":[
        {"name":"amount","type":"uint256"}],"outputs":[]},
    {"type":"function","name":"processedNonces","stateMutability":"view","inputs":[
        {"name":"nonce","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
  ]
}"#;

fn ctx() -> CallContext {
    CallContext {
        recipient: address!("00000000000000000000000000000000000000aa"),
        amount: U256::from(100u64),
        nonce: U256::from(1u64),
        source_chain_id: 11155111,
        target_chain_id: 80002,
    }
}

#[test]
fn resolves_both_directions_from_artifacts() {
    let source = ContractAbi::from_json_str(SOURCE_BRIDGE_ARTIFACT).unwrap();
    let target = ContractAbi::from_json_str(TARGET_BRIDGE_ARTIFACT).unwrap();

    let lock_event = abi::pick_event(
        &source,
        None,
        LOCK_EVENT_KEYWORDS,
        RETURN_EVENT_KEYWORDS,
        LOCK_EVENT_ACTION_KEYWORDS,
        "lock",
    )
    .unwrap();
    assert_eq!(lock_event.signature(), "Locked(address,uint256,uint256)");

    let return_event = abi::pick_event(
        &target,
        None,
        RETURN_EVENT_KEYWORDS,
        &[],
        RETURN_EVENT_KEYWORDS,
        "return",
    )
    .unwrap();
    assert_eq!(return_event.name, "ReturnRequested");

    let mint = abi::pick_function(
        &target,
        None,
        MINT_FUNCTION_KEYWORDS,
        MINT_ACTION_KEYWORDS,
        3,
        "mint",
    )
    .unwrap();
    assert_eq!(mint.name, "mintFromSource");

    let unlock = abi::pick_function(
        &source,
        None,
        UNLOCK_FUNCTION_KEYWORDS,
        UNLOCK_ACTION_KEYWORDS,
        2,
        "unlock",
    )
    .unwrap();
    assert_eq!(unlock.name, "unlockFromBurn");

    // Both contracts expose the idempotency view.
    assert!(source.processed_nonces_view().is_some());
    assert!(target.processed_nonces_view().is_some());
}

#[test]
fn mint_plan_carries_source_chain_id_in_fourth_slot() {
    let target = ContractAbi::from_json_str(TARGET_BRIDGE_ARTIFACT).unwrap();
    let mint = target.function_by_name("mintFromSource").unwrap();

    let plan = CallPlan::build(
        address!("00000000000000000000000000000000000000bb"),
        mint,
        &ctx(),
        300_000,
    )
    .unwrap();

    // selector + (to, amount, nonce, srcChainId)
    assert_eq!(plan.calldata.len(), 4 + 4 * 32);
    let src_word = &plan.calldata[4 + 3 * 32..];
    assert_eq!(U256::from_be_slice(src_word), U256::from(11155111u64));
}

#[test]
fn forced_override_absent_from_abi_fails_resolution() {
    // Scenario: RELAYER_MINT_FUNCTION names a function the deployment
    // does not have, so startup must fail before the poll loop.
    let target = ContractAbi::from_json_str(TARGET_BRIDGE_ARTIFACT).unwrap();
    let err = abi::pick_function(
        &target,
        Some("mintV3"),
        MINT_FUNCTION_KEYWORDS,
        MINT_ACTION_KEYWORDS,
        3,
        "mint",
    )
    .unwrap_err();
    assert!(err.to_string().contains("mintV3"));
}

#[test]
fn redelivered_nonce_short_circuits_after_restart() {
    // Scenario: nonce 1 relayed once, state persisted, process restarts and
    // re-scans the same range. The skip cache must stop it locally.
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("relayer_state.json"));

    let mut state = RelayerState::with_overrides(50, 0);
    state
        .forward
        .mark_skipped("1".to_string(), "already processed (relayed)".to_string());
    store.save(&state).unwrap();

    let reloaded = store.load(false, RelayerState::with_overrides(0, 0));
    assert_eq!(
        guard::check_local(&reloaded.forward, &U256::from(1u64)),
        Some("already processed (relayed)".to_string())
    );
    assert_eq!(guard::check_local(&reloaded.forward, &U256::from(2u64)), None);
}

#[test]
fn chunked_windows_walk_the_backlog_in_bounded_steps() {
    // Scenario: maxRange=10, cursor at 100, safe head 205. The cursor needs
    // multiple ticks to reach the head, advancing by at most maxRange each.
    let mut next_block = 100u64;
    let safe_latest = 205u64;
    let mut ticks = 0;

    while let Some(window) = scan_window(next_block, safe_latest, 10) {
        assert!(window.to_block <= safe_latest);
        assert!(window.span() <= 10);
        assert!(window.from_block == next_block);
        next_block = window.to_block + 1;
        ticks += 1;
        assert!(ticks < 100, "window walk must terminate");
    }

    assert_eq!(next_block, 206);
    assert_eq!(ticks, 11);
}
