//! ABI introspection and heuristic call/event resolution
//!
//! Bridge deployments differ in the exact names of their mint/unlock entry
//! points and return events, so nothing here is compiled in via `sol!`.
//! Instead the contract ABI is loaded from its deployment artifact at startup
//! and the best-matching function/event is selected by a deterministic score
//! over the declared parameter shapes. An explicit name override bypasses
//! scoring but must exist in the ABI, otherwise startup fails.

use std::fs;

use alloy::dyn_abi::{DynSolType, DynSolValue, EventExt, JsonAbiExt, Specifier};
use alloy::json_abi::{AbiItem, Event, Function, StateMutability};
use alloy::primitives::{Address, LogData, B256, U256};
use eyre::{eyre, Result, WrapErr};

/// Name fragments marking a source-side "transfer locked" event.
pub const LOCK_EVENT_KEYWORDS: &[&str] = &["lock", "deposit", "initiat", "bridge"];
/// Narrower action fragments for the lock-event score bonus.
pub const LOCK_EVENT_ACTION_KEYWORDS: &[&str] = &["lock", "deposit"];
/// Name fragments marking a target-side return/burn event.
pub const RETURN_EVENT_KEYWORDS: &[&str] = &["return", "burn", "withdraw", "redeem", "unlock"];
/// Name fragments for the forward-direction execution function.
pub const MINT_FUNCTION_KEYWORDS: &[&str] = &["mint", "release", "finalize", "claim", "bridge"];
/// Primary action fragments for the forward score bonus.
pub const MINT_ACTION_KEYWORDS: &[&str] = &["mint"];
/// Name fragments for the reverse-direction execution function.
pub const UNLOCK_FUNCTION_KEYWORDS: &[&str] =
    &["unlock", "release", "finalize", "withdraw", "redeem"];
/// Primary action fragments for the reverse score bonus.
pub const UNLOCK_ACTION_KEYWORDS: &[&str] = &["unlock", "release"];

/// A contract ABI preserving declaration order.
///
/// `JsonAbi` stores entries in name-sorted maps; scoring ties here are broken
/// by declaration order, so the raw item list is kept instead.
pub struct ContractAbi {
    items: Vec<AbiItem<'static>>,
}

impl ContractAbi {
    /// Parse either a Hardhat-style artifact (object with an `"abi"` field)
    /// or a bare ABI array.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).wrap_err("ABI document is not valid JSON")?;
        let abi_value = match value {
            serde_json::Value::Object(mut obj) => obj
                .remove("abi")
                .ok_or_else(|| eyre!("ABI artifact object has no \"abi\" field"))?,
            arr @ serde_json::Value::Array(_) => arr,
            _ => return Err(eyre!("ABI document must be an artifact object or an array")),
        };
        let items: Vec<AbiItem<'static>> =
            serde_json::from_value(abi_value).wrap_err("Failed to parse ABI entries")?;
        Ok(Self { items })
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read ABI file {path}"))?;
        Self::from_json_str(&raw).wrap_err_with(|| format!("Failed to parse ABI file {path}"))
    }

    /// Events in declaration order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.items.iter().filter_map(|item| match item {
            AbiItem::Event(event) => Some(event.as_ref()),
            _ => None,
        })
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            AbiItem::Function(function) => Some(function.as_ref()),
            _ => None,
        })
    }

    pub fn event_by_name(&self, name: &str) -> Option<&Event> {
        self.events().find(|e| e.name == name)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions().find(|f| f.name == name)
    }

    /// Whether the contract exposes a `processedNonces(uint)`-style view.
    pub fn processed_nonces_view(&self) -> Option<&Function> {
        self.function_by_name("processedNonces").filter(|f| {
            matches!(
                f.state_mutability,
                StateMutability::View | StateMutability::Pure
            ) && f.inputs.len() == 1
                && f.inputs[0].ty.starts_with("uint")
        })
    }
}

fn name_matches(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn count_address_params(types: &[&str]) -> usize {
    types.iter().filter(|&&t| t == "address").count()
}

fn count_uint_params(types: &[&str]) -> usize {
    types.iter().filter(|&&t| t.starts_with("uint")).count()
}

/// Score an event candidate against the expected transfer-event shape.
fn score_event(event: &Event, action_keywords: &[&str]) -> i32 {
    let types: Vec<&str> = event.inputs.iter().map(|p| p.ty.as_str()).collect();
    let mut score = 0;
    if count_address_params(&types) >= 1 {
        score += 3;
    }
    if count_uint_params(&types) >= 2 {
        score += 3;
    }
    if name_matches(&event.name, action_keywords) {
        score += 2;
    }
    score
}

/// Score a function candidate against the expected execution-call shape.
fn score_function(function: &Function, action_keywords: &[&str]) -> i32 {
    let types: Vec<&str> = function.inputs.iter().map(|p| p.ty.as_str()).collect();
    let mut score = 0;
    if count_address_params(&types) >= 1 {
        score += 2;
    }
    if count_uint_params(&types) >= 2 {
        score += 2;
    }
    if name_matches(&function.name, action_keywords) {
        score += 2;
    }
    // Penalize complex byte-blob encodings (also catches bytes32 payloads)
    if types.iter().any(|t| t.starts_with("bytes")) {
        score -= 1;
    }
    score
}

/// Keep-first on ties: candidates arrive in declaration order.
fn best_by_score<T>(candidates: Vec<T>, score: impl Fn(&T) -> i32) -> Option<T> {
    let mut best: Option<(i32, T)> = None;
    for candidate in candidates {
        let s = score(&candidate);
        match &best {
            Some((best_score, _)) if *best_score >= s => {}
            _ => best = Some((s, candidate)),
        }
    }
    best.map(|(_, c)| c)
}

/// Select the event to watch on one side of the bridge.
///
/// `exclude` filters out opposite-direction names (an `Unlocked` event must
/// not be claimed by the lock-side keyword "lock").
pub fn pick_event(
    abi: &ContractAbi,
    forced_name: Option<&str>,
    intent_keywords: &[&str],
    exclude_keywords: &[&str],
    action_keywords: &[&str],
    what: &str,
) -> Result<Event> {
    if let Some(name) = forced_name {
        return abi
            .event_by_name(name)
            .cloned()
            .ok_or_else(|| eyre!("Forced {what} event {name:?} not found in ABI"));
    }

    let candidates: Vec<&Event> = abi
        .events()
        .filter(|e| name_matches(&e.name, intent_keywords))
        .filter(|e| !name_matches(&e.name, exclude_keywords))
        .collect();

    best_by_score(candidates, |e| score_event(e, action_keywords))
        .cloned()
        .ok_or_else(|| eyre!("Could not auto-detect {what} event; set the override"))
}

/// Select the state-changing function to execute on one side of the bridge.
///
/// Auto-detected candidates are ranked by score and the first one whose
/// parameter list the argument builder supports wins; a forced name skips the
/// filters but must still exist and be buildable.
pub fn pick_function(
    abi: &ContractAbi,
    forced_name: Option<&str>,
    intent_keywords: &[&str],
    action_keywords: &[&str],
    min_inputs: usize,
    what: &str,
) -> Result<Function> {
    let probe = CallContext::probe();

    if let Some(name) = forced_name {
        let function = abi
            .function_by_name(name)
            .ok_or_else(|| eyre!("Forced {what} function {name:?} not found in ABI"))?;
        build_args(function, &probe)
            .wrap_err_with(|| format!("Forced {what} function {name:?} is not callable"))?;
        return Ok(function.clone());
    }

    let mut candidates: Vec<&Function> = abi
        .functions()
        .filter(|f| {
            !matches!(
                f.state_mutability,
                StateMutability::View | StateMutability::Pure
            )
        })
        .filter(|f| name_matches(&f.name, intent_keywords))
        .filter(|f| f.inputs.len() >= min_inputs)
        .collect();

    // Stable sort keeps declaration order within equal scores.
    candidates.sort_by_key(|f| std::cmp::Reverse(score_function(f, action_keywords)));

    for candidate in candidates {
        if build_args(candidate, &probe).is_ok() {
            return Ok(candidate.clone());
        }
    }

    Err(eyre!("Could not auto-detect {what} function; set the override"))
}

/// Role-to-value mapping consumed by the argument builder.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub recipient: Address,
    pub amount: U256,
    pub nonce: U256,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
}

impl CallContext {
    /// Placeholder context used to probe whether a candidate's parameter
    /// list is expressible at all; values are irrelevant.
    fn probe() -> Self {
        Self {
            recipient: Address::ZERO,
            amount: U256::ZERO,
            nonce: U256::ZERO,
            source_chain_id: 0,
            target_chain_id: 0,
        }
    }
}

/// Assign a role to an integer parameter past amount and nonce, keyed on the
/// declared parameter name.
fn integer_role(param_name: &str, ctx: &CallContext) -> U256 {
    let name = param_name.to_lowercase();
    if name.contains("src") || name.contains("source") || name.contains("from") {
        U256::from(ctx.source_chain_id)
    } else if name.contains("dst")
        || name.contains("target")
        || name.contains("to")
        || name.contains("chain")
    {
        U256::from(ctx.target_chain_id)
    } else {
        U256::ZERO
    }
}

/// Build the ordered argument list for `function` from the role mapping.
///
/// Address parameters receive the recipient; integer parameters receive
/// amount, then nonce, then name-directed chain identities; `bytes32` the
/// zero hash, `bytes` an empty blob, `bool` true. Anything else rejects the
/// candidate.
pub fn build_args(function: &Function, ctx: &CallContext) -> Result<Vec<DynSolValue>> {
    let mut args = Vec::with_capacity(function.inputs.len());
    let mut used_ints = 0usize;

    for param in &function.inputs {
        let ty = param
            .resolve()
            .wrap_err_with(|| format!("Unresolvable parameter type {:?}", param.ty))?;
        let value = match ty {
            DynSolType::Address => DynSolValue::Address(ctx.recipient),
            DynSolType::Uint(bits) => {
                let v = match used_ints {
                    0 => ctx.amount,
                    1 => ctx.nonce,
                    _ => integer_role(&param.name, ctx),
                };
                used_ints += 1;
                DynSolValue::Uint(v, bits)
            }
            DynSolType::FixedBytes(size) if size == 32 => {
                DynSolValue::FixedBytes(B256::ZERO, 32)
            }
            DynSolType::Bytes => DynSolValue::Bytes(Vec::new()),
            DynSolType::Bool => DynSolValue::Bool(true),
            other => {
                return Err(eyre!(
                    "Unsupported parameter type {other} for {}",
                    function.name
                ))
            }
        };
        args.push(value);
    }

    Ok(args)
}

/// Full calldata (selector + encoded arguments) for a resolved call.
pub fn encode_call(function: &Function, args: &[DynSolValue]) -> Result<Vec<u8>> {
    function
        .abi_encode_input(args)
        .wrap_err_with(|| format!("Failed to encode call to {}", function.name))
}

/// topic0 for a resolved event (keccak-256 of its canonical signature).
pub fn event_topic0(event: &Event) -> B256 {
    event.selector()
}

/// Transfer fields decoded from a matched log.
#[derive(Debug, Clone)]
pub struct DecodedTransfer {
    pub actor: Address,
    pub amount: U256,
    pub nonce: U256,
}

/// Decode a log against `event` and extract the transfer roles: the first
/// address-typed value is the actor, the first two integer values are amount
/// and nonce, walking parameters in declaration order.
pub fn decode_transfer(event: &Event, data: &LogData) -> Result<DecodedTransfer> {
    let decoded = event
        .decode_log(data, true)
        .wrap_err_with(|| format!("Failed to decode {} log", event.name))?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut ordered = Vec::with_capacity(event.inputs.len());
    for input in &event.inputs {
        let value = if input.indexed {
            indexed.next()
        } else {
            body.next()
        };
        ordered.push(value.ok_or_else(|| eyre!("Decoded {} log is missing values", event.name))?);
    }

    let mut actor = None;
    let mut uints = Vec::new();
    for value in ordered {
        match value {
            DynSolValue::Address(a) if actor.is_none() => actor = Some(a),
            DynSolValue::Uint(v, _) => uints.push(v),
            _ => {}
        }
    }

    match (actor, uints.first(), uints.get(1)) {
        (Some(actor), Some(&amount), Some(&nonce)) => Ok(DecodedTransfer {
            actor,
            amount,
            nonce,
        }),
        _ => Err(eyre!(
            "{} log does not carry an address and two integers",
            event.name
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    const TARGET_ABI: &str = r#"[
        {"type":"event","name":"Minted","inputs":[
            {"name":"to","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false},
            {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
        {"type":"event","name":"ReturnRequested","inputs":[
            {"name":"user","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false},
            {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
        {"type":"event","name":"Paused","inputs":[
            {"name":"account","type":"address","indexed":false}],"anonymous":false},
        {"type":"function","name":"mintFromSource","stateMutability":"nonpayable","inputs":[
            {"name":"to","type":"address"},
            {"name":"amount","type":"uint256"},
            {"name":"nonce","type":"uint256"}],"outputs":[]},
        {"type":"function","name":"claimWithProof","stateMutability":"nonpayable","inputs":[
            {"name":"to","type":"address"},
            {"name":"amount","type":"uint256"},
            {"name":"nonce","type":"uint256"},
            {"name":"proof","type":"bytes"}],"outputs":[]},
        {"type":"function","name":"mintPreview","stateMutability":"view","inputs":[
            {"name":"to","type":"address"},
            {"name":"amount","type":"uint256"},
            {"name":"nonce","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"processedNonces","stateMutability":"view","inputs":[
            {"name":"nonce","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
    ]"#;

    const SOURCE_ABI: &str = r#"[
        {"type":"event","name":"Unlocked","inputs":[
            {"name":"user","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false},
            {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
        {"type":"event","name":"Locked","inputs":[
            {"name":"user","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false},
            {"name":"nonce","type":"uint256","indexed":false}],"anonymous":false},
        {"type":"function","name":"unlockFromBurn","stateMutability":"nonpayable","inputs":[
            {"name":"to","type":"address"},
            {"name":"amount","type":"uint256"},
            {"name":"nonce","type":"uint256"}],"outputs":[]}
    ]"#;

    fn ctx() -> CallContext {
        CallContext {
            recipient: address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            amount: U256::from(100u64),
            nonce: U256::from(1u64),
            source_chain_id: 11155111,
            target_chain_id: 80002,
        }
    }

    #[test]
    fn parses_artifact_object_and_bare_array() {
        let artifact = format!(r#"{{"contractName":"TargetBridge","abi":{TARGET_ABI}}}"#);
        let from_artifact = ContractAbi::from_json_str(&artifact).unwrap();
        let from_array = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        assert_eq!(from_artifact.events().count(), from_array.events().count());
        assert!(from_array.event_by_name("ReturnRequested").is_some());
    }

    #[test]
    fn picks_return_event_by_score() {
        let abi = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        let event = pick_event(
            &abi,
            None,
            RETURN_EVENT_KEYWORDS,
            &[],
            RETURN_EVENT_KEYWORDS,
            "return",
        )
        .unwrap();
        assert_eq!(event.name, "ReturnRequested");
    }

    #[test]
    fn picks_lock_event_without_claiming_unlocked() {
        let abi = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        let event = pick_event(
            &abi,
            None,
            LOCK_EVENT_KEYWORDS,
            RETURN_EVENT_KEYWORDS,
            LOCK_EVENT_ACTION_KEYWORDS,
            "lock",
        )
        .unwrap();
        assert_eq!(event.name, "Locked");
    }

    #[test]
    fn forced_event_must_exist() {
        let abi = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        let err = pick_event(
            &abi,
            Some("TransferFinalized"),
            RETURN_EVENT_KEYWORDS,
            &[],
            RETURN_EVENT_KEYWORDS,
            "return",
        )
        .unwrap_err();
        assert!(err.to_string().contains("TransferFinalized"));
    }

    #[test]
    fn picks_mint_function_and_skips_views() {
        let abi = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        let function = pick_function(
            &abi,
            None,
            MINT_FUNCTION_KEYWORDS,
            MINT_ACTION_KEYWORDS,
            3,
            "mint",
        )
        .unwrap();
        // mintFromSource: +2 addr, +2 uints, +2 "mint" = 6.
        // claimWithProof: +2 addr, +2 uints, -1 bytes = 3. mintPreview is a view.
        assert_eq!(function.name, "mintFromSource");
    }

    #[test]
    fn byte_blob_parameter_penalized_but_buildable() {
        let abi = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        let function = abi.function_by_name("claimWithProof").unwrap();
        assert_eq!(score_function(function, MINT_ACTION_KEYWORDS), 3);
        let args = build_args(function, &ctx()).unwrap();
        assert_eq!(args.len(), 4);
        assert_eq!(args[3], DynSolValue::Bytes(Vec::new()));
    }

    #[test]
    fn forced_function_must_exist() {
        let abi = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        let err = pick_function(
            &abi,
            Some("bridgeMintV9"),
            MINT_FUNCTION_KEYWORDS,
            MINT_ACTION_KEYWORDS,
            3,
            "mint",
        )
        .unwrap_err();
        assert!(err.to_string().contains("bridgeMintV9"));
    }

    #[test]
    fn tie_keeps_declaration_order() {
        let abi = ContractAbi::from_json_str(
            r#"[
            {"type":"function","name":"releaseA","stateMutability":"nonpayable","inputs":[
                {"name":"to","type":"address"},{"name":"amount","type":"uint256"},{"name":"nonce","type":"uint256"}],"outputs":[]},
            {"type":"function","name":"releaseB","stateMutability":"nonpayable","inputs":[
                {"name":"to","type":"address"},{"name":"amount","type":"uint256"},{"name":"nonce","type":"uint256"}],"outputs":[]}
        ]"#,
        )
        .unwrap();
        let function = pick_function(
            &abi,
            None,
            UNLOCK_FUNCTION_KEYWORDS,
            UNLOCK_ACTION_KEYWORDS,
            2,
            "unlock",
        )
        .unwrap();
        assert_eq!(function.name, "releaseA");
    }

    #[test]
    fn unsupported_parameter_rejects_candidate_and_falls_through() {
        let abi = ContractAbi::from_json_str(
            r#"[
            {"type":"function","name":"releaseBatch","stateMutability":"nonpayable","inputs":[
                {"name":"to","type":"address"},
                {"name":"amounts","type":"uint256[]"},
                {"name":"nonce","type":"uint256"}],"outputs":[]},
            {"type":"function","name":"releaseOne","stateMutability":"nonpayable","inputs":[
                {"name":"to","type":"address"},
                {"name":"amount","type":"uint256"},
                {"name":"nonce","type":"uint256"}],"outputs":[]}
        ]"#,
        )
        .unwrap();
        // releaseBatch scores the same but its array parameter is not
        // expressible, so resolution falls through to releaseOne.
        let function = pick_function(
            &abi,
            None,
            UNLOCK_FUNCTION_KEYWORDS,
            UNLOCK_ACTION_KEYWORDS,
            2,
            "unlock",
        )
        .unwrap();
        assert_eq!(function.name, "releaseOne");
    }

    #[test]
    fn builds_role_mapped_arguments() {
        let abi = ContractAbi::from_json_str(
            r#"[
            {"type":"function","name":"finalizeBridge","stateMutability":"nonpayable","inputs":[
                {"name":"recipient","type":"address"},
                {"name":"amount","type":"uint256"},
                {"name":"nonce","type":"uint256"},
                {"name":"srcChain","type":"uint64"},
                {"name":"dstChain","type":"uint64"},
                {"name":"extra","type":"uint256"},
                {"name":"root","type":"bytes32"},
                {"name":"data","type":"bytes"},
                {"name":"strict","type":"bool"}],"outputs":[]}
        ]"#,
        )
        .unwrap();
        let function = abi.function_by_name("finalizeBridge").unwrap();
        let args = build_args(function, &ctx()).unwrap();
        assert_eq!(args[0], DynSolValue::Address(ctx().recipient));
        assert_eq!(args[1], DynSolValue::Uint(U256::from(100u64), 256));
        assert_eq!(args[2], DynSolValue::Uint(U256::from(1u64), 256));
        assert_eq!(args[3], DynSolValue::Uint(U256::from(11155111u64), 64));
        assert_eq!(args[4], DynSolValue::Uint(U256::from(80002u64), 64));
        assert_eq!(args[5], DynSolValue::Uint(U256::ZERO, 256));
        assert_eq!(args[6], DynSolValue::FixedBytes(B256::ZERO, 32));
        assert_eq!(args[7], DynSolValue::Bytes(Vec::new()));
        assert_eq!(args[8], DynSolValue::Bool(true));
    }

    #[test]
    fn encode_call_prefixes_selector() {
        let abi = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        let function = abi.function_by_name("unlockFromBurn").unwrap();
        let args = build_args(function, &ctx()).unwrap();
        let calldata = encode_call(function, &args).unwrap();
        assert_eq!(&calldata[..4], function.selector().as_slice());
        // selector + 3 words
        assert_eq!(calldata.len(), 4 + 3 * 32);
    }

    #[test]
    fn decodes_transfer_from_log_data() {
        let abi = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        let event = abi.event_by_name("Locked").unwrap();
        let user = address!("00000000000000000000000000000000000000aa");

        let mut user_topic = [0u8; 32];
        user_topic[12..].copy_from_slice(user.as_slice());
        let mut body = [0u8; 64];
        body[..32].copy_from_slice(&U256::from(100u64).to_be_bytes::<32>());
        body[32..].copy_from_slice(&U256::from(7u64).to_be_bytes::<32>());

        let data = LogData::new_unchecked(
            vec![event_topic0(event), B256::from(user_topic)],
            Bytes::copy_from_slice(&body),
        );

        let transfer = decode_transfer(event, &data).unwrap();
        assert_eq!(transfer.actor, user);
        assert_eq!(transfer.amount, U256::from(100u64));
        assert_eq!(transfer.nonce, U256::from(7u64));
    }

    #[test]
    fn undecodable_log_is_an_error() {
        let abi = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        let event = abi.event_by_name("Locked").unwrap();
        // Wrong topic0 and truncated body.
        let data = LogData::new_unchecked(vec![B256::ZERO], Bytes::from(vec![0u8; 7]));
        assert!(decode_transfer(event, &data).is_err());
    }

    #[test]
    fn detects_processed_nonces_view() {
        let target = ContractAbi::from_json_str(TARGET_ABI).unwrap();
        assert!(target.processed_nonces_view().is_some());
        let source = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        assert!(source.processed_nonces_view().is_none());
    }

    #[test]
    fn event_topic0_is_signature_hash() {
        let abi = ContractAbi::from_json_str(SOURCE_ABI).unwrap();
        let event = abi.event_by_name("Locked").unwrap();
        assert_eq!(
            event_topic0(event),
            alloy::primitives::keccak256(b"Locked(address,uint256,uint256)")
        );
    }
}
