//! AegisBridge bidirectional relayer
//!
//! Watches each side of a two-chain asset bridge for its canonical transfer
//! event and reproduces the effect on the other side, with crash-safe cursor
//! persistence, nonce idempotency, multi-endpoint RPC fallback, and
//! heuristic ABI resolution across deployments with varying names.

pub mod abi;
pub mod config;
pub mod executor;
pub mod guard;
pub mod metrics;
pub mod relay;
pub mod rpc_pool;
pub mod scanner;
pub mod server;
pub mod state;
