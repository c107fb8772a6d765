//! Relayer configuration
//!
//! Loaded from environment variables (with optional .env file). All required
//! settings are validated before the poll loop starts; a bad configuration is
//! fatal and exits the process without touching persisted state.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Relay direction restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Bidir,
    Forward,
    Reverse,
}

impl Mode {
    pub fn runs_forward(&self) -> bool {
        matches!(self, Mode::Bidir | Mode::Forward)
    }

    pub fn runs_reverse(&self) -> bool {
        matches!(self, Mode::Bidir | Mode::Reverse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Bidir => "bidir",
            Mode::Forward => "forward",
            Mode::Reverse => "reverse",
        }
    }
}

impl FromStr for Mode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bidir" => Ok(Mode::Bidir),
            "forward" => Ok(Mode::Forward),
            "reverse" | "return" => Ok(Mode::Reverse),
            other => Err(eyre!("RELAYER_MODE must be bidir|forward|reverse, got {other:?}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-chain settings (the relayer is symmetric: one of these per side)
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Ordered RPC endpoints, primary first
    pub rpc_urls: Vec<String>,
    /// Expected chain identity; endpoints reporting anything else are evicted
    pub chain_id: u64,
    pub bridge_address: String,
    /// Path to the contract ABI (Hardhat artifact or bare ABI array)
    pub abi_path: String,
    /// Max blocks per log query (provider range limit)
    pub max_range: u64,
    /// Confirmation depth before a block is considered scannable
    pub confirmations: u64,
    /// Initial cursor override; 0 = auto (start at the current safe block)
    pub from_block: u64,
}

/// Relayer behavior settings
#[derive(Clone)]
pub struct RelayerConfig {
    pub mode: Mode,
    pub private_key: String,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub dry_run: bool,
    pub mint_gas_limit: u64,
    pub unlock_gas_limit: u64,
    pub state_file: String,
    pub reset_state: bool,
    pub catch_up: bool,
    pub lookback_blocks: u64,
    /// Forced overrides; unset = auto-detect from the ABI
    pub mint_function: Option<String>,
    pub unlock_function: Option<String>,
    pub lock_event: Option<String>,
    pub return_event: Option<String>,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("mode", &self.mode)
            .field("private_key", &"<redacted>")
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("dry_run", &self.dry_run)
            .field("mint_gas_limit", &self.mint_gas_limit)
            .field("unlock_gas_limit", &self.unlock_gas_limit)
            .field("state_file", &self.state_file)
            .field("reset_state", &self.reset_state)
            .field("catch_up", &self.catch_up)
            .field("lookback_blocks", &self.lookback_blocks)
            .field("mint_function", &self.mint_function)
            .field("unlock_function", &self.unlock_function)
            .field("lock_event", &self.lock_event)
            .field("return_event", &self.return_event)
            .finish()
    }
}

/// Health server settings
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub bind: String,
    pub port: u16,
}

/// Main configuration for the relayer
#[derive(Debug, Clone)]
pub struct Config {
    pub source: ChainConfig,
    pub target: ChainConfig,
    pub relayer: RelayerConfig,
    pub health: HealthConfig,
}

/// Parse a comma-separated RPC URL string into individual trimmed URLs,
/// dropping duplicates and obvious template placeholders.
pub fn parse_rpc_urls(raw: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for part in raw.split(',') {
        let url = part.trim();
        if url.is_empty() || is_placeholder_url(url) || seen.iter().any(|u| u == url) {
            continue;
        }
        seen.push(url.to_string());
    }
    seen
}

/// Detect unfilled template URLs so a half-edited .env degrades to the
/// remaining endpoints instead of a guaranteed-dead one.
fn is_placeholder_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("your_") || lower.contains("example") || lower.ends_with("/v2/")
}

/// Default functions
fn default_poll_interval() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10_000
}

fn default_source_max_range() -> u64 {
    10
}

fn default_target_max_range() -> u64 {
    2000
}

fn default_confirmations() -> u64 {
    2
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_lookback_blocks() -> u64 {
    2000
}

fn default_health_port() -> u16 {
    8081
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_required(name: &str) -> Result<String> {
    env_string(name).ok_or_else(|| eyre!("{name} environment variable is required"))
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_string(name) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        None => default,
    }
}

/// Normalize a private key to 0x-prefixed form.
fn normalize_pk(pk: &str) -> String {
    let s = pk.trim();
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

impl Config {
    /// Load configuration from the environment (reading .env if present).
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let source = Self::load_chain(
            "SOURCE",
            default_source_max_range(),
            env_parse("RELAYER_CONFIRMATIONS_SOURCE", default_confirmations()),
            env_parse("RELAYER_FROM_BLOCK_SOURCE", 0u64),
        )?;
        let target = Self::load_chain(
            "TARGET",
            default_target_max_range(),
            env_parse("RELAYER_CONFIRMATIONS_TARGET", default_confirmations()),
            env_parse("RELAYER_FROM_BLOCK_TARGET", 0u64),
        )?;

        let private_key = env_string("RELAYER_PRIVATE_KEY")
            .or_else(|| env_string("PRIVATE_KEY"))
            .map(|pk| normalize_pk(&pk))
            .ok_or_else(|| eyre!("RELAYER_PRIVATE_KEY (or PRIVATE_KEY) is required"))?;

        let mode: Mode = env_string("RELAYER_MODE")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(Mode::Bidir);

        let relayer = RelayerConfig {
            mode,
            private_key,
            poll_interval_ms: env_parse("RELAYER_POLL_INTERVAL_MS", default_poll_interval()),
            max_retries: env_parse("RELAYER_MAX_RETRIES", default_max_retries()),
            retry_delay_ms: env_parse("RELAYER_RETRY_DELAY_MS", default_retry_delay()),
            dry_run: env_bool("RELAYER_DRY_RUN", false),
            mint_gas_limit: env_parse("RELAYER_MINT_GAS_LIMIT", default_gas_limit()),
            unlock_gas_limit: env_parse("RELAYER_UNLOCK_GAS_LIMIT", default_gas_limit()),
            state_file: env_string("RELAYER_STATE_FILE")
                .unwrap_or_else(|| "data/relayer_state.json".to_string()),
            reset_state: env_bool("RELAYER_RESET_STATE", false),
            catch_up: env_bool("RELAYER_CATCH_UP", false),
            lookback_blocks: env_parse("RELAYER_LOOKBACK_BLOCKS", default_lookback_blocks()),
            mint_function: env_string("RELAYER_MINT_FUNCTION"),
            unlock_function: env_string("RELAYER_UNLOCK_FUNCTION"),
            lock_event: env_string("RELAYER_LOCK_EVENT"),
            return_event: env_string("RELAYER_RETURN_EVENT"),
        };

        let health = HealthConfig {
            bind: env_string("HEALTH_BIND").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse("HEALTH_PORT", default_health_port()),
        };

        let config = Config {
            source,
            target,
            relayer,
            health,
        };
        config.validate()?;
        Ok(config)
    }

    fn load_chain(
        prefix: &str,
        default_max_range: u64,
        confirmations: u64,
        from_block: u64,
    ) -> Result<ChainConfig> {
        let raw_urls = env_required(&format!("{prefix}_RPC_URLS"))?;
        let rpc_urls = parse_rpc_urls(&raw_urls);

        Ok(ChainConfig {
            rpc_urls,
            chain_id: env_required(&format!("{prefix}_CHAIN_ID"))?
                .parse()
                .wrap_err_with(|| format!("{prefix}_CHAIN_ID must be a valid u64"))?,
            bridge_address: env_required(&format!("{prefix}_BRIDGE_ADDRESS"))?,
            abi_path: env_required(&format!("{prefix}_ABI_PATH"))?,
            max_range: env_parse(&format!("{prefix}_LOG_MAX_RANGE"), default_max_range),
            confirmations,
            from_block,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Self::validate_chain("source", &self.source)?;
        Self::validate_chain("target", &self.target)?;

        if self.relayer.private_key.len() != 66 || !self.relayer.private_key.starts_with("0x") {
            return Err(eyre!("relayer private key must be 66 chars (0x + 64 hex chars)"));
        }

        if self.relayer.poll_interval_ms == 0 {
            return Err(eyre!("RELAYER_POLL_INTERVAL_MS cannot be 0"));
        }

        if self.relayer.max_retries == 0 {
            return Err(eyre!("RELAYER_MAX_RETRIES must be at least 1"));
        }

        if self.relayer.state_file.is_empty() {
            return Err(eyre!("RELAYER_STATE_FILE cannot be empty"));
        }

        Ok(())
    }

    fn validate_chain(label: &str, chain: &ChainConfig) -> Result<()> {
        if chain.rpc_urls.is_empty() {
            return Err(eyre!("no usable {label} RPC URLs configured"));
        }

        if chain.bridge_address.len() != 42 || !chain.bridge_address.starts_with("0x") {
            return Err(eyre!(
                "{label} bridge address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }

        if chain.chain_id == 0 {
            return Err(eyre!("{label} chain id cannot be 0"));
        }

        if chain.max_range == 0 {
            return Err(eyre!("{label} log max range must be at least 1"));
        }

        if chain.abi_path.is_empty() {
            return Err(eyre!("{label} ABI path cannot be empty"));
        }

        Ok(())
    }
}
