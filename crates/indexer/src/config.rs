//! Configuration management for the ENS graph indexer.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - Environment variables (`${VAR}` placeholders inside the TOML)
//! - Default values (fallbacks)

use alloy::primitives::{address, Address};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// Contract addresses
    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ethereum RPC URL
    pub rpc_url: String,

    /// Chain ID (1 for mainnet)
    pub chain_id: u64,
}

/// Contract addresses. Every field defaults to the mainnet deployment.
///
/// Resolvers are not listed: any contract emitting a resolver event is
/// treated as a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Current registry (with fallback to the legacy one)
    #[serde(default = "default_registry")]
    pub registry: Address,

    /// Legacy registry, authoritative only for unmigrated names
    #[serde(default = "default_legacy_registry")]
    pub legacy_registry: Address,

    /// `.eth` base registrar (ERC-721)
    #[serde(default = "default_base_registrar")]
    pub base_registrar: Address,

    /// Legacy registrar controller (single `cost` field)
    #[serde(default = "default_legacy_controller")]
    pub legacy_controller: Address,

    /// Current registrar controller (`baseCost` + `premium`)
    #[serde(default = "default_controller")]
    pub controller: Address,

    /// Name wrapper (ERC-1155)
    #[serde(default = "default_name_wrapper")]
    pub name_wrapper: Address,
}

impl ContractsConfig {
    /// Every configured address, in a fixed order.
    pub fn addresses(&self) -> Vec<Address> {
        vec![
            self.registry,
            self.legacy_registry,
            self.base_registrar,
            self.legacy_controller,
            self.controller,
            self.name_wrapper,
        ]
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            legacy_registry: default_legacy_registry(),
            base_registrar: default_base_registrar(),
            legacy_controller: default_legacy_controller(),
            controller: default_controller(),
            name_wrapper: default_name_wrapper(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://ensgraph.db")
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Block number to start syncing from (0 = from genesis)
    #[serde(default)]
    pub start_block: u64,

    /// Polling interval in seconds for new blocks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Batch size for historical sync (number of blocks per batch)
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Number of confirmations to wait before processing blocks
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            confirmations: default_confirmations(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_registry() -> Address {
    address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e")
}

fn default_legacy_registry() -> Address {
    address!("314159265dd8dbb310642f98f50c066173c1259b")
}

fn default_base_registrar() -> Address {
    address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85")
}

fn default_legacy_controller() -> Address {
    address!("283Af0B28c62C092C9727F1Ee09c02CA627EB7F5")
}

fn default_controller() -> Address {
    address!("Cc5e7dB10E65EED1BBD105359e7268aa660f6734")
}

fn default_name_wrapper() -> Address {
    address!("114D4603199df73e7D157787f8778E21fCd13066")
}

fn default_confirmations() -> u64 {
    12
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_poll_interval_secs() -> u64 {
    12
}

fn default_batch_size() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `rpc_url = "${ETH_RPC_URL}"`
    ///
    /// # Example
    /// ```no_run
    /// # use ensgraph_indexer::config::Config;
    /// let config = Config::from_file("indexer.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = Self::expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            anyhow::bail!("Network RPC URL cannot be empty");
        }

        if self.network.chain_id == 0 {
            anyhow::bail!("Chain ID must be non-zero");
        }

        let contracts = [
            ("registry", self.contracts.registry),
            ("legacy_registry", self.contracts.legacy_registry),
            ("base_registrar", self.contracts.base_registrar),
            ("legacy_controller", self.contracts.legacy_controller),
            ("controller", self.contracts.controller),
            ("name_wrapper", self.contracts.name_wrapper),
        ];
        for (name, address) in contracts {
            if address.is_zero() {
                anyhow::bail!("Contracts {} must be a non-zero address", name);
            }
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.sync.poll_interval_secs == 0 {
            anyhow::bail!("Sync poll_interval_secs must be non-zero");
        }
        if self.sync.batch_size == 0 {
            anyhow::bail!("Sync batch_size must be non-zero");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// Expand environment variables in the format `${VAR_NAME}`.
    ///
    /// Placeholders after a `#` that is outside every string are comments and
    /// are left alone. Inside strings (`"..."`, `'...'`, `"""..."""`,
    /// `'''...'''`) they are expanded normally.
    ///
    /// # Errors
    /// Returns an error if a referenced environment variable is not set, or a
    /// placeholder is empty or unclosed.
    fn expand_env_vars(input: &str) -> Result<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_double_quote = false;
        let mut in_single_quote = false;
        let mut in_multiline_double = false;
        let mut in_multiline_single = false;
        let mut in_comment = false;
        let mut escape_next = false;
        let mut pos = 0;

        while let Some(ch) = chars.next() {
            pos += 1;

            if escape_next {
                escape_next = false;
                result.push(ch);
                continue;
            }

            if ch == '\\' && (in_double_quote || in_multiline_double) {
                escape_next = true;
                result.push(ch);
                continue;
            }

            let in_any_string =
                in_double_quote || in_single_quote || in_multiline_double || in_multiline_single;

            if ch == '"' && !in_single_quote && !in_multiline_single && !in_comment {
                if Self::take_triple_quote(&mut chars, '"') {
                    in_multiline_double = !in_multiline_double;
                    result.push_str("\"\"\"");
                    pos += 2;
                } else {
                    if !in_multiline_double {
                        in_double_quote = !in_double_quote;
                    }
                    result.push(ch);
                }
            } else if ch == '\'' && !in_double_quote && !in_multiline_double && !in_comment {
                if Self::take_triple_quote(&mut chars, '\'') {
                    in_multiline_single = !in_multiline_single;
                    result.push_str("'''");
                    pos += 2;
                } else {
                    if !in_multiline_single {
                        in_single_quote = !in_single_quote;
                    }
                    result.push(ch);
                }
            } else if ch == '#' && !in_any_string && !in_comment {
                in_comment = true;
                result.push(ch);
            } else if ch == '\n' {
                in_comment = false;
                result.push(ch);
            } else if ch == '$' && !in_comment && chars.peek() == Some(&'{') {
                chars.next();
                pos += 1;

                let mut var_name = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    pos += 1;
                    if c == '}' {
                        found_close = true;
                        break;
                    }
                    var_name.push(c);
                }

                if !found_close {
                    anyhow::bail!(
                        "Unclosed environment variable placeholder at position {}",
                        pos
                    );
                }

                if var_name.is_empty() {
                    anyhow::bail!("Empty environment variable name at position {}", pos);
                }

                match std::env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        anyhow::bail!(
                            "Environment variable '{}' is not set (referenced at position {})",
                            var_name,
                            pos
                        );
                    }
                }
            } else {
                result.push(ch);
            }
        }

        Ok(result)
    }

    /// Consume the next two characters if they complete a triple quote.
    fn take_triple_quote(chars: &mut std::iter::Peekable<std::str::Chars>, quote: char) -> bool {
        let mut ahead = chars.clone();
        if ahead.next() == Some(quote) && ahead.next() == Some(quote) {
            chars.next();
            chars.next();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[network]
rpc_url = "https://eth.example.com"
chain_id = 1

[database]
url = "sqlite://ensgraph.db"
"#;

    #[test]
    fn test_load_example_config() {
        let toml = r#"
[network]
rpc_url = "https://mainnet.infura.io/v3/YOUR_API_KEY"
chain_id = 1

[contracts]
registry = "0x1111111111111111111111111111111111111111"
name_wrapper = "0x2222222222222222222222222222222222222222"

[database]
url = "sqlite://ensgraph.db"
max_connections = 5
min_connections = 1

[sync]
start_block = 3327417
poll_interval_secs = 12
batch_size = 500
confirmations = 6

[logging]
level = "debug"
format = "json"
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.network.chain_id, 1);
        assert_eq!(config.database.url, "sqlite://ensgraph.db");
        assert_eq!(config.sync.start_block, 3327417);
        assert_eq!(config.sync.batch_size, 500);
        assert_eq!(config.contracts.registry, Address::repeat_byte(0x11));
        assert_eq!(config.contracts.name_wrapper, Address::repeat_byte(0x22));
        // unspecified contracts keep their mainnet defaults
        assert_eq!(config.contracts.base_registrar, default_base_registrar());
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.contracts, ContractsConfig::default());
        assert_eq!(config.sync.start_block, 0);
        assert_eq!(config.sync.poll_interval_secs, 12);
        assert_eq!(config.sync.batch_size, 1000);
        assert_eq!(config.sync.confirmations, 12);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.contracts.addresses().len(), 6);
    }

    #[test]
    fn test_validation_empty_rpc_url() {
        let toml = MINIMAL.replace("https://eth.example.com", "");
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("RPC URL"));
    }

    #[test]
    fn test_validation_zero_chain_id() {
        let toml = MINIMAL.replace("chain_id = 1", "chain_id = 0");
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("Chain ID"));
    }

    #[test]
    fn test_validation_zero_contract_address() {
        let toml = format!(
            "{MINIMAL}\n[contracts]\ncontroller = \"0x0000000000000000000000000000000000000000\"\n"
        );
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("controller"));
    }

    #[test]
    fn test_validation_connection_bounds() {
        let toml = MINIMAL.replace(
            "url = \"sqlite://ensgraph.db\"",
            "url = \"sqlite://ensgraph.db\"\nmax_connections = 1\nmin_connections = 4",
        );
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("min_connections"));
    }

    #[test]
    fn test_validation_zero_batch_size() {
        let toml = format!("{MINIMAL}\n[sync]\nbatch_size = 0\n");
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("batch_size"));
    }

    #[test]
    fn test_validation_unknown_log_format() {
        let toml = format!("{MINIMAL}\n[logging]\nformat = \"xml\"\n");
        let result = Config::from_toml_str(&toml);
        assert!(result.unwrap_err().to_string().contains("Logging format"));
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("ENSGRAPH_TEST_VAR", "hello");
        let result = Config::expand_env_vars("value is ${ENSGRAPH_TEST_VAR}").unwrap();
        assert_eq!(result, "value is hello");

        let result = Config::expand_env_vars("no variables here").unwrap();
        assert_eq!(result, "no variables here");

        std::env::remove_var("ENSGRAPH_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_errors() {
        let undefined = Config::expand_env_vars("value is ${ENSGRAPH_UNDEFINED_12345}");
        assert!(undefined
            .unwrap_err()
            .to_string()
            .contains("ENSGRAPH_UNDEFINED_12345"));

        let empty = Config::expand_env_vars("value is ${}");
        assert!(empty.unwrap_err().to_string().contains("Empty"));

        let unclosed = Config::expand_env_vars("value is ${UNCLOSED");
        assert!(unclosed.unwrap_err().to_string().contains("Unclosed"));
    }

    #[test]
    fn test_expand_env_vars_ignores_comments() {
        let input = "# rpc_url = \"${ENSGRAPH_NOT_SET}\"\nchain_id = 1 # ${ALSO_NOT_SET}\n";
        let result = Config::expand_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_expand_env_vars_hash_in_string() {
        std::env::set_var("ENSGRAPH_TEST_KEY", "abc");
        let input = "url = \"https://x#${ENSGRAPH_TEST_KEY}\"";
        let result = Config::expand_env_vars(input).unwrap();
        assert_eq!(result, "url = \"https://x#abc\"");
        std::env::remove_var("ENSGRAPH_TEST_KEY");
    }

    #[test]
    fn test_expand_env_vars_multiline_literal_string() {
        std::env::set_var("ENSGRAPH_TEST_ML", "v");
        let input = "notes = '''\n# not a comment ${ENSGRAPH_TEST_ML}\n'''\n";
        let result = Config::expand_env_vars(input).unwrap();
        assert_eq!(result, "notes = '''\n# not a comment v\n'''\n");
        std::env::remove_var("ENSGRAPH_TEST_ML");
    }

    #[test]
    fn test_config_with_env_vars() {
        std::env::set_var("ENSGRAPH_TEST_RPC_URL", "https://rpc.example.com");

        let toml = r#"
[network]
rpc_url = "${ENSGRAPH_TEST_RPC_URL}"
chain_id = 1

[database]
url = "sqlite://test.db"
        "#;

        let expanded = Config::expand_env_vars(toml).unwrap();
        let config = Config::from_toml_str(&expanded).unwrap();
        assert_eq!(config.network.rpc_url, "https://rpc.example.com");

        std::env::remove_var("ENSGRAPH_TEST_RPC_URL");
    }

    #[test]
    fn test_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.rpc_url, "https://eth.example.com");
    }
}
