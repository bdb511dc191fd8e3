//! CLI configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shelf_commerce::CommerceConfig;

/// CLI configuration file.
///
/// Engine settings sit at the top level of the file, next to the CLI's own
/// `[simulate]` defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub commerce: CommerceConfig,

    /// Defaults for `shelf simulate`.
    #[serde(default)]
    pub simulate: SimulateConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))
    }
}

/// Defaults for the shopper simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateConfig {
    /// Concurrent shoppers (default: 20).
    #[serde(default = "default_shoppers")]
    pub shoppers: usize,

    /// Units each shopper tries to buy (default: 1).
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_shoppers() -> usize {
    20
}

fn default_quantity() -> i64 {
    1
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            shoppers: default_shoppers(),
            quantity: default_quantity(),
        }
    }
}

/// Generate a default shelf.toml config file.
pub fn generate_default_config() -> String {
    r#"# Shelf engine configuration

currency = "USD"

[checkout]
max_attempts = 5
backoff = { kind = "exponential", base_ms = 10, max_ms = 200 }

[allocator]
# At least the number of concurrent allocators.
max_attempts = 16

[persistence]
debounce_ms = 500

[simulate]
shoppers = 20
quantity = 1
"#
    .to_string()
}
