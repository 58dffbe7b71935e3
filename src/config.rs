// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Daemon configuration (§10.3, C10). Mirrors the client's `Args` derive —
//! global flags plus an env-backed network switch — but scoped to what the
//! node process itself needs: where it stores data, which Bitcoin network
//! it watches, and where it listens.

#[cfg(feature = "server")]
use std::path::PathBuf;

#[cfg(feature = "server")]
pub const BAZAAR_NODE_NETWORK_ENV: &str = "BAZAAR_NODE_NETWORK";

/// Command-line/config-file options for the `bazaard` binary.
#[cfg(feature = "server")]
#[derive(Parser, Clone, PartialEq, Eq, Debug)]
#[command(name = "bazaard", bin_name = "bazaard", author, version)]
pub struct Config {
    /// Set a verbosity level
    ///
    /// Can be used multiple times to increase verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Data directory root under which orders, followers and listings are
    /// persisted
    #[arg(short, long, default_value = "~/.bazaar-node", env = "BAZAAR_NODE_DATA_DIR")]
    pub data_dir: String,

    /// Run against Bitcoin testnet rather than mainnet
    #[arg(long, global = true, env = BAZAAR_NODE_NETWORK_ENV)]
    pub testnet: bool,

    /// Local socket address the node listens for peer requests on
    #[arg(short, long, default_value = "0.0.0.0:9735")]
    pub listen: String,

    /// Load configuration from a file instead of (or in addition to) flags
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(feature = "server")]
impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: 0,
            data_dir: "~/.bazaar-node".to_string(),
            testnet: false,
            listen: "0.0.0.0:9735".to_string(),
            config: None,
        }
    }
}

#[cfg(feature = "server")]
impl Config {
    /// Expands `~` in `data_dir` into an absolute path.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_dotted_data_dir() {
        let config = Config::default();
        assert_eq!(config.data_dir, "~/.bazaar-node");
        assert!(!config.testnet);
    }
}
