//! Node configuration
//!
//! Read once at startup from command-line flags, each backed by an
//! environment variable.

use clap::Parser;

use crate::constants::{
    DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, DEFAULT_P2P_PORT, DEFAULT_TOKEN_SUPPLY,
    DEFAULT_WALLET_COUNT,
};
use crate::consensus::{check_difficulty, ChainError};
use crate::storage::ChainConfig;

fn parse_difficulty(value: &str) -> Result<usize, String> {
    let difficulty = value.parse::<usize>().map_err(|e| e.to_string())?;
    check_difficulty(difficulty).map_err(|e| e.to_string())
}

#[derive(Parser, Debug, Clone)]
#[command(name = "sever-node", about = "Sever Network blockchain node")]
pub struct NodeConfig {
    /// Interface the gossip server binds to
    #[arg(long, env = "P2P_HOST", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port the gossip server listens on
    #[arg(long, env = "P2P_PORT", default_value_t = DEFAULT_P2P_PORT)]
    pub p2p_port: u16,

    /// Comma-separated peer addresses, e.g. 127.0.0.1:6002,127.0.0.1:6003
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Leading zero hex digits required of mined blocks
    #[arg(long, env = "DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY, value_parser = parse_difficulty)]
    pub difficulty: usize,

    /// Reward paid to the miner of each block
    #[arg(long, env = "MINING_REWARD", default_value_t = DEFAULT_MINING_REWARD)]
    pub mining_reward: u64,

    /// Require proof-of-work on chains received from peers
    #[arg(long, env = "ENFORCE_POW")]
    pub enforce_pow: bool,

    #[arg(long, env = "TOKEN_NAME", default_value = "Sever N")]
    pub token_name: String,

    #[arg(long, env = "TOKEN_SYMBOL", default_value = "SN")]
    pub token_symbol: String,

    /// Initial token supply credited to the creator account
    #[arg(long, env = "TOKEN_SUPPLY", default_value_t = DEFAULT_TOKEN_SUPPLY)]
    pub token_supply: u64,

    /// Number of wallets funded from the creator at startup
    #[arg(long, env = "WALLET_COUNT", default_value_t = DEFAULT_WALLET_COUNT)]
    pub wallet_count: usize,

    /// Mine pending transactions every N seconds (0 disables)
    #[arg(long, env = "MINE_INTERVAL_SECS", default_value_t = 0)]
    pub mine_interval_secs: u64,

    /// Run the demo sequence after startup
    #[arg(long)]
    pub demo: bool,
}

impl NodeConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.p2p_port)
    }

    pub fn chain_config(&self) -> Result<ChainConfig, ChainError> {
        ChainConfig::new(self.difficulty, self.mining_reward, self.enforce_pow)
    }

    /// Tokens given to each initial wallet
    pub fn tokens_per_wallet(&self) -> u64 {
        if self.wallet_count == 0 {
            0
        } else {
            self.token_supply / self.wallet_count as u64
        }
    }

    /// Peer list with blanks removed
    pub fn peer_addresses(&self) -> Vec<String> {
        self.peers
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::parse_from(["sever-node"]);
        assert_eq!(config.p2p_port, DEFAULT_P2P_PORT);
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.listen_addr(), format!("0.0.0.0:{}", DEFAULT_P2P_PORT));
        assert_eq!(config.tokens_per_wallet(), 1500);
        assert!(!config.chain_config().unwrap().enforce_pow_on_replace);
    }

    #[test]
    fn test_peer_list_parsing() {
        let config = NodeConfig::parse_from([
            "sever-node",
            "--peers",
            "127.0.0.1:6002, 127.0.0.1:6003,",
        ]);
        assert_eq!(
            config.peer_addresses(),
            vec!["127.0.0.1:6002".to_string(), "127.0.0.1:6003".to_string()]
        );
    }

    #[test]
    fn test_difficulty_range() {
        let config = NodeConfig::parse_from(["sever-node", "--difficulty", "64"]);
        assert_eq!(config.chain_config().unwrap().difficulty, 64);

        assert!(NodeConfig::try_parse_from(["sever-node", "--difficulty", "65"]).is_err());
        assert!(NodeConfig::try_parse_from(["sever-node", "--difficulty", "0"]).is_err());
        assert!(NodeConfig::try_parse_from(["sever-node", "--difficulty", "two"]).is_err());
    }

    #[test]
    fn test_zero_wallets() {
        let config = NodeConfig::parse_from(["sever-node", "--wallet-count", "0"]);
        assert_eq!(config.tokens_per_wallet(), 0);
    }
}
