//! Sever Network Blockchain Node
//!
//! Main entry point for running a gossip-connected node.

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sever_core::consensus::{now_millis, Block};
use sever_core::mining::{Miner, MiningResult};
use sever_core::node::NodeConfig;
use sever_core::p2p::GossipServer;
use sever_core::storage::{lock_chain, Blockchain, SharedChain};
use sever_core::token::TokenLedger;
use sever_core::wallet::{fund_initial_wallets, Wallet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::parse();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║               SEVER NETWORK BLOCKCHAIN NODE              ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let chain = Blockchain::new(config.chain_config()?).into_shared();
    {
        let state = lock_chain(&chain);
        let genesis = state.latest_block();
        info!(hash = %genesis.hash, difficulty = state.difficulty(), "Genesis block created");
    }

    let mut token = TokenLedger::new(
        config.token_name.clone(),
        config.token_symbol.clone(),
        config.token_supply,
    );
    let mut wallet = Wallet::new();
    let node_address = wallet.generate_key().address.clone();
    let mut funded = Vec::new();
    for keypair in fund_initial_wallets(&mut token, config.wallet_count, config.tokens_per_wallet()) {
        funded.push(wallet.add_key(keypair).address.clone());
    }
    info!(
        name = token.name(),
        symbol = token.symbol(),
        supply = token.total_supply(),
        holders = token.holder_count(),
        "Token ledger ready"
    );

    let miner = Miner::new(node_address.clone());
    info!(address = %node_address, keys = wallet.len(), "Node wallet created");

    let gossip = GossipServer::start(&config.listen_addr(), chain.clone(), &config.peer_addresses())
        .await
        .with_context(|| format!("failed to bind gossip server on {}", config.listen_addr()))?;

    if config.demo {
        let recipient = match funded.first() {
            Some(address) => address.clone(),
            None => wallet.generate_key().address.clone(),
        };
        run_demo(&chain, &miner, &wallet, &node_address, &recipient).await?;
    }

    if config.mine_interval_secs > 0 {
        spawn_periodic_miner(chain.clone(), miner.clone(), config.mine_interval_secs);
    }

    info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Stopping node...");
    miner.stop();
    gossip.shutdown();
    Ok(())
}

/// Two payload blocks, one signed transfer, one mined pending block
async fn run_demo(
    chain: &SharedChain,
    miner: &Miner,
    wallet: &Wallet,
    sender: &str,
    recipient: &str,
) -> anyhow::Result<()> {
    {
        let mut state = lock_chain(chain);
        for (index, amount) in [(1u64, 4u64), (2, 10)] {
            let block = Block::new(index, now_millis(), json!({ "amount": amount }), "");
            let added = state.add_block(block);
            info!(index = added.index, hash = %added.hash, "Demo block added");
        }
        info!(valid = state.is_chain_valid(), "Demo chain validated");
    }

    let tx = wallet.create_transaction(sender, recipient, 10)?;
    lock_chain(chain).add_transaction(tx)?;

    match miner.mine_pending(chain).await? {
        MiningResult::Success(block) => {
            info!(index = block.index, hash = %block.hash, "Demo transactions mined")
        }
        MiningResult::Interrupted => warn!("Demo mining interrupted"),
    }

    let state = lock_chain(chain);
    info!(
        miner = state.get_balance_of_address(miner.reward_address()),
        recipient = state.get_balance_of_address(recipient),
        "Demo balances"
    );
    Ok(())
}

fn spawn_periodic_miner(chain: SharedChain, miner: Miner, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if lock_chain(&chain).pending_transactions().is_empty() {
                continue;
            }
            match miner.mine_pending(&chain).await {
                Ok(MiningResult::Success(_)) => {}
                Ok(MiningResult::Interrupted) => break,
                Err(e) => warn!(error = %e, "Mined block discarded"),
            }
        }
    });
}
