//! PoolSwap ledger node tool
//!
//! Opens the ledger database and inspects or advances it.
//!
//! ```text
//! poolswap-node [--config <file>] pools
//! poolswap-node [--config <file>] balances <owner hex>
//! poolswap-node [--config <file>] history <owner hex>
//! poolswap-node [--config <file>] distribute
//! ```

use poolswap_core::accounts::{BalancesView, BalancesViewMut, HistoryView};
use poolswap_core::poolpairs::{distribute_rewards, PoolPair, PoolPairView};
use poolswap_core::primitives::{Owner, TokenId};
use poolswap_core::storage::{AccountHistoryKey, BalanceKey, Overlay, SledStore};
use poolswap_core::{Config, LedgerError};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = args.remove(i + 1);
            args.remove(i);
            Config::from_file(path)?
        }
        Some(_) => return Err("--config needs a file".into()),
        None => Config::default(),
    }
    .with_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut store = SledStore::open_with_config(&config)?;
    let command = args.first().map(String::as_str).unwrap_or("pools");

    match command {
        "pools" => print_pools(&store)?,
        "balances" => print_balances(&store, &owner_arg(&args)?)?,
        "history" => print_history(&store, &owner_arg(&args)?)?,
        "distribute" => distribute(&mut store, &config)?,
        other => return Err(format!("unknown command: {}", other).into()),
    }

    store.flush()?;
    Ok(())
}

fn owner_arg(args: &[String]) -> Result<Owner, Box<dyn std::error::Error>> {
    let hex = args.get(1).ok_or("missing owner (hex)")?;
    Ok(Owner::from_hex(hex)?)
}

#[derive(Serialize)]
struct PoolEntry {
    id: u32,
    pool: PoolPair,
}

fn print_pools(store: &SledStore) -> Result<(), LedgerError> {
    let mut pools = Vec::new();
    store.for_each_pool_pair(TokenId(0), |id, pool| {
        pools.push(PoolEntry {
            id: id.0,
            pool: pool.clone(),
        });
        true
    })?;
    info!(pools = pools.len(), records = store.len(), "Ledger loaded");

    let out = serde_json::to_string_pretty(&pools)
        .map_err(|e| LedgerError::InvalidMessage(e.to_string()))?;
    println!("{}", out);
    Ok(())
}

fn print_balances(store: &SledStore, owner: &Owner) -> Result<(), LedgerError> {
    let start = BalanceKey {
        owner: owner.clone(),
        token_id: TokenId(0),
    };
    store.for_each_balance(&start, |who, amount| {
        if who != owner {
            return false;
        }
        println!("{}", amount);
        true
    })
}

fn print_history(store: &SledStore, owner: &Owner) -> Result<(), LedgerError> {
    let start = AccountHistoryKey {
        owner: owner.clone(),
        block_height: 0,
        txn: 0,
    };
    store.for_each_account_history(&start, |key, entry| {
        if &key.owner != owner {
            return false;
        }
        let deltas: Vec<String> = entry
            .deltas
            .iter()
            .map(|(token, delta)| format!("{}@{}", delta, token))
            .collect();
        println!("{}/{} {} {}", key.block_height, key.txn, entry.txid, deltas.join(" "));
        true
    })
}

/// Run one reward cycle and commit it
fn distribute(store: &mut SledStore, config: &Config) -> Result<(), LedgerError> {
    let mut block = Overlay::new(store);
    let result = distribute_rewards(
        &mut block,
        config.yield_farming_per_block,
        |s, owner, token| s.get_balance(owner, token),
        |s, owner, amount| s.add_balance(owner, amount),
    );

    match result {
        Ok(distributed) => {
            let changes = block.write_set().len();
            block.flush()?;
            info!(distributed, changes, "Reward cycle committed");
            Ok(())
        }
        Err(err) => {
            block.discard();
            if err.is_fatal() {
                error!(error = %err, "Ledger consistency violated");
            }
            Err(err)
        }
    }
}
