#![forbid(unsafe_code)]
//! Mines a demo block: one signed transaction, mined at the configured
//! difficulty and applied to a throwaway in-memory ledger.

use chaincore::blockchain::{BlockTemplate, Blockchain, ChainState};
use chaincore::config::load_config;
use chaincore::crypto::{KeyPair, Secp256k1Sha256};
use chaincore::executor::{Executor, TxOutcome};
use chaincore::ledger::{InMemoryLedger, Ledger};
use chaincore::miner::{digest_target, Miner};
use chaincore::transaction::TransactionRecord;
use chaincore::vm::ExecutionReport;
use clap::Parser;
use num_bigint::BigUint;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "chaincore-mine", about = "Mine a block with one demo transaction")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured difficulty
    #[arg(long)]
    difficulty: Option<u32>,

    /// Override the configured number of mining threads
    #[arg(long)]
    threads: Option<usize>,

    /// Hex-encoded secret key; a fresh key is generated when omitted
    #[arg(long)]
    secret_key: Option<String>,

    /// Starting balance credited to the sender
    #[arg(long, default_value_t = 1_000)]
    balance: u64,

    /// Fee the demo transaction authorises
    #[arg(long, default_value_t = 100)]
    fee: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let difficulty = args.difficulty.unwrap_or(config.chain.difficulty);
    let threads = args.threads.unwrap_or(config.miner.threads).max(1);

    let keypair = match &args.secret_key {
        Some(hex_key) => KeyPair::from_secret_hex(hex_key)?,
        None => KeyPair::generate(),
    };
    let public_key = keypair.public_key_bytes().to_vec();

    let fee_token = config.chain.fee_token();
    let mut ledger = InMemoryLedger::new();
    if let Some(token) = &fee_token {
        ledger.deposit(&public_key, token, BigUint::from(args.balance), &mut |_| {});
    }

    let mut tx = TransactionRecord::new(public_key.clone(), b"demo-script".to_vec(), args.fee, 0u32);
    if !tx.sign(Some(&keypair)) {
        return Err("failed to sign demo transaction".into());
    }

    // one gas unit per script byte
    let executor = Executor::new(|script: &[u8]| ExecutionReport::halted(script.len() as u64, Vec::new()));
    let mut chain = Blockchain::new(
        ChainState::new(ledger, fee_token.clone()),
        executor,
        Secp256k1Sha256,
    );

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              ⛏️  MINING GENESIS BLOCK                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    let template = BlockTemplate::genesis(public_key.clone(), difficulty, vec![tx]);
    let miner = Miner::new(Secp256k1Sha256).with_workers(threads);

    let start_time = Instant::now();
    let block = match config.miner.max_attempts {
        Some(max_attempts) => match miner.mine_bounded(template, max_attempts)? {
            Some(block) => block,
            None => {
                println!("Mining aborted after {} attempts; no block produced.", max_attempts);
                return Ok(());
            }
        },
        None => miner.mine(template)?,
    };
    let elapsed = start_time.elapsed();

    let receipts = chain.accept_block(block.clone(), &mut |event| {
        println!("  event: {:?}", event);
    })?;

    println!("┌──────────────────────────────── BLOCK METADATA ────────────────────────────────┐");
    println!("│ Height:              #{}", block.height());
    println!("│ Hash:                {}", block.hash_str());
    println!("│ Timestamp:           {}", block.header().timestamp);
    println!("│ Difficulty:          {}", block.header().difficulty);
    println!("│ Target:              {:x}", digest_target(block.header().difficulty));
    println!("│ Nonce:               {}", block.header().nonce);
    println!("│ Mining Time:         {:.3} seconds", elapsed.as_secs_f64());
    println!("│ Threads:             {}", threads);
    println!("└────────────────────────────────────────────────────────────────────────────────┘\n");

    println!("┌──────────────────────────────── TRANSACTIONS ──────────────────────────────────┐");
    for receipt in &receipts {
        let status = match receipt.outcome {
            TxOutcome::Rejected => "rejected".to_string(),
            TxOutcome::Executed(outcome) => format!("{:?}", outcome),
        };
        let gas = receipt
            .gas_used
            .as_ref()
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("│ {}  {:<8} gas {}", hex::encode(receipt.tx_hash), status, gas);
    }
    println!("└────────────────────────────────────────────────────────────────────────────────┘\n");

    if let Some(token) = &fee_token {
        let remaining = chain
            .state()
            .ledger()
            .get_account(&public_key)
            .map(|account| account.balance(token))
            .unwrap_or_default();
        println!("Sender balance: {} {}", remaining, token);
    }

    Ok(())
}
