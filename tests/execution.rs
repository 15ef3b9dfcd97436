//! Executor and block application against the in-memory ledger

use chaincore::blockchain::{BlockTemplate, Blockchain, ChainState};
use chaincore::crypto::{KeyPair, Secp256k1Sha256};
use chaincore::executor::{ExecutionOutcome, Executor, TxOutcome};
use chaincore::ledger::{Event, EventKind, EventPayload, InMemoryLedger, Ledger};
use chaincore::miner::Miner;
use chaincore::transaction::TransactionRecord;
use chaincore::vm::{ExecutionReport, TerminalState};
use num_bigint::BigUint;

const TOKEN: &str = "SOUL";
const DIFFICULTY: u32 = 246;

/// Script double: the first byte selects the terminal state, the second is
/// the gas used. Halted runs emit one custom event.
fn scripted(script: &[u8]) -> ExecutionReport {
    let gas = script.get(1).copied().unwrap_or(0);
    match script.first() {
        Some(0) => ExecutionReport::halted(
            gas,
            vec![Event {
                kind: EventKind::Custom(7),
                public_key: Vec::new(),
                payload: EventPayload::Raw(script.to_vec()),
            }],
        ),
        Some(1) => ExecutionReport::failed(TerminalState::Faulted, gas),
        _ => ExecutionReport::failed(TerminalState::Broken, gas),
    }
}

fn funded(keypair: &KeyPair, balance: u64) -> ChainState<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new();
    ledger.deposit(
        &keypair.public_key_bytes(),
        TOKEN,
        BigUint::from(balance),
        &mut |_| {},
    );
    ChainState::new(ledger, Some(TOKEN.to_string()))
}

fn signed(keypair: &KeyPair, script: Vec<u8>, fee: u64, order: u64) -> TransactionRecord {
    let mut tx = TransactionRecord::new(keypair.public_key_bytes().to_vec(), script, fee, order);
    assert!(tx.sign(Some(keypair)));
    tx
}

fn balance_of(chain: &ChainState<InMemoryLedger>, keypair: &KeyPair) -> BigUint {
    chain
        .ledger()
        .get_account(&keypair.public_key_bytes())
        .map(|account| account.balance(TOKEN))
        .unwrap_or_default()
}

#[test]
fn test_non_halted_runs_change_nothing() {
    let keypair = KeyPair::generate();
    let executor = Executor::new(scripted);

    for state_byte in [1u8, 2] {
        let mut chain = funded(&keypair, 100);
        let before = chain.ledger().clone();
        let tx = signed(&keypair, vec![state_byte, 40], 50, 0);

        let mut events = Vec::new();
        assert!(!executor.execute(&tx, &mut chain, &mut |e| events.push(e)));

        assert!(events.is_empty());
        assert_eq!(
            chain.ledger().get_account(&keypair.public_key_bytes()),
            before.get_account(&keypair.public_key_bytes())
        );
    }
}

#[test]
fn test_halted_run_charges_then_emits_script_events() {
    let keypair = KeyPair::generate();
    let executor = Executor::new(scripted);
    let mut chain = funded(&keypair, 100);
    let tx = signed(&keypair, vec![0, 30], 50, 0);

    let mut events = Vec::new();
    assert!(executor.execute(&tx, &mut chain, &mut |e| events.push(e)));

    assert_eq!(balance_of(&chain, &keypair), BigUint::from(70u32));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::TokenWithdraw);
    assert_eq!(
        events[0].payload,
        EventPayload::Token {
            symbol: TOKEN.to_string(),
            value: BigUint::from(30u32),
        }
    );
    assert_eq!(events[1].kind, EventKind::Custom(7));
}

#[test]
fn test_block_applies_records_in_order() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let mut ledger = InMemoryLedger::new();
    ledger.deposit(&alice.public_key_bytes(), TOKEN, BigUint::from(100u32), &mut |_| {});

    let mut chain = Blockchain::new(
        ChainState::new(ledger, Some(TOKEN.to_string())),
        Executor::new(scripted),
        Secp256k1Sha256,
    );
    // credited after the chain took ownership of the ledger
    chain
        .state_mut()
        .ledger_mut()
        .deposit(&bob.public_key_bytes(), TOKEN, BigUint::from(10u32), &mut |_| {});

    let transactions = vec![
        // 100 -> 40
        signed(&alice, vec![0, 60], 60, 0),
        // fee 60 no longer covered by the remaining 40
        signed(&alice, vec![0, 10], 60, 1),
        // faulted: admitted but nothing is charged
        signed(&bob, vec![1, 5], 10, 0),
        // charged the full gas above its fee
        signed(&alice, vec![0, 35], 20, 2),
        // unsigned
        TransactionRecord::new(bob.public_key_bytes().to_vec(), vec![0, 1], 1u32, 1u32),
    ];
    let hashes: Vec<_> = transactions.iter().map(TransactionRecord::hash).collect();

    let block = Miner::default()
        .mine(BlockTemplate::genesis(alice.public_key_bytes().to_vec(), DIFFICULTY, transactions))
        .unwrap();

    let mut withdrawals = 0;
    let receipts = chain
        .accept_block(block, &mut |event| {
            if event.kind == EventKind::TokenWithdraw {
                withdrawals += 1;
            }
        })
        .unwrap();

    let outcomes: Vec<_> = receipts.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            TxOutcome::Executed(ExecutionOutcome::Success),
            TxOutcome::Rejected,
            TxOutcome::Executed(ExecutionOutcome::Failure),
            TxOutcome::Executed(ExecutionOutcome::Success),
            TxOutcome::Rejected,
        ]
    );
    assert_eq!(
        receipts.iter().map(|r| r.tx_hash).collect::<Vec<_>>(),
        hashes
    );
    assert_eq!(receipts[0].gas_used, Some(BigUint::from(60u32)));
    assert_eq!(receipts[1].gas_used, None);
    assert_eq!(withdrawals, 2);

    assert_eq!(balance_of(chain.state(), &alice), BigUint::from(5u32));
    assert_eq!(balance_of(chain.state(), &bob), BigUint::from(10u32));
    assert_eq!(chain.height(), Some(0));
}

#[test]
fn test_rejected_block_leaves_ledger_untouched() {
    let keypair = KeyPair::generate();
    let mut chain = Blockchain::new(funded(&keypair, 100), Executor::new(scripted), Secp256k1Sha256);

    let genesis = Miner::default()
        .mine(BlockTemplate::genesis(
            keypair.public_key_bytes().to_vec(),
            DIFFICULTY,
            vec![signed(&keypair, vec![0, 50], 50, 0)],
        ))
        .unwrap();

    let mut value = serde_json::to_value(&genesis).unwrap();
    value["header"]["height"] = 1u64.into();
    let forged: chaincore::blockchain::Block = serde_json::from_value(value).unwrap();

    assert!(chain.accept_block(forged, &mut |_| {}).is_err());
    assert_eq!(balance_of(chain.state(), &keypair), BigUint::from(100u32));
    assert!(chain.blocks().is_empty());
}
