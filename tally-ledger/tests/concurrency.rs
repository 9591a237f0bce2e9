//! Concurrency stress tests
//!
//! Every public operation must be safe under concurrent invocation from
//! unrelated callers: balances serialize through their wallet locks, the
//! fixed lock order keeps opposing transfers deadlock-free, and rejected
//! attempts never partially apply.

use rust_decimal::Decimal;
use std::sync::Arc;
use tally_ledger::{Config, Error, Ledger, RequestStatus, UserId};

async fn open_ledger(data_dir: &std::path::Path) -> Arc<Ledger> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut config = Config::default();
    config.data_dir = data_dir.to_path_buf();
    // Generous bound so slow CI machines don't trip the lock timeout
    config.lock_wait_ms = 30_000;
    Arc::new(Ledger::open(config).await.unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_apply_exactly() {
    const TASKS: u64 = 8;
    const ROUNDS: u64 = 10;
    const AMOUNT: u64 = 5;

    let temp = tempfile::tempdir().unwrap();
    let ledger = open_ledger(temp.path()).await;

    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    ledger.create_wallet(&alice).await.unwrap();
    ledger.create_wallet(&bob).await.unwrap();
    ledger.deposit(&alice, Decimal::from(1000), None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let ledger = ledger.clone();
        let alice = alice.clone();
        let bob = bob.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                ledger
                    .transfer(&alice, &bob, Decimal::from(AMOUNT), None)
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let moved = Decimal::from(TASKS * ROUNDS * AMOUNT);
    assert_eq!(
        ledger.balance_of(&alice).unwrap(),
        Decimal::from(1000) - moved
    );
    assert_eq!(ledger.balance_of(&bob).unwrap(), moved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_excess_attempts_fail_without_partial_application() {
    const TASKS: usize = 8;
    const AMOUNT: u64 = 30;

    let temp = tempfile::tempdir().unwrap();
    let ledger = open_ledger(temp.path()).await;

    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    ledger.create_wallet(&alice).await.unwrap();
    ledger.create_wallet(&bob).await.unwrap();
    ledger.deposit(&alice, Decimal::from(100), None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let ledger = ledger.clone();
        let alice = alice.clone();
        let bob = bob.clone();
        handles.push(tokio::spawn(async move {
            ledger.transfer(&alice, &bob, Decimal::from(AMOUNT), None).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // 100 funds three 30-unit transfers, never a fourth
    assert_eq!(successes, 3);
    assert_eq!(ledger.balance_of(&alice).unwrap(), Decimal::from(10));
    assert_eq!(ledger.balance_of(&bob).unwrap(), Decimal::from(90));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    const ROUNDS: u64 = 20;

    let temp = tempfile::tempdir().unwrap();
    let ledger = open_ledger(temp.path()).await;

    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    ledger.create_wallet(&alice).await.unwrap();
    ledger.create_wallet(&bob).await.unwrap();
    ledger.deposit(&alice, Decimal::from(1000), None).await.unwrap();
    ledger.deposit(&bob, Decimal::from(1000), None).await.unwrap();

    let forward = {
        let ledger = ledger.clone();
        let alice = alice.clone();
        let bob = bob.clone();
        tokio::spawn(async move {
            for _ in 0..ROUNDS {
                ledger.transfer(&alice, &bob, Decimal::from(7), None).await.unwrap();
            }
        })
    };
    let backward = {
        let ledger = ledger.clone();
        let alice = alice.clone();
        let bob = bob.clone();
        tokio::spawn(async move {
            for _ in 0..ROUNDS {
                ledger.transfer(&bob, &alice, Decimal::from(3), None).await.unwrap();
            }
        })
    };

    forward.await.unwrap();
    backward.await.unwrap();

    let alice_balance = ledger.balance_of(&alice).unwrap();
    let bob_balance = ledger.balance_of(&bob).unwrap();
    assert_eq!(alice_balance + bob_balance, Decimal::from(2000));
    assert_eq!(
        alice_balance,
        Decimal::from(1000 - ROUNDS * 7 + ROUNDS * 3)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_pairs_proceed_independently() {
    let temp = tempfile::tempdir().unwrap();
    let ledger = open_ledger(temp.path()).await;

    let users: Vec<UserId> = (0..8).map(|i| UserId::new(format!("user-{i}"))).collect();
    for user in &users {
        ledger.create_wallet(user).await.unwrap();
        ledger.deposit(user, Decimal::from(500), None).await.unwrap();
    }

    let mut handles = Vec::new();
    for pair in users.chunks(2) {
        let ledger = ledger.clone();
        let payer = pair[0].clone();
        let payee = pair[1].clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                ledger.transfer(&payer, &payee, Decimal::from(2), None).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for pair in users.chunks(2) {
        assert_eq!(ledger.balance_of(&pair[0]).unwrap(), Decimal::from(450));
        assert_eq!(ledger.balance_of(&pair[1]).unwrap(), Decimal::from(550));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_submitted_accept_is_idempotent_safe() {
    let temp = tempfile::tempdir().unwrap();
    let ledger = open_ledger(temp.path()).await;

    let requester = UserId::new("requester");
    let payer = UserId::new("payer");
    ledger.create_wallet(&requester).await.unwrap();
    ledger.create_wallet(&payer).await.unwrap();
    ledger.deposit(&payer, Decimal::from(1000), None).await.unwrap();

    let request = ledger
        .request_money(&requester, &payer, Decimal::from(100), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let ledger = ledger.clone();
        let payer = payer.clone();
        handles.push(tokio::spawn(
            async move { ledger.accept_request(request.id, &payer).await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::InvalidStateTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Exactly one accept wins; the money moves exactly once
    assert_eq!(successes, 1);
    assert_eq!(ledger.balance_of(&payer).unwrap(), Decimal::from(900));
    assert_eq!(ledger.balance_of(&requester).unwrap(), Decimal::from(100));
    assert_eq!(
        ledger.request(request.id).unwrap().status,
        RequestStatus::Accepted
    );
}
