//! End-to-end tests for the production runner.
//!
//! Evidence goes in through the runner's channel; blocks come out of a
//! [`ChannelSink`] with their command bodies attached.

use phalanx_core::Event;
use phalanx_production::{
    ChannelSink, MemoryCommandStore, NodeConfig, OrderingRunner, RecordingSink, RunnerError,
};
use phalanx_types::{Command, OrderInfo, QuorumParams, ReplicaId, SeqNo};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const BLOCK_TIMEOUT: Duration = Duration::from_secs(5);

fn command(author: u64, sequence: u64) -> Command {
    Command::new(
        ReplicaId(author),
        sequence,
        vec![format!("tx-{author}-{sequence}").into_bytes()],
    )
}

/// Orders from authors 1..=3 placing `commands` in the given order.
fn orders_for(commands: &[&Command]) -> Vec<OrderInfo> {
    let mut orders = Vec::new();
    for author in 1..=3 {
        for (i, cmd) in commands.iter().enumerate() {
            orders.push(OrderInfo::new(
                ReplicaId(author),
                i as u64 + 1,
                cmd.digest,
                100 + i as i64,
            ));
        }
    }
    orders
}

#[tokio::test]
async fn test_runner_delivers_blocks_in_order() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryCommandStore::new());
    let first = command(1, 1);
    let second = command(2, 1);
    store.insert(first.clone());
    store.insert(second.clone());

    let (sink, mut blocks) = ChannelSink::new();
    let mut runner = OrderingRunner::builder()
        .params(QuorumParams::new(4).unwrap())
        .replica_id(ReplicaId(1))
        .command_store(store)
        .sink(Arc::new(sink))
        .channel_capacity(16)
        .build()
        .unwrap();

    let evidence = runner.evidence_sender();
    let shutdown = runner.shutdown_handle().unwrap();
    assert!(runner.shutdown_handle().is_none());
    let handle = tokio::spawn(runner.run());

    for info in orders_for(&[&first, &second]) {
        evidence.send(Event::OrderReceived { info }).await.unwrap();
    }

    let (seq, block) = timeout(BLOCK_TIMEOUT, blocks.recv()).await.unwrap().unwrap();
    assert_eq!(seq, SeqNo(1));
    assert_eq!(block.command, first);
    assert_eq!(block.trusted_ts, 100);

    let (seq, block) = timeout(BLOCK_TIMEOUT, blocks.recv()).await.unwrap().unwrap();
    assert_eq!(seq, SeqNo(2));
    assert_eq!(block.command, second);

    shutdown.shutdown();
    let stats = timeout(BLOCK_TIMEOUT, handle).await.unwrap().unwrap().unwrap();
    assert_eq!(stats.committed, 2);
    assert_eq!(stats.last_seq_no, 2);
}

#[tokio::test]
async fn test_runner_waits_for_missing_command_body() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryCommandStore::new());
    let late = command(3, 1);

    let (sink, mut blocks) = ChannelSink::new();
    let mut runner = OrderingRunner::builder()
        .params(QuorumParams::new(4).unwrap())
        .replica_id(ReplicaId(2))
        .command_store(store.clone())
        .sink(Arc::new(sink))
        .command_poll_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    let evidence = runner.evidence_sender();
    let shutdown = runner.shutdown_handle().unwrap();
    let handle = tokio::spawn(runner.run());

    evidence
        .send(Event::OrderStreamReceived {
            stream: orders_for(&[&late]),
        })
        .await
        .unwrap();

    // Ordered but not deliverable until the body shows up.
    assert!(timeout(Duration::from_millis(100), blocks.recv()).await.is_err());

    store.insert(late.clone());
    let (seq, block) = timeout(BLOCK_TIMEOUT, blocks.recv()).await.unwrap().unwrap();
    assert_eq!(seq, SeqNo(1));
    assert_eq!(block.command, late);

    drop(shutdown);
    assert!(timeout(BLOCK_TIMEOUT, handle).await.unwrap().unwrap().is_ok());
}

#[test]
fn test_builder_requires_fields() {
    let missing = OrderingRunner::builder()
        .params(QuorumParams::new(4).unwrap())
        .replica_id(ReplicaId(1))
        .sink(Arc::new(RecordingSink::new()))
        .build();
    assert!(matches!(missing, Err(RunnerError::MissingField("command_store"))));

    let foreign = OrderingRunner::builder()
        .params(QuorumParams::new(4).unwrap())
        .replica_id(ReplicaId(9))
        .command_store(Arc::new(MemoryCommandStore::new()))
        .sink(Arc::new(RecordingSink::new()))
        .build();
    assert!(matches!(foreign, Err(RunnerError::Ordering(_))));
}

#[test]
fn test_builder_from_node_config() {
    let config = NodeConfig::from_toml_str(
        r#"
        [node]
        replica_id = 3
        replica_count = 4

        [ordering]
        strategy = "anchor_front"
        "#,
    )
    .unwrap();

    let runner = OrderingRunner::builder()
        .node_config(&config)
        .unwrap()
        .command_store(Arc::new(MemoryCommandStore::new()))
        .sink(Arc::new(RecordingSink::new()))
        .build()
        .unwrap();
    assert_eq!(runner.replica_id(), ReplicaId(3));
}
