//! Tests of the data-access facade: topics, cancellation, confirmation
//! waits, degraded reads, pruning and metrics

mod common;

use common::{channel, harness, harness_with, request, test_config, topic};
use reqnet_data_access::{
    metrics, Collaborators, DataAccess, DataAccessError, ErrorKind, FailureKind,
};
use reqnet_pending::PendingEvent;
use reqnet_primitives::BlockOrder;
use reqnet_types::ChainRegistry;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ==================== Construction ====================

#[test]
fn test_unknown_network_is_config_error() {
    let mut config = test_config();
    config.network = "ropsten".to_string();
    let (collaborators, _, _) = Collaborators::in_memory();

    let result = DataAccess::new(config, &ChainRegistry::evm_defaults(), collaborators);
    assert!(matches!(result, Err(DataAccessError::Config(_))));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = test_config();
    config.pending.max_per_channel = config.pending.max_entries + 1;
    let (collaborators, _, _) = Collaborators::in_memory();

    let err = DataAccess::new(config, &ChainRegistry::evm_defaults(), collaborators)
        .err()
        .unwrap();
    assert_eq!(err.kind(), FailureKind::Logic);
}

#[test]
fn test_resolves_configured_chain() {
    let mut config = test_config();
    config.network = "sepolia".to_string();
    let h = harness_with(config);
    assert_eq!(h.access.chain().chain_id, 11_155_111);
    assert!(h.access.chain().testnet);
}

// ==================== Topics ====================

#[tokio::test]
async fn test_channels_by_topic_merge_indexed_and_pending() {
    let h = harness();
    let cancel = CancellationToken::new();

    let mut first = request(channel(1), "a");
    first.topics = vec![topic(1)];
    let mut second = request(channel(2), "b");
    second.topics = vec![topic(1), topic(2)];
    let mut third = request(channel(3), "c");
    third.topics = vec![topic(3)];

    let receipt = h.access.submit(first, &cancel).await.unwrap();
    h.access.submit(second, &cancel).await.unwrap();
    h.access.submit(third, &cancel).await.unwrap();
    h.chain.confirm_at(&receipt.anchor_tx_ref, BlockOrder::new(1, 0));

    let views = h.access.get_channels_by_topic(&topic(1), &cancel).await.unwrap();
    let ids: Vec<_> = views.iter().map(|v| v.channel_id).collect();
    assert_eq!(ids, vec![channel(1), channel(2)]);
    assert_eq!(views[0].confirmed().count(), 1);
    assert_eq!(views[1].pending().count(), 1);

    let views = h
        .access
        .get_channels_by_multiple_topics(&[topic(2), topic(3)], &cancel)
        .await
        .unwrap();
    let ids: Vec<_> = views.iter().map(|v| v.channel_id).collect();
    assert_eq!(ids, vec![channel(2), channel(3)]);

    let none = h.access.get_channels_by_topic(&topic(9), &cancel).await.unwrap();
    assert!(none.is_empty());
}

// ==================== Cancellation ====================

#[tokio::test]
async fn test_cancelled_token_stops_submit_and_read() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .access
        .submit(request(channel(1), "P"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::Cancelled));
    assert_eq!(h.content.put_calls(), 0);

    let err = h.access.get_channel(&channel(1), &cancel).await.unwrap_err();
    assert!(matches!(err, DataAccessError::Cancelled));
    assert_eq!(h.chain.query_calls(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_retry_backoff() {
    let mut config = test_config();
    config.retry.initial_delay_ms = 60_000;
    config.retry.max_delay_ms = 60_000;
    let h = harness_with(config);
    h.chain.fail_submits(1);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        h.access.submit(request(channel(1), "P"), &cancel),
    )
    .await
    .expect("cancellation must end the backoff")
    .unwrap_err();
    assert!(matches!(err, DataAccessError::Cancelled));
    assert_eq!(h.chain.submit_calls(), 1);
    assert!(h.access.pending().is_empty());
}

// ==================== Confirmation wait ====================

#[tokio::test]
async fn test_wait_for_confirmation_returns_transaction() {
    let h = harness();
    let cancel = CancellationToken::new();
    let c1 = channel(1);
    let receipt = h.access.submit(request(c1, "P"), &cancel).await.unwrap();

    let chain = h.chain.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        chain.mine_block();
    });

    let tx = h
        .access
        .wait_for_confirmation(&c1, &receipt.content_address, Duration::from_secs(5), &cancel)
        .await
        .unwrap()
        .expect("confirmed before timeout");
    assert_eq!(tx.position, Some(0));
    assert_eq!(tx.content_address, receipt.content_address);
    assert!(h.access.pending().is_empty());
}

#[tokio::test]
async fn test_wait_for_confirmation_times_out() {
    let h = harness();
    let cancel = CancellationToken::new();
    let c1 = channel(1);
    let receipt = h.access.submit(request(c1, "P"), &cancel).await.unwrap();

    let result = h
        .access
        .wait_for_confirmation(&c1, &receipt.content_address, Duration::from_millis(40), &cancel)
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(h.access.pending().len(), 1);
}

#[tokio::test]
async fn test_wait_for_unreadable_confirmation_is_bad_data() {
    let h = harness();
    let cancel = CancellationToken::new();
    let c1 = channel(1);
    let receipt = h.access.submit(request(c1, "P"), &cancel).await.unwrap();
    h.chain.mine_block();
    h.content.remove(&receipt.content_address);

    let err = h
        .access
        .wait_for_confirmation(&c1, &receipt.content_address, Duration::from_secs(1), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::BadData(_)));
}

// ==================== Indexer outages ====================

#[tokio::test]
async fn test_indexer_outage_without_fallback() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();
    h.chain.set_indexer_down(true);

    let err = h.access.get_channel(&channel(1), &cancel).await.unwrap_err();
    match &err {
        DataAccessError::IndexUnavailable(e) => assert_eq!(e.kind, ErrorKind::Connection),
        other => panic!("expected IndexUnavailable, got {:?}", other),
    }
    assert_eq!(err.kind(), FailureKind::Connection);
    assert_eq!(h.chain.query_calls(), 4);
}

#[tokio::test]
async fn test_indexer_outage_with_fallback_is_degraded() {
    let mut config = test_config();
    config.read.fallback_to_pending = true;
    let h = harness_with(config);
    let cancel = CancellationToken::new();
    h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();
    h.chain.set_indexer_down(true);

    let view = h.access.get_channel(&channel(1), &cancel).await.unwrap();
    assert!(view.degraded);
    assert_eq!(view.pending().count(), 1);

    let views = h.access.get_channels_by_topic(&topic(1), &cancel).await.unwrap();
    assert!(views.is_empty());

    h.chain.set_indexer_down(false);
    let view = h.access.get_channel(&channel(1), &cancel).await.unwrap();
    assert!(!view.degraded);
    assert_eq!(h.access.metrics_snapshot().counter(metrics::READ_DEGRADED), 1);
}

#[tokio::test]
async fn test_transient_indexer_failure_is_retried() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();
    h.chain.mine_block();
    h.chain.fail_queries(2);

    let view = h.access.get_channel(&channel(1), &cancel).await.unwrap();
    assert_eq!(view.confirmed().count(), 1);
    assert_eq!(h.chain.query_calls(), 3);
}

// ==================== Pruning ====================

#[tokio::test]
async fn test_pruner_fails_stale_submissions() {
    let mut config = test_config();
    config.pending.max_age_secs = 0;
    config.prune_interval_secs = 1;
    let h = harness_with(config);
    let cancel = CancellationToken::new();
    let receipt = h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();

    let stop = CancellationToken::new();
    let pruner = h.access.spawn_pruner(stop.clone());
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    stop.cancel();
    pruner.await.unwrap();

    assert!(h.access.pending().is_empty());
    let failures = h.access.poll_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].receipt, receipt);
    assert_eq!(failures[0].reason, "not confirmed within 0s");
    assert!(h.access.poll_failures().is_empty());
    assert_eq!(h.access.metrics_snapshot().counter(metrics::PENDING_PRUNED), 1);
}

#[tokio::test]
async fn test_prune_expired_keeps_fresh_entries() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();

    assert_eq!(h.access.prune_expired(), 0);
    assert_eq!(h.access.pending().len(), 1);
    assert!(h.access.poll_failures().is_empty());
}

// ==================== Events and metrics ====================

#[tokio::test]
async fn test_subscribers_see_registration_and_confirmation() {
    let h = harness();
    let cancel = CancellationToken::new();
    let mut events = h.access.subscribe();

    let receipt = h.access.submit(request(channel(1), "P"), &cancel).await.unwrap();
    h.chain.mine_block();
    h.access.get_channel(&channel(1), &cancel).await.unwrap();

    match events.recv().await.unwrap() {
        PendingEvent::Registered(entry) => assert_eq!(entry.anchor_tx_ref, receipt.anchor_tx_ref),
        other => panic!("expected Registered, got {:?}", other),
    }
    match events.recv().await.unwrap() {
        PendingEvent::Confirmed(entry) => {
            assert_eq!(entry.content_address, receipt.content_address)
        }
        other => panic!("expected Confirmed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_metrics_snapshot() {
    let h = harness();
    let cancel = CancellationToken::new();

    h.access.submit(request(channel(1), "ok"), &cancel).await.unwrap();
    h.access.submit(request(channel(1), "ok"), &cancel).await.unwrap();
    h.chain.fail_submits(4);
    h.access
        .submit(request(channel(1), "lost"), &cancel)
        .await
        .unwrap_err();
    h.access.get_channel(&channel(1), &cancel).await.unwrap();

    let snapshot = h.access.metrics_snapshot();
    assert_eq!(snapshot.counter(metrics::SUBMIT_TOTAL), 2);
    assert_eq!(snapshot.counter(metrics::SUBMIT_DEDUPLICATED), 1);
    assert_eq!(snapshot.counter(metrics::SUBMIT_FAILED), 1);
    assert_eq!(snapshot.counter(metrics::READ_TOTAL), 1);
    assert_eq!(snapshot.counter("chain_anchor.submit.retries"), 3);
    assert_eq!(snapshot.gauges.get(metrics::PENDING_ENTRIES), Some(&1));
    assert_eq!(snapshot.histograms[metrics::SUBMIT_LATENCY].count, 3);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains(metrics::SUBMIT_TOTAL));
}
