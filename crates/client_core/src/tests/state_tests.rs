use super::*;

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

#[tokio::test]
async fn scan_emits_running_sums() {
    let sums: Vec<i32> = scan(stream::iter(vec![1, 2, 3]), 0, CancellationToken::new(), |acc, n| {
        acc + n
    })
    .collect()
    .await;
    assert_eq!(sums, vec![1, 3, 6]);
}

#[tokio::test]
async fn scan_over_empty_source_emits_nothing() {
    let sums: Vec<i32> = stream::iter(Vec::<i32>::new())
        .scan_states(10, CancellationToken::new(), |acc, n| acc + n)
        .collect()
        .await;
    assert!(sums.is_empty());
}

#[tokio::test]
async fn scan_accumulates_snapshots() {
    let snapshots: Vec<Vec<&str>> = stream::iter(vec!["a", "b"])
        .scan_states(Vec::new(), CancellationToken::new(), |mut acc, item| {
            acc.push(item);
            acc
        })
        .collect()
        .await;
    assert_eq!(snapshots, vec![vec!["a"], vec!["a", "b"]]);
}

#[tokio::test]
async fn cancelled_scan_stops_pulling_from_source() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let source = stream::iter(1..=100).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let token = CancellationToken::new();
    let mut sums = scan(source, 0, token.clone(), |acc, n| acc + n);

    assert_eq!(sums.next().await, Some(1));
    assert_eq!(sums.next().await, Some(3));
    token.cancel();
    assert_eq!(sums.next().await, None);
    assert_eq!(sums.next().await, None);
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancellation_wakes_scan_waiting_on_silent_source() {
    let token = CancellationToken::new();
    let mut sums = scan(stream::pending::<i32>(), 0, token.clone(), |acc, n| acc + n);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(2), sums.next())
        .await
        .expect("cancellation observed without producer activity");
    assert_eq!(next, None);
}

#[tokio::test]
async fn subscribers_only_see_values_after_attaching() {
    let states = StateStream::new(8);
    states.publish(1);
    let mut late = states.subscribe();
    states.publish(2);
    states.publish(3);
    assert_eq!(late.recv().await, Some(2));
    assert_eq!(late.recv().await, Some(3));
}

#[tokio::test]
async fn every_consumer_receives_each_value() {
    let states = StateStream::new(8);
    let mut first = states.subscribe();
    let mut second = states.subscribe();
    assert_eq!(states.subscriber_count(), 2);
    states.publish("ready".to_string());
    assert_eq!(first.recv().await.as_deref(), Some("ready"));
    assert_eq!(second.recv().await.as_deref(), Some("ready"));
}

#[tokio::test]
async fn equal_consecutive_values_are_suppressed() {
    let states = StateStream::new(8);
    let consumer = states.subscribe();
    assert!(states.publish(5));
    assert!(!states.publish(5));
    assert!(states.publish(6));
    assert_eq!(states.current(), Some(6));
    states.close();
    let received: Vec<i32> = consumer.into_stream().collect().await;
    assert_eq!(received, vec![5, 6]);
}

#[tokio::test]
async fn closing_producer_ends_consumers() {
    let states: StateStream<u8> = StateStream::new(4);
    let mut consumer = states.subscribe();
    states.close();
    assert_eq!(consumer.recv().await, None);
}

#[tokio::test]
async fn cancelled_subscription_ends_without_producer_signal() {
    let states: StateStream<u8> = StateStream::new(4);
    let token = CancellationToken::new();
    let mut consumer = states.subscribe().with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(2), consumer.recv())
        .await
        .expect("cancellation observed");
    assert_eq!(next, None);
    assert!(states.publish(1));
}

#[tokio::test]
async fn lagged_consumer_skips_to_newest_values() {
    let states = StateStream::new(2);
    let mut consumer = states.subscribe();
    for value in 1..=5 {
        states.publish(value);
    }
    assert_eq!(consumer.recv().await, Some(4));
    assert_eq!(consumer.recv().await, Some(5));
}

#[tokio::test]
async fn scan_composes_with_state_subscription() {
    let states = StateStream::new(8);
    let token = CancellationToken::new();
    let totals = states
        .subscribe()
        .into_stream()
        .scan_states(0, token, |acc, n: i32| acc + n);
    states.publish(2);
    states.publish(5);
    states.close();
    let collected: Vec<i32> = totals.collect().await;
    assert_eq!(collected, vec![2, 7]);
}
