//! Event stream: replay, live delivery, keep-alive, cancellation, shutdown.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use viewer_core::{Delivery, Viewer, ViewerConfig, ViewerError};
use viewer_kernel::MockKernel;

fn viewer_with(config: ViewerConfig) -> (Arc<MockKernel>, Arc<Viewer>) {
    let kernel = Arc::new(MockKernel::new());
    let viewer = Arc::new(Viewer::new(kernel.clone(), config));
    (kernel, viewer)
}

fn viewer() -> (Arc<MockKernel>, Arc<Viewer>) {
    viewer_with(ViewerConfig::responsive())
}

#[test]
fn late_subscriber_gets_one_synthetic_event_per_object() {
    let (kernel, viewer) = viewer();
    for size in 1..=5 {
        viewer
            .show(&[kernel.make_box(size as f64, 1.0, 1.0)], &["part"])
            .unwrap();
    }
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["other"])
        .unwrap();

    let sub = viewer.subscribe().unwrap();
    let replay = sub.drain();
    assert_eq!(replay.len(), 2);
    assert_eq!(replay[0].name, "part");
    assert_eq!(replay[0].revision, 5);
    assert_eq!(replay[1].name, "other");
    assert!(replay.iter().all(|e| !e.removed));
}

#[test]
fn replay_is_ordered_by_latest_sequence() {
    let (kernel, viewer) = viewer();
    let h = kernel.make_box(1.0, 1.0, 1.0);
    viewer.show(&[h.clone(), h.clone()], &["a", "b"]).unwrap();
    viewer.show(&[h], &["a"]).unwrap();

    let sub = viewer.subscribe().unwrap();
    let names: Vec<String> = sub.drain().into_iter().map(|e| e.name).collect();
    // list order is first-show order, replay order is latest-event order
    assert_eq!(viewer.list_names(), vec!["a", "b"]);
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn live_events_follow_replay_without_gap() {
    let (kernel, viewer) = viewer();
    let h = kernel.make_box(1.0, 1.0, 1.0);
    viewer.show(&[h.clone()], &["a"]).unwrap();
    let sub = viewer.subscribe().unwrap();
    viewer.show(&[h], &["b"]).unwrap();
    viewer.remove(&["a"]);

    let seqs: Vec<(String, bool)> = sub
        .drain()
        .into_iter()
        .map(|e| (e.name, e.removed))
        .collect();
    assert_eq!(
        seqs,
        vec![
            ("a".to_string(), false),
            ("b".to_string(), false),
            ("a".to_string(), true)
        ]
    );
}

#[test]
fn keepalive_after_idle_window() {
    let (_kernel, viewer) = viewer();
    let sub = viewer.subscribe().unwrap();
    let started = Instant::now();
    assert_eq!(sub.recv(), Delivery::KeepAlive);
    assert!(started.elapsed() >= viewer.config().keepalive);
}

#[test]
fn clear_emits_one_removal_per_object() {
    let (kernel, viewer) = viewer();
    let h = kernel.make_box(1.0, 1.0, 1.0);
    viewer.show(&[h.clone(), h], &["a", "b"]).unwrap();
    let sub = viewer.subscribe().unwrap();
    sub.drain();

    viewer.clear();
    let events = sub.drain();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.removed));

    viewer.clear();
    assert_eq!(sub.pending_len(), 0, "clearing an empty registry is silent");
}

#[test]
fn concurrent_subscribers_see_identical_order() {
    let (kernel, viewer) = viewer();
    let a = viewer.subscribe().unwrap();
    let b = viewer.subscribe().unwrap();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let viewer = Arc::clone(&viewer);
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                for i in 0..10 {
                    let name = format!("w{w}_{}", i % 3);
                    let h = kernel.make_box(1.0 + i as f64, 1.0, 1.0);
                    viewer.show(&[h], &[name.as_str()]).unwrap();
                    if i % 4 == 0 {
                        viewer.remove(&[name.as_str()]);
                    }
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let seen_a: Vec<u64> = a.drain().iter().map(|e| e.sequence).collect();
    let seen_b: Vec<u64> = b.drain().iter().map(|e| e.sequence).collect();
    assert!(!seen_a.is_empty());
    assert_eq!(seen_a, seen_b);
    assert!(seen_a.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn receiver_on_other_thread_sees_events_in_order() {
    let (kernel, viewer) = viewer();
    let sub = viewer.subscribe().unwrap();
    let token = sub.cancel_token();

    let reader = thread::spawn(move || {
        let mut names = Vec::new();
        for delivery in sub {
            if let Delivery::Event(event) = delivery {
                names.push(event.name);
            }
        }
        names
    });

    let h = kernel.make_box(1.0, 1.0, 1.0);
    viewer.show(&[h.clone()], &["one"]).unwrap();
    viewer.show(&[h], &["two"]).unwrap();
    thread::sleep(Duration::from_millis(100));
    token.cancel();

    assert_eq!(reader.join().unwrap(), vec!["one", "two"]);
}

#[test]
fn cancelled_subscription_returns_promptly_and_is_released() {
    let (kernel, viewer) = viewer_with(ViewerConfig {
        keepalive: Duration::from_secs(10),
        ..ViewerConfig::default()
    });
    let sub = viewer.subscribe().unwrap();
    let token = sub.cancel_token();

    let waiter = thread::spawn(move || {
        let started = Instant::now();
        (sub.recv(), started.elapsed())
    });
    thread::sleep(Duration::from_millis(50));
    token.cancel();
    let (delivery, waited) = waiter.join().unwrap();
    assert_eq!(delivery, Delivery::Cancelled);
    assert!(waited < Duration::from_secs(10));

    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["a"])
        .unwrap();
    assert_eq!(viewer.registry().bus().subscriber_count(), 0);
}

#[test]
fn slow_subscriber_is_coalesced_not_blocking() {
    let (kernel, viewer) = viewer_with(ViewerConfig {
        subscriber_queue_capacity: 4,
        ..ViewerConfig::responsive()
    });
    let slow = viewer.subscribe().unwrap();

    let h = kernel.make_box(1.0, 1.0, 1.0);
    for _ in 0..50 {
        viewer.show(&[h.clone()], &["spinner"]).unwrap();
    }

    let revisions: Vec<u64> = slow.drain().iter().map(|e| e.revision).collect();
    assert_eq!(revisions, vec![47, 48, 49, 50]);
    assert_eq!(slow.coalesced_count(), 46);
}

#[test]
fn shutdown_closes_streams_and_rejects_new_subscribers() {
    let (_kernel, viewer) = viewer();
    let sub = viewer.subscribe().unwrap();
    viewer.shutdown();
    assert_eq!(sub.recv(), Delivery::Closed);
    assert!(matches!(viewer.subscribe(), Err(ViewerError::Shutdown)));
}
