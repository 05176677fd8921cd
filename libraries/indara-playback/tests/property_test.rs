//! Property-based tests for the playback engine
//!
//! Uses proptest to verify invariants across many random command sequences.

use indara_playback::format::format_time;
use indara_playback::testing::ScriptedFactory;
use indara_playback::{AudioService, PlaybackConfig, QueueController, Track};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ===== Helpers =====

fn track(id: usize) -> Track {
    Track::new(
        format!("t{id}"),
        format!("Track {id}"),
        format!("https://cdn.indara.test/{id}.mp3"),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Debug, Clone)]
enum QueueOp {
    Next,
    Previous,
    SkipTo(usize),
    Append(usize),
    Remove(usize),
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        Just(QueueOp::Next),
        Just(QueueOp::Previous),
        (0usize..20).prop_map(QueueOp::SkipTo),
        (0usize..30).prop_map(QueueOp::Append),
        (0usize..20).prop_map(QueueOp::Remove),
    ]
}

#[derive(Debug, Clone)]
enum TransportOp {
    Load { duration_secs: u64 },
    Play,
    Pause,
    Seek(u64),
    Advance(u64),
    Unload,
}

fn transport_op() -> impl Strategy<Value = TransportOp> {
    prop_oneof![
        (1u64..400).prop_map(|duration_secs| TransportOp::Load { duration_secs }),
        Just(TransportOp::Play),
        Just(TransportOp::Pause),
        (0u64..800).prop_map(TransportOp::Seek),
        (0u64..200).prop_map(TransportOp::Advance),
        Just(TransportOp::Unload),
    ]
}

// ===== Property Tests =====

proptest! {
    /// Property: the pointer always addresses an entry, and boundary moves leave it alone
    #[test]
    fn queue_pointer_stays_in_bounds(
        len in 1usize..15,
        start in 0usize..20,
        ops in prop::collection::vec(queue_op(), 0..60)
    ) {
        let mut queue = QueueController::new();
        queue.set_queue((0..len).map(track).collect(), start).unwrap();

        for op in ops {
            let before = queue.current_index();
            let at_end = !queue.has_next();
            let at_start = !queue.has_previous();

            match op {
                QueueOp::Next => {
                    let moved = queue.next().is_some();
                    prop_assert_eq!(moved, !at_end);
                    if at_end {
                        prop_assert_eq!(queue.current_index(), before);
                    }
                }
                QueueOp::Previous => {
                    let moved = queue.previous().is_some();
                    prop_assert_eq!(moved, !at_start);
                    if at_start {
                        prop_assert_eq!(queue.current_index(), before);
                    }
                }
                QueueOp::SkipTo(index) => {
                    let ok = queue.skip_to(index).is_ok();
                    prop_assert_eq!(ok, index < queue.len());
                }
                QueueOp::Append(id) => {
                    queue.append_unique(track(id));
                }
                QueueOp::Remove(index) => {
                    let current_id = queue.current().map(|t| t.id.clone());
                    if queue.remove(index).is_ok() {
                        prop_assert_eq!(queue.current().map(|t| t.id.clone()), current_id);
                    }
                }
            }

            let index = queue.current_index().unwrap();
            prop_assert!(index < queue.len());
        }
    }

    /// Property: queue ids stay unique under repeated appends
    #[test]
    fn append_unique_never_duplicates(ids in prop::collection::vec(0usize..10, 1..40)) {
        let mut queue = QueueController::new();
        queue.set_queue(vec![track(ids[0])], 0).unwrap();
        for id in &ids {
            queue.append_unique(track(*id));
        }

        let mut seen = std::collections::HashSet::new();
        prop_assert!(queue.tracks().iter().all(|t| seen.insert(t.id.clone())));
    }

    /// Property: a fully broken queue spends at most one skip per track
    #[test]
    fn auto_skip_is_bounded(len in 1usize..20, start in 0usize..20) {
        let mut queue = QueueController::new();
        queue.set_queue((0..len).map(track).collect(), start).unwrap();

        let mut skips = 0;
        while let Some(current) = queue.current().map(|t| t.id.clone()) {
            match queue.auto_advance(&current) {
                indara_playback::AutoAdvance::Skip(_) => skips += 1,
                _ => break,
            }
            prop_assert!(skips <= len);
        }
        prop_assert!(skips < len);
    }

    /// Property: every published position lies within the known duration
    #[test]
    fn position_never_exceeds_duration(ops in prop::collection::vec(transport_op(), 1..40)) {
        let rt = runtime();
        let violations = rt.block_on(async move {
            let factory = ScriptedFactory::push();
            let service = AudioService::new(factory.clone(), PlaybackConfig::default());

            let violations = Arc::new(AtomicUsize::new(0));
            let counter = violations.clone();
            let _sub = service.subscribe(move |state| {
                if !state.duration.is_zero() && state.position > state.duration {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });

            for (n, op) in ops.into_iter().enumerate() {
                match op {
                    TransportOp::Load { duration_secs } => {
                        let id = format!("t{n}");
                        factory.set_duration(&id, Duration::from_secs(duration_secs));
                        service.load(track(n), true).await;
                    }
                    TransportOp::Play => service.play().await,
                    TransportOp::Pause => service.pause().await,
                    TransportOp::Seek(secs) => service.seek(Duration::from_secs(secs)).await,
                    TransportOp::Advance(secs) => {
                        if let Some(backend) = factory.latest() {
                            backend.advance(Duration::from_secs(secs));
                        }
                    }
                    TransportOp::Unload => service.unload().await,
                }

                let state = service.state();
                if !state.duration.is_zero() && state.position > state.duration {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
            }

            violations.load(Ordering::SeqCst)
        });

        prop_assert_eq!(violations, 0);
    }

    /// Property: mute then unmute restores any level
    #[test]
    fn mute_round_trip_restores_level(level in 0.0f32..=1.0) {
        let rt = runtime();
        let (restored, muted_gain) = rt.block_on(async move {
            let factory = ScriptedFactory::push();
            let service = AudioService::new(factory.clone(), PlaybackConfig::default());
            service.load(track(0), false).await;

            service.set_volume(level).await;
            service.toggle_mute().await;
            let muted_gain = factory.latest().unwrap().volume();
            service.toggle_mute().await;
            (service.state().volume, muted_gain)
        });

        prop_assert_eq!(restored, level);
        prop_assert_eq!(muted_gain, Some(0.0));
    }

    /// Property: M:SS formatting round-trips whole seconds
    #[test]
    fn formatted_time_parses_back(secs in 0u64..100_000, millis in 0u64..1000) {
        let text = format_time(Duration::from_secs(secs) + Duration::from_millis(millis));
        let (minutes, seconds) = text.split_once(':').unwrap();

        prop_assert_eq!(seconds.len(), 2);
        let parsed = minutes.parse::<u64>().unwrap() * 60 + seconds.parse::<u64>().unwrap();
        prop_assert_eq!(parsed, secs);
    }
}
