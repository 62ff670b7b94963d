// tests/session_lifecycle.rs
//
// Store-level lifecycle: completion triggers, idempotent completion,
// background sweep, stale eviction and archival ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use honeypot_engine::config::{CompletionConfig, RetentionConfig};
use honeypot_engine::model::{ConversationPhase, IntelligenceBundle, MessageRecord};
use honeypot_engine::session::{
    sweeper, CompletionEvent, CompletionObserver, CompletionTrigger, ManualClock, SessionStore,
};

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl CompletionObserver for Counting {
    fn on_complete(&self, _event: &CompletionEvent) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn store_at_epoch() -> (Arc<SessionStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(SessionStore::with_clock(
        CompletionConfig::default(),
        clock.clone(),
    ));
    (store, clock)
}

#[test]
fn disengagement_completes_with_empty_bundle() {
    let (store, _clock) = store_at_epoch();
    let obs = Arc::new(Counting::default());
    store.register_observer(obs.clone());

    store.get_or_create("quiet", None);
    let msgs = [
        MessageRecord::adversary("hello", 1),
        MessageRecord::responder("hi", 2),
        MessageRecord::adversary("you there?", 3),
        MessageRecord::responder("yes", 4),
        MessageRecord::responder("hello?", 5),
        MessageRecord::responder("anyone?", 6),
    ];
    for m in msgs {
        assert!(store.append("quiet", m));
    }

    assert_eq!(
        store.evaluate_and_complete("quiet"),
        Some(CompletionTrigger::Disengagement)
    );
    let s = store.snapshot("quiet").unwrap();
    assert!(s.complete);
    assert!(s.intelligence.is_empty());
    assert_eq!(s.phase, ConversationPhase::Conclusion);
    assert_eq!(obs.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn hard_cap_completes_a_one_sided_conversation() {
    let (store, _clock) = store_at_epoch();
    store.get_or_create("cap", None);

    for i in 0..19 {
        assert!(store.append("cap", MessageRecord::adversary("pay the fee", i)));
        assert_eq!(store.evaluate_and_complete("cap"), None, "at {} messages", i + 1);
    }
    assert!(store.append("cap", MessageRecord::adversary("pay the fee", 19)));
    assert_eq!(
        store.evaluate_and_complete("cap"),
        Some(CompletionTrigger::HardCap)
    );
    assert!(store.snapshot("cap").unwrap().complete);
}

#[test]
fn completion_is_idempotent() {
    let (store, _clock) = store_at_epoch();
    let obs = Arc::new(Counting::default());
    store.register_observer(obs.clone());
    store.get_or_create("s", None);

    assert!(store.complete("s"));
    assert!(store.complete("s"));
    assert!(store.force_complete("s", "again"));
    assert_eq!(store.evaluate_and_complete("s"), None);
    assert_eq!(obs.calls.load(Ordering::SeqCst), 1);

    assert!(!store.complete("missing"));
}

#[test]
fn confidence_updates_keep_last_valid_value() {
    let (store, _clock) = store_at_epoch();
    store.get_or_create("c", None);

    for v in [0.0_f32, 0.25, 1.0, 0.7] {
        assert!(store.update_confidence("c", v));
        assert_eq!(store.snapshot("c").unwrap().scam_confidence, v);
    }
    assert!(!store.update_confidence("c", 1.5));
    assert!(!store.update_confidence("c", f32::NAN));
    assert_eq!(store.snapshot("c").unwrap().scam_confidence, 0.7);
}

#[test]
fn intelligence_merge_is_commutative() {
    let (store, _clock) = store_at_epoch();
    let mut a = IntelligenceBundle::default();
    a.phone_numbers.insert("9876543210".into());
    a.payment_handles.insert("x@ybl".into());
    let mut b = IntelligenceBundle::default();
    b.phone_numbers.insert("9123456789".into());
    b.payment_handles.insert("x@ybl".into());

    store.get_or_create("ab", None);
    store.get_or_create("ba", None);
    store.merge_intelligence("ab", &a);
    store.merge_intelligence("ab", &b);
    store.merge_intelligence("ba", &b);
    store.merge_intelligence("ba", &a);
    store.merge_intelligence("ba", &a);

    let ab = store.snapshot("ab").unwrap().intelligence;
    let ba = store.snapshot("ba").unwrap().intelligence;
    assert_eq!(ab.phone_numbers, ba.phone_numbers);
    assert_eq!(ab.payment_handles, ba.payment_handles);
    assert_eq!(ab.payment_handles.len(), 1);
    assert_eq!(ab.phone_numbers.len(), 2);
}

#[test]
fn archive_keeps_the_two_most_recent() {
    let (store, clock) = store_at_epoch();
    for i in 0..5 {
        let id = format!("s{i}");
        store.get_or_create(&id, None);
        clock.advance(Duration::minutes(1));
        assert!(store.complete(&id));
    }

    assert_eq!(store.archive_excess_completed(2), 3);
    let mut kept: Vec<String> = store.completed().into_iter().map(|s| s.id).collect();
    kept.sort();
    assert_eq!(kept, vec!["s3".to_string(), "s4".to_string()]);
    assert_eq!(store.archive_excess_completed(2), 0);
}

#[test]
fn sweep_catches_idle_sessions_and_evicts_stale_ones() {
    let (store, clock) = store_at_epoch();
    let retention = RetentionConfig {
        session_timeout_minutes: 60,
        max_completed_sessions: 10,
        sweep_interval_secs: 0,
    };

    store.get_or_create("idle", None);
    for (i, t) in ["hi", "hello", "pay me"].iter().enumerate() {
        store.append("idle", MessageRecord::adversary(*t, i as i64));
    }
    store.get_or_create("fresh", None);

    clock.advance(Duration::minutes(31));
    store.get_or_create("fresh", None);

    let report = sweeper::run_once(&store, &retention);
    assert_eq!(report.completed, vec!["idle".to_string()]);
    assert_eq!(report.evicted, 0);
    assert!(!store.snapshot("fresh").unwrap().complete);

    clock.advance(Duration::minutes(61));
    let report = sweeper::run_once(&store, &retention);
    assert_eq!(report.evicted, 2);
    assert!(store.is_empty());
}

#[test]
fn reads_leave_activity_time_alone() {
    let (store, clock) = store_at_epoch();
    let created = store.get_or_create("r", None).last_activity;

    clock.advance(Duration::minutes(5));
    assert_eq!(store.snapshot("r").unwrap().last_activity, created);
    assert!(store.history("r").is_empty());
    let _ = store.stats();
    assert_eq!(store.snapshot("r").unwrap().last_activity, created);

    assert!(store.append("r", MessageRecord::adversary("hi", 1)));
    assert_eq!(
        store.snapshot("r").unwrap().last_activity,
        created + Duration::minutes(5)
    );
}
