//! Session store: the single owner of all conversation state.
//!
//! One store-wide `parking_lot::Mutex` guards the map and every session's
//! fields. Extraction and scoring happen before a merge call, outside the lock.
//! Mutators never raise: unknown ids yield `false`.
//!
//! Completion is a one-way transition performed under the lock; the snapshot
//! taken at that moment is handed to observers (the reporting dispatcher among
//! them) after the lock is released, exactly once per session.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::CompletionConfig;
use crate::model::{
    BehavioralProfile, Category, ConversationPhase, IntelligenceBundle, MessageRecord, Metadata,
    Session,
};
use crate::session::completion::{evaluate, CompletionTrigger};

// ------------------------------------------------------------
// Clock
// ------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and simulations.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }
    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock() = t;
    }
    pub fn advance(&self, by: chrono::Duration) {
        let mut g = self.now.lock();
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ------------------------------------------------------------
// Completion observers
// ------------------------------------------------------------

/// Emitted once per session, after the completion transition.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    /// Immutable copy taken at transition time.
    pub snapshot: Session,
    pub trigger: CompletionTrigger,
    pub reason: Option<String>,
}

pub trait CompletionObserver: Send + Sync {
    fn on_complete(&self, event: &CompletionEvent);
}

// ------------------------------------------------------------
// Store
// ------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub persona_active_sessions: usize,
    pub average_messages_per_session: f64,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    completion: CompletionConfig,
    observers: RwLock<Vec<Arc<dyn CompletionObserver>>>,
}

impl SessionStore {
    pub fn new(completion: CompletionConfig) -> Self {
        Self::with_clock(completion, Arc::new(SystemClock))
    }

    pub fn with_clock(completion: CompletionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            completion,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn CompletionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch or create. Metadata is applied on creation, and refreshed only
    /// while the session has not advanced past creation.
    pub fn get_or_create(&self, id: &str, metadata: Option<Metadata>) -> Session {
        let now = self.clock.now();
        let mut map = self.sessions.lock();
        let session = map.entry(id.to_string()).or_insert_with(|| {
            info!(target: "session", session_id = %id, "session created");
            metrics::counter!("sessions_created_total").increment(1);
            Session::new(id, None, now)
        });
        if let Some(md) = metadata {
            if session.is_pristine() && session.metadata.as_ref() != Some(&md) {
                debug!(target: "session", session_id = %id, "metadata refreshed");
                session.metadata = Some(md);
            }
        }
        session.last_activity = now;
        session.clone()
    }

    /// Copy of a session.
    ///
    /// Reads do not bump `last_activity`; only `get_or_create` and the
    /// mutators do. Otherwise polling a session would keep it clear of the
    /// inactivity trigger and stale eviction.
    pub fn snapshot(&self, id: &str) -> Option<Session> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Append a message; its timestamp is raised to keep the history non-decreasing.
    pub fn append(&self, id: &str, mut message: MessageRecord) -> bool {
        self.with_session(id, |s| {
            if let Some(last) = s.messages.last() {
                message.timestamp = message.timestamp.max(last.timestamp);
            }
            s.messages.push(message);
        })
    }

    /// Import caller-supplied history into an empty session. Returns the number
    /// of records imported (0 if the session already had messages).
    pub fn seed_history(&self, id: &str, history: Vec<MessageRecord>) -> usize {
        let mut imported = 0;
        self.with_session(id, |s| {
            if !s.messages.is_empty() {
                return;
            }
            let mut floor = i64::MIN;
            for mut m in history {
                if m.text.trim().is_empty() {
                    continue;
                }
                m.timestamp = m.timestamp.max(floor);
                floor = m.timestamp;
                s.messages.push(m);
                imported += 1;
            }
        });
        imported
    }

    /// Rejects values outside [0,1] (and NaN) with `false`; last write wins otherwise.
    pub fn update_confidence(&self, id: &str, value: f32) -> bool {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            debug!(target: "session", session_id = %id, value, "confidence rejected");
            return false;
        }
        self.with_session(id, |s| s.scam_confidence = value)
    }

    pub fn merge_intelligence(&self, id: &str, bundle: &IntelligenceBundle) -> bool {
        self.with_session(id, |s| {
            s.intelligence.merge(bundle);
            if s.phase == ConversationPhase::Engagement && bundle.has_contact_or_financial() {
                s.phase = ConversationPhase::Extraction;
            }
        })
    }

    pub fn merge_behavior(&self, id: &str, profile: &BehavioralProfile) -> bool {
        self.with_session(id, |s| s.behavior.merge(profile))
    }

    /// One-way false -> true; moves the phase into engagement.
    pub fn set_persona_active(&self, id: &str) -> bool {
        self.with_session(id, |s| {
            if !s.persona_active {
                s.persona_active = true;
                if s.phase == ConversationPhase::Introduction {
                    s.phase = ConversationPhase::Engagement;
                }
                info!(target: "session", session_id = %s.id, "persona activated");
            }
        })
    }

    /// `true` if the session is (now) complete, `false` if unknown.
    pub fn complete(&self, id: &str) -> bool {
        self.transition(id, CompletionTrigger::Forced, None)
    }

    pub fn force_complete(&self, id: &str, reason: &str) -> bool {
        self.transition(id, CompletionTrigger::Forced, Some(reason.to_string()))
    }

    /// Evaluate the completion policy and transition atomically if a trigger
    /// holds. Returns the trigger that fired.
    pub fn evaluate_and_complete(&self, id: &str) -> Option<CompletionTrigger> {
        let now = self.clock.now();
        let event = {
            let mut map = self.sessions.lock();
            let s = map.get_mut(id)?;
            let trigger = evaluate(s, now, &self.completion)?;
            Self::mark_complete(s, now);
            CompletionEvent {
                snapshot: s.clone(),
                trigger,
                reason: None,
            }
        };
        let trigger = event.trigger;
        self.notify(event);
        Some(trigger)
    }

    /// Run the completion policy over every active session without touching
    /// activity times, so the inactivity trigger can fire. Returns completed ids.
    pub fn sweep_completions(&self) -> Vec<String> {
        let now = self.clock.now();
        let events: Vec<CompletionEvent> = {
            let mut map = self.sessions.lock();
            map.values_mut()
                .filter_map(|s| {
                    let trigger = evaluate(s, now, &self.completion)?;
                    Self::mark_complete(s, now);
                    Some(CompletionEvent {
                        snapshot: s.clone(),
                        trigger,
                        reason: None,
                    })
                })
                .collect()
        };
        let ids: Vec<String> = events.iter().map(|e| e.snapshot.id.clone()).collect();
        if !ids.is_empty() {
            info!(target: "sweep", count = ids.len(), "auto-completed sessions");
        }
        for e in events {
            self.notify(e);
        }
        ids
    }

    /// Drop sessions idle longer than `max_idle`, complete or not.
    pub fn evict_stale(&self, max_idle: chrono::Duration) -> usize {
        let now = self.clock.now();
        let mut map = self.sessions.lock();
        let before = map.len();
        map.retain(|id, s| {
            let keep = now.signed_duration_since(s.last_activity) <= max_idle;
            if !keep {
                info!(target: "sweep", session_id = %id, complete = s.complete, "evicted stale session");
            }
            keep
        });
        let evicted = before - map.len();
        if evicted > 0 {
            metrics::counter!("sessions_evicted_total").increment(evicted as u64);
        }
        evicted
    }

    /// Keep at most `max_kept` completed sessions, archiving the least recently
    /// active ones first. Each archived session logs its summary.
    pub fn archive_excess_completed(&self, max_kept: usize) -> usize {
        let mut map = self.sessions.lock();
        let mut completed: Vec<(DateTime<Utc>, String)> = map
            .values()
            .filter(|s| s.complete)
            .map(|s| (s.last_activity, s.id.clone()))
            .collect();
        if completed.len() <= max_kept {
            return 0;
        }
        completed.sort();
        let excess = completed.len() - max_kept;
        for (_, id) in completed.into_iter().take(excess) {
            if let Some(s) = map.remove(&id) {
                let counts = s.intelligence.counts();
                info!(
                    target: "sweep",
                    session_id = %s.id,
                    messages = s.message_count(),
                    confidence = s.scam_confidence,
                    accounts = counts[&Category::FinancialAccounts],
                    handles = counts[&Category::PaymentHandles],
                    phones = counts[&Category::PhoneNumbers],
                    links = counts[&Category::SuspiciousLinks],
                    "archived session"
                );
            }
        }
        metrics::counter!("sessions_archived_total").increment(excess as u64);
        info!(target: "sweep", archived = excess, kept = max_kept, "archived completed sessions");
        excess
    }

    /// Aggregate counts. Does not bump any session's activity time.
    pub fn stats(&self) -> SessionStats {
        let map = self.sessions.lock();
        let total = map.len();
        let completed = map.values().filter(|s| s.complete).count();
        let persona = map.values().filter(|s| s.persona_active).count();
        let messages: usize = map.values().map(|s| s.message_count()).sum();
        SessionStats {
            total_sessions: total,
            active_sessions: total - completed,
            completed_sessions: completed,
            persona_active_sessions: persona,
            average_messages_per_session: if total > 0 {
                messages as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .values()
            .filter(|s| !s.complete)
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn completed(&self) -> Vec<Session> {
        let mut out: Vec<Session> = self
            .sessions
            .lock()
            .values()
            .filter(|s| s.complete)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.last_activity);
        out
    }

    /// Copy of the message history; empty for unknown ids. Like
    /// [`snapshot`](Self::snapshot), this does not bump `last_activity`.
    pub fn history(&self, id: &str) -> Vec<MessageRecord> {
        self.sessions
            .lock()
            .get(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    // ---- internals ----

    fn with_session<F: FnOnce(&mut Session)>(&self, id: &str, f: F) -> bool {
        let now = self.clock.now();
        let mut map = self.sessions.lock();
        match map.get_mut(id) {
            Some(s) => {
                f(s);
                s.last_activity = now;
                true
            }
            None => {
                debug!(target: "session", session_id = %id, "mutator on unknown session");
                false
            }
        }
    }

    fn mark_complete(s: &mut Session, now: DateTime<Utc>) {
        s.complete = true;
        s.phase = ConversationPhase::Conclusion;
        s.last_activity = now;
    }

    fn transition(&self, id: &str, trigger: CompletionTrigger, reason: Option<String>) -> bool {
        let now = self.clock.now();
        let event = {
            let mut map = self.sessions.lock();
            let Some(s) = map.get_mut(id) else {
                debug!(target: "session", session_id = %id, "complete on unknown session");
                return false;
            };
            if s.complete {
                debug!(target: "session", session_id = %id, "already complete");
                s.last_activity = now;
                return true;
            }
            Self::mark_complete(s, now);
            CompletionEvent {
                snapshot: s.clone(),
                trigger,
                reason,
            }
        };
        self.notify(event);
        true
    }

    /// Called without the session lock held.
    fn notify(&self, event: CompletionEvent) {
        info!(
            target: "session",
            session_id = %event.snapshot.id,
            trigger = %event.trigger,
            reason = event.reason.as_deref().unwrap_or(""),
            messages = event.snapshot.message_count(),
            "session complete"
        );
        metrics::counter!("sessions_completed_total", "trigger" => event.trigger.as_str())
            .increment(1);

        let observers: Vec<Arc<dyn CompletionObserver>> = self.observers.read().clone();
        for obs in observers {
            if catch_unwind(AssertUnwindSafe(|| obs.on_complete(&event))).is_err() {
                error!(target: "session", session_id = %event.snapshot.id, "completion observer panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);
    impl CompletionObserver for Counting {
        fn on_complete(&self, _e: &CompletionEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn mutators_on_unknown_id_return_false() {
        let store = SessionStore::new(CompletionConfig::default());
        assert!(!store.append("nope", MessageRecord::adversary("x", 1)));
        assert!(!store.update_confidence("nope", 0.5));
        assert!(!store.set_persona_active("nope"));
        assert!(!store.complete("nope"));
        assert!(!store.force_complete("nope", "test"));
        assert!(store.history("nope").is_empty());
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let store = SessionStore::new(CompletionConfig::default());
        store.get_or_create("s", None);
        store.append("s", MessageRecord::adversary("a", 100));
        store.append("s", MessageRecord::responder("b", 50));
        let h = store.history("s");
        assert_eq!(h[1].timestamp, 100);
    }

    #[test]
    fn metadata_refresh_only_while_pristine() {
        let store = SessionStore::new(CompletionConfig::default());
        let md = |l: &str| Metadata {
            locale: Some(l.to_string()),
            ..Default::default()
        };
        store.get_or_create("s", Some(md("en-US")));
        let s = store.get_or_create("s", Some(md("en-IN")));
        assert_eq!(s.metadata.unwrap().locale.as_deref(), Some("en-IN"));
        store.append("s", MessageRecord::adversary("hi", 1));
        let s = store.get_or_create("s", Some(md("fr-FR")));
        assert_eq!(s.metadata.unwrap().locale.as_deref(), Some("en-IN"));
    }

    #[test]
    fn complete_notifies_once() {
        let store = SessionStore::new(CompletionConfig::default());
        let obs = Arc::new(Counting(AtomicUsize::new(0)));
        store.register_observer(obs.clone());
        store.get_or_create("s", None);
        assert!(store.complete("s"));
        assert!(store.complete("s"));
        assert!(store.force_complete("s", "again"));
        assert_eq!(obs.0.load(Ordering::SeqCst), 1);
        let s = store.snapshot("s").unwrap();
        assert_eq!(s.phase, ConversationPhase::Conclusion);
    }

    #[test]
    fn persona_moves_phase_and_intel_moves_to_extraction() {
        let store = SessionStore::new(CompletionConfig::default());
        store.get_or_create("s", None);
        let mut b = IntelligenceBundle::default();
        b.phone_numbers.insert("9876543210".into());

        store.merge_intelligence("s", &b);
        assert_eq!(store.snapshot("s").unwrap().phase, ConversationPhase::Introduction);

        store.set_persona_active("s");
        assert_eq!(store.snapshot("s").unwrap().phase, ConversationPhase::Engagement);
        store.merge_intelligence("s", &b);
        assert_eq!(store.snapshot("s").unwrap().phase, ConversationPhase::Extraction);
    }

    #[test]
    fn panicking_observer_does_not_poison_completion() {
        struct Boom;
        impl CompletionObserver for Boom {
            fn on_complete(&self, _e: &CompletionEvent) {
                panic!("boom");
            }
        }
        let store = SessionStore::new(CompletionConfig::default());
        store.register_observer(Arc::new(Boom));
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        store.register_observer(counting.clone());
        store.get_or_create("s", None);
        assert!(store.complete("s"));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        assert!(store.snapshot("s").unwrap().complete);
    }
}
