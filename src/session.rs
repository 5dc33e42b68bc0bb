use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

/// SessionState
///
/// The shared handle under which the store travels inside the application
/// state, mirroring the repository's `Arc<dyn Repository>` alias.
pub type SessionState = Arc<SessionStore>;

/// SessionView
///
/// A read-only snapshot of one session, taken at a specific instant. Used by
/// the session-status endpoint; the live state stays inside the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub remaining: Duration,
}

/// One live session. `last_activity` is the only field mutated after creation,
/// and the only contended one: concurrent activity signals race on it, so it is
/// an atomic epoch-seconds value updated with `fetch_max` (last-write-wins).
struct SessionEntry {
    started_at: DateTime<Utc>,
    last_activity: AtomicI64,
}

impl SessionEntry {
    fn last_activity(&self) -> DateTime<Utc> {
        let secs = self.last_activity.load(Ordering::Acquire);
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    /// Expired when `now - last_activity >= timeout`. Both the pull-model check
    /// (every authorization) and the periodic sweep use this same arithmetic,
    /// recomputed from absolute timestamps so the check is idempotent and
    /// restart-safe.
    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity() >= timeout
    }
}

/// SessionStore
///
/// The session monitor: tracks per-principal activity timestamps and computes
/// expiry against a fixed idle timeout. Constructed explicitly at startup and
/// passed by handle into the gates — there is no ambient singleton.
///
/// Ownership boundaries: the authentication gate begins sessions, activity
/// signals (and the heartbeat endpoint) touch them, the authorization gate only
/// reads. Entries for *different* principals are fully independent; the single
/// contended field within an entry is resolved last-write-wins.
///
/// Every time-dependent operation has an `_at(now)` variant so tests own the
/// clock; the plain variants delegate with `Utc::now()`.
pub struct SessionStore {
    timeout: Duration,
    entries: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new(timeout_secs: i64) -> Self {
        Self {
            timeout: Duration::seconds(timeout_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// begin
    ///
    /// Establishes (or re-establishes) the session for a principal, setting
    /// `started_at = last_activity = now`. Called exclusively on successful
    /// authentication; an existing session for the same principal is replaced.
    pub fn begin(&self, id: Uuid) {
        self.begin_at(id, Utc::now());
    }

    pub fn begin_at(&self, id: Uuid, now: DateTime<Utc>) {
        let entry = SessionEntry {
            started_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
        };
        self.entries
            .write()
            .expect("session store lock poisoned")
            .insert(id, entry);
    }

    /// touch
    ///
    /// Records an activity signal, resetting the idle clock. Returns false if
    /// the session is missing or already expired — touching cannot revive an
    /// expired session; the principal must re-authenticate.
    ///
    /// Concurrent touches on the same session resolve last-write-wins: with
    /// timestamps T1 < T2 the surviving value is T2 regardless of arrival
    /// order.
    pub fn touch(&self, id: Uuid) -> bool {
        self.touch_at(id, Utc::now())
    }

    pub fn touch_at(&self, id: Uuid, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().expect("session store lock poisoned");
        match entries.get(&id) {
            Some(entry) if !entry.is_expired(now, self.timeout) => {
                entry
                    .last_activity
                    .fetch_max(now.timestamp(), Ordering::AcqRel);
                true
            }
            _ => false,
        }
    }

    /// is_expired
    ///
    /// Fail-closed expiry check: a principal with no session entry at all is
    /// treated as expired.
    pub fn is_expired(&self, id: Uuid) -> bool {
        self.is_expired_at(id, Utc::now())
    }

    pub fn is_expired_at(&self, id: Uuid, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().expect("session store lock poisoned");
        match entries.get(&id) {
            Some(entry) => entry.is_expired(now, self.timeout),
            None => true,
        }
    }

    /// remaining
    ///
    /// Remaining session lifetime, clamped at zero. `None` when no session
    /// exists for the principal.
    pub fn remaining(&self, id: Uuid) -> Option<Duration> {
        self.remaining_at(id, Utc::now())
    }

    pub fn remaining_at(&self, id: Uuid, now: DateTime<Utc>) -> Option<Duration> {
        let entries = self.entries.read().expect("session store lock poisoned");
        entries.get(&id).map(|entry| {
            let left = self.timeout - (now - entry.last_activity());
            left.max(Duration::zero())
        })
    }

    /// Snapshot of a session for the status endpoint.
    pub fn get(&self, id: Uuid) -> Option<SessionView> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: Uuid, now: DateTime<Utc>) -> Option<SessionView> {
        let entries = self.entries.read().expect("session store lock poisoned");
        entries.get(&id).map(|entry| {
            let last = entry.last_activity();
            SessionView {
                started_at: entry.started_at,
                last_activity: last,
                remaining: (self.timeout - (now - last)).max(Duration::zero()),
            }
        })
    }

    /// end
    ///
    /// Invalidates a session (logout). Returns whether a session existed.
    /// Subsequent authorization checks for the principal deny with
    /// Unauthenticated until a new session is begun.
    pub fn end(&self, id: Uuid) -> bool {
        self.entries
            .write()
            .expect("session store lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// sweep
    ///
    /// The periodic-tick half of the monitor: drops every expired entry and
    /// returns the count removed. Safe to run at any cadence — it recomputes
    /// from absolute timestamps rather than counting down, so a missed or
    /// repeated tick changes nothing.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().expect("session store lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.timeout));
        before - entries.len()
    }

    /// Number of live (non-expired) sessions. Feeds the admin dashboard.
    pub fn active_count(&self) -> i64 {
        self.active_count_at(Utc::now())
    }

    pub fn active_count_at(&self, now: DateTime<Utc>) -> i64 {
        let entries = self.entries.read().expect("session store lock poisoned");
        entries
            .values()
            .filter(|entry| !entry.is_expired(now, self.timeout))
            .count() as i64
    }
}
