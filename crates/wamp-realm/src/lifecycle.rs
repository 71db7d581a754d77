// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session lifecycle controller.
//!
//! Tracks every session of one realm from HELLO to its terminal state and
//! is the only place that decides whether a session is alive.
//!
//! # Architecture
//!
//! ```text
//! SessionLifecycle
//! +-- sessions: DashMap<SessionId, Arc<SessionCell>>   (sharded table)
//! |     SessionCell
//! |     +-- gate: ReentrantMutex<()>        (transition + notification)
//! |     +-- record: Mutex<SessionRecord>    (field access only)
//! +-- listeners: ListenerSet<dyn SessionListener>
//! +-- stats: SessionStats
//! ```
//!
//! # Thread Safety
//!
//! Each session has its own gate, so transitions of unrelated sessions never
//! contend beyond the brief shard lookup. A transition and the notification
//! it raises both run under the session's gate: of two racing terminal
//! transitions (GOODBYE against a lost transport) exactly one wins and
//! notifies, the other is rejected with `AlreadyClosed`.
//!
//! Queries (`state`, `snapshot`, `active_sessions`) only take record locks.
//! A record lock is never held while calling out, so an observer may query
//! any session, or the whole table, while another session is notifying.
//!
//! Lock order: shard lock, then record lock. A gate is never taken while
//! either is held.
//!
//! # Tombstones
//!
//! Closed sessions stay in the table so that late transitions are reported
//! as `AlreadyClosed` and a closed id is never welcomed again. Call
//! [`SessionLifecycle::forget`] once the host is done with a session.

use crate::details::{CloseDetails, HelloDetails, WelcomeDetails};
use crate::error::LifecycleError;
use crate::listener::{ListenerId, ListenerSet, SessionListener};
use crate::session::{
    SessionCloseType, SessionClosed, SessionCreated, SessionId, SessionSnapshot, SessionState,
};
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle operations, named in rejection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Begin,
    Hello,
    Goodbye,
    Abort,
    SessionLost,
    Forget,
}

impl Transition {
    /// Whether the transition may start tracking an unknown session.
    const fn may_create(self) -> bool {
        matches!(self, Self::Begin | Self::Hello | Self::Abort)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Hello => "hello",
            Self::Goodbye => "goodbye",
            Self::Abort => "abort",
            Self::SessionLost => "session_lost",
            Self::Forget => "forget",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct SessionRecord {
    /// `None` until the first successful transition.
    state: Option<SessionState>,
    hello_details: Option<HelloDetails>,
    welcome_details: Option<WelcomeDetails>,
}

struct SessionCell {
    gate: ReentrantMutex<()>,
    record: Mutex<SessionRecord>,
}

impl SessionCell {
    fn new() -> Self {
        Self {
            gate: ReentrantMutex::new(()),
            record: Mutex::new(SessionRecord::default()),
        }
    }
}

enum Outcome {
    Silent,
    Created(SessionCreated),
    Closed(SessionClosed),
}

/// Lifecycle counters of one realm.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Sessions welcomed.
    pub created: AtomicU64,
    /// Sessions closed by GOODBYE.
    pub closed_goodbye: AtomicU64,
    /// Sessions closed by ABORT.
    pub closed_abort: AtomicU64,
    /// Sessions closed by transport loss.
    pub closed_disconnection: AtomicU64,
    /// Transitions rejected.
    pub rejected: AtomicU64,
}

impl SessionStats {
    fn record_closed(&self, close_type: SessionCloseType) {
        let counter = match close_type {
            SessionCloseType::Goodbye => &self.closed_goodbye,
            SessionCloseType::Abort => &self.closed_abort,
            SessionCloseType::Disconnection => &self.closed_disconnection,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            closed_goodbye: self.closed_goodbye.load(Ordering::Relaxed),
            closed_abort: self.closed_abort.load(Ordering::Relaxed),
            closed_disconnection: self.closed_disconnection.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of lifecycle statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub created: u64,
    pub closed_goodbye: u64,
    pub closed_abort: u64,
    pub closed_disconnection: u64,
    pub rejected: u64,
}

impl SessionStatsSnapshot {
    /// Sessions closed for any reason.
    pub fn closed(&self) -> u64 {
        self.closed_goodbye + self.closed_abort + self.closed_disconnection
    }
}

/// Per-realm session state machine.
pub struct SessionLifecycle {
    realm: String,
    sessions: DashMap<SessionId, Arc<SessionCell>>,
    listeners: ListenerSet<dyn SessionListener>,
    stats: SessionStats,
}

impl SessionLifecycle {
    /// Create an empty controller for `realm`.
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            sessions: DashMap::new(),
            listeners: ListenerSet::new(),
            stats: SessionStats::default(),
        }
    }

    /// Observe session creation and closure.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Stop observing.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Lifecycle counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Record a HELLO that is not acknowledged yet (e.g. while the peer
    /// authenticates). Raises nothing.
    pub fn begin(&self, session_id: SessionId, hello_details: HelloDetails) -> Result<(), LifecycleError> {
        self.apply(session_id, Transition::Begin, |record| match record.state {
            None => {
                record.state = Some(SessionState::Pending);
                record.hello_details = Some(hello_details);
                Ok(Outcome::Silent)
            }
            Some(state) => Err(occupied(session_id, state, Transition::Begin)),
        })
    }

    /// Welcome a session: `Pending -> Active` (or straight to `Active` for an
    /// untracked id). Raises `SessionCreated` once.
    pub fn hello(
        &self,
        session_id: SessionId,
        hello_details: HelloDetails,
        welcome_details: WelcomeDetails,
    ) -> Result<(), LifecycleError> {
        self.apply(session_id, Transition::Hello, |record| match record.state {
            None | Some(SessionState::Pending) => {
                record.state = Some(SessionState::Active);
                record.hello_details = Some(hello_details.clone());
                record.welcome_details = Some(welcome_details.clone());
                Ok(Outcome::Created(SessionCreated {
                    session_id,
                    hello_details,
                    welcome_details,
                }))
            }
            Some(state) => Err(occupied(session_id, state, Transition::Hello)),
        })
    }

    /// Graceful close: `Active -> Closed(Goodbye)`.
    pub fn goodbye(
        &self,
        session_id: SessionId,
        details: CloseDetails,
        reason: &str,
    ) -> Result<(), LifecycleError> {
        self.apply(session_id, Transition::Goodbye, |record| match record.state {
            Some(SessionState::Active) => Ok(close(
                record,
                session_id,
                SessionCloseType::Goodbye,
                Some(details),
                Some(reason.to_string()),
            )),
            Some(SessionState::Pending) => Err(LifecycleError::InvalidTransition {
                session_id,
                state: SessionState::Pending,
                transition: Transition::Goodbye,
            }),
            Some(state) => Err(occupied(session_id, state, Transition::Goodbye)),
            None => Err(LifecycleError::UnknownSession { session_id }),
        })
    }

    /// Forced close from any live state, including before the session was
    /// ever welcomed (rejected handshake).
    pub fn abort(
        &self,
        session_id: SessionId,
        details: CloseDetails,
        reason: &str,
    ) -> Result<(), LifecycleError> {
        self.apply(session_id, Transition::Abort, |record| match record.state {
            None | Some(SessionState::Pending | SessionState::Active) => Ok(close(
                record,
                session_id,
                SessionCloseType::Abort,
                Some(details),
                Some(reason.to_string()),
            )),
            Some(state) => Err(occupied(session_id, state, Transition::Abort)),
        })
    }

    /// The transport went away without GOODBYE or ABORT.
    pub fn session_lost(&self, session_id: SessionId) -> Result<(), LifecycleError> {
        self.apply(session_id, Transition::SessionLost, |record| match record.state {
            Some(SessionState::Pending | SessionState::Active) => Ok(close(
                record,
                session_id,
                SessionCloseType::Disconnection,
                None,
                None,
            )),
            Some(state) => Err(occupied(session_id, state, Transition::SessionLost)),
            None => Err(LifecycleError::UnknownSession { session_id }),
        })
    }

    /// Current state of a tracked session.
    pub fn state(&self, session_id: SessionId) -> Option<SessionState> {
        let cell = self.cell(session_id)?;
        let state = cell.record.lock().state;
        state
    }

    /// Copy of a tracked session.
    pub fn snapshot(&self, session_id: SessionId) -> Option<SessionSnapshot> {
        let cell = self.cell(session_id)?;
        self.read(session_id, &cell)
    }

    /// Ids of all active sessions.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let cells: Vec<(SessionId, Arc<SessionCell>)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut active: Vec<SessionId> = cells
            .into_iter()
            .filter(|(_, cell)| cell.record.lock().state == Some(SessionState::Active))
            .map(|(id, _)| id)
            .collect();
        active.sort_unstable();
        active
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.active_sessions().len()
    }

    /// Drop the tombstone of a closed session.
    ///
    /// Live sessions cannot be forgotten: they must be closed first.
    pub fn forget(&self, session_id: SessionId) -> Result<SessionSnapshot, LifecycleError> {
        let cell = self
            .cell(session_id)
            .ok_or(LifecycleError::UnknownSession { session_id })?;
        self.forget_cell(session_id, &cell)
    }

    /// Remove `cell` if it is still the table entry for `session_id`.
    fn forget_cell(&self, session_id: SessionId, cell: &Arc<SessionCell>) -> Result<SessionSnapshot, LifecycleError> {
        let snapshot = self
            .read(session_id, cell)
            .ok_or(LifecycleError::UnknownSession { session_id })?;
        if !snapshot.state.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                session_id,
                state: snapshot.state,
                transition: Transition::Forget,
            });
        }
        // A concurrent forget may have removed the tombstone and a new
        // HELLO may have reused the id since.
        if self
            .sessions
            .remove_if(&session_id, |_, current| Arc::ptr_eq(current, cell))
            .is_none()
        {
            return Err(LifecycleError::UnknownSession { session_id });
        }
        tracing::debug!(realm = %self.realm, %session_id, "session forgotten");
        Ok(snapshot)
    }

    fn cell(&self, session_id: SessionId) -> Option<Arc<SessionCell>> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn read(&self, session_id: SessionId, cell: &SessionCell) -> Option<SessionSnapshot> {
        let record = cell.record.lock();
        record.state.map(|state| SessionSnapshot {
            session_id,
            realm: self.realm.clone(),
            state,
            hello_details: record.hello_details.clone(),
            welcome_details: record.welcome_details.clone(),
        })
    }

    fn apply<F>(&self, session_id: SessionId, transition: Transition, f: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&mut SessionRecord) -> Result<Outcome, LifecycleError>,
    {
        let cell = if transition.may_create() {
            Arc::clone(
                self.sessions
                    .entry(session_id)
                    .or_insert_with(|| Arc::new(SessionCell::new()))
                    .value(),
            )
        } else {
            match self.cell(session_id) {
                Some(cell) => cell,
                None => return Err(self.reject(LifecycleError::UnknownSession { session_id }, transition)),
            }
        };

        let gate = cell.gate.lock();
        let outcome = f(&mut cell.record.lock());

        match outcome {
            Ok(Outcome::Silent) => {
                tracing::debug!(realm = %self.realm, %session_id, %transition, "session pending");
            }
            Ok(Outcome::Created(event)) => {
                self.stats.created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(realm = %self.realm, %session_id, "session created");
                self.listeners
                    .notify("session_created", |l| l.on_session_created(&event));
            }
            Ok(Outcome::Closed(event)) => {
                self.stats.record_closed(event.close_type);
                tracing::debug!(
                    realm = %self.realm,
                    %session_id,
                    close_type = %event.close_type,
                    reason = event.reason.as_deref().unwrap_or(""),
                    "session closed"
                );
                self.listeners
                    .notify("session_closed", |l| l.on_session_closed(&event));
            }
            Err(error) => {
                drop(gate);
                return Err(self.reject(error, transition));
            }
        }
        Ok(())
    }

    fn reject(&self, error: LifecycleError, transition: Transition) -> LifecycleError {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            realm = %self.realm,
            session_id = %error.session_id(),
            %transition,
            %error,
            "session transition rejected"
        );
        error
    }
}

fn occupied(session_id: SessionId, state: SessionState, transition: Transition) -> LifecycleError {
    match state {
        SessionState::Closed(close_type) => LifecycleError::AlreadyClosed {
            session_id,
            close_type,
        },
        SessionState::Active => LifecycleError::DuplicateHello { session_id },
        SessionState::Pending => LifecycleError::InvalidTransition {
            session_id,
            state,
            transition,
        },
    }
}

fn close(
    record: &mut SessionRecord,
    session_id: SessionId,
    close_type: SessionCloseType,
    details: Option<CloseDetails>,
    reason: Option<String>,
) -> Outcome {
    record.state = Some(SessionState::Closed(close_type));
    Outcome::Closed(SessionClosed {
        close_type,
        session_id,
        details,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        created: Mutex<Vec<SessionId>>,
        closed: Mutex<Vec<SessionClosed>>,
    }

    impl SessionListener for Recorder {
        fn on_session_created(&self, event: &SessionCreated) {
            self.created.lock().push(event.session_id);
        }

        fn on_session_closed(&self, event: &SessionClosed) {
            self.closed.lock().push(event.clone());
        }
    }

    fn setup() -> (SessionLifecycle, Arc<Recorder>) {
        let lifecycle = SessionLifecycle::new("realm1");
        let recorder = Arc::new(Recorder::default());
        lifecycle.add_listener(recorder.clone());
        (lifecycle, recorder)
    }

    fn id(n: u64) -> SessionId {
        SessionId::new(n)
    }

    fn hello(lifecycle: &SessionLifecycle, n: u64) -> Result<(), LifecycleError> {
        lifecycle.hello(id(n), HelloDetails::default(), WelcomeDetails::default())
    }

    #[test]
    fn test_hello_then_goodbye() {
        let (lifecycle, recorder) = setup();
        hello(&lifecycle, 42).unwrap();
        assert_eq!(lifecycle.state(id(42)), Some(SessionState::Active));

        lifecycle
            .goodbye(id(42), CloseDetails::default(), uri::CLOSE_NORMAL)
            .unwrap();
        assert_eq!(
            lifecycle.state(id(42)),
            Some(SessionState::Closed(SessionCloseType::Goodbye))
        );

        let lost = lifecycle.session_lost(id(42));
        assert_eq!(
            lost,
            Err(LifecycleError::AlreadyClosed {
                session_id: id(42),
                close_type: SessionCloseType::Goodbye
            })
        );

        assert_eq!(*recorder.created.lock(), vec![id(42)]);
        let closed = recorder.closed.lock();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_type, SessionCloseType::Goodbye);
        assert_eq!(closed[0].reason.as_deref(), Some(uri::CLOSE_NORMAL));
    }

    #[test]
    fn test_duplicate_hello_rejected() {
        let (lifecycle, recorder) = setup();
        hello(&lifecycle, 1).unwrap();
        assert_eq!(
            hello(&lifecycle, 1),
            Err(LifecycleError::DuplicateHello { session_id: id(1) })
        );
        assert_eq!(recorder.created.lock().len(), 1);
        assert_eq!(lifecycle.stats().snapshot().rejected, 1);
    }

    #[test]
    fn test_abort_without_hello() {
        let (lifecycle, recorder) = setup();
        lifecycle
            .abort(id(77), CloseDetails::default(), uri::ERROR_NOT_AUTHORIZED)
            .unwrap();
        assert!(recorder.created.lock().is_empty());
        let closed = recorder.closed.lock();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_type, SessionCloseType::Abort);
        assert_eq!(closed[0].session_id, id(77));
    }

    #[test]
    fn test_abort_pending_session() {
        let (lifecycle, recorder) = setup();
        lifecycle
            .begin(id(13), HelloDetails::with_roles(["caller"]))
            .unwrap();
        lifecycle
            .abort(id(13), CloseDetails::default(), uri::ERROR_NOT_AUTHORIZED)
            .unwrap();

        assert_eq!(
            lifecycle.state(id(13)),
            Some(SessionState::Closed(SessionCloseType::Abort))
        );
        assert!(recorder.created.lock().is_empty());
        let closed = recorder.closed.lock();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_type, SessionCloseType::Abort);
        assert_eq!(closed[0].reason.as_deref(), Some(uri::ERROR_NOT_AUTHORIZED));
        assert_eq!(lifecycle.stats().snapshot().created, 0);
    }

    #[test]
    fn test_abort_active_session() {
        let (lifecycle, recorder) = setup();
        hello(&lifecycle, 3).unwrap();
        lifecycle
            .abort(id(3), CloseDetails::default(), uri::ERROR_PROTOCOL_VIOLATION)
            .unwrap();
        assert_eq!(recorder.closed.lock().len(), 1);
    }

    #[test]
    fn test_closed_session_is_never_welcomed_again() {
        let (lifecycle, recorder) = setup();
        lifecycle
            .abort(id(9), CloseDetails::default(), uri::ERROR_NOT_AUTHORIZED)
            .unwrap();
        assert!(matches!(
            hello(&lifecycle, 9),
            Err(LifecycleError::AlreadyClosed { .. })
        ));
        assert!(recorder.created.lock().is_empty());
    }

    #[test]
    fn test_session_lost_has_no_details() {
        let (lifecycle, recorder) = setup();
        hello(&lifecycle, 5).unwrap();
        lifecycle.session_lost(id(5)).unwrap();
        let closed = recorder.closed.lock();
        assert_eq!(closed[0].close_type, SessionCloseType::Disconnection);
        assert!(closed[0].details.is_none());
        assert!(closed[0].reason.is_none());
    }

    #[test]
    fn test_unknown_session() {
        let (lifecycle, recorder) = setup();
        assert_eq!(
            lifecycle.session_lost(id(8)),
            Err(LifecycleError::UnknownSession { session_id: id(8) })
        );
        assert!(matches!(
            lifecycle.goodbye(id(8), CloseDetails::default(), uri::CLOSE_NORMAL),
            Err(LifecycleError::UnknownSession { .. })
        ));
        assert!(recorder.closed.lock().is_empty());
        assert_eq!(lifecycle.state(id(8)), None);
    }

    #[test]
    fn test_pending_session() {
        let (lifecycle, recorder) = setup();
        lifecycle
            .begin(id(11), HelloDetails::with_roles(["caller"]))
            .unwrap();
        assert_eq!(lifecycle.state(id(11)), Some(SessionState::Pending));
        assert!(matches!(
            lifecycle.goodbye(id(11), CloseDetails::default(), uri::CLOSE_NORMAL),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.begin(id(11), HelloDetails::default()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        hello(&lifecycle, 11).unwrap();
        assert_eq!(*recorder.created.lock(), vec![id(11)]);
    }

    #[test]
    fn test_pending_session_lost() {
        let (lifecycle, recorder) = setup();
        lifecycle.begin(id(12), HelloDetails::default()).unwrap();
        lifecycle.session_lost(id(12)).unwrap();
        assert!(recorder.created.lock().is_empty());
        assert_eq!(recorder.closed.lock().len(), 1);
    }

    #[test]
    fn test_active_sessions_and_snapshot() {
        let (lifecycle, _recorder) = setup();
        hello(&lifecycle, 3).unwrap();
        hello(&lifecycle, 1).unwrap();
        hello(&lifecycle, 2).unwrap();
        lifecycle.session_lost(id(2)).unwrap();

        assert_eq!(lifecycle.active_sessions(), vec![id(1), id(3)]);
        assert_eq!(lifecycle.active_count(), 2);

        let snapshot = lifecycle.snapshot(id(3)).unwrap();
        assert_eq!(snapshot.realm, "realm1");
        assert_eq!(snapshot.state, SessionState::Active);
        assert!(snapshot.welcome_details.is_some());
    }

    #[test]
    fn test_forget_only_terminal() {
        let (lifecycle, _recorder) = setup();
        hello(&lifecycle, 4).unwrap();
        assert!(matches!(
            lifecycle.forget(id(4)),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        lifecycle.session_lost(id(4)).unwrap();
        let snapshot = lifecycle.forget(id(4)).unwrap();
        assert_eq!(
            snapshot.state,
            SessionState::Closed(SessionCloseType::Disconnection)
        );
        assert_eq!(lifecycle.state(id(4)), None);
        assert!(matches!(
            lifecycle.forget(id(4)),
            Err(LifecycleError::UnknownSession { .. })
        ));
    }

    #[test]
    fn test_stale_forget_keeps_reused_id() {
        let (lifecycle, _recorder) = setup();
        hello(&lifecycle, 14).unwrap();
        lifecycle.session_lost(id(14)).unwrap();
        let stale = lifecycle.cell(id(14)).unwrap();

        lifecycle.forget(id(14)).unwrap();
        hello(&lifecycle, 14).unwrap();
        lifecycle.session_lost(id(14)).unwrap();

        // The first tombstone is gone; the second must survive.
        assert!(matches!(
            lifecycle.forget_cell(id(14), &stale),
            Err(LifecycleError::UnknownSession { .. })
        ));
        assert_eq!(
            lifecycle.state(id(14)),
            Some(SessionState::Closed(SessionCloseType::Disconnection))
        );
    }

    struct ActiveCounter {
        lifecycle: Arc<SessionLifecycle>,
        seen: Mutex<Vec<usize>>,
    }

    impl SessionListener for ActiveCounter {
        fn on_session_created(&self, _event: &SessionCreated) {
            self.seen.lock().push(self.lifecycle.active_count());
        }
    }

    #[test]
    fn test_query_from_listener_while_gate_held() {
        let lifecycle = Arc::new(SessionLifecycle::new("realm1"));
        let counter = Arc::new(ActiveCounter {
            lifecycle: lifecycle.clone(),
            seen: Mutex::new(Vec::new()),
        });
        lifecycle.add_listener(counter.clone());
        hello(&lifecycle, 1).unwrap();
        hello(&lifecycle, 2).unwrap();
        assert_eq!(*counter.seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_stats() {
        let (lifecycle, _recorder) = setup();
        hello(&lifecycle, 1).unwrap();
        hello(&lifecycle, 2).unwrap();
        hello(&lifecycle, 3).unwrap();
        lifecycle
            .goodbye(id(1), CloseDetails::default(), uri::CLOSE_NORMAL)
            .unwrap();
        lifecycle
            .abort(id(2), CloseDetails::default(), uri::ERROR_NOT_AUTHORIZED)
            .unwrap();
        lifecycle.session_lost(id(3)).unwrap();
        let _ = lifecycle.session_lost(id(3));

        let stats = lifecycle.stats().snapshot();
        assert_eq!(stats.created, 3);
        assert_eq!(stats.closed(), 3);
        assert_eq!(stats.closed_goodbye, 1);
        assert_eq!(stats.closed_abort, 1);
        assert_eq!(stats.closed_disconnection, 1);
        assert_eq!(stats.rejected, 1);
    }

    struct AbortOnCreate {
        lifecycle: Arc<SessionLifecycle>,
    }

    impl SessionListener for AbortOnCreate {
        fn on_session_created(&self, event: &SessionCreated) {
            let _ = self.lifecycle.abort(
                event.session_id,
                CloseDetails::default(),
                uri::ERROR_NOT_AUTHORIZED,
            );
        }
    }

    #[test]
    fn test_listener_may_transition_same_session() {
        let lifecycle = Arc::new(SessionLifecycle::new("realm1"));
        lifecycle.add_listener(Arc::new(AbortOnCreate {
            lifecycle: lifecycle.clone(),
        }));
        hello(&lifecycle, 6).unwrap();
        assert_eq!(
            lifecycle.state(id(6)),
            Some(SessionState::Closed(SessionCloseType::Abort))
        );
    }
}
