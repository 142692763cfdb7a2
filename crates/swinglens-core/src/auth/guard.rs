//! Access-control decision point for protected views.
//!
//! The guard is a pure function of [`SessionState`] plus a subscription to the
//! token store, so a front-end re-evaluates on every store notification
//! instead of polling storage or caching its own copy of the credential.

use tokio::sync::watch;

use super::session::{SessionState, TokenStore};

/// Where the session currently stands.
///
/// `Initializing` is only ever the first phase; once the restore completes
/// the phase alternates between the other two for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Initializing,
    Unauthenticated,
    Authenticated,
}

impl From<&SessionState> for AuthPhase {
    fn from(state: &SessionState) -> Self {
        match (state.is_loading, state.credential.is_some()) {
            (true, _) => AuthPhase::Initializing,
            (false, false) => AuthPhase::Unauthenticated,
            (false, true) => AuthPhase::Authenticated,
        }
    }
}

/// What a front-end should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Restore still running: show nothing or a neutral placeholder
    Pending,
    /// No session: show the login entry point, never protected content
    RedirectToLogin,
    /// Session present: protected content may render
    Allow,
}

/// Decide what may render for `state`.
pub fn decide(state: &SessionState) -> GuardDecision {
    match AuthPhase::from(state) {
        AuthPhase::Initializing => GuardDecision::Pending,
        AuthPhase::Unauthenticated => GuardDecision::RedirectToLogin,
        AuthPhase::Authenticated => GuardDecision::Allow,
    }
}

/// Subscribed guard that tracks the latest decision for one view tree.
pub struct SessionGuard {
    rx: watch::Receiver<SessionState>,
    last: GuardDecision,
}

impl SessionGuard {
    pub fn new(store: &TokenStore) -> Self {
        let mut rx = store.subscribe();
        let last = decide(&rx.borrow_and_update());
        Self { rx, last }
    }

    /// Decision for the state currently held by the store.
    pub fn decision(&self) -> GuardDecision {
        decide(&self.rx.borrow())
    }

    pub fn phase(&self) -> AuthPhase {
        AuthPhase::from(&*self.rx.borrow())
    }

    pub fn allows(&self) -> bool {
        self.decision() == GuardDecision::Allow
    }

    /// Non-blocking check for a new decision since the last one reported.
    ///
    /// Intended for render loops that already tick on their own schedule.
    pub fn poll(&mut self) -> Option<GuardDecision> {
        match self.rx.has_changed() {
            Ok(true) => {
                let decision = decide(&self.rx.borrow_and_update());
                self.report(decision)
            }
            _ => None,
        }
    }

    /// Wait until the decision changes. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        loop {
            self.rx.changed().await.ok()?;
            let decision = decide(&self.rx.borrow_and_update());
            if let Some(decision) = self.report(decision) {
                return Some(decision);
            }
        }
    }

    fn report(&mut self, decision: GuardDecision) -> Option<GuardDecision> {
        if decision == self.last {
            None
        } else {
            self.last = decision;
            Some(decision)
        }
    }
}
