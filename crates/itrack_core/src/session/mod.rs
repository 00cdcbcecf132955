use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::access::AccessScope;
use crate::auth::{Identity, IdentityProvider, Session};
use crate::domain::ProfileFields;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn { session: Session },
    SignedOut { user_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct SessionState {
    current: Option<Session>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

/// Current-session holder with an observer list. Created at application start and injected
/// wherever the signed-in user is needed.
#[derive(Default)]
pub struct SessionContext {
    state: Mutex<SessionState>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Listeners run outside the lock, so a poisoned state is still consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(sid, _)| *sid != id);
        state.listeners.len() != before
    }

    fn notify(&self, event: SessionEvent) {
        let listeners = self
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().current.clone()
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.lock().current.as_ref().map(|s| s.identity.clone())
    }

    /// The signed-in session, or `AUTH_REQUIRED`.
    pub fn require(&self) -> Result<Session, AppError> {
        self.current()
            .ok_or_else(|| AppError::new("AUTH_REQUIRED", "Sign in to continue"))
    }

    pub fn scope(&self) -> Result<AccessScope, AppError> {
        Ok(AccessScope::for_profile(&self.require()?.profile))
    }

    pub fn establish(&self, session: Session) {
        self.lock().current = Some(session.clone());
        self.notify(SessionEvent::SignedIn { session });
    }

    pub fn sign_in(
        &self,
        provider: &dyn IdentityProvider,
        email: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<Session, AppError> {
        let session = provider.sign_in(email, password, now)?;
        self.establish(session.clone());
        Ok(session)
    }

    pub fn sign_up(
        &self,
        provider: &dyn IdentityProvider,
        email: &str,
        password: &str,
        fields: &ProfileFields,
        now: OffsetDateTime,
    ) -> Result<Session, AppError> {
        let session = provider.sign_up(email, password, fields, now)?;
        self.establish(session.clone());
        Ok(session)
    }

    /// Clears the session. No-op (and no event) when nobody is signed in.
    pub fn sign_out(&self) {
        let previous = self.lock().current.take();
        if let Some(previous) = previous {
            info!(user_id = %previous.identity.user_id, "user signed out");
            self.notify(SessionEvent::SignedOut {
                user_id: previous.identity.user_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Sector, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    fn session(sector: Sector) -> Session {
        let user_id = Uuid::new_v4();
        Session {
            token: Uuid::new_v4(),
            identity: Identity {
                user_id,
                email: "x@example.com".to_string(),
            },
            profile: UserProfile {
                id: user_id,
                first_name: "X".to_string(),
                last_name: "Y".to_string(),
                sector,
                role: "Analyst".to_string(),
                created_at: datetime!(2026-01-01 00:00:00 UTC),
                updated_at: datetime!(2026-01-01 00:00:00 UTC),
            },
            signed_in_at: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn listeners_observe_sign_in_and_sign_out() {
        let ctx = SessionContext::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.subscribe(move |e| {
            let label = match e {
                SessionEvent::SignedIn { .. } => "in",
                SessionEvent::SignedOut { .. } => "out",
            };
            sink.lock().unwrap().push(label);
        });

        assert!(ctx.require().is_err());
        ctx.establish(session(Sector::SecondaryTeam));
        assert_eq!(
            ctx.scope().unwrap(),
            AccessScope::Sector(Sector::SecondaryTeam)
        );
        ctx.sign_out();
        ctx.sign_out();

        assert_eq!(*seen.lock().unwrap(), vec!["in", "out"]);
        assert!(ctx.current_user().is_none());
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let ctx = SessionContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = ctx.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ctx.unsubscribe(id));
        assert!(!ctx.unsubscribe(id));
        ctx.establish(session(Sector::PrimaryTeam));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
