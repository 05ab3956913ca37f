// src/application/session.rs
use crate::application::{
    ApplicationResult,
    credentials::CredentialStore,
    sync::{Subscription, TabSyncBus},
};
use crate::domain::{
    session::{ProfilePatch, Session, TokenSet, UserProfile},
    sync::{SyncEvent, SyncEventKind},
};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Single owner of the in-memory session. Every mutation is persisted through
/// the credential store and, when it originates here, announced to other tabs.
pub struct SessionStore {
    state: RwLock<Session>,
    credentials: Arc<CredentialStore>,
    sync: Arc<TabSyncBus>,
    changes: watch::Sender<Session>,
}

impl SessionStore {
    /// Hydrates from whatever this tab and its siblings have persisted.
    pub fn new(credentials: Arc<CredentialStore>, sync: Arc<TabSyncBus>) -> Self {
        let session = credentials.load_session();
        debug!(authenticated = session.is_authenticated(), "session hydrated");
        let (changes, _) = watch::channel(session.clone());
        Self {
            state: RwLock::new(session),
            credentials,
            sync,
            changes,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.changes.subscribe()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    fn mutate<F>(&self, apply: F) -> ApplicationResult<()>
    where
        F: FnOnce(&mut Session, &CredentialStore) -> ApplicationResult<()>,
    {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            apply(&mut state, &self.credentials)?;
            state.clone()
        };
        self.changes.send_replace(snapshot);
        Ok(())
    }

    fn announce(&self, event: &SyncEvent) {
        if let Err(err) = self.sync.broadcast(event) {
            warn!(error = %err, kind = %event.kind(), "failed to broadcast session change");
        }
    }

    /// Establishes a session after a successful login.
    pub fn login(&self, user: UserProfile, tokens: TokenSet) -> ApplicationResult<()> {
        self.mutate(|state, credentials| {
            credentials.store_token_set(&tokens)?;
            credentials.set_user(&user)?;
            *state = Session::established(&tokens, Some(user.clone()));
            Ok(())
        })?;
        info!(user_id = %user.id, "session established");
        self.announce(&SyncEvent::Login {
            user: Some(user),
            tokens,
        });
        Ok(())
    }

    pub fn apply_refreshed_tokens(&self, tokens: TokenSet) -> ApplicationResult<()> {
        self.mutate(|state, credentials| {
            credentials.store_token_set(&tokens)?;
            state.apply_tokens(&tokens);
            Ok(())
        })?;
        self.announce(&SyncEvent::TokenRefreshed(tokens));
        Ok(())
    }

    /// Stores a freshly fetched profile; sibling tabs fetch their own.
    pub fn record_profile(&self, profile: &UserProfile) -> ApplicationResult<()> {
        let patch = ProfilePatch::from(profile);
        self.mutate(|state, credentials| {
            match state.user.as_mut() {
                Some(user) => user.merge(&patch)?,
                None => state.user = Some(profile.clone()),
            }
            if let Some(user) = &state.user {
                credentials.set_user(user)?;
            }
            Ok(())
        })
    }

    /// Merges an edit made in this tab and tells the other tabs about it.
    pub fn update_profile(&self, patch: ProfilePatch) -> ApplicationResult<()> {
        self.mutate(|state, credentials| merge_and_persist(state, credentials, &patch))?;
        self.announce(&SyncEvent::ProfileUpdated(patch));
        Ok(())
    }

    pub fn set_pending_email(&self, email: Option<String>) {
        // Pending email is not persisted.
        let _ = self.mutate(|state, _| {
            state.pending_email = email;
            Ok(())
        });
    }

    /// Applies a confirmed email change. New tokens, when issued, are stored
    /// and announced before the email change itself.
    pub fn confirm_email(
        &self,
        email: Option<String>,
        tokens: Option<TokenSet>,
    ) -> ApplicationResult<()> {
        let mut patch = ProfilePatch::new().with("is_email_verified", true);
        if let Some(email) = &email {
            patch = patch.with("email", email.clone());
        }
        self.mutate(|state, credentials| {
            merge_and_persist(state, credentials, &patch)?;
            if let Some(tokens) = &tokens {
                credentials.store_token_set(tokens)?;
                state.apply_tokens(tokens);
            }
            state.pending_email = None;
            Ok(())
        })?;
        if let Some(tokens) = tokens {
            self.announce(&SyncEvent::TokenRefreshed(tokens));
        }
        self.announce(&SyncEvent::EmailUpdated(patch));
        Ok(())
    }

    /// Ends the session here and in every other tab.
    pub fn logout(&self) -> ApplicationResult<()> {
        self.end_session()?;
        info!("session cleared");
        self.announce(&SyncEvent::Logout);
        Ok(())
    }

    fn end_session(&self) -> ApplicationResult<()> {
        let cleared = self.credentials.clear_all();
        self.mutate(|state, _| {
            state.clear();
            Ok(())
        })?;
        cleared
    }

    /// Mirrors a change made by another tab. Nothing is re-broadcast.
    pub fn apply_remote(&self, event: &SyncEvent) -> ApplicationResult<()> {
        debug!(kind = %event.kind(), "applying session change from another tab");
        match event {
            SyncEvent::Logout => self.end_session(),
            SyncEvent::Login { user, tokens } => self.mutate(|state, credentials| {
                credentials.store_token_set(tokens)?;
                if let Some(user) = user {
                    credentials.set_user(user)?;
                }
                *state = Session::established(tokens, user.clone());
                Ok(())
            }),
            SyncEvent::TokenRefreshed(tokens) => self.mutate(|state, credentials| {
                credentials.store_token_set(tokens)?;
                state.apply_tokens(tokens);
                Ok(())
            }),
            SyncEvent::ProfileUpdated(patch) | SyncEvent::EmailUpdated(patch) => {
                self.mutate(|state, credentials| merge_and_persist(state, credentials, patch))
            }
        }
    }

    /// Subscribes this store to every session event from other tabs.
    pub fn attach(self: &Arc<Self>) -> Vec<Subscription> {
        SyncEventKind::ALL
            .into_iter()
            .map(|kind| {
                let store: Weak<Self> = Arc::downgrade(self);
                self.sync.subscribe(kind, move |event| {
                    let Some(store) = store.upgrade() else { return };
                    if let Err(err) = store.apply_remote(event) {
                        warn!(error = %err, kind = %event.kind(), "failed to apply remote session change");
                    }
                })
            })
            .collect()
    }
}

fn merge_and_persist(
    state: &mut Session,
    credentials: &CredentialStore,
    patch: &ProfilePatch,
) -> ApplicationResult<()> {
    if state.merge_user(patch)? {
        if let Some(user) = &state.user {
            credentials.set_user(user)?;
        }
    }
    Ok(())
}
