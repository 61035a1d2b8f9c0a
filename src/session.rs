//! Session context: the single owner of the persisted auth token and display
//! name. Every reader goes through it, and every write is broadcast to
//! subscribers, so dependents never hold a stale view after a login or logout.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::logging::{self, obj, token_fingerprint, v_bool, v_str, Domain};
use crate::storage::LocalStorage;

pub const AUTH_TOKEN_KEY: &str = "es_auth_token";
pub const USER_NAME_KEY: &str = "es_user_name";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub display_name: Option<String>,
}

impl Session {
    /// Token presence is the only authorization signal; it is never checked
    /// locally beyond being non-empty.
    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().filter(|n| !n.is_empty())
    }
}

struct Inner {
    storage: Mutex<LocalStorage>,
    tx: watch::Sender<Session>,
}

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(storage: LocalStorage) -> Result<Self> {
        let initial = Session {
            token: storage.get_item(AUTH_TOKEN_KEY)?,
            display_name: storage.get_item(USER_NAME_KEY)?,
        };
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            inner: Arc::new(Inner {
                storage: Mutex::new(storage),
                tx,
            }),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        Self::new(LocalStorage::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(LocalStorage::in_memory()?)
    }

    pub fn read(&self) -> Session {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.tx.subscribe()
    }

    /// Store a fresh token. The display name is only replaced when one is
    /// given; a previously stored name is otherwise left in place.
    pub fn sign_in(&self, token: &str, display_name: Option<&str>) -> Result<()> {
        let mut sets = vec![(AUTH_TOKEN_KEY, token)];
        if let Some(name) = display_name {
            sets.push((USER_NAME_KEY, name));
        }
        self.with_storage(|s| s.apply(&sets, &[]))?;

        self.inner.tx.send_modify(|session| {
            session.token = Some(token.to_string());
            if let Some(name) = display_name {
                session.display_name = Some(name.to_string());
            }
        });
        logging::info(
            Domain::Session,
            "session.write",
            obj(&[
                ("token_fp", v_str(&token_fingerprint(token))),
                ("has_display_name", v_bool(display_name.is_some())),
            ]),
        );
        Ok(())
    }

    /// Remove both stored fields.
    pub fn clear(&self) -> Result<()> {
        self.with_storage(|s| s.apply(&[], &[AUTH_TOKEN_KEY, USER_NAME_KEY]))?;
        self.inner.tx.send_replace(Session::default());
        logging::info(Domain::Session, "session.clear", obj(&[]));
        Ok(())
    }

    /// Re-read the backing store, picking up writes made by another process.
    pub fn reload(&self) -> Result<Session> {
        let session = self.with_storage(|s| {
            Ok(Session {
                token: s.get_item(AUTH_TOKEN_KEY)?,
                display_name: s.get_item(USER_NAME_KEY)?,
            })
        })?;
        self.inner.tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session.clone();
                true
            }
        });
        Ok(session)
    }

    fn with_storage<T>(&self, f: impl FnOnce(&mut LocalStorage) -> Result<T>) -> Result<T> {
        let mut storage = self
            .inner
            .storage
            .lock()
            .map_err(|_| anyhow!("session storage lock poisoned"))?;
        f(&mut storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_logged_out() {
        let ctx = SessionContext::in_memory().unwrap();
        assert!(!ctx.read().is_logged_in());
        assert_eq!(ctx.read(), Session::default());
    }

    #[test]
    fn test_sign_in_then_clear() {
        let ctx = SessionContext::in_memory().unwrap();
        ctx.sign_in("tok-1", Some("Ada")).unwrap();
        let s = ctx.read();
        assert!(s.is_logged_in());
        assert_eq!(s.token(), Some("tok-1"));
        assert_eq!(s.display_name(), Some("Ada"));

        ctx.clear().unwrap();
        assert_eq!(ctx.read(), Session::default());
        assert_eq!(ctx.reload().unwrap(), Session::default());
    }

    #[test]
    fn test_sign_in_without_name_keeps_previous_name() {
        let ctx = SessionContext::in_memory().unwrap();
        ctx.sign_in("tok-1", Some("Ada")).unwrap();
        ctx.sign_in("tok-2", None).unwrap();
        let s = ctx.reload().unwrap();
        assert_eq!(s.token(), Some("tok-2"));
        assert_eq!(s.display_name(), Some("Ada"));
    }

    #[test]
    fn test_empty_token_is_not_a_session() {
        let s = Session {
            token: Some(String::new()),
            display_name: None,
        };
        assert!(!s.is_logged_in());
    }

    #[test]
    fn test_subscribers_observe_writes() {
        let ctx = SessionContext::in_memory().unwrap();
        let mut rx = ctx.subscribe();
        assert!(!rx.has_changed().unwrap());
        ctx.sign_in("tok", None).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_logged_in());
        ctx.clear().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_logged_in());
    }

    #[test]
    fn test_session_persists_across_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sqlite");
        let path = path.to_str().unwrap();
        SessionContext::open(path).unwrap().sign_in("tok", Some("Ada")).unwrap();
        let reopened = SessionContext::open(path).unwrap();
        assert_eq!(reopened.read().token(), Some("tok"));
        reopened.clear().unwrap();
        assert!(!SessionContext::open(path).unwrap().read().is_logged_in());
    }
}
