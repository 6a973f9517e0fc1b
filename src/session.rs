//! Session resumption storage.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::context::Context;
use crate::Error;

/// A resumable session: the id the server assigned and the master secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Vec<u8>,
    pub secret: Zeroizing<Vec<u8>>,
}

/// Storage of resumable sessions.
///
/// Clients key sessions by the transport's session key (typically the
/// remote address plus server name), servers by session id.
pub trait SessionStore: Send + Sync {
    /// Look up a session. `Ok(None)` when there is none.
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Option<Session>, Error>;

    fn set(&self, key: &[u8], session: Session) -> Result<(), Error>;

    fn del(&self, key: &[u8]) -> Result<(), Error>;
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::SessionStore("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Option<Session>, Error> {
        ctx.check()?;
        let sessions = self.sessions.lock().map_err(poisoned)?;
        Ok(sessions.get(key).cloned())
    }

    fn set(&self, key: &[u8], session: Session) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        sessions.insert(key.to_vec(), session);
        Ok(())
    }

    fn del(&self, key: &[u8]) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        sessions.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_del() {
        let store = MemorySessionStore::new();
        let ctx = Context::background();
        let session = Session {
            id: vec![1, 2, 3],
            secret: Zeroizing::new(vec![9; 48]),
        };

        assert_eq!(store.get(&ctx, b"peer").unwrap(), None);
        store.set(b"peer", session.clone()).unwrap();
        assert_eq!(store.get(&ctx, b"peer").unwrap(), Some(session));
        assert_eq!(store.len(), 1);

        store.del(b"peer").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn cancelled_lookup() {
        let store = MemorySessionStore::new();
        let ctx = Context::background();
        ctx.cancel();
        assert!(matches!(store.get(&ctx, b"peer"), Err(Error::Cancelled)));
    }
}
