//! Cookie-backed sessions. The [`SessionStore`] is an explicit component
//! built once in `main` and handed to the application, so tests get
//! isolation with a fresh store per test. Records live for the process
//! lifetime; there is no expiry or persistence.

use crate::helpers::random_string;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const FLASH_KEY: &str = "__flash";
const SESSION_ID_LEN: usize = 20;

/// Cheaply clonable handle over one session's key/value bag. Handlers
/// mutate through the handle; changes are visible to later requests with
/// the same session id.
#[derive(Clone, Debug, Default)]
pub struct Session {
    data: Arc<Mutex<Map<String, Value>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().ok()?.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        if let Ok(mut data) = self.data.lock() {
            data.insert(key.to_string(), value);
        }
    }

    /// Store a one-time payload (validation errors, echoed form fields)
    /// carried across a redirect.
    pub fn flash_set(&self, value: Value) {
        self.set(FLASH_KEY, value);
    }

    /// Read-once: returns the flash payload and removes it.
    pub fn flash_get(&self) -> Option<Value> {
        self.data.lock().ok()?.remove(FLASH_KEY)
    }
}

/// Process-wide session id → record map. Unsynchronized beyond the map
/// lock: concurrent requests on the same session id are last-writer-wins.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the session for a cookie-provided id, or create a fresh one.
    /// Never fails; the returned id must always be set as a cookie on the
    /// response. The boolean reports whether a new record was created.
    pub fn get_or_create(&self, cookie_id: Option<&str>) -> (String, Session, bool) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(id) = cookie_id {
            if let Some(session) = sessions.get(id) {
                return (id.to_string(), session.clone(), false);
            }
        }

        let mut id = random_string(SESSION_ID_LEN);
        while sessions.contains_key(&id) {
            id = random_string(SESSION_ID_LEN);
        }

        let session = Session::new();
        sessions.insert(id.clone(), session.clone());
        (id, session, true)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .lock()
            .map(|sessions| sessions.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
