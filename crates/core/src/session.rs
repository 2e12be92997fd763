//! Per-tab session identifier used to correlate impression, close and
//! submit events server-side.

use chrono::Utc;
use rand::distributions::Uniform;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_SESSION_KEY: &str = "popup_session_id";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Tab-scoped key/value storage (the browser's session storage).
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// `popup_<unix-millis>_<9 base36 chars>`
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..BASE36.len());
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.sample(dist)] as char)
        .collect();
    format!("popup_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Read the session id from `store`, creating and persisting one if absent.
pub fn load_or_create_session_id(store: &mut dyn SessionStore, key: &str) -> String {
    if let Some(existing) = store.get(key).filter(|s| !s.is_empty()) {
        return existing;
    }
    let id = generate_session_id();
    store.set(key, &id);
    debug!(session_id = %id, "created popup session id");
    id
}
