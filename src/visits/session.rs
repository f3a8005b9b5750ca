use serde_json::Value;
use std::collections::HashMap;
use tower_sessions::{session, Session};

use super::{PerClientStore, LAST_VISIT_KEY, VISITS_KEY};

/// Visit entries kept in the server-side session.
///
/// Session access is async, so the two entries are loaded up front and
/// written back with [`SessionStore::commit`].
#[derive(Debug, Default)]
pub struct SessionStore {
    values: HashMap<String, String>,
    dirty: Vec<String>,
}

impl SessionStore {
    pub async fn load(session: &Session) -> Result<Self, session::Error> {
        let mut values = HashMap::new();

        for key in [VISITS_KEY, LAST_VISIT_KEY] {
            if let Some(value) = session.get_value(key).await? {
                match value_to_string(value) {
                    Some(value) => {
                        values.insert(key.to_string(), value);
                    }
                    None => {
                        tracing::debug!(key, "ignoring non-scalar session entry");
                    }
                }
            }
        }

        Ok(Self {
            values,
            dirty: Vec::new(),
        })
    }

    /// Write entries changed since [`SessionStore::load`] back to the session
    pub async fn commit(self, session: &Session) -> Result<(), session::Error> {
        for key in &self.dirty {
            if let Some(value) = self.values.get(key) {
                session.insert(key, value).await?;
            }
        }
        Ok(())
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl PerClientStore for SessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        if !self.dirty.iter().any(|k| k == key) {
            self.dirty.push(key.to_string());
        }
        self.values.insert(key.to_string(), value);
    }
}
