//! Server-held key-backup descriptor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The server-held record describing the online key backup.
///
/// `auth_data` is the algorithm-specific payload, carried as raw JSON. Its
/// optional `signatures` entry is a two-level map keyed by signer identity
/// and then key identifier. A descriptor counts as trusted once the map
/// holds entries for both the current device key and the account's master
/// cross-signing key, computed over the same canonical serialization of the
/// payload with `signatures` and `unsigned` stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDescriptor {
    /// Server-assigned backup version identifier.
    pub version: String,

    /// Backup algorithm identifier.
    pub algorithm: String,

    /// Algorithm-specific auth payload, including any `signatures` map.
    pub auth_data: Value,
}

impl BackupDescriptor {
    /// The signable payload: `auth_data` with the `signatures` and
    /// `unsigned` keys removed.
    ///
    /// Signing and verification must both run over this exact value.
    pub fn signable_payload(&self) -> Value {
        let mut map = match &self.auth_data {
            Value::Object(map) => map.clone(),
            other => return other.clone(),
        };
        map.remove("signatures");
        map.remove("unsigned");
        Value::Object(map)
    }

    /// Record a signature under `signatures[user_id][key_id]`, creating the
    /// nested maps as needed.
    pub fn attach_signature(&mut self, user_id: &str, key_id: String, signature: String) {
        if !self.auth_data.is_object() {
            self.auth_data = Value::Object(Map::new());
        }
        // is_object checked above, as_object_mut cannot miss
        let Some(auth) = self.auth_data.as_object_mut() else { return };

        let signatures = auth
            .entry("signatures".to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !signatures.is_object() {
            *signatures = Value::Object(Map::new());
        }
        let Some(by_user) = signatures.as_object_mut() else { return };

        let user_entry =
            by_user.entry(user_id.to_owned()).or_insert_with(|| Value::Object(Map::new()));
        if !user_entry.is_object() {
            *user_entry = Value::Object(Map::new());
        }
        let Some(by_key) = user_entry.as_object_mut() else { return };

        by_key.insert(key_id, Value::String(signature));
    }

    /// Look up a signature by signer identity and key identifier.
    pub fn signature(&self, user_id: &str, key_id: &str) -> Option<&str> {
        self.auth_data
            .get("signatures")?
            .get(user_id)?
            .get(key_id)?
            .as_str()
    }
}
