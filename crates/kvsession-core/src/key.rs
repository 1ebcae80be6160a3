//! Storage key derivation.

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;

/// One attribute of a composite item key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAttribute {
    /// Attribute name in the table.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// Address of a session record in the backend table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Table holding the record.
    pub table: String,
    /// Partition key.
    pub hash: KeyAttribute,
    /// Sort key, when the table has one.
    pub sort: Option<KeyAttribute>,
}

impl ItemKey {
    /// The derived storage identifier (`prefix + session id`).
    pub fn id(&self) -> &str {
        &self.hash.value
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.table, self.hash.value)
    }
}

/// Builds storage keys from session ids.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    table: String,
    prefix: String,
    hash_key: String,
    sort_key: Option<String>,
}

impl KeyBuilder {
    /// Create a key builder from the store configuration.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            table: config.table_name.clone(),
            prefix: config.hash_prefix.clone(),
            hash_key: config.hash_key.clone(),
            sort_key: config.sort_key.clone(),
        }
    }

    /// Prefix the raw session id.
    pub fn build_key(&self, session_id: &str) -> String {
        format!("{}{}", self.prefix, session_id)
    }

    /// Composite key with the same identifier in hash and sort position.
    pub fn item_key(&self, session_id: &str) -> ItemKey {
        let id = self.build_key(session_id);
        ItemKey {
            table: self.table.clone(),
            sort: self.sort_key.as_ref().map(|name| KeyAttribute {
                name: name.clone(),
                value: id.clone(),
            }),
            hash: KeyAttribute {
                name: self.hash_key.clone(),
                value: id,
            },
        }
    }
}
