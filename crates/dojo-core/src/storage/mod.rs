mod config;
pub mod database;
mod memory;

pub use config::{AudioConfig, Config, HeartsSection};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{ConfigError, Result, StorageError};

/// Durable string-keyed document store.
///
/// Every engine keeps its whole state under one key as a JSON document.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed JSON access on top of any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|source| {
                StorageError::Decode {
                    key: key.to_string(),
                    source,
                }
                .into()
            }),
            None => Ok(None),
        }
    }

    fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Returns the Keyboard Dojo data directory.
///
/// `DOJO_DATA_DIR` wins when set. Otherwise `~/.config/keyboard-dojo[-dev]/`,
/// with the `-dev` suffix selected by `DOJO_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("DOJO_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("DOJO_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("keyboard-dojo-dev")
            } else {
                base_dir.join("keyboard-dojo")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        n: u32,
    }

    #[test]
    fn typed_roundtrip_through_trait_object() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set_item("doc", &Doc { n: 7 }).unwrap();
        assert_eq!(store.get_item::<Doc>("doc").unwrap(), Some(Doc { n: 7 }));
        assert_eq!(store.get_item::<Doc>("missing").unwrap(), None);
    }

    #[test]
    fn undecodable_document_is_a_decode_error() {
        let store = MemoryStore::new();
        store.set_raw("doc", "{not json").unwrap();
        let err = store.get_item::<Doc>("doc").unwrap_err();
        assert!(err.is_decode());
    }
}
