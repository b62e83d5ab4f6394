use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONTACTS: &str = "contacts";
pub const INVENTORY: &str = "inventory";
pub const BILLS: &str = "bills";
pub const TRANSACTIONS: &str = "transactions";
pub const LOYALTY: &str = "loyalty";
pub const HUB: &str = "cigarhub";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document {key} is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Filesystem-backed key-value document store, one directory per namespace.
///
/// Writes replace the whole document; there is no locking, so two
/// concurrent read-modify-write cycles on one key keep only the last write.
pub struct BlobStorage {
    base_path: PathBuf,
}

impl BlobStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|source| StorageError::Io {
            path: base_path.clone(),
            source,
        })?;
        Ok(Self { base_path })
    }

    pub fn store(&self, namespace: &str) -> BlobStore {
        BlobStore {
            dir: self.base_path.join(encode_key(namespace)),
        }
    }
}

pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }

    /// Raw bytes of a document, `None` when the key does not exist
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.blob_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    pub fn get_text(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .get_bytes(key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_bytes(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StorageError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set_text(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StorageError::Io { path, source }
        };
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let path = self.blob_path(key);
        fs::write(&path, value).map_err(io_err(&path))?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })?;
        self.set_text(key, &json)
    }
}

/// Map a store key onto a single safe file name.
///
/// `[A-Za-z0-9._-]` pass through, every other byte becomes `%XX`; a key made
/// only of dots is escaped too so it can't name a parent directory.
fn encode_key(key: &str) -> String {
    let escape_dots = key.bytes().all(|b| b == b'.');
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        let keep = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_') || (b == b'.' && !escape_dots);
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("contacts.json"), "contacts.json");
        assert_eq!(encode_key("confirmed:2024-05-01.json"), "confirmed%3A2024-05-01.json");
        assert_eq!(encode_key("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(encode_key(".."), "%2E%2E");
    }

    #[test]
    fn test_text_overwrite_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();
        let store = storage.store(CONTACTS);

        assert_eq!(store.get_text("contacts.csv").unwrap(), None);
        store.set_text("contacts.csv", "Email\na@b.c\n").unwrap();
        assert_eq!(store.get_text("contacts.csv").unwrap().as_deref(), Some("Email\na@b.c\n"));

        store.set_text("contacts.csv", "Email\n").unwrap();
        assert_eq!(store.get_text("contacts.csv").unwrap().as_deref(), Some("Email\n"));
    }

    #[test]
    fn test_json_documents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();
        let store = storage.store(LOYALTY);

        store.set_json("history:7:2024-05-01.json", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<u32>> = store.get_json("history:7:2024-05-01.json").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.set_text("broken.json", "{not json").unwrap();
        let err = store.get_json::<Vec<u32>>("broken.json").unwrap_err();
        assert!(matches!(err, StorageError::Json { .. }));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();

        storage.store(BILLS).set_text("k", "bills").unwrap();
        storage.store(TRANSACTIONS).set_text("k", "tx").unwrap();

        assert_eq!(storage.store(BILLS).get_text("k").unwrap().as_deref(), Some("bills"));
        assert_eq!(storage.store(TRANSACTIONS).get_text("k").unwrap().as_deref(), Some("tx"));
    }
}
