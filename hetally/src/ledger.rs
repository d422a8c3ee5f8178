use crate::*;
use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ledger key holding the integer-coded voting stage
pub const STAGE_KEY: &str = "stage";

/// Ledger key holding the base64 tally ciphertext
pub const TALLY_KEY: &str = "vote_tally";

/// Durable key/value state of the ledger.
///
/// Implementations must serialize transactions: within one submission, reads
/// and writes of a key are never interleaved with another submission's. The
/// tally engine does no locking of its own and relies entirely on this.
pub trait LedgerStateStore {
    /// Get the raw value stored under a key
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Replace the value stored under a key
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), Error>;

    /// Current voting stage, closed when never set
    fn get_stage(&self) -> Result<Stage, Error> {
        match self.get_state(STAGE_KEY)? {
            Some(bytes) if !bytes.is_empty() => Stage::from_state(&bytes),
            _ => Ok(Stage::Closed),
        }
    }

    fn put_stage(&mut self, stage: Stage) -> Result<(), Error> {
        self.put_state(STAGE_KEY, stage.to_state())
    }

    /// Current tally ciphertext as base64, absent before the first ballot
    fn get_tally(&self) -> Result<Option<String>, Error> {
        match self.get_state(TALLY_KEY)? {
            Some(bytes) if !bytes.is_empty() => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::CorruptState(TALLY_KEY.to_owned())),
            _ => Ok(None),
        }
    }

    fn put_tally(&mut self, tally: &str) -> Result<(), Error> {
        self.put_state(TALLY_KEY, tally.as_bytes().to_vec())
    }
}

/// A simple store that uses an in-memory BTreeMap
#[derive(Default, Clone, Debug)]
pub struct MemStore {
    inner: BTreeMap<String, Vec<u8>>,
}

impl MemStore {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl LedgerStateStore for MemStore {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.get(key).cloned())
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.inner.insert(key.to_owned(), value);
        Ok(())
    }
}

/// A store persisted as a JSON document of key to base64 value.
///
/// Every write replaces the whole document through a temporary file and a
/// rename, so a reader sees either the old or the new state. Intended for a
/// single local process, not for concurrent writers.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: IndexMap<String, String>,
}

impl FileStore {
    /// Open the store, starting empty if the file does not exist
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, Error> {
        let path = path.into();
        let inner = if path.is_file() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            IndexMap::new()
        };
        Ok(FileStore { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, document: &IndexMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(document)?)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        debug!("ledger state written to {}", self.path.display());
        Ok(())
    }
}

impl LedgerStateStore for FileStore {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        match self.inner.get(key) {
            Some(encoded) => base64::decode(encoded)
                .map(Some)
                .map_err(|_| Error::CorruptState(key.to_owned())),
            None => Ok(None),
        }
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        // Memory follows the file only once the file has been replaced
        let mut document = self.inner.clone();
        document.insert(key.to_owned(), base64::encode(&value));
        self.flush(&document)?;
        self.inner = document;
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::test_util::ScratchDir;

    #[test]
    fn test_mem_store_defaults() {
        let mut store = MemStore::default();
        assert_eq!(store.get_stage().unwrap(), Stage::Closed);
        assert_eq!(store.get_tally().unwrap(), None);

        store.put_stage(Stage::Ongoing).unwrap();
        assert_eq!(store.get_state(STAGE_KEY).unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get_stage().unwrap(), Stage::Ongoing);

        store.put_tally("dGFsbHk=").unwrap();
        assert_eq!(store.get_tally().unwrap().as_deref(), Some("dGFsbHk="));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_corrupt_stage() {
        let mut store = MemStore::default();
        store.put_state(STAGE_KEY, b"9".to_vec()).unwrap();
        assert!(matches!(store.get_stage(), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = ScratchDir::new();
        let path = dir.path().join("ledger").join("state.json");

        {
            let mut store = FileStore::open(&path).unwrap();
            assert_eq!(store.get_stage().unwrap(), Stage::Closed);
            store.put_stage(Stage::Ongoing).unwrap();
            store.put_tally("c29tZSB0YWxseQ==").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get_stage().unwrap(), Stage::Ongoing);
        assert_eq!(
            store.get_tally().unwrap().as_deref(),
            Some("c29tZSB0YWxseQ==")
        );

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }

    #[test]
    fn test_file_store_rejects_bad_document() {
        let dir = ScratchDir::new();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_file_store_failed_write_keeps_state() {
        let dir = ScratchDir::new();
        let path = dir.path().join("ledger.json");
        let mut store = FileStore::open(&path).unwrap();
        store.put_stage(Stage::Ongoing).unwrap();

        // A directory squatting on the temporary file makes the next write fail
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        fs::create_dir(&tmp).unwrap();

        assert!(store.put_tally("dGFsbHk=").is_err());
        assert_eq!(store.get_tally().unwrap(), None);
        assert_eq!(store.get_stage().unwrap(), Stage::Ongoing);
        assert_eq!(FileStore::open(&path).unwrap().get_tally().unwrap(), None);
    }
}
