use std::{
    collections::HashSet,
    fmt,
    fs::{self, File},
    io::Read,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use sha2::{Digest, Sha256};

use crate::Result;

/// Read size used when fingerprinting files already on disk.
pub const HASH_CHUNK_SIZE: usize = 4096;

/// SHA-256 content digest. Equal fingerprints mean identical files, whatever the name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut h = Sha256::new();
        h.update(bytes);
        Self(h.finalize().into())
    }

    /// Stream `path` through the hasher without loading it whole.
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut h = Sha256::new();
        let mut buf = [0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            h.update(&buf[..n]);
        }
        Ok(Self(h.finalize().into()))
    }

}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Set of fingerprints of every file the bot has stored.
///
/// Seeded once from the destination directory, then only ever grows. All access goes
/// through one mutex so check-then-insert is a single critical section.
#[derive(Debug, Default)]
pub struct ContentHashStore {
    inner: Mutex<HashSet<Fingerprint>>,
}

impl ContentHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint every regular file directly inside `dir`.
    ///
    /// Any unreadable entry is an error: a partially seeded store would let
    /// duplicates through, so the caller should treat this as fatal.
    pub fn seed(dir: &Path) -> Result<Self> {
        let mut set = HashSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            // Follow symlinks: a link to a stored file is still stored content.
            if !fs::metadata(entry.path())?.is_file() {
                continue;
            }
            let fp = Fingerprint::of_file(&entry.path())?;
            tracing::debug!(file = %entry.path().display(), fingerprint = %fp, "indexed");
            set.insert(fp);
        }
        Ok(Self {
            inner: Mutex::new(set),
        })
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.lock().contains(fp)
    }

    pub fn insert(&self, fp: Fingerprint) {
        self.lock().insert(fp);
    }

    /// Insert `fp` unless it is already present. Returns `true` if it was new.
    pub fn insert_if_absent(&self, fp: Fingerprint) -> bool {
        self.lock().insert(fp)
    }

    /// Undo an insert whose file never made it to disk.
    pub(crate) fn forget(&self, fp: &Fingerprint) {
        self.lock().remove(fp);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Fingerprint>> {
        // A poisoned set is still a valid set; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
