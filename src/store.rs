//! Page persistence.
//!
//! [`PageStore`] is the only shared mutable resource in the server. The
//! contract is small: `load` returns `Ok(None)` for a page that was never
//! saved, and `save` replaces the whole body. No caching: every call sees the
//! disk as it is at call time.
//!
//! [`FsStore`] keeps one file per page:
//!
//! ```text
//! {root}/
//! +-- FrontPage.txt      # raw body bytes, no header
//! +-- Alpha.txt
//! ```
//!
//! Writes go to a temporary file in `root`, are synced, and are then renamed
//! over the record. A reader sees either the old body or the new one, never a
//! torn write. Two concurrent saves of the same page race on the rename and
//! the last one wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::validate::PageName;

/// Record file extension.
const EXTENSION: &str = "txt";

/// A named page and its body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page {
    pub name: PageName,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(name: PageName, body: impl Into<Vec<u8>>) -> Self {
        Self { name, body: body.into() }
    }

    /// A page that has not been written yet.
    pub fn empty(name: PageName) -> Self {
        Self { name, body: Vec::new() }
    }
}

/// A read or write that the storage backend could not complete.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reading page {name}: {source}")]
    Read {
        name: PageName,
        #[source]
        source: std::io::Error,
    },

    #[error("writing page {name}: {source}")]
    Write {
        name: PageName,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// The page the failed call was about.
    pub fn name(&self) -> &PageName {
        match self {
            Self::Read { name, .. } | Self::Write { name, .. } => name,
        }
    }
}

/// Durable page storage.
///
/// Calls are blocking; async callers run them on the blocking pool.
/// Implementations must allow concurrent calls for different pages.
pub trait PageStore: Send + Sync + 'static {
    /// Reads the stored body for `name`, or `None` if it was never saved.
    fn load(&self, name: &PageName) -> Result<Option<Page>, StoreError>;

    /// Replaces the stored body for `page.name`, creating it if absent.
    fn save(&self, page: &Page) -> Result<(), StoreError>;
}

/// [`PageStore`] backed by a directory of `{name}.txt` files.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "page store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    /// Where the record for `name` lives.
    pub fn record_path(&self, name: &PageName) -> PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }
}

impl PageStore for FsStore {
    fn load(&self, name: &PageName) -> Result<Option<Page>, StoreError> {
        match fs::read(self.record_path(name)) {
            Ok(body) => Ok(Some(Page::new(name.clone(), body))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { name: name.clone(), source }),
        }
    }

    fn save(&self, page: &Page) -> Result<(), StoreError> {
        let failed = |source| StoreError::Write { name: page.name.clone(), source };

        // The temp name never ends in `.txt`, so it can't be mistaken for a
        // record. On unix tempfile creates it 0600, which the rename keeps.
        let prefix = format!(".{}.", page.name);
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(failed)?;

        tmp.write_all(&page.body).map_err(failed)?;
        tmp.as_file().sync_all().map_err(failed)?;

        // On failure the temp file is removed when `PersistError` drops.
        tmp.persist(self.record_path(&page.name))
            .map_err(|e| failed(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn name(s: &str) -> PageName {
        PageName::new(s).unwrap()
    }

    fn create_test_store() -> (TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_page_is_none() {
        let (_dir, store) = create_test_store();
        assert_eq!(store.load(&name("Nothing")).unwrap(), None);
    }

    #[test]
    fn save_then_load_is_byte_exact() {
        let (_dir, store) = create_test_store();
        let body = vec![0u8, 159, 146, 150, b'\n', b'\r', 0xff];
        store.save(&Page::new(name("Bin"), body.clone())).unwrap();

        assert_eq!(store.load(&name("Bin")).unwrap().unwrap().body, body);
    }

    #[test]
    fn record_is_plain_file_named_after_page() {
        let (dir, store) = create_test_store();
        store.save(&Page::new(name("Alpha"), "hello")).unwrap();

        assert_eq!(fs::read(dir.path().join("Alpha.txt")).unwrap(), b"hello");
    }

    #[test]
    fn overwrite_leaves_no_residue() {
        let (_dir, store) = create_test_store();
        let alpha = name("Alpha");
        store.save(&Page::new(alpha.clone(), "a much longer first body")).unwrap();
        store.save(&Page::new(alpha.clone(), "a much longer first body")).unwrap();
        assert_eq!(store.load(&alpha).unwrap().unwrap().body, b"a much longer first body");

        store.save(&Page::new(alpha.clone(), "short")).unwrap();
        assert_eq!(store.load(&alpha).unwrap().unwrap().body, b"short");
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (dir, store) = create_test_store();
        store.save(&Page::new(name("Alpha"), "one")).unwrap();
        store.save(&Page::new(name("Alpha"), "two")).unwrap();
        store.save(&Page::new(name("Beta"), "three")).unwrap();

        let mut entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        entries.sort();
        assert_eq!(entries, ["Alpha.txt", "Beta.txt"]);
    }

    #[test]
    fn failed_write_keeps_previous_body() {
        let (dir, store) = create_test_store();
        let alpha = name("Alpha");
        store.save(&Page::new(alpha.clone(), "original")).unwrap();

        // Turn the record into a non-empty directory so the rename must fail.
        let record = store.record_path(&alpha);
        fs::remove_file(&record).unwrap();
        fs::create_dir(&record).unwrap();
        fs::write(record.join("keep"), "x").unwrap();

        let err = store.save(&Page::new(alpha.clone(), "replacement")).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(err.name(), &alpha);
        assert!(record.is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn save_into_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path().join("pages")).unwrap();
        fs::remove_dir(store.root()).unwrap();

        let err = store.save(&Page::new(name("Alpha"), "x")).unwrap_err();
        assert!(err.to_string().starts_with("writing page Alpha:"));
        assert_eq!(store.load(&name("Alpha")).unwrap(), None);
    }

    #[test]
    fn unreadable_record_is_a_read_error() {
        let (_dir, store) = create_test_store();
        fs::create_dir(store.record_path(&name("Dir"))).unwrap();

        let err = store.load(&name("Dir")).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn concurrent_saves_to_distinct_pages() {
        let (_dir, store) = create_test_store();

        std::thread::scope(|s| {
            for i in 0..16 {
                let store = &store;
                s.spawn(move || {
                    for round in 0..20 {
                        let body = format!("page {i} round {round}");
                        store.save(&Page::new(name(&format!("P{i}")), body)).unwrap();
                    }
                });
            }
        });

        for i in 0..16 {
            let page = store.load(&name(&format!("P{i}"))).unwrap().unwrap();
            assert_eq!(page.body, format!("page {i} round 19").into_bytes());
        }
    }
}
