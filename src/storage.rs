use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The store ignores directory entries beyond this many files.
pub const MAX_FILES: usize = 64;

/// One file of the host-backed store, held in memory after a scan.
pub struct StoredFile {
    pub name: String,
    pub data: Vec<u8>,
    pub modified: SystemTime,
}

impl StoredFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A flat directory on the host that backs the emulated file system.
/// Everything is scanned into memory up front; writes and deletes go to the
/// host directory and trigger a rescan.
pub struct FileStore {
    root: PathBuf,
    files: Vec<StoredFile>,
}

impl FileStore {
    /// Open (and create if missing) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let mut store = Self {
            root,
            files: Vec::new(),
        };
        store.rescan()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reload the in-memory view from the host directory. Subdirectories
    /// and unreadable names are skipped.
    pub fn rescan(&mut self) -> io::Result<()> {
        self.files.clear();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if self.files.len() >= MAX_FILES {
                break;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let data = fs::read(entry.path())?;
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            self.files.push(StoredFile {
                name,
                data,
                modified,
            });
        }
        self.files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(())
    }

    pub fn files(&self) -> &[StoredFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&StoredFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn write(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(name), data)?;
        self.rescan()
    }

    pub fn delete(&mut self, name: &str) -> io::Result<()> {
        fs::remove_file(self.root.join(name))?;
        self.rescan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_store(tag: &str) -> FileStore {
        let root = std::env::temp_dir().join(format!("microemu_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        FileStore::open(root).expect("create store")
    }

    #[test]
    fn starts_empty_and_creates_the_directory() {
        let store = fresh_store("empty");
        assert!(store.is_empty());
        assert!(store.root().is_dir());
    }

    #[test]
    fn write_find_delete_round_trip() {
        let mut store = fresh_store("roundtrip");
        store.write("prog.bin", &[0x01, 0x41, 0x00]).unwrap();
        let file = store.find("prog.bin").expect("file is in the store");
        assert_eq!(file.data, vec![0x01, 0x41, 0x00]);
        assert_eq!(file.size(), 3);

        store.delete("prog.bin").unwrap();
        assert!(store.find("prog.bin").is_none());
    }

    #[test]
    fn files_are_listed_in_name_order() {
        let mut store = fresh_store("sorted");
        store.write("b.bin", b"b").unwrap();
        store.write("a.bin", b"a").unwrap();
        store.write("c.bin", b"c").unwrap();
        let names: Vec<&str> = store.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.bin", "b.bin", "c.bin"]);
    }

    #[test]
    fn deleting_a_missing_file_is_an_error() {
        let mut store = fresh_store("missing");
        assert!(store.delete("nope.bin").is_err());
    }
}
