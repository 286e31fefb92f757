//! Flash filesystem stand-in: a flat directory of named records.
//!
//! Writes go to a dot-prefixed `.tmp` sibling and are renamed into place, so
//! a power cut never leaves a half-written record. Files are owner-only on
//! Unix.
//!
//! Record names are single path components. Anything that could resolve
//! outside the root (absolute paths, separators, `..`) is refused with
//! `InvalidInput`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A directory of flat, named records.
#[derive(Debug, Clone)]
pub struct FlashStore {
    root: PathBuf,
}

impl FlashStore {
    /// Open (and create if needed) the store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the record `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `name` is not a plain record name.
    pub fn path(&self, name: &str) -> io::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// `false` for invalid names as well as missing records.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|path| path.is_file())
    }

    /// Read a record; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `NotFound`.
    pub fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(name)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a UTF-8 record; invalid UTF-8 is reported as `InvalidData`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `NotFound`.
    pub fn read_string(&self, name: &str) -> io::Result<Option<String>> {
        self.read(name)?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .transpose()
    }

    /// Atomically replace a record.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the write, chmod or rename fails.
    pub fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path(name)?;
        let tmp = self.root.join(format!(".{name}.tmp"));

        fs::write(&tmp, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)
    }

    /// Delete a record; `Ok(false)` if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `NotFound`.
    pub fn remove(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn validate_name(name: &str) -> io::Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !Path::new(name).is_absolute();
    if plain {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid record name {name:?}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path()).unwrap();
        assert!(store.read("absent").unwrap().is_none());
        assert!(!store.exists("absent"));
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path().join("flash")).unwrap();
        store.write("rec", b"hello").unwrap();
        assert!(store.exists("rec"));
        assert_eq!(store.read("rec").unwrap().unwrap(), b"hello");
        assert_eq!(store.read_string("rec").unwrap().unwrap(), "hello");
        assert!(!dir.path().join("flash/.rec.tmp").exists());
        assert!(store.remove("rec").unwrap());
        assert!(!store.remove("rec").unwrap());
    }

    #[test]
    fn write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path()).unwrap();
        store.write("rec", b"one").unwrap();
        store.write("rec", b"two").unwrap();
        assert_eq!(store.read("rec").unwrap().unwrap(), b"two");
    }

    #[test]
    fn read_string_rejects_binary() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path()).unwrap();
        store.write("bin", &[0xff, 0xfe]).unwrap();
        let err = store.read_string("bin").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn names_that_leave_the_root_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path().join("flash")).unwrap();
        let outside = dir.path().join("outside.txt");
        fs::write(&outside, b"keep me").unwrap();
        let absolute = outside.to_str().unwrap().to_owned();

        for name in ["", ".", "..", "../outside.txt", "sub/rec", "sub\\rec", absolute.as_str()] {
            assert_eq!(
                store.read(name).unwrap_err().kind(),
                io::ErrorKind::InvalidInput,
                "read {name:?}"
            );
            assert_eq!(
                store.write(name, b"x").unwrap_err().kind(),
                io::ErrorKind::InvalidInput,
                "write {name:?}"
            );
            assert_eq!(
                store.remove(name).unwrap_err().kind(),
                io::ErrorKind::InvalidInput,
                "remove {name:?}"
            );
            assert!(!store.exists(name));
        }
        assert_eq!(fs::read(&outside).unwrap(), b"keep me");
    }

    #[test]
    fn dotted_names_inside_root_are_fine() {
        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path()).unwrap();
        store.write("ble_pin.json.enc", b"x").unwrap();
        assert!(store.exists("ble_pin.json.enc"));
    }

    #[cfg(unix)]
    #[test]
    fn records_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FlashStore::open(dir.path()).unwrap();
        store.write("rec", b"x").unwrap();
        let mode = fs::metadata(store.path("rec").unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
