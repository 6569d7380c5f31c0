//! Baseline snapshot persistence.
//!
//! Each feed has at most one baseline, addressed by a [`FeedKey`] derived
//! from the feed URL.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RunnerError, RunnerResult};

/// Maximum length of a feed key, in characters.
pub const FEED_KEY_MAX_CHARS: usize = 35;

/// A filesystem-safe identifier for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedKey(String);

impl FeedKey {
    /// Derives the key for a feed URL.
    ///
    /// Strips `https://`, turns `/` into `_`, drops `.ics`, replaces any other
    /// character outside `[A-Za-z0-9._-]` with `_`, and keeps the last
    /// [`FEED_KEY_MAX_CHARS`] characters.
    pub fn from_url(url: &str) -> Self {
        let sanitized: String = url
            .replace("https://", "")
            .replace(".ics", "")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let skip = sanitized.chars().count().saturating_sub(FEED_KEY_MAX_CHARS);
        Self(sanitized.chars().skip(skip).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence for baseline snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Returns true if a baseline exists for `key`.
    fn exists(&self, key: &FeedKey) -> RunnerResult<bool>;

    /// Returns the baseline bytes for `key`.
    fn read(&self, key: &FeedKey) -> RunnerResult<Vec<u8>>;

    /// Replaces the baseline for `key`.
    fn write(&self, key: &FeedKey, bytes: &[u8]) -> RunnerResult<()>;
}

/// Stores baselines as files in one directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    template: String,
}

impl FileSnapshotStore {
    /// Default file name template; `{}` receives the feed key.
    pub const DEFAULT_TEMPLATE: &'static str = "old_{}.ics";

    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `template` has no `{}` placeholder
    /// or contains a path separator.
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<String>) -> RunnerResult<Self> {
        let template = template.into();
        if !template.contains("{}") {
            return Err(RunnerError::config(format!(
                "snapshot file template '{}' has no {{}} placeholder",
                template
            )));
        }
        if template.contains('/') || template.contains('\\') {
            return Err(RunnerError::config(format!(
                "snapshot file template '{}' must be a file name",
                template
            )));
        }
        Ok(Self {
            dir: dir.into(),
            template,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the baseline path for `key`.
    pub fn path_for(&self, key: &FeedKey) -> PathBuf {
        self.dir.join(self.template.replace("{}", key.as_str()))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn exists(&self, key: &FeedKey) -> RunnerResult<bool> {
        let path = self.path_for(key);
        path.try_exists().map_err(|e| RunnerError::io(&path, e))
    }

    fn read(&self, key: &FeedKey) -> RunnerResult<Vec<u8>> {
        let path = self.path_for(key);
        debug!(path = %path.display(), "Reading baseline");
        fs::read(&path).map_err(|e| RunnerError::io(&path, e))
    }

    /// Writes a temporary sibling and renames it over the baseline.
    fn write(&self, key: &FeedKey, bytes: &[u8]) -> RunnerResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| RunnerError::io(&self.dir, e))?;

        let path = self.path_for(key);
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp).map_err(|e| RunnerError::io(&tmp, e))?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| RunnerError::io(&tmp, e))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(RunnerError::io(&path, e));
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote baseline");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod feed_key {
        use super::*;

        #[test]
        fn strips_scheme_and_extension() {
            let key = FeedKey::from_url("https://example.com/team.ics");
            assert_eq!(key.as_str(), "example.com_team");
        }

        #[test]
        fn keeps_last_characters() {
            let key = FeedKey::from_url(
                "https://calendar.example.org/remote.php/dav/public-calendars/AbCdEf123?export",
            );
            assert_eq!(key.as_str().chars().count(), FEED_KEY_MAX_CHARS);
            assert_eq!(key.as_str(), "v_public-calendars_AbCdEf123_export");
        }

        #[test]
        fn replaces_unsafe_characters() {
            let key = FeedKey::from_url("http://host:8080/a b.ics");
            assert_eq!(key.as_str(), "http___host_8080_a_b");
        }

        #[test]
        fn same_url_same_key() {
            let url = "https://example.com/cal/feed.ics";
            assert_eq!(FeedKey::from_url(url), FeedKey::from_url(url));
        }
    }

    mod file_store {
        use super::*;

        fn store(dir: &TempDir) -> FileSnapshotStore {
            FileSnapshotStore::new(dir.path(), FileSnapshotStore::DEFAULT_TEMPLATE).unwrap()
        }

        #[test]
        fn missing_baseline() {
            let dir = TempDir::new().unwrap();
            let key = FeedKey::from_url("https://example.com/a.ics");
            assert!(!store(&dir).exists(&key).unwrap());
        }

        #[test]
        fn write_then_read() {
            let dir = TempDir::new().unwrap();
            let store = store(&dir);
            let key = FeedKey::from_url("https://example.com/a.ics");

            store.write(&key, b"BEGIN:VCALENDAR").unwrap();

            assert!(store.exists(&key).unwrap());
            assert_eq!(store.read(&key).unwrap(), b"BEGIN:VCALENDAR");
            assert_eq!(
                store.path_for(&key),
                dir.path().join("old_example.com_a.ics")
            );
        }

        #[test]
        fn write_replaces_and_leaves_no_temp_file() {
            let dir = TempDir::new().unwrap();
            let store = store(&dir);
            let key = FeedKey::from_url("https://example.com/a.ics");

            store.write(&key, b"first").unwrap();
            store.write(&key, b"second").unwrap();

            assert_eq!(store.read(&key).unwrap(), b"second");
            let names: Vec<_> = fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            assert_eq!(names.len(), 1);
        }

        #[test]
        fn failed_rename_removes_temp_file() {
            let dir = TempDir::new().unwrap();
            let store = store(&dir);
            let key = FeedKey::from_url("https://example.com/a.ics");
            let blocker = store.path_for(&key);
            fs::create_dir(&blocker).unwrap();
            fs::write(blocker.join("keep"), b"x").unwrap();

            assert!(matches!(
                store.write(&key, b"new"),
                Err(RunnerError::Io { .. })
            ));

            let names: Vec<_> = fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            assert_eq!(names, [blocker.file_name().unwrap().to_owned()]);
        }

        #[test]
        fn creates_directory() {
            let dir = TempDir::new().unwrap();
            let nested = dir.path().join("state").join("calwatch");
            let store = FileSnapshotStore::new(&nested, "{}.ics").unwrap();
            let key = FeedKey::from_url("https://example.com/a.ics");

            store.write(&key, b"x").unwrap();

            assert!(nested.join("example.com_a.ics").exists());
        }

        #[test]
        fn read_missing_is_io_error() {
            let dir = TempDir::new().unwrap();
            let key = FeedKey::from_url("https://example.com/a.ics");
            assert!(matches!(
                store(&dir).read(&key),
                Err(RunnerError::Io { .. })
            ));
        }

        #[test]
        fn rejects_bad_templates() {
            assert!(FileSnapshotStore::new("/tmp", "old.ics").is_err());
            assert!(FileSnapshotStore::new("/tmp", "sub/{}.ics").is_err());
        }
    }
}
