//! Snapshot persistence for columnkv
//!
//! Every accepted write re-serializes the whole dataset into a Parquet
//! image. Saves are serialized by an internal mutex; loading happens once at
//! startup before any save.

use crate::columnar::{read_image, write_image};
use crate::error::{ColumnKvError, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reads and writes the durable image at a fixed path
pub struct Persistence {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Persistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every entry from the image.
    ///
    /// A missing file is a cold start and yields an empty map. A file that
    /// exists but cannot be read or decoded is an error.
    pub async fn load(&self) -> Result<HashMap<String, String>> {
        let _guard = self.lock.lock().await;

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no durable image, starting empty");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        read_image(file).map_err(|e| {
            ColumnKvError::Persistence(format!(
                "cannot decode {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Replace the image with the given snapshot.
    pub async fn save(&self, data: &HashMap<String, String>) -> Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write the new image beside the old one, then swap it in
        let temp_path = self.temp_path();
        if let Err(e) = self.write_and_swap(&temp_path, data) {
            if let Err(remove_err) = fs::remove_file(&temp_path) {
                if remove_err.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %remove_err, "failed to remove temporary image");
                }
            }
            return Err(e);
        }

        debug!(path = %self.path.display(), rows = data.len(), "durable image saved");
        Ok(())
    }

    fn write_and_swap(&self, temp_path: &Path, data: &HashMap<String, String>) -> Result<()> {
        let mut temp_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;

        write_image(&mut temp_file, data)?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(temp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path().join("db.kvc"));

        let mut data = HashMap::new();
        data.insert("key1".to_string(), "value1".to_string());
        data.insert("key2".to_string(), "value2".to_string());

        persistence.save(&data).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_save_and_load_empty() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path().join("empty.kvc"));

        persistence.save(&HashMap::new()).await.unwrap();
        assert!(persistence.path().exists());
        assert!(persistence.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path().join("missing.kvc"));
        assert!(persistence.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("db.kvc");
        let persistence = Persistence::new(&path);

        let mut data = HashMap::new();
        data.insert("a".to_string(), "1".to_string());
        persistence.save(&data).await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("nested").join("deeper").join("db.kvc.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_image() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path().join("db.kvc"));

        let mut first = HashMap::new();
        first.insert("old".to_string(), "1".to_string());
        persistence.save(&first).await.unwrap();

        let mut second = HashMap::new();
        second.insert("new".to_string(), "2".to_string());
        persistence.save(&second).await.unwrap();

        assert_eq!(persistence.load().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.kvc");
        fs::write(&path, b"PAR1 truncated").unwrap();

        let persistence = Persistence::new(&path);
        assert!(matches!(
            persistence.load().await,
            Err(ColumnKvError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"plain file").unwrap();

        // The parent "directory" is a regular file
        let persistence = Persistence::new(blocker.join("db.kvc"));
        assert!(persistence.save(&HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_swap_removes_temporary_image() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("db.kvc");
        // A non-empty directory at the target path makes the rename fail
        fs::create_dir_all(target.join("occupied")).unwrap();

        let persistence = Persistence::new(&target);
        let mut data = HashMap::new();
        data.insert("a".to_string(), "1".to_string());

        assert!(persistence.save(&data).await.is_err());
        assert!(!dir.path().join("db.kvc.tmp").exists());
        assert!(target.is_dir());
    }
}
