pub mod models;
pub mod posts;
pub mod refresh_tokens;
pub mod users;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chirpy_types::error::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

pub use models::Document;

/// Handle to the single JSON file backing every entity.
///
/// Reads share the lock; writes and transactions hold it exclusively. The
/// lock only orders access from this process, so one file must have one
/// `Database`.
pub struct Database {
    path: PathBuf,
    lock: RwLock<()>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        };
        db.ensure()?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file (and its directory) if it does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                debug!("Created empty database file at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the whole document. An empty or missing file is an empty document.
    pub fn load(&self) -> Result<Document> {
        let _guard = self.lock.read().map_err(|_| Error::LockPoisoned)?;
        self.read_document()
    }

    /// Replace the whole document on disk.
    pub fn save(&self, doc: &Document) -> Result<()> {
        let _guard = self.lock.write().map_err(|_| Error::LockPoisoned)?;
        self.write_document(doc)
    }

    /// Load, mutate and store under one exclusive lock.
    ///
    /// Nothing is written when `f` fails, so a rejected mutation leaves the
    /// file exactly as it was.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let _guard = self.lock.write().map_err(|_| Error::LockPoisoned)?;
        let mut doc = self.read_document()?;
        let value = f(&mut doc)?;
        self.write_document(&doc)?;
        Ok(value)
    }

    fn read_document(&self) -> Result<Document> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::default());
        }

        let mut doc: Document = serde_json::from_slice(&data)?;
        doc.reconcile_sequences();
        Ok(doc)
    }

    fn write_document(&self, doc: &Document) -> Result<()> {
        let payload = serde_json::to_vec(doc)?;

        // Same directory as the target so the rename never crosses filesystems.
        let tmp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        if let Err(e) = replace_file(&tmp_path, &self.path, &payload) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn replace_file(tmp_path: &Path, path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp_path)?;
    file.write_all(payload)?;
    file.sync_all()?;
    fs::rename(tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostRecord, RefreshTokenRecord, UserRecord};
    use chirpy_types::error::ErrorKind;
    use chrono::Utc;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("database.json")).unwrap();
        (dir, db)
    }

    #[test]
    fn fresh_file_loads_as_empty_document() {
        let (_dir, db) = open_temp();
        assert!(db.path().exists());

        let doc = db.load().unwrap();
        assert!(doc.users.is_empty());
        assert!(doc.posts.is_empty());
        assert!(doc.refresh_tokens.is_empty());

        // Loading twice is still fine.
        assert_eq!(db.load().unwrap(), Document::default());
    }

    #[test]
    fn ensure_is_idempotent_and_keeps_content() {
        let (_dir, db) = open_temp();
        db.transaction(|doc| {
            doc.next_user_id();
            Ok(())
        })
        .unwrap();

        db.ensure().unwrap();
        assert_eq!(db.load().unwrap().sequences.users, 1);
    }

    #[test]
    fn ensure_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("db.json");
        let db = Database::open(&path).unwrap();
        assert!(db.path().exists());
    }

    #[test]
    fn malformed_content_is_a_storage_error() {
        let (_dir, db) = open_temp();
        fs::write(db.path(), b"{not json").unwrap();

        let err = db.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, db) = open_temp();

        let mut doc = Document::default();
        for email in ["a@example.com", "b@example.com"] {
            let id = doc.next_user_id();
            doc.users.insert(
                id,
                UserRecord {
                    id,
                    email: email.into(),
                    password_hash: vec![0, 159, 255, 10],
                    is_upgraded: id == 2,
                },
            );
        }
        let post_id = doc.next_post_id();
        doc.posts.insert(
            post_id,
            PostRecord {
                id: post_id,
                author_id: 2,
                body: "hello".into(),
            },
        );
        doc.refresh_tokens.push(RefreshTokenRecord {
            user_id: 1,
            expires_at: Utc::now(),
            token: "ab".repeat(32),
        });

        db.save(&doc).unwrap();
        assert_eq!(db.load().unwrap(), doc);
    }

    #[test]
    fn failed_transaction_writes_nothing() {
        let (_dir, db) = open_temp();
        let before = fs::read(db.path()).unwrap();

        let result: Result<()> = db.transaction(|doc| {
            doc.next_user_id();
            Err(Error::validation("nope"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(db.path()).unwrap(), before);
    }

    #[test]
    fn writes_leave_no_temp_files_behind() {
        let (dir, db) = open_temp();
        for _ in 0..3 {
            db.save(&Document::default()).unwrap();
        }

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
