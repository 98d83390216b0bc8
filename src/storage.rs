use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// The four directories a stored picture can occupy, all keyed by the same
/// `<hash>.<ext>` filename.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub staging: PathBuf,
    pub pictures: PathBuf,
    pub thumbs: PathBuf,
    pub halfres: PathBuf,
}

impl StorageLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            staging: root.join("temp"),
            pictures: root.join("pictures"),
            thumbs: root.join("thumbs"),
            halfres: root.join("halfres"),
        }
    }

    /// Create any missing directory. Safe to call repeatedly.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in self.dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn dirs(&self) -> [&Path; 4] {
        [&self.staging, &self.pictures, &self.thumbs, &self.halfres]
    }

    pub fn original(&self, filename: &str) -> PathBuf {
        self.pictures.join(filename)
    }

    pub fn thumb(&self, filename: &str) -> PathBuf {
        self.thumbs.join(filename)
    }

    pub fn halfres_copy(&self, filename: &str) -> PathBuf {
        self.halfres.join(filename)
    }

    /// A fresh path in the staging directory for an incoming upload.
    pub fn new_staging_path(&self) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.staging
            .join(format!("upload-{}-{}-{}.part", std::process::id(), nanos, seq))
    }

    /// Delete `filename` from every directory it appears in. Returns how many
    /// files were removed; failures are logged and skipped.
    pub fn remove_files(&self, filename: &str) -> usize {
        let mut removed = 0;
        for dir in self.dirs() {
            let path = dir.join(filename);
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("cannot remove {:?}: {}", path, e),
            }
        }
        removed
    }
}
