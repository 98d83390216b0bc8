use crate::db::is_unique_violation;
use crate::import::exif::MetadataExtractor;
use crate::import::thumbnails::{self, DerivativeSizes};
use crate::import::util::{hash_file, stored_filename};
use crate::pictures::repository;
use crate::species::repository::species_exists;
use crate::storage::StorageLayout;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An upload already written to the staging directory.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub staged: PathBuf,
    /// Filename as sent by the client; only its extension is kept.
    pub original_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: Vec<i64>,
    pub duplicates: Vec<String>,
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub regenerated: usize,
    pub failed: Vec<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("species {0} not found")]
    UnknownSpecies(i64),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

enum Outcome {
    Created(i64),
    Duplicate,
}

/// Move a staged file into place. Falls back to copy + delete when the
/// staging directory lives on another volume.
fn move_into_place(staged: &Path, target: &Path) -> std::io::Result<()> {
    match std::fs::rename(staged, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                "rename {:?} -> {:?} failed ({}), copying",
                staged,
                target,
                rename_err
            );
            std::fs::copy(staged, target)?;
            std::fs::remove_file(staged)
        }
    }
}

/// Remove a file left behind by a failed or skipped upload. A failure is
/// logged so the leaked file can be found later.
pub(crate) fn discard_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("cannot remove {:?}: {}", path, e);
        }
    }
}

/// Bring derivatives up to date and refresh the landscape flag. Returns how
/// many derivative files were written.
fn finish_picture(
    conn: &Connection,
    layout: &StorageLayout,
    sizes: DerivativeSizes,
    id: i64,
    filename: &str,
) -> Result<usize, String> {
    let written =
        thumbnails::ensure_derivatives(layout, filename, sizes).map_err(|e| e.to_string())?;
    if let Some(landscape) = thumbnails::landscape(layout, filename) {
        repository::set_landscape(conn, id, landscape).map_err(|e| e.to_string())?;
    }
    Ok(written)
}

fn ingest_one(
    conn: &Connection,
    layout: &StorageLayout,
    extractor: &MetadataExtractor,
    upload: &StagedUpload,
    species_id: Option<i64>,
) -> Result<(Outcome, String), String> {
    let hash = hash_file(&upload.staged).map_err(|e| format!("cannot read upload: {}", e))?;
    let filename = stored_filename(&hash, &upload.original_name);
    let target = layout.original(&filename);

    // Identical bytes are already stored: keep that file, the insert below
    // reports the duplicate.
    let moved = if target.exists() {
        discard_file(&upload.staged);
        false
    } else {
        move_into_place(&upload.staged, &target)
            .map_err(|e| format!("cannot store upload: {}", e))?;
        true
    };

    let metadata = extractor.extract(&target);
    match repository::insert_picture(conn, &filename, &metadata, species_id) {
        Ok(id) => Ok((Outcome::Created(id), filename)),
        Err(e) if is_unique_violation(&e) => Ok((Outcome::Duplicate, filename)),
        Err(e) => {
            if moved {
                discard_file(&target);
            }
            Err(format!("database error: {}", e))
        }
    }
}

/// Store a batch of staged uploads as pictures.
///
/// An unknown `species_id` rejects the whole batch before any file is
/// touched. Otherwise every upload is processed in order and problems with
/// one file are recorded in the report without stopping the rest.
pub fn ingest_batch(
    conn: &Connection,
    layout: &StorageLayout,
    extractor: &MetadataExtractor,
    sizes: DerivativeSizes,
    uploads: &[StagedUpload],
    species_id: Option<i64>,
) -> Result<IngestReport, IngestError> {
    if let Some(sid) = species_id {
        if !species_exists(conn, sid)? {
            for upload in uploads {
                discard_file(&upload.staged);
            }
            return Err(IngestError::UnknownSpecies(sid));
        }
    }

    tracing::info!(
        "ingest: {} upload(s), species={:?}",
        uploads.len(),
        species_id
    );

    let mut report = IngestReport::default();
    for upload in uploads {
        match ingest_one(conn, layout, extractor, upload, species_id) {
            Ok((Outcome::Created(id), filename)) => {
                report.created.push(id);
                if let Err(reason) = finish_picture(conn, layout, sizes, id, &filename) {
                    tracing::warn!("ingest: derivatives for {} failed: {}", filename, reason);
                    report.failed.push(FailedUpload {
                        name: upload.original_name.clone(),
                        reason,
                    });
                }
            }
            Ok((Outcome::Duplicate, filename)) => {
                tracing::info!(
                    "ingest: {} is already stored as {}",
                    upload.original_name,
                    filename
                );
                report.duplicates.push(upload.original_name.clone());
            }
            Err(reason) => {
                tracing::warn!("ingest: {} failed: {}", upload.original_name, reason);
                discard_file(&upload.staged);
                report.failed.push(FailedUpload {
                    name: upload.original_name.clone(),
                    reason,
                });
            }
        }
    }

    tracing::info!(
        "ingest: done, created={} duplicates={} failed={}",
        report.created.len(),
        report.duplicates.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Regenerate missing derivatives and landscape flags for every stored picture.
pub fn refresh_derivatives(
    conn: &Connection,
    layout: &StorageLayout,
    sizes: DerivativeSizes,
) -> rusqlite::Result<RefreshReport> {
    let pictures = repository::list_pictures(conn)?;
    let mut report = RefreshReport::default();
    for picture in &pictures {
        match finish_picture(conn, layout, sizes, picture.id, &picture.path) {
            Ok(written) => report.regenerated += written,
            Err(reason) => {
                tracing::warn!(
                    "refresh: picture {} ({}): {}",
                    picture.id,
                    picture.path,
                    reason
                );
                report.failed.push(picture.id);
            }
        }
    }
    tracing::info!(
        "refresh: {} picture(s), {} derivative(s) written, {} failed",
        pictures.len(),
        report.regenerated,
        report.failed.len()
    );
    Ok(report)
}
