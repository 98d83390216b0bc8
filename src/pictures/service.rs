use crate::pictures::model::{DataType, Picture};
use crate::pictures::repository;
use crate::storage::StorageLayout;
use rusqlite::Connection;
use std::path::PathBuf;

/// Path of the stored file `data_type` refers to. `None` for `Meta`.
pub fn stored_file(
    layout: &StorageLayout,
    picture: &Picture,
    data_type: DataType,
) -> Option<PathBuf> {
    match data_type {
        DataType::Meta => None,
        DataType::FullFile => Some(layout.original(&picture.path)),
        DataType::ThumbFile => Some(layout.thumb(&picture.path)),
        DataType::HalfresFile => Some(layout.halfres_copy(&picture.path)),
    }
}

/// Delete a picture's row (and its gallery memberships) and then every file
/// stored under its filename. Returns the deleted picture, or `None` if the
/// id is unknown.
pub fn delete_picture(
    conn: &Connection,
    layout: &StorageLayout,
    id: i64,
) -> rusqlite::Result<Option<Picture>> {
    let Some(picture) = repository::get_picture(conn, id)? else {
        return Ok(None);
    };
    if !repository::delete_picture(conn, id)? {
        return Ok(None);
    }
    let removed = layout.remove_files(&picture.path);
    tracing::info!("deleted picture {} ({}), {} file(s) removed", id, picture.path, removed);
    Ok(Some(picture))
}
