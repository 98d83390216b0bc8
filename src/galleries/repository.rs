use crate::db::collect_rows;
use crate::galleries::model::{Gallery, GalleryInput};
use crate::pictures::model::Picture;
use crate::pictures::repository::{picture_from_row, PICTURE_COLUMNS, SPECIES_JOIN};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

fn gallery_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Gallery> {
    Ok(Gallery {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        pictures: Vec::new(),
    })
}

/// Members of one gallery, in the order they were added.
fn gallery_pictures(conn: &Connection, gallery_id: i64) -> rusqlite::Result<Vec<Picture>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {} FROM galleries_pictures gp
              JOIN pictures p ON p.id = gp.picture_id {}
              WHERE gp.gallery_id = ?1 ORDER BY gp.rowid ASC",
            PICTURE_COLUMNS, SPECIES_JOIN
        ),
        params![gallery_id],
        |row| picture_from_row(row, 0),
    )
}

fn with_pictures(
    conn: &Connection,
    gallery: Option<Gallery>,
) -> rusqlite::Result<Option<Gallery>> {
    match gallery {
        Some(mut g) => {
            g.pictures = gallery_pictures(conn, g.id)?;
            Ok(Some(g))
        }
        None => Ok(None),
    }
}

pub fn insert_gallery(conn: &Connection, input: &GalleryInput) -> rusqlite::Result<Gallery> {
    conn.execute(
        "INSERT INTO galleries (name, description) VALUES (?1, ?2)",
        params![input.name, input.description],
    )?;
    Ok(Gallery {
        id: conn.last_insert_rowid(),
        name: input.name.clone(),
        description: input.description.clone(),
        pictures: Vec::new(),
    })
}

pub fn get_gallery(conn: &Connection, id: i64) -> rusqlite::Result<Option<Gallery>> {
    let gallery = conn
        .query_row(
            "SELECT id, name, description FROM galleries WHERE id = ?1",
            params![id],
            gallery_from_row,
        )
        .optional()?;
    with_pictures(conn, gallery)
}

pub fn get_gallery_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Gallery>> {
    let gallery = conn
        .query_row(
            "SELECT id, name, description FROM galleries WHERE name = ?1",
            params![name],
            gallery_from_row,
        )
        .optional()?;
    with_pictures(conn, gallery)
}

/// Every gallery with its pictures, loaded with one membership query
/// instead of one query per gallery.
pub fn list_galleries(conn: &Connection) -> rusqlite::Result<Vec<Gallery>> {
    let mut galleries = collect_rows(
        conn,
        "SELECT id, name, description FROM galleries ORDER BY id ASC",
        [],
        gallery_from_row,
    )?;

    let memberships = collect_rows(
        conn,
        &format!(
            "SELECT gp.gallery_id, {} FROM galleries_pictures gp
              JOIN pictures p ON p.id = gp.picture_id {}
              ORDER BY gp.rowid ASC",
            PICTURE_COLUMNS, SPECIES_JOIN
        ),
        [],
        |row| Ok((row.get::<_, i64>(0)?, picture_from_row(row, 1)?)),
    )?;

    let mut by_gallery: HashMap<i64, Vec<Picture>> = HashMap::new();
    for (gallery_id, picture) in memberships {
        by_gallery.entry(gallery_id).or_default().push(picture);
    }
    for gallery in galleries.iter_mut() {
        gallery.pictures = by_gallery.remove(&gallery.id).unwrap_or_default();
    }
    Ok(galleries)
}

/// Add pictures to a gallery inside one transaction. Existing members are left as is.
pub fn add_pictures(
    conn: &Connection,
    gallery_id: i64,
    picture_ids: &[i64],
) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for picture_id in picture_ids {
        tx.execute(
            "INSERT OR IGNORE INTO galleries_pictures (gallery_id, picture_id) VALUES (?1, ?2)",
            params![gallery_id, picture_id],
        )?;
    }
    tx.commit()
}

/// Returns false when the picture was not a member.
pub fn remove_picture(
    conn: &Connection,
    gallery_id: i64,
    picture_id: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM galleries_pictures WHERE gallery_id = ?1 AND picture_id = ?2",
        params![gallery_id, picture_id],
    )?;
    Ok(changed > 0)
}

/// Delete a gallery and its memberships; the pictures themselves stay.
pub fn delete_gallery(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM galleries WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
