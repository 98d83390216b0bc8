use crate::db::collect_rows;
use crate::pictures::model::{Picture, PictureMetadata};
use crate::species::model::Species;
use rusqlite::{params, Connection, OptionalExtension};

/// Column list shared by every picture query; species columns come from
/// [`SPECIES_JOIN`] and are NULL for untagged pictures.
pub(crate) const PICTURE_COLUMNS: &str = "p.id, p.path, p.cam_model, p.exposure, p.aperture, \
     p.mode, p.iso, p.flash, p.focal, p.focal_equiv, p.lens, p.timestamp, p.landscape, \
     p.stared, p.blured, s.id, s.name, s.scientific_name, s.threat, s.info_page, s.description";

/// Goes after any other join on `pictures p`.
pub(crate) const SPECIES_JOIN: &str = "LEFT JOIN species s ON s.id = p.species_id";

/// Map a row whose picture columns start at `offset` (see [`PICTURE_COLUMNS`]).
pub(crate) fn picture_from_row(
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> rusqlite::Result<Picture> {
    let col = |i: usize| offset + i;
    let species_id: Option<i64> = row.get(col(15))?;
    let species = match species_id {
        Some(id) => Some(Species {
            id,
            name: row.get(col(16))?,
            scientific_name: row.get(col(17))?,
            threat: row.get(col(18))?,
            info_page: row.get(col(19))?,
            description: row.get(col(20))?,
        }),
        None => None,
    };
    Ok(Picture {
        id: row.get(col(0))?,
        path: row.get(col(1))?,
        metadata: PictureMetadata {
            cam_model: row.get(col(2))?,
            exposure: row.get(col(3))?,
            aperture: row.get(col(4))?,
            mode: row.get(col(5))?,
            iso: row.get(col(6))?,
            flash: row.get(col(7))?,
            focal: row.get(col(8))?,
            focal_equiv: row.get(col(9))?,
            lens: row.get(col(10))?,
            timestamp: row.get(col(11))?,
        },
        landscape: row.get(col(12))?,
        starred: row.get(col(13))?,
        blurred: row.get(col(14))?,
        species,
    })
}

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM pictures p {} {}", PICTURE_COLUMNS, SPECIES_JOIN, clause)
}

/// Insert a new picture row. Returns the new row id; a clash on `path`
/// surfaces as a UNIQUE constraint failure (see `db::is_unique_violation`).
pub fn insert_picture(
    conn: &Connection,
    path: &str,
    metadata: &PictureMetadata,
    species_id: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO pictures (path, cam_model, exposure, aperture, mode, iso, flash, focal,
                               focal_equiv, lens, timestamp, species_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            path,
            metadata.cam_model,
            metadata.exposure,
            metadata.aperture,
            metadata.mode,
            metadata.iso,
            metadata.flash,
            metadata.focal,
            metadata.focal_equiv,
            metadata.lens,
            metadata.timestamp,
            species_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_picture(conn: &Connection, id: i64) -> rusqlite::Result<Option<Picture>> {
    conn.query_row(&select_where("WHERE p.id = ?1"), params![id], |row| {
        picture_from_row(row, 0)
    })
    .optional()
}

/// All pictures in intake order.
pub fn list_pictures(conn: &Connection) -> rusqlite::Result<Vec<Picture>> {
    collect_rows(conn, &select_where("ORDER BY p.id ASC"), [], |row| {
        picture_from_row(row, 0)
    })
}

pub fn list_starred(conn: &Connection) -> rusqlite::Result<Vec<Picture>> {
    collect_rows(
        conn,
        &select_where("WHERE p.stared = 1 ORDER BY p.id ASC"),
        [],
        |row| picture_from_row(row, 0),
    )
}

pub fn list_by_species(conn: &Connection, species_id: i64) -> rusqlite::Result<Vec<Picture>> {
    collect_rows(
        conn,
        &select_where("WHERE p.species_id = ?1 ORDER BY p.timestamp DESC, p.id DESC"),
        params![species_id],
        |row| picture_from_row(row, 0),
    )
}

/// One starred landscape picture chosen by SQLite's `RANDOM()`.
pub fn random_starred_landscape(conn: &Connection) -> rusqlite::Result<Option<Picture>> {
    conn.query_row(
        &select_where("WHERE p.stared = 1 AND p.landscape = 1 ORDER BY RANDOM() LIMIT 1"),
        [],
        |row| picture_from_row(row, 0),
    )
    .optional()
}

pub fn toggle_star(conn: &Connection, id: i64) -> rusqlite::Result<Option<Picture>> {
    let changed = conn.execute(
        "UPDATE pictures SET stared = NOT stared WHERE id = ?1",
        params![id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_picture(conn, id)
}

pub fn toggle_blur(conn: &Connection, id: i64) -> rusqlite::Result<Option<Picture>> {
    let changed = conn.execute(
        "UPDATE pictures SET blured = NOT blured WHERE id = ?1",
        params![id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_picture(conn, id)
}

/// Attach (`Some`) or detach (`None`) a species. Returns false if the picture does not exist.
pub fn set_species(
    conn: &Connection,
    id: i64,
    species_id: Option<i64>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE pictures SET species_id = ?1 WHERE id = ?2",
        params![species_id, id],
    )?;
    Ok(changed > 0)
}

pub fn set_landscape(conn: &Connection, id: i64, landscape: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE pictures SET landscape = ?1 WHERE id = ?2",
        params![landscape, id],
    )?;
    Ok(())
}

/// Delete the row; gallery memberships go with it via `ON DELETE CASCADE`.
pub fn delete_picture(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM pictures WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
