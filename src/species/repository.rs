use crate::db::{collect_rows, exists_query};
use crate::species::model::{Species, SpeciesInput};
use rusqlite::{params, Connection, OptionalExtension};

const SPECIES_COLUMNS: &str = "id, name, scientific_name, threat, info_page, description";

fn species_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Species> {
    Ok(Species {
        id: row.get(0)?,
        name: row.get(1)?,
        scientific_name: row.get(2)?,
        threat: row.get(3)?,
        info_page: row.get(4)?,
        description: row.get(5)?,
    })
}

pub fn insert_species(conn: &Connection, input: &SpeciesInput) -> rusqlite::Result<Species> {
    conn.execute(
        "INSERT INTO species (name, scientific_name, threat, info_page, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            input.name,
            input.scientific_name,
            input.threat,
            input.info_page,
            input.description
        ],
    )?;
    let id = conn.last_insert_rowid();
    Ok(Species {
        id,
        name: input.name.clone(),
        scientific_name: input.scientific_name.clone(),
        threat: input.threat.clone(),
        info_page: input.info_page.clone(),
        description: input.description.clone(),
    })
}

pub fn species_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    exists_query(
        conn,
        "SELECT COUNT(*) FROM species WHERE id = ?1",
        params![id],
    )
}

pub fn get_species(conn: &Connection, id: i64) -> rusqlite::Result<Option<Species>> {
    conn.query_row(
        &format!("SELECT {} FROM species WHERE id = ?1", SPECIES_COLUMNS),
        params![id],
        species_from_row,
    )
    .optional()
}

pub fn get_species_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Species>> {
    conn.query_row(
        &format!("SELECT {} FROM species WHERE name = ?1", SPECIES_COLUMNS),
        params![name],
        species_from_row,
    )
    .optional()
}

/// All species, ordered by case-insensitive common name.
pub fn list_species(conn: &Connection) -> rusqlite::Result<Vec<Species>> {
    let mut species = collect_rows(
        conn,
        &format!("SELECT {} FROM species", SPECIES_COLUMNS),
        [],
        species_from_row,
    )?;
    species.sort_by_cached_key(|s| s.name.to_lowercase());
    Ok(species)
}

pub fn update_species(
    conn: &Connection,
    id: i64,
    input: &SpeciesInput,
) -> rusqlite::Result<Option<Species>> {
    let changed = conn.execute(
        "UPDATE species
            SET name = ?1, scientific_name = ?2, threat = ?3, info_page = ?4, description = ?5
          WHERE id = ?6",
        params![
            input.name,
            input.scientific_name,
            input.threat,
            input.info_page,
            input.description,
            id
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_species(conn, id)
}

/// Delete a species; its pictures stay and lose their species (`ON DELETE SET NULL`).
pub fn delete_species(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM species WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
