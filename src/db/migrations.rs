pub fn run_migrations(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    // Ensure schema_version table exists
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
         INSERT INTO schema_version SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version);",
    )?;

    let version = schema_version(conn)?;

    if version < 1 {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS species (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                scientific_name TEXT NOT NULL UNIQUE,
                threat          TEXT,
                info_page       TEXT,
                description     TEXT
            );
            CREATE TABLE IF NOT EXISTS pictures (
                id          INTEGER PRIMARY KEY,
                path        TEXT NOT NULL UNIQUE,
                cam_model   TEXT NOT NULL DEFAULT '',
                exposure    TEXT NOT NULL DEFAULT '',
                aperture    TEXT NOT NULL DEFAULT '',
                mode        TEXT NOT NULL DEFAULT '',
                iso         TEXT NOT NULL DEFAULT '',
                flash       TEXT NOT NULL DEFAULT '',
                focal       TEXT NOT NULL DEFAULT '',
                focal_equiv TEXT NOT NULL DEFAULT '',
                lens        TEXT NOT NULL DEFAULT '',
                timestamp   TEXT NOT NULL,
                landscape   INTEGER NOT NULL DEFAULT 1,
                stared      INTEGER NOT NULL DEFAULT 0,
                blured      INTEGER NOT NULL DEFAULT 0,
                species_id  INTEGER REFERENCES species(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS galleries (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                description TEXT
            );
            CREATE TABLE IF NOT EXISTS galleries_pictures (
                gallery_id INTEGER NOT NULL REFERENCES galleries(id) ON DELETE CASCADE,
                picture_id INTEGER NOT NULL REFERENCES pictures(id) ON DELETE CASCADE,
                PRIMARY KEY (gallery_id, picture_id)
            );
            CREATE INDEX IF NOT EXISTS idx_pictures_species ON pictures(species_id);
            CREATE INDEX IF NOT EXISTS idx_pictures_timestamp ON pictures(timestamp);
            CREATE INDEX IF NOT EXISTS idx_galleries_pictures_picture
                ON galleries_pictures(picture_id);
            UPDATE schema_version SET version = 1;
            ",
        )?;
    }

    Ok(())
}

pub fn schema_version(conn: &rusqlite::Connection) -> anyhow::Result<u32> {
    let version: u32 = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}
