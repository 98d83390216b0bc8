#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod galleries;
pub mod import;
pub mod pictures;
pub mod routes;
pub mod species;
pub mod state;
pub mod storage;

use anyhow::Context;
use rocket::data::{Limits, ToByteUnit};
use rocket::{Build, Rocket};
use state::AppState;

/// Prepare storage and schema, then assemble the server around `state`.
pub fn build_rocket(state: AppState) -> anyhow::Result<Rocket<Build>> {
    state
        .layout
        .ensure()
        .with_context(|| format!("cannot create storage under {:?}", state.layout.pictures))?;
    if let Some(parent) = state.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = state.connect()?;
    db::run_migrations(&conn)?;
    drop(conn);

    let upload_limit = state.config.upload_limit_mib.mebibytes();
    let limits = Limits::default()
        .limit("file", upload_limit)
        .limit("data-form", upload_limit);
    let figment = rocket::Config::figment()
        .merge(("address", state.config.address))
        .merge(("port", state.config.port))
        .merge(("limits", limits));

    Ok(rocket::custom(figment)
        .mount("/", routes::root_routes())
        .mount("/api/pictures", routes::pictures::routes())
        .mount("/api/species", routes::species::routes())
        .mount("/api/albums", routes::galleries::routes())
        .manage(state))
}

pub async fn run() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install tracing subscriber: {}", e))?;

    let home = config::khazad_home()?;
    let config = config::load_or_init_config(&home)?;
    let state = AppState::new(&home, config);
    tracing::info!(
        "khazad home {:?}, storage {:?}, database {:?}",
        home,
        state.layout.pictures,
        state.db_path
    );

    build_rocket(state)?
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;
    Ok(())
}
