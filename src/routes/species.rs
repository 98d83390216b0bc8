use crate::pictures::repository::list_by_species;
use crate::routes::blocking;
use crate::routes::error::ApiError;
use crate::species::model::{Species, SpeciesInput, SpeciesWithPictures};
use crate::species::repository;
use crate::state::AppState;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};

const NAME_TAKEN: &str = "A species with this name already exists";

pub fn routes() -> Vec<Route> {
    routes![list, get_by_name, create, update, delete]
}

#[get("/")]
async fn list(state: &State<AppState>) -> Result<Json<Vec<Species>>, ApiError> {
    let species = blocking(state, |state| {
        let conn = state.connect()?;
        Ok(repository::list_species(&conn)?)
    })
    .await?;
    Ok(Json(species))
}

#[get("/<name>")]
async fn get_by_name(
    state: &State<AppState>,
    name: &str,
) -> Result<Json<SpeciesWithPictures>, ApiError> {
    let name = name.to_string();
    let found = blocking(state, move |state| {
        let conn = state.connect()?;
        let species = repository::get_species_by_name(&conn, &name)?
            .ok_or_else(|| ApiError::not_found("species"))?;
        let pictures = list_by_species(&conn, species.id)?;
        Ok(SpeciesWithPictures { species, pictures })
    })
    .await?;
    Ok(Json(found))
}

#[post("/", format = "json", data = "<input>")]
async fn create(
    state: &State<AppState>,
    input: Json<SpeciesInput>,
) -> Result<(Status, Json<Species>), ApiError> {
    let input = input.into_inner();
    let species = blocking(state, move |state| {
        let conn = state.connect()?;
        repository::insert_species(&conn, &input).map_err(|e| ApiError::from_write(e, NAME_TAKEN))
    })
    .await?;
    tracing::info!("species {} created as {}", species.name, species.id);
    Ok((Status::Created, Json(species)))
}

#[put("/<id>", format = "json", data = "<input>")]
async fn update(
    state: &State<AppState>,
    id: i64,
    input: Json<SpeciesInput>,
) -> Result<Json<Species>, ApiError> {
    let input = input.into_inner();
    let species = blocking(state, move |state| {
        let conn = state.connect()?;
        repository::update_species(&conn, id, &input)
            .map_err(|e| ApiError::from_write(e, NAME_TAKEN))?
            .ok_or_else(|| ApiError::not_found("species"))
    })
    .await?;
    Ok(Json(species))
}

#[delete("/<id>")]
async fn delete(state: &State<AppState>, id: i64) -> Result<Status, ApiError> {
    blocking(state, move |state| {
        let conn = state.connect()?;
        if !repository::delete_species(&conn, id)? {
            return Err(ApiError::not_found("species"));
        }
        tracing::info!("species {} deleted", id);
        Ok(Status::NoContent)
    })
    .await
}
