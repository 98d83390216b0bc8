use crate::galleries::model::{Gallery, GalleryAddPictures, GalleryInput};
use crate::galleries::repository;
use crate::pictures::repository::get_picture;
use crate::routes::blocking;
use crate::routes::error::ApiError;
use crate::state::AppState;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use rusqlite::Connection;

const NAME_TAKEN: &str = "A gallery with this name already exists";

pub fn routes() -> Vec<Route> {
    routes![list, get_by_name, create, add_pictures, remove_picture, delete]
}

fn require_gallery(conn: &Connection, name: &str) -> Result<Gallery, ApiError> {
    repository::get_gallery_by_name(conn, name)?.ok_or_else(|| ApiError::not_found("gallery"))
}

/// Reload a gallery after its membership changed.
fn reload(conn: &Connection, id: i64) -> Result<Gallery, ApiError> {
    repository::get_gallery(conn, id)?.ok_or_else(|| ApiError::not_found("gallery"))
}

#[get("/")]
async fn list(state: &State<AppState>) -> Result<Json<Vec<Gallery>>, ApiError> {
    let galleries = blocking(state, |state| {
        let conn = state.connect()?;
        Ok(repository::list_galleries(&conn)?)
    })
    .await?;
    Ok(Json(galleries))
}

#[get("/<name>")]
async fn get_by_name(state: &State<AppState>, name: &str) -> Result<Json<Gallery>, ApiError> {
    let name = name.to_string();
    let gallery = blocking(state, move |state| {
        let conn = state.connect()?;
        require_gallery(&conn, &name)
    })
    .await?;
    Ok(Json(gallery))
}

#[post("/", format = "json", data = "<input>")]
async fn create(
    state: &State<AppState>,
    input: Json<GalleryInput>,
) -> Result<(Status, Json<Gallery>), ApiError> {
    let input = input.into_inner();
    let gallery = blocking(state, move |state| {
        let conn = state.connect()?;
        repository::insert_gallery(&conn, &input).map_err(|e| ApiError::from_write(e, NAME_TAKEN))
    })
    .await?;
    tracing::info!("gallery {} created as {}", gallery.name, gallery.id);
    Ok((Status::Created, Json(gallery)))
}

/// Every id is checked before anything is inserted, so an unknown picture
/// leaves the gallery unchanged.
#[post("/<name>/add", format = "json", data = "<body>")]
async fn add_pictures(
    state: &State<AppState>,
    name: &str,
    body: Json<GalleryAddPictures>,
) -> Result<Json<Gallery>, ApiError> {
    let name = name.to_string();
    let picture_ids = body.into_inner().pictures;
    let gallery = blocking(state, move |state| {
        let conn = state.connect()?;
        let gallery = require_gallery(&conn, &name)?;
        for &picture_id in &picture_ids {
            if get_picture(&conn, picture_id)?.is_none() {
                return Err(ApiError::NotFound(format!("picture {} not found", picture_id)));
            }
        }
        repository::add_pictures(&conn, gallery.id, &picture_ids)?;
        reload(&conn, gallery.id)
    })
    .await?;
    Ok(Json(gallery))
}

#[post("/<name>/remove/<picture_id>")]
async fn remove_picture(
    state: &State<AppState>,
    name: &str,
    picture_id: i64,
) -> Result<Json<Gallery>, ApiError> {
    let name = name.to_string();
    let gallery = blocking(state, move |state| {
        let conn = state.connect()?;
        let gallery = require_gallery(&conn, &name)?;
        if get_picture(&conn, picture_id)?.is_none() {
            return Err(ApiError::not_found("picture"));
        }
        repository::remove_picture(&conn, gallery.id, picture_id)?;
        reload(&conn, gallery.id)
    })
    .await?;
    Ok(Json(gallery))
}

#[delete("/<id>")]
async fn delete(state: &State<AppState>, id: i64) -> Result<Status, ApiError> {
    blocking(state, move |state| {
        let conn = state.connect()?;
        if !repository::delete_gallery(&conn, id)? {
            return Err(ApiError::not_found("gallery"));
        }
        tracing::info!("gallery {} deleted", id);
        Ok(Status::NoContent)
    })
    .await
}
