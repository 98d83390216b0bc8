use crate::config::append_operation_log;
use crate::import::pipeline::{self, discard_file, IngestReport, RefreshReport, StagedUpload};
use crate::pictures::browse::{self, FilterSpec, Stats};
use crate::pictures::model::{DataType, Picture};
use crate::pictures::{repository, service};
use crate::routes::blocking;
use crate::routes::error::ApiError;
use crate::species::repository::species_exists;
use crate::state::AppState;
use indexmap::IndexMap;
use rocket::form::Form;
use rocket::fs::{NamedFile, TempFile};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

type FilterOptions = BTreeMap<&'static str, BTreeSet<String>>;

#[derive(FromForm)]
pub struct UploadForm<'r> {
    files: Vec<TempFile<'r>>,
}

#[derive(Responder)]
pub enum PictureResponse {
    Meta(Json<Picture>),
    File(NamedFile),
}

pub fn routes() -> Vec<Route> {
    routes![
        list_grouped,
        list_filtered,
        filters,
        stats,
        favourites,
        random_landscape,
        refresh,
        upload,
        upload_with_species,
        get_picture,
        get_picture_data,
        toggle_star,
        toggle_blur,
        set_species,
        clear_species,
        delete_picture,
    ]
}

fn require_picture(picture: Option<Picture>) -> Result<Picture, ApiError> {
    picture.ok_or_else(|| ApiError::not_found("picture"))
}

async fn open_file(path: &Path) -> Result<NamedFile, ApiError> {
    NamedFile::open(path).await.map_err(|e| {
        tracing::warn!("cannot open {:?}: {}", path, e);
        ApiError::not_found("file")
    })
}

#[get("/")]
async fn list_grouped(
    state: &State<AppState>,
) -> Result<Json<IndexMap<String, Vec<Picture>>>, ApiError> {
    let groups = blocking(state, |state| {
        let conn = state.connect()?;
        let pictures = repository::list_pictures(&conn)?;
        Ok(browse::group_by_month(pictures, state.locale))
    })
    .await?;
    Ok(Json(groups))
}

#[post("/", format = "json", data = "<spec>")]
async fn list_filtered(
    state: &State<AppState>,
    spec: Json<FilterSpec>,
) -> Result<Json<Vec<Picture>>, ApiError> {
    let spec = spec.into_inner();
    let pictures = blocking(state, move |state| {
        let conn = state.connect()?;
        let pictures = repository::list_pictures(&conn)?;
        Ok(browse::filter_pictures(pictures, &spec))
    })
    .await?;
    Ok(Json(pictures))
}

#[get("/filters")]
async fn filters(state: &State<AppState>) -> Result<Json<FilterOptions>, ApiError> {
    let options = blocking(state, |state| {
        let conn = state.connect()?;
        Ok(browse::filter_options(&repository::list_pictures(&conn)?))
    })
    .await?;
    Ok(Json(options))
}

#[get("/stats")]
async fn stats(state: &State<AppState>) -> Result<Json<Stats>, ApiError> {
    let stats = blocking(state, |state| {
        let conn = state.connect()?;
        Ok(browse::compute_stats(&repository::list_pictures(&conn)?))
    })
    .await?;
    Ok(Json(stats))
}

#[get("/favories")]
async fn favourites(state: &State<AppState>) -> Result<Json<Vec<Picture>>, ApiError> {
    let pictures = blocking(state, |state| {
        let conn = state.connect()?;
        let mut pictures = repository::list_starred(&conn)?;
        browse::sort_newest_first(&mut pictures);
        Ok(pictures)
    })
    .await?;
    Ok(Json(pictures))
}

/// Half-resolution copy of a random starred landscape picture.
#[get("/random-landscape")]
async fn random_landscape(state: &State<AppState>) -> Result<NamedFile, ApiError> {
    let path = blocking(state, |state| {
        let conn = state.connect()?;
        let picture = repository::random_starred_landscape(&conn)?
            .ok_or_else(|| ApiError::not_found("starred landscape picture"))?;
        Ok(state.layout.halfres_copy(&picture.path))
    })
    .await?;
    open_file(&path).await
}

#[get("/refresh")]
async fn refresh(state: &State<AppState>) -> Result<Json<RefreshReport>, ApiError> {
    let report = blocking(state, |state| {
        let conn = state.connect()?;
        Ok(pipeline::refresh_derivatives(&conn, &state.layout, state.sizes)?)
    })
    .await?;
    Ok(Json(report))
}

/// Stage every multipart file, then hand the batch to the ingest pipeline.
async fn ingest_form(
    state: &AppState,
    mut form: Form<UploadForm<'_>>,
    species_id: Option<i64>,
) -> Result<Json<IngestReport>, ApiError> {
    if form.files.is_empty() {
        return Err(ApiError::BadRequest("at least one file is required".to_string()));
    }

    let mut uploads: Vec<StagedUpload> = Vec::with_capacity(form.files.len());
    for file in form.files.iter_mut() {
        let original_name = file
            .raw_name()
            .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
            .unwrap_or_default();
        let staged = state.layout.new_staging_path();
        if let Err(e) = file.persist_to(&staged).await {
            for upload in &uploads {
                discard_file(&upload.staged);
            }
            return Err(e.into());
        }
        uploads.push(StagedUpload {
            staged,
            original_name,
        });
    }

    let report = blocking(state, move |state| {
        let conn = state.connect()?;
        let report = pipeline::ingest_batch(
            &conn,
            &state.layout,
            &state.extractor,
            state.sizes,
            &uploads,
            species_id,
        )?;
        append_operation_log(
            &state.home,
            &format!(
                "UPLOAD created={:?} duplicates={} failed={} species={:?}",
                report.created,
                report.duplicates.len(),
                report.failed.len(),
                species_id
            ),
        );
        Ok(report)
    })
    .await?;
    Ok(Json(report))
}

#[post("/upload", data = "<form>")]
async fn upload(
    state: &State<AppState>,
    form: Form<UploadForm<'_>>,
) -> Result<Json<IngestReport>, ApiError> {
    ingest_form(state, form, None).await
}

#[post("/upload/species-id/<species_id>", data = "<form>")]
async fn upload_with_species(
    state: &State<AppState>,
    species_id: i64,
    form: Form<UploadForm<'_>>,
) -> Result<Json<IngestReport>, ApiError> {
    ingest_form(state, form, Some(species_id)).await
}

#[get("/<id>")]
async fn get_picture(state: &State<AppState>, id: i64) -> Result<Json<Picture>, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        require_picture(repository::get_picture(&conn, id)?)
    })
    .await?;
    Ok(Json(picture))
}

#[get("/<id>/<data_type>")]
async fn get_picture_data(
    state: &State<AppState>,
    id: i64,
    data_type: &str,
) -> Result<PictureResponse, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        require_picture(repository::get_picture(&conn, id)?)
    })
    .await?;
    let data_type = DataType::parse(data_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown data type {:?}", data_type)))?;
    match service::stored_file(&state.layout, &picture, data_type) {
        None => Ok(PictureResponse::Meta(Json(picture))),
        Some(path) => Ok(PictureResponse::File(open_file(&path).await?)),
    }
}

#[post("/<id>/togglestar")]
async fn toggle_star(state: &State<AppState>, id: i64) -> Result<Json<Picture>, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        require_picture(repository::toggle_star(&conn, id)?)
    })
    .await?;
    Ok(Json(picture))
}

#[post("/<id>/toggleblur")]
async fn toggle_blur(state: &State<AppState>, id: i64) -> Result<Json<Picture>, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        require_picture(repository::toggle_blur(&conn, id)?)
    })
    .await?;
    Ok(Json(picture))
}

#[post("/<id>/species/<species_id>")]
async fn set_species(
    state: &State<AppState>,
    id: i64,
    species_id: i64,
) -> Result<Json<Picture>, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        if !species_exists(&conn, species_id)? {
            return Err(ApiError::not_found("species"));
        }
        if !repository::set_species(&conn, id, Some(species_id))? {
            return Err(ApiError::not_found("picture"));
        }
        require_picture(repository::get_picture(&conn, id)?)
    })
    .await?;
    Ok(Json(picture))
}

#[delete("/<id>/species")]
async fn clear_species(state: &State<AppState>, id: i64) -> Result<Json<Picture>, ApiError> {
    let picture = blocking(state, move |state| {
        let conn = state.connect()?;
        if !repository::set_species(&conn, id, None)? {
            return Err(ApiError::not_found("picture"));
        }
        require_picture(repository::get_picture(&conn, id)?)
    })
    .await?;
    Ok(Json(picture))
}

#[delete("/<id>")]
async fn delete_picture(state: &State<AppState>, id: i64) -> Result<Status, ApiError> {
    blocking(state, move |state| {
        let conn = state.connect()?;
        let picture = service::delete_picture(&conn, &state.layout, id)?
            .ok_or_else(|| ApiError::not_found("picture"))?;
        append_operation_log(
            &state.home,
            &format!("DELETE picture={} path={}", id, picture.path),
        );
        Ok(Status::NoContent)
    })
    .await
}
