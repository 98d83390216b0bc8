pub mod error;
pub mod galleries;
#[cfg(test)]
mod http_tests;
pub mod pictures;
pub mod species;

use crate::routes::error::ApiError;
use crate::state::AppState;
use rocket::serde::json::{json, Value};
use rocket::Route;

/// Run catalogue work (SQLite, file moves) off the async executor.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
{
    let state = state.clone();
    rocket::tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::from(e)))?
}

#[get("/alive")]
fn alive() -> Value {
    json!({ "alive": "yes" })
}

pub fn root_routes() -> Vec<Route> {
    routes![alive]
}
