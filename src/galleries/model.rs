use crate::pictures::model::Picture;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Gallery {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub pictures: Vec<Picture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GalleryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /albums/<name>/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct GalleryAddPictures {
    pub pictures: Vec<i64>,
}
