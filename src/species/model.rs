use crate::pictures::model::Picture;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: i64,
    pub name: String,
    pub scientific_name: String,
    pub threat: Option<String>,
    pub info_page: Option<String>,
    pub description: Option<String>,
}

/// Body of create / update requests.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesInput {
    pub name: String,
    pub scientific_name: String,
    #[serde(default)]
    pub threat: Option<String>,
    #[serde(default)]
    pub info_page: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesWithPictures {
    #[serde(flatten)]
    pub species: Species,
    pub pictures: Vec<Picture>,
}
