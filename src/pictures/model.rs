use crate::species::model::Species;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata read from a picture file. String fields are empty when the
/// source did not report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureMetadata {
    pub cam_model: String,
    pub exposure: String,
    pub aperture: String,
    pub mode: String,
    pub iso: String,
    pub flash: String,
    pub focal: String,
    pub focal_equiv: String,
    pub lens: String,
    pub timestamp: DateTime<Utc>,
}

impl PictureMetadata {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            cam_model: String::new(),
            exposure: String::new(),
            aperture: String::new(),
            mode: String::new(),
            iso: String::new(),
            flash: String::new(),
            focal: String::new(),
            focal_equiv: String::new(),
            lens: String::new(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    pub id: i64,
    /// `<content-hash>.<ext>`, the key in every storage directory
    pub path: String,
    #[serde(flatten)]
    pub metadata: PictureMetadata,
    pub landscape: bool,
    #[serde(rename = "stared")]
    pub starred: bool,
    #[serde(rename = "blured")]
    pub blurred: bool,
    pub species: Option<Species>,
}

/// Which stored file `GET /pictures/<id>/<data_type>` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Meta,
    FullFile,
    ThumbFile,
    HalfresFile,
}

impl DataType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "meta" => Some(DataType::Meta),
            "full_file" => Some(DataType::FullFile),
            "thumb_file" => Some(DataType::ThumbFile),
            "halfres_file" => Some(DataType::HalfresFile),
            _ => None,
        }
    }
}
