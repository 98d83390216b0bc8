//! Listing, filtering and statistics over the whole picture set.
//!
//! Everything here is a linear pass over a slice of pictures loaded by the
//! caller; nothing touches the database.

use crate::pictures::model::Picture;
use chrono::{DateTime, Locale, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Metadata attributes a picture can be filtered and aggregated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Aperture,
    Exposure,
    Flash,
    Focal,
    Iso,
    Lens,
    Mode,
}

impl Attribute {
    pub const ALL: [Attribute; 7] = [
        Attribute::Aperture,
        Attribute::Exposure,
        Attribute::Flash,
        Attribute::Focal,
        Attribute::Iso,
        Attribute::Lens,
        Attribute::Mode,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Attribute::Aperture => "aperture",
            Attribute::Exposure => "exposure",
            Attribute::Flash => "flash",
            Attribute::Focal => "focal",
            Attribute::Iso => "iso",
            Attribute::Lens => "lens",
            Attribute::Mode => "mode",
        }
    }

    pub fn value_of(self, picture: &Picture) -> &str {
        let m = &picture.metadata;
        match self {
            Attribute::Aperture => &m.aperture,
            Attribute::Exposure => &m.exposure,
            Attribute::Flash => &m.flash,
            Attribute::Focal => &m.focal,
            Attribute::Iso => &m.iso,
            Attribute::Lens => &m.lens,
            Attribute::Mode => &m.mode,
        }
    }
}

/// Allowed values per attribute. An absent or empty list leaves that
/// attribute unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub aperture: Option<Vec<String>>,
    pub exposure: Option<Vec<String>>,
    pub flash: Option<Vec<String>>,
    pub focal: Option<Vec<String>>,
    pub iso: Option<Vec<String>>,
    pub lens: Option<Vec<String>>,
    pub mode: Option<Vec<String>>,
}

impl FilterSpec {
    pub fn allowed(&self, attribute: Attribute) -> &[String] {
        let values = match attribute {
            Attribute::Aperture => &self.aperture,
            Attribute::Exposure => &self.exposure,
            Attribute::Flash => &self.flash,
            Attribute::Focal => &self.focal,
            Attribute::Iso => &self.iso,
            Attribute::Lens => &self.lens,
            Attribute::Mode => &self.mode,
        };
        values.as_deref().unwrap_or(&[])
    }

    pub fn matches(&self, picture: &Picture) -> bool {
        Attribute::ALL.iter().all(|&attr| {
            let allowed = self.allowed(attr);
            allowed.is_empty() || allowed.iter().any(|v| v == attr.value_of(picture))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// attribute key → value → number of pictures
    pub stats: BTreeMap<&'static str, BTreeMap<String, usize>>,
    /// `YYYY-MM-DD` → number of pictures captured that day
    pub dates: BTreeMap<String, usize>,
}

/// Newest capture first; ties keep the most recently ingested first.
pub fn sort_newest_first(pictures: &mut [Picture]) {
    pictures.sort_by(|a, b| {
        b.metadata
            .timestamp
            .cmp(&a.metadata.timestamp)
            .then(b.id.cmp(&a.id))
    });
}

pub fn filter_pictures(mut pictures: Vec<Picture>, spec: &FilterSpec) -> Vec<Picture> {
    pictures.retain(|p| spec.matches(p));
    sort_newest_first(&mut pictures);
    pictures
}

/// `"Mai 2019"`-style label in `locale`, first letter upper-cased.
pub fn month_label(timestamp: &DateTime<Utc>, locale: Locale) -> String {
    let label = timestamp.format_localized("%B %Y", locale).to_string();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}

/// Bucket pictures by capture month. Groups come newest month first and
/// each group is newest picture first.
pub fn group_by_month(
    mut pictures: Vec<Picture>,
    locale: Locale,
) -> IndexMap<String, Vec<Picture>> {
    sort_newest_first(&mut pictures);
    let mut groups: IndexMap<String, Vec<Picture>> = IndexMap::new();
    for picture in pictures {
        let label = month_label(&picture.metadata.timestamp, locale);
        groups.entry(label).or_default().push(picture);
    }
    groups
}

pub fn compute_stats(pictures: &[Picture]) -> Stats {
    let mut stats = Stats::default();
    for attr in Attribute::ALL {
        stats.stats.insert(attr.key(), BTreeMap::new());
    }
    for picture in pictures {
        let day = picture.metadata.timestamp.format("%Y-%m-%d").to_string();
        *stats.dates.entry(day).or_insert(0) += 1;

        for attr in Attribute::ALL {
            let value = attr.value_of(picture);
            if value.is_empty() {
                continue;
            }
            if let Some(histogram) = stats.stats.get_mut(attr.key()) {
                *histogram.entry(value.to_string()).or_insert(0) += 1;
            }
        }
    }
    stats
}

/// Distinct non-empty values per attribute, for building filter menus.
pub fn filter_options(pictures: &[Picture]) -> BTreeMap<&'static str, BTreeSet<String>> {
    let mut options: BTreeMap<&'static str, BTreeSet<String>> = Attribute::ALL
        .iter()
        .map(|attr| (attr.key(), BTreeSet::new()))
        .collect();
    for picture in pictures {
        for attr in Attribute::ALL {
            let value = attr.value_of(picture);
            if value.is_empty() {
                continue;
            }
            if let Some(set) = options.get_mut(attr.key()) {
                set.insert(value.to_string());
            }
        }
    }
    options
}

/// Resolve a locale name such as `fr_FR`, falling back to French.
pub fn parse_locale(name: &str) -> Locale {
    match Locale::try_from(name) {
        Ok(locale) => locale,
        Err(_) => {
            tracing::warn!("unknown month locale {:?}, using fr_FR", name);
            Locale::fr_FR
        }
    }
}
