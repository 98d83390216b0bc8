use crate::config::{Config, LensAlias};
use crate::pictures::model::PictureMetadata;
use chrono::{DateTime, Datelike, Months, NaiveDateTime, TimeZone, Timelike, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

/// exiv2-style key (`Exif.Photo.FNumber`) → interpreted value.
pub type TagMap = HashMap<String, String>;

pub const TAG_MODEL: &str = "Exif.Image.Model";
pub const TAG_DATETIME_ORIGINAL: &str = "Exif.Photo.DateTimeOriginal";
pub const TAG_EXPOSURE_TIME: &str = "Exif.Photo.ExposureTime";
pub const TAG_FNUMBER: &str = "Exif.Photo.FNumber";
pub const TAG_EXPOSURE_PROGRAM: &str = "Exif.Photo.ExposureProgram";
pub const TAG_ISO: &str = "Exif.Photo.ISOSpeedRatings";
pub const TAG_FLASH: &str = "Exif.Photo.Flash";
pub const TAG_FOCAL_LENGTH: &str = "Exif.Photo.FocalLength";
pub const TAG_LENS_ID: &str = "Exif.NikonLd3.LensIDNumber";
pub const TAG_LENS_MODEL: &str = "Exif.Photo.LensModel";
pub const TAG_FOCAL_35MM: &str = "Exif.Photo.FocalLengthIn35mmFilm";

#[derive(Debug, thiserror::Error)]
pub enum TagSourceError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status} and no output")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no EXIF: {0}")]
    Exif(#[from] exif::Error),
}

/// Something that can list the EXIF tags of a file.
pub trait TagSource: Send + Sync {
    fn name(&self) -> &str;
    fn read_tags(&self, path: &Path) -> Result<TagMap, TagSourceError>;
}

/// Runs `exiv2 -q -p a <file>` and parses its table output.
pub struct Exiv2Tool {
    program: String,
}

impl Exiv2Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TagSource for Exiv2Tool {
    fn name(&self) -> &str {
        &self.program
    }

    fn read_tags(&self, path: &Path) -> Result<TagMap, TagSourceError> {
        let output = Command::new(&self.program)
            .args(["-q", "-p", "a"])
            .arg(path)
            .output()
            .map_err(|source| TagSourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        // exiv2 exits non-zero for files without metadata; only an empty
        // failure is treated as an error so the next source can try.
        if !output.status.success() && output.stdout.is_empty() {
            return Err(TagSourceError::Failed {
                program: self.program.clone(),
                status: output.status,
            });
        }
        Ok(parse_exiv2_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Reads EXIF in process with kamadak-exif, keyed like exiv2.
pub struct InProcessReader;

impl TagSource for InProcessReader {
    fn name(&self) -> &str {
        "kamadak-exif"
    }

    fn read_tags(&self, path: &Path) -> Result<TagMap, TagSourceError> {
        let file = std::fs::File::open(path)?;
        let mut buf_reader = std::io::BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut buf_reader)?;

        let mut tags = TagMap::new();
        for field in exif.fields() {
            if field.ifd_num != exif::In::PRIMARY {
                continue;
            }
            let key = match field.tag {
                exif::Tag::Model => TAG_MODEL,
                exif::Tag::DateTimeOriginal => TAG_DATETIME_ORIGINAL,
                exif::Tag::ExposureTime => TAG_EXPOSURE_TIME,
                exif::Tag::FNumber => TAG_FNUMBER,
                exif::Tag::ExposureProgram => TAG_EXPOSURE_PROGRAM,
                exif::Tag::PhotographicSensitivity => TAG_ISO,
                exif::Tag::Flash => TAG_FLASH,
                exif::Tag::FocalLength => TAG_FOCAL_LENGTH,
                exif::Tag::LensModel => TAG_LENS_MODEL,
                exif::Tag::FocalLengthIn35mmFilm => TAG_FOCAL_35MM,
                _ => continue,
            };
            let value = match &field.value {
                exif::Value::Ascii(vecs) => vecs
                    .first()
                    .map(|v| String::from_utf8_lossy(v).trim().to_string())
                    .unwrap_or_default(),
                _ => field.display_value().with_unit(&exif).to_string(),
            };
            tags.insert(key.to_string(), value);
        }
        Ok(tags)
    }
}

/// Split an exiv2 `-p a` line on runs of two or more whitespace characters.
/// Columns are key, type, count, value.
fn split_columns(line: &str) -> Vec<&str> {
    let line = line.trim();
    let mut cols = Vec::new();
    if line.is_empty() {
        return cols;
    }
    let mut col_start = 0;
    let mut run_start: Option<usize> = None;
    let mut run_len = 0;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if run_start.is_none() {
                run_start = Some(i);
                run_len = 0;
            }
            run_len += 1;
        } else if let Some(start) = run_start.take() {
            if run_len >= 2 {
                cols.push(&line[col_start..start]);
                col_start = i;
            }
        }
    }
    cols.push(&line[col_start..]);
    cols
}

pub fn parse_exiv2_output(text: &str) -> TagMap {
    let mut tags = TagMap::new();
    for line in text.lines() {
        let cols = split_columns(line);
        let Some(key) = cols.first() else {
            continue;
        };
        let value = cols.get(3).copied().unwrap_or("");
        tags.insert(key.to_string(), value.to_string());
    }
    tags
}

/// Underscores become spaces and whitespace runs collapse to one space.
pub fn normalize_value(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an EXIF datetime, `YYYY:MM:DD HH:MM:SS` or `YYYY-MM-DD HH:MM:SS`, as UTC.
pub fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let date = s.get(..10)?.replace(':', "-");
    let time = s.get(11..19)?;
    let normalized = format!("{} {}", date, time);
    let ndt = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&ndt))
}

/// Corrections applied on top of the raw tags.
#[derive(Debug, Clone, Default)]
pub struct CalibrationRules {
    /// Timestamps in this year are moved forward one year.
    pub clock_fix_year: Option<i32>,
    pub lens_aliases: Vec<LensAlias>,
}

impl CalibrationRules {
    fn fix_clock(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self.clock_fix_year {
            Some(year) if ts.year() == year => ts.checked_add_months(Months::new(12)).unwrap_or(ts),
            _ => ts,
        }
    }

    fn canonical_lens(&self, lens_model: &str) -> Option<&str> {
        self.lens_aliases
            .iter()
            .find(|a| a.lens_model == lens_model)
            .map(|a| a.canonical.as_str())
    }
}

/// Turn raw tags into picture metadata. `fallback_time` is only called when
/// no usable capture timestamp is present.
pub fn build_metadata(
    tags: &TagMap,
    rules: &CalibrationRules,
    fallback_time: impl FnOnce() -> DateTime<Utc>,
) -> PictureMetadata {
    let field = |key: &str| tags.get(key).map(|v| normalize_value(v)).unwrap_or_default();

    let timestamp = tags
        .get(TAG_DATETIME_ORIGINAL)
        .and_then(|raw| parse_exif_datetime(&normalize_value(raw)))
        .map(|ts| rules.fix_clock(ts))
        .unwrap_or_else(fallback_time);

    let mut lens = field(TAG_LENS_ID);
    if lens.is_empty() {
        if let Some(canonical) = rules.canonical_lens(&field(TAG_LENS_MODEL)) {
            lens = canonical.to_string();
        }
    }

    PictureMetadata {
        cam_model: field(TAG_MODEL),
        exposure: field(TAG_EXPOSURE_TIME),
        aperture: field(TAG_FNUMBER),
        mode: field(TAG_EXPOSURE_PROGRAM),
        iso: field(TAG_ISO),
        flash: field(TAG_FLASH),
        focal: field(TAG_FOCAL_LENGTH),
        focal_equiv: field(TAG_FOCAL_35MM),
        lens,
        timestamp,
    }
}

/// File modification time truncated to whole seconds; `now` if unreadable.
pub fn file_mtime(path: &Path) -> DateTime<Utc> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified());
    let ts = match modified {
        Ok(t) => DateTime::<Utc>::from(t),
        Err(e) => {
            tracing::warn!("cannot read mtime of {:?}: {}", path, e);
            Utc::now()
        }
    };
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// EXIF orientation (1-8) of a file, read in process.
pub fn read_orientation(path: &Path) -> Option<u16> {
    let file = std::fs::File::open(path).ok()?;
    let mut buf_reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut buf_reader)
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(v) => v.first().copied(),
        _ => None,
    }
}

/// Tries each tag source in order; the first that succeeds wins.
pub struct MetadataExtractor {
    sources: Vec<Box<dyn TagSource>>,
    rules: CalibrationRules,
}

impl MetadataExtractor {
    pub fn new(sources: Vec<Box<dyn TagSource>>, rules: CalibrationRules) -> Self {
        Self { sources, rules }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut sources: Vec<Box<dyn TagSource>> = Vec::new();
        if let Some(program) = &config.exif_tool {
            sources.push(Box::new(Exiv2Tool::new(program.clone())));
        }
        sources.push(Box::new(InProcessReader));
        Self::new(
            sources,
            CalibrationRules {
                clock_fix_year: config.clock_fix_year,
                lens_aliases: config.lens_aliases.clone(),
            },
        )
    }

    fn read_tags(&self, path: &Path) -> TagMap {
        for source in &self.sources {
            match source.read_tags(path) {
                Ok(tags) => {
                    tracing::debug!("{} read {} tags from {:?}", source.name(), tags.len(), path);
                    return tags;
                }
                Err(e) => tracing::debug!("{} failed on {:?}: {}", source.name(), path, e),
            }
        }
        TagMap::new()
    }

    /// Never fails: unreadable tags leave fields empty and the timestamp
    /// falls back to the file's mtime.
    pub fn extract(&self, path: &Path) -> PictureMetadata {
        let tags = self.read_tags(path);
        build_metadata(&tags, &self.rules, || file_mtime(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXIV2_SAMPLE: &str = "\
Exif.Image.Make                              Ascii       6  NIKON CORPORATION
Exif.Image.Model                             Ascii      12  NIKON D500
Exif.Photo.ExposureTime                      Rational    1  1/1000 s
Exif.Photo.FNumber                           Rational    1  F5.6
Exif.Photo.ExposureProgram                   Short       1  Manual
Exif.Photo.ISOSpeedRatings                   Short       1  400
Exif.Photo.DateTimeOriginal                  Ascii      20  2019:05:12 10:22:01
Exif.Photo.Flash                             Short       1  No, compulsory
Exif.Photo.FocalLength                       Rational    1  500.0 mm
Exif.Photo.FocalLengthIn35mmFilm             Short       1  750.0 mm
Exif.Photo.LensModel                         Ascii      21  200.0-500.0 mm f/5.6
";

    struct StubSource(Option<TagMap>);

    impl TagSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        fn read_tags(&self, _path: &Path) -> Result<TagMap, TagSourceError> {
            self.0
                .clone()
                .ok_or_else(|| std::io::Error::other("stub failure").into())
        }
    }

    fn rules() -> CalibrationRules {
        CalibrationRules {
            clock_fix_year: Some(2018),
            lens_aliases: crate::config::Config::default().lens_aliases,
        }
    }

    fn fixed_fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(
            split_columns("Exif.Photo.Flash      Short   1  No, compulsory"),
            vec!["Exif.Photo.Flash", "Short", "1", "No, compulsory"]
        );
        assert!(split_columns("   ").is_empty());
    }

    #[test]
    fn test_parse_exiv2_output() {
        let tags = parse_exiv2_output(EXIV2_SAMPLE);
        assert_eq!(tags[TAG_MODEL], "NIKON D500");
        assert_eq!(tags[TAG_FLASH], "No, compulsory");
        assert_eq!(tags[TAG_DATETIME_ORIGINAL], "2019:05:12 10:22:01");
    }

    #[test]
    fn test_build_metadata_from_exiv2_sample() {
        let meta = build_metadata(&parse_exiv2_output(EXIV2_SAMPLE), &rules(), fixed_fallback);
        assert_eq!(meta.cam_model, "NIKON D500");
        assert_eq!(meta.exposure, "1/1000 s");
        assert_eq!(meta.aperture, "F5.6");
        assert_eq!(meta.mode, "Manual");
        assert_eq!(meta.iso, "400");
        assert_eq!(meta.focal, "500.0 mm");
        assert_eq!(meta.focal_equiv, "750.0 mm");
        assert_eq!(
            meta.timestamp,
            Utc.with_ymd_and_hms(2019, 5, 12, 10, 22, 1).unwrap()
        );
    }

    #[test]
    fn test_lens_alias_used_when_lens_id_missing() {
        let meta = build_metadata(&parse_exiv2_output(EXIV2_SAMPLE), &rules(), fixed_fallback);
        assert_eq!(meta.lens, "Nikon 200.0-500.0 mm f/5.6 ED VR");
    }

    #[test]
    fn test_lens_id_wins_over_alias() {
        let mut tags = parse_exiv2_output(EXIV2_SAMPLE);
        tags.insert(TAG_LENS_ID.to_string(), "Nikkor_300mm f/4".to_string());
        let meta = build_metadata(&tags, &rules(), fixed_fallback);
        assert_eq!(meta.lens, "Nikkor 300mm f/4");
    }

    #[test]
    fn test_unknown_lens_model_leaves_lens_empty() {
        let mut tags = TagMap::new();
        tags.insert(TAG_LENS_MODEL.to_string(), "24-70 mm f/2.8".to_string());
        let meta = build_metadata(&tags, &rules(), fixed_fallback);
        assert_eq!(meta.lens, "");
    }

    #[test]
    fn test_known_bad_year_is_shifted_one_year() {
        let mut tags = TagMap::new();
        tags.insert(
            TAG_DATETIME_ORIGINAL.to_string(),
            "2018:06:01 08:15:00".to_string(),
        );
        let meta = build_metadata(&tags, &rules(), fixed_fallback);
        assert_eq!(
            meta.timestamp,
            Utc.with_ymd_and_hms(2019, 6, 1, 8, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_clock_fix_disabled() {
        let mut tags = TagMap::new();
        tags.insert(
            TAG_DATETIME_ORIGINAL.to_string(),
            "2018:06:01 08:15:00".to_string(),
        );
        let meta = build_metadata(&tags, &CalibrationRules::default(), fixed_fallback);
        assert_eq!(meta.timestamp.year(), 2018);
    }

    #[test]
    fn test_missing_or_garbled_timestamp_uses_fallback() {
        let meta = build_metadata(&TagMap::new(), &rules(), fixed_fallback);
        assert_eq!(meta.timestamp, fixed_fallback());
        assert_eq!(meta.cam_model, "");

        let mut tags = TagMap::new();
        tags.insert(TAG_DATETIME_ORIGINAL.to_string(), "garbage".to_string());
        let meta = build_metadata(&tags, &rules(), fixed_fallback);
        assert_eq!(meta.timestamp, fixed_fallback());
    }

    #[test]
    fn test_parse_exif_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap();
        assert_eq!(parse_exif_datetime("2024:03:15 12:30:45"), Some(expected));
        assert_eq!(parse_exif_datetime("2024-03-15 12:30:45"), Some(expected));
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("").is_none());
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value("  AF-S_Nikkor   500mm  "), "AF-S Nikkor 500mm");
    }

    #[test]
    fn test_extractor_falls_through_failing_sources() {
        let mut tags = TagMap::new();
        tags.insert(TAG_MODEL.to_string(), "D850".to_string());
        let extractor = MetadataExtractor::new(
            vec![Box::new(StubSource(None)), Box::new(StubSource(Some(tags)))],
            rules(),
        );
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(extractor.extract(tmp.path()).cam_model, "D850");
    }

    #[test]
    fn test_extractor_without_timestamp_uses_file_mtime() {
        let extractor = MetadataExtractor::new(vec![Box::new(StubSource(None))], rules());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let meta = extractor.extract(tmp.path());
        assert_eq!(meta.timestamp, file_mtime(tmp.path()));
        assert_eq!(meta.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_missing_exif_tool_falls_back_in_process() {
        let extractor = MetadataExtractor::new(
            vec![
                Box::new(Exiv2Tool::new("khazad-no-such-exif-tool")),
                Box::new(InProcessReader),
            ],
            rules(),
        );
        let tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        image::DynamicImage::new_rgb8(8, 8).save(tmp.path()).unwrap();
        let meta = extractor.extract(tmp.path());
        assert_eq!(meta.cam_model, "");
        assert_eq!(meta.timestamp, file_mtime(tmp.path()));
    }

    #[test]
    fn test_in_process_reader_corrupt_file_is_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not an image").unwrap();
        assert!(InProcessReader.read_tags(tmp.path()).is_err());
        assert!(read_orientation(tmp.path()).is_none());
    }
}
