use crate::config::Config;
use crate::import::exif::read_orientation;
use crate::storage::StorageLayout;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoder panicked on {0:?}")]
    Panicked(PathBuf),
}

/// Bounding boxes for the two derivative copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSizes {
    pub thumb: (u32, u32),
    pub halfres: (u32, u32),
}

impl Default for DerivativeSizes {
    fn default() -> Self {
        Self {
            thumb: (512, 512),
            halfres: (2048, 2048),
        }
    }
}

impl DerivativeSizes {
    pub fn from_config(config: &Config) -> Self {
        Self {
            thumb: config.thumb_size,
            halfres: config.halfres_size,
        }
    }
}

/// Apply EXIF orientation rotation to an image.
fn apply_orientation(img: DynamicImage, orientation: Option<u16>) -> DynamicImage {
    match orientation {
        Some(3) => img.rotate180(),
        Some(6) => img.rotate90(),
        Some(8) => img.rotate270(),
        Some(o) if matches!(o, 2 | 4 | 5 | 7) => {
            tracing::debug!("thumbnail: orientation {} (mirror) not applied", o);
            img
        }
        _ => img,
    }
}

/// Shrink to fit inside `bounds`, keeping the aspect ratio. Never upscales.
fn fit_within(img: &DynamicImage, bounds: (u32, u32)) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= bounds.0 && h <= bounds.1 {
        return img.clone();
    }
    img.resize(bounds.0, bounds.1, image::imageops::FilterType::Lanczos3)
}

/// Encode to a sibling temp file then rename, so readers never see a
/// partially written derivative.
fn write_atomically(
    img: &DynamicImage,
    out_path: &Path,
    format: ImageFormat,
) -> Result<(), ThumbnailError> {
    let file_name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = out_path.with_file_name(format!(".{}.tmp", file_name));
    if let Err(e) = img.save_with_format(&tmp_path, format) {
        if let Err(rm) = std::fs::remove_file(&tmp_path) {
            if rm.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("cannot remove {:?}: {}", tmp_path, rm);
            }
        }
        return Err(e.into());
    }
    std::fs::rename(&tmp_path, out_path)?;
    tracing::debug!("derivative saved to {:?}", out_path);
    Ok(())
}

fn decode(source: &Path) -> Result<(DynamicImage, ImageFormat), ThumbnailError> {
    let reader = ImageReader::open(source)?.with_guessed_format()?;
    let format = match reader.format() {
        Some(f) => f,
        None => ImageFormat::from_path(source)?,
    };
    let img = reader.decode()?;
    Ok((img, format))
}

fn ensure_derivatives_inner(
    layout: &StorageLayout,
    filename: &str,
    sizes: DerivativeSizes,
) -> Result<usize, ThumbnailError> {
    let targets = [
        (layout.thumb(filename), sizes.thumb),
        (layout.halfres_copy(filename), sizes.halfres),
    ];
    let missing: Vec<&(PathBuf, (u32, u32))> =
        targets.iter().filter(|(p, _)| !p.exists()).collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let source = layout.original(filename);
    let (img, format) = decode(&source)?;
    let img = apply_orientation(img, read_orientation(&source));

    for (out_path, bounds) in &missing {
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_atomically(&fit_within(&img, *bounds), out_path, format)?;
    }
    Ok(missing.len())
}

/// Make sure the thumbnail and half-resolution copies of a stored original
/// exist. Existing files are left untouched. Returns how many were written.
pub fn ensure_derivatives(
    layout: &StorageLayout,
    filename: &str,
    sizes: DerivativeSizes,
) -> Result<usize, ThumbnailError> {
    match std::panic::catch_unwind(|| ensure_derivatives_inner(layout, filename, sizes)) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("panic while generating derivatives for {}", filename);
            Err(ThumbnailError::Panicked(layout.original(filename)))
        }
    }
}

/// Whether the half-resolution copy is wider than tall. `None` when it cannot
/// be read or is square.
pub fn landscape(layout: &StorageLayout, filename: &str) -> Option<bool> {
    let path = layout.halfres_copy(filename);
    match image::image_dimensions(&path) {
        Ok((w, h)) if w != h => Some(w > h),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("cannot read dimensions of {:?}: {}", path, e);
            None
        }
    }
}
