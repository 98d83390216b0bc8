pub mod exif;
pub mod pipeline;
pub mod thumbnails;
pub mod util;
