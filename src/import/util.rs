use std::io::Read;
use std::path::Path;

const HASH_CHUNK: usize = 4096;

/// BLAKE3 hex digest of a reader, consumed in 4 KiB chunks.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    hash_reader(std::fs::File::open(path)?)
}

/// `<hash>.<ext>` where `ext` is the original name's extension, lowercased so
/// that `a.jpg` and `a.JPG` with the same bytes share one stored file.
/// Names without an extension give just `<hash>`.
pub fn stored_filename(hash: &str, original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());
    match ext {
        Some(ext) => format!("{}.{}", hash, ext.to_lowercase()),
        None => hash.to_string(),
    }
}
