//! Reading adapter input, optionally from inside a zip archive.
//!
//! Every function reads the whole file and drops the handle before returning.

use crate::utils::error::FormatError;
use log::debug;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, FormatError> {
    fs::read(path).map_err(|e| FormatError::unreadable(path, e))
}

pub fn read_text(path: &Path, stream: &str) -> Result<String, FormatError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes)
        .map_err(|e| FormatError::corrupt(path, stream, format!("invalid UTF-8: {}", e)))
}

// Deflate cannot expand past roughly 1032:1.
const MAX_DEFLATE_RATIO: u64 = 1032;
const MAX_ENTRY_RESERVE: u64 = 64 * 1024 * 1024;

/// Up-front buffer size for an entry whose header sizes are untrusted
fn reserve_hint(declared_size: u64, compressed_size: u64) -> usize {
    declared_size
        .min(compressed_size.saturating_mul(MAX_DEFLATE_RATIO))
        .min(MAX_ENTRY_RESERVE) as usize
}

/// Contents of the first entry ending in `inner_suffix`, else the first entry
pub fn read_zip_entry(path: &Path, inner_suffix: &str, stream: &str) -> Result<Vec<u8>, FormatError> {
    let bytes = read_bytes(path)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FormatError::corrupt(path, stream, format!("invalid archive: {}", e)))?;

    let suffix = inner_suffix.to_ascii_lowercase();
    let name = archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(&suffix))
        .map(str::to_string);

    let mut entry = match &name {
        Some(name) => archive.by_name(name),
        None => archive.by_index(0),
    }
    .map_err(|e| FormatError::corrupt(path, stream, format!("no usable archive entry: {}", e)))?;

    debug!("Reading archive entry '{}' from {}", entry.name(), path.display());
    let mut contents = Vec::with_capacity(reserve_hint(entry.size(), entry.compressed_size()));
    entry
        .read_to_end(&mut contents)
        .map_err(|e| FormatError::corrupt(path, stream, format!("cannot inflate entry: {}", e)))?;
    Ok(contents)
}

/// Text of `path`, unpacking it first when the name ends in `.zip`
pub fn read_maybe_zipped_text(
    path: &Path,
    inner_suffix: &str,
    stream: &str,
) -> Result<String, FormatError> {
    let zipped = path
        .to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(".zip");
    let bytes = if zipped {
        read_zip_entry(path, inner_suffix, stream)?
    } else {
        read_bytes(path)?
    };
    String::from_utf8(bytes)
        .map_err(|e| FormatError::corrupt(path, stream, format!("invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_prefers_matching_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.perfView.xml.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"ignore me").unwrap();
        writer.start_file("trace.perfView.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<StackWindow/>").unwrap();
        writer.finish().unwrap();

        let text = read_maybe_zipped_text(&path, ".perfView.xml", "Stacks").unwrap();
        assert_eq!(text, "<StackWindow/>");
    }

    #[test]
    fn test_reserve_hint_ignores_inflated_header_size() {
        assert_eq!(reserve_hint(u64::MAX, 10), 10 * 1032);
        assert_eq!(reserve_hint(u64::MAX, u64::MAX), 64 * 1024 * 1024);
        assert_eq!(reserve_hint(100, 40), 100);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = read_bytes(Path::new("/nonexistent/file.wt")).unwrap_err();
        assert!(matches!(err, FormatError::UnreadableFile { .. }));
    }
}
