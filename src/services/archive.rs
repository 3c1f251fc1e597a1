use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Name and body of the informational entry appended to every bundle when
/// enabled in the configuration.
pub const README_NAME: &str = "README.txt";
pub const README_BODY: &str = "These images were optimized with image-optimizer-backend.\n";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to write ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to write ZIP entry: {0}")]
    Io(#[from] std::io::Error),
}

/// A named byte buffer destined for the bundle.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Bytes,
}

/// Builds a ZIP byte stream from the given entries.
///
/// Duplicate names follow a last-write-wins policy, applied before writing:
/// the entry keeps its first-seen position but carries the last-seen content,
/// so the resulting archive never contains two entries with the same name.
pub fn build_archive(entries: &[ArchiveEntry], readme: bool) -> Result<Vec<u8>, ArchiveError> {
    let mut order: Vec<&str> = Vec::with_capacity(entries.len());
    let mut contents: HashMap<&str, &Bytes> = HashMap::with_capacity(entries.len());

    for entry in entries {
        if contents.insert(entry.name.as_str(), &entry.bytes).is_none() {
            order.push(entry.name.as_str());
        } else {
            tracing::warn!("Duplicate archive entry '{}', keeping last upload", entry.name);
        }
    }

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for name in order {
        writer.start_file(name, options)?;
        writer.write_all(contents[name])?;
    }

    if readme {
        writer.start_file(README_NAME, options)?;
        writer.write_all(README_BODY.as_bytes())?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(name: &str, data: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            bytes: Bytes::copy_from_slice(data),
        }
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_round_trip() {
        let entries = vec![entry("a.jpg", b"jpeg bytes"), entry("b.png", b"png bytes")];

        let zip_bytes = build_archive(&entries, false).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();

        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, "a.jpg"), b"jpeg bytes");
        assert_eq!(read_entry(&mut archive, "b.png"), b"png bytes");
    }

    #[test]
    fn test_determinism() {
        let entries = vec![entry("a.jpg", b"one"), entry("b.jpg", b"two")];
        let first = build_archive(&entries, true).unwrap();
        let second = build_archive(&entries, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let entries = vec![entry("a.jpg", b"first"), entry("a.jpg", b"second")];

        let zip_bytes = build_archive(&entries, false).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();

        assert_eq!(archive.len(), 1);
        assert_eq!(read_entry(&mut archive, "a.jpg"), b"second");
    }

    #[test]
    fn test_readme_entry_appended() {
        let entries = vec![entry("a.jpg", b"data")];

        let zip_bytes = build_archive(&entries, true).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();

        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, README_NAME), README_BODY.as_bytes());
    }

    #[test]
    fn test_empty_input_builds_empty_archive() {
        let zip_bytes = build_archive(&[], false).unwrap();
        let archive = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
