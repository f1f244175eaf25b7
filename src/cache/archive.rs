//! Reading and repackaging jar/klib archives

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::ResolveResult;

/// Read a UTF-8 entry, `None` when the archive has no such entry
pub fn read_entry(archive: &Path, name: &str) -> ResolveResult<Option<String>> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let result = match zip.by_name(name) {
        Ok(mut entry) => {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            Some(text)
        }
        Err(zip::result::ZipError::FileNotFound) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(result)
}

/// Whether the archive contains anything under `directory/`
pub fn has_directory(archive: &Path, directory: &str) -> ResolveResult<bool> {
    let zip = ZipArchive::new(File::open(archive)?)?;
    let prefix = format!("{}/", directory.trim_end_matches('/'));
    let found = zip.file_names().any(|name| name.starts_with(&prefix));
    Ok(found)
}

/// Copy every entry under `directory/` of `archive` into a new archive at `target`, with the
/// directory prefix stripped. Returns the number of files copied.
pub fn copy_directory(archive: &Path, directory: &str, target: &Path) -> ResolveResult<usize> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let prefix = format!("{}/", directory.trim_end_matches('/'));

    let mut writer = ZipWriter::new(File::create(target)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut copied = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.name().strip_prefix(&prefix).map(str::to_string) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        if entry.is_dir() {
            writer.add_directory(relative, options)?;
        } else {
            // Streamed: the size in the entry header is not trusted for allocation
            writer.start_file(relative, options)?;
            io::copy(&mut entry, &mut writer)?;
            copied += 1;
        }
    }

    writer.finish()?;
    Ok(copied)
}
