use std::{
    io::{self, Write as _},
    path::Path,
};

/// Replaces the contents of `path` with `data` in one step.
///
/// The data is written to a temporary file next to the target, then renamed
/// over it, so readers see either the old or the new contents. Parent
/// directories are created as needed.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(data)?;
    temp_file.flush()?;
    temp_file.as_file().sync_data()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
