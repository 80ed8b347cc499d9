use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use walkdir::WalkDir;

use crate::utils::fs::write_file_atomic;

use super::{
    Xarc,
    errors::{Error, io_error},
};

/// Maps an entry name to a relative path, refusing anything that could
/// resolve outside the extraction root.
fn entry_path(name: &str) -> Result<PathBuf, Error> {
    let mut path = PathBuf::new();
    for part in name.split('/') {
        let components = Path::new(part).components().collect::<Vec<_>>();
        let [Component::Normal(component)] = components[..] else {
            return Err(Error::UnsafeName(name.to_string()));
        };
        path.push(component);
    }
    Ok(path)
}

fn entry_name(root: &Path, path: &Path) -> Result<String, Error> {
    let unrepresentable = || Error::UnrepresentablePath(path.to_path_buf());
    let relative = path.strip_prefix(root).map_err(|_| unrepresentable())?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().ok_or_else(unrepresentable),
            _ => Err(unrepresentable()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

/// Pairs each entry with its path relative to an extraction root.
///
/// Fails on unsafe names and on an entry that would have to be both a file
/// and a directory, such as `a` next to `a/b`.
fn extraction_targets(archive: &Xarc) -> Result<Vec<(PathBuf, &[u8])>, Error> {
    let mut files: HashMap<PathBuf, String> = HashMap::new();
    let mut dirs: HashMap<PathBuf, String> = HashMap::new();
    let mut targets = Vec::with_capacity(archive.len());
    for (name, data) in archive.entries() {
        let path = entry_path(&name)?;
        for dir in path.ancestors().skip(1) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if let Some(file) = files.get(dir) {
                return Err(Error::PathConflict {
                    file: file.clone(),
                    nested: name,
                });
            }
            dirs.entry(dir.into()).or_insert_with(|| name.clone());
        }
        if let Some(nested) = dirs.get(&path) {
            return Err(Error::PathConflict {
                file: name,
                nested: nested.clone(),
            });
        }
        files.insert(path.clone(), name);
        targets.push((path, data));
    }
    Ok(targets)
}

impl Xarc {
    /// Builds an archive from every regular file below `root`.
    ///
    /// Entries are named by their path relative to `root` with `/` as the
    /// separator. The walk is depth-first with each directory's contents
    /// sorted by file name, so the same tree always yields the same archive.
    pub fn from_dir(root: &Path) -> Result<Self, Error> {
        let mut archive = Xarc::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| Error::Io {
                path: err.path().unwrap_or(root).to_path_buf(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry_name(root, path)?;
            let data = std::fs::read(path).map_err(io_error(path))?;
            archive.insert_data(&name, data)?;
        }
        log::debug!("Collected {} files from {}", archive.len(), root.display());
        Ok(archive)
    }

    /// Checks that [`extract_to_dir`](Self::extract_to_dir) can write every
    /// entry, without touching the file system.
    pub fn check_extractable(&self) -> Result<(), Error> {
        extraction_targets(self)?;
        Ok(())
    }

    /// Writes every entry to `root/<name>`, creating directories as needed.
    ///
    /// All names are checked before anything is written.
    pub fn extract_to_dir(&self, root: &Path) -> Result<(), Error> {
        for (path, data) in extraction_targets(self)? {
            let path = root.join(path);
            write_file_atomic(&path, data).map_err(io_error(&path))?;
        }
        Ok(())
    }
}
