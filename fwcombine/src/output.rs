//! Output directory handling

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Error;

/// Where the combined image is written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Directory holding the image
    pub dir: PathBuf,
    /// File name of the image inside `dir`
    pub file: String,
    /// Clear all of `dir` before every run, rather than only the image
    pub clean: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".pio/build/combined_stm32f0"),
            file: "firmware.bin".into(),
            clean: true,
        }
    }
}

impl OutputSettings {
    /// Output location for an explicit image path
    ///
    /// The directory containing `path` is not owned by fwcombine, so only the
    /// image itself is replaced.
    pub fn from_path(path: &Path) -> Self {
        Self {
            dir: parent_dir(path),
            file: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            clean: false,
        }
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }

    /// Remove the output of any previous run, leaving `dir` in place.
    pub fn prepare(&self) -> Result<(), Error> {
        if self.clean {
            reset_dir(&self.dir)
        } else {
            remove_image(&self.image_path())
        }
    }
}

/// Fail if clearing `dir` could delete anything besides build output.
///
/// `dir` must not be a filesystem root, nor one of `protected` or an ancestor
/// of it. A directory that does not exist yet is always accepted.
pub fn check_output_dir(dir: &Path, protected: &[&Path]) -> Result<(), Error> {
    if !dir.exists() {
        return Ok(());
    }

    let dir = dir
        .canonicalize()
        .map_err(|e| Error::OutputError(dir.to_path_buf(), e))?;
    let contains_protected = protected
        .iter()
        .filter_map(|path| path.canonicalize().ok())
        .any(|path| path.starts_with(&dir));

    if dir.parent().is_none() || contains_protected {
        return Err(Error::InvalidConfig(format!(
            "refusing to use {} as the output directory, it is cleared on every run and \
             contains the project",
            dir.display()
        )));
    }

    Ok(())
}

/// Make `dir` an existing, empty directory.
///
/// Files and subdirectories left over from a previous run are removed so a
/// stale image can never be mistaken for the output of this run.
pub fn reset_dir(dir: &Path) -> Result<(), Error> {
    let output_error = |e| Error::OutputError(dir.to_path_buf(), e);

    if !dir.exists() {
        debug!("Creating output directory: {}", dir.display());
        return fs::create_dir_all(dir).map_err(output_error);
    }

    debug!("Cleaning output directory: {}", dir.display());
    for entry in fs::read_dir(dir).map_err(output_error)? {
        let path = entry.map_err(output_error)?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| Error::OutputError(path, e))?;
    }

    Ok(())
}

/// Delete the image at `path` if present, creating its directory otherwise.
pub fn remove_image(path: &Path) -> Result<(), Error> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| Error::OutputError(dir.clone(), e))?;

    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(Error::OutputError(path.to_path_buf(), e)),
        _ => Ok(()),
    }
}

/// Write `data` to `path` in a single step.
///
/// The image is written to a temporary file next to `path` and renamed into
/// place, so readers see either no file or the complete image.
pub fn write_image(path: &Path, data: &[u8]) -> Result<(), Error> {
    let dir = parent_dir(path);
    let output_error = |e| Error::OutputError(path.to_path_buf(), e);

    let mut file = NamedTempFile::new_in(&dir).map_err(output_error)?;
    file.write_all(data).map_err(output_error)?;
    file.as_file().sync_all().map_err(output_error)?;
    file.persist(path).map_err(|e| output_error(e.error))?;

    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
