use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{self, BufRead as _, BufReader, Write as _},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::errors::WriteErrorKind;

/// First line of every generated file. Files without it belong to the user.
pub const HEADING: &str = "// Code generated by DIGEN; DO NOT EDIT.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace a generated file, refusing files that don't start with [`HEADING`]
    Overwrite,
    /// Write only when the file doesn't exist yet
    CreateNew,
    /// Add to the end of the file, creating it when missing
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// [`WriteMode::CreateNew`] found an existing file
    Skipped,
}

/// Destination of generated files
pub trait Sink {
    fn write(&self, path: &Path, bytes: &[u8], mode: WriteMode) -> Result<WriteOutcome, WriteErrorKind>;

    fn exists(&self, path: &Path) -> bool;
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WriteErrorKind + '_ {
    move |source| WriteErrorKind::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether the file on disk may be overwritten: missing, or carrying the generated heading
fn is_overwritable(path: &Path) -> Result<bool, WriteErrorKind> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(io_error(path)(err)),
    };

    let mut first_line = String::new();
    BufReader::new(file).read_line(&mut first_line).map_err(io_error(path))?;

    Ok(first_line.trim_end() == HEADING)
}

/// Writes to the filesystem, creating parent directories
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl Sink for FsSink {
    fn write(&self, path: &Path, bytes: &[u8], mode: WriteMode) -> Result<WriteOutcome, WriteErrorKind> {
        match mode {
            WriteMode::Overwrite if !is_overwritable(path)? => {
                return Err(WriteErrorKind::FileAlreadyExists { path: path.to_path_buf() });
            }
            WriteMode::CreateNew if path.exists() => {
                debug!(path = %path.display(), "File exists, skipped");
                return Ok(WriteOutcome::Skipped);
            }
            _ => {}
        }

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        match mode {
            WriteMode::Overwrite => fs::write(path, bytes).map_err(io_error(path))?,
            WriteMode::CreateNew => {
                let mut file = OpenOptions::new().write(true).create_new(true).open(path).map_err(io_error(path))?;
                file.write_all(bytes).map_err(io_error(path))?;
            }
            WriteMode::Append => {
                let mut file = OpenOptions::new().append(true).create(true).open(path).map_err(io_error(path))?;
                file.write_all(bytes).map_err(io_error(path))?;
            }
        }

        debug!(path = %path.display(), ?mode, "File written");

        Ok(WriteOutcome::Written)
    }

    #[inline]
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Records writes in memory. Reads the filesystem only to decide what exists.
#[derive(Debug, Default)]
pub struct DryRunSink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl DryRunSink {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths written so far, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    #[must_use]
    pub fn into_files(self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.files.into_inner()
    }
}

impl Sink for DryRunSink {
    fn write(&self, path: &Path, bytes: &[u8], mode: WriteMode) -> Result<WriteOutcome, WriteErrorKind> {
        let mut files = self.files.lock();

        match mode {
            WriteMode::Overwrite => {
                let overwritable = match files.get(path) {
                    Some(content) => content.starts_with(HEADING.as_bytes()),
                    None => is_overwritable(path)?,
                };
                if !overwritable {
                    return Err(WriteErrorKind::FileAlreadyExists { path: path.to_path_buf() });
                }
                files.insert(path.to_path_buf(), bytes.to_vec());
            }
            WriteMode::CreateNew => {
                if files.contains_key(path) || path.exists() {
                    return Ok(WriteOutcome::Skipped);
                }
                files.insert(path.to_path_buf(), bytes.to_vec());
            }
            WriteMode::Append => {
                let mut content = match files.remove(path) {
                    Some(content) => content,
                    None => match fs::read(path) {
                        Ok(content) => content,
                        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
                        Err(err) => return Err(io_error(path)(err)),
                    },
                };
                content.extend_from_slice(bytes);
                files.insert(path.to_path_buf(), content);
            }
        }

        Ok(WriteOutcome::Written)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path) || path.exists()
    }
}
