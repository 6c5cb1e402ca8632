use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::errors::ModuleErrorKind;

const MANIFEST: &str = "Cargo.toml";
const CRATE_ROOT: &str = "crate";
const SOURCE_DIR: &str = "src";

/// The crate enclosing a directory, used to map `crate::a::b` module paths to directories and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateModule {
    root: PathBuf,
}

impl CrateModule {
    /// Finds the nearest `Cargo.toml` at or above `dir`
    pub fn locate(dir: impl AsRef<Path>) -> Result<Self, ModuleErrorKind> {
        let dir = dir.as_ref();
        let root = dir
            .ancestors()
            .find(|dir| dir.join(MANIFEST).is_file())
            .ok_or_else(|| ModuleErrorKind::MissingModule { path: dir.to_path_buf() })?;

        debug!(root = %root.display(), "Crate located");

        Ok(Self { root: root.to_path_buf() })
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a `crate::…` module path, `None` for paths outside this crate
    #[must_use]
    pub fn dir_of(&self, module: &str) -> Option<PathBuf> {
        let mut segments = module.split("::").map(str::trim);
        if segments.next() != Some(CRATE_ROOT) {
            return None;
        }

        let mut dir = self.root.join(SOURCE_DIR);
        for segment in segments {
            if segment.is_empty() {
                return None;
            }
            dir.push(segment.strip_prefix("r#").unwrap_or(segment));
        }
        Some(dir)
    }

    /// `crate::…` module path of a directory under `src/`, `None` when the directory is elsewhere
    #[must_use]
    pub fn module_of(&self, dir: impl AsRef<Path>) -> Option<String> {
        let relative = dir.as_ref().strip_prefix(self.root.join(SOURCE_DIR)).ok()?;

        let mut module = CRATE_ROOT.to_owned();
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                return None;
            };
            module.push_str("::");
            module.push_str(segment.to_str()?);
        }
        Some(module)
    }
}
