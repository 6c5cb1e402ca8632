use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use syn::{Item, ReturnType, Type, Visibility};
use tracing::debug;
use walkdir::WalkDir;

use crate::{errors::ScanErrorKind, model::Factory};

/// Name prefix every factory function carries
pub const FACTORY_PREFIX: &str = "create_";

/// Collects the top-level `pub fn create_*` functions of every `.rs` file under `dirs`, keyed by the name without the prefix.
///
/// Directories that don't exist yet are skipped.
pub fn scan<I, P>(dirs: I) -> Result<BTreeMap<String, Factory>, ScanErrorKind>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut factories = BTreeMap::new();

    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Factories directory not found, skipped");
            continue;
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|source| ScanErrorKind::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "rs") {
                continue;
            }

            scan_file(path, &mut factories)?;
        }
    }

    debug!(factories = factories.len(), "Factories scanned");

    Ok(factories)
}

fn scan_file(path: &Path, factories: &mut BTreeMap<String, Factory>) -> Result<(), ScanErrorKind> {
    let text = fs::read_to_string(path).map_err(|source| ScanErrorKind::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = syn::parse_file(&text).map_err(|source| ScanErrorKind::Parse {
        path: PathBuf::from(path),
        source,
    })?;

    for item in file.items {
        let Item::Fn(item) = item else { continue };
        if !matches!(item.vis, Visibility::Public(_)) {
            continue;
        }

        let name = item.sig.ident.to_string();
        let Some(key) = name
            .strip_prefix(FACTORY_PREFIX)
            .filter(|key| !key.is_empty())
            .map(str::to_owned)
        else {
            continue;
        };

        let factory = Factory {
            returns_error: returns_result(&item.sig.output),
            name,
        };
        debug!(factory = %factory.name, returns_error = factory.returns_error, path = %path.display(), "Factory found");
        factories.insert(key, factory);
    }

    Ok(())
}

/// `Result<T, E>`, `anyhow::Result<T>`, `io::Result<T>` and other aliases ending with `Result`
fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    match ty.as_ref() {
        Type::Path(ty) => ty.path.segments.last().is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}
