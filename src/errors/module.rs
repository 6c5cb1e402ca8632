use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ModuleErrorKind {
    #[error("no `Cargo.toml` found above {}", path.display())]
    MissingModule { path: PathBuf },
}
