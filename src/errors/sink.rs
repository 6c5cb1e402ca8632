use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum WriteErrorKind {
    #[error("{} already exists and is not a generated file", path.display())]
    FileAlreadyExists { path: PathBuf },
    #[error("write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
