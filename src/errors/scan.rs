use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ScanErrorKind {
    #[error("walk {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },
}
