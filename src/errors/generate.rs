use std::path::PathBuf;

use super::{ConfigErrorKind, EmitErrorKind, ModuleErrorKind, ParseErrorKind, ScanErrorKind, WriteErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum GenerateErrorKind {
    #[error("load config")]
    Config(#[from] ConfigErrorKind),
    #[error("locate crate")]
    Module(#[from] ModuleErrorKind),
    #[error("parse declaration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseErrorKind,
    },
    #[error("scan factories")]
    Scan(#[from] ScanErrorKind),
    #[error("assemble container")]
    Assemble(#[source] ParseErrorKind),
    #[error("emit {}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: EmitErrorKind,
    },
    #[error("write generated files")]
    Write(#[from] WriteErrorKind),
}
