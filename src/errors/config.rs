use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigErrorKind {
    #[error("no digen.yaml, digen.yml or digen.json in {}", dir.display())]
    NotFound { dir: PathBuf },
    #[error("read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("decode {}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("decode {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config version {actual} is older than the supported {expected}")]
    VersionMismatch { actual: semver::Version, expected: semver::Version },
    #[error("`{key}` is not a valid Rust path: `{value}`")]
    InvalidPath { key: &'static str, value: String },
}
