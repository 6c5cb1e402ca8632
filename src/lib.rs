//! Generator of lazy, thread-safe dependency injection containers.
//!
//! A container is declared as a plain Rust struct, each field a service, and `digen` writes the code that
//! builds every service on first use through a user-written `create_<service>` factory, caches it and closes it
//! on shutdown. The pipeline is staged: [`parse_file`] reads the declaration, [`scan`] finds the factories,
//! [`assemble`] completes the model and [`Emitter`] renders the files, which a [`Sink`] writes.
//! [`Generator`] runs the whole pipeline for a project.

pub mod config;
pub mod emit;
pub mod model;
pub mod module;
pub mod sink;

pub(crate) mod assembler;
pub(crate) mod errors;
pub(crate) mod generator;
pub(crate) mod parser;
pub(crate) mod scanner;

pub use assembler::assemble;
pub use config::{Config, Options};
pub use emit::{BuildInfo, Emitter};
pub use errors::{ConfigErrorKind, EmitErrorKind, GenerateErrorKind, ModuleErrorKind, ParseErrorKind, ScanErrorKind, WriteErrorKind};
pub use generator::{Generated, Generator, Layout};
pub use model::{Factory, Import, RootContainer, Service, SubContainer, TypeDescriptor};
pub use parser::{parse_file, parse_source};
pub use scanner::{scan, FACTORY_PREFIX};
pub use sink::{DryRunSink, FsSink, Sink, WriteMode, WriteOutcome, HEADING};
