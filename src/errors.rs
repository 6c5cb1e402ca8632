mod config;
mod emit;
mod generate;
mod module;
mod parse;
mod scan;
mod sink;

pub use config::ConfigErrorKind;
pub use emit::EmitErrorKind;
pub use generate::GenerateErrorKind;
pub use module::ModuleErrorKind;
pub use parse::ParseErrorKind;
pub use scan::ScanErrorKind;
pub use sink::WriteErrorKind;
