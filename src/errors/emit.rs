#[derive(thiserror::Error, Debug)]
pub enum EmitErrorKind {
    /// Nothing to emit for this slot. Never reaches the user.
    #[error("file ignored")]
    FileIgnored,
    #[error("generated code is not valid Rust")]
    Format(#[from] syn::Error),
}
