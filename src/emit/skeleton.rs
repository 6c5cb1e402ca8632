use quote::quote;

use super::Emitter;
use crate::errors::EmitErrorKind;

const DECLARATION: &str = r#"//! Container declaration read by `digen generate`. It is never compiled.
//!
//! Every field of `Container` is a service, except fields typed as another struct of this file:
//! those are sub-containers grouping their own services. Options go into `#[di(...)]`
//! (or `/// di:` doc lines):
//!
//! - `set`: the service can be replaced through `Container::set_<name>`
//! - `close`: `Container::close` calls the service's `close()`
//! - `required`: passed to `Container::new` instead of being built by a factory
//! - `external`: injected through `Container::set_<name>`, getting it before that panics
//! - `public`: the service gets a getter on the public container
//! - `public_name = "..."`: name of the public getter
//! - `factory_file = "..."`: file the factory stub is generated into
//! - `factory_pkg = "crate::..."`: module the factory lives in

// use std::sync::Arc;

pub struct Container {
    // #[di(required)]
    // config: Arc<crate::config::Config>,

    // #[di(public, close)]
    // server: Arc<crate::http::Server>,
}
"#;

/// User-owned declaration written by `digen init`
#[must_use]
pub fn declaration() -> &'static [u8] {
    DECLARATION.as_bytes()
}

/// README of the container directory
#[must_use]
pub fn readme(module: &str) -> Vec<u8> {
    format!(
        r"# `{module}`

Dependency injection container generated by `digen`.

| Path | Owner |
|------|-------|
| `mod.rs` | generated: public container, `Container::new` and the public getters |
| `internal/mod.rs` | generated |
| `internal/container.rs` | generated: lazy getters, setters and `close` |
| `internal/lookup.rs` | generated: the traits factories receive |
| `internal/bitset.rs` | generated |
| `internal/definitions/container.rs` | you: the declaration |
| `internal/factories/mod.rs` | generated: factory module index |
| `internal/factories/*.rs` | you: one `create_<service>` function per service |

Edit the declaration or a factory, then run `digen generate`. Generated files start with a
`DO NOT EDIT` line and are rewritten on every run. Missing factories are appended as stubs that
panic until implemented.
"
    )
    .into_bytes()
}

impl Emitter<'_> {
    /// `internal/bitset.rs`: one bit per service, set once the service is initialized
    pub fn bitset(&self) -> Result<Vec<u8>, EmitErrorKind> {
        self.generated(quote! {
            #![allow(dead_code)]

            pub struct Bitset {
                words: Box<[u64]>,
            }

            impl Bitset {
                pub fn new(n: usize) -> Self {
                    Self {
                        words: vec![0; (n + 63) / 64].into_boxed_slice(),
                    }
                }

                pub fn set(&mut self, i: usize) {
                    self.words[i / 64] |= 1 << (i % 64);
                }

                pub fn is_set(&self, i: usize) -> bool {
                    self.words[i / 64] & (1 << (i % 64)) != 0
                }
            }
        })
    }

    /// `internal/mod.rs`. The declaration under `definitions/` stays out of the module tree.
    pub fn internal_index(&self) -> Result<Vec<u8>, EmitErrorKind> {
        self.generated(quote! {
            mod bitset;
            mod container;
            pub mod factories;
            pub mod lookup;

            pub use container::*;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{
            tests::{compact, model, options, BUILD},
            Emitter,
        },
        declaration, readme,
    };
    use crate::{parse_source, sink::HEADING};

    #[test]
    fn test_declaration_skeleton_parses_empty() {
        let text = std::str::from_utf8(declaration()).unwrap();
        assert!(!text.starts_with(HEADING));

        let model = parse_source("di", text).unwrap();
        assert!(model.services.is_empty());
        assert!(model.containers.is_empty());
    }

    #[test]
    fn test_bitset() {
        let model = model();
        let options = options();
        let out = Emitter::new(&model, &options, BUILD).bitset().unwrap();
        assert!(out.starts_with(HEADING.as_bytes()));

        let out = compact(&out);
        assert!(out.contains("words:vec![0;(n+63)/64].into_boxed_slice()"));
        assert!(out.contains("self.words[i/64]|=1<<(i%64);"));
    }

    #[test]
    fn test_internal_index() {
        let model = model();
        let options = options();
        let out = compact(&Emitter::new(&model, &options, BUILD).internal_index().unwrap());

        assert!(out.contains("modbitset;modcontainer;pubmodfactories;pubmodlookup;pubusecontainer::*;"));
        assert!(!out.contains("definitions"));
    }

    #[test]
    fn test_readme() {
        let text = String::from_utf8(readme("di")).unwrap();
        assert!(text.starts_with("# `di`"));
        assert!(text.contains("internal/definitions/container.rs"));
    }
}
