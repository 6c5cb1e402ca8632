use proc_macro2::TokenStream;
use quote::quote;
use std::collections::BTreeSet;

use super::{format, Emitter};
use crate::{
    errors::EmitErrorKind,
    model::{ident, Service},
};

/// Lookup path of stubs written into the default factories directory
pub const DEFAULT_LOOKUP: &str = "super::super::lookup";

impl Emitter<'_> {
    /// Stub of one missing factory.
    ///
    /// `append` stubs go to the end of an existing user file, where the declaration imports aren't in scope,
    /// so their types are spelled out in full.
    pub fn stub(&self, service: &Service, lookup: &str, append: bool) -> Result<TokenStream, EmitErrorKind> {
        let function = ident(&service.factory_fn());
        let ctx = &self.options.context;
        let lookup = if append {
            let path = syn::parse_str::<syn::Path>(lookup)?;
            quote! { #path::Container }
        } else {
            quote! { lookup::Container }
        };

        let ty = if append {
            service.ty.qualified(&self.model.imports)
        } else {
            service.ty.clone()
        };
        let output = if self.options.return_error {
            let error = &self.options.error;
            quote! { Result<#ty, #error> }
        } else {
            quote! { #ty }
        };

        Ok(quote! {
            pub fn #function(_ctx: &#ctx, _c: &mut dyn #lookup) -> #output {
                panic!("not implemented")
            }
        })
    }

    /// Contents of a factories file holding `stubs`, whole for a new file or the tail to append to an existing one.
    ///
    /// Fails with [`EmitErrorKind::FileIgnored`] when there is nothing to write.
    pub fn stub_file(&self, services: &[&Service], stubs: &[TokenStream], lookup: &str, append: bool) -> Result<Vec<u8>, EmitErrorKind> {
        if stubs.is_empty() {
            return Err(EmitErrorKind::FileIgnored);
        }

        if append {
            let mut out = String::from("\n");
            out.push_str(&format(quote! { #(#stubs)* })?);
            return Ok(out.into_bytes());
        }

        let mut aliases = BTreeSet::new();
        for service in services {
            service.ty.collect_aliases(&mut aliases);
        }
        let imports = self.imports_of(|alias| aliases.contains(alias));
        let lookup = syn::parse_str::<syn::Path>(lookup)?;

        Ok(format(quote! {
            use #lookup;
            #imports

            #(#stubs)*
        })?
        .into_bytes())
    }

    /// `internal/factories/mod.rs`: declares every factory module and re-exports its functions
    pub fn factories_index(&self, modules: &BTreeSet<String>) -> Result<Vec<u8>, EmitErrorKind> {
        let modules = modules.iter().map(|module| ident(module)).collect::<Vec<_>>();

        self.generated(quote! {
            #![allow(unused_imports)]

            #(mod #modules;)*

            #(pub use #modules::*;)*
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
        DEFAULT_LOOKUP,
    };
    use crate::{config::Config, errors::EmitErrorKind, sink::HEADING};

    use std::collections::BTreeSet;

    #[test]
    fn test_new_stub_file() {
        let model = model();
        let options = options();
        let emitter = Emitter::new(&model, &options, BUILD);

        let router = &model.services[2];
        let entity_repo = &model.services[3];
        let stubs = [
            emitter.stub(router, DEFAULT_LOOKUP, false).unwrap(),
            emitter.stub(entity_repo, DEFAULT_LOOKUP, false).unwrap(),
        ];
        let out = emitter.stub_file(&[router, entity_repo], &stubs, DEFAULT_LOOKUP, false).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        syn::parse_file(&text).unwrap();
        assert!(!text.starts_with(HEADING));

        let out = compact(&out);
        assert!(out.starts_with("usesuper::super::lookup;"));
        assert!(out.contains("usecrate::http::Router;"));
        assert!(out.contains("usecrate::repo;"));
        assert!(out.contains("usestd::sync::Arc;"));
        assert!(!out.contains("HttpServer"));
        assert!(out.contains(
            "pubfncreate_router(_ctx:&tokio_util::sync::CancellationToken,_c:&mutdynlookup::Container,)->Arc<Router>{panic!(\"notimplemented\")}"
        ) || out.contains(
            "pubfncreate_router(_ctx:&tokio_util::sync::CancellationToken,_c:&mutdynlookup::Container)->Arc<Router>{panic!(\"notimplemented\")}"
        ));
    }

    #[test]
    fn test_appended_stub_uses_full_paths() {
        let model = model();
        let mut config = Config::new("src/di");
        config.factories.return_error = true;
        let options = config.options().unwrap();
        let emitter = Emitter::new(&model, &options, BUILD);

        let users = &model.containers[0].services[1];
        let lookup = "crate::di::internal::lookup";
        let stubs = [emitter.stub(users, lookup, true).unwrap()];
        let out = emitter.stub_file(&[users], &stubs, lookup, true).unwrap();
        assert_eq!(out[0], b'\n');

        let out = compact(&out);
        assert!(out.starts_with("pubfncreate_repositories_users("));
        assert!(out.contains("_c:&mutdyncrate::di::internal::lookup::Container"));
        assert!(out.contains("->Result<std::sync::Arc<dyncrate::repo::Users>,anyhow::Error>"));
    }

    #[test]
    fn test_empty_stub_file_ignored() {
        let model = model();
        let options = options();
        let emitter = Emitter::new(&model, &options, BUILD);

        assert!(matches!(
            emitter.stub_file(&[], &[], DEFAULT_LOOKUP, false),
            Err(EmitErrorKind::FileIgnored)
        ));
    }

    #[test]
    fn test_factories_index() {
        let model = model();
        let options = options();
        let modules = BTreeSet::from(["container".to_owned(), "repositories".to_owned()]);
        let out = Emitter::new(&model, &options, BUILD).factories_index(&modules).unwrap();

        assert!(out.starts_with(HEADING.as_bytes()));
        let out = compact(&out);
        assert!(out.contains("modcontainer;modrepositories;pubusecontainer::*;pubuserepositories::*;"));
    }
}
