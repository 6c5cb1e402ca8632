use quote::quote;

use super::Emitter;
use crate::{
    errors::EmitErrorKind,
    model::{ident, Service},
};

impl Emitter<'_> {
    /// `internal/lookup.rs`: what a factory may ask the container for
    pub fn lookup(&self) -> Result<Vec<u8>, EmitErrorKind> {
        let error = &self.options.error;
        let imports = self.imports();

        let getters = self.model.services.iter().map(|service| self.lookup_getter(service));
        let accessors = self.model.containers.iter().map(|container| {
            let name = ident(&container.name);
            let view = ident(&container.ty);
            quote! { fn #name(&mut self) -> Box<dyn #view + '_>; }
        });
        let views = self.model.containers.iter().map(|container| {
            let view = ident(&container.ty);
            let getters = container.services.iter().map(|service| self.lookup_getter(service));
            quote! {
                pub trait #view {
                    #(#getters)*
                }
            }
        });

        let tokens = quote! {
            #![allow(unused_imports)]

            #imports

            pub trait Container {
                fn set_error(&mut self, err: #error);

                #(#getters)*

                #(#accessors)*
            }

            #(#views)*
        };

        self.generated(tokens)
    }

    fn lookup_getter(&self, service: &Service) -> proc_macro2::TokenStream {
        let name = ident(&service.name);
        let ty = &service.ty;
        let ctx = &self.options.context;
        quote! { fn #name(&mut self, ctx: &#ctx) -> Option<#ty>; }
    }
}
