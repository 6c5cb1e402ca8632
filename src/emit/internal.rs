use proc_macro2::{Literal, TokenStream};
use quote::quote;
use syn::LitStr;

use super::{bit, Emitter};
use crate::{
    errors::EmitErrorKind,
    model::{ident, Service, SubContainer},
};

/// Where a service's cached value lives, seen from the method being emitted
struct Slot {
    /// Expression of the root container: `self` on the root, `self.c` on a view
    root: TokenStream,
    field: TokenStream,
}

impl Slot {
    fn of(service: &Service, container: Option<&SubContainer>) -> Self {
        let name = ident(&service.name);
        match container {
            Some(container) => {
                let sub = ident(&container.name);
                Self {
                    root: quote! { self.c },
                    field: quote! { self.c.#sub.#name },
                }
            }
            None => Self {
                root: quote! { self },
                field: quote! { self.#name },
            },
        }
    }
}

impl Emitter<'_> {
    /// `internal/container.rs`: the lock-free container factories see through the lookup traits
    pub fn internal(&self) -> Result<Vec<u8>, EmitErrorKind> {
        let model = self.model;
        let error = &self.options.error;
        let imports = self.imports();
        let words = Literal::usize_unsuffixed(model.services_len());

        let root_fields = model.services.iter().map(|service| {
            let name = ident(&service.name);
            let ty = &service.ty;
            quote! { #name: Option<#ty> }
        });
        let root_inits = model.services.iter().map(|service| {
            let name = ident(&service.name);
            quote! { #name: None }
        });
        let state_fields = model.containers.iter().map(|container| {
            let name = ident(&container.name);
            let state = ident(&container.state());
            quote! { #name: #state }
        });
        let state_inits = model.containers.iter().map(|container| {
            let name = ident(&container.name);
            let state = ident(&container.state());
            quote! { #name: #state::default() }
        });

        let getters = model
            .services
            .iter()
            .map(|service| self.getter(service, &Slot::of(service, None)))
            .collect::<Result<Vec<_>, _>>()?;
        let setters = model
            .services
            .iter()
            .filter(|service| service.emits_setter())
            .map(|service| setter(service, &Slot::of(service, None)));
        let accessors = model.containers.iter().map(|container| {
            let name = ident(&container.name);
            let view = ident(&container.ty);
            quote! {
                pub fn #name(&mut self) -> #view<'_> {
                    #view { c: self }
                }
            }
        });
        let closers = self.closers();

        let states = model.containers.iter().map(|container| {
            let state = ident(&container.state());
            let fields = container.services.iter().map(|service| {
                let name = ident(&service.name);
                let ty = &service.ty;
                quote! { #name: Option<#ty> }
            });
            quote! {
                #[derive(Default)]
                pub struct #state {
                    #(#fields,)*
                }
            }
        });
        let views = model
            .containers
            .iter()
            .map(|container| self.view(container))
            .collect::<Result<Vec<_>, _>>()?;
        let lookups = self.lookup_impls();

        let tokens = quote! {
            #![allow(unused_imports, dead_code, clippy::all)]

            #imports

            pub struct Container {
                err: Option<#error>,
                init: super::bitset::Bitset,
                #(#root_fields,)*
                #(#state_fields,)*
            }

            #(#states)*

            impl Container {
                pub fn new() -> Self {
                    Self {
                        err: None,
                        init: super::bitset::Bitset::new(#words),
                        #(#root_inits,)*
                        #(#state_inits,)*
                    }
                }

                pub fn error(&self) -> Option<&#error> {
                    self.err.as_ref()
                }

                pub fn take_error(&mut self) -> Option<#error> {
                    self.err.take()
                }

                /// Keeps the first error only
                pub fn set_error(&mut self, err: #error) {
                    if self.err.is_none() {
                        self.err = Some(err);
                    }
                }

                #(#getters)*

                #(#setters)*

                #(#accessors)*

                pub fn close(&mut self) {
                    #(#closers)*
                }
            }

            impl Default for Container {
                fn default() -> Self {
                    Self::new()
                }
            }

            #(#views)*

            #lookups
        };

        self.generated(tokens)
    }

    fn getter(&self, service: &Service, slot: &Slot) -> Result<TokenStream, EmitErrorKind> {
        let name = ident(&service.name);
        let ty = &service.ty;
        let ctx_ty = &self.options.context;
        let Slot { root, field } = slot;
        let bit = bit(service);

        let value = if service.ty.is_copy(&self.model.imports) {
            quote! { #field }
        } else {
            quote! { #field.clone() }
        };

        let (ctx, body) = if service.is_required {
            (quote! { _ctx }, value)
        } else if service.is_external {
            let missing = LitStr::new(&format!("missing {}", service.title()), proc_macro2::Span::call_site());
            let body = quote! {
                if !#root.init.is_set(#bit) {
                    panic!(#missing);
                }
                #value
            };
            (quote! { _ctx }, body)
        } else {
            let factory = self.factory_path(service)?;
            let call = quote! { #factory(ctx, &mut *#root) };
            // a dependency failing inside the factory leaves its result uncached
            let store = quote! {
                if #root.err.is_none() {
                    #field = Some(s);
                    #root.init.set(#bit);
                }
            };
            let build = if self.returns_error(service) {
                let wrapped = self.wrap_error(quote! { err }, &format!("create {}", service.title()));
                quote! {
                    match #call {
                        Ok(s) => {
                            #store
                        }
                        Err(err) => #root.set_error(#wrapped),
                    }
                }
            } else {
                quote! {
                    let s = #call;
                    #store
                }
            };
            let body = quote! {
                if !#root.init.is_set(#bit) && #root.err.is_none() {
                    #build
                }
                #value
            };
            (quote! { ctx }, body)
        };

        Ok(quote! {
            pub fn #name(&mut self, #ctx: &#ctx_ty) -> Option<#ty> {
                #body
            }
        })
    }

    /// One guarded `close()` call per closable service, in ordinal order
    fn closers(&self) -> Vec<TokenStream> {
        let mut closers = Vec::new();
        let mut push = |service: &Service, field: TokenStream| {
            if service.has_closer {
                let bit = bit(service);
                closers.push(quote! {
                    if self.init.is_set(#bit) {
                        if let Some(s) = &#field {
                            let _ = s.close();
                        }
                    }
                });
            }
        };

        for service in &self.model.services {
            let name = ident(&service.name);
            push(service, quote! { self.#name });
        }
        for container in &self.model.containers {
            let sub = ident(&container.name);
            for service in &container.services {
                let name = ident(&service.name);
                push(service, quote! { self.#sub.#name });
            }
        }
        closers
    }

    fn view(&self, container: &SubContainer) -> Result<TokenStream, EmitErrorKind> {
        let view = ident(&container.ty);
        let getters = container
            .services
            .iter()
            .map(|service| self.getter(service, &Slot::of(service, Some(container))))
            .collect::<Result<Vec<_>, _>>()?;
        let setters = container
            .services
            .iter()
            .filter(|service| service.emits_setter())
            .map(|service| setter(service, &Slot::of(service, Some(container))));

        Ok(quote! {
            pub struct #view<'a> {
                c: &'a mut Container,
            }

            impl #view<'_> {
                #(#getters)*

                #(#setters)*
            }
        })
    }

    /// Trait impls forwarding to the inherent methods, so factories only depend on `lookup`
    fn lookup_impls(&self) -> TokenStream {
        let error = &self.options.error;
        let ctx = &self.options.context;
        let forward = |owner: &syn::Ident, service: &Service| {
            let name = ident(&service.name);
            let ty = &service.ty;
            quote! {
                fn #name(&mut self, ctx: &#ctx) -> Option<#ty> {
                    #owner::#name(self, ctx)
                }
            }
        };

        let root = ident(&self.model.name);
        let getters = self.model.services.iter().map(|service| forward(&root, service));
        let accessors = self.model.containers.iter().map(|container| {
            let name = ident(&container.name);
            let view = ident(&container.ty);
            quote! {
                fn #name(&mut self) -> Box<dyn super::lookup::#view + '_> {
                    Box::new(#root::#name(self))
                }
            }
        });
        let views = self.model.containers.iter().map(|container| {
            let view = ident(&container.ty);
            let getters = container.services.iter().map(|service| forward(&view, service));
            quote! {
                impl super::lookup::#view for #view<'_> {
                    #(#getters)*
                }
            }
        });

        quote! {
            impl super::lookup::Container for #root {
                fn set_error(&mut self, err: #error) {
                    #root::set_error(self, err);
                }

                #(#getters)*

                #(#accessors)*
            }

            #(#views)*
        }
    }
}

fn setter(service: &Service, slot: &Slot) -> TokenStream {
    let setter = ident(&service.setter());
    let ty = &service.ty;
    let Slot { root, field } = slot;
    let bit = bit(service);

    quote! {
        pub fn #setter(&mut self, s: #ty) {
            #field = Some(s);
            #root.init.set(#bit);
        }
    }
}
