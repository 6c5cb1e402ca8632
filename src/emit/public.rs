use proc_macro2::TokenStream;
use quote::quote;
use syn::LitStr;

use super::Emitter;
use crate::{
    errors::EmitErrorKind,
    model::{ident, Service, SubContainer},
};

impl Emitter<'_> {
    /// `mod.rs` of the container directory: the locked, error-returning surface the application uses
    pub fn public(&self) -> Result<Vec<u8>, EmitErrorKind> {
        let model = self.model;
        let error = &self.options.error;
        let imports = self.imports();

        let mut args = Vec::new();
        let mut required = Vec::new();
        let mut getters = Vec::new();
        let mut setters = Vec::new();

        let scoped = model
            .services
            .iter()
            .map(|service| (service, None))
            .chain(model.containers.iter().flat_map(|container| {
                container.services.iter().map(move |service| (service, Some(container)))
            }));
        for (service, container) in scoped {
            let internal = internal_path(container);
            if service.is_required {
                let arg = ident(&service.qualified_name());
                let setter = ident(&service.setter());
                let ty = &service.ty;
                args.push(quote! { #arg: #ty });
                required.push(quote! { __inner #internal.#setter(#arg); });
            }
            if service.is_public {
                getters.push(self.public_getter(service, &internal));
            }
            if service.has_setter {
                setters.push(public_setter(service, &internal));
            }
        }

        let new_error = self.new_error(quote! { message });
        let join_errors = self.join_errors(quote! { prev }, quote! { next });

        let tokens = quote! {
            #![allow(unused_imports, unused_mut, dead_code, clippy::all)]

            pub(crate) mod internal;

            #imports

            /// Runs once on construction, e.g. to set a service through one of the `set_*` functions
            pub type Injector = Box<dyn FnOnce(&Container) -> Result<(), #error>>;

            pub struct Container {
                c: parking_lot::Mutex<internal::Container>,
            }

            impl Container {
                pub fn new(#(#args,)* injectors: impl IntoIterator<Item = Injector>) -> Result<Self, #error> {
                    let mut __inner = internal::Container::new();
                    #(#required)*

                    let __container = Self {
                        c: parking_lot::Mutex::new(__inner),
                    };
                    for __inject in injectors {
                        __inject(&__container)?;
                    }
                    Ok(__container)
                }

                #(#getters)*

                #(#setters)*

                /// Closes every initialized service that has a closer
                pub fn close(&self) {
                    self.c.lock().close();
                }
            }

            /// Turns the outcome of an internal getter into a result, taking the stored error so the next call retries
            fn resolve<T>(
                c: &mut internal::Container,
                value: std::thread::Result<Option<T>>,
                name: &str,
            ) -> Result<T, #error> {
                match value {
                    Ok(value) => match (c.take_error(), value) {
                        (Some(err), _) => Err(err),
                        (None, Some(value)) => Ok(value),
                        (None, None) => Err(new_error(format!("{name} is not initialized"))),
                    },
                    Err(panic) => {
                        let err = new_error(format!("panic: {}", panic_message(&*panic)));
                        match c.take_error() {
                            Some(prev) => Err(join_errors(prev, err)),
                            None => Err(err),
                        }
                    }
                }
            }

            fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
                if let Some(message) = panic.downcast_ref::<&str>() {
                    (*message).to_owned()
                } else if let Some(message) = panic.downcast_ref::<String>() {
                    message.clone()
                } else {
                    "unknown panic".to_owned()
                }
            }

            fn new_error(message: String) -> #error {
                #new_error
            }

            fn join_errors(prev: #error, next: #error) -> #error {
                #join_errors
            }
        };

        self.generated(tokens)
    }

    fn public_getter(&self, service: &Service, internal: &TokenStream) -> TokenStream {
        let getter = ident(service.public_getter());
        let name = ident(&service.name);
        let ty = &service.ty;
        let ctx = &self.options.context;
        let error = &self.options.error;
        let title = LitStr::new(&service.title(), proc_macro2::Span::call_site());

        quote! {
            pub fn #getter(&self, ctx: &#ctx) -> Result<#ty, #error> {
                let mut c = self.c.lock();
                let value = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c #internal.#name(ctx)));
                resolve(&mut c, value, #title)
            }
        }
    }
}

/// Accessor chain from the internal root to the service's owner: empty for root services, `.sub()` for nested ones
fn internal_path(container: Option<&SubContainer>) -> TokenStream {
    match container {
        Some(container) => {
            let sub = ident(&container.name);
            quote! { .#sub() }
        }
        None => quote! {},
    }
}

fn public_setter(service: &Service, internal: &TokenStream) -> TokenStream {
    let setter = ident(&service.setter());
    let ty = &service.ty;

    quote! {
        pub fn #setter(s: #ty) -> Injector {
            Box::new(move |container: &Container| {
                container.c.lock() #internal.#setter(s);
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{
            tests::{compact, model, options, BUILD},
            Emitter,
        },
        internal_path,
    };
    use crate::{
        assemble,
        model::{Service, SubContainer},
        parse_source,
    };

    use std::collections::BTreeMap;
    use syn::{parse_quote, ImplItemFn};

    fn public() -> String {
        let model = model();
        let options = options();
        let out = Emitter::new(&model, &options, BUILD).public().unwrap();
        syn::parse_file(std::str::from_utf8(&out).unwrap()).unwrap();
        compact(&out)
    }

    #[test]
    fn test_constructor_takes_required_services() {
        let out = public();

        assert!(out.contains("pub(crate)modinternal;"));
        assert!(out.contains(
            "pubfnnew(config:Config,repositories_db:Arc<repo::Db>,injectors:implIntoIterator<Item=Injector>,)->Result<Self,anyhow::Error>"
        ) || out.contains(
            "pubfnnew(config:Config,repositories_db:Arc<repo::Db>,injectors:implIntoIterator<Item=Injector>)->Result<Self,anyhow::Error>"
        ));
        assert!(out.contains(
            "letmut__inner=internal::Container::new();__inner.set_config(config);__inner.repositories().set_db(repositories_db);"
        ));
        assert!(out.contains("for__injectininjectors{__inject(&__container)?;}"));
    }

    #[test]
    fn test_required_names_do_not_shadow_locals() {
        let declaration = r"
            pub struct Container {
                #[di(required)]
                c: u8,
                #[di(required)]
                container: u16,
            }
        ";
        let model = assemble(parse_source("di", declaration).unwrap(), BTreeMap::new()).unwrap();
        let options = options();
        let out = compact(&Emitter::new(&model, &options, BUILD).public().unwrap());

        assert!(out.contains("__inner.set_c(c);__inner.set_container(container);"));
        assert!(out.contains("letmut__inner=internal::Container::new();"));
        assert!(out.contains("__inject(&__container)?;"));
        assert!(out.contains("Ok(__container)"));
    }

    #[test]
    fn test_public_getters() {
        let model = model();
        let options = options();
        let emitter = Emitter::new(&model, &options, BUILD);
        let getter = |service: &Service, container: Option<&SubContainer>| {
            syn::parse2::<ImplItemFn>(emitter.public_getter(service, &internal_path(container))).unwrap()
        };

        let expected: ImplItemFn = parse_quote! {
            pub fn server(&self, ctx: &tokio_util::sync::CancellationToken) -> Result<Arc<HttpServer>, anyhow::Error> {
                let mut c = self.c.lock();
                let value = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.server(ctx)));
                resolve(&mut c, value, "Server")
            }
        };
        assert_eq!(getter(&model.services[1], None), expected);

        let expected: ImplItemFn = parse_quote! {
            pub fn api_router(&self, ctx: &tokio_util::sync::CancellationToken) -> Result<Arc<Router>, anyhow::Error> {
                let mut c = self.c.lock();
                let value = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.router(ctx)));
                resolve(&mut c, value, "Router")
            }
        };
        assert_eq!(getter(&model.services[2], None), expected);

        let repositories = &model.containers[0];
        let expected: ImplItemFn = parse_quote! {
            pub fn users(&self, ctx: &tokio_util::sync::CancellationToken) -> Result<Arc<dyn repo::Users>, anyhow::Error> {
                let mut c = self.c.lock();
                let value = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.repositories().users(ctx)));
                resolve(&mut c, value, "Users")
            }
        };
        assert_eq!(getter(&repositories.services[1], Some(repositories)), expected);

        let out = public();
        assert!(out.contains("pubfnapi_router(&self,"));
        assert!(!out.contains("pubfnrouter(&self"));
        assert!(!out.contains("pubfnport(&self"));
        assert!(!out.contains("pubfnconfig(&self"));
    }

    #[test]
    fn test_public_setters_return_injectors() {
        let out = public();

        assert!(out.contains(
            "pubfnset_external(s:Arc<http::Client>)->Injector{Box::new(move|container:&Container|{container.c.lock().set_external(s);Ok(())})}"
        ));
        assert!(out.contains("pubfnset_entity_repo(s:Arc<dynrepo::EntityRepo+Send+Sync>)->Injector"));
        assert!(!out.contains("pubfnset_config("));
    }

    #[test]
    fn test_errors_resolution() {
        let out = public();

        assert!(out.contains("(None,None)=>Err(new_error(format!(\"{name}isnotinitialized\"))),"));
        assert!(out.contains("Some(prev)=>Err(join_errors(prev,err)),"));
        assert!(out.contains("fnnew_error(message:String)->anyhow::Error{anyhow::Error::msg(message)}"));
        assert!(out.contains("fnjoin_errors(prev:anyhow::Error,next:anyhow::Error)->anyhow::Error{anyhow::Error::context(prev,next)}"));
        assert!(out.contains("pubfnclose(&self){self.c.lock().close();}"));
    }
}
