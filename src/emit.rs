mod factories;
mod internal;
mod lookup;
mod public;
mod skeleton;

pub use factories::DEFAULT_LOOKUP;
pub use skeleton::{declaration, readme};

use proc_macro2::{Literal, TokenStream};
use quote::quote;
use syn::LitStr;

use crate::{
    config::{Callable, Options},
    errors::EmitErrorKind,
    model::{ident, path_tokens, RootContainer, Service},
    sink::HEADING,
};

/// Version stamp written into the heading of generated files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub built: &'static str,
}

impl BuildInfo {
    pub const CURRENT: Self = Self {
        version: env!("CARGO_PKG_VERSION"),
        built: env!("DIGEN_BUILD_TIME"),
    };
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Renders the files of one assembled container.
///
/// Every method is a pure function of the model, the options and the build stamp, so reruns produce identical bytes.
pub struct Emitter<'a> {
    model: &'a RootContainer,
    options: &'a Options,
    build: BuildInfo,
}

impl<'a> Emitter<'a> {
    #[inline]
    #[must_use]
    pub const fn new(model: &'a RootContainer, options: &'a Options, build: BuildInfo) -> Self {
        Self { model, options, build }
    }

    #[must_use]
    pub fn heading(&self) -> String {
        format!(
            "{HEADING}\n// digen v{version} (built {built})\n\n",
            version = self.build.version,
            built = self.build.built,
        )
    }

    /// Heading followed by the formatted tokens
    fn generated(&self, tokens: TokenStream) -> Result<Vec<u8>, EmitErrorKind> {
        let mut out = self.heading();
        out.push_str(&format(tokens)?);
        Ok(out.into_bytes())
    }

    /// `use` items of every declaration import, sorted by alias
    fn imports(&self) -> TokenStream {
        self.imports_of(|_| true)
    }

    fn imports_of(&self, filter: impl Fn(&str) -> bool) -> TokenStream {
        let items = self.model.imports.values().filter(|import| filter(&import.id)).map(|import| {
            let path = match import.path.rsplit_once("::") {
                Some((package, name)) => path_tokens(Some(package), name),
                None => path_tokens(None, &import.path),
            };
            match &import.name {
                Some(alias) => {
                    let alias = ident(alias);
                    quote! { use #path as #alias; }
                }
                None => quote! { use #path; },
            }
        });
        quote! { #(#items)* }
    }

    /// Function the container calls to build a service
    fn factory_path(&self, service: &Service) -> Result<TokenStream, EmitErrorKind> {
        let function = ident(&service.factory_fn());
        match &service.factory_package {
            Some(package) => {
                let package = syn::parse_str::<syn::Path>(package)?;
                Ok(quote! { #package::#function })
            }
            None => Ok(quote! { super::factories::#function }),
        }
    }

    /// Whether the factory of a service returns `Result`. Missing factories get a stub shaped by the config.
    fn returns_error(&self, service: &Service) -> bool {
        self.model
            .factory(service)
            .map_or(self.options.return_error, |factory| factory.returns_error)
    }

    fn new_error(&self, message: TokenStream) -> TokenStream {
        let Callable { path, is_macro } = &self.options.new;
        if *is_macro {
            quote! { #path!("{}", #message) }
        } else {
            quote! { #path(#message) }
        }
    }

    fn join_errors(&self, prev: TokenStream, next: TokenStream) -> TokenStream {
        let Callable { path, is_macro } = &self.options.join;
        if *is_macro {
            quote! { #path!(#prev, #next) }
        } else {
            quote! { #path(#prev, #next) }
        }
    }

    fn wrap_error(&self, err: TokenStream, message: &str) -> TokenStream {
        let Callable { path, is_macro } = &self.options.wrap;
        if *is_macro {
            let format = LitStr::new(&format!("{message}: {}", self.options.verb), proc_macro2::Span::call_site());
            quote! { #path!(#format, #err) }
        } else {
            quote! { #path(#err.into(), #message) }
        }
    }
}

/// Parses generated tokens back and pretty-prints them
pub(crate) fn format(tokens: TokenStream) -> Result<String, EmitErrorKind> {
    let file = syn::parse2::<syn::File>(tokens)?;
    Ok(prettyplease::unparse(&file))
}

#[inline]
fn bit(service: &Service) -> Literal {
    Literal::usize_unsuffixed(service.id)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{BuildInfo, Emitter};
    use crate::{
        assemble,
        config::{Config, Options},
        model::{Factory, RootContainer},
        parse_source,
        sink::HEADING,
    };

    use std::collections::BTreeMap;

    pub(crate) const DECLARATION: &str = r#"
        use std::sync::Arc;

        use crate::config::Config;
        use crate::http::{self, Router, Server as HttpServer};
        use crate::repo;

        pub struct Container {
            #[di(required)]
            config: Config,
            #[di(public, close)]
            server: Arc<HttpServer>,
            #[di(public, public_name = "api_router")]
            router: Arc<Router>,
            #[di(set)]
            entity_repo: Arc<dyn repo::EntityRepo + Send + Sync>,
            #[di(external, public)]
            external: Arc<http::Client>,
            port: u16,

            repositories: Repositories,
        }

        pub struct Repositories {
            #[di(required)]
            db: Arc<repo::Db>,
            #[di(public, close)]
            users: Arc<dyn repo::Users>,
        }
    "#;

    pub(crate) const BUILD: BuildInfo = BuildInfo {
        version: "0.1.0",
        built: "2024-01-01T00:00:00Z",
    };

    pub(crate) fn model() -> RootContainer {
        let factories = BTreeMap::from([
            (
                "server".to_owned(),
                Factory {
                    name: "create_server".to_owned(),
                    returns_error: true,
                },
            ),
            (
                "port".to_owned(),
                Factory {
                    name: "create_port".to_owned(),
                    returns_error: false,
                },
            ),
        ]);
        assemble(parse_source("di", DECLARATION).unwrap(), factories).unwrap()
    }

    pub(crate) fn options() -> Options {
        Config::new("src/di").options().unwrap()
    }

    /// Output without whitespace, so assertions don't depend on line breaks
    pub(crate) fn compact(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap().split_whitespace().collect()
    }

    #[test]
    fn test_heading() {
        let model = model();
        let options = options();
        let heading = Emitter::new(&model, &options, BUILD).heading();

        let mut lines = heading.lines();
        assert_eq!(lines.next(), Some(HEADING));
        assert_eq!(lines.next(), Some("// digen v0.1.0 (built 2024-01-01T00:00:00Z)"));
    }

    #[test]
    fn test_error_expressions() {
        let model = model();
        let mut options = options();
        let emitter = Emitter::new(&model, &options, BUILD);

        let wrap = emitter.wrap_error(quote::quote!(err), "create Server").to_string();
        assert_eq!(wrap.replace(' ', ""), "anyhow::Error::context(err.into(),\"createServer\")");

        let mut config = Config::new("src/di");
        config.error_handling.wrap.package = "anyhow".to_owned();
        config.error_handling.wrap.function = "anyhow!".to_owned();
        config.error_handling.new.function = "anyhow!".to_owned();
        config.error_handling.new.package = "anyhow".to_owned();
        options = config.options().unwrap();
        let emitter = Emitter::new(&model, &options, BUILD);

        let wrap = emitter.wrap_error(quote::quote!(err), "create Server").to_string();
        assert_eq!(wrap.replace(' ', ""), "anyhow::anyhow!(\"createServer:{:#}\",err)");
        let new = emitter.new_error(quote::quote!(message)).to_string();
        assert_eq!(new.replace(' ', ""), "anyhow::anyhow!(\"{}\",message)");
    }
}
