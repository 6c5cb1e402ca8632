use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, ToTokens, TokenStreamExt as _};
use std::collections::{BTreeMap, BTreeSet};

use super::Import;

const BASIC_TYPES: &[&str] = &[
    "String", "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32", "f64",
];

/// Recursive description of a service type as written in the declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Path qualifier as written, e.g. `repo` in `repo::Users` or `std::sync` in `std::sync::Arc<T>`
    pub package: Option<String>,
    pub name: String,
    pub args: Vec<TypeDescriptor>,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Plain,
    /// `Box<T>`, `Arc<T>` or `Rc<T>`
    Pointer,
    /// `Vec<T>`
    Slice,
    /// `HashMap<K, V>` or `BTreeMap<K, V>`
    Map,
    /// `dyn Trait + markers`
    Dyn { markers: Vec<Marker> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Trait(TypeDescriptor),
    /// Lifetime with its leading apostrophe, e.g. `'static`
    Lifetime(String),
}

const WELL_KNOWN: &[(&str, WellKnown)] = &[
    ("std::time::Instant", WellKnown::Instant),
    ("std::time::SystemTime", WellKnown::Instant),
    ("tokio::time::Instant", WellKnown::Instant),
    ("std::time::Duration", WellKnown::Duration),
    ("core::time::Duration", WellKnown::Duration),
    ("tokio::time::Duration", WellKnown::Duration),
    ("chrono::Duration", WellKnown::Duration),
    ("chrono::TimeDelta", WellKnown::Duration),
    ("url::Url", WellKnown::Url),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    Instant,
    Duration,
    Url,
}

impl TypeDescriptor {
    #[must_use]
    pub fn plain(package: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            package: package.map(str::to_owned),
            name: name.into(),
            args: Vec::new(),
            shape: Shape::Plain,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        self.shape == Shape::Pointer
    }

    #[inline]
    #[must_use]
    pub fn is_slice(&self) -> bool {
        self.shape == Shape::Slice
    }

    #[inline]
    #[must_use]
    pub fn is_dyn(&self) -> bool {
        matches!(self.shape, Shape::Dyn { .. })
    }

    /// Key type of a keyed mapping
    #[must_use]
    pub fn key(&self) -> Option<&TypeDescriptor> {
        match self.shape {
            Shape::Map => self.args.first(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_basic(&self) -> bool {
        self.shape == Shape::Plain && self.package.is_none() && self.args.is_empty() && BASIC_TYPES.contains(&self.name.as_str())
    }

    /// Well-known type this one resolves to through `imports`. Only the std, tokio, chrono and url paths count,
    /// so a crate's own `Duration` is not mistaken for the std one.
    #[must_use]
    pub fn well_known(&self, imports: &BTreeMap<String, Import>) -> Option<WellKnown> {
        if self.shape != Shape::Plain || !self.args.is_empty() {
            return None;
        }
        let qualified = self.qualified(imports);
        let package = qualified.package.as_deref()?.trim_start_matches("::");
        let path = format!("{package}::{}", qualified.name);

        WELL_KNOWN
            .iter()
            .find(|(known, _)| *known == path)
            .map(|(_, well_known)| *well_known)
    }

    /// Whether a cached value of this type is handed out by copy instead of `clone()`
    #[must_use]
    pub fn is_copy(&self, imports: &BTreeMap<String, Import>) -> bool {
        if self.is_basic() {
            return self.name != "String";
        }
        matches!(self.well_known(imports), Some(WellKnown::Instant | WellKnown::Duration))
    }

    /// `Error`, `anyhow::Error` or `Box<dyn Error>`: the conventional error slot, never a service
    #[must_use]
    pub fn is_error_slot(&self) -> bool {
        match self.shape {
            Shape::Plain => self.name == "Error" && self.args.is_empty(),
            Shape::Pointer => self.args.first().is_some_and(|inner| inner.is_dyn() && inner.name == "Error"),
            _ => false,
        }
    }

    /// Collects the first path segment of every type mentioned, which is what imports are keyed by
    pub fn collect_aliases(&self, out: &mut BTreeSet<String>) {
        match &self.package {
            Some(package) => {
                if let Some(head) = package.split("::").next().filter(|head| !head.is_empty()) {
                    out.insert(head.to_owned());
                }
            }
            None => {
                out.insert(self.name.clone());
            }
        }
        for arg in &self.args {
            arg.collect_aliases(out);
        }
        if let Shape::Dyn { markers } = &self.shape {
            for marker in markers {
                if let Marker::Trait(ty) = marker {
                    ty.collect_aliases(out);
                }
            }
        }
    }

    /// Same type with every import alias replaced by its full path.
    /// Used where the declaration imports are not in scope.
    #[must_use]
    pub fn qualified(&self, imports: &BTreeMap<String, Import>) -> Self {
        let (package, name) = match &self.package {
            Some(package) => {
                let (head, tail) = match package.split_once("::") {
                    Some((head, tail)) => (head, Some(tail)),
                    None => (package.as_str(), None),
                };
                match imports.get(head) {
                    Some(import) => {
                        let package = match tail {
                            Some(tail) => format!("{}::{tail}", import.path),
                            None => import.path.clone(),
                        };
                        (Some(package), self.name.clone())
                    }
                    None => (Some(package.clone()), self.name.clone()),
                }
            }
            None => match imports.get(&self.name).and_then(|import| import.path.rsplit_once("::")) {
                Some((package, name)) => (Some(package.to_owned()), name.to_owned()),
                None => (None, self.name.clone()),
            },
        };

        let shape = match &self.shape {
            Shape::Dyn { markers } => Shape::Dyn {
                markers: markers
                    .iter()
                    .map(|marker| match marker {
                        Marker::Trait(ty) => Marker::Trait(ty.qualified(imports)),
                        Marker::Lifetime(lifetime) => Marker::Lifetime(lifetime.clone()),
                    })
                    .collect(),
            },
            shape => shape.clone(),
        };

        Self {
            package,
            name,
            args: self.args.iter().map(|arg| arg.qualified(imports)).collect(),
            shape,
        }
    }
}

/// Tokens of a `::`-separated path, keeping a leading `::` and raw identifiers
pub(crate) fn path_tokens(package: Option<&str>, name: &str) -> TokenStream {
    let mut tokens = TokenStream::new();
    let segments = package.into_iter().flat_map(|package| package.split("::")).chain([name]);
    for (i, segment) in segments.enumerate() {
        if segment.is_empty() {
            // leading `::`
            tokens.extend(quote! { :: });
            continue;
        }
        if i > 0 && !tokens.is_empty() && !ends_with_colons(&tokens) {
            tokens.extend(quote! { :: });
        }
        tokens.append(ident(segment));
    }
    tokens
}

fn ends_with_colons(tokens: &TokenStream) -> bool {
    matches!(tokens.clone().into_iter().last(), Some(proc_macro2::TokenTree::Punct(punct)) if punct.as_char() == ':')
}

pub(crate) fn ident(name: &str) -> Ident {
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => Ident::new(name, Span::call_site()),
    }
}

impl ToTokens for TypeDescriptor {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let path = path_tokens(self.package.as_deref(), &self.name);
        let generics = if self.args.is_empty() {
            quote! {}
        } else {
            let args = &self.args;
            quote! { <#(#args),*> }
        };

        match &self.shape {
            Shape::Dyn { markers } => tokens.extend(quote! { dyn #path #generics #(+ #markers)* }),
            _ => tokens.extend(quote! { #path #generics }),
        }
    }
}

impl ToTokens for Marker {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match self {
            Marker::Trait(ty) => ty.to_tokens(tokens),
            Marker::Lifetime(lifetime) => syn::Lifetime::new(lifetime, Span::call_site()).to_tokens(tokens),
        }
    }
}
