use core::any;
use quote::ToTokens;
use syn::{
    parse::{Parse, ParseStream},
    Attribute, Expr, ExprLit, Lit, LitStr, Meta, MetaNameValue, Token,
};
use tracing::warn;

use crate::errors::ParseErrorKind;

pub(crate) mod kw {
    syn::custom_keyword!(set);
    syn::custom_keyword!(close);
    syn::custom_keyword!(required);
    syn::custom_keyword!(public);
    syn::custom_keyword!(external);
    syn::custom_keyword!(public_name);
    syn::custom_keyword!(factory_file);
    syn::custom_keyword!(factory_pkg);
}

const ATTR: &str = "di";
const DOC_PREFIX: &str = "di:";
const FACTORY_FILE_EXTENSION: &str = ".rs";

/// Options of one service field, merged from `/// di:` doc comments and `#[di(...)]` attributes
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldOptions {
    pub(crate) has_setter: bool,
    pub(crate) has_closer: bool,
    pub(crate) is_required: bool,
    pub(crate) is_public: bool,
    pub(crate) is_external: bool,
    pub(crate) public_name: Option<String>,
    pub(crate) factory_file: Option<String>,
    pub(crate) factory_pkg: Option<String>,
}

impl FieldOptions {
    /// Doc comments are applied first, the attribute overrides them
    pub(crate) fn parse(field: &str, attrs: &[Attribute]) -> Result<Self, ParseErrorKind> {
        let mut options = Self::default();

        for doc in doc_lines(attrs) {
            if let Some(value) = doc.trim().strip_prefix(DOC_PREFIX) {
                options.apply_doc(field, value.trim());
            }
        }

        if let Some(args) = parse_attrs::<DiArgs>(ATTR, attrs) {
            let args = args.map_err(|(err, _)| ParseErrorKind::from(err))?;
            options.apply_args(args);
        }

        if let Some(file) = &mut options.factory_file {
            if !file.ends_with(FACTORY_FILE_EXTENSION) {
                file.push_str(FACTORY_FILE_EXTENSION);
            }
        }

        Ok(options)
    }

    fn apply_doc(&mut self, field: &str, value: &str) {
        match value.split_once(':') {
            Some(("public_name", name)) => self.public_name = Some(name.trim().to_owned()),
            Some(("factory_file", file)) => self.factory_file = Some(file.trim().to_owned()),
            Some(("factory_pkg", pkg)) => self.factory_pkg = Some(pkg.trim().to_owned()),
            Some((key, _)) => warn!(field, key, "Unknown `di:` option ignored"),
            None => {
                for flag in value.split(',').map(str::trim).filter(|flag| !flag.is_empty()) {
                    match flag {
                        "set" => self.has_setter = true,
                        "close" => self.has_closer = true,
                        "required" => self.is_required = true,
                        "public" => self.is_public = true,
                        "external" => self.is_external = true,
                        key => warn!(field, key, "Unknown `di:` flag ignored"),
                    }
                }
            }
        }
    }

    fn apply_args(&mut self, args: DiArgs) {
        self.has_setter |= args.set;
        self.has_closer |= args.close;
        self.is_required |= args.required;
        self.is_public |= args.public;
        self.is_external |= args.external;
        if let Some((_, name)) = args.public_name {
            self.public_name = Some(name.value());
        }
        if let Some((_, file)) = args.factory_file {
            self.factory_file = Some(file.value());
        }
        if let Some((_, pkg)) = args.factory_pkg {
            self.factory_pkg = Some(pkg.value());
        }
    }
}

fn doc_lines(attrs: &[Attribute]) -> impl Iterator<Item = String> + '_ {
    attrs.iter().filter_map(|attr| match &attr.meta {
        Meta::NameValue(MetaNameValue {
            path,
            value: Expr::Lit(ExprLit { lit: Lit::Str(doc), .. }),
            ..
        }) if path.is_ident("doc") => Some(doc.value()),
        _ => None,
    })
}

#[derive(Default)]
struct DiArgs {
    set: bool,
    close: bool,
    required: bool,
    public: bool,
    external: bool,
    public_name: Option<(kw::public_name, LitStr)>,
    factory_file: Option<(kw::factory_file, LitStr)>,
    factory_pkg: Option<(kw::factory_pkg, LitStr)>,
}

impl Parse for DiArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();

        while !input.is_empty() {
            let lh = input.lookahead1();
            if lh.peek(kw::public_name) {
                parse_assignment_attribute(input, &mut args.public_name)?;
            } else if lh.peek(kw::factory_file) {
                parse_assignment_attribute(input, &mut args.factory_file)?;
            } else if lh.peek(kw::factory_pkg) {
                parse_assignment_attribute(input, &mut args.factory_pkg)?;
            } else if lh.peek(kw::set) {
                input.parse::<kw::set>()?;
                args.set = true;
            } else if lh.peek(kw::close) {
                input.parse::<kw::close>()?;
                args.close = true;
            } else if lh.peek(kw::required) {
                input.parse::<kw::required>()?;
                args.required = true;
            } else if lh.peek(kw::public) {
                input.parse::<kw::public>()?;
                args.public = true;
            } else if lh.peek(kw::external) {
                input.parse::<kw::external>()?;
                args.external = true;
            } else {
                return Err(lh.error());
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

impl Combine for DiArgs {
    fn combine(mut self, other: Self) -> syn::Result<Self> {
        self.set |= other.set;
        self.close |= other.close;
        self.required |= other.required;
        self.public |= other.public;
        self.external |= other.external;
        combine_attribute(&mut self.public_name, other.public_name)?;
        combine_attribute(&mut self.factory_file, other.factory_file)?;
        combine_attribute(&mut self.factory_pkg, other.factory_pkg)?;
        Ok(self)
    }
}

trait Combine: Sized {
    fn combine(self, other: Self) -> syn::Result<Self>;
}

fn parse_assignment_attribute<K, T>(input: ParseStream<'_>, out: &mut Option<(K, T)>) -> syn::Result<()>
where
    K: Parse + ToTokens,
    T: Parse,
{
    let kw = input.parse()?;
    input.parse::<Token![=]>()?;
    let inner = input.parse()?;

    if out.is_some() {
        return Err(specified_more_than_once::<K>(kw));
    }

    *out = Some((kw, inner));

    Ok(())
}

fn parse_attrs<T>(ident: &str, attrs: &[Attribute]) -> Option<Result<T, (syn::Error, Attribute)>>
where
    T: Combine + Parse,
{
    let mut iter = attrs
        .iter()
        .filter(|attr| attr.meta.path().is_ident(ident))
        .map(|attr| (attr, attr.parse_args::<T>()));

    let first = match iter.next() {
        Some((_, Ok(first))) => first,
        Some((attr, Err(err))) => return Some(Err((err, attr.clone()))),
        None => return None,
    };

    let result = iter.try_fold(first, |out, (attr, next_result)| match next_result {
        Ok(next) => out.combine(next).map_err(|err| (err, attr.clone())),
        Err(err) => Err((err, attr.clone())),
    });

    Some(result)
}

fn combine_attribute<K, T>(a: &mut Option<(K, T)>, b: Option<(K, T)>) -> syn::Result<()>
where
    K: ToTokens,
{
    if let Some((kw, inner)) = b {
        if a.is_some() {
            return Err(specified_more_than_once::<K>(kw));
        }
        *a = Some((kw, inner));
    }
    Ok(())
}

fn specified_more_than_once<K: ToTokens>(kw: K) -> syn::Error {
    let kw_name = any::type_name::<K>().rsplit("::").next().unwrap_or_default();
    syn::Error::new_spanned(kw, ["`", kw_name, "` specified more than once"].concat())
}
