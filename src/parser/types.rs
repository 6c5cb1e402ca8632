use quote::ToTokens as _;
use syn::{GenericArgument, Path, PathArguments, TraitBound, TraitBoundModifier, Type, TypeParamBound, TypePath, TypeTraitObject};

use crate::{
    errors::ParseErrorKind,
    model::{Marker, Shape, TypeDescriptor},
};

/// Converts a field type into a [`TypeDescriptor`], rejecting the forms the generated code can't hold
pub(super) fn descriptor(field: &str, ty: &Type) -> Result<TypeDescriptor, ParseErrorKind> {
    match ty {
        Type::Paren(paren) => descriptor(field, &paren.elem),
        Type::Group(group) => descriptor(field, &group.elem),
        Type::Path(TypePath { qself: Some(_), .. }) => Err(ParseErrorKind::unexpected_type(field, "qualified self type")),
        Type::Path(TypePath { qself: None, path }) => from_path(field, path),
        Type::TraitObject(object) => from_trait_object(field, object),
        Type::Array(_) => Err(ParseErrorKind::not_supported(field, "fixed-length array")),
        Type::Reference(_) => Err(ParseErrorKind::not_supported(field, "reference")),
        Type::Ptr(_) => Err(ParseErrorKind::not_supported(field, "raw pointer")),
        Type::Slice(_) => Err(ParseErrorKind::not_supported(field, "unsized slice")),
        ty => Err(ParseErrorKind::unexpected_type(field, ty.to_token_stream().to_string())),
    }
}

fn from_path(field: &str, path: &Path) -> Result<TypeDescriptor, ParseErrorKind> {
    let segments = path.segments.iter().collect::<Vec<_>>();
    let Some((last, qualifier)) = segments.split_last() else {
        return Err(ParseErrorKind::unexpected_type(field, "empty path"));
    };

    let mut package = Vec::with_capacity(qualifier.len() + 1);
    if path.leading_colon.is_some() {
        if qualifier.is_empty() {
            return Err(ParseErrorKind::unexpected_type(field, "path without module"));
        }
        package.push(String::new());
    }
    for segment in qualifier {
        if !segment.arguments.is_none() {
            return Err(ParseErrorKind::unexpected_type(field, "generic arguments inside a module path"));
        }
        package.push(segment.ident.to_string());
    }

    let args = match &last.arguments {
        PathArguments::None => Vec::new(),
        PathArguments::AngleBracketed(generics) => generics
            .args
            .iter()
            .map(|arg| match arg {
                GenericArgument::Type(ty) => descriptor(field, ty),
                arg => Err(ParseErrorKind::unexpected_type(
                    field,
                    format!("generic argument `{}`", arg.to_token_stream()),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        PathArguments::Parenthesized(_) => return Err(ParseErrorKind::unexpected_type(field, "parenthesized arguments")),
    };

    let name = last.ident.to_string();
    let shape = match (name.as_str(), args.as_slice()) {
        ("Box" | "Arc" | "Rc", [inner]) => {
            if inner.is_pointer() {
                return Err(ParseErrorKind::not_supported(field, "double indirection"));
            }
            Shape::Pointer
        }
        ("Vec", [_]) => Shape::Slice,
        ("HashMap" | "BTreeMap", [_, _]) => Shape::Map,
        _ => Shape::Plain,
    };

    Ok(TypeDescriptor {
        package: if package.is_empty() { None } else { Some(package.join("::")) },
        name,
        args,
        shape,
    })
}

fn from_trait_object(field: &str, object: &TypeTraitObject) -> Result<TypeDescriptor, ParseErrorKind> {
    let mut principal = None;
    let mut markers = Vec::new();

    for bound in &object.bounds {
        match bound {
            TypeParamBound::Trait(TraitBound {
                paren_token: None,
                modifier: TraitBoundModifier::None,
                lifetimes: None,
                path,
            }) => {
                let ty = from_path(field, path)?;
                if principal.is_none() {
                    principal = Some(ty);
                } else {
                    markers.push(Marker::Trait(ty));
                }
            }
            TypeParamBound::Lifetime(lifetime) => markers.push(Marker::Lifetime(lifetime.to_string())),
            bound => {
                return Err(ParseErrorKind::unexpected_type(
                    field,
                    format!("trait object bound `{}`", bound.to_token_stream()),
                ))
            }
        }
    }

    let Some(principal) = principal else {
        return Err(ParseErrorKind::unexpected_type(field, "trait object without a trait"));
    };

    Ok(TypeDescriptor {
        shape: Shape::Dyn { markers },
        ..principal
    })
}
