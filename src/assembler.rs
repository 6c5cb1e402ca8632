use convert_case::{Case, Casing as _};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::{
    errors::ParseErrorKind,
    model::{Factory, RootContainer, Service},
};

/// Methods and fields of the generated containers a service can't be named after
const RESERVED_NAMES: &[&str] = &["new", "error", "take_error", "set_error", "close", "err", "init"];

/// Parameter of the public constructor next to the required services
const INJECTORS_PARAM: &str = "injectors";

pub(crate) const ROOT_FACTORY_FILE: &str = "container.rs";

/// Completes a parsed model: assigns ordinals, stores the scanned factories, applies defaults and
/// checks the invariants the emitters rely on.
pub fn assemble(mut model: RootContainer, factories: BTreeMap<String, Factory>) -> Result<RootContainer, ParseErrorKind> {
    let mut id = 0;

    for service in &mut model.services {
        apply_defaults(service, ROOT_FACTORY_FILE);
        service.id = id;
        id += 1;
    }
    for container in &mut model.containers {
        let default_file = format!("{}.rs", container.ty.to_case(Case::Snake));
        for service in &mut container.services {
            apply_defaults(service, &default_file);
            service.id = id;
            id += 1;
        }
    }

    model.factories = factories;

    validate(&model)?;

    debug!(services = id, factories = model.factories.len(), "Container assembled");

    Ok(model)
}

fn apply_defaults(service: &mut Service, default_file: &str) {
    if service.is_external {
        service.has_setter = true;
    }
    if service.factory_file_name.is_none() {
        service.factory_file_name = Some(default_file.to_owned());
    }
}

fn validate(model: &RootContainer) -> Result<(), ParseErrorKind> {
    let mut getters = BTreeSet::new();
    let mut setters = BTreeSet::new();
    let mut root_names = BTreeSet::new();

    for service in model.all_services() {
        if service.is_required && service.is_external {
            return Err(ParseErrorKind::invalid_definition(
                &service.name,
                "service can't be both required and external",
            ));
        }
        if RESERVED_NAMES.contains(&service.name.as_str()) || RESERVED_NAMES.contains(&service.public_getter()) {
            return Err(ParseErrorKind::invalid_definition(&service.name, "name is reserved by the container"));
        }
        if service.is_required && service.qualified_name() == INJECTORS_PARAM {
            return Err(ParseErrorKind::invalid_definition(&service.name, "name is reserved by the container"));
        }
        if service.is_public && !getters.insert(service.public_getter()) {
            return Err(ParseErrorKind::invalid_definition(
                service.public_getter(),
                "public getter name is used twice",
            ));
        }
        if service.has_setter && !setters.insert(service.setter()) {
            return Err(ParseErrorKind::invalid_definition(&service.name, "setter name is used twice"));
        }
        if let Some(package) = &service.factory_package {
            if syn::parse_str::<syn::Path>(package).is_err() {
                return Err(ParseErrorKind::invalid_definition(package, "factory package is not a module path"));
            }
        }
        if let Some(public_name) = &service.public_name {
            if syn::parse_str::<syn::Ident>(public_name).is_err() {
                return Err(ParseErrorKind::invalid_definition(public_name, "public name is not a valid identifier"));
            }
        }
        if service.prefix.is_empty() {
            root_names.insert(service.name.as_str());
        }
    }

    for container in &model.containers {
        if model.imports.contains_key(&container.ty) {
            return Err(ParseErrorKind::invalid_definition(&container.ty, "sub-container shadows an import"));
        }
        if RESERVED_NAMES.contains(&container.name.as_str()) || root_names.contains(container.name.as_str()) {
            return Err(ParseErrorKind::invalid_definition(&container.name, "sub-container name is already used"));
        }
    }

    Ok(())
}
