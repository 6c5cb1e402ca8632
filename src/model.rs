mod types;

pub use types::{Marker, Shape, TypeDescriptor, WellKnown};
pub(crate) use types::{ident, path_tokens};

use convert_case::{Case, Casing as _};
use std::collections::BTreeMap;

/// Name of the root struct of every declaration
pub const CONTAINER_NAME: &str = "Container";

/// In-memory representation of a declaration file.
///
/// Produced by [`crate::parse_source`], completed by [`crate::assemble`] and only read by the emitters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootContainer {
    pub name: String,
    /// Module name the container is generated into
    pub package: String,
    /// `use` items of the declaration keyed by their local alias
    pub imports: BTreeMap<String, Import>,
    pub services: Vec<Service>,
    pub containers: Vec<SubContainer>,
    /// Scanned factories keyed by their name without the `create_` prefix
    pub factories: BTreeMap<String, Factory>,
}

impl RootContainer {
    #[inline]
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            name: CONTAINER_NAME.to_owned(),
            package: package.into(),
            imports: BTreeMap::new(),
            services: Vec::new(),
            containers: Vec::new(),
            factories: BTreeMap::new(),
        }
    }

    /// Root services first, then the services of every sub-container, all in declaration order
    pub fn all_services(&self) -> impl Iterator<Item = &Service> {
        self.services
            .iter()
            .chain(self.containers.iter().flat_map(|container| container.services.iter()))
    }

    #[must_use]
    pub fn services_len(&self) -> usize {
        self.services.len() + self.containers.iter().map(|container| container.services.len()).sum::<usize>()
    }

    #[inline]
    #[must_use]
    pub fn factory(&self, service: &Service) -> Option<&Factory> {
        self.factories.get(&service.factory_key())
    }

    #[must_use]
    pub fn container(&self, name: &str) -> Option<&SubContainer> {
        self.containers.iter().find(|container| container.ty == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Local alias the declaration refers to
    pub id: String,
    /// Set only when the import is renamed with `as`
    pub name: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Dense ordinal, also the bit index in the generated bitset
    pub id: usize,
    /// Empty for root services, the sub-container type name otherwise
    pub prefix: String,
    pub name: String,
    pub ty: TypeDescriptor,
    pub public_name: Option<String>,
    pub factory_file_name: Option<String>,
    pub factory_package: Option<String>,
    pub has_setter: bool,
    pub has_closer: bool,
    pub is_required: bool,
    pub is_public: bool,
    pub is_external: bool,
}

impl Service {
    #[must_use]
    pub fn new(prefix: impl Into<String>, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            id: 0,
            prefix: prefix.into(),
            name: name.into(),
            ty,
            public_name: None,
            factory_file_name: None,
            factory_package: None,
            has_setter: false,
            has_closer: false,
            is_required: false,
            is_public: false,
            is_external: false,
        }
    }

    /// Name used in runtime messages, e.g. `entity_repo` -> `EntityRepo`
    #[must_use]
    pub fn title(&self) -> String {
        self.name.to_case(Case::Pascal)
    }

    /// `name` for root services, `<snake prefix>_<name>` for nested ones.
    /// Used as the factory key and as the constructor argument name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.prefix.to_case(Case::Snake), self.name)
        }
    }

    #[inline]
    #[must_use]
    pub fn factory_key(&self) -> String {
        self.qualified_name()
    }

    #[must_use]
    pub fn factory_fn(&self) -> String {
        format!("{}{}", crate::scanner::FACTORY_PREFIX, self.factory_key())
    }

    #[must_use]
    pub fn setter(&self) -> String {
        format!("set_{}", self.name)
    }

    #[must_use]
    pub fn public_getter(&self) -> &str {
        self.public_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the container builds this service through a factory
    #[inline]
    #[must_use]
    pub fn needs_factory(&self) -> bool {
        !self.is_external && !self.is_required
    }

    #[inline]
    #[must_use]
    pub fn emits_setter(&self) -> bool {
        self.has_setter || self.is_external || self.is_required
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubContainer {
    /// Field name on the root container
    pub name: String,
    /// Declared struct name
    pub ty: String,
    pub services: Vec<Service>,
}

impl SubContainer {
    /// Name of the generated struct holding the sub-container's cached services
    #[must_use]
    pub fn state(&self) -> String {
        format!("{}State", self.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    pub name: String,
    pub returns_error: bool,
}
