mod attr;
mod types;

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};
use syn::{Fields, Item, ItemStruct, ItemUse, UseTree};
use tracing::{debug, warn};

use self::attr::FieldOptions;
use crate::{
    errors::ParseErrorKind,
    model::{Import, RootContainer, Service, Shape, SubContainer, TypeDescriptor, CONTAINER_NAME},
};

const DEFAULT_PACKAGE: &str = "container";

/// Parses the declaration at `path`.
///
/// The package is the directory the container is generated into: the declaration lives at
/// `<dir>/internal/definitions/container.rs`, so it is the name of the third ancestor of the file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<RootContainer, ParseErrorKind> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ParseErrorKind::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let package = path
        .ancestors()
        .nth(3)
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_PACKAGE);

    parse_source(package, &text)
}

/// Parses a declaration source into a [`RootContainer`] with ordinals and factories not yet assigned
pub fn parse_source(package: &str, text: &str) -> Result<RootContainer, ParseErrorKind> {
    if syn::parse_str::<syn::Ident>(package).is_err() {
        return Err(ParseErrorKind::invalid_definition(package, "package is not a valid module name"));
    }

    let file = syn::parse_file(text)?;
    let mut model = RootContainer::new(package);

    let mut declared = BTreeMap::new();
    for item in &file.items {
        match item {
            Item::Use(item) => collect_imports(item, &mut model.imports)?,
            Item::Struct(item) => {
                if declared.insert(item.ident.to_string(), item).is_some() {
                    return Err(ParseErrorKind::Parsing(format!("struct `{}` is declared twice", item.ident)));
                }
            }
            _ => {}
        }
    }

    let Some(root) = declared.get(CONTAINER_NAME) else {
        return Err(ParseErrorKind::ContainerNotFound);
    };

    let fields = match &root.fields {
        Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => return Err(ParseErrorKind::Parsing(format!("`{CONTAINER_NAME}` must have named fields"))),
    };

    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let name = ident.to_string();
        let ty = types::descriptor(&name, &field.ty)?;

        if ty.is_error_slot() {
            debug!(field = %name, "Error slot skipped");
            continue;
        }

        match sub_container_of(&name, &ty, &declared)? {
            Some(item) => model.containers.push(parse_sub_container(name, item, &declared)?),
            None => model.services.push(parse_service("", name, ty, &field.attrs)?),
        }
    }

    debug!(
        services = model.services.len(),
        containers = model.containers.len(),
        imports = model.imports.len(),
        "Declaration parsed"
    );

    Ok(model)
}

fn parse_service(prefix: &str, name: String, ty: TypeDescriptor, attrs: &[syn::Attribute]) -> Result<Service, ParseErrorKind> {
    let FieldOptions {
        has_setter,
        has_closer,
        is_required,
        is_public,
        is_external,
        public_name,
        factory_file,
        factory_pkg,
    } = FieldOptions::parse(&name, attrs)?;

    Ok(Service {
        public_name,
        factory_file_name: factory_file,
        factory_package: factory_pkg,
        has_setter,
        has_closer,
        is_required,
        is_public,
        is_external,
        ..Service::new(prefix, name, ty)
    })
}

fn parse_sub_container(
    name: String,
    item: &ItemStruct,
    declared: &BTreeMap<String, &ItemStruct>,
) -> Result<SubContainer, ParseErrorKind> {
    let ty = item.ident.to_string();
    let Fields::Named(fields) = &item.fields else {
        return Err(ParseErrorKind::invalid_definition(ty, "sub-container must be a struct with named fields"));
    };

    let mut services = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        let Some(ident) = &field.ident else { continue };
        let field_name = ident.to_string();
        let field_ty = types::descriptor(&field_name, &field.ty)?;

        if field_ty.is_error_slot() {
            debug!(field = %field_name, container = %ty, "Error slot skipped");
            continue;
        }
        if !matches!(sub_container_of(&field_name, &field_ty, declared), Ok(None)) {
            return Err(ParseErrorKind::not_supported(field_name, "nested sub-container"));
        }

        services.push(parse_service(&ty, field_name, field_ty, &field.attrs)?);
    }

    if services.is_empty() {
        return Err(ParseErrorKind::invalid_definition(ty, "sub-container has no services"));
    }

    Ok(SubContainer { name, ty, services })
}

/// The declared struct a field refers to, if any. Sub-containers are held by value only.
fn sub_container_of<'a>(
    field: &str,
    ty: &TypeDescriptor,
    declared: &BTreeMap<String, &'a ItemStruct>,
) -> Result<Option<&'a ItemStruct>, ParseErrorKind> {
    let is_local = |ty: &TypeDescriptor| ty.shape == Shape::Plain && ty.package.is_none() && ty.args.is_empty() && ty.name != CONTAINER_NAME;

    if is_local(ty) {
        return Ok(declared.get(&ty.name).copied());
    }
    if ty.is_pointer() && ty.args.first().is_some_and(|inner| is_local(inner) && declared.contains_key(&inner.name)) {
        return Err(ParseErrorKind::not_supported(field, "sub-container behind a pointer"));
    }
    Ok(None)
}

fn collect_imports(item: &ItemUse, imports: &mut BTreeMap<String, Import>) -> Result<(), ParseErrorKind> {
    let mut prefix = Vec::new();
    if item.leading_colon.is_some() {
        prefix.push(String::new());
    }

    let mut collected = Vec::new();
    flatten_use_tree(&item.tree, &mut prefix, &mut collected)?;

    let mut seen = BTreeSet::new();
    for import in collected {
        if !seen.insert(import.id.clone()) || imports.contains_key(&import.id) {
            return Err(ParseErrorKind::Parsing(format!("`{}` is imported twice", import.id)));
        }
        imports.insert(import.id.clone(), import);
    }

    Ok(())
}

fn flatten_use_tree(tree: &UseTree, prefix: &mut Vec<String>, out: &mut Vec<Import>) -> Result<(), ParseErrorKind> {
    match tree {
        UseTree::Path(path) => {
            let segment = path.ident.to_string();
            if prefix.iter().all(String::is_empty) && (segment == "self" || segment == "super") {
                return Err(ParseErrorKind::not_supported(segment, "relative import"));
            }
            prefix.push(segment);
            let result = flatten_use_tree(&path.tree, prefix, out);
            prefix.pop();
            result
        }
        UseTree::Name(name) => {
            let id = name.ident.to_string();
            if id == "self" {
                let Some(last) = prefix.last().filter(|last| !last.is_empty()) else {
                    return Err(ParseErrorKind::not_supported(id, "relative import"));
                };
                out.push(Import {
                    id: last.clone(),
                    name: None,
                    path: prefix.join("::"),
                });
            } else {
                if prefix.iter().all(String::is_empty) && id == "super" {
                    return Err(ParseErrorKind::not_supported(id, "relative import"));
                }
                out.push(Import {
                    path: join(prefix, &id),
                    id,
                    name: None,
                });
            }
            Ok(())
        }
        UseTree::Rename(rename) => {
            let alias = rename.rename.to_string();
            if alias == "_" {
                warn!(import = %join(prefix, &rename.ident.to_string()), "Anonymous import ignored");
                return Ok(());
            }
            let ident = rename.ident.to_string();
            let path = if ident == "self" { prefix.join("::") } else { join(prefix, &ident) };
            out.push(Import {
                id: alias.clone(),
                name: Some(alias),
                path,
            });
            Ok(())
        }
        UseTree::Glob(_) => Err(ParseErrorKind::not_supported(join(prefix, "*"), "glob import")),
        UseTree::Group(group) => group.items.iter().try_for_each(|tree| flatten_use_tree(tree, prefix, out)),
    }
}

fn join(prefix: &[String], last: &str) -> String {
    let mut segments = prefix.to_vec();
    segments.push(last.to_owned());
    segments.join("::")
}

#[cfg(test)]
mod tests {
    use super::{parse_file, parse_source};
    use crate::{
        errors::ParseErrorKind,
        model::{Import, Shape},
    };

    use std::fs;
    use tracing_test::traced_test;

    const DECLARATION: &str = r#"
        use std::sync::Arc;

        use crate::config::Config;
        use crate::http::{self, Router, Server as HttpServer};
        use crate::repo;

        pub struct Container {
            err: anyhow::Error,

            #[di(required)]
            config: Config,
            #[di(public, close)]
            server: Arc<HttpServer>,
            /// di:public
            /// di:public_name:api_router
            router: Arc<Router>,
            #[di(set)]
            entity_repo: Arc<dyn repo::EntityRepo + Send + Sync>,
            #[di(external, public)]
            external: Arc<http::Client>,
            port: u16,

            repositories: Repositories,
        }

        pub struct Repositories {
            #[di(public, factory_file = "repos")]
            users: Arc<dyn repo::Users>,
            posts: Arc<dyn repo::Posts>,
        }
    "#;

    #[test]
    #[traced_test]
    fn test_parse_declaration() {
        let model = parse_source("di", DECLARATION).unwrap();

        assert_eq!(model.name, "Container");
        assert_eq!(model.package, "di");
        assert_eq!(
            model.services.iter().map(|service| service.name.as_str()).collect::<Vec<_>>(),
            ["config", "server", "router", "entity_repo", "external", "port"]
        );
        assert!(model.services.iter().all(|service| service.prefix.is_empty()));

        let config = &model.services[0];
        assert!(config.is_required);
        assert!(!config.is_public);

        let server = &model.services[1];
        assert!(server.is_public && server.has_closer);
        assert!(server.ty.is_pointer());

        let router = &model.services[2];
        assert!(router.is_public);
        assert_eq!(router.public_getter(), "api_router");

        let entity_repo = &model.services[3];
        assert!(entity_repo.has_setter);
        assert!(matches!(entity_repo.ty.args[0].shape, Shape::Dyn { .. }));

        let external = &model.services[4];
        assert!(external.is_external && external.is_public);

        assert!(model.services[5].ty.is_basic());

        assert_eq!(model.containers.len(), 1);
        let repositories = &model.containers[0];
        assert_eq!(repositories.name, "repositories");
        assert_eq!(repositories.ty, "Repositories");
        assert_eq!(repositories.services.len(), 2);
        assert_eq!(repositories.services[0].prefix, "Repositories");
        assert_eq!(repositories.services[0].factory_file_name.as_deref(), Some("repos.rs"));
        assert_eq!(repositories.services[1].factory_key(), "repositories_posts");
    }

    #[test]
    fn test_parse_imports() {
        let model = parse_source("di", DECLARATION).unwrap();

        assert_eq!(
            model.imports.keys().map(String::as_str).collect::<Vec<_>>(),
            ["Arc", "Config", "HttpServer", "Router", "http", "repo"]
        );
        assert_eq!(
            model.imports["HttpServer"],
            Import {
                id: "HttpServer".to_owned(),
                name: Some("HttpServer".to_owned()),
                path: "crate::http::Server".to_owned(),
            }
        );
        assert_eq!(model.imports["http"].path, "crate::http");
        assert_eq!(model.imports["http"].name, None);
        assert_eq!(model.imports["Arc"].path, "std::sync::Arc");
    }

    #[test]
    fn test_container_not_found() {
        let err = parse_source("di", "pub struct Services { a: u8 }").unwrap_err();
        assert!(matches!(err, ParseErrorKind::ContainerNotFound));
    }

    #[test]
    fn test_empty_sub_container() {
        let err = parse_source(
            "di",
            r"
            pub struct Container { repositories: Repositories }
            pub struct Repositories {}
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseErrorKind::InvalidDefinition { name, .. } if name == "Repositories"));

        let err = parse_source(
            "di",
            r"
            pub struct Container { repositories: Repositories }
            pub struct Repositories;
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseErrorKind::InvalidDefinition { .. }));
    }

    #[test]
    fn test_nested_sub_container() {
        let err = parse_source(
            "di",
            r"
            pub struct Container { repositories: Repositories }
            pub struct Repositories { users: Users }
            pub struct Users { db: Db }
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseErrorKind::NotSupported { field, what: "nested sub-container" } if field == "users"));
    }

    #[test]
    fn test_sub_container_behind_pointer() {
        let err = parse_source(
            "di",
            r"
            pub struct Container { repositories: Box<Repositories> }
            pub struct Repositories { users: Users }
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseErrorKind::NotSupported { field, .. } if field == "repositories"));
    }

    #[test]
    fn test_double_pointer() {
        let err = parse_source("di", "pub struct Container { server: Arc<Arc<Server>> }").unwrap_err();
        assert!(matches!(err, ParseErrorKind::NotSupported { field, what: "double indirection" } if field == "server"));
    }

    #[test]
    fn test_error_fields_skipped() {
        let model = parse_source(
            "di",
            r"
            pub struct Container {
                err: Error,
                boxed: Box<dyn std::error::Error + Send + Sync>,
                server: Server,
            }
            ",
        )
        .unwrap();
        assert_eq!(model.services.len(), 1);
        assert_eq!(model.services[0].name, "server");
    }

    #[test]
    fn test_unit_container() {
        let model = parse_source("di", "pub struct Container;").unwrap();
        assert!(model.services.is_empty());
        assert!(model.containers.is_empty());
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(parse_source("di", "pub struct Container(u8);"), Err(ParseErrorKind::Parsing(_))));
        assert!(matches!(parse_source("di", "pub struct Container {"), Err(ParseErrorKind::Parsing(_))));
        assert!(matches!(
            parse_source("di", "pub struct Container {} pub struct Container {}"),
            Err(ParseErrorKind::Parsing(_))
        ));
        assert!(matches!(
            parse_source("not a module", "pub struct Container {}"),
            Err(ParseErrorKind::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_unsupported_imports() {
        assert!(matches!(
            parse_source("di", "use super::Server; pub struct Container {}"),
            Err(ParseErrorKind::NotSupported { what: "relative import", .. })
        ));
        assert!(matches!(
            parse_source("di", "use self::http::Server; pub struct Container {}"),
            Err(ParseErrorKind::NotSupported { what: "relative import", .. })
        ));
        assert!(matches!(
            parse_source("di", "use crate::http::*; pub struct Container {}"),
            Err(ParseErrorKind::NotSupported { what: "glob import", .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_anonymous_import_ignored() {
        let model = parse_source("di", "use crate::io::Closer as _; pub struct Container {}").unwrap();
        assert!(model.imports.is_empty());
        assert!(logs_contain("Anonymous import ignored"));
    }

    #[test]
    fn test_parse_file_package() {
        let dir = tempfile::tempdir().unwrap();
        let definitions = dir.path().join("services").join("internal").join("definitions");
        fs::create_dir_all(&definitions).unwrap();
        let path = definitions.join("container.rs");
        fs::write(&path, "pub struct Container { port: u16 }").unwrap();

        let model = parse_file(&path).unwrap();
        assert_eq!(model.package, "services");
        assert_eq!(model.services.len(), 1);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(dir.path().join("container.rs")).unwrap_err();
        assert!(matches!(err, ParseErrorKind::Read { .. }));
    }
}
