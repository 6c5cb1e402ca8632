use convert_case::{Case, Casing as _};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::{
    assemble,
    config::{Config, CONFIG_FILES},
    emit::{declaration, readme, BuildInfo, Emitter, DEFAULT_LOOKUP},
    errors::{EmitErrorKind, GenerateErrorKind},
    model::{RootContainer, Service},
    module::CrateModule,
    parse_file, scan,
    sink::{Sink, WriteMode, WriteOutcome},
};

const INTERNAL_DIR: &str = "internal";
const DEFINITIONS_DIR: &str = "definitions";
const FACTORIES_DIR: &str = "factories";
const DECLARATION_FILE: &str = "container.rs";
const MODULE_FILE: &str = "mod.rs";

/// Layout of a container directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub dir: PathBuf,
}

impl Layout {
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn public(&self) -> PathBuf {
        self.dir.join(MODULE_FILE)
    }

    #[must_use]
    pub fn internal(&self) -> PathBuf {
        self.dir.join(INTERNAL_DIR)
    }

    #[must_use]
    pub fn declaration(&self) -> PathBuf {
        self.internal().join(DEFINITIONS_DIR).join(DECLARATION_FILE)
    }

    #[must_use]
    pub fn factories(&self) -> PathBuf {
        self.internal().join(FACTORIES_DIR)
    }

    #[must_use]
    pub fn readme(&self) -> PathBuf {
        self.dir.join("README.md")
    }
}

/// What a `generate` run produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Generated {
    /// Files written, in write order
    pub files: Vec<PathBuf>,
    /// Factory functions stubbed
    pub stubs: Vec<String>,
    /// Services whose stub couldn't be written
    pub failed_stubs: Vec<String>,
}

/// Runs the pipeline for the project rooted at `root`, the directory holding the config file
pub struct Generator<S> {
    root: PathBuf,
    sink: S,
    build: BuildInfo,
}

impl<S: Sink> Generator<S> {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, sink: S) -> Self {
        Self {
            root: root.into(),
            sink,
            build: BuildInfo::CURRENT,
        }
    }

    #[must_use]
    pub fn with_build(self, build: BuildInfo) -> Self {
        Self { build, ..self }
    }

    #[inline]
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Writes the config, the declaration skeleton and the README. Existing files are kept.
    #[allow(clippy::missing_errors_doc)]
    pub fn init(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, GenerateErrorKind> {
        let dir = dir.as_ref();
        let span = info_span!("init", dir = %dir.display());
        let _guard = span.enter();

        let config = Config::new(dir);
        let config_path = self.root.join(CONFIG_FILES[0]);
        let layout = Layout::new(self.root.join(dir));
        let module = dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("container")
            .to_owned();

        let files = [
            (config_path.clone(), config.to_bytes(&config_path)?),
            (layout.declaration(), declaration().to_vec()),
            (layout.readme(), readme(&module)),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (path, bytes) in files {
            match self.sink.write(&path, &bytes, WriteMode::CreateNew)? {
                WriteOutcome::Written => {
                    info!(path = %path.display(), "Created");
                    written.push(path);
                }
                WriteOutcome::Skipped => info!(path = %path.display(), "Already exists, kept"),
            }
        }

        Ok(written)
    }

    /// Loads the config, reads the declaration and the factories, then writes the container
    #[allow(clippy::missing_errors_doc)]
    pub fn generate(&self) -> Result<Generated, GenerateErrorKind> {
        let config_path = Config::discover(&self.root)?;
        let config = Config::load(&config_path)?;
        let options = config.options()?;
        let layout = Layout::new(self.root.join(&config.container.dir));

        let span = info_span!("generate", dir = %layout.dir.display());
        let _guard = span.enter();

        let declaration = layout.declaration();
        let model = parse_file(&declaration).map_err(|source| {
            error!(path = %declaration.display(), "{}", source);
            GenerateErrorKind::Parse {
                path: declaration.clone(),
                source,
            }
        })?;

        let module = if model.all_services().any(|service| service.factory_package.is_some()) {
            Some(CrateModule::locate(&layout.dir)?)
        } else {
            None
        };

        let mut dirs = vec![layout.factories()];
        for package in model.all_services().filter_map(|service| service.factory_package.as_deref()) {
            match module.as_ref().and_then(|module| module.dir_of(package)) {
                Some(dir) if !dirs.contains(&dir) => dirs.push(dir),
                Some(_) => {}
                None => warn!(package, "Factory package is outside the crate, not scanned"),
            }
        }

        let factories = scan(&dirs)?;
        let model = assemble(model, factories).map_err(|err| {
            error!("{}", err);
            GenerateErrorKind::Assemble(err)
        })?;

        let emitter = Emitter::new(&model, &options, self.build);
        let mut generated = Generated::default();

        let internal = layout.internal();
        let files: [(PathBuf, fn(&Emitter<'_>) -> Result<Vec<u8>, EmitErrorKind>); 5] = [
            (layout.public(), |emitter: &Emitter<'_>| emitter.public()),
            (internal.join(MODULE_FILE), |emitter: &Emitter<'_>| emitter.internal_index()),
            (internal.join("container.rs"), |emitter: &Emitter<'_>| emitter.internal()),
            (internal.join("lookup.rs"), |emitter: &Emitter<'_>| emitter.lookup()),
            (internal.join("bitset.rs"), |emitter: &Emitter<'_>| emitter.bitset()),
        ];
        for (path, emit) in files {
            let bytes = emit(&emitter).map_err(|source| GenerateErrorKind::Emit { path: path.clone(), source })?;
            self.sink.write(&path, &bytes, WriteMode::Overwrite)?;
            debug!(path = %path.display(), "Generated");
            generated.files.push(path);
        }

        let stub_files = self.write_stubs(&emitter, &model, &layout, module.as_ref(), &mut generated);

        let index = layout.factories().join(MODULE_FILE);
        let modules = factory_modules(&layout.factories(), &stub_files);
        let bytes = emitter
            .factories_index(&modules)
            .map_err(|source| GenerateErrorKind::Emit { path: index.clone(), source })?;
        self.sink.write(&index, &bytes, WriteMode::Overwrite)?;
        generated.files.push(index);

        info!(
            files = generated.files.len(),
            stubs = generated.stubs.len(),
            failed_stubs = generated.failed_stubs.len(),
            "Container generated"
        );

        Ok(generated)
    }

    /// Writes stubs for services without a factory, grouped by file. Failures are logged per service.
    ///
    /// Returns the files written into the default factories directory.
    fn write_stubs(
        &self,
        emitter: &Emitter<'_>,
        model: &RootContainer,
        layout: &Layout,
        module: Option<&CrateModule>,
        generated: &mut Generated,
    ) -> BTreeSet<PathBuf> {
        let mut groups: BTreeMap<PathBuf, (String, Vec<&Service>)> = BTreeMap::new();

        for service in model.all_services().filter(|service| service.needs_factory() && model.factory(service).is_none()) {
            let target = match &service.factory_package {
                None => Ok((layout.factories(), DEFAULT_LOOKUP.to_owned())),
                Some(package) => package_target(module, &layout.dir, package),
            };
            let (dir, lookup) = match target {
                Ok(target) => target,
                Err(reason) => {
                    error!(service = %service.qualified_name(), "Factory stub not written: {}", reason);
                    generated.failed_stubs.push(service.qualified_name());
                    continue;
                }
            };

            let file = service
                .factory_file_name
                .clone()
                .unwrap_or_else(|| format!("{}.rs", service.prefix.to_case(Case::Snake)));
            groups.entry(dir.join(file)).or_insert_with(|| (lookup, Vec::new())).1.push(service);
        }

        let mut written = BTreeSet::new();
        for (path, (lookup, services)) in groups {
            let append = self.sink.exists(&path);

            let mut stubbed = Vec::with_capacity(services.len());
            let mut stubs = Vec::with_capacity(services.len());
            for service in services {
                match emitter.stub(service, &lookup, append) {
                    Ok(stub) => {
                        stubbed.push(service);
                        stubs.push(stub);
                    }
                    Err(err) => {
                        error!(service = %service.qualified_name(), "Factory stub not emitted: {}", err);
                        generated.failed_stubs.push(service.qualified_name());
                    }
                }
            }

            let result = emitter
                .stub_file(&stubbed, &stubs, &lookup, append)
                .map_err(GenerateErrorKind::from_emit(&path))
                .and_then(|bytes| {
                    let mode = if append { WriteMode::Append } else { WriteMode::CreateNew };
                    self.sink.write(&path, &bytes, mode).map_err(GenerateErrorKind::from)
                });
            match result {
                Ok(_) => {
                    info!(path = %path.display(), stubs = stubbed.len(), "Factory stubs written");
                    generated.stubs.extend(stubbed.iter().map(|service| service.factory_fn()));
                    generated.files.push(path.clone());
                    written.insert(path);
                }
                Err(GenerateErrorKind::Emit {
                    source: EmitErrorKind::FileIgnored,
                    ..
                }) => {}
                Err(err) => {
                    error!(path = %path.display(), "Factory stubs not written: {}", err);
                    generated
                        .failed_stubs
                        .extend(stubbed.iter().map(|service| service.qualified_name()));
                }
            }
        }

        written
    }
}

impl GenerateErrorKind {
    fn from_emit(path: &Path) -> impl FnOnce(EmitErrorKind) -> Self + '_ {
        move |source| Self::Emit {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Directory and lookup path of stubs for a service living in `package`
fn package_target(module: Option<&CrateModule>, container_dir: &Path, package: &str) -> Result<(PathBuf, String), String> {
    let module = module.ok_or_else(|| "crate not located".to_owned())?;
    let dir = module
        .dir_of(package)
        .ok_or_else(|| format!("`{package}` is outside the crate"))?;
    let container = module
        .module_of(container_dir)
        .ok_or_else(|| format!("{} is outside the crate sources", container_dir.display()))?;

    Ok((dir, format!("{container}::{INTERNAL_DIR}::lookup")))
}

/// Modules of the default factories directory: existing `.rs` files and `mod.rs` directories plus the new stub files
fn factory_modules(dir: &Path, stub_files: &BTreeSet<PathBuf>) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    let existing = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if !path.join(MODULE_FILE).is_file() {
                    return None;
                }
                path.file_name()?.to_str().map(str::to_owned)
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                path.file_stem()?.to_str().map(str::to_owned)
            } else {
                None
            }
        });
    let planned = stub_files
        .iter()
        .filter(|path| path.parent() == Some(dir))
        .filter_map(|path| path.file_stem()?.to_str().map(str::to_owned));

    for module in existing.chain(planned) {
        if module == "mod" {
            continue;
        }
        if syn::parse_str::<syn::Ident>(&module).is_err() {
            warn!(module = %module, "Factory file name is not a module name, not indexed");
            continue;
        }
        modules.insert(module);
    }

    modules
}
