//! The extension registry: the catalog of goals, modules and shapes.
//!
//! Extensions come from two places:
//!
//! 1. **Built-ins**, registered in code and always present.
//! 2. **Units** found in the extension directory: dynamic libraries built
//!    against the same [`ABI_VERSION`] and exporting a registration function
//!    (see [`declare_unit!`](crate::declare_unit)).
//!
//! A scan never fails because of one bad unit: the unit is logged and
//! skipped. Built-ins are added after the scan and take precedence over a
//! unit that uses the same name.
//!
//! The catalog only holds factories. Every arena gets its own instances, so
//! [`ExtensionRegistry::reload`] never affects a live arena.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::DVec3;
use gladius_region::{Cuboid, Cylinder, RegionShape, Sphere};
use libloading::Library;
use tracing::{debug, error, info, warn};

use crate::dispatch::panic_message;
use crate::{ExtensionError, Goal, Module, StandardGoal};

/// Interface version units must be built against.
pub const ABI_VERSION: u32 = 1;

/// Exported `u32` holding the unit's interface version.
pub const ABI_VERSION_SYMBOL: &[u8] = b"gladius_abi_version\0";

/// Exported `fn(&mut Registrar)` that registers the unit's extensions.
pub const REGISTER_SYMBOL: &[u8] = b"gladius_register\0";

const UNIT_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

pub type GoalFactory = dyn Fn() -> Box<dyn Goal> + Send + Sync;
pub type ModuleFactory = dyn Fn() -> Box<dyn Module> + Send + Sync;
/// Builds a shape from two selection corners.
pub type ShapeFactory = dyn Fn(DVec3, DVec3) -> Box<dyn RegionShape> + Send + Sync;

type RegisterFn = fn(&mut Registrar);

// ---------------------------------------------------------------------------
// Loadable / Catalog
// ---------------------------------------------------------------------------

/// A catalog entry: a named factory.
pub struct Loadable<F: ?Sized> {
    name: String,
    internal: bool,
    factory: Arc<F>,
}

impl<F: ?Sized> Clone for Loadable<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            internal: self.internal,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<F: ?Sized> Loadable<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this entry is a built-in rather than a loaded unit.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: ?Sized> std::fmt::Debug for Loadable<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loadable")
            .field("name", &self.name)
            .field("internal", &self.internal)
            .finish_non_exhaustive()
    }
}

/// Entries of one extension kind, looked up case-insensitively.
pub struct Catalog<F: ?Sized> {
    entries: Vec<Loadable<F>>,
}

impl<F: ?Sized> Default for Catalog<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Catalog<F> {
    fn insert(&mut self, entry: Loadable<F>) {
        let Some(slot) = self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
        else {
            self.entries.push(entry);
            return;
        };
        if slot.internal && !entry.internal {
            warn!(extension = %entry.name, "unit uses the name of a built-in, ignored");
            return;
        }
        debug!(extension = %entry.name, internal = entry.internal, "extension replaced");
        *slot = entry;
    }

    pub fn get(&self, name: &str) -> Option<&Loadable<F>> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Registrar
// ---------------------------------------------------------------------------

/// Collects the extensions one source (built-ins or a unit) provides.
pub struct Registrar {
    internal: bool,
    goals: Vec<Loadable<GoalFactory>>,
    modules: Vec<Loadable<ModuleFactory>>,
    shapes: Vec<Loadable<ShapeFactory>>,
}

impl Registrar {
    fn new(internal: bool) -> Self {
        Self {
            internal,
            goals: Vec::new(),
            modules: Vec::new(),
            shapes: Vec::new(),
        }
    }

    fn entry<F: ?Sized>(&self, name: &str, factory: Arc<F>) -> Loadable<F> {
        Loadable {
            name: name.to_string(),
            internal: self.internal,
            factory,
        }
    }

    pub fn goal(
        &mut self,
        name: &str,
        factory: impl Fn() -> Box<dyn Goal> + Send + Sync + 'static,
    ) -> &mut Self {
        let entry = self.entry::<GoalFactory>(name, Arc::new(factory));
        self.goals.push(entry);
        self
    }

    pub fn module(
        &mut self,
        name: &str,
        factory: impl Fn() -> Box<dyn Module> + Send + Sync + 'static,
    ) -> &mut Self {
        let entry = self.entry::<ModuleFactory>(name, Arc::new(factory));
        self.modules.push(entry);
        self
    }

    pub fn shape(
        &mut self,
        name: &str,
        factory: impl Fn(DVec3, DVec3) -> Box<dyn RegionShape> + Send + Sync + 'static,
    ) -> &mut Self {
        let entry = self.entry::<ShapeFactory>(name, Arc::new(factory));
        self.shapes.push(entry);
        self
    }

    fn len(&self) -> usize {
        self.goals.len() + self.modules.len() + self.shapes.len()
    }

    fn absorb(&mut self, other: Registrar) {
        self.goals.extend(other.goals);
        self.modules.extend(other.modules);
        self.shapes.extend(other.shapes);
    }
}

/// The built-in extensions: the standard goal and the three basic shapes.
pub fn register_builtins(r: &mut Registrar) {
    r.goal("standard", || Box::new(StandardGoal))
        .shape("cuboid", |a, b| Box::new(Cuboid::from_corners(a, b)))
        .shape("cylinder", |a, b| Box::new(Cylinder::from_corners(a, b)))
        .shape("sphere", |a, b| Box::new(Sphere::from_corners(a, b)));
}

/// Exports the symbols the [`DylibLoader`] looks for.
///
/// ```ignore
/// fn register(r: &mut gladius_arena::Registrar) {
///     r.goal("king-of-the-hill", || Box::new(KingOfTheHill::default()));
/// }
///
/// gladius_arena::declare_unit!(register);
/// ```
#[macro_export]
macro_rules! declare_unit {
    ($register:path) => {
        #[allow(non_upper_case_globals)]
        #[unsafe(no_mangle)]
        pub static gladius_abi_version: u32 = $crate::ABI_VERSION;

        #[unsafe(no_mangle)]
        pub fn gladius_register(registrar: &mut $crate::Registrar) {
            $register(registrar)
        }
    };
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Opens one unit file and lets it register its extensions.
pub trait UnitLoader: Send {
    /// # Errors
    /// Any [`ExtensionError`]; the caller logs it and skips the unit.
    fn load(&mut self, path: &Path, registrar: &mut Registrar) -> Result<(), ExtensionError>;
}

/// Loads units as dynamic libraries.
///
/// Libraries stay loaded for as long as the loader lives, including across
/// reloads: instances built from a unit's factories run the unit's code.
#[derive(Default)]
pub struct DylibLoader {
    libraries: Vec<Library>,
}

impl UnitLoader for DylibLoader {
    fn load(&mut self, path: &Path, registrar: &mut Registrar) -> Result<(), ExtensionError> {
        let load_error = |reason: String| ExtensionError::Load {
            path: path.to_path_buf(),
            reason,
        };

        // SAFETY: loading runs the unit's initialisers; units are trusted
        // code placed in the extension directory by the operator.
        let library = unsafe { Library::new(path) }.map_err(|e| load_error(e.to_string()))?;

        // SAFETY: the symbol is declared as a `u32` static by `declare_unit!`.
        let found = unsafe {
            let version = library
                .get::<*const u32>(ABI_VERSION_SYMBOL)
                .map_err(|e| load_error(e.to_string()))?;
            **version
        };
        if found != ABI_VERSION {
            return Err(ExtensionError::AbiMismatch {
                path: path.to_path_buf(),
                found,
                expected: ABI_VERSION,
            });
        }

        // SAFETY: same interface version, so the symbol has this signature.
        let register: RegisterFn = unsafe {
            *library
                .get::<RegisterFn>(REGISTER_SYMBOL)
                .map_err(|e| load_error(e.to_string()))?
        };
        // The library must outlive anything the registration may have
        // created, even if it fails halfway.
        self.libraries.push(library);

        panic::catch_unwind(AssertUnwindSafe(|| register(registrar))).map_err(|payload| {
            load_error(format!(
                "registration panicked: {}",
                panic_message(payload.as_ref())
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// ExtensionRegistry
// ---------------------------------------------------------------------------

type Builtin = Arc<dyn Fn(&mut Registrar) + Send + Sync>;

/// The catalog of every goal, module and shape that arenas can use.
pub struct ExtensionRegistry {
    goals: Catalog<GoalFactory>,
    modules: Catalog<ModuleFactory>,
    shapes: Catalog<ShapeFactory>,
    builtins: Vec<Builtin>,
    directory: Option<PathBuf>,
    loader: Box<dyn UnitLoader>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    /// A registry holding the built-ins only.
    pub fn new() -> Self {
        let mut registry = Self {
            goals: Catalog::default(),
            modules: Catalog::default(),
            shapes: Catalog::default(),
            builtins: vec![Arc::new(register_builtins) as Builtin],
            directory: None,
            loader: Box::new(DylibLoader::default()),
        };
        registry.reload();
        registry
    }

    /// Scans `directory` for units on every [`reload`](Self::reload).
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self.reload();
        self
    }

    /// Replaces the unit loader (the default opens dynamic libraries).
    pub fn with_loader(mut self, loader: impl UnitLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self.reload();
        self
    }

    /// Adds built-in extensions. They survive reloads.
    pub fn register(&mut self, builtin: impl Fn(&mut Registrar) + Send + Sync + 'static) {
        let builtin: Builtin = Arc::new(builtin);
        let mut r = Registrar::new(true);
        builtin(&mut r);
        self.install(r);
        self.builtins.push(builtin);
    }

    /// Loads every unit in `directory`. A unit that fails to load is logged
    /// and skipped.
    ///
    /// # Errors
    /// [`ExtensionError::Io`] when the directory itself cannot be read.
    pub fn scan(&mut self, directory: &Path) -> Result<Registrar, ExtensionError> {
        let mut found = Registrar::new(false);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| UNIT_EXTENSIONS.contains(&ext))
            })
            .collect();
        paths.sort();

        for path in paths {
            let mut unit = Registrar::new(false);
            match self.loader.load(&path, &mut unit) {
                Ok(()) => {
                    info!(unit = %path.display(), extensions = unit.len(), "extension unit loaded");
                    found.absorb(unit);
                }
                Err(e) => warn!(unit = %path.display(), error = %e, "skipping extension unit"),
            }
        }
        Ok(found)
    }

    /// Rebuilds the catalog: scans the directory (if any), then adds the
    /// built-ins. Arenas keep the instances they already have.
    pub fn reload(&mut self) {
        self.goals = Catalog::default();
        self.modules = Catalog::default();
        self.shapes = Catalog::default();

        if let Some(directory) = self.directory.clone() {
            match self.scan(&directory) {
                Ok(units) => self.install(units),
                Err(e) => warn!(
                    directory = %directory.display(),
                    error = %e,
                    "extension directory unreadable, using built-ins only"
                ),
            }
        }

        let builtins = self.builtins.clone();
        for builtin in builtins {
            let mut r = Registrar::new(true);
            builtin(&mut r);
            self.install(r);
        }

        info!(
            goals = self.goals.len(),
            modules = self.modules.len(),
            shapes = self.shapes.len(),
            "extension catalog loaded"
        );
    }

    fn install(&mut self, r: Registrar) {
        r.goals.into_iter().for_each(|e| self.goals.insert(e));
        r.modules.into_iter().for_each(|e| self.modules.insert(e));
        r.shapes.into_iter().for_each(|e| self.shapes.insert(e));
    }

    /// A fresh goal instance.
    ///
    /// # Errors
    /// [`ExtensionError::NotFound`] when the name is unknown or the factory
    /// panics.
    pub fn goal(&self, name: &str) -> Result<Box<dyn Goal>, ExtensionError> {
        instantiate(&self.goals, "goal", name, |f| f())
    }

    pub fn module(&self, name: &str) -> Result<Box<dyn Module>, ExtensionError> {
        instantiate(&self.modules, "module", name, |f| f())
    }

    /// A fresh shape spanning the two corners.
    pub fn shape(&self, name: &str, a: DVec3, b: DVec3) -> Result<Box<dyn RegionShape>, ExtensionError> {
        instantiate(&self.shapes, "shape", name, |f| f(a, b))
    }

    pub fn goals(&self) -> &Catalog<GoalFactory> {
        &self.goals
    }

    pub fn modules(&self) -> &Catalog<ModuleFactory> {
        &self.modules
    }

    pub fn shapes(&self) -> &Catalog<ShapeFactory> {
        &self.shapes
    }
}

fn instantiate<F: ?Sized, T>(
    catalog: &Catalog<F>,
    kind: &'static str,
    name: &str,
    build: impl FnOnce(&F) -> T,
) -> Result<T, ExtensionError> {
    let Some(entry) = catalog.get(name) else {
        warn!(extension = %name, kind, "extension not found");
        return Err(ExtensionError::NotFound(name.to_string()));
    };
    panic::catch_unwind(AssertUnwindSafe(|| build(entry.factory()))).map_err(|payload| {
        error!(
            extension = %entry.name(),
            kind,
            reason = panic_message(payload.as_ref()),
            "extension failed to construct"
        );
        ExtensionError::NotFound(name.to_string())
    })
}
