//! Integration tests for the extension registry.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gladius_arena::{
    ABI_VERSION, ExtensionError, ExtensionRegistry, Goal, Hooks, Registrar, UnitLoader,
};
use tracing_subscriber::fmt::MakeWriter;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn logged<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture.text())
}

struct NamedGoal(&'static str);

impl Hooks for NamedGoal {
    fn name(&self) -> &str {
        self.0
    }
}

impl Goal for NamedGoal {}

/// Pretends every `*.so` whose stem is `koth` is a valid unit; every other
/// unit file fails.
struct FakeLoader;

impl UnitLoader for FakeLoader {
    fn load(&mut self, path: &Path, registrar: &mut Registrar) -> Result<(), ExtensionError> {
        match path.file_stem().and_then(|s| s.to_str()) {
            Some("koth") => {
                registrar
                    .goal("king-of-the-hill", || Box::new(NamedGoal("king-of-the-hill")))
                    .goal("standard", || Box::new(NamedGoal("impostor")));
                Ok(())
            }
            _ => Err(ExtensionError::AbiMismatch {
                path: path.to_path_buf(),
                found: ABI_VERSION + 1,
                expected: ABI_VERSION,
            }),
        }
    }
}

fn unit_dir(name: &str, files: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gladius-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
        std::fs::write(dir.join(file), b"").unwrap();
    }
    dir
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_name_logs_exactly_one_warning() {
    let registry = ExtensionRegistry::new();

    let (result, logs) = logged(|| registry.goal("no-such-goal"));

    assert!(matches!(result, Err(ExtensionError::NotFound(name)) if name == "no-such-goal"));
    let warnings = logs
        .lines()
        .filter(|line| line.contains("WARN") && line.contains("no-such-goal"))
        .count();
    assert_eq!(warnings, 1, "logs were:\n{logs}");
}

#[test]
fn test_lookup_is_case_insensitive() {
    let registry = ExtensionRegistry::new();
    assert_eq!(registry.goal("STANDARD").unwrap().name(), "standard");
    assert!(registry.shape("Cuboid", glam::DVec3::ZERO, glam::DVec3::ONE).is_ok());
}

#[test]
fn test_builtins_present_without_directory() {
    let registry = ExtensionRegistry::new();
    assert_eq!(registry.goals().names(), vec!["standard"]);
    assert_eq!(registry.shapes().names(), vec!["cuboid", "cylinder", "sphere"]);
    assert!(registry.modules().is_empty());
}

#[test]
fn test_panicking_factory_returns_not_found() {
    let mut registry = ExtensionRegistry::new();
    registry.register(|r| {
        r.goal("broken", || -> Box<dyn Goal> { panic!("factory exploded") });
    });

    let (result, logs) = logged(|| registry.goal("broken"));

    assert!(matches!(result, Err(ExtensionError::NotFound(_))));
    assert!(logs.contains("ERROR") && logs.contains("factory exploded"), "{logs}");
}

#[test]
fn test_registered_builtins_survive_reload() {
    let mut registry = ExtensionRegistry::new();
    registry.register(|r| {
        r.goal("duel", || Box::new(NamedGoal("duel")));
    });
    registry.reload();
    assert_eq!(registry.goal("duel").unwrap().name(), "duel");
    assert!(registry.goals().get("duel").unwrap().is_internal());
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

#[test]
fn test_scan_loads_good_units_and_skips_bad_ones() {
    let dir = unit_dir("scan", &["koth.so", "broken.so", "notes.txt"]);

    let (registry, logs) = logged(|| {
        ExtensionRegistry::new()
            .with_loader(FakeLoader)
            .with_directory(&dir)
    });

    let koth = registry.goals().get("king-of-the-hill").unwrap();
    assert!(!koth.is_internal());
    assert_eq!(registry.goal("King-Of-The-Hill").unwrap().name(), "king-of-the-hill");
    assert!(logs.contains("broken.so"), "{logs}");
    assert!(!logs.contains("notes.txt"), "{logs}");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_builtin_wins_over_unit_with_same_name() {
    let dir = unit_dir("shadow", &["koth.so"]);

    let registry = ExtensionRegistry::new()
        .with_loader(FakeLoader)
        .with_directory(&dir);

    assert_eq!(registry.goal("standard").unwrap().name(), "standard");
    assert!(registry.goals().get("standard").unwrap().is_internal());
    assert_eq!(registry.goals().len(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_unreadable_directory_keeps_builtins() {
    let missing = std::env::temp_dir().join(format!("gladius-missing-{}", std::process::id()));

    let (registry, logs) = logged(|| ExtensionRegistry::new().with_directory(&missing));

    assert!(registry.goal("standard").is_ok());
    assert!(logs.contains("unreadable"), "{logs}");
}

#[test]
fn test_reload_picks_up_new_units() {
    let dir = unit_dir("reload", &[]);
    let mut registry = ExtensionRegistry::new()
        .with_loader(FakeLoader)
        .with_directory(&dir);
    assert!(registry.goals().get("king-of-the-hill").is_none());

    std::fs::write(dir.join("koth.so"), b"").unwrap();
    registry.reload();
    assert!(registry.goals().get("king-of-the-hill").is_some());

    std::fs::remove_dir_all(&dir).unwrap();
}
