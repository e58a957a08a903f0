use crashpad_init::{
    AppInfo, Backend, CrashpadConfig, Error, Initializer, LaunchPlan, ReportDatabase,
};
use parking_lot::Mutex;
use rstest::rstest;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    Database,
    Settings,
    Start,
}

#[derive(Default)]
struct MockBackend {
    fail_at: Option<Stage>,
    starts: AtomicUsize,
    uploads_enabled: Arc<AtomicBool>,
    /// Whether each attachment existed at the time the handler was started
    attachments_at_start: Mutex<Vec<bool>>,
    plans: Mutex<Vec<LaunchPlan>>,
}

impl MockBackend {
    fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Default::default()
        }
    }
}

struct MockDatabase {
    fail: bool,
    uploads_enabled: Arc<AtomicBool>,
}

impl ReportDatabase for MockDatabase {
    fn set_uploads_enabled(&self, enabled: bool) -> Result<(), crashpad_client::Error> {
        if self.fail {
            return Err(crashpad_client::Error::DatabaseMissing("crashpad".into()));
        }

        self.uploads_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct MockHandler(usize);

impl Backend for MockBackend {
    type Database = MockDatabase;
    type Handler = MockHandler;

    fn initialize_database(&self, plan: &LaunchPlan) -> Result<MockDatabase, crashpad_client::Error> {
        if self.fail_at == Some(Stage::Database) {
            return Err(crashpad_client::Error::DatabaseToolMissing(
                plan.handler.with_file_name("crashpad_database_util"),
            ));
        }

        Ok(MockDatabase {
            fail: self.fail_at == Some(Stage::Settings),
            uploads_enabled: self.uploads_enabled.clone(),
        })
    }

    fn start_handler(&self, plan: &LaunchPlan) -> Result<MockHandler, crashpad_client::Error> {
        if self.fail_at == Some(Stage::Start) {
            return Err(crashpad_client::Error::NotRunning);
        }

        self.attachments_at_start
            .lock()
            .extend(plan.attachments.iter().map(|a| a.exists()));
        self.plans.lock().push(plan.clone());

        Ok(MockHandler(self.starts.fetch_add(1, Ordering::SeqCst)))
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    app: AppInfo,
    config: CrashpadConfig,
}

/// An existing data directory and a handler executable in place
fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let bin_dir = tmp.path().join("bin");

    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::create_dir_all(&bin_dir).unwrap();
    std::fs::write(bin_dir.join(crashpad_client::HANDLER_NAME), b"").unwrap();

    let config = CrashpadConfig {
        handler_dir: Some(bin_dir),
        ..Default::default()
    };

    Fixture {
        app: AppInfo {
            data_dir,
            database: "fred".to_owned(),
            name: "myapp".to_owned(),
            version: "1.2.3".to_owned(),
        },
        config,
        _tmp: tmp,
    }
}

fn stale_archive(data_dir: &Path) -> PathBuf {
    data_dir.join("export").join("buyouts.tgz")
}

#[test]
fn initializes_once() {
    let fx = fixture();
    let backend = MockBackend::default();
    let init = Initializer::new();

    init.initialize_with(&fx.app, &fx.config, &backend).unwrap();

    assert!(init.is_initialized());
    assert_eq!(init.with_handler(|h| h.0), Some(0));
    assert!(backend.uploads_enabled.load(Ordering::SeqCst));

    let plans = backend.plans.lock();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].reports_dir, fx.app.data_dir.join("crashpad"));
    assert_eq!(plans[0].url, "https://fred.bugsplat.com/post/bp/crash/crashpad.php");
    assert_eq!(plans[0].annotations["product"], "myapp");
    assert_eq!(plans[0].annotations["version"], "1.2.3");
}

#[test]
fn missing_data_dir() {
    let mut fx = fixture();
    fx.app.data_dir = fx.app.data_dir.join("nope");

    let backend = MockBackend::default();
    let init = Initializer::new();

    match init.initialize_with(&fx.app, &fx.config, &backend) {
        Err(Error::DataDirMissing(dir)) => assert_eq!(dir, fx.app.data_dir),
        other => panic!("unexpected result {:?}", other),
    }

    assert!(!init.is_initialized());
    assert_eq!(backend.starts.load(Ordering::SeqCst), 0);
    assert!(!backend.uploads_enabled.load(Ordering::SeqCst));
}

#[test]
fn missing_handler() {
    let mut fx = fixture();
    let elsewhere = fx.app.data_dir.join("bin");
    std::fs::create_dir_all(&elsewhere).unwrap();
    fx.config.handler_dir = Some(elsewhere.clone());

    let backend = MockBackend::default();
    let init = Initializer::new();

    match init.initialize_with(&fx.app, &fx.config, &backend) {
        Err(Error::HandlerMissing(path)) => {
            assert_eq!(path, elsewhere.join(crashpad_client::HANDLER_NAME))
        }
        other => panic!("unexpected result {:?}", other),
    }

    assert!(!init.is_initialized());
    assert_eq!(backend.starts.load(Ordering::SeqCst), 0);
}

#[test]
fn second_initialization_fails() {
    let fx = fixture();
    let backend = MockBackend::default();
    let init = Initializer::new();

    init.initialize_with(&fx.app, &fx.config, &backend).unwrap();

    // Would be removed by an initialization that got past the guard
    let archive = stale_archive(&fx.app.data_dir);
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    std::fs::write(&archive, b"previous run").unwrap();

    assert!(matches!(
        init.initialize_with(&fx.app, &fx.config, &backend),
        Err(Error::AlreadyInitialized)
    ));

    assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
    assert_eq!(init.with_handler(|h| h.0), Some(0));
    assert!(archive.exists());
}

#[test]
fn stale_attachment_removed_before_start() {
    let fx = fixture();
    let archive = stale_archive(&fx.app.data_dir);
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    std::fs::write(&archive, b"previous run").unwrap();

    let backend = MockBackend::default();
    Initializer::new()
        .initialize_with(&fx.app, &fx.config, &backend)
        .unwrap();

    assert!(!archive.exists());
    assert_eq!(*backend.attachments_at_start.lock(), [false]);
    assert_eq!(backend.plans.lock()[0].attachments, [archive]);
}

#[test]
fn stale_attachment_kept_when_disabled() {
    let mut fx = fixture();
    fx.config.remove_stale_attachments = false;

    let archive = stale_archive(&fx.app.data_dir);
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    std::fs::write(&archive, b"previous run").unwrap();

    let backend = MockBackend::default();
    Initializer::new()
        .initialize_with(&fx.app, &fx.config, &backend)
        .unwrap();

    assert!(archive.exists());
    assert_eq!(*backend.attachments_at_start.lock(), [true]);
}

#[rstest]
#[case::database(Stage::Database)]
#[case::settings(Stage::Settings)]
#[case::start(Stage::Start)]
fn collaborator_failures(#[case] stage: Stage) {
    let fx = fixture();
    let init = Initializer::new();

    let failing = MockBackend::failing_at(stage);
    let res = init.initialize_with(&fx.app, &fx.config, &failing);

    match (stage, res) {
        (Stage::Database, Err(Error::Database(_))) => {}
        (Stage::Settings, Err(Error::Settings(_))) => {}
        (Stage::Start, Err(Error::HandlerStart(_))) => {}
        (stage, other) => panic!("unexpected result for {:?}: {:?}", stage, other),
    }

    assert!(!init.is_initialized());
    assert_eq!(failing.starts.load(Ordering::SeqCst), 0);

    // A failed initialization can be retried
    let backend = MockBackend::default();
    init.initialize_with(&fx.app, &fx.config, &backend).unwrap();
    assert!(init.is_initialized());
}

#[test]
fn shutdown_rearms() {
    let fx = fixture();
    let backend = MockBackend::default();
    let init = Initializer::new();

    init.initialize_with(&fx.app, &fx.config, &backend).unwrap();
    assert_eq!(init.shutdown(), Some(MockHandler(0)));
    assert!(!init.is_initialized());
    assert_eq!(init.shutdown(), None);

    init.initialize_with(&fx.app, &fx.config, &backend).unwrap();
    assert_eq!(init.with_handler(|h| h.0), Some(1));
}

#[test]
fn concurrent_initialization_starts_one_handler() {
    let fx = fixture();
    let backend = MockBackend::default();
    let init = Initializer::new();

    let succeeded = std::thread::scope(|s| {
        let threads: Vec<_> = (0..8)
            .map(|_| s.spawn(|| init.initialize_with(&fx.app, &fx.config, &backend).is_ok()))
            .collect();

        threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(succeeded, 1);
    assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
}
