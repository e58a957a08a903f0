use crate::{AppInfo, Backend, CrashpadConfig, Error, LaunchPlan, ProcessBackend, ReportDatabase};
use crashpad_client::HandlerProcess;
use parking_lot::Mutex;
use std::path::Path;

static CRASHPAD: Initializer<HandlerProcess> = Initializer::new();

/// Initializes crash reporting for the process with the default config, see
/// [`initialize_with_config`]
pub fn initialize(app: &AppInfo) -> Result<(), Error> {
    initialize_with_config(app, &CrashpadConfig::default())
}

/// Initializes crash reporting for the process, starting the Crashpad handler
/// found in the configured handler directory.
///
/// Only the first successful call has any effect, every later call fails with
/// [`Error::AlreadyInitialized`]. None of the failures are fatal, the
/// application is expected to carry on without crash reporting.
pub fn initialize_with_config(app: &AppInfo, config: &CrashpadConfig) -> Result<(), Error> {
    CRASHPAD.initialize_with(app, config, &ProcessBackend::new(config))
}

/// The process-wide initializer used by [`initialize`]
pub fn global() -> &'static Initializer<HandlerProcess> {
    &CRASHPAD
}

/// Guards a crash handler so that only one is ever started at a time
pub struct Initializer<H> {
    handler: Mutex<Option<H>>,
}

impl<H> Default for Initializer<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Initializer<H> {
    pub const fn new() -> Self {
        Self {
            handler: parking_lot::const_mutex(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Calls `f` with the running handler, if there is one
    pub fn with_handler<R>(&self, f: impl FnOnce(&H) -> R) -> Option<R> {
        self.handler.lock().as_ref().map(f)
    }

    /// Gives up ownership of the handler, allowing initialization to happen
    /// again. Whether the handler process keeps running is up to `H`.
    pub fn shutdown(&self) -> Option<H> {
        self.handler.lock().take()
    }

    pub fn initialize_with<B>(
        &self,
        app: &AppInfo,
        config: &CrashpadConfig,
        backend: &B,
    ) -> Result<(), Error>
    where
        B: Backend<Handler = H>,
    {
        // Held for the whole sequence so concurrent callers can't both start
        // a handler
        let mut slot = self.handler.lock();

        if slot.is_some() {
            tracing::warn!("Crashpad has already been initialized");
            return Err(Error::AlreadyInitialized);
        }

        tracing::info!("Initializing Crashpad");

        if !app.data_dir.is_dir() {
            tracing::error!(
                "Crashpad: app data directory does not exist: {}",
                app.data_dir.display()
            );
            return Err(Error::DataDirMissing(app.data_dir.clone()));
        }

        let handler = config.handler_path().map_err(|e| {
            tracing::error!("Crashpad: {}", e);
            e
        })?;

        if !handler.is_file() {
            tracing::error!("Crashpad: the handler does not exist: {}", handler.display());
            return Err(Error::HandlerMissing(handler));
        }

        tracing::debug!("Crashpad: app data = {}", app.data_dir.display());
        tracing::debug!("Crashpad: database = {}", app.database);
        tracing::debug!("Crashpad: application = {}", app.name);
        tracing::debug!("Crashpad: version = {}", app.version);
        tracing::debug!("Crashpad: handler = {}", handler.display());

        let plan = LaunchPlan::new(app, config, handler);

        if config.remove_stale_attachments {
            for attachment in &plan.attachments {
                remove_stale(attachment);
            }
        }

        tracing::debug!("Crashpad: starting the crashpad client");
        plan.trace();

        let database = backend.initialize_database(&plan).map_err(|e| {
            tracing::error!("Crashpad: failed to initialize the crash report database: {}", e);
            Error::Database(e)
        })?;
        tracing::trace!("Crashpad: database initialized");

        database.set_uploads_enabled(true).map_err(|e| {
            tracing::error!("Crashpad: failed to get database settings: {}", e);
            Error::Settings(e)
        })?;
        tracing::trace!("Crashpad: upload enabled");

        let running = backend.start_handler(&plan).map_err(|e| {
            tracing::error!("Crashpad: unable to start the handler: {}", e);
            Error::HandlerStart(e)
        })?;

        tracing::debug!("Crashpad: handler started");
        *slot = Some(running);
        Ok(())
    }
}

/// Attachments are regenerated by the application, so anything at their
/// path now is left over from an earlier run
fn remove_stale(attachment: &Path) {
    if !attachment.exists() {
        return;
    }

    match std::fs::remove_file(attachment) {
        Ok(_) => tracing::debug!("Crashpad: removed stale attachment {}", attachment.display()),
        Err(e) => tracing::warn!(
            "Crashpad: unable to remove stale attachment {}: {}",
            attachment.display(),
            e
        ),
    }
}
