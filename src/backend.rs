use crate::{CrashpadConfig, LaunchPlan};
use crashpad_client::{CrashReportDatabase, CrashpadClient, Error, HandlerProcess};

/// A crash report database as seen by the initialization sequence
pub trait ReportDatabase {
    /// Gets the database settings and toggles automatic uploads in them
    fn set_uploads_enabled(&self, enabled: bool) -> Result<(), Error>;
}

impl ReportDatabase for CrashReportDatabase {
    fn set_uploads_enabled(&self, enabled: bool) -> Result<(), Error> {
        self.settings()?.set_uploads_enabled(enabled)
    }
}

/// The crash-capture implementation the initializer delegates to
pub trait Backend {
    type Database: ReportDatabase;
    /// Keeps the handler alive, stored for the rest of the process lifetime
    type Handler: Send;

    fn initialize_database(&self, plan: &LaunchPlan) -> Result<Self::Database, Error>;
    fn start_handler(&self, plan: &LaunchPlan) -> Result<Self::Handler, Error>;
}

/// Drives the real Crashpad executables that ship next to the handler.
///
/// Each backend owns a fresh [`CrashpadClient`], so the client's own
/// one-handler limit only applies within a single backend. Across calls the
/// [`Initializer`](crate::Initializer) slot is what prevents a second handler
/// from being started.
pub struct ProcessBackend {
    database_util_name: String,
    client: CrashpadClient,
}

impl ProcessBackend {
    pub fn new(config: &CrashpadConfig) -> Self {
        Self {
            database_util_name: config.database_util_name.clone(),
            client: CrashpadClient::new(),
        }
    }
}

impl Backend for ProcessBackend {
    type Database = CrashReportDatabase;
    type Handler = HandlerProcess;

    fn initialize_database(&self, plan: &LaunchPlan) -> Result<Self::Database, Error> {
        CrashReportDatabase::initialize(
            plan.handler.with_file_name(&self.database_util_name),
            &plan.reports_dir,
        )
    }

    fn start_handler(&self, plan: &LaunchPlan) -> Result<Self::Handler, Error> {
        self.client.start_handler(&plan.start_options())
    }
}
