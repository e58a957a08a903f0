//! Configures and starts Crashpad's out-of-process crash handler for a
//! desktop application, with reports uploaded to BugSplat.
//!
//! ```no_run
//! let app = crashpad_init::AppInfo {
//!     data_dir: "/home/me/.local/share/my-app".into(),
//!     database: "my-bugsplat-db".to_owned(),
//!     name: "my-app".to_owned(),
//!     version: "1.2.3".to_owned(),
//! };
//!
//! if let Err(e) = crashpad_init::initialize(&app) {
//!     eprintln!("crash reporting is unavailable: {}", e);
//! }
//! ```

mod backend;
mod config;
mod error;
mod initializer;
mod plan;

pub use backend::{Backend, ProcessBackend, ReportDatabase};
pub use config::CrashpadConfig;
pub use crashpad_client::{HandlerProcess, StartHandlerOptions};
pub use error::Error;
pub use initializer::{global, initialize, initialize_with_config, Initializer};
pub use plan::LaunchPlan;

use std::path::PathBuf;

/// Identifies the application whose crashes are reported
#[derive(Clone, Debug)]
pub struct AppInfo {
    /// The application's data directory, it must already exist
    pub data_dir: PathBuf,
    /// The BugSplat database crashes are posted to
    pub database: String,
    pub name: String,
    pub version: String,
}
