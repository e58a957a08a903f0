mod connection;
mod database;
mod error;
mod options;
mod process;

pub use database::{CrashReportDatabase, Settings};
pub use error::Error;
pub use options::StartHandlerOptions;
pub use process::{HandlerProcess, START_GRACE_PERIOD};

use std::sync::atomic;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        /// The argument that hands the handler its end of the client connection
        pub const CONNECTION_FLAG: &str = "--initial-client-fd";
    } else if #[cfg(target_os = "macos")] {
        /// The argument that hands the handler its end of the client connection
        pub const CONNECTION_FLAG: &str = "--handshake-fd";
    } else {
        /// The argument that hands the handler its end of the client connection
        pub const CONNECTION_FLAG: &str = "--pipe-name";
    }
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// File name of the handler executable shipped with Crashpad
        pub const HANDLER_NAME: &str = "crashpad_handler.exe";
        /// File name of the database maintenance tool shipped with Crashpad
        pub const DATABASE_UTIL_NAME: &str = "crashpad_database_util.exe";
    } else {
        /// File name of the handler executable shipped with Crashpad
        pub const HANDLER_NAME: &str = "crashpad_handler";
        /// File name of the database maintenance tool shipped with Crashpad
        pub const DATABASE_UTIL_NAME: &str = "crashpad_database_util";
    }
}

/// Launches the out-of-process Crashpad handler that monitors this process
#[derive(Default)]
pub struct CrashpadClient {
    handler_started: atomic::AtomicBool,
}

impl CrashpadClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the handler process connected to this process. Only one
    /// handler can be started per client, though a failed start can be
    /// retried. A synchronous start only succeeds once the handler has
    /// stayed up for [`START_GRACE_PERIOD`].
    pub fn start_handler(&self, options: &StartHandlerOptions) -> Result<HandlerProcess, Error> {
        if self
            .handler_started
            .compare_exchange(false, true, atomic::Ordering::AcqRel, atomic::Ordering::Acquire)
            .is_err()
        {
            return Err(Error::HandlerAlreadyStarted);
        }

        tracing::debug!(
            handler = %options.handler.display(),
            asynchronous = options.asynchronous_start,
            "launching crash handler"
        );

        let res = HandlerProcess::launch(options.clone());
        if res.is_err() {
            self.handler_started.store(false, atomic::Ordering::Release);
        }
        res
    }
}
