use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("crashpad database tool '{}' does not exist", .0.display())]
    DatabaseToolMissing(PathBuf),
    #[error("crashpad database tool failed on '{}' ({status}): {stderr}", .database.display())]
    DatabaseTool {
        database: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("crash report database '{}' no longer exists", .0.display())]
    DatabaseMissing(PathBuf),
    #[error("Unable to start crash handler, only one is allowed per client")]
    HandlerAlreadyStarted,
    #[error("failed to spawn crash handler '{}': {source}", .handler.display())]
    Spawn {
        handler: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("crash handler exited right after starting ({0})")]
    HandlerExited(std::process::ExitStatus),
    #[error("crash handler is not running")]
    NotRunning,
    #[error("timed out waiting for the crash handler to start")]
    StartTimedOut,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
