use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Crashpad has already been initialized")]
    AlreadyInitialized,
    #[error("app data directory does not exist: {}", .0.display())]
    DataDirMissing(PathBuf),
    #[error("the handler does not exist: {}", .0.display())]
    HandlerMissing(PathBuf),
    /// The handler is located next to the running executable by default
    #[error("unable to locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to initialize the crash report database: {0}")]
    Database(#[source] crashpad_client::Error),
    #[error("failed to enable uploads in the database settings: {0}")]
    Settings(#[source] crashpad_client::Error),
    #[error("unable to start the handler: {0}")]
    HandlerStart(#[source] crashpad_client::Error),
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
