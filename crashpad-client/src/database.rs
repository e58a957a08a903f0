use crate::Error;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A handle to a Crashpad crash report database on disk.
///
/// The on-disk layout is owned by Crashpad, all operations go through the
/// `crashpad_database_util` tool that ships alongside the handler.
#[derive(Debug, Clone)]
pub struct CrashReportDatabase {
    tool: PathBuf,
    path: PathBuf,
}

impl CrashReportDatabase {
    /// Creates the database at `path` if it does not exist yet, or opens the
    /// existing one.
    pub fn initialize<T, P>(tool: T, path: P) -> Result<Self, Error>
    where
        T: Into<PathBuf>,
        P: Into<PathBuf>,
    {
        let tool = tool.into();
        let path = path.into();

        if !tool.is_file() {
            return Err(Error::DatabaseToolMissing(tool));
        }

        // The tool creates the leaf directory but not its parents
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self { tool, path };
        db.run(&["--create"])?;

        tracing::trace!(database = %db.path.display(), "crash report database ready");
        Ok(db)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the settings of this database, this fails if the database has
    /// been removed from under us since it was initialized.
    pub fn settings(&self) -> Result<Settings<'_>, Error> {
        if !self.path.is_dir() {
            return Err(Error::DatabaseMissing(self.path.clone()));
        }

        Ok(Settings { db: self })
    }

    fn run(&self, args: &[&str]) -> Result<(), Error> {
        let mut database_arg = std::ffi::OsString::from("--database=");
        database_arg.push(&self.path);

        let output = Command::new(&self.tool)
            .arg(database_arg)
            .args(args)
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::DatabaseTool {
                database: self.path.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

/// The persistent settings of a [`CrashReportDatabase`]
pub struct Settings<'db> {
    db: &'db CrashReportDatabase,
}

impl<'db> Settings<'db> {
    /// Toggles whether the handler uploads captured reports
    pub fn set_uploads_enabled(&self, enabled: bool) -> Result<(), Error> {
        let arg = if enabled {
            "--set-uploads-enabled=true"
        } else {
            "--set-uploads-enabled=false"
        };

        self.db.run(&[arg])
    }
}
