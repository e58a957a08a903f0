use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DATABASE_PLACEHOLDER: &str = "{database}";

/// Tunables for how the handler is located and launched. Every field has a
/// default, so an empty TOML document is a valid config.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CrashpadConfig {
    /// Upload endpoint, `{database}` is replaced with the database name
    pub upload_url: String,
    /// Directory under the app data directory that holds the report database
    pub database_dir: PathBuf,
    /// Directory containing the Crashpad executables, defaults to the
    /// directory of the running executable
    pub handler_dir: Option<PathBuf>,
    pub handler_name: String,
    pub database_util_name: String,
    /// Extra arguments for the handler
    pub arguments: Vec<String>,
    pub restartable: bool,
    pub asynchronous_start: bool,
    /// Files uploaded with each crash, relative paths are resolved against
    /// the app data directory
    pub attachments: Vec<PathBuf>,
    /// Delete attachments left over from a previous run before starting
    pub remove_stale_attachments: bool,
    /// Additional annotations, the ones BugSplat requires always take
    /// precedence over these
    pub annotations: BTreeMap<String, String>,
}

impl Default for CrashpadConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://{database}.bugsplat.com/post/bp/crash/crashpad.php".to_owned(),
            database_dir: PathBuf::from("crashpad"),
            handler_dir: None,
            handler_name: crashpad_client::HANDLER_NAME.to_owned(),
            database_util_name: crashpad_client::DATABASE_UTIL_NAME.to_owned(),
            // Disable rate limiting so that every crash gets a dump
            arguments: vec!["--no-rate-limit".to_owned()],
            restartable: true,
            asynchronous_start: true,
            attachments: vec![Path::new("export").join("buyouts.tgz")],
            remove_stale_attachments: true,
            annotations: BTreeMap::new(),
        }
    }
}

impl CrashpadConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn upload_url(&self, database: &str) -> String {
        self.upload_url.replace(DATABASE_PLACEHOLDER, database)
    }

    /// The full path the handler executable is expected at
    pub fn handler_path(&self) -> Result<PathBuf, Error> {
        let dir = match &self.handler_dir {
            Some(dir) => dir.clone(),
            None => {
                let exe = std::env::current_exe().map_err(Error::CurrentExe)?;
                exe.parent().map(Path::to_owned).unwrap_or_default()
            }
        };

        Ok(dir.join(&self.handler_name))
    }
}
