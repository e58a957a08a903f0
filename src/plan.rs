use crate::{AppInfo, CrashpadConfig, Error};
use crashpad_client::StartHandlerOptions;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The fully resolved values handed to Crashpad
#[derive(Clone, Debug, Serialize)]
pub struct LaunchPlan {
    pub handler: PathBuf,
    pub reports_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub url: String,
    pub annotations: BTreeMap<String, String>,
    pub arguments: Vec<String>,
    pub restartable: bool,
    pub asynchronous_start: bool,
    pub attachments: Vec<PathBuf>,
}

impl LaunchPlan {
    pub fn new(app: &AppInfo, config: &CrashpadConfig, handler: PathBuf) -> Self {
        let reports_dir = app.data_dir.join(&config.database_dir);

        let mut annotations = config.annotations.clone();
        annotations.extend(
            [
                // Crashpad must save the crash as a minidump
                ("format", "minidump"),
                ("database", app.database.as_str()),
                ("product", app.name.as_str()),
                ("version", app.version.as_str()),
            ]
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
        );

        Self {
            handler,
            metrics_dir: reports_dir.clone(),
            reports_dir,
            url: config.upload_url(&app.database),
            annotations,
            arguments: config.arguments.clone(),
            restartable: config.restartable,
            asynchronous_start: config.asynchronous_start,
            attachments: config
                .attachments
                .iter()
                .map(|a| app.data_dir.join(a))
                .collect(),
        }
    }

    /// Resolves the plan without checking any of the preconditions
    pub fn resolve(app: &AppInfo, config: &CrashpadConfig) -> Result<Self, Error> {
        Ok(Self::new(app, config, config.handler_path()?))
    }

    pub fn start_options(&self) -> StartHandlerOptions {
        StartHandlerOptions {
            handler: self.handler.clone(),
            database: self.reports_dir.clone(),
            metrics_dir: self.metrics_dir.clone(),
            url: self.url.clone(),
            annotations: self.annotations.clone(),
            arguments: self.arguments.clone(),
            restartable: self.restartable,
            asynchronous_start: self.asynchronous_start,
            attachments: self.attachments.clone(),
        }
    }

    pub(crate) fn trace(&self) {
        tracing::trace!("Crashpad: handler = {}", self.handler.display());
        tracing::trace!("Crashpad: reportsDir = {}", self.reports_dir.display());
        tracing::trace!("Crashpad: metricsDir = {}", self.metrics_dir.display());
        tracing::trace!("Crashpad: url = {}", self.url);
        for (key, value) in &self.annotations {
            tracing::trace!("Crashpad: annotations[{}] = {}", key, value);
        }
        for (i, arg) in self.arguments.iter().enumerate() {
            tracing::trace!("Crashpad: arguments[{}] = {}", i, arg);
        }
        tracing::trace!("Crashpad: restartable = {}", self.restartable);
        tracing::trace!("Crashpad: asynchronous_start = {}", self.asynchronous_start);
        for (i, attachment) in self.attachments.iter().enumerate() {
            tracing::trace!("Crashpad: attachments[{}] = {}", i, attachment.display());
        }
    }
}
