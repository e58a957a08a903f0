use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Everything the handler process needs to know to monitor this process and
/// upload its crashes
#[derive(Clone, Debug, Default)]
pub struct StartHandlerOptions {
    /// Path to the `crashpad_handler` executable
    pub handler: PathBuf,
    /// Directory of the crash report database
    pub database: PathBuf,
    /// Directory the handler writes its own metrics to
    pub metrics_dir: PathBuf,
    /// Where crash reports are uploaded, no uploads happen if this is empty
    pub url: String,
    /// Key/value metadata posted with every report
    pub annotations: BTreeMap<String, String>,
    /// Additional arguments passed verbatim to the handler
    pub arguments: Vec<String>,
    /// Relaunch the handler if it dies
    pub restartable: bool,
    /// Don't block the caller while the handler is launched
    pub asynchronous_start: bool,
    /// Files uploaded alongside each report
    pub attachments: Vec<PathBuf>,
}

fn flag(name: &str, value: impl Into<OsString>) -> OsString {
    let mut arg = OsString::from(name);
    arg.push("=");
    arg.push(value.into());
    arg
}

impl StartHandlerOptions {
    /// Renders the handler's command line
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(
            3 + self.annotations.len() + self.attachments.len() + self.arguments.len(),
        );

        args.push(flag("--database", &self.database));
        args.push(flag("--metrics-dir", &self.metrics_dir));

        if !self.url.is_empty() {
            args.push(flag("--url", &self.url));
        }

        for (key, value) in &self.annotations {
            args.push(flag("--annotation", format!("{}={}", key, value)));
        }

        for attachment in &self.attachments {
            args.push(flag("--attachment", attachment));
        }

        args.extend(self.arguments.iter().map(OsString::from));
        args
    }
}
