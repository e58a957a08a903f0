use crate::{connection::ClientConnection, Error, StartHandlerOptions};
use crossbeam::channel;
use parking_lot::Mutex;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// How long a freshly spawned handler must stay alive before it is
/// considered started. A handler given bad arguments exits well within this.
pub const START_GRACE_PERIOD: Duration = Duration::from_millis(250);

struct Handler {
    child: Child,
    _connection: ClientConnection,
}

enum Launch {
    /// An asynchronous start whose outcome hasn't been observed yet
    Pending(channel::Receiver<Result<Handler, Error>>),
    Running(Handler),
    Failed,
}

/// A running (or launching) `crashpad_handler` process.
///
/// The handler is meant to outlive the client so that it can still capture
/// and upload a crash of the monitored process, dropping this does **not**
/// terminate it.
pub struct HandlerProcess {
    options: StartHandlerOptions,
    launch: Mutex<Launch>,
}

/// Spawns the handler connected to this process and waits out the grace
/// period
fn spawn(options: &StartHandlerOptions) -> Result<Handler, Error> {
    let mut connection = ClientConnection::new()?;

    let mut cmd = Command::new(&options.handler);
    cmd.args(options.to_args())
        .args(connection.handler_args())
        .stdin(Stdio::null());
    connection.inherit(&mut cmd);

    let mut child = cmd.spawn().map_err(|source| Error::Spawn {
        handler: options.handler.clone(),
        source,
    })?;

    // Drops our copy of the handler's end, so nothing but the handler holds it
    connection.register(child.id());

    let deadline = Instant::now() + START_GRACE_PERIOD;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(Error::HandlerExited(status));
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
    }

    Ok(Handler {
        child,
        _connection: connection,
    })
}

impl HandlerProcess {
    pub(crate) fn launch(options: StartHandlerOptions) -> Result<Self, Error> {
        let launch = if options.asynchronous_start {
            let (tx, rx) = channel::bounded(1);
            let opts = options.clone();

            std::thread::Builder::new()
                .name("crashpad-handler-start".to_owned())
                .spawn(move || {
                    let res = spawn(&opts);
                    if let Err(e) = &res {
                        tracing::error!("failed to launch crash handler: {}", e);
                    }
                    let _ = tx.send(res);
                })?;

            Launch::Pending(rx)
        } else {
            Launch::Running(spawn(&options)?)
        };

        Ok(Self {
            options,
            launch: Mutex::new(launch),
        })
    }

    #[inline]
    pub fn options(&self) -> &StartHandlerOptions {
        &self.options
    }

    /// Blocks until an asynchronous start has either spawned the handler and
    /// seen it survive [`START_GRACE_PERIOD`], or failed to do so. Returns
    /// immediately for synchronous starts.
    pub fn wait_started(&self, timeout: Duration) -> Result<(), Error> {
        let mut launch = self.launch.lock();

        let res = match &*launch {
            Launch::Pending(rx) => match rx.recv_timeout(timeout) {
                Ok(res) => res,
                Err(channel::RecvTimeoutError::Timeout) => return Err(Error::StartTimedOut),
                Err(channel::RecvTimeoutError::Disconnected) => Err(Error::NotRunning),
            },
            Launch::Running(_) => return Ok(()),
            Launch::Failed => return Err(Error::NotRunning),
        };

        match res {
            Ok(handler) => {
                *launch = Launch::Running(handler);
                Ok(())
            }
            Err(e) => {
                *launch = Launch::Failed;
                Err(e)
            }
        }
    }

    /// The OS process id of the handler, `None` until it has been spawned
    pub fn pid(&self) -> Option<u32> {
        let mut launch = self.launch.lock();
        Self::settle(&mut launch);

        match &*launch {
            Launch::Running(handler) => Some(handler.child.id()),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        let mut launch = self.launch.lock();
        Self::settle(&mut launch);

        match &mut *launch {
            Launch::Running(handler) => matches!(handler.child.try_wait(), Ok(None)),
            _ => false,
        }
    }

    /// Relaunches the handler if it has died and was started as restartable.
    /// A launch that is still in flight counts as running.
    pub fn ensure_running(&self) -> Result<(), Error> {
        let mut launch = self.launch.lock();
        Self::settle(&mut launch);

        let exited = match &mut *launch {
            Launch::Pending(_) => return Ok(()),
            Launch::Running(handler) => match handler.child.try_wait()? {
                None => return Ok(()),
                Some(status) => Some(status),
            },
            Launch::Failed => None,
        };

        if !self.options.restartable {
            return Err(exited.map_or(Error::NotRunning, Error::HandlerExited));
        }

        match exited {
            Some(status) => tracing::info!("crash handler exited ({}), restarting", status),
            None => tracing::info!("crash handler failed to launch, retrying"),
        }

        match spawn(&self.options) {
            Ok(handler) => {
                *launch = Launch::Running(handler);
                Ok(())
            }
            Err(e) => {
                *launch = Launch::Failed;
                Err(e)
            }
        }
    }

    /// Kills the handler and reaps it
    pub fn terminate(&self) -> Result<(), Error> {
        let mut launch = self.launch.lock();

        if let Launch::Pending(rx) = &*launch {
            let next = match rx.recv() {
                Ok(Ok(handler)) => Launch::Running(handler),
                _ => Launch::Failed,
            };
            *launch = next;
        }

        if let Launch::Running(handler) = &mut *launch {
            if handler.child.try_wait()?.is_none() {
                handler.child.kill()?;
            }
            handler.child.wait()?;
        }

        *launch = Launch::Failed;
        Ok(())
    }

    fn settle(launch: &mut Launch) {
        let res = match &*launch {
            Launch::Pending(rx) => match rx.try_recv() {
                Ok(res) => res,
                Err(channel::TryRecvError::Empty) => return,
                Err(channel::TryRecvError::Disconnected) => Err(Error::NotRunning),
            },
            _ => return,
        };

        *launch = match res {
            Ok(handler) => Launch::Running(handler),
            Err(_) => Launch::Failed,
        };
    }
}
