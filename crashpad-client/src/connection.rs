//! The channel between this process and its handler. The handler refuses to
//! start without one, it is how it learns which process to monitor.

use std::ffi::OsString;
use std::process::Command;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
fn inherit_fd(cmd: &mut Command, fd: std::os::unix::io::RawFd) {
    use std::os::unix::process::CommandExt;

    // std opens everything close-on-exec, the handler's end has to survive
    // the exec
    unsafe {
        cmd.pre_exec(move || {
            if libc::fcntl(fd, libc::F_SETFD, 0) == -1 {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(())
            }
        });
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

        /// A `SOCK_SEQPACKET` socket pair, the handler gets one end as
        /// `--initial-client-fd` and this process keeps the other
        pub(crate) struct ClientConnection {
            client: OwnedFd,
            handler: Option<OwnedFd>,
        }

        impl ClientConnection {
            pub(crate) fn new() -> std::io::Result<Self> {
                let mut fds = [-1; 2];

                let ret = unsafe {
                    libc::socketpair(
                        libc::AF_UNIX,
                        libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
                        0,
                        fds.as_mut_ptr(),
                    )
                };

                if ret != 0 {
                    return Err(std::io::Error::last_os_error());
                }

                unsafe {
                    Ok(Self {
                        client: OwnedFd::from_raw_fd(fds[0]),
                        handler: Some(OwnedFd::from_raw_fd(fds[1])),
                    })
                }
            }

            pub(crate) fn handler_args(&self) -> Vec<OsString> {
                self.handler
                    .iter()
                    .map(|fd| format!("{}={}", crate::CONNECTION_FLAG, fd.as_raw_fd()).into())
                    .collect()
            }

            pub(crate) fn inherit(&self, cmd: &mut Command) {
                if let Some(fd) = &self.handler {
                    inherit_fd(cmd, fd.as_raw_fd());
                }
            }

            /// Called once the handler has been spawned, after this the
            /// handler owns its end exclusively
            pub(crate) fn register(&mut self, handler_pid: u32) {
                self.handler.take();

                // Under Yama only designated processes may ptrace us, and
                // the handler needs to in order to dump this process
                #[cfg(target_os = "linux")]
                unsafe {
                    if libc::prctl(libc::PR_SET_PTRACER, handler_pid as libc::c_ulong, 0, 0, 0) != 0 {
                        tracing::warn!(
                            "unable to allow crash handler {} to trace this process: {}",
                            handler_pid,
                            std::io::Error::last_os_error()
                        );
                    }
                }

                #[cfg(not(target_os = "linux"))]
                let _ = handler_pid;

                tracing::trace!(client_fd = self.client.as_raw_fd(), "registered with crash handler");
            }
        }
    } else if #[cfg(target_os = "macos")] {
        use std::os::unix::io::AsRawFd;
        use std::os::unix::net::UnixStream;

        /// The handler announces its Mach service over `--handshake-fd`
        pub(crate) struct ClientConnection {
            client: UnixStream,
            handler: Option<UnixStream>,
        }

        impl ClientConnection {
            pub(crate) fn new() -> std::io::Result<Self> {
                let (client, handler) = UnixStream::pair()?;
                Ok(Self {
                    client,
                    handler: Some(handler),
                })
            }

            pub(crate) fn handler_args(&self) -> Vec<OsString> {
                self.handler
                    .iter()
                    .map(|s| format!("{}={}", crate::CONNECTION_FLAG, s.as_raw_fd()).into())
                    .collect()
            }

            pub(crate) fn inherit(&self, cmd: &mut Command) {
                if let Some(s) = &self.handler {
                    inherit_fd(cmd, s.as_raw_fd());
                }
            }

            pub(crate) fn register(&mut self, _handler_pid: u32) {
                self.handler.take();
                tracing::trace!(client_fd = self.client.as_raw_fd(), "registered with crash handler");
            }
        }
    } else if #[cfg(windows)] {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static PIPE_COUNTER: AtomicUsize = AtomicUsize::new(0);

        /// The handler creates the named pipe given in `--pipe-name` and
        /// this process registers over it
        pub(crate) struct ClientConnection {
            pipe_name: String,
        }

        impl ClientConnection {
            pub(crate) fn new() -> std::io::Result<Self> {
                Ok(Self {
                    pipe_name: format!(
                        r"\\.\pipe\crashpad_{}_{}",
                        std::process::id(),
                        PIPE_COUNTER.fetch_add(1, Ordering::Relaxed)
                    ),
                })
            }

            pub(crate) fn handler_args(&self) -> Vec<OsString> {
                vec![format!("{}={}", crate::CONNECTION_FLAG, self.pipe_name).into()]
            }

            pub(crate) fn inherit(&self, _cmd: &mut Command) {}

            pub(crate) fn register(&mut self, _handler_pid: u32) {
                tracing::trace!(pipe = %self.pipe_name, "registered with crash handler");
            }
        }
    } else {
        pub(crate) struct ClientConnection;

        impl ClientConnection {
            pub(crate) fn new() -> std::io::Result<Self> {
                Ok(Self)
            }

            pub(crate) fn handler_args(&self) -> Vec<OsString> {
                Vec::new()
            }

            pub(crate) fn inherit(&self, _cmd: &mut Command) {}

            pub(crate) fn register(&mut self, _handler_pid: u32) {}
        }
    }
}
