// src/worker.rs
use crate::app::{self, Application};
use crate::config::ServerConfig;
use crate::error::NibiruResult;
use crate::http;
use crate::parser::parse_request_line;
use crate::signal;
use crate::statics;
use crate::syscalls;
use libc::c_int;
use tracing::{error, info, warn};

/// Size of the single read taken from each connection. Whatever does not fit
/// is never seen by the application.
pub const RECV_BUF_SIZE: usize = 10000;

/// One application worker: shares the listening socket with its siblings and
/// serves one connection at a time.
pub struct Worker {
    id: usize,
    config: ServerConfig,
    socket_path: String,
    app: Box<dyn Application>,
}

impl Worker {
    /// Build worker state: resolve the configured application and hold a
    /// fresh instance. Supervisor preflight runs exactly this and discards
    /// the result.
    pub fn init(id: usize, config: &ServerConfig, socket_path: &str) -> NibiruResult<Self> {
        let app = app::resolve(&config.app)?;
        Ok(Self {
            id,
            config: config.clone(),
            socket_path: socket_path.to_string(),
            app,
        })
    }

    /// Accept-and-serve until SIGTERM interrupts the accept.
    pub fn run(&mut self, listen_fd: c_int) {
        info!("worker {} accepting", self.id);
        loop {
            let client_fd = match syscalls::accept_blocking(listen_fd) {
                Ok(fd) => fd,
                Err(err) if err.is_interrupted() => {
                    if signal::shutdown_requested() {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    warn!("worker {}: accept failed: {err}", self.id);
                    continue;
                }
            };
            if let Err(err) = syscalls::set_cloexec(client_fd) {
                warn!("worker {}: could not set close-on-exec: {err}", self.id);
            }
            self.serve(client_fd);
            syscalls::close(client_fd);
        }
        info!("worker {} exiting", self.id);
    }

    fn serve(&mut self, client_fd: c_int) {
        let mut buf = [0u8; RECV_BUF_SIZE];
        let received = match syscalls::read(client_fd, &mut buf) {
            Ok(n) => n,
            Err(err) => {
                warn!("worker {}: recv failed: {err}", self.id);
                return;
            }
        };
        if received == 0 {
            // Peer closed without sending anything; no response owed.
            return;
        }

        let line = match parse_request_line(&buf[..received]) {
            Ok(line) => line,
            Err(err) => {
                let _ = syscalls::write_all(client_fd, http::error_response(err));
                return;
            }
        };

        if statics::is_static_request(line.target, &self.config.static_url) {
            if let Err(err) = statics::delegate_static_request(&self.socket_path, &line, client_fd)
            {
                warn!("worker {}: delegation failed: {err}", self.id);
            }
            return;
        }

        let rest = &buf[line.consumed..received];
        let response = app::handle_connection(self.app.as_mut(), &line, rest);
        if let Err(err) = syscalls::write_all(client_fd, &response) {
            warn!("worker {}: send failed: {err}", self.id);
        }
    }
}

/// Child-process entry point: install signal dispositions, pin to a core,
/// serve until shutdown. The exit code becomes the process status.
pub fn worker_main(id: usize, config: &ServerConfig, listen_fd: c_int, socket_path: &str) -> i32 {
    if let Err(err) = signal::install_worker_handlers() {
        error!("worker {id}: failed to install signal handlers: {err}");
        return 1;
    }
    let mut worker = match Worker::init(id, config, socket_path) {
        Ok(worker) => worker,
        Err(err) => {
            error!("worker {id}: initialization failed: {err}");
            return 1;
        }
    };
    if let Some(cores) = core_affinity::get_core_ids() {
        if !cores.is_empty() {
            core_affinity::set_for_current(cores[id % cores.len()]);
        }
    }
    worker.run(listen_fd);
    0
}
