// src/supervisor.rs
use crate::config::ServerConfig;
use crate::error::NibiruResult;
use crate::signal;
use crate::statics::{self, StaticResponder};
use crate::syscalls::{self, Fork};
use crate::worker::{self, Worker};
use std::fs;
use std::process;
use tracing::{info, warn};

/// One forked worker as the supervisor tracks it; pid -1 marks an absent
/// slot. Single-writer: only the supervisor touches the pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSlot {
    pub pid: libc::pid_t,
    pub index: usize,
}

/// The supervising parent: binds, forks the responder and the worker pool,
/// then sleeps until signalled and tears everything down.
pub struct Supervisor {
    config: ServerConfig,
}

impl Supervisor {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn run(self) -> NibiruResult<()> {
        let socket_path = statics::socket_path(process::id());

        // Preflight: a throwaway worker proves the application specifier
        // resolves before anything forks.
        Worker::init(0, &self.config, &socket_path).map(drop)?;

        signal::install_supervisor_handlers()?;

        let listen_fd = syscalls::bind_listen_socket(&self.config.port)?;

        let delegation_fd = match syscalls::create_unix_listener(&socket_path) {
            Ok(fd) => fd,
            Err(err) => {
                syscalls::close(listen_fd);
                return Err(err);
            }
        };

        let static_pid = match syscalls::fork() {
            Ok(Fork::Child) => {
                // The responder never touches the TCP listener.
                syscalls::close(listen_fd);
                if let Err(err) = signal::install_worker_handlers() {
                    warn!("static responder: failed to install signal handlers: {err}");
                }
                StaticResponder::new(&self.config).run(delegation_fd);
                process::exit(0);
            }
            Ok(Fork::Parent(pid)) => pid,
            Err(err) => {
                syscalls::close(listen_fd);
                syscalls::close(delegation_fd);
                let _ = fs::remove_file(&socket_path);
                return Err(err);
            }
        };
        // Workers reach the responder through the socket path, not this fd.
        syscalls::close(delegation_fd);

        let mut pool: Vec<WorkerSlot> = Vec::with_capacity(self.config.workers);
        for index in 0..self.config.workers {
            match syscalls::fork() {
                Ok(Fork::Child) => {
                    let code = worker::worker_main(index, &self.config, listen_fd, &socket_path);
                    process::exit(code);
                }
                Ok(Fork::Parent(pid)) => pool.push(WorkerSlot { pid, index }),
                Err(err) => {
                    warn!("failed to fork worker {index}: {err}");
                    pool.push(WorkerSlot { pid: -1, index });
                }
            }
        }

        info!(
            "nibiru serving on port {} with {} workers, app {}",
            self.config.port,
            pool.iter().filter(|slot| slot.pid > 0).count(),
            self.config.app,
        );

        while !signal::shutdown_requested() {
            syscalls::pause();
        }

        info!("shutting down");
        teardown(static_pid, &mut pool);
        syscalls::close(listen_fd);
        let _ = fs::remove_file(&socket_path);
        Ok(())
    }
}

/// Signal every recorded child and empty the pool. Children exit on their
/// own once the current request, if any, completes.
fn teardown(static_pid: libc::pid_t, pool: &mut [WorkerSlot]) {
    if static_pid > 0 {
        if let Err(err) = syscalls::kill_term(static_pid) {
            warn!("failed to signal static responder {static_pid}: {err}");
        }
    }
    for slot in pool.iter_mut() {
        if slot.pid > 0 {
            if let Err(err) = syscalls::kill_term(slot.pid) {
                warn!("failed to signal worker {}: {err}", slot.index);
            }
        }
        slot.pid = -1;
    }
}
