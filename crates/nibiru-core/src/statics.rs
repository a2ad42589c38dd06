// src/statics.rs
use crate::config::ServerConfig;
use crate::error::NibiruResult;
use crate::http;
use crate::parser::RequestLine;
use crate::signal;
use crate::syscalls;
use libc::c_int;
use memchr::memchr;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

/// Upper bound on a delegated request frame.
const FRAME_BUF_SIZE: usize = 1024;

/// Chunk size for copying file bytes to the client.
const FILE_CHUNK_SIZE: usize = 8192;

/// MIME table, kept as data. Matched case-sensitively on the final
/// `.`-suffix of the resolved path.
const MIME_TYPES: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".htm", "text/html"),
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
    (".ico", "image/x-icon"),
    (".txt", "text/plain"),
    (".xml", "application/xml"),
];

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Where the delegation socket lives. The supervisor pid in the name lets
/// several servers coexist on one host.
pub fn socket_path(pid: u32) -> String {
    format!("/tmp/nibiru_static_{pid}.sock")
}

pub fn mime_type(path: &str) -> &'static str {
    let Some(dot) = path.rfind('.') else {
        return FALLBACK_MIME;
    };
    let ext = &path[dot..];
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
        .unwrap_or(FALLBACK_MIME)
}

/// A target is static iff it starts with the prefix and the next byte is
/// `/` or absent: `/staticfoo` is not static under `/static`.
pub fn is_static_request(target: &[u8], static_url: &str) -> bool {
    let prefix = static_url.as_bytes();
    if !target.starts_with(prefix) {
        return false;
    }
    matches!(target.get(prefix.len()), None | Some(&b'/'))
}

/// Map a static target onto the filesystem: strip the URL prefix, refuse
/// traversal, join onto the static root. None means 404.
pub fn resolve_static_path(target: &[u8], static_dir: &str, static_url: &str) -> Option<PathBuf> {
    let target = std::str::from_utf8(target).ok()?;
    let rest = target.strip_prefix(static_url)?;
    if rest.contains("..") {
        return None;
    }
    Some(PathBuf::from(format!("{static_dir}{rest}")))
}

// ---- Delegation protocol ----

/// Delegated request frame: NUL-terminated method, NUL-terminated target,
/// then a 4-byte descriptor payload kept for wire symmetry. The descriptor
/// that actually crosses the process boundary is the SCM_RIGHTS one.
pub fn serialize_request(method: &[u8], target: &[u8], client_fd: i32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(method.len() + target.len() + 2 + 4);
    frame.extend_from_slice(method);
    frame.push(0);
    frame.extend_from_slice(target);
    frame.push(0);
    frame.extend_from_slice(&client_fd.to_ne_bytes());
    frame
}

/// Decode a frame into (method, target, legacy descriptor payload).
pub fn deserialize_request(frame: &[u8]) -> Option<(&[u8], &[u8], i32)> {
    let method_end = memchr(0, frame)?;
    let rest = &frame[method_end + 1..];
    let target_end = memchr(0, rest)?;
    let tail = &rest[target_end + 1..];
    let payload: [u8; 4] = tail.get(..4)?.try_into().ok()?;
    Some((
        &frame[..method_end],
        &rest[..target_end],
        i32::from_ne_bytes(payload),
    ))
}

/// Hand a static request to the responder: one framed sendmsg that carries
/// the client descriptor, then a drain of the session until EOF. The drain
/// forwards any bytes a responder chooses to send back over the session
/// instead of writing to the handed-off descriptor.
pub fn delegate_static_request(
    socket_path: &str,
    line: &RequestLine<'_>,
    client_fd: c_int,
) -> NibiruResult<()> {
    let session = syscalls::connect_unix(socket_path)?;

    let frame = serialize_request(line.method, line.target, client_fd);
    if let Err(err) = syscalls::send_with_fd(session, &frame, client_fd) {
        syscalls::close(session);
        return Err(err);
    }

    let mut relay = [0u8; FILE_CHUNK_SIZE];
    loop {
        match syscalls::read(session, &mut relay) {
            Ok(0) => break,
            Ok(n) => {
                if syscalls::write_all(client_fd, &relay[..n]).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    syscalls::close(session);
    Ok(())
}

// ---- Responder process ----

/// The static-file responder: a long-lived process that owns the delegation
/// listener and answers one session at a time.
pub struct StaticResponder {
    static_dir: String,
    static_url: String,
}

impl StaticResponder {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            static_dir: config.static_dir.clone(),
            static_url: config.static_url.clone(),
        }
    }

    /// Process main loop. Returns when SIGTERM interrupts the accept.
    pub fn run(&self, delegation_fd: c_int) {
        info!(
            "static responder serving {} under {}",
            self.static_dir, self.static_url
        );
        loop {
            let session = match syscalls::accept_blocking(delegation_fd) {
                Ok(fd) => fd,
                Err(err) if err.is_interrupted() => {
                    if signal::shutdown_requested() {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    warn!("accept on delegation socket failed: {err}");
                    break;
                }
            };
            self.serve_session(session);
            syscalls::close(session);
        }
        info!("static responder exiting");
    }

    fn serve_session(&self, session: c_int) {
        let mut frame = [0u8; FRAME_BUF_SIZE];
        let (received, passed_fd) = match syscalls::recv_with_fd(session, &mut frame) {
            Ok(pair) => pair,
            Err(err) => {
                warn!("failed to receive delegated request: {err}");
                return;
            }
        };

        let Some((_method, target, _payload_fd)) = deserialize_request(&frame[..received]) else {
            warn!("malformed delegation frame ({received} bytes)");
            if let Some(fd) = passed_fd {
                syscalls::close(fd);
            }
            return;
        };

        // The duplicated descriptor is authoritative. A frame without
        // ancillary data is answered on the session itself; the sending
        // worker forwards those bytes to the client.
        let client_fd = passed_fd.unwrap_or(session);
        self.serve_file(client_fd, target);

        if let Some(fd) = passed_fd {
            syscalls::close(fd);
        }
    }

    fn serve_file(&self, client_fd: c_int, target: &[u8]) {
        let Some(path) = resolve_static_path(target, &self.static_dir, &self.static_url) else {
            let _ = syscalls::write_all(client_fd, http::NOT_FOUND);
            return;
        };

        let size = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                let _ = syscalls::write_all(client_fd, http::NOT_FOUND);
                return;
            }
        };
        let mut file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(_) => {
                let _ = syscalls::write_all(client_fd, http::NOT_FOUND);
                return;
            }
        };

        let header = http::file_header(mime_type(&path.to_string_lossy()), size);
        if syscalls::write_all(client_fd, header.as_bytes()).is_err() {
            return;
        }

        // Partial failures release the connection; nothing is retried.
        let mut chunk = [0u8; FILE_CHUNK_SIZE];
        loop {
            match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if syscalls::write_all(client_fd, &chunk[..n]).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }
}
