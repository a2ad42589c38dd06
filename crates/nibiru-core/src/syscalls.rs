// src/syscalls.rs
use crate::error::{NibiruError, NibiruResult};
use libc::{c_int, c_void, socklen_t};
use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::ptr;

/// Backlog for the shared TCP listener.
pub const LISTEN_BACKLOG: c_int = 128;

/// Backlog for the delegation socket; sessions are short and serial.
const DELEGATION_BACKLOG: c_int = 10;

// ---- TCP listener ----

/// Resolve the listen address and bind the shared TCP listener.
///
/// Walks the getaddrinfo candidates (passive hints, any family, stream type)
/// and keeps the first socket that binds. SO_REUSEADDR is set on every
/// candidate so a restart can reclaim the port immediately.
pub fn bind_listen_socket(port: &str) -> NibiruResult<c_int> {
    let service = CString::new(port).map_err(|_| NibiruError::Bind(port.to_string()))?;

    unsafe {
        let mut hints: libc::addrinfo = mem::zeroed();
        hints.ai_flags = libc::AI_PASSIVE;
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;

        let mut info: *mut libc::addrinfo = ptr::null_mut();
        let status = libc::getaddrinfo(ptr::null(), service.as_ptr(), &hints, &mut info);
        if status != 0 {
            let detail = CStr::from_ptr(libc::gai_strerror(status))
                .to_string_lossy()
                .into_owned();
            return Err(NibiruError::Resolve {
                port: port.to_string(),
                detail,
            });
        }

        let mut fd: c_int = -1;
        let mut candidate = info;
        while !candidate.is_null() {
            let ai = &*candidate;
            let sock = libc::socket(ai.ai_family, ai.ai_socktype, ai.ai_protocol);
            if sock >= 0 {
                let one: c_int = 1;
                libc::setsockopt(
                    sock,
                    libc::SOL_SOCKET,
                    libc::SO_REUSEADDR,
                    &one as *const _ as *const c_void,
                    mem::size_of_val(&one) as socklen_t,
                );
                if libc::bind(sock, ai.ai_addr, ai.ai_addrlen) == 0 {
                    fd = sock;
                    break;
                }
                libc::close(sock);
            }
            candidate = ai.ai_next;
        }
        libc::freeaddrinfo(info);

        if fd < 0 {
            return Err(NibiruError::Bind(port.to_string()));
        }

        if libc::listen(fd, LISTEN_BACKLOG) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        Ok(fd)
    }
}

/// Blocking accept. EINTR surfaces as io::ErrorKind::Interrupted so callers
/// can re-check the shutdown flag.
pub fn accept_blocking(listen_fd: c_int) -> NibiruResult<c_int> {
    unsafe {
        let fd = libc::accept(listen_fd, ptr::null_mut(), ptr::null_mut());
        if fd < 0 {
            Err(io::Error::last_os_error().into())
        } else {
            Ok(fd)
        }
    }
}

/// The bound port, recovered from the socket; useful once "0" was requested.
pub fn local_port(fd: c_int) -> NibiruResult<u16> {
    unsafe {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_storage>() as socklen_t;
        if libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len) < 0 {
            return Err(io::Error::last_os_error().into());
        }
        match storage.ss_family as c_int {
            libc::AF_INET => {
                let sin = &*(&storage as *const _ as *const libc::sockaddr_in);
                Ok(u16::from_be(sin.sin_port))
            }
            libc::AF_INET6 => {
                let sin6 = &*(&storage as *const _ as *const libc::sockaddr_in6);
                Ok(u16::from_be(sin6.sin6_port))
            }
            family => Err(NibiruError::Other(format!(
                "unexpected socket family {family}"
            ))),
        }
    }
}

pub fn set_cloexec(fd: c_int) -> NibiruResult<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD, 0);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error().into());
        }
    }
    Ok(())
}

// ---- Blocking I/O ----

/// One blocking read, retried only on EINTR: an in-flight request finishes
/// even while shutdown is pending.
pub fn read(fd: c_int, buf: &mut [u8]) -> NibiruResult<usize> {
    loop {
        let res = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut c_void, buf.len()) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        return Ok(res as usize);
    }
}

/// Write the whole buffer, resuming partial writes and retrying EINTR.
pub fn write_all(fd: c_int, mut buf: &[u8]) -> NibiruResult<()> {
    while !buf.is_empty() {
        let res = unsafe { libc::write(fd, buf.as_ptr() as *const c_void, buf.len()) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        if res == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "zero-length write").into());
        }
        buf = &buf[res as usize..];
    }
    Ok(())
}

pub fn close(fd: c_int) {
    unsafe {
        libc::close(fd);
    }
}

// ---- Unix domain sockets ----

fn unix_addr(path: &str) -> NibiruResult<libc::sockaddr_un> {
    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    let bytes = path.as_bytes();
    // One byte reserved for the NUL terminator.
    if bytes.len() >= addr.sun_path.len() {
        return Err(NibiruError::Other(format!("socket path too long: {path}")));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(addr)
}

/// Create the delegation listener: unlink any stale socket file from a dirty
/// shutdown, then bind and listen.
pub fn create_unix_listener(path: &str) -> NibiruResult<c_int> {
    let addr = unix_addr(path)?;
    unsafe {
        let fd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let _ = std::fs::remove_file(path);
        if libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_un>() as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }
        if libc::listen(fd, DELEGATION_BACKLOG) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }
        Ok(fd)
    }
}

pub fn connect_unix(path: &str) -> NibiruResult<c_int> {
    let addr = unix_addr(path)?;
    unsafe {
        let fd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        if libc::connect(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_un>() as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }
        Ok(fd)
    }
}

// ---- Descriptor passing ----

/// Send `data` and duplicate `fd` into the receiving process, both on the
/// same sendmsg: the descriptor rides as SCM_RIGHTS ancillary data.
pub fn send_with_fd(sock: c_int, data: &[u8], fd: c_int) -> NibiruResult<()> {
    let mut iov = libc::iovec {
        iov_base: data.as_ptr() as *mut c_void,
        iov_len: data.len(),
    };

    let space = unsafe { libc::CMSG_SPACE(mem::size_of::<c_int>() as libc::c_uint) } as usize;
    let mut cmsg_buf = vec![0u8; space];

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut c_void;
    msg.msg_controllen = space as _;

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() {
            return Err(NibiruError::Other("no room for control message".to_string()));
        }
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<c_int>() as libc::c_uint) as _;
        ptr::copy_nonoverlapping(&fd as *const c_int, libc::CMSG_DATA(cmsg) as *mut c_int, 1);

        if libc::sendmsg(sock, &msg, 0) < 0 {
            return Err(io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Receive one message; returns the bytes read and the descriptor the kernel
/// duplicated into this process, if the sender attached one.
pub fn recv_with_fd(sock: c_int, buf: &mut [u8]) -> NibiruResult<(usize, Option<c_int>)> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut c_void,
        iov_len: buf.len(),
    };

    let space = unsafe { libc::CMSG_SPACE(mem::size_of::<c_int>() as libc::c_uint) } as usize;
    let mut cmsg_buf = vec![0u8; space];

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut c_void;
    msg.msg_controllen = space as _;

    unsafe {
        let received = loop {
            let res = libc::recvmsg(sock, &mut msg, 0);
            if res < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }
            break res as usize;
        };

        let mut passed = None;
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if !cmsg.is_null()
            && (*cmsg).cmsg_level == libc::SOL_SOCKET
            && (*cmsg).cmsg_type == libc::SCM_RIGHTS
        {
            passed = Some(*(libc::CMSG_DATA(cmsg) as *const c_int));
        }

        Ok((received, passed))
    }
}

// ---- Processes and signals ----

pub enum Fork {
    Parent(libc::pid_t),
    Child,
}

pub fn fork() -> NibiruResult<Fork> {
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        Err(io::Error::last_os_error().into())
    } else if pid == 0 {
        Ok(Fork::Child)
    } else {
        Ok(Fork::Parent(pid))
    }
}

pub fn kill_term(pid: libc::pid_t) -> NibiruResult<()> {
    unsafe {
        if libc::kill(pid, libc::SIGTERM) < 0 {
            return Err(io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Sleep until any signal is delivered.
pub fn pause() {
    unsafe {
        libc::pause();
    }
}
