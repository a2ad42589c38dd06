// src/app.rs
use crate::config::AppSpec;
use crate::error::{NibiruError, NibiruResult};
use crate::http;
use crate::parser::RequestLine;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::error;

/// Failure surfaced by an application callable. The text is logged
/// server-side and never reaches the client.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AppError(pub String);

/// The embedded application: given the parsed request-line fields and the
/// remainder of the first read, produce a complete HTTP response.
///
/// Implementations own whatever runtime they need; the server only requires
/// that construction is cheap enough to run once per worker and that calls
/// are serial.
pub trait Application: Send {
    fn handle(
        &mut self,
        method: &[u8],
        target: &[u8],
        version: &[u8],
        rest: &[u8],
    ) -> Result<Vec<u8>, AppError>;
}

/// Link-time registry entry tying an application specifier to a constructor.
/// Every worker builds its own instance from the factory.
pub struct AppFactory {
    pub module: &'static str,
    pub callable: &'static str,
    pub build: fn() -> Box<dyn Application>,
}

inventory::collect!(AppFactory);

/// Build a fresh application for the specifier. Preflight and worker
/// startup both come through here.
pub fn resolve(spec: &AppSpec) -> NibiruResult<Box<dyn Application>> {
    for factory in inventory::iter::<AppFactory> {
        if factory.module == spec.module && factory.callable == spec.callable {
            return Ok((factory.build)());
        }
    }
    Err(NibiruError::UnknownApplication(spec.to_string()))
}

/// Connection shim between the worker and the callable: invokes the
/// application and maps failures, panics included, to the canned 500.
pub fn handle_connection(
    app: &mut dyn Application,
    line: &RequestLine<'_>,
    rest: &[u8],
) -> Vec<u8> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        app.handle(line.method, line.target, line.version, rest)
    }));
    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!("application error: {err}");
            http::INTERNAL_ERROR.to_vec()
        }
        Err(_) => {
            error!("application panicked");
            http::INTERNAL_ERROR.to_vec()
        }
    }
}

/// Built-in sample application; `nibiru run demo` serves it.
pub struct DemoApp;

impl Application for DemoApp {
    fn handle(
        &mut self,
        method: &[u8],
        target: &[u8],
        _version: &[u8],
        _rest: &[u8],
    ) -> Result<Vec<u8>, AppError> {
        let body = format!(
            "nibiru demo: {} {}\n",
            String::from_utf8_lossy(method),
            String::from_utf8_lossy(target),
        );
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body,
        );
        Ok(response.into_bytes())
    }
}

inventory::submit! {
    AppFactory {
        module: "demo",
        callable: "app",
        build: || Box::new(DemoApp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_line() -> RequestLine<'static> {
        RequestLine {
            method: b"GET",
            target: b"/",
            version: b"HTTP/1.1",
            consumed: 0,
        }
    }

    #[test]
    fn test_resolve_demo_app() {
        let spec = AppSpec::parse("demo").unwrap();
        assert!(resolve(&spec).is_ok());
    }

    #[test]
    fn test_resolve_unknown_app() {
        let spec = AppSpec::parse("no.such.module:main").unwrap();
        assert!(matches!(
            resolve(&spec),
            Err(NibiruError::UnknownApplication(_))
        ));
    }

    #[test]
    fn test_demo_app_response() {
        let mut app = DemoApp;
        let response = app.handle(b"GET", b"/x", b"HTTP/1.1", b"").unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("nibiru demo: GET /x\n"));
    }

    struct FailingApp;

    impl Application for FailingApp {
        fn handle(&mut self, _: &[u8], _: &[u8], _: &[u8], _: &[u8]) -> Result<Vec<u8>, AppError> {
            Err(AppError("backend unavailable".to_string()))
        }
    }

    struct PanickingApp;

    impl Application for PanickingApp {
        fn handle(&mut self, _: &[u8], _: &[u8], _: &[u8], _: &[u8]) -> Result<Vec<u8>, AppError> {
            panic!("boom");
        }
    }

    #[test]
    fn test_shim_maps_error_to_500() {
        let mut app = FailingApp;
        let response = handle_connection(&mut app, &request_line(), b"");
        assert_eq!(response, http::INTERNAL_ERROR);
    }

    #[test]
    fn test_shim_catches_panic() {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let mut app = PanickingApp;
        let response = handle_connection(&mut app, &request_line(), b"");
        panic::set_hook(previous);
        assert_eq!(response, http::INTERNAL_ERROR);
    }
}
