// src/config.rs
use crate::error::{NibiruError, NibiruResult};
use std::fmt;

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_STATIC_URL: &str = "/static";
pub const DEFAULT_CALLABLE: &str = "app";

/// Names the application the workers embed: `module.path:callable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
    pub module: String,
    pub callable: String,
}

impl AppSpec {
    /// Parse `module.path:callable`; the callable half defaults to `app`.
    pub fn parse(spec: &str) -> NibiruResult<Self> {
        let (module, callable) = match spec.split_once(':') {
            Some((module, callable)) => (module, callable),
            None => (spec, DEFAULT_CALLABLE),
        };
        if module.is_empty() || callable.is_empty() {
            return Err(NibiruError::Other(format!(
                "invalid application specifier {spec:?}, expected module.path:callable"
            )));
        }
        Ok(Self {
            module: module.to_string(),
            callable: callable.to_string(),
        })
    }
}

impl fmt::Display for AppSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.callable)
    }
}

/// Server configuration, immutable once the supervisor starts.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port, kept as a string because it is a getaddrinfo service name.
    pub port: String,

    /// Number of application worker processes to fork.
    pub workers: usize,

    /// Filesystem root the static responder serves from.
    pub static_dir: String,

    /// URL prefix that classifies a request as static.
    pub static_url: String,

    /// The application the workers embed.
    pub app: AppSpec,
}

impl ServerConfig {
    /// Configuration with all defaults; the CLI overrides individual fields.
    pub fn new(app: AppSpec) -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            workers: DEFAULT_WORKERS,
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            static_url: DEFAULT_STATIC_URL.to_string(),
            app,
        }
    }
}
