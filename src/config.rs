//! Service configuration read from the environment once at startup.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use log::warn;

pub const DEFAULT_PORT: u16 = 5000;

/// Startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    /// Trained artifact. Must exist.
    pub model_path: PathBuf,
    /// Optional schema metadata.
    pub meta_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Static frontend, served only if the directory exists.
    pub frontend_dir: PathBuf,
    /// `*` or a comma-separated origin list.
    pub cors_origin: String,
    /// Enable the standard derivation rules.
    pub derived_features: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
            meta_path: PathBuf::from("model_meta.json"),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            frontend_dir: PathBuf::from("frontend"),
            cors_origin: "*".to_string(),
            derived_features: true,
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!("ignoring invalid PORT {raw:?}, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => defaults.port,
        };

        Self {
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            meta_path: lookup("META_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.meta_path),
            host: lookup("HOST")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            port,
            frontend_dir: lookup("FRONTEND_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frontend_dir),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            derived_features: parse_bool(lookup("DERIVED_FEATURES"), defaults.derived_features),
        }
    }

    /// Socket address to bind.
    ///
    /// IP literals are used as given; any other host is resolved and the
    /// first address wins. A host that does not resolve is an error.
    pub fn bind_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("HOST {:?} resolved to no addresses", self.host),
                )
            })
    }

    /// File name reported by the health endpoint.
    pub fn model_name(&self) -> String {
        self.model_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model_path.display().to_string())
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
