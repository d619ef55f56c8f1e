// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport URLs: `tcp://host:port`, `ipc://path`, `inproc://name`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Transport scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Tcp,
    Ipc,
    Inproc,
}

impl Scheme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Ipc => "ipc",
            Scheme::Inproc => "inproc",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("missing '://' separator in url: {0}")]
    MissingSeparator(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("missing or invalid port in url: {0}")]
    InvalidPort(String),
    #[error("empty host or path in url: {0}")]
    EmptyTarget(String),
}

/// Parsed transport URL.
///
/// For `ipc://` the "host" is a filesystem path, for `inproc://` an
/// arbitrary name; the port is only meaningful for `tcp://`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Url {
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: Scheme::Tcp,
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn ipc(path: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Ipc,
            host: path.into(),
            port: 0,
        }
    }

    #[must_use]
    pub fn inproc(name: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Inproc,
            host: name.into(),
            port: 0,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host, path or name depending on the scheme.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Same URL with another port (used to resolve ephemeral binds).
    #[must_use]
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            scheme: self.scheme,
            host: self.host.clone(),
            port,
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Tcp => write!(f, "tcp://{}:{}", self.host, self.port),
            Scheme::Ipc => write!(f, "ipc://{}", self.host),
            Scheme::Inproc => write!(f, "inproc://{}", self.host),
        }
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| UrlError::MissingSeparator(s.to_string()))?;

        let scheme = match scheme {
            "tcp" => Scheme::Tcp,
            "ipc" => Scheme::Ipc,
            "inproc" => Scheme::Inproc,
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        };

        if rest.is_empty() {
            return Err(UrlError::EmptyTarget(s.to_string()));
        }

        match scheme {
            Scheme::Tcp => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| UrlError::InvalidPort(s.to_string()))?;
                if host.is_empty() {
                    return Err(UrlError::EmptyTarget(s.to_string()));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| UrlError::InvalidPort(s.to_string()))?;
                Ok(Url::tcp(host, port))
            }
            Scheme::Ipc => Ok(Url::ipc(rest)),
            Scheme::Inproc => Ok(Url::inproc(rest)),
        }
    }
}
