use std::fmt;

/// Origin used to share one rate limiter and breaker per remote host.
///
/// URLs are normalised down to `(scheme, host, port)` so every path on the
/// same origin (chapter pages, image CDN paths) shares the same guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl HostKey {
    /// Construct a host key from a URL string. `None` for URLs without a
    /// host or a known default port.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let port = parsed.port_or_known_default()?;
        Some(Self {
            scheme: parsed.scheme().to_string(),
            host,
            port,
        })
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
