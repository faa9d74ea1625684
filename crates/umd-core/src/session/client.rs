//! Curl easy handle configured as a long-lived client session.

use std::fmt;
use std::time::Duration;

use curl::easy::{Easy, List};

use crate::config::DownloadConfig;
use crate::retry::FetchError;

/// Receive buffer size; streamed bodies arrive in chunks of at most this size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Options applied to every session created by a pool.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Upper bound on a whole request; a stalled transfer also fails after this long.
    pub request_timeout: Duration,
    /// Headers sent with every request (`Name`, `value`).
    pub headers: Vec<(String, String)>,
    /// Raw `Cookie` header value passed through to every request.
    pub cookies: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(cfg: &DownloadConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            connect_timeout: cfg.connect_timeout(),
            request_timeout: cfg.request_timeout(),
            headers: Vec::new(),
            cookies: None,
        }
    }
}

/// Status and headers of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    pub content_type: Option<String>,
    pub bytes: u64,
}

pub struct HttpSession {
    id: u64,
    transient: bool,
    easy: Easy,
    default_headers: Vec<String>,
}

impl fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSession")
            .field("id", &self.id)
            .field("transient", &self.transient)
            .finish()
    }
}

impl HttpSession {
    /// Create a session. Transient sessions are closed on release instead of pooled.
    pub fn new(id: u64, settings: &SessionSettings, transient: bool) -> Result<Self, curl::Error> {
        let mut easy = Easy::new();
        easy.useragent(&settings.user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(settings.connect_timeout)?;
        easy.timeout(settings.request_timeout)?;
        easy.low_speed_limit(1)?;
        easy.low_speed_time(settings.request_timeout)?;
        easy.buffer_size(CHUNK_SIZE)?;
        easy.accept_encoding("")?;
        easy.fail_on_error(true)?;
        // Empty path enables the in-memory cookie engine for this handle.
        easy.cookie_file("")?;
        if let Some(cookies) = &settings.cookies {
            easy.cookie(cookies)?;
        }
        let default_headers = settings
            .headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k.trim(), v.trim()))
            .collect();
        Ok(Self {
            id,
            transient,
            easy,
            default_headers,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// GET `url` and return the body as text (invalid UTF-8 is replaced).
    pub fn get_text(&mut self, url: &str, headers: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut body = Vec::new();
        self.get_streaming(url, headers, |chunk| {
            body.extend_from_slice(chunk);
            Ok(())
        })?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// GET `url`, handing each received chunk to `sink`.
    ///
    /// If `sink` returns an error the transfer is aborted and that error is
    /// returned. Non-2xx responses fail with `FetchError::Http` before any
    /// body reaches the sink.
    pub fn get_streaming<F>(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        mut sink: F,
    ) -> Result<Response, FetchError>
    where
        F: FnMut(&[u8]) -> Result<(), FetchError>,
    {
        self.easy.url(url)?;
        self.easy.get(true)?;
        let mut list = List::new();
        for h in &self.default_headers {
            list.append(h)?;
        }
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        self.easy.http_headers(list)?;

        let mut received = 0u64;
        let mut stopped: Option<FetchError> = None;
        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.write_function(|data| match sink(data) {
                Ok(()) => {
                    received += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    stopped = Some(e);
                    // Short count aborts the transfer.
                    Ok(0)
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = stopped {
            return Err(e);
        }
        if let Err(e) = performed {
            if e.is_http_returned_error() {
                let code = self.easy.response_code().unwrap_or(0);
                return Err(FetchError::Http(code));
            }
            return Err(FetchError::Curl(e));
        }

        let status = self.easy.response_code()?;
        if !(200..300).contains(&status) {
            return Err(FetchError::Http(status));
        }
        let content_type = self.easy.content_type()?.map(str::to_string);
        Ok(Response {
            status,
            content_type,
            bytes: received,
        })
    }
}
