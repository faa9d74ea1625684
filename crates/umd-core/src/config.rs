use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;

pub const MIN_CHAPTER_WORKERS: usize = 1;
pub const MAX_CHAPTER_WORKERS: usize = 10;
pub const MIN_IMAGE_WORKERS: usize = 1;
pub const MAX_IMAGE_WORKERS: usize = 32;

/// Download pipeline parameters (`[download]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Chapters downloaded in parallel (clamped to 1..=10).
    pub chapter_workers: usize,
    /// Image threads per chapter (clamped to 1..=32).
    pub image_workers: usize,
    /// Process-wide cap on in-flight image transfers across all chapters.
    pub max_total_image_workers: usize,
    /// Overall timeout per HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout per HTTP request, in seconds.
    pub connect_timeout_secs: u64,
    /// Retries after the first attempt for page and image requests.
    pub max_retries: u32,
    /// Base backoff delay in seconds; attempt n waits `retry_delay_secs * 2^n`.
    pub retry_delay_secs: f64,
    /// Upper bound on a single backoff sleep, in seconds.
    pub max_retry_delay_secs: u64,
    /// Remove the chapter directory when a job fails after creating it.
    pub cleanup_on_failure: bool,
    /// Root directory for chapter folders (None = current directory).
    pub download_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chapter_workers: 1,
            image_workers: 4,
            max_total_image_workers: 8,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 1.0,
            max_retry_delay_secs: 60,
            cleanup_on_failure: true,
            download_dir: None,
            user_agent: format!("umd/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloadConfig {
    pub fn chapter_worker_count(&self) -> usize {
        self.chapter_workers
            .clamp(MIN_CHAPTER_WORKERS, MAX_CHAPTER_WORKERS)
    }

    pub fn global_image_limit(&self) -> usize {
        self.max_total_image_workers
            .clamp(MIN_IMAGE_WORKERS, MAX_IMAGE_WORKERS)
    }

    /// Local image pool size for one chapter: `min(image_workers, global limit)`.
    pub fn image_worker_count(&self) -> usize {
        self.image_workers
            .clamp(MIN_IMAGE_WORKERS, MAX_IMAGE_WORKERS)
            .min(self.global_image_limit())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: Duration::from_secs_f64(self.retry_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_retry_delay_secs),
        }
    }

    /// Directory chapter folders are created under; `./downloads` when unset.
    pub fn download_root(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }
}

/// Session pool parameters (`[session_pool]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPoolConfig {
    /// Maximum pooled sessions (0 = unlimited).
    pub max_size: usize,
    /// How long `acquire` waits for a pooled session before going transient.
    pub wait_timeout_secs: f64,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            wait_timeout_secs: 30.0,
        }
    }
}

impl SessionPoolConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wait_timeout_secs.max(0.0))
    }
}

/// Per-host token bucket (`[rate_limit]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 4.0,
            burst: 4,
        }
    }
}

impl RateLimitConfig {
    /// Seconds per token, as the limiter expects.
    pub fn seconds_per_token(&self) -> f64 {
        if self.requests_per_second > 0.0 {
            1.0 / self.requests_per_second
        } else {
            1.0
        }
    }
}

/// Per-host breaker thresholds (`[circuit_breaker]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub timeout_secs: f64,
    pub window_size: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let d = CircuitBreakerConfig::default();
        Self {
            failure_threshold: d.failure_threshold,
            success_threshold: d.success_threshold,
            timeout_secs: d.timeout.as_secs_f64(),
            window_size: d.window_size,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: Duration::from_secs_f64(self.timeout_secs.max(0.0)),
            window_size: self.window_size,
        }
    }
}

/// Disk-space preflight parameters (`[disk]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub avg_image_size_mb: f64,
    /// Multiplier applied to the estimate (1.2 = 20% headroom).
    pub size_buffer: f64,
    /// Free space that must remain after the chapter, in MB.
    pub safety_margin_mb: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            avg_image_size_mb: 4.0,
            size_buffer: 1.2,
            safety_margin_mb: 100,
        }
    }
}

/// Presentation cadence (`[ui]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub progress_update_interval_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            progress_update_interval_ms: 100,
        }
    }
}

impl UiConfig {
    /// Minimum spacing between progress reports, never below 50ms.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_update_interval_ms.max(50))
    }
}

/// Global configuration loaded from `~/.config/umd/config.toml`.
///
/// Built once and passed into the engine; nothing reads it from a global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UmdConfig {
    pub download: DownloadConfig,
    pub session_pool: SessionPoolConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub disk: DiskConfig,
    pub ui: UiConfig,
}

impl UmdConfig {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("umd")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UmdConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = UmdConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: UmdConfig =
        toml::from_str(&data).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = UmdConfig::default();
        assert_eq!(cfg.download.chapter_workers, 1);
        assert_eq!(cfg.download.image_workers, 4);
        assert_eq!(cfg.download.max_retries, 3);
        assert!((cfg.download.retry_delay_secs - 1.0).abs() < 1e-9);
        assert_eq!(cfg.session_pool.max_size, 8);
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
        assert_eq!(cfg.circuit_breaker.window_size, 10);
        assert_eq!(cfg.disk.safety_margin_mb, 100);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = UmdConfig::default();
        let toml = cfg.to_toml().unwrap();
        let parsed: UmdConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.download.image_workers, cfg.download.image_workers);
        assert_eq!(parsed.session_pool.max_size, cfg.session_pool.max_size);
        assert_eq!(parsed.rate_limit.burst, cfg.rate_limit.burst);
        assert_eq!(
            parsed.ui.progress_update_interval_ms,
            cfg.ui.progress_update_interval_ms
        );
    }

    #[test]
    fn config_toml_partial_sections_use_defaults() {
        let toml = r#"
            [download]
            chapter_workers = 3
            max_retries = 1

            [disk]
            safety_margin_mb = 10
        "#;
        let cfg: UmdConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download.chapter_workers, 3);
        assert_eq!(cfg.download.max_retries, 1);
        assert_eq!(cfg.download.image_workers, 4);
        assert_eq!(cfg.disk.safety_margin_mb, 10);
        assert!((cfg.disk.size_buffer - 1.2).abs() < 1e-9);
        assert_eq!(cfg.session_pool.max_size, 8);
    }

    #[test]
    fn worker_counts_are_clamped() {
        let mut d = DownloadConfig::default();
        d.chapter_workers = 0;
        assert_eq!(d.chapter_worker_count(), 1);
        d.chapter_workers = 50;
        assert_eq!(d.chapter_worker_count(), 10);

        d.image_workers = 64;
        d.max_total_image_workers = 6;
        assert_eq!(d.image_worker_count(), 6);
        d.max_total_image_workers = 100;
        assert_eq!(d.global_image_limit(), 32);
        assert_eq!(d.image_worker_count(), 32);
    }

    #[test]
    fn retry_policy_from_download_config() {
        let mut d = DownloadConfig::default();
        d.max_retries = 2;
        d.retry_delay_secs = 0.5;
        let p = d.retry_policy();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn progress_interval_has_floor() {
        let ui = UiConfig {
            progress_update_interval_ms: 0,
        };
        assert_eq!(ui.progress_interval(), Duration::from_millis(50));
    }
}
