use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(1_500);
pub const DEFAULT_FALLBACK_REDIRECT_DELAY: Duration = Duration::from_millis(3_000);
pub const DEFAULT_GRADING_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_GRADING_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/";

/// Tunables of the exam client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamClientConfig {
    pub auto_save_interval: Duration,
    /// Pause before navigating after a successful resume, so the notice is readable.
    pub redirect_delay: Duration,
    /// Pause before navigating with stale local data.
    pub fallback_redirect_delay: Duration,
    pub grading_timeout: Duration,
    pub grading_poll_interval: Duration,
    pub api_base_url: Url,
}

impl Default for ExamClientConfig {
    fn default() -> Self {
        Self {
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            fallback_redirect_delay: DEFAULT_FALLBACK_REDIRECT_DELAY,
            grading_timeout: DEFAULT_GRADING_TIMEOUT,
            grading_poll_interval: DEFAULT_GRADING_POLL_INTERVAL,
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
        }
    }
}

impl ExamClientConfig {
    /// Defaults overridden by `EXAM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`ExamClientConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = read_number(&lookup, "EXAM_AUTOSAVE_SECS")? {
            config.auto_save_interval = non_zero("EXAM_AUTOSAVE_SECS", Duration::from_secs(secs))?;
        }
        if let Some(ms) = read_number(&lookup, "EXAM_REDIRECT_DELAY_MS")? {
            config.redirect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read_number(&lookup, "EXAM_FALLBACK_DELAY_MS")? {
            config.fallback_redirect_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = read_number(&lookup, "EXAM_GRADING_TIMEOUT_SECS")? {
            config.grading_timeout =
                non_zero("EXAM_GRADING_TIMEOUT_SECS", Duration::from_secs(secs))?;
        }
        if let Some(secs) = read_number(&lookup, "EXAM_GRADING_POLL_SECS")? {
            config.grading_poll_interval =
                non_zero("EXAM_GRADING_POLL_SECS", Duration::from_secs(secs))?;
        }
        if let Some(raw) = lookup("EXAM_API_URL").filter(|raw| !raw.trim().is_empty()) {
            config.api_base_url = parse_base_url("EXAM_API_URL", &raw)?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_redirect_delays(mut self, success: Duration, fallback: Duration) -> Self {
        self.redirect_delay = success;
        self.fallback_redirect_delay = fallback;
        self
    }

    #[must_use]
    pub fn with_auto_save_interval(mut self, interval: Duration) -> Self {
        self.auto_save_interval = interval;
        self
    }
}

/// Parse an API base url, forcing a trailing slash so relative joins keep the path.
///
/// # Errors
///
/// Returns `ConfigError::InvalidUrl` if `raw` is not an absolute http(s) url.
pub fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| ConfigError::InvalidUrl {
        var,
        raw: raw.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            var,
            raw: raw.to_string(),
        });
    }
    Ok(url)
}

fn read_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var, raw })
}

fn non_zero(var: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Zero { var });
    }
    Ok(value)
}
