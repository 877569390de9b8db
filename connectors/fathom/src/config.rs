use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FathomError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.fathom.ai";
pub const DEFAULT_OUTPUT_DIR: &str = "./exports";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const USER_AGENT: &str = "omni-fathom-exporter/0.1";

/// Value of the `calendar_invitees_domains_type` filter on the meetings list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainsType {
    #[default]
    All,
    Internal,
    External,
}

impl DomainsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainsType::All => "all",
            DomainsType::Internal => "internal",
            DomainsType::External => "external",
        }
    }
}

impl FromStr for DomainsType {
    type Err = FathomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DomainsType::All),
            "internal" => Ok(DomainsType::Internal),
            "external" => Ok(DomainsType::External),
            other => Err(FathomError::Config(format!(
                "FATHOM_MEETINGS_DOMAINS_TYPE must be one of all, internal, external (got '{}')",
                other
            ))),
        }
    }
}

impl fmt::Display for DomainsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct FathomConfig {
    pub api_key: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub domains_type: DomainsType,
    /// Maximum number of list pages to fetch. Debug override.
    pub page_limit: Option<u32>,
    pub page_size: Option<u32>,
    pub include_transcript: bool,
    /// Saved list response to export from instead of calling the list endpoint.
    pub source_json: Option<PathBuf>,
    pub http_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl fmt::Debug for FathomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FathomConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("domains_type", &self.domains_type)
            .field("page_limit", &self.page_limit)
            .field("page_size", &self.page_size)
            .field("include_transcript", &self.include_transcript)
            .field("source_json", &self.source_json)
            .field("http_timeout", &self.http_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl FathomConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("FATHOM_API_KEY").ok_or_else(|| {
            FathomError::Config(
                "Missing required environment variable: FATHOM_API_KEY".to_string(),
            )
        })?;

        let base_url = get("FATHOM_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let output_dir = PathBuf::from(
            get("FATHOM_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
        );

        let domains_type = match get("FATHOM_MEETINGS_DOMAINS_TYPE") {
            Some(v) => v.parse()?,
            None => DomainsType::default(),
        };

        let page_limit = parse_positive(&get, "FATHOM_MEETINGS_PAGE_LIMIT")?;
        let page_size = parse_positive(&get, "FATHOM_PAGE_SIZE")?;

        let include_transcript = match get("FATHOM_INCLUDE_TRANSCRIPT") {
            Some(v) => parse_bool("FATHOM_INCLUDE_TRANSCRIPT", &v)?,
            None => false,
        };

        let source_json = get("FATHOM_SOURCE_JSON").map(PathBuf::from);

        let http_timeout = Duration::from_secs(
            parse_positive(&get, "FATHOM_HTTP_TIMEOUT_SECS")?
                .map(u64::from)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let retry_attempts =
            parse_positive(&get, "FATHOM_RETRY_ATTEMPTS")?.unwrap_or(DEFAULT_RETRY_ATTEMPTS);

        let retry_delay = Duration::from_millis(match get("FATHOM_RETRY_DELAY_MS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                FathomError::Config(format!(
                    "FATHOM_RETRY_DELAY_MS must be a non-negative integer (got '{}')",
                    v
                ))
            })?,
            None => DEFAULT_RETRY_DELAY_MS,
        });

        Ok(Self {
            api_key,
            base_url,
            output_dir,
            domains_type,
            page_limit,
            page_size,
            include_transcript,
            source_json,
            http_timeout,
            retry_attempts,
            retry_delay,
        })
    }

    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(crate::export::INDEX_FILE_NAME)
    }
}

fn parse_positive<G>(get: &G, name: &str) -> Result<Option<u32>>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(FathomError::Config(format!(
                "{} must be a positive integer (got '{}')",
                name, v
            ))),
        },
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FathomError::Config(format!(
            "{} must be a boolean (got '{}')",
            name, value
        ))),
    }
}
