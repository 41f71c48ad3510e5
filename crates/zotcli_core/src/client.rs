use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::config::ResolvedSettings;
use crate::error::{Result, ZoteroError};

pub const DEFAULT_API_BASE_URL: &str = "https://api.zotero.org";
pub const LOCAL_API_BASE_URL: &str = "http://localhost:23119/api";
const API_VERSION: &str = "3";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RATE_LIMIT_MS: u64 = 100;
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ZoteroClientConfig {
    pub base_url: String,
    pub library_id: String,
    pub library_type: String,
    pub api_key: Option<String>,
    pub locale: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ZoteroClientConfig {
    /// Build a client config from resolved settings, with environment
    /// overrides for transport tuning.
    pub fn from_settings(settings: &ResolvedSettings) -> Result<Self> {
        let library_id = settings
            .library_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ZoteroError::MissingCredentials(
                    "Library ID is not configured (set it via `zot configure setup`, \
                     --library-id, or ZOTERO_LIBRARY_ID)"
                        .to_string(),
                )
            })?;
        if settings.library_type != "user" && settings.library_type != "group" {
            return Err(ZoteroError::InvalidInput(format!(
                "library_type must be 'user' or 'group', got '{}'",
                settings.library_type
            )));
        }
        if !settings.local && settings.api_key.is_none() {
            return Err(ZoteroError::MissingCredentials(
                "API Key is not configured (set it via `zot configure setup`, \
                 --api-key, or ZOTERO_API_KEY)"
                    .to_string(),
            ));
        }

        let default_base = if settings.local {
            LOCAL_API_BASE_URL
        } else {
            DEFAULT_API_BASE_URL
        };
        Ok(Self {
            base_url: env_value("ZOTERO_API_BASE_URL", default_base),
            library_id,
            library_type: settings.library_type.clone(),
            api_key: settings.api_key.clone(),
            locale: settings.locale.clone(),
            user_agent: concat!("zotcli/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: env_value_u64("ZOTERO_HTTP_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            rate_limit_ms: env_value_u64("ZOTERO_RATE_LIMIT_MS", DEFAULT_RATE_LIMIT_MS),
            max_retries: env_value_usize("ZOTERO_HTTP_RETRIES", DEFAULT_RETRIES),
            retry_delay_ms: env_value_u64("ZOTERO_HTTP_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
        })
    }
}

/// Search/list query parameters shared by every listing endpoint.
///
/// Empty values are omitted from the query string; repeated tags become
/// repeated `tag=` pairs (AND semantics on the server).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub limit: Option<u32>,
    pub start: Option<u32>,
    pub since: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub query: Option<String>,
    pub qmode: Option<String>,
    pub tags: Vec<String>,
    pub item_type: Option<String>,
    pub format: Option<String>,
    pub item_keys: Option<String>,
    pub style: Option<String>,
    pub locale: Option<String>,
}

impl SearchParams {
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value
                && !value.trim().is_empty()
            {
                pairs.push((key.to_string(), value));
            }
        };
        push("limit", self.limit.map(|limit| limit.to_string()));
        push("start", self.start.map(|start| start.to_string()));
        push("since", self.since.clone());
        push("sort", self.sort.clone());
        push("direction", self.direction.clone());
        push("q", self.query.clone());
        push("qmode", self.qmode.clone());
        push("itemType", self.item_type.clone());
        push("format", self.format.clone());
        push("itemKey", self.item_keys.clone());
        push("style", self.style.clone());
        push("locale", self.locale.clone());
        for tag in &self.tags {
            if !tag.trim().is_empty() {
                pairs.push(("tag".to_string(), tag.clone()));
            }
        }
        pairs
    }
}

pub(crate) struct RequestSpec<'a> {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub json_body: Option<&'a Value>,
    pub form_body: Option<&'a [(String, String)]>,
    pub version: Option<u64>,
    pub if_none_match: bool,
    pub if_match: Option<String>,
}

impl<'a> RequestSpec<'a> {
    pub fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            json_body: None,
            form_body: None,
            version: None,
            if_none_match: false,
            if_match: None,
        }
    }
}

/// Blocking Zotero Web API v3 client.
///
/// One instance per invocation: owns the HTTP client, credentials, a
/// minimum inter-request delay, and the library version reported by the
/// most recent response.
pub struct ZoteroClient {
    client: Client,
    config: ZoteroClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
    last_modified_version: Option<u64>,
    last_total_results: Option<u64>,
}

impl ZoteroClient {
    pub fn new(config: ZoteroClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
            last_modified_version: None,
            last_total_results: None,
        })
    }

    pub fn from_settings(settings: &ResolvedSettings) -> Result<Self> {
        Self::new(ZoteroClientConfig::from_settings(settings)?)
    }

    pub fn locale(&self) -> &str {
        &self.config.locale
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    /// Library version from the most recent response, when the server sent
    /// one.
    pub fn last_modified_version(&self) -> Option<u64> {
        self.last_modified_version
    }

    /// `Total-Results` header from the most recent listing response.
    pub fn last_total_results(&self) -> Option<u64> {
        self.last_total_results
    }

    /// `/users/<id>` or `/groups/<id>` prefix applied to library-scoped
    /// paths.
    pub fn library_path(&self, suffix: &str) -> String {
        format!(
            "{}/{}s/{}{}",
            self.config.base_url, self.config.library_type, self.config.library_id, suffix
        )
    }

    /// Library-independent path (item type templates and similar).
    pub fn global_path(&self, suffix: &str) -> String {
        format!("{}{}", self.config.base_url, suffix)
    }

    pub(crate) fn get_json(&mut self, url: &str, params: &SearchParams) -> Result<Value> {
        let mut spec = RequestSpec::new(Method::GET, url.to_string());
        spec.query = params.to_query_pairs();
        let response = self.send(spec)?;
        Ok(response.json()?)
    }

    pub(crate) fn get_text(&mut self, url: &str, params: &SearchParams) -> Result<String> {
        let mut spec = RequestSpec::new(Method::GET, url.to_string());
        spec.query = params.to_query_pairs();
        let response = self.send(spec)?;
        Ok(response.text()?)
    }

    pub(crate) fn get_raw(&mut self, url: &str) -> Result<Response> {
        self.send(RequestSpec::new(Method::GET, url.to_string()))
    }

    pub(crate) fn post_json(&mut self, url: &str, body: &Value, version: Option<u64>) -> Result<Value> {
        let mut spec = RequestSpec::new(Method::POST, url.to_string());
        spec.json_body = Some(body);
        spec.version = version;
        let response = self.send(spec)?;
        Ok(response.json()?)
    }

    pub(crate) fn put_json(&mut self, url: &str, body: &Value, version: Option<u64>) -> Result<()> {
        let mut spec = RequestSpec::new(Method::PUT, url.to_string());
        spec.json_body = Some(body);
        spec.version = version;
        self.send(spec)?;
        Ok(())
    }

    pub(crate) fn patch_json(&mut self, url: &str, body: &Value, version: u64) -> Result<()> {
        let mut spec = RequestSpec::new(Method::PATCH, url.to_string());
        spec.json_body = Some(body);
        spec.version = Some(version);
        self.send(spec)?;
        Ok(())
    }

    pub(crate) fn delete(
        &mut self,
        url: &str,
        query: Vec<(String, String)>,
        version: u64,
    ) -> Result<()> {
        let mut spec = RequestSpec::new(Method::DELETE, url.to_string());
        spec.query = query;
        spec.version = Some(version);
        self.send(spec)?;
        Ok(())
    }

    /// Form POST against the API, with the file-upload conditional headers.
    pub(crate) fn post_form(
        &mut self,
        url: &str,
        form: &[(String, String)],
        if_match: Option<String>,
        if_none_match: bool,
    ) -> Result<Response> {
        let mut spec = RequestSpec::new(Method::POST, url.to_string());
        spec.form_body = Some(form);
        spec.if_match = if_match;
        spec.if_none_match = if_none_match;
        self.send(spec)
    }

    /// POST a raw body to a non-API URL (the storage endpoint returned by an
    /// upload authorization). No Zotero headers are attached.
    pub(crate) fn post_external(
        &mut self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.apply_rate_limit();
        let response = self
            .client
            .post(url)
            .header("Content-Type", content_type.to_string())
            .body(body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ZoteroError::from_status(status, &body, false));
        }
        Ok(())
    }

    /// Current library version, fetching it cheaply when no response has
    /// reported one yet. Versioned deletes need this.
    pub(crate) fn ensure_library_version(&mut self) -> Result<u64> {
        if let Some(version) = self.last_modified_version {
            return Ok(version);
        }
        let path = self.library_path("/items");
        let params = SearchParams {
            limit: Some(1),
            format: Some("versions".to_string()),
            ..Default::default()
        };
        self.get_json(&path, &params)?;
        self.last_modified_version
            .ok_or_else(|| ZoteroError::InvalidInput(
                "server did not report a library version".to_string(),
            ))
    }

    pub(crate) fn send(&mut self, spec: RequestSpec<'_>) -> Result<Response> {
        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            let mut builder = self
                .client
                .request(spec.method.clone(), &spec.url)
                .header("User-Agent", self.config.user_agent.clone())
                .header("Zotero-API-Version", API_VERSION);
            if let Some(key) = &self.config.api_key {
                builder = builder.header("Zotero-API-Key", key.clone());
            }
            if !spec.query.is_empty() {
                builder = builder.query(&spec.query);
            }
            if let Some(body) = spec.json_body {
                builder = builder.json(body);
            }
            if let Some(form) = spec.form_body {
                builder = builder.form(form);
            }
            if let Some(version) = spec.version {
                builder = builder.header("If-Unmodified-Since-Version", version.to_string());
            }
            if spec.if_none_match {
                builder = builder.header("If-None-Match", "*");
            }
            if let Some(etag) = &spec.if_match {
                builder = builder.header("If-Match", etag.clone());
            }

            match builder.send() {
                Ok(response) => {
                    let status = response.status();
                    self.record_headers(&response);
                    if status.is_success() {
                        tracing::debug!(
                            method = %spec.method,
                            url = %spec.url,
                            status = status.as_u16(),
                            "api request"
                        );
                        return Ok(response);
                    }
                    let retry_after = header_u64(&response, "Retry-After")
                        .or_else(|| header_u64(&response, "Backoff"));
                    if attempt < self.config.max_retries
                        && ZoteroError::is_retryable_status(status)
                    {
                        tracing::debug!(
                            url = %spec.url,
                            status = status.as_u16(),
                            attempt,
                            "retrying api request"
                        );
                        self.wait_before_retry(attempt, retry_after);
                        continue;
                    }
                    let body = response.text().unwrap_or_default();
                    let mut error = ZoteroError::from_status(
                        status,
                        &body,
                        self.config.api_key.is_some(),
                    );
                    if let ZoteroError::RateLimit {
                        retry_after: slot, ..
                    } = &mut error
                    {
                        *slot = retry_after;
                    }
                    return Err(error);
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        tracing::debug!(url = %spec.url, attempt, "retrying after transport error");
                        self.wait_before_retry(attempt, None);
                        continue;
                    }
                    return Err(ZoteroError::Transport(error));
                }
            }
        }
        Err(ZoteroError::RetryBudgetExhausted)
    }

    fn apply_rate_limit(&mut self) {
        let delay = Duration::from_millis(self.config.rate_limit_ms);
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    fn wait_before_retry(&self, attempt: usize, retry_after_secs: Option<u64>) {
        if let Some(secs) = retry_after_secs {
            sleep(Duration::from_secs(secs.min(60)));
            return;
        }
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }

    fn record_headers(&mut self, response: &Response) {
        if let Some(version) = header_u64(response, "Last-Modified-Version") {
            self.last_modified_version = Some(version);
        }
        if let Some(total) = header_u64(response, "Total-Results") {
            self.last_total_results = Some(total);
        }
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn env_value(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_value_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedSettings;

    fn settings() -> ResolvedSettings {
        ResolvedSettings {
            profile: "default".to_string(),
            library_id: Some("12345".to_string()),
            library_type: "user".to_string(),
            api_key: Some("k".to_string()),
            locale: "en-US".to_string(),
            local: false,
        }
    }

    #[test]
    fn library_path_uses_type_and_id() {
        let client = ZoteroClient::from_settings(&settings()).expect("client");
        assert_eq!(
            client.library_path("/collections/top"),
            "https://api.zotero.org/users/12345/collections/top"
        );

        let mut group = settings();
        group.library_type = "group".to_string();
        let client = ZoteroClient::from_settings(&group).expect("client");
        assert_eq!(
            client.library_path("/items"),
            "https://api.zotero.org/groups/12345/items"
        );
    }

    #[test]
    fn missing_library_id_is_a_credentials_error() {
        let mut incomplete = settings();
        incomplete.library_id = None;
        let error = ZoteroClientConfig::from_settings(&incomplete).expect_err("must fail");
        assert!(matches!(error, ZoteroError::MissingCredentials(_)));
        assert!(error.to_string().contains("Library ID"));
    }

    #[test]
    fn missing_api_key_is_allowed_only_in_local_mode() {
        let mut keyless = settings();
        keyless.api_key = None;
        let error = ZoteroClientConfig::from_settings(&keyless).expect_err("must fail");
        assert!(error.to_string().contains("API Key"));

        let mut local = settings();
        local.api_key = None;
        local.local = true;
        let config = ZoteroClientConfig::from_settings(&local).expect("config");
        assert_eq!(config.base_url, LOCAL_API_BASE_URL);
    }

    #[test]
    fn query_pairs_skip_empty_values_and_repeat_tags() {
        let params = SearchParams {
            limit: Some(25),
            start: None,
            since: Some("120".to_string()),
            sort: Some("title".to_string()),
            direction: Some("asc".to_string()),
            query: Some("ecology".to_string()),
            qmode: None,
            tags: vec!["reading".to_string(), "".to_string(), "todo".to_string()],
            item_type: Some("book".to_string()),
            format: None,
            item_keys: None,
            style: None,
            locale: None,
        };
        let pairs = params.to_query_pairs();
        assert!(pairs.contains(&("limit".to_string(), "25".to_string())));
        assert!(pairs.contains(&("since".to_string(), "120".to_string())));
        assert!(pairs.contains(&("itemType".to_string(), "book".to_string())));
        assert!(!pairs.iter().any(|(key, _)| key == "start" || key == "qmode"));
        let tags = pairs
            .iter()
            .filter(|(key, _)| key == "tag")
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>();
        assert_eq!(tags, vec!["reading", "todo"]);
    }

    #[test]
    fn format_builder_sets_format() {
        let params = SearchParams::default().with_format("versions");
        assert!(
            params
                .to_query_pairs()
                .contains(&("format".to_string(), "versions".to_string()))
        );
    }
}
