//! Client configuration and per-call generation parameters.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::time::Duration;

use crate::client::ClientError;
use crate::model::Message;

/// Default API root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.x.ai";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Retry behaviour for rate-limited (429) and server-side (5xx) responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Double the delay after every failed attempt.
    pub exponential: bool,
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor)
    }
}

/// Resolved configuration handed to the [`Client`](crate::client::Client).
///
/// Loading this from the environment or a config file is left to the caller;
/// the struct derives `Deserialize` so any serde format works. Durations are
/// read as whole seconds (`timeout`, `connect_timeout`) or milliseconds
/// (`retry_delay`).
///
/// # Example
/// ```rust
/// use chatwire::options::Config;
/// use std::time::Duration;
///
/// let config = Config::new("xai-...")
///     .with_base_url("https://api.x.ai")
///     .with_timeout(Duration::from_secs(60))
///     .with_max_retries(5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_key: SecretString,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout", deserialize_with = "seconds")]
    pub timeout: Duration,

    #[serde(default = "default_connect_timeout", deserialize_with = "seconds")]
    pub connect_timeout: Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay", deserialize_with = "millis")]
    pub retry_delay: Duration,

    #[serde(default)]
    pub exponential_backoff: bool,

    /// Initial capacity of the line buffer used while reading event streams.
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    /// Log request and response bodies at `debug` level.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_stream_buffer_size() -> usize {
    1024
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Config {
    /// Create a configuration with the given API key and default settings.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            exponential_backoff: false,
            stream_buffer_size: default_stream_buffer_size(),
            debug: false,
            proxy: None,
            extra_headers: HashMap::new(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the read timeout for unary requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the total number of attempts for retryable responses.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Double the retry delay after every failed attempt.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Set the stream line-buffer capacity in bytes.
    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    /// Enable request/response body logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Add a single extra header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ClientError::config("API key is required"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::config(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        Ok(())
    }

    /// Join the base URL and an API path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            delay: self.retry_delay,
            exponential: self.exponential_backoff,
        }
    }
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<T, ClientError>
where
    T: PartialOrd + Display + Copy,
{
    // Written so that NaN fails the lower-bound check.
    if !(value >= min) {
        return Err(ClientError::validation(format!(
            "{field} must be at least {min} (got {value})"
        )));
    }
    if value > max {
        return Err(ClientError::validation(format!(
            "{field} must be at most {max} (got {value})"
        )));
    }
    Ok(value)
}

/// Optional generation parameters for a single call.
///
/// Every numeric setter validates its value immediately and returns a
/// [`ClientError::Validation`] naming the field and the violated bound.
/// Fields left unset fall back to endpoint defaults when the request is built.
///
/// # Example
/// ```rust
/// use chatwire::options::ParameterSet;
///
/// let params = ParameterSet::new()
///     .with_temperature(0.2)?
///     .with_max_tokens(512)?
///     .with_system_message("You are terse.");
/// assert_eq!(params.temperature(), Some(0.2));
/// # Ok::<(), chatwire::ClientError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_of: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    /// Selects the model at the facade level; never serialized.
    #[serde(skip)]
    model: Option<String>,
    /// System entries prepended to chat message lists.
    #[serde(skip)]
    system_messages: Vec<Message>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults applied to chat, completion and image requests.
    pub fn chat_defaults() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(150),
            top_p: Some(1.0),
            stream: Some(false),
            presence_penalty: Some(0.0),
            frequency_penalty: Some(0.0),
            ..Self::default()
        }
    }

    /// Sampling temperature, 0.0 to 2.0.
    pub fn with_temperature(mut self, temperature: f64) -> Result<Self, ClientError> {
        self.temperature = Some(check_range("temperature", temperature, 0.0, 2.0)?);
        Ok(self)
    }

    /// Maximum tokens to generate, 1 to 128000.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Result<Self, ClientError> {
        self.max_tokens = Some(check_range("max_tokens", max_tokens, 1, 128_000)?);
        Ok(self)
    }

    /// Nucleus sampling mass. Accepted range is 0.0 to 2.0.
    pub fn with_top_p(mut self, top_p: f64) -> Result<Self, ClientError> {
        self.top_p = Some(check_range("top_p", top_p, 0.0, 2.0)?);
        Ok(self)
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Number of choices to generate, 1 to 10.
    pub fn with_n(mut self, n: u32) -> Result<Self, ClientError> {
        self.n = Some(check_range("n", n, 1, 10)?);
        Ok(self)
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Result<Self, ClientError> {
        self.presence_penalty = Some(check_range("presence_penalty", penalty, -2.0, 2.0)?);
        Ok(self)
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Result<Self, ClientError> {
        self.frequency_penalty = Some(check_range("frequency_penalty", penalty, -2.0, 2.0)?);
        Ok(self)
    }

    pub fn with_best_of(mut self, best_of: u32) -> Result<Self, ClientError> {
        self.best_of = Some(check_range("best_of", best_of, 1, 10)?);
        Ok(self)
    }

    /// Token id to bias map; each bias must lie in -100 to 100.
    pub fn with_logit_bias(mut self, bias: BTreeMap<String, f64>) -> Result<Self, ClientError> {
        for (token, value) in &bias {
            check_range(&format!("logit_bias[{token}]"), *value, -100.0, 100.0)?;
        }
        self.logit_bias = Some(bias);
        Ok(self)
    }

    /// Up to four non-empty stop sequences.
    pub fn with_stop<I, S>(mut self, stop: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stop: Vec<String> = stop.into_iter().map(Into::into).collect();
        check_range("stop", stop.len(), 1, 4)?;
        if stop.iter().any(|s| s.is_empty()) {
            return Err(ClientError::validation("stop sequences must not be empty"));
        }
        self.stop = Some(stop);
        Ok(self)
    }

    pub fn with_logprobs(mut self, logprobs: u32) -> Result<Self, ClientError> {
        self.logprobs = Some(check_range("logprobs", logprobs, 0, 5)?);
        Ok(self)
    }

    /// Embedding vector size, 1 to 2048.
    pub fn with_dimensions(mut self, dimensions: u32) -> Result<Self, ClientError> {
        self.dimensions = Some(check_range("dimensions", dimensions, 1, 2048)?);
        Ok(self)
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Model identifier or alias used for this call instead of the client default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Queue a system message that is placed ahead of the chat messages.
    pub fn with_system_message(mut self, content: impl Into<String>) -> Self {
        self.system_messages.push(Message::system(content));
        self
    }

    pub(crate) fn with_response_format(mut self, format: Value) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn top_p(&self) -> Option<f64> {
        self.top_p
    }

    pub fn stream(&self) -> Option<bool> {
        self.stream
    }

    pub fn n(&self) -> Option<u32> {
        self.n
    }

    pub fn dimensions(&self) -> Option<u32> {
        self.dimensions
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn system_messages(&self) -> &[Message] {
        &self.system_messages
    }

    pub fn response_format(&self) -> Option<&Value> {
        self.response_format.as_ref()
    }

    /// Shallow field-by-field merge: values set on `self` win over `defaults`.
    pub fn merged_over(&self, defaults: &ParameterSet) -> ParameterSet {
        ParameterSet {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            stream: self.stream.or(defaults.stream),
            n: self.n.or(defaults.n),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            best_of: self.best_of.or(defaults.best_of),
            logit_bias: self.logit_bias.clone().or_else(|| defaults.logit_bias.clone()),
            stop: self.stop.clone().or_else(|| defaults.stop.clone()),
            logprobs: self.logprobs.or(defaults.logprobs),
            dimensions: self.dimensions.or(defaults.dimensions),
            echo: self.echo.or(defaults.echo),
            user: self.user.clone().or_else(|| defaults.user.clone()),
            suffix: self.suffix.clone().or_else(|| defaults.suffix.clone()),
            response_format: self
                .response_format
                .clone()
                .or_else(|| defaults.response_format.clone()),
            model: self.model.clone().or_else(|| defaults.model.clone()),
            system_messages: if self.system_messages.is_empty() {
                defaults.system_messages.clone()
            } else {
                self.system_messages.clone()
            },
        }
    }

    /// Flattened wire mapping of every set field.
    pub fn to_payload(&self) -> Result<Map<String, Value>, ClientError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ClientError::parse(
                format!("parameters serialized to {} instead of an object", other),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boundaries_are_accepted() {
        let params = ParameterSet::new()
            .with_temperature(0.0)
            .and_then(|p| p.with_temperature(2.0))
            .and_then(|p| p.with_top_p(2.0))
            .and_then(|p| p.with_max_tokens(1))
            .and_then(|p| p.with_max_tokens(128_000))
            .and_then(|p| p.with_presence_penalty(-2.0))
            .and_then(|p| p.with_frequency_penalty(2.0))
            .and_then(|p| p.with_n(10))
            .and_then(|p| p.with_best_of(1))
            .and_then(|p| p.with_logprobs(0))
            .and_then(|p| p.with_logprobs(5))
            .and_then(|p| p.with_dimensions(2048));
        assert!(params.is_ok());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let cases: Vec<Result<ParameterSet, ClientError>> = vec![
            ParameterSet::new().with_temperature(2.01),
            ParameterSet::new().with_temperature(-0.1),
            ParameterSet::new().with_temperature(f64::NAN),
            ParameterSet::new().with_top_p(2.5),
            ParameterSet::new().with_max_tokens(0),
            ParameterSet::new().with_max_tokens(128_001),
            ParameterSet::new().with_presence_penalty(-2.5),
            ParameterSet::new().with_frequency_penalty(3.0),
            ParameterSet::new().with_n(0),
            ParameterSet::new().with_n(11),
            ParameterSet::new().with_best_of(11),
            ParameterSet::new().with_logprobs(6),
            ParameterSet::new().with_dimensions(0),
            ParameterSet::new().with_dimensions(2049),
        ];
        for result in cases {
            assert!(matches!(result, Err(ClientError::Validation { .. })));
        }
    }

    #[test]
    fn test_error_names_field_and_bound() {
        let err = ParameterSet::new().with_temperature(3.0).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("temperature"));
        assert!(message.contains("at most 2"));

        let err = ParameterSet::new().with_max_tokens(0).unwrap_err();
        assert!(err.to_string().contains("max_tokens must be at least 1"));
    }

    #[test]
    fn test_stop_and_logit_bias_validation() {
        assert!(ParameterSet::new().with_stop(["a", "b", "c", "d"]).is_ok());
        assert!(ParameterSet::new().with_stop(["a", "b", "c", "d", "e"]).is_err());
        assert!(ParameterSet::new().with_stop([""]).is_err());

        let mut bias = BTreeMap::new();
        bias.insert("50256".to_string(), -100.0);
        assert!(ParameterSet::new().with_logit_bias(bias.clone()).is_ok());
        bias.insert("42".to_string(), 101.0);
        assert!(ParameterSet::new().with_logit_bias(bias).is_err());
    }

    #[test]
    fn test_merge_is_shallow_and_caller_wins() {
        let params = ParameterSet::new()
            .with_temperature(1.5)
            .unwrap()
            .with_user("u-1");
        let merged = params.merged_over(&ParameterSet::chat_defaults());
        let payload = merged.to_payload().unwrap();

        assert_eq!(payload["temperature"], json!(1.5));
        assert_eq!(payload["max_tokens"], json!(150));
        assert_eq!(payload["top_p"], json!(1.0));
        assert_eq!(payload["stream"], json!(false));
        assert_eq!(payload["presence_penalty"], json!(0.0));
        assert_eq!(payload["user"], json!("u-1"));
        assert!(!payload.contains_key("n"));
    }

    #[test]
    fn test_payload_is_a_flat_object() {
        let payload = ParameterSet::chat_defaults().to_payload().unwrap();
        assert_eq!(payload.len(), 6);
        assert_eq!(payload["max_tokens"], json!(150));
        assert!(ParameterSet::new().to_payload().unwrap().is_empty());
    }

    #[test]
    fn test_model_and_system_messages_are_not_serialized() {
        let params = ParameterSet::new()
            .with_model("grok-2")
            .with_system_message("be brief");
        let payload = params.to_payload().unwrap();
        assert!(payload.is_empty());
        assert_eq!(params.system_messages().len(), 1);
        assert_eq!(params.model(), Some("grok-2"));
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = Config::new("key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.stream_buffer_size, 1024);
        assert!(config.validate().is_ok());

        assert!(matches!(
            Config::new("  ").validate(),
            Err(ClientError::Config { .. })
        ));
        assert!(Config::new("key").with_base_url("nope").validate().is_err());
    }

    #[test]
    fn test_config_deserialize() {
        let config: Config = serde_json::from_value(json!({
            "api_key": "secret",
            "timeout": 5,
            "retry_delay": 250,
            "debug": true
        }))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 3);
        assert!(config.debug);
        assert_eq!(format!("{:?}", config.api_key), "SecretString([REDACTED])");
    }

    #[test]
    fn test_endpoint_join_and_retry_delay() {
        let config = Config::new("k").with_base_url("http://localhost:8080/");
        assert_eq!(
            config.endpoint("/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );

        let policy = RetryPolicy {
            max_attempts: 4,
            delay: Duration::from_millis(100),
            exponential: true,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(Config::new("k").with_max_retries(0).retry_policy().max_attempts, 1);
    }
}
