//! The log shipper and its delivery loop.
//!
//! The [`Shipper`] type is the main entry point for sending logs.
//! Use [`ShipperBuilder`] to configure and create shippers, or
//! [`Shipper::shared`] for the process-wide instance.

use crate::{
    config::ShipperConfig,
    endpoint::Endpoint,
    message::{self, EncodedRequest, LogMessage},
    retry::{Backoff, Timer, TokioTimer},
    Delivery, DeliveryHandle, Error, Result,
};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

static SHARED: OnceLock<Shipper> = OnceLock::new();

const USER_AGENT: &str = concat!("logship/", env!("CARGO_PKG_VERSION"));

/// Ships log messages to a token-scoped ingestion endpoint.
///
/// The shipper is cheap to clone; clones share the HTTP connection pool and
/// the token/tag settings. Each send runs independently of every other send.
///
/// # Examples
///
/// ```no_run
/// use logship::{LogMessage, Shipper};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), logship::Error> {
/// let shipper = Shipper::builder()
///     .token("abc123")
///     .default_tags(["env:prod"])
///     .build()?;
///
/// // Await the outcome.
/// let delivery = shipper.ship("hello", &["svc:api"]).await?;
/// println!("Delivered after {} attempt(s)", delivery.attempts);
///
/// // Structured record, fire and forget.
/// let record = LogMessage::record(&json!({ "level": "error", "msg": "boom" }))?;
/// shipper.send(record, &[]);
///
/// // Completion callback.
/// shipper.send_with("cache miss", &["svc:cache"], |outcome| {
///     if let Err(e) = outcome {
///         eprintln!("log not shipped: {}", e);
///     }
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Shipper {
    inner: Arc<ShipperInner>,
}

struct ShipperInner {
    http_client: reqwest::Client,
    endpoint: Endpoint,
    backoff: Backoff,
    timer: Box<dyn Timer>,
    settings: RwLock<Settings>,
}

#[derive(Debug, Clone, Default)]
struct Settings {
    token: Option<String>,
    default_tags: Vec<String>,
}

impl Shipper {
    /// Creates a new `ShipperBuilder` for configuring a shipper.
    pub fn builder() -> ShipperBuilder {
        ShipperBuilder::new()
    }

    /// Creates a shipper for `token` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::builder().token(token).build()
    }

    /// Creates a shipper from deserialized settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingestion URL is invalid or the HTTP client
    /// cannot be created.
    pub fn from_config(config: ShipperConfig) -> Result<Self> {
        let backoff = config.backoff();
        let mut builder = Self::builder()
            .ingest_url(&config.ingest_url)?
            .default_tags(config.tags)
            .backoff(backoff);
        if let Some(token) = config.token {
            builder = builder.token(token);
        }
        builder.build()
    }

    /// Returns the process-wide shipper, creating it on first use.
    ///
    /// The shared shipper starts without a token; set one with
    /// [`set_token`](Self::set_token) before sending.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use logship::Shipper;
    ///
    /// Shipper::shared().set_token("abc123");
    /// Shipper::shared().set_default_tags(["env:prod"]);
    /// ```
    pub fn shared() -> &'static Shipper {
        SHARED.get_or_init(|| {
            Shipper::from_parts(
                build_http_client(USER_AGENT, None).unwrap_or_default(),
                Endpoint::default(),
                Backoff::default(),
                Box::new(TokioTimer),
                Settings::default(),
            )
        })
    }

    fn from_parts(
        http_client: reqwest::Client,
        endpoint: Endpoint,
        backoff: Backoff,
        timer: Box<dyn Timer>,
        settings: Settings,
    ) -> Self {
        Shipper {
            inner: Arc::new(ShipperInner {
                http_client,
                endpoint,
                backoff,
                timer,
                settings: RwLock::new(settings),
            }),
        }
    }

    /// Returns the configured token, if any.
    pub fn token(&self) -> Option<String> {
        self.settings().token
    }

    /// Sets the account token used by subsequent sends.
    ///
    /// Sends already in flight keep the token they started with.
    pub fn set_token(&self, token: impl Into<String>) {
        self.inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token = Some(token.into());
    }

    /// Removes the token; sends fail validation until a new one is set.
    pub fn clear_token(&self) {
        self.inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token = None;
    }

    /// Returns the default tags placed ahead of per-call tags.
    pub fn default_tags(&self) -> Vec<String> {
        self.settings().default_tags
    }

    /// Replaces the default tags used by subsequent sends.
    pub fn set_default_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .default_tags = tags;
    }

    /// Returns the ingestion endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Returns the backoff schedule.
    pub fn backoff(&self) -> &Backoff {
        &self.inner.backoff
    }

    /// Validates and encodes a submission without sending it.
    ///
    /// Default tags are read once here, so a later settings change does not
    /// alter the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty message or a missing token,
    /// and [`Error::Encoding`] if the record cannot be written as JSON.
    pub fn prepare(&self, message: &LogMessage, tags: &[&str]) -> Result<EncodedRequest> {
        let settings = self.settings();
        message::validate(message, settings.token.as_deref())?;

        let token = settings.token.as_deref().unwrap_or_default();
        let url = self
            .inner
            .endpoint
            .resolve(token, &settings.default_tags, tags)?;
        message.encode(url)
    }

    /// Sends a message and waits for the outcome.
    ///
    /// The retry loop runs inside the returned future; the calling thread is
    /// never blocked.
    ///
    /// # Errors
    ///
    /// Returns a local error ([`Error::Validation`], [`Error::Encoding`])
    /// without touching the network, or [`Error::DeliveryFailed`] once the
    /// retry ceiling is reached.
    pub async fn ship(&self, message: impl Into<LogMessage>, tags: &[&str]) -> Result<Delivery> {
        let message = message.into();
        let request = self.prepare(&message, tags).inspect_err(log_rejection)?;
        self.inner.deliver(request).await
    }

    /// Sends a message in the background on the current tokio runtime.
    ///
    /// Validation and encoding happen before anything is spawned; on failure
    /// the returned handle is already resolved.
    pub fn send(&self, message: impl Into<LogMessage>, tags: &[&str]) -> DeliveryHandle {
        match self.start(&message.into(), tags) {
            Ok((runtime, request)) => {
                let inner = Arc::clone(&self.inner);
                DeliveryHandle::running(runtime.spawn(async move { inner.deliver(request).await }))
            }
            Err(e) => DeliveryHandle::failed(e),
        }
    }

    /// Sends any serializable value as a structured record in the background.
    ///
    /// A value that does not serialize to a JSON object resolves the handle
    /// with [`Error::Encoding`].
    pub fn send_record<T>(&self, record: &T, tags: &[&str]) -> DeliveryHandle
    where
        T: Serialize + ?Sized,
    {
        let checked = message::validate_token(self.settings().token.as_deref())
            .and_then(|()| LogMessage::record(record));
        match checked {
            Ok(message) => self.send(message, tags),
            Err(e) => {
                log_rejection(&e);
                DeliveryHandle::failed(e)
            }
        }
    }

    /// Sends a message in the background and reports the outcome to `on_complete`.
    ///
    /// `on_complete` runs exactly once: inline, before this method returns, if
    /// the message is rejected locally, otherwise on the runtime when delivery
    /// succeeds or the retry ceiling is reached.
    pub fn send_with<F>(&self, message: impl Into<LogMessage>, tags: &[&str], on_complete: F)
    where
        F: FnOnce(Result<Delivery>) + Send + 'static,
    {
        match self.start(&message.into(), tags) {
            Ok((runtime, request)) => {
                let inner = Arc::clone(&self.inner);
                runtime.spawn(async move { on_complete(inner.deliver(request).await) });
            }
            Err(e) => on_complete(Err(e)),
        }
    }

    fn start(
        &self,
        message: &LogMessage,
        tags: &[&str],
    ) -> Result<(tokio::runtime::Handle, EncodedRequest)> {
        let request = self.prepare(message, tags).inspect_err(log_rejection)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::ConfigurationError(format!("No tokio runtime to deliver on: {}", e))
        })?;
        Ok((runtime, request))
    }

    fn settings(&self) -> Settings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ShipperInner {
    /// Sends `request` until it is accepted or the backoff schedule runs out.
    async fn deliver(&self, request: EncodedRequest) -> Result<Delivery> {
        let start_time = Instant::now();
        let mut retry = 0;

        loop {
            let attempt = retry + 1;

            match self.execute_attempt(&request, attempt).await {
                Ok((raw_body, headers)) => {
                    let latency = start_time.elapsed();
                    tracing::info!(
                        latency_ms = latency.as_millis(),
                        attempts = attempt,
                        "Log delivered"
                    );
                    return Ok(Delivery::new(raw_body, StatusCode::OK, headers, latency, attempt));
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempt, "Delivery attempt failed");

                    match self.backoff.delay_for_retry(retry) {
                        Some(delay) => {
                            tracing::info!(
                                delay_ms = delay.as_millis(),
                                retry = retry,
                                "Retrying delivery after delay"
                            );
                            self.timer.sleep(delay).await;
                            retry += 1;
                        }
                        None => {
                            tracing::error!(
                                attempts = attempt,
                                error = %e,
                                "Giving up on log delivery"
                            );
                            return Err(Error::DeliveryFailed {
                                attempts: attempt,
                                last_error: Box::new(e),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Executes a single attempt; anything but `200 OK` is an error.
    async fn execute_attempt(
        &self,
        request: &EncodedRequest,
        attempt: usize,
    ) -> Result<(String, HeaderMap)> {
        tracing::debug!(
            method = %request.method,
            host = request.url.host_str().unwrap_or_default(),
            content_type = ?request.content_type,
            attempt = attempt,
            "Sending log"
        );

        let response = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .header(CONTENT_TYPE, request.content_type.clone())
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .header(PRAGMA, HeaderValue::from_static("no-cache"))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();

        if status != StatusCode::OK {
            let raw_response = response.text().await.unwrap_or_default();
            return Err(Error::HttpError {
                status,
                raw_response,
                headers,
            });
        }

        // The log is accepted once the status is 200; a body read failure must
        // not turn into a resend.
        let raw_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    "Failed to read accepted response body"
                );
                String::new()
            }
        };
        Ok((raw_body, headers))
    }
}

fn build_http_client(user_agent: &str, timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut http_client = reqwest::Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        http_client = http_client.timeout(timeout);
    }
    http_client
        .build()
        .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
}

fn log_rejection(error: &Error) {
    tracing::debug!(error = %error, "Log rejected before sending");
}

/// Builder for configuring and creating a [`Shipper`].
///
/// # Examples
///
/// ```no_run
/// use logship::{Backoff, ShipperBuilder};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), logship::Error> {
/// let shipper = ShipperBuilder::new()
///     .ingest_url("https://logs.example.com/inputs")?
///     .token("abc123")
///     .default_tags(["env:staging", "region:eu"])
///     .backoff(Backoff::new(Duration::from_secs(1), 5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ShipperBuilder {
    endpoint: Option<Endpoint>,
    token: Option<String>,
    default_tags: Vec<String>,
    backoff: Backoff,
    timer: Option<Box<dyn Timer>>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl ShipperBuilder {
    /// Creates a new `ShipperBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            token: None,
            default_tags: Vec::new(),
            backoff: Backoff::default(),
            timer: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Sets the ingestion base URL. Defaults to
    /// [`DEFAULT_INGEST_URL`](crate::endpoint::DEFAULT_INGEST_URL).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn ingest_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.endpoint = Some(Endpoint::new(url)?);
        Ok(self)
    }

    /// Sets the account token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the default tags placed ahead of per-call tags.
    pub fn default_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the backoff schedule for failed attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the timer used to wait between attempts.
    pub fn timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Some(Box::new(timer));
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets a per-attempt timeout. By default none is applied.
    ///
    /// A timed-out attempt counts as a failed attempt and is retried.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Shipper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build(self) -> Result<Shipper> {
        let http_client =
            build_http_client(self.user_agent.as_deref().unwrap_or(USER_AGENT), self.timeout)?;

        Ok(Shipper::from_parts(
            http_client,
            self.endpoint.unwrap_or_default(),
            self.backoff,
            self.timer.unwrap_or_else(|| Box::new(TokioTimer)),
            Settings {
                token: self.token,
                default_tags: self.default_tags,
            },
        ))
    }
}

impl Default for ShipperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
