//! The outcome of a successful delivery.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A log submission accepted by the ingestion endpoint.
///
/// Carries the raw response payload along with metadata about the delivery,
/// including how many attempts it took.
///
/// # Examples
///
/// ```no_run
/// use logship::Shipper;
///
/// # async fn example() -> Result<(), logship::Error> {
/// let shipper = Shipper::new("my-token")?;
/// let delivery = shipper.ship("cache warmed", &[]).await?;
///
/// println!("Response: {}", delivery.raw_body);
/// println!("Took {:?} over {} attempt(s)", delivery.latency, delivery.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The raw response body.
    pub raw_body: String,

    /// The HTTP status code of the response. Always `200 OK`.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until the successful response, including
    /// backoff delays.
    pub latency: Duration,

    /// The number of attempts made; `1` when the first attempt succeeded.
    pub attempts: usize,
}

impl Delivery {
    /// Creates a new `Delivery`.
    pub fn new(
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Returns `true` if the submission needed retries.
    ///
    /// # Examples
    ///
    /// ```
    /// # use logship::Delivery;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let delivery = Delivery::new(
    ///     String::new(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     3,
    /// );
    ///
    /// assert!(delivery.was_retried());
    /// assert_eq!(delivery.retries(), 2);
    /// ```
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns the number of retries after the initial attempt.
    pub fn retries(&self) -> usize {
        self.attempts.saturating_sub(1)
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
