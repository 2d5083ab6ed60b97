//! Error types for log shipping.
//!
//! Every failure of a send operation is reported as an [`Error`] through the
//! operation's outcome (awaited result, [`DeliveryHandle`](crate::DeliveryHandle)
//! or completion callback). Nothing is thrown across the async boundary.

use http::{HeaderMap, StatusCode};

/// The main error type for log shipping.
///
/// Local failures ([`Error::Validation`], [`Error::Encoding`],
/// [`Error::ConfigurationError`]) are reported before any network attempt.
/// Delivery failures carry the last transport or HTTP error observed.
///
/// # Examples
///
/// ```no_run
/// use logship::{Error, Shipper};
///
/// # async fn example() -> Result<(), Error> {
/// let shipper = Shipper::new("my-token")?;
///
/// match shipper.ship("disk almost full", &["host:db-1"]).await {
///     Ok(delivery) => println!("Delivered after {} attempt(s)", delivery.attempts),
///     Err(Error::DeliveryFailed { attempts, last_error }) => {
///         eprintln!("Gave up after {} attempts: {}", attempts, last_error);
///     }
///     Err(e) => eprintln!("Not sent: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The message was empty or no token was configured.
    ///
    /// Raised synchronously, before any I/O or background scheduling.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A structured record could not be serialized to a JSON object.
    #[error("Failed to encode log record: {0}")]
    Encoding(String),

    /// A network-level error occurred (connection refused, DNS failure, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The ingestion endpoint answered with a status other than `200 OK`.
    ///
    /// Any status other than 200 counts, including other 2xx codes.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The retry ceiling was reached without a successful delivery.
    ///
    /// # Fields
    ///
    /// * `attempts` - The total number of network attempts made
    /// * `last_error` - The last transport or HTTP error observed
    #[error("Delivery failed after {attempts} attempts: {last_error}")]
    DeliveryFailed {
        /// The number of attempts made
        attempts: usize,
        /// The last error encountered
        last_error: Box<Error>,
    },

    /// The background delivery task panicked or was cancelled before reporting.
    ///
    /// Attempts may already have reached the endpoint.
    #[error("Delivery task aborted: {0}")]
    Aborted(String),

    /// Invalid configuration was provided, or no async runtime was available.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid ingestion URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the error was raised before any network attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use logship::Error;
    ///
    /// assert!(Error::Validation("token is not set".to_string()).is_local());
    /// assert!(Error::Encoding("not an object".to_string()).is_local());
    /// ```
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Encoding(_)
                | Error::ConfigurationError(_)
                | Error::InvalidUrl(_)
        )
    }

    /// Returns the HTTP status code of the (last) failed response, if any.
    ///
    /// For [`Error::DeliveryFailed`] this looks through to the last error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeliveryFailed { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the raw response body of the (last) failed response, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeliveryFailed { last_error, .. } => last_error.raw_response(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for log shipping.
pub type Result<T> = std::result::Result<T, Error>;
