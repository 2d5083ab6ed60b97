//! # Logship - remote log shipping over HTTP
//!
//! Logship sends text lines and structured records to a token-scoped log
//! ingestion endpoint, optionally tagged for categorization. Delivery happens
//! off the caller's task and failed attempts are retried with exponential
//! backoff until the endpoint answers `200 OK` or the retry ceiling is reached.
//!
//! ## Quick Start
//!
//! ```no_run
//! use logship::{LogMessage, Shipper};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), logship::Error> {
//!     let shipper = Shipper::builder()
//!         .token("abc123")
//!         .default_tags(["env:prod"])
//!         .build()?;
//!
//!     // POST https://logs-01.loggly.com/inputs/abc123/tag/env:prod,svc:api
//!     let delivery = shipper.ship("hello", &["svc:api"]).await?;
//!     println!("Delivered after {} attempt(s)", delivery.attempts);
//!
//!     // Structured records are sent as JSON.
//!     let record = LogMessage::record(&json!({ "level": "error", "msg": "boom" }))?;
//!     shipper.ship(record, &[]).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Sending styles
//!
//! - [`Shipper::ship`] returns a future of the outcome.
//! - [`Shipper::send`] spawns the delivery and returns a [`DeliveryHandle`];
//!   drop it for fire-and-forget.
//! - [`Shipper::send_with`] reports the outcome to a callback, exactly once.
//!
//! Local failures (empty message, missing token, unencodable record) are
//! reported before anything touches the network.
//!
//! ## Retry policy
//!
//! Only `200 OK` counts as delivered. Any other status, and any transport
//! error, is retried after 5s, 10s, 20s, ... up to 10 retries (11 attempts),
//! after which the delivery fails with [`Error::DeliveryFailed`]. See
//! [`Backoff`] to change the schedule and [`Timer`] to control how the wait
//! happens.
//!
//! ## Content types
//!
//! Text is sent as `text/plain`. Records are sent as JSON bodies labelled
//! `application/x-www-form-urlencoded`, which is what the ingestion endpoint
//! expects for them.

mod client;
pub mod config;
pub mod endpoint;
mod error;
mod handle;
pub mod message;
mod response;
pub mod retry;

pub use client::{Shipper, ShipperBuilder};
pub use config::ShipperConfig;
pub use error::{Error, Result};
pub use handle::DeliveryHandle;
pub use message::{EncodedRequest, LogMessage};
pub use response::Delivery;
pub use retry::{Backoff, Timer, TokioTimer};
