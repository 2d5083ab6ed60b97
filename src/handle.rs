//! Handle to a delivery running in the background.

use crate::{Delivery, Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// The pending outcome of [`Shipper::send`](crate::Shipper::send).
///
/// Awaiting the handle yields the delivery result. Dropping it leaves the
/// delivery running to completion with its outcome discarded.
///
/// # Examples
///
/// ```no_run
/// use logship::Shipper;
///
/// # async fn example() -> Result<(), logship::Error> {
/// let shipper = Shipper::new("my-token")?;
///
/// // Fire and forget.
/// shipper.send("request served", &["svc:api"]);
///
/// // Or keep the handle and wait for the outcome later.
/// let handle = shipper.send("job finished", &[]);
/// let delivery = handle.await?;
/// println!("Delivered in {:?}", delivery.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeliveryHandle {
    state: State,
}

#[derive(Debug)]
enum State {
    /// Resolved without spawning (validation, encoding, or setup failure).
    Ready(Option<Error>),
    Running(JoinHandle<Result<Delivery>>),
}

impl DeliveryHandle {
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            state: State::Ready(Some(error)),
        }
    }

    pub(crate) fn running(task: JoinHandle<Result<Delivery>>) -> Self {
        Self {
            state: State::Running(task),
        }
    }

    /// Returns `true` once the outcome is available without waiting.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Running(task) => task.is_finished(),
        }
    }
}

impl Future for DeliveryHandle {
    type Output = Result<Delivery>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Ready(error) => Poll::Ready(Err(error.take().unwrap_or_else(|| {
                Error::ConfigurationError("DeliveryHandle polled after completion".to_string())
            }))),
            State::Running(task) => Pin::new(task).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(Error::Aborted(e.to_string()))
                })
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_handle_resolves_immediately() {
        let handle = DeliveryHandle::failed(Error::Validation("no token".to_string()));
        assert!(handle.is_finished());
        assert!(matches!(handle.await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_running_handle_yields_task_outcome() {
        let task = tokio::spawn(async {
            Ok(Delivery::new(
                "ok".to_string(),
                StatusCode::OK,
                HeaderMap::new(),
                Duration::ZERO,
                1,
            ))
        });

        let delivery = DeliveryHandle::running(task).await.unwrap();
        assert_eq!(delivery.raw_body, "ok");
    }

    async fn explode() -> Result<Delivery> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicked_task_becomes_error() {
        let task = tokio::spawn(explode());

        match DeliveryHandle::running(task).await {
            Err(e @ Error::Aborted(_)) => assert!(!e.is_local()),
            other => panic!("Expected Aborted, got {:?}", other),
        }
    }
}
