//! Post-commit event dispatch.

use std::any::Any;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::Instrument;

use crate::event::{DomainEvent, PublishError};

/// Report of an event whose publish side effect failed.
#[derive(Debug)]
pub struct PublishFailure {
    pub event_type: &'static str,
    pub error: PublishError,
}

/// Publishes a batch of events concurrently.
///
/// Failures are logged, counted and, when a channel is attached, forwarded to
/// its receiver. They are never returned to the caller.
#[derive(Debug, Clone, Default)]
pub struct EventPublisher {
    failures: Option<mpsc::Sender<PublishFailure>>,
}

impl EventPublisher {
    /// Creates a publisher that only logs failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher forwarding failures to a bounded channel.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_failure_channel(capacity: usize) -> (Self, mpsc::Receiver<PublishFailure>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                failures: Some(tx),
            },
            rx,
        )
    }

    /// Publishes every event on its own task and waits for the whole batch.
    ///
    /// No ordering is guaranteed between events. A panicking publish is
    /// reported like any other failure. Returns the number of failed
    /// publishes.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn publish_all<E: DomainEvent>(&self, events: &[E]) -> usize {
        let tasks = events.iter().map(|event| {
            let event_type = event.event_type();
            let event = event.clone();
            let handle = tokio::spawn(async move { event.publish().await }.in_current_span());
            async move { (event_type, handle.await) }
        });
        let outcomes = join_all(tasks).await;

        let mut failed = 0;
        for (event_type, joined) in outcomes {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(join_error) if join_error.is_panic() => {
                    PublishError::Panicked(panic_message(join_error.into_panic()))
                }
                Err(join_error) => PublishError::delivery(join_error),
            };
            failed += 1;
            metrics::counter!("ez_cqrs_publish_failures_total", "event_type" => event_type)
                .increment(1);
            tracing::error!(event_type, %error, "event publish failed");
            self.report(PublishFailure { event_type, error });
        }

        failed
    }

    fn report(&self, failure: PublishFailure) {
        let Some(tx) = &self.failures else {
            return;
        };
        match tx.try_send(failure) {
            Ok(()) => {}
            Err(TrySendError::Full(failure)) => {
                tracing::warn!(
                    event_type = failure.event_type,
                    "publish failure channel full, report dropped"
                );
            }
            Err(TrySendError::Closed(failure)) => {
                tracing::debug!(
                    event_type = failure.event_type,
                    "publish failure channel closed, report dropped"
                );
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static PUBLISHED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Pinged {
        fail: bool,
        crash: bool,
    }

    impl Pinged {
        fn ok() -> Self {
            Self {
                fail: false,
                crash: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                crash: false,
            }
        }

        fn crashing() -> Self {
            Self {
                fail: false,
                crash: true,
            }
        }
    }

    #[async_trait]
    impl DomainEvent for Pinged {
        fn event_type(&self) -> &'static str {
            "Pinged"
        }

        async fn publish(&self) -> Result<(), PublishError> {
            if self.crash {
                panic!("ping handler bug");
            }
            if self.fail {
                return Err(PublishError::Rejected("pong refused".to_string()));
            }
            PUBLISHED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_are_counted_and_forwarded() {
        let (publisher, mut rx) = EventPublisher::with_failure_channel(8);
        let events = vec![Pinged::ok(), Pinged::failing(), Pinged::failing()];

        let failed = publisher.publish_all(&events).await;

        assert_eq!(failed, 2);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type, "Pinged");
        assert_eq!(first.error.to_string(), "Event rejected: pong refused");
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_reports_without_blocking() {
        let (publisher, mut rx) = EventPublisher::with_failure_channel(1);
        let events = vec![Pinged::failing(), Pinged::failing()];

        let failed = publisher.publish_all(&events).await;

        assert_eq!(failed, 2);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publisher_without_channel_still_runs_every_event() {
        let before = PUBLISHED.load(Ordering::SeqCst);
        let publisher = EventPublisher::new();
        let events = vec![Pinged::ok(), Pinged::ok()];

        assert_eq!(publisher.publish_all(&events).await, 0);
        assert!(PUBLISHED.load(Ordering::SeqCst) >= before + 2);
    }

    #[tokio::test]
    async fn closed_channel_is_tolerated() {
        let (publisher, rx) = EventPublisher::with_failure_channel(4);
        drop(rx);

        assert_eq!(publisher.publish_all(&[Pinged::failing()]).await, 1);
    }

    #[tokio::test]
    async fn panicking_publish_is_reported_as_failure() {
        let (publisher, mut rx) = EventPublisher::with_failure_channel(4);
        let events = vec![Pinged::crashing(), Pinged::ok()];

        let failed = publisher.publish_all(&events).await;

        assert_eq!(failed, 1);
        let failure = rx.recv().await.unwrap();
        assert_eq!(failure.event_type, "Pinged");
        assert_eq!(failure.error.to_string(), "Publish panicked: ping handler bug");
    }
}
