//! Ordered strategy negotiation
//!
//! The upstream's accepted request shapes are not known ahead of time, so
//! several operations try a fixed list of alternatives until one is
//! accepted. `StrategyChain` is the single driver for that fold:
//!
//! - attempts run strictly in order, one at a time
//! - the first `Ok` wins and nothing after it is started
//! - an `Err` moves on to the next attempt, nothing is merged across attempts
//! - when every attempt fails, the last error is returned as-is
//!
//! There is no delay, retry or backoff between attempts.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::util::{sanitize_for_logging, truncate_string};

type AttemptFn<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T>> + Send + 'a>;

/// One request shape in a chain
struct Attempt<'a, T> {
    label: &'static str,
    run: AttemptFn<'a, T>,
}

/// The accepted attempt and what it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated<T> {
    /// Label of the attempt that succeeded
    pub strategy: &'static str,

    /// Zero-based position of that attempt in the chain
    pub position: usize,

    /// Value the attempt resolved to
    pub value: T,
}

impl<T> Negotiated<T> {
    /// Drop the bookkeeping, keep the value
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Ordered list of fallible alternatives, tried until one succeeds
pub struct StrategyChain<'a, T> {
    operation: &'static str,
    attempts: Vec<Attempt<'a, T>>,
}

impl<'a, T: Send + 'a> StrategyChain<'a, T> {
    /// Start an empty chain for the named operation
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            attempts: Vec::new(),
        }
    }

    /// Append an attempt. It is only invoked if every earlier attempt failed.
    pub fn attempt<F, Fut>(mut self, label: &'static str, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        self.attempts.push(Attempt {
            label,
            run: Box::new(move || run().boxed()),
        });
        self
    }

    /// Number of attempts queued
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether no attempts are queued
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Labels in the order they will be tried
    pub fn labels(&self) -> Vec<&'static str> {
        self.attempts.iter().map(|attempt| attempt.label).collect()
    }

    /// Run the attempts in order and stop at the first success
    pub async fn run(self) -> Result<Negotiated<T>> {
        let operation = self.operation;
        let total = self.attempts.len();
        let mut last_error: Option<ServiceError> = None;

        for (position, attempt) in self.attempts.into_iter().enumerate() {
            debug!(
                "{}: trying strategy {} ({}/{})",
                operation,
                attempt.label,
                position + 1,
                total
            );

            match (attempt.run)().await {
                Ok(value) => {
                    if position > 0 {
                        info!(
                            "{}: strategy {} accepted after {} rejected",
                            operation, attempt.label, position
                        );
                    }
                    return Ok(Negotiated {
                        strategy: attempt.label,
                        position,
                        value,
                    });
                }
                Err(err) => {
                    warn!(
                        "{}: strategy {} failed: {}",
                        operation,
                        attempt.label,
                        truncate_string(&sanitize_for_logging(&err.to_string()), 300)
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ServiceError::internal(format!("{}: no strategies configured", operation))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_success_wins() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let outcome = StrategyChain::new("test")
            .attempt("a", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::upstream(400, "nope"))
            })
            .attempt("b", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .attempt("c", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(3)
            })
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "b");
        assert_eq!(outcome.position, 1);
        assert_eq!(outcome.value, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error_unwrapped() {
        let err = StrategyChain::<()>::new("test")
            .attempt("a", || async { Err(ServiceError::upstream(400, "first")) })
            .attempt("b", || async { Err(ServiceError::upstream(500, "second")) })
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Upstream { status: 500, ref body, .. } if body == "second"
        ));
    }

    #[tokio::test]
    async fn test_empty_chain_is_internal_error() {
        let chain = StrategyChain::<()>::new("empty");
        assert!(chain.is_empty());
        let err = chain.run().await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn test_labels_keep_insertion_order() {
        let chain = StrategyChain::<u8>::new("order")
            .attempt("first", || async { Ok(1) })
            .attempt("second", || async { Ok(2) });
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.labels(), vec!["first", "second"]);
    }
}
