//! Ordered fallback strategies

use futures_util::future::BoxFuture;

use crate::error::{FlowcraftError, Result};

/// A named attempt at producing a `T`
pub struct Strategy<'a, T> {
    pub name: &'static str,
    pub run: Box<dyn FnOnce() -> BoxFuture<'a, Result<T>> + Send + 'a>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<T>> + Send + 'a,
    {
        Self {
            name,
            run: Box::new(run),
        }
    }
}

/// Run strategies in order and return the first success with its name.
/// Later strategies are never started once one succeeds. When all fail the
/// last error is returned.
pub async fn first_success<'a, T>(strategies: Vec<Strategy<'a, T>>) -> Result<(&'static str, T)> {
    let mut last_err = FlowcraftError::Internal {
        message: "no strategies supplied".to_string(),
    };
    for strategy in strategies {
        match (strategy.run)().await {
            Ok(value) => return Ok((strategy.name, value)),
            Err(e) => {
                tracing::debug!(strategy = strategy.name, error = %e, "Strategy failed; trying next");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = &AtomicUsize::new(0);
        let strategies: Vec<Strategy<'_, u32>> = vec![
            Strategy::new("fails", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FlowcraftError::malformed("empty steps"))
                }
                .boxed()
            }),
            Strategy::new("works", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
                .boxed()
            }),
            Strategy::new("never", move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(9)
                }
                .boxed()
            }),
        ];
        let (name, value) = first_success(strategies).await.unwrap();
        assert_eq!((name, value), ("works", 7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_failing_returns_last_error() {
        let strategies: Vec<Strategy<'_, ()>> = vec![
            Strategy::new("a", || async { Err(FlowcraftError::malformed("a")) }.boxed()),
            Strategy::new("b", || async { Err(FlowcraftError::malformed("b")) }.boxed()),
        ];
        let err = first_success(strategies).await.unwrap_err();
        assert!(err.to_string().contains('b'));
        let empty: Vec<Strategy<'_, ()>> = Vec::new();
        assert!(first_success(empty).await.is_err());
    }
}
