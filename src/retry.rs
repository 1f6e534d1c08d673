use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Last error of an operation that failed on every attempt.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Runs `op` up to `max_tries` times (at least once), sleeping `backoff`
/// between failed attempts. There is no sleep after the final attempt.
pub async fn attempt<T, E, F, Fut>(
    mut op: F,
    max_tries: u32,
    backoff: Duration,
) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_tries = max_tries.max(1);
    let mut n = 1;
    loop {
        match op(n).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", n, max_tries, e);
                if n >= max_tries {
                    return Err(Exhausted { attempts: n, last: e });
                }
                info!("Retrying in {} seconds...", backoff.as_secs_f64());
                tokio::time::sleep(backoff).await;
                n += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = attempt(
            |n| {
                calls.set(calls.get() + 1);
                async move {
                    if n < 3 {
                        Err("temporary failure")
                    } else {
                        Ok("done")
                    }
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_tries() {
        let calls = Cell::new(0);
        let result: Result<(), _> = attempt(
            |_| {
                calls.set(calls.get() + 1);
                async { Err("down") }
            },
            3,
            Duration::ZERO,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last, "down");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_tries_still_runs_once() {
        let calls = Cell::new(0);
        let result: Result<(), _> = attempt(
            |_| {
                calls.set(calls.get() + 1);
                async { Err("nope") }
            },
            0,
            Duration::from_secs(60),
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.get(), 1);
    }
}
