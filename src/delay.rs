use std::future::Future;
use tokio::time::{sleep, Duration, Instant};

/// Time still owed before `min` has passed since `started`.
pub fn remaining(min: Duration, started: Instant) -> Duration {
    min.saturating_sub(started.elapsed())
}

/// Run `operation` and, if it succeeds, hold the value until at least `min`
/// has elapsed since the call so a loading indicator stays perceivable on
/// fast responses. Errors are returned as soon as they arrive.
pub async fn at_least_ok<F, T, E>(min: Duration, operation: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let value = operation.await?;
    let wait = remaining(min, started);
    if !wait.is_zero() {
        sleep(wait).await;
    }
    Ok(value)
}
