use std::future::Future;

use crate::errors::DeployError;

/// Runs `operation` until it succeeds or `max_attempts` runs have failed.
///
/// `on_failure` sees every failed attempt (zero based) before the next one
/// starts. No backoff between attempts. Once the ceiling is hit the last error
/// is returned inside [DeployError::AttemptsExhausted] so the real fault stays
/// visible.
pub async fn retry_capped<T, F, Fut, L>(
    what: &str,
    max_attempts: u32,
    mut operation: F,
    mut on_failure: L,
) -> Result<T, DeployError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    L: FnMut(u32, &anyhow::Error),
{
    let mut last_error = anyhow::anyhow!("no attempt was made");
    for attempt in 0..max_attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                on_failure(attempt, &err);
                last_error = err;
            }
        }
    }

    Err(DeployError::AttemptsExhausted {
        what: what.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let mut seen = vec![];
        let value = retry_capped(
            "thing",
            5,
            |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 2 {
                        anyhow::bail!("flaky {attempt}");
                    }
                    Ok(attempt)
                }
            },
            |attempt, err| seen.push(format!("{attempt}: {err}")),
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.get(), 3);
        assert_eq!(seen, vec!["0: flaky 0", "1: flaky 1"]);
    }

    #[tokio::test]
    async fn exhausting_attempts_keeps_last_error() {
        let err = retry_capped::<(), _, _, _>(
            "xagonZkEVMGlobalExitRoot",
            3,
            |attempt| async move { anyhow::bail!("node hiccup #{attempt}") },
            |_, _| {},
        )
        .await
        .unwrap_err();

        match err {
            DeployError::AttemptsExhausted {
                what,
                attempts,
                last_error,
            } => {
                assert_eq!(what, "xagonZkEVMGlobalExitRoot");
                assert_eq!(attempts, 3);
                assert_eq!(last_error.to_string(), "node hiccup #2");
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
