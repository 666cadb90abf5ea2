use crate::error::{Result, YueBotError};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// 下一次等待的时长，不超过 max_delay
    fn next_delay(&self, delay: Duration) -> Duration {
        let scaled = Duration::from_nanos((delay.as_nanos() as f64 * self.backoff_multiplier) as u64);
        scaled.min(self.max_delay)
    }
}

pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: RetryConfig,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut delay = config.base_delay;

    for attempt in 1..=config.max_attempts {
        debug!("{operation_name}: attempt {attempt}/{}", config.max_attempts);

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("✅ {operation_name} succeeded after {attempt} attempts");
                }
                return Ok(result);
            }
            Err(error) => {
                if !error.is_retryable() {
                    warn!("{operation_name} failed permanently: {error}");
                    return Err(error);
                }
                warn!("{operation_name} failed on attempt {attempt}: {error}");

                // 服务端限流时按它给的时间等，否则指数退避
                let wait = error.retry_after().unwrap_or(delay);
                last_error = Some(error);

                if attempt < config.max_attempts {
                    debug!("Waiting {wait:?} before next attempt");
                    sleep(wait).await;
                    delay = config.next_delay(delay);
                }
            }
        }
    }

    let error = last_error.unwrap_or_else(|| {
        YueBotError::Config(anyhow::anyhow!("{operation_name} configured with zero attempts"))
    });
    error!("❌ {operation_name} gave up after {} attempts", config.max_attempts);
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        }
    }

    fn network_hiccup() -> YueBotError {
        YueBotError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "getMe timed out",
        ))
    }

    #[tokio::test]
    async fn test_login_probe_recovers_after_hiccup() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let result = retry_with_backoff(
            move || {
                let calls = Arc::clone(&probe_calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(network_hiccup())
                    } else {
                        Ok("yue_bot")
                    }
                }
            },
            fast_config(3),
            "Telegram login",
        )
        .await;

        assert_eq!(result.unwrap(), "yue_bot");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_login_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let result = retry_with_backoff(
            move || {
                probe_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(YueBotError::session_login("Unauthorized")) }
            },
            fast_config(3),
            "Telegram login",
        )
        .await;

        assert!(matches!(result, Err(YueBotError::SessionLogin { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let result = retry_with_backoff(
            move || {
                probe_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(network_hiccup()) }
            },
            fast_config(2),
            "Telegram login",
        )
        .await;

        assert!(matches!(result, Err(YueBotError::Io(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_is_config_error() {
        let result: Result<()> =
            retry_with_backoff(|| async { Ok(()) }, fast_config(0), "Telegram login").await;
        assert!(matches!(result, Err(YueBotError::Config(_))));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = fast_config(5);
        assert_eq!(
            config.next_delay(Duration::from_millis(2)),
            Duration::from_millis(4)
        );
        assert_eq!(
            config.next_delay(Duration::from_millis(8)),
            Duration::from_millis(10)
        );
        assert_eq!(RetryConfig::with_max_attempts(7).max_attempts, 7);
    }
}
