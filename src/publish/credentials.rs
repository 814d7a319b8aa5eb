use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::utils::with_timeout;

/// A bearer token and the moment it stops being trusted
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// Produces fresh tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

/// What the publisher sees
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token that has not expired
    async fn token(&self) -> Result<String>;

    /// Forget the current token, e.g. after the host answered 401
    async fn invalidate(&self);
}

/// Caches a [`TokenSource`]'s token and hands it out until it expires or is
/// invalidated after the host rejects it, then asks the source again
pub struct TokenCache<S> {
    source: S,
    current: Mutex<Option<AccessToken>>,
}

impl<S: TokenSource> TokenCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: TokenSource> CredentialProvider for TokenCache<S> {
    async fn token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if !token.is_expired(Instant::now()) {
                return Ok(token.value.clone());
            }
            tracing::debug!("Access token expired, refreshing");
        }

        let token = self.source.fetch().await?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}

/// Runs an external command (e.g. `gcloud auth print-access-token`) and
/// takes its trimmed stdout as the token
pub struct CommandTokenSource {
    command: String,
    lifetime: Duration,
    timeout: Option<Duration>,
}

impl CommandTokenSource {
    pub fn new(command: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            command: command.into(),
            lifetime,
            timeout: None,
        }
    }

    /// Bound how long the command may run
    pub fn with_limit(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Token command is empty"))?;

        let mut command = Command::new(program);
        command.args(parts).kill_on_drop(true);
        let output = with_timeout(self.timeout, "token command", async {
            command
                .output()
                .await
                .with_context(|| format!("Failed to run token command `{}`", self.command))
        })
        .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Token command failed: {}", error.trim());
        }

        let value = String::from_utf8(output.stdout)?.trim().to_string();
        if value.is_empty() {
            anyhow::bail!("Token command printed nothing");
        }

        Ok(AccessToken {
            value,
            expires_at: Some(Instant::now() + self.lifetime),
        })
    }
}

/// A fixed token that never expires on our side
pub struct StaticTokenSource {
    value: String,
}

impl StaticTokenSource {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        Ok(AccessToken {
            value: self.value.clone(),
            expires_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        lifetime: Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                value: format!("token-{}", n),
                expires_at: Some(Instant::now() + self.lifetime),
            })
        }
    }

    fn counting(lifetime: Duration) -> TokenCache<CountingSource> {
        TokenCache::new(CountingSource {
            calls: AtomicUsize::new(0),
            lifetime,
        })
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_expiry() {
        let cache = counting(Duration::from_secs(600));
        assert_eq!(cache.token().await.unwrap(), "token-1");
        assert_eq!(cache.token().await.unwrap(), "token-1");
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let cache = counting(Duration::ZERO);
        assert_eq!(cache.token().await.unwrap(), "token-1");
        assert_eq!(cache.token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let cache = counting(Duration::from_secs(600));
        cache.token().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn static_token_never_expires() {
        let cache = TokenCache::new(StaticTokenSource::new("abc"));
        assert_eq!(cache.token().await.unwrap(), "abc");
        assert_eq!(cache.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn hung_token_command_times_out() {
        let source = CommandTokenSource::new("sleep 5", Duration::from_secs(60))
            .with_limit(Some(Duration::from_millis(50)));
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("token command timed out"));
    }

    #[tokio::test]
    async fn command_output_is_trimmed_into_token() {
        let source = CommandTokenSource::new("echo abc123", Duration::from_secs(60))
            .with_limit(Some(Duration::from_secs(10)));
        let token = source.fetch().await.unwrap();
        assert_eq!(token.value, "abc123");
        assert!(token.expires_at.is_some());
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let source = CommandTokenSource::new("   ", Duration::from_secs(60));
        assert!(source.fetch().await.is_err());
    }
}
