use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::credentials::{CommandTokenSource, CredentialProvider, StaticTokenSource, TokenCache};
use super::{PostDraft, PublishedPost, Publisher};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    kind: &'static str,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostResource {
    id: String,
    url: Option<String>,
}

/// Publishes posts through the Blogger v3 REST API
pub struct BloggerPublisher {
    client: reqwest::Client,
    api_base: String,
    blog_id: String,
    draft: bool,
    credentials: Arc<dyn CredentialProvider>,
}

impl BloggerPublisher {
    pub fn new(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        config.require_blog_id()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.call_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_base: config.publishing.api_base.trim_end_matches('/').to_string(),
            blog_id: config.publishing.blog_id.clone(),
            draft: config.publishing.draft,
            credentials,
        })
    }

    /// Credential provider described by the `publishing` config section
    pub fn credentials_from_config(config: &Config) -> Result<Arc<dyn CredentialProvider>> {
        let publishing = &config.publishing;

        if let Some(token) = &publishing.access_token {
            return Ok(Arc::new(TokenCache::new(StaticTokenSource::new(token.clone()))));
        }

        match &publishing.token_command {
            Some(command) => Ok(Arc::new(TokenCache::new(
                CommandTokenSource::new(
                    command.clone(),
                    Duration::from_secs(publishing.token_lifetime_secs),
                )
                .with_limit(config.call_timeout()),
            ))),
            None => anyhow::bail!("Set publishing.access_token or publishing.token_command"),
        }
    }

    fn posts_url(&self) -> String {
        format!(
            "{}/blogs/{}/posts/?isDraft={}",
            self.api_base, self.blog_id, self.draft
        )
    }

    async fn send(&self, token: &str, body: &NewPost<'_>) -> Result<reqwest::Response> {
        self.client
            .post(self.posts_url())
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .context("Failed to reach blog host")
    }
}

#[async_trait]
impl Publisher for BloggerPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishedPost> {
        let content = draft.content();
        let body = NewPost {
            kind: "blogger#post",
            title: draft.title(),
            content: &content,
        };

        tracing::info!(title = %body.title, "Publishing post");

        let token = self.credentials.token().await?;
        let mut response = self.send(&token, &body).await?;

        // A rejected token gets exactly one refresh
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Blog host rejected the access token, refreshing");
            self.credentials.invalidate().await;
            let token = self.credentials.token().await?;
            response = self.send(&token, &body).await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Blog host returned HTTP {}: {}", status, text);
        }

        let post: PostResource = response
            .json()
            .await
            .context("Failed to parse created post")?;

        Ok(PublishedPost {
            id: post.id,
            url: post.url,
        })
    }
}
