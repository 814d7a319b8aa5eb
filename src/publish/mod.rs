use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod blogger;
pub mod credentials;

pub use blogger::BloggerPublisher;
pub use credentials::{CommandTokenSource, CredentialProvider, StaticTokenSource, TokenCache};

use crate::generate::Article;
use crate::Result;

/// A created post on the blog host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub url: Option<String>,
}

impl std::fmt::Display for PublishedPost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} ({})", url, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Everything needed to create one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    /// Filesystem-safe title of the source video
    pub video_title: String,
    pub article: Article,
    /// Base64 JPEG thumbnail
    pub thumbnail: String,
}

impl PostDraft {
    /// Post title: the generated title, or the video title when the
    /// response had none
    pub fn title(&self) -> &str {
        if self.article.title.is_empty() {
            &self.video_title
        } else {
            &self.article.title
        }
    }

    /// HTML content with the thumbnail, title and body sections
    pub fn content(&self) -> String {
        let mut html = format!(
            "<div class=\"thumbnail\"><img src=\"data:image/jpeg;base64,{}\" alt=\"{}\"/></div>\n",
            self.thumbnail,
            escape_html(self.title())
        );

        if !self.article.title.is_empty() {
            html.push_str(&format!(
                "<h2 class=\"title\">{}</h2>\n",
                escape_html(&self.article.title)
            ));
        }

        html.push_str("<div class=\"body\">\n");
        for paragraph in self
            .article
            .body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            html.push_str(&format!(
                "<p>{}</p>\n",
                escape_html(paragraph).replace('\n', "<br/>")
            ));
        }
        html.push_str("</div>\n");

        html
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Read an image file and encode it for transport
pub fn encode_thumbnail(path: &Path) -> Result<String> {
    let bytes = fs_err::read(path).context("Failed to read thumbnail")?;
    Ok(STANDARD.encode(bytes))
}

/// Blog host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishedPost>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, body: &str) -> PostDraft {
        PostDraft {
            video_title: "My_Reel".to_string(),
            article: Article {
                title: title.to_string(),
                body: body.to_string(),
            },
            thumbnail: "QUJD".to_string(),
        }
    }

    #[test]
    fn content_embeds_thumbnail_title_and_paragraphs() {
        let html = draft("Fish & Chips", "First <para>.\n\nSecond line\nwrapped.").content();

        assert!(html.contains("src=\"data:image/jpeg;base64,QUJD\""));
        assert!(html.contains("<h2 class=\"title\">Fish &amp; Chips</h2>"));
        assert!(html.contains("<p>First &lt;para&gt;.</p>"));
        assert!(html.contains("<p>Second line<br/>wrapped.</p>"));
    }

    #[test]
    fn untitled_article_uses_video_title_and_no_heading() {
        let draft = draft("", "Body only.");
        assert_eq!(draft.title(), "My_Reel");
        assert!(!draft.content().contains("<h2"));
    }

    #[test]
    fn thumbnail_is_base64_of_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumbnail_1.jpg");
        fs_err::write(&path, b"ABC").unwrap();
        assert_eq!(encode_thumbnail(&path).unwrap(), "QUJD");
    }

    #[test]
    fn published_post_display_prefers_url() {
        let post = PublishedPost {
            id: "42".to_string(),
            url: Some("https://blog.example.com/p/42".to_string()),
        };
        assert_eq!(post.to_string(), "https://blog.example.com/p/42 (42)");
    }
}
