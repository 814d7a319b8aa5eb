use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod ollama;

pub use ollama::OllamaGenerator;

/// Marks the start of the title in a generated response
pub const TITLE_MARKER: &str = "Title:";

/// Marks the start of the body in a generated response
pub const BODY_MARKER: &str = "Body:";

/// Build the chat prompt for a transcript
pub fn build_prompt(transcript: &str) -> String {
    format!(
        "Create a short blog based on the following transcript:\n{transcript}\n\n\
         It must have two parts, a title and a body. Use easy English and a friendly way to write the blog. \
         Format the answer exactly like this, without any other formatting around the labels:\n\
         {TITLE_MARKER} <the title>\n\
         {BODY_MARKER}\n<the body>"
    )
}

/// What the marker scan found in a raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedArticle {
    /// Both markers present, title marker first
    Sectioned { title: String, body: String },
    /// Markers missing or out of order; the whole response is the body
    BodyOnly { body: String },
}

impl ParsedArticle {
    pub fn parse(raw: &str) -> Self {
        if let Some(title_start) = raw.find(TITLE_MARKER).map(|i| i + TITLE_MARKER.len()) {
            if let Some(body_marker) = raw[title_start..].find(BODY_MARKER).map(|i| i + title_start) {
                return Self::Sectioned {
                    title: raw[title_start..body_marker].trim().to_string(),
                    body: raw[body_marker + BODY_MARKER.len()..].trim().to_string(),
                };
            }
        }

        Self::BodyOnly {
            body: raw.to_string(),
        }
    }
}

/// A generated blog article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub body: String,
}

impl From<ParsedArticle> for Article {
    fn from(parsed: ParsedArticle) -> Self {
        match parsed {
            ParsedArticle::Sectioned { title, body } => Self { title, body },
            ParsedArticle::BodyOnly { body } => Self {
                title: String::new(),
                body,
            },
        }
    }
}

impl Article {
    /// Text form saved next to the post; parses back to the same article
    pub fn to_text(&self) -> String {
        if self.title.is_empty() {
            self.body.clone()
        } else {
            format!("{} {}\n\n{}\n{}\n", TITLE_MARKER, self.title, BODY_MARKER, self.body)
        }
    }
}

/// Chat-style text generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Raw response text for a single user prompt; empty when the service
    /// returned no message
    async fn complete(&self, prompt: &str) -> crate::Result<String>;
}

/// Ask the generator for an article. `None` means no usable response came
/// back; this is logged here and is not an error for the caller.
pub async fn generate_article(generator: &dyn TextGenerator, transcript: &str) -> Option<Article> {
    tracing::info!("Generating blog...");

    match generator.complete(&build_prompt(transcript)).await {
        Ok(raw) if !raw.trim().is_empty() => {
            let parsed = ParsedArticle::parse(&raw);
            if matches!(parsed, ParsedArticle::BodyOnly { .. }) {
                tracing::warn!("Response has no title/body markers, using it as the body");
            }
            tracing::info!("Blog generation completed");
            Some(parsed.into())
        }
        Ok(_) => {
            tracing::error!("Unable to generate blog: empty response");
            None
        }
        Err(e) => {
            tracing::error!("Unable to generate blog: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sectioned_response_is_split_and_trimmed() {
        let raw = "Sure! Here it is.\nTitle:  My Pasta Night \n\nBody:\n  Cooking is fun.\nTry it!  \n";
        assert_eq!(
            ParsedArticle::parse(raw),
            ParsedArticle::Sectioned {
                title: "My Pasta Night".to_string(),
                body: "Cooking is fun.\nTry it!".to_string(),
            }
        );
    }

    #[test]
    fn response_without_markers_is_body_verbatim() {
        let raw = "  Just a blog post\nwith no labels.  ";
        let article = Article::from(ParsedArticle::parse(raw));
        assert_eq!(article.title, "");
        assert_eq!(article.body, raw);
    }

    #[test]
    fn body_marker_before_title_falls_back_to_body_only() {
        let raw = "Body: text first\nTitle: late title";
        assert_eq!(
            ParsedArticle::parse(raw),
            ParsedArticle::BodyOnly { body: raw.to_string() }
        );
    }

    #[test]
    fn title_marker_alone_falls_back_to_body_only() {
        let raw = "Title: only a title";
        assert!(matches!(ParsedArticle::parse(raw), ParsedArticle::BodyOnly { .. }));
    }

    #[test]
    fn text_form_parses_back_to_same_article() {
        let article = Article {
            title: "Hello".to_string(),
            body: "Line one.\nLine two.".to_string(),
        };
        assert_eq!(Article::from(ParsedArticle::parse(&article.to_text())), article);
    }

    #[test]
    fn prompt_carries_transcript_and_markers() {
        let prompt = build_prompt("we went hiking");
        assert!(prompt.contains("we went hiking"));
        assert!(prompt.contains(TITLE_MARKER));
        assert!(prompt.contains(BODY_MARKER));
    }

    #[tokio::test]
    async fn empty_response_is_absent_article() {
        let mut generator = MockTextGenerator::new();
        generator.expect_complete().times(1).returning(|_| Ok("   ".to_string()));
        assert!(generate_article(&generator, "transcript").await.is_none());
    }

    #[tokio::test]
    async fn failed_call_is_absent_article() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_complete()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        assert!(generate_article(&generator, "transcript").await.is_none());
    }

    #[tokio::test]
    async fn unmarked_response_still_yields_article() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_complete()
            .withf(|prompt: &str| prompt.contains("the transcript text"))
            .returning(|_| Ok("A friendly post.".to_string()));

        let article = generate_article(&generator, "the transcript text").await.unwrap();
        assert_eq!(article.title, "");
        assert_eq!(article.body, "A friendly post.");
    }
}
