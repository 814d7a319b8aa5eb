use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use super::{ItemOutcome, ItemProcessor};
use crate::publish::PublishedPost;

/// What happened to one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Published { post: PublishedPost },
    NoTranscript,
    NoArticle,
    Failed { stage: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub url: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

/// Per-URL results of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    /// Items that ran to a normal end, published or skipped
    pub fn succeeded(&self) -> usize {
        self.items.len() - self.failed()
    }

    pub fn published(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Published { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::NoTranscript | ItemStatus::NoArticle))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.status)).count()
    }
}

/// Feeds URLs through an item processor one at a time. A failing item is
/// recorded and the batch moves on.
pub struct BatchRunner<'a, P: ItemProcessor + ?Sized> {
    processor: &'a P,
    show_progress: bool,
}

impl<'a, P: ItemProcessor + ?Sized> BatchRunner<'a, P> {
    pub fn new(processor: &'a P, show_progress: bool) -> Self {
        Self {
            processor,
            show_progress,
        }
    }

    pub async fn run(&self, urls: &[String]) -> BatchReport {
        let progress = if self.show_progress {
            ProgressBar::new(urls.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar().template("[{pos}/{len}] {bar:30.cyan/blue} {msg}") {
            progress.set_style(style);
        }

        let mut report = BatchReport::default();

        for (i, url) in urls.iter().enumerate() {
            progress.set_message(url.clone());
            tracing::info!(item = i + 1, total = urls.len(), url = %url, "Processing item");

            let status = match self.processor.process(url).await {
                Ok(ItemOutcome::Published(post)) => ItemStatus::Published { post },
                Ok(ItemOutcome::NoTranscript) => ItemStatus::NoTranscript,
                Ok(ItemOutcome::NoArticle) => ItemStatus::NoArticle,
                Err(e) => ItemStatus::Failed {
                    stage: e.stage().to_string(),
                    message: format!("{:#}", e),
                },
            };

            report.items.push(ItemReport {
                url: url.clone(),
                status,
            });
            progress.inc(1);
        }

        progress.finish_and_clear();
        tracing::info!(
            published = report.published(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Batch finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the URLs it is told to, publishes the rest
    struct ScriptedProcessor {
        fail_extraction: Vec<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ItemProcessor for ScriptedProcessor {
        async fn process(&self, url: &str) -> Result<ItemOutcome, PipelineError> {
            self.seen.lock().unwrap().push(url.to_string());
            if self.fail_extraction.iter().any(|f| *f == url) {
                return Err(PipelineError::Extraction(anyhow::anyhow!("ffmpeg exited with 1")));
            }
            if url.ends_with("silent") {
                return Ok(ItemOutcome::NoTranscript);
            }
            Ok(ItemOutcome::Published(PublishedPost {
                id: url.rsplit('/').next().unwrap_or_default().to_string(),
                url: None,
            }))
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failure_in_middle_item_does_not_stop_batch() {
        let processor = ScriptedProcessor {
            fail_extraction: vec!["https://x.test/shorts/2"],
            seen: Mutex::new(Vec::new()),
        };
        let input = urls(&["https://x.test/shorts/1", "https://x.test/shorts/2", "https://x.test/shorts/3"]);

        let report = BatchRunner::new(&processor, false).run(&input).await;

        assert_eq!(*processor.seen.lock().unwrap(), input);
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            &report.items[1].status,
            ItemStatus::Failed { stage, .. } if stage == "extraction"
        ));
        assert!(matches!(&report.items[2].status, ItemStatus::Published { post } if post.id == "3"));
    }

    #[tokio::test]
    async fn skipped_items_count_as_success_not_publication() {
        let processor = ScriptedProcessor {
            fail_extraction: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let report = BatchRunner::new(&processor, false)
            .run(&urls(&["https://x.test/shorts/silent", "https://x.test/shorts/9"]))
            .await;

        assert_eq!(report.published(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.succeeded(), 2);
    }

    #[test]
    fn report_serializes_with_flat_status() {
        let report = BatchReport {
            items: vec![ItemReport {
                url: "u".to_string(),
                status: ItemStatus::Failed {
                    stage: "publishing".to_string(),
                    message: "HTTP 403".to_string(),
                },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "failed");
        assert_eq!(json["items"][0]["stage"], "publishing");
        assert_eq!(json["items"][0]["url"], "u");
    }
}
