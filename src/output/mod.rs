use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::pipeline::{BatchReport, ItemStatus};

#[derive(Serialize)]
struct LinkList<'a> {
    count: usize,
    links: &'a [String],
}

/// Render a batch report as a per-item summary
pub fn format_report(report: &BatchReport, format: &OutputFormat) -> Result<String> {
    if *format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut out = String::new();
    for item in &report.items {
        let line = match &item.status {
            ItemStatus::Published { post } => format!("published  {} -> {}", item.url, post),
            ItemStatus::NoTranscript => format!("skipped    {} (no speech recognized)", item.url),
            ItemStatus::NoArticle => format!("skipped    {} (no article generated)", item.url),
            ItemStatus::Failed { stage, message } => {
                format!("failed     {} [{}] {}", item.url, stage, message)
            }
        };
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str(&format!(
        "\n{} items: {} published, {} skipped, {} failed",
        report.items.len(),
        report.published(),
        report.skipped(),
        report.failed()
    ));
    Ok(out)
}

/// Render crawled links, one per line in text mode
pub fn format_links(links: &[String], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&LinkList {
            count: links.len(),
            links,
        })?),
        OutputFormat::Text => Ok(links.join("\n")),
    }
}

/// Print batch report to console
pub fn print_report(report: &BatchReport, format: &OutputFormat) -> Result<()> {
    println!("{}", format_report(report, format)?);
    Ok(())
}

/// Print crawled links to console
pub fn print_links(links: &[String], format: &OutputFormat) -> Result<()> {
    let content = format_links(links, format)?;
    if !content.is_empty() {
        println!("{}", content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ItemReport;
    use crate::publish::PublishedPost;

    fn report() -> BatchReport {
        BatchReport {
            items: vec![
                ItemReport {
                    url: "https://v.test/1".to_string(),
                    status: ItemStatus::Published {
                        post: PublishedPost {
                            id: "42".to_string(),
                            url: Some("https://blog.test/p/42".to_string()),
                        },
                    },
                },
                ItemReport {
                    url: "https://v.test/2".to_string(),
                    status: ItemStatus::Failed {
                        stage: "extraction".to_string(),
                        message: "extraction failed: no frames".to_string(),
                    },
                },
                ItemReport {
                    url: "https://v.test/3".to_string(),
                    status: ItemStatus::NoTranscript,
                },
            ],
        }
    }

    #[test]
    fn text_report_lists_each_item_and_totals() {
        let text = format_report(&report(), &OutputFormat::Text).unwrap();

        assert!(text.contains("published  https://v.test/1 -> https://blog.test/p/42 (42)"));
        assert!(text.contains("failed     https://v.test/2 [extraction]"));
        assert!(text.contains("skipped    https://v.test/3 (no speech recognized)"));
        assert!(text.ends_with("3 items: 1 published, 1 skipped, 1 failed"));
    }

    #[test]
    fn json_report_round_trips() {
        let json = format_report(&report(), &OutputFormat::Json).unwrap();
        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report());
    }

    #[test]
    fn links_as_text_and_json() {
        let links = vec!["https://a.test/shorts/1".to_string(), "https://a.test/shorts/2".to_string()];

        assert_eq!(
            format_links(&links, &OutputFormat::Text).unwrap(),
            "https://a.test/shorts/1\nhttps://a.test/shorts/2"
        );

        let value: serde_json::Value =
            serde_json::from_str(&format_links(&links, &OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["links"][1], "https://a.test/shorts/2");
    }
}
