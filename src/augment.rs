//! Knowledge augmentation collaborator
//!
//! Rewrites a prompt with background material before complexity analysis.
//! Invoked only when the caller asks for it; any failure leaves the original
//! prompt untouched.

use async_trait::async_trait;
use tracing::debug;

/// Prompt rewriter that prepends retrieved background.
#[async_trait]
pub trait KnowledgeAugmenter: Send + Sync {
    async fn augment(&self, prompt: &str) -> anyhow::Result<String>;
}

const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

/// Wikipedia REST summary lookup.
///
/// Uses the prompt's leading words as the page title; a miss or transport
/// failure surfaces as `Err` and the orchestrator keeps the original prompt.
pub struct WikipediaAugmenter {
    client: reqwest::Client,
    /// Words taken from the prompt head as the lookup title
    title_words: usize,
}

impl WikipediaAugmenter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            title_words: 5,
        }
    }

    fn title_for(&self, prompt: &str) -> String {
        prompt
            .split_whitespace()
            .take(self.title_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for WikipediaAugmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeAugmenter for WikipediaAugmenter {
    async fn augment(&self, prompt: &str) -> anyhow::Result<String> {
        let title = self.title_for(prompt);
        debug!("wikipedia lookup: {:?}", title);

        let response = self
            .client
            .get(format!(
                "{}/{}",
                WIKIPEDIA_SUMMARY_URL,
                urlencode(&title)
            ))
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("wikipedia lookup failed: {}", response.status());
        }

        let body: serde_json::Value = response.json().await?;
        let extract = body["extract"].as_str().unwrap_or_default();
        if extract.is_empty() {
            anyhow::bail!("wikipedia summary empty for {:?}", title);
        }

        Ok(format!(
            "Background:\n{}\n\nRequest: {}",
            extract, prompt
        ))
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "-_.~".contains(c) {
                c.to_string()
            } else if c == ' ' {
                "_".to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_extraction() {
        let augmenter = WikipediaAugmenter::new();
        assert_eq!(
            augmenter.title_for("Rust programming language history and design details"),
            "Rust programming language history and"
        );
        assert_eq!(augmenter.title_for("Tokio"), "Tokio");
    }

    #[test]
    fn test_urlencode_spaces() {
        assert_eq!(urlencode("red panda"), "red_panda");
    }
}
