//! Image retrieval collaborator
//!
//! Optional side augmentation: when the original request literally asks for
//! visual material, the orchestrator generates a concise query and looks up
//! one image. Every failure on this path degrades to "no image".

use async_trait::async_trait;
use tracing::{debug, warn};

/// Trigger terms scanned for in the *original* prompt.
static IMAGE_TRIGGERS: &[&str] = &[
    "image",
    "picture",
    "photo",
    "diagram",
    "illustration",
    "visual",
    "show me",
];

/// Whether a prompt literally asks for an image.
pub fn wants_image(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    IMAGE_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// A single image search hit
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub title: String,
    pub source: String,
    pub content_url: String,
    pub thumbnail_url: String,
}

/// Image search backend.
#[async_trait]
pub trait ImageRetriever: Send + Sync {
    /// Return the top hit for a query, or `None` when nothing matched.
    async fn search(&self, query: &str) -> anyhow::Result<Option<ImageResult>>;
}

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// SerpApi google_images backend
pub struct SerpApiImageSearch {
    client: reqwest::Client,
    api_key: String,
}

impl SerpApiImageSearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageRetriever for SerpApiImageSearch {
    async fn search(&self, query: &str) -> anyhow::Result<Option<ImageResult>> {
        debug!("image search: {}", query);

        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google_images"),
                ("q", query),
                ("api_key", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("SerpApi error {}", response.status());
        }

        let body: serde_json::Value = response.json().await?;
        let Some(top) = body["images_results"].get(0) else {
            warn!("image search returned no results for {:?}", query);
            return Ok(None);
        };

        let field = |key: &str| top[key].as_str().unwrap_or_default().to_string();
        Ok(Some(ImageResult {
            title: field("title"),
            source: field("source"),
            content_url: field("original"),
            thumbnail_url: field("thumbnail"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_scan() {
        assert!(wants_image("Show me a picture of a red panda"));
        assert!(wants_image("draw a DIAGRAM of the water cycle"));
        assert!(!wants_image("what is the capital of France"));
    }
}
