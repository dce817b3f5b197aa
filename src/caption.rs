use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

use crate::settings::Settings;

/// Returned when the service answers without usable caption text, or cannot
/// be reached at all. Every image gets either real text or this marker.
pub const PLACEHOLDER_CAPTION: &str = "[No caption generated]";

pub type CaptionFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// The captioning seam: one image plus a context fragment in, caption text
/// out. Service-side failures resolve to [`PLACEHOLDER_CAPTION`] rather than
/// an error; only local failures (unreadable image file) surface as `Err`.
pub trait Captioner: Send + Sync {
    fn caption(&self, image_path: &Path, context: &str) -> CaptionFuture;
}

/// Client for the Ollama generate endpoint (`POST {endpoint}/api/generate`).
/// One blocking round-trip per image, no streaming. Transport errors get a
/// single bounded retry before falling back to the placeholder.
#[derive(Clone)]
pub struct OllamaCaptioner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    retry: bool,
}

impl OllamaCaptioner {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .with_context(|| "failed to build captioning http client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            retry: settings.retry,
        })
    }

    async fn request(&self, body: &serde_json::Value) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let mut attempts = if self.retry { 2usize } else { 1 };
        loop {
            attempts -= 1;
            match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if !status.is_success() {
                        warn!("captioning service error ({}): {}", status, text.trim());
                        return Ok(PLACEHOLDER_CAPTION.to_string());
                    }
                    return Ok(parse_generate_response(&text));
                }
                Err(err) if attempts > 0 => {
                    warn!("captioning request failed, retrying once: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(err) => {
                    warn!("captioning request failed: {}", err);
                    return Ok(PLACEHOLDER_CAPTION.to_string());
                }
            }
        }
    }
}

impl Captioner for OllamaCaptioner {
    fn caption(&self, image_path: &Path, context: &str) -> CaptionFuture {
        let this = self.clone();
        let image_path: PathBuf = image_path.to_path_buf();
        let context = context.to_string();
        Box::pin(async move {
            let image_bytes = std::fs::read(&image_path)
                .with_context(|| format!("failed to read image: {}", image_path.display()))?;
            let image_b64 = BASE64.encode(&image_bytes);
            let body = json!({
                "model": this.model,
                "prompt": build_prompt(&context),
                "images": [image_b64],
                "stream": false
            });
            this.request(&body).await
        })
    }
}

/// Single instruction prompt: names the task, the 25-word hard limit, and
/// the Slide Content > Related Slide Hints priority, then the context.
pub fn build_prompt(context: &str) -> String {
    format!(
        "You are generating a short caption for an image on a presentation slide.\n\
         Focus mainly on the **Slide Content** section.\n\
         Only refer to **Related Slide Hints** if the Slide Content is vague or missing.\n\
         The caption must be concise and strictly no more than 25 words.\n\n\
         {}\n\nCaption:",
        context.trim()
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// A body without the `response` field (or that fails to parse) yields the
/// placeholder, never an error.
fn parse_generate_response(body: &str) -> String {
    serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|parsed| parsed.response)
        .unwrap_or_else(|| PLACEHOLDER_CAPTION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_states_limit_and_priority_then_context() {
        let prompt = build_prompt("Slide Content:\nRevenue chart\n");
        assert!(prompt.contains("no more than 25 words"));
        assert!(prompt.contains("Focus mainly on the **Slide Content** section."));
        assert!(prompt.ends_with("Slide Content:\nRevenue chart\n\nCaption:"));
    }

    #[test]
    fn response_field_is_extracted() {
        assert_eq!(
            parse_generate_response(r#"{"response": "A bar chart of revenue."}"#),
            "A bar chart of revenue."
        );
    }

    #[test]
    fn missing_response_field_yields_placeholder() {
        assert_eq!(
            parse_generate_response(r#"{"model": "llava", "done": true}"#),
            PLACEHOLDER_CAPTION
        );
    }

    #[test]
    fn malformed_body_yields_placeholder() {
        assert_eq!(parse_generate_response("not json"), PLACEHOLDER_CAPTION);
    }
}
