use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub mod caption;
pub mod context;
pub mod convert;
pub mod csvlog;
pub mod deck;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod settings;
pub mod worker;

pub use caption::{Captioner, OllamaCaptioner};
pub use pipeline::{DeckProcessor, PipelineOptions, ProcessOutput};

#[derive(Debug, Clone)]
pub struct Config {
    pub ppt: String,
    pub out: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub settings_path: Option<String>,
}

/// One CLI run: resolve the input, convert legacy files, and push the deck
/// through the pipeline on the bounded pool. Returns the status line to
/// print.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(model) = config.model {
        if !model.trim().is_empty() {
            settings.model = model;
        }
    }
    if let Some(endpoint) = config.endpoint {
        if !endpoint.trim().is_empty() {
            settings.endpoint = endpoint.trim_end_matches('/').to_string();
        }
    }

    let mut input = PathBuf::from(&config.ppt);
    if !input.exists() {
        return Err(anyhow!("file not found: {}", input.display()));
    }
    if convert::is_legacy_ppt(&input) {
        input = convert::convert_ppt_to_pptx(&input, &settings.soffice)?;
    }

    let session_dir = PathBuf::from(&config.out);
    std::fs::create_dir_all(&session_dir)
        .with_context(|| format!("failed to create session directory: {}", session_dir.display()))?;

    let captioner = OllamaCaptioner::new(&settings)?;
    let options = PipelineOptions {
        context_window: settings.context_window,
    };
    let pool = worker::JobPool::new(settings.workers);

    let handle = pool.submit(async move {
        DeckProcessor::new(input, session_dir, &captioner, options)
            .process_file()
            .await
    });
    let output = handle
        .await
        .map_err(|err| anyhow!("processing task failed: {}", err))??;

    let mut message = format!(
        "Processing complete: {} ({} captions)",
        output.deck_path.display(),
        output.caption_rows
    );
    if !output.invalid_images.is_empty() {
        message.push_str(&format!(
            "\nWARNING: {} invalid images found: {}",
            output.invalid_images.len(),
            output.invalid_images.join("; ")
        ));
    }
    Ok(message)
}
