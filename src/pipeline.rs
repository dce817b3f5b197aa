//! The per-file pipeline: open deck, walk slides for images, caption,
//! annotate, log, save.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::caption::{Captioner, PLACEHOLDER_CAPTION};
use crate::context::build_context;
use crate::csvlog::CaptionLog;
use crate::deck::{caption_box, Deck};
use crate::extract::{Extraction, RunContext};

/// Images whose top edge sits above this line are treated as headers or
/// logos: extracted to disk, but never captioned or logged.
pub const TOP_MARGIN_EMU: i64 = 360_000;

const CSV_HEADER: [&str; 4] = ["Slide", "Context", "Image", "Caption"];

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Neighbor slides on each side feeding the context window.
    pub context_window: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { context_window: 1 }
    }
}

/// Results of one deck run.
#[derive(Debug)]
pub struct ProcessOutput {
    pub deck_path: PathBuf,
    pub csv_path: PathBuf,
    pub caption_rows: usize,
    pub invalid_images: Vec<String>,
}

/// Runs the whole pipeline for one deck. Owns all per-job mutable state
/// (image index, invalid list), so concurrent jobs only share the
/// filesystem, and each job has its own session directory there.
pub struct DeckProcessor<'a, C: Captioner> {
    input: PathBuf,
    session_dir: PathBuf,
    captioner: &'a C,
    options: PipelineOptions,
}

impl<'a, C: Captioner> DeckProcessor<'a, C> {
    pub fn new(
        input: PathBuf,
        session_dir: PathBuf,
        captioner: &'a C,
        options: PipelineOptions,
    ) -> Self {
        Self {
            input,
            session_dir,
            captioner,
            options,
        }
    }

    pub async fn process_file(&self) -> Result<ProcessOutput> {
        let base_name = deck_base_name(&self.input)?;
        let deck = Deck::open(&self.input)?;

        let images_dir = self.session_dir.join("images");
        std::fs::create_dir_all(&images_dir)
            .with_context(|| format!("failed to create images dir: {}", images_dir.display()))?;

        let csv_path = self.session_dir.join(format!("{}_captions.csv", base_name));
        let mut log = CaptionLog::create(&csv_path, &CSV_HEADER)?;

        let mut run = RunContext::new(images_dir);
        let mut annotations: HashMap<String, Vec<String>> = HashMap::new();
        // authored shape ids are small integers; start well above them so
        // injected boxes never collide
        let mut caption_shape_id: u32 = 1000;

        for slide in &deck.slides {
            // slide 0 is the title slide; never captioned
            if slide.index == 0 {
                continue;
            }
            let slide_number = slide.index + 1;
            let slide_context = build_context(&deck.slides, slide.index, self.options.context_window);
            let name_prefix = format!("{}_slide{}", base_name, slide_number);

            let mut extractions = Vec::new();
            for shape in &slide.shapes {
                extractions.extend(run.drill(&deck, slide, shape, slide_number, &name_prefix));
            }

            for extraction in extractions {
                let saved = match extraction {
                    Extraction::Saved(saved) => saved,
                    Extraction::Invalid(_) => continue,
                };
                if saved.frame.top < TOP_MARGIN_EMU {
                    info!(
                        "skipping image {} on slide {} (too close to top)",
                        saved.file_name, slide_number
                    );
                    continue;
                }

                let image_path = run.images_dir().join(&saved.file_name);
                let caption = match self.captioner.caption(&image_path, &slide_context).await {
                    Ok(caption) => caption,
                    Err(err) => {
                        warn!(
                            "captioning failed for {} on slide {}: {}",
                            saved.file_name, slide_number, err
                        );
                        PLACEHOLDER_CAPTION.to_string()
                    }
                };

                annotations
                    .entry(slide.path.clone())
                    .or_default()
                    .push(caption_box(saved.frame, &caption, caption_shape_id));
                caption_shape_id += 1;
                log.write_row(&[
                    &slide_number.to_string(),
                    &slide_context,
                    &saved.file_name,
                    &caption,
                ])?;
            }
        }

        let caption_rows = log.finish()?;

        let deck_path = self
            .session_dir
            .join(format!("{}_captioned.pptx", base_name));
        deck.save(&deck_path, &annotations)?;
        info!("saved captioned presentation as {}", deck_path.display());

        if !run.invalid_images.is_empty() {
            warn!(
                "{} invalid images found: {:?}",
                run.invalid_images.len(),
                run.invalid_images
            );
        }

        Ok(ProcessOutput {
            deck_path,
            csv_path,
            caption_rows,
            invalid_images: run.invalid_images,
        })
    }
}

fn deck_base_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("input path has no usable file name: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_extension() {
        assert_eq!(deck_base_name(Path::new("/tmp/q3 review.pptx")).unwrap(), "q3 review");
    }
}
