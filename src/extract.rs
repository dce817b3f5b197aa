//! Recursive image discovery over a slide's shape tree.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::deck::{Deck, Frame, Shape, Slide};

/// Marker prefix on sentinel records for failed picture extractions.
pub const INVALID_PREFIX: &str = "INVALID: ";

/// One attempted extraction. `Saved` carries everything downstream stages
/// need (the file on disk plus the originating shape's geometry); `Invalid`
/// is the sentinel consumers must skip.
#[derive(Debug, Clone)]
pub enum Extraction {
    Saved(SavedImage),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub file_name: String,
    pub frame: Frame,
}

/// Per-job extraction state: the images directory, the monotonic image index
/// shared across the whole file, and the invalid-image report. Owned by one
/// orchestrator instance, so concurrent jobs never contend.
pub struct RunContext {
    images_dir: PathBuf,
    next_index: usize,
    pub invalid_images: Vec<String>,
}

impl RunContext {
    pub fn new(images_dir: PathBuf) -> Self {
        Self {
            images_dir,
            next_index: 0,
            invalid_images: Vec::new(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Pre-order walk of one shape. Groups recurse into children in document
    /// order; pictures that fail to extract yield a sentinel and an
    /// invalid-image entry; other image-bearing shapes that fail are dropped
    /// silently — that asymmetry is deliberate policy, pictures are always
    /// accounted for while incidental containers are best-effort.
    pub fn drill(
        &mut self,
        deck: &Deck,
        slide: &Slide,
        shape: &Shape,
        slide_number: usize,
        name_prefix: &str,
    ) -> Vec<Extraction> {
        match shape {
            Shape::Group { children, .. } => children
                .iter()
                .flat_map(|child| self.drill(deck, slide, child, slide_number, name_prefix))
                .collect(),
            Shape::Picture {
                name,
                frame,
                rel_id,
            } => match self.save_shape_image(deck, slide, rel_id.as_deref(), name_prefix) {
                Ok(file_name) => vec![Extraction::Saved(SavedImage {
                    file_name,
                    frame: *frame,
                })],
                Err(err) => {
                    warn!(
                        "could not process image '{}' on slide {}: {}",
                        name, slide_number, err
                    );
                    self.invalid_images
                        .push(format!("Slide {}: {}", slide_number, name));
                    vec![Extraction::Invalid(format!("{}{}", INVALID_PREFIX, name))]
                }
            },
            Shape::Other { rel_id, frame, .. } => match rel_id {
                Some(rel_id) => {
                    match self.save_shape_image(deck, slide, Some(rel_id), name_prefix) {
                        Ok(file_name) => vec![Extraction::Saved(SavedImage {
                            file_name,
                            frame: *frame,
                        })],
                        Err(_) => Vec::new(),
                    }
                }
                None => Vec::new(),
            },
        }
    }

    fn save_shape_image(
        &mut self,
        deck: &Deck,
        slide: &Slide,
        rel_id: Option<&str>,
        name_prefix: &str,
    ) -> Result<String> {
        let rel_id = rel_id.ok_or_else(|| anyhow!("shape has no image relationship"))?;
        let payload = deck.image_payload(slide, rel_id)?;
        let file_name = format!("{}_{}.{}", name_prefix, self.next_index, payload.ext);
        let full_path = self.images_dir.join(&file_name);
        std::fs::write(&full_path, payload.bytes)
            .with_context(|| format!("failed to write image: {}", full_path.display()))?;
        self.next_index += 1;
        Ok(file_name)
    }
}
