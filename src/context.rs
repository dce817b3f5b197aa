//! Slide text extraction and the per-slide context window handed to the
//! captioning model.

use crate::deck::Slide;

/// Visible text of a slide: every top-level shape's non-empty trimmed text,
/// one shape per line, with blank lines removed.
pub fn slide_text(slide: &Slide) -> String {
    let joined = slide
        .shapes
        .iter()
        .filter_map(|shape| shape.visible_text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    joined
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Combines the target slide's text with its neighbors' into one prompt
/// fragment. The primary block is always present; the hints block appears
/// only when at least one in-bounds neighbor has non-empty text. Pure
/// function of its inputs; build once per slide and reuse for every image.
pub fn build_context(slides: &[Slide], index: usize, window: usize) -> String {
    let main_text = slide_text(&slides[index]);
    let primary = format!("Slide Content:\n{}", main_text.trim());

    let window = window as isize;
    let mut neighbor_texts = Vec::new();
    for offset in -window..=window {
        if offset == 0 {
            continue;
        }
        let Some(neighbor_index) = index.checked_add_signed(offset) else {
            continue;
        };
        if neighbor_index >= slides.len() {
            continue;
        }
        let text = slide_text(&slides[neighbor_index]);
        if !text.trim().is_empty() {
            neighbor_texts.push(text);
        }
    }

    if neighbor_texts.is_empty() {
        primary
    } else {
        format!(
            "{}\n\n\n\nRelated Slide Hints:\n{}",
            primary,
            neighbor_texts.join("\n\n---\n\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Frame, Shape};
    use std::collections::HashMap;

    fn slide(index: usize, texts: &[&str]) -> Slide {
        let shapes = texts
            .iter()
            .map(|text| Shape::Other {
                name: "TextBox".to_string(),
                frame: Frame::default(),
                rel_id: None,
                text: text.to_string(),
            })
            .collect();
        Slide {
            index,
            shapes,
            rels: HashMap::new(),
            path: format!("ppt/slides/slide{}.xml", index + 1),
        }
    }

    #[test]
    fn slide_text_trims_and_drops_blank_lines() {
        let s = slide(0, &["  Title  ", "", "Body\n\n  \nmore"]);
        assert_eq!(slide_text(&s), "Title\nBody\nmore");
    }

    #[test]
    fn context_includes_own_text_even_when_empty() {
        let slides = vec![slide(0, &[]), slide(1, &[])];
        let context = build_context(&slides, 0, 1);
        assert_eq!(context, "Slide Content:\n");
    }

    #[test]
    fn hints_appear_only_when_a_neighbor_has_text() {
        let slides = vec![
            slide(0, &["Intro"]),
            slide(1, &["Main point"]),
            slide(2, &["Follow-up"]),
        ];
        let context = build_context(&slides, 1, 1);
        assert!(context.starts_with("Slide Content:\nMain point"));
        assert!(context.contains("Related Slide Hints:\nIntro\n\n---\n\nFollow-up"));
    }

    #[test]
    fn no_hints_when_neighbors_are_empty_or_out_of_bounds() {
        let slides = vec![slide(0, &["Only slide"])];
        let context = build_context(&slides, 0, 1);
        assert_eq!(context, "Slide Content:\nOnly slide");

        let slides = vec![slide(0, &[""]), slide(1, &["Middle"]), slide(2, &["  "])];
        let context = build_context(&slides, 1, 1);
        assert!(!context.contains("Related Slide Hints"));
    }

    #[test]
    fn window_of_two_reaches_two_slides_each_side() {
        let slides = vec![
            slide(0, &["A"]),
            slide(1, &[]),
            slide(2, &["C"]),
            slide(3, &[]),
            slide(4, &["E"]),
        ];
        let context = build_context(&slides, 2, 2);
        assert!(context.contains("A\n\n---\n\nE"));
    }
}
