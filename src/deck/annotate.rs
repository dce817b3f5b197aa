use anyhow::{anyhow, Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use super::Frame;

const EMU_PER_INCH: i64 = 914_400;
/// Gap between the image's bottom edge and the caption box (0.1 inch).
const CAPTION_GAP: i64 = EMU_PER_INCH / 10;
/// Fixed caption box height (0.4 inch); no auto-resize.
const CAPTION_HEIGHT: i64 = EMU_PER_INCH * 4 / 10;

/// Builds a `<p:sp>` text-box fragment positioned under the given image
/// frame: anchored at its left edge, spanning its width, word-wrap on,
/// 10 pt italic black text on a white fill with a light-gray border.
/// `shape_id` must be unique within the slide; colliding or zero ids make
/// PowerPoint flag the file for repair.
pub fn caption_box(image_frame: Frame, caption: &str, shape_id: u32) -> String {
    let left = image_frame.left;
    let top = image_frame.top + image_frame.height + CAPTION_GAP;
    let width = image_frame.width;
    let text = escape(caption);

    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="CaptionBox"/>"#,
            r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="{left}" y="{top}"/><a:ext cx="{width}" cy="{height}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#,
            r#"<a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill>"#,
            r#"<a:ln><a:solidFill><a:srgbClr val="C8C8C8"/></a:solidFill></a:ln></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square"><a:noAutofit/></a:bodyPr><a:lstStyle/>"#,
            r#"<a:p><a:r><a:rPr lang="en-US" sz="1000" i="1" dirty="0">"#,
            r#"<a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:rPr>"#,
            r#"<a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        ),
        id = shape_id,
        left = left,
        top = top,
        width = width,
        height = CAPTION_HEIGHT,
        text = text,
    )
}

/// Streams a slide's XML through unchanged, inserting the given shape
/// fragments immediately before `</p:spTree>`. Image shapes and everything
/// else keep their bytes; only the shape tree gains children.
pub fn inject_caption_boxes(xml: &[u8], fragments: &[String]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut injected = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"p:spTree" {
                    for fragment in fragments {
                        write_fragment(&mut writer, fragment)?;
                    }
                    injected = true;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => {
                writer.write_event(event)?;
            }
            Err(err) => {
                return Err(anyhow!("failed to parse slide xml: {}", err));
            }
        }
        buf.clear();
    }

    if !injected {
        return Err(anyhow!("slide has no <p:spTree> element"));
    }
    Ok(writer.into_inner())
}

fn write_fragment(writer: &mut Writer<Vec<u8>>, fragment: &str) -> Result<()> {
    let mut reader = Reader::from_str(fragment);
    reader.trim_text(false);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => {
                writer
                    .write_event(event)
                    .with_context(|| "failed to write caption fragment")?;
            }
            Err(err) => {
                return Err(anyhow!("malformed caption fragment: {}", err));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sld>"#;

    fn frame() -> Frame {
        Frame {
            left: 914_400,
            top: 1_828_800,
            width: 2_743_200,
            height: 914_400,
        }
    }

    #[test]
    fn caption_box_sits_below_the_image() {
        let fragment = caption_box(frame(), "a chart", 1001);
        assert!(fragment.contains(r#"<a:off x="914400" y="2834640"/>"#));
        assert!(fragment.contains(r#"cx="2743200""#));
        assert!(fragment.contains(r#"cy="365760""#));
        assert!(fragment.contains("<a:t>a chart</a:t>"));
        assert!(fragment.contains(r#"sz="1000" i="1""#));
    }

    #[test]
    fn caption_box_carries_the_given_shape_id() {
        let fragment = caption_box(frame(), "a chart", 1007);
        assert!(fragment.contains(r#"<p:cNvPr id="1007" name="CaptionBox"/>"#));
    }

    #[test]
    fn caption_text_is_xml_escaped() {
        let fragment = caption_box(frame(), r#"x < y & "z""#, 1001);
        assert!(fragment.contains("x &lt; y &amp; &quot;z&quot;"));
    }

    #[test]
    fn injection_adds_shapes_inside_the_tree() {
        let fragments = vec![
            caption_box(frame(), "first", 1001),
            caption_box(frame(), "second", 1002),
        ];
        let output = inject_caption_boxes(SLIDE.as_bytes(), &fragments).unwrap();
        let text = String::from_utf8(output).unwrap();

        let doc = roxmltree::Document::parse(&text).unwrap();
        let sp_count = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "sp")
            .count();
        assert_eq!(sp_count, 2);
        // fragments land before the closing tag, inside the tree
        assert!(text.find("first").unwrap() < text.find("</p:spTree>").unwrap());
    }

    #[test]
    fn injection_fails_without_a_shape_tree() {
        let xml = br#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld/></p:sld>"#;
        let fragments = vec![caption_box(frame(), "x", 1001)];
        assert!(inject_caption_boxes(xml, &fragments).is_err());
    }

    #[test]
    fn empty_fragment_list_keeps_the_slide_parseable() {
        let output = inject_caption_boxes(SLIDE.as_bytes(), &[]).unwrap();
        roxmltree::Document::parse(std::str::from_utf8(&output).unwrap()).unwrap();
    }
}
