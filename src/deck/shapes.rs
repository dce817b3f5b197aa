use anyhow::{anyhow, Result};
use roxmltree::{Document, Node};

use super::{A_NAMESPACE, P_NAMESPACE, R_NAMESPACE};

/// Grouped shapes nest, but document nesting is shallow in practice. Anything
/// deeper than this is treated as malformed and its children are ignored.
const MAX_GROUP_DEPTH: usize = 32;

/// Shape position and size in EMU (914,400 per inch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// A positioned element on a slide. `Group` owns its children in document
/// order; `Picture` always references an image relationship; `Other` covers
/// text boxes, placeholders and graphic frames, some of which carry an image
/// relationship of their own (chart/SmartArt style containers).
#[derive(Debug, Clone)]
pub enum Shape {
    Group {
        name: String,
        frame: Frame,
        children: Vec<Shape>,
    },
    Picture {
        name: String,
        frame: Frame,
        /// Absent on malformed pictures; the extraction walker turns that
        /// into an invalid-image record rather than dropping the shape.
        rel_id: Option<String>,
    },
    Other {
        name: String,
        frame: Frame,
        rel_id: Option<String>,
        text: String,
    },
}

impl Shape {
    pub fn name(&self) -> &str {
        match self {
            Shape::Group { name, .. } => name,
            Shape::Picture { name, .. } => name,
            Shape::Other { name, .. } => name,
        }
    }

    /// Text rendered by the shape itself. Groups and pictures carry none.
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            Shape::Other { text, .. } if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Parses a slide's XML into its top-level shape tree.
pub fn parse_slide_shapes(xml_data: &[u8]) -> Result<Vec<Shape>> {
    let xml_str = std::str::from_utf8(xml_data)
        .map_err(|err| anyhow!("slide xml is not valid UTF-8: {}", err))?;
    let doc = Document::parse(xml_str)?;
    let root = doc.root_element();

    let c_sld = root
        .children()
        .find(|n| is_p_element(n, "cSld"))
        .ok_or_else(|| anyhow!("no <p:cSld> element in slide"))?;
    let sp_tree = c_sld
        .children()
        .find(|n| is_p_element(n, "spTree"))
        .ok_or_else(|| anyhow!("no <p:spTree> element in slide"))?;

    Ok(parse_children(&sp_tree, 0))
}

fn parse_children(parent: &Node, depth: usize) -> Vec<Shape> {
    let mut shapes = Vec::new();
    for node in parent.children().filter(Node::is_element) {
        if node.tag_name().namespace() != Some(P_NAMESPACE) {
            continue;
        }
        match node.tag_name().name() {
            "grpSp" => shapes.push(parse_group(&node, depth)),
            "pic" => shapes.push(parse_pic(&node)),
            "sp" | "graphicFrame" => shapes.push(parse_other(&node)),
            _ => {}
        }
    }
    shapes
}

fn parse_group(node: &Node, depth: usize) -> Shape {
    let children = if depth < MAX_GROUP_DEPTH {
        parse_children(node, depth + 1)
    } else {
        tracing::warn!(
            "group '{}' exceeds nesting limit; children ignored",
            shape_name(node)
        );
        Vec::new()
    };
    Shape::Group {
        name: shape_name(node),
        frame: shape_frame(node),
        children,
    }
}

fn parse_pic(node: &Node) -> Shape {
    Shape::Picture {
        name: shape_name(node),
        frame: shape_frame(node),
        rel_id: blip_rel_id(node),
    }
}

fn parse_other(node: &Node) -> Shape {
    Shape::Other {
        name: shape_name(node),
        frame: shape_frame(node),
        rel_id: blip_rel_id(node),
        text: shape_text(node),
    }
}

fn is_p_element(node: &Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(P_NAMESPACE)
}

/// Shape name from the non-visual properties (`<p:cNvPr name="..."/>`).
fn shape_name(node: &Node) -> String {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name().starts_with("nv"))
        .flat_map(|nv| nv.children().collect::<Vec<_>>())
        .find(|n| n.is_element() && n.tag_name().name() == "cNvPr")
        .and_then(|n| n.attribute("name"))
        .unwrap_or("unnamed")
        .to_string()
}

/// Geometry from the shape's own transform. The properties element differs
/// per shape kind (`spPr`, `grpSpPr`, or a bare `p:xfrm` on graphic frames),
/// so look for the first transform scoped to this shape, never a child's.
fn shape_frame(node: &Node) -> Frame {
    let xfrm = node
        .children()
        .filter(|n| {
            n.is_element() && matches!(n.tag_name().name(), "spPr" | "grpSpPr" | "xfrm")
        })
        .find_map(|props| {
            if props.tag_name().name() == "xfrm" {
                Some(props)
            } else {
                props
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "xfrm")
            }
        });

    let Some(xfrm) = xfrm else {
        return Frame::default();
    };

    let mut frame = Frame::default();
    for child in xfrm.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "off" => {
                frame.left = attr_i64(&child, "x");
                frame.top = attr_i64(&child, "y");
            }
            "ext" => {
                frame.width = attr_i64(&child, "cx");
                frame.height = attr_i64(&child, "cy");
            }
            _ => {}
        }
    }
    frame
}

fn attr_i64(node: &Node, name: &str) -> i64 {
    node.attribute(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Image relationship id from the first `<a:blip r:embed="..."/>` below the
/// shape. Groups are excluded by the caller, so a descendant search cannot
/// pick up a nested shape's blip here.
fn blip_rel_id(node: &Node) -> Option<String> {
    node.descendants()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == "blip"
                && n.tag_name().namespace() == Some(A_NAMESPACE)
        })
        .and_then(|blip| {
            blip.attribute((R_NAMESPACE, "embed"))
                .or_else(|| blip.attribute("embed"))
        })
        .map(str::to_string)
}

/// Visible text: paragraphs joined by newlines, runs concatenated in order.
fn shape_text(node: &Node) -> String {
    let Some(tx_body) = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "txBody")
    else {
        return String::new();
    };

    let mut paragraphs = Vec::new();
    for p_node in tx_body.children().filter(|n| {
        n.is_element()
            && n.tag_name().name() == "p"
            && n.tag_name().namespace() == Some(A_NAMESPACE)
    }) {
        let mut paragraph = String::new();
        for t_node in p_node.descendants().filter(|n| {
            n.is_element()
                && n.tag_name().name() == "t"
                && n.tag_name().namespace() == Some(A_NAMESPACE)
        }) {
            if let Some(text) = t_node.text() {
                paragraph.push_str(text);
            }
        }
        paragraphs.push(paragraph);
    }
    paragraphs.join("\n")
}
