mod annotate;
mod shapes;

pub use annotate::caption_box;
pub use shapes::{Frame, Shape};

use anyhow::{anyhow, Context, Result};
use roxmltree::Document;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub(crate) const P_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/presentationml/2006/main";
pub(crate) const A_NAMESPACE: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const R_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// One slide: its 0-based position in the deck, its parsed top-level shapes,
/// and the image relationships its `.rels` part declares.
#[derive(Debug)]
pub struct Slide {
    pub index: usize,
    pub shapes: Vec<Shape>,
    /// Relationship id -> archive path of the media part.
    pub(crate) rels: HashMap<String, String>,
    /// Archive path of the slide part, e.g. `ppt/slides/slide2.xml`.
    pub(crate) path: String,
}

/// Resolved image payload for a shape's relationship.
pub struct ImagePayload<'a> {
    pub bytes: &'a [u8],
    pub ext: String,
}

/// An opened presentation. The original zip bytes are kept so that saving is
/// a pass-through rewrite: only annotated slide parts change.
pub struct Deck {
    bytes: Vec<u8>,
    pub slides: Vec<Slide>,
    media: HashMap<String, Vec<u8>>,
}

impl Deck {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read deck: {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(&bytes))
            .with_context(|| "failed to read deck archive")?;

        let mut slide_names = Vec::new();
        for i in 0..archive.len() {
            let file = archive.by_index(i).with_context(|| "failed to read zip entry")?;
            let name = file.name().to_string();
            if let Some(number) = slide_number(&name) {
                slide_names.push((number, name));
            }
        }
        // slide10.xml must follow slide9.xml, so order numerically.
        slide_names.sort();

        let mut slides = Vec::new();
        let mut media = HashMap::new();
        for (index, (_, name)) in slide_names.iter().enumerate() {
            let xml = read_entry(&mut archive, name)?;
            let shapes = shapes::parse_slide_shapes(&xml)
                .with_context(|| format!("failed to parse slide: {}", name))?;

            let mut rels = HashMap::new();
            let rels_path = slide_rels_path(name);
            if let Ok(rels_xml) = read_entry(&mut archive, &rels_path) {
                for (id, target) in parse_image_rels(&rels_xml)? {
                    let media_path = resolve_media_path(name, &target);
                    if !media.contains_key(&media_path) {
                        if let Ok(data) = read_entry(&mut archive, &media_path) {
                            media.insert(media_path.clone(), data);
                        }
                    }
                    rels.insert(id, media_path);
                }
            }

            slides.push(Slide {
                index,
                shapes,
                rels,
                path: name.clone(),
            });
        }

        Ok(Self {
            bytes,
            slides,
            media,
        })
    }

    /// Resolves a shape's image relationship to bytes plus a file extension.
    /// The extension comes from the media part's name, falling back to
    /// content sniffing for extensionless targets.
    pub fn image_payload(&self, slide: &Slide, rel_id: &str) -> Result<ImagePayload<'_>> {
        let media_path = slide
            .rels
            .get(rel_id)
            .ok_or_else(|| anyhow!("no image relationship '{}' on {}", rel_id, slide.path))?;
        let bytes = self
            .media
            .get(media_path)
            .ok_or_else(|| anyhow!("media part missing from archive: {}", media_path))?
            .as_slice();
        let ext = media_path
            .rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map(str::to_lowercase)
            .or_else(|| infer::get(bytes).map(|kind| kind.extension().to_string()))
            .ok_or_else(|| anyhow!("cannot determine image type for {}", media_path))?;
        Ok(ImagePayload { bytes, ext })
    }

    /// Writes the deck to `output`, injecting the given caption text-box
    /// fragments (keyed by slide archive path) into each slide's shape tree.
    /// Every other entry is copied through unchanged.
    pub fn save(&self, output: &Path, annotations: &HashMap<String, Vec<String>>) -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(&self.bytes))
            .with_context(|| "failed to reopen deck archive")?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).with_context(|| "failed to read zip entry")?;
            let name = file.name().to_string();
            let file_options = FileOptions::default().compression_method(file.compression());
            if file.is_dir() {
                writer
                    .add_directory(name, file_options)
                    .with_context(|| "failed to write zip directory")?;
                continue;
            }

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .with_context(|| "failed to read zip entry content")?;
            drop(file);

            let output_data = match annotations.get(&name) {
                Some(fragments) if !fragments.is_empty() => {
                    annotate::inject_caption_boxes(&data, fragments)
                        .with_context(|| format!("failed to annotate slide: {}", name))?
                }
                _ => data,
            };

            writer
                .start_file(name, file_options)
                .with_context(|| "failed to write zip entry")?;
            writer
                .write_all(&output_data)
                .with_context(|| "failed to write zip content")?;
        }

        let bytes = writer
            .finish()
            .with_context(|| "failed to finalize deck archive")?
            .into_inner();
        std::fs::write(output, bytes)
            .with_context(|| format!("failed to write deck: {}", output.display()))?;
        Ok(())
    }
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`.
fn slide_rels_path(slide_path: &str) -> String {
    let mut rels_path = slide_path.to_string();
    if let Some(pos) = rels_path.rfind('/') {
        rels_path.insert_str(pos + 1, "_rels/");
    }
    rels_path.push_str(".rels");
    rels_path
}

/// Relationship targets are relative to the slide part; `../media/...`
/// resolves back under `ppt/`.
fn resolve_media_path(slide_path: &str, target: &str) -> String {
    if let Some(adjusted) = target.strip_prefix("../") {
        format!("ppt/{}", adjusted)
    } else {
        let slide_dir = slide_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        format!("{}/{}", slide_dir, target)
    }
}

fn parse_image_rels(xml_data: &[u8]) -> Result<Vec<(String, String)>> {
    let xml_str = std::str::from_utf8(xml_data)
        .map_err(|err| anyhow!("rels xml is not valid UTF-8: {}", err))?;
    let doc = Document::parse(xml_str)?;
    let root = doc.root_element();

    let mut images = Vec::new();
    for rel in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
    {
        if rel.attribute("Type") != Some(IMAGE_REL_TYPE) {
            continue;
        }
        if let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) {
            images.push((id.to_string(), target.to_string()));
        }
    }
    Ok(images)
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .with_context(|| format!("missing archive entry: {}", name))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .with_context(|| format!("failed to read archive entry: {}", name))?;
    Ok(content)
}
