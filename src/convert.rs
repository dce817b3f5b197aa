use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Converts a legacy `.ppt` file to `.pptx` with a headless office install,
/// writing the result next to the input. Conversion failure is fatal for the
/// run. Returns the path of the converted file.
pub fn convert_ppt_to_pptx(input: &Path, soffice: &str) -> Result<PathBuf> {
    let input_dir = input.parent().unwrap_or_else(|| Path::new("."));
    info!("converting {} to pptx", input.display());

    let output = Command::new(soffice)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pptx")
        .arg(input)
        .arg("--outdir")
        .arg(input_dir)
        .output()
        .with_context(|| format!("failed to run converter: {}", soffice))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "conversion to pptx failed ({}): {}",
            output.status,
            stderr.trim()
        ));
    }

    let converted = input.with_extension("pptx");
    if !converted.exists() {
        return Err(anyhow!(
            "converter reported success but produced no file: {}",
            converted.display()
        ));
    }
    Ok(converted)
}

/// True when the extension marks the legacy binary format.
pub fn is_legacy_ppt(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("ppt"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_detection_is_case_insensitive() {
        assert!(is_legacy_ppt(Path::new("deck.ppt")));
        assert!(is_legacy_ppt(Path::new("deck.PPT")));
        assert!(!is_legacy_ppt(Path::new("deck.pptx")));
        assert!(!is_legacy_ppt(Path::new("deck")));
    }

    #[test]
    fn missing_converter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("deck.ppt");
        std::fs::write(&input, b"stub").unwrap();
        let err = convert_ppt_to_pptx(&input, "/nonexistent/soffice").unwrap_err();
        assert!(err.to_string().contains("failed to run converter"));
    }
}
