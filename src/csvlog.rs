use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only CSV writer for caption rows. Fields are quoted per RFC 4180
/// when they contain delimiters, quotes, or newlines; rows end in CRLF.
pub struct CaptionLog {
    writer: BufWriter<File>,
    rows: usize,
}

impl CaptionLog {
    pub fn create(path: &Path, header: &[&str]) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create caption log: {}", path.display()))?;
        let mut log = Self {
            writer: BufWriter::new(file),
            rows: 0,
        };
        log.write_fields(header)?;
        log.rows = 0;
        Ok(log)
    }

    pub fn write_row(&mut self, fields: &[&str]) -> Result<()> {
        self.write_fields(fields)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| "failed to flush caption log")?;
        Ok(self.rows)
    }

    fn write_fields(&mut self, fields: &[&str]) -> Result<()> {
        let line = fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",");
        write!(self.writer, "{}\r\n", line).with_context(|| "failed to write caption log row")?;
        self.rows += 1;
        Ok(())
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        assert_eq!(escape("slide 2"), "slide 2");
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn log_counts_data_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.csv");
        let mut log = CaptionLog::create(&path, &["Slide", "Context", "Image", "Caption"]).unwrap();
        log.write_row(&["2", "Slide Content:\nx", "img_0.png", "a caption"])
            .unwrap();
        log.write_row(&["3", "ctx", "img_1.png", "another"]).unwrap();
        assert_eq!(log.rows(), 2);
        let written = log.finish().unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Slide,Context,Image,Caption\r\n"));
        assert!(content.ends_with("\r\n"));
        assert!(content.contains("\"Slide Content:\nx\""));
    }
}
