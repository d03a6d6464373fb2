use super::{locate, run_tool};
use crate::error::Result;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A word found on a page image. Coordinates are pixels from the top-left.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedWord {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// 0-100; negative when the engine reports none.
    pub confidence: f32,
}

pub trait TextRecognizer {
    fn recognize(&self, image: &Path, language: &str) -> Result<Vec<RecognizedWord>>;
}

#[derive(Debug, Clone, Default)]
pub struct Tesseract {
    path: Option<PathBuf>,
}

impl Tesseract {
    pub fn new(path: Option<PathBuf>) -> Self {
        Tesseract { path }
    }
}

impl TextRecognizer for Tesseract {
    #[instrument(skip(self), fields(image = %image.display()))]
    fn recognize(&self, image: &Path, language: &str) -> Result<Vec<RecognizedWord>> {
        let program = locate("tesseract", self.path.as_deref())?;
        let output = run_tool(
            "tesseract",
            &program,
            [
                image.as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(language),
                OsStr::new("tsv"),
            ],
        )?;
        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(words = words.len(), "Page recognized");
        Ok(words)
    }
}

/// Word rows of tesseract's TSV output.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Only level 5 rows are words.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 12 || cols[0].trim() != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<f32>().ok();
            Some(RecognizedWord {
                text: text.to_string(),
                left: num(6)?,
                top: num(7)?,
                width: num(8)?,
                height: num(9)?,
                confidence: num(10)?,
            })
        })
        .collect()
}
