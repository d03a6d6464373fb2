//! Configuration: task defaults and collaborator tool locations.
//!
//! Every optional task parameter falls back to a field of [`Defaults`], so the
//! defaulting rules live in one place instead of being repeated per task.

use crate::error::{Result, TaskError};
use crate::page_range::{OutOfRangePolicy, PageSelector};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "PDFTASK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub tools: ToolPaths,
    /// Directory for per-job outputs when a task has no explicit output path.
    /// Default: `<system temp>/pdftask`.
    pub session_dir: Option<PathBuf>,
}

/// Fallback values for optional task parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Policy for single page numbers outside the document.
    pub out_of_range: OutOfRangePolicy,
    pub pages_per_part: u32,
    pub filename_prefix: String,
    pub compression_level: u32,
    pub optimize_images: bool,
    pub remove_metadata: bool,
    pub preserve_formatting: bool,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    /// Words recognized below this confidence are left out of the text layer.
    pub ocr_min_confidence: f32,
    pub raster_dpi: u32,
    pub annotation_color: String,
    pub annotation_x: f32,
    pub annotation_y: f32,
    pub watermark_opacity: f32,
    pub watermark_font_size: f32,
    /// Degrees counter-clockwise.
    pub watermark_rotation: f32,
    pub watermark_color: String,
    pub page_size: String,
    /// HTML page margins in millimetres.
    pub html_margin: f32,
    /// Pixels per inch assumed when an image becomes a page.
    pub image_resolution: f32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            out_of_range: OutOfRangePolicy::Ignore,
            pages_per_part: 10,
            filename_prefix: "page".to_string(),
            compression_level: 6,
            optimize_images: true,
            remove_metadata: true,
            preserve_formatting: true,
            ocr_language: "eng".to_string(),
            ocr_dpi: 300,
            ocr_min_confidence: 30.0,
            raster_dpi: 200,
            annotation_color: "#7D7FE9".to_string(),
            annotation_x: 0.1,
            annotation_y: 0.9,
            watermark_opacity: 0.3,
            watermark_font_size: 48.0,
            watermark_rotation: 45.0,
            watermark_color: "#808080".to_string(),
            page_size: "A4".to_string(),
            html_margin: 20.0,
            image_resolution: 100.0,
        }
    }
}

impl Defaults {
    pub fn page_selector(&self) -> PageSelector {
        PageSelector::new(self.out_of_range)
    }
}

/// Explicit locations of external programs. `None` means search `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub pdftoppm: Option<PathBuf>,
    pub tesseract: Option<PathBuf>,
    pub weasyprint: Option<PathBuf>,
    pub wkhtmltopdf: Option<PathBuf>,
    pub qpdf: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from `$PDFTASK_CONFIG`, or use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        };

        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    TaskError::invalid_parameter(format!(
                        "cannot read config {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let config: Config = serde_json::from_str(&text).map_err(|e| {
                    TaskError::invalid_parameter(format!(
                        "invalid config {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                tracing::debug!(path = %path.display(), "Loaded configuration");
                config
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let d = &self.defaults;
        if d.pages_per_part == 0 {
            return Err(TaskError::invalid_parameter(
                "defaults.pages_per_part must be at least 1",
            ));
        }
        if d.compression_level > 9 {
            return Err(TaskError::invalid_parameter(
                "defaults.compression_level must be between 0 and 9",
            ));
        }
        if d.ocr_dpi == 0 || d.raster_dpi == 0 {
            return Err(TaskError::invalid_parameter("DPI defaults must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&d.watermark_opacity) {
            return Err(TaskError::invalid_parameter(
                "defaults.watermark_opacity must be between 0 and 1",
            ));
        }
        if d.image_resolution <= 0.0 {
            return Err(TaskError::invalid_parameter(
                "defaults.image_resolution must be greater than 0",
            ));
        }
        if d.filename_prefix.is_empty() {
            return Err(TaskError::invalid_parameter(
                "defaults.filename_prefix must not be empty",
            ));
        }
        Ok(())
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("pdftask"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let d = Defaults::default();
        assert_eq!(d.pages_per_part, 10);
        assert_eq!(d.filename_prefix, "page");
        assert_eq!(d.compression_level, 6);
        assert_eq!(d.annotation_color, "#7D7FE9");
        assert_eq!(d.out_of_range, OutOfRangePolicy::Ignore);
    }

    #[test]
    fn test_partial_config_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"defaults": {"pages_per_part": 4, "out_of_range": "reject"}}"#)
                .unwrap();
        assert_eq!(config.defaults.pages_per_part, 4);
        assert_eq!(config.defaults.out_of_range, OutOfRangePolicy::Reject);
        assert_eq!(config.defaults.ocr_language, "eng");
        assert!(config.tools.tesseract.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_pages_per_part() {
        let mut config = Config::default();
        config.defaults.pages_per_part = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_compression_level_out_of_range() {
        let mut config = Config::default();
        config.defaults.compression_level = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tools": {"tesseract": "/opt/bin/tesseract"}}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.tools.tesseract.as_deref(),
            Some(Path::new("/opt/bin/tesseract"))
        );
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
