//! Layout and pipeline configuration.
//!
//! Every tunable used by the geometry, outline, contents and splitting code
//! lives in [`Config`]. Components take a `&Config` rather than reading
//! module-level constants, so a test can vary one value without touching
//! the others.
//!
//! ```
//! use folio::Config;
//!
//! let mut config = Config::default();
//! config.base_margin = 30.0;
//! assert_eq!(config.contents_depth, 1);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Points per millimetre is `MM_2_POINT`; this is the inverse.
pub const POINT_2_MM: f64 = 25.4 / 72.0;
pub const MM_2_POINT: f64 = 72.0 / 25.4;
pub const INCH_2_POINT: f64 = 72.0;

/// Message sent to watchers when a book is done, successfully or not.
pub const FINISHED_MESSAGE: &str = "FINISHED";

/// A standard sheet of paper, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    pub name: String,
    pub width: f64,
    pub height: f64,
}

impl PaperSize {
    pub fn from_mm(name: &str, width: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            width: width * MM_2_POINT,
            height: height * MM_2_POINT,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Horizontal direction of the book's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextDirection::Ltr => "LTR",
            TextDirection::Rtl => "RTL",
        }
    }

    /// Parse `LTR`/`RTL` case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("ltr") {
            Some(TextDirection::Ltr)
        } else if s.eq_ignore_ascii_case("rtl") {
            Some(TextDirection::Rtl)
        } else {
            None
        }
    }
}

/// Program paths for the external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub renderer: String,
    pub pdfinfo: String,
    pub pdftk: String,
    pub pdfnup: String,
    pub pdfedit: String,
    /// Script handed to `pdfedit -s` for reshape operations.
    pub reshape_script: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            renderer: "wkhtmltopdf".to_string(),
            pdfinfo: "pdfinfo".to_string(),
            pdftk: "pdftk".to_string(),
            pdfnup: "pdfnup".to_string(),
            pdfedit: "pdfedit".to_string(),
            reshape_script: "scripts/wk_objavi.qs".to_string(),
        }
    }
}

/// All layout constants and pipeline switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Margins default to `base_margin + proportional_margin * min(width, height)`.
    pub base_margin: f64,
    pub proportional_margin: f64,
    /// Gutter defaults to `base_gutter + proportional_gutter * width`.
    pub base_gutter: f64,
    pub proportional_gutter: f64,
    /// Narrowest column used when the column count is `auto`.
    pub min_column_width: f64,
    /// Allowance for the page number line at the foot of the page.
    pub page_number_size: f64,
    /// Supported sheets, smallest area first.
    pub paper_sizes: Vec<PaperSize>,

    /// Deepest outline level recorded for the contents page.
    pub contents_depth: u32,
    /// Added to outline page indexes (the renderer counts from zero).
    pub outline_page_bias: u32,
    /// Heading depth passed to the renderer's outline generator.
    pub renderer_outline_depth: u32,

    /// Chapters compressing beyond this get split for e-readers.
    pub epub_compressed_size_max: usize,
    /// Chapters longer than this (uncompressed) get split.
    pub epub_file_size_max: usize,
    /// Class carried by split markers.
    pub marker_class_split: String,

    /// Offset from ASCII '0' to the zero digit of each localised numeral set.
    pub localised_digits: BTreeMap<String, u32>,
    /// Page number styles the footer boilerplate knows about.
    pub page_number_styles: Vec<String>,
    /// Numbering of the title and contents pages.
    pub preamble_page_number_style: String,
    /// Longest PDF the numbering script is given in one piece; longer ones
    /// are numbered in sections and rejoined.
    pub pdfedit_max_pages: u32,
    pub default_dir: TextDirection,
    pub toc_header: String,

    /// Delay before the first renderer invocation, letting the display
    /// backend come up.
    pub renderer_startup_delay_ms: u64,
    pub renderer_extra_args: Vec<String>,
    pub tools: ToolPaths,

    /// Leave the per-book working directory on disk after the book finishes.
    pub keep_temp_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        let localised_digits = [("fa", 0x6f0), ("ar", 0x660), ("hi", 0x966), ("my", 0x1040)]
            .into_iter()
            .map(|(lang, zero)| (lang.to_string(), zero - '0' as u32))
            .collect();

        Self {
            base_margin: 22.0,
            proportional_margin: 0.04,
            base_gutter: 15.0,
            proportional_gutter: 0.011,
            min_column_width: 110.0 * MM_2_POINT,
            page_number_size: 11.0,
            paper_sizes: vec![
                PaperSize::from_mm("A5", 148.0, 210.0),
                PaperSize::from_mm("A4", 210.0, 297.0),
                PaperSize::from_mm("A3", 297.0, 420.0),
                PaperSize::from_mm("A2", 420.0, 594.0),
                PaperSize::from_mm("A1", 594.0, 841.0),
                PaperSize::from_mm("A0", 841.0, 1189.0),
                PaperSize::from_mm("B0", 1000.0, 1414.0),
            ],
            contents_depth: 1,
            outline_page_bias: 1,
            renderer_outline_depth: 2,
            epub_compressed_size_max: 70_000,
            epub_file_size_max: 200_000,
            marker_class_split: "espri-marker-name-clash-with-no-one--split".to_string(),
            localised_digits,
            page_number_styles: ["LTR", "RTL", "fa", "ar", "my", "hi", "none"]
                .into_iter()
                .map(String::from)
                .collect(),
            preamble_page_number_style: "roman".to_string(),
            pdfedit_max_pages: 40,
            default_dir: TextDirection::Ltr,
            toc_header: "Table of Contents".to_string(),
            renderer_startup_delay_ms: 2000,
            renderer_extra_args: Vec::new(),
            tools: ToolPaths::default(),
            keep_temp_files: false,
        }
    }
}

impl Config {
    /// Load a configuration file; keys it omits keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let mut config: Config = serde_json::from_slice(data)?;
        config
            .paper_sizes
            .sort_by(|a, b| a.area().total_cmp(&b.area()));
        Ok(config)
    }

    /// Pick the page-number style for a language and direction.
    ///
    /// A language with its own numeral set wins, then the text direction,
    /// then the configured default direction.
    pub fn page_number_style(&self, lang: Option<&str>, dir: Option<TextDirection>) -> String {
        let known = |s: &str| self.page_number_styles.iter().any(|k| k == s);
        if let Some(lang) = lang
            && known(lang)
        {
            return lang.to_string();
        }
        if let Some(dir) = dir
            && known(dir.as_str())
        {
            return dir.as_str().to_string();
        }
        self.default_dir.as_str().to_string()
    }
}
