//! Physical page geometry.
//!
//! A [`PageGeometry`] is computed once per physical output from a target
//! page size and optional overrides. It knows its margins, gutter and
//! column layout, the smallest standard sheet the page fits on, and how to
//! phrase all of that as arguments for the renderer, the reshape script and
//! the n-up compositor (see [`commands`]).
//!
//! ```
//! use folio::{Config, GeometryOptions, PageGeometry};
//! use folio::config::MM_2_POINT;
//!
//! let config = Config::default();
//! let a4 = PageGeometry::new(
//!     &config,
//!     210.0 * MM_2_POINT,
//!     297.0 * MM_2_POINT,
//!     &GeometryOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(a4.paper.name, "A4");
//! ```

pub mod commands;

pub use commands::{ReshapeOp, ReshapeOptions, RenderOptions};

use crate::config::{Config, POINT_2_MM};
use crate::error::{Error, Result};

/// Column count request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Columns {
    /// As many columns as fit at the configured minimum column width.
    Auto,
    Count(u32),
}

/// Explicit overrides; every `None` takes the computed default.
#[derive(Debug, Clone, Default)]
pub struct GeometryOptions {
    pub top_margin: Option<f64>,
    pub side_margin: Option<f64>,
    pub bottom_margin: Option<f64>,
    pub gutter: Option<f64>,
    pub columns: Option<Columns>,
    pub column_margin: Option<f64>,
    pub grey_scale: bool,
}

/// The sheet a page is printed on, and how far the page sits from its edges.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainingPaper {
    pub name: String,
    /// Half the unused sheet width.
    pub clip_x: f64,
    /// Half the unused sheet height.
    pub clip_y: f64,
}

/// Find the smallest supported sheet that holds a `width` x `height` page.
///
/// Sheets are scanned in configured order (smallest first); the first one
/// that dominates both dimensions wins.
pub fn find_containing_paper(config: &Config, width: f64, height: f64) -> Result<ContainingPaper> {
    config
        .paper_sizes
        .iter()
        .find(|p| p.width >= width && p.height >= height)
        .map(|p| ContainingPaper {
            name: p.name.clone(),
            clip_x: (p.width - width) * 0.5,
            clip_y: (p.height - height) * 0.5,
        })
        .ok_or(Error::PaperSize {
            width_mm: width * POINT_2_MM,
            height_mm: height * POINT_2_MM,
        })
}

/// Margins, gutter and columns for one physical page size. All lengths are
/// in points.
///
/// Stored margins and gutter are never negative. Right-to-left books flip
/// the gutter only when reshape arguments are emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub paper: ContainingPaper,
    pub top_margin: f64,
    pub side_margin: f64,
    pub bottom_margin: f64,
    pub gutter: f64,
    pub columns: u32,
    pub column_margin: f64,
    pub grey_scale: bool,
    /// Copied from the configuration for page-number placement.
    pub page_number_size: f64,
}

impl PageGeometry {
    pub fn new(config: &Config, width: f64, height: f64, opts: &GeometryOptions) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "page size must be positive, got {width} x {height}"
            )));
        }
        let paper = find_containing_paper(config, width, height)?;

        let default_margin = default_margin(config, width, height);
        let default_gutter = default_gutter(config, width);

        let top_margin = non_negative("top margin", opts.top_margin, default_margin)?;
        let side_margin = non_negative("side margin", opts.side_margin, default_margin)?;
        let bottom_margin = non_negative("bottom margin", opts.bottom_margin, default_margin)?;
        let gutter = non_negative("gutter", opts.gutter, default_gutter)?;

        let columns = match opts.columns.unwrap_or(Columns::Count(1)) {
            Columns::Auto => ((width / config.min_column_width).floor() as u32).max(1),
            Columns::Count(0) => {
                return Err(Error::InvalidGeometry("column count must be at least 1".into()));
            }
            Columns::Count(n) => n,
        };

        // shrinks with more columns, but never collapses
        let column_margin = non_negative(
            "column margin",
            opts.column_margin,
            default_margin * 2.0 / (5.0 + columns as f64),
        )?;

        let geometry = Self {
            width,
            height,
            paper,
            top_margin,
            side_margin,
            bottom_margin,
            gutter,
            columns,
            column_margin,
            grey_scale: opts.grey_scale,
            page_number_size: config.page_number_size,
        };
        log::debug!("making PageGeometry: {geometry:?}");
        Ok(geometry)
    }

    /// Convenience constructor taking the page size in millimetres.
    pub fn from_mm(config: &Config, width_mm: f64, height_mm: f64, opts: &GeometryOptions) -> Result<Self> {
        let to_pt = crate::config::MM_2_POINT;
        Self::new(config, width_mm * to_pt, height_mm * to_pt, opts)
    }

    /// Width available to text once side margins and gutter are taken.
    pub fn printable_width(&self) -> f64 {
        self.width - 2.0 * self.side_margin - self.gutter
    }

    /// Width of one text column.
    pub fn column_width(&self) -> f64 {
        let columns = self.columns as f64;
        (self.printable_width() - (columns - 1.0) * self.column_margin) / columns
    }

    /// Geometry of the narrow single-column page rendered for a multi-column
    /// layout, or `None` when this geometry has only one column.
    ///
    /// Each column page is one column wide plus a column margin, split half
    /// on each side, with no gutter. Top and bottom margins carry over.
    pub fn column_page(&self, config: &Config) -> Result<Option<PageGeometry>> {
        if self.columns <= 1 {
            return Ok(None);
        }
        let page_width = self.column_width() + self.column_margin;
        log::debug!(
            "making columns with: printable_width={}, column_width={}, page_width={}",
            self.printable_width(),
            self.column_width(),
            page_width
        );

        let opts = GeometryOptions {
            top_margin: Some(self.top_margin),
            side_margin: Some(self.column_margin * 0.5),
            bottom_margin: Some(self.bottom_margin),
            gutter: Some(0.0),
            columns: Some(Columns::Count(1)),
            column_margin: None,
            grey_scale: self.grey_scale,
        };
        PageGeometry::new(config, page_width, self.height, &opts).map(Some)
    }

    /// Renderer margins in millimetres, as `[top, right, bottom, left]`.
    ///
    /// Side margins gain half the gutter so the binding edge never eats
    /// content; the bottom margin gains half the page-number allowance when
    /// pages are numbered.
    pub fn margins_mm(&self, page_numbers: bool) -> [f64; 4] {
        let number_clip = if page_numbers {
            0.5 * self.page_number_size
        } else {
            0.0
        };
        let side = self.side_margin + 0.5 * self.gutter;
        [
            self.top_margin * POINT_2_MM,
            side * POINT_2_MM,
            (self.bottom_margin + number_clip) * POINT_2_MM,
            side * POINT_2_MM,
        ]
    }

    /// Baseline of the page number, measured up from the page foot.
    pub fn number_bottom(&self) -> f64 {
        self.bottom_margin - 0.6 * self.page_number_size
    }

    /// Horizontal inset of the page number.
    pub fn number_margin(&self) -> f64 {
        self.side_margin
    }
}

fn default_margin(config: &Config, width: f64, height: f64) -> f64 {
    config.base_margin + config.proportional_margin * width.min(height)
}

fn default_gutter(config: &Config, width: f64) -> f64 {
    config.base_gutter + config.proportional_gutter * width
}

fn non_negative(what: &str, value: Option<f64>, default: f64) -> Result<f64> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(Error::InvalidGeometry(format!(
            "{what} must be a non-negative length, got {v}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MM_2_POINT;
    use proptest::prelude::*;

    fn geometry(width: f64, height: f64, opts: GeometryOptions) -> PageGeometry {
        PageGeometry::new(&Config::default(), width, height, &opts).expect("geometry")
    }

    #[test]
    fn test_a4_fits_a4_sheet() {
        let g = geometry(210.0 * MM_2_POINT, 297.0 * MM_2_POINT, GeometryOptions::default());
        assert_eq!(g.paper.name, "A4");
        assert!(g.paper.clip_x.abs() < 1e-9);
        assert!(g.paper.clip_y.abs() < 1e-9);
    }

    #[test]
    fn test_comic_book_fits_a4_with_clip() {
        // 6.625in x 10.25in
        let g = geometry(477.0, 738.0, GeometryOptions::default());
        assert_eq!(g.paper.name, "A4");
        let a4_w = 210.0 * MM_2_POINT;
        assert!((g.paper.clip_x - (a4_w - 477.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_page_is_sizing_error() {
        let config = Config::default();
        let err = PageGeometry::new(&config, 3000.0, 5000.0, &GeometryOptions::default());
        assert!(matches!(err, Err(Error::PaperSize { .. })));
    }

    #[test]
    fn test_default_margins_and_gutter() {
        let g = geometry(400.0, 600.0, GeometryOptions::default());
        let margin = 22.0 + 0.04 * 400.0;
        assert_eq!(g.top_margin, margin);
        assert_eq!(g.side_margin, margin);
        assert_eq!(g.bottom_margin, margin);
        assert!((g.gutter - (15.0 + 0.011 * 400.0)).abs() < 1e-9);
        assert_eq!(g.columns, 1);
        assert!((g.column_margin - margin * 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_overrides_win() {
        let g = geometry(
            400.0,
            600.0,
            GeometryOptions {
                top_margin: Some(10.0),
                gutter: Some(0.0),
                column_margin: Some(4.0),
                ..Default::default()
            },
        );
        assert_eq!(g.top_margin, 10.0);
        assert_eq!(g.gutter, 0.0);
        assert_eq!(g.column_margin, 4.0);
        assert_eq!(g.side_margin, 22.0 + 16.0);
    }

    #[test]
    fn test_negative_override_rejected() {
        let opts = GeometryOptions {
            gutter: Some(-5.0),
            ..Default::default()
        };
        let err = PageGeometry::new(&Config::default(), 400.0, 600.0, &opts);
        assert!(matches!(err, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_zero_columns_rejected() {
        let opts = GeometryOptions {
            columns: Some(Columns::Count(0)),
            ..Default::default()
        };
        let err = PageGeometry::new(&Config::default(), 400.0, 600.0, &opts);
        assert!(matches!(err, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_auto_columns() {
        let auto = GeometryOptions {
            columns: Some(Columns::Auto),
            ..Default::default()
        };
        // A2 broadsheet: 420mm wide -> 3 columns of at least 110mm
        let g = geometry(420.0 * MM_2_POINT, 594.0 * MM_2_POINT, auto.clone());
        assert_eq!(g.columns, 3);
        // narrower than one column still gets one
        let g = geometry(100.0 * MM_2_POINT, 150.0 * MM_2_POINT, auto);
        assert_eq!(g.columns, 1);
    }

    #[test]
    fn test_single_column_has_no_column_page() {
        let config = Config::default();
        let g = geometry(400.0, 600.0, GeometryOptions::default());
        assert!(g.column_page(&config).unwrap().is_none());
    }

    #[test]
    fn test_column_page_geometry() {
        let config = Config::default();
        let g = geometry(
            842.0,
            1190.0,
            GeometryOptions {
                columns: Some(Columns::Count(3)),
                ..Default::default()
            },
        );
        let page = g.column_page(&config).unwrap().expect("column page");
        assert_eq!(page.columns, 1);
        assert_eq!(page.gutter, 0.0);
        assert_eq!(page.top_margin, g.top_margin);
        assert_eq!(page.bottom_margin, g.bottom_margin);
        assert!((page.side_margin - g.column_margin / 2.0).abs() < 1e-9);
        // the narrow page's printable width is exactly one column
        assert!((page.printable_width() - g.column_width()).abs() < 1e-9);
    }

    #[test]
    fn test_margins_mm_include_half_gutter_and_number_allowance() {
        let g = geometry(
            400.0,
            600.0,
            GeometryOptions {
                top_margin: Some(36.0),
                side_margin: Some(36.0),
                bottom_margin: Some(36.0),
                gutter: Some(20.0),
                ..Default::default()
            },
        );
        let [t, r, b, l] = g.margins_mm(false);
        assert!((t - 36.0 * POINT_2_MM).abs() < 1e-9);
        assert!((r - 46.0 * POINT_2_MM).abs() < 1e-9);
        assert_eq!(r, l);
        assert!((b - 36.0 * POINT_2_MM).abs() < 1e-9);
        let [_, _, b, _] = g.margins_mm(true);
        assert!((b - 41.5 * POINT_2_MM).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_columns_fill_printable_width(
            width in 300.0f64..2000.0,
            columns in 1u32..8,
        ) {
            let g = geometry(width, 2000.0, GeometryOptions {
                columns: Some(Columns::Count(columns)),
                ..Default::default()
            });
            let n = columns as f64;
            let total = g.column_width() * n + (n - 1.0) * g.column_margin;
            prop_assert!((total - (g.width - 2.0 * g.side_margin - g.gutter)).abs() < 1e-6);
        }

        #[test]
        fn prop_smallest_containing_sheet(
            width in 10.0f64..2800.0,
            height in 10.0f64..4000.0,
        ) {
            let config = Config::default();
            match find_containing_paper(&config, width, height) {
                Ok(paper) => {
                    prop_assert!(paper.clip_x >= 0.0 && paper.clip_y >= 0.0);
                    let pos = config.paper_sizes.iter().position(|p| p.name == paper.name).unwrap();
                    for smaller in &config.paper_sizes[..pos] {
                        prop_assert!(smaller.width < width || smaller.height < height);
                    }
                }
                Err(Error::PaperSize { .. }) => {
                    prop_assert!(config.paper_sizes.iter().all(|p| p.width < width || p.height < height));
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }

        #[test]
        fn prop_stored_lengths_non_negative(width in 50.0f64..2800.0, height in 50.0f64..4000.0) {
            if let Ok(g) = PageGeometry::new(&Config::default(), width, height, &GeometryOptions::default()) {
                prop_assert!(g.top_margin >= 0.0 && g.side_margin >= 0.0);
                prop_assert!(g.bottom_margin >= 0.0 && g.gutter >= 0.0);
                prop_assert!(g.column_margin >= 0.0);
            }
        }
    }
}
