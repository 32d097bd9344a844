//! Command lines derived from a [`PageGeometry`].

use std::path::Path;

use super::PageGeometry;
use crate::config::{Config, POINT_2_MM, TextDirection};
use crate::tools::ToolCommand;

/// What the renderer should produce besides the PDF itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions<'a> {
    /// Embed a bookmark outline in the PDF.
    pub outline: bool,
    /// Also write the outline as XML to this file.
    pub outline_file: Option<&'a Path>,
    pub footer_url: Option<&'a str>,
    pub header_url: Option<&'a str>,
    /// Leave room at the foot of each page for a page number.
    pub page_numbers: bool,
}

/// A single reshape-script operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReshapeOp {
    /// Move pages left and right by the gutter, alternating recto/verso.
    Shift,
    /// Pad with a blank page to make the page count even.
    EvenPages,
    /// Crop pages to the geometry's exact size.
    Resize,
}

impl ReshapeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReshapeOp::Shift => "shift",
            ReshapeOp::EvenPages => "even_pages",
            ReshapeOp::Resize => "resize",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReshapeOptions {
    pub dir: TextDirection,
    pub centre_start: bool,
    pub centre_end: bool,
    pub even_pages: bool,
    pub resize: bool,
}

impl Default for ReshapeOptions {
    fn default() -> Self {
        Self {
            dir: TextDirection::Ltr,
            centre_start: false,
            centre_end: false,
            even_pages: true,
            resize: false,
        }
    }
}

/// Blank pages needed so an n-up tiler that rounds down to whole output
/// sheets (`columns * 2` input pages) drops nothing.
pub fn blank_padding(columns: u32, column_pages: u32) -> u32 {
    let per_sheet = columns * 2;
    if per_sheet == 0 {
        return 0;
    }
    match column_pages % per_sheet {
        0 => 0,
        overflow => per_sheet - overflow,
    }
}

fn python_bool(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

impl PageGeometry {
    /// Renderer invocation turning `html_url` into `pdf`.
    pub fn render_command(
        &self,
        config: &Config,
        html_url: &str,
        pdf: &Path,
        opts: &RenderOptions<'_>,
    ) -> ToolCommand {
        let [top, right, bottom, left] = self.margins_mm(opts.page_numbers);

        let mut cmd = ToolCommand::new(&config.tools.renderer).args([
            "-q".to_string(),
            "--page-width".to_string(),
            (self.width * POINT_2_MM).to_string(),
            "--page-height".to_string(),
            (self.height * POINT_2_MM).to_string(),
            "-T".to_string(),
            top.to_string(),
            "-R".to_string(),
            right.to_string(),
            "-B".to_string(),
            bottom.to_string(),
            "-L".to_string(),
            left.to_string(),
            "-d".to_string(),
            "100".to_string(),
            "--encoding".to_string(),
            "UTF-8".to_string(),
            "--javascript-delay".to_string(),
            "2000".to_string(),
        ]);

        if let Some(footer) = opts.footer_url {
            cmd = cmd.arg("--footer-html").arg(footer);
        }
        if let Some(header) = opts.header_url {
            cmd = cmd.arg("--header-html").arg(header);
        }
        if opts.outline {
            cmd = cmd
                .arg("--outline")
                .arg("--outline-depth")
                .arg(config.renderer_outline_depth.to_string());
        }
        if let Some(outline_file) = opts.outline_file {
            cmd = cmd.arg("--dump-outline").path_arg(outline_file);
        }
        if self.grey_scale {
            cmd = cmd.arg("-g");
        }

        cmd.args(config.renderer_extra_args.iter().cloned())
            .arg(html_url)
            .path_arg(pdf)
    }

    /// Operations the reshape script must perform, in order.
    pub fn reshape_ops(&self, opts: &ReshapeOptions) -> Vec<ReshapeOp> {
        let mut ops = Vec::new();
        if opts.resize {
            ops.push(ReshapeOp::Resize);
        }
        if self.gutter != 0.0 {
            ops.push(ReshapeOp::Shift);
        }
        if opts.even_pages {
            ops.push(ReshapeOp::EvenPages);
        }
        ops
    }

    /// Reshape-script invocation, or `None` when there is nothing to do.
    ///
    /// The gutter offset is negated for right-to-left books here and only
    /// here.
    pub fn reshape_command(
        &self,
        config: &Config,
        pdf: &Path,
        opts: &ReshapeOptions,
    ) -> Option<ToolCommand> {
        let ops = self.reshape_ops(opts);
        if ops.is_empty() {
            return None;
        }
        let offset = match opts.dir {
            TextDirection::Rtl => -self.gutter,
            TextDirection::Ltr => self.gutter,
        };
        let operation = ops
            .iter()
            .map(ReshapeOp::as_str)
            .collect::<Vec<_>>()
            .join(",");

        Some(
            ToolCommand::new(&config.tools.pdfedit)
                .arg("-s")
                .arg(&config.tools.reshape_script)
                .arg(format!("dir={}", opts.dir.as_str()))
                .arg(format!("filename={}", pdf.display()))
                .arg(format!("output_filename={}", pdf.display()))
                .arg(format!("operation={operation}"))
                .arg(format!("width={}", self.width))
                .arg(format!("height={}", self.height))
                .arg(format!("offset={offset}"))
                .arg(format!("centre_start={}", python_bool(opts.centre_start)))
                .arg(format!("centre_end={}", python_bool(opts.centre_end))),
        )
    }

    /// Numbering-script invocation stamping page numbers onto `pdf` in
    /// place, counting from `number_start` on its first page.
    pub fn number_command(
        &self,
        config: &Config,
        pdf: &Path,
        style: &str,
        dir: TextDirection,
        number_start: i64,
    ) -> ToolCommand {
        ToolCommand::new(&config.tools.pdfedit)
            .arg("-s")
            .arg(&config.tools.reshape_script)
            .arg("operation=page_numbers")
            .arg(format!("dir={}", dir.as_str()))
            .arg(format!("filename={}", pdf.display()))
            .arg(format!("output_filename={}", pdf.display()))
            .arg(format!("number_start={number_start}"))
            .arg(format!("number_style={style}"))
            .arg(format!("number_bottom={}", self.number_bottom()))
            .arg(format!("number_margin={}", self.number_margin()))
    }

    /// Compositor invocation tiling `columns` narrow pages side by side onto
    /// each output sheet, padded with blanks so no trailing page is lost.
    pub fn nup_command(
        &self,
        config: &Config,
        column_pdf: &Path,
        pdf: &Path,
        column_pages: u32,
    ) -> ToolCommand {
        let extra = blank_padding(self.columns, column_pages);
        let pages = format!("1-last{}", ",{}".repeat(extra as usize));

        ToolCommand::new(&config.tools.pdfnup)
            .arg("--nup")
            .arg(format!("{}x1", self.columns))
            .arg("--outfile")
            .path_arg(pdf)
            .args(["--noautoscale", "true", "--orient", "portrait"])
            .arg("--paperwidth")
            .arg(format!("{}mm", (self.width * POINT_2_MM).round() as i64))
            .arg("--paperheight")
            .arg(format!("{}mm", (self.height * POINT_2_MM).round() as i64))
            .arg("--pages")
            .arg(pages)
            .path_arg(column_pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Columns, GeometryOptions};

    fn geometry(gutter: f64) -> PageGeometry {
        let opts = GeometryOptions {
            gutter: Some(gutter),
            ..Default::default()
        };
        PageGeometry::new(&Config::default(), 400.0, 600.0, &opts).unwrap()
    }

    #[test]
    fn test_render_command_shape() {
        let config = Config::default();
        let g = geometry(10.0);
        let cmd = g.render_command(
            &config,
            "file:///tmp/body.html",
            Path::new("/tmp/body.pdf"),
            &RenderOptions {
                outline: true,
                outline_file: Some(Path::new("/tmp/outline.xml")),
                footer_url: Some("file:///tmp/footer.html"),
                ..Default::default()
            },
        );
        assert_eq!(cmd.program, "wkhtmltopdf");
        assert_eq!(cmd.args[0], "-q");
        assert_eq!(cmd.flag_value("--dump-outline"), Some("/tmp/outline.xml"));
        assert_eq!(cmd.flag_value("--outline-depth"), Some("2"));
        assert_eq!(cmd.flag_value("--footer-html"), Some("file:///tmp/footer.html"));
        assert!(cmd.flag_value("--header-html").is_none());
        assert!(!cmd.args.iter().any(|a| a == "-g"));
        let n = cmd.args.len();
        assert_eq!(cmd.args[n - 2], "file:///tmp/body.html");
        assert_eq!(cmd.args[n - 1], "/tmp/body.pdf");

        let width: f64 = cmd.flag_value("--page-width").unwrap().parse().unwrap();
        assert!((width - 400.0 * POINT_2_MM).abs() < 1e-9);
    }

    #[test]
    fn test_grey_scale_flag() {
        let config = Config::default();
        let opts = GeometryOptions {
            grey_scale: true,
            ..Default::default()
        };
        let g = PageGeometry::new(&config, 400.0, 600.0, &opts).unwrap();
        let cmd = g.render_command(&config, "x", Path::new("y"), &RenderOptions::default());
        assert!(cmd.args.iter().any(|a| a == "-g"));
        assert!(cmd.flag_value("--outline-depth").is_none());
    }

    #[test]
    fn test_reshape_noop_without_gutter_or_even_pages() {
        let config = Config::default();
        let g = geometry(0.0);
        let opts = ReshapeOptions {
            even_pages: false,
            ..Default::default()
        };
        assert!(g.reshape_ops(&opts).is_empty());
        assert!(g.reshape_command(&config, Path::new("a.pdf"), &opts).is_none());
    }

    #[test]
    fn test_reshape_flips_gutter_for_rtl() {
        let config = Config::default();
        let g = geometry(12.0);
        let ltr = g
            .reshape_command(&config, Path::new("a.pdf"), &ReshapeOptions::default())
            .unwrap();
        assert_eq!(ltr.keyed_value("offset"), Some("12"));
        assert_eq!(ltr.keyed_value("operation"), Some("shift,even_pages"));
        assert_eq!(ltr.keyed_value("centre_end"), Some("False"));

        let rtl = g
            .reshape_command(
                &config,
                Path::new("a.pdf"),
                &ReshapeOptions {
                    dir: TextDirection::Rtl,
                    centre_start: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rtl.keyed_value("offset"), Some("-12"));
        assert_eq!(rtl.keyed_value("dir"), Some("RTL"));
        assert_eq!(rtl.keyed_value("centre_start"), Some("True"));
        // stored state is untouched
        assert_eq!(g.gutter, 12.0);
    }

    #[test]
    fn test_resize_only_when_asked() {
        let g = geometry(0.0);
        let ops = g.reshape_ops(&ReshapeOptions {
            resize: true,
            ..Default::default()
        });
        assert_eq!(ops, vec![ReshapeOp::Resize, ReshapeOp::EvenPages]);
    }

    #[test]
    fn test_blank_padding() {
        assert_eq!(blank_padding(3, 12), 0);
        assert_eq!(blank_padding(3, 13), 5);
        assert_eq!(blank_padding(2, 3), 1);
        assert_eq!(blank_padding(1, 1), 1);
        assert_eq!(blank_padding(1, 2), 0);
    }

    #[test]
    fn test_nup_command_pads_pages() {
        let config = Config::default();
        let opts = GeometryOptions {
            columns: Some(Columns::Count(3)),
            ..Default::default()
        };
        let g = PageGeometry::new(&config, 842.0, 1190.0, &opts).unwrap();
        let cmd = g.nup_command(&config, Path::new("col.pdf"), Path::new("out.pdf"), 13);
        assert_eq!(cmd.flag_value("--nup"), Some("3x1"));
        assert_eq!(cmd.flag_value("--pages"), Some("1-last,{},{},{},{},{}"));
        assert_eq!(cmd.flag_value("--outfile"), Some("out.pdf"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("col.pdf"));
    }

    #[test]
    fn test_nup_paper_size_rounds_to_whole_mm() {
        let config = Config::default();
        let opts = GeometryOptions {
            columns: Some(Columns::Count(2)),
            ..Default::default()
        };
        for (w, h) in [(210.0, 297.0), (297.0, 420.0), (148.0, 210.0)] {
            let g = PageGeometry::from_mm(&config, w, h, &opts).unwrap();
            let cmd = g.nup_command(&config, Path::new("col.pdf"), Path::new("out.pdf"), 4);
            assert_eq!(cmd.flag_value("--paperwidth"), Some(format!("{w}mm").as_str()));
            assert_eq!(cmd.flag_value("--paperheight"), Some(format!("{h}mm").as_str()));
        }
    }

    #[test]
    fn test_number_command() {
        let config = Config::default();
        let g = geometry(10.0);
        let cmd = g.number_command(&config, Path::new("/w/body.pdf"), "fa", TextDirection::Rtl, -2);
        assert_eq!(cmd.program, "pdfedit");
        assert_eq!(cmd.keyed_value("operation"), Some("page_numbers"));
        assert_eq!(cmd.keyed_value("dir"), Some("RTL"));
        assert_eq!(cmd.keyed_value("filename"), Some("/w/body.pdf"));
        assert_eq!(cmd.keyed_value("output_filename"), Some("/w/body.pdf"));
        assert_eq!(cmd.keyed_value("number_start"), Some("-2"));
        assert_eq!(cmd.keyed_value("number_style"), Some("fa"));
        let bottom: f64 = cmd.keyed_value("number_bottom").unwrap().parse().unwrap();
        assert!((bottom - (g.bottom_margin - 0.6 * 11.0)).abs() < 1e-9);
        let margin: f64 = cmd.keyed_value("number_margin").unwrap().parse().unwrap();
        assert_eq!(margin, g.side_margin);
    }
}
