//! PDF production and post-processing through external tools.
//!
//! [`PdfMaker`] pairs a [`PageGeometry`] with a [`ToolRunner`] and drives
//! the renderer, including the narrow-column pass used for multi-column
//! layouts. The free functions wrap the page-count, concatenation, rotation
//! and bookmark-dump tools.

use std::path::{Path, PathBuf};

use crate::config::{Config, TextDirection};
use crate::error::{Error, Result};
use crate::geometry::{PageGeometry, RenderOptions, ReshapeOptions};
use crate::tools::{ToolCommand, ToolRunner};

/// Renders HTML to PDF at one page geometry.
pub struct PdfMaker<'a, R: ToolRunner> {
    pub geometry: PageGeometry,
    config: &'a Config,
    runner: &'a R,
}

impl<'a, R: ToolRunner> PdfMaker<'a, R> {
    pub fn new(config: &'a Config, geometry: PageGeometry, runner: &'a R) -> Self {
        Self {
            geometry,
            config,
            runner,
        }
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub fn runner(&self) -> &'a R {
        self.runner
    }

    /// Render `html` (a local file) to `pdf`.
    ///
    /// With more than one column the document is rendered once as a narrow
    /// single-column PDF, reshaped, and then tiled `columns` to a sheet.
    pub fn make_raw_pdf(&self, html: &Path, pdf: &Path, opts: &RenderOptions<'_>) -> Result<()> {
        let html_url = path_to_url(html);

        let Some(column_page) = self.geometry.column_page(self.config)? else {
            let cmd = self
                .geometry
                .render_command(self.config, &html_url, pdf, opts);
            self.runner.run(&cmd)?;
            return Ok(());
        };

        let column_maker = PdfMaker::new(self.config, column_page, self.runner);
        let column_pdf = single_column_path(pdf);
        let column_opts = RenderOptions {
            footer_url: None,
            header_url: None,
            page_numbers: false,
            ..opts.clone()
        };
        column_maker.make_raw_pdf(html, &column_pdf, &column_opts)?;
        column_maker.reshape_pdf(
            &column_pdf,
            &ReshapeOptions {
                resize: true,
                ..Default::default()
            },
        )?;

        let column_pages = count_pdf_pages(self.runner, self.config, &column_pdf)?;
        let cmd = self
            .geometry
            .nup_command(self.config, &column_pdf, pdf, column_pages);
        self.runner.run(&cmd)?;
        Ok(())
    }

    /// Shift the gutter, pad to even pages, and resize, as requested.
    /// Skips the tool entirely when there is nothing to do.
    pub fn reshape_pdf(&self, pdf: &Path, opts: &ReshapeOptions) -> Result<()> {
        match self.geometry.reshape_command(self.config, pdf, opts) {
            Some(cmd) => {
                self.runner.run(&cmd)?;
                Ok(())
            }
            None => {
                log::debug!("no reshape needed for {}", pdf.display());
                Ok(())
            }
        }
    }

    /// Stamp page numbers onto `pdf`, the first page numbered
    /// `number_start`.
    ///
    /// `pages` is the (approximate) page count if known. Past
    /// `pdfedit_max_pages` the PDF is cut into even-length sections with
    /// `pdftk`, each section numbered on its own, and the sections are
    /// joined back into `pdf`.
    pub fn number_pdf(
        &self,
        pdf: &Path,
        pages: Option<u32>,
        style: &str,
        dir: TextDirection,
        number_start: i64,
    ) -> Result<()> {
        let max = self.config.pdfedit_max_pages;
        let Some(pages) = pages.filter(|&p| p > max) else {
            let cmd = self
                .geometry
                .number_command(self.config, pdf, style, dir, number_start);
            self.runner.run(&cmd)?;
            return Ok(());
        };

        let sections = pages / max.max(1) + 1;
        let section_size = i64::from((pages / sections + 2) & !1);
        let pages = i64::from(pages);
        log::info!("numbering {pages} pages in sections of {section_size}");

        let mut section_pdfs = Vec::new();
        let mut start = number_start;
        while start < pages {
            let end = start + section_size - 1;
            let section_pdf = section_path(pdf, start, end);
            let range = if end < pages - 1 {
                format!("{start}-{end}")
            } else {
                format!("{start}-end")
            };
            let cut = ToolCommand::new(&self.config.tools.pdftk)
                .path_arg(pdf)
                .args(["cat".to_string(), range, "output".to_string()])
                .path_arg(&section_pdf);
            self.runner.run(&cut)?;

            let cmd = self
                .geometry
                .number_command(self.config, &section_pdf, style, dir, start);
            self.runner.run(&cmd)?;
            section_pdfs.push(section_pdf);
            start = end + 1;
        }

        let parts: Vec<Option<&Path>> = section_pdfs.iter().map(|p| Some(p.as_path())).collect();
        concat_pdfs(self.runner, self.config, pdf, &parts)
    }
}

/// `foo.pdf` -> `foo-3-24.pdf`
fn section_path(pdf: &Path, start: i64, end: i64) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    pdf.with_file_name(format!("{stem}-{start}-{end}.pdf"))
}

/// `foo.pdf` -> `foo-single-column.pdf`
fn single_column_path(pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    pdf.with_file_name(format!("{stem}-single-column.pdf"))
}

/// A `file://` url for a local path.
pub fn path_to_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let encoded = percent_encoding::utf8_percent_encode(
        &absolute.to_string_lossy(),
        URL_PATH,
    )
    .to_string();
    format!("file://{encoded}")
}

const URL_PATH: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How many pages are in the PDF?
pub fn count_pdf_pages(runner: &impl ToolRunner, config: &Config, pdf: &Path) -> Result<u32> {
    let cmd = ToolCommand::new(&config.tools.pdfinfo).path_arg(pdf);
    let output = runner.run(&cmd)?;
    parse_page_count(&output.stdout).ok_or_else(|| Error::ToolOutput {
        command: cmd.to_string(),
        message: "no `Pages:` line".to_string(),
    })
}

/// Find the `Pages: N` line in `pdfinfo` output.
pub fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .filter_map(|line| line.trim().strip_prefix("Pages:"))
        .find_map(|rest| rest.trim().parse().ok())
}

/// Join the given PDFs, in order, into `destination`. `None` entries are
/// skipped.
pub fn concat_pdfs(
    runner: &impl ToolRunner,
    config: &Config,
    destination: &Path,
    pdfs: &[Option<&Path>],
) -> Result<()> {
    let cmd = pdfs
        .iter()
        .flatten()
        .fold(ToolCommand::new(&config.tools.pdftk), |cmd, pdf| {
            cmd.path_arg(pdf)
        })
        .args(["cat", "output"])
        .path_arg(destination);
    runner.run(&cmd)?;
    Ok(())
}

/// Turn the PDF on its head.
pub fn rotate_pdf(runner: &impl ToolRunner, config: &Config, pdf_in: &Path, pdf_out: &Path) -> Result<()> {
    let cmd = ToolCommand::new(&config.tools.pdftk)
        .path_arg(pdf_in)
        .args(["cat", "1-endD", "output"])
        .path_arg(pdf_out);
    runner.run(&cmd)?;
    Ok(())
}

/// Raw `dump_data` output: page count and flat bookmark records.
pub fn dump_pdf_data(runner: &impl ToolRunner, config: &Config, pdf: &Path) -> Result<String> {
    let cmd = ToolCommand::new(&config.tools.pdftk)
        .path_arg(pdf)
        .arg("dump_data");
    Ok(runner.run(&cmd)?.stdout)
}
