//! folio - HTML books to print and e-reader layouts

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use folio::config::MM_2_POINT;
use folio::outline::{parse_bookmark_dump, read_outline_file};
use folio::{
    Book, BookAssembler, Columns, Config, GeometryOptions, PageGeometry, SystemRunner, split_html,
};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Lay out HTML books for print and e-readers", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio pdf manual.zip manual.pdf --paper A5       Print-ready PDF
    folio pdf manual.zip wide.pdf -W 420 -H 297 -c 2 Two columns on A3 landscape
    folio chapters manual.zip out/                   E-reader sized chapters
    folio outline outline.xml                        Show a rendered outline")]
struct Cli {
    /// Configuration file (JSON); missing keys keep their defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Leave the working directory in place afterwards
    #[arg(long, global = true)]
    keep_temp: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a book zip to a PDF with title and contents pages
    Pdf {
        #[arg(value_name = "BOOK")]
        book: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Standard paper name (A5, A4, ...)
        #[arg(short, long, conflicts_with_all = ["width", "height"])]
        paper: Option<String>,

        /// Page width in mm
        #[arg(short = 'W', long, requires = "height")]
        width: Option<f64>,

        /// Page height in mm
        #[arg(short = 'H', long, requires = "width")]
        height: Option<f64>,

        /// Column count, or "auto"
        #[arg(short, long)]
        columns: Option<String>,

        /// Gutter in points
        #[arg(short, long)]
        gutter: Option<f64>,

        /// Side margin in points
        #[arg(long)]
        side_margin: Option<f64>,

        /// Grey-scale output
        #[arg(long)]
        grey: bool,

        /// Turn the finished PDF upside down
        #[arg(long)]
        rotate: bool,

        /// Override the book's title
        #[arg(long)]
        title: Option<String>,
    },

    /// Split a book's chapters into e-reader sized files
    Chapters {
        #[arg(value_name = "BOOK")]
        book: PathBuf,

        #[arg(value_name = "OUTDIR")]
        outdir: PathBuf,
    },

    /// Split one HTML file into e-reader sized XHTML files
    Split {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTDIR")]
        outdir: PathBuf,
    },

    /// Print an outline (renderer XML, or a bookmark dump with --dump)
    Outline {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Read `pdftk dump_data` output instead of outline XML
        #[arg(long)]
        dump: bool,

        /// Deepest level to list
        #[arg(short, long, default_value_t = 1)]
        depth: u32,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    config.keep_temp_files |= cli.keep_temp;

    match cli.command {
        Command::Pdf {
            book,
            output,
            paper,
            width,
            height,
            columns,
            gutter,
            side_margin,
            grey,
            rotate,
            title,
        } => {
            let opts = GeometryOptions {
                gutter,
                side_margin,
                columns: columns.as_deref().map(parse_columns).transpose()?,
                grey_scale: grey,
                ..Default::default()
            };
            let geometry = page_geometry(&config, paper.as_deref(), width, height, &opts)?;
            make_pdf(&config, &book, &output, geometry, title, rotate)
        }
        Command::Chapters { book, outdir } => make_chapters(&config, &book, &outdir),
        Command::Split { input, outdir } => split_file(&config, &input, &outdir),
        Command::Outline { file, dump, depth } => show_outline(&config, &file, dump, depth),
    }
}

fn parse_columns(s: &str) -> Result<Columns, String> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(Columns::Auto);
    }
    s.parse()
        .map(Columns::Count)
        .map_err(|_| format!("bad column count {s:?}"))
}

fn page_geometry(
    config: &Config,
    paper: Option<&str>,
    width: Option<f64>,
    height: Option<f64>,
    opts: &GeometryOptions,
) -> Result<PageGeometry, String> {
    let (width, height) = match (paper, width, height) {
        (Some(name), _, _) => {
            let paper = config
                .paper_sizes
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("unknown paper size {name:?}"))?;
            (paper.width, paper.height)
        }
        (None, Some(w), Some(h)) => (w * MM_2_POINT, h * MM_2_POINT),
        _ => {
            let a5 = config
                .paper_sizes
                .first()
                .ok_or("no paper sizes configured")?;
            (a5.width, a5.height)
        }
    };
    PageGeometry::new(config, width, height, opts).map_err(|e| e.to_string())
}

fn make_pdf(
    config: &Config,
    book: &Path,
    output: &Path,
    geometry: PageGeometry,
    title: Option<String>,
    rotate: bool,
) -> Result<(), String> {
    let book = Book::open(book).map_err(|e| e.to_string())?;
    let mut assembler =
        BookAssembler::new(config, book, geometry, SystemRunner).map_err(|e| e.to_string())?;
    assembler.add_watcher(|stage| log::info!("stage: {stage}"));
    if let Some(title) = title {
        assembler.set_title(title);
    }
    assembler
        .make_pdf(output, rotate)
        .map_err(|e| e.to_string())?;
    println!("{}", output.display());
    Ok(())
}

fn make_chapters(config: &Config, book: &Path, outdir: &Path) -> Result<(), String> {
    let book = Book::open(book).map_err(|e| e.to_string())?;
    // page size plays no part in splitting
    let geometry = page_geometry(config, None, None, None, &GeometryOptions::default())?;
    let assembler =
        BookAssembler::new(config, book, geometry, SystemRunner).map_err(|e| e.to_string())?;
    let chapters = assembler
        .make_ereader_chapters()
        .map_err(|e| e.to_string())?;

    for file in &chapters.files {
        let path = outdir.join(&file.url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(&path, &file.data).map_err(|e| e.to_string())?;
    }
    println!("Files: {}", chapters.files.len());
    println!("Spine: {}", chapters.spine.join(" "));
    Ok(())
}

fn split_file(config: &Config, input: &Path, outdir: &Path) -> Result<(), String> {
    let html = fs::read_to_string(input).map_err(|e| e.to_string())?;
    let parts = split_html(&html, None, config).map_err(|e| e.to_string())?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "part".to_string());

    fs::create_dir_all(outdir).map_err(|e| e.to_string())?;
    for (i, part) in parts.iter().enumerate() {
        let path = outdir.join(format!("{stem}-{i}.xhtml"));
        fs::write(&path, part).map_err(|e| e.to_string())?;
        println!("{}", path.display());
    }
    Ok(())
}

fn show_outline(config: &Config, file: &Path, dump: bool, depth: u32) -> Result<(), String> {
    let entries = if dump {
        let text = fs::read_to_string(file).map_err(|e| e.to_string())?;
        let dump = parse_bookmark_dump(&text, depth);
        if let Some(pages) = dump.page_count {
            println!("Pages: {pages}");
        }
        dump.entries
    } else {
        read_outline_file(file, depth, config.outline_page_bias).map_err(|e| e.to_string())?
    };

    for entry in entries {
        println!("{:>4}  {}{}", entry.page, "  ".repeat(entry.depth.saturating_sub(1) as usize), entry.title);
    }
    Ok(())
}
