//! Whole-book pipeline tests.
//!
//! External tools are replaced by a scripted runner that writes the files a
//! real renderer and PDF toolkit would write and answers queries with
//! canned output, so none of them need to be installed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io::{Cursor, Write};
use std::rc::Rc;

use folio::config::FINISHED_MESSAGE;
use folio::outline::OutlineTier;
use folio::{
    Book, BookAssembler, Config, GeometryOptions, PageGeometry, ToolCommand, ToolOutput, ToolRunner,
};
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct ScriptedTools {
    /// Written wherever the renderer is asked to dump its outline.
    outline_xml: Option<String>,
    pages: u32,
    /// Answers to successive `dump_data` calls; empty once used up.
    dumps: RefCell<VecDeque<String>>,
    commands: RefCell<Vec<ToolCommand>>,
}

impl ScriptedTools {
    fn programs(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|c| {
                if c.args.iter().any(|a| a == "dump_data") {
                    "pdftk dump_data".to_string()
                } else {
                    c.program.clone()
                }
            })
            .collect()
    }
}

impl ToolRunner for ScriptedTools {
    fn run(&self, cmd: &ToolCommand) -> folio::Result<ToolOutput> {
        self.commands.borrow_mut().push(cmd.clone());
        let mut stdout = String::new();

        match cmd.program.as_str() {
            "wkhtmltopdf" => {
                if let (Some(xml), Some(path)) = (&self.outline_xml, cmd.flag_value("--dump-outline")) {
                    fs::write(path, xml)?;
                }
                if let Some(pdf) = cmd.args.last() {
                    fs::write(pdf, b"%PDF-1.4 rendered")?;
                }
            }
            "pdfinfo" => stdout = format!("Producer: test\nPages:          {}\n", self.pages),
            "pdftk" if cmd.args.iter().any(|a| a == "dump_data") => {
                stdout = self.dumps.borrow_mut().pop_front().unwrap_or_default();
            }
            "pdftk" => {
                if let Some(out) = cmd.args.last() {
                    fs::write(out, b"%PDF-1.4 joined")?;
                }
            }
            _ => {}
        }

        Ok(ToolOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

const INFO: &str = r#"{
    "manifest": {
        "ch001_credits": {"url": "credits.html", "mimetype": "text/html"},
        "ch002_sound": {"url": "sound.html", "mimetype": "text/html"},
        "ch003_waves": {"url": "waves.html", "mimetype": "text/html"},
        "ch004_light": {"url": "light.html", "mimetype": "text/html"},
        "ch005_colour": {"url": "colour.html", "mimetype": "text/html"},
        "pic": {"url": "static/pic.png", "mimetype": "image/png"}
    },
    "spine": ["ch002_sound", "ch003_waves", "ch004_light", "ch005_colour", "ch001_credits"],
    "TOC": [
        {"title": "Sound", "children": [
            {"title": "What is sound", "url": "sound.html"},
            {"title": "Waves", "url": "waves.html"}
        ]},
        {"title": "Light", "children": [
            {"title": "Light", "url": "light.html"},
            {"title": "Colour", "url": "colour.html"}
        ]},
        {"title": "Credits", "url": "credits.html"}
    ],
    "metadata": {
        "http://purl.org/dc/elements/1.1/": {"title": {"": ["Physics for Kids"]}}
    }
}"#;

fn chapter(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><h1>{title}</h1><h2>More</h2><p>{body}</p></body></html>")
}

fn book_zip() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let files = [
        ("info.json", INFO.to_string()),
        ("sound.html", chapter("Sound Basics", "Vibrations.")),
        ("waves.html", chapter("Waves", "Up and down.")),
        ("light.html", chapter("Light", "Photons.")),
        ("colour.html", chapter("Colour", "Rainbows.")),
        ("credits.html", "<html><body>Written by many hands.</body></html>".to_string()),
        ("static/pic.png", "not really a png".to_string()),
    ];
    for (name, data) in files {
        zip.start_file(name, options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn config() -> Config {
    Config {
        renderer_startup_delay_ms: 0,
        ..Default::default()
    }
}

fn geometry(config: &Config) -> PageGeometry {
    PageGeometry::from_mm(config, 148.0, 210.0, &GeometryOptions::default()).unwrap()
}

/// Four chapter headings, two with a sub-heading each. Pages are 0-based.
const OUTLINE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<outline xmlns="http://wkhtmltopdf.org/outline">
  <item title="" page="0" link="" backLink="">
    <item title="1.%20Sound%20Basics" page="2" link="" backLink="">
      <item title="More" page="3" link="" backLink=""/>
    </item>
    <item title="2.%20Waves" page="4" link="" backLink=""/>
    <item title="3.%20Light" page="6" link="" backLink="">
      <item title="More" page="7" link="" backLink=""/>
    </item>
    <item title="4.%20Colour" page="9" link="" backLink=""/>
  </item>
</outline>
"#;

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_book_from_zip() {
    let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
    assert_eq!(book.title(), "Physics for Kids");
    assert_eq!(book.info.spine.len(), 5);
    assert!(book.compressed_size("sound.html").is_some());
    assert_eq!(book.read("static/pic.png"), Some(&b"not really a png"[..]));
    // sections inherit their first chapter's url
    assert_eq!(book.toc()[1].filename, "light.html");
}

#[test]
fn test_zip_without_info_is_rejected() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("a.html", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"<p>x</p>").unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    assert!(matches!(
        Book::from_zip_bytes("broken", bytes),
        Err(folio::Error::InvalidBook(_))
    ));
}

#[test]
fn test_full_pdf_pipeline() {
    let config = config();
    let tools = ScriptedTools {
        outline_xml: Some(OUTLINE_XML.to_string()),
        pages: 12,
        ..Default::default()
    };
    let out_dir = tempfile::tempdir().unwrap();
    let destination = out_dir.path().join("physics.pdf");
    let heard = Rc::new(RefCell::new(Vec::new()));

    let work_path = {
        let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
        let mut assembler = BookAssembler::new(&config, book, geometry(&config), &tools).unwrap();
        let sink = Rc::clone(&heard);
        assembler.add_watcher(move |m| sink.borrow_mut().push(m.to_string()));

        assembler.make_pdf(&destination, false).unwrap();

        let outline = assembler.outline().unwrap();
        assert_eq!(outline.tier, OutlineTier::Dumped);
        assert_eq!(outline.page_count, 12);
        assert_eq!(outline.entries.len(), 4);

        let preamble = fs::read_to_string(assembler.workdir().file("preamble.html")).unwrap();
        assert!(preamble.starts_with("<html dir=\"LTR\">"));
        assert!(preamble.contains("<h1 class=\"frontpage\">Physics for Kids</h1>"));
        assert!(preamble.contains("<div class=\"contents\"><h1>Table of Contents</h1>"));
        assert!(preamble.contains(
            "<tr><td class=\"chapter\">1</td><td class=\"title\">Sound Basics</td><td class=\"pagenumber\">3</td></tr>"
        ));
        assert!(preamble.contains(
            "<tr><td class=\"chapter\">4</td><td class=\"title\">Colour</td><td class=\"pagenumber\">10</td></tr>"
        ));
        assert!(preamble.contains("<td class=\"empty-section\" colspan=\"3\">Credits</td>"));

        let body = fs::read_to_string(assembler.workdir().file("body.html")).unwrap();
        assert!(body.contains("id=\"section-1\""));
        assert!(body.contains("id=\"section-2\""));
        assert!(body.contains("<strong class=\"initial\">3.</strong> Light"));

        assembler.workdir().path().to_path_buf()
    };

    assert_eq!(fs::read(&destination).unwrap(), b"%PDF-1.4 joined");
    assert!(!work_path.exists());

    assert_eq!(
        tools.programs(),
        ["wkhtmltopdf", "pdfinfo", "pdfedit", "pdfedit", "wkhtmltopdf", "pdfedit", "pdfedit", "pdftk"]
    );
    let commands = tools.commands.borrow();
    let body_numbers = &commands[3];
    assert_eq!(body_numbers.keyed_value("operation"), Some("page_numbers"));
    assert_eq!(body_numbers.keyed_value("number_start"), Some("1"));
    assert_eq!(body_numbers.keyed_value("number_style"), Some("LTR"));
    assert!(body_numbers.keyed_value("filename").unwrap().ends_with("body.pdf"));
    let preamble_numbers = &commands[6];
    assert_eq!(preamble_numbers.keyed_value("number_start"), Some("-2"));
    assert_eq!(preamble_numbers.keyed_value("number_style"), Some("roman"));
    assert!(preamble_numbers.keyed_value("filename").unwrap().ends_with("preamble.pdf"));
    let concat = &commands[7];
    assert!(concat.args[0].ends_with("preamble.pdf"));
    assert!(concat.args[1].ends_with("body.pdf"));

    let heard = heard.borrow();
    for stage in ["generate_pdf", "reshape_pdf", "number_pdf", "concatenated_pdfs", "publish_pdf"] {
        assert!(heard.iter().any(|m| m == stage), "missing {stage}");
    }
    assert_eq!(heard.last().map(String::as_str), Some(FINISHED_MESSAGE));
}

#[test]
fn test_rotated_pdf() {
    let config = config();
    let tools = ScriptedTools {
        outline_xml: Some(OUTLINE_XML.to_string()),
        pages: 12,
        ..Default::default()
    };
    let out_dir = tempfile::tempdir().unwrap();
    let destination = out_dir.path().join("rotated.pdf");

    let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
    let mut assembler = BookAssembler::new(&config, book, geometry(&config), &tools).unwrap();
    assembler.make_pdf(&destination, true).unwrap();

    assert!(assembler.workdir().file("final-pre-rotate.pdf").exists());
    let commands = tools.commands.borrow();
    let rotate = commands.last().unwrap();
    assert_eq!(rotate.program, "pdftk");
    assert!(rotate.args.iter().any(|a| a == "1-endD"));
}

#[test]
fn test_outline_falls_back_to_bookmarks() {
    let config = config();
    let dump = "NumberOfPages: 12
BookmarkBegin
BookmarkTitle: Sound Basics
BookmarkLevel: 1
BookmarkPageNumber: 3
BookmarkBegin
BookmarkTitle: More
BookmarkLevel: 2
BookmarkPageNumber: 4
BookmarkBegin
BookmarkTitle: Waves
BookmarkLevel: 1
BookmarkPageNumber: 5
";
    let tools = ScriptedTools {
        pages: 12,
        dumps: RefCell::new(VecDeque::from([dump.to_string()])),
        ..Default::default()
    };

    let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
    let mut assembler = BookAssembler::new(&config, book, geometry(&config), &tools).unwrap();
    assembler.load_book().unwrap();
    assembler.make_body_pdf().unwrap();

    let outline = assembler.outline().unwrap();
    assert_eq!(outline.tier, OutlineTier::Bookmarks);
    let titles: Vec<_> = outline.entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Sound Basics", "Waves"]);

    // only two chapters could be placed
    let contents = assembler.make_contents().unwrap();
    assert_eq!(contents.matches("class=\"chapter\"").count(), 2);
    assert_eq!(contents.matches("class=\"section\"").count(), 2);
    assert!(assembler.workdir().file("extracted-outline.txt").exists());
}

#[test]
fn test_outline_falls_back_to_substituted_headings() {
    let config = config();
    let keyed = "NumberOfPages: 12
BookmarkBegin
BookmarkTitle: h1_0
BookmarkLevel: 1
BookmarkPageNumber: 3
BookmarkBegin
BookmarkTitle: h2_0
BookmarkLevel: 2
BookmarkPageNumber: 3
BookmarkBegin
BookmarkTitle: 2. h1_1&#0;
BookmarkLevel: 1
BookmarkPageNumber: 5
";
    let tools = ScriptedTools {
        pages: 12,
        dumps: RefCell::new(VecDeque::from([String::new(), keyed.to_string()])),
        ..Default::default()
    };

    let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
    let mut assembler = BookAssembler::new(&config, book, geometry(&config), &tools).unwrap();
    assembler.load_book().unwrap();
    assembler.make_body_pdf().unwrap();

    let outline = assembler.outline().unwrap();
    assert_eq!(outline.tier, OutlineTier::Substituted);
    let found: Vec<_> = outline
        .entries
        .iter()
        .map(|e| (e.title.as_str(), e.page))
        .collect();
    assert_eq!(found, [("Sound Basics", 3), ("Waves", 5)]);

    let substituted = fs::read_to_string(assembler.workdir().file("body-ascii-headings.html")).unwrap();
    assert!(substituted.contains("h1_3"));
    assert!(!substituted.contains("Sound Basics"));

    assert_eq!(
        tools.programs(),
        [
            "wkhtmltopdf",
            "pdfinfo",
            "pdftk dump_data",
            "wkhtmltopdf",
            "pdftk dump_data",
            "pdfedit",
            "pdfedit"
        ]
    );
}

#[test]
fn test_ereader_chapters_from_zip() {
    let config = Config {
        epub_file_size_max: 80,
        ..config()
    };
    let tools = ScriptedTools::default();
    let book = Book::from_zip_bytes("physics", book_zip()).unwrap();
    let assembler = BookAssembler::new(&config, book, geometry(&config), &tools).unwrap();

    let chapters = assembler.make_ereader_chapters().unwrap();
    assert!(tools.commands.borrow().is_empty());
    assert_eq!(chapters.spine[0], "ch002_sound");
    assert_eq!(chapters.spine[1], "ch002_sound_split_1");
    assert_eq!(chapters.spine.last().map(String::as_str), Some("ch001_credits"));
    assert!(chapters.files.iter().any(|f| f.url == "sound_split_1.xhtml"));

    for file in chapters.files.iter().filter(|f| f.mimetype == "application/xhtml+xml") {
        let mut reader = Reader::from_reader(&file.data[..]);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,
                Ok(_) => buf.clear(),
                Err(e) => panic!("{} is not well-formed: {e}", file.url),
            }
        }
    }

    let pic = chapters.files.iter().find(|f| f.id == "pic").unwrap();
    assert_eq!(pic.url, "static/pic.png");
    assert_eq!(pic.data, b"not really a png");
}
