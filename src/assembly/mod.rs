//! Turning a [`Book`] into finished artifacts.
//!
//! A [`BookAssembler`] owns one book for the duration of a job. For print
//! it joins the chapters into a single document, renders it, recovers the
//! outline, and builds the title and contents pages in front of the body.
//! For e-readers it splits oversized chapters.
//!
//! Every step reports to the registered watchers. When the assembler is
//! dropped the watchers hear [`FINISHED_MESSAGE`] and the working directory
//! is cleaned up.

mod workdir;

pub use workdir::WorkDir;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::book::Book;
use crate::config::{Config, FINISHED_MESSAGE, TextDirection};
use crate::dom::serialize::escape_text;
use crate::dom::{self, ArenaDom, ArenaNodeId, document_to_html, parse_html};
use crate::error::{Error, Result};
use crate::geometry::{PageGeometry, RenderOptions, ReshapeOptions};
use crate::outline::{Outline, OutlineExtractor};
use crate::pdf::{PdfMaker, concat_pdfs, rotate_pdf};
use crate::split::split_html;
use crate::toc::{NumberLocaliser, reconcile, walk_toc_mut};
use crate::tools::ToolRunner;
use crate::util;

/// Stand-in for a chapter that could not be read.
const PLACEHOLDER_CHAPTER: &str = "<html><body></body></html>";

/// First elements of a chapter body that can carry its anchor.
const ANCHOR_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "p", "div"];

/// Chapter openings whose text is the chapter's real title.
const TITLE_TAGS: &[&str] = &["h1", "h2", "h3"];

/// A progress callback. Receives the name of each finished stage.
pub type Watcher = Box<dyn Fn(&str)>;

/// One file of the e-reader edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFile {
    pub id: String,
    pub url: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

/// Manifest files ready for an e-reader package.
#[derive(Debug, Clone, Default)]
pub struct EreaderChapters {
    pub files: Vec<ChapterFile>,
    /// The book's spine with split chapters expanded in place.
    pub spine: Vec<String>,
    /// Original chapter url to the url of its first part.
    pub renamed: BTreeMap<String, String>,
}

/// Drives one book through the pipeline.
pub struct BookAssembler<'a, R: ToolRunner> {
    config: &'a Config,
    book: Book,
    runner: R,
    geometry: PageGeometry,
    workdir: WorkDir,
    watchers: Vec<Watcher>,
    cookie: String,
    dir: TextDirection,
    page_number_style: String,
    title: String,
    toc_header: String,
    document: Option<ArenaDom>,
    outline: Option<Outline>,
    started: Instant,
    renderer_ready: bool,
}

impl<'a, R: ToolRunner> BookAssembler<'a, R> {
    /// Set up a job for `book`, with a fresh working directory.
    pub fn new(config: &'a Config, book: Book, geometry: PageGeometry, runner: R) -> Result<Self> {
        log::info!("*** Starting new book {} ***", book.name);
        let workdir = WorkDir::new(&book.name, config.keep_temp_files)?;
        let dir = book.dir().unwrap_or(config.default_dir);
        let page_number_style = config.page_number_style(book.language(), book.dir());
        let title = book.title();
        let toc_header = book
            .toc_header()
            .unwrap_or(&config.toc_header)
            .to_string();

        Ok(Self {
            config,
            book,
            runner,
            geometry,
            workdir,
            watchers: Vec::new(),
            cookie: util::cookie(10),
            dir,
            page_number_style,
            title,
            toc_header,
            document: None,
            outline: None,
            started: Instant::now(),
            renderer_ready: false,
        })
    }

    pub fn add_watcher(&mut self, watcher: impl Fn(&str) + 'static) {
        self.watchers.push(Box::new(watcher));
    }

    pub fn notify_watcher(&self, message: &str) {
        log::debug!("notify_watcher called with '{message}'");
        for watcher in &self.watchers {
            watcher(message);
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn dir(&self) -> TextDirection {
        self.dir
    }

    pub fn page_number_style(&self) -> &str {
        &self.page_number_style
    }

    /// The joined document, once [`load_book`](Self::load_book) has run.
    pub fn document(&self) -> Option<&ArenaDom> {
        self.document.as_ref()
    }

    /// The body's outline, once [`make_body_pdf`](Self::make_body_pdf)
    /// has run.
    pub fn outline(&self) -> Option<&Outline> {
        self.outline.as_ref()
    }

    fn require_document(&self) -> Result<&ArenaDom> {
        self.document
            .as_ref()
            .ok_or_else(|| Error::InvalidBook("chapters have not been joined".to_string()))
    }

    /// Join the chapters and mark the first `h1`.
    pub fn load_book(&mut self) -> Result<()> {
        let mut doc = self.concat_html();
        if let Some(h1) = doc.find_by_tag("h1") {
            doc.set_attr(h1, "class", "first-heading");
        }
        self.workdir.save("raw.html", document_to_html(&doc))?;
        self.document = Some(doc);
        self.notify_watcher("load_book");
        Ok(())
    }

    /// Join every spine chapter into one document, anchoring each TOC
    /// point to an element id in the result.
    ///
    /// A point whose url has a fragment keeps it. Otherwise the chapter's
    /// opening heading, paragraph or div (looking through wrapper divs) is
    /// used, taking an id if it lacks one; failing that a hidden marker is
    /// put at the top of the chapter. An opening `h1`-`h3` also supplies
    /// the point's rendered title.
    pub fn concat_html(&mut self) -> ArenaDom {
        let dir = self.dir.as_str();
        let mut doc = parse_html(
            format!("<html dir=\"{dir}\"><head></head><body dir=\"{dir}\"></body></html>").as_bytes(),
        );
        let doc_body = dom::body(&mut doc);

        let spine = self.book.info.spine.clone();
        for id in &spine {
            let Some(item) = self.book.manifest_item(id) else {
                log::warn!("spine item {id} is not in the manifest");
                continue;
            };
            let url = item.url.clone();
            let mut chapter = load_chapter(&self.book, &url);
            let chapter_body = dom::body(&mut chapter);
            let cookie = &self.cookie;

            walk_toc_mut(self.book.toc_mut(), &mut |point| {
                if point.filename != url {
                    return;
                }
                let fragment = match &point.fragment {
                    Some(fragment) => fragment.clone(),
                    None => {
                        let (fragment, html_title) =
                            anchor_chapter(&mut chapter, chapter_body, &format!("{cookie}_{}", point.index));
                        if html_title.is_some() {
                            point.html_title = html_title;
                        }
                        fragment
                    }
                };
                point.html_id = Some(fragment);
            });

            let children: Vec<ArenaNodeId> = chapter.children(chapter_body).collect();
            for child in children {
                let copy = doc.import(&chapter, child);
                doc.append(doc_body, copy);
            }
        }
        doc
    }

    /// Put a title page before each top-level TOC point that has chapters,
    /// and number the chapters.
    pub fn add_section_titles(&mut self) -> Result<()> {
        let localiser = NumberLocaliser::new(self.config, &self.page_number_style);
        let Some(doc) = self.document.as_mut() else {
            return Err(Error::InvalidBook("chapters have not been joined".to_string()));
        };
        let mut chapter = 1;
        let mut section_n = 1;

        for point in self.book.toc().iter().filter(|p| p.has_children()) {
            let section_id = format!("section-{section_n}");
            section_n += 1;
            let section = doc.create_html_element(
                "div",
                &[("class", "objavi-subsection"), ("id", &section_id)],
            );
            let heading = doc.create_html_element("div", &[("class", "objavi-subsection-heading")]);
            doc.append_text(heading, point.declared_title());
            doc.append(section, heading);

            for child in &point.children {
                let item = doc.create_html_element("div", &[("class", "objavi-chapter")]);
                match &child.html_title {
                    Some(html_title) => {
                        doc.append_text(item, html_title);
                        if let Some(heading) = child.html_id.as_deref().and_then(|id| doc.get_by_id(id)) {
                            add_initial_number(doc, heading, chapter, localiser);
                        }
                    }
                    None => doc.append_text(item, child.declared_title()),
                }
                add_initial_number(doc, item, chapter, localiser);
                doc.append(section, item);
                chapter += 1;
            }

            let Some(mut location) = point.html_id.as_deref().and_then(|id| doc.get_by_id(id)) else {
                log::warn!("no anchor for section {:?}; leaving out its title page", point.title);
                continue;
            };
            if let Some(container) = doc.parent(location)
                && doc.is_element_named(container, "div")
                && doc.first_element_child(container) == Some(location)
            {
                location = container;
            }
            doc.insert_before(location, section);
        }

        self.notify_watcher("add_section_titles");
        Ok(())
    }

    /// Hold the first render back until the display backend has had its
    /// configured start-up time.
    fn wait_for_renderer(&mut self) {
        if self.renderer_ready {
            return;
        }
        let ready_at = self.started + Duration::from_millis(self.config.renderer_startup_delay_ms);
        let now = Instant::now();
        if ready_at > now {
            thread::sleep(ready_at - now);
            self.notify_watcher("wait_for_renderer");
        }
        self.renderer_ready = true;
    }

    fn maker(&self) -> PdfMaker<'_, R> {
        PdfMaker::new(self.config, self.geometry.clone(), &self.runner)
    }

    fn reshape_options(&self) -> ReshapeOptions {
        ReshapeOptions {
            dir: self.dir,
            ..Default::default()
        }
    }

    /// Render the joined document, recover its outline, shift the gutters,
    /// pad to an even page count and number the pages.
    pub fn make_body_pdf(&mut self) -> Result<PathBuf> {
        self.wait_for_renderer();
        let doc = self.require_document()?;
        let html_file = self.workdir.save("body.html", document_to_html(doc))?;
        let pdf_file = self.workdir.file("body.pdf");
        let outline_file = self.workdir.file("outline.xml");

        let maker = self.maker();
        maker.make_raw_pdf(
            &html_file,
            &pdf_file,
            &RenderOptions {
                outline: true,
                outline_file: Some(outline_file.as_path()),
                page_numbers: self.page_number_style != "none",
                ..Default::default()
            },
        )?;
        self.notify_watcher("generate_pdf");

        let outline = OutlineExtractor::new(&maker, self.workdir.path()).extract(doc, &pdf_file, &outline_file)?;
        log::info!(
            "found {} pages in pdf, {} outline entries ({:?})",
            outline.page_count,
            outline.entries.len(),
            outline.tier
        );

        maker.reshape_pdf(
            &pdf_file,
            &ReshapeOptions {
                centre_end: true,
                ..self.reshape_options()
            },
        )?;
        self.notify_watcher("reshape_pdf");

        maker.number_pdf(
            &pdf_file,
            Some(outline.page_count),
            &self.page_number_style,
            self.dir,
            1,
        )?;
        self.notify_watcher("number_pdf");

        self.outline = Some(outline);
        self.notify_watcher("make_body_pdf");
        Ok(pdf_file)
    }

    /// The printed contents table. Needs the body's outline for page
    /// numbers.
    pub fn make_contents(&self) -> Result<String> {
        let outline = self
            .outline
            .as_ref()
            .ok_or_else(|| Error::Outline("the body has not been rendered".to_string()))?;
        let localiser = NumberLocaliser::new(self.config, &self.page_number_style);
        let table = reconcile(self.book.toc(), &outline.entries, localiser);
        log::debug!(
            "contents: {} sections, {} chapters",
            table.section_count(),
            table.chapter_count()
        );
        self.notify_watcher("make_contents");
        Ok(table.to_html())
    }

    /// Title page and contents, as a separate PDF.
    pub fn make_preamble_pdf(&mut self) -> Result<PathBuf> {
        self.wait_for_renderer();
        let contents = self.make_contents()?;
        let title = escape_text(&self.title);
        let html = format!(
            "<html dir=\"{dir}\"><head>\n\
             <meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\" />\n\
             </head>\n<body>\n\
             <h1 class=\"frontpage\">{title}</h1>\n\
             <div class=\"contents\"><h1>{header}</h1>\n{contents}</div>\n\
             <div style=\"page-break-after: always; color:#fff\" class=\"unseen\">.\
             <!--{title}--></div></body></html>",
            dir = self.dir.as_str(),
            header = escape_text(&self.toc_header),
        );
        let html_file = self.workdir.save("preamble.html", html)?;
        let pdf_file = self.workdir.file("preamble.pdf");

        let maker = self.maker();
        maker.make_raw_pdf(&html_file, &pdf_file, &RenderOptions::default())?;
        maker.reshape_pdf(
            &pdf_file,
            &ReshapeOptions {
                centre_start: true,
                ..self.reshape_options()
            },
        )?;
        // the title page and its blank verso come before page one
        maker.number_pdf(
            &pdf_file,
            None,
            &self.config.preamble_page_number_style,
            self.dir,
            -2,
        )?;
        self.notify_watcher("make_preamble_pdf");
        Ok(pdf_file)
    }

    /// Body, then preamble, joined preamble first into `final.pdf`.
    pub fn make_book_pdf(&mut self) -> Result<PathBuf> {
        self.wait_for_renderer();
        let body = self.make_body_pdf()?;
        let preamble = self.make_preamble_pdf()?;
        let pdf_file = self.workdir.file("final.pdf");
        concat_pdfs(
            &self.runner,
            self.config,
            &pdf_file,
            &[Some(preamble.as_path()), Some(body.as_path())],
        )?;
        self.notify_watcher("concatenated_pdfs");
        Ok(pdf_file)
    }

    /// Turn `final.pdf` upside down, keeping the upright copy as
    /// `final-pre-rotate.pdf`.
    pub fn rotate180(&self) -> Result<()> {
        let pdf_file = self.workdir.file("final.pdf");
        let rotated = self.workdir.file("final-rotate.pdf");
        let unrotated = self.workdir.file("final-pre-rotate.pdf");
        rotate_pdf(&self.runner, self.config, &pdf_file, &rotated)?;
        fs::rename(&pdf_file, &unrotated)?;
        fs::rename(&rotated, &pdf_file)?;
        self.notify_watcher("rotate180");
        Ok(())
    }

    /// Copy the finished PDF out of the working directory.
    pub fn publish_pdf(&self, destination: &Path) -> Result<()> {
        let pdf_file = self.workdir.file("final.pdf");
        log::info!("Publishing {} as {}", pdf_file.display(), destination.display());
        fs::copy(&pdf_file, destination)?;
        self.notify_watcher("publish_pdf");
        Ok(())
    }

    /// The whole print pipeline, ending with the PDF at `destination`.
    pub fn make_pdf(&mut self, destination: &Path, rotate: bool) -> Result<()> {
        if self.document.is_none() {
            self.load_book()?;
        }
        self.add_section_titles()?;
        self.make_book_pdf()?;
        if rotate {
            self.rotate180()?;
        }
        self.publish_pdf(destination)
    }

    /// Every manifest file, with HTML chapters split to fit e-readers.
    ///
    /// The first part of a chapter becomes `<base>.xhtml`; further parts
    /// are `<base>_split_<n>.xhtml` with ids `<id>_split_<n>`, following
    /// the first in the spine.
    pub fn make_ereader_chapters(&self) -> Result<EreaderChapters> {
        let mut chapters = EreaderChapters::default();
        let mut expanded: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for (id, item) in &self.book.info.manifest {
            let data = self.book.read(&item.url);
            if !item.is_html() {
                match data {
                    Some(data) => chapters.files.push(ChapterFile {
                        id: id.clone(),
                        url: item.url.clone(),
                        mimetype: item.mimetype.clone(),
                        data: data.to_vec(),
                    }),
                    None => log::warn!("manifest file {} is missing; leaving it out", item.url),
                }
                continue;
            }

            let html = match data {
                Some(data) => util::decode_text(data, util::extract_xml_encoding(data)),
                None => {
                    log::warn!("chapter {} is missing; using a placeholder", item.url);
                    PLACEHOLDER_CHAPTER.into()
                }
            };
            let parts = split_html(&html, self.book.compressed_size(&item.url), self.config)?;
            let base = item.url.strip_suffix(".html").unwrap_or(&item.url);
            let first_url = format!("{base}.xhtml");
            chapters.renamed.insert(item.url.clone(), first_url.clone());

            let mut ids = Vec::with_capacity(parts.len());
            for (n, part) in parts.into_iter().enumerate() {
                let (part_id, url) = match n {
                    0 => (id.clone(), first_url.clone()),
                    n => (format!("{id}_split_{n}"), format!("{base}_split_{n}.xhtml")),
                };
                ids.push(part_id.clone());
                chapters.files.push(ChapterFile {
                    id: part_id,
                    url,
                    mimetype: "application/xhtml+xml".to_string(),
                    data: part.into_bytes(),
                });
            }
            if ids.len() > 1 {
                log::info!("{} split into {} parts", item.url, ids.len());
            }
            expanded.insert(id.as_str(), ids);
        }

        for id in &self.book.info.spine {
            match expanded.get(id.as_str()) {
                Some(ids) => chapters.spine.extend(ids.iter().cloned()),
                None => chapters.spine.push(id.clone()),
            }
        }
        self.notify_watcher("make_ereader_chapters");
        Ok(chapters)
    }
}

impl<R: ToolRunner> Drop for BookAssembler<'_, R> {
    fn drop(&mut self) {
        self.notify_watcher(FINISHED_MESSAGE);
    }
}

/// Parse a chapter, or an empty placeholder if it is missing or blank.
fn load_chapter(book: &Book, url: &str) -> ArenaDom {
    match book.read(url) {
        Some(data) if !data.iter().all(u8::is_ascii_whitespace) => {
            let text = util::decode_text(data, util::extract_xml_encoding(data));
            parse_html(text.as_bytes())
        }
        _ => {
            log::warn!("chapter {url} is missing or empty; using a placeholder");
            parse_html(PLACEHOLDER_CHAPTER.as_bytes())
        }
    }
}

/// Find or make the element a chapter's TOC point links to. Returns its id
/// and, if the chapter opens with a heading, the heading's text.
fn anchor_chapter(chapter: &mut ArenaDom, body: ArenaNodeId, fragment: &str) -> (String, Option<String>) {
    let Some(mut first) = chapter
        .first_element_child(body)
        .filter(|&e| opens_chapter(chapter, e))
    else {
        let marker = chapter.create_html_element("div", &[("style", "display:none"), ("id", fragment)]);
        chapter.prepend(body, marker);
        return (fragment.to_string(), None);
    };

    // look through wrapper divs for the real beginning
    while chapter.is_element_named(first, "div") {
        match chapter.first_element_child(first).filter(|&e| opens_chapter(chapter, e)) {
            Some(inner) => first = inner,
            None => break,
        }
    }

    let id = match chapter.element_id(first) {
        Some(existing) => existing.to_string(),
        None => {
            chapter.set_attr(first, "id", fragment);
            fragment.to_string()
        }
    };
    let html_title = TITLE_TAGS
        .iter()
        .any(|tag| chapter.is_element_named(first, tag))
        .then(|| chapter.collect_text(first));
    (id, html_title)
}

fn opens_chapter(doc: &ArenaDom, node: ArenaNodeId) -> bool {
    ANCHOR_TAGS.iter().any(|tag| doc.is_element_named(node, tag))
}

/// Put a styled chapter number at the start of `element`.
fn add_initial_number(doc: &mut ArenaDom, element: ArenaNodeId, n: u32, localiser: NumberLocaliser) {
    let initial = doc.create_html_element("strong", &[("class", "initial")]);
    doc.append_text(initial, &format!("{}.", localiser.localise(n)));
    let space = doc.create_text(" ".to_string());
    doc.prepend(element, space);
    doc.prepend(element, initial);
}
