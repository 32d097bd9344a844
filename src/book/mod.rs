//! A book as delivered in a booki zip: chapter files plus `info.json`
//! carrying the manifest, spine, table of contents and metadata.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::config::TextDirection;
use crate::error::{Error, Result};
use crate::toc::{TocPoint, annotate_toc};

/// Dublin Core metadata namespace.
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
/// Namespace for the book platform's own metadata (`dir`, `toc_header`).
pub const FM: &str = "http://booki.cc/";

const INFO_FILE: &str = "info.json";
const VITAL_KEYS: &[&str] = &["manifest", "metadata", "spine", "TOC"];

/// A file listed in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub url: String,
    #[serde(default)]
    pub mimetype: String,
}

impl ManifestItem {
    pub fn is_html(&self) -> bool {
        self.mimetype == "text/html" || self.mimetype == "application/xhtml+xml"
    }
}

/// Metadata values by namespace, key and scheme:
/// `{"http://purl.org/dc/elements/1.1/": {"title": {"": ["A Book"]}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>);

impl Metadata {
    pub fn get(&self, ns: &str, key: &str, scheme: &str) -> &[String] {
        self.0
            .get(ns)
            .and_then(|keys| keys.get(key))
            .and_then(|schemes| schemes.get(scheme))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First non-empty value, if any.
    pub fn first(&self, ns: &str, key: &str) -> Option<&str> {
        self.get(ns, key, "")
            .first()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Add a value unless it is already present.
    pub fn add(&mut self, ns: &str, key: &str, scheme: &str, value: &str) {
        let values = self
            .0
            .entry(ns.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .entry(scheme.to_string())
            .or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
}

/// Contents of `info.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub manifest: BTreeMap<String, ManifestItem>,
    pub spine: Vec<String>,
    #[serde(rename = "TOC")]
    pub toc: Vec<TocPoint>,
    pub metadata: Metadata,
}

impl BookInfo {
    /// Parse `info.json`, insisting on the manifest, metadata, spine and
    /// TOC keys.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        for key in VITAL_KEYS {
            if value.get(key).is_none() {
                return Err(Error::InvalidBook(format!(
                    "info.json lacks vital element \"{key}\""
                )));
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone)]
struct BookFile {
    data: Vec<u8>,
    compressed_size: Option<usize>,
}

/// A loaded book. The table of contents is annotated on load.
#[derive(Debug, Clone)]
pub struct Book {
    pub name: String,
    pub info: BookInfo,
    files: HashMap<String, BookFile>,
}

impl Book {
    /// Open a booki zip from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string());
        Self::from_zip(name, File::open(path)?)
    }

    pub fn from_zip_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        Self::from_zip(name.into(), Cursor::new(bytes))
    }

    fn from_zip<R: Read + Seek>(name: String, reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            files.insert(
                file.name().to_string(),
                BookFile {
                    data,
                    compressed_size: Some(file.compressed_size() as usize),
                },
            );
        }

        let info_data = files
            .get(INFO_FILE)
            .ok_or_else(|| Error::InvalidBook(format!("{name} has no {INFO_FILE}")))?;
        let info = BookInfo::from_json(&info_data.data)?;
        log::debug!("{name}: {} files, {} spine items", files.len(), info.spine.len());
        Ok(Self::assemble(name, info, files))
    }

    /// Build a book from an already-parsed info block and raw files.
    pub fn from_parts<I, S>(name: impl Into<String>, info: BookInfo, files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(name, data)| {
                (
                    name.into(),
                    BookFile {
                        data,
                        compressed_size: None,
                    },
                )
            })
            .collect();
        Self::assemble(name.into(), info, files)
    }

    fn assemble(name: String, mut info: BookInfo, files: HashMap<String, BookFile>) -> Self {
        annotate_toc(&mut info.toc);
        Self { name, info, files }
    }

    pub fn read(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|f| f.data.as_slice())
    }

    /// Size of the file inside the zip, when the book came from one.
    pub fn compressed_size(&self, name: &str) -> Option<usize> {
        self.files.get(name).and_then(|f| f.compressed_size)
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.info.manifest.get(id)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.info.metadata
    }

    pub fn toc(&self) -> &[TocPoint] {
        &self.info.toc
    }

    pub fn toc_mut(&mut self) -> &mut Vec<TocPoint> {
        &mut self.info.toc
    }

    pub fn title(&self) -> String {
        self.info
            .metadata
            .first(DC, "title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("A Book About {}", self.name))
    }

    pub fn language(&self) -> Option<&str> {
        self.info.metadata.first(DC, "language")
    }

    pub fn dir(&self) -> Option<TextDirection> {
        self.info
            .metadata
            .first(FM, "dir")
            .and_then(TextDirection::parse)
    }

    pub fn toc_header(&self) -> Option<&str> {
        self.info.metadata.first(FM, "toc_header")
    }
}
