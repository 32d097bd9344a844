//! Error types for folio operations.

use thiserror::Error;

/// Errors that can occur while laying out or assembling a book.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested page does not fit on any supported sheet.
    #[error("page sized {width_mm:.2}mm x {height_mm:.2}mm won't fit on any paper")]
    PaperSize { width_mm: f64, height_mm: f64 },

    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// An external tool ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// An external tool produced output that could not be understood.
    #[error("unreadable output from `{command}`: {message}")]
    ToolOutput { command: String, message: String },

    #[error("Invalid book: {0}")]
    InvalidBook(String),

    #[error("Invalid outline: {0}")]
    Outline(String),
}

pub type Result<T> = std::result::Result<T, Error>;
