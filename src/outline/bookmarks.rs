//! Flat bookmark records from `pdftk dump_data`.
//!
//! The dump is a line stream of `Key: value` pairs. A few uninteresting
//! keys come first, then `NumberOfPages`, then one
//! `BookmarkTitle`/`BookmarkLevel`/`BookmarkPageNumber` triple per
//! bookmark, interleaved with other records we skip.

use super::OutlineEntry;
use crate::util::strip_whitespace_and_null;

/// What a dump yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkDump {
    /// `NumberOfPages`, if the dump had one.
    pub page_count: Option<u32>,
    pub entries: Vec<OutlineEntry>,
}

/// One step of the forward-only record reader.
#[derive(Debug, PartialEq, Eq)]
enum Field<'a> {
    /// The line carried the expected key.
    Value(&'a str),
    /// The line was some other record (or not a record at all).
    Other,
    /// No more lines.
    End,
}

struct Records<'a, I: Iterator<Item = &'a str>> {
    lines: I,
}

impl<'a, I: Iterator<Item = &'a str>> Records<'a, I> {
    /// Consume one line, returning its value if the key is `expected`.
    fn next_field(&mut self, expected: &str) -> Field<'a> {
        let Some(line) = self.lines.next() else {
            return Field::End;
        };
        match line.split_once(':') {
            Some((key, value)) if key == expected => Field::Value(value),
            Some(_) => Field::Other,
            None => {
                log::debug!("trouble with line {line:?}");
                Field::Other
            }
        }
    }
}

fn parse_number(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Parse a dump, keeping bookmarks whose level is at most `level_threshold`.
pub fn parse_bookmark_dump(dump: &str, level_threshold: u32) -> BookmarkDump {
    let mut records = Records {
        lines: dump.lines().map(str::trim).filter(|l| !l.is_empty()),
    };
    let mut result = BookmarkDump::default();

    loop {
        match records.next_field("NumberOfPages") {
            Field::Value(v) => {
                result.page_count = parse_number(v);
                if result.page_count.is_some() {
                    break;
                }
            }
            Field::Other => {}
            Field::End => return result,
        }
    }

    loop {
        let title = match records.next_field("BookmarkTitle") {
            Field::Value(v) => strip_whitespace_and_null(v).to_string(),
            Field::Other => continue,
            Field::End => break,
        };
        let level = match records.next_field("BookmarkLevel") {
            Field::Value(v) => parse_number(v),
            Field::Other => None,
            Field::End => break,
        };
        let page = match records.next_field("BookmarkPageNumber") {
            Field::Value(v) => parse_number(v),
            Field::Other => None,
            Field::End => break,
        };
        if let (Some(depth), Some(page)) = (level, page)
            && depth <= level_threshold
        {
            result.entries.push(OutlineEntry { title, depth, page });
        }
    }

    result
}
