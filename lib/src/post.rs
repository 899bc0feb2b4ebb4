//! Metadata extraction for posts.
//!
//! A post's filename carries its timestamp and slug, `YYYY-MM-DD-HHMM-slug.md`,
//! and its first two lines carry the header:
//!
//! ```text
//! # Hello World
//! # tag-b, tag-a
//! Body text starts on the third line.
//! ```

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, ErrorKind, PostError, Result};
use crate::value::{Dict, Value};
use crate::dict;

static FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})-([0-9]{2})([0-9]{2})-([a-z0-9-]+)$")
        .expect("filename pattern is valid")
});

/// A tag and the URL of its listing page. Tags compare by name only.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: Arc<str>,
    pub url: Arc<str>,
}

impl Tag {
    pub fn new(name: &str, base_url: &str) -> Tag {
        Tag {
            name: name.into(),
            url: format!("{base_url}tags/{name}").into(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag { }

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl From<&Tag> for Value {
    fn from(tag: &Tag) -> Value {
        Value::from(dict! {
            "name" => tag.name.clone(),
            "url" => tag.url.clone(),
        })
    }
}

/// Timestamp and slug decoded from a post's filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedName {
    pub timestamp: NaiveDateTime,
    pub slug: String,
}

/// The two header lines of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub tags: Vec<Tag>,
}

/// Everything extracted from one post.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub title: String,
    pub tags: Vec<Tag>,
    pub timestamp: NaiveDateTime,
    pub slug: String,
    /// The markdown following the header.
    pub body: String,
}

fn post_error(kind: PostError, message: &str, path: &Path) -> Error {
    error! {
        message,
        "path" => path.display(),
    }.with_kind(ErrorKind::Post(kind))
}

/// Decodes `YYYY-MM-DD-HHMM-slug` from `path`'s file stem.
///
/// Hours above 23 and minutes above 59 are clamped rather than rejected, so
/// `2023-01-01-2575-x` is 23:59. A date that does not exist on the calendar
/// is rejected.
pub fn extract_date(path: &Path) -> Result<DatedName> {
    let invalid = || post_error(PostError::InvalidFilename, "invalid post filename", path);
    let stem = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(invalid)?;

    let captures = FILENAME.captures(stem).ok_or_else(invalid)?;
    let field = |i: usize| captures[i].parse::<u32>().map_err(|_| invalid());
    let year = captures[1].parse::<i32>().map_err(|_| invalid())?;
    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute) = (field(4)?.min(23), field(5)?.min(59));

    let timestamp = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(invalid)?;

    Ok(DatedName { timestamp, slug: captures[6].to_string() })
}

/// Parses the two header lines at the start of `text`, returning the header
/// and the remaining body (from the third line on).
pub fn extract_header<'a>(path: &Path, text: &'a str, base_url: &str) -> Result<(Header, &'a str)> {
    let invalid = || post_error(PostError::InvalidHeader, "invalid post header", path);

    let mut lines = text.splitn(3, '\n');
    let title_line = lines.next().ok_or_else(invalid)?;
    let tags_line = lines.next().ok_or_else(invalid)?;
    let body = lines.next().unwrap_or("");

    let title = title_line.trim_end_matches('\r')
        .strip_prefix('#')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .ok_or_else(invalid)?;

    let tag_list = tags_line.trim_end_matches('\r')
        .strip_prefix('#')
        .ok_or_else(invalid)?;

    let mut names: Vec<&str> = tag_list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    names.sort_unstable();
    names.dedup();

    let tags = names.into_iter().map(|name| Tag::new(name, base_url)).collect();
    Ok((Header { title: title.to_string(), tags }, body))
}

/// Extracts the metadata of the post at `path` with contents `text`.
pub fn extract(path: &Path, text: &str, base_url: &str) -> Result<Extracted> {
    let DatedName { timestamp, slug } = extract_date(path)?;
    let (Header { title, tags }, body) = extract_header(path, text, base_url)?;
    Ok(Extracted { title, tags, timestamp, slug, body: body.to_string() })
}

/// Formats a timestamp the way it is bound for templates.
pub fn timestamp_value(timestamp: &NaiveDateTime) -> Value {
    Value::from(timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl Extracted {
    /// Bindings describing this post for its content template.
    pub fn locals(&self) -> Dict {
        dict! {
            "title" => self.title.as_str(),
            "slug" => self.slug.as_str(),
            "date" => timestamp_value(&self.timestamp),
            "tags" => self.tags.iter().map(Value::from).collect::<Value>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const BASE: &str = "https://example.com/";

    fn date(name: &str) -> Result<DatedName> {
        extract_date(Path::new(name))
    }

    #[test]
    fn filename_fields_are_exact() {
        let dated = date("posts/2024-03-10-1530-hello-world.md").unwrap();
        let ts = dated.timestamp;
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 10));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (15, 30, 0));
        assert_eq!(dated.slug, "hello-world");
    }

    #[test]
    fn out_of_range_time_is_clamped() {
        let ts = date("2023-01-01-2575-x.md").unwrap().timestamp;
        assert_eq!((ts.hour(), ts.minute()), (23, 59));

        let ts = date("2023-01-01-0099-x.md").unwrap().timestamp;
        assert_eq!((ts.hour(), ts.minute()), (0, 59));
    }

    #[test]
    fn malformed_filenames_are_rejected() {
        let bad = [
            "hello-world.md",
            "2024-03-10-hello.md",
            "2024-3-10-1530-hello.md",
            "2024-03-10-1530-Hello.md",
            "2024-03-10-1530-.md",
            "2024-03-10-1530-hello_world.md",
            "24-03-10-1530-hello.md",
            "2024-13-10-1530-hello.md",
            "2024-02-30-1530-hello.md",
        ];

        for name in bad {
            let error = date(name).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Post(PostError::InvalidFilename), "{name}");
            assert_eq!(error.context_value("path").as_deref(), Some(name));
        }
    }

    #[test]
    fn header_tags_sorted_trimmed_and_linked() {
        let path = Path::new("p.md");
        let (header, body) = extract_header(path, "# Hello World \n# tag-b, tag-a, ,tag-b\nBody", BASE).unwrap();

        assert_eq!(header.title, "Hello World");
        let names: Vec<_> = header.tags.iter().map(|t| &*t.name).collect();
        assert_eq!(names, ["tag-a", "tag-b"]);
        assert_eq!(&*header.tags[0].url, "https://example.com/tags/tag-a");
        assert_eq!(body, "Body");
    }

    #[test]
    fn header_allows_no_tags_and_no_body() {
        let (header, body) = extract_header(Path::new("p.md"), "#Title\n#", BASE).unwrap();
        assert_eq!(header.title, "Title");
        assert!(header.tags.is_empty());
        assert_eq!(body, "");
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let bad = [
            "",
            "Title\n# tag",
            "# Title",
            "# Title\ntag-a, tag-b\nbody",
            "#   \n# tag",
        ];

        for text in bad {
            let error = extract_header(Path::new("p.md"), text, BASE).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Post(PostError::InvalidHeader), "{text:?}");
        }
    }

    #[test]
    fn extract_combines_filename_and_header() {
        let path = Path::new("posts/2024-03-10-1530-hello-world.md");
        let post = extract(path, "# Hello World\n# tag-b, tag-a\nBody text.", BASE).unwrap();

        assert_eq!(post.title, "Hello World");
        assert_eq!(post.tags, vec![Tag::new("tag-a", BASE), Tag::new("tag-b", BASE)]);
        assert_eq!(post.timestamp.to_string(), "2024-03-10 15:30:00");
        assert_eq!(post.body, "Body text.");
    }

    #[test]
    fn filename_is_checked_before_header() {
        let error = extract(Path::new("bad.md"), "no header", BASE).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Post(PostError::InvalidFilename));
    }
}
