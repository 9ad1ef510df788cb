//! YAML metadata headers.
//!
//! A document may open with a header fenced by `---` lines:
//!
//! ```markdown
//! ---
//! title: Fourier series
//! pubDate: 2024-01-02
//! tags: [math, analysis]
//! ---
//!
//! Body text.
//! ```
//!
//! Only the keys of [`Header`] are read; anything else is ignored.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Why a header could not be split or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    Unterminated,
    Yaml(String),
    Date { field: &'static str, value: String },
}

/// The metadata keys Folio understands.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Header {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "date")]
    pub pub_date: Option<String>,
    pub updated_date: Option<String>,
    pub author: Option<String>,
    pub tags: Option<TagList>,
    pub draft: bool,
    pub featured: bool,
    pub hero_image: Option<String>,
}

/// `tags: rust` and `tags: [rust, wasm]` are both accepted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TagList {
    One(TagLabel),
    Many(Vec<TagLabel>),
}

/// One tag as written. YAML reads `2024` or `true` as a number or a bool;
/// those keep their text. An empty item (`~`) is an empty label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLabel(pub String);

impl<'de> Deserialize<'de> for TagLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelVisitor;

        impl Visitor<'_> for LabelVisitor {
            type Value = TagLabel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tag label")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TagLabel, E> {
                Ok(TagLabel(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TagLabel, E> {
                Ok(TagLabel(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TagLabel, E> {
                Ok(TagLabel(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TagLabel, E> {
                Ok(TagLabel(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<TagLabel, E> {
                Ok(TagLabel(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<TagLabel, E> {
                Ok(TagLabel(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<TagLabel, E> {
                Ok(TagLabel(String::new()))
            }
        }

        deserializer.deserialize_any(LabelVisitor)
    }
}

impl TagList {
    /// Trimmed, non-blank labels in first-seen order, without repeats.
    pub fn normalized(&self) -> Vec<String> {
        let raw: &[TagLabel] = match self {
            TagList::One(tag) => std::slice::from_ref(tag),
            TagList::Many(tags) => tags,
        };

        let mut tags: Vec<String> = Vec::with_capacity(raw.len());
        for TagLabel(tag) in raw {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }
}

/// Split `source` into its raw YAML header (if any) and the body.
pub fn split(source: &str) -> Result<(Option<&str>, &str), HeaderError> {
    let Some(rest) = strip_delimiter_line(source, "---") else {
        return Ok((None, source));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" || trimmed == "..." {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(header), body));
        }
        offset += line.len();
    }

    Err(HeaderError::Unterminated)
}

/// Decode a raw header into a [`Header`].
pub fn parse_header(raw: &str) -> Result<Header, HeaderError> {
    if raw.trim().is_empty() {
        return Ok(Header::default());
    }

    serde_yaml::from_str(raw).map_err(|e| HeaderError::Yaml(e.to_string()))
}

/// Parse a header date. Accepts RFC 3339 and the usual `YYYY-MM-DD[ HH:MM[:SS]]`
/// shapes; a bare date means midnight.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDateTime, HeaderError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| HeaderError::Date {
            field,
            value: value.to_string(),
        })
}

fn strip_delimiter_line<'a>(source: &'a str, delimiter: &str) -> Option<&'a str> {
    let rest = source.strip_prefix(delimiter)?;
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_header() {
        let (header, body) = split("---\ntitle: Hi\n---\n\nBody\n").unwrap();
        assert_eq!(header, Some("title: Hi\n"));
        assert_eq!(body, "\nBody\n");
    }

    #[test]
    fn test_split_without_header() {
        let (header, body) = split("# Heading\n---\n").unwrap();
        assert_eq!(header, None);
        assert_eq!(body, "# Heading\n---\n");
    }

    #[test]
    fn test_split_crlf() {
        let (header, body) = split("---\r\ntitle: Hi\r\n---\r\nBody").unwrap();
        assert_eq!(header, Some("title: Hi\r\n"));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_split_empty_header() {
        let (header, body) = split("---\n---\nBody").unwrap();
        assert_eq!(header, Some(""));
        assert_eq!(body, "Body");
        assert_eq!(parse_header("").unwrap(), Header::default());
    }

    #[test]
    fn test_split_unterminated() {
        assert_eq!(split("---\ntitle: Hi\n\nBody"), Err(HeaderError::Unterminated));
    }

    #[test]
    fn test_horizontal_rule_is_not_a_header() {
        let (header, _) = split("----\ntext").unwrap();
        assert_eq!(header, None);
    }

    #[test]
    fn test_parse_header_fields() {
        let header = parse_header(
            "title: Notes on groups\npubDate: 2024-01-02\ntags: [algebra, algebra, ' groups ', '']\ndraft: true\nheroImage: /img/a.png\nlayout: ignored\n",
        )
        .unwrap();

        assert_eq!(header.title.as_deref(), Some("Notes on groups"));
        assert_eq!(header.pub_date.as_deref(), Some("2024-01-02"));
        assert!(header.draft);
        assert_eq!(header.hero_image.as_deref(), Some("/img/a.png"));
        assert_eq!(header.tags.unwrap().normalized(), vec!["algebra", "groups"]);
    }

    #[test]
    fn test_single_tag_string() {
        let header = parse_header("tags: rust").unwrap();
        assert_eq!(header.tags.unwrap().normalized(), vec!["rust"]);
    }

    #[test]
    fn test_scalar_tags_keep_their_text() {
        let header = parse_header("tags: [2024, rust, 1.5, true, ~]").unwrap();
        assert_eq!(
            header.tags.unwrap().normalized(),
            vec!["2024", "rust", "1.5", "true"]
        );

        let header = parse_header("tags: 42").unwrap();
        assert_eq!(header.tags.unwrap().normalized(), vec!["42"]);
    }

    #[test]
    fn test_nested_tags_are_an_error() {
        assert!(matches!(
            parse_header("tags: [[a, b]]"),
            Err(HeaderError::Yaml(_))
        ));
    }

    #[test]
    fn test_date_alias() {
        let header = parse_header("date: 2023-05-01").unwrap();
        assert_eq!(header.pub_date.as_deref(), Some("2023-05-01"));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        assert!(matches!(parse_header("draft: [1, 2]"), Err(HeaderError::Yaml(_))));
    }

    #[test]
    fn test_parse_date_shapes() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date("pubDate", "2024-01-02").unwrap(), midnight);

        let later = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_date("pubDate", "2024-01-02 10:30").unwrap(), later);
        assert_eq!(parse_date("pubDate", "2024-01-02T10:30:00").unwrap(), later);
        assert_eq!(parse_date("pubDate", "2024-01-02T12:30:00+02:00").unwrap(), later);

        assert_eq!(
            parse_date("pubDate", "next tuesday"),
            Err(HeaderError::Date {
                field: "pubDate",
                value: "next tuesday".into()
            })
        );
    }
}
