//! Turns raw Google Books volumes into book candidates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::google_books::Volume;

/// Title used when a volume has neither a title nor a subtitle.
pub const UNTITLED: &str = "（無題）";

/// A book the model may recommend.
///
/// Absent fields serialize as `null`, list fields as empty arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCandidate {
    /// Volume id, unique within a search.
    pub id: String,
    /// Title, falling back to the subtitle, then to [`UNTITLED`].
    pub title: String,
    /// Author names.
    pub authors: Vec<String>,
    /// Publisher's description.
    pub description: Option<String>,
    /// Subject categories.
    pub categories: Vec<String>,
    /// Publication date as sent by the API (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
    pub published_date: Option<String>,
    /// Cover image link.
    pub thumbnail: Option<String>,
    /// Link to the volume page.
    pub info_link: Option<String>,
    /// Publisher name.
    pub publisher: Option<String>,
    /// Language code of the volume.
    pub language: Option<String>,
    /// Number of printed pages.
    pub page_count: Option<u64>,
    /// ISBN-10 identifier.
    pub isbn10: Option<String>,
    /// ISBN-13 identifier.
    pub isbn13: Option<String>,
}

/// Normalizes every volume, keeping their order.
///
/// This never fails: missing or malformed metadata only leaves the
/// corresponding fields empty.
pub fn normalize_volumes(volumes: &[Volume]) -> Vec<BookCandidate> {
    volumes.iter().map(normalize_volume).collect()
}

/// Normalizes a single volume.
pub fn normalize_volume(volume: &Volume) -> BookCandidate {
    let info = &volume.volume_info;
    let (isbn10, isbn13) = isbns(info);

    BookCandidate {
        id: volume.id.clone(),
        title: string_field(info, "title")
            .or_else(|| string_field(info, "subtitle"))
            .unwrap_or_else(|| UNTITLED.to_owned()),
        authors: string_list(info, "authors"),
        description: string_field(info, "description"),
        categories: string_list(info, "categories"),
        published_date: string_field(info, "publishedDate"),
        thumbnail: string_field(&info["imageLinks"], "thumbnail")
            .or_else(|| string_field(&info["imageLinks"], "smallThumbnail")),
        info_link: string_field(info, "infoLink"),
        publisher: string_field(info, "publisher"),
        language: string_field(info, "language"),
        page_count: info.get("pageCount").and_then(Value::as_u64),
        isbn10,
        isbn13,
    }
}

/// Concatenates two candidate lists, drops repeated ids and keeps at most
/// `max` entries.
///
/// The first occurrence of an id wins, so `primary` entries take priority
/// over `fallback` ones.
pub fn merge_candidates(
    primary: Vec<BookCandidate>,
    fallback: Vec<BookCandidate>,
    max: usize,
) -> Vec<BookCandidate> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(fallback)
        .filter(|book| seen.insert(book.id.clone()))
        .take(max)
        .collect()
}

#[inline]
fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    let Some(items) = value.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn isbns(info: &Value) -> (Option<String>, Option<String>) {
    let mut isbn10 = None;
    let mut isbn13 = None;
    let Some(identifiers) = info.get("industryIdentifiers").and_then(Value::as_array)
    else {
        return (isbn10, isbn13);
    };

    for entry in identifiers {
        let (Some(kind), Some(identifier)) = (
            entry.get("type").and_then(Value::as_str),
            entry.get("identifier").and_then(Value::as_str),
        ) else {
            continue;
        };
        if identifier.is_empty() {
            continue;
        }
        // Later entries override earlier ones of the same type.
        if kind.eq_ignore_ascii_case("ISBN_10") {
            isbn10 = Some(identifier.to_owned());
        } else if kind.eq_ignore_ascii_case("ISBN_13") {
            isbn13 = Some(identifier.to_owned());
        }
    }
    (isbn10, isbn13)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn volume(id: &str, volume_info: Value) -> Volume {
        Volume {
            id: id.to_owned(),
            volume_info,
        }
    }

    fn candidate(id: &str) -> BookCandidate {
        BookCandidate {
            id: id.to_owned(),
            title: format!("Book {id}"),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_volume() {
        let book = normalize_volume(&volume(
            "vol_1",
            json!({
                "title": "統計学入門",
                "subtitle": "基礎統計学 I",
                "authors": ["東京大学教養学部統計学教室"],
                "publisher": "東京大学出版会",
                "publishedDate": "1991-07",
                "description": "統計学の定番教科書。",
                "categories": ["Mathematics"],
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/small",
                    "thumbnail": "http://books.google.com/thumb"
                },
                "infoLink": "http://books.google.com/info",
                "language": "ja",
                "pageCount": 307,
                "industryIdentifiers": [
                    { "type": "ISBN_10", "identifier": "4130420658" },
                    { "type": "ISBN_13", "identifier": "9784130420655" }
                ]
            }),
        ));

        assert_eq!(
            book,
            BookCandidate {
                id: "vol_1".to_owned(),
                title: "統計学入門".to_owned(),
                authors: vec!["東京大学教養学部統計学教室".to_owned()],
                description: Some("統計学の定番教科書。".to_owned()),
                categories: vec!["Mathematics".to_owned()],
                published_date: Some("1991-07".to_owned()),
                thumbnail: Some("http://books.google.com/thumb".to_owned()),
                info_link: Some("http://books.google.com/info".to_owned()),
                publisher: Some("東京大学出版会".to_owned()),
                language: Some("ja".to_owned()),
                page_count: Some(307),
                isbn10: Some("4130420658".to_owned()),
                isbn13: Some("9784130420655".to_owned()),
            }
        );
    }

    #[test]
    fn test_missing_metadata() {
        let book = normalize_volume(&volume("vol_2", Value::Null));
        assert_eq!(book.id, "vol_2");
        assert_eq!(book.title, UNTITLED);
        assert!(book.authors.is_empty());
        assert!(book.categories.is_empty());
        assert_eq!(book.thumbnail, None);
        assert_eq!(book.page_count, None);

        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            json!({
                "id": "vol_2",
                "title": "（無題）",
                "authors": [],
                "description": null,
                "categories": [],
                "publishedDate": null,
                "thumbnail": null,
                "infoLink": null,
                "publisher": null,
                "language": null,
                "pageCount": null,
                "isbn10": null,
                "isbn13": null
            })
        );
    }

    #[test]
    fn test_title_falls_back_to_subtitle() {
        let book = normalize_volume(&volume(
            "vol_3",
            json!({ "title": 42, "subtitle": "A Subtitle" }),
        ));
        assert_eq!(book.title, "A Subtitle");
    }

    #[test]
    fn test_malformed_fields() {
        let book = normalize_volume(&volume(
            "vol_4",
            json!({
                "authors": "Not A List",
                "categories": ["Science", null, "", 3, { "x": 1 }],
                "imageLinks": "broken",
                "pageCount": -1,
                "industryIdentifiers": { "type": "ISBN_13" }
            }),
        ));
        assert!(book.authors.is_empty());
        assert_eq!(book.categories, ["Science", "3"]);
        assert_eq!(book.thumbnail, None);
        assert_eq!(book.page_count, None);
        assert_eq!(book.isbn13, None);
    }

    #[test]
    fn test_thumbnail_fallback() {
        let book = normalize_volume(&volume(
            "vol_5",
            json!({ "imageLinks": { "smallThumbnail": "http://small" } }),
        ));
        assert_eq!(book.thumbnail.as_deref(), Some("http://small"));
    }

    #[test]
    fn test_isbn_matching() {
        let book = normalize_volume(&volume(
            "vol_6",
            json!({
                "industryIdentifiers": [
                    { "type": "isbn_13", "identifier": "9780000000001" },
                    { "type": "OTHER", "identifier": "PKEY:123" },
                    { "type": "ISBN_13", "identifier": "9780000000002" },
                    { "type": "ISBN_10", "identifier": "" },
                    { "identifier": "0000000000" },
                    { "type": "Isbn_10", "identifier": "0000000003" }
                ]
            }),
        ));
        assert_eq!(book.isbn13.as_deref(), Some("9780000000002"));
        assert_eq!(book.isbn10.as_deref(), Some("0000000003"));
    }

    #[test]
    fn test_normalize_keeps_order() {
        let books = normalize_volumes(&[
            volume("b", json!({ "title": "B" })),
            volume("a", json!({ "title": "A" })),
        ]);
        let ids: Vec<_> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let primary = vec![candidate("x"), candidate("y")];
        let mut duplicate = candidate("y");
        duplicate.title = "Fallback copy".to_owned();
        let fallback = vec![duplicate, candidate("z"), candidate("x")];

        let merged = merge_candidates(primary, fallback, 10);
        let ids: Vec<_> = merged.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "z"]);
        assert_eq!(merged[1].title, "Book y");
    }

    #[test]
    fn test_merge_truncates() {
        let primary = vec![candidate("a")];
        let fallback = vec![candidate("b"), candidate("c"), candidate("d")];
        let merged = merge_candidates(primary, fallback, 2);
        let ids: Vec<_> = merged.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_merge_with_itself() {
        let books = vec![
            candidate("a"),
            candidate("b"),
            candidate("a"),
            candidate("c"),
            candidate("b"),
        ];

        let merged = merge_candidates(books.clone(), books.clone(), 10);
        let ids: Vec<_> = merged.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(merged, [candidate("a"), candidate("b"), candidate("c")]);

        let merged = merge_candidates(books.clone(), books, 2);
        let ids: Vec<_> = merged.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
