//! Deterministic child ordering for schedule entries
//!
//! Downstream consumers diff successive runs of the filter, so entry
//! children are re-ordered into a fixed total order before output. The sort
//! is stable: repeated tags such as `category` keep their relative input
//! order, and canonicalizing an already-canonical entry is a no-op.

use crate::document::{Document, Element, Node};
use crate::errors::DocumentError;

/// Total order of entry child tags, per the XMLTV DTD
pub const CHILD_ORDER: [&str; 22] = [
    "title",
    "sub-title",
    "desc",
    "credits",
    "date",
    "category",
    "language",
    "orig-language",
    "length",
    "icon",
    "url",
    "country",
    "episode-num",
    "video",
    "audio",
    "previously-shown",
    "premiere",
    "last-chance",
    "new",
    "subtitles",
    "rating",
    "star-rating",
];

/// Re-order every entry's children into the canonical order.
///
/// A child tag outside [`CHILD_ORDER`] means an upstream stage emitted
/// something it never should have; that is a contract violation and a hard
/// error, not something to paper over.
pub fn canonicalize(document: &mut Document) -> Result<(), DocumentError> {
    for entry in document.entries_mut() {
        sort_entry_children(entry)?;
    }
    Ok(())
}

fn sort_entry_children(entry: &mut Element) -> Result<(), DocumentError> {
    for node in &entry.children {
        match node {
            Node::Element(el) => {
                if tag_rank(&el.name).is_none() {
                    return Err(DocumentError::UnknownTag {
                        tag: el.name.clone(),
                    });
                }
            }
            Node::Text(_) => {
                return Err(DocumentError::structure(
                    "text content directly under <programme>",
                ));
            }
        }
    }

    entry.children.sort_by_key(|node| match node {
        Node::Element(el) => tag_rank(&el.name).unwrap_or(CHILD_ORDER.len()),
        Node::Text(_) => CHILD_ORDER.len(),
    });
    Ok(())
}

fn tag_rank(name: &str) -> Option<usize> {
    CHILD_ORDER.iter().position(|tag| *tag == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn child_names(entry: &Element) -> Vec<&str> {
        entry.element_children().map(|el| el.name.as_str()).collect()
    }

    #[test]
    fn test_reorders_out_of_order_children() {
        let mut document = Document::parse(
            r#"<tv><programme channel="tv1" start="1">
                <category>drama</category>
                <title>Film</title>
                <desc>About things.</desc>
            </programme></tv>"#,
        )
        .unwrap();

        canonicalize(&mut document).unwrap();

        let entry = document.entries().next().unwrap();
        assert_eq!(child_names(entry), vec!["title", "desc", "category"]);
    }

    #[test]
    fn test_sort_is_stable_for_repeated_tags() {
        let mut document = Document::parse(
            r#"<tv><programme channel="tv1" start="1">
                <category>first</category>
                <title>Film</title>
                <category>second</category>
                <category>third</category>
            </programme></tv>"#,
        )
        .unwrap();

        canonicalize(&mut document).unwrap();

        let entry = document.entries().next().unwrap();
        let categories: Vec<_> = entry
            .children_named("category")
            .filter_map(Element::text)
            .collect();
        assert_eq!(categories, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_is_idempotent() {
        let mut document = Document::parse(
            r#"<tv><programme channel="tv1" start="1">
                <star-rating><value>7/10</value></star-rating>
                <episode-num system="onscreen">S01E02</episode-num>
                <title>Film</title>
                <sub-title>Part Two</sub-title>
            </programme></tv>"#,
        )
        .unwrap();

        canonicalize(&mut document).unwrap();
        let once = document.clone();
        canonicalize(&mut document).unwrap();
        assert_eq!(document, once);
    }

    #[test]
    fn test_unknown_tag_is_a_hard_error() {
        let mut document = Document::parse(
            r#"<tv><programme channel="tv1" start="1">
                <title>Film</title>
                <made-up-tag>nope</made-up-tag>
            </programme></tv>"#,
        )
        .unwrap();

        let err = canonicalize(&mut document).unwrap_err();
        assert!(matches!(err, DocumentError::UnknownTag { tag } if tag == "made-up-tag"));
    }

    #[test]
    fn test_nested_children_are_left_alone() {
        // Only the entry's direct children are ordered; the inner structure
        // of blocks like <video> is preserved as-is.
        let mut document = Document::parse(
            r#"<tv><programme channel="tv1" start="1">
                <video><aspect>16:9</aspect><quality>HDTV</quality></video>
                <title>Film</title>
            </programme></tv>"#,
        )
        .unwrap();

        canonicalize(&mut document).unwrap();

        let entry = document.entries().next().unwrap();
        assert_eq!(child_names(entry), vec!["title", "video"]);
        let video = entry.child("video").unwrap();
        assert_eq!(child_names(video), vec!["aspect", "quality"]);
    }
}
