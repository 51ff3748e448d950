//! Test utilities for rendered HTML
//!
//! Helpers for comparing and inspecting rendered output. Lookups go through
//! the crate's own selector engine, so `css:` and `xpath:` selectors work the
//! same here as in a data stack.

use dom_query::{Document, NodeRef};

use crate::document::{QueryContext, TemplateDocument};
use crate::node_ext::NodeExt;
use crate::types::{HtmlTemplate, SelectorGrammar};

/// Normalize HTML for comparison
///
/// The input is parsed, whitespace-only text between tags is dropped and the
/// body content is serialized again, so fragments and full documents with
/// different indentation compare equal.
///
/// # Examples
///
/// ```
/// use html_datastack::test_utils::normalize_html;
///
/// let html1 = "<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>";
/// let html2 = "<ul><li>a</li><li>b</li></ul>";
///
/// assert_eq!(normalize_html(html1), normalize_html(html2));
/// ```
pub fn normalize_html(html: &str) -> String {
    let doc = Document::from(html);
    strip_blank_text(&doc.root());

    let body = doc.select("body");
    if body.length() > 0 {
        body.inner_html().trim().to_string()
    } else {
        doc.html().trim().to_string()
    }
}

fn strip_blank_text(node: &NodeRef) {
    for child in node.children() {
        if child.is_whitespace_text() {
            child.remove_from_parent();
        } else {
            strip_blank_text(&child);
        }
    }
}

/// Assert that two HTML strings are equivalent after normalization
///
/// # Examples
///
/// ```
/// use html_datastack::assert_html_eq;
///
/// assert_html_eq!(
///     "<div>\n  <p>Text</p>\n</div>",
///     "<div><p>Text</p></div>"
/// );
/// ```
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_html_eq!($left, $right, "")
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {{
        let left_normalized = $crate::test_utils::normalize_html($left);
        let right_normalized = $crate::test_utils::normalize_html($right);

        if left_normalized != right_normalized {
            panic!(
                "HTML assertion failed {}\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}",
                format!($($arg)*),
                left_normalized,
                right_normalized,
            );
        }
    }};
}

/// Whether two HTML strings are equivalent after normalization
pub fn html_eq(html1: &str, html2: &str) -> bool {
    normalize_html(html1) == normalize_html(html2)
}

fn with_matches<T>(html: &str, selector: &str, f: impl Fn(&NodeRef) -> T) -> Vec<T> {
    let document = TemplateDocument::parse(html, SelectorGrammar::Css);
    let values = match document.select(selector, &QueryContext::Document) {
        Ok(nodes) => nodes.iter().map(|node| f(node)).collect(),
        Err(_) => Vec::new(),
    };
    values
}

/// Trimmed text of every element matching `selector`
pub fn texts(html: &str, selector: &str) -> Vec<String> {
    with_matches(html, selector, |node| node.text().trim().to_string())
}

/// Values of `attr` on the elements matching `selector` that carry it
pub fn attrs(html: &str, selector: &str, attr: &str) -> Vec<String> {
    with_matches(html, selector, |node| node.attr(attr).map(|v| v.to_string()))
        .into_iter()
        .flatten()
        .collect()
}

/// Number of elements matching `selector`
pub fn count(html: &str, selector: &str) -> usize {
    with_matches(html, selector, |_| ()).len()
}

/// Render `data` into `html` and return the fragment matching `selector`
///
/// Panics on any error, for use in tests only.
pub fn render_fragment(html: &str, data: serde_json::Value, selector: &str) -> String {
    let mut template = HtmlTemplate::from_str(html).unwrap_or_else(|e| panic!("bad template: {}", e));
    template
        .assign_all(data)
        .unwrap_or_else(|e| panic!("bad data: {}", e));
    template
        .rendered(Some(selector))
        .unwrap_or_else(|e| panic!("render failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_normalize_drops_indentation() {
        let html1 = "<div>\n    <p>Hello World</p>\n</div>";
        let html2 = "<div><p>Hello World</p></div>";
        assert_eq!(normalize_html(html1), normalize_html(html2));
        assert_eq!(normalize_html(html2), "<div><p>Hello World</p></div>");
    }

    #[test]
    fn test_normalize_keeps_inner_spaces() {
        assert_eq!(normalize_html("<p>a <b>b</b> c</p>"), "<p>a <b>b</b> c</p>");
    }

    #[test]
    fn test_html_eq() {
        assert!(html_eq("<span>Text</span>", "<span>Text</span>"));
        assert!(!html_eq("<span>Text1</span>", "<span>Text2</span>"));
    }

    #[test]
    fn test_lookups() {
        let html = r#"
            <ul>
                <li class="intro"><a href="/1">One</a></li>
                <li><a href="/2" class="external">Two</a></li>
                <li class="intro"><a href="/3">Three</a></li>
            </ul>
        "#;
        assert_eq!(texts(html, "li.intro"), vec!["One", "Three"]);
        assert_eq!(texts(html, "xpath://li[2]/a"), vec!["Two"]);
        assert_eq!(attrs(html, "a", "href"), vec!["/1", "/2", "/3"]);
        assert_eq!(attrs(html, "a", "class"), vec!["external"]);
        assert_eq!(count(html, "li"), 3);
        assert_eq!(count(html, "table"), 0);
    }

    #[test]
    fn test_render_fragment() {
        assert_eq!(
            render_fragment("<p></p>", json!({"p": "hi"}), "p"),
            "<p>hi</p>"
        );
    }

    #[test]
    fn test_assert_html_eq_macro() {
        assert_html_eq!("<div>\n<b>x</b>\n</div>", "<div><b>x</b></div>");
    }

    #[test]
    #[should_panic(expected = "HTML assertion failed")]
    fn test_assert_html_eq_macro_panic() {
        assert_html_eq!("<div>Text1</div>", "<div>Text2</div>");
    }
}
