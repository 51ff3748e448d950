//! Data-stack values
//!
//! A data stack maps selectors to [`ContentValue`]s. Values are usually built
//! from JSON:
//!
//! - strings, numbers and booleans become [`ContentValue::Text`]; `null` is
//!   the empty string
//! - arrays become [`ContentValue::List`], one item per repeated node
//! - objects without `@` keys become [`ContentValue::Map`], a nested data
//!   stack scoped to each matched node
//! - objects with `@` keys become [`ContentValue::Directives`]
//!
//! # Directives
//!
//! | key                     | value                                            |
//! |-------------------------|--------------------------------------------------|
//! | `@content`, `@children` | any content value; arrays repeat the node's children |
//! | `@attr`                 | object of attribute values, `null` removes one   |
//! | `@import`               | an import location such as `file:parts.html#nav` |
//! | `@render`               | `false` removes the node, a tag name renames it, `""` unwraps it |
//! | `@repeat`               | any content value, repeating the node itself     |
//! | `@params`               | `content_type`, `repeat_fn`, `on_content_empty`, `cache` |
//!
//! `@content`, `@children`, `@attr` and `@import` take a `::before` or
//! `::after` suffix. Anything else next to a directive key is rejected when
//! the value is built, so a typo never silently renders.
//!
//! ```rust
//! use html_datastack::value::ContentValue;
//! use serde_json::json;
//!
//! assert!(ContentValue::from_json(json!({"@content": "x", "bogus_key": "y"})).is_err());
//! ```

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::import::ImportLocation;
use crate::repeat::RepeatStrategy;
use crate::selector::split_position;
use crate::types::{CacheDirective, ContentType, EmptyContentPolicy, InsertMode};

/// An ordered selector to value mapping
pub type DataStack = IndexMap<String, ContentValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentValue {
    Text(String),
    List(Vec<ContentValue>),
    Map(DataStack),
    Directives(Directives),
}

impl ContentValue {
    /// Convert JSON into a content value, validating directive maps
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(ContentValue::Text(String::new())),
            JsonValue::Bool(b) => Ok(ContentValue::Text(b.to_string())),
            JsonValue::Number(n) => Ok(ContentValue::Text(n.to_string())),
            JsonValue::String(s) => Ok(ContentValue::Text(s)),
            JsonValue::Array(items) => items
                .into_iter()
                .map(ContentValue::from_json)
                .collect::<Result<Vec<_>>>()
                .map(ContentValue::List),
            JsonValue::Object(map) => {
                if map.keys().any(|key| key.starts_with('@')) {
                    Directives::from_json(map).map(ContentValue::Directives)
                } else {
                    map.into_iter()
                        .map(|(key, value)| Ok((key, ContentValue::from_json(value)?)))
                        .collect::<Result<DataStack>>()
                        .map(ContentValue::Map)
                }
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for ContentValue {
    fn from(text: &str) -> Self {
        ContentValue::Text(text.to_string())
    }
}

impl From<String> for ContentValue {
    fn from(text: String) -> Self {
        ContentValue::Text(text)
    }
}

impl<T: Into<ContentValue>> From<Vec<T>> for ContentValue {
    fn from(items: Vec<T>) -> Self {
        ContentValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<DataStack> for ContentValue {
    fn from(stack: DataStack) -> Self {
        ContentValue::Map(stack)
    }
}

impl From<Directives> for ContentValue {
    fn from(directives: Directives) -> Self {
        ContentValue::Directives(directives)
    }
}

/// What `@render` does to a node
#[derive(Debug, Clone, PartialEq)]
pub enum RenderControl {
    /// `false`: drop the node
    Remove,
    /// `true`: leave it alone
    Keep,
    /// A tag name: rename the element
    Rename(String),
    /// An empty string: replace the node by its children
    Unwrap,
}

/// One directive of a compound value
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Attr {
        mode: InsertMode,
        /// `None` removes the attribute
        attrs: IndexMap<String, Option<String>>,
    },
    Content {
        mode: InsertMode,
        value: ContentValue,
    },
    Children {
        mode: InsertMode,
        value: ContentValue,
    },
    Import {
        mode: InsertMode,
        location: ImportLocation,
    },
    Render(RenderControl),
    Repeat(ContentValue),
}

impl Directive {
    /// The directive key as written in a data stack
    pub fn key(&self) -> String {
        fn with_suffix(name: &str, mode: &InsertMode) -> String {
            match mode {
                InsertMode::Replace => name.to_string(),
                InsertMode::Prepend => format!("{}::before", name),
                InsertMode::Append => format!("{}::after", name),
            }
        }
        match self {
            Directive::Attr { mode, .. } => with_suffix("@attr", mode),
            Directive::Content { mode, .. } => with_suffix("@content", mode),
            Directive::Children { mode, .. } => with_suffix("@children", mode),
            Directive::Import { mode, .. } => with_suffix("@import", mode),
            Directive::Render(_) => "@render".to_string(),
            Directive::Repeat(_) => "@repeat".to_string(),
        }
    }

    /// Processing rank: content, imports, render, repeat
    ///
    /// Attributes have no rank of their own.
    fn rank(&self) -> Option<u8> {
        match self {
            Directive::Attr { .. } => None,
            Directive::Content { .. } | Directive::Children { .. } => Some(1),
            Directive::Import { .. } => Some(2),
            Directive::Render(_) => Some(3),
            Directive::Repeat(_) => Some(4),
        }
    }
}

/// Per-value overrides carried by `@params`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    pub content_type: Option<ContentType>,
    pub repeat_fn: Option<RepeatStrategy>,
    pub on_content_empty: Option<EmptyContentPolicy>,
    pub cache: Option<CacheDirective>,
}

impl Params {
    fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            return Err(Error::directive_static("@params must be an object"));
        };
        let mut params = Params::default();
        for (key, value) in map {
            let text = match &value {
                JsonValue::String(s) => s.clone(),
                other => {
                    return Err(Error::directive_owned(format!(
                        "@params value for '{}' must be a string, got {}",
                        key, other
                    )))
                }
            };
            match key.as_str() {
                "content_type" => params.content_type = Some(text.parse()?),
                "repeat_fn" => params.repeat_fn = Some(text.parse()?),
                "on_content_empty" => params.on_content_empty = Some(text.parse()?),
                "cache" => params.cache = Some(text.parse()?),
                other => {
                    return Err(Error::directive_owned(format!(
                        "Unknown @params key '{}'",
                        other
                    )))
                }
            }
        }
        Ok(params)
    }
}

/// A compound directive value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Directives {
    pub params: Params,
    items: Vec<Directive>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with(mut self, directive: Directive) -> Self {
        self.items.push(directive);
        self
    }

    /// Directives in processing order, keeping key order within a rank
    ///
    /// An `@attr` runs right after the directive written before it, so it
    /// applies to whichever node is current at that point.
    pub fn ordered(&self) -> Vec<&Directive> {
        let mut previous = 0;
        let mut ordered: Vec<(u8, &Directive)> = self
            .items
            .iter()
            .map(|directive| {
                let rank = directive.rank().unwrap_or(previous);
                previous = rank;
                (rank, directive)
            })
            .collect();
        ordered.sort_by_key(|(rank, _)| *rank);
        ordered.into_iter().map(|(_, directive)| directive).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn from_json(map: serde_json::Map<String, JsonValue>) -> Result<Self> {
        let mut directives = Directives::default();
        for (key, value) in map {
            let (name, position) = split_position(&key);
            let mode = position.unwrap_or_default();
            let directive = match (name, position) {
                ("@params", None) => {
                    directives.params = Params::from_json(value)?;
                    continue;
                }
                ("@content", _) => Directive::Content {
                    mode,
                    value: ContentValue::from_json(value)?,
                },
                ("@children", _) => Directive::Children {
                    mode,
                    value: ContentValue::from_json(value)?,
                },
                ("@attr", _) => Directive::Attr {
                    mode,
                    attrs: attr_map(value)?,
                },
                ("@import", _) => match value {
                    JsonValue::String(location) => Directive::Import {
                        mode,
                        location: ImportLocation::parse(&location)?,
                    },
                    other => {
                        return Err(Error::directive_owned(format!(
                            "@import expects a location string, got {}",
                            other
                        )))
                    }
                },
                ("@render", None) => Directive::Render(render_control(value)?),
                ("@repeat", None) => Directive::Repeat(ContentValue::from_json(value)?),
                _ => {
                    return Err(Error::directive_owned(format!(
                        "Unknown key '{}' in compound directive",
                        key
                    )))
                }
            };
            directives.items.push(directive);
        }
        Ok(directives)
    }
}

fn attr_map(value: JsonValue) -> Result<IndexMap<String, Option<String>>> {
    let JsonValue::Object(map) = value else {
        return Err(Error::directive_static("@attr expects an object of attributes"));
    };
    map.into_iter()
        .map(|(name, value)| {
            let value = match value {
                JsonValue::Null => None,
                JsonValue::String(s) => Some(s),
                JsonValue::Bool(b) => Some(b.to_string()),
                JsonValue::Number(n) => Some(n.to_string()),
                other => {
                    return Err(Error::directive_owned(format!(
                        "@attr value for '{}' must be a scalar, got {}",
                        name, other
                    )))
                }
            };
            Ok((name, value))
        })
        .collect()
}

fn render_control(value: JsonValue) -> Result<RenderControl> {
    match value {
        JsonValue::Bool(false) => Ok(RenderControl::Remove),
        JsonValue::Bool(true) => Ok(RenderControl::Keep),
        JsonValue::String(s) if s.trim().is_empty() => Ok(RenderControl::Unwrap),
        JsonValue::String(s) => Ok(RenderControl::Rename(s.trim().to_ascii_lowercase())),
        other => Err(Error::directive_owned(format!(
            "@render expects a boolean or a tag name, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(ContentValue::from_json(json!("hi")).unwrap(), ContentValue::from("hi"));
        assert_eq!(ContentValue::from_json(json!(42)).unwrap(), ContentValue::from("42"));
        assert_eq!(ContentValue::from_json(json!(true)).unwrap(), ContentValue::from("true"));
        assert_eq!(ContentValue::from_json(json!(null)).unwrap(), ContentValue::from(""));
    }

    #[test]
    fn test_lists_and_maps_keep_order() {
        let value = ContentValue::from_json(json!({"z": ["a", "b"], "a": {"em": "x"}})).unwrap();
        let ContentValue::Map(stack) = value else {
            panic!("expected a map");
        };
        assert_eq!(stack.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(stack["z"], ContentValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_directive_parsing() {
        let value = ContentValue::from_json(json!({
            "@repeat": ["x"],
            "@render": "section",
            "@attr::after": {"class": "new", "hidden": null},
            "@content::before": "Intro ",
            "@params": {"content_type": "text", "repeat_fn": "repeat-first"}
        }))
        .unwrap();
        let ContentValue::Directives(directives) = value else {
            panic!("expected directives");
        };
        assert_eq!(directives.params.content_type, Some(ContentType::Text));
        assert!(directives.params.repeat_fn.is_some());

        let keys: Vec<String> = directives.ordered().iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["@content::before", "@render", "@attr::after", "@repeat"]);

        match directives.ordered()[2] {
            Directive::Attr { mode, attrs } => {
                assert_eq!(*mode, InsertMode::Append);
                assert_eq!(attrs["class"], Some("new".to_string()));
                assert_eq!(attrs["hidden"], None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attr_keeps_its_key_position() {
        let keys = |value: JsonValue| match ContentValue::from_json(value).unwrap() {
            ContentValue::Directives(d) => d.ordered().iter().map(|d| d.key()).collect::<Vec<_>>(),
            _ => unreachable!(),
        };
        assert_eq!(
            keys(json!({"@attr": {"a": "1"}, "@import": "file:x.html", "@content": "c"})),
            vec!["@attr", "@content", "@import"]
        );
        assert_eq!(
            keys(json!({"@import": "file:x.html", "@attr": {"a": "1"}, "@content": "c"})),
            vec!["@content", "@import", "@attr"]
        );
    }

    #[test]
    fn test_render_control_values() {
        let parse = |v: JsonValue| match ContentValue::from_json(json!({ "@render": v })).unwrap() {
            ContentValue::Directives(d) => d.ordered()[0].clone(),
            _ => unreachable!(),
        };
        assert_eq!(parse(json!(false)), Directive::Render(RenderControl::Remove));
        assert_eq!(parse(json!(true)), Directive::Render(RenderControl::Keep));
        assert_eq!(parse(json!(" ")), Directive::Render(RenderControl::Unwrap));
        assert_eq!(parse(json!("DIV")), Directive::Render(RenderControl::Rename("div".into())));
    }

    #[test]
    fn test_foreign_keys_are_rejected() {
        let err = ContentValue::from_json(json!({"@content": "x", "bogus_key": "y"})).unwrap_err();
        assert!(matches!(err, Error::DirectiveError(_)));
        assert!(err.to_string().contains("bogus_key"));

        assert!(ContentValue::from_json(json!({"@contents": "x"})).is_err());
        assert!(ContentValue::from_json(json!({"@render::after": false})).is_err());
        assert!(ContentValue::from_json(json!({"@params": {"colour": "red"}})).is_err());
        assert!(ContentValue::from_json(json!({"@params": {"repeat_fn": "repeat-nowhere"}})).is_err());
        assert!(ContentValue::from_json(json!({"@attr": "class"})).is_err());
    }

    #[test]
    fn test_nested_directives_are_validated() {
        let result = ContentValue::from_json(json!({"ul": [{"@content": "a", "oops": 1}]}));
        assert!(matches!(result, Err(Error::DirectiveError(_))));
    }
}
