//! Core template types and configurations
//!
//! This module contains the template facade, its configuration options and
//! the small enums shared by the selector compiler, the populator and the
//! renderer.
//!
//! # Key Types
//!
//! - [`HtmlTemplate`] - Loads a document, collects the data stack and renders it
//! - [`TemplateConfig`] - Configuration options for rendering behavior
//! - [`InsertMode`] - Replace, prepend or append, chosen by `::before`/`::after`
//! - [`ContentType`] - How inserted strings are interpreted
//! - [`EmptyContentPolicy`] - What happens when inserted content is empty
//!
//! # Usage
//!
//! ```rust
//! use html_datastack::{HtmlTemplate, TemplateConfig};
//! use serde_json::json;
//!
//! let mut template = HtmlTemplate::from_str(
//!     "<ul><li class=\"item\"></li></ul>",
//! ).unwrap();
//! template.assign("ul", json!(["one", "two", "three"])).unwrap();
//!
//! let html = template.render().unwrap();
//! assert!(html.contains("<li class=\"item\">three</li>"));
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{QueryContext, QueryRecord, TemplateDocument};
use crate::error::{Error, Result};
use crate::import::{GlobalImport, ImportFetcher, ImportLocation, Importer};
use crate::renderer::Renderer;
use crate::value::{ContentValue, DataStack};

/// Prefix of every attribute the engine reads or writes on template elements
pub const ATTR_PREFIX: &str = "data-tpl-";

/// Marks nodes settled by a first render pass so a re-parse skips them
pub const NO_PARSE_ATTR: &str = "data-tpl-no_parse";

/// Flag written by the `set_flag` empty-content policies
pub const CONTENT_EMPTY_ATTR: &str = "data-tpl-content_empty";

static MARKUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^<].*>").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Whether a string looks like markup rather than a file path or plain text
pub fn looks_like_markup(text: &str) -> bool {
    MARKUP_PATTERN.is_match(text)
}

/// Selector dialect used when a selector carries no `css:`/`xpath:` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorGrammar {
    #[default]
    Css,
    XPath,
}

impl FromStr for SelectorGrammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "css" => Ok(SelectorGrammar::Css),
            "xpath" => Ok(SelectorGrammar::XPath),
            other => Err(Error::directive_owned(format!("Unknown selector grammar '{}'", other))),
        }
    }
}

/// Where inserted content or attribute values go relative to what is there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    #[default]
    Replace,
    Prepend,
    Append,
}

impl fmt::Display for InsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsertMode::Replace => "replace",
            InsertMode::Prepend => "prepend",
            InsertMode::Append => "append",
        };
        f.write_str(name)
    }
}

/// How an inserted string is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Parsed as an HTML fragment
    Markup,
    /// Inserted as a text node, so angle brackets are escaped on output
    Text,
    /// Inserted verbatim as character data
    ///
    /// HTML trees have no CDATA sections, so this is a text node as well.
    Cdata,
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markup" | "html" => Ok(ContentType::Markup),
            "text" => Ok(ContentType::Text),
            "cdata" => Ok(ContentType::Cdata),
            other => Err(Error::directive_owned(format!("Unknown content type '{}'", other))),
        }
    }
}

/// What to do when the content inserted into a node is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContentPolicy {
    #[default]
    DoNothing,
    Clear,
    SetFlag,
    ClearAndSetFlag,
    NoRender,
}

impl FromStr for EmptyContentPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "do_nothing" => Ok(EmptyContentPolicy::DoNothing),
            "clear" => Ok(EmptyContentPolicy::Clear),
            "set_flag" => Ok(EmptyContentPolicy::SetFlag),
            "clear_and_set_flag" => Ok(EmptyContentPolicy::ClearAndSetFlag),
            "no_render" => Ok(EmptyContentPolicy::NoRender),
            other => Err(Error::directive_owned(format!(
                "Unknown on_content_empty policy '{}'",
                other
            ))),
        }
    }
}

/// Per-import control over the import cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDirective {
    /// Use a cached copy when there is one, store fresh fetches
    #[default]
    Default,
    /// Always refetch, then store
    NoCache,
    /// Always refetch, never store
    NoStore,
    /// Drop any cached copy, refetch and store
    MustRevalidate,
}

impl FromStr for CacheDirective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "default" => Ok(CacheDirective::Default),
            "no_cache" => Ok(CacheDirective::NoCache),
            "no_store" => Ok(CacheDirective::NoStore),
            "must_revalidate" => Ok(CacheDirective::MustRevalidate),
            other => Err(Error::directive_owned(format!("Unknown cache directive '{}'", other))),
        }
    }
}

/// Settings for the default import fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout for `url:` imports
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("html-datastack/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Rendering configuration
///
/// Every field has a default, so a JSON configuration only needs the keys
/// it changes:
///
/// ```rust
/// use html_datastack::{TemplateConfig, EmptyContentPolicy};
///
/// let config = TemplateConfig::from_json(
///     r#"{"repeat_fn": "repeat-all,alternate", "on_content_empty": "no_render"}"#,
/// ).unwrap();
/// assert_eq!(config.repeat_fn(), "repeat-all,alternate");
/// assert_eq!(config.on_content_empty(), EmptyContentPolicy::NoRender);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub(crate) selector_grammar: SelectorGrammar,
    pub(crate) repeat_fn: String,
    pub(crate) repeat_fn_y: Option<String>,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) on_content_empty: EmptyContentPolicy,
    pub(crate) parse_inserted_data: bool,
    pub(crate) allow_html_formatting: bool,
    pub(crate) strict: bool,
    pub(crate) fetch: FetchConfig,
}

impl TemplateConfig {
    /// Create a new template configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from JSON, defaulting missing keys
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TemplateConfig = serde_json::from_str(json)?;
        config.repeat_fn.parse::<crate::repeat::RepeatStrategy>()?;
        if let Some(repeat_fn_y) = &config.repeat_fn_y {
            repeat_fn_y.parse::<crate::repeat::RepeatStrategy>()?;
        }
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::io(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Set the grammar for selectors without a `css:`/`xpath:` prefix
    pub fn with_selector_grammar(mut self, grammar: SelectorGrammar) -> Self {
        self.selector_grammar = grammar;
        self
    }

    /// Set the repeat function for lists (the X axis)
    pub fn with_repeat_fn<S: Into<String>>(mut self, repeat_fn: S) -> Self {
        self.repeat_fn = repeat_fn.into();
        self
    }

    /// Set the repeat function for lists nested at odd depths (the Y axis)
    pub fn with_repeat_fn_y<S: Into<String>>(mut self, repeat_fn: S) -> Self {
        self.repeat_fn_y = Some(repeat_fn.into());
        self
    }

    /// Force a content type instead of detecting markup
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_on_content_empty(mut self, policy: EmptyContentPolicy) -> Self {
        self.on_content_empty = policy;
        self
    }

    /// Enable or disable the second pass over inserted content
    pub fn with_parse_inserted_data(mut self, enabled: bool) -> Self {
        self.parse_inserted_data = enabled;
        self
    }

    /// Enable or disable whitespace preservation around duplicated nodes
    pub fn with_html_formatting(mut self, enabled: bool) -> Self {
        self.allow_html_formatting = enabled;
        self
    }

    /// Turn directive diagnostics into hard errors
    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    // Accessors
    pub fn selector_grammar(&self) -> SelectorGrammar {
        self.selector_grammar
    }
    pub fn repeat_fn(&self) -> &str {
        &self.repeat_fn
    }
    pub fn repeat_fn_y(&self) -> Option<&str> {
        self.repeat_fn_y.as_deref()
    }
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }
    pub fn on_content_empty(&self) -> EmptyContentPolicy {
        self.on_content_empty
    }
    pub fn parse_inserted_data(&self) -> bool {
        self.parse_inserted_data
    }
    pub fn allow_html_formatting(&self) -> bool {
        self.allow_html_formatting
    }
    pub fn strict(&self) -> bool {
        self.strict
    }
    pub fn fetch(&self) -> &FetchConfig {
        &self.fetch
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            selector_grammar: SelectorGrammar::Css,
            repeat_fn: "repeat-last".to_string(),
            repeat_fn_y: None,
            content_type: None,
            on_content_empty: EmptyContentPolicy::DoNothing,
            parse_inserted_data: false,
            allow_html_formatting: false,
            strict: false,
            fetch: FetchConfig::default(),
        }
    }
}

/// A directive-level failure reported during rendering
///
/// The render carries on past these; the directive that raised one simply
/// has no effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Data-stack key whose value raised the error
    pub selector: String,
    /// Directive key, when the error came from one
    pub directive: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directive {
            Some(directive) => write!(f, "{} {}: {}", self.selector, directive, self.message),
            None => write!(f, "{}: {}", self.selector, self.message),
        }
    }
}

/// An HTML document plus the data stack to render into it
///
/// The data stack is an ordered map from selectors to content values. It is
/// assigned before rendering and read, never consumed, by the renderer.
/// Rendering happens once; later calls to [`render`](Self::render) or
/// [`rendered`](Self::rendered) serialize the already rendered document.
///
/// ```rust
/// use html_datastack::HtmlTemplate;
/// use serde_json::json;
///
/// let mut template = HtmlTemplate::from_str(
///     r#"<a class="link">placeholder</a>"#,
/// ).unwrap();
/// template.assign("a.link", json!({
///     "@content": "Home",
///     "@attr": {"href": "/"}
/// })).unwrap();
///
/// let html = template.rendered(Some("a")).unwrap();
/// assert_eq!(html, r#"<a class="link" href="/">Home</a>"#);
/// ```
pub struct HtmlTemplate {
    pub(crate) document: Option<TemplateDocument>,
    pub(crate) config: TemplateConfig,
    pub(crate) data: DataStack,
    pub(crate) imports: Vec<GlobalImport>,
    pub(crate) importer: Importer,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) is_rendered: bool,
}

impl fmt::Debug for HtmlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlTemplate")
            .field("config", &self.config)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("imports", &self.imports)
            .field("is_rendered", &self.is_rendered)
            .finish()
    }
}

impl Default for HtmlTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlTemplate {
    /// Create a template with no document yet
    ///
    /// Data can be assigned before [`set_template`](Self::set_template).
    pub fn new() -> Self {
        Self::with_config(TemplateConfig::default())
    }

    /// Create an empty template with custom configuration
    pub fn with_config(config: TemplateConfig) -> Self {
        let importer = Importer::with_config(&config.fetch);
        Self {
            document: None,
            config,
            data: DataStack::new(),
            imports: Vec::new(),
            importer,
            diagnostics: Vec::new(),
            is_rendered: false,
        }
    }

    /// Create a template from an HTML string
    pub fn from_str(html: &str) -> Result<Self> {
        Self::from_str_with_config(html, TemplateConfig::default())
    }

    /// Create a template from an HTML string with custom configuration
    pub fn from_str_with_config(html: &str, config: TemplateConfig) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(Error::parse_static("No HTML data provided"));
        }
        let mut template = Self::with_config(config);
        template.load_markup(html);
        Ok(template)
    }

    /// Create a template from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_config(path, TemplateConfig::default())
    }

    /// Create a template from a file path with custom configuration
    pub fn from_file_with_config<P: AsRef<Path>>(path: P, config: TemplateConfig) -> Result<Self> {
        let html = read_template_file(path.as_ref())?;
        let mut template = Self::with_config(config);
        template.load_markup(&html);
        Ok(template)
    }

    /// Load a template from markup or from a file path
    ///
    /// Input containing a tag is taken as markup, anything else as a path.
    /// Loading resets the rendered state but keeps assigned data.
    pub fn set_template(&mut self, template: &str) -> Result<()> {
        if looks_like_markup(template) {
            self.load_markup(template);
        } else if template.trim().is_empty() {
            return Err(Error::parse_static("No HTML data provided"));
        } else {
            let html = read_template_file(Path::new(template.trim()))?;
            self.load_markup(&html);
        }
        Ok(())
    }

    fn load_markup(&mut self, html: &str) {
        self.document = Some(TemplateDocument::parse(html, self.config.selector_grammar));
        self.diagnostics.clear();
        self.is_rendered = false;
    }

    /// Replace the fetcher used for `@import` directives and global imports
    pub fn set_fetcher(&mut self, fetcher: Box<dyn ImportFetcher>) {
        self.importer = Importer::new(fetcher);
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// The data stack assigned so far
    pub fn data(&self) -> &DataStack {
        &self.data
    }

    /// Assign JSON data to a selector
    ///
    /// Objects with `@` keys are compound directives and are validated here:
    /// a key outside the directive vocabulary is rejected.
    pub fn assign(&mut self, selector: &str, value: serde_json::Value) -> Result<()> {
        let value = ContentValue::from_json(value)?;
        self.assign_value(selector, value)
    }

    /// Assign an already built content value to a selector
    pub fn assign_value(&mut self, selector: &str, value: ContentValue) -> Result<()> {
        crate::selector::SelectorCompiler::new(self.config.selector_grammar).compile(selector)?;
        self.data.insert(selector.to_string(), value);
        Ok(())
    }

    /// Assign every entry of a JSON object
    pub fn assign_all(&mut self, data: serde_json::Value) -> Result<()> {
        match data {
            serde_json::Value::Object(map) => {
                for (selector, value) in map {
                    self.assign(&selector, value)?;
                }
                Ok(())
            }
            other => Err(Error::directive_owned(format!(
                "assign_all expects an object, got {}",
                other
            ))),
        }
    }

    /// Queue an import resolved against the whole document before rendering
    ///
    /// A `::before`/`::after` suffix on the selector prepends or appends the
    /// imported fragment instead of replacing the target's content.
    pub fn import(&mut self, selector: &str, location: &str) -> Result<()> {
        self.import_with(selector, location, CacheDirective::Default)
    }

    /// Queue a global import with explicit cache control
    pub fn import_with(&mut self, selector: &str, location: &str, cache: CacheDirective) -> Result<()> {
        let location = ImportLocation::parse(location)?;
        crate::selector::SelectorCompiler::new(self.config.selector_grammar).compile(selector)?;
        self.imports.push(GlobalImport {
            selector: selector.to_string(),
            location,
            cache,
        });
        Ok(())
    }

    /// Render the data stack into the document and serialize it
    pub fn render(&mut self) -> Result<String> {
        self.ensure_rendered()?;
        Ok(self.document()?.html())
    }

    /// The rendered document, or only the parts matching `selector`
    ///
    /// Matches are joined with a line break when HTML formatting is enabled.
    pub fn rendered(&mut self, selector: Option<&str>) -> Result<String> {
        self.ensure_rendered()?;
        let document = self.document()?;
        match selector {
            None => Ok(document.html()),
            Some(selector) => {
                let separator = if self.config.allow_html_formatting { "\r\n" } else { "" };
                document.fragment_html(selector, separator)
            }
        }
    }

    /// Outer HTML of every element matching `selector`, in document order
    pub fn find(&self, selector: &str) -> Result<Vec<String>> {
        let document = self.document()?;
        Ok(document
            .select(selector, &QueryContext::Document)?
            .iter()
            .map(|node| node.html().to_string())
            .collect())
    }

    /// Every query executed so far with its match count
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.document
            .as_ref()
            .map(|document| document.queries())
            .unwrap_or_default()
    }

    /// Directive failures reported by the last render
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_rendered(&self) -> bool {
        self.is_rendered
    }

    fn document(&self) -> Result<&TemplateDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| Error::parse_static("No template source provided. Call set_template() first."))
    }

    fn ensure_rendered(&mut self) -> Result<()> {
        if self.is_rendered {
            return Ok(());
        }
        let document = self
            .document
            .as_mut()
            .ok_or_else(|| Error::parse_static("No template source provided. Call set_template() first."))?;

        let mut diagnostics = {
            let renderer = Renderer::new(document, &self.config, &self.importer);
            renderer.resolve_imports(&self.imports)?;
            renderer.render(&self.data, false)?;
            renderer.into_diagnostics()
        };

        if self.config.parse_inserted_data {
            let html = document.html();
            document.reload(&html);
            let renderer = Renderer::new(document, &self.config, &self.importer);
            renderer.render(&self.data, true)?;
            diagnostics.extend(renderer.into_diagnostics());
            document.strip_attribute(NO_PARSE_ATTR);
        }

        self.diagnostics = diagnostics;
        self.is_rendered = true;
        Ok(())
    }
}

fn read_template_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::parse_owned(format!(
            "Failed to read template file '{}': {}",
            path.display(),
            e
        ))
    })
}
