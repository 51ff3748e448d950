//! Builder pattern API for constructing HtmlTemplate instances
//!
//! This module provides a fluent API for creating templates with a source,
//! configuration, an import fetcher and data assigned up front.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::import::ImportFetcher;
use crate::types::*;

/// Builder for constructing HtmlTemplate instances
///
/// Assignments and imports added to the builder are applied in order when
/// the template is built, so invalid data fails `build()`.
///
/// # Examples
///
/// ```rust
/// use html_datastack::HtmlTemplateBuilder;
/// use serde_json::json;
///
/// let mut template = HtmlTemplateBuilder::new()
///     .from_str("<ul><li></li></ul>")
///     .with_repeat_fn("repeat-first")
///     .assign("ul", json!(["a", "b"]))
///     .build()
///     .unwrap();
///
/// assert_eq!(template.rendered(Some("ul")).unwrap(), "<ul><li>a</li><li>b</li></ul>");
/// ```
pub struct HtmlTemplateBuilder {
    source: Option<TemplateSource>,
    config: TemplateConfig,
    fetcher: Option<Box<dyn ImportFetcher>>,
    assignments: Vec<(String, serde_json::Value)>,
    imports: Vec<(String, String, CacheDirective)>,
}

/// Template source for the builder
#[derive(Debug, Clone)]
enum TemplateSource {
    Html(String),
    File(std::path::PathBuf),
}

impl HtmlTemplateBuilder {
    /// Create a new template builder
    pub fn new() -> Self {
        Self {
            source: None,
            config: TemplateConfig::default(),
            fetcher: None,
            assignments: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Set the HTML source from a string
    pub fn from_str<S: Into<String>>(mut self, html: S) -> Self {
        self.source = Some(TemplateSource::Html(html.into()));
        self
    }

    /// Set the source from a file path
    pub fn from_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(TemplateSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Use a custom template configuration
    pub fn with_config(mut self, config: TemplateConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default selector grammar
    pub fn with_selector_grammar(mut self, grammar: SelectorGrammar) -> Self {
        self.config = self.config.with_selector_grammar(grammar);
        self
    }

    /// Set the repeat function for top-level lists
    pub fn with_repeat_fn<S: Into<String>>(mut self, repeat_fn: S) -> Self {
        self.config = self.config.with_repeat_fn(repeat_fn);
        self
    }

    /// Set the repeat function for lists nested inside lists
    pub fn with_repeat_fn_y<S: Into<String>>(mut self, repeat_fn: S) -> Self {
        self.config = self.config.with_repeat_fn_y(repeat_fn);
        self
    }

    pub fn with_on_content_empty(mut self, policy: EmptyContentPolicy) -> Self {
        self.config = self.config.with_on_content_empty(policy);
        self
    }

    /// Enable or disable the second pass over inserted content
    pub fn with_parse_inserted_data(mut self, enabled: bool) -> Self {
        self.config = self.config.with_parse_inserted_data(enabled);
        self
    }

    /// Enable or disable indentation-preserving duplication
    pub fn with_html_formatting(mut self, enabled: bool) -> Self {
        self.config = self.config.with_html_formatting(enabled);
        self
    }

    /// Turn directive diagnostics into errors
    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.config = self.config.with_strict(enabled);
        self
    }

    /// Use a custom fetcher for imports
    pub fn with_fetcher(mut self, fetcher: Box<dyn ImportFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Assign data to a selector when the template is built
    pub fn assign<S: Into<String>>(mut self, selector: S, value: serde_json::Value) -> Self {
        self.assignments.push((selector.into(), value));
        self
    }

    /// Queue a global import when the template is built
    pub fn import<S: Into<String>, L: Into<String>>(mut self, selector: S, location: L) -> Self {
        self.imports
            .push((selector.into(), location.into(), CacheDirective::Default));
        self
    }

    /// Queue a global import with explicit cache control
    pub fn import_with<S: Into<String>, L: Into<String>>(
        mut self,
        selector: S,
        location: L,
        cache: CacheDirective,
    ) -> Self {
        self.imports.push((selector.into(), location.into(), cache));
        self
    }

    /// Build the HtmlTemplate instance
    pub fn build(self) -> Result<HtmlTemplate> {
        // Ensure we have a source
        let source = self.source.ok_or_else(|| {
            Error::parse_static("No template source provided. Use from_str() or from_file()")
        })?;

        let mut template = match source {
            TemplateSource::Html(html) => HtmlTemplate::from_str_with_config(&html, self.config)?,
            TemplateSource::File(path) => HtmlTemplate::from_file_with_config(&path, self.config)?,
        };

        if let Some(fetcher) = self.fetcher {
            template.set_fetcher(fetcher);
        }
        for (selector, location, cache) in self.imports {
            template.import_with(&selector, &location, cache)?;
        }
        for (selector, value) in self.assignments {
            template.assign(&selector, value)?;
        }
        Ok(template)
    }

    /// Build, render, and return the output with render metadata
    pub fn build_and_render(self) -> Result<RenderResult> {
        let mut template = self.build()?;
        let start_time = Instant::now();
        let html = template.render()?;
        let duration = start_time.elapsed();

        Ok(RenderResult {
            html,
            duration,
            queries: template.queries().len(),
            diagnostics: template.diagnostics().to_vec(),
        })
    }
}

impl Default for HtmlTemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience functions for common template creation patterns
impl HtmlTemplateBuilder {
    /// Create a template from an HTML string with default configuration
    pub fn quick_template(html: &str) -> Result<HtmlTemplate> {
        Self::new().from_str(html).build()
    }

    /// Create a template from a file with default configuration
    pub fn from_template_file<P: AsRef<Path>>(path: P) -> Result<HtmlTemplate> {
        Self::new().from_file(path).build()
    }
}

/// Result of a rendering operation with metadata
#[derive(Debug)]
pub struct RenderResult {
    /// The rendered HTML
    pub html: String,
    /// Time taken to render
    pub duration: Duration,
    /// Number of queries executed against the document
    pub queries: usize,
    /// Directive failures reported while rendering
    pub diagnostics: Vec<Diagnostic>,
}
