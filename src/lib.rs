//! HTML templating by selector-keyed data stacks
//!
//! A template is a plain HTML document. Data is assigned to CSS or XPath
//! selectors and rendered straight into the matching elements: strings become
//! content, arrays repeat elements until there is one per item, nested
//! objects render inside each match, and `@`-prefixed directive objects set
//! attributes, import fragments, rename or remove elements.
//!
//! # Examples
//!
//! ```rust
//! use html_datastack::HtmlTemplate;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let html = r#"
//!     <article>
//!         <h1 class="title"></h1>
//!         <ul class="tags"><li></li></ul>
//!         <a class="more">Read more</a>
//!     </article>
//! "#;
//!
//! let mut template = HtmlTemplate::from_str(html)?;
//! template.assign("h1.title", json!("Hello World"))?;
//! template.assign("ul.tags", json!(["rust", "html"]))?;
//! template.assign("a.more", json!({"@attr": {"href": "/posts/1"}}))?;
//!
//! let rendered = template.rendered(Some("article"))?;
//! assert!(rendered.contains(r#"<h1 class="title">Hello World</h1>"#));
//! assert!(rendered.contains("<li>rust</li><li>html</li>"));
//! assert!(rendered.contains(r#"<a class="more" href="/posts/1">Read more</a>"#));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod document;
pub mod error;
pub mod import;
pub mod node_ext;
pub mod populate;
pub mod renderer;
pub mod repeat;
pub mod selector;
pub mod test_utils;
pub mod types;
pub mod value;
pub mod xpath;

// Re-export commonly used types
pub use builder::{HtmlTemplateBuilder, RenderResult};
pub use document::{QueryContext, QueryRecord, TemplateDocument};
pub use error::{Error, Result};
pub use import::{DefaultFetcher, ImportFetcher, ImportLocation};
pub use repeat::RepeatStrategy;
pub use selector::SelectorCompiler;
pub use types::{
    CacheDirective, ContentType, Diagnostic, EmptyContentPolicy, FetchConfig, HtmlTemplate,
    InsertMode, SelectorGrammar, TemplateConfig,
};
pub use value::{ContentValue, DataStack, Directive, Directives, Params, RenderControl};
