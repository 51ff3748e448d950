//! External markup imports
//!
//! Imports splice markup fetched from elsewhere into the template. A location
//! is written `file:<path>` or `url:<address>`, optionally followed by
//! `#<fragment>` choosing part of the fetched document:
//!
//! - a bare name like `#nav` selects the element with that id
//! - anything else, like `#ul.menu > li`, is compiled as a selector
//! - without a fragment the children of the fetched document's body are used
//!
//! Fetched documents are cached by source for the lifetime of the template.
//! A [`CacheDirective`] can bypass the cache per import.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::debug;

use crate::document::{QueryContext, TemplateDocument};
use crate::error::{Error, Result};
use crate::types::{CacheDirective, FetchConfig, SelectorGrammar};

/// Where imported markup comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    File(PathBuf),
    Url(String),
}

/// A parsed import location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLocation {
    pub source: ImportSource,
    pub fragment: Option<String>,
}

impl ImportLocation {
    /// Parse `file:<path>[#fragment]` or `url:<address>[#fragment]`
    ///
    /// Locations without a prefix are URLs when they start with `http://` or
    /// `https://`, and file paths otherwise.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        let (body, fragment) = match location.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment.trim().to_string())),
            None => (location, None),
        };
        let fragment = fragment.filter(|f| !f.is_empty());

        let lower = body.to_ascii_lowercase();
        let source = if lower.starts_with("url:") {
            ImportSource::Url(body[4..].trim().to_string())
        } else if lower.starts_with("file:") {
            ImportSource::File(PathBuf::from(body[5..].trim()))
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            ImportSource::Url(body.to_string())
        } else {
            ImportSource::File(PathBuf::from(body))
        };

        let empty = match &source {
            ImportSource::Url(url) => url.is_empty(),
            ImportSource::File(path) => path.as_os_str().is_empty(),
        };
        if empty {
            return Err(Error::import_owned(format!("Import location '{}' names no source", location)));
        }
        Ok(Self { source, fragment })
    }

    /// Cache key: the source without its fragment
    pub fn source_key(&self) -> String {
        match &self.source {
            ImportSource::File(path) => format!("file:{}", path.display()),
            ImportSource::Url(url) => format!("url:{}", url),
        }
    }

    /// The fragment as a selector
    pub fn fragment_selector(&self) -> Option<String> {
        let fragment = self.fragment.as_deref()?;
        let is_name = fragment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        Some(if is_name {
            format!("css:#{}", fragment)
        } else {
            fragment.to_string()
        })
    }
}

impl fmt::Display for ImportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source_key())?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// An import queued against the whole document
#[derive(Debug, Clone)]
pub struct GlobalImport {
    pub selector: String,
    pub location: ImportLocation,
    pub cache: CacheDirective,
}

/// Fetches the raw document behind an import location
pub trait ImportFetcher {
    fn fetch(&self, location: &ImportLocation) -> Result<String>;
}

impl<F> ImportFetcher for F
where
    F: Fn(&ImportLocation) -> Result<String>,
{
    fn fetch(&self, location: &ImportLocation) -> Result<String> {
        self(location)
    }
}

/// Reads `file:` locations from disk and `url:` locations over HTTP
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    config: FetchConfig,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FetchConfig) -> Self {
        Self { config }
    }

    fn fetch_url(&self, url: &str) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(|e| Error::http_owned(format!("Failed to build HTTP client: {}", e)))?;
        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::http_owned(format!("Failed to fetch '{}': {}", url, e)))?;
        response
            .text()
            .map_err(|e| Error::http_owned(format!("Failed to read body of '{}': {}", url, e)))
    }
}

impl ImportFetcher for DefaultFetcher {
    fn fetch(&self, location: &ImportLocation) -> Result<String> {
        match &location.source {
            ImportSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::io(format!("Failed to read file '{}': {}", path.display(), e))
            }),
            ImportSource::Url(url) => self.fetch_url(url),
        }
    }
}

/// Cache entry with access bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub access_count: usize,
    pub last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Mark this entry as accessed
    pub fn mark_accessed(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }

    /// Get the age of this entry
    pub fn age(&self) -> Duration {
        Instant::now().duration_since(self.created_at)
    }
}

/// Fetched documents keyed by source
#[derive(Debug, Default)]
pub struct ImportCache {
    entries: HashMap<String, CacheEntry<String>>,
    hits: usize,
    misses: usize,
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_accessed();
                self.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.entries.insert(key, CacheEntry::new(value));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// Fetches, caches and cuts imported markup
pub struct Importer {
    fetcher: Box<dyn ImportFetcher>,
    cache: RefCell<ImportCache>,
}

impl fmt::Debug for Importer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Importer")
            .field("cache", &self.cache.borrow())
            .finish()
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(Box::new(DefaultFetcher::new()))
    }
}

impl Importer {
    pub fn new(fetcher: Box<dyn ImportFetcher>) -> Self {
        Self {
            fetcher,
            cache: RefCell::new(ImportCache::new()),
        }
    }

    pub fn with_config(config: &FetchConfig) -> Self {
        Self::new(Box::new(DefaultFetcher::with_config(config.clone())))
    }

    /// The raw document behind `location`, honoring the cache directive
    pub fn load(&self, location: &ImportLocation, directive: CacheDirective) -> Result<String> {
        let key = location.source_key();
        if directive == CacheDirective::Default {
            if let Some(cached) = self.cache.borrow_mut().get(&key) {
                debug!("import cache hit for {}", key);
                return Ok(cached);
            }
        }
        if directive == CacheDirective::MustRevalidate {
            self.cache.borrow_mut().remove(&key);
        }

        debug!("fetching import {}", key);
        let fetched = self.fetcher.fetch(location)?;
        if directive != CacheDirective::NoStore {
            self.cache.borrow_mut().insert(key, fetched.clone());
        }
        Ok(fetched)
    }

    /// The markup an import inserts
    ///
    /// Fails when the selected fragment is empty.
    pub fn resolve(
        &self,
        location: &ImportLocation,
        directive: CacheDirective,
        grammar: SelectorGrammar,
    ) -> Result<String> {
        let raw = self.load(location, directive)?;
        let document = TemplateDocument::parse(&raw, grammar);
        let markup = match location.fragment_selector() {
            Some(selector) => document.fragment_html(&selector, "")?,
            None => document
                .select("css:body", &QueryContext::Document)?
                .iter()
                .map(|body| body.inner_html().to_string())
                .collect(),
        };
        if markup.trim().is_empty() {
            return Err(Error::import_owned(format!("Import '{}' produced no content", location)));
        }
        Ok(markup)
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.borrow().stats()
    }

    pub fn is_cached(&self, location: &ImportLocation) -> bool {
        self.cache.borrow().contains(&location.source_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    const PAGE: &str = r#"<html><body><nav id="nav"><a>Home</a></nav><ul class="menu"><li>1</li><li>2</li></ul><p></p></body></html>"#;

    fn counting_importer() -> (Importer, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let fetcher = move |_: &ImportLocation| -> Result<String> {
            counter.set(counter.get() + 1);
            Ok(PAGE.to_string())
        };
        (Importer::new(Box::new(fetcher)), calls)
    }

    #[test]
    fn test_location_parsing() {
        let location = ImportLocation::parse("file:parts/header.html#nav").unwrap();
        assert_eq!(location.source, ImportSource::File(PathBuf::from("parts/header.html")));
        assert_eq!(location.fragment.as_deref(), Some("nav"));
        assert_eq!(location.fragment_selector().as_deref(), Some("css:#nav"));

        let location = ImportLocation::parse("url:https://example.com/page#ul.menu > li").unwrap();
        assert_eq!(location.source, ImportSource::Url("https://example.com/page".to_string()));
        assert_eq!(location.fragment_selector().as_deref(), Some("ul.menu > li"));

        let location = ImportLocation::parse("https://example.com").unwrap();
        assert_eq!(location.source_key(), "url:https://example.com");
        assert_eq!(location.fragment, None);

        assert!(matches!(ImportLocation::parse("file:"), Err(Error::ImportError(_))));
    }

    #[test]
    fn test_resolve_fragments() {
        let (importer, _) = counting_importer();
        let grammar = SelectorGrammar::Css;

        let nav = ImportLocation::parse("file:page.html#nav").unwrap();
        assert_eq!(
            importer.resolve(&nav, CacheDirective::Default, grammar).unwrap(),
            r#"<nav id="nav"><a>Home</a></nav>"#
        );

        let items = ImportLocation::parse("file:page.html#.menu li").unwrap();
        assert_eq!(
            importer.resolve(&items, CacheDirective::Default, grammar).unwrap(),
            "<li>1</li><li>2</li>"
        );

        let whole = ImportLocation::parse("file:page.html").unwrap();
        assert!(importer
            .resolve(&whole, CacheDirective::Default, grammar)
            .unwrap()
            .starts_with(r#"<nav id="nav">"#));
    }

    #[test]
    fn test_empty_fragment_is_an_error() {
        let (importer, _) = counting_importer();
        let location = ImportLocation::parse("file:page.html#missing").unwrap();
        let err = importer
            .resolve(&location, CacheDirective::Default, SelectorGrammar::Css)
            .unwrap_err();
        assert!(matches!(err, Error::ImportError(_)));
        assert!(err.to_string().contains("file:page.html#missing"));
    }

    #[test]
    fn test_cache_directives() {
        let (importer, calls) = counting_importer();
        let location = ImportLocation::parse("url:https://example.com/a#nav").unwrap();

        importer.load(&location, CacheDirective::Default).unwrap();
        importer.load(&location, CacheDirective::Default).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(importer.cache_stats(), (1, 1));

        importer.load(&location, CacheDirective::NoCache).unwrap();
        assert_eq!(calls.get(), 2);
        assert!(importer.is_cached(&location));

        importer.load(&location, CacheDirective::MustRevalidate).unwrap();
        assert_eq!(calls.get(), 3);
        assert!(importer.is_cached(&location));

        let other = ImportLocation::parse("url:https://example.com/b").unwrap();
        importer.load(&other, CacheDirective::NoStore).unwrap();
        assert_eq!(calls.get(), 4);
        assert!(!importer.is_cached(&other));
    }

    #[test]
    fn test_default_fetcher_reads_files() {
        let path = std::env::temp_dir().join("html_datastack_import_test.html");
        std::fs::write(&path, "<p>imported</p>").unwrap();

        let location = ImportLocation::parse(&format!("file:{}", path.display())).unwrap();
        let markup = Importer::default()
            .resolve(&location, CacheDirective::Default, SelectorGrammar::Css)
            .unwrap();
        assert_eq!(markup, "<p>imported</p>");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_default_fetcher_missing_file() {
        let location = ImportLocation::parse("file:/nonexistent/part.html").unwrap();
        let err = DefaultFetcher::new().fetch(&location).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("Failed to read file"));
    }
}
