//! Template rendering engine
//!
//! The renderer walks a data stack level by level. For each level it first
//! builds the complete working node list with a [`NodeListPopulator`], then
//! applies every value to its slot. Arrays recurse into a new level whose
//! working list is completed with the level's repeat strategy, so the
//! document is only ever changed after the list that drives the change is
//! frozen.
//!
//! Directive failures are caught where the directive is dispatched. Outside
//! strict mode they become [`Diagnostic`]s and rendering carries on with the
//! next directive.

use std::cell::{Cell, RefCell};

use dom_query::NodeRef;
use log::{debug, warn};

use crate::document::{QueryContext, TemplateDocument};
use crate::error::{Error, Result};
use crate::import::{GlobalImport, Importer};
use crate::node_ext::NodeExt;
use crate::populate::{NodeListPopulator, Targets};
use crate::repeat::RepeatStrategy;
use crate::selector::split_position;
use crate::types::{
    looks_like_markup, ContentType, Diagnostic, EmptyContentPolicy, InsertMode, TemplateConfig,
    ATTR_PREFIX, CONTENT_EMPTY_ATTR, NO_PARSE_ATTR,
};
use crate::value::{ContentValue, DataStack, Directive, Directives, Params, RenderControl};

/// Applies a data stack to a [`TemplateDocument`]
pub struct Renderer<'a> {
    document: &'a TemplateDocument,
    config: &'a TemplateConfig,
    importer: &'a Importer,
    depth: Cell<usize>,
    list_depth: Cell<usize>,
    reparse: Cell<bool>,
    touched: RefCell<Vec<NodeRef<'a>>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl<'a> Renderer<'a> {
    pub fn new(document: &'a TemplateDocument, config: &'a TemplateConfig, importer: &'a Importer) -> Self {
        Self {
            document,
            config,
            importer,
            depth: Cell::new(0),
            list_depth: Cell::new(0),
            reparse: Cell::new(false),
            touched: RefCell::new(Vec::new()),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    /// Splice queued imports into the document
    ///
    /// A failing global import fails the render.
    pub fn resolve_imports(&self, imports: &[GlobalImport]) -> Result<()> {
        for import in imports {
            let markup = self
                .importer
                .resolve(&import.location, import.cache, self.config.selector_grammar)?;
            let compiled = self.document.compiler().compile(&import.selector)?;
            let mode = compiled.insert_mode();
            let targets = self.document.select_compiled(&compiled, &QueryContext::Document)?;
            debug!(
                "importing {} into {} ({} targets)",
                import.location,
                import.selector,
                targets.len()
            );
            for node in targets {
                node.insert_markup(&markup, mode);
            }
        }
        Ok(())
    }

    /// Render the whole data stack from the document root
    ///
    /// `reparse` marks the second pass over a reloaded document. On a first
    /// pass with `parse_inserted_data` enabled, every node that received data
    /// is marked so the second pass only reaches nodes inserted since.
    pub fn render(&self, data: &DataStack, reparse: bool) -> Result<()> {
        self.reparse.set(reparse);
        debug!("rendering {} data stack entries (reparse: {})", data.len(), reparse);
        self.render_level(data, None, &Params::default())?;

        if self.config.parse_inserted_data && !reparse {
            for node in self.touched.borrow().iter() {
                if node.is_element() && node.is_attached() {
                    node.set_attr(NO_PARSE_ATTR, "");
                }
            }
        }
        Ok(())
    }

    /// Directive failures reported so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }

    /// One level of the data stack, one slot per key
    fn render_level(&self, stack: &DataStack, context: Option<&NodeRef<'a>>, inherited: &Params) -> Result<()> {
        let targets = Targets::Named(stack.keys().cloned().collect());
        let mut populator = NodeListPopulator::populate(
            self.document,
            &targets,
            context,
            None,
            false,
            self.config.allow_html_formatting,
        )?;

        for (selector, value) in stack {
            let Some(slot) = populator.seek() else {
                break;
            };
            let mode = split_position(selector).1.unwrap_or_default();
            for node in slot {
                // An earlier entry may have removed it
                if !node.is_attached() {
                    continue;
                }
                if let Err(err) = self.apply_value(selector, &node, value, mode, inherited) {
                    self.report(selector, None, err)?;
                }
            }
        }
        Ok(())
    }

    /// Fill a list of items into the children of `source`, or into copies of
    /// `source` itself when `self_repeat` is set
    fn render_items(
        &self,
        selector: &str,
        source: &NodeRef<'a>,
        items: &[ContentValue],
        self_repeat: bool,
        params: &Params,
    ) -> Result<()> {
        let strategy = self.strategy_for(params)?;
        let mut populator = NodeListPopulator::populate(
            self.document,
            &Targets::Items(items.len()),
            Some(source),
            Some(&strategy),
            self_repeat,
            self.config.allow_html_formatting,
        )?;
        let nested = inheritable(params);

        self.list_depth.set(self.list_depth.get() + 1);
        let result = self.descend(|| {
            for item in items {
                let Some(slot) = populator.seek() else {
                    break;
                };
                for node in slot {
                    if let Err(err) = self.apply_value(selector, &node, item, InsertMode::Replace, &nested) {
                        self.report(selector, None, err)?;
                    }
                }
            }
            Ok(())
        });
        self.list_depth.set(self.list_depth.get() - 1);
        result
    }

    fn descend(&self, body: impl FnOnce() -> Result<()>) -> Result<()> {
        self.depth.set(self.depth.get() + 1);
        let result = body();
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn apply_value(
        &self,
        selector: &str,
        node: &NodeRef<'a>,
        value: &ContentValue,
        mode: InsertMode,
        inherited: &Params,
    ) -> Result<()> {
        self.touched.borrow_mut().push(node.clone());
        match value {
            ContentValue::Directives(directives) => {
                self.apply_directives(selector, node, directives, mode, inherited)?;
            }
            other => {
                let params = layered(&node_params(node)?, inherited);
                self.apply_content(selector, node, other, mode, &params)?;
            }
        }
        Ok(())
    }

    /// Insert a content value, returning the node later directives apply to
    fn apply_content(
        &self,
        selector: &str,
        node: &NodeRef<'a>,
        value: &ContentValue,
        mode: InsertMode,
        params: &Params,
    ) -> Result<Option<NodeRef<'a>>> {
        match value {
            ContentValue::Text(text) => Ok(self.insert_content(node, text, mode, params)),
            ContentValue::List(items) => {
                self.render_items(selector, node, items, false, params)?;
                Ok(Some(node.clone()))
            }
            ContentValue::Map(stack) => {
                let nested = inheritable(params);
                self.descend(|| self.render_level(stack, Some(node), &nested))?;
                Ok(Some(node.clone()))
            }
            ContentValue::Directives(directives) => {
                self.apply_directives(selector, node, directives, mode, params)?;
                Ok(Some(node.clone()))
            }
        }
    }

    fn apply_directives(
        &self,
        selector: &str,
        node: &NodeRef<'a>,
        directives: &Directives,
        mode: InsertMode,
        inherited: &Params,
    ) -> Result<()> {
        let params = layered(&node_params(node)?, &layered(&directives.params, inherited));
        let mut current = Some(node.clone());

        for directive in directives.ordered() {
            let Some(target) = current.clone().filter(|n| n.is_attached()) else {
                debug!("{}: node gone, skipping {}", selector, directive.key());
                break;
            };
            match self.apply_directive(selector, &target, directive, mode, &params) {
                Ok(next) => current = next,
                Err(err) => self.report(selector, Some(directive.key()), err)?,
            }
        }
        Ok(())
    }

    fn apply_directive(
        &self,
        selector: &str,
        target: &NodeRef<'a>,
        directive: &Directive,
        default_mode: InsertMode,
        params: &Params,
    ) -> Result<Option<NodeRef<'a>>> {
        match directive {
            Directive::Attr { mode, attrs } => {
                let mode = resolve_mode(*mode, default_mode);
                for (name, value) in attrs {
                    match value {
                        Some(value) => target.merge_attr(name, value, mode),
                        None => target.remove_attr(name),
                    }
                }
                Ok(Some(target.clone()))
            }
            Directive::Content { mode, value } | Directive::Children { mode, value } => {
                self.apply_content(selector, target, value, resolve_mode(*mode, default_mode), params)
            }
            Directive::Import { mode, location } => {
                let markup = self.importer.resolve(
                    location,
                    params.cache.unwrap_or_default(),
                    self.config.selector_grammar,
                )?;
                Ok(self.insert_content(target, &markup, resolve_mode(*mode, default_mode), params))
            }
            Directive::Render(control) => match control {
                RenderControl::Keep => Ok(Some(target.clone())),
                RenderControl::Remove => {
                    target.remove_from_parent();
                    Ok(None)
                }
                RenderControl::Unwrap => {
                    target.unwrap_element();
                    Ok(None)
                }
                RenderControl::Rename(name) => {
                    if target.tag_name().as_deref() == Some(name.as_str()) {
                        return Ok(Some(target.clone()));
                    }
                    if !is_valid_tag_name(name) {
                        return Err(Error::directive_owned(format!(
                            "Invalid tag name '{}' for @render",
                            name
                        )));
                    }
                    let renamed = target.rename_element(name);
                    self.touched.borrow_mut().push(renamed.clone());
                    Ok(Some(renamed))
                }
            },
            Directive::Repeat(value) => {
                let items = match value {
                    ContentValue::List(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                self.render_items(selector, target, items, true, params)?;
                Ok(Some(target.clone()))
            }
        }
    }

    /// Write a string into `node`, returning the node that stays current
    fn insert_content(
        &self,
        node: &NodeRef<'a>,
        text: &str,
        mode: InsertMode,
        params: &Params,
    ) -> Option<NodeRef<'a>> {
        if text.is_empty() {
            let policy = params.on_content_empty.unwrap_or(self.config.on_content_empty);
            return apply_empty_policy(node, policy, mode);
        }

        let content_type = params.content_type.or(self.config.content_type).unwrap_or(
            if looks_like_markup(text) {
                ContentType::Markup
            } else {
                ContentType::Cdata
            },
        );
        match content_type {
            ContentType::Markup => node.insert_markup(text, mode),
            ContentType::Text | ContentType::Cdata => node.insert_text(text, mode),
        }
        Some(node.clone())
    }

    /// The repeat strategy for a list at the current nesting
    ///
    /// Odd list depths use the Y-axis function when one is configured.
    fn strategy_for(&self, params: &Params) -> Result<RepeatStrategy> {
        if let Some(strategy) = params.repeat_fn {
            return Ok(strategy);
        }
        let configured = match self.config.repeat_fn_y() {
            Some(y_axis) if self.list_depth.get() % 2 == 1 => y_axis,
            _ => self.config.repeat_fn(),
        };
        configured.parse()
    }

    fn report(&self, selector: &str, directive: Option<String>, err: Error) -> Result<()> {
        if self.config.strict || !err.is_directive_level() {
            return Err(err);
        }
        let diagnostic = Diagnostic {
            selector: selector.to_string(),
            directive,
            message: err.to_string(),
        };
        if self.reparse.get() {
            warn!("{} (depth {}, inserted content)", diagnostic, self.depth.get());
        } else {
            warn!("{} (depth {})", diagnostic, self.depth.get());
        }
        self.diagnostics.borrow_mut().push(diagnostic);
        Ok(())
    }
}

fn resolve_mode(directive_mode: InsertMode, selector_mode: InsertMode) -> InsertMode {
    match directive_mode {
        InsertMode::Replace => selector_mode,
        explicit => explicit,
    }
}

fn apply_empty_policy<'a>(node: &NodeRef<'a>, policy: EmptyContentPolicy, mode: InsertMode) -> Option<NodeRef<'a>> {
    match policy {
        EmptyContentPolicy::DoNothing => {
            if mode == InsertMode::Replace {
                node.clear_children();
            }
        }
        EmptyContentPolicy::Clear => node.clear_children(),
        EmptyContentPolicy::SetFlag => node.set_attr(CONTENT_EMPTY_ATTR, ""),
        EmptyContentPolicy::ClearAndSetFlag => {
            node.clear_children();
            node.set_attr(CONTENT_EMPTY_ATTR, "");
        }
        EmptyContentPolicy::NoRender => {
            let parent = node.parent().filter(|p| p.is_element());
            node.remove_from_parent();
            return parent;
        }
    }
    Some(node.clone())
}

/// Overrides written on the element itself as `data-tpl-*` attributes
fn node_params(node: &NodeRef) -> Result<Params> {
    let read = |name: &str| node.attr(&format!("{}{}", ATTR_PREFIX, name));
    Ok(Params {
        content_type: read("content_type").map(|v| v.parse()).transpose()?,
        repeat_fn: read("repeat_fn").map(|v| v.parse()).transpose()?,
        on_content_empty: read("on_content_empty").map(|v| v.parse()).transpose()?,
        cache: read("cache").map(|v| v.parse()).transpose()?,
    })
}

/// `inner` wins over `outer` field by field
fn layered(inner: &Params, outer: &Params) -> Params {
    Params {
        content_type: inner.content_type.or(outer.content_type),
        repeat_fn: inner.repeat_fn.or(outer.repeat_fn),
        on_content_empty: inner.on_content_empty.or(outer.on_content_empty),
        cache: inner.cache.or(outer.cache),
    }
}

/// Params passed down to nested levels; repeat functions stay with their level
fn inheritable(params: &Params) -> Params {
    Params {
        repeat_fn: None,
        ..params.clone()
    }
}

fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportLocation;
    use crate::types::SelectorGrammar;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stack(value: serde_json::Value) -> DataStack {
        match ContentValue::from_json(value).unwrap() {
            ContentValue::Map(stack) => stack,
            other => panic!("expected a data stack, got {:?}", other),
        }
    }

    fn body(document: &TemplateDocument) -> String {
        document.select("body", &QueryContext::Document).unwrap()[0]
            .inner_html()
            .to_string()
    }

    fn render_with(
        html: &str,
        data: serde_json::Value,
        config: &TemplateConfig,
        importer: &Importer,
    ) -> (String, Vec<Diagnostic>) {
        let document = TemplateDocument::parse(html, config.selector_grammar());
        let renderer = Renderer::new(&document, config, importer);
        renderer.render(&stack(data), false).unwrap();
        let diagnostics = renderer.into_diagnostics();
        (body(&document), diagnostics)
    }

    fn render(html: &str, data: serde_json::Value) -> String {
        let (html, diagnostics) = render_with(html, data, &TemplateConfig::default(), &Importer::default());
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        html
    }

    #[test]
    fn test_scalar_replaces_content() {
        assert_eq!(render("<p>old</p>", json!({"p": "new"})), "<p>new</p>");
        assert_eq!(render("<p>old</p><span>s</span>", json!({"h1": "missing"})), "<p>old</p><span>s</span>");
    }

    #[test]
    fn test_selector_position_suffix() {
        assert_eq!(render("<p>hello</p>", json!({"p::after": " world"})), "<p>hello world</p>");
        assert_eq!(render("<p>world</p>", json!({"p::before": "hello "})), "<p>hello world</p>");
    }

    #[test]
    fn test_content_type_inference_and_override() {
        assert_eq!(render("<p></p>", json!({"p": "<b>hi</b>"})), "<p><b>hi</b></p>");
        assert_eq!(
            render(
                "<p></p>",
                json!({"p": {"@content": "<b>hi</b>", "@params": {"content_type": "text"}}})
            ),
            "<p>&lt;b&gt;hi&lt;/b&gt;</p>"
        );
        assert_eq!(render("<p></p>", json!({"p": "1 < 2"})), "<p>1 &lt; 2</p>");
    }

    #[test]
    fn test_node_attribute_overrides_content_type() {
        assert_eq!(
            render(r#"<p data-tpl-content_type="text">x</p>"#, json!({"p": "<i>y</i>"})),
            r#"<p data-tpl-content_type="text">&lt;i&gt;y&lt;/i&gt;</p>"#
        );
    }

    #[test]
    fn test_attr_modes() {
        let html = r#"<a class="old">x</a>"#;
        assert_eq!(
            render(html, json!({"a": {"@attr": {"class": "new"}}})),
            r#"<a class="new">x</a>"#
        );
        assert_eq!(
            render(html, json!({"a": {"@attr::after": {"class": "new"}}})),
            r#"<a class="old new">x</a>"#
        );
        assert_eq!(
            render(html, json!({"a": {"@attr::before": {"class": "new"}}})),
            r#"<a class="new old">x</a>"#
        );
        assert_eq!(render(html, json!({"a": {"@attr": {"class": null}}})), "<a>x</a>");
    }

    #[test]
    fn test_list_fills_children() {
        assert_eq!(
            render("<ul><li>x</li></ul>", json!({"ul": ["a", "b", "c"]})),
            "<ul><li>a</li><li>b</li><li>c</li></ul>"
        );
    }

    #[test]
    fn test_list_of_maps() {
        let html = r#"<ul><li><span class="name"></span><em></em></li></ul>"#;
        let data = json!({"ul": [
            {"span.name": "A", "em": "1"},
            {"span.name": "B", "em": "2"}
        ]});
        assert_eq!(
            render(html, data),
            r#"<ul><li><span class="name">A</span><em>1</em></li><li><span class="name">B</span><em>2</em></li></ul>"#
        );
    }

    #[test]
    fn test_nested_map_is_scoped_to_node() {
        let html = r#"<h2>outside</h2><div class="card"><h2></h2><p></p></div>"#;
        assert_eq!(
            render(html, json!({"div.card": {"h2": "T", "p": "B"}})),
            r#"<h2>outside</h2><div class="card"><h2>T</h2><p>B</p></div>"#
        );
    }

    #[test]
    fn test_nested_lists() {
        let html = r#"<div class="grid"><div class="row"><span>c</span></div></div>"#;
        assert_eq!(
            render(html, json!({"div.grid": [["a", "b"], ["c", "d"]]})),
            r#"<div class="grid"><div class="row"><span>a</span><span>b</span></div><div class="row"><span>c</span><span>d</span></div></div>"#
        );
    }

    #[test]
    fn test_y_axis_repeat_function() {
        let html = r#"<div class="grid"><div class="row"><i class="p"></i><i class="q"></i></div></div>"#;
        let data = json!({"div.grid": [["a", "b", "c"]]});

        let (x_only, _) = render_with(html, data.clone(), &TemplateConfig::default(), &Importer::default());
        assert_eq!(
            x_only,
            r#"<div class="grid"><div class="row"><i class="p">a</i><i class="q">b</i><i class="q">c</i></div></div>"#
        );

        let config = TemplateConfig::default().with_repeat_fn_y("repeat-first");
        let (with_y, _) = render_with(html, data, &config, &Importer::default());
        assert_eq!(
            with_y,
            r#"<div class="grid"><div class="row"><i class="p">a</i><i class="p">b</i><i class="q">c</i></div></div>"#
        );
    }

    #[test]
    fn test_render_controls() {
        assert_eq!(
            render(r#"<div id="a"><span>x</span></div>"#, json!({"#a": {"@render": "section"}})),
            r#"<section id="a"><span>x</span></section>"#
        );
        assert_eq!(
            render("<div><span>x</span></div>", json!({"span": {"@render": ""}})),
            "<div>x</div>"
        );
        assert_eq!(
            render("<div><span>x</span></div>", json!({"span": {"@render": false}})),
            "<div></div>"
        );
        assert_eq!(
            render("<div><span>x</span></div>", json!({"span": {"@render": true, "@content": "y"}})),
            "<div><span>y</span></div>"
        );
    }

    #[test]
    fn test_directives_after_removal_are_skipped() {
        assert_eq!(
            render(
                "<ul><li>x</li></ul>",
                json!({"li": {"@render": false, "@repeat": ["a", "b"]}})
            ),
            "<ul></ul>"
        );
    }

    #[test]
    fn test_repeat_directive_copies_node_itself() {
        assert_eq!(
            render(
                r#"<ul><li class="i">x</li></ul>"#,
                json!({"li.i": {"@attr": {"title": "t"}, "@repeat": ["a", "b"]}})
            ),
            r#"<ul><li class="i" title="t">a</li><li class="i" title="t">b</li></ul>"#
        );
    }

    #[test]
    fn test_empty_content_policies() {
        let case = |policy: &str| {
            render(
                "<p>old</p>",
                json!({"p": {"@content": "", "@params": {"on_content_empty": policy}}}),
            )
        };
        assert_eq!(case("do_nothing"), "<p></p>");
        assert_eq!(case("clear"), "<p></p>");
        assert_eq!(case("set_flag"), r#"<p data-tpl-content_empty="">old</p>"#);
        assert_eq!(case("clear_and_set_flag"), r#"<p data-tpl-content_empty=""></p>"#);
        assert_eq!(case("no_render"), "");
    }

    #[test]
    fn test_no_render_promotes_parent() {
        assert_eq!(
            render(
                "<div><p>old</p></div>",
                json!({"p": {
                    "@content": "",
                    "@render": "section",
                    "@params": {"on_content_empty": "no_render"}
                }})
            ),
            "<section></section>"
        );
    }

    #[test]
    fn test_attr_follows_the_promoted_parent() {
        let case = |data: serde_json::Value| render("<div><p>old</p></div>", json!({ "p": data }));
        assert_eq!(
            case(json!({
                "@content": "",
                "@attr": {"class": "x"},
                "@params": {"on_content_empty": "no_render"}
            })),
            r#"<div class="x"></div>"#
        );
        assert_eq!(
            case(json!({
                "@attr": {"class": "x"},
                "@content": "",
                "@params": {"on_content_empty": "no_render"}
            })),
            "<div></div>"
        );
    }

    #[test]
    fn test_bad_node_attribute_is_reported() {
        let html = r#"<ul data-tpl-repeat_fn="bogus"><li></li></ul><p></p>"#;
        let data = json!({"ul": ["a", "b"], "p": "still rendered"});
        let (output, diagnostics) =
            render_with(html, data.clone(), &TemplateConfig::default(), &Importer::default());

        assert_eq!(
            output,
            r#"<ul data-tpl-repeat_fn="bogus"><li></li></ul><p>still rendered</p>"#
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].selector, "ul");
        assert!(diagnostics[0].message.contains("bogus"));

        let config = TemplateConfig::default().with_strict(true);
        let document = TemplateDocument::parse(html, SelectorGrammar::Css);
        let importer = Importer::default();
        let renderer = Renderer::new(&document, &config, &importer);
        assert!(matches!(
            renderer.render(&stack(data), false),
            Err(Error::DirectiveError(_))
        ));
    }

    #[test]
    fn test_import_directive() {
        let importer = Importer::new(Box::new(|location: &ImportLocation| -> Result<String> {
            match location.source_key().as_str() {
                "file:nav.html" => Ok("<html><body><nav>n</nav></body></html>".to_string()),
                other => Err(Error::import_owned(format!("no such import {}", other))),
            }
        }));
        let (output, diagnostics) = render_with(
            "<header></header><footer></footer><p></p>",
            json!({
                "header": {"@import": "file:nav.html"},
                "footer": {"@import::after": "file:missing.html"},
                "p": "after"
            }),
            &TemplateConfig::default(),
            &importer,
        );
        assert_eq!(output, "<header><nav>n</nav></header><footer></footer><p>after</p>");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].directive.as_deref(), Some("@import::after"));
    }

    #[test]
    fn test_global_imports() {
        let importer = Importer::new(Box::new(|_: &ImportLocation| -> Result<String> {
            Ok(r#"<div id="menu"><a>Home</a></div><p>ignored</p>"#.to_string())
        }));
        let config = TemplateConfig::default();
        let document = TemplateDocument::parse("<nav><span>first</span></nav>", SelectorGrammar::Css);
        let renderer = Renderer::new(&document, &config, &importer);
        let imports = vec![GlobalImport {
            selector: "nav::after".to_string(),
            location: ImportLocation::parse("file:menu.html#menu").unwrap(),
            cache: Default::default(),
        }];
        renderer.resolve_imports(&imports).unwrap();
        renderer.render(&stack(json!({"a": "Start"})), false).unwrap();
        assert_eq!(
            body(&document),
            r#"<nav><span>first</span><div id="menu"><a>Start</a></div></nav>"#
        );
    }

    #[test]
    fn test_marks_touched_nodes_after_the_pass() {
        let config = TemplateConfig::default().with_parse_inserted_data(true);
        let (output, _) = render_with(
            "<p></p><div><p></p></div>",
            json!({"p": "x", "div": {"p": "y"}}),
            &config,
            &Importer::default(),
        );
        assert_eq!(
            output,
            r#"<p data-tpl-no_parse="">x</p><div data-tpl-no_parse=""><p data-tpl-no_parse="">y</p></div>"#
        );
    }

    #[test]
    fn test_invalid_rename_is_reported() {
        let (output, diagnostics) = render_with(
            "<p>x</p>",
            json!({"p": {"@render": "not a tag"}}),
            &TemplateConfig::default(),
            &Importer::default(),
        );
        assert_eq!(output, "<p>x</p>");
        assert_eq!(diagnostics[0].directive.as_deref(), Some("@render"));
    }
}
