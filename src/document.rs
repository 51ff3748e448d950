//! The document a template renders into, and the query layer over it
//!
//! [`TemplateDocument`] owns the parsed `dom_query` document together with
//! the selector compiler and the query log. Every lookup the engine makes
//! goes through [`TemplateDocument::query`]: the selector is compiled to
//! XPath, scoped to its context and evaluated, and nodes already settled by
//! an earlier render pass are left out of the result.

use std::cell::RefCell;
use std::fmt;

use dom_query::{Document, NodeRef};
use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::node_ext::NodeExt;
use crate::selector::{CompiledSelector, SelectorCompiler};
use crate::types::{SelectorGrammar, NO_PARSE_ATTR};
use crate::xpath::XPathExpr;

/// Where a query is evaluated from
#[derive(Debug, Clone)]
pub enum QueryContext<'a> {
    /// The whole document
    Document,
    /// Descendants of a node
    Node(NodeRef<'a>),
    /// One or more absolute context paths, pipe-delimited
    Paths(String),
}

/// What [`TemplateDocument::query`] produces
#[derive(Debug)]
pub enum QueryOutput<'a> {
    Nodes(Vec<NodeRef<'a>>),
    /// The scoped expression, when evaluation was not requested
    Expression(String),
}

/// One executed query and its match count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub expression: String,
    pub matches: usize,
}

impl fmt::Display for QueryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">> {} -> ({})", self.expression, self.matches)
    }
}

/// A parsed document plus its query machinery
pub struct TemplateDocument {
    doc: Document,
    compiler: SelectorCompiler,
    queries: RefCell<Vec<QueryRecord>>,
}

impl fmt::Debug for TemplateDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDocument")
            .field("compiler", &self.compiler)
            .field("queries", &self.queries.borrow().len())
            .finish()
    }
}

impl TemplateDocument {
    pub fn parse(html: &str, grammar: SelectorGrammar) -> Self {
        Self {
            doc: Document::from(html),
            compiler: SelectorCompiler::new(grammar),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Replace the tree with a fresh parse of `html`, keeping the query log
    pub fn reload(&mut self, html: &str) {
        self.doc = Document::from(html);
    }

    /// The document node
    pub fn root(&self) -> NodeRef<'_> {
        self.doc.root()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn compiler(&self) -> &SelectorCompiler {
        &self.compiler
    }

    /// Serialize the whole document
    pub fn html(&self) -> String {
        self.doc.html().to_string()
    }

    /// Outer HTML of every element matching `selector`, joined by `separator`
    pub fn fragment_html(&self, selector: &str, separator: &str) -> Result<String> {
        let parts: Vec<String> = self
            .select(selector, &QueryContext::Document)?
            .iter()
            .map(|node| node.html().to_string())
            .collect();
        Ok(parts.join(separator))
    }

    /// Remove an attribute from every element carrying it
    pub fn strip_attribute(&self, name: &str) {
        self.doc.select(&format!("[{}]", name)).remove_attr(name);
    }

    /// Every query executed so far
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries.borrow().clone()
    }

    /// Compile and run a selector, returning the matching elements
    pub fn select<'a>(&'a self, selector: &str, context: &QueryContext<'a>) -> Result<Vec<NodeRef<'a>>> {
        let compiled = self.compiler.compile(selector)?;
        self.select_compiled(&compiled, context)
    }

    pub fn select_compiled<'a>(
        &'a self,
        compiled: &CompiledSelector,
        context: &QueryContext<'a>,
    ) -> Result<Vec<NodeRef<'a>>> {
        match self.query_compiled(compiled, context, true)? {
            QueryOutput::Nodes(nodes) => Ok(nodes),
            QueryOutput::Expression(_) => Ok(Vec::new()),
        }
    }

    /// Compile `selector` and either run it or return the scoped expression
    pub fn query<'a>(
        &'a self,
        selector: &str,
        context: &QueryContext<'a>,
        evaluate: bool,
    ) -> Result<QueryOutput<'a>> {
        let compiled = self.compiler.compile(selector)?;
        self.query_compiled(&compiled, context, evaluate)
    }

    pub fn query_compiled<'a>(
        &'a self,
        compiled: &CompiledSelector,
        context: &QueryContext<'a>,
        evaluate: bool,
    ) -> Result<QueryOutput<'a>> {
        let root = self.doc.root();
        let (expression, context_node) = match context {
            QueryContext::Document => (compiled.expression(), root.clone()),
            QueryContext::Node(node) => (compiled.scoped(&["."]), node.clone()),
            QueryContext::Paths(paths) => {
                let paths: Vec<&str> = paths
                    .split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect();
                (compiled.scoped(&paths), root.clone())
            }
        };
        if !evaluate {
            return Ok(QueryOutput::Expression(expression));
        }

        let nodes: Vec<NodeRef<'a>> = XPathExpr::parse(&expression)?
            .select_nodes(&root, &context_node)?
            .into_iter()
            .filter(|node| node.is_element() && !node.has_attr(NO_PARSE_ATTR))
            .collect();

        let logged = match context {
            QueryContext::Node(node) => {
                let path = node.node_path();
                compiled.scoped(&[path.as_str()])
            }
            _ => expression,
        };
        debug!(">> {} -> ({})", logged, nodes.len());
        self.queries.borrow_mut().push(QueryRecord {
            expression: logged,
            matches: nodes.len(),
        });
        Ok(QueryOutput::Nodes(nodes))
    }
}
