//! XPath 1.0 evaluation over `dom_query` documents
//!
//! Compiled selectors are plain XPath strings. This module parses them with
//! `nom` and evaluates them against the document arena, so every query the
//! template engine issues goes through one code path regardless of the
//! grammar the author wrote it in.
//!
//! ```rust,ignore
//! use dom_query::Document;
//! use html_datastack::xpath::XPathExpr;
//!
//! let doc = Document::from("<ul><li>a</li><li>b</li></ul>");
//! let expr = XPathExpr::parse("//li[last()]")?;
//! let nodes = expr.select_nodes(&doc.root(), &doc.root())?;
//! assert_eq!(nodes.len(), 1);
//! ```

pub mod ast;
pub mod engine;
pub mod parser;

use dom_query::NodeRef;
use thiserror::Error;

pub use engine::{XNode, XPathValue};

/// Errors raised while parsing or evaluating an XPath expression
#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("Malformed XPath query: {query} ({detail})")]
    Parse { query: String, detail: String },

    #[error("XPath function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("XPath type error: {0}")]
    Type(String),
}

impl From<XPathError> for crate::error::Error {
    fn from(err: XPathError) -> Self {
        crate::error::Error::selector_owned(err.to_string())
    }
}

/// A parsed XPath expression, ready to be evaluated any number of times
#[derive(Debug, Clone)]
pub struct XPathExpr {
    source: String,
    ast: ast::Expression,
}

impl XPathExpr {
    /// Parse an expression
    pub fn parse(source: &str) -> Result<Self, XPathError> {
        let ast = parser::parse_expression(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// The expression text this was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &ast::Expression {
        &self.ast
    }

    /// Evaluate against `context`, resolving absolute paths from `root`
    pub fn evaluate<'a>(
        &self,
        root: &NodeRef<'a>,
        context: &NodeRef<'a>,
    ) -> Result<XPathValue<'a>, XPathError> {
        engine::evaluate_at(&self.ast, root, context)
    }

    /// Evaluate and return the selected tree nodes in document order
    ///
    /// Attribute nodes in the result are dropped. A result that is not a
    /// node-set is a type error.
    pub fn select_nodes<'a>(
        &self,
        root: &NodeRef<'a>,
        context: &NodeRef<'a>,
    ) -> Result<Vec<NodeRef<'a>>, XPathError> {
        match self.evaluate(root, context)? {
            XPathValue::NodeSet(nodes) => Ok(nodes
                .into_iter()
                .filter_map(|node| match node {
                    XNode::Node(node) => Some(node),
                    XNode::Attribute { .. } => None,
                })
                .collect()),
            other => Err(XPathError::Type(format!(
                "'{}' evaluates to {} instead of a node-set",
                self.source,
                other.type_name()
            ))),
        }
    }
}
