//! The evaluation engine for executing a parsed XPath AST against a `dom_query` tree.

use std::collections::HashMap;
use std::fmt;

use dom_query::{NodeId, NodeRef};
use once_cell::unsync::OnceCell;

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
use super::XPathError;

/// A node an expression can select: a tree node or an attribute of an element.
#[derive(Clone)]
pub enum XNode<'a> {
    Node(NodeRef<'a>),
    Attribute {
        owner: NodeRef<'a>,
        index: usize,
        name: String,
        value: String,
    },
}

impl<'a> XNode<'a> {
    fn same(&self, other: &XNode<'a>) -> bool {
        match (self, other) {
            (XNode::Node(a), XNode::Node(b)) => a.id == b.id,
            (
                XNode::Attribute { owner: a, index: i, .. },
                XNode::Attribute { owner: b, index: j, .. },
            ) => a.id == b.id && i == j,
            _ => false,
        }
    }

    /// The XPath string-value of the node.
    pub fn string_value(&self) -> String {
        match self {
            XNode::Node(node) => node.text().to_string(),
            XNode::Attribute { value, .. } => value.clone(),
        }
    }

    /// Element or attribute name; empty for other nodes.
    pub fn name(&self) -> String {
        match self {
            XNode::Node(node) if node.is_element() => {
                node.node_name().map(|n| n.to_string()).unwrap_or_default()
            }
            XNode::Node(_) => String::new(),
            XNode::Attribute { name, .. } => name.clone(),
        }
    }
}

impl fmt::Debug for XNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XNode::Node(node) => write!(f, "Node({:?})", node.id),
            XNode::Attribute { name, value, .. } => write!(f, "Attribute({}={:?})", name, value),
        }
    }
}

/// The possible result types of an XPath expression evaluation.
#[derive(Debug, Clone)]
pub enum XPathValue<'a> {
    NodeSet(Vec<XNode<'a>>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a> XPathValue<'a> {
    /// Coerces the value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => parse_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| parse_number(&n.string_value()))
                .unwrap_or(f64::NAN),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "a node-set",
            XPathValue::String(_) => "a string",
            XPathValue::Number(_) => "a number",
            XPathValue::Boolean(_) => "a boolean",
        }
    }
}

impl fmt::Display for XPathValue<'_> {
    /// Coerces the value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Pre-order positions of the document's nodes, used to sort node-sets.
struct DocumentOrder {
    positions: HashMap<NodeId, usize>,
}

impl DocumentOrder {
    fn new(root: &NodeRef<'_>) -> Self {
        Self {
            positions: preorder(root)
                .into_iter()
                .enumerate()
                .map(|(position, node)| (node.id, position))
                .collect(),
        }
    }

    /// Nodes outside the document sort last
    fn position(&self, id: &NodeId) -> usize {
        self.positions.get(id).copied().unwrap_or(usize::MAX)
    }

    fn key(&self, node: &XNode<'_>) -> (usize, usize) {
        match node {
            XNode::Node(node) => (self.position(&node.id), 0),
            XNode::Attribute { owner, index, .. } => (self.position(&owner.id), index + 1),
        }
    }
}

/// All state needed while evaluating one expression.
pub struct EvaluationContext<'a, 'd> {
    pub context_node: XNode<'a>,
    pub context_position: usize,
    pub context_size: usize,
    root: &'d NodeRef<'a>,
    order: &'d OnceCell<DocumentOrder>,
}

impl<'a, 'd> EvaluationContext<'a, 'd> {
    fn with_node(&self, node: XNode<'a>, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            context_position: position,
            context_size: size,
            root: self.root,
            order: self.order,
        }
    }

    fn document_order(&self) -> &DocumentOrder {
        self.order.get_or_init(|| DocumentOrder::new(self.root))
    }

    /// Sorts into document order and removes duplicates.
    fn normalize(&self, nodes: Vec<XNode<'a>>) -> Vec<XNode<'a>> {
        let order = self.document_order();
        let mut keyed: Vec<((usize, usize), XNode<'a>)> =
            nodes.into_iter().map(|n| (order.key(&n), n)).collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.dedup_by(|a, b| a.0 == b.0 && a.1.same(&b.1));
        keyed.into_iter().map(|(_, n)| n).collect()
    }
}

/// Evaluates `expr` with `context` as the context node.
pub fn evaluate_at<'a>(
    expr: &Expression,
    root: &NodeRef<'a>,
    context: &NodeRef<'a>,
) -> Result<XPathValue<'a>, XPathError> {
    let order = OnceCell::new();
    let e_ctx = EvaluationContext {
        context_node: XNode::Node(context.clone()),
        context_position: 1,
        context_size: 1,
        root,
        order: &order,
    };
    evaluate(expr, &e_ctx)
}

pub fn evaluate<'a>(
    expr: &Expression,
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            Ok(XPathValue::NodeSet(evaluate_location_path(path, e_ctx)?))
        }
        Expression::Filter {
            primary,
            predicates,
        } => {
            let nodes = expect_node_set(evaluate(primary, e_ctx)?, "filter expression")?;
            Ok(XPathValue::NodeSet(apply_predicates(nodes, predicates, e_ctx)?))
        }
        Expression::FunctionCall { name, args } => call_function(name, args, e_ctx),
        Expression::BinaryOp { left, op, right } => evaluate_binary(*op, left, right, e_ctx),
        Expression::Negate(inner) => Ok(XPathValue::Number(-evaluate(inner, e_ctx)?.to_number())),
    }
}

fn expect_node_set<'a>(value: XPathValue<'a>, what: &str) -> Result<Vec<XNode<'a>>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::Type(format!(
            "{} expects a node-set, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn evaluate_location_path<'a>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<Vec<XNode<'a>>, XPathError> {
    let mut current = if let Some(start) = &path.start_point {
        expect_node_set(evaluate(start, e_ctx)?, "path")?
    } else if path.is_absolute {
        vec![XNode::Node(e_ctx.root.clone())]
    } else {
        vec![e_ctx.context_node.clone()]
    };

    for step in &path.steps {
        current = evaluate_step(step, &current, e_ctx)?;
    }
    Ok(current)
}

fn evaluate_step<'a>(
    step: &Step,
    context_nodes: &[XNode<'a>],
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<Vec<XNode<'a>>, XPathError> {
    let mut results = Vec::new();
    for node in context_nodes {
        let candidates: Vec<XNode<'a>> = collect_axis(step.axis, node, e_ctx)
            .into_iter()
            .filter(|candidate| matches_node_test(candidate, &step.node_test, step.axis))
            .collect();
        // Positions inside predicates are relative to each context node.
        results.extend(apply_predicates(candidates, &step.predicates, e_ctx)?);
    }
    if context_nodes.len() > 1 || step.axis.is_reverse() {
        results = e_ctx.normalize(results);
    }
    Ok(results)
}

fn apply_predicates<'a>(
    nodes: Vec<XNode<'a>>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<Vec<XNode<'a>>, XPathError> {
    let mut current = nodes;
    for predicate in predicates {
        let size = current.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in current.into_iter().enumerate() {
            let p_ctx = e_ctx.with_node(node.clone(), i + 1, size);
            let keep = match evaluate(predicate, &p_ctx)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(node);
            }
        }
        current = kept;
    }
    Ok(current)
}

// --- Axes ---

fn preorder<'a>(root: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        for child in node.children().into_iter().rev() {
            stack.push(child);
        }
        out.push(node);
    }
    out
}

fn descendants<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    let mut all = preorder(node);
    all.remove(0);
    all
}

fn ancestors<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        current = parent.parent();
        out.push(parent);
    }
    out
}

fn following_siblings<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    let mut current = node.next_sibling();
    while let Some(sibling) = current {
        current = sibling.next_sibling();
        out.push(sibling);
    }
    out
}

fn preceding_siblings<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        current = sibling.prev_sibling();
        out.push(sibling);
    }
    out
}

fn collect_axis<'a>(axis: Axis, node: &XNode<'a>, e_ctx: &EvaluationContext<'a, '_>) -> Vec<XNode<'a>> {
    let wrap = |nodes: Vec<NodeRef<'a>>| nodes.into_iter().map(XNode::Node).collect::<Vec<_>>();

    // Attributes only have a parent, ancestors and themselves.
    let tree_node = match node {
        XNode::Node(n) => n,
        XNode::Attribute { owner, .. } => {
            return match axis {
                Axis::SelfAxis => vec![node.clone()],
                Axis::Parent => vec![XNode::Node(owner.clone())],
                Axis::Ancestor => {
                    let mut out = vec![XNode::Node(owner.clone())];
                    out.extend(wrap(ancestors(owner)));
                    out
                }
                Axis::AncestorOrSelf => {
                    let mut out = vec![node.clone(), XNode::Node(owner.clone())];
                    out.extend(wrap(ancestors(owner)));
                    out
                }
                Axis::Following => {
                    let mut out = wrap(descendants(owner));
                    out.extend(collect_axis(Axis::Following, &XNode::Node(owner.clone()), e_ctx));
                    out
                }
                Axis::Preceding => collect_axis(Axis::Preceding, &XNode::Node(owner.clone()), e_ctx),
                _ => Vec::new(),
            };
        }
    };

    match axis {
        Axis::Child => wrap(tree_node.children()),
        Axis::Descendant => wrap(descendants(tree_node)),
        Axis::DescendantOrSelf => wrap(preorder(tree_node)),
        Axis::Attribute => {
            if !tree_node.is_element() {
                return Vec::new();
            }
            tree_node
                .attrs()
                .iter()
                .enumerate()
                .map(|(index, attr)| XNode::Attribute {
                    owner: tree_node.clone(),
                    index,
                    name: attr.name.local.to_string(),
                    value: attr.value.to_string(),
                })
                .collect()
        }
        Axis::Parent => wrap(tree_node.parent().into_iter().collect()),
        Axis::Ancestor => wrap(ancestors(tree_node)),
        Axis::AncestorOrSelf => {
            let mut out = vec![tree_node.clone()];
            out.extend(ancestors(tree_node));
            wrap(out)
        }
        Axis::SelfAxis => vec![node.clone()],
        Axis::FollowingSibling => wrap(following_siblings(tree_node)),
        Axis::PrecedingSibling => wrap(preceding_siblings(tree_node)),
        Axis::Following => {
            let mut out = Vec::new();
            let mut current = Some(tree_node.clone());
            while let Some(n) = current {
                for sibling in following_siblings(&n) {
                    out.extend(preorder(&sibling));
                }
                current = n.parent();
            }
            wrap(out)
        }
        Axis::Preceding => {
            let order = e_ctx.document_order();
            let own = order.position(&tree_node.id);
            let ancestor_ids: Vec<NodeId> = ancestors(tree_node).iter().map(|n| n.id).collect();
            let mut out: Vec<NodeRef<'a>> = preorder(e_ctx.root)
                .into_iter()
                .take(own.min(order.positions.len()))
                .filter(|n| !ancestor_ids.contains(&n.id))
                .collect();
            out.reverse();
            wrap(out)
        }
    }
}

fn matches_node_test(node: &XNode<'_>, test: &NodeTest, axis: Axis) -> bool {
    match (test, node) {
        (NodeTest::Wildcard, XNode::Attribute { .. }) => axis == Axis::Attribute,
        (NodeTest::Wildcard, XNode::Node(n)) => axis != Axis::Attribute && n.is_element(),
        (NodeTest::Name(name), XNode::Attribute { name: attr, .. }) => {
            axis == Axis::Attribute && attr.eq_ignore_ascii_case(name)
        }
        (NodeTest::Name(name), XNode::Node(n)) => {
            axis != Axis::Attribute
                && n.is_element()
                && n
                    .node_name()
                    .is_some_and(|tag| tag.eq_ignore_ascii_case(name))
        }
        (NodeTest::NodeType(NodeTypeTest::Node), _) => true,
        (NodeTest::NodeType(NodeTypeTest::Text), XNode::Node(n)) => n.is_text(),
        (NodeTest::NodeType(NodeTypeTest::Comment), XNode::Node(n)) => n.is_comment(),
        (NodeTest::NodeType(_), XNode::Attribute { .. }) => false,
    }
}

// --- Operators ---

fn evaluate_binary<'a>(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    match op {
        BinaryOperator::Or => {
            if evaluate(left, e_ctx)?.to_bool() {
                return Ok(XPathValue::Boolean(true));
            }
            Ok(XPathValue::Boolean(evaluate(right, e_ctx)?.to_bool()))
        }
        BinaryOperator::And => {
            if !evaluate(left, e_ctx)?.to_bool() {
                return Ok(XPathValue::Boolean(false));
            }
            Ok(XPathValue::Boolean(evaluate(right, e_ctx)?.to_bool()))
        }
        BinaryOperator::Union => {
            let mut nodes = expect_node_set(evaluate(left, e_ctx)?, "union")?;
            nodes.extend(expect_node_set(evaluate(right, e_ctx)?, "union")?);
            Ok(XPathValue::NodeSet(e_ctx.normalize(nodes)))
        }
        BinaryOperator::Equals
        | BinaryOperator::NotEquals
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let l = evaluate(left, e_ctx)?;
            let r = evaluate(right, e_ctx)?;
            Ok(XPathValue::Boolean(compare(op, &l, &r)))
        }
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            let l = evaluate(left, e_ctx)?.to_number();
            let r = evaluate(right, e_ctx)?.to_number();
            Ok(XPathValue::Number(match op {
                BinaryOperator::Plus => l + r,
                BinaryOperator::Minus => l - r,
                BinaryOperator::Multiply => l * r,
                BinaryOperator::Divide => l / r,
                _ => l % r,
            }))
        }
    }
}

/// Comparison with node-set existential semantics.
fn compare(op: BinaryOperator, left: &XPathValue<'_>, right: &XPathValue<'_>) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => a.iter().any(|x| {
            let xs = XPathValue::String(x.string_value());
            b.iter()
                .any(|y| compare_atoms(op, &xs, &XPathValue::String(y.string_value())))
        }),
        (XPathValue::NodeSet(nodes), other) => compare_node_set(op, nodes, other, false),
        (other, XPathValue::NodeSet(nodes)) => compare_node_set(op, nodes, other, true),
        _ => compare_atoms(op, left, right),
    }
}

fn compare_node_set(op: BinaryOperator, nodes: &[XNode<'_>], other: &XPathValue<'_>, swapped: bool) -> bool {
    let ordered = |a: &XPathValue<'_>, b: &XPathValue<'_>| {
        if swapped {
            compare_atoms(op, b, a)
        } else {
            compare_atoms(op, a, b)
        }
    };
    match other {
        XPathValue::Boolean(_) => ordered(&XPathValue::Boolean(!nodes.is_empty()), other),
        XPathValue::Number(_) => nodes
            .iter()
            .any(|n| ordered(&XPathValue::Number(parse_number(&n.string_value())), other)),
        _ => nodes
            .iter()
            .any(|n| ordered(&XPathValue::String(n.string_value()), other)),
    }
}

fn compare_atoms(op: BinaryOperator, left: &XPathValue<'_>, right: &XPathValue<'_>) -> bool {
    match op {
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = if matches!(left, XPathValue::Boolean(_)) || matches!(right, XPathValue::Boolean(_)) {
                left.to_bool() == right.to_bool()
            } else if matches!(left, XPathValue::Number(_)) || matches!(right, XPathValue::Number(_)) {
                left.to_number() == right.to_number()
            } else {
                left.to_string() == right.to_string()
            };
            if op == BinaryOperator::Equals {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let (l, r) = (left.to_number(), right.to_number());
            match op {
                BinaryOperator::LessThan => l < r,
                BinaryOperator::LessThanOrEqual => l <= r,
                BinaryOperator::GreaterThan => l > r,
                _ => l >= r,
            }
        }
    }
}

// --- Functions ---

fn arity(name: &str, args: &[Expression], min: usize, max: usize) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        return Err(XPathError::Function {
            function: name.to_string(),
            message: format!("expected {}..={} arguments, got {}", min, max, args.len()),
        });
    }
    Ok(())
}

fn string_arg(args: &[Expression], index: usize, e_ctx: &EvaluationContext<'_, '_>) -> Result<String, XPathError> {
    match args.get(index) {
        Some(arg) => Ok(evaluate(arg, e_ctx)?.to_string()),
        None => Ok(e_ctx.context_node.string_value()),
    }
}

fn number_arg(args: &[Expression], index: usize, e_ctx: &EvaluationContext<'_, '_>) -> Result<f64, XPathError> {
    match args.get(index) {
        Some(arg) => Ok(evaluate(arg, e_ctx)?.to_number()),
        None => Ok(parse_number(&e_ctx.context_node.string_value())),
    }
}

fn call_function<'a>(
    name: &str,
    args: &[Expression],
    e_ctx: &EvaluationContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    let value = match name {
        "last" => {
            arity(name, args, 0, 0)?;
            XPathValue::Number(e_ctx.context_size as f64)
        }
        "position" => {
            arity(name, args, 0, 0)?;
            XPathValue::Number(e_ctx.context_position as f64)
        }
        "count" => {
            arity(name, args, 1, 1)?;
            let nodes = expect_node_set(evaluate(&args[0], e_ctx)?, "count()")?;
            XPathValue::Number(nodes.len() as f64)
        }
        "not" => {
            arity(name, args, 1, 1)?;
            XPathValue::Boolean(!evaluate(&args[0], e_ctx)?.to_bool())
        }
        "true" => {
            arity(name, args, 0, 0)?;
            XPathValue::Boolean(true)
        }
        "false" => {
            arity(name, args, 0, 0)?;
            XPathValue::Boolean(false)
        }
        "boolean" => {
            arity(name, args, 1, 1)?;
            XPathValue::Boolean(evaluate(&args[0], e_ctx)?.to_bool())
        }
        "string" => {
            arity(name, args, 0, 1)?;
            XPathValue::String(string_arg(args, 0, e_ctx)?)
        }
        "concat" => {
            if args.len() < 2 {
                arity(name, args, 2, usize::MAX)?;
            }
            let mut out = String::new();
            for index in 0..args.len() {
                out.push_str(&string_arg(args, index, e_ctx)?);
            }
            XPathValue::String(out)
        }
        "contains" => {
            arity(name, args, 2, 2)?;
            let haystack = string_arg(args, 0, e_ctx)?;
            XPathValue::Boolean(haystack.contains(&string_arg(args, 1, e_ctx)?))
        }
        "starts-with" => {
            arity(name, args, 2, 2)?;
            let haystack = string_arg(args, 0, e_ctx)?;
            XPathValue::Boolean(haystack.starts_with(&string_arg(args, 1, e_ctx)?))
        }
        "substring-before" => {
            arity(name, args, 2, 2)?;
            let s = string_arg(args, 0, e_ctx)?;
            let needle = string_arg(args, 1, e_ctx)?;
            XPathValue::String(s.find(&needle).map(|i| s[..i].to_string()).unwrap_or_default())
        }
        "substring-after" => {
            arity(name, args, 2, 2)?;
            let s = string_arg(args, 0, e_ctx)?;
            let needle = string_arg(args, 1, e_ctx)?;
            XPathValue::String(
                s.find(&needle)
                    .map(|i| s[i + needle.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "substring" => {
            arity(name, args, 2, 3)?;
            let s = string_arg(args, 0, e_ctx)?;
            let start = xpath_round(number_arg(args, 1, e_ctx)?);
            let end = if args.len() == 3 {
                start + xpath_round(number_arg(args, 2, e_ctx)?)
            } else {
                f64::INFINITY
            };
            XPathValue::String(
                s.chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let position = (*i + 1) as f64;
                        position >= start && position < end
                    })
                    .map(|(_, c)| c)
                    .collect(),
            )
        }
        "string-length" => {
            arity(name, args, 0, 1)?;
            XPathValue::Number(string_arg(args, 0, e_ctx)?.chars().count() as f64)
        }
        "normalize-space" => {
            arity(name, args, 0, 1)?;
            let s = string_arg(args, 0, e_ctx)?;
            XPathValue::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "translate" => {
            arity(name, args, 3, 3)?;
            let s = string_arg(args, 0, e_ctx)?;
            let from: Vec<char> = string_arg(args, 1, e_ctx)?.chars().collect();
            let to: Vec<char> = string_arg(args, 2, e_ctx)?.chars().collect();
            XPathValue::String(
                s.chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect(),
            )
        }
        "number" => {
            arity(name, args, 0, 1)?;
            XPathValue::Number(number_arg(args, 0, e_ctx)?)
        }
        "sum" => {
            arity(name, args, 1, 1)?;
            let nodes = expect_node_set(evaluate(&args[0], e_ctx)?, "sum()")?;
            XPathValue::Number(nodes.iter().map(|n| parse_number(&n.string_value())).sum())
        }
        "floor" => {
            arity(name, args, 1, 1)?;
            XPathValue::Number(number_arg(args, 0, e_ctx)?.floor())
        }
        "ceiling" => {
            arity(name, args, 1, 1)?;
            XPathValue::Number(number_arg(args, 0, e_ctx)?.ceil())
        }
        "round" => {
            arity(name, args, 1, 1)?;
            XPathValue::Number(xpath_round(number_arg(args, 0, e_ctx)?))
        }
        "name" | "local-name" => {
            arity(name, args, 0, 1)?;
            let node = match args.first() {
                Some(arg) => expect_node_set(evaluate(arg, e_ctx)?, "name()")?.into_iter().next(),
                None => Some(e_ctx.context_node.clone()),
            };
            XPathValue::String(node.map(|n| n.name()).unwrap_or_default())
        }
        _ => {
            return Err(XPathError::Function {
                function: name.to_string(),
                message: "unknown function".to_string(),
            })
        }
    };
    Ok(value)
}

fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}
