//! CSS to XPath selector compilation
//!
//! Every data-stack key is a selector. Keys are written in a CSS-like
//! grammar or as raw XPath, and are always executed as XPath:
//!
//! - `xpath:` forces passthrough, `css:` forces CSS, anything else follows the
//!   configured default grammar
//! - a trailing `::before` or `::after` is not part of the query; it selects
//!   prepend or append insertion for whatever consumes the selector
//! - comma separated lists compile to one branch each, unioned at query time
//!
//! ```rust
//! use html_datastack::selector::SelectorCompiler;
//! use html_datastack::types::SelectorGrammar;
//!
//! let compiler = SelectorCompiler::new(SelectorGrammar::Css);
//! let compiled = compiler.compile("ul > li.active").unwrap();
//! assert_eq!(
//!     compiled.expression(),
//!     r#"//ul/li[contains(concat(" ", normalize-space(@class), " "), " active ")]"#
//! );
//! ```

use crate::error::{Error, Result};
use crate::types::{InsertMode, SelectorGrammar};

/// A selector compiled to XPath
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelector {
    /// The selector text as written, suffix included
    pub source: String,
    pub grammar: SelectorGrammar,
    /// Insertion position requested by a `::before`/`::after` suffix
    pub position: Option<InsertMode>,
    /// For CSS, one path per comma-separated branch, each starting with `/`
    /// so it can be appended to a context path. For XPath, the expression.
    pub branches: Vec<String>,
}

impl CompiledSelector {
    /// Insertion mode implied by the suffix, `Replace` without one
    pub fn insert_mode(&self) -> InsertMode {
        self.position.unwrap_or(InsertMode::Replace)
    }

    /// The expression evaluated against the whole document
    pub fn expression(&self) -> String {
        self.branches.join(" | ")
    }

    /// The expression evaluated relative to each of `contexts`
    ///
    /// `"."` stands for the current context node.
    pub fn scoped(&self, contexts: &[&str]) -> String {
        let mut parts = Vec::new();
        for context in contexts {
            let context = context.trim_end_matches('/');
            for branch in &self.branches {
                match self.grammar {
                    SelectorGrammar::Css => parts.push(format!("{}{}", context, branch)),
                    SelectorGrammar::XPath if context == "." => parts.push(branch.clone()),
                    SelectorGrammar::XPath if branch.starts_with('/') => {
                        parts.push(format!("{}{}", context, branch))
                    }
                    SelectorGrammar::XPath => parts.push(format!("{}/{}", context, branch)),
                }
            }
        }
        parts.join(" | ")
    }
}

/// Splits a trailing `::before` / `::after` off a selector or directive key
pub fn split_position(selector: &str) -> (&str, Option<InsertMode>) {
    let trimmed = selector.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.ends_with("::before") {
        (trimmed[..trimmed.len() - 8].trim_end(), Some(InsertMode::Prepend))
    } else if lower.ends_with("::after") {
        (trimmed[..trimmed.len() - 7].trim_end(), Some(InsertMode::Append))
    } else {
        (trimmed, None)
    }
}

/// Quotes a string as an XPath 1.0 literal
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        let parts: Vec<String> = value.split('"').map(|p| format!("\"{}\"", p)).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

/// Compiles selectors to XPath
#[derive(Debug, Clone)]
pub struct SelectorCompiler {
    default_grammar: SelectorGrammar,
}

impl Default for SelectorCompiler {
    fn default() -> Self {
        Self::new(SelectorGrammar::Css)
    }
}

impl SelectorCompiler {
    pub fn new(default_grammar: SelectorGrammar) -> Self {
        Self { default_grammar }
    }

    pub fn default_grammar(&self) -> SelectorGrammar {
        self.default_grammar
    }

    /// Compile a selector
    ///
    /// The result only depends on the text and the default grammar.
    pub fn compile(&self, selector: &str) -> Result<CompiledSelector> {
        let (body, position) = split_position(selector);
        let (grammar, body) = self.detect_grammar(body);
        if body.is_empty() {
            return Err(Error::selector_owned(format!("Empty selector '{}'", selector)));
        }

        let branches = match grammar {
            SelectorGrammar::XPath => vec![body.to_string()],
            SelectorGrammar::Css => self.compile_css(body)?,
        };

        Ok(CompiledSelector {
            source: selector.to_string(),
            grammar,
            position,
            branches,
        })
    }

    fn detect_grammar<'s>(&self, selector: &'s str) -> (SelectorGrammar, &'s str) {
        let lower = selector.get(..6).map(|s| s.to_ascii_lowercase());
        if lower.as_deref() == Some("xpath:") {
            return (SelectorGrammar::XPath, selector[6..].trim());
        }
        let lower = selector.get(..4).map(|s| s.to_ascii_lowercase());
        if lower.as_deref() == Some("css:") {
            return (SelectorGrammar::Css, selector[4..].trim());
        }
        (self.default_grammar, selector)
    }

    /// Compile a CSS selector list into one path per branch
    pub fn compile_css(&self, css: &str) -> Result<Vec<String>> {
        split_top_level(css, ',')
            .iter()
            .map(|branch| compile_branch(branch.trim(), css))
            .collect()
    }
}

// --- CSS model ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nth {
    First,
    Last,
    /// `a*n + b`
    Formula(i64, i64),
}

#[derive(Debug, Default)]
struct Compound {
    tag: String,
    predicates: Vec<String>,
    child_positions: Vec<Nth>,
    type_positions: Vec<Nth>,
}

/// Splits on `sep` outside brackets, parens and quotes.
fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Breaks a branch into compounds and the combinators in front of them.
fn tokenize_branch(branch: &str, source: &str) -> Result<Vec<(Combinator, String)>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut pending: Option<Combinator> = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    let flush = |current: &mut String, pending: &mut Option<Combinator>, parts: &mut Vec<(Combinator, String)>| {
        if !current.is_empty() {
            parts.push((pending.take().unwrap_or(Combinator::Descendant), std::mem::take(current)));
        }
    };

    for c in branch.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if depth > 0 => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if depth == 0 && c.is_whitespace() => flush(&mut current, &mut pending, &mut parts),
            '>' | '+' | '~' if depth == 0 => {
                flush(&mut current, &mut pending, &mut parts);
                if pending.is_some() {
                    return Err(Error::selector_owned(format!(
                        "Consecutive combinators in selector '{}'",
                        source
                    )));
                }
                pending = Some(match c {
                    '>' => Combinator::Child,
                    '+' => Combinator::Adjacent,
                    _ => Combinator::Sibling,
                });
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut pending, &mut parts);

    if depth != 0 || quote.is_some() {
        return Err(Error::selector_owned(format!("Unbalanced brackets in selector '{}'", source)));
    }
    if pending.is_some() {
        return Err(Error::selector_owned(format!("Dangling combinator in selector '{}'", source)));
    }
    if parts.is_empty() {
        return Err(Error::selector_owned(format!("Empty selector in '{}'", source)));
    }
    Ok(parts)
}

fn compile_branch(branch: &str, source: &str) -> Result<String> {
    let mut path = String::new();
    for (combinator, text) in tokenize_branch(branch, source)? {
        let compound = parse_compound(&text, source)?;
        path.push_str(&render_step(&compound, combinator));
    }
    Ok(path)
}

// --- Compound parsing ---

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_while_from(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && pred(chars[end]) {
        end += 1;
    }
    end
}

/// Index of the bracket closing the one at `open`, skipping quoted text.
fn matching_close(chars: &[char], open: usize, close: char) -> Option<usize> {
    let opener = chars[open];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == opener {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn parse_compound(text: &str, source: &str) -> Result<Compound> {
    let chars: Vec<char> = text.chars().collect();
    let mut compound = Compound::default();

    let mut i = if chars.first() == Some(&'*') {
        compound.tag = "*".to_string();
        1
    } else {
        let end = take_while_from(&chars, 0, is_ident_char);
        compound.tag = if end == 0 {
            "*".to_string()
        } else {
            chars[..end].iter().collect::<String>().to_ascii_lowercase()
        };
        end
    };

    while i < chars.len() {
        match chars[i] {
            '#' | '.' => {
                let end = take_while_from(&chars, i + 1, |c| !matches!(c, '.' | '#' | '[' | ':'));
                let name = chars[i + 1..end].iter().collect::<String>().to_ascii_lowercase();
                if name.is_empty() {
                    return Err(Error::selector_owned(format!(
                        "Missing name after '{}' in selector '{}'",
                        chars[i], source
                    )));
                }
                compound.predicates.push(if chars[i] == '#' {
                    format!("@id={}", xpath_literal(&name))
                } else {
                    class_predicate(&name)
                });
                i = end;
            }
            '[' => {
                let close = matching_close(&chars, i, ']').ok_or_else(|| {
                    Error::selector_owned(format!("Unclosed attribute block in selector '{}'", source))
                })?;
                let body: String = chars[i + 1..close].iter().collect();
                compound.predicates.push(attribute_predicate(&body, source)?);
                i = close + 1;
            }
            ':' => {
                if chars.get(i + 1) == Some(&':') {
                    return Err(Error::selector_owned(format!(
                        "Pseudo-elements are only allowed as a trailing ::before/::after in '{}'",
                        source
                    )));
                }
                let end = take_while_from(&chars, i + 1, is_ident_char);
                let name = chars[i + 1..end].iter().collect::<String>().to_ascii_lowercase();
                let (argument, next) = if chars.get(end) == Some(&'(') {
                    let close = matching_close(&chars, end, ')').ok_or_else(|| {
                        Error::selector_owned(format!("Unclosed pseudo-class argument in '{}'", source))
                    })?;
                    (Some(chars[end + 1..close].iter().collect::<String>()), close + 1)
                } else {
                    (None, end)
                };
                apply_pseudo(&mut compound, &name, argument.as_deref(), source)?;
                i = next;
            }
            other => {
                return Err(Error::selector_owned(format!(
                    "Unexpected '{}' in selector '{}'",
                    other, source
                )));
            }
        }
    }
    Ok(compound)
}

fn class_predicate(class: &str) -> String {
    format!(
        "contains(concat(\" \", normalize-space(@class), \" \"), {})",
        xpath_literal(&format!(" {} ", class))
    )
}

fn attribute_predicate(body: &str, source: &str) -> Result<String> {
    let body = body.trim();
    let Some(eq) = body.find('=') else {
        let name = body.trim_start_matches('@').trim().to_ascii_lowercase();
        if name.is_empty() || !name.chars().all(|c| is_ident_char(c) || c == ':') {
            return Err(Error::selector_owned(format!("Bad attribute name in selector '{}'", source)));
        }
        return Ok(format!("@{}", name));
    };

    let (op, name_end) = match body[..eq].chars().last() {
        Some(c @ ('^' | '$' | '*' | '|' | '~')) => (Some(c), eq - 1),
        _ => (None, eq),
    };
    let name = body[..name_end].trim().trim_start_matches('@').to_ascii_lowercase();
    if name.is_empty() {
        return Err(Error::selector_owned(format!("Missing attribute name in selector '{}'", source)));
    }
    let value = unquote(body[eq + 1..].trim());
    let attr = format!("@{}", name);
    let literal = xpath_literal(&value);

    let predicate = match op {
        None => format!("{}={}", attr, literal),
        Some(_) if value.is_empty() => "false()".to_string(),
        Some('^') => format!("starts-with({}, {})", attr, literal),
        Some('$') => format!(
            "substring({a}, string-length({a}) - string-length({v}) + 1) = {v}",
            a = attr,
            v = literal
        ),
        Some('*') => format!("contains({}, {})", attr, literal),
        Some('|') => format!(
            "{a}={v} or starts-with({a}, {d})",
            a = attr,
            v = literal,
            d = xpath_literal(&format!("{}-", value))
        ),
        Some(_) if value.contains(char::is_whitespace) => "false()".to_string(),
        Some(_) => format!(
            "contains(concat(\" \", normalize-space({}), \" \"), {})",
            attr,
            xpath_literal(&format!(" {} ", value))
        ),
    };
    Ok(predicate)
}

fn unquote(value: &str) -> String {
    // A trailing ` i` case flag is accepted and ignored.
    let value = value
        .strip_suffix(" i")
        .or_else(|| value.strip_suffix(" I"))
        .map(str::trim_end)
        .unwrap_or(value);
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0] {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn apply_pseudo(compound: &mut Compound, name: &str, argument: Option<&str>, source: &str) -> Result<()> {
    let needs_argument = || {
        argument.ok_or_else(|| {
            Error::selector_owned(format!(":{} needs an argument in selector '{}'", name, source))
        })
    };
    match name {
        "first-child" => compound.child_positions.push(Nth::First),
        "last-child" => compound.child_positions.push(Nth::Last),
        "only-child" => compound.child_positions.extend([Nth::First, Nth::Last]),
        "nth-child" => compound
            .child_positions
            .push(parse_nth(needs_argument()?, source)?),
        "first-of-type" => compound.type_positions.push(Nth::First),
        "last-of-type" => compound.type_positions.push(Nth::Last),
        "only-of-type" => compound.type_positions.extend([Nth::First, Nth::Last]),
        "nth-of-type" => compound
            .type_positions
            .push(parse_nth(needs_argument()?, source)?),
        "not" => {
            let argument = needs_argument()?;
            let mut alternatives = Vec::new();
            for branch in split_top_level(argument, ',') {
                let tokens = tokenize_branch(branch.trim(), source)?;
                if tokens.len() != 1 {
                    return Err(Error::selector_owned(format!(
                        ":not() only accepts simple selectors in '{}'",
                        source
                    )));
                }
                let inner = parse_compound(&tokens[0].1, source)?;
                alternatives.push(format!("self::{}", render_self_relative(&inner)));
            }
            compound.predicates.push(format!("not({})", alternatives.join(" | ")));
        }
        "empty" => compound
            .predicates
            .push("count(*)=0 and not(text())".to_string()),
        _ => {
            return Err(Error::selector_owned(format!(
                "Unsupported pseudo-class ':{}' in selector '{}'",
                name, source
            )))
        }
    }
    Ok(())
}

fn parse_nth(argument: &str, source: &str) -> Result<Nth> {
    let arg: String = argument
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let bad = || Error::selector_owned(format!("Bad nth argument '{}' in selector '{}'", argument, source));

    match arg.as_str() {
        "odd" => return Ok(Nth::Formula(2, 1)),
        "even" => return Ok(Nth::Formula(2, 0)),
        _ => {}
    }
    match arg.find('n') {
        None => {
            let b: i64 = arg.parse().map_err(|_| bad())?;
            Ok(Nth::Formula(0, b))
        }
        Some(n) => {
            let a = match &arg[..n] {
                "" | "+" => 1,
                "-" => -1,
                digits => digits.parse().map_err(|_| bad())?,
            };
            let b = match &arg[n + 1..] {
                "" => 0,
                rest => rest.trim_start_matches('+').parse().map_err(|_| bad())?,
            };
            Ok(Nth::Formula(a, b))
        }
    }
}

// --- Rendering ---

/// Boolean XPath for one position condition.
///
/// `position` and `last` are expressions yielding the element's 1-based
/// index among the siblings it is counted with, and the number of them.
fn nth_condition(nth: Nth, position: &str, last: &str) -> String {
    match nth {
        Nth::First => format!("{} = 1", position),
        Nth::Last => format!("{} = {}", position, last),
        Nth::Formula(0, b) => format!("{} = {}", position, b),
        Nth::Formula(2, 1) => format!("{} mod 2 = 1", position),
        Nth::Formula(2, 0) => format!("{} mod 2 = 0", position),
        Nth::Formula(a, b) if a > 0 => {
            let offset = if b >= 0 {
                format!("({} - {})", position, b)
            } else {
                format!("({} + {})", position, -b)
            };
            if b > 1 {
                format!("{} mod {} = 0 and {} >= {}", offset, a, position, b)
            } else {
                format!("{} mod {} = 0", offset, a)
            }
        }
        Nth::Formula(a, b) => format!("{p} <= {b} and ({b} - {p}) mod {a} = 0", p = position, b = b, a = -a),
    }
}

/// Predicate using `position()`, compact when there is a single condition.
fn positional_predicate(conditions: &[Nth]) -> String {
    match conditions {
        [Nth::First] => "1".to_string(),
        [Nth::Last] => "last()".to_string(),
        [Nth::Formula(0, b)] => b.to_string(),
        _ => conditions
            .iter()
            .map(|nth| nth_condition(*nth, "position()", "last()"))
            .collect::<Vec<_>>()
            .join(" and "),
    }
}

/// Predicate that holds on the element itself, counting its siblings.
fn sibling_count_predicate(conditions: &[Nth], counted: &str) -> String {
    let position = format!("(count(preceding-sibling::{}) + 1)", counted);
    let last = format!(
        "(count(preceding-sibling::{c}) + count(following-sibling::{c}) + 1)",
        c = counted
    );
    conditions
        .iter()
        .map(|nth| match nth {
            Nth::First => format!("not(preceding-sibling::{})", counted),
            Nth::Last => format!("not(following-sibling::{})", counted),
            formula => nth_condition(*formula, &position, &last),
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn predicates_suffix(predicates: &[String]) -> String {
    predicates.iter().map(|p| format!("[{}]", p)).collect()
}

/// The compound as a node test plus predicates that only look at the node
/// and its siblings, so it can follow `self::` or a sibling axis.
fn render_self_relative(compound: &Compound) -> String {
    let mut out = compound.tag.clone();
    if !compound.child_positions.is_empty() {
        out.push_str(&format!("[{}]", sibling_count_predicate(&compound.child_positions, "*")));
    }
    if !compound.type_positions.is_empty() {
        out.push_str(&format!(
            "[{}]",
            sibling_count_predicate(&compound.type_positions, &compound.tag)
        ));
    }
    out.push_str(&predicates_suffix(&compound.predicates));
    out
}

fn render_step(compound: &Compound, combinator: Combinator) -> String {
    match combinator {
        Combinator::Descendant | Combinator::Child => {
            let axis = if combinator == Combinator::Descendant { "//" } else { "/" };
            if !compound.child_positions.is_empty() {
                // Child positions count every element sibling, so test the
                // position on `*` and the rest on `self::`.
                format!(
                    "{}*[{}]/self::{}",
                    axis,
                    positional_predicate(&compound.child_positions),
                    render_self_relative(&Compound {
                        tag: compound.tag.clone(),
                        predicates: compound.predicates.clone(),
                        child_positions: Vec::new(),
                        type_positions: compound.type_positions.clone(),
                    })
                )
            } else {
                let mut out = format!("{}{}", axis, compound.tag);
                if !compound.type_positions.is_empty() {
                    out.push_str(&format!("[{}]", positional_predicate(&compound.type_positions)));
                }
                out.push_str(&predicates_suffix(&compound.predicates));
                out
            }
        }
        Combinator::Sibling => format!("/following-sibling::{}", render_self_relative(compound)),
        Combinator::Adjacent => format!(
            "/following-sibling::*[1]/self::{}",
            render_self_relative(compound)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::XPathExpr;
    use dom_query::Document;
    use pretty_assertions::assert_eq;

    fn css(selector: &str) -> String {
        SelectorCompiler::new(SelectorGrammar::Css)
            .compile(selector)
            .unwrap()
            .expression()
    }

    fn matches(html: &str, selector: &str) -> Vec<String> {
        let doc = Document::from(html);
        let root = doc.root();
        XPathExpr::parse(&css(selector))
            .unwrap()
            .select_nodes(&root, &root)
            .unwrap()
            .iter()
            .map(|n| n.text().to_string())
            .collect()
    }

    #[test]
    fn test_tag_id_and_class() {
        assert_eq!(css("div"), "//div");
        assert_eq!(css("#main"), r#"//*[@id="main"]"#);
        assert_eq!(
            css("p.note"),
            r#"//p[contains(concat(" ", normalize-space(@class), " "), " note ")]"#
        );
    }

    #[test]
    fn test_multiple_classes_require_every_word() {
        let expected = r#"//*[contains(concat(" ", normalize-space(@class), " "), " foo ")][contains(concat(" ", normalize-space(@class), " "), " bar ")]"#;
        for _ in 0..3 {
            assert_eq!(css(".foo.bar"), expected);
        }
        let html = r#"<p class="bar foo">both</p><p class="foo">one</p><p class="foobar">neither</p>"#;
        assert_eq!(matches(html, ".foo.bar"), vec!["both"]);
        assert_eq!(matches(html, ".bar.foo"), vec!["both"]);
    }

    #[test]
    fn test_combinators() {
        assert_eq!(css("ul li"), "//ul//li");
        assert_eq!(css("ul > li"), "//ul/li");
        assert_eq!(css("ul>li"), "//ul/li");
        assert_eq!(css("h1 + p"), "//h1/following-sibling::*[1]/self::p");
        assert_eq!(css("h1 ~ p"), "//h1/following-sibling::p");
        assert_eq!(css("> li"), "/li");
    }

    #[test]
    fn test_adjacent_sibling_must_be_next_element() {
        let html = "<div><h1>t</h1><span>s</span><p>a</p></div><div><h1>t</h1><p>b</p></div>";
        assert_eq!(matches(html, "h1 + p"), vec!["b"]);
        assert_eq!(matches(html, "h1 ~ p"), vec!["a", "b"]);
    }

    #[test]
    fn test_attribute_operators() {
        assert_eq!(css("[href]"), "//*[@href]");
        assert_eq!(css("a[rel=next]"), r#"//a[@rel="next"]"#);
        assert_eq!(css("a[href^='http']"), r#"//a[starts-with(@href, "http")]"#);
        assert_eq!(
            css("a[href$=\".pdf\"]"),
            r#"//a[substring(@href, string-length(@href) - string-length(".pdf") + 1) = ".pdf"]"#
        );
        assert_eq!(css("a[title*=foo]"), r#"//a[contains(@title, "foo")]"#);
        assert_eq!(css("p[lang|=en]"), r#"//p[@lang="en" or starts-with(@lang, "en-")]"#);
        assert_eq!(
            css("p[data-tags~=x]"),
            r#"//p[contains(concat(" ", normalize-space(@data-tags), " "), " x ")]"#
        );
    }

    #[test]
    fn test_spaces_inside_brackets_are_not_separators() {
        assert_eq!(
            css(r#"input[placeholder="First name"]"#),
            r#"//input[@placeholder="First name"]"#
        );
        let html = r#"<p title="a b">yes</p><p title="a">no</p>"#;
        assert_eq!(matches(html, r#"p[title="a b"]"#), vec!["yes"]);
        assert_eq!(matches(html, "p:not([title=\"a b\"])"), vec!["no"]);
    }

    #[test]
    fn test_values_keep_case_and_names_are_lowered() {
        assert_eq!(css(r#"DIV[Title="Hello World"]"#), r#"//div[@title="Hello World"]"#);
        assert_eq!(css("#MixedCase"), r#"//*[@id="mixedcase"]"#);
        assert_eq!(css("P.Lead#Intro"), css("p.lead#intro"));
        assert_eq!(css(r#"a[href^='/Docs']"#), r#"//a[starts-with(@href, "/Docs")]"#);
    }

    #[test]
    fn test_child_pseudo_classes_use_self_idiom() {
        assert_eq!(css("li:first-child"), "//*[1]/self::li");
        assert_eq!(css("li:last-child"), "//*[last()]/self::li");
        assert_eq!(css("li:nth-child(3)"), "//*[3]/self::li");
        assert_eq!(css("li:nth-child(odd)"), "//*[position() mod 2 = 1]/self::li");
        assert_eq!(css("li:nth-child(even)"), "//*[position() mod 2 = 0]/self::li");
    }

    #[test]
    fn test_child_pseudo_semantics() {
        let html = "<ul><li>1</li><li>2</li><li>3</li><li>4</li><li>5</li></ul><div><p>p</p><li>6</li></div>";
        assert_eq!(matches(html, "li:first-child"), vec!["1"]);
        assert_eq!(matches(html, "li:last-child"), vec!["5", "6"]);
        assert_eq!(matches(html, "li:nth-child(even)"), vec!["2", "4", "6"]);
        assert_eq!(matches(html, "li:nth-child(3n+1)"), vec!["1", "4"]);
        assert_eq!(matches(html, "li:nth-child(-n+2)"), vec!["1", "2", "6"]);
        assert_eq!(matches(html, "ul > li:first-child:last-child"), Vec::<String>::new());
    }

    #[test]
    fn test_type_pseudo_classes() {
        assert_eq!(css("p:first-of-type"), "//p[1]");
        assert_eq!(css("p:last-of-type"), "//p[last()]");
        assert_eq!(css("p:nth-of-type(2)"), "//p[2]");
        let html = "<div><h2>h</h2><p>a</p><p>b</p></div>";
        assert_eq!(matches(html, "p:first-of-type"), vec!["a"]);
        assert_eq!(matches(html, "p:first-child"), Vec::<String>::new());
    }

    #[test]
    fn test_not_and_empty() {
        assert_eq!(
            css("li:not(.done)"),
            r#"//li[not(self::*[contains(concat(" ", normalize-space(@class), " "), " done ")])]"#
        );
        assert_eq!(css("p:empty"), "//p[count(*)=0 and not(text())]");
        let html = r#"<ul><li class="done">a</li><li>b</li><li class="x">c</li></ul>"#;
        assert_eq!(matches(html, "li:not(.done)"), vec!["b", "c"]);
        assert_eq!(matches(html, "li:not(.done, .x)"), vec!["b"]);
    }

    #[test]
    fn test_selector_lists_compile_per_branch() {
        let compiled = SelectorCompiler::default().compile("h1, .lead").unwrap();
        assert_eq!(compiled.branches.len(), 2);
        assert_eq!(
            compiled.expression(),
            r#"//h1 | //*[contains(concat(" ", normalize-space(@class), " "), " lead ")]"#
        );
        assert_eq!(
            compiled.scoped(&["/html/body/main", "/html/body/aside"]),
            "/html/body/main//h1 | /html/body/main//*[contains(concat(\" \", normalize-space(@class), \" \"), \" lead \")] | /html/body/aside//h1 | /html/body/aside//*[contains(concat(\" \", normalize-space(@class), \" \"), \" lead \")]"
        );
    }

    #[test]
    fn test_grammar_prefixes() {
        let css_default = SelectorCompiler::new(SelectorGrammar::Css);
        let xpath_default = SelectorCompiler::new(SelectorGrammar::XPath);

        let forced = css_default.compile("xpath://ul/li[2]").unwrap();
        assert_eq!(forced.grammar, SelectorGrammar::XPath);
        assert_eq!(forced.expression(), "//ul/li[2]");

        let forced = xpath_default.compile("css:ul li").unwrap();
        assert_eq!(forced.grammar, SelectorGrammar::Css);
        assert_eq!(forced.expression(), "//ul//li");

        let passthrough = xpath_default.compile("//p").unwrap();
        assert_eq!(passthrough.grammar, SelectorGrammar::XPath);
        assert_eq!(passthrough.scoped(&["."]), "//p");
        assert_eq!(passthrough.scoped(&["/html/body"]), "/html/body//p");
        let relative = xpath_default.compile("li[1]").unwrap();
        assert_eq!(relative.scoped(&["/html/body/ul"]), "/html/body/ul/li[1]");
    }

    #[test]
    fn test_position_suffix() {
        let compiled = SelectorCompiler::default().compile("p.intro::before").unwrap();
        assert_eq!(compiled.position, Some(InsertMode::Prepend));
        assert_eq!(compiled.insert_mode(), InsertMode::Prepend);
        assert!(!compiled.expression().contains("before"));

        let compiled = SelectorCompiler::default().compile("p::after").unwrap();
        assert_eq!(compiled.insert_mode(), InsertMode::Append);

        assert_eq!(split_position("@content::before"), ("@content", Some(InsertMode::Prepend)));
        assert_eq!(split_position("@attr"), ("@attr", None));
    }

    #[test]
    fn test_errors() {
        let compiler = SelectorCompiler::default();
        assert!(matches!(compiler.compile(""), Err(Error::SelectorError(_))));
        assert!(matches!(compiler.compile("p:hover"), Err(Error::SelectorError(_))));
        assert!(matches!(compiler.compile("ul > > li"), Err(Error::SelectorError(_))));
        assert!(matches!(compiler.compile("a[href"), Err(Error::SelectorError(_))));
        assert!(matches!(compiler.compile("li:nth-child(x)"), Err(Error::SelectorError(_))));
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("plain"), "\"plain\"");
        assert_eq!(xpath_literal("say \"hi\""), "'say \"hi\"'");
        assert_eq!(
            xpath_literal("it's \"x\""),
            "concat(\"it's \", '\"', \"x\", '\"', \"\")"
        );
    }
}
