//! Working node lists
//!
//! Before anything is written into the document, each level of the data stack
//! is resolved into a working list of slots, one slot per data entry. A slot
//! holds the nodes that entry applies to. When the data has more entries than
//! the template has nodes, the list is completed by copying nodes in the live
//! document according to a [`RepeatStrategy`], so the list is fully built
//! before the renderer starts changing the tree.
//!
//! There are three ways to fill the list:
//!
//! - named: one slot per selector, holding every match under the source
//! - implicit: one slot per element child of the source; a source without
//!   element children gets a copy of itself as its only child
//! - self repeat: the source itself is the single starting slot

use dom_query::NodeRef;
use log::debug;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::document::{QueryContext, TemplateDocument};
use crate::error::{Error, Result};
use crate::node_ext::NodeExt;
use crate::repeat::{Placement, RepeatStrategy};

/// What the working list is populated for
#[derive(Debug, Clone)]
pub enum Targets {
    /// Selectors, each getting its own slot
    Named(Vec<String>),
    /// A number of data items filled from the source's children
    Items(usize),
}

impl Targets {
    pub fn expected(&self) -> usize {
        match self {
            Targets::Named(selectors) => selectors.len(),
            Targets::Items(count) => *count,
        }
    }
}

/// An ordered list of slots with a forward-only cursor
#[derive(Debug)]
pub struct NodeListPopulator<'a> {
    slots: Vec<Vec<NodeRef<'a>>>,
    cursor: usize,
    found: usize,
}

impl<'a> NodeListPopulator<'a> {
    /// Build and complete the working list
    ///
    /// `source` is the node the targets are looked up under, the whole
    /// document when `None`. With `self_repeat` the source itself is the
    /// starting slot and `targets` only gives the expected count.
    pub fn populate(
        document: &'a TemplateDocument,
        targets: &Targets,
        source: Option<&NodeRef<'a>>,
        strategy: Option<&RepeatStrategy>,
        self_repeat: bool,
        formatting: bool,
    ) -> Result<Self> {
        let mut slots: Vec<Vec<NodeRef<'a>>> = Vec::new();

        match (self_repeat, targets, source) {
            (true, _, Some(source)) => slots.push(vec![source.clone()]),
            (true, _, None) => {}
            (false, Targets::Named(selectors), _) => {
                let context = match source {
                    Some(node) => QueryContext::Node(node.clone()),
                    None => QueryContext::Document,
                };
                for selector in selectors {
                    slots.push(document.select(selector, &context)?);
                }
            }
            (false, Targets::Items(_), _) => {
                let source = source.cloned().unwrap_or_else(|| document.root());
                for child in source.element_children_vec() {
                    slots.push(vec![child]);
                }
                if slots.is_empty() && source.is_element() {
                    if let Some(copy) = source.deep_clone() {
                        source.append_child(&copy.id);
                        slots.push(vec![copy]);
                    }
                }
            }
        }

        let found = slots.len();
        let mut populator = Self {
            slots,
            cursor: 0,
            found,
        };
        if let Some(strategy) = strategy {
            populator.complete(strategy, targets.expected(), formatting)?;
        }
        Ok(populator)
    }

    fn complete(&mut self, strategy: &RepeatStrategy, expected: usize, formatting: bool) -> Result<()> {
        let plan = strategy.plan(self.found, expected);
        if !plan.is_empty() {
            debug!(
                "completing node list with {}: {} found, {} expected",
                strategy,
                self.found,
                expected
            );
        }

        for duplication in plan {
            let Some(source) = self
                .slots
                .get(duplication.source)
                .and_then(|slot| slot.first())
                .cloned()
            else {
                return Err(Error::dom_owned(format!(
                    "No node in slot {} to copy from ({} slots)",
                    duplication.source,
                    self.slots.len()
                )));
            };
            let copy = source
                .deep_clone()
                .ok_or_else(|| Error::dom_static("Only elements and text can be copied into a list"))?;

            match duplication.placement {
                Placement::AfterSource => {
                    source.insert_after_node(&copy);
                    self.slots.insert(duplication.source + 1, vec![copy.clone()]);
                }
                Placement::AtEnd => {
                    let anchor = self
                        .slots
                        .iter()
                        .rev()
                        .find_map(|slot| slot.last())
                        .cloned()
                        .unwrap_or_else(|| source.clone());
                    anchor.insert_after_node(&copy);
                    self.slots.push(vec![copy.clone()]);
                }
            }

            if formatting {
                preserve_indentation(&copy);
            }
        }

        if strategy.shuffle {
            self.slots.shuffle(&mut thread_rng());
        }
        Ok(())
    }

    /// The next slot, or `None` past the end
    pub fn seek(&mut self) -> Option<Vec<NodeRef<'a>>> {
        let slot = self.slots.get(self.cursor).cloned();
        self.cursor += 1;
        slot
    }

    /// Number of slots found before completion
    pub fn found(&self) -> usize {
        self.found
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Vec<NodeRef<'a>>] {
        &self.slots
    }
}

/// Copy the parent's leading whitespace in front of a freshly inserted node
fn preserve_indentation(node: &NodeRef) {
    let Some(parent) = node.parent() else {
        return;
    };
    let Some(first) = parent.first_child() else {
        return;
    };
    if first.is_whitespace_text() {
        let whitespace = node.tree.new_text(first.text().to_string());
        node.insert_before(&whitespace.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectorGrammar;
    use pretty_assertions::assert_eq;

    fn doc(html: &str) -> TemplateDocument {
        TemplateDocument::parse(html, SelectorGrammar::Css)
    }

    fn strategy(text: &str) -> RepeatStrategy {
        text.parse().unwrap()
    }

    fn first<'a>(document: &'a TemplateDocument, selector: &str) -> NodeRef<'a> {
        document.select(selector, &QueryContext::Document).unwrap()[0].clone()
    }

    fn slot_texts(populator: &NodeListPopulator) -> Vec<String> {
        populator
            .slots()
            .iter()
            .map(|slot| slot.iter().map(|n| n.text().to_string()).collect::<Vec<_>>().join("+"))
            .collect()
    }

    #[test]
    fn test_repeat_last_fills_after_last_node() {
        let document = doc("<ul><li>a</li><li>b</li></ul>");
        let ul = first(&document, "ul");
        let populator = NodeListPopulator::populate(
            &document,
            &Targets::Items(5),
            Some(&ul),
            Some(&strategy("repeat-last")),
            false,
            false,
        )
        .unwrap();

        assert_eq!(populator.found(), 2);
        assert_eq!(slot_texts(&populator), vec!["a", "b", "b", "b", "b"]);
        assert_eq!(
            ul.inner_html().to_string(),
            "<li>a</li><li>b</li><li>b</li><li>b</li><li>b</li>"
        );
        let in_document: Vec<_> = ul.element_children_vec().iter().map(|n| n.id).collect();
        let in_list: Vec<_> = populator.slots().iter().map(|s| s[0].id).collect();
        assert_eq!(in_document, in_list);
    }

    #[test]
    fn test_repeat_first_copies_next_to_first() {
        let document = doc("<ol><li>a</li><li>b</li></ol>");
        let ol = first(&document, "ol");
        let populator = NodeListPopulator::populate(
            &document,
            &Targets::Items(3),
            Some(&ol),
            Some(&strategy("repeat-first")),
            false,
            false,
        )
        .unwrap();
        assert_eq!(slot_texts(&populator), vec!["a", "a", "b"]);
        assert_eq!(ol.inner_html().to_string(), "<li>a</li><li>a</li><li>b</li>");
    }

    #[test]
    fn test_repeat_all_alternate_once_in_document() {
        let document = doc("<ul><li>0</li><li>1</li><li>2</li></ul>");
        let ul = first(&document, "ul");
        let populator = NodeListPopulator::populate(
            &document,
            &Targets::Items(7),
            Some(&ul),
            Some(&strategy("repeat-all,alternate,once")),
            false,
            false,
        )
        .unwrap();
        assert_eq!(slot_texts(&populator), vec!["0", "1", "2", "2", "2", "1", "0"]);
        assert_eq!(ul.text().to_string(), "0122210");
    }

    #[test]
    fn test_without_strategy_list_stays_short() {
        let document = doc("<ul><li>a</li></ul>");
        let ul = first(&document, "ul");
        let mut populator =
            NodeListPopulator::populate(&document, &Targets::Items(3), Some(&ul), None, false, false)
                .unwrap();
        assert_eq!(populator.len(), 1);
        assert!(populator.seek().is_some());
        assert!(populator.seek().is_none());
        assert!(populator.seek().is_none());
    }

    #[test]
    fn test_implicit_mode_skips_text_and_comments() {
        let document = doc("<div> text <!-- c --><p>a</p> <span>b</span></div>");
        let div = first(&document, "div");
        let populator =
            NodeListPopulator::populate(&document, &Targets::Items(2), Some(&div), None, false, false)
                .unwrap();
        assert_eq!(slot_texts(&populator), vec!["a", "b"]);
    }

    #[test]
    fn test_implicit_mode_without_children_copies_source_inside() {
        let document = doc(r#"<p class="x">hi</p>"#);
        let p = first(&document, "p");
        let populator =
            NodeListPopulator::populate(&document, &Targets::Items(1), Some(&p), None, false, false)
                .unwrap();
        assert_eq!(populator.len(), 1);
        assert_eq!(p.html().to_string(), r#"<p class="x">hi<p class="x">hi</p></p>"#);
    }

    #[test]
    fn test_named_mode_one_slot_per_selector() {
        let document = doc("<div><h1>t</h1><p>a</p><p>b</p></div>");
        let div = first(&document, "div");
        let targets = Targets::Named(vec!["p".into(), "h2".into(), "h1::before".into()]);
        let mut populator = NodeListPopulator::populate(
            &document,
            &targets,
            Some(&div),
            Some(&RepeatStrategy::default()),
            false,
            false,
        )
        .unwrap();
        assert_eq!(slot_texts(&populator), vec!["a+b", "", "t"]);
        assert_eq!(populator.seek().unwrap().len(), 2);
        assert!(populator.seek().unwrap().is_empty());
        assert_eq!(populator.seek().unwrap().len(), 1);
        assert!(populator.seek().is_none());
    }

    #[test]
    fn test_self_repeat() {
        let document = doc("<div><section>s</section></div>");
        let section = first(&document, "section");
        let populator = NodeListPopulator::populate(
            &document,
            &Targets::Items(3),
            Some(&section),
            Some(&RepeatStrategy::default()),
            true,
            false,
        )
        .unwrap();
        assert_eq!(populator.len(), 3);
        assert_eq!(populator.slots()[0][0].id, section.id);
        assert_eq!(
            first(&document, "div").inner_html().to_string(),
            "<section>s</section><section>s</section><section>s</section>"
        );
    }

    #[test]
    fn test_shuffle_keeps_every_slot() {
        let document = doc("<ul><li>a</li><li>b</li><li>c</li></ul>");
        let ul = first(&document, "ul");
        let populator = NodeListPopulator::populate(
            &document,
            &Targets::Items(6),
            Some(&ul),
            Some(&strategy("repeat-all,shuffle-data")),
            false,
            false,
        )
        .unwrap();
        let mut texts = slot_texts(&populator);
        texts.sort();
        assert_eq!(texts, vec!["a", "a", "b", "b", "c", "c"]);
        assert_eq!(ul.text().to_string(), "abcabc");
    }

    #[test]
    fn test_formatting_copies_indentation() {
        let document = doc("<ul>\n  <li>a</li>\n</ul>");
        let ul = first(&document, "ul");
        NodeListPopulator::populate(
            &document,
            &Targets::Items(3),
            Some(&ul),
            Some(&RepeatStrategy::default()),
            false,
            true,
        )
        .unwrap();
        assert_eq!(
            ul.inner_html().to_string(),
            "\n  <li>a</li>\n  <li>a</li>\n  <li>a</li>\n"
        );
    }
}
