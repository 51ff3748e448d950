use dom_query::NodeRef;

use crate::types::InsertMode;

/// Extension trait for `dom_query::NodeRef` with the tree edits the renderer needs
pub trait NodeExt<'a> {
    /// Lower-cased tag name, `None` for non-elements
    fn tag_name(&self) -> Option<String>;
    fn element_children_vec(&self) -> Vec<NodeRef<'a>>;
    fn is_whitespace_text(&self) -> bool;
    /// Whether the node is still reachable from the document root
    fn is_attached(&self) -> bool;
    /// A detached structural copy of the node and its descendants
    ///
    /// Comments and other non-element, non-text nodes are not copied.
    fn deep_clone(&self) -> Option<NodeRef<'a>>;
    fn insert_after_node(&self, new: &NodeRef<'a>);
    fn clear_children(&self);
    /// Replace the element by one named `name`, keeping attributes and children
    fn rename_element(&self, name: &str) -> NodeRef<'a>;
    /// Replace the element by its own children
    fn unwrap_element(&self);
    /// Insert a text node
    fn insert_text(&self, text: &str, mode: InsertMode);
    /// Parse `markup` as a fragment and insert its nodes
    fn insert_markup(&self, markup: &str, mode: InsertMode);
    /// Set, prepend to or append to an attribute value
    ///
    /// Prepending and appending join with a single space.
    fn merge_attr(&self, name: &str, value: &str, mode: InsertMode);
    /// An absolute XPath location for the node, like `/html/body/ul/li[2]`
    fn node_path(&self) -> String;
}

impl<'a> NodeExt<'a> for NodeRef<'a> {
    fn tag_name(&self) -> Option<String> {
        if self.is_element() {
            self.node_name().map(|name| name.to_ascii_lowercase())
        } else {
            None
        }
    }

    fn element_children_vec(&self) -> Vec<NodeRef<'a>> {
        self.children().into_iter().filter(|c| c.is_element()).collect()
    }

    fn is_whitespace_text(&self) -> bool {
        self.is_text() && self.text().trim().is_empty()
    }

    fn is_attached(&self) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.is_document() {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn deep_clone(&self) -> Option<NodeRef<'a>> {
        if self.is_text() {
            return Some(self.tree.new_text(self.text().to_string()));
        }
        let name = self.tag_name()?;
        let copy = self.tree.new_element(&name);
        for attr in self.attrs() {
            copy.set_attr(&attr.name.local, &attr.value);
        }
        for child in self.children() {
            if let Some(child_copy) = child.deep_clone() {
                copy.append_child(&child_copy.id);
            }
        }
        Some(copy)
    }

    fn insert_after_node(&self, new: &NodeRef<'a>) {
        match (self.next_sibling(), self.parent()) {
            (Some(next), _) => next.insert_before(&new.id),
            (None, Some(parent)) => parent.append_child(&new.id),
            (None, None) => {}
        }
    }

    fn clear_children(&self) {
        for child in self.children() {
            child.remove_from_parent();
        }
    }

    fn rename_element(&self, name: &str) -> NodeRef<'a> {
        let renamed = self.tree.new_element(name);
        for attr in self.attrs() {
            renamed.set_attr(&attr.name.local, &attr.value);
        }
        for child in self.children() {
            renamed.append_child(&child.id);
        }
        self.insert_before(&renamed.id);
        self.remove_from_parent();
        renamed
    }

    fn unwrap_element(&self) {
        for child in self.children() {
            self.insert_before(&child.id);
        }
        self.remove_from_parent();
    }

    fn insert_text(&self, text: &str, mode: InsertMode) {
        let node = self.tree.new_text(text.to_string());
        insert_nodes(self, &[node], mode);
    }

    fn insert_markup(&self, markup: &str, mode: InsertMode) {
        let tag = self.tag_name().unwrap_or_default();
        let chain = context_chain(&tag);
        let open: String = chain.iter().map(|name| format!("<{}>", name)).collect();
        let close: String = chain.iter().rev().map(|name| format!("</{}>", name)).collect();

        let holder = self.tree.new_element("div");
        holder.set_html(format!("{}{}{}", open, markup, close));

        // Nodes the parser moved out of the table land beside the wrappers
        let mut nodes = Vec::new();
        let mut context = holder;
        for name in &chain {
            let next = context
                .element_children_vec()
                .into_iter()
                .find(|child| child.tag_name().as_deref() == Some(*name));
            let Some(next) = next else {
                break;
            };
            nodes.extend(context.children().into_iter().filter(|child| child.id != next.id));
            context = next;
        }
        nodes.extend(context.children());
        insert_nodes(self, &nodes, mode);
    }

    fn merge_attr(&self, name: &str, value: &str, mode: InsertMode) {
        let merged = match (self.attr(name), mode) {
            (Some(old), InsertMode::Append) if !old.is_empty() => format!("{} {}", old, value),
            (Some(old), InsertMode::Prepend) if !old.is_empty() => format!("{} {}", value, old),
            _ => value.to_string(),
        };
        self.set_attr(name, merged.trim());
    }

    fn node_path(&self) -> String {
        let mut segments = Vec::new();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.is_document() {
                break;
            }
            let parent = node.parent();
            let segment = if node.is_text() {
                "text()".to_string()
            } else if let Some(name) = node.tag_name() {
                match &parent {
                    Some(parent) => {
                        let same: Vec<NodeRef<'a>> = parent
                            .children()
                            .into_iter()
                            .filter(|c| c.tag_name().as_deref() == Some(name.as_str()))
                            .collect();
                        if same.len() > 1 {
                            let index = same.iter().position(|c| c.id == node.id).unwrap_or(0);
                            format!("{}[{}]", name, index + 1)
                        } else {
                            name
                        }
                    }
                    None => name,
                }
            } else {
                "node()".to_string()
            };
            segments.push(segment);
            current = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

/// Wrapper elements that give a fragment the parsing context of `tag`
///
/// Markup is parsed as body content, where table parts on their own are
/// dropped, so targets inside tables get their table ancestors back.
fn context_chain(tag: &str) -> Vec<&str> {
    match tag {
        "table" => vec!["table"],
        "thead" | "tbody" | "tfoot" | "colgroup" => vec!["table", tag],
        "tr" => vec!["table", "tbody", "tr"],
        _ => Vec::new(),
    }
}

fn insert_nodes<'a>(target: &NodeRef<'a>, nodes: &[NodeRef<'a>], mode: InsertMode) {
    match mode {
        InsertMode::Replace => {
            target.clear_children();
            for node in nodes {
                target.append_child(&node.id);
            }
        }
        InsertMode::Append => {
            for node in nodes {
                target.append_child(&node.id);
            }
        }
        InsertMode::Prepend => match target.first_child() {
            Some(first) => {
                for node in nodes {
                    first.insert_before(&node.id);
                }
            }
            None => {
                for node in nodes {
                    target.append_child(&node.id);
                }
            }
        },
    }
}
