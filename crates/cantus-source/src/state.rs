//! Serialized state tree.
//!
//! A small property tree standing in for a session file node. Sources write
//! their attributes as string properties and their per-parameter overrides as
//! child nodes; serde can push the whole tree through any format.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNode {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<StateNode>,
}

impl StateNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl ToString) {
        self.properties.insert(key.into(), value.to_string());
    }

    /// Builder form of [`set_property`](Self::set_property).
    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_property(key, value);
        self
    }

    #[inline]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parse a property. `None` when the key is absent or does not parse.
    pub fn parsed_property<T: FromStr>(&self, key: &str) -> Option<T> {
        self.property(key)?.parse().ok()
    }

    pub fn add_child(&mut self, child: StateNode) -> &mut StateNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    #[inline]
    pub fn children(&self) -> &[StateNode] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StateNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let mut node = StateNode::new("Source");
        node.set_property("id", 42u64);
        assert_eq!(node.property("id"), Some("42"));
        assert_eq!(node.parsed_property::<u64>("id"), Some(42));
        assert_eq!(node.parsed_property::<u64>("missing"), None);
    }

    #[test]
    fn test_children_named() {
        let mut node = StateNode::new("Source");
        node.add_child(StateNode::new("A").with_property("k", "1"));
        node.add_child(StateNode::new("B"));
        node.add_child(StateNode::new("A"));
        assert_eq!(node.children_named("A").count(), 2);
        assert_eq!(node.children().len(), 3);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut node = StateNode::new("Source").with_property("name", "take 1");
        node.add_child(StateNode::new("InterpolationStyle").with_property("style", "Linear"));

        let json = serde_json::to_string(&node).unwrap();
        let back: StateNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
