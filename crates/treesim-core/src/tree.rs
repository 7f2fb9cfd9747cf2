//! Normalized document trees.
//!
//! A [`Node`] is the data contract between a front end (for example the
//! Markdown normalizer) and the similarity engine: an ordered, labeled tree
//! where every node carries a kind label, a text payload or the
//! [`Text::Filtered`] marker, and an ordered list of children.
//!
//! Nodes are immutable once built. Each node also carries a [`Fingerprint`],
//! a `blake3` hash over its kind, text and child fingerprints, computed
//! bottom-up at construction time. Two subtrees with equal fingerprints are
//! structurally identical, which lets the engine reuse scores for repeated
//! subtree shapes. The subtree height is cached the same way, so
//! [`Node::depth`] is O(1).
//!
//! Dropping a tree, counting its nodes and reading its depth use no
//! recursion, so arbitrarily deep trees can be built and torn down safely.
//! Scoring does recurse; see [`crate::batch`] for the depth limit it
//! enforces.
//!
//! # JSON shape
//!
//! ```json
//! {"type": "paragraph", "text": "hello world", "children": []}
//! ```
//!
//! A filtered node serializes its text as `"<FILTERED>"`; on input either the
//! sentinel or `null` is accepted. A missing `"type"` deserializes to an empty
//! label, which the engine treats as malformed.

use std::fmt;

use serde::ser::SerializeStruct as _;
use serde::{Deserialize, Serialize, Serializer};

/// Sentinel written in place of the text of a filtered node.
pub const FILTERED_SENTINEL: &str = "<FILTERED>";

/// Text payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Text {
    /// Normalized textual content.
    Plain(String),
    /// Content deliberately excluded from comparison.
    Filtered,
}

impl Text {
    /// The plain text, or `None` for a filtered node.
    #[must_use]
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(text) => Some(text),
            Self::Filtered => None,
        }
    }

    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered)
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_owned())
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

/// Structural hash of a subtree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the first 8 bytes.
    #[must_use]
    pub fn short_hex(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

/// One node of a normalized tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawNode")]
pub struct Node {
    kind: String,
    text: Text,
    children: Vec<Node>,
    fingerprint: Fingerprint,
    depth: usize,
}

impl Node {
    /// Build a node and compute its fingerprint from its parts.
    #[must_use]
    pub fn new(kind: impl Into<String>, text: impl Into<Text>, children: Vec<Self>) -> Self {
        let kind = kind.into();
        let text = text.into();
        let fingerprint = fingerprint_of(&kind, &text, &children);
        let depth = 1 + children.iter().map(|child| child.depth).max().unwrap_or(0);
        Self {
            kind,
            text,
            children,
            fingerprint,
            depth,
        }
    }

    /// A childless node with plain text.
    #[must_use]
    pub fn leaf(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(kind, Text::Plain(text.into()), Vec::new())
    }

    /// A childless node whose content is excluded from text comparison.
    #[must_use]
    pub fn filtered(kind: impl Into<String>) -> Self {
        Self::new(kind, Text::Filtered, Vec::new())
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub const fn text(&self) -> &Text {
        &self.text
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    #[must_use]
    pub const fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.text.is_filtered()
    }

    /// A node without a kind label cannot be matched against anything.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.kind.trim().is_empty()
    }

    /// Total number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children.iter());
        }
        count
    }

    /// Height of this subtree; a leaf has depth 1.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Unlink descendants onto a heap stack so deep chains do not
        // recurse through the default drop glue.
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

fn fingerprint_of(kind: &str, text: &Text, children: &[Node]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(kind.len() as u64).to_le_bytes());
    hasher.update(kind.as_bytes());
    match text {
        Text::Filtered => {
            hasher.update(&[0]);
        }
        Text::Plain(text) => {
            hasher.update(&[1]);
            hasher.update(&(text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
    }
    hasher.update(&(children.len() as u64).to_le_bytes());
    for child in children {
        hasher.update(child.fingerprint.as_bytes());
    }
    Fingerprint(*hasher.finalize().as_bytes())
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Node", 3)?;
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("text", self.text.as_plain().unwrap_or(FILTERED_SENTINEL))?;
        state.serialize_field("children", &self.children)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    children: Vec<Node>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        let text = match raw.text {
            Some(text) if text != FILTERED_SENTINEL => Text::Plain(text),
            _ => Text::Filtered,
        };
        Self::new(raw.kind, text, raw.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(paragraph: &str) -> Node {
        Node::new(
            "document",
            "",
            vec![
                Node::leaf("paragraph", paragraph),
                Node::filtered("code_block"),
            ],
        )
    }

    #[test]
    fn equal_trees_share_a_fingerprint() {
        assert_eq!(doc("hello").fingerprint(), doc("hello").fingerprint());
    }

    #[test]
    fn text_change_deep_in_tree_changes_root_fingerprint() {
        assert_ne!(doc("hello").fingerprint(), doc("hullo").fingerprint());
    }

    #[test]
    fn filtered_and_sentinel_text_hash_differently_from_empty_text() {
        let filtered = Node::filtered("link");
        let empty = Node::leaf("link", "");
        assert_ne!(filtered.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn kind_boundaries_are_unambiguous() {
        // "ab" + text "c" must not collide with "a" + text "bc".
        let left = Node::leaf("ab", "c");
        let right = Node::leaf("a", "bc");
        assert_ne!(left.fingerprint(), right.fingerprint());
    }

    #[test]
    fn child_order_matters() {
        let a = Node::new("list", "", vec![Node::leaf("item", "1"), Node::leaf("item", "2")]);
        let b = Node::new("list", "", vec![Node::leaf("item", "2"), Node::leaf("item", "1")]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn counts_and_depth() {
        let tree = doc("x");
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(Node::leaf("text", "x").depth(), 1);
    }

    fn chain(depth: usize) -> Node {
        let mut node = Node::leaf("text", "bottom");
        for _ in 1..depth {
            node = Node::new("block_quote", "", vec![node]);
        }
        node
    }

    #[test]
    fn very_deep_chain_counts_and_drops_without_recursion() {
        let deep = chain(200_000);
        assert_eq!(deep.depth(), 200_000);
        assert_eq!(deep.node_count(), 200_000);
        drop(deep);
    }

    #[test]
    fn deserialized_tree_caches_depth() {
        let node: Node = serde_json::from_str(
            r#"{"type":"list","text":"","children":[{"type":"list_item","text":"a","children":[{"type":"text","text":"a"}]}]}"#,
        )
        .expect("deserialize");
        assert_eq!(node.depth(), 3);
    }

    #[test]
    fn empty_kind_is_malformed() {
        assert!(!Node::leaf("", "text").is_well_formed());
        assert!(!Node::leaf("  ", "text").is_well_formed());
        assert!(Node::leaf("text", "").is_well_formed());
    }

    #[test]
    fn json_round_trip_keeps_structure_and_fingerprint() {
        let tree = doc("hello world");
        let json = serde_json::to_string(&tree).expect("serialize");
        assert!(json.contains("\"<FILTERED>\""), "{json}");
        let back: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, tree);
        assert_eq!(back.fingerprint(), tree.fingerprint());
    }

    #[test]
    fn null_text_deserializes_as_filtered() {
        let node: Node =
            serde_json::from_str(r#"{"type":"image","text":null}"#).expect("deserialize");
        assert!(node.is_filtered());
        assert!(node.children().is_empty());
    }

    #[test]
    fn missing_type_deserializes_as_malformed() {
        let node: Node = serde_json::from_str(r#"{"text":"orphan"}"#).expect("deserialize");
        assert!(!node.is_well_formed());
        assert_eq!(node.text().as_plain(), Some("orphan"));
    }
}
