use proptest::prelude::*;
use treesim_core::tree::Node;

const KINDS: &[&str] = &["document", "paragraph", "heading", "list", "list_item", "text"];

pub fn arb_kind() -> impl Strategy<Value = String> + Clone {
    prop::sample::select(KINDS).prop_map(str::to_string)
}

/// Short texts over a small alphabet so that matching blocks are common.
pub fn arb_text() -> impl Strategy<Value = String> + Clone {
    "[ab c]{0,12}"
}

pub fn arb_leaf() -> impl Strategy<Value = Node> + Clone {
    prop_oneof![
        4 => (arb_kind(), arb_text()).prop_map(|(kind, text)| Node::leaf(kind, text)),
        1 => arb_kind().prop_map(Node::filtered),
    ]
}

/// Well-formed trees up to four levels deep.
pub fn arb_node() -> impl Strategy<Value = Node> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        (arb_kind(), arb_text(), prop::collection::vec(inner, 0..4))
            .prop_map(|(kind, text, children)| Node::new(kind, text, children))
    })
}

pub fn arb_children() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(arb_node(), 0..5)
}
