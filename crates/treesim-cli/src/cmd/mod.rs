pub mod compare;
pub mod completions;
pub mod tree;
