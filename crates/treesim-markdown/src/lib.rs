//! Markdown front end for treesim.
//!
//! [`MarkdownNormalizer`] turns Markdown source into the normalized [`Node`]
//! trees the similarity engine compares. Every block and inline span becomes
//! a node labelled with a `snake_case` kind (`paragraph`, `heading`,
//! `code_block`, ...) whose text is the trimmed source it covers. Kinds listed
//! as filtered keep their position in the tree but lose their content: they
//! are emitted as [`Text::Filtered`](treesim_core::tree::Text::Filtered)
//! leaves and nothing inside them is visited.
//!
//! Nesting is capped at a maximum tree height. Spans that would open below
//! the cap are flattened: their own node is dropped and their content is
//! attached to the deepest open node, so pathological inputs such as
//! thousands of nested block quotes still yield a tree the engine can score.
//!
//! The normalizer holds no global state; construct one and pass it where it
//! is needed.

#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, Options, Parser, Tag};
use tracing::{debug, warn};
use treesim_core::config::{DEFAULT_MAX_DEPTH, EngineConfig};
use treesim_core::error::ErrorCode;
use treesim_core::tree::Node;

/// Kind label of the root node.
pub const DOCUMENT_KIND: &str = "document";

/// Errors raised while loading a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorCode::DocumentNotFound
            }
            Self::Io { .. } => ErrorCode::DocumentReadFailed,
        }
    }
}

/// Builds normalized trees from Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownNormalizer {
    filtered_kinds: HashSet<String>,
    options: Options,
    max_depth: usize,
}

impl Default for MarkdownNormalizer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl MarkdownNormalizer {
    /// Normalizer that filters the given kinds, with tables, footnotes,
    /// strikethrough, task lists and front matter enabled.
    #[must_use]
    pub fn new<I, S>(filtered_kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filtered_kinds: filtered_kinds.into_iter().map(Into::into).collect(),
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.filtered_kinds.iter().cloned()).with_max_depth(config.max_depth)
    }

    /// Cap the height of produced trees, root included. Values below 2 are
    /// raised to 2 so a document can hold its content.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(2);
        self
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Replace the parser extensions.
    #[must_use]
    pub const fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn is_filtered(&self, kind: &str) -> bool {
        self.filtered_kinds.contains(kind)
    }

    /// Normalize `source` into a tree rooted at a `document` node, no taller
    /// than [`max_depth`](Self::max_depth).
    #[must_use]
    pub fn normalize(&self, source: &str) -> Node {
        let mut builder = TreeBuilder::new(source);
        let mut skip_depth = 0_usize;
        // Spans opened past the cap; their End events are swallowed.
        let mut flattened = 0_usize;
        let mut flattened_total = 0_usize;

        for (event, range) in Parser::new_ext(source, self.options).into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if skip_depth > 0 {
                        skip_depth += 1;
                        continue;
                    }
                    let kind = tag_kind(&tag);
                    if self.is_filtered(kind) {
                        builder.push_child(Node::filtered(kind));
                        skip_depth = 1;
                    } else if builder.stack.len() + 1 >= self.max_depth {
                        // An opened span needs one level for itself and one
                        // for its leaves.
                        flattened += 1;
                        flattened_total += 1;
                    } else {
                        builder.open(kind, range);
                    }
                }
                Event::End(_) => {
                    if skip_depth > 0 {
                        skip_depth -= 1;
                    } else if flattened > 0 {
                        flattened -= 1;
                    } else {
                        builder.close();
                    }
                }
                leaf => {
                    if skip_depth > 0 {
                        continue;
                    }
                    if let Some(kind) = leaf_kind(&leaf) {
                        let node = if self.is_filtered(kind) {
                            Node::filtered(kind)
                        } else {
                            Node::leaf(kind, builder.slice(range))
                        };
                        builder.push_child(node);
                    }
                }
            }
        }

        if flattened_total > 0 {
            warn!(
                max_depth = self.max_depth,
                flattened = flattened_total,
                "markdown nesting exceeds max_depth; inner spans flattened"
            );
        }
        builder.finish()
    }

    /// Read and normalize a file. Invalid UTF-8 is replaced, not rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be read.
    pub fn parse_file(&self, path: &Path) -> Result<Node, ParseError> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes);
        let tree = self.normalize(&source);
        debug!(
            path = %path.display(),
            nodes = tree.node_count(),
            depth = tree.depth(),
            "normalized markdown document"
        );
        Ok(tree)
    }
}

struct Frame {
    kind: &'static str,
    range: Range<usize>,
    children: Vec<Node>,
}

/// Stack of open spans; closed spans are attached to their parent.
struct TreeBuilder<'s> {
    source: &'s str,
    stack: Vec<Frame>,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: vec![Frame {
                kind: DOCUMENT_KIND,
                range: 0..source.len(),
                children: Vec::new(),
            }],
        }
    }

    fn slice(&self, range: Range<usize>) -> &'s str {
        self.source.get(range).unwrap_or_default().trim()
    }

    fn open(&mut self, kind: &'static str, range: Range<usize>) {
        self.stack.push(Frame {
            kind,
            range,
            children: Vec::new(),
        });
    }

    fn push_child(&mut self, node: Node) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    fn close(&mut self) {
        // The root frame is only closed by `finish`.
        if self.stack.len() < 2 {
            return;
        }
        if let Some(frame) = self.stack.pop() {
            let node = Node::new(frame.kind, self.slice(frame.range), frame.children);
            self.push_child(node);
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        let root = self.stack.pop().map_or_else(Vec::new, |frame| frame.children);
        Node::new(DOCUMENT_KIND, self.source.trim(), root)
    }
}

fn tag_kind(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "paragraph",
        Tag::Heading { .. } => "heading",
        Tag::BlockQuote(_) => "block_quote",
        Tag::CodeBlock(_) => "code_block",
        Tag::HtmlBlock => "html_block",
        Tag::List(_) => "list",
        Tag::Item => "list_item",
        Tag::FootnoteDefinition(_) => "footnote_definition",
        Tag::DefinitionList => "definition_list",
        Tag::DefinitionListTitle => "definition_list_title",
        Tag::DefinitionListDefinition => "definition_list_definition",
        Tag::Table(_) => "table",
        Tag::TableHead => "table_head",
        Tag::TableRow => "table_row",
        Tag::TableCell => "table_cell",
        Tag::Emphasis => "emphasis",
        Tag::Strong => "strong",
        Tag::Strikethrough => "strikethrough",
        Tag::Link { .. } => "link",
        Tag::Image { .. } => "image",
        Tag::MetadataBlock(_) => "metadata_block",
    }
}

fn leaf_kind(event: &Event<'_>) -> Option<&'static str> {
    match event {
        Event::Text(_) => Some("text"),
        Event::Code(_) => Some("code_span"),
        Event::InlineHtml(_) => Some("inline_html"),
        Event::Html(_) => Some("html"),
        Event::SoftBreak => Some("soft_break"),
        Event::HardBreak => Some("hard_break"),
        Event::Rule => Some("thematic_break"),
        Event::FootnoteReference(_) => Some("footnote_reference"),
        Event::TaskListMarker(_) => Some("task_list_marker"),
        _ => None,
    }
}
