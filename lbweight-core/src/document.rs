//! Schema-agnostic document tree
//!
//! Routing-proxy documents are parsed into a generic tree of [`DocumentNode`]s
//! so fields can be located by name rather than through typed structs whose
//! shape would have to follow the proxy's schema version. Mapping entries are
//! kept flattened as `key, value, key, value, ...`; the name search relies on
//! that pairing.
//!
//! Every scalar remembers where it sits in the source text. Saving a document
//! splices the scalars that were changed back into the original text, so
//! comments, anchors, quoting and layout survive a rewrite.

use crate::error::{LbWeightError, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// How a scalar resolves under the YAML core schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

/// How a scalar is written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Plain,
    Single,
    Double,
    /// Literal or folded block
    Block,
}

/// A leaf value, held in its textual form
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
    quoting: Quoting,
    /// Byte range of the scalar in the source, quotes included
    span: Option<Range<usize>>,
    modified: bool,
}

impl Scalar {
    pub fn string(value: impl Into<String>) -> Self {
        Self::detached(value.into(), ScalarStyle::Str)
    }

    pub fn int(value: i64) -> Self {
        Self::detached(value.to_string(), ScalarStyle::Int)
    }

    fn detached(value: String, style: ScalarStyle) -> Self {
        Self {
            value,
            style,
            quoting: Quoting::Plain,
            span: None,
            modified: false,
        }
    }

    /// Source text for the current value, in the scalar's original quoting
    fn render(&self) -> String {
        match self.quoting {
            Quoting::Plain if is_plain_safe(&self.value) => self.value.clone(),
            Quoting::Single if !self.value.contains('\n') => {
                format!("'{}'", self.value.replace('\'', "''"))
            }
            _ => double_quoted(&self.value),
        }
    }
}

/// One node of a parsed document: a mapping key, a mapping value or a
/// sequence element.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Scalar(Scalar),
    /// Entries flattened as `key, value, key, value, ...`
    Mapping(Vec<DocumentNode>),
    Sequence(Vec<DocumentNode>),
    /// A node carrying an explicit YAML tag; transparent to searches
    Tagged { tag: String, node: Box<DocumentNode> },
    /// A reference to an anchored node. Not followed by searches.
    Alias,
}

impl DocumentNode {
    /// Scalar text of this node, if it is a scalar
    pub fn value(&self) -> Option<&str> {
        match self {
            DocumentNode::Scalar(scalar) => Some(&scalar.value),
            DocumentNode::Tagged { node, .. } => node.value(),
            _ => None,
        }
    }

    /// Scalar value as a YAML integer (decimal, `0x` hex or `0o` octal)
    pub fn as_i64(&self) -> Option<i64> {
        self.value().and_then(parse_int)
    }

    /// Ordered children; empty for scalars and aliases
    pub fn children(&self) -> &[DocumentNode] {
        match self {
            DocumentNode::Mapping(children) | DocumentNode::Sequence(children) => children,
            DocumentNode::Tagged { node, .. } => node.children(),
            DocumentNode::Scalar(_) | DocumentNode::Alias => &[],
        }
    }

    /// Mutable ordered children; empty for scalars and aliases
    pub fn children_mut(&mut self) -> &mut [DocumentNode] {
        match self {
            DocumentNode::Mapping(children) | DocumentNode::Sequence(children) => children,
            DocumentNode::Tagged { node, .. } => node.children_mut(),
            DocumentNode::Scalar(_) | DocumentNode::Alias => &mut [],
        }
    }

    /// Replace the text of a scalar, keeping its style and quoting.
    ///
    /// Returns `false` (and changes nothing) when the node is not a scalar.
    pub fn set_value(&mut self, value: impl Into<String>) -> bool {
        match self {
            DocumentNode::Scalar(scalar) => {
                let value = value.into();
                if scalar.value != value {
                    scalar.value = value;
                    scalar.modified = true;
                }
                true
            }
            DocumentNode::Tagged { node, .. } => node.set_value(value),
            _ => false,
        }
    }

    /// Find the node that follows the first child whose value is `name`.
    ///
    /// Depth-first, pre-order, document order. Within one child list, the
    /// first match returns its next sibling immediately: the rest of that
    /// list is not scanned and nothing below the match is explored. A
    /// same-named field nested under the match's remaining siblings is
    /// therefore unreachable from this starting point, so pass a subtree
    /// scoped tightly enough for `name` to be unambiguous.
    pub fn find_after(&self, name: &str) -> Option<&DocumentNode> {
        let mut path = Vec::new();
        if !locate(self, name, &mut path) {
            return None;
        }
        path.iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    /// Mutable counterpart of [`find_after`](Self::find_after), same semantics.
    pub fn find_after_mut(&mut self, name: &str) -> Option<&mut DocumentNode> {
        let mut path = Vec::new();
        if !locate(self, name, &mut path) {
            return None;
        }
        path.iter()
            .try_fold(self, |node, &index| node.children_mut().get_mut(index))
    }

    /// [`find_after`](Self::find_after) for fields that must be present
    pub fn require(&self, name: &str) -> Result<&DocumentNode> {
        self.find_after(name)
            .ok_or_else(|| LbWeightError::missing(name))
    }

    /// [`find_after_mut`](Self::find_after_mut) for fields that must be present
    pub fn require_mut(&mut self, name: &str) -> Result<&mut DocumentNode> {
        self.find_after_mut(name)
            .ok_or_else(|| LbWeightError::missing(name))
    }

    /// Source replacements for every modified scalar
    fn collect_edits(&self, edits: &mut Vec<(Range<usize>, String)>) -> Result<()> {
        match self {
            DocumentNode::Scalar(scalar) if scalar.modified => {
                let span = scalar.span.clone().ok_or_else(|| {
                    LbWeightError::Serialization(format!(
                        "scalar {:?} has no position in the source",
                        scalar.value
                    ))
                })?;
                edits.push((span, scalar.render()));
            }
            DocumentNode::Scalar(_) | DocumentNode::Alias => {}
            DocumentNode::Mapping(children) | DocumentNode::Sequence(children) => {
                for child in children {
                    child.collect_edits(edits)?;
                }
            }
            DocumentNode::Tagged { node, .. } => node.collect_edits(edits)?,
        }
        Ok(())
    }
}

/// Record in `path` the child indices leading to the node after `name`.
fn locate(node: &DocumentNode, name: &str, path: &mut Vec<usize>) -> bool {
    let mut matched = false;
    for (index, child) in node.children().iter().enumerate() {
        if child.value() == Some(name) {
            matched = true;
            continue;
        }
        if matched {
            path.push(index);
            return true;
        }
        if !child.children().is_empty() {
            path.push(index);
            if locate(child, name, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Parse a YAML core schema integer
fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(octal) = digits.strip_prefix("0o") {
        (8, octal)
    } else {
        (10, digits)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn resolve_style(value: &str, quoting: Quoting) -> ScalarStyle {
    if quoting != Quoting::Plain {
        return ScalarStyle::Str;
    }
    match value {
        "" | "~" | "null" | "Null" | "NULL" => ScalarStyle::Null,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => ScalarStyle::Bool,
        ".inf" | "-.inf" | "+.inf" | ".Inf" | "-.Inf" | "+.Inf" | ".nan" | ".NaN" => {
            ScalarStyle::Float
        }
        _ if parse_int(value).is_some() => ScalarStyle::Int,
        _ if value.chars().any(|c| c.is_ascii_digit())
            && value.chars().all(|c| c.is_ascii_digit() || ".eE+-".contains(c))
            && value.parse::<f64>().is_ok() =>
        {
            ScalarStyle::Float
        }
        _ => ScalarStyle::Str,
    }
}

/// Whether `value` can be written as a plain scalar without changing meaning
fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    !"-?:,[]{}#&*!|>'\"%@`".contains(first)
        && value.trim() == value
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
        && !value.contains(['\n', ',', '[', ']', '{', '}'])
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Byte length of a quoted scalar starting at the opening quote
fn quoted_len(rest: &str, quote: u8) -> Option<usize> {
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&quote) {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => {
                // '' escapes a quote inside single quotes
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Some(i + 1);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Skip anchor and tag properties written in front of a node
fn skip_properties(source: &str, mut pos: usize) -> Option<usize> {
    loop {
        let rest = source.get(pos..)?;
        if !rest.starts_with(['&', '!']) {
            return Some(pos);
        }
        let token = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let after = &rest[token..];
        pos += token + (after.len() - after.trim_start().len());
    }
}

/// Span of a scalar whose token starts at byte `start`, checked against the
/// parsed value. Multi-line plain scalars and block scalars have no span.
fn scalar_span(source: &str, start: usize, quoting: Quoting, value: &str) -> Option<Range<usize>> {
    let start = skip_properties(source, start)?;
    let rest = source.get(start..)?;
    let len = match quoting {
        Quoting::Plain if !value.is_empty() && rest.starts_with(value) => value.len(),
        Quoting::Single => quoted_len(rest, b'\'')?,
        Quoting::Double => quoted_len(rest, b'"')?,
        _ => return None,
    };
    Some(start..start + len)
}

/// Builds the tree from parser events
struct TreeBuilder<'a> {
    source: &'a str,
    /// Byte offset of every char, for sources that are not plain ASCII
    char_offsets: Option<Vec<usize>>,
    stack: Vec<Frame>,
    root: Option<DocumentNode>,
}

struct Frame {
    mapping: bool,
    tag: Option<Tag>,
    children: Vec<DocumentNode>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        let char_offsets = (!source.is_ascii()).then(|| {
            source
                .char_indices()
                .map(|(offset, _)| offset)
                .chain(std::iter::once(source.len()))
                .collect()
        });
        Self {
            source,
            char_offsets,
            stack: Vec::new(),
            root: None,
        }
    }

    fn scalar(&self, value: String, style: TScalarStyle, mark: Marker) -> Scalar {
        let quoting = match style {
            TScalarStyle::Plain => Quoting::Plain,
            TScalarStyle::SingleQuoted => Quoting::Single,
            TScalarStyle::DoubleQuoted => Quoting::Double,
            _ => Quoting::Block,
        };

        // Marker indices count chars; fall back to reading them as bytes
        let by_char = match &self.char_offsets {
            Some(offsets) => offsets.get(mark.index()).copied(),
            None => Some(mark.index()),
        };
        let span = [by_char, Some(mark.index())]
            .into_iter()
            .flatten()
            .find_map(|start| scalar_span(self.source, start, quoting, &value));

        Scalar {
            style: resolve_style(&value, quoting),
            value,
            quoting,
            span,
            modified: false,
        }
    }

    fn attach(&mut self, node: DocumentNode) {
        match self.stack.last_mut() {
            Some(frame) => frame.children.push(node),
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
        }
    }
}

fn with_tag(tag: Option<Tag>, node: DocumentNode) -> DocumentNode {
    match tag {
        Some(tag) => DocumentNode::Tagged {
            tag: format!("{}{}", tag.handle, tag.suffix),
            node: Box::new(node),
        },
        None => node,
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        match event {
            Event::Scalar(value, style, _, tag) => {
                let scalar = self.scalar(value, style, mark);
                self.attach(with_tag(tag, DocumentNode::Scalar(scalar)));
            }
            Event::Alias(_) => self.attach(DocumentNode::Alias),
            Event::MappingStart(_, tag) => self.stack.push(Frame {
                mapping: true,
                tag,
                children: Vec::new(),
            }),
            Event::SequenceStart(_, tag) => self.stack.push(Frame {
                mapping: false,
                tag,
                children: Vec::new(),
            }),
            Event::MappingEnd | Event::SequenceEnd => {
                if let Some(frame) = self.stack.pop() {
                    let node = if frame.mapping {
                        DocumentNode::Mapping(frame.children)
                    } else {
                        DocumentNode::Sequence(frame.children)
                    };
                    self.attach(with_tag(frame.tag, node));
                }
            }
            _ => {}
        }
    }
}

/// A document tree bound to the file and text it was read from
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    source: String,
    root: DocumentNode,
}

impl Document {
    /// Read and parse a document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|source| LbWeightError::DocumentRead {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse document text that belongs to `path`. Only the first document
    /// of a multi-document stream is read.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let mut builder = TreeBuilder::new(text);
        Parser::new_from_str(text)
            .load(&mut builder, false)
            .map_err(|e| LbWeightError::Parse(format!("{}: {}", path.display(), e)))?;

        let root = builder.root.unwrap_or(DocumentNode::Mapping(Vec::new()));
        Ok(Self {
            path,
            source: text.to_string(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &DocumentNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DocumentNode {
        &mut self.root
    }

    /// The source text with every modified scalar replaced in place.
    /// Everything else is returned byte for byte.
    pub fn render(&self) -> Result<String> {
        let mut edits = Vec::new();
        self.root.collect_edits(&mut edits)?;
        edits.sort_by_key(|(span, _)| span.start);

        let mut text = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (span, replacement) in edits {
            let kept = self.source.get(cursor..span.start).ok_or_else(|| {
                LbWeightError::Serialization(format!("overlapping edit at byte {}", span.start))
            })?;
            text.push_str(kept);
            text.push_str(&replacement);
            cursor = span.end;
        }
        text.push_str(self.source.get(cursor..).unwrap_or_default());

        Ok(text)
    }

    /// Overwrite the source file with the rendered document
    pub fn save(&self) -> Result<()> {
        let text = self.render()?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
