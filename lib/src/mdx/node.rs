use std::sync::Arc;

use serde::Serialize;

use crate::script::{self, Program};

/// A parsed MDX document or partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// The raw contents between the `---` fences, unvalidated.
    Frontmatter { value: String },
    Heading { depth: u8, children: Vec<Node> },
    Paragraph { children: Vec<Node> },
    /// Fenced code. `meta` is the info string after the language.
    Code { lang: Option<String>, meta: Option<String>, value: String },
    ThematicBreak,
    Text { value: String },
    InlineCode { value: String },
    FlowExpression(Embedded),
    TextExpression(Embedded),
    Esm(Embedded),
    FlowElement(Element),
    TextElement(Element),
}

/// Script embedded in the document, as written, with its parse.
#[derive(derive_more::Debug, Clone, Serialize)]
pub struct Embedded {
    pub value: String,
    #[debug(ignore)]
    #[serde(skip)]
    pub program: Option<Arc<Program>>,
}

impl PartialEq for Embedded {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    /// `None` for fragments.
    pub name: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Attribute {
    Property { name: String, value: Option<AttributeValue> },
    Spread(Embedded),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    Literal(String),
    Expression(Embedded),
}

impl Embedded {
    /// Wraps `value`, parsing it as a module body. `program` is `None` if it
    /// doesn't parse.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let program = script::parse_program(&value).ok().map(Arc::new);
        Embedded { value, program }
    }

    /// Wraps the source of an ESM block. Statements outside the grammar are
    /// kept unparsed, so `program` is always present and sees every import.
    pub fn module(value: impl Into<String>) -> Self {
        let value = value.into();
        let program = Some(Arc::new(script::parse_module(&value)));
        Embedded { value, program }
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_deref()
    }

    /// Replaces the source text and its parse.
    pub fn set(&mut self, value: String, program: Program) {
        self.value = value;
        self.program = Some(Arc::new(program));
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text { value: value.into() }
    }

    pub fn children(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Heading { children, .. } | Node::Paragraph { children } => Some(children),
            Node::FlowElement(e) | Node::TextElement(e) => Some(&e.children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Heading { children, .. } | Node::Paragraph { children } => Some(children),
            Node::FlowElement(e) | Node::TextElement(e) => Some(&mut e.children),
            _ => None,
        }
    }

    /// Whether this is a block-level node. Everything else is phrasing.
    pub fn is_flow(&self) -> bool {
        matches!(self,
            Node::Frontmatter { .. } | Node::Heading { .. } | Node::Paragraph { .. }
            | Node::Code { .. } | Node::ThematicBreak | Node::FlowExpression(_)
            | Node::Esm(_) | Node::FlowElement(_))
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element { name: Some(name.into()), attributes: vec![], children: vec![] }
    }

    pub fn attribute(mut self, name: &str, value: Option<AttributeValue>) -> Self {
        self.attributes.push(Attribute::Property { name: name.into(), value });
        self
    }
}

/// The concatenated text of `node`: text and inline code values, and the
/// source of text expressions, in document order.
pub fn text_content(node: &Node) -> String {
    fn collect(node: &Node, out: &mut String) {
        match node {
            Node::Text { value } | Node::InlineCode { value } => out.push_str(value),
            Node::TextExpression(e) => out.push_str(&e.value),
            _ => node.children().into_iter().flatten().for_each(|n| collect(n, out)),
        }
    }

    let mut out = String::new();
    collect(node, &mut out);
    out
}

/// Visits every node depth-first, parents before children.
pub fn walk<'a>(nodes: &'a [Node], f: &mut dyn FnMut(&'a Node)) {
    for node in nodes {
        f(node);
        if let Some(children) = node.children() {
            walk(children, f);
        }
    }
}

/// Visits every node depth-first, parents before children, mutably. A node
/// replaced by `f` is descended into as replaced.
pub fn walk_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Node)) {
    for node in nodes {
        f(node);
        if let Some(children) = node.children_mut() {
            walk_mut(children, f);
        }
    }
}

impl Document {
    pub fn walk<'a>(&'a self, mut f: impl FnMut(&'a Node)) {
        walk(&self.children, &mut f)
    }

    /// The number of leading front matter and ESM nodes.
    pub fn preamble_len(&self) -> usize {
        self.children.iter()
            .take_while(|n| matches!(n, Node::Frontmatter { .. } | Node::Esm(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_includes_code_and_expressions() {
        let heading = Node::Heading {
            depth: 2,
            children: vec![
                Node::text("Using "),
                Node::InlineCode { value: "nib".into() },
                Node::TextExpression(Embedded::new("props.x")),
            ],
        };

        assert_eq!(text_content(&heading), "Using nibprops.x");
    }

    #[test]
    fn embedded_parses_eagerly() {
        assert!(Embedded::new("a + b").program().is_some());
        assert!(Embedded::new("a +").program().is_none());
    }

    #[test]
    fn modules_keep_imports_around_unsupported_statements() {
        let esm = Embedded::module("import A from './A.mdx'\nwith (x) {}\nimport B from './B.mdx'");
        let program = esm.program().unwrap();
        let sources: Vec<_> = program.imports().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["./A.mdx", "./B.mdx"]);
        assert!(matches!(&program.body[1], script::Statement::Unparsed(s) if s == "with (x) {}"));
        assert!(!program.is_import_only());
    }

    #[test]
    fn serializes_with_type_tags() {
        let doc = Document { children: vec![Node::ThematicBreak, Node::text("x")] };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["children"][0]["type"], "thematicBreak");
        assert_eq!(json["children"][1]["value"], "x");
    }
}
