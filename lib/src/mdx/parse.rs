use std::borrow::Cow;
use std::fmt;

use crate::mdx::node::*;
use crate::script::{self, jsx, matching_brace};
use crate::script::jsx::{RawAttribute, RawValue, Tag, TagKind};

/// A syntax error in an MDX document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based.
    pub line: usize,
    /// 0-based, in characters.
    pub column: usize,
}

impl ParseError {
    fn at(src: &str, offset: usize, message: impl Into<String>) -> Self {
        script::ParseError::at(src, offset, message).into()
    }
}

impl From<script::ParseError> for ParseError {
    fn from(e: script::ParseError) -> Self {
        ParseError { message: e.message, line: e.line, column: e.column }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError { }

type Result<T> = std::result::Result<T, ParseError>;

/// Parses an MDX document.
///
/// ```
/// use quill::mdx::{self, Node};
///
/// let doc = mdx::parse("# Hello {props.name}\n\n<Card title=\"x\" />").unwrap();
/// assert!(matches!(doc.children[0], Node::Heading { depth: 1, .. }));
/// assert!(matches!(doc.children[1], Node::FlowElement(_)));
/// ```
pub fn parse(source: &str) -> Result<Document> {
    let source = if source.contains('\r') {
        Cow::Owned(source.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(source)
    };

    let mut blocks = Blocks { src: &source, pos: 0, end: source.len(), top: true };
    Ok(Document { children: blocks.parse()? })
}

struct Blocks<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
    top: bool,
}

pub(super) fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

pub(super) fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    let spaced = matches!(line.as_bytes().get(hashes), None | Some(b' ' | b'\t'));
    ((1..=6).contains(&hashes) && spaced).then_some(hashes)
}

pub(super) fn is_thematic_break(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !c.is_whitespace());
    let Some(first @ ('*' | '-' | '_')) = marks.next() else { return false };
    let mut count = 1;
    for c in marks {
        if c != first {
            return false;
        }

        count += 1;
    }

    count >= 3
}

/// If a code span opens at `i`, returns its contents' range and its end.
fn code_span(src: &str, i: usize, end: usize) -> Option<(usize, usize, usize)> {
    let bytes = src.as_bytes();
    let run = |at: usize| bytes[at..end].iter().take_while(|&&b| b == b'`').count();

    let n = run(i);
    let mut j = i + n;
    while let Some(k) = memchr::memchr(b'`', &bytes[j..end]) {
        let at = j + k;
        let m = run(at);
        if m == n {
            return Some((i + n, at, at + m));
        }

        j = at + m;
    }

    None
}

/// Appends source text to `text`, dropping the indentation of continuation
/// lines.
fn push_source(text: &mut String, raw: &str) {
    let mut lines = raw.split('\n');
    if let Some(first) = lines.next() {
        text.push_str(first);
    }

    for line in lines {
        text.push('\n');
        text.push_str(line.trim_start_matches([' ', '\t']));
    }
}

/// Decodes the numeric character reference (`&#35;`, `&#x23;`) that `s`
/// starts with. Returns the character and the length of the reference.
fn char_ref(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("&#")?;
    let (digits, radix, prefix) = match body.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };

    let len = digits.bytes()
        .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
        .count();

    if len == 0 || len > 7 || digits.as_bytes().get(len) != Some(&b';') {
        return None;
    }

    let c = u32::from_str_radix(&digits[..len], radix).ok().and_then(char::from_u32)?;
    Some((c, prefix + len + 1))
}

fn code_span_value(raw: &str) -> String {
    let value = raw.replace('\n', " ");
    let padded = value.len() >= 2 && value.starts_with(' ') && value.ends_with(' ');
    if padded && !value.bytes().all(|b| b == b' ') {
        value[1..value.len() - 1].to_string()
    } else {
        value
    }
}

fn attributes(raw: Vec<RawAttribute>) -> Vec<Attribute> {
    raw.into_iter()
        .map(|attr| match attr {
            RawAttribute::Property { name, value } => Attribute::Property {
                name,
                value: value.map(|v| match v {
                    RawValue::Literal(s) => AttributeValue::Literal(s),
                    RawValue::Expression(s) => AttributeValue::Expression(Embedded::new(s)),
                }),
            },
            RawAttribute::Spread(s) => Attribute::Spread(Embedded::new(s)),
        })
        .collect()
}

fn element(tag: Tag, children: Vec<Node>) -> Element {
    Element { name: tag.name, attributes: attributes(tag.attributes), children }
}

fn closing_tag_error(src: &str, tag: &Tag) -> ParseError {
    let name = tag.name.as_deref().unwrap_or("");
    ParseError::at(src, tag.start, format!("Unexpected closing tag `</{name}>`"))
}

fn unclosed_expression(src: &str, at: usize) -> ParseError {
    ParseError::at(src, at, "Unexpected end of file in expression, expected a corresponding closing brace for `{`")
}

impl<'a> Blocks<'a> {
    fn line_end(&self, pos: usize) -> usize {
        let pos = pos.min(self.end);
        memchr::memchr(b'\n', &self.src.as_bytes()[pos..self.end]).map_or(self.end, |i| pos + i)
    }

    fn line(&self, pos: usize) -> &'a str {
        &self.src[pos.min(self.end)..self.line_end(pos)]
    }

    fn rest_blank(&self, pos: usize) -> bool {
        self.line(pos).trim().is_empty()
    }

    fn next_line(&self, pos: usize) -> usize {
        (self.line_end(pos) + 1).min(self.end)
    }

    fn parse(&mut self) -> Result<Vec<Node>> {
        let mut nodes = vec![];
        loop {
            while self.pos < self.end && self.rest_blank(self.pos) {
                self.pos = self.line_end(self.pos) + 1;
            }

            if self.pos >= self.end {
                return Ok(nodes);
            }

            nodes.push(self.block()?);
        }
    }

    fn block(&mut self) -> Result<Node> {
        let start = self.pos;
        let line = self.line(start);
        let trimmed = line.trim();
        let p = start + (line.len() - line.trim_start().len());

        if self.top && start == 0 && trimmed == "---" {
            if let Some(node) = self.frontmatter() {
                return Ok(node);
            }
        }

        if self.top && (line.starts_with("import ") || line.starts_with("export ")) {
            return Ok(self.esm());
        }

        if is_fence(trimmed) {
            if let Some(node) = self.fence(p - start)? {
                return Ok(node);
            }
        }

        if let Some(depth) = heading_level(trimmed) {
            return self.heading(p, depth);
        }

        if is_thematic_break(trimmed) {
            self.pos = self.line_end(start);
            return Ok(Node::ThematicBreak);
        }

        if trimmed.starts_with('<') && jsx::looks_like_tag(self.src, p) {
            if let Some(node) = self.flow_element(p)? {
                return Ok(node);
            }
        }

        if trimmed.starts_with('{') {
            let close = matching_brace(self.src, p)
                .filter(|&c| c < self.end)
                .ok_or_else(|| unclosed_expression(self.src, p))?;

            if self.rest_blank(close + 1) {
                self.pos = self.line_end(close + 1);
                return Ok(Node::FlowExpression(Embedded::new(&self.src[p + 1..close])));
            }
        }

        self.paragraph(p)
    }

    fn frontmatter(&mut self) -> Option<Node> {
        let body = self.next_line(0);
        let mut pos = body;
        while pos < self.end {
            if self.line(pos).trim_end() == "---" {
                let value = self.src[body..pos].strip_suffix('\n').unwrap_or("");
                self.pos = self.line_end(pos);
                return Some(Node::Frontmatter { value: value.to_string() });
            }

            pos = self.line_end(pos) + 1;
        }

        None
    }

    fn esm(&mut self) -> Node {
        let start = self.pos;
        let mut pos = start;
        while pos < self.end && !self.rest_blank(pos) {
            pos = self.line_end(pos) + 1;
        }

        let end = pos.min(self.end);
        self.pos = end;
        Node::Esm(Embedded::module(self.src[start..end].trim_end()))
    }

    fn fence(&mut self, indent: usize) -> Result<Option<Node>> {
        let start = self.pos;
        let opening = self.line(start).trim();
        let mark = opening.as_bytes()[0];
        let run = opening.bytes().take_while(|&b| b == mark).count();
        let info = opening[run..].trim();
        if mark == b'`' && info.contains('`') {
            return Ok(None);
        }

        let mut words = info.splitn(2, char::is_whitespace);
        let lang = words.next().filter(|s| !s.is_empty()).map(String::from);
        let meta = words.next().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        let body = self.next_line(start);
        let mut pos = body;
        while pos < self.end {
            let line = self.line(pos).trim();
            if line.len() >= run && line.bytes().all(|b| b == mark) {
                let value = self.src[body..pos].strip_suffix('\n').unwrap_or("")
                    .split('\n')
                    .map(|l| {
                        let strip = l.len() - l.trim_start_matches(' ').len();
                        &l[strip.min(indent)..]
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                self.pos = self.line_end(pos);
                return Ok(Some(Node::Code { lang, meta, value }));
            }

            pos = self.line_end(pos) + 1;
        }

        Err(ParseError::at(self.src, start + indent, "Unclosed code fence"))
    }

    fn heading(&mut self, p: usize, depth: usize) -> Result<Node> {
        let line_end = self.line_end(p);
        let raw = &self.src[p + depth..line_end];
        let mut content = raw.trim();
        let without = content.trim_end_matches('#');
        if without.len() != content.len() && (without.is_empty() || without.ends_with([' ', '\t'])) {
            content = without.trim_end();
        }

        let from = p + depth + (raw.len() - raw.trim_start().len());
        let children = self.inline(from, from + content.len())?;
        self.pos = line_end;
        Ok(Node::Heading { depth: depth as u8, children })
    }

    fn flow_element(&mut self, p: usize) -> Result<Option<Node>> {
        let tag = jsx::parse_tag(self.src, p)?;
        if tag.end > self.end {
            return Err(ParseError::at(self.src, p, "Unexpected end of element in tag"));
        }

        match tag.kind {
            TagKind::Closing => Err(closing_tag_error(self.src, &tag)),
            TagKind::SelfClosing if self.rest_blank(tag.end) => {
                self.pos = self.line_end(tag.end);
                Ok(Some(Node::FlowElement(element(tag, vec![]))))
            }
            TagKind::SelfClosing => Ok(None),
            TagKind::Opening => {
                let (close_start, close_end) = jsx::find_closing(self.src, tag.end, tag.name.as_deref(), true)?;
                if close_end > self.end || !self.rest_blank(close_end) {
                    return Ok(None);
                }

                let children = if self.rest_blank(tag.end) {
                    let mut inner = Blocks { src: self.src, pos: tag.end, end: close_start, top: false };
                    inner.parse()?
                } else {
                    self.inline(tag.end, close_start)?
                };

                self.pos = self.line_end(close_end);
                Ok(Some(Node::FlowElement(element(tag, children))))
            }
        }
    }

    /// Whether the line at `pos` ends a paragraph before it.
    fn interrupts(&self, pos: usize) -> bool {
        let line = self.line(pos).trim();
        line.is_empty() || is_fence(line) || heading_level(line).is_some()
    }

    fn paragraph(&mut self, p: usize) -> Result<Node> {
        let src = self.src;
        let bytes = src.as_bytes();
        let mut i = p;
        let mut end = self.end;
        while i < self.end {
            match bytes[i] {
                b'\\' => i += 2,
                b'`' => i = code_span(src, i, self.end).map_or(i + 1, |(.., after)| after),
                b'{' => {
                    i = matching_brace(src, i)
                        .filter(|&c| c < self.end)
                        .ok_or_else(|| unclosed_expression(src, i))? + 1;
                }
                b'<' if jsx::looks_like_tag(src, i) => i = jsx::parse_tag(src, i)?.end,
                b'\n' if self.interrupts(i + 1) => {
                    end = i;
                    break;
                }
                _ => i += 1,
            }
        }

        let content = src[p..end.min(self.end)].trim_end();
        let children = self.inline(p, p + content.len())?;
        self.pos = end.min(self.end);
        Ok(Node::Paragraph { children })
    }

    fn inline(&self, start: usize, end: usize) -> Result<Vec<Node>> {
        fn flush(text: &mut String, nodes: &mut Vec<Node>) {
            if !text.is_empty() {
                nodes.push(Node::Text { value: std::mem::take(text) });
            }
        }

        let src = self.src;
        let bytes = src.as_bytes();
        let mut nodes = vec![];
        let mut text = String::new();
        let (mut i, mut run) = (start, start);
        while i < end {
            match bytes[i] {
                b'\\' if i + 1 < end && matches!(bytes[i + 1], b'{' | b'}' | b'<' | b'\\' | b'`' | b'&') => {
                    push_source(&mut text, &src[run..i]);
                    text.push(bytes[i + 1] as char);
                    i += 2;
                    run = i;
                }
                b'&' => match char_ref(&src[i..end]) {
                    Some((c, len)) => {
                        push_source(&mut text, &src[run..i]);
                        text.push(c);
                        i += len;
                        run = i;
                    }
                    None => i += 1,
                },
                b'`' => match code_span(src, i, end) {
                    Some((from, to, after)) => {
                        push_source(&mut text, &src[run..i]);
                        flush(&mut text, &mut nodes);
                        nodes.push(Node::InlineCode { value: code_span_value(&src[from..to]) });
                        i = after;
                        run = i;
                    }
                    None => i += bytes[i..end].iter().take_while(|&&b| b == b'`').count(),
                },
                b'{' => {
                    let close = matching_brace(src, i)
                        .filter(|&c| c < end)
                        .ok_or_else(|| unclosed_expression(src, i))?;

                    push_source(&mut text, &src[run..i]);
                    flush(&mut text, &mut nodes);
                    nodes.push(Node::TextExpression(Embedded::new(&src[i + 1..close])));
                    i = close + 1;
                    run = i;
                }
                b'<' if jsx::looks_like_tag(src, i) => {
                    let tag = jsx::parse_tag(src, i)?;
                    if tag.end > end {
                        return Err(ParseError::at(src, i, "Unexpected end of paragraph in tag"));
                    }

                    push_source(&mut text, &src[run..i]);
                    flush(&mut text, &mut nodes);
                    let next = match tag.kind {
                        TagKind::Closing => return Err(closing_tag_error(src, &tag)),
                        TagKind::SelfClosing => {
                            let next = tag.end;
                            nodes.push(Node::TextElement(element(tag, vec![])));
                            next
                        }
                        TagKind::Opening => {
                            let (close_start, close_end) = jsx::find_closing(src, tag.end, tag.name.as_deref(), true)?;
                            if close_end > end {
                                return Err(ParseError::at(src, i, format!(
                                    "Expected a closing tag for `<{}>` before the end of the paragraph",
                                    tag.name.as_deref().unwrap_or(""),
                                )));
                            }

                            let children = self.inline(tag.end, close_start)?;
                            nodes.push(Node::TextElement(element(tag, children)));
                            close_end
                        }
                    };

                    i = next;
                    run = i;
                }
                _ => i += 1,
            }
        }

        push_source(&mut text, &src[run..end]);
        flush(&mut text, &mut nodes);
        Ok(nodes)
    }
}
