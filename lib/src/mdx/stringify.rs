use std::fmt::{self, Write};

use crate::mdx::node::*;
use crate::mdx::parse::{heading_level, is_fence, is_thematic_break};

fn longest_run(s: &str, c: char) -> usize {
    let (mut longest, mut run) = (0, 0);
    for ch in s.chars() {
        run = if ch == c { run + 1 } else { 0 };
        longest = longest.max(run);
    }

    longest
}

/// Where a run of phrasing is printed, which decides what the parser would
/// read back differently from the text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrase {
    /// Paragraph content. It opens a block and is trimmed.
    Paragraph,
    /// Heading content. It is a single trimmed line.
    Heading,
    /// The children of an element written on one line.
    Inline,
}

/// Whether the line at the start of `rest` would be read as a block
/// construct instead of text.
fn starts_block(rest: &str, opens_paragraph: bool) -> bool {
    let line = rest.split('\n').next().unwrap_or("");
    let trimmed = line.trim();
    heading_level(trimmed).is_some()
        || is_fence(trimmed)
        || (opens_paragraph && (is_thematic_break(trimmed)
            || line.starts_with("import ")
            || line.starts_with("export ")))
}

fn escape_text(f: &mut fmt::Formatter<'_>, text: &str, phrase: Phrase, first: bool, last: bool) -> fmt::Result {
    let heading = phrase == Phrase::Heading;
    let trimmed = phrase != Phrase::Inline;
    let content_end = if trimmed && last {
        text.trim_end_matches([' ', '\t', '\n']).len()
    } else {
        text.len()
    };

    let mut line_start = false;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        let opens_paragraph = i == 0 && first && phrase == Phrase::Paragraph;
        let continues = std::mem::take(&mut line_start);

        // Characters the parser would drop or reinterpret are written as
        // numeric character references.
        let encode = i >= content_end
            || (i == 0 && first && trimmed && matches!(c, ' ' | '\t'))
            || ((opens_paragraph || continues) && starts_block(&text[i..], opens_paragraph))
            || (c == '\n' && (heading || matches!(next, None | Some('\n' | ' ' | '\t'))))
            || (c == '#' && heading && last && next.is_none());

        if encode {
            write!(f, "&#{};", c as u32)?;
            continue;
        }

        match c {
            '\n' => line_start = true,
            '{' | '}' | '`' => f.write_char('\\')?,
            '<' if next.map_or(false, |n| n == '/' || n == '>' || n.is_alphabetic() || n == '_' || n == '$') => {
                f.write_char('\\')?
            }
            '&' if next.map_or(false, |n| n == '#' || n.is_ascii_alphanumeric()) => f.write_char('\\')?,
            '\\' if matches!(next, None | Some('{' | '}' | '<' | '\\' | '`' | '&')) => f.write_char('\\')?,
            _ => {}
        }

        f.write_char(c)?;
    }

    Ok(())
}

fn inline_code(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let fence = "`".repeat(longest_run(value, '`') + 1);
    let pad = value.starts_with('`') || value.ends_with('`')
        || (value.len() >= 2 && value.starts_with(' ') && value.ends_with(' ') && value.trim() != "");

    if pad {
        write!(f, "{fence} {value} {fence}")
    } else {
        write!(f, "{fence}{value}{fence}")
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Property { name, value: None } => write!(f, "{name}"),
            Attribute::Property { name, value: Some(AttributeValue::Literal(s)) } if s.contains('"') => {
                write!(f, "{name}='{s}'")
            }
            Attribute::Property { name, value: Some(AttributeValue::Literal(s)) } => write!(f, "{name}=\"{s}\""),
            Attribute::Property { name, value: Some(AttributeValue::Expression(e)) } => {
                write!(f, "{name}={{{}}}", e.value)
            }
            Attribute::Spread(e) => write!(f, "{{{}}}", e.value),
        }
    }
}

struct Phrasing<'a>(&'a [Node], Phrase);

impl fmt::Display for Phrasing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Phrasing(nodes, phrase) = *self;
        for (i, node) in nodes.iter().enumerate() {
            match node {
                Node::Text { value } => escape_text(f, value, phrase, i == 0, i + 1 == nodes.len())?,
                _ => write!(f, "{node}")?,
            }
        }

        Ok(())
    }
}

struct Blocks<'a>(&'a [Node]);

impl fmt::Display for Blocks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }

            write!(f, "{node}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("");
        write!(f, "<{name}")?;
        for attribute in &self.attributes {
            write!(f, " {attribute}")?;
        }

        if self.children.is_empty() {
            return match self.name {
                Some(_) => f.write_str(" />"),
                None => f.write_str("></>"),
            };
        }

        if self.children.iter().any(Node::is_flow) {
            write!(f, ">\n{}\n</{name}>", Blocks(&self.children))
        } else {
            write!(f, ">{}</{name}>", Phrasing(&self.children, Phrase::Inline))
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Frontmatter { value } if value.is_empty() => f.write_str("---\n---"),
            Node::Frontmatter { value } => write!(f, "---\n{value}\n---"),
            Node::Heading { depth, children } => {
                write!(f, "{} {}", "#".repeat(*depth as usize), Phrasing(children, Phrase::Heading))
            }
            Node::Paragraph { children } => write!(f, "{}", Phrasing(children, Phrase::Paragraph)),
            Node::Code { lang, meta, value } => {
                let fence = "`".repeat(longest_run(value, '`').max(2) + 1);
                f.write_str(&fence)?;
                if let Some(lang) = lang {
                    f.write_str(lang)?;
                }

                if let Some(meta) = meta {
                    write!(f, " {meta}")?;
                }

                if value.is_empty() {
                    write!(f, "\n{fence}")
                } else {
                    write!(f, "\n{value}\n{fence}")
                }
            }
            Node::ThematicBreak => f.write_str("***"),
            Node::Text { value } => escape_text(f, value, Phrase::Inline, false, false),
            Node::InlineCode { value } => inline_code(f, value),
            Node::FlowExpression(e) | Node::TextExpression(e) => write!(f, "{{{}}}", e.value),
            Node::Esm(e) => f.write_str(&e.value),
            Node::FlowElement(e) | Node::TextElement(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Blocks(&self.children))?;
        if self.children.is_empty() {
            Ok(())
        } else {
            f.write_char('\n')
        }
    }
}
