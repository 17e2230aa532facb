//! Scanning of JSX tags, shared by the MDX block parser and by JSX in
//! expression position.

use crate::script::ParseError;
use crate::script::lexer::{is_ident_continue, is_ident_start, matching_brace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Opening,
    Closing,
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Literal(String),
    /// The source between the braces.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawAttribute {
    Property { name: String, value: Option<RawValue> },
    /// The source between the braces, including the leading `...`.
    Spread(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// `None` for fragments.
    pub name: Option<String>,
    pub attributes: Vec<RawAttribute>,
    pub kind: TagKind,
    pub start: usize,
    pub end: usize,
}

/// Whether the `<` at `pos` starts something that should be read as a tag
/// rather than as a literal less-than sign.
pub fn looks_like_tag(src: &str, pos: usize) -> bool {
    let mut rest = src[pos + 1..].chars();
    match rest.next() {
        Some('>') => true,
        Some('/') => matches!(rest.next(), Some(c) if c == '>' || is_ident_start(c)),
        Some(c) => is_ident_start(c),
        None => false,
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.src, self.pos, message)
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(found) if found == c => { self.pos += c.len_utf8(); Ok(()) }
            Some(found) => Err(self.error(format!("Unexpected character '{found}', expected '{c}'"))),
            None => Err(self.error(format!("Unexpected end of file, expected '{c}'"))),
        }
    }

    fn name(&mut self, extra: &[char]) -> Result<String, ParseError> {
        let rest = &self.src[self.pos..];
        match rest.chars().next() {
            Some(c) if is_ident_start(c) => {}
            Some(c) => return Err(self.error(format!("Unexpected character '{c}' before name"))),
            None => return Err(self.error("Unexpected end of file in tag")),
        }

        let len = rest.char_indices()
            .find(|&(_, c)| !(is_ident_continue(c) || extra.contains(&c)))
            .map_or(rest.len(), |(i, _)| i);

        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn braced(&mut self) -> Result<&'a str, ParseError> {
        let close = matching_brace(self.src, self.pos)
            .ok_or_else(|| self.error("Unexpected end of file in expression, expected a corresponding closing brace for `{`"))?;

        let inner = &self.src[self.pos + 1..close];
        self.pos = close + 1;
        Ok(inner)
    }
}

/// Parses the tag whose `<` is at `pos`.
pub fn parse_tag(src: &str, pos: usize) -> Result<Tag, ParseError> {
    let mut cursor = Cursor { src, pos };
    cursor.expect('<')?;
    cursor.skip_ws();

    let closing = cursor.peek() == Some('/');
    if closing {
        cursor.pos += 1;
        cursor.skip_ws();
    }

    let name = match cursor.peek() {
        Some('>') => None,
        _ => Some(cursor.name(&['-', '.', ':'])?),
    };

    let mut attributes = vec![];
    let kind = loop {
        cursor.skip_ws();
        match cursor.peek() {
            Some('>') => {
                cursor.pos += 1;
                break if closing { TagKind::Closing } else { TagKind::Opening };
            }
            Some('/') if !closing => {
                cursor.pos += 1;
                cursor.skip_ws();
                cursor.expect('>')?;
                break TagKind::SelfClosing;
            }
            Some(_) if closing || name.is_none() => {
                return Err(cursor.error("Unexpected attribute, expected '>'"));
            }
            Some('{') => {
                let inner = cursor.braced()?.trim();
                if !inner.starts_with("...") {
                    return Err(cursor.error("Unexpected attribute expression, expected a spread `{...x}`"));
                }

                attributes.push(RawAttribute::Spread(inner.to_string()));
            }
            Some(_) => {
                let name = cursor.name(&['-', ':'])?;
                cursor.skip_ws();
                let value = if cursor.peek() == Some('=') {
                    cursor.pos += 1;
                    cursor.skip_ws();
                    Some(attribute_value(&mut cursor)?)
                } else {
                    None
                };

                attributes.push(RawAttribute::Property { name, value });
            }
            None => return Err(cursor.error("Unexpected end of file in tag")),
        }
    };

    Ok(Tag { name, attributes, kind, start: pos, end: cursor.pos })
}

fn attribute_value(cursor: &mut Cursor<'_>) -> Result<RawValue, ParseError> {
    match cursor.peek() {
        Some(quote @ ('"' | '\'')) => {
            let body = cursor.pos + 1;
            let len = cursor.src[body..].find(quote)
                .ok_or_else(|| cursor.error("Unexpected end of file in attribute value"))?;

            cursor.pos = body + len + 1;
            Ok(RawValue::Literal(cursor.src[body..body + len].to_string()))
        }
        Some('{') => Ok(RawValue::Expression(cursor.braced()?.to_string())),
        _ => Err(cursor.error("Unexpected character before attribute value, expected a quote or '{'")),
    }
}

/// Given the end of an opening tag named `name`, finds its closing tag and
/// returns that tag's `(start, end)`. Nested tags must balance.
///
/// In `markdown` mode, backslash escapes and backtick code spans are skipped
/// so that tags mentioned in code do not count.
pub fn find_closing(
    src: &str,
    from: usize,
    name: Option<&str>,
    markdown: bool,
) -> Result<(usize, usize), ParseError> {
    let describe = |name: Option<&str>| format!("<{}>", name.unwrap_or(""));

    let bytes = src.as_bytes();
    let mut stack: Vec<Option<String>> = vec![name.map(String::from)];
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if markdown => i += 2,
            b'`' if markdown => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                let fence = &src[i..i + run];
                i += run;
                let mut j = i;
                while let Some(k) = memchr::memmem::find(&bytes[j..], fence.as_bytes()) {
                    let at = j + k;
                    let after = bytes[at + run..].iter().take_while(|&&b| b == b'`').count();
                    if after == 0 {
                        i = at + run;
                        break;
                    }

                    j = at + run + after;
                }
            }
            b'{' => {
                i = matching_brace(src, i)
                    .ok_or_else(|| ParseError::at(src, i, "Unexpected end of file in expression, expected a corresponding closing brace for `{`"))?
                    + 1;
            }
            b'<' if looks_like_tag(src, i) => {
                let tag = parse_tag(src, i)?;
                match tag.kind {
                    TagKind::Opening => stack.push(tag.name),
                    TagKind::SelfClosing => {}
                    TagKind::Closing => {
                        let open = stack.pop().flatten();
                        if open != tag.name {
                            return Err(ParseError::at(src, i, format!(
                                "Unexpected closing tag `</{}>`, expected corresponding closing tag for `{}`",
                                tag.name.as_deref().unwrap_or(""), describe(open.as_deref()),
                            )));
                        }

                        if stack.is_empty() {
                            return Ok((tag.start, tag.end));
                        }
                    }
                }

                i = tag.end;
            }
            _ => i += 1,
        }
    }

    Err(ParseError::at(src, from, format!("Expected a closing tag for `{}`", describe(name))))
}

/// The end of the JSX element or fragment starting at `pos`.
pub fn element_end(src: &str, pos: usize) -> Result<usize, ParseError> {
    let tag = parse_tag(src, pos)?;
    match tag.kind {
        TagKind::SelfClosing => Ok(tag.end),
        TagKind::Opening => Ok(find_closing(src, tag.end, tag.name.as_deref(), false)?.1),
        TagKind::Closing => Err(ParseError::at(src, pos, "Unexpected closing tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes() {
        let src = r#"<Card title="Hi" wide count={1 + 2} {...rest} />"#;
        let tag = parse_tag(src, 0).unwrap();
        assert_eq!(tag.name.as_deref(), Some("Card"));
        assert_eq!(tag.kind, TagKind::SelfClosing);
        assert_eq!(tag.end, src.len());
        assert_eq!(tag.attributes, vec![
            RawAttribute::Property { name: "title".into(), value: Some(RawValue::Literal("Hi".into())) },
            RawAttribute::Property { name: "wide".into(), value: None },
            RawAttribute::Property { name: "count".into(), value: Some(RawValue::Expression("1 + 2".into())) },
            RawAttribute::Spread("...rest".into()),
        ]);
    }

    #[test]
    fn attributes_may_span_lines() {
        let src = "<Tabs\n  syncKey='os'\n>";
        let tag = parse_tag(src, 0).unwrap();
        assert_eq!(tag.kind, TagKind::Opening);
        assert_eq!(tag.attributes.len(), 1);
    }

    #[test]
    fn finds_nested_closing_tag() {
        let src = "<A>x<A>y</A>`</A>`</A>tail";
        let open = parse_tag(src, 0).unwrap();
        let (start, end) = find_closing(src, open.end, Some("A"), true).unwrap();
        assert_eq!(&src[start..end], "</A>");
        assert_eq!(&src[end..], "tail");
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let src = "<A><B></A>";
        let error = find_closing(src, 3, Some("A"), false).unwrap_err();
        assert!(error.message.contains("expected corresponding closing tag for `<B>`"));
    }

    #[test]
    fn fragment_element_end() {
        let src = "<>a <b>{x}</b></> rest";
        assert_eq!(element_end(src, 0).unwrap(), src.len() - " rest".len());
    }

    #[test]
    fn less_than_is_not_a_tag() {
        assert!(!looks_like_tag("a < b", 2));
        assert!(!looks_like_tag("<3", 0));
        assert!(looks_like_tag("</x>", 0));
        assert!(looks_like_tag("<>", 0));
    }
}
