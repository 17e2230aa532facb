use crate::script::ParseError;
use crate::script::ast::TemplateElement;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Num(String),
    Str(String),
    Template(TemplateToken),
    Regex { pattern: String, flags: String },
    Punct(&'static str),
    Eof,
}

/// A template literal, scanned whole. Interpolations are kept as byte ranges
/// into the source so the parser can descend into them.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateToken {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

// Longest first: the lexer takes the first match.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "??=", "||=", "&&=",
    "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "**",
    "+=", "-=", "*=", "/=", "%=",
    "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "?", ":", ".", ",", ";",
    "(", ")", "[", "]", "{", "}", "&", "|", "^",
];

// Words after which a `/` begins a regular expression.
const KEYWORDS_BEFORE_EXPR: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void",
    "throw", "case", "do", "else", "await", "yield",
];

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pub(crate) pos: usize,
    /// Whether a `/` here starts a regular expression rather than a division.
    pub(crate) expr_start: bool,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphabetic())
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '\u{200c}' || c == '\u{200d}'
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0, expr_start: true }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, at: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.src, at, message)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                match trimmed[2..].find("*/") {
                    Some(i) => self.pos += i + 4,
                    None => return Err(self.error(self.pos, "Unterminated comment")),
                }
            } else {
                return Ok(());
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Spanned { token: Token::Eof, start, end: start });
        };

        let token = if is_ident_start(c) || c == '\\' {
            self.ident()?
        } else if c.is_ascii_digit() || (c == '.' && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit())) {
            self.number()
        } else if c == '"' || c == '\'' {
            self.string(c)?
        } else if c == '`' {
            self.template()?
        } else if c == '/' && self.expr_start {
            self.regex()?
        } else {
            let rest = self.rest();
            let punct = PUNCTUATORS.iter()
                .find(|p| rest.starts_with(**p))
                .ok_or_else(|| self.error(start, format!("Unexpected character '{c}'")))?;

            self.pos += punct.len();
            Token::Punct(punct)
        };

        self.expr_start = match &token {
            Token::Punct(p) => !matches!(*p, ")" | "]" | "}"),
            Token::Ident(word) => KEYWORDS_BEFORE_EXPR.contains(&word.as_str()),
            _ => false,
        };

        Ok(Spanned { token, start, end: self.pos })
    }

    fn regex(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let body = start + 1;
        let mut in_class = false;
        let mut chars = self.src[body..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => { chars.next(); }
                '\n' | '\r' => break,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    let pattern = self.src[body..body + i].to_string();
                    let rest = &self.src[body + i + 1..];
                    let len = rest.find(|c| !is_ident_continue(c)).unwrap_or(rest.len());
                    self.pos = body + i + 1 + len;
                    return Ok(Token::Regex { pattern, flags: rest[..len].to_string() });
                }
                _ => {}
            }
        }

        Err(self.error(start, "Unterminated regular expression"))
    }

    fn ident(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let rest = self.rest();
        let len = rest.char_indices()
            .find(|&(i, c)| if i == 0 { !is_ident_start(c) } else { !is_ident_continue(c) })
            .map_or(rest.len(), |(i, _)| i);

        if len == 0 {
            return Err(self.error(start, "Escaped identifiers are not supported"));
        }

        self.pos += len;
        Ok(Token::Ident(rest[..len].to_string()))
    }

    fn number(&mut self) -> Token {
        let rest = self.rest();
        let mut len = 0;
        let mut prev = '\0';
        for c in rest.chars() {
            let accept = c.is_ascii_alphanumeric()
                || c == '_'
                || c == '.'
                || ((c == '+' || c == '-') && matches!(prev, 'e' | 'E') && !rest.starts_with("0x"));

            if !accept {
                break;
            }

            len += c.len_utf8();
            prev = c;
        }

        self.pos += len;
        Token::Num(rest[..len].to_string())
    }

    fn string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.pos;
        let body_start = start + 1;
        let mut chars = self.src[body_start..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => { chars.next(); }
                '\n' | '\r' => break,
                c if c == quote => {
                    let raw = &self.src[body_start..body_start + i];
                    self.pos = body_start + i + 1;
                    return cook(raw)
                        .map(Token::Str)
                        .ok_or_else(|| self.error(start, "Invalid escape sequence in string"));
                }
                _ => {}
            }
        }

        Err(self.error(start, "Unterminated string constant"))
    }

    fn template(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut quasis = vec![];
        let mut expressions = vec![];
        let mut chunk_start = start + 1;
        let mut i = chunk_start;
        let bytes = self.src.as_bytes();
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    quasis.push(template_element(&self.src[chunk_start..i]));
                    self.pos = i + 1;
                    return Ok(Token::Template(TemplateToken { quasis, expressions }));
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    quasis.push(template_element(&self.src[chunk_start..i]));
                    let close = matching_brace(self.src, i + 1)
                        .ok_or_else(|| self.error(i, "Unterminated template interpolation"))?;

                    expressions.push((i + 2, close));
                    i = close + 1;
                    chunk_start = i;
                }
                _ => i += 1,
            }
        }

        Err(self.error(start, "Unterminated template"))
    }
}

fn template_element(raw: &str) -> TemplateElement {
    let raw = raw.replace("\r\n", "\n");
    TemplateElement { cooked: cook(&raw), raw }
}

/// Interprets the escape sequences in the body of a string or template
/// literal. Returns `None` if an escape is malformed.
pub fn cook(raw: &str) -> Option<String> {
    if !raw.contains('\\') {
        return Some(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().map_or(false, |c| c.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                if hex.len() != 4 {
                    return None;
                }

                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            '\r' => { chars.next_if_eq(&'\n'); }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            c if c.is_ascii_digit() => return None,
            c => out.push(c),
        }
    }

    Some(out)
}

fn skip_quoted(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            b'\n' if quote != b'`' => return None,
            b'$' if quote == b'`' && bytes.get(i + 1) == Some(&b'{') => {
                i = matching_brace(src, i + 1)? + 1;
            }
            _ => i += 1,
        }
    }

    None
}

/// Given the index of a `{` in `src`, returns the index of the `}` that closes
/// it, skipping over strings, template literals and comments.
///
/// ```
/// use quill::script::matching_brace;
///
/// assert_eq!(matching_brace("{a}", 0), Some(2));
/// assert_eq!(matching_brace("{ '}' + `${ {} }` }x", 0), Some(18));
/// assert_eq!(matching_brace("{ /* } */ }", 0), Some(10));
/// assert_eq!(matching_brace("{ {", 0), None);
/// ```
pub fn matching_brace(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'{'));

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => { depth += 1; i += 1; }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }

                i += 1;
            }
            b'"' | b'\'' | b'`' => i = skip_quoted(src, i)?,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += memchr::memchr(b'\n', &bytes[i..]).unwrap_or(bytes.len() - i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += memchr::memmem::find(&bytes[i + 2..], b"*/")? + 4;
            }
            _ => i += 1,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = vec![];
        loop {
            match lexer.next_token().unwrap().token {
                Token::Eof => return tokens,
                token => tokens.push(token),
            }
        }
    }

    #[test]
    fn lexes_member_access_and_operators() {
        assert_eq!(tokens("props.Name ?? `x`"), vec![
            Token::Ident("props".into()),
            Token::Punct("."),
            Token::Ident("Name".into()),
            Token::Punct("??"),
            Token::Template(TemplateToken {
                quasis: vec![TemplateElement { raw: "x".into(), cooked: Some("x".into()) }],
                expressions: vec![],
            }),
        ]);
    }

    #[test]
    fn skips_comments() {
        assert_eq!(tokens("/* a */ 1 // b\n+ 2"), vec![
            Token::Num("1".into()),
            Token::Punct("+"),
            Token::Num("2".into()),
        ]);
    }

    #[test]
    fn template_interpolations_are_ranges() {
        let src = "`a${b}c${ {d: 1}.d }`";
        let Token::Template(template) = &tokens(src)[0] else { panic!("not a template") };
        assert_eq!(template.quasis.len(), 3);
        assert_eq!(&src[template.expressions[0].0..template.expressions[0].1], "b");
        assert_eq!(&src[template.expressions[1].0..template.expressions[1].1], " {d: 1}.d ");
    }

    #[test]
    fn slash_is_a_regex_only_where_an_expression_starts() {
        assert_eq!(tokens("a / b / 2"), vec![
            Token::Ident("a".into()),
            Token::Punct("/"),
            Token::Ident("b".into()),
            Token::Punct("/"),
            Token::Num("2".into()),
        ]);

        assert_eq!(tokens(r"s.replace(/[/]-\//gi, '')")[4], Token::Regex {
            pattern: r"[/]-\/".into(),
            flags: "gi".into(),
        });

        let mut lexer = Lexer::new("x = /open");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let error = lexer.next_token().unwrap_err();
        assert_eq!(error.message, "Unterminated regular expression");
    }

    #[test]
    fn cooks_escapes() {
        assert_eq!(cook(r"a\nb").as_deref(), Some("a\nb"));
        assert_eq!(cook(r"A\u{1F600}\x41").as_deref(), Some("A😀A"));
        assert_eq!(cook(r#"\"q\""#).as_deref(), Some("\"q\""));
        assert_eq!(cook(r"\u12"), None);
        assert_eq!(cook(r"\1"), None);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let error = Lexer::new("'abc").next_token().unwrap_err();
        assert_eq!(error.message, "Unterminated string constant");
        assert_eq!((error.line, error.column), (1, 0));
    }
}
