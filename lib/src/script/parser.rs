use crate::script::ast::*;
use crate::script::lexer::{matching_brace, Lexer, Spanned, TemplateToken, Token};
use crate::script::{jsx, ParseError};

type Result<T> = std::result::Result<T, ParseError>;

/// The offset of the first line after `from` that starts with `import` or
/// `export`, or the end of `src`.
fn next_statement_line(src: &str, from: usize) -> usize {
    let mut pos = from;
    while let Some(i) = memchr::memchr(b'\n', &src.as_bytes()[pos..]) {
        pos += i + 1;
        let line = &src[pos..];
        let starts = ["import", "export"].iter().any(|kw| {
            line.strip_prefix(kw).map_or(false, |r| r.starts_with([' ', '\t', '{', '*']))
        });

        if starts {
            return pos;
        }
    }

    src.len()
}

/// A recursive-descent parser with precedence climbing for binary operators.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    tok: Spanned,
    prev_end: usize,
}

fn binary_precedence(token: &Token) -> Option<(&'static str, u8)> {
    let op = match token {
        Token::Punct(p) => *p,
        Token::Ident(i) if i == "instanceof" => "instanceof",
        Token::Ident(i) if i == "in" => "in",
        _ => return None,
    };

    let prec = match op {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        "**" => 11,
        _ => return None,
    };

    Some((op, prec))
}

fn is_assign_op(p: &str) -> bool {
    matches!(p, "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "**=" | "??=" | "||=" | "&&=")
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_token()?;
        Ok(Parser { lexer, tok, prev_end: 0 })
    }

    fn src(&self) -> &'a str {
        self.lexer.src()
    }

    fn bump(&mut self) -> Result<Spanned> {
        let next = self.lexer.next_token()?;
        let prev = std::mem::replace(&mut self.tok, next);
        self.prev_end = prev.end;
        Ok(prev)
    }

    /// Moves the parser to `pos`, which must be a token boundary just past a
    /// closing `}` or `>`.
    fn seek(&mut self, pos: usize) -> Result<()> {
        self.prev_end = pos;
        self.lexer.pos = pos;
        self.lexer.expr_start = false;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn peek(&self) -> Result<Token> {
        self.lexer.clone().next_token().map(|s| s.token)
    }

    fn is(&self, punct: &str) -> bool {
        matches!(self.tok.token, Token::Punct(p) if p == punct)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok.token, Token::Ident(i) if i == name)
    }

    fn eat(&mut self, punct: &str) -> Result<bool> {
        if self.is(punct) {
            self.bump()?;
            return Ok(true);
        }

        Ok(false)
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct)? {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ParseError {
        let message = match &self.tok.token {
            Token::Eof => "Unexpected end of input".to_string(),
            _ => "Unexpected token".to_string(),
        };

        ParseError::at(self.src(), self.tok.start, message)
    }

    fn ident(&mut self) -> Result<String> {
        match &self.tok.token {
            Token::Ident(name) => {
                let name = name.clone();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn string(&mut self) -> Result<String> {
        match &self.tok.token {
            Token::Str(value) => {
                let value = value.clone();
                self.bump()?;
                Ok(value)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn at_line_break(&self) -> bool {
        self.src()[self.prev_end..self.tok.start].contains('\n')
    }

    fn statement_end(&mut self) -> Result<()> {
        if self.eat(";")? || self.tok.token == Token::Eof || self.at_line_break() {
            return Ok(());
        }

        Err(self.unexpected())
    }

    pub fn parse_program(mut self) -> Result<Program> {
        let mut body = vec![];
        self.statements(&mut body, &mut 0)?;
        Ok(Program { body })
    }

    fn parse_standalone_expression(mut self) -> Result<Expr> {
        let expr = self.expression()?;
        if self.tok.token != Token::Eof {
            return Err(self.unexpected());
        }

        Ok(expr)
    }

    /// Parses statements into `body` until the end of input. On error, `body`
    /// holds every statement before the failing one and `start` is where that
    /// one begins.
    fn statements(&mut self, body: &mut Vec<Statement>, start: &mut usize) -> Result<()> {
        while self.tok.token != Token::Eof {
            *start = self.tok.start;
            if self.eat(";")? {
                continue;
            }

            body.push(self.statement()?);
        }

        Ok(())
    }

    /// Parses `src` as a module body, keeping each statement that fails to
    /// parse as [`Statement::Unparsed`] and resuming at the next line that
    /// starts with `import` or `export`.
    pub fn parse_module(src: &'a str) -> Program {
        let mut body = vec![];
        let mut pos = 0;
        while pos < src.len() {
            let mut start = pos;
            let mut lexer = Lexer::new(src);
            lexer.pos = pos;
            let result = lexer.next_token().and_then(|tok| {
                let mut parser = Parser { lexer, tok, prev_end: pos };
                parser.statements(&mut body, &mut start)
            });

            let Err(error) = result else { break };
            let at = error.offset.max(start);

            // The statement may be fine on its own, with the error on a later line.
            let line = src[..at].rfind('\n').map_or(0, |i| i + 1);
            if line > start {
                if let Ok(program) = Parser::new(&src[start..line]).and_then(Parser::parse_program) {
                    body.extend(program.body);
                    pos = line;
                    continue;
                }
            }

            let resume = next_statement_line(src, at);
            let skipped = src[start..resume].trim();
            if !skipped.is_empty() {
                body.push(Statement::Unparsed(skipped.to_string()));
            }

            pos = resume;
        }

        Program { body }
    }

    fn statement(&mut self) -> Result<Statement> {
        let statement = if self.is_ident("import") && !matches!(self.peek()?, Token::Punct("(" | ".")) {
            self.bump()?;
            Statement::Import(self.import()?)
        } else if self.is_ident("export") {
            self.bump()?;
            if self.at_function_or_class()? {
                let raw = self.braced()?;
                return Ok(Statement::Export(ExportDeclaration::Declaration(Declaration::Raw(raw))));
            }

            Statement::Export(self.export()?)
        } else if self.at_function_or_class()? {
            return Ok(Statement::Declaration(Declaration::Raw(self.braced()?)));
        } else if let Some(kind) = self.var_kind() {
            Statement::Declaration(self.variable(kind)?)
        } else {
            Statement::Expression(self.expression()?)
        };

        self.statement_end()?;
        Ok(statement)
    }

    fn var_kind(&self) -> Option<VarKind> {
        match &self.tok.token {
            Token::Ident(i) if i == "const" => Some(VarKind::Const),
            Token::Ident(i) if i == "let" => Some(VarKind::Let),
            Token::Ident(i) if i == "var" => Some(VarKind::Var),
            _ => None,
        }
    }

    fn variable(&mut self, kind: VarKind) -> Result<Declaration> {
        self.bump()?;
        let mut declarators = vec![];
        loop {
            let id = match self.tok.token {
                Token::Punct("{" | "[") => self.primary()?,
                _ => Expr::Ident(self.ident()?),
            };

            let init = if self.eat("=")? { Some(self.assignment()?) } else { None };
            declarators.push(Declarator { id, init });
            if !self.eat(",")? {
                return Ok(Declaration::Variable { kind, declarators });
            }
        }
    }

    fn at_function_or_class(&self) -> Result<bool> {
        Ok(self.is_ident("function") || self.is_ident("class")
            || (self.is_ident("async") && matches!(self.peek()?, Token::Ident(i) if i == "function")))
    }

    /// Consumes a `function` or `class` through its closing brace and returns
    /// its source text.
    fn braced(&mut self) -> Result<String> {
        let start = self.tok.start;
        let mut depth = 0usize;
        loop {
            match self.tok.token {
                Token::Punct("(" | "[") => depth += 1,
                Token::Punct(")" | "]") => depth = depth.saturating_sub(1),
                Token::Punct("{") if depth == 0 => break,
                Token::Eof => return Err(self.unexpected()),
                _ => {}
            }

            self.bump()?;
        }

        let open = self.tok.start;
        let close = matching_brace(self.src(), open)
            .ok_or_else(|| ParseError::at(self.src(), open, "Unterminated block"))?;

        self.seek(close + 1)?;
        Ok(self.src()[start..=close].to_string())
    }

    fn import(&mut self) -> Result<ImportDeclaration> {
        if let Token::Str(_) = self.tok.token {
            return Ok(ImportDeclaration { specifiers: vec![], source: self.string()? });
        }

        let mut specifiers = vec![];
        if let Token::Ident(_) = self.tok.token {
            specifiers.push(ImportSpecifier::Default(self.ident()?));
            if !self.eat(",")? {
                return self.import_from(specifiers);
            }
        }

        if self.eat("*")? {
            if !self.is_ident("as") {
                return Err(self.unexpected());
            }

            self.bump()?;
            specifiers.push(ImportSpecifier::Namespace(self.ident()?));
        } else {
            self.expect("{")?;
            while !self.eat("}")? {
                let imported = match &self.tok.token {
                    Token::Str(_) => self.string()?,
                    _ => self.ident()?,
                };

                let local = if self.is_ident("as") {
                    self.bump()?;
                    self.ident()?
                } else {
                    imported.clone()
                };

                specifiers.push(ImportSpecifier::Named { imported, local });
                if !self.eat(",")? {
                    self.expect("}")?;
                    break;
                }
            }
        }

        self.import_from(specifiers)
    }

    fn import_from(&mut self, specifiers: Vec<ImportSpecifier>) -> Result<ImportDeclaration> {
        if !self.is_ident("from") {
            return Err(self.unexpected());
        }

        self.bump()?;
        Ok(ImportDeclaration { specifiers, source: self.string()? })
    }

    fn export(&mut self) -> Result<ExportDeclaration> {
        if let Some(kind) = self.var_kind() {
            return Ok(ExportDeclaration::Declaration(self.variable(kind)?));
        }

        if self.is_ident("default") {
            self.bump()?;
            return Ok(ExportDeclaration::Default(self.assignment()?));
        }

        let mut specifiers = vec![];
        if self.eat("*")? {
            let exported = if self.is_ident("as") {
                self.bump()?;
                self.ident()?
            } else {
                "*".to_string()
            };

            specifiers.push(("*".to_string(), exported));
        } else {
            self.expect("{")?;
            while !self.eat("}")? {
                let local = self.ident()?;
                let exported = if self.is_ident("as") {
                    self.bump()?;
                    self.ident()?
                } else {
                    local.clone()
                };

                specifiers.push((local, exported));
                if !self.eat(",")? {
                    self.expect("}")?;
                    break;
                }
            }
        }

        let source = if self.is_ident("from") {
            self.bump()?;
            Some(self.string()?)
        } else {
            None
        };

        Ok(ExportDeclaration::Named { specifiers, source })
    }

    fn expression(&mut self) -> Result<Expr> {
        let first = self.assignment()?;
        if !self.is(",") {
            return Ok(first);
        }

        let mut exprs = vec![first];
        while self.eat(",")? {
            exprs.push(self.assignment()?);
        }

        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> Result<Expr> {
        let target = self.conditional()?;
        if let Token::Punct(op) = self.tok.token {
            if is_assign_op(op) {
                self.bump()?;
                let value = self.assignment()?;
                return Ok(Expr::Assign { op, target: Box::new(target), value: Box::new(value) });
            }
        }

        Ok(target)
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.binary(0)?;
        if !self.eat("?")? {
            return Ok(test);
        }

        let consequent = self.assignment()?;
        self.expect(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min: u8) -> Result<Expr> {
        let mut left = self.unary()?;
        while let Some((op, prec)) = binary_precedence(&self.tok.token) {
            if prec <= min {
                break;
            }

            self.bump()?;
            // `**` is right-associative.
            let right = match op {
                "**" => self.binary(prec - 1)?,
                _ => self.binary(prec)?,
            };

            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match &self.tok.token {
            Token::Punct(p @ ("!" | "-" | "+" | "~")) => Some(*p),
            Token::Ident(i) => match i.as_str() {
                "typeof" => Some("typeof"),
                "void" => Some("void"),
                "delete" => Some("delete"),
                "await" => Some("await"),
                _ => None,
            },
            _ => None,
        };

        match op {
            Some(op) => {
                self.bump()?;
                let argument = self.unary()?;
                Ok(Expr::Unary { op, argument: Box::new(argument) })
            }
            None => self.postfix(),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect("(")?;
        let mut args = vec![];
        while !self.eat(")")? {
            args.push(if self.eat("...")? {
                Expr::Spread(Box::new(self.assignment()?))
            } else {
                self.assignment()?
            });

            if !self.eat(",")? {
                self.expect(")")?;
                break;
            }
        }

        Ok(args)
    }

    fn member_name(&mut self) -> Result<Expr> {
        Ok(Expr::Ident(self.ident()?))
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            expr = match &self.tok.token {
                Token::Punct(".") => {
                    self.bump()?;
                    let property = self.member_name()?;
                    Expr::Member { object: Box::new(expr), property: Box::new(property), computed: false, optional: false }
                }
                Token::Punct("?.") => {
                    self.bump()?;
                    if self.is("(") {
                        let arguments = self.arguments()?;
                        Expr::Call { callee: Box::new(expr), arguments, optional: true }
                    } else if self.eat("[")? {
                        let property = self.expression()?;
                        self.expect("]")?;
                        Expr::Member { object: Box::new(expr), property: Box::new(property), computed: true, optional: true }
                    } else {
                        let property = self.member_name()?;
                        Expr::Member { object: Box::new(expr), property: Box::new(property), computed: false, optional: true }
                    }
                }
                Token::Punct("[") => {
                    self.bump()?;
                    let property = self.expression()?;
                    self.expect("]")?;
                    Expr::Member { object: Box::new(expr), property: Box::new(property), computed: true, optional: false }
                }
                Token::Punct("(") => {
                    let arguments = self.arguments()?;
                    Expr::Call { callee: Box::new(expr), arguments, optional: false }
                }
                Token::Template(_) => {
                    let quasi = self.template()?;
                    Expr::TaggedTemplate { tag: Box::new(expr), quasi }
                }
                _ => return Ok(expr),
            };
        }
    }

    fn template(&mut self) -> Result<Template> {
        let Token::Template(TemplateToken { quasis, expressions }) = self.bump()?.token else {
            return Err(self.unexpected());
        };

        let src = self.src();
        let expressions = expressions.into_iter()
            .map(|(start, end)| {
                Parser::new(&src[start..end])
                    .and_then(|p| p.parse_standalone_expression())
                    .map_err(|e| e.rebase(src, start))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Template { quasis, expressions })
    }

    /// Tries to parse `( params ) =>`, leaving the parser on the body.
    fn arrow_params(&mut self) -> Result<Vec<Expr>> {
        self.expect("(")?;
        let mut params = vec![];
        while !self.eat(")")? {
            params.push(if self.eat("...")? {
                Expr::Spread(Box::new(self.assignment()?))
            } else {
                self.assignment()?
            });

            if !self.eat(",")? {
                self.expect(")")?;
                break;
            }
        }

        self.expect("=>")?;
        Ok(params)
    }

    fn arrow_body(&mut self) -> Result<ArrowBody> {
        if !self.is("{") {
            return Ok(ArrowBody::Expr(Box::new(self.assignment()?)));
        }

        let start = self.tok.start;
        let close = matching_brace(self.src(), start)
            .ok_or_else(|| ParseError::at(self.src(), start, "Unterminated block"))?;

        self.seek(close + 1)?;
        Ok(ArrowBody::Block(self.src()[start..=close].to_string()))
    }

    fn try_arrow(&mut self, is_async: bool) -> Result<Option<Expr>> {
        let saved = self.clone();
        match self.arrow_params() {
            Ok(params) => {
                let body = self.arrow_body()?;
                Ok(Some(Expr::Arrow { params, body, is_async }))
            }
            Err(_) => {
                *self = saved;
                Ok(None)
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.tok.token.clone() {
            Token::Num(n) => { self.bump()?; Ok(Expr::Lit(Lit::Num(n))) }
            Token::Str(s) => { self.bump()?; Ok(Expr::Lit(Lit::Str(s))) }
            Token::Regex { pattern, flags } => { self.bump()?; Ok(Expr::Lit(Lit::Regex { pattern, flags })) }
            Token::Template(_) => Ok(Expr::Template(self.template()?)),
            Token::Ident(name) => self.identifier(name),
            Token::Punct("(") => {
                if let Some(arrow) = self.try_arrow(false)? {
                    return Ok(arrow);
                }

                self.bump()?;
                let expr = self.expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                self.bump()?;
                let mut elements = vec![];
                while !self.eat("]")? {
                    if self.eat(",")? {
                        elements.push(None);
                        continue;
                    }

                    elements.push(Some(if self.eat("...")? {
                        Expr::Spread(Box::new(self.assignment()?))
                    } else {
                        self.assignment()?
                    }));

                    if !self.eat(",")? {
                        self.expect("]")?;
                        break;
                    }
                }

                Ok(Expr::Array(elements))
            }
            Token::Punct("{") => self.object(),
            Token::Punct("<") => {
                let start = self.tok.start;
                let end = jsx::element_end(self.src(), start)?;
                self.seek(end)?;
                Ok(Expr::Jsx(self.src()[start..end].to_string()))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr> {
        match name.as_str() {
            "true" | "false" => {
                self.bump()?;
                return Ok(Expr::Lit(Lit::Bool(name == "true")));
            }
            "null" => {
                self.bump()?;
                return Ok(Expr::Lit(Lit::Null));
            }
            "function" | "class" => return Ok(Expr::Function(self.braced()?)),
            "new" => {
                self.bump()?;
                let mut callee = self.primary()?;
                loop {
                    callee = match self.tok.token {
                        Token::Punct(".") => {
                            self.bump()?;
                            let property = self.member_name()?;
                            Expr::Member { object: Box::new(callee), property: Box::new(property), computed: false, optional: false }
                        }
                        _ => break,
                    }
                }

                let arguments = if self.is("(") {
                    self.arguments()?
                } else {
                    vec![]
                };

                return Ok(Expr::New { callee: Box::new(callee), arguments });
            }
            "async" if matches!(self.peek()?, Token::Ident(i) if i == "function") => {
                return Ok(Expr::Function(self.braced()?));
            }
            "async" => {
                let saved = self.clone();
                self.bump()?;
                if self.is("(") && !self.at_line_break() {
                    if let Some(arrow) = self.try_arrow(true)? {
                        return Ok(arrow);
                    }
                } else if let Token::Ident(param) = self.tok.token.clone() {
                    self.bump()?;
                    if self.eat("=>")? {
                        let body = self.arrow_body()?;
                        return Ok(Expr::Arrow { params: vec![Expr::Ident(param)], body, is_async: true });
                    }
                }

                *self = saved;
            }
            _ => {}
        }

        self.bump()?;
        if self.eat("=>")? {
            let body = self.arrow_body()?;
            return Ok(Expr::Arrow { params: vec![Expr::Ident(name)], body, is_async: false });
        }

        Ok(Expr::Ident(name))
    }

    fn object(&mut self) -> Result<Expr> {
        self.expect("{")?;
        let mut properties = vec![];
        while !self.eat("}")? {
            if self.eat("...")? {
                properties.push(Property::Spread(self.assignment()?));
            } else {
                let key = match self.tok.token.clone() {
                    Token::Ident(name) => { self.bump()?; PropKey::Ident(name) }
                    Token::Str(s) => { self.bump()?; PropKey::Lit(Lit::Str(s)) }
                    Token::Num(n) => { self.bump()?; PropKey::Lit(Lit::Num(n)) }
                    Token::Punct("[") => {
                        self.bump()?;
                        let key = self.assignment()?;
                        self.expect("]")?;
                        PropKey::Computed(Box::new(key))
                    }
                    _ => return Err(self.unexpected()),
                };

                match key {
                    PropKey::Ident(name) if self.is(",") || self.is("}") => {
                        properties.push(Property::Shorthand(name));
                    }
                    key => {
                        self.expect(":")?;
                        properties.push(Property::KeyValue { key, value: self.assignment()? });
                    }
                }
            }

            if !self.eat(",")? {
                self.expect("}")?;
                break;
            }
        }

        Ok(Expr::Object(properties))
    }
}
