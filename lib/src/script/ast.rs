/// A parsed module-level script: the contents of an ESM block or of an
/// embedded expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expr),
    Declaration(Declaration),
    Import(ImportDeclaration),
    Export(ExportDeclaration),
    /// Source that doesn't parse, up to the next line starting an `import`
    /// or `export`. Only produced by [`parse_module`](crate::script::parse_module).
    Unparsed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// `const a = 1, b = 2`
    Variable { kind: VarKind, declarators: Vec<Declarator> },
    /// A `function` or `class` declaration, kept as its source text.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// `import local from "..."`
    Default(String),
    /// `import * as local from "..."`
    Namespace(String),
    /// `import { imported as local } from "..."`
    Named { imported: String, local: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDeclaration {
    /// `export const a = 1`, `export function f() {}`
    Declaration(Declaration),
    /// `export default expr`
    Default(Expr),
    /// `export { a, b as c } [from "..."]`
    Named { specifiers: Vec<(String, String)>, source: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    /// An identifier, or an object/array literal standing in for a pattern.
    pub id: Expr,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Str(String),
    /// Kept as written: `0x1f`, `1_000`, `10n`.
    Num(String),
    Bool(bool),
    Null,
    Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateElement {
    pub raw: String,
    /// `None` when the raw text contains an invalid escape sequence.
    pub cooked: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue { key: PropKey, value: Expr },
    Shorthand(String),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Lit(Lit),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    /// A block body, kept as its source text including the braces.
    Block(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Lit(Lit),
    Template(Template),
    TaggedTemplate { tag: Box<Expr>, quasi: Template },
    Array(Vec<Option<Expr>>),
    Object(Vec<Property>),
    Member { object: Box<Expr>, property: Box<Expr>, computed: bool, optional: bool },
    Call { callee: Box<Expr>, arguments: Vec<Expr>, optional: bool },
    New { callee: Box<Expr>, arguments: Vec<Expr> },
    Unary { op: &'static str, argument: Box<Expr> },
    Binary { op: &'static str, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Assign { op: &'static str, target: Box<Expr>, value: Box<Expr> },
    Sequence(Vec<Expr>),
    Arrow { params: Vec<Expr>, body: ArrowBody, is_async: bool },
    Spread(Box<Expr>),
    /// A `function` or `class` expression, kept as its source text.
    Function(String),
    /// A JSX element or fragment, kept as its source text.
    Jsx(String),
}

impl Program {
    /// The text of a program that is nothing but a constant string: a single
    /// expression statement holding a string literal or a template literal
    /// without interpolations. Template text is the cooked value when it has
    /// one and the raw value otherwise.
    pub fn static_text(&self) -> Option<&str> {
        let [Statement::Expression(expr)] = self.body.as_slice() else {
            return None;
        };

        match expr {
            Expr::Lit(Lit::Str(value)) => Some(value),
            Expr::Template(Template { quasis, expressions }) if expressions.is_empty() => {
                let [quasi] = quasis.as_slice() else { return None };
                Some(quasi.cooked.as_deref().unwrap_or(&quasi.raw))
            }
            _ => None,
        }
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDeclaration> {
        self.body.iter().filter_map(|stmt| match stmt {
            Statement::Import(decl) => Some(decl),
            _ => None,
        })
    }

    /// Whether every statement was parsed.
    pub fn is_complete(&self) -> bool {
        !self.body.iter().any(|s| matches!(s, Statement::Unparsed(_)))
    }

    /// Whether the program is non-empty and made up solely of imports.
    pub fn is_import_only(&self) -> bool {
        !self.body.is_empty() && self.body.iter().all(|s| matches!(s, Statement::Import(_)))
    }
}

impl ImportDeclaration {
    pub fn default_binding(&self) -> Option<&str> {
        self.specifiers.iter().find_map(|s| match s {
            ImportSpecifier::Default(name) => Some(name.as_str()),
            _ => None,
        })
    }
}
