//! Recursive-descent parser producing the condition [`Expr`] tree.

use serde_json::{Number, Value};

use super::lexer::{Spanned, Token};
use super::ConditionError;
use crate::document::{FieldPath, PathSegment, DOC_VARIABLE};

/// Maximum nesting depth of sub-expressions.
const MAX_DEPTH: usize = 64;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Parsed condition expression. Evaluation has no access to anything but
/// the bound document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Field(FieldPath),
    List(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    source_len: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            source_len,
        }
    }

    /// Parse a complete expression, rejecting trailing tokens.
    pub fn parse_complete(mut self) -> Result<Expr, ConditionError> {
        let expr = self.expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    pub fn expect_end(&self) -> Result<(), ConditionError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(spanned) => Err(ConditionError::Syntax {
                offset: spanned.offset,
                message: format!("unexpected {}", describe(&spanned.token)),
            }),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    pub fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.source_len)
    }

    pub fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", describe(&expected))))
        }
    }

    pub fn error(&self, message: impl Into<String>) -> ConditionError {
        let found = self
            .peek()
            .map(describe)
            .unwrap_or_else(|| "end of input".to_string());
        ConditionError::Syntax {
            offset: self.offset(),
            message: format!("{}, found {found}", message.into()),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id == keyword)
    }

    fn is_keyword_at(&self, index: usize, keyword: &str) -> bool {
        matches!(
            self.tokens.get(index).map(|s| &s.token),
            Some(Token::Ident(id)) if id == keyword
        )
    }

    // -----------------------------------------------------------------------
    // Grammar
    // -----------------------------------------------------------------------

    pub fn expression(&mut self) -> Result<Expr, ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep);
        }
        let result = self.or_expr();
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and_expr()?;
        while self.is_keyword("or") || self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.not_expr()?;
        while self.is_keyword("and") || self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ConditionError> {
        if self.is_keyword("not") || self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(ConditionError::TooDeep);
            }
            let inner = self.not_expr();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ConditionError> {
        let left = self.operand()?;
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::NotEq,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::Ident(id)) if id == "in" => CompareOp::In,
            Some(Token::Ident(id)) if id == "not" && self.is_keyword_at(self.pos + 1, "in") => {
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.operand()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn operand(&mut self) -> Result<Expr, ConditionError> {
        match self.peek().cloned() {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(s)))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Literal(number(n)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                match self.advance() {
                    Some(Token::Number(n)) => Ok(Expr::Literal(number(-n))),
                    _ => Err(self.error("expected a number after '-'")),
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                            // Allow a trailing comma.
                            if self.peek() == Some(&Token::RBracket) {
                                break;
                            }
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(id)) => match id.as_str() {
                "true" | "True" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Value::Bool(true)))
                }
                "false" | "False" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Value::Bool(false)))
                }
                "null" | "None" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Value::Null))
                }
                _ => Ok(Expr::Field(self.path()?)),
            },
            _ => Err(self.error("expected a value")),
        }
    }

    /// Parse `doc` followed by at least one `.name`, `["key"]` or `[index]`.
    pub fn path(&mut self) -> Result<FieldPath, ConditionError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Ident(id)) if id == DOC_VARIABLE => {}
            Some(Token::Ident(id)) => return Err(ConditionError::UnknownName(id)),
            _ => {
                return Err(ConditionError::Syntax {
                    offset,
                    message: format!("expected '{DOC_VARIABLE}'"),
                })
            }
        }

        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => segments.push(PathSegment::Key(name)),
                        _ => return Err(self.error("expected a field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Str(key)) => segments.push(PathSegment::Key(key)),
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                            segments.push(PathSegment::Index(n as usize))
                        }
                        _ => return Err(self.error("expected a string key or index")),
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => break,
            }
        }

        FieldPath::new(segments).ok_or(ConditionError::Syntax {
            offset,
            message: format!("'{DOC_VARIABLE}' must be followed by a field access"),
        })
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(id) => format!("'{id}'"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Number(n) => format!("number {n}"),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::LBracket => "'['".into(),
        Token::RBracket => "']'".into(),
        Token::Comma => "','".into(),
        Token::Dot => "'.'".into(),
        Token::Minus => "'-'".into(),
        Token::Eq => "'=='".into(),
        Token::NotEq => "'!='".into(),
        Token::Lt => "'<'".into(),
        Token::Le => "'<='".into(),
        Token::Gt => "'>'".into(),
        Token::Ge => "'>='".into(),
        Token::AndAnd => "'&&'".into(),
        Token::OrOr => "'||'".into(),
        Token::Bang => "'!'".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::lexer::tokenize;
    use serde_json::json;

    fn parse(src: &str) -> Result<Expr, ConditionError> {
        Parser::new(tokenize(src)?, src.len()).parse_complete()
    }

    fn field(name: &str) -> Box<Expr> {
        Box::new(Expr::Field(FieldPath::field(name)))
    }

    #[test]
    fn parses_equality() {
        assert_eq!(
            parse("doc.status == 'APPROVED'").unwrap(),
            Expr::Compare {
                op: CompareOp::Eq,
                left: field("status"),
                right: Box::new(Expr::Literal(json!("APPROVED"))),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("doc.a or doc.b and doc.c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(field("a"), Box::new(Expr::And(field("b"), field("c"))))
        );
    }

    #[test]
    fn parses_not_in_and_lists() {
        let expr = parse("doc.priority not in ['Low', 'Medium',]").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                op: CompareOp::NotIn,
                left: field("priority"),
                right: Box::new(Expr::List(vec![
                    Expr::Literal(json!("Low")),
                    Expr::Literal(json!("Medium")),
                ])),
            }
        );
    }

    #[test]
    fn parses_negative_numbers_and_literals() {
        assert_eq!(
            parse("doc.delta > -3").unwrap(),
            Expr::Compare {
                op: CompareOp::Gt,
                left: field("delta"),
                right: Box::new(Expr::Literal(json!(-3))),
            }
        );
        assert_eq!(parse("None").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(parse("True").unwrap(), Expr::Literal(json!(true)));
    }

    #[test]
    fn rejects_names_other_than_doc() {
        assert!(matches!(
            parse("frappe.db.sql('drop table')").unwrap_err(),
            ConditionError::UnknownName(name) if name == "frappe"
        ));
    }

    #[test]
    fn rejects_bare_doc_and_calls() {
        assert!(parse("doc").is_err());
        assert!(parse("doc.save()").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse("doc.a == 1 doc.b").unwrap_err();
        assert!(matches!(err, ConditionError::Syntax { offset: 11, .. }));
    }

    #[test]
    fn rejects_deep_nesting() {
        let src = format!("{}doc.a{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(parse(&src).unwrap_err(), ConditionError::TooDeep));
        let nots = format!("{}doc.a", "not ".repeat(100));
        assert!(matches!(parse(&nots).unwrap_err(), ConditionError::TooDeep));
    }
}
