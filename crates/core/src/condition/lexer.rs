//! Tokenizer for condition expressions and template placeholders.

use super::ConditionError;

/// Maximum accepted source length for a single expression.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Minus,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ConditionError> {
    if source.len() > MAX_EXPRESSION_LENGTH {
        return Err(ConditionError::TooLong(source.len()));
    }

    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match ch {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            ',' => single(&mut chars, Token::Comma),
            '.' => single(&mut chars, Token::Dot),
            '-' => single(&mut chars, Token::Minus),
            '=' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    Token::Eq
                } else {
                    return Err(ConditionError::Syntax {
                        offset,
                        message: "single '=' is not allowed, use '=='".into(),
                    });
                }
            }
            '!' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '<' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' => {
                chars.next();
                if next_is(&mut chars, '&') {
                    Token::AndAnd
                } else {
                    return Err(ConditionError::UnexpectedChar { ch: '&', offset });
                }
            }
            '|' => {
                chars.next();
                if next_is(&mut chars, '|') {
                    Token::OrOr
                } else {
                    return Err(ConditionError::UnexpectedChar { ch: '|', offset });
                }
            }
            '\'' | '"' => Token::Str(string_literal(&mut chars, offset)?),
            c if c.is_ascii_digit() => Token::Number(number_literal(&mut chars)?),
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            other => return Err(ConditionError::UnexpectedChar { ch: other, offset }),
        };

        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn single(chars: &mut Chars<'_>, token: Token) -> Token {
    chars.next();
    token
}

fn next_is(chars: &mut Chars<'_>, expected: char) -> bool {
    if chars.peek().map(|&(_, c)| c) == Some(expected) {
        chars.next();
        true
    } else {
        false
    }
}

fn string_literal(chars: &mut Chars<'_>, start: usize) -> Result<String, ConditionError> {
    let Some((_, quote)) = chars.next() else {
        return Err(ConditionError::UnterminatedString(start));
    };
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(ConditionError::UnterminatedString(start)),
            Some((_, c)) if c == quote => return Ok(value),
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, c)) => value.push(c),
                None => return Err(ConditionError::UnterminatedString(start)),
            },
            Some((_, c)) => value.push(c),
        }
    }
}

fn number_literal(chars: &mut Chars<'_>) -> Result<f64, ConditionError> {
    let mut raw = String::new();
    let mut seen_dot = false;
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '_' {
            if c != '_' {
                raw.push(c);
            }
            chars.next();
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            raw.push(c);
            chars.next();
        } else {
            break;
        }
    }
    raw.parse::<f64>()
        .map_err(|_| ConditionError::InvalidNumber(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_comparison() {
        assert_eq!(
            kinds("doc.status == 'APPROVED'"),
            vec![
                Token::Ident("doc".into()),
                Token::Dot,
                Token::Ident("status".into()),
                Token::Eq,
                Token::Str("APPROVED".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_operators_and_numbers() {
        assert_eq!(
            kinds("a <= 1.5 || !b && c != 2"),
            vec![
                Token::Ident("a".into()),
                Token::Le,
                Token::Number(1.5),
                Token::OrOr,
                Token::Bang,
                Token::Ident("b".into()),
                Token::AndAnd,
                Token::Ident("c".into()),
                Token::NotEq,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(kinds(r#""say \"hi\"\n""#), vec![Token::Str("say \"hi\"\n".into())]);
    }

    #[test]
    fn single_equals_is_rejected() {
        let err = tokenize("doc.a = 1").unwrap_err();
        assert!(matches!(err, ConditionError::Syntax { offset: 6, .. }));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert!(matches!(
            tokenize("doc.a == 'open").unwrap_err(),
            ConditionError::UnterminatedString(9)
        ));
    }

    #[test]
    fn unexpected_characters_are_rejected() {
        assert!(matches!(
            tokenize("doc.a; import os").unwrap_err(),
            ConditionError::UnexpectedChar { ch: ';', .. }
        ));
        assert!(matches!(
            tokenize("doc.a | doc.b").unwrap_err(),
            ConditionError::UnexpectedChar { ch: '|', .. }
        ));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let src = "a".repeat(MAX_EXPRESSION_LENGTH + 1);
        assert!(matches!(tokenize(&src).unwrap_err(), ConditionError::TooLong(_)));
    }
}
