//! Boolean expressions over condition identifiers, e.g. `1 && (2 || 3) && !5`.
//!
//! Expressions are tokenized and parsed into an [`Expr`] tree once, then
//! resolved against the identifiers a rule actually defines. Evaluating a
//! resolved tree cannot fail.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:(?P<and>&&)|(?P<or>\|\|)|(?P<not>!)",
        r"|(?P<open>\()|(?P<close>\))|(?P<word>[A-Za-z0-9_]+))",
    ))
    .expect("valid expression token regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { offset: usize, character: char },
    #[error("unexpected {found} at token {position}")]
    UnexpectedToken { position: usize, found: String },
    #[error("expression ends early; expected an operand or ')'")]
    UnexpectedEnd,
    #[error("missing ')' for '(' at token {position}")]
    UnclosedParen { position: usize },
    #[error("identifier '{0}' does not name a condition of this rule")]
    UnknownIdentifier(String),
    #[error("condition identifier '{0}' is used by more than one condition")]
    DuplicateIdentifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Literal(bool),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Literal(value) => format!("literal '{value}'"),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
        }
    }
}

/// Parsed expression, generic over how a variable is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr<V> {
    Literal(bool),
    Var(V),
    Not(Box<Expr<V>>),
    And(Box<Expr<V>>, Box<Expr<V>>),
    Or(Box<Expr<V>>, Box<Expr<V>>),
}

impl Expr<String> {
    /// Replace identifier names with slots from `slots`.
    pub fn resolve(&self, slots: &HashMap<String, usize>) -> Result<Expr<usize>, ExpressionError> {
        Ok(match self {
            Self::Literal(value) => Expr::Literal(*value),
            Self::Var(name) => Expr::Var(
                *slots
                    .get(name)
                    .ok_or_else(|| ExpressionError::UnknownIdentifier(name.clone()))?,
            ),
            Self::Not(inner) => Expr::Not(Box::new(inner.resolve(slots)?)),
            Self::And(left, right) => {
                Expr::And(Box::new(left.resolve(slots)?), Box::new(right.resolve(slots)?))
            }
            Self::Or(left, right) => {
                Expr::Or(Box::new(left.resolve(slots)?), Box::new(right.resolve(slots)?))
            }
        })
    }
}

impl Expr<usize> {
    /// Slots outside `values` read as `false`.
    pub fn eval(&self, values: &[bool]) -> bool {
        match self {
            Self::Literal(value) => *value,
            Self::Var(slot) => values.get(*slot).copied().unwrap_or(false),
            Self::Not(inner) => !inner.eval(values),
            Self::And(left, right) => left.eval(values) && right.eval(values),
            Self::Or(left, right) => left.eval(values) || right.eval(values),
        }
    }
}

pub fn parse_expression(input: &str) -> Result<Expr<String>, ExpressionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    ExpressionParser::new(tokens).parse()
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < input.len() {
        let rest = &input[offset..];
        if rest.trim().is_empty() {
            break;
        }

        let Some(captures) = TOKEN_REGEX.captures(rest) else {
            let skipped = rest.len() - rest.trim_start().len();
            let character = rest.trim_start().chars().next().unwrap_or(' ');
            return Err(ExpressionError::UnexpectedCharacter {
                offset: offset + skipped,
                character,
            });
        };

        let token = if captures.name("and").is_some() {
            Token::And
        } else if captures.name("or").is_some() {
            Token::Or
        } else if captures.name("not").is_some() {
            Token::Not
        } else if captures.name("open").is_some() {
            Token::LParen
        } else if captures.name("close").is_some() {
            Token::RParen
        } else {
            let word = captures.name("word").map(|m| m.as_str()).unwrap_or_default();
            keyword_token(word).unwrap_or_else(|| Token::Ident(word.to_string()))
        };

        tokens.push(token);
        offset += captures.get(0).map(|m| m.end()).unwrap_or(rest.len());
    }

    Ok(tokens)
}

fn keyword_token(word: &str) -> Option<Token> {
    match word.to_ascii_lowercase().as_str() {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "true" => Some(Token::Literal(true)),
        "false" => Some(Token::Literal(false)),
        _ => None,
    }
}

/// Recursive descent with precedence `!` > `&&` > `||`.
struct ExpressionParser {
    tokens: Vec<Token>,
    index: usize,
}

impl ExpressionParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn parse(mut self) -> Result<Expr<String>, ExpressionError> {
        let expr = self.parse_or()?;
        if let Some(token) = self.peek() {
            return Err(ExpressionError::UnexpectedToken {
                position: self.index,
                found: token.describe(),
            });
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr<String>, ExpressionError> {
        let mut expr = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            let _ = self.consume();
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr<String>, ExpressionError> {
        let mut expr = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            let _ = self.consume();
            let rhs = self.parse_unary()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr<String>, ExpressionError> {
        if matches!(self.peek(), Some(Token::Not)) {
            let _ = self.consume();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr<String>, ExpressionError> {
        let position = self.index;
        match self.consume() {
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    Some(token) => Err(ExpressionError::UnexpectedToken {
                        position: self.index - 1,
                        found: token.describe(),
                    }),
                    None => Err(ExpressionError::UnclosedParen { position }),
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken {
                position,
                found: token.describe(),
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ids: &[&str]) -> HashMap<String, usize> {
        ids.iter()
            .enumerate()
            .map(|(slot, id)| (id.to_string(), slot))
            .collect()
    }

    fn eval(input: &str, ids: &[&str], values: &[bool]) -> bool {
        parse_expression(input)
            .expect("expression should parse")
            .resolve(&slots(ids))
            .expect("identifiers should resolve")
            .eval(values)
    }

    #[test]
    fn nested_expression_with_mixed_operators() {
        assert!(eval("1 && (2 || 3)", &["1", "2", "3"], &[true, false, true]));
        assert!(!eval("1 && (2 || 3)", &["1", "2", "3"], &[true, false, false]));
        assert!(eval("1 && (2 || 3 || 4) && (!5)", &["1", "2", "3", "4", "5"], &[
            true, false, false, true, false
        ]));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // 1 || (2 && 3)
        assert!(eval("1 || 2 && 3", &["1", "2", "3"], &[true, false, false]));
        // (1 && 2) || 3
        assert!(eval("1 && 2 || 3", &["1", "2", "3"], &[false, false, true]));
        assert!(!eval("!1 && 2", &["1", "2"], &[true, true]));
    }

    #[test]
    fn multi_digit_identifiers_do_not_collide_with_their_digits() {
        let ids = ["1", "2", "12"];
        assert!(eval("12", &ids, &[false, false, true]));
        assert!(!eval("12", &ids, &[true, true, false]));
        assert!(eval("1 && !12", &ids, &[true, false, false]));
    }

    #[test]
    fn keyword_operators_and_literals_are_case_insensitive() {
        assert!(eval("1 AND NOT 2", &["1", "2"], &[true, false]));
        assert!(eval("1 or false", &["1"], &[true]));
        assert!(!eval("TRUE && 1", &["1"], &[false]));
    }

    #[test]
    fn malformed_expressions_report_typed_errors() {
        assert_eq!(parse_expression("   "), Err(ExpressionError::Empty));
        assert_eq!(parse_expression("1 &&"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            parse_expression("(1 || 2"),
            Err(ExpressionError::UnclosedParen { position: 0 })
        );
        assert_eq!(
            parse_expression("1 & 2"),
            Err(ExpressionError::UnexpectedCharacter {
                offset: 2,
                character: '&'
            })
        );
        assert!(matches!(
            parse_expression("1 2"),
            Err(ExpressionError::UnexpectedToken { position: 1, .. })
        ));
        assert!(matches!(
            parse_expression(") 1"),
            Err(ExpressionError::UnexpectedToken { position: 0, .. })
        ));
    }

    #[test]
    fn unknown_identifier_fails_resolution() {
        let parsed = parse_expression("1 && 9").expect("expression should parse");
        assert_eq!(
            parsed.resolve(&slots(&["1"])),
            Err(ExpressionError::UnknownIdentifier("9".to_string()))
        );
    }
}
