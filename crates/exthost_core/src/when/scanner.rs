//! Tokenizer for when-clause text.

use super::WhenParseError;

/// Token category produced by [`scan`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Identifier(String),
    True,
    False,
    Null,
    Undefined,
    In,
    Question,
    Colon,
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
}

impl TokenKind {
    /// Source-like rendering used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Number(value) => format!("{value}"),
            Self::String(value) => format!("'{value}'"),
            Self::Identifier(name) => name.clone(),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
            Self::Null => "null".to_string(),
            Self::Undefined => "undefined".to_string(),
            Self::In => "in".to_string(),
            Self::Question => "?".to_string(),
            Self::Colon => ":".to_string(),
            Self::OrOr => "||".to_string(),
            Self::AndAnd => "&&".to_string(),
            Self::EqEq => "==".to_string(),
            Self::NotEq => "!=".to_string(),
            Self::Less => "<".to_string(),
            Self::LessEq => "<=".to_string(),
            Self::Greater => ">".to_string(),
            Self::GreaterEq => ">=".to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::Slash => "/".to_string(),
            Self::Percent => "%".to_string(),
            Self::Bang => "!".to_string(),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::Dot => ".".to_string(),
            Self::Comma => ",".to_string(),
        }
    }
}

/// One token with its character offset in the clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits clause text into tokens.
///
/// # Errors
/// - `UnterminatedString` when a quote is never closed.
/// - `UnknownOperator` for characters outside the grammar (`=`, `&`, `|`, ...).
pub fn scan(input: &str) -> Result<Vec<Token>, WhenParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        let start = pos;
        let next = chars.get(pos + 1).copied();

        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        let (kind, width) = match ch {
            '?' => (TokenKind::Question, 1),
            ':' => (TokenKind::Colon, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            ',' => (TokenKind::Comma, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '|' if next == Some('|') => (TokenKind::OrOr, 2),
            '&' if next == Some('&') => (TokenKind::AndAnd, 2),
            '=' if next == Some('=') => (TokenKind::EqEq, 2),
            '!' if next == Some('=') => (TokenKind::NotEq, 2),
            '!' => (TokenKind::Bang, 1),
            '<' if next == Some('=') => (TokenKind::LessEq, 2),
            '<' => (TokenKind::Less, 1),
            '>' if next == Some('=') => (TokenKind::GreaterEq, 2),
            '>' => (TokenKind::Greater, 1),
            '.' if next.is_some_and(|c| c.is_ascii_digit()) => {
                let (value, end) = scan_number(&chars, pos)?;
                (TokenKind::Number(value), end - pos)
            }
            '.' => (TokenKind::Dot, 1),
            '\'' => {
                let (value, end) = scan_string(&chars, pos)?;
                (TokenKind::String(value), end - pos)
            }
            c if c.is_ascii_digit() => {
                let (value, end) = scan_number(&chars, pos)?;
                (TokenKind::Number(value), end - pos)
            }
            c if is_identifier_start(c) => {
                let mut end = pos + 1;
                while end < chars.len() && is_identifier_part(chars[end]) {
                    end += 1;
                }
                let word: String = chars[pos..end].iter().collect();
                let kind = match word.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "undefined" => TokenKind::Undefined,
                    "in" => TokenKind::In,
                    _ => TokenKind::Identifier(word),
                };
                (kind, end - pos)
            }
            other => {
                let mut operator = other.to_string();
                if let Some(follow) = next.filter(|c| "=&|".contains(*c)) {
                    operator.push(follow);
                }
                return Err(WhenParseError::UnknownOperator {
                    operator,
                    position: start,
                });
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
        pos += width;
    }

    Ok(tokens)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn scan_number(chars: &[char], start: usize) -> Result<(f64, usize), WhenParseError> {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end < chars.len() && chars[end] == '.' {
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < chars.len() && (chars[end] == 'e' || chars[end] == 'E') {
        let mut exp_end = end + 1;
        if exp_end < chars.len() && (chars[exp_end] == '+' || chars[exp_end] == '-') {
            exp_end += 1;
        }
        if exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
            while exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            end = exp_end;
        }
    }

    let text: String = chars[start..end].iter().collect();
    text.parse::<f64>()
        .map(|value| (value, end))
        .map_err(|_| WhenParseError::UnexpectedToken {
            token: text,
            position: start,
        })
}

fn scan_string(chars: &[char], start: usize) -> Result<(String, usize), WhenParseError> {
    let mut value = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        match chars[pos] {
            '\'' => return Ok((value, pos + 1)),
            '\\' => {
                let Some(&escaped) = chars.get(pos + 1) else {
                    break;
                };
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
                pos += 2;
            }
            other => {
                value.push(other);
                pos += 1;
            }
        }
    }
    Err(WhenParseError::UnterminatedString { position: start })
}

#[cfg(test)]
mod tests {
    use super::{scan, TokenKind};
    use crate::when::WhenParseError;

    fn kinds(input: &str) -> Vec<TokenKind> {
        scan(input)
            .expect("scan should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scans_operators_and_names() {
        assert_eq!(
            kinds("view == 'a' && !x.y[0]"),
            vec![
                TokenKind::Identifier("view".to_string()),
                TokenKind::EqEq,
                TokenKind::String("a".to_string()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("y".to_string()),
                TokenKind::LBracket,
                TokenKind::Number(0.0),
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn scans_numbers_with_fraction_and_exponent() {
        assert_eq!(
            kinds("1.5 .25 2e3"),
            vec![
                TokenKind::Number(1.5),
                TokenKind::Number(0.25),
                TokenKind::Number(2000.0)
            ]
        );
    }

    #[test]
    fn decodes_string_escapes() {
        assert_eq!(
            kinds(r"'it\'s\n'"),
            vec![TokenKind::String("it's\n".to_string())]
        );
    }

    #[test]
    fn reports_unterminated_string_position() {
        let err = scan("a == 'oops").expect_err("unterminated string must fail");
        assert_eq!(err, WhenParseError::UnterminatedString { position: 5 });
    }

    #[test]
    fn reports_unknown_operator() {
        let err = scan("a = b").expect_err("single equals must fail");
        assert_eq!(
            err,
            WhenParseError::UnknownOperator {
                operator: "=".to_string(),
                position: 2,
            }
        );
        let err = scan("a & b").expect_err("single ampersand must fail");
        assert!(matches!(err, WhenParseError::UnknownOperator { .. }));
    }
}
