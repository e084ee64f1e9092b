//! Recursive-descent parser for when clauses.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, comparison, `in`/`not in`,
//! additive, multiplicative, unary, postfix, primary. Everything above the
//! additive level associates to the right.
//!
//! Nesting (parentheses, operator chains, prefix operators) is capped at
//! [`MAX_NESTING_DEPTH`] so hostile clauses fail instead of exhausting the
//! stack.

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::scanner::{scan, Token, TokenKind};
use super::value::Value;
use super::WhenParseError;

/// Deepest expression tree a clause may produce.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parses clause text into an expression tree.
pub fn parse(input: &str) -> Result<Expr, WhenParseError> {
    let tokens = scan(input)?;
    if tokens.is_empty() {
        return Err(WhenParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.chars().count(),
        depth: 0,
    };
    let expr = parser.parse_conditional()?;
    if let Some(token) = parser.peek() {
        return Err(WhenParseError::UnexpectedToken {
            token: token.kind.describe(),
            position: token.position,
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_position(&self) -> usize {
        self.peek().map(|token| token.position).unwrap_or(self.end)
    }

    fn expect_closing(&mut self, kind: TokenKind) -> Result<(), WhenParseError> {
        if self.eat(&kind) {
            return Ok(());
        }
        Err(WhenParseError::MissingClosingToken {
            expected: kind.describe(),
            position: self.current_position(),
        })
    }

    fn descend(&mut self) -> Result<(), WhenParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(WhenParseError::TooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.current_position(),
            });
        }
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    // conditional = or ('?' conditional ':' conditional)?
    fn parse_conditional(&mut self) -> Result<Expr, WhenParseError> {
        let test = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        self.descend()?;
        let consequent = self.parse_conditional()?;
        self.expect_closing(TokenKind::Colon)?;
        let alternate = self.parse_conditional()?;
        self.ascend(1);
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    // or = and ('||' or)?
    fn parse_or(&mut self) -> Result<Expr, WhenParseError> {
        let left = self.parse_and()?;
        if self.eat(&TokenKind::OrOr) {
            self.descend()?;
            let right = self.parse_or()?;
            self.ascend(1);
            return Ok(Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    // and = comparison ('&&' and)?
    fn parse_and(&mut self) -> Result<Expr, WhenParseError> {
        let left = self.parse_comparison()?;
        if self.eat(&TokenKind::AndAnd) {
            self.descend()?;
            let right = self.parse_and()?;
            self.ascend(1);
            return Ok(Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    // comparison = containment (cmp comparison)?
    fn parse_comparison(&mut self) -> Result<Expr, WhenParseError> {
        let left = self.parse_containment()?;
        let op = match self.peek_kind() {
            Some(TokenKind::EqEq) => BinaryOp::Eq,
            Some(TokenKind::NotEq) => BinaryOp::NotEq,
            Some(TokenKind::Less) => BinaryOp::Less,
            Some(TokenKind::LessEq) => BinaryOp::LessEq,
            Some(TokenKind::Greater) => BinaryOp::Greater,
            Some(TokenKind::GreaterEq) => BinaryOp::GreaterEq,
            _ => return Ok(left),
        };
        self.advance();
        self.descend()?;
        let right = self.parse_comparison()?;
        self.ascend(1);
        Ok(binary(op, left, right))
    }

    // containment = additive (('in' | 'not' 'in') containment)?
    fn parse_containment(&mut self) -> Result<Expr, WhenParseError> {
        let left = self.parse_additive()?;
        let (op, width) = match self.peek_kind() {
            Some(TokenKind::In) => (BinaryOp::In, 1),
            Some(TokenKind::Identifier(word))
                if word == "not"
                    && matches!(
                        self.tokens.get(self.pos + 1).map(|t| &t.kind),
                        Some(TokenKind::In)
                    ) =>
            {
                (BinaryOp::NotIn, 2)
            }
            _ => return Ok(left),
        };
        self.pos += width;
        self.descend()?;
        let right = self.parse_containment()?;
        self.ascend(1);
        Ok(binary(op, left, right))
    }

    // additive = multiplicative (('+' | '-') multiplicative)*
    fn parse_additive(&mut self) -> Result<Expr, WhenParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut chain = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            chain += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.ascend(chain);
        Ok(left)
    }

    // multiplicative = unary (('*' | '/' | '%') unary)*
    fn parse_multiplicative(&mut self) -> Result<Expr, WhenParseError> {
        let mut left = self.parse_unary()?;
        let mut chain = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            self.descend()?;
            chain += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.ascend(chain);
        Ok(left)
    }

    // unary = ('!' | '-' | '+') unary | postfix
    fn parse_unary(&mut self) -> Result<Expr, WhenParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Negate,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.descend()?;
        let operand = self.parse_unary()?;
        self.ascend(1);
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    // postfix = primary ('(' args ')' | '[' conditional ']' | '.' name)*
    fn parse_postfix(&mut self) -> Result<Expr, WhenParseError> {
        let mut expr = self.parse_primary()?;
        let mut chain = 0;
        loop {
            if matches!(
                self.peek_kind(),
                Some(TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot)
            ) {
                self.descend()?;
                chain += 1;
            }
            if self.eat(&TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.eat(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_conditional()?);
                        if self.eat(&TokenKind::Comma) {
                            continue;
                        }
                        self.expect_closing(TokenKind::RParen)?;
                        break;
                    }
                }
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_conditional()?;
                self.expect_closing(TokenKind::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = self.parse_property_name()?;
                expr = Expr::Property {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        self.ascend(chain);
        Ok(expr)
    }

    fn parse_property_name(&mut self) -> Result<String, WhenParseError> {
        let position = self.current_position();
        match self.advance() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => Ok(name),
            Some(Token {
                kind:
                    kind @ (TokenKind::True
                    | TokenKind::False
                    | TokenKind::Null
                    | TokenKind::Undefined
                    | TokenKind::In),
                ..
            }) => Ok(kind.describe()),
            Some(token) => Err(WhenParseError::UnexpectedToken {
                token: token.kind.describe(),
                position,
            }),
            None => Err(WhenParseError::UnexpectedEnd { position }),
        }
    }

    // primary = literal | number | string | name | '(' conditional ')'
    fn parse_primary(&mut self) -> Result<Expr, WhenParseError> {
        let position = self.current_position();
        let Some(token) = self.advance() else {
            return Err(WhenParseError::UnexpectedEnd { position });
        };
        let expr = match token.kind {
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            TokenKind::Null => Expr::Literal(Value::Null),
            TokenKind::Undefined => Expr::Literal(Value::Undefined),
            TokenKind::Number(value) => Expr::Literal(Value::Number(value)),
            TokenKind::String(value) => Expr::Literal(Value::String(value)),
            TokenKind::Identifier(name) => Expr::Name(name),
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.parse_conditional()?;
                self.expect_closing(TokenKind::RParen)?;
                self.ascend(1);
                inner
            }
            other => {
                return Err(WhenParseError::UnexpectedToken {
                    token: other.describe(),
                    position,
                })
            }
        };
        Ok(expr)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
