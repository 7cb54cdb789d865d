use super::lexer::{SpannedTok, Tok};
use super::{BinOp, Expr};

/// Recursive-descent parser for the functional expression grammar:
///
/// ```text
/// expression := term (('+' | '-') term)*
/// term       := factor (('*' | '/') factor)*
/// factor     := NUMBER
///             | '(' expression ')'
///             | '#' '(' IDENT (',' IDENT)? ')'
///             | ('ceil' | 'floor') '(' expression ')'
/// ```
///
/// Problems are appended to `errors` in the `line L:C message` format;
/// None is returned instead of a partial tree.
pub(super) fn parse(tokens: &[SpannedTok], errors: &mut Vec<String>) -> Option<Expr> {
    let mut parser = Parser { tokens, pos: 0, errors };
    let expr = parser.expression()?;
    if parser.pos < tokens.len() {
        parser.error_here("unexpected trailing input");
        return None;
    }
    Some(expr)
}

struct Parser<'a> {
    tokens: &'a [SpannedTok],
    pos: usize,
    errors: &'a mut Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn error_here(&mut self, msg: &str) {
        let (line, column) = match self.tokens.get(self.pos) {
            Some(t) => (t.line, t.column),
            None => self.tokens.last().map(|t| (t.line, t.column + t.width)).unwrap_or((1, 0)),
        };
        self.errors.push(format!("line {line}:{column} {msg}"));
    }

    fn expect_lparen(&mut self, context: &str) -> Option<()> {
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.pos += 1;
            Some(())
        } else {
            self.error_here(&format!("expected '(' {context}"));
            None
        }
    }

    fn expect_rparen(&mut self) -> Option<()> {
        if matches!(self.peek(), Some(Tok::RParen)) {
            self.pos += 1;
            Some(())
        } else {
            self.error_here("expected ')'");
            None
        }
    }

    fn ident(&mut self, what: &str) -> Option<String> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => {
                self.error_here(&format!("expected {what}"));
                None
            }
        }
    }

    fn expression(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn factor(&mut self) -> Option<Expr> {
        match self.peek().cloned() {
            Some(Tok::Number(value)) => {
                self.pos += 1;
                Some(Expr::Number(value))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect_rparen()?;
                Some(inner)
            }
            Some(Tok::Hash) => {
                self.pos += 1;
                self.token_count()
            }
            Some(Tok::Ident(name)) if name == "ceil" || name == "floor" => {
                self.pos += 1;
                self.expect_lparen(&format!("after '{name}'"))?;
                let inner = self.expression()?;
                self.expect_rparen()?;
                Some(if name == "ceil" {
                    Expr::Ceil(Box::new(inner))
                } else {
                    Expr::Floor(Box::new(inner))
                })
            }
            Some(Tok::Ident(name)) => {
                self.error_here(&format!("unexpected identifier '{name}'"));
                None
            }
            Some(_) => {
                self.error_here("expected expression");
                None
            }
            None => {
                self.error_here("unexpected end of expression");
                None
            }
        }
    }

    fn token_count(&mut self) -> Option<Expr> {
        self.expect_lparen("after '#'")?;
        let place = self.ident("place id")?;
        let token = if matches!(self.peek(), Some(Tok::Comma)) {
            self.pos += 1;
            Some(self.ident("token id")?)
        } else {
            None
        };
        self.expect_rparen()?;
        Some(Expr::TokenCount { place, token })
    }
}
