//! Recursive-descent parser (C9): tokens → AST, spec.md §4.9.

use crate::ast::*;
use crate::error::ParseError;
use crate::token::{Keyword, Pos, Token, TokenKind};
use crate::value::{Status, Value};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
        Parser::new(tokens).parse_program()
    }

    // ---- token cursor helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn here(&self) -> Pos {
        self.peek().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> PResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.unexpected(format!("expected '{kw}'")))
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(format!("expected '{kind}'")))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier".to_string())),
        }
    }

    fn unexpected(&self, message: String) -> ParseError {
        ParseError {
            pos: self.here(),
            message: format!("{message}, found '{}'", self.peek_kind()),
        }
    }

    /// Newlines are insignificant in many positions (after `{`, before `}`,
    /// between clauses); skip any run of them.
    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// A statement terminator: one or more newlines, or the lookahead is a
    /// closing brace / EOF (spec.md §4.9 "a closing brace may follow the
    /// final statement without a newline").
    fn end_of_statement(&mut self) {
        if self.eat(&TokenKind::Newline) {
            self.skip_newlines();
        }
    }

    // ---- program / declarations ----

    fn parse_program(&mut self) -> PResult<Program> {
        let mut program = Program {
            speakers: Vec::new(),
            worlds: Vec::new(),
            as_blocks: Vec::new(),
            fns: Vec::new(),
        };
        self.skip_newlines();
        while !self.check(&TokenKind::Eof) {
            if self.check_kw(Keyword::Speaker) {
                program.speakers.push(self.parse_speaker_decl()?);
            } else if self.check_kw(Keyword::World) {
                program.worlds.push(self.parse_world_decl()?);
            } else if self.check_kw(Keyword::As) {
                program.as_blocks.push(self.parse_as_block()?);
            } else if self.check_kw(Keyword::Fn) {
                program.fns.push(self.parse_fn_decl()?);
            } else {
                return Err(self.unexpected(
                    "expected a top-level 'speaker', 'world', 'fn', or 'as' declaration"
                        .to_string(),
                ));
            }
            self.skip_newlines();
        }
        Ok(program)
    }

    fn parse_speaker_decl(&mut self) -> PResult<SpeakerDecl> {
        let pos = self.here();
        self.expect_kw(Keyword::Speaker)?;
        let name = self.expect_identifier()?;
        self.end_of_statement();
        Ok(SpeakerDecl { name, pos })
    }

    fn parse_world_decl(&mut self) -> PResult<WorldDecl> {
        let pos = self.here();
        self.expect_kw(Keyword::World)?;
        let name = self.expect_identifier()?;
        self.end_of_statement();
        Ok(WorldDecl { name, pos })
    }

    fn parse_as_block(&mut self) -> PResult<AsBlock> {
        let pos = self.here();
        self.expect_kw(Keyword::As)?;
        let speaker = self.expect_identifier()?;
        let body = self.parse_block()?;
        self.end_of_statement();
        Ok(AsBlock { speaker, body, pos })
    }

    fn parse_fn_decl(&mut self) -> PResult<FnDecl> {
        let pos = self.here();
        self.expect_kw(Keyword::Fn)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            while self.eat(&TokenKind::Comma) {
                params.push(self.expect_identifier()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        self.end_of_statement();
        Ok(FnDecl {
            name,
            params,
            body,
            pos,
        })
    }

    /// `{` stmt* `}`
    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        if self.check_kw(Keyword::Let) {
            return self.parse_let(pos);
        }
        if self.check_kw(Keyword::Speak) {
            self.advance();
            let value = self.parse_expr()?;
            self.end_of_statement();
            return Ok(Stmt::Speak { value, pos });
        }
        if self.check_kw(Keyword::When) {
            return self.parse_when(pos);
        }
        if self.check_kw(Keyword::If) {
            return self.parse_if(pos);
        }
        if self.check_kw(Keyword::While) {
            return self.parse_while(pos);
        }
        if self.check_kw(Keyword::Fn) {
            return Ok(Stmt::FnDef(self.parse_fn_decl()?));
        }
        if self.check_kw(Keyword::Return) {
            self.advance();
            let value = if self.check(&TokenKind::Newline) || self.check(&TokenKind::RBrace) {
                Option::None
            } else {
                Some(self.parse_expr()?)
            };
            self.end_of_statement();
            return Ok(Stmt::Return { value, pos });
        }
        if self.check_kw(Keyword::Request) {
            self.advance();
            let target = self.expect_identifier()?;
            let action = self.parse_expr()?;
            self.end_of_statement();
            return Ok(Stmt::Request {
                target,
                action,
                pos,
            });
        }
        if self.check_kw(Keyword::Respond) {
            self.advance();
            let accept = if self.eat_kw(Keyword::Accept) {
                true
            } else if self.eat_kw(Keyword::Refuse) {
                false
            } else {
                return Err(self.unexpected("expected 'accept' or 'refuse'".to_string()));
            };
            self.end_of_statement();
            return Ok(Stmt::Respond { accept, pos });
        }
        if self.check_kw(Keyword::Inspect) {
            self.advance();
            let target = self.parse_dotted_path()?;
            self.end_of_statement();
            return Ok(Stmt::Inspect { target, pos });
        }
        if self.check_kw(Keyword::History) {
            self.advance();
            let target = self.parse_dotted_path()?;
            self.end_of_statement();
            return Ok(Stmt::History { target, pos });
        }
        if self.check_kw(Keyword::Ledger) {
            self.advance();
            // `last` is not in the closed keyword set (spec.md §4.7); it is
            // recognized positionally as a plain identifier right after
            // `ledger` rather than reserved everywhere.
            let last = matches!(self.peek_kind(), TokenKind::Identifier(w) if w == "last");
            if last {
                self.advance();
            }
            let count = if self.check(&TokenKind::Newline) || self.check(&TokenKind::RBrace) {
                Option::None
            } else {
                Some(self.parse_expr()?)
            };
            self.end_of_statement();
            return Ok(Stmt::Ledger { last, count, pos });
        }
        if self.check_kw(Keyword::Verify) {
            self.advance();
            self.eat_kw(Keyword::Ledger);
            self.end_of_statement();
            return Ok(Stmt::Verify { pos });
        }
        if self.check_kw(Keyword::Seal) {
            self.advance();
            let name = self.expect_identifier()?;
            self.end_of_statement();
            return Ok(Stmt::Seal { name, pos });
        }
        if self.check_kw(Keyword::Pass) {
            self.advance();
            self.end_of_statement();
            return Ok(Stmt::Pass { pos });
        }
        if self.check_kw(Keyword::Fail) {
            self.advance();
            let reason = if self.check(&TokenKind::Newline) || self.check(&TokenKind::RBrace) {
                Option::None
            } else {
                Some(self.parse_expr()?)
            };
            self.end_of_statement();
            return Ok(Stmt::Fail { reason, pos });
        }

        let expr = self.parse_expr()?;
        self.end_of_statement();
        Ok(Stmt::ExpressionStatement { expr, pos })
    }

    fn parse_let(&mut self, pos: Pos) -> PResult<Stmt> {
        self.expect_kw(Keyword::Let)?;
        let path = self.parse_dotted_path()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.end_of_statement();
        Ok(Stmt::Let { path, value, pos })
    }

    fn parse_dotted_path(&mut self) -> PResult<String> {
        let mut path = self.expect_identifier()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            path.push('.');
            path.push_str(&self.expect_identifier()?);
        }
        Ok(path)
    }

    fn parse_when(&mut self, pos: Pos) -> PResult<Stmt> {
        self.expect_kw(Keyword::When)?;
        let cond = self.parse_expr()?;
        let active = self.parse_block()?;
        self.skip_newlines();
        let otherwise = if self.check_kw(Keyword::Otherwise) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        self.skip_newlines();
        let broken = if self.check_kw(Keyword::Broken) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        self.end_of_statement();
        Ok(Stmt::When {
            cond,
            active,
            otherwise,
            broken,
            pos,
        })
    }

    fn parse_if(&mut self, pos: Pos) -> PResult<Stmt> {
        self.expect_kw(Keyword::If)?;
        let cond = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let mut elifs = Vec::new();
        loop {
            let checkpoint = self.pos;
            self.skip_newlines();
            if self.check_kw(Keyword::Elif) {
                self.advance();
                let elif_cond = self.parse_expr()?;
                let elif_body = self.parse_block()?;
                elifs.push((elif_cond, elif_body));
            } else {
                self.pos = checkpoint;
                break;
            }
        }
        self.skip_newlines();
        let else_body = if self.check_kw(Keyword::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        self.end_of_statement();
        Ok(Stmt::If {
            cond,
            then_body,
            elifs,
            else_body,
            pos,
        })
    }

    fn parse_while(&mut self, pos: Pos) -> PResult<Stmt> {
        self.expect_kw(Keyword::While)?;
        let cond = self.parse_expr()?;
        let max = if self.eat(&TokenKind::Comma) {
            self.expect_kw(Keyword::Max)?;
            self.parse_expr()?
        } else {
            // No `max` clause: represented with no bound so the compiler's
            // A9 check can flag it precisely rather than the parser
            // guessing a default.
            Expr::Literal {
                value: Value::None,
                pos: self.here(),
            }
        };
        let body = self.parse_block()?;
        self.end_of_statement();
        Ok(Stmt::While {
            cond,
            max,
            body,
            pos,
        })
    }

    // ---- expressions (precedence, lowest to highest) ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check_kw(Keyword::Or) {
            let pos = self.here();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.check_kw(Keyword::And) {
            let pos = self.here();
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.check_kw(Keyword::Not) {
            let pos = self.here();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
                pos,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            let pos = self.here();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.here();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let pos = self.here();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Minus) {
            let pos = self.here();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
                pos,
            });
        }
        if self.check_kw(Keyword::Not) {
            let pos = self.here();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
                pos,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                let pos = self.here();
                self.advance();
                let member = self.expect_identifier()?;
                expr = Expr::MemberAccess {
                    object: Box::new(expr),
                    member,
                    pos,
                };
            } else if self.check(&TokenKind::LParen) {
                let pos = expr.pos();
                let callee = match &expr {
                    Expr::Identifier { name, .. } => name.clone(),
                    _ => return Err(self.unexpected("function calls require a name".to_string())),
                };
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.parse_expr()?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(TokenKind::RParen)?;
                expr = Expr::Call { callee, args, pos };
            } else if self.check(&TokenKind::LBracket) {
                let pos = self.here();
                self.advance();
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::IndexAccess {
                    object: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.here();
        match self.peek_kind().clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Int(n),
                    pos,
                })
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Float(n),
                    pos,
                })
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Str(s),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Bool(true),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Bool(false),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::None) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::None,
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Active) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Status(Status::Active),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Inactive) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Status(Status::Inactive),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Broken) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Status(Status::Broken),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Read) => {
                self.advance();
                let path = self.parse_postfix()?;
                Ok(Expr::Read {
                    path: Box::new(path),
                    pos,
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier { name, pos })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expected an expression".to_string())),
        }
    }
}
