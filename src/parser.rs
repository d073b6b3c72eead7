use crate::ast::{
    AssignOp, BinOp, Expr, ExprAssign, ExprBinOp, ExprCall, ExprName, ExprPayload, ExprUnOp,
    Param, Program, Stmt, StmtCompound, StmtExpr, StmtFor, StmtFunc, StmtIf, StmtPayload,
    StmtReturn, StmtVarDecl, StmtWhile, Type, UnOp,
};
use crate::diagnostic::Diagnostics;
use crate::loc::Loc;
use crate::token::{Keyword, Token, TokenPayload, TypeName};
use std::mem;

type Level<'a> = fn(&mut Parser<'a>) -> Expr;

#[derive(Debug)]
pub struct Parser<'a> {
    tokens: Vec<Token>,
    idx: usize,
    panic_mode: bool,
    top_level: bool,
    /// Blocks cut short by a `fn`; their stray `}` is skipped at top level.
    unclosed_blocks: usize,
    unclosed_at: Option<usize>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token>, diagnostics: &'a mut Diagnostics) -> Parser<'a> {
        if !tokens.last().map_or(false, |t| t.is(TokenPayload::Eof)) {
            let loc = tokens.last().map(|t| t.loc).unwrap_or_default();
            tokens.push(Token::new(TokenPayload::Eof, "", loc));
        }
        Parser {
            tokens,
            idx: 0,
            panic_mode: false,
            top_level: false,
            unclosed_blocks: 0,
            unclosed_at: None,
            diagnostics,
        }
    }

    fn inc_idx(&mut self) {
        // the last token is Eof and is never stepped over
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.idx]
    }

    fn peek_next(&self) -> &Token {
        let idx = (self.idx + 1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn prev(&self) -> Option<&Token> {
        self.idx.checked_sub(1).map(|idx| &self.tokens[idx])
    }

    fn check(&self, payload: TokenPayload) -> bool {
        self.peek().is(payload)
    }

    fn eat(&mut self, payload: TokenPayload) -> bool {
        if self.check(payload) {
            self.inc_idx();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenPayload::Keyword(keyword))
    }

    fn expect(&mut self, payload: TokenPayload, message: &str) -> bool {
        let found = self.eat(payload);
        if !found {
            self.error(message);
        }
        found
    }

    /// Reports at the current token unless an earlier error in this region
    /// already put the parser in panic mode.
    fn error(&mut self, message: &str) {
        if self.panic_mode {
            return;
        }
        let token = self.tokens[self.idx].clone();
        self.diagnostics.report(message, &token);
        self.panic_mode = true;
    }

    fn error_at(&mut self, message: &str, loc: Loc) {
        if !self.panic_mode {
            self.diagnostics.report_at(message, loc);
        }
    }

    fn synchronize(&mut self) {
        if !mem::replace(&mut self.panic_mode, false) {
            return;
        }
        if matches!(
            self.prev().map(|t| t.payload),
            Some(TokenPayload::Semicolon | TokenPayload::RBrace)
        ) {
            return;
        }
        loop {
            match self.peek().payload {
                TokenPayload::Eof | TokenPayload::RBrace => return,
                TokenPayload::Semicolon => {
                    self.inc_idx();
                    return;
                }
                TokenPayload::Keyword(keyword) if keyword.starts_statement() => return,
                _ => self.inc_idx(),
            }
        }
    }

    fn ident(&mut self, message: &str) -> String {
        let token = self.peek();
        if token.is(TokenPayload::Ident) {
            let name = token.text.clone();
            self.inc_idx();
            name
        } else {
            self.error(message);
            String::new()
        }
    }

    fn type_annotation(&mut self, allow_void: bool, message: &str) -> Option<Type> {
        let typ = match self.peek().payload {
            TokenPayload::Type(TypeName::Isize) => Type::Isize,
            TokenPayload::Type(TypeName::Void) if allow_void => Type::Void,
            _ => {
                self.error(message);
                return None;
            }
        };
        self.inc_idx();
        Some(typ)
    }

    pub fn parse(mut self) -> Program {
        let mut decls = Vec::new();
        while !self.check(TokenPayload::Eof) {
            if self.unclosed_blocks > 0 && self.check(TokenPayload::RBrace) {
                self.unclosed_blocks -= 1;
                self.inc_idx();
                continue;
            }
            let reported = self.diagnostics.len();
            self.top_level = true;
            let stmt = self.block_item();
            match stmt.payload {
                StmtPayload::Func(_) | StmtPayload::VarDecl(_) => decls.push(stmt),
                StmtPayload::Empty => {}
                _ => {
                    if self.diagnostics.len() == reported {
                        self.error_at(
                            "Only function and variable declarations are allowed at top level",
                            stmt.loc,
                        );
                    }
                }
            }
        }
        Program { decls }
    }

    /// One statement of a block or of the program, followed by recovery.
    fn block_item(&mut self) -> Stmt {
        let start = self.idx;
        let stmt = self.statement();
        self.synchronize();
        if self.idx == start {
            self.inc_idx();
        }
        stmt
    }

    pub fn statement(&mut self) -> Stmt {
        use TokenPayload::*;
        let top_level = mem::replace(&mut self.top_level, false);
        let loc = self.peek().loc;
        let payload = match self.peek().payload {
            Keyword(self::Keyword::Fn) => {
                if !top_level {
                    self.error_at("Functions can only be declared at top level", loc);
                }
                StmtPayload::Func(self.function())
            }
            Keyword(self::Keyword::Let) => StmtPayload::VarDecl(self.var_decl()),
            Keyword(self::Keyword::Return) => StmtPayload::Return(self.return_stmt()),
            Keyword(self::Keyword::If) => StmtPayload::If(self.if_stmt()),
            Keyword(self::Keyword::While) => StmtPayload::While(self.while_stmt()),
            Keyword(self::Keyword::Do) => StmtPayload::DoWhile(self.do_while_stmt()),
            Keyword(self::Keyword::For) => StmtPayload::For(self.for_stmt()),
            Keyword(self::Keyword::Break) => {
                self.inc_idx();
                self.eat(Semicolon);
                StmtPayload::Break
            }
            Keyword(self::Keyword::Continue) => {
                self.inc_idx();
                self.eat(Semicolon);
                StmtPayload::Continue
            }
            Semicolon => {
                self.inc_idx();
                StmtPayload::Empty
            }
            LBrace => {
                self.inc_idx();
                StmtPayload::Compound(self.compound())
            }
            _ => StmtPayload::Expr(self.expr_stmt()),
        };
        Stmt::new(loc, payload)
    }

    fn function(&mut self) -> StmtFunc {
        self.inc_idx();
        let name = self.ident("Expected function identifier");
        self.expect(TokenPayload::LParen, "Expected '('");

        let mut params = Vec::new();
        if !self.check(TokenPayload::RParen) {
            loop {
                let Some(param) = self.param() else {
                    break;
                };
                params.push(param);
                if !self.eat(TokenPayload::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenPayload::RParen, "Expected ')'");

        let ret = if self.eat(TokenPayload::Arrow) {
            self.type_annotation(true, "Expected type after '->'")
                .unwrap_or(Type::Void)
        } else {
            Type::Void
        };

        self.expect(TokenPayload::LBrace, "Expected '{'");
        let body = self.compound();
        StmtFunc {
            name,
            params,
            ret,
            body,
        }
    }

    fn param(&mut self) -> Option<Param> {
        let loc = self.peek().loc;
        if !self.check(TokenPayload::Ident) {
            self.error("Expected identifier");
            return None;
        }
        let name = self.ident("Expected identifier");
        if !self.expect(TokenPayload::Arrow, "Expected '->'") {
            return None;
        }
        let typ = self.type_annotation(false, "Expected type after '->'")?;
        Some(Param { loc, name, typ })
    }

    /// Parses the statements of a block whose `{` has been consumed.
    fn compound(&mut self) -> StmtCompound {
        let mut stmts = Vec::new();
        while !self.check(TokenPayload::RBrace) && !self.check(TokenPayload::Eof) {
            if self.check(TokenPayload::Keyword(Keyword::Fn)) {
                // the block is missing its `}`; every enclosing block ends here too
                self.unclosed_blocks += 1;
                if self.unclosed_at != Some(self.idx) {
                    self.unclosed_at = Some(self.idx);
                    self.error("Expected '}'");
                }
                return StmtCompound { stmts };
            }
            stmts.push(self.block_item());
        }
        self.expect(TokenPayload::RBrace, "Expected '}'");
        StmtCompound { stmts }
    }

    fn var_decl(&mut self) -> StmtVarDecl {
        self.inc_idx();
        let name = self.ident("Expected variable name");
        let typ = if self.eat(TokenPayload::Arrow) {
            self.type_annotation(false, "Expected variable type")
        } else {
            None
        };
        let init = if self.eat(TokenPayload::Equal) {
            Some(self.expr())
        } else {
            if typ.is_none() {
                self.error("Type must be annotated for an uninitialized variable");
            }
            None
        };
        self.expect(TokenPayload::Semicolon, "Expected ';'");
        StmtVarDecl { name, typ, init }
    }

    fn return_stmt(&mut self) -> StmtReturn {
        self.inc_idx();
        if self.eat(TokenPayload::Semicolon) {
            return StmtReturn { expr: None };
        }
        let expr = self.expr();
        self.expect(TokenPayload::Semicolon, "Expected ';'");
        StmtReturn { expr: Some(expr) }
    }

    fn if_stmt(&mut self) -> StmtIf {
        self.inc_idx();
        let cond = self.expr();
        self.expect(TokenPayload::Arrow, "Expected '->'");
        let then = Box::new(self.statement());
        let else_ = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.statement()))
        } else {
            None
        };
        StmtIf { cond, then, else_ }
    }

    fn while_stmt(&mut self) -> StmtWhile {
        self.inc_idx();
        let cond = self.expr();
        self.expect(TokenPayload::Arrow, "Expected '->'");
        let body = Box::new(self.statement());
        StmtWhile { cond, body }
    }

    fn do_while_stmt(&mut self) -> StmtWhile {
        self.inc_idx();
        self.expect(TokenPayload::Arrow, "Expected '->'");
        let body = Box::new(self.statement());
        if !self.eat_keyword(Keyword::While) {
            self.error("Expected 'while'");
        }
        let cond = self.expr();
        self.eat(TokenPayload::Semicolon);
        StmtWhile { cond, body }
    }

    fn for_stmt(&mut self) -> StmtFor {
        self.inc_idx();
        self.expect(TokenPayload::LParen, "Expected '('");

        let loc = self.peek().loc;
        let init = match self.peek().payload {
            TokenPayload::Semicolon => {
                self.inc_idx();
                StmtPayload::Empty
            }
            TokenPayload::Keyword(Keyword::Let) => StmtPayload::VarDecl(self.var_decl()),
            _ => StmtPayload::Expr(self.expr_stmt()),
        };
        let init = Box::new(Stmt::new(loc, init));

        let cond = if self.check(TokenPayload::Semicolon) {
            None
        } else {
            Some(self.expr())
        };
        self.expect(TokenPayload::Semicolon, "Expected ';'");
        let post = if self.check(TokenPayload::RParen) {
            None
        } else {
            Some(self.expr())
        };
        self.expect(TokenPayload::RParen, "Expected ')'");
        self.expect(TokenPayload::Arrow, "Expected '->'");
        let body = Box::new(self.statement());
        StmtFor {
            init,
            cond,
            post,
            body,
        }
    }

    fn expr_stmt(&mut self) -> StmtExpr {
        let expr = self.expr();
        self.expect(TokenPayload::Semicolon, "Expected ';'");
        StmtExpr { expr }
    }

    pub fn expr(&mut self) -> Expr {
        if let Some(op) = assign_op(self.peek_next().payload) {
            return self.assignment(op);
        }
        let prefix = match self.peek().payload {
            TokenPayload::PlusPlus => Some(AssignOp::PreInc),
            TokenPayload::MinusMinus => Some(AssignOp::PreDec),
            _ => None,
        };
        if let Some(op) = prefix {
            if self.peek_next().is(TokenPayload::Ident) {
                return self.prefix_increment(op);
            }
        }
        self.logical_or()
    }

    fn assignment(&mut self, op: AssignOp) -> Expr {
        let target = self.peek().clone();
        let name = if target.is(TokenPayload::Ident) {
            target.text.clone()
        } else {
            self.error("Invalid assignment target");
            String::new()
        };
        self.inc_idx();
        self.inc_idx();
        let value = if op.takes_value() {
            Some(Box::new(self.expr()))
        } else {
            None
        };
        Expr::new(
            target.loc,
            ExprPayload::Assign(ExprAssign { name, op, value }),
        )
    }

    fn prefix_increment(&mut self, op: AssignOp) -> Expr {
        let loc = self.peek().loc;
        self.inc_idx();
        let name = self.ident("Invalid assignment target");
        Expr::new(
            loc,
            ExprPayload::Assign(ExprAssign {
                name,
                op,
                value: None,
            }),
        )
    }

    /// One left-associative precedence level.
    fn binary_level(&mut self, next: Level<'a>, ops: &[(TokenPayload, BinOp)]) -> Expr {
        let mut lhs = next(self);
        loop {
            let payload = self.peek().payload;
            let Some(&(_, op)) = ops.iter().find(|(t, _)| *t == payload) else {
                return lhs;
            };
            let loc = self.peek().loc;
            self.inc_idx();
            let rhs = next(self);
            lhs = Expr::new(
                loc,
                ExprPayload::BinOp(ExprBinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }),
            );
        }
    }

    fn logical_or(&mut self) -> Expr {
        self.binary_level(Self::logical_and, &[(TokenPayload::Or, BinOp::Or)])
    }

    fn logical_and(&mut self) -> Expr {
        self.binary_level(Self::equality, &[(TokenPayload::And, BinOp::And)])
    }

    fn equality(&mut self) -> Expr {
        self.binary_level(
            Self::relational,
            &[
                (TokenPayload::EqualEqual, BinOp::Eq),
                (TokenPayload::BangEqual, BinOp::Ne),
            ],
        )
    }

    fn relational(&mut self) -> Expr {
        self.binary_level(
            Self::additive,
            &[
                (TokenPayload::Less, BinOp::Lt),
                (TokenPayload::Greater, BinOp::Gt),
                (TokenPayload::LessEqual, BinOp::Le),
                (TokenPayload::GreaterEqual, BinOp::Ge),
            ],
        )
    }

    fn additive(&mut self) -> Expr {
        self.binary_level(
            Self::multiplicative,
            &[
                (TokenPayload::Plus, BinOp::Add),
                (TokenPayload::Minus, BinOp::Sub),
            ],
        )
    }

    fn multiplicative(&mut self) -> Expr {
        self.binary_level(
            Self::unary,
            &[
                (TokenPayload::Star, BinOp::Mul),
                (TokenPayload::Slash, BinOp::Div),
                (TokenPayload::Percent, BinOp::Mod),
            ],
        )
    }

    fn unary(&mut self) -> Expr {
        let op = match self.peek().payload {
            TokenPayload::Minus => UnOp::Neg,
            TokenPayload::Bang => UnOp::Not,
            TokenPayload::Tilde => UnOp::BitNot,
            _ => return self.primary(),
        };
        let loc = self.peek().loc;
        self.inc_idx();
        let expr = Box::new(self.unary());
        Expr::new(loc, ExprPayload::UnOp(ExprUnOp { op, expr }))
    }

    fn primary(&mut self) -> Expr {
        let token = self.peek().clone();
        match token.payload {
            TokenPayload::Int => {
                let payload = match token.text.parse::<i64>() {
                    Ok(value) => ExprPayload::IntLit(value),
                    Err(_) => {
                        self.error("Integer literal out of range");
                        ExprPayload::Invalid
                    }
                };
                self.inc_idx();
                Expr::new(token.loc, payload)
            }
            TokenPayload::Float => {
                self.error("Floating-point literals are not supported");
                self.inc_idx();
                Expr::invalid(token.loc)
            }
            TokenPayload::Str => {
                self.error("String literals are not supported");
                self.inc_idx();
                Expr::invalid(token.loc)
            }
            TokenPayload::LParen => {
                self.inc_idx();
                let expr = self.expr();
                self.expect(TokenPayload::RParen, "Expected ')'");
                expr
            }
            TokenPayload::Ident => {
                self.inc_idx();
                if !self.eat(TokenPayload::LParen) {
                    return Expr::new(token.loc, ExprPayload::Name(ExprName { name: token.text }));
                }
                let mut args = Vec::new();
                if !self.check(TokenPayload::RParen) {
                    loop {
                        args.push(self.expr());
                        if !self.eat(TokenPayload::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenPayload::RParen, "Expected ')'");
                Expr::new(
                    token.loc,
                    ExprPayload::Call(ExprCall {
                        name: token.text,
                        args,
                    }),
                )
            }
            _ => {
                self.error("Expected expression");
                Expr::invalid(token.loc)
            }
        }
    }
}

fn assign_op(payload: TokenPayload) -> Option<AssignOp> {
    use TokenPayload::*;
    let op = match payload {
        Equal => AssignOp::Set,
        PlusEqual => AssignOp::Add,
        MinusEqual => AssignOp::Sub,
        StarEqual => AssignOp::Mul,
        SlashEqual => AssignOp::Div,
        PercentEqual => AssignOp::Mod,
        PlusPlus => AssignOp::PostInc,
        MinusMinus => AssignOp::PostDec,
        _ => return None,
    };
    Some(op)
}

/// Parse a token stream into a program. Always returns a tree; syntax errors
/// are recorded in `diagnostics` and leave `Invalid` placeholders behind.
pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Program {
    let program = Parser::new(tokens, diagnostics).parse();
    tracing::debug!(decls = program.decls.len(), "parsed");
    program
}
