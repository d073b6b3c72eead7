use crate::loc::{Loc, Locatable};
use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Type {
    #[display(fmt = "isize")]
    Isize,
    #[display(fmt = "void")]
    Void,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub loc: Loc,
    pub payload: StmtPayload,
}

impl Stmt {
    pub fn new(loc: Loc, payload: StmtPayload) -> Stmt {
        Stmt { loc, payload }
    }
}

impl Locatable for Stmt {
    fn loc(&self) -> &Loc {
        &self.loc
    }
}

#[derive(Debug, Clone)]
pub enum StmtPayload {
    Func(StmtFunc),
    VarDecl(StmtVarDecl),
    Return(StmtReturn),
    Expr(StmtExpr),
    If(StmtIf),
    While(StmtWhile),
    DoWhile(StmtWhile),
    For(StmtFor),
    Break,
    Continue,
    Compound(StmtCompound),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub loc: Loc,
    pub name: String,
    pub typ: Type,
}

#[derive(Debug, Clone)]
pub struct StmtFunc {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: StmtCompound,
}

#[derive(Debug, Clone)]
pub struct StmtVarDecl {
    pub name: String,
    pub typ: Option<Type>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct StmtReturn {
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct StmtExpr {
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct StmtIf {
    pub cond: Expr,
    pub then: Box<Stmt>,
    pub else_: Option<Box<Stmt>>,
}

/// Shared by `while` and `do ... while`; the statement variant decides
/// whether the condition is tested before or after the body.
#[derive(Debug, Clone)]
pub struct StmtWhile {
    pub cond: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub struct StmtFor {
    pub init: Box<Stmt>,
    pub cond: Option<Expr>,
    pub post: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, Default)]
pub struct StmtCompound {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub loc: Loc,
    pub payload: ExprPayload,
}

impl Expr {
    pub fn new(loc: Loc, payload: ExprPayload) -> Expr {
        Expr { loc, payload }
    }

    /// Placeholder left where a syntax error was reported.
    pub fn invalid(loc: Loc) -> Expr {
        Expr::new(loc, ExprPayload::Invalid)
    }
}

impl Locatable for Expr {
    fn loc(&self) -> &Loc {
        &self.loc
    }
}

#[derive(Debug, Clone)]
pub enum ExprPayload {
    IntLit(i64),
    Name(ExprName),
    UnOp(ExprUnOp),
    BinOp(ExprBinOp),
    Call(ExprCall),
    Assign(ExprAssign),
    Invalid,
}

#[derive(Debug, Clone)]
pub struct ExprName {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnOp {
    #[display(fmt = "-")]
    Neg,
    #[display(fmt = "!")]
    Not,
    #[display(fmt = "~")]
    BitNot,
}

#[derive(Debug, Clone)]
pub struct ExprUnOp {
    pub op: UnOp,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinOp {
    #[display(fmt = "+")]
    Add,
    #[display(fmt = "-")]
    Sub,
    #[display(fmt = "*")]
    Mul,
    #[display(fmt = "/")]
    Div,
    #[display(fmt = "%")]
    Mod,
    #[display(fmt = "==")]
    Eq,
    #[display(fmt = "!=")]
    Ne,
    #[display(fmt = "<")]
    Lt,
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">")]
    Gt,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "and")]
    And,
    #[display(fmt = "or")]
    Or,
}

#[derive(Debug, Clone)]
pub struct ExprBinOp {
    pub op: BinOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct ExprCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AssignOp {
    #[display(fmt = "=")]
    Set,
    #[display(fmt = "+=")]
    Add,
    #[display(fmt = "-=")]
    Sub,
    #[display(fmt = "*=")]
    Mul,
    #[display(fmt = "/=")]
    Div,
    #[display(fmt = "%=")]
    Mod,
    #[display(fmt = "++x")]
    PreInc,
    #[display(fmt = "--x")]
    PreDec,
    #[display(fmt = "x++")]
    PostInc,
    #[display(fmt = "x--")]
    PostDec,
}

impl AssignOp {
    /// The increment forms read their target and take no value.
    pub fn takes_value(self) -> bool {
        !matches!(
            self,
            AssignOp::PreInc | AssignOp::PreDec | AssignOp::PostInc | AssignOp::PostDec
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExprAssign {
    pub name: String,
    pub op: AssignOp,
    pub value: Option<Box<Expr>>,
}
