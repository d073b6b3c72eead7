use crate::asm::{Cond, Directive, Instr, Label, Operand, Reg, WORD};
use crate::ast::{
    AssignOp, BinOp, Expr, ExprAssign, ExprBinOp, ExprCall, ExprPayload, ExprUnOp, Program, Stmt,
    StmtCompound, StmtFor, StmtFunc, StmtIf, StmtPayload, StmtReturn, StmtVarDecl, StmtWhile, UnOp,
};
use crate::buf::Buf;
use crate::diagnostic::Diagnostics;
use crate::fold::fold;
use crate::loc::Loc;
use std::collections::{HashMap, HashSet};

/// Names visible in a block. Entering a block copies the enclosing
/// bindings; `declared` only holds the names introduced by the block
/// itself so that shadowing an outer name is allowed.
#[derive(Debug, Clone, Default)]
struct Scope {
    slots: HashMap<String, i64>,
    declared: HashSet<String>,
}

impl Scope {
    fn enter(&self) -> Scope {
        Scope {
            slots: self.slots.clone(),
            declared: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    While,
    DoWhile,
    For,
}

impl LoopKind {
    fn break_label(self, id: usize) -> Label {
        match self {
            LoopKind::While | LoopKind::DoWhile => Label::new("while_end", id),
            LoopKind::For => Label::new("for_end", id),
        }
    }

    fn continue_label(self, id: usize) -> Label {
        match self {
            LoopKind::While | LoopKind::DoWhile => Label::new("while_start", id),
            LoopKind::For => Label::new("for_post", id),
        }
    }
}

#[derive(Debug)]
struct Generator<'a> {
    header: Buf,
    text: Buf,
    /// Body of the function being generated; the prologue is written once
    /// its frame size is known.
    body: Buf,
    globals: HashSet<String>,
    scopes: Vec<Scope>,
    loops: Vec<(LoopKind, usize)>,
    label_counter: usize,
    stack_index: i64,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Generator<'a> {
    fn new(diagnostics: &'a mut Diagnostics) -> Generator<'a> {
        Generator {
            header: Buf::new(),
            text: Buf::new(),
            body: Buf::new(),
            globals: HashSet::new(),
            scopes: Vec::new(),
            loops: Vec::new(),
            label_counter: 0,
            stack_index: 0,
            diagnostics,
        }
    }

    fn emit(&mut self, instr: Instr) {
        self.body.line(instr);
    }

    fn mov(&mut self, src: impl Into<Operand>, dst: impl Into<Operand>) {
        self.emit(Instr::Mov {
            src: src.into(),
            dst: dst.into(),
        });
    }

    fn error(&mut self, message: String, loc: Loc) {
        self.diagnostics.report_at(message, loc);
    }

    fn next_label(&mut self) -> usize {
        self.label_counter += 1;
        self.label_counter
    }

    fn program(&mut self, program: &Program) {
        for decl in &program.decls {
            match &decl.payload {
                StmtPayload::Func(x) => self.func(decl.loc, x),
                StmtPayload::VarDecl(x) => self.global_var(decl.loc, x),
                StmtPayload::Empty => {}
                _ => self.error(
                    "Only function and variable declarations are allowed at top level".to_string(),
                    decl.loc,
                ),
            }
        }
    }

    fn into_assembly(self) -> String {
        let mut output = self.header;
        output.line(Directive::Text);
        output.append(self.text.as_str());
        output.append(".section .note.GNU-stack,\"\",@progbits\n");
        output.into_string()
    }

    fn declare_global(&mut self, name: &str, loc: Loc, what: &str) {
        if !self.globals.insert(name.to_string()) {
            self.error(format!("Already declared {} {}", what, name), loc);
            return;
        }
        self.header.line(Directive::Globl(name.to_string()));
    }

    fn global_var(&mut self, loc: Loc, x: &StmtVarDecl) {
        if self.globals.contains(&x.name) {
            self.error(format!("Already declared global variable {}", x.name), loc);
            return;
        }
        let value = match &x.init {
            None => None,
            Some(init) => match fold(init) {
                Ok(value) => Some(value),
                Err(e) => {
                    // keep the name so later uses do not cascade
                    self.globals.insert(x.name.clone());
                    self.error(format!("{} to global variable {}", e, x.name), init.loc);
                    return;
                }
            },
        };
        self.declare_global(&x.name, loc, "global variable");

        self.header.line(match value {
            Some(_) => Directive::Data,
            None => Directive::Bss,
        });
        self.header.line(Directive::Align(WORD));
        self.header.line(Directive::Symbol(x.name.clone()));
        self.header.line(match value {
            Some(value) => Directive::Quad(value),
            None => Directive::Zero(WORD),
        });
    }

    fn func(&mut self, loc: Loc, x: &StmtFunc) {
        self.declare_global(&x.name, loc, "function");
        tracing::trace!(function = %x.name, "generating");

        self.stack_index = 0;
        let mut scope = Scope::default();
        for (i, param) in x.params.iter().enumerate() {
            if !scope.declared.insert(param.name.clone()) {
                self.error(
                    format!("Already declared variable {} in this scope", param.name),
                    param.loc,
                );
                continue;
            }
            // above the saved frame pointer and the return address
            scope
                .slots
                .insert(param.name.clone(), 2 * WORD + i as i64 * WORD);
        }
        self.scopes.push(scope);
        self.compound(&x.body);
        self.scopes.pop();

        // falling off the end returns 0
        self.mov(Operand::Imm(0), Reg::ACC);
        self.epilogue();

        let frame = -self.stack_index;
        let frame = (frame + 15) / 16 * 16;
        self.text.line(Instr::Symbol(x.name.clone()));
        self.text.line(Instr::Push(Reg::FRAME.into()));
        self.text.line(Instr::Mov {
            src: Reg::STACK.into(),
            dst: Reg::FRAME.into(),
        });
        if frame > 0 {
            self.text.line(Instr::Sub {
                src: Operand::Imm(frame),
                dst: Reg::STACK.into(),
            });
        }
        let body = std::mem::take(&mut self.body);
        self.text.append(body.as_str());
        tracing::trace!(function = %x.name, frame, "generated");
    }

    fn epilogue(&mut self) {
        self.mov(Reg::FRAME, Reg::STACK);
        self.emit(Instr::Pop(Reg::FRAME));
        self.emit(Instr::Ret);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.payload {
            StmtPayload::Func(x) => self.error(
                format!("Function {} can only be declared at top level", x.name),
                stmt.loc,
            ),
            StmtPayload::VarDecl(x) => self.local_var(stmt.loc, x),
            StmtPayload::Return(x) => self.return_stmt(x),
            StmtPayload::Expr(x) => self.expr(&x.expr),
            StmtPayload::If(x) => self.if_stmt(x),
            StmtPayload::While(x) => self.while_stmt(x),
            StmtPayload::DoWhile(x) => self.do_while_stmt(x),
            StmtPayload::For(x) => self.for_stmt(x),
            StmtPayload::Break => self.jump_out(stmt.loc, "Break", LoopKind::break_label),
            StmtPayload::Continue => {
                self.jump_out(stmt.loc, "Continue", LoopKind::continue_label)
            }
            StmtPayload::Compound(x) => self.compound(x),
            StmtPayload::Empty => {}
        }
    }

    fn compound(&mut self, x: &StmtCompound) {
        self.enter_scope();
        for stmt in &x.stmts {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn enter_scope(&mut self) {
        let scope = self.scopes.last().map(Scope::enter).unwrap_or_default();
        self.scopes.push(scope);
    }

    fn local_var(&mut self, loc: Loc, x: &StmtVarDecl) {
        let duplicate = self
            .scopes
            .last()
            .map_or(false, |scope| scope.declared.contains(&x.name));
        if duplicate {
            self.error(
                format!("Already declared variable {} in this scope", x.name),
                loc,
            );
            return;
        }

        // the initializer still sees an outer binding of the same name
        match &x.init {
            Some(init) => self.expr(init),
            None => self.mov(Operand::Imm(0), Reg::ACC),
        }
        self.stack_index -= WORD;
        let slot = self.stack_index;
        self.mov(Reg::ACC, Operand::Frame(slot));
        if let Some(scope) = self.scopes.last_mut() {
            scope.slots.insert(x.name.clone(), slot);
            scope.declared.insert(x.name.clone());
        }
    }

    fn return_stmt(&mut self, x: &StmtReturn) {
        match &x.expr {
            Some(expr) => self.expr(expr),
            None => self.mov(Operand::Imm(0), Reg::ACC),
        }
        self.epilogue();
    }

    fn test_acc(&mut self) {
        self.emit(Instr::Cmp {
            src: Operand::Imm(0),
            dst: Reg::ACC.into(),
        });
    }

    fn if_stmt(&mut self, x: &StmtIf) {
        let id = self.next_label();
        let else_body = Label::new("else_body", id);
        let end = Label::new("continue", id);

        self.expr(&x.cond);
        self.test_acc();
        let target = if x.else_.is_some() { else_body } else { end };
        self.emit(Instr::JmpIf(Cond::Eq, target));
        self.stmt(&x.then);
        self.emit(Instr::Jmp(end));
        if let Some(else_) = &x.else_ {
            self.emit(Instr::Label(else_body));
            self.stmt(else_);
        }
        self.emit(Instr::Label(end));
    }

    fn while_stmt(&mut self, x: &StmtWhile) {
        let id = self.next_label();
        let start = LoopKind::While.continue_label(id);
        let end = LoopKind::While.break_label(id);

        self.emit(Instr::Label(start));
        self.expr(&x.cond);
        self.test_acc();
        self.emit(Instr::JmpIf(Cond::Eq, end));
        self.loops.push((LoopKind::While, id));
        self.stmt(&x.body);
        self.loops.pop();
        self.emit(Instr::Jmp(start));
        self.emit(Instr::Label(end));
    }

    fn do_while_stmt(&mut self, x: &StmtWhile) {
        let id = self.next_label();
        let start = LoopKind::DoWhile.continue_label(id);
        let end = LoopKind::DoWhile.break_label(id);

        self.emit(Instr::Label(start));
        self.loops.push((LoopKind::DoWhile, id));
        self.stmt(&x.body);
        self.loops.pop();
        self.expr(&x.cond);
        self.test_acc();
        self.emit(Instr::JmpIf(Cond::Ne, start));
        self.emit(Instr::Label(end));
    }

    fn for_stmt(&mut self, x: &StmtFor) {
        let id = self.next_label();
        let start = Label::new("for_start", id);
        let post = LoopKind::For.continue_label(id);
        let end = LoopKind::For.break_label(id);

        self.enter_scope();
        self.stmt(&x.init);
        self.emit(Instr::Label(start));
        if let Some(cond) = &x.cond {
            self.expr(cond);
            self.test_acc();
            self.emit(Instr::JmpIf(Cond::Eq, end));
        }
        self.loops.push((LoopKind::For, id));
        self.stmt(&x.body);
        self.loops.pop();
        self.emit(Instr::Label(post));
        if let Some(post) = &x.post {
            self.expr(post);
        }
        self.emit(Instr::Jmp(start));
        self.emit(Instr::Label(end));
        self.scopes.pop();
    }

    fn jump_out(&mut self, loc: Loc, what: &str, label: fn(LoopKind, usize) -> Label) {
        match self.loops.last() {
            Some(&(kind, id)) => self.emit(Instr::Jmp(label(kind, id))),
            None => self.error(format!("{} statement outside of loop body", what), loc),
        }
    }

    fn lookup(&mut self, name: &str, loc: Loc) -> Option<Operand> {
        if let Some(&slot) = self.scopes.last().and_then(|s| s.slots.get(name)) {
            return Some(Operand::Frame(slot));
        }
        if self.globals.contains(name) {
            return Some(Operand::Global(name.to_string()));
        }
        self.error(format!("Variable {} is not declared in this scope", name), loc);
        None
    }

    /// Evaluate `expr` into the accumulator.
    fn expr(&mut self, expr: &Expr) {
        match &expr.payload {
            ExprPayload::IntLit(value) => self.mov(Operand::Imm(*value), Reg::ACC),
            ExprPayload::Name(x) => {
                if let Some(src) = self.lookup(&x.name, expr.loc) {
                    self.mov(src, Reg::ACC);
                }
            }
            ExprPayload::UnOp(x) => self.unop(x),
            ExprPayload::BinOp(x) => self.binop(x),
            ExprPayload::Call(x) => self.call(x),
            ExprPayload::Assign(x) => self.assign(expr.loc, x),
            ExprPayload::Invalid => {}
        }
    }

    fn expr_into(&mut self, expr: &Expr, dst: Reg) {
        self.expr(expr);
        if dst != Reg::ACC {
            self.mov(Reg::ACC, dst);
        }
    }

    fn unop(&mut self, x: &ExprUnOp) {
        self.expr(&x.expr);
        match x.op {
            UnOp::Neg => self.emit(Instr::Neg(Reg::ACC)),
            UnOp::BitNot => self.emit(Instr::Not(Reg::ACC)),
            UnOp::Not => {
                self.test_acc();
                self.emit(Instr::SetCond(Cond::Eq));
            }
        }
    }

    fn binop(&mut self, x: &ExprBinOp) {
        match x.op {
            BinOp::And => self.logical_and(x),
            BinOp::Or => self.logical_or(x),
            op => {
                self.expr(&x.lhs);
                self.emit(Instr::Push(Reg::ACC.into()));
                self.expr(&x.rhs);
                self.combine(op);
            }
        }
    }

    /// Combine the saved left operand on the stack with the right operand
    /// in the accumulator.
    fn combine(&mut self, op: BinOp) {
        use BinOp::*;
        match op {
            Add => {
                self.emit(Instr::Pop(Reg::SECONDARY));
                self.emit(Instr::Add {
                    src: Reg::SECONDARY.into(),
                    dst: Reg::ACC.into(),
                });
            }
            Mul => {
                self.emit(Instr::Pop(Reg::SECONDARY));
                self.emit(Instr::Imul {
                    src: Reg::SECONDARY.into(),
                    dst: Reg::ACC,
                });
            }
            Sub => {
                self.mov(Reg::ACC, Reg::SECONDARY);
                self.emit(Instr::Pop(Reg::ACC));
                self.emit(Instr::Sub {
                    src: Reg::SECONDARY.into(),
                    dst: Reg::ACC.into(),
                });
            }
            Div | Mod => {
                self.mov(Reg::ACC, Reg::SECONDARY);
                self.emit(Instr::Pop(Reg::ACC));
                self.divide(op == Mod);
            }
            Eq => self.compare(Cond::Eq),
            Ne => self.compare(Cond::Ne),
            Lt => self.compare(Cond::Lt),
            Le => self.compare(Cond::Le),
            Gt => self.compare(Cond::Gt),
            Ge => self.compare(Cond::Ge),
            // short-circuit operators never evaluate both sides up front
            And | Or => {}
        }
    }

    fn compare(&mut self, cond: Cond) {
        self.emit(Instr::Pop(Reg::SECONDARY));
        self.emit(Instr::Cmp {
            src: Reg::ACC.into(),
            dst: Reg::SECONDARY.into(),
        });
        self.emit(Instr::SetCond(cond));
    }

    /// Divide the accumulator by the secondary register, leaving the
    /// quotient or the remainder in the accumulator.
    fn divide(&mut self, remainder: bool) {
        self.emit(Instr::SignExtend);
        self.emit(Instr::Idiv(Reg::SECONDARY));
        if remainder {
            self.mov(Reg::REMAINDER, Reg::ACC);
        }
    }

    fn logical_or(&mut self, x: &ExprBinOp) {
        let rhs = Label::new("or_rhs", self.next_label());
        let end = Label::new("or_end", self.next_label());

        self.expr(&x.lhs);
        self.test_acc();
        self.emit(Instr::JmpIf(Cond::Eq, rhs));
        self.mov(Operand::Imm(1), Reg::ACC);
        self.emit(Instr::Jmp(end));
        self.emit(Instr::Label(rhs));
        self.expr(&x.rhs);
        self.test_acc();
        self.emit(Instr::SetCond(Cond::Ne));
        self.emit(Instr::Label(end));
    }

    fn logical_and(&mut self, x: &ExprBinOp) {
        let zero = Label::new("and_false", self.next_label());
        let end = Label::new("and_end", self.next_label());

        self.expr(&x.lhs);
        self.test_acc();
        self.emit(Instr::JmpIf(Cond::Eq, zero));
        self.expr(&x.rhs);
        self.test_acc();
        self.emit(Instr::SetCond(Cond::Ne));
        self.emit(Instr::Jmp(end));
        self.emit(Instr::Label(zero));
        self.mov(Operand::Imm(0), Reg::ACC);
        self.emit(Instr::Label(end));
    }

    fn call(&mut self, x: &ExprCall) {
        let size = x.args.len() as i64 * WORD;
        if size > 0 {
            self.emit(Instr::Sub {
                src: Operand::Imm(size),
                dst: Reg::STACK.into(),
            });
        }
        // left to right, each stored into its slot of the outgoing area
        for (i, arg) in x.args.iter().enumerate() {
            self.expr(arg);
            self.mov(Reg::ACC, Operand::Stack(i as i64 * WORD));
        }
        self.emit(Instr::Call(x.name.clone()));
        if size > 0 {
            self.emit(Instr::Add {
                src: Operand::Imm(size),
                dst: Reg::STACK.into(),
            });
        }
    }

    fn assign(&mut self, loc: Loc, x: &ExprAssign) {
        let Some(target) = self.lookup(&x.name, loc) else {
            // still check the value for further errors
            if let Some(value) = &x.value {
                self.expr(value);
            }
            return;
        };
        let value = x.value.as_deref();

        match (x.op, value) {
            (AssignOp::Set, Some(value)) => {
                self.expr(value);
                self.mov(Reg::ACC, target);
            }
            (AssignOp::Add, Some(value)) => {
                self.expr(value);
                self.emit(Instr::Add {
                    src: Reg::ACC.into(),
                    dst: target.clone(),
                });
                self.mov(target, Reg::ACC);
            }
            (AssignOp::Sub, Some(value)) => {
                self.expr(value);
                self.emit(Instr::Sub {
                    src: Reg::ACC.into(),
                    dst: target.clone(),
                });
                self.mov(target, Reg::ACC);
            }
            (AssignOp::Mul, Some(value)) => {
                self.expr(value);
                self.emit(Instr::Imul {
                    src: target.clone(),
                    dst: Reg::ACC,
                });
                self.mov(Reg::ACC, target);
            }
            (AssignOp::Div | AssignOp::Mod, Some(value)) => {
                self.expr_into(value, Reg::SECONDARY);
                self.mov(target.clone(), Reg::ACC);
                self.divide(x.op == AssignOp::Mod);
                self.mov(Reg::ACC, target);
            }
            (AssignOp::PreInc | AssignOp::PreDec, _) => {
                self.step(x.op == AssignOp::PreInc, target.clone());
                self.mov(target, Reg::ACC);
            }
            (AssignOp::PostInc | AssignOp::PostDec, _) => {
                self.mov(target.clone(), Reg::ACC);
                self.step(x.op == AssignOp::PostInc, target);
            }
            // the parser always attaches a value to the other operators
            (_, None) => {}
        }
    }

    fn step(&mut self, up: bool, target: Operand) {
        let src = Operand::Imm(1);
        self.emit(if up {
            Instr::Add { src, dst: target }
        } else {
            Instr::Sub { src, dst: target }
        });
    }
}

/// Translate a well-formed program into x86-64 assembly text. Semantic
/// errors are recorded in `diagnostics`; the text produced alongside them
/// is best-effort and should be discarded by the caller.
pub fn generate(program: &Program, diagnostics: &mut Diagnostics) -> String {
    let mut generator = Generator::new(diagnostics);
    generator.program(program);
    tracing::debug!(labels = generator.label_counter, "generated");
    generator.into_assembly()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn gen(source: &str) -> (String, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let program = parse(tokenize(source, &mut diagnostics), &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
        let asm = generate(&program, &mut diagnostics);
        (asm, diagnostics)
    }

    fn gen_ok(source: &str) -> String {
        let (asm, diagnostics) = gen(source);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
        asm
    }

    fn lines(asm: &str) -> Vec<&str> {
        asm.lines().collect()
    }

    fn position(lines: &[&str], line: &str) -> usize {
        lines
            .iter()
            .position(|l| *l == line)
            .unwrap_or_else(|| panic!("missing {:?} in\n{}", line, lines.join("\n")))
    }

    #[test]
    fn return_constant() {
        let asm = gen_ok("fn main() -> isize { return 42; }");
        assert!(asm.starts_with(".globl main\n.text\nmain:\n"), "{}", asm);
        assert!(asm.contains(
            "\tpushq %rbp\n\tmovq %rsp, %rbp\n\tmovq $42, %rax\n\tmovq %rbp, %rsp\n\tpopq %rbp\n\tret\n"
        ));
        // no locals, no frame reservation
        assert!(!asm.contains("subq"));
    }

    #[test]
    fn falling_off_the_end_returns_zero() {
        let asm = gen_ok("fn f() -> void { }");
        assert!(asm.contains("f:\n\tpushq %rbp\n\tmovq %rsp, %rbp\n\tmovq $0, %rax\n\tmovq %rbp, %rsp"));
    }

    #[test]
    fn shadowed_local_gets_its_own_slot() {
        let asm = gen_ok(
            "fn main() -> isize { let x -> isize = 1; { let x -> isize = 2; return x; } return x; }",
        );
        let lines = lines(&asm);
        let inner = position(&lines, "\tmovq %rax, -16(%rbp)");
        let reads = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("\tmovq -") && l.ends_with(", %rax"))
            .collect::<Vec<_>>();
        assert_eq!(reads.len(), 2);
        assert!(reads[0].0 > inner);
        assert_eq!(*reads[0].1, "\tmovq -16(%rbp), %rax");
        assert_eq!(*reads[1].1, "\tmovq -8(%rbp), %rax");
        assert!(asm.contains("\tsubq $16, %rsp"));
    }

    #[test]
    fn parameters_sit_above_the_frame() {
        let asm = gen_ok("fn sub(a -> isize, b -> isize) -> isize { return a - b; }");
        assert!(asm.contains(
            "\tmovq 16(%rbp), %rax\n\tpushq %rax\n\tmovq 24(%rbp), %rax\n\tmovq %rax, %rcx\n\tpopq %rax\n\tsubq %rcx, %rax\n"
        ));
    }

    #[test]
    fn division_keeps_the_divisor_in_the_secondary_register() {
        let asm = gen_ok("fn f(a -> isize, b -> isize) -> isize { return a % b; }");
        assert!(asm.contains("\tmovq %rax, %rcx\n\tpopq %rax\n\tcqo\n\tidivq %rcx\n\tmovq %rdx, %rax\n"));
    }

    #[test]
    fn comparisons_set_zero_or_one() {
        let asm = gen_ok("fn f(a -> isize) -> isize { return a <= 3; }");
        assert!(asm.contains("\tpopq %rcx\n\tcmpq %rax, %rcx\n\tsetle %al\n\tmovzbq %al, %rax\n"));
    }

    #[test]
    fn or_skips_right_operand() {
        let asm = gen_ok("fn main() -> isize { return a() || b(); }");
        let lines = lines(&asm);
        let call_a = position(&lines, "\tcall a");
        let call_b = position(&lines, "\tcall b");
        let rhs = position(&lines, ".Lor_rhs1:");
        let end = position(&lines, ".Lor_end2:");
        assert_eq!(lines[call_a + 2], "\tje .Lor_rhs1");
        assert_eq!(lines[call_a + 3], "\tmovq $1, %rax");
        assert_eq!(lines[call_a + 4], "\tjmp .Lor_end2");
        assert!(call_a < rhs && rhs < call_b && call_b < end);
    }

    #[test]
    fn and_jumps_to_zero_result() {
        let asm = gen_ok("fn main() -> isize { return a() and b(); }");
        let lines = lines(&asm);
        let call_a = position(&lines, "\tcall a");
        let call_b = position(&lines, "\tcall b");
        assert_eq!(lines[call_a + 2], "\tje .Land_false1");
        let zero = position(&lines, ".Land_false1:");
        assert_eq!(lines[zero + 1], "\tmovq $0, %rax");
        assert_eq!(lines[zero + 2], ".Land_end2:");
        assert!(call_b < zero);
    }

    #[test]
    fn call_arguments_are_stored_left_to_right() {
        let asm = gen_ok("fn main() -> isize { return f(1, 2); }");
        assert!(asm.contains(
            "\tsubq $16, %rsp\n\tmovq $1, %rax\n\tmovq %rax, 0(%rsp)\n\tmovq $2, %rax\n\tmovq %rax, 8(%rsp)\n\tcall f\n\taddq $16, %rsp\n"
        ));
        let asm = gen_ok("fn main() -> isize { return g(); }");
        assert!(asm.contains("\tcall g\n\tmovq %rbp, %rsp"));
    }

    #[test]
    fn if_else_shape() {
        let asm = gen_ok("fn f(a -> isize) -> isize { if a -> { return 1; } else { return 2; } }");
        let lines = lines(&asm);
        let branch = position(&lines, "\tje .Lelse_body1");
        let skip = position(&lines, "\tjmp .Lcontinue1");
        let else_body = position(&lines, ".Lelse_body1:");
        let end = position(&lines, ".Lcontinue1:");
        assert!(branch < skip && skip < else_body && else_body < end);

        let asm = gen_ok("fn f(a -> isize) -> isize { if a -> { a = 1; } return a; }");
        assert!(asm.contains("\tje .Lcontinue1\n"));
        assert!(!asm.contains(".Lelse_body"));
    }

    #[test]
    fn loop_jumps() {
        let asm = gen_ok(
            "fn f() -> isize { let n -> isize = 0; while n < 10 -> { n += 1; if n == 5 -> { break; } continue; } return n; }",
        );
        let lines = lines(&asm);
        let start = position(&lines, ".Lwhile_start1:");
        let exit = position(&lines, "\tje .Lwhile_end1");
        assert!(start < exit);
        // break leaves the loop, continue re-tests the condition
        assert!(lines.iter().filter(|l| **l == "\tjmp .Lwhile_end1").count() == 1);
        assert!(lines.iter().filter(|l| **l == "\tjmp .Lwhile_start1").count() == 2);

        let asm = gen_ok(
            "fn f() -> isize { let s -> isize = 0; for (let i = 0; i < 3; i++) -> { if i == 1 -> { continue; } s += i; } return s; }",
        );
        let lines = self::lines(&asm);
        let cont = position(&lines, "\tjmp .Lfor_post1");
        let post = position(&lines, ".Lfor_post1:");
        assert!(cont < post);
        assert_eq!(lines[post + 1], "\tmovq -16(%rbp), %rax");
        assert_eq!(lines[post + 2], "\taddq $1, -16(%rbp)");
        assert_eq!(lines[post + 3], "\tjmp .Lfor_start1");
    }

    #[test]
    fn do_while_tests_after_body() {
        let asm = gen_ok("fn f() -> isize { let n -> isize = 0; do -> { n++; } while n < 3; return n; }");
        let lines = lines(&asm);
        let start = position(&lines, ".Lwhile_start1:");
        let step = position(&lines, "\taddq $1, -8(%rbp)");
        let back = position(&lines, "\tjne .Lwhile_start1");
        assert!(start < step && step < back);
        assert_eq!(lines[back + 1], ".Lwhile_end1:");
    }

    #[test]
    fn break_targets_the_innermost_loop() {
        let asm = gen_ok(
            "fn f() -> isize { for (let i = 0; i < 3; i++) -> { while 1 -> { break; } continue; } return 0; }",
        );
        let lines = lines(&asm);
        let inner_break = position(&lines, "\tjmp .Lwhile_end2");
        assert!(!asm.contains("\tjmp .Lfor_end1"));
        // once the inner loop is done, `continue` belongs to the outer one again
        let cont = position(&lines, "\tjmp .Lfor_post1");
        assert!(inner_break < position(&lines, ".Lwhile_end2:"));
        assert!(position(&lines, ".Lwhile_end2:") < cont);
    }

    #[test]
    fn scopes_end_with_their_block() {
        let (_, diagnostics) = gen(
            "fn f() -> isize { for (let i = 0; i < 3; i++) -> { let j = 1; } return i + j; }",
        );
        assert_eq!(
            diagnostics.messages(),
            vec![
                "Variable i is not declared in this scope",
                "Variable j is not declared in this scope"
            ]
        );

        let (_, diagnostics) = gen("fn f() -> isize { { let k = 1; } k = 2; return 0; }");
        assert_eq!(
            diagnostics.messages(),
            vec!["Variable k is not declared in this scope"]
        );

        // the outer binding is visible again after a shadowing block
        let asm = gen_ok("fn f() -> isize { let k = 1; { let k = 2; } return k; }");
        assert!(asm.contains("\tmovq -8(%rbp), %rax\n\tmovq %rbp, %rsp"));
    }

    #[test]
    fn break_and_continue_outside_loops() {
        let (_, diagnostics) = gen("fn f() -> void { break; continue; }");
        assert_eq!(
            diagnostics.messages(),
            vec![
                "Break statement outside of loop body",
                "Continue statement outside of loop body"
            ]
        );
    }

    #[test]
    fn global_initializers_are_folded() {
        let asm = gen_ok("let x -> isize = 2 + 3 * 4; let z -> isize;");
        assert!(asm.contains(".globl x\n.data\n.align 8\nx:\n\t.quad 14\n"));
        assert!(asm.contains(".globl z\n.bss\n.align 8\nz:\n\t.zero 8\n"));
    }

    #[test]
    fn non_constant_global_initializer() {
        let (asm, diagnostics) = gen("let y -> isize = f(); fn main() -> isize { return y; }");
        assert_eq!(
            diagnostics.messages(),
            vec!["Cannot assign non constant to global variable y"]
        );
        assert!(!asm.contains("y:"));
        assert!(!asm.contains(".quad"));

        let (_, diagnostics) = gen("let q = 1 / 0;");
        assert_eq!(
            diagnostics.messages(),
            vec!["Division by zero in constant expression to global variable q"]
        );
    }

    #[test]
    fn globals_are_addressed_relative_to_rip() {
        let asm = gen_ok("let counter = 0; fn bump() -> isize { counter += 2; return counter++; }");
        assert!(asm.contains("\taddq %rax, counter(%rip)\n\tmovq counter(%rip), %rax\n"));
        assert!(asm.contains("\tmovq counter(%rip), %rax\n\taddq $1, counter(%rip)\n"));
    }

    #[test]
    fn compound_assignments() {
        let asm = gen_ok("fn f(a -> isize) -> isize { a *= 3; a /= 2; return --a; }");
        assert!(asm.contains("\tmovq $3, %rax\n\timulq 16(%rbp), %rax\n\tmovq %rax, 16(%rbp)\n"));
        assert!(asm.contains(
            "\tmovq $2, %rax\n\tmovq %rax, %rcx\n\tmovq 16(%rbp), %rax\n\tcqo\n\tidivq %rcx\n\tmovq %rax, 16(%rbp)\n"
        ));
        assert!(asm.contains("\tsubq $1, 16(%rbp)\n\tmovq 16(%rbp), %rax\n"));
    }

    #[test]
    fn labels_are_unique_and_increasing() {
        let asm = gen_ok(
            "fn f(a -> isize) -> isize { if a -> { a = 1; } while a -> { a--; } a = a or a; return a; }
             fn g(a -> isize) -> isize { if a -> { a = 3; } return a; }",
        );
        let labels = asm
            .lines()
            .filter(|l| l.starts_with(".L") && l.ends_with(':'))
            .collect::<Vec<_>>();
        let unique = labels.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), labels.len());

        let ids = labels
            .iter()
            .map(|l| {
                l.trim_end_matches(':')
                    .trim_start_matches(|c: char| !c.is_ascii_digit())
                    .parse::<usize>()
                    .unwrap()
            })
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]), "{:?}", ids);
        // numbering continues across functions
        assert_eq!(*ids.last().unwrap(), 5);
    }

    #[test]
    fn undeclared_names_are_reported_and_generation_continues() {
        let (_, diagnostics) = gen("fn f() -> isize { x = 1; return y + 1; }");
        assert_eq!(
            diagnostics.messages(),
            vec![
                "Variable x is not declared in this scope",
                "Variable y is not declared in this scope"
            ]
        );
    }

    #[test]
    fn duplicate_declarations() {
        let (_, diagnostics) = gen("let a = 1; let a = 2; fn f() -> void {} fn f() -> void {}");
        assert_eq!(
            diagnostics.messages(),
            vec![
                "Already declared global variable a",
                "Already declared function f"
            ]
        );

        let (_, diagnostics) = gen(
            "fn f(p -> isize, p -> isize) -> void { let x = 1; let x = 2; { let x = 3; let p = 4; } }",
        );
        assert_eq!(
            diagnostics.messages(),
            vec![
                "Already declared variable p in this scope",
                "Already declared variable x in this scope"
            ]
        );
    }

    #[test]
    fn recursion_sees_its_own_name() {
        let asm = gen_ok(
            "fn fact(n -> isize) -> isize { if n <= 1 -> { return 1; } return n * fact(n - 1); }",
        );
        assert!(asm.contains("\tcall fact\n"));
    }
}
