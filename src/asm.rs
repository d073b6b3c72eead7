//! Abstract instructions of the one-accumulator target machine.
//!
//! The generator only speaks in terms of an accumulator, a secondary
//! register, the frame base and the runtime stack; `Display` renders the
//! x86-64 AT&T spelling of each instruction.

use derive_more::Display;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Reg {
    #[display(fmt = "%rax")]
    Rax,
    #[display(fmt = "%rcx")]
    Rcx,
    #[display(fmt = "%rdx")]
    Rdx,
    #[display(fmt = "%rbp")]
    Rbp,
    #[display(fmt = "%rsp")]
    Rsp,
}

impl Reg {
    /// Expression results and return values.
    pub const ACC: Reg = Reg::Rax;
    /// Holds the saved operand of a binary operation and the divisor.
    pub const SECONDARY: Reg = Reg::Rcx;
    /// Receives the remainder of a signed division.
    pub const REMAINDER: Reg = Reg::Rdx;
    pub const FRAME: Reg = Reg::Rbp;
    pub const STACK: Reg = Reg::Rsp;
}

/// Size of one stack slot; every value is a 64-bit integer.
pub const WORD: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    /// A slot addressed relative to the frame base.
    Frame(i64),
    /// A slot addressed relative to the top of the runtime stack.
    Stack(i64),
    /// A global addressed relative to the instruction pointer.
    Global(String),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Operand {
        Operand::Reg(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Imm(value) => write!(f, "${}", value),
            Operand::Frame(offset) => write!(f, "{}({})", offset, Reg::FRAME),
            Operand::Stack(offset) => write!(f, "{}({})", offset, Reg::STACK),
            Operand::Global(name) => write!(f, "{}(%rip)", name),
        }
    }
}

/// Signed condition codes used by comparisons and conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Cond {
    #[display(fmt = "e")]
    Eq,
    #[display(fmt = "ne")]
    Ne,
    #[display(fmt = "l")]
    Lt,
    #[display(fmt = "le")]
    Le,
    #[display(fmt = "g")]
    Gt,
    #[display(fmt = "ge")]
    Ge,
}

/// A generated jump target: a role name plus a number taken from the
/// generator's label counter. The `.L` prefix keeps it out of the symbol
/// namespace of user functions and globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(fmt = ".L{}{}", name, id)]
pub struct Label {
    pub name: &'static str,
    pub id: usize,
}

impl Label {
    pub fn new(name: &'static str, id: usize) -> Label {
        Label { name, id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Mov { src: Operand, dst: Operand },
    Push(Operand),
    Pop(Reg),
    Add { src: Operand, dst: Operand },
    Sub { src: Operand, dst: Operand },
    Imul { src: Operand, dst: Reg },
    Neg(Reg),
    Not(Reg),
    /// Sets flags from `dst - src`.
    Cmp { src: Operand, dst: Operand },
    /// Sets the accumulator to 0 or 1 from the flags.
    SetCond(Cond),
    /// Sign-extends the accumulator into the remainder register.
    SignExtend,
    Idiv(Reg),
    Jmp(Label),
    JmpIf(Cond, Label),
    Call(String),
    Ret,
    Label(Label),
    Symbol(String),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Instr::*;
        match self {
            Mov { src, dst } => write!(f, "\tmovq {}, {}", src, dst),
            Push(src) => write!(f, "\tpushq {}", src),
            Pop(dst) => write!(f, "\tpopq {}", dst),
            Add { src, dst } => write!(f, "\taddq {}, {}", src, dst),
            Sub { src, dst } => write!(f, "\tsubq {}, {}", src, dst),
            Imul { src, dst } => write!(f, "\timulq {}, {}", src, dst),
            Neg(reg) => write!(f, "\tnegq {}", reg),
            Not(reg) => write!(f, "\tnotq {}", reg),
            Cmp { src, dst } => write!(f, "\tcmpq {}, {}", src, dst),
            SetCond(cond) => write!(f, "\tset{} %al\n\tmovzbq %al, {}", cond, Reg::ACC),
            SignExtend => write!(f, "\tcqo"),
            Idiv(divisor) => write!(f, "\tidivq {}", divisor),
            Jmp(label) => write!(f, "\tjmp {}", label),
            JmpIf(cond, label) => write!(f, "\tj{} {}", cond, label),
            Call(name) => write!(f, "\tcall {}", name),
            Ret => write!(f, "\tret"),
            Instr::Label(label) => write!(f, "{}:", label),
            Instr::Symbol(name) => write!(f, "{}:", name),
        }
    }
}

/// Assembler directives for the header and data sections.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Directive {
    #[display(fmt = ".globl {}", _0)]
    Globl(String),
    #[display(fmt = ".data")]
    Data,
    #[display(fmt = ".bss")]
    Bss,
    #[display(fmt = ".text")]
    Text,
    #[display(fmt = ".align {}", _0)]
    Align(i64),
    #[display(fmt = "\t.quad {}", _0)]
    Quad(i64),
    #[display(fmt = "\t.zero {}", _0)]
    Zero(i64),
    #[display(fmt = "{}:", _0)]
    Symbol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_att_syntax() {
        let instrs = vec![
            Instr::Mov {
                src: Operand::Imm(42),
                dst: Reg::ACC.into(),
            },
            Instr::Mov {
                src: Operand::Frame(-16),
                dst: Reg::ACC.into(),
            },
            Instr::Add {
                src: Reg::SECONDARY.into(),
                dst: Operand::Global("counter".to_string()),
            },
            Instr::Push(Reg::ACC.into()),
            Instr::Pop(Reg::SECONDARY),
            Instr::Cmp {
                src: Operand::Imm(0),
                dst: Reg::ACC.into(),
            },
            Instr::JmpIf(Cond::Eq, Label::new("else_body", 3)),
            Instr::Label(Label::new("continue", 3)),
            Instr::Idiv(Reg::SECONDARY),
        ];
        let text = instrs.iter().map(|i| i.to_string()).collect::<Vec<_>>();
        assert_eq!(
            text,
            vec![
                "\tmovq $42, %rax",
                "\tmovq -16(%rbp), %rax",
                "\taddq %rcx, counter(%rip)",
                "\tpushq %rax",
                "\tpopq %rcx",
                "\tcmpq $0, %rax",
                "\tje .Lelse_body3",
                ".Lcontinue3:",
                "\tidivq %rcx",
            ]
        );
    }

    #[test]
    fn set_condition_zero_extends_into_accumulator() {
        assert_eq!(
            Instr::SetCond(Cond::Le).to_string(),
            "\tsetle %al\n\tmovzbq %al, %rax"
        );
    }

    #[test]
    fn directives() {
        assert_eq!(Directive::Globl("x".to_string()).to_string(), ".globl x");
        assert_eq!(Directive::Quad(14).to_string(), "\t.quad 14");
        assert_eq!(Directive::Zero(8).to_string(), "\t.zero 8");
    }
}
