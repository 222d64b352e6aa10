use crate::{
    analyzer::{Symbol, SymbolTable},
    error::{Error, Result},
    lexer::MAX_INTEGER,
    parser::{BinOpKind, Call, Expr, KeywordConstant, UnaryOpKind},
};

use super::{ArithmeticOp, Instruction, Segment};

/// Writes VM instructions for one class. Holds the class name and the label
/// counter, so each compilation unit needs its own instance.
#[derive(Debug, Default)]
pub struct Codegen {
    class_name: String,
    label_index: usize,
    instructions: Vec<Instruction>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_class(&mut self, class_name: &str) {
        self.class_name = class_name.to_string();
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn finish(self) -> Vec<Instruction> {
        self.instructions
    }

    pub fn new_label(&mut self) -> String {
        let s = format!("{}L{}", self.class_name, self.label_index);
        self.label_index += 1;
        s
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) {
        self.instructions.push(Instruction::Push(segment, index));
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) {
        self.instructions.push(Instruction::Pop(segment, index));
    }

    pub fn write_arithmetic(&mut self, op: ArithmeticOp) {
        self.instructions.push(Instruction::Arithmetic(op));
    }

    pub fn write_label(&mut self, label: &str) {
        self.instructions.push(Instruction::Label(label.to_string()));
    }

    pub fn write_goto(&mut self, label: &str) {
        self.instructions.push(Instruction::Goto(label.to_string()));
    }

    pub fn write_if(&mut self, label: &str) {
        self.instructions.push(Instruction::IfGoto(label.to_string()));
    }

    pub fn write_call(&mut self, name: &str, argc: usize) {
        self.instructions.push(Instruction::Call(name.to_string(), argc));
    }

    pub fn write_function(&mut self, name: &str, localc: usize) {
        self.instructions
            .push(Instruction::Function(format!("{}.{name}", self.class_name), localc));
    }

    pub fn write_return(&mut self) {
        self.instructions.push(Instruction::Return);
    }

    pub fn write_push_symbol(&mut self, symbol: &Symbol) {
        self.write_push(symbol.kind.into(), symbol.index);
    }

    pub fn write_pop_symbol(&mut self, symbol: &Symbol) {
        self.write_pop(symbol.kind.into(), symbol.index);
    }

    /// Leaves the address `base + index` in `pointer 1`, so the element is
    /// reachable as `that 0`.
    pub fn gen_element_address(
        &mut self,
        base: &Symbol,
        index: &Expr,
        symbols: &SymbolTable,
    ) -> Result<()> {
        self.write_push_symbol(base);
        self.gen_expr(index, symbols)?;
        self.write_arithmetic(ArithmeticOp::Add);
        self.write_pop(Segment::Pointer, 1);
        Ok(())
    }

    /// Pushes the value of `expr`. Operands are always emitted left before
    /// right, ahead of their operator.
    pub fn gen_expr(&mut self, expr: &Expr, symbols: &SymbolTable) -> Result<()> {
        match expr {
            Expr::Grouped(inner) => self.gen_expr(inner, symbols)?,
            Expr::KeywordConstant(k) => self.gen_keyword_constant(*k),
            Expr::Number(value) => self.write_push(Segment::Constant, *value),
            Expr::StringConstant(s) => self.gen_string(s)?,
            Expr::VarRef(name) => self.write_push_symbol(symbols.resolve(name)?),
            Expr::Unary(op, operand) => {
                self.gen_expr(operand, symbols)?;
                self.write_arithmetic(match op {
                    UnaryOpKind::Neg => ArithmeticOp::Neg,
                    UnaryOpKind::Not => ArithmeticOp::Not,
                });
            }
            Expr::Call(call) => self.gen_call(call, symbols)?,
            Expr::ArrayElement(name, index) => {
                let base = symbols.resolve(name)?;
                self.gen_element_address(base, index, symbols)?;
                self.write_push(Segment::That, 0);
            }
            Expr::Binary(first, rest) => {
                // Right grouping: every operand first, then the operators
                // from the innermost (last) outwards.
                self.gen_expr(first, symbols)?;
                for (_, operand) in rest {
                    self.gen_expr(operand, symbols)?;
                }
                for (op, _) in rest.iter().rev() {
                    self.gen_binop(*op);
                }
            }
        }
        Ok(())
    }

    fn gen_binop(&mut self, op: BinOpKind) {
        let op = match op {
            BinOpKind::Add => ArithmeticOp::Add,
            BinOpKind::Sub => ArithmeticOp::Sub,
            BinOpKind::And => ArithmeticOp::And,
            BinOpKind::Or => ArithmeticOp::Or,
            BinOpKind::LessThan => ArithmeticOp::Lt,
            BinOpKind::GreaterThan => ArithmeticOp::Gt,
            BinOpKind::Equal => ArithmeticOp::Eq,
            BinOpKind::Mul => return self.write_call("Math.multiply", 2),
            BinOpKind::Div => return self.write_call("Math.divide", 2),
        };
        self.write_arithmetic(op);
    }

    fn gen_keyword_constant(&mut self, k: KeywordConstant) {
        match k {
            KeywordConstant::True => {
                self.write_push(Segment::Constant, 0);
                self.write_arithmetic(ArithmeticOp::Not);
            }
            KeywordConstant::False | KeywordConstant::Null => {
                self.write_push(Segment::Constant, 0)
            }
            KeywordConstant::This => self.write_push(Segment::Pointer, 0),
        }
    }

    /// Only ASCII text can be built; the machine has no wider characters.
    fn gen_string(&mut self, s: &str) -> Result<()> {
        let codes = s
            .chars()
            .map(|c| {
                u8::try_from(c)
                    .ok()
                    .filter(u8::is_ascii)
                    .map(u16::from)
                    .ok_or_else(|| Error::OutOfRange {
                        what: format!("character {c:?}"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let len = u16::try_from(codes.len())
            .ok()
            .filter(|&len| len <= MAX_INTEGER)
            .ok_or_else(|| Error::OutOfRange {
                what: format!("string of {} characters", codes.len()),
            })?;

        self.write_push(Segment::Constant, len);
        self.write_call("String.new", 1);
        for code in codes {
            self.write_push(Segment::Constant, code);
            self.write_call("String.appendChar", 2);
        }
        Ok(())
    }

    /// `f()` calls a method on the current object, `v.f()` a method on the
    /// object held by variable `v`, and `C.f()` a function or constructor of
    /// class `C`. Method calls pass the receiver as an extra first argument.
    fn gen_call(&mut self, call: &Call, symbols: &SymbolTable) -> Result<()> {
        let (name, receiver_args) = match &call.receiver {
            None => {
                self.write_push(Segment::Pointer, 0);
                (format!("{}.{}", self.class_name, call.name), 1)
            }
            Some(receiver) => match symbols.get(receiver) {
                Some(symbol) => {
                    self.write_push_symbol(symbol);
                    (format!("{}.{}", symbol.ty, call.name), 1)
                }
                None => (format!("{receiver}.{}", call.name), 0),
            },
        };

        for arg in &call.args {
            self.gen_expr(arg, symbols)?;
        }
        self.write_call(&name, call.args.len() + receiver_args);
        Ok(())
    }
}
