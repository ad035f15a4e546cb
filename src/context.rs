//! `CompileContext`: the single owned per-compilation object. The parser
//! drives these methods in source order; this module has no knowledge of
//! tokens or grammar productions, only of the quadruple-emission semantics.

use crate::address::{Address, VirtualAddressManager};
use crate::constants::ConstantTable;
use crate::cube::{default_cube, Operator};
use crate::errors::SemanticError;
use crate::position::Position;
use crate::quadruples::{Quadruple, QuadrupleBuffer};
use crate::stacks::{ExpressionState, JumpStack, OperatorStack, PatchRequest};
use crate::symbols::FunctionDirectory;
use crate::types::Type;

#[derive(Debug)]
pub struct CompileContext {
    pub directory: FunctionDirectory,
    pub addresses: VirtualAddressManager,
    pub constants: ConstantTable,
    pub quads: QuadrupleBuffer,
    expr: ExpressionState,
    ops: OperatorStack,
    jumps: JumpStack,
    /// Index of the program's leading `(GOTO, "", "", ?)` placeholder.
    program_goto: Option<usize>,
    /// Set of function names with at least one `return` statement seen so far,
    /// used for the "syntactically reachable return" approximation.
    seen_return: std::collections::HashSet<String>,
}

impl Default for CompileContext {
    fn default() -> Self {
        CompileContext {
            directory: FunctionDirectory::new(),
            addresses: VirtualAddressManager::new(),
            constants: ConstantTable::new(),
            quads: QuadrupleBuffer::new(),
            expr: ExpressionState::new(),
            ops: OperatorStack::new(),
            jumps: JumpStack::new(),
            program_goto: None,
            seen_return: std::collections::HashSet::new(),
        }
    }
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn precedence(op: Operator) -> u8 {
        match op {
            Operator::Mul | Operator::Div => 3,
            Operator::Add | Operator::Sub => 2,
            Operator::Gt | Operator::Lt | Operator::Neq | Operator::Eq => 1,
            Operator::Assign => 0,
            Operator::UnaryPlus | Operator::UnaryMinus => 4,
        }
    }

    fn is_relational(op: Operator) -> bool {
        matches!(
            op,
            Operator::Gt | Operator::Lt | Operator::Neq | Operator::Eq
        )
    }

    // ---- Program / scope bookkeeping -----------------------------------

    pub fn program_start(&mut self, name: String, pos: Position) -> Result<(), SemanticError> {
        self.directory.set_program_name(name, pos)?;
        let idx = self.quads.push(Quadruple::new("GOTO", "", "", ""));
        self.program_goto = Some(idx);
        Ok(())
    }

    pub fn declare_global(&mut self, name: String, ty: Type, pos: Position) -> Result<(), SemanticError> {
        self.directory
            .declare_global(name, ty, pos, &mut self.addresses)?;
        Ok(())
    }

    pub fn open_function(
        &mut self,
        name: String,
        return_type: Type,
        pos: Position,
    ) -> Result<(), SemanticError> {
        self.directory
            .open_function(name, return_type, pos, &mut self.addresses)
    }

    pub fn declare_param(&mut self, name: String, ty: Type, pos: Position) -> Result<(), SemanticError> {
        self.directory
            .declare_param(name, ty, pos, &mut self.addresses)?;
        Ok(())
    }

    pub fn declare_local(&mut self, name: String, ty: Type, pos: Position) -> Result<(), SemanticError> {
        self.directory
            .declare_local(name, ty, pos, &mut self.addresses)?;
        Ok(())
    }

    /// Records the function's entry quadruple index; call immediately before
    /// parsing the function's first statement.
    pub fn mark_function_start(&mut self) {
        self.directory.set_start_quad(self.quads.next_index());
    }

    pub fn close_function(&mut self, pos: Position) -> Result<(), SemanticError> {
        let name = self.directory.active_name().to_string();
        if !self.seen_return.contains(&name) {
            return Err(SemanticError::MissingReturn { name, pos });
        }
        self.quads.push(Quadruple::new("ENDFUNC", "", "", ""));
        self.directory.close_function();
        Ok(())
    }

    /// Patches the leading `GOTO` to skip past all function bodies and emits
    /// the final `END`. Call once, after the whole program has been parsed.
    pub fn program_end(&mut self) {
        let goto_idx = self.program_goto.expect("program_start was not called");
        let mut target = 1usize;
        for (i, q) in self.quads.iter().enumerate() {
            if q.operator == "ENDFUNC" {
                target = i + 1;
            }
        }
        self.quads.patch_result(goto_idx, target.to_string());
        self.quads.push(Quadruple::new("END", "", "", ""));
    }

    // ---- Expression engine ----------------------------------------------

    pub fn push_constant(&mut self, value: String, ty: Type) -> Result<(), SemanticError> {
        let addr = self.constants.intern(&value, ty, &mut self.addresses)?;
        self.expr.push(addr, ty);
        Ok(())
    }

    pub fn push_variable(&mut self, name: &str, pos: Position) -> Result<(), SemanticError> {
        let ty = self
            .directory
            .resolve_type(name)
            .ok_or_else(|| SemanticError::UndeclaredIdentifier {
                name: name.to_string(),
                pos,
            })?;
        let addr = self.directory.resolve_address(name).expect("type resolved implies address resolved");
        self.expr.push(addr, ty);
        Ok(())
    }

    fn pop_operand(&mut self, pos: Position) -> Result<(Address, Type), SemanticError> {
        self.expr
            .pop()
            .ok_or(SemanticError::StackUnderflow(Some(pos)))
    }

    fn reduce_one(&mut self, op: Operator, pos: Position) -> Result<(), SemanticError> {
        let (right, right_ty) = self.pop_operand(pos)?;
        let (left, left_ty) = self.pop_operand(pos)?;
        let result_ty = default_cube()
            .resolve(op, left_ty, right_ty)
            .ok_or(SemanticError::TypeMismatch {
                operator: op.to_string(),
                left: left_ty,
                right: right_ty,
                pos,
            })?;
        let temp = self.addresses.next_temporal()?;
        self.quads
            .push(Quadruple::new(op.to_string(), left.to_string(), right.to_string(), temp.to_string()));
        self.expr.push(temp, result_ty);
        Ok(())
    }

    /// Pushes `op`, first reducing any higher-or-equal precedence operators
    /// already on the stack (standard operator-precedence parsing).
    pub fn process_operator(&mut self, op: Operator, pos: Position) -> Result<(), SemanticError> {
        while let Some(top) = self.ops.top() {
            if Self::precedence(top) < Self::precedence(op) {
                break;
            }
            self.ops.pop();
            self.reduce_one(top, pos)?;
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn process_unary(&mut self, op: Operator, pos: Position) -> Result<(), SemanticError> {
        let (operand, ty) = self.pop_operand(pos)?;
        let result_ty = default_cube()
            .resolve(op, ty, ty)
            .ok_or(SemanticError::TypeMismatch {
                operator: op.to_string(),
                left: ty,
                right: ty,
                pos,
            })?;
        let temp = self.addresses.next_temporal()?;
        self.quads
            .push(Quadruple::new(op.to_string(), operand.to_string(), "", temp.to_string()));
        self.expr.push(temp, result_ty);
        Ok(())
    }

    /// Drains arithmetic operators, stopping at a relational operator or `(`.
    pub fn process_expression_end(&mut self, pos: Position) -> Result<(), SemanticError> {
        while let Some(top) = self.ops.top() {
            if Self::is_relational(top) {
                break;
            }
            self.ops.pop();
            self.reduce_one(top, pos)?;
        }
        Ok(())
    }

    /// Drains arithmetic, then reduces exactly one relational operator.
    pub fn process_relational_expression(&mut self, pos: Position) -> Result<(), SemanticError> {
        self.process_expression_end(pos)?;
        if let Some(top) = self.ops.pop() {
            self.reduce_one(top, pos)?;
        }
        Ok(())
    }

    /// Finishes an expression entirely (used at statement boundaries where no
    /// further operators can possibly follow): drains everything, returning
    /// the final value+type.
    pub fn finish_expression(&mut self, pos: Position) -> Result<(Address, Type), SemanticError> {
        self.process_relational_expression(pos)?;
        self.pop_operand(pos)
    }

    // ---- Statement engine -------------------------------------------------

    pub fn stmt_assign(&mut self, name: &str, pos: Position) -> Result<(), SemanticError> {
        let (value, value_ty) = self.finish_expression(pos)?;
        let target_ty = self
            .directory
            .resolve_type(name)
            .ok_or_else(|| SemanticError::UndeclaredIdentifier {
                name: name.to_string(),
                pos,
            })?;
        let target_addr = self.directory.resolve_address(name).expect("resolved type implies address");
        default_cube()
            .resolve(Operator::Assign, target_ty, value_ty)
            .ok_or(SemanticError::TypeMismatch {
                operator: "=".to_string(),
                left: target_ty,
                right: value_ty,
                pos,
            })?;
        self.quads
            .push(Quadruple::new("=", value.to_string(), "", target_addr.to_string()));
        Ok(())
    }

    pub fn stmt_print_expr(&mut self, pos: Position) -> Result<(), SemanticError> {
        let (value, _ty) = self.finish_expression(pos)?;
        self.quads.push(Quadruple::new("PRINT", value.to_string(), "", ""));
        Ok(())
    }

    pub fn stmt_print_string(&mut self, text: &str) {
        self.quads.push(Quadruple::new("PRINT", text.to_string(), "", ""));
    }

    pub fn stmt_if_mark(&mut self, pos: Position) -> Result<(), SemanticError> {
        let (cond, cond_ty) = self.finish_expression(pos)?;
        if cond_ty != Type::Bool {
            return Err(SemanticError::TypeMismatch {
                operator: "if".to_string(),
                left: cond_ty,
                right: Type::Bool,
                pos,
            });
        }
        let idx = self.quads.push(Quadruple::new("GOTOF", cond.to_string(), "", ""));
        self.jumps.push(PatchRequest::GotoF(idx));
        Ok(())
    }

    pub fn stmt_if_end(&mut self, pos: Position) -> Result<(), SemanticError> {
        match self.jumps.pop() {
            Some(PatchRequest::GotoF(idx)) => {
                let target = self.quads.next_index();
                self.quads.patch_result(idx, target.to_string());
                Ok(())
            }
            _ => Err(SemanticError::StackUnderflow(Some(pos))),
        }
    }

    pub fn stmt_else_mark(&mut self, pos: Position) -> Result<(), SemanticError> {
        let goto_idx = self.quads.push(Quadruple::new("GOTO", "", "", ""));
        match self.jumps.pop() {
            Some(PatchRequest::GotoF(idx)) => {
                let target = self.quads.next_index();
                self.quads.patch_result(idx, target.to_string());
                self.jumps.push(PatchRequest::Goto(goto_idx));
                Ok(())
            }
            _ => Err(SemanticError::StackUnderflow(Some(pos))),
        }
    }

    pub fn stmt_if_else_end(&mut self, pos: Position) -> Result<(), SemanticError> {
        match self.jumps.pop() {
            Some(PatchRequest::Goto(idx)) => {
                let target = self.quads.next_index();
                self.quads.patch_result(idx, target.to_string());
                Ok(())
            }
            _ => Err(SemanticError::StackUnderflow(Some(pos))),
        }
    }

    pub fn stmt_while_mark(&mut self) {
        self.jumps.push(PatchRequest::LoopTop(self.quads.next_index()));
    }

    pub fn stmt_while_condition(&mut self, pos: Position) -> Result<(), SemanticError> {
        let (cond, cond_ty) = self.finish_expression(pos)?;
        if cond_ty != Type::Bool {
            return Err(SemanticError::TypeMismatch {
                operator: "while".to_string(),
                left: cond_ty,
                right: Type::Bool,
                pos,
            });
        }
        let idx = self.quads.push(Quadruple::new("GOTOF", cond.to_string(), "", ""));
        self.jumps.push(PatchRequest::GotoF(idx));
        Ok(())
    }

    pub fn stmt_while_end(&mut self, pos: Position) -> Result<(), SemanticError> {
        let gotof_idx = match self.jumps.pop() {
            Some(PatchRequest::GotoF(idx)) => idx,
            _ => return Err(SemanticError::StackUnderflow(Some(pos))),
        };
        let loop_top = match self.jumps.pop() {
            Some(PatchRequest::LoopTop(idx)) => idx,
            _ => return Err(SemanticError::StackUnderflow(Some(pos))),
        };
        self.quads.push(Quadruple::new("GOTO", "", "", loop_top.to_string()));
        let target = self.quads.next_index();
        self.quads.patch_result(gotof_idx, target.to_string());
        Ok(())
    }

    pub fn stmt_return_expr(&mut self, pos: Position) -> Result<(), SemanticError> {
        let (value, value_ty) = self.finish_expression(pos)?;
        let expected = self.directory.active_return_type();
        if value_ty != expected {
            return Err(SemanticError::ReturnTypeMismatch {
                name: self.directory.active_label().to_string(),
                expected,
                found: value_ty,
                pos,
            });
        }
        self.quads.push(Quadruple::new("RETURN", value.to_string(), "", ""));
        self.seen_return.insert(self.directory.active_label().to_string());
        Ok(())
    }

    pub fn stmt_return_void(&mut self, pos: Position) -> Result<(), SemanticError> {
        let expected = self.directory.active_return_type();
        if expected != Type::Void {
            return Err(SemanticError::ReturnTypeMismatch {
                name: self.directory.active_label().to_string(),
                expected,
                found: Type::Void,
                pos,
            });
        }
        self.quads.push(Quadruple::new("RETURN", "", "", ""));
        self.seen_return.insert(self.directory.active_label().to_string());
        Ok(())
    }

    /// A function call in expression position: pops `arg_count` already-reduced
    /// arguments (in call order), validates arity/types against `name`, and
    /// emits the `ERA`/`PARAM`/`GOSUB` sequence, pushing the return value (if
    /// any) back onto the expression stack.
    pub fn expr_call(&mut self, name: &str, arg_count: usize, pos: Position) -> Result<(), SemanticError> {
        let func = self
            .directory
            .get(name)
            .ok_or_else(|| SemanticError::UndeclaredFunction {
                name: name.to_string(),
                pos,
            })?;
        let params = func.params.clone();
        let return_type = func.return_type;

        if params.len() != arg_count {
            return Err(SemanticError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: arg_count,
                pos,
            });
        }

        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(self.pop_operand(pos)?);
        }
        args.reverse(); // popped in reverse call order

        for (i, (param, (_addr, arg_ty))) in params.iter().zip(args.iter()).enumerate() {
            if param.ty != *arg_ty {
                return Err(SemanticError::ArgumentTypeMismatch {
                    name: name.to_string(),
                    index: i,
                    expected: param.ty,
                    found: *arg_ty,
                    pos,
                });
            }
        }

        self.quads.push(Quadruple::new("ERA", name.to_string(), "", ""));
        for (addr, _ty) in &args {
            self.quads.push(Quadruple::new("PARAM", addr.to_string(), "", ""));
        }

        let return_temp = if return_type == Type::Void {
            None
        } else {
            Some(self.addresses.next_temporal()?)
        };
        self.quads.push(Quadruple::new(
            "GOSUB",
            name.to_string(),
            "",
            return_temp.map(|a| a.to_string()).unwrap_or_default(),
        ));
        if let Some(temp) = return_temp {
            self.expr.push(temp, return_type);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::start()
    }

    #[test]
    fn simple_assignment_emits_expected_quadruples() {
        let mut ctx = CompileContext::new();
        ctx.program_start("p".into(), pos()).unwrap();
        ctx.open_function("main".into(), Type::Void, pos()).unwrap();
        ctx.declare_global("x".into(), Type::Int, pos()).unwrap();
        ctx.mark_function_start();
        ctx.push_constant("5".into(), Type::Int).unwrap();
        ctx.stmt_assign("x", pos()).unwrap();
        ctx.stmt_return_void(pos()).unwrap();
        ctx.close_function(pos()).unwrap();
        ctx.program_end();

        let quads: Vec<String> = ctx.quads.iter().map(|q| q.to_string()).collect();
        assert!(quads.iter().any(|q| q.starts_with("(=,")));
        assert_eq!(quads.last().unwrap(), "(END, , , )");
    }

    #[test]
    fn arithmetic_precedence_reduces_multiplication_first() {
        let mut ctx = CompileContext::new();
        ctx.open_function("main".into(), Type::Void, pos()).unwrap();
        ctx.mark_function_start();
        ctx.push_constant("2".into(), Type::Int).unwrap();
        ctx.process_operator(Operator::Add, pos()).unwrap();
        ctx.push_constant("3".into(), Type::Int).unwrap();
        ctx.process_operator(Operator::Mul, pos()).unwrap();
        ctx.push_constant("4".into(), Type::Int).unwrap();
        let (_addr, ty) = ctx.finish_expression(pos()).unwrap();
        assert_eq!(ty, Type::Int);
        // two arithmetic reductions -> two emitted quads before this point
        assert_eq!(ctx.quads.len(), 2);
        assert_eq!(ctx.quads.get(0).unwrap().operator, "*");
        assert_eq!(ctx.quads.get(1).unwrap().operator, "+");
    }

    #[test]
    fn if_else_backpatches_both_branches() {
        let mut ctx = CompileContext::new();
        ctx.program_start("p".into(), pos()).unwrap();
        ctx.open_function("main".into(), Type::Void, pos()).unwrap();
        ctx.mark_function_start();
        ctx.push_constant("1".into(), Type::Int).unwrap();
        ctx.push_constant("2".into(), Type::Int).unwrap();
        ctx.process_operator(Operator::Gt, pos()).unwrap();
        ctx.stmt_if_mark(pos()).unwrap();
        ctx.stmt_print_string("then");
        ctx.stmt_else_mark(pos()).unwrap();
        ctx.stmt_print_string("otherwise");
        ctx.stmt_if_else_end(pos()).unwrap();
        assert!(ctx.jumps.is_empty());
    }

    #[test]
    fn while_loop_jumps_back_to_loop_top() {
        let mut ctx = CompileContext::new();
        ctx.program_start("p".into(), pos()).unwrap();
        ctx.open_function("main".into(), Type::Void, pos()).unwrap();
        ctx.mark_function_start();
        ctx.stmt_while_mark();
        ctx.push_constant("1".into(), Type::Int).unwrap();
        ctx.push_constant("1".into(), Type::Int).unwrap();
        ctx.process_operator(Operator::Eq, pos()).unwrap();
        ctx.stmt_while_condition(pos()).unwrap();
        ctx.stmt_print_string("loop");
        ctx.stmt_while_end(pos()).unwrap();
        let last = ctx.quads.get(ctx.quads.len() - 1).unwrap();
        assert_eq!(last.operator, "GOTO");
        assert_eq!(last.result, "0");
    }

    #[test]
    fn undeclared_identifier_is_reported_with_position() {
        let mut ctx = CompileContext::new();
        ctx.open_function("main".into(), Type::Void, pos()).unwrap();
        let err = ctx.push_variable("missing", pos()).unwrap_err();
        assert!(matches!(err, SemanticError::UndeclaredIdentifier { .. }));
    }

    #[test]
    fn function_call_validates_arity() {
        let mut ctx = CompileContext::new();
        ctx.open_function("f".into(), Type::Int, pos()).unwrap();
        ctx.declare_param("a".into(), Type::Int, pos()).unwrap();
        ctx.close_function_for_test();
        let err = ctx.expr_call("f", 0, pos()).unwrap_err();
        assert!(matches!(err, SemanticError::ArityMismatch { .. }));
    }

    impl CompileContext {
        /// Test-only shortcut: closes a function scope without requiring a
        /// `return` statement, for call-site tests that don't exercise the
        /// function body.
        fn close_function_for_test(&mut self) {
            self.directory.close_function();
        }
    }
}
