//! Operand-stack evaluation state and the backpatching jump stack.

use crate::address::Address;
use crate::cube::Operator;
use crate::types::Type;

/// Paired operand/type stack used while reducing an expression. Keeping the two
/// in one structure makes "operand and type stacks have equal depth" a
/// structural fact instead of an invariant the caller must maintain by hand.
#[derive(Debug, Default)]
pub struct ExpressionState {
    operands: Vec<Address>,
    types: Vec<Type>,
}

impl ExpressionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, address: Address, ty: Type) {
        self.operands.push(address);
        self.types.push(ty);
    }

    pub fn pop(&mut self) -> Option<(Address, Type)> {
        let addr = self.operands.pop()?;
        let ty = self.types.pop()?;
        Some((addr, ty))
    }

    pub fn top_type(&self) -> Option<Type> {
        self.types.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }
}

/// An operator awaiting application, pending the next reduction. Parenthesized
/// sub-expressions are handled by the parser's recursion rather than a
/// sentinel on this stack: each `(...)` fully resolves to one operand before
/// its enclosing expression ever sees it, so no paren bookkeeping is needed
/// here (see DESIGN.md).
#[derive(Debug, Default)]
pub struct OperatorStack {
    ops: Vec<Operator>,
}

impl OperatorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operator) {
        self.ops.push(op);
    }

    pub fn pop(&mut self) -> Option<Operator> {
        self.ops.pop()
    }

    pub fn top(&self) -> Option<Operator> {
        self.ops.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A pending jump whose target quadruple index is not yet known. Tagging the
/// kind (rather than pushing bare quadruple indices) lets backpatch sites
/// assert they are resolving the jump they think they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchRequest {
    /// A conditional `GOTOF` quadruple index awaiting its false-branch target.
    GotoF(usize),
    /// An unconditional `GOTO` quadruple index awaiting its target (e.g. the
    /// jump-over-else at the end of an if-branch).
    Goto(usize),
    /// The quadruple index a loop's condition re-check should jump back to.
    LoopTop(usize),
}

#[derive(Debug, Default)]
pub struct JumpStack {
    entries: Vec<PatchRequest>,
}

impl JumpStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PatchRequest) {
        self.entries.push(request);
    }

    pub fn pop(&mut self) -> Option<PatchRequest> {
        self.entries.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_state_pairs_operand_and_type() {
        let mut state = ExpressionState::new();
        state.push(Address::Constant(30000), Type::Int);
        state.push(Address::Temporary(20000), Type::Float);
        assert_eq!(state.top_type(), Some(Type::Float));
        let (addr, ty) = state.pop().unwrap();
        assert_eq!(addr, Address::Temporary(20000));
        assert_eq!(ty, Type::Float);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn jump_stack_preserves_tagged_variant() {
        let mut stack = JumpStack::new();
        stack.push(PatchRequest::GotoF(3));
        stack.push(PatchRequest::LoopTop(1));
        assert_eq!(stack.pop(), Some(PatchRequest::LoopTop(1)));
        assert_eq!(stack.pop(), Some(PatchRequest::GotoF(3)));
        assert!(stack.is_empty());
    }

    #[test]
    fn operator_stack_is_lifo() {
        let mut ops = OperatorStack::new();
        ops.push(Operator::Add);
        ops.push(Operator::Mul);
        assert_eq!(ops.top(), Some(Operator::Mul));
        assert_eq!(ops.pop(), Some(Operator::Mul));
        assert_eq!(ops.top(), Some(Operator::Add));
    }
}
