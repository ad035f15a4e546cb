//! The semantic cube: a 3-D `(operator, left_type, right_type) -> result_type` lookup.

use crate::types::Type;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Neq,
    Eq,
    UnaryPlus,
    UnaryMinus,
    Assign,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Neq => "!=",
            Operator::Eq => "==",
            Operator::UnaryPlus => "u+",
            Operator::UnaryMinus => "u-",
            Operator::Assign => "=",
        };
        write!(f, "{s}")
    }
}

pub struct SemanticCube {
    table: HashMap<(Operator, Type, Type), Type>,
}

impl SemanticCube {
    /// Looks up the result type of applying `op` to operands of `left`/`right`
    /// type, or `None` if the combination is not defined.
    pub fn resolve(&self, op: Operator, left: Type, right: Type) -> Option<Type> {
        self.table.get(&(op, left, right)).copied()
    }

    fn insert(&mut self, op: Operator, left: Type, right: Type, result: Type) {
        self.table.insert((op, left, right), result);
    }
}

fn build_default_cube() -> SemanticCube {
    use Type::*;
    let mut cube = SemanticCube {
        table: HashMap::new(),
    };

    for &op in &[Operator::Add, Operator::Sub, Operator::Mul, Operator::Div] {
        cube.insert(op, Int, Int, Int);
        cube.insert(op, Int, Float, Float);
        cube.insert(op, Float, Int, Float);
        cube.insert(op, Float, Float, Float);
    }

    for &op in &[Operator::Gt, Operator::Lt, Operator::Neq, Operator::Eq] {
        cube.insert(op, Int, Int, Bool);
        cube.insert(op, Int, Float, Bool);
        cube.insert(op, Float, Int, Bool);
        cube.insert(op, Float, Float, Bool);
    }

    // Unary operators: `right` mirrors `left` since there is only one operand.
    for &t in &[Int, Float] {
        cube.insert(Operator::UnaryPlus, t, t, t);
        cube.insert(Operator::UnaryMinus, t, t, t);
    }

    // Assignment widens int into float but never narrows float into int.
    cube.insert(Operator::Assign, Int, Int, Int);
    cube.insert(Operator::Assign, Float, Float, Float);
    cube.insert(Operator::Assign, Float, Int, Float);
    cube.insert(Operator::Assign, Bool, Bool, Bool);

    cube
}

static DEFAULT_CUBE: OnceLock<SemanticCube> = OnceLock::new();

/// The process-wide default semantic cube, built once on first use.
pub fn default_cube() -> &'static SemanticCube {
    DEFAULT_CUBE.get_or_init(build_default_cube)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_widens_int_to_float() {
        let cube = default_cube();
        assert_eq!(
            cube.resolve(Operator::Add, Type::Int, Type::Float),
            Some(Type::Float)
        );
        assert_eq!(
            cube.resolve(Operator::Add, Type::Float, Type::Int),
            Some(Type::Float)
        );
        assert_eq!(
            cube.resolve(Operator::Add, Type::Int, Type::Int),
            Some(Type::Int)
        );
    }

    #[test]
    fn relational_operators_always_yield_bool() {
        let cube = default_cube();
        assert_eq!(
            cube.resolve(Operator::Gt, Type::Int, Type::Float),
            Some(Type::Bool)
        );
    }

    #[test]
    fn assignment_allows_widening_but_not_narrowing() {
        let cube = default_cube();
        assert_eq!(
            cube.resolve(Operator::Assign, Type::Float, Type::Int),
            Some(Type::Float)
        );
        assert_eq!(cube.resolve(Operator::Assign, Type::Int, Type::Float), None);
    }

    #[test]
    fn undefined_combinations_resolve_to_none() {
        let cube = default_cube();
        assert_eq!(cube.resolve(Operator::Add, Type::Bool, Type::Bool), None);
        assert_eq!(cube.resolve(Operator::Add, Type::Void, Type::Int), None);
    }
}
