//! The emitted intermediate representation: an append-only quadruple list.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quadruple {
    pub operator: String,
    pub operand1: String,
    pub operand2: String,
    pub result: String,
}

impl Quadruple {
    pub fn new(
        operator: impl Into<String>,
        operand1: impl Into<String>,
        operand2: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Quadruple {
            operator: operator.into(),
            operand1: operand1.into(),
            operand2: operand2.into(),
            result: result.into(),
        }
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.operator, self.operand1, self.operand2, self.result
        )
    }
}

/// The growing output of a compilation, indexed by quadruple position. GOTO
/// targets are patched after the fact by index, since the jump destination is
/// usually not known until later statements have been parsed.
#[derive(Debug, Default)]
pub struct QuadrupleBuffer {
    quads: Vec<Quadruple>,
}

impl QuadrupleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a quadruple and returns the index it was written to.
    pub fn push(&mut self, quad: Quadruple) -> usize {
        self.quads.push(quad);
        self.quads.len() - 1
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// The index the next `push` will occupy.
    pub fn next_index(&self) -> usize {
        self.quads.len()
    }

    pub fn get(&self, index: usize) -> Option<&Quadruple> {
        self.quads.get(index)
    }

    /// Overwrites the `result` field of an already-emitted GOTO/GOTOF/GOTOT
    /// quadruple with its resolved jump target.
    pub fn patch_result(&mut self, index: usize, target: impl Into<String>) {
        self.quads[index].result = target.into();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quadruple> {
        self.quads.iter()
    }

    pub fn as_slice(&self) -> &[Quadruple] {
        &self.quads
    }
}
