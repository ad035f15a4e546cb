//! Recursive-descent parser driving a [`CompileContext`] in source order.

use crate::context::CompileContext;
use crate::cube::Operator;
use crate::errors::{CompileError, ParseError};
use crate::position::Position;
use crate::token::{Token, TokenKind};
use crate::types::Type;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ctx: CompileContext,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            ctx: CompileContext::new(),
        }
    }

    /// Parses the whole program and returns the populated context, ready for
    /// quadruple inspection or `.patitoc` serialization.
    pub fn parse(mut self) -> Result<CompileContext, CompileError> {
        self.parse_program()?;
        Ok(self.ctx)
    }

    // ---- Token plumbing ----------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_pos(&self) -> Position {
        self.current().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: kind.to_string(),
                found: self.current().kind.to_string(),
                pos: self.current_pos(),
            })
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Position), ParseError> {
        let pos = self.current_pos();
        match self.advance().kind {
            TokenKind::Ident(name) => Ok((name, pos)),
            other => Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: other.to_string(),
                pos,
            }),
        }
    }

    fn expect_type(&mut self) -> Result<(Type, Position), ParseError> {
        let pos = self.current_pos();
        let ty = match self.current().kind {
            TokenKind::Int => Type::Int,
            TokenKind::Float => Type::Float,
            TokenKind::Void => Type::Void,
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a type".to_string(),
                    found: self.current().kind.to_string(),
                    pos,
                })
            }
        };
        self.advance();
        Ok((ty, pos))
    }

    // ---- Grammar productions ------------------------------------------

    fn parse_program(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Program)?;
        let (name, pos) = self.expect_ident()?;
        self.ctx.program_start(name, pos)?;
        self.expect(TokenKind::Semicolon)?;

        if self.check(&TokenKind::Var) {
            self.advance();
            self.parse_var_decls(true)?;
        }

        while matches!(
            self.current().kind,
            TokenKind::Int | TokenKind::Float | TokenKind::Void
        ) {
            self.parse_function()?;
        }

        self.expect(TokenKind::Main)?;
        self.parse_statements()?;
        self.expect(TokenKind::End)?;

        self.ctx.program_end();
        Ok(())
    }

    /// `f_var+`: one or more `id ("," id)* ":" type` bindings. Bindings may be
    /// chained by a comma under a single trailing `;`, or each self-terminated
    /// by its own `;` followed immediately by the next binding — the grammar
    /// in SPEC_FULL.md §6.2 allows both renderings of the same repetition (see
    /// DESIGN.md).
    fn parse_var_decls(&mut self, is_global: bool) -> Result<(), CompileError> {
        loop {
            self.parse_var_binding(is_global)?;
            match self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Semicolon => {
                    self.advance();
                    if !matches!(self.current().kind, TokenKind::Ident(_)) {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// A single `id ("," id)* ":" type` binding, without its terminator.
    fn parse_var_binding(&mut self, is_global: bool) -> Result<(), CompileError> {
        let mut names = Vec::new();
        let (name, pos) = self.expect_ident()?;
        names.push((name, pos));
        while self.check(&TokenKind::Comma) {
            self.advance();
            let (name, pos) = self.expect_ident()?;
            names.push((name, pos));
        }
        self.expect(TokenKind::Colon)?;
        let (ty, type_pos) = self.expect_type()?;
        if ty == Type::Void {
            return Err(ParseError::UnexpectedToken {
                expected: "'int' or 'float'".to_string(),
                found: Type::Void.to_string(),
                pos: type_pos,
            }
            .into());
        }

        for (name, pos) in names {
            if is_global {
                self.ctx.declare_global(name, ty, pos)?;
            } else {
                self.ctx.declare_local(name, ty, pos)?;
            }
        }
        Ok(())
    }

    fn parse_function(&mut self) -> Result<(), CompileError> {
        let (return_type, _) = self.expect_type()?;
        let (name, pos) = self.expect_ident()?;
        self.ctx.open_function(name, return_type, pos)?;

        self.expect(TokenKind::LParen)?;
        if !self.check(&TokenKind::RParen) {
            self.parse_param()?;
            while self.check(&TokenKind::Comma) {
                self.advance();
                self.parse_param()?;
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::LBracket)?;
        if matches!(self.current().kind, TokenKind::Ident(_)) {
            self.parse_var_decls(false)?;
        }
        self.expect(TokenKind::RBracket)?;

        self.ctx.mark_function_start();
        self.parse_statements()?;
        self.ctx.close_function(self.current_pos())?;
        Ok(())
    }

    fn parse_param(&mut self) -> Result<(), CompileError> {
        let (name, pos) = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let (ty, type_pos) = self.expect_type()?;
        if ty == Type::Void {
            return Err(ParseError::UnexpectedToken {
                expected: "'int' or 'float'".to_string(),
                found: Type::Void.to_string(),
                pos: type_pos,
            }
            .into());
        }
        self.ctx.declare_param(name, ty, pos)?;
        Ok(())
    }

    /// Parses `{ statement* }`, leaving the closing `}` consumed.
    fn parse_statements(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::LBrace)?;
        while !self.check(&TokenKind::RBrace) {
            self.parse_statement()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), CompileError> {
        match self.current().kind {
            TokenKind::If => self.parse_condition(),
            TokenKind::While => self.parse_cycle(),
            TokenKind::Print => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Ident(_) => self.parse_assign(),
            _ => Err(ParseError::UnexpectedToken {
                expected: "a statement".to_string(),
                found: self.current().kind.to_string(),
                pos: self.current_pos(),
            }
            .into()),
        }
    }

    fn parse_assign(&mut self) -> Result<(), CompileError> {
        let (name, pos) = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        self.parse_expression()?;
        self.ctx.stmt_assign(&name, pos)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_condition(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.ctx.stmt_if_mark(self.current_pos())?;
        self.parse_statements()?;

        if self.check(&TokenKind::Else) {
            self.advance();
            self.ctx.stmt_else_mark(self.current_pos())?;
            self.parse_statements()?;
            self.ctx.stmt_if_else_end(self.current_pos())?;
        } else {
            self.ctx.stmt_if_end(self.current_pos())?;
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_cycle(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::While)?;
        self.ctx.stmt_while_mark();
        self.expect(TokenKind::LParen)?;
        self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.ctx.stmt_while_condition(self.current_pos())?;
        self.expect(TokenKind::Do)?;
        self.parse_statements()?;
        self.ctx.stmt_while_end(self.current_pos())?;
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_print(&mut self) -> Result<(), CompileError> {
        let pos = self.current_pos();
        self.expect(TokenKind::Print)?;
        self.expect(TokenKind::LParen)?;
        if self.check(&TokenKind::RParen) {
            return Err(ParseError::PrintRequiresArgument(pos).into());
        }
        self.parse_print_arg()?;
        while self.check(&TokenKind::Comma) {
            self.advance();
            self.parse_print_arg()?;
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_print_arg(&mut self) -> Result<(), CompileError> {
        if let TokenKind::StringLiteral(text) = self.current().kind.clone() {
            self.advance();
            self.ctx.stmt_print_string(&text);
        } else {
            let pos = self.current_pos();
            self.parse_expression()?;
            self.ctx.stmt_print_expr(pos)?;
        }
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), CompileError> {
        let pos = self.current_pos();
        self.expect(TokenKind::Return)?;
        if self.check(&TokenKind::Semicolon) {
            self.ctx.stmt_return_void(pos)?;
        } else {
            self.parse_expression()?;
            self.ctx.stmt_return_expr(pos)?;
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    // ---- Expressions ----------------------------------------------------
    //
    // `expression := exp [ relop exp ]`. Relational operators don't chain, so
    // at most one may appear; `process_relational_expression` inside
    // `finish_expression` (called by every statement-level consumer) handles
    // draining whichever shape was pushed.

    fn parse_expression(&mut self) -> Result<(), CompileError> {
        self.parse_exp()?;
        if let Some(op) = self.relational_op() {
            let pos = self.current_pos();
            self.advance();
            self.parse_exp()?;
            self.ctx.process_operator(op, pos)?;
        }
        Ok(())
    }

    fn relational_op(&self) -> Option<Operator> {
        match self.current().kind {
            TokenKind::Gt => Some(Operator::Gt),
            TokenKind::Lt => Some(Operator::Lt),
            TokenKind::Neq => Some(Operator::Neq),
            TokenKind::Eq => Some(Operator::Eq),
            _ => None,
        }
    }

    fn parse_exp(&mut self) -> Result<(), CompileError> {
        self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => break,
            };
            let pos = self.current_pos();
            self.advance();
            self.parse_term()?;
            self.ctx.process_operator(op, pos)?;
        }
        Ok(())
    }

    fn parse_term(&mut self) -> Result<(), CompileError> {
        self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => Operator::Mul,
                TokenKind::Slash => Operator::Div,
                _ => break,
            };
            let pos = self.current_pos();
            self.advance();
            self.parse_factor()?;
            self.ctx.process_operator(op, pos)?;
        }
        Ok(())
    }

    fn parse_factor(&mut self) -> Result<(), CompileError> {
        let unary = match self.current().kind {
            TokenKind::Plus => Some(Operator::UnaryPlus),
            TokenKind::Minus => Some(Operator::UnaryMinus),
            _ => None,
        };
        let unary_pos = self.current_pos();
        if unary.is_some() {
            self.advance();
        }

        match self.current().kind.clone() {
            TokenKind::LParen => {
                self.advance();
                self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
            }
            TokenKind::Ident(name) => {
                let pos = self.current_pos();
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let mut arg_count = 0;
                    if !self.check(&TokenKind::RParen) {
                        self.parse_expression()?;
                        arg_count += 1;
                        while self.check(&TokenKind::Comma) {
                            self.advance();
                            self.parse_expression()?;
                            arg_count += 1;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    self.ctx.expr_call(&name, arg_count, pos)?;
                } else {
                    self.ctx.push_variable(&name, pos)?;
                }
            }
            TokenKind::IntLiteral(v) => {
                self.advance();
                self.ctx.push_constant(v.to_string(), Type::Int)?;
            }
            TokenKind::FloatLiteral(v) => {
                self.advance();
                self.ctx.push_constant(v.to_string(), Type::Float)?;
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "an expression".to_string(),
                    found: other.to_string(),
                    pos: unary_pos,
                }
                .into())
            }
        }

        if let Some(op) = unary {
            self.ctx.process_unary(op, unary_pos)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn compile(src: &str) -> Result<CompileContext, CompileError> {
        let tokens = Lexer::new(src).tokenize()?;
        Parser::new(tokens).parse()
    }

    #[test]
    fn s1_simple_assignment() {
        let ctx = compile("program p; var x:int; main { x = 1 + 2 * 3; } end").unwrap();
        let quads: Vec<String> = ctx.quads.iter().map(|q| q.to_string()).collect();
        assert_eq!(
            quads,
            vec![
                "(GOTO, , , 1)",
                "(*, 30001, 30002, 20000)",
                "(+, 30000, 20000, 20001)",
                "(=, 20001, , 1000)",
                "(END, , , )",
            ]
        );
    }

    #[test]
    fn s4_function_with_call() {
        let ctx = compile("program p; int f(a:int)[] { return a + 1; } main { print(f(5)); } end")
            .unwrap();
        let ops: Vec<&str> = ctx.quads.iter().map(|q| q.operator.as_str()).collect();
        assert_eq!(
            ops,
            vec![
                "GOTO", "+", "RETURN", "ENDFUNC", "ERA", "PARAM", "GOSUB", "PRINT", "END"
            ]
        );
        assert_eq!(ctx.quads.get(0).unwrap().to_string(), "(GOTO, , , 4)");
    }

    #[test]
    fn s5_assignment_type_mismatch() {
        let err = compile("program p; var x:int; main { x = 1.5; } end").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Semantic(crate::errors::SemanticError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn s5_missing_return() {
        let err = compile("program p; void f()[]{ } main { } end").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Semantic(crate::errors::SemanticError::MissingReturn { .. })
        ));
    }

    #[test]
    fn s5_duplicate_global() {
        let err = compile("program p; var x:int, x:float; main { } end").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Semantic(crate::errors::SemanticError::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn s6_constant_interning_reuses_one_address() {
        let ctx = compile("program p; var x:int; main { x = 1 + 1; } end").unwrap();
        let add_quad = ctx.quads.iter().find(|q| q.operator == "+").unwrap();
        assert_eq!(add_quad.operand1, "30000");
        assert_eq!(add_quad.operand2, "30000");
    }

    #[test]
    fn empty_print_is_a_parse_error() {
        let err = compile("program p; main { print(); } end").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Parse(ParseError::PrintRequiresArgument(_))
        ));
    }

    #[test]
    fn while_loop_condition_and_backpatch_targets() {
        let ctx =
            compile("program p; var x:int; main { while (x != 0) do { x = x - 1; }; } end")
                .unwrap();
        let neq_idx = ctx.quads.iter().position(|q| q.operator == "!=").unwrap();
        let loop_goto = ctx
            .quads
            .iter()
            .enumerate()
            .find(|(i, q)| *i > 0 && q.operator == "GOTO" && !q.result.is_empty())
            .map(|(_, q)| q)
            .unwrap();
        assert_eq!(loop_goto.result, neq_idx.to_string());
    }
}
