use tracing::debug;

use crate::error::{CompileError, Diagnostic, Stage};
use crate::ir::ast::{
    BinaryOp, Block, Call, Decls, Definition, Expr, ExprKind, Function, LoopControl, Procedure,
    Program, Reference, Routine, Stmt, StmtKind,
};
use super::lexer::{Keyword, Operator, Scanner, Token, TokenKind};

/// Recursive-descent parser with one token of lookahead.
pub struct Parser {
    scanner: Scanner,
    current: Token,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            diagnostics: Vec::new(),
        }
    }

    /// Starts over on `source`, clearing both the scanner's and the parser's
    /// error counters.
    pub fn reset(&mut self, source: &str) {
        self.scanner.reset(source);
        self.diagnostics.clear();
        self.current = self.scanner.next_token();
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Scan and parse errors combined.
    pub fn total_errors(&self) -> usize {
        self.scanner.error_count() + self.error_count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn current_token(&self) -> &Token {
        &self.current
    }

    /// `program = block "." ;`
    ///
    /// Stops at the first error; the returned error is the only diagnostic
    /// this call records.
    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        debug!("parsing program");
        let block = self.parse_block()?;
        if !self.at_char('.') {
            return self.fail("source program must end with '.'");
        }
        self.advance();
        if self.current.kind != TokenKind::End {
            return self.fail("source program must end with '.'");
        }
        debug!(routines = block.routines.len(), "parsed program");
        Ok(Program { block })
    }

    fn parse_block(&mut self) -> Result<Block, CompileError> {
        let line = self.current.line;

        let consts = if self.at_keyword(Keyword::Const) {
            Some(self.parse_decls(true)?)
        } else {
            None
        };
        let vars = if self.at_keyword(Keyword::Var) {
            Some(self.parse_decls(false)?)
        } else {
            None
        };

        let mut routines = Vec::new();
        loop {
            match self.current.kind {
                TokenKind::Keyword(Keyword::Procedure) => {
                    routines.push(Routine::Procedure(self.parse_procedure()?));
                }
                TokenKind::Keyword(Keyword::Function) => {
                    routines.push(Routine::Function(self.parse_function()?));
                }
                _ => break,
            }
        }

        let body = self.parse_statement()?;
        Ok(Block {
            line,
            consts,
            vars,
            routines,
            body,
            scope: None,
        })
    }

    /// `consts = "const" id "=" expr {"," id "=" expr} ";"`
    /// `vars = "var" id ["=" expr] {"," id ["=" expr]} ";"`
    fn parse_decls(&mut self, constant: bool) -> Result<Decls, CompileError> {
        let line = self.current.line;
        let mut defs = Vec::new();
        loop {
            self.advance(); // consume 'const' / 'var' / ','
            let def_line = self.current.line;
            let name = self.expect_identifier("identifier required")?;
            let init = if self.at_operator(Operator::Equal) {
                self.advance();
                Some(self.parse_expression()?)
            } else if constant {
                return self.fail("'=' required");
            } else {
                None
            };
            defs.push(Definition {
                line: def_line,
                name,
                init,
            });
            if !self.at_char(',') {
                break;
            }
        }
        self.expect_char(';', "';' required")?;
        Ok(Decls {
            line,
            defs,
            scope: None,
        })
    }

    fn parse_procedure(&mut self) -> Result<Procedure, CompileError> {
        let line = self.current.line;
        self.advance(); // consume 'procedure'
        let name = self.expect_identifier("identifier required")?;
        self.expect_char(';', "';' required")?;
        let block = self.parse_block()?;
        self.expect_char(';', "';' required")?;
        Ok(Procedure {
            line,
            name,
            block,
            scope: None,
        })
    }

    fn parse_function(&mut self) -> Result<Function, CompileError> {
        let line = self.current.line;
        self.advance(); // consume 'function'
        let name = self.expect_identifier("identifier required")?;

        let mut params = Vec::new();
        if self.at_char('(') {
            loop {
                self.advance(); // consume '(' / ','
                params.push(self.expect_identifier("identifier required in argument list")?);
                if !self.at_char(',') {
                    break;
                }
            }
            self.expect_char(')', "')' required")?;
        }

        self.expect_char(';', "';' required")?;
        let block = self.parse_block()?;
        self.expect_char(';', "';' required")?;
        Ok(Function {
            line,
            name,
            params,
            block,
            scope: None,
        })
    }

    /// Returns `None` for the empty statement.
    fn parse_statement(&mut self) -> Result<Option<Stmt>, CompileError> {
        let stmt = match self.current.kind {
            TokenKind::Identifier(_) => self.parse_id_statement()?,
            TokenKind::Keyword(Keyword::Begin) => self.parse_begin_end()?,
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::While) => self.parse_while()?,
            TokenKind::Keyword(Keyword::Asm) => self.parse_asm()?,
            TokenKind::Keyword(Keyword::Break) => self.parse_control(LoopControl::Break),
            TokenKind::Keyword(Keyword::Continue) => self.parse_control(LoopControl::Continue),
            _ => return Ok(None),
        };
        Ok(Some(stmt))
    }

    fn parse_id_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.current.line;
        let name = self.expect_identifier("identifier required")?;

        if self.at_operator(Operator::Assign) {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Stmt::new(
                line,
                StmtKind::Assign {
                    target: Reference::new(name),
                    value,
                },
            ));
        }
        if self.at_char('(') {
            let args = self.parse_arguments()?;
            return Ok(Stmt::new(
                line,
                StmtKind::Call(Call {
                    callee: Reference::new(name),
                    args,
                }),
            ));
        }
        Ok(Stmt::new(line, StmtKind::Identifier(Reference::new(name))))
    }

    /// `"(" expr {"," expr} ")"`, entered on the '('.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        loop {
            self.advance(); // consume '(' / ','
            args.push(self.parse_expression()?);
            if !self.at_char(',') {
                break;
            }
        }
        self.expect_char(')', "')' required in function call")?;
        Ok(args)
    }

    fn parse_begin_end(&mut self) -> Result<Stmt, CompileError> {
        let line = self.current.line;
        let mut stmts = Vec::new();
        loop {
            self.advance(); // consume 'begin' / ';'
            if let Some(stmt) = self.parse_statement()? {
                stmts.push(stmt);
            }
            if !self.at_char(';') {
                break;
            }
        }
        self.expect_keyword(Keyword::End, "'end' required")?;
        Ok(Stmt::new(line, StmtKind::Sequence(stmts)))
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let line = self.current.line;
        self.advance(); // consume 'if'
        let cond = self.parse_condition()?;
        self.expect_keyword(Keyword::Then, "'then' required")?;
        let then_branch = self.parse_statement()?.map(Box::new);
        let else_branch = if self.at_keyword(Keyword::Else) {
            self.advance();
            self.parse_statement()?.map(Box::new)
        } else {
            None
        };
        Ok(Stmt::new(
            line,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
        ))
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        let line = self.current.line;
        self.advance(); // consume 'while'
        let cond = self.parse_condition()?;
        self.expect_keyword(Keyword::Do, "'do' required")?;
        let body = self.parse_statement()?.map(Box::new);
        Ok(Stmt::new(line, StmtKind::While { cond, body }))
    }

    /// `asm begin ... end`: tokens are re-serialized separated by spaces,
    /// each ';' ends a line.
    fn parse_asm(&mut self) -> Result<Stmt, CompileError> {
        let line = self.current.line;
        self.advance(); // consume 'asm'
        self.expect_keyword(Keyword::Begin, "'begin' required")?;

        let mut text = String::new();
        let mut words: Vec<String> = Vec::new();
        loop {
            let word = match &self.current.kind {
                TokenKind::Keyword(Keyword::End) => break,
                TokenKind::Identifier(id) => id.clone(),
                TokenKind::Keyword(keyword) => keyword.to_string(),
                TokenKind::Integer(value) => value.to_string(),
                TokenKind::Operator(op) => op.to_string(),
                TokenKind::Char(';') => {
                    text.push_str(&words.join(" "));
                    text.push('\n');
                    words.clear();
                    self.advance();
                    continue;
                }
                TokenKind::Char(c) => c.to_string(),
                TokenKind::End | TokenKind::Error => return self.fail("'end' required"),
            };
            words.push(word);
            self.advance();
        }
        if !words.is_empty() {
            text.push_str(&words.join(" "));
            text.push('\n');
        }
        self.advance(); // consume 'end'
        Ok(Stmt::new(line, StmtKind::Asm(text)))
    }

    fn parse_control(&mut self, control: LoopControl) -> Stmt {
        let line = self.current.line;
        self.advance();
        Stmt::new(line, StmtKind::Control(control))
    }

    /// `cond = "odd" expr | expr relop expr`
    fn parse_condition(&mut self) -> Result<Expr, CompileError> {
        let line = self.current.line;
        if self.at_keyword(Keyword::Odd) {
            self.advance();
            let operand = self.parse_expression()?;
            return Ok(Expr::new(line, ExprKind::Odd(Box::new(operand))));
        }

        let lhs = self.parse_expression()?;
        let op = match self.current_binary_op() {
            Some(op) if op.is_relational() => op,
            _ => return self.fail("relational operator required"),
        };
        self.advance();
        let rhs = self.parse_expression()?;
        Ok(Expr::binary(line, op, lhs, rhs))
    }

    /// `expr = [addsub] term {addsub term}`; a leading sign becomes `0 ± term`.
    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let line = self.current.line;
        let sign = match self.current_binary_op() {
            Some(op @ (BinaryOp::Add | BinaryOp::Sub)) => {
                self.advance();
                Some(op)
            }
            _ => None,
        };

        let mut expr = self.parse_term()?;
        if let Some(op) = sign {
            let zero = Expr::new(line, ExprKind::Number(0));
            expr = Expr::binary(line, op, zero, expr);
        }

        while let Some(op @ (BinaryOp::Add | BinaryOp::Sub)) = self.current_binary_op() {
            self.advance();
            let rhs = self.parse_term()?;
            expr = Expr::binary(line, op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let line = self.current.line;
        let mut expr = self.parse_factor()?;
        while let Some(op @ (BinaryOp::Mul | BinaryOp::Div)) = self.current_binary_op() {
            self.advance();
            let rhs = self.parse_factor()?;
            expr = Expr::binary(line, op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        let line = self.current.line;
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                if self.at_char('(') {
                    let args = self.parse_arguments()?;
                    let call = Call {
                        callee: Reference::new(name),
                        args,
                    };
                    Ok(Expr::new(line, ExprKind::Call(call)))
                } else {
                    Ok(Expr::new(line, ExprKind::Identifier(Reference::new(name))))
                }
            }
            TokenKind::Integer(value) => {
                let value = *value;
                self.advance();
                Ok(Expr::new(line, ExprKind::Number(value)))
            }
            TokenKind::Char('(') => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_char(')', "')' required")?;
                Ok(expr)
            }
            _ => self.fail("invalid factor"),
        }
    }

    // Token helpers

    fn advance(&mut self) {
        self.current = self.scanner.next_token();
    }

    fn at_char(&self, c: char) -> bool {
        self.current.kind == TokenKind::Char(c)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current.kind == TokenKind::Keyword(keyword)
    }

    fn at_operator(&self, op: Operator) -> bool {
        self.current.kind == TokenKind::Operator(op)
    }

    fn current_binary_op(&self) -> Option<BinaryOp> {
        match self.current.kind {
            TokenKind::Operator(op) => BinaryOp::from_operator(op),
            _ => None,
        }
    }

    fn expect_char(&mut self, c: char, message: &str) -> Result<(), CompileError> {
        if !self.at_char(c) {
            return self.fail(message);
        }
        self.advance();
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<(), CompileError> {
        if !self.at_keyword(keyword) {
            return self.fail(message);
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, CompileError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return self.fail(message),
        };
        self.advance();
        Ok(name)
    }

    /// An `Error` token was already counted by the scanner, so it aborts the
    /// parse without a second diagnostic.
    fn fail<T>(&mut self, message: &str) -> Result<T, CompileError> {
        let line = self.current.line;
        if self.current.kind == TokenKind::Error {
            let message = self
                .scanner
                .diagnostics()
                .last()
                .map(|diag| diag.message.clone())
                .unwrap_or_else(|| "invalid token".to_string());
            return Err(CompileError::LexerError { line, message });
        }
        let diag = Diagnostic::new(Stage::Parser, line, message);
        diag.emit();
        self.diagnostics.push(diag);
        Err(CompileError::SyntaxError {
            line,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program, CompileError> {
        Parser::new(source).parse_program()
    }

    fn body(program: &Program) -> &StmtKind {
        &program.block.body.as_ref().expect("statement").kind
    }

    #[test]
    fn leading_sign_becomes_binary_from_zero() {
        let program = parse("x := -y * 2.").unwrap();
        let StmtKind::Assign { value, .. } = body(&program) else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { op, lhs, rhs } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert_eq!(lhs.kind, ExprKind::Number(0));
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn operators_are_left_associative() {
        let program = parse("x := 10 - 4 - 3.").unwrap();
        let StmtKind::Assign { value, .. } = body(&program) else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { lhs, rhs, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(rhs.kind, ExprKind::Number(3));
    }

    #[test]
    fn empty_program_has_no_statement() {
        let program = parse(".").unwrap();
        assert!(program.block.body.is_none());
    }

    #[test]
    fn empty_branches_are_allowed() {
        let program = parse("if 1 = 1 then else .").unwrap();
        let StmtKind::If { then_branch, else_branch, .. } = body(&program) else {
            panic!("expected if");
        };
        assert!(then_branch.is_none());
        assert!(else_branch.is_none());
    }

    #[test]
    fn asm_text_is_reserialized() {
        let program = parse("asm begin mov eax, 1; ret end.").unwrap();
        assert_eq!(*body(&program), StmtKind::Asm("mov eax , 1\nret\n".to_string()));
    }

    #[test]
    fn missing_period_is_a_syntax_error() {
        let mut parser = Parser::new("x := 1");
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, CompileError::SyntaxError { .. }));
        assert_eq!(parser.error_count(), 1);
    }

    #[test]
    fn lexical_error_aborts_without_double_count() {
        let mut parser = Parser::new("x := 0ea.");
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, CompileError::LexerError { .. }));
        assert_eq!(parser.error_count(), 0);
        assert_eq!(parser.total_errors(), 1);
    }

    #[test]
    fn reserved_call_does_not_start_a_statement() {
        let err = parse("call p.").unwrap_err();
        assert!(matches!(err, CompileError::SyntaxError { line: 1, .. }));
    }

    #[test]
    fn condition_requires_relational_operator() {
        let err = parse("while x + 1 do x := 0.").unwrap_err();
        match err {
            CompileError::SyntaxError { message, .. } => {
                assert_eq!(message, "relational operator required")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
