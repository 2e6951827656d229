use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOperator, Block, BreakpointCommand, DebugCommand, Expression,
    FunctionDecl, MemoryCommand, Program, SpawnCommand, Statement, StatementKind, UnaryOperator,
};
use crate::lexer::{self, Lexer};
use crate::token::{Span, Token, TokenKind};

pub mod error;

pub use error::{ParseError, ParseResult};

/// Recursive-descent parser over a token vector.
///
/// Statement keywords each have a dedicated production; expressions use
/// precedence climbing over `binary_precedence`. The parser also tracks
/// function and loop nesting so misplaced `return`/`break`/`continue` are
/// rejected before anything runs.
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    function_depth: usize,
    loop_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::EOF) {
            let span = tokens.last().map(|token| token.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, span));
        }
        Self {
            tokens,
            position: 0,
            function_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::EOF) {
            if self.consume_separators() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            statements: statements.into(),
        })
    }

    /// Parses exactly one statement, as an interactive front-end submits them.
    pub fn parse_single(mut self) -> ParseResult<Statement> {
        self.consume_separators();
        let statement = self.parse_statement()?;
        self.consume_separators();
        if !self.check(&TokenKind::EOF) {
            return Err(self.error("end of input"));
        }
        Ok(statement)
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.current().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Function => {
                let span = self.current().span;
                let decl = self.parse_function_decl()?;
                Ok(Statement::new(StatementKind::FunctionDef(decl), span))
            }
            TokenKind::Class => self.parse_class(),
            _ => {
                let statement = self.parse_simple_statement()?;
                self.expect_statement_end()?;
                Ok(statement)
            }
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        // `if` and `elif` share this production; an `elif` chain nests as the
        // else-branch of the preceding test.
        let span = self.advance().span;
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body: Block = if self.check(&TokenKind::Elif) {
            Rc::from(vec![self.parse_if()?])
        } else if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Rc::from(Vec::new())
        };
        Ok(Statement::new(
            StatementKind::If {
                condition,
                then_body,
                else_body,
            },
            span,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        let span = self.advance().span;
        let condition = self.parse_expression()?;
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        Ok(Statement::new(
            StatementKind::While {
                condition,
                body: body?,
            },
            span,
        ))
    }

    fn parse_function_decl(&mut self) -> ParseResult<Rc<FunctionDecl>> {
        let span = self.expect(&TokenKind::Function, "function")?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, ")")?;

        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loop_depth;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
            span,
        }))
    }

    fn parse_class(&mut self) -> ParseResult<Statement> {
        let span = self.advance().span;
        let name = self.expect_identifier()?;
        let parent = if self.eat(&TokenKind::Extends) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(&TokenKind::Colon, ":")?;
        self.expect(&TokenKind::Newline, "newline")?;
        while self.eat(&TokenKind::Newline) {}
        self.expect(&TokenKind::Indent, "indent")?;

        let mut methods = Vec::new();
        while !matches!(self.current().kind, TokenKind::Dedent | TokenKind::EOF) {
            if self.consume_separators() {
                continue;
            }
            match self.current().kind {
                TokenKind::Function => methods.push(self.parse_function_decl()?),
                TokenKind::Pass => {
                    self.advance();
                    self.expect_statement_end()?;
                }
                _ => {
                    let span = self.current().span;
                    return Err(ParseError::InvalidClassBody {
                        line: span.line,
                        column: span.column,
                    });
                }
            }
        }
        self.expect(&TokenKind::Dedent, "dedent")?;

        Ok(Statement::new(
            StatementKind::ClassDef {
                name,
                parent,
                methods,
            },
            span,
        ))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect(&TokenKind::Colon, ":")?;
        self.expect(&TokenKind::Newline, "newline")?;
        while self.eat(&TokenKind::Newline) {}
        self.expect(&TokenKind::Indent, "indent")?;

        let mut body = Vec::new();
        while !matches!(self.current().kind, TokenKind::Dedent | TokenKind::EOF) {
            if self.consume_separators() {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::Dedent, "dedent")?;
        Ok(body.into())
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        let span = self.current().span;
        let kind = match self.current().kind {
            TokenKind::Return => {
                self.advance();
                if self.function_depth == 0 {
                    return Err(misplaced("return", "function", span));
                }
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                StatementKind::Return(value)
            }
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.advance().kind == TokenKind::Break;
                let keyword = if is_break { "break" } else { "continue" };
                if self.loop_depth == 0 {
                    return Err(misplaced(keyword, "loop", span));
                }
                if is_break {
                    StatementKind::Break
                } else {
                    StatementKind::Continue
                }
            }
            TokenKind::Pass => {
                self.advance();
                StatementKind::Pass
            }
            TokenKind::Memory => self.parse_memory_command()?,
            TokenKind::Thread => {
                self.advance();
                self.expect_verb("thread", &["start"])?;
                StatementKind::Thread(self.parse_spawn()?)
            }
            TokenKind::Task => self.parse_task_command()?,
            TokenKind::Process => {
                self.advance();
                self.expect_verb("process", &["start"])?;
                StatementKind::Process(self.parse_spawn()?)
            }
            TokenKind::Yield => {
                self.advance();
                StatementKind::Yield
            }
            TokenKind::Sleep => {
                self.advance();
                StatementKind::Sleep(self.parse_expression()?)
            }
            TokenKind::Join => {
                self.advance();
                let handle = self.parse_expression()?;
                let timeout = self.parse_option("timeout")?;
                let bind = self.parse_binding()?;
                StatementKind::Join {
                    handle,
                    timeout,
                    bind,
                }
            }
            TokenKind::Cancel => {
                self.advance();
                StatementKind::Cancel(self.parse_expression()?)
            }
            TokenKind::Lock => {
                self.advance();
                StatementKind::Lock(self.expect_identifier()?)
            }
            TokenKind::Unlock => {
                self.advance();
                StatementKind::Unlock(self.expect_identifier()?)
            }
            TokenKind::Debug => self.parse_debug_command()?,
            TokenKind::Breakpoint => self.parse_breakpoint_command()?,
            _ => {
                let expr = self.parse_expression()?;
                if self.eat(&TokenKind::Equal) {
                    let target = match &*expr {
                        Expression::Identifier(name) => AssignTarget::Name(name.clone()),
                        Expression::Member { object, name } => AssignTarget::Attribute {
                            object: object.clone(),
                            name: name.clone(),
                        },
                        _ => {
                            return Err(ParseError::InvalidAssignmentTarget {
                                line: span.line,
                                column: span.column,
                            });
                        }
                    };
                    let value = self.parse_expression()?;
                    StatementKind::Assign { target, value }
                } else {
                    StatementKind::Expr(expr)
                }
            }
        };
        Ok(Statement::new(kind, span))
    }

    fn parse_memory_command(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let verb = self.expect_verb("memory", &["allocate", "write", "read", "free", "wait"])?;
        let buffer = self.expect_identifier()?;
        let command = match verb {
            "allocate" => MemoryCommand::Allocate {
                buffer,
                size: self.parse_expression()?,
            },
            "write" => {
                let index = self.parse_expression()?;
                let value = self.parse_expression()?;
                MemoryCommand::Write {
                    buffer,
                    index,
                    value,
                }
            }
            "read" => {
                let index = self.parse_expression()?;
                let bind = self.parse_binding()?;
                MemoryCommand::Read {
                    buffer,
                    index,
                    bind,
                }
            }
            "free" => MemoryCommand::Free { buffer },
            _ => {
                let index = self.parse_expression()?;
                let timeout = self.parse_option("timeout")?;
                MemoryCommand::Wait {
                    buffer,
                    index,
                    timeout,
                }
            }
        };
        Ok(StatementKind::Memory(command))
    }

    fn parse_task_command(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect_verb("task", &["schedule"])?;
        let callee = self.parse_expression()?;
        let mut priority = None;
        let mut delay = None;
        loop {
            if priority.is_none()
                && let Some(value) = self.parse_option("priority")?
            {
                priority = Some(value);
            } else if delay.is_none()
                && let Some(value) = self.parse_option("after")?
            {
                delay = Some(value);
            } else {
                break;
            }
        }
        let bind = self.parse_binding()?;
        let spawn = self.spawn_from(callee, bind)?;
        Ok(StatementKind::Task {
            spawn,
            priority,
            delay,
        })
    }

    fn parse_spawn(&mut self) -> ParseResult<SpawnCommand> {
        let callee = self.parse_expression()?;
        let bind = self.parse_binding()?;
        self.spawn_from(callee, bind)
    }

    fn spawn_from(
        &self,
        expr: Rc<Expression>,
        bind: Option<String>,
    ) -> ParseResult<SpawnCommand> {
        match &*expr {
            Expression::Call { callee, args } => Ok(SpawnCommand {
                callee: callee.clone(),
                args: args.clone(),
                bind,
            }),
            _ => Err(self.error("function call")),
        }
    }

    fn parse_debug_command(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let token = self.advance();
        let command = match token.kind {
            TokenKind::Continue => DebugCommand::Continue,
            TokenKind::Memory => DebugCommand::Memory,
            TokenKind::Identifier("on") => DebugCommand::On,
            TokenKind::Identifier("off") => DebugCommand::Off,
            TokenKind::Identifier("step") => DebugCommand::Step,
            TokenKind::Identifier("over") => DebugCommand::Over,
            TokenKind::Identifier("variables") => DebugCommand::Variables,
            TokenKind::Identifier("callstack") => DebugCommand::CallStack,
            other => {
                return Err(ParseError::UnknownCommand {
                    command: "debug",
                    verb: other.describe(),
                    line: token.span.line,
                    column: token.span.column,
                });
            }
        };
        Ok(StatementKind::Debug(command))
    }

    fn parse_breakpoint_command(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let verb = self.expect_verb(
            "breakpoint",
            &["set", "clear", "enable", "disable", "list"],
        )?;
        let command = match verb {
            "list" => BreakpointCommand::List,
            "clear" if self.check(&TokenKind::Identifier("all")) => {
                self.advance();
                BreakpointCommand::ClearAll
            }
            "clear" => BreakpointCommand::Clear(self.expect_line_number()?),
            "set" => BreakpointCommand::Set(self.expect_line_number()?),
            "enable" => BreakpointCommand::Enable(self.expect_line_number()?),
            _ => BreakpointCommand::Disable(self.expect_line_number()?),
        };
        Ok(StatementKind::Breakpoint(command))
    }

    /// `WORD expr` where `WORD` is a contextual identifier such as `timeout`.
    fn parse_option(&mut self, word: &str) -> ParseResult<Option<Rc<Expression>>> {
        if matches!(self.current().kind, TokenKind::Identifier(name) if name == word) {
            self.advance();
            return Ok(Some(self.parse_expression()?));
        }
        Ok(None)
    }

    fn parse_binding(&mut self) -> ParseResult<Option<String>> {
        if self.eat(&TokenKind::As) {
            return Ok(Some(self.expect_identifier()?));
        }
        Ok(None)
    }

    fn parse_expression(&mut self) -> ParseResult<Rc<Expression>> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Rc<Expression>> {
        let mut left = self.parse_unary()?;
        while let Some((precedence, op)) = binary_precedence(&self.current().kind) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Rc::new(Expression::BinaryOp { left, op, right });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Rc<Expression>> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Not | TokenKind::Bang => UnaryOperator::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Rc::new(Expression::Unary { op, operand }))
    }

    fn parse_postfix(&mut self) -> ParseResult<Rc<Expression>> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::LParen) {
                let args = self.parse_arguments()?;
                expr = Rc::new(Expression::Call { callee: expr, args });
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_identifier()?;
                expr = Rc::new(Expression::Member { object: expr, name });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Rc<Expression>>> {
        self.expect(&TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, ")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Rc<Expression>> {
        let expr = match self.current().kind {
            TokenKind::Integer(value) => Expression::Integer(value),
            TokenKind::Float(value) => Expression::Float(value),
            TokenKind::String(raw) => Expression::String(lexer::unescape(raw)),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::Null => Expression::Null,
            TokenKind::Identifier(name) => Expression::Identifier(name.to_string()),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen, ")")?;
                return Ok(expr);
            }
            TokenKind::New => {
                self.advance();
                let class = self.expect_identifier()?;
                let args = self.parse_arguments()?;
                return Ok(Rc::new(Expression::New { class, args }));
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(Rc::new(expr))
    }

    /// Skips blank-line and `;` separators, reporting whether any were seen.
    fn consume_separators(&mut self) -> bool {
        let mut consumed = false;
        while matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            consumed = true;
            self.advance();
        }
        consumed
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::EOF | TokenKind::Dedent
        )
    }

    fn expect_statement_end(&mut self) -> ParseResult<()> {
        match self.current().kind {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::EOF | TokenKind::Dedent => Ok(()),
            _ => Err(self.error("end of statement")),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current().kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect_verb(
        &mut self,
        command: &'static str,
        verbs: &[&'static str],
    ) -> ParseResult<&'static str> {
        let token = self.current().clone();
        if let TokenKind::Identifier(word) = token.kind
            && let Some(verb) = verbs.iter().find(|verb| **verb == word)
        {
            self.advance();
            return Ok(*verb);
        }
        Err(ParseError::UnknownCommand {
            command,
            verb: token.kind.describe(),
            line: token.span.line,
            column: token.span.column,
        })
    }

    fn expect_line_number(&mut self) -> ParseResult<usize> {
        if let TokenKind::Integer(line) = self.current().kind
            && line > 0
        {
            self.advance();
            return Ok(line as usize);
        }
        Err(self.error("line number"))
    }

    fn expect(&mut self, kind: &TokenKind<'a>, expected: &str) -> ParseResult<Token<'a>> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn eat(&mut self, kind: &TokenKind<'a>) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: &TokenKind<'a>) -> bool {
        &self.current().kind == kind
    }

    fn current(&self) -> &Token<'a> {
        // `new` guarantees a trailing EOF; stay on it.
        let index = self.position.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.describe(),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

fn misplaced(keyword: &'static str, context: &'static str, span: Span) -> ParseError {
    ParseError::Misplaced {
        keyword,
        context,
        line: span.line,
        column: span.column,
    }
}

/// Fixed precedence table, loosest first: logical, comparison, additive,
/// multiplicative. Unary operators bind tighter than all of these.
fn binary_precedence(kind: &TokenKind<'_>) -> Option<(u8, BinaryOperator)> {
    let entry = match kind {
        TokenKind::Or | TokenKind::PipePipe => (1, BinaryOperator::Or),
        TokenKind::And | TokenKind::AmpAmp => (2, BinaryOperator::And),
        TokenKind::EqualEqual => (3, BinaryOperator::Equal),
        TokenKind::BangEqual => (3, BinaryOperator::NotEqual),
        TokenKind::Less => (3, BinaryOperator::Less),
        TokenKind::LessEqual => (3, BinaryOperator::LessEqual),
        TokenKind::Greater => (3, BinaryOperator::Greater),
        TokenKind::GreaterEqual => (3, BinaryOperator::GreaterEqual),
        TokenKind::Plus => (4, BinaryOperator::Add),
        TokenKind::Minus => (4, BinaryOperator::Sub),
        TokenKind::Star => (5, BinaryOperator::Mul),
        TokenKind::Slash => (5, BinaryOperator::Div),
        TokenKind::Percent => (5, BinaryOperator::Mod),
        _ => return None,
    };
    Some(entry)
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

pub fn parse(input: &str) -> ParseResult<Program> {
    let tokens = lexer::tokenize(input)?;
    parse_tokens(tokens)
}

/// Parses a single statement, for front-ends that submit one at a time.
pub fn parse_interactive(input: &str) -> ParseResult<Statement> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    Parser::new(tokens).parse_single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn ident(name: &str) -> Rc<Expression> {
        Rc::new(Expression::Identifier(name.to_string()))
    }

    fn int(value: i64) -> Rc<Expression> {
        Rc::new(Expression::Integer(value))
    }

    fn kinds(program: &Program) -> Vec<&StatementKind> {
        program.statements.iter().map(|s| &s.kind).collect()
    }

    #[test]
    fn parses_function_definition_and_call() {
        let input = indoc! {"
            function add(a, b):
                return a + b
            print(add(1, 2))
        "};
        let program = parse(input).expect("parse failed");
        assert_eq!(program.statements.len(), 2);

        let StatementKind::FunctionDef(decl) = &program.statements[0].kind else {
            panic!("expected function definition");
        };
        assert_eq!(decl.name, "add");
        assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            decl.body[0].kind,
            StatementKind::Return(Some(Rc::new(Expression::BinaryOp {
                left: ident("a"),
                op: BinaryOperator::Add,
                right: ident("b"),
            })))
        );
        assert_eq!(program.statements[1].line(), 3);
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive_and_comparison() {
        let program = parse("x = 1 + 2 * 3 < 10 and true").expect("parse failed");
        let expected = Rc::new(Expression::BinaryOp {
            left: Rc::new(Expression::BinaryOp {
                left: Rc::new(Expression::BinaryOp {
                    left: int(1),
                    op: BinaryOperator::Add,
                    right: Rc::new(Expression::BinaryOp {
                        left: int(2),
                        op: BinaryOperator::Mul,
                        right: int(3),
                    }),
                }),
                op: BinaryOperator::Less,
                right: int(10),
            }),
            op: BinaryOperator::And,
            right: Rc::new(Expression::Boolean(true)),
        });
        assert_eq!(
            kinds(&program),
            vec![&StatementKind::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: expected,
            }]
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let program = parse("x = 10 - 3 - 2").expect("parse failed");
        let StatementKind::Assign { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        let Expression::BinaryOp { left, right, .. } = &**value else {
            panic!("expected binary op");
        };
        assert_eq!(**right, Expression::Integer(2));
        assert!(matches!(**left, Expression::BinaryOp { .. }));
    }

    #[test]
    fn elif_nests_into_else_branch() {
        let input = indoc! {"
            if a:
                x = 1
            elif b:
                x = 2
            else:
                x = 3
        "};
        let program = parse(input).expect("parse failed");
        let StatementKind::If { else_body, .. } = &program.statements[0].kind else {
            panic!("expected if");
        };
        let StatementKind::If { else_body: inner_else, .. } = &else_body[0].kind else {
            panic!("expected nested if");
        };
        assert_eq!(inner_else.len(), 1);
        assert_eq!(else_body[0].line(), 3);
    }

    #[test]
    fn parses_class_with_parent_and_methods() {
        let input = indoc! {"
            class Derived extends Base:
                function greet():
                    return \"derived\"

                function init(x):
                    self.x = x
        "};
        let program = parse(input).expect("parse failed");
        let StatementKind::ClassDef {
            name,
            parent,
            methods,
        } = &program.statements[0].kind
        else {
            panic!("expected class");
        };
        assert_eq!(name, "Derived");
        assert_eq!(parent.as_deref(), Some("Base"));
        let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "init"]);
        assert!(matches!(
            &methods[1].body[0].kind,
            StatementKind::Assign {
                target: AssignTarget::Attribute { .. },
                ..
            }
        ));
    }

    #[test]
    fn parses_memory_commands_as_positional_forms() {
        let program =
            parse("memory allocate arr 3; memory write arr 5 1; memory read arr i + 1 as v")
                .expect("parse failed");
        assert_eq!(
            kinds(&program),
            vec![
                &StatementKind::Memory(MemoryCommand::Allocate {
                    buffer: "arr".to_string(),
                    size: int(3),
                }),
                &StatementKind::Memory(MemoryCommand::Write {
                    buffer: "arr".to_string(),
                    index: int(5),
                    value: int(1),
                }),
                &StatementKind::Memory(MemoryCommand::Read {
                    buffer: "arr".to_string(),
                    index: Rc::new(Expression::BinaryOp {
                        left: ident("i"),
                        op: BinaryOperator::Add,
                        right: int(1),
                    }),
                    bind: Some("v".to_string()),
                }),
            ]
        );
    }

    #[test]
    fn parses_task_options_in_any_order() {
        let program =
            parse("task schedule work(1) after 2 priority 3 as t").expect("parse failed");
        let StatementKind::Task {
            spawn,
            priority,
            delay,
        } = &program.statements[0].kind
        else {
            panic!("expected task");
        };
        assert_eq!(spawn.callee, ident("work"));
        assert_eq!(spawn.args, vec![int(1)]);
        assert_eq!(spawn.bind.as_deref(), Some("t"));
        assert_eq!(priority.as_ref(), Some(&int(3)));
        assert_eq!(delay.as_ref(), Some(&int(2)));
    }

    #[test]
    fn parses_concurrency_and_debug_commands() {
        let input = indoc! {"
            thread start worker(1) as t
            join t timeout 5 as r
            cancel t
            lock m
            unlock m
            yield
            sleep 2
            debug on
            debug continue
            breakpoint set 4
            breakpoint clear all
        "};
        let program = parse(input).expect("parse failed");
        let statements = kinds(&program);
        assert!(matches!(statements[0], StatementKind::Thread(SpawnCommand { bind: Some(_), .. })));
        assert!(matches!(
            statements[1],
            StatementKind::Join {
                timeout: Some(_),
                bind: Some(_),
                ..
            }
        ));
        assert!(matches!(statements[2], StatementKind::Cancel(_)));
        assert_eq!(statements[3], &StatementKind::Lock("m".to_string()));
        assert_eq!(statements[4], &StatementKind::Unlock("m".to_string()));
        assert_eq!(statements[5], &StatementKind::Yield);
        assert!(matches!(statements[6], StatementKind::Sleep(_)));
        assert_eq!(statements[7], &StatementKind::Debug(DebugCommand::On));
        assert_eq!(statements[8], &StatementKind::Debug(DebugCommand::Continue));
        assert_eq!(
            statements[9],
            &StatementKind::Breakpoint(BreakpointCommand::Set(4))
        );
        assert_eq!(
            statements[10],
            &StatementKind::Breakpoint(BreakpointCommand::ClearAll)
        );
    }

    #[test]
    fn parses_new_member_access_and_method_call() {
        let program = parse("d = new Derived(1).greet()").expect("parse failed");
        let StatementKind::Assign { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        let Expression::Call { callee, args } = &**value else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert!(matches!(
            &**callee,
            Expression::Member { object, name }
                if name == "greet" && matches!(&**object, Expression::New { .. })
        ));
    }

    #[test]
    fn rejects_return_outside_function() {
        let err = parse("return 1\n").expect_err("expected parse error");
        assert_eq!(
            err,
            ParseError::Misplaced {
                keyword: "return",
                context: "function",
                line: 1,
                column: 1,
            }
        );
    }

    #[test]
    fn rejects_break_in_function_nested_in_loop() {
        let input = indoc! {"
            while true:
                function f():
                    break
        "};
        let err = parse(input).expect_err("expected parse error");
        assert!(matches!(err, ParseError::Misplaced { keyword: "break", .. }));
    }

    #[test]
    fn rejects_unexpected_token_with_position() {
        let err = parse("x = (1 + 2\n").expect_err("expected parse error");
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: ")".to_string(),
                found: "newline".to_string(),
                line: 1,
                column: 11,
            }
        );
    }

    #[test]
    fn rejects_unknown_command_verb() {
        let err = parse("memory resize arr 4\n").expect_err("expected parse error");
        assert!(matches!(
            err,
            ParseError::UnknownCommand {
                command: "memory",
                ..
            }
        ));
    }

    #[test]
    fn surfaces_inconsistent_dedent_as_parse_error() {
        let err = parse("if x:\n    a = 1\n  b = 2\n").expect_err("expected parse error");
        assert!(matches!(err, ParseError::Lex(_)));
        assert!(err.to_string().contains("Inconsistent dedent"));
    }

    #[test]
    fn parses_single_interactive_statement() {
        let statement = parse_interactive("x = 1\n").expect("parse failed");
        assert!(matches!(statement.kind, StatementKind::Assign { .. }));
        let err = parse_interactive("x = 1; y = 2").expect_err("expected single statement");
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
