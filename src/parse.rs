//! Análisis sintáctico y construcción del AST.
//!
//! Este es el analizador canónico: descenso recursivo para la
//! estructura del programa y un algoritmo de dos pilas (operandos y
//! operadores pendientes) para expresiones, resolviendo precedencia y
//! asociatividad izquierda con una única tabla de rangos. El
//! reconocedor de [`crate::precedence`] valida el mismo flujo de
//! tokens de forma independiente, pero el AST se construye únicamente
//! aquí.

use std::fmt::{self, Display, Write};

use thiserror::Error;

use crate::lex::{Token, TokenKind};
use crate::semantic::Type;

#[derive(Debug)]
pub struct Program {
    pub block: Block,
}

#[derive(Debug)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    Declaration {
        name: String,
        init: Option<Expr>,
    },

    Assignment {
        target: String,
        value: Expr,
    },

    If {
        condition: Expr,
        true_block: Block,
        false_block: Option<Block>,
    },

    While {
        condition: Expr,
        body: Block,
    },

    Printf {
        format: Expr,
        argument: Option<Expr>,
    },

    Return {
        value: Expr,
    },
}

#[derive(Debug)]
pub enum Expr {
    Number(i32),
    Identifier(String),
    Str(String),

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,

        /// Tipo inferido, escrito una única vez por análisis semántico.
        ty: Option<Type>,
    },
}

/// Operador binario del lenguaje fuente.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Le,
    Eq,
    Gt,
}

impl BinOp {
    fn from_kind(kind: TokenKind) -> Option<BinOp> {
        let op = match kind {
            TokenKind::Add => BinOp::Add,
            TokenKind::Sub => BinOp::Sub,
            TokenKind::Mul => BinOp::Mul,
            TokenKind::Div => BinOp::Div,
            TokenKind::Mod => BinOp::Mod,
            TokenKind::Le => BinOp::Le,
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Gt => BinOp::Gt,
            _ => return None,
        };

        Some(op)
    }

    /// Rango de precedencia: relacionales < aditivos < multiplicativos.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Le | BinOp::Eq | BinOp::Gt => 0,
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 2,
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Gt => ">",
        };

        fmt.write_str(symbol)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("Expected token {expected}, found {found} at token {at}")]
    UnexpectedToken {
        expected: TokenKind,
        found: Token,
        at: usize,
    },

    #[error("Expected a statement, found {0} at token {1}")]
    ExpectedStatement(Token, usize),

    #[error("Expected an expression, found {0} at token {1}")]
    ExpectedExpr(Token, usize),

    #[error("printf format must be a string literal, found {0} at token {1}")]
    ExpectedFormatString(Token, usize),

    #[error("Missing operand in sequence")]
    MissingOperand,

    #[error("Malformed expression: {0} operands remain after draining operators")]
    UnbalancedExpression(usize),

    #[error("Integer literal `{0}` is out of range")]
    IntOutOfRange(String),

    #[error("Unconsumed input after the program, starting with {0} at token {1}")]
    TrailingInput(Token, usize),
}

type Parse<T> = Result<T, SyntaxError>;

/// Construye el AST a partir del flujo completo de tokens.
///
/// El flujo debe terminar en el marcador de fin; [`crate::lex::tokenize`]
/// garantiza esto. Cualquier discrepancia estructural es fatal de
/// inmediato: no hay backtracking ni recuperación de errores.
pub fn parse(tokens: &[Token]) -> Parse<Program> {
    let mut parser = Parser { tokens, cursor: 0 };
    parser.program()
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
}

impl Parser<'_> {
    fn program(&mut self) -> Parse<Program> {
        self.expect(TokenKind::KwInt)?;
        self.expect(TokenKind::KwMain)?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;

        let block = self.block()?;
        if self.current().kind != TokenKind::Eof {
            return Err(SyntaxError::TrailingInput(
                self.current().clone(),
                self.cursor,
            ));
        }

        Ok(Program { block })
    }

    fn block(&mut self) -> Parse<Block> {
        self.expect(TokenKind::LBrace)?;

        let mut statements = Vec::new();
        while !matches!(self.current().kind, TokenKind::RBrace | TokenKind::Eof) {
            statements.push(self.statement()?);
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Block { statements })
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.current().kind {
            TokenKind::KwInt => self.declaration(),
            TokenKind::Id => self.assignment(),
            TokenKind::KwWhile => self.while_statement(),
            TokenKind::KwIf => self.if_statement(),
            TokenKind::Printf => self.printf_statement(),
            TokenKind::KwReturn => self.return_statement(),

            _ => Err(SyntaxError::ExpectedStatement(
                self.current().clone(),
                self.cursor,
            )),
        }
    }

    fn declaration(&mut self) -> Parse<Statement> {
        self.expect(TokenKind::KwInt)?;
        let name = self.expect(TokenKind::Id)?.lexeme.clone();

        let init = if self.current().kind == TokenKind::Assign {
            self.advance();
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(TokenKind::Semicolon)?;
        Ok(Statement::Declaration { name, init })
    }

    fn assignment(&mut self) -> Parse<Statement> {
        let target = self.expect(TokenKind::Id)?.lexeme.clone();
        self.expect(TokenKind::Assign)?;

        let value = self.expression()?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Statement::Assignment { target, value })
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        self.expect(TokenKind::KwIf)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.expression()?;
        self.expect(TokenKind::RParen)?;

        let true_block = self.block()?;
        let false_block = if self.current().kind == TokenKind::KwElse {
            self.advance();
            Some(self.block()?)
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            true_block,
            false_block,
        })
    }

    fn while_statement(&mut self) -> Parse<Statement> {
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.expression()?;
        self.expect(TokenKind::RParen)?;

        let body = self.block()?;
        Ok(Statement::While { condition, body })
    }

    /// Acepta tanto `printf("fmt", expr);` como la forma simplificada
    /// sin paréntesis `printf "fmt";`.
    fn printf_statement(&mut self) -> Parse<Statement> {
        self.expect(TokenKind::Printf)?;

        let (format, argument) = if self.current().kind == TokenKind::LParen {
            self.advance();
            let format = self.format_string()?;

            let argument = if self.current().kind == TokenKind::Comma {
                self.advance();
                Some(self.expression()?)
            } else {
                None
            };

            self.expect(TokenKind::RParen)?;
            (format, argument)
        } else {
            (self.format_string()?, None)
        };

        self.expect(TokenKind::Semicolon)?;
        Ok(Statement::Printf { format, argument })
    }

    fn format_string(&mut self) -> Parse<Expr> {
        let at = self.cursor;
        match self.primary()? {
            format @ Expr::Str(_) => Ok(format),
            _ => Err(SyntaxError::ExpectedFormatString(
                self.tokens[at].clone(),
                at,
            )),
        }
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        self.expect(TokenKind::KwReturn)?;

        let value = self.expression()?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Statement::Return { value })
    }

    /// Algoritmo de dos pilas para expresiones binarias.
    ///
    /// Mientras el siguiente token sea un operador conocido, se aplica
    /// todo operador pendiente de precedencia mayor o igual (desempate
    /// a la izquierda) antes de apilarlo. Al agotar la entrada se
    /// drenan los operadores restantes.
    fn expression(&mut self) -> Parse<Expr> {
        let mut operands = vec![self.primary()?];
        let mut operators: Vec<BinOp> = Vec::new();

        while let Some(op) = BinOp::from_kind(self.current().kind) {
            while operators
                .last()
                .map_or(false, |pending| pending.precedence() >= op.precedence())
            {
                Self::apply(&mut operands, &mut operators)?;
            }

            operators.push(op);
            self.advance();
            operands.push(self.primary()?);
        }

        while !operators.is_empty() {
            Self::apply(&mut operands, &mut operators)?;
        }

        match operands.len() {
            1 => Ok(operands.pop().unwrap()),
            n => Err(SyntaxError::UnbalancedExpression(n)),
        }
    }

    /// Reduce el tope de ambas pilas a un nodo binario.
    fn apply(operands: &mut Vec<Expr>, operators: &mut Vec<BinOp>) -> Parse<()> {
        let op = operators.pop().ok_or(SyntaxError::MissingOperand)?;

        let right = operands.pop().ok_or(SyntaxError::MissingOperand)?;
        let left = operands.pop().ok_or(SyntaxError::MissingOperand)?;

        operands.push(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: None,
        });

        Ok(())
    }

    fn primary(&mut self) -> Parse<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Id => {
                self.advance();
                Ok(Expr::Identifier(token.lexeme))
            }

            TokenKind::Num => {
                self.advance();
                token
                    .lexeme
                    .parse()
                    .map(Expr::Number)
                    .map_err(|_| SyntaxError::IntOutOfRange(token.lexeme))
            }

            TokenKind::Str => {
                self.advance();

                // El lexema incluye las comillas delimitadoras
                let inner = &token.lexeme[1..token.lexeme.len() - 1];
                Ok(Expr::Str(inner.to_owned()))
            }

            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }

            _ => Err(SyntaxError::ExpectedExpr(token, self.cursor)),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Parse<&Token> {
        let found = &self.tokens[self.cursor];
        if found.kind == expected {
            self.cursor += 1;
            Ok(found)
        } else {
            Err(SyntaxError::UnexpectedToken {
                expected,
                found: found.clone(),
                at: self.cursor,
            })
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    fn advance(&mut self) {
        // El marcador de fin nunca se consume
        if self.current().kind != TokenKind::Eof {
            self.cursor += 1;
        }
    }
}

impl Program {
    /// Representación del árbol con glifos de cajas, para inspección
    /// desde la CLI.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        out.push_str("ProgramNode\n");
        push_block(&mut out, &self.block, "");
        out
    }
}

fn push_block(out: &mut String, block: &Block, indent: &str) {
    let _ = writeln!(out, "{}└── BlockNode", indent);

    let indent = format!("{}    ", indent);
    let count = block.statements.len();
    for (i, statement) in block.statements.iter().enumerate() {
        push_statement(out, statement, &indent, i + 1 == count);
    }
}

fn push_statement(out: &mut String, statement: &Statement, indent: &str, is_last: bool) {
    let branch = if is_last { "└── " } else { "├── " };
    let child_indent = format!("{}{}", indent, if is_last { "    " } else { "│   " });

    match statement {
        Statement::Declaration { name, init } => {
            let _ = writeln!(out, "{}{}DeclarationNode(int {})", indent, branch, name);
            if let Some(init) = init {
                push_expr(out, init, &child_indent, true);
            }
        }

        Statement::Assignment { target, value } => {
            let _ = writeln!(out, "{}{}AssignmentNode({})", indent, branch, target);
            push_expr(out, value, &child_indent, true);
        }

        Statement::If {
            condition,
            true_block,
            false_block,
        } => {
            let _ = writeln!(out, "{}{}IfNode", indent, branch);
            push_expr(out, condition, &child_indent, false);
            if let Some(false_block) = false_block {
                push_branch_block(out, true_block, &child_indent, false);
                push_branch_block(out, false_block, &child_indent, true);
            } else {
                push_branch_block(out, true_block, &child_indent, true);
            }
        }

        Statement::While { condition, body } => {
            let _ = writeln!(out, "{}{}WhileNode", indent, branch);
            push_expr(out, condition, &child_indent, false);
            push_branch_block(out, body, &child_indent, true);
        }

        Statement::Printf { format, argument } => {
            let _ = writeln!(out, "{}{}PrintfNode", indent, branch);
            push_expr(out, format, &child_indent, argument.is_none());
            if let Some(argument) = argument {
                push_expr(out, argument, &child_indent, true);
            }
        }

        Statement::Return { value } => {
            let _ = writeln!(out, "{}{}ReturnNode", indent, branch);
            push_expr(out, value, &child_indent, true);
        }
    }
}

fn push_branch_block(out: &mut String, block: &Block, indent: &str, is_last: bool) {
    let branch = if is_last { "└── " } else { "├── " };
    let _ = writeln!(out, "{}{}BlockNode", indent, branch);

    let indent = format!("{}{}", indent, if is_last { "    " } else { "│   " });
    let count = block.statements.len();
    for (i, statement) in block.statements.iter().enumerate() {
        push_statement(out, statement, &indent, i + 1 == count);
    }
}

fn push_expr(out: &mut String, expr: &Expr, indent: &str, is_last: bool) {
    let branch = if is_last { "└── " } else { "├── " };

    match expr {
        Expr::Number(value) => {
            let _ = writeln!(out, "{}{}Number({})", indent, branch, value);
        }

        Expr::Identifier(name) => {
            let _ = writeln!(out, "{}{}Identifier({})", indent, branch, name);
        }

        Expr::Str(content) => {
            let _ = writeln!(out, "{}{}String(\"{}\")", indent, branch, content);
        }

        Expr::Binary {
            op, left, right, ..
        } => {
            let _ = writeln!(out, "{}{}BinaryOp({})", indent, branch, op);
            let indent = format!("{}{}", indent, if is_last { "    " } else { "│   " });
            push_expr(out, left, &indent, false);
            push_expr(out, right, &indent, true);
        }
    }
}
