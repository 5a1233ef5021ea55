//! Análisis semántico.
//!
//! Recorre el AST exactamente una vez en profundidad, manteniendo una
//! pila de ámbitos léxicos y verificando las reglas de tipos del
//! lenguaje. El único tipo declarable es `INT`; los literales de
//! cadena existen solamente como formato de `printf`. La primera
//! violación aborta el análisis. Como efecto del recorrido, cada nodo
//! binario queda anotado con su tipo inferido.

use std::collections::HashMap;
use std::fmt::{self, Display};

use thiserror::Error;

use crate::parse::{Block, Expr, Program, Statement};

/// Tipo inferible de una expresión.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Str,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("INT"),
            Type::Str => fmt.write_str("STRING"),
        }
    }
}

/// Entrada de la tabla de símbolos.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
}

pub type Semantic<T> = Result<T, SemanticError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Symbol `{0}` is undefined")]
    Undefined(String),

    #[error("Variable `{0}` is already declared in this scope")]
    Redeclared(String),

    #[error("Type mismatch {context}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: Type,
        found: Type,
        context: String,
    },
}

/// Pila de ámbitos léxicos, el más interno de último.
///
/// Se construye con el ámbito global ya abierto. La búsqueda procede
/// del ámbito más interno hacia afuera; la declaración ocurre siempre
/// en el más interno.
pub struct ScopeTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        ScopeTable {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit(&mut self) {
        self.scopes.pop();
    }

    /// Cantidad de ámbitos actualmente abiertos.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declara un símbolo en el ámbito actual.
    pub fn declare(&mut self, symbol: Symbol) -> Semantic<()> {
        let scope = self
            .scopes
            .last_mut()
            .expect("scope table without active scope");

        if scope.contains_key(&symbol.name) {
            return Err(SemanticError::Redeclared(symbol.name));
        }

        scope.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Busca un símbolo del ámbito más interno hacia el más externo.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        ScopeTable::new()
    }
}

/// Verifica el programa completo y anota los tipos inferidos.
pub fn analyze(program: &mut Program) -> Semantic<()> {
    let mut analyzer = Analyzer {
        scopes: ScopeTable::new(),
    };

    analyzer.block(&mut program.block)
}

struct Analyzer {
    scopes: ScopeTable,
}

impl Analyzer {
    fn block(&mut self, block: &mut Block) -> Semantic<()> {
        self.scoped(|this| {
            for statement in &mut block.statements {
                this.statement(statement)?;
            }

            Ok(())
        })
    }

    /// Ejecuta la visita dentro de un ámbito nuevo.
    ///
    /// La salida del ámbito ocurre en toda ruta de retorno, incluida
    /// la propagación de errores.
    fn scoped<T>(&mut self, visit: impl FnOnce(&mut Self) -> Semantic<T>) -> Semantic<T> {
        self.scopes.enter();
        let result = visit(self);
        self.scopes.exit();

        result
    }

    fn statement(&mut self, statement: &mut Statement) -> Semantic<()> {
        match statement {
            Statement::Declaration { name, init } => {
                if let Some(init) = init {
                    let init_ty = self.expr(init)?;
                    expect(
                        Type::Int,
                        init_ty,
                        format!("in the declaration of `{}`", name),
                    )?;
                }

                self.scopes.declare(Symbol {
                    name: name.clone(),
                    ty: Type::Int,
                })
            }

            Statement::Assignment { target, value } => {
                let target_ty = self.identifier(target)?;
                let value_ty = self.expr(value)?;

                expect(
                    target_ty,
                    value_ty,
                    format!("in the assignment to `{}`", target),
                )
            }

            Statement::If {
                condition,
                true_block,
                false_block,
            } => {
                // No hay tipo booleano: cero/no-cero hace de falso/verdadero
                let condition_ty = self.expr(condition)?;
                expect(Type::Int, condition_ty, "in the if condition")?;

                self.block(true_block)?;
                if let Some(false_block) = false_block {
                    self.block(false_block)?;
                }

                Ok(())
            }

            Statement::While { condition, body } => {
                let condition_ty = self.expr(condition)?;
                expect(Type::Int, condition_ty, "in the while condition")?;

                self.block(body)
            }

            Statement::Printf { format, argument } => {
                let format_ty = self.expr(format)?;
                expect(Type::Str, format_ty, "in the first printf argument")?;

                if let Some(argument) = argument {
                    let argument_ty = self.expr(argument)?;
                    expect(Type::Int, argument_ty, "in the second printf argument")?;
                }

                Ok(())
            }

            Statement::Return { value } => {
                let value_ty = self.expr(value)?;
                expect(Type::Int, value_ty, "in the return statement")
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Semantic<Type> {
        match expr {
            Expr::Number(_) => Ok(Type::Int),
            Expr::Str(_) => Ok(Type::Str),
            Expr::Identifier(name) => self.identifier(name),

            Expr::Binary {
                op,
                left,
                right,
                ty,
            } => {
                let left_ty = self.expr(left)?;
                let right_ty = self.expr(right)?;

                expect(Type::Int, left_ty, format!("left of operator `{}`", op))?;
                expect(Type::Int, right_ty, format!("right of operator `{}`", op))?;

                // Toda operación binaria produce INT, comparaciones incluidas
                *ty = Some(Type::Int);
                Ok(Type::Int)
            }
        }
    }

    fn identifier(&self, name: &str) -> Semantic<Type> {
        self.scopes
            .lookup(name)
            .map(|symbol| symbol.ty)
            .ok_or_else(|| SemanticError::Undefined(name.to_owned()))
    }
}

fn expect(expected: Type, found: Type, context: impl Into<String>) -> Semantic<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SemanticError::TypeMismatch {
            expected,
            found,
            context: context.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::parse::{parse, BinOp};

    fn analyze_source(source: &str) -> Semantic<Program> {
        let mut program = parse(&tokenize(source).unwrap()).unwrap();
        analyze(&mut program).map(|()| program)
    }

    #[test]
    fn accepts_a_well_typed_program() {
        assert!(analyze_source("int main() { int x = 5; x = x + 1; return x; }").is_ok());
    }

    #[test]
    fn undeclared_identifier_is_reported_by_name() {
        let result = analyze_source("int main() { x = 1; return 0; }");
        match result {
            Err(SemanticError::Undefined(name)) => assert_eq!(name, "x"),
            other => panic!("se esperaba Undefined, se obtuvo {:?}", other.err()),
        }
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_rejected() {
        let result = analyze_source("int main() { int x; int x; return 0; }");
        match result {
            Err(SemanticError::Redeclared(name)) => assert_eq!(name, "x"),
            other => panic!("se esperaba Redeclared, se obtuvo {:?}", other.err()),
        }
    }

    #[test]
    fn shadowing_in_an_inner_scope_is_allowed() {
        let source = "int main() { int x = 1; if (x > 0) { int x = 2; x = 3; } return x; }";
        assert!(analyze_source(source).is_ok());
    }

    #[test]
    fn inner_declarations_do_not_leak_out() {
        let source = "int main() { if (1 > 0) { int y = 1; } y = 2; return 0; }";
        assert!(matches!(
            analyze_source(source),
            Err(SemanticError::Undefined(_))
        ));
    }

    #[test]
    fn string_cannot_be_assigned_to_an_int_variable() {
        let result = analyze_source(r#"int main() { int x; x = "hola"; return 0; }"#);
        assert!(matches!(
            result,
            Err(SemanticError::TypeMismatch {
                expected: Type::Int,
                found: Type::Str,
                ..
            })
        ));
    }

    #[test]
    fn printf_second_argument_must_be_int() {
        let result = analyze_source(r#"int main() { printf("%d", "hola"); return 0; }"#);
        assert!(matches!(result, Err(SemanticError::TypeMismatch { .. })));
    }

    #[test]
    fn binary_nodes_are_annotated_with_their_type() {
        let program = analyze_source("int main() { int x = 1 + 2; return x; }").unwrap();

        match &program.block.statements[0] {
            Statement::Declaration {
                init: Some(Expr::Binary { op, ty, .. }),
                ..
            } => {
                assert_eq!(*op, BinOp::Add);
                assert_eq!(*ty, Some(Type::Int));
            }

            other => panic!("AST inesperado: {:?}", other),
        }
    }

    #[test]
    fn scope_depth_is_restored_after_a_failing_visit() {
        let mut program =
            parse(&tokenize("int main() { if (1 > 0) { y = 1; } return 0; }").unwrap()).unwrap();

        let mut analyzer = Analyzer {
            scopes: ScopeTable::new(),
        };

        assert!(analyzer.block(&mut program.block).is_err());
        assert_eq!(analyzer.scopes.depth(), 1);
    }

    #[test]
    fn lookup_prefers_the_innermost_scope() {
        let mut scopes = ScopeTable::new();
        scopes
            .declare(Symbol {
                name: String::from("x"),
                ty: Type::Int,
            })
            .unwrap();

        scopes.enter();
        scopes
            .declare(Symbol {
                name: String::from("x"),
                ty: Type::Str,
            })
            .unwrap();

        assert_eq!(scopes.lookup("x").map(|s| s.ty), Some(Type::Str));
        scopes.exit();
        assert_eq!(scopes.lookup("x").map(|s| s.ty), Some(Type::Int));
    }
}
