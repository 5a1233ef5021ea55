//! Errores de compilación.
//!
//! Cada fase define su propio tipo de error; este módulo los pliega en
//! una suma única para los consumidores de la pipeline completa. La
//! política de propagación es fallar rápido: la primera violación
//! léxica, sintáctica o semántica aborta la compilación sin intento de
//! recuperación. La traducción a ensamblador no aparece aquí: esa fase
//! degrada líneas irreconocibles a advertencias en lugar de fallar.

use thiserror::Error;

use crate::lex::LexerError;
use crate::parse::SyntaxError;
use crate::semantic::SemanticError;

pub type Compile<T> = Result<T, CompilerError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexerError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),
}
