//! Compilador para un subconjunto de C con `main` único.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente. El texto
//! se somete primero a análisis léxico en [`lex`], de lo cual se
//! obtiene un flujo de tokens. Sobre ese flujo operan dos analizadores
//! sintácticos independientes: el reconocedor por desplazamiento y
//! reducción de [`precedence`], que únicamente valida y produce una
//! traza de demostración, y el analizador por descenso recursivo de
//! [`parse`], que construye el AST canónico. El árbol es verificado y
//! anotado por el análisis semántico de [`semantic`].
//!
//! # Back end
//! El AST validado se linealiza en código de tres direcciones en
//! [`tac`], cuyo formato textual es el contrato entre fases. Ese texto
//! se traduce por correspondencia de patrones a un listado de
//! ensamblador estilo 8086 en [`codegen`], incluyendo el pool de
//! literales y las rutinas de soporte de impresión.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod precedence;
pub mod semantic;
pub mod tac;

pub use error::{Compile, CompilerError};

use codegen::{Listing, ListingOptions};
use tac::Instruction;

/// Fases delanteras: texto fuente a lista de instrucciones TAC.
pub fn compile_to_tac(source: &str) -> Compile<Vec<Instruction>> {
    let tokens = lex::tokenize(source)?;
    let mut program = parse::parse(&tokens)?;
    semantic::analyze(&mut program)?;

    Ok(tac::emit(&program))
}

/// Pipeline completa: texto fuente a listado de ensamblador.
pub fn compile_to_asm(source: &str, options: ListingOptions) -> Compile<Listing> {
    let instructions = compile_to_tac(source)?;
    Ok(codegen::lower(&tac::render(&instructions), options))
}
