//! Representación intermedia de tres direcciones (TAC).
//!
//! # Formato textual
//! Cada instrucción se imprime en una línea propia; el texto resultante
//! es el contrato estable entre esta fase y la traducción a ensamblador
//! de [`crate::codegen`], que puede consumirlo de un archivo tan bien
//! como de una emisión en memoria. Formas:
//!
//! ```text
//! START_PROGRAM            END_PROGRAM
//! DECLARE x                x = y
//! x = y OP z               L0:
//! GOTO L0                  IF_FALSE x GOTO L0
//! PRINT x                  PRINT_STR "texto"
//! PRINT_NEWLINE            RETURN x
//! ; comentario diagnóstico
//! ```
//!
//! # Lugares
//! La visita de una expresión retorna el "lugar" que contiene su valor:
//! los identificadores y literales son su propio lugar y no emiten
//! instrucción alguna; cada operación binaria reserva un temporal
//! fresco `_tN`. Temporales y etiquetas `LN` provienen de contadores
//! monótonos que nunca se reutilizan dentro de una compilación.

use std::fmt::{self, Display};

use crate::parse::{BinOp, Block, Expr, Program, Statement};

/// Instrucción de tres direcciones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    StartProgram,
    EndProgram,
    Declare(String),

    Copy {
        dest: String,
        src: String,
    },

    Binary {
        dest: String,
        left: String,
        op: BinOp,
        right: String,
    },

    Label(String),
    Goto(String),

    IfFalse {
        condition: String,
        target: String,
    },

    Print(String),
    PrintStr(String),
    PrintNewline,
    Return(String),

    /// Marcador diagnóstico para construcciones sin traducción.
    Comment(String),
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            StartProgram => fmt.write_str("START_PROGRAM"),
            EndProgram => fmt.write_str("END_PROGRAM"),
            Declare(name) => write!(fmt, "DECLARE {}", name),
            Copy { dest, src } => write!(fmt, "{} = {}", dest, src),

            Binary {
                dest,
                left,
                op,
                right,
            } => write!(fmt, "{} = {} {} {}", dest, left, op, right),

            Label(label) => write!(fmt, "{}:", label),
            Goto(label) => write!(fmt, "GOTO {}", label),

            IfFalse { condition, target } => {
                write!(fmt, "IF_FALSE {} GOTO {}", condition, target)
            }

            Print(place) => write!(fmt, "PRINT {}", place),
            PrintStr(text) => write!(fmt, "PRINT_STR \"{}\"", text),
            PrintNewline => fmt.write_str("PRINT_NEWLINE"),
            Return(place) => write!(fmt, "RETURN {}", place),
            Comment(text) => write!(fmt, "; {}", text),
        }
    }
}

/// Imprime el listado completo, una instrucción por línea.
pub fn render(instructions: &[Instruction]) -> String {
    let mut text = String::new();
    for instruction in instructions {
        text.push_str(&instruction.to_string());
        text.push('\n');
    }

    text
}

/// Linealiza un AST semánticamente válido.
pub fn emit(program: &Program) -> Vec<Instruction> {
    let mut emitter = Emitter {
        instructions: Vec::new(),
        temps: 0,
        labels: 0,
    };

    emitter.program(program);
    emitter.instructions
}

struct Emitter {
    instructions: Vec<Instruction>,
    temps: u32,
    labels: u32,
}

impl Emitter {
    fn program(&mut self, program: &Program) {
        self.push(Instruction::StartProgram);
        self.block(&program.block);
        self.push(Instruction::EndProgram);
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declaration { name, init } => {
                self.push(Instruction::Declare(name.clone()));

                if let Some(init) = init {
                    let place = self.expr(init);
                    self.push(Instruction::Copy {
                        dest: name.clone(),
                        src: place,
                    });
                }
            }

            Statement::Assignment { target, value } => {
                let place = self.expr(value);
                self.push(Instruction::Copy {
                    dest: target.clone(),
                    src: place,
                });
            }

            Statement::If {
                condition,
                true_block,
                false_block,
            } => {
                // Sin rama falsa, la etiqueta "else" marca el final
                let else_label = self.new_label();
                let end_label = match false_block {
                    Some(_) => self.new_label(),
                    None => else_label.clone(),
                };

                let condition_place = self.expr(condition);
                self.push(Instruction::IfFalse {
                    condition: condition_place,
                    target: else_label.clone(),
                });

                self.block(true_block);

                match false_block {
                    Some(false_block) => {
                        self.push(Instruction::Goto(end_label.clone()));
                        self.push(Instruction::Label(else_label));
                        self.block(false_block);
                        self.push(Instruction::Label(end_label));
                    }

                    None => self.push(Instruction::Label(else_label)),
                }
            }

            Statement::While { condition, body } => {
                let start_label = self.new_label();
                let end_label = self.new_label();

                self.push(Instruction::Label(start_label.clone()));

                let condition_place = self.expr(condition);
                self.push(Instruction::IfFalse {
                    condition: condition_place,
                    target: end_label.clone(),
                });

                self.block(body);
                self.push(Instruction::Goto(start_label));
                self.push(Instruction::Label(end_label));
            }

            Statement::Printf { format, argument } => self.printf(format, argument.as_ref()),

            Statement::Return { value } => {
                let place = self.expr(value);
                self.push(Instruction::Return(place));
            }
        }
    }

    /// Traducción de `printf` según la combinación formato/argumento.
    ///
    /// `printf("%d", e)` imprime el valor de `e`; un formato sin
    /// argumento se parte en segmentos sobre cada secuencia literal
    /// `\n`, intercalando saltos de línea. Toda otra combinación se
    /// degrada a un comentario diagnóstico en el listado.
    fn printf(&mut self, format: &Expr, argument: Option<&Expr>) {
        let content = match format {
            Expr::Str(content) => content.clone(),
            _ => {
                self.push(Instruction::Comment(String::from(
                    "PRINTF format is not a string literal",
                )));
                return;
            }
        };

        match (content.as_str(), argument) {
            ("%d", Some(argument)) => {
                let place = self.expr(argument);
                self.push(Instruction::Print(place));
            }

            (text, None) if !text.is_empty() => {
                let parts: Vec<&str> = text.split("\\n").collect();
                for (i, part) in parts.iter().enumerate() {
                    if !part.is_empty() {
                        self.push(Instruction::PrintStr((*part).to_owned()));
                    }

                    if i + 1 < parts.len() {
                        self.push(Instruction::PrintNewline);
                    }
                }
            }

            _ => {
                let detail = match argument {
                    Some(_) => format!("COMPLEX_PRINTF Format={} Arg=pending", content),
                    None => format!("COMPLEX_PRINTF Format={}", content),
                };

                self.push(Instruction::Comment(detail));
                if let Some(argument) = argument {
                    self.expr(argument);
                }
            }
        }
    }

    /// Retorna el lugar que contiene el valor de la expresión.
    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Number(value) => value.to_string(),
            Expr::Identifier(name) => name.clone(),
            Expr::Str(content) => format!("\"{}\"", content),

            Expr::Binary {
                op, left, right, ..
            } => {
                let left_place = self.expr(left);
                let right_place = self.expr(right);

                let dest = self.new_temp();
                self.push(Instruction::Binary {
                    dest: dest.clone(),
                    left: left_place,
                    op: *op,
                    right: right_place,
                });

                dest
            }
        }
    }

    fn new_temp(&mut self) -> String {
        let temp = format!("_t{}", self.temps);
        self.temps += 1;
        temp
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.labels);
        self.labels += 1;
        label
    }

    fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::parse::parse;
    use crate::semantic::analyze;

    fn emit_source(source: &str) -> Vec<Instruction> {
        let mut program = parse(&tokenize(source).unwrap()).unwrap();
        analyze(&mut program).unwrap();
        emit(&program)
    }

    fn lines(source: &str) -> Vec<String> {
        emit_source(source)
            .iter()
            .map(Instruction::to_string)
            .collect()
    }

    #[test]
    fn declaration_with_initializer_declares_then_copies() {
        let lines = lines("int main() { int x = 5; x = x + 1; return x; }");

        assert_eq!(
            lines,
            vec![
                "START_PROGRAM",
                "DECLARE x",
                "x = 5",
                "_t0 = x + 1",
                "x = _t0",
                "RETURN x",
                "END_PROGRAM",
            ]
        );
    }

    #[test]
    fn while_loop_jumps_back_to_its_start_label() {
        let lines =
            lines(r#"int main() { int i = 0; while (i <= 3) { printf("%d", i); i = i + 1; } return 0; }"#);

        assert_eq!(
            lines,
            vec![
                "START_PROGRAM",
                "DECLARE i",
                "i = 0",
                "L0:",
                "_t0 = i <= 3",
                "IF_FALSE _t0 GOTO L1",
                "PRINT i",
                "_t1 = i + 1",
                "i = _t1",
                "GOTO L0",
                "L1:",
                "RETURN 0",
                "END_PROGRAM",
            ]
        );
    }

    #[test]
    fn format_string_splits_on_literal_newline() {
        let lines = lines(r#"int main() { printf("Hola\n"); return 0; }"#);

        assert_eq!(
            lines,
            vec![
                "START_PROGRAM",
                "PRINT_STR \"Hola\"",
                "PRINT_NEWLINE",
                "RETURN 0",
                "END_PROGRAM",
            ]
        );
    }

    #[test]
    fn interior_newlines_interleave_segments() {
        let lines = lines(r#"int main() { printf("a\nb"); return 0; }"#);

        assert_eq!(
            &lines[1..4],
            &["PRINT_STR \"a\"", "PRINT_NEWLINE", "PRINT_STR \"b\""]
        );
    }

    #[test]
    fn if_without_else_ends_at_the_else_label() {
        let lines = lines("int main() { int x = 1; if (x > 0) { x = 2; } return x; }");

        assert_eq!(
            lines,
            vec![
                "START_PROGRAM",
                "DECLARE x",
                "x = 1",
                "_t0 = x > 0",
                "IF_FALSE _t0 GOTO L0",
                "x = 2",
                "L0:",
                "RETURN x",
                "END_PROGRAM",
            ]
        );
    }

    #[test]
    fn if_else_skips_the_false_branch() {
        let lines =
            lines("int main() { int x = 1; if (x > 0) { x = 2; } else { x = 3; } return x; }");

        assert_eq!(
            lines,
            vec![
                "START_PROGRAM",
                "DECLARE x",
                "x = 1",
                "_t0 = x > 0",
                "IF_FALSE _t0 GOTO L0",
                "x = 2",
                "GOTO L1",
                "L0:",
                "x = 3",
                "L1:",
                "RETURN x",
                "END_PROGRAM",
            ]
        );
    }

    #[test]
    fn unsupported_printf_degrades_to_a_diagnostic_comment() {
        let lines = lines(r#"int main() { printf("valor: %d", 1 + 2); return 0; }"#);

        assert!(lines
            .iter()
            .any(|line| line.starts_with("; COMPLEX_PRINTF")));
    }

    #[test]
    fn temporaries_and_labels_are_never_reused() {
        let source = r#"
            int main() {
                int a = 1 + 2 * 3;
                while (a > 0) {
                    if (a % 2 == 0) { a = a - 1; } else { a = a - 2; }
                }
                return a;
            }
        "#;

        let mut temps = Vec::new();
        let mut labels = Vec::new();
        for instruction in emit_source(source) {
            match instruction {
                Instruction::Binary { dest, .. } => temps.push(dest),
                Instruction::Label(label) => labels.push(label),
                _ => (),
            }
        }

        let unique = |names: &[String]| {
            let mut sorted = names.to_vec();
            sorted.sort();
            sorted.dedup();
            sorted.len() == names.len()
        };

        assert!(unique(&temps), "temporales repetidos: {:?}", temps);
        assert!(unique(&labels), "etiquetas repetidas: {:?}", labels);
    }

    #[test]
    fn emission_is_deterministic() {
        let source = "int main() { int x = 1; while (x <= 9) { x = x + 1; } return x; }";

        let mut program = parse(&tokenize(source).unwrap()).unwrap();
        analyze(&mut program).unwrap();

        assert_eq!(render(&emit(&program)), render(&emit(&program)));
    }

    #[test]
    fn program_is_bracketed_exactly_once() {
        let instructions = emit_source("int main() { return 0; }");

        let starts = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::StartProgram))
            .count();
        let ends = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::EndProgram))
            .count();

        assert_eq!((starts, ends), (1, 1));
        assert!(matches!(instructions.first(), Some(Instruction::StartProgram)));
        assert!(matches!(instructions.last(), Some(Instruction::EndProgram)));
    }
}
