//! Traducción de TAC a ensamblador.
//!
//! # Máquina objetivo
//! El objetivo es un dialecto 8086 de memoria segmentada al estilo
//! DOS: dos registros de trabajo (`AX` acumulador primario, `BX`
//! secundario), variables en el marco de pila direccionadas respecto a
//! `BP`, cadenas en un pool de literales dentro de `.DATA`, y
//! servicios de E/S y terminación vía `INT 21H`. Dos rutinas de
//! soporte se anexan siempre al final del listado: `PRINT_NUM`
//! (convierte y imprime el entero con signo de `AX`) y
//! `PRINT_NEWLINE`.
//!
//! # Estrategia
//! Una sola pasada sobre las líneas de TAC, con una clasificación de
//! forma por línea. El estado entre líneas consiste en la tabla de
//! offsets de variables (asignados en orden de declaración desde
//! `[BP-2]` hacia abajo), el descriptor de ubicación de cada temporal
//! (acumulador, o banderas del procesador junto al comparador que las
//! produjo) y el pool de literales, recolectado en una pasada previa.
//!
//! Las comparaciones no almacenan un booleano: dejan banderas, y el
//! `IF_FALSE` posterior elige su salto condicional invirtiendo el
//! comparador de origen. Un `IF_FALSE` sin procedencia de comparación
//! cae al caso genérico `CMP AX, 0 / JE`.
//!
//! # Degradación
//! Una línea irreconocible no aborta la traducción: se copia al
//! listado como comentario y queda registrada en
//! [`Listing::warnings`]. Todo TAC bien formado producido por
//! [`crate::tac`] debe traducirse sin tocar esa ruta.

use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Opciones a aplicar durante la traducción.
    pub struct ListingOptions: u32 {
        /// Copiar cada línea TAC como comentario sobre su traducción.
        const TRACE_TAC = 0x01;
    }
}

/// Listado de ensamblador resultante.
pub struct Listing {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
}

impl Listing {
    /// El listado completo como texto.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Operador binario a nivel de TAC.
///
/// Cubre más comparadores que los que el lenguaje fuente puede
/// producir: el contrato textual admite TAC escrito a mano.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Le,
    Eq,
    Lt,
    Gt,
    Ge,
    Ne,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Operator> {
        let op = match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            "<=" => Operator::Le,
            "==" => Operator::Eq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "!=" => Operator::Ne,
            _ => return None,
        };

        Some(op)
    }

    /// Salto que toma la rama "falso" de la comparación.
    fn inverted_jump(self) -> Option<(&'static str, &'static str)> {
        let jump = match self {
            Operator::Le => ("JG", "; !(A <= B) => (A > B)"),
            Operator::Eq => ("JNE", "; !(A == B) => (A != B)"),
            Operator::Gt => ("JLE", "; !(A > B) => (A <= B)"),
            Operator::Lt => ("JGE", "; !(A < B) => (A >= B)"),
            Operator::Ge => ("JL", "; !(A >= B) => (A < B)"),
            Operator::Ne => ("JE", "; !(A != B) => (A == B)"),
            _ => return None,
        };

        Some(jump)
    }
}

/// Forma reconocida de una línea de TAC.
enum Shape<'a> {
    Marker,
    Comment(&'a str),
    Declare(&'a str),

    BinaryAssign {
        dest: &'a str,
        left: &'a str,
        op: Operator,
        right: &'a str,
    },

    CopyAssign {
        dest: &'a str,
        src: &'a str,
    },

    IfFalse {
        condition: &'a str,
        target: &'a str,
    },

    Goto(&'a str),
    Label(&'a str),
    Print(&'a str),
    PrintStr(&'a str),
    PrintNewline,
    Return(&'a str),
}

/// Clasifica una línea de TAC por su forma.
fn classify(line: &str) -> Option<Shape<'_>> {
    let line = line.trim();

    if line.is_empty() || line == "START_PROGRAM" || line == "END_PROGRAM" {
        return Some(Shape::Marker);
    }

    if let Some(text) = line.strip_prefix(';') {
        return Some(Shape::Comment(text.trim()));
    }

    if line == "PRINT_NEWLINE" {
        return Some(Shape::PrintNewline);
    }

    if let Some(rest) = line.strip_prefix("PRINT_STR ") {
        let rest = rest.trim();
        if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
            return Some(Shape::PrintStr(&rest[1..rest.len() - 1]));
        }

        return None;
    }

    if let Some(rest) = line.strip_prefix("DECLARE ") {
        return single_word(rest).map(Shape::Declare);
    }

    if let Some(rest) = line.strip_prefix("PRINT ") {
        return single_word(rest).map(Shape::Print);
    }

    if let Some(rest) = line.strip_prefix("RETURN ") {
        return single_word(rest).map(Shape::Return);
    }

    if let Some(rest) = line.strip_prefix("GOTO ") {
        return single_word(rest).filter(|l| is_label(l)).map(Shape::Goto);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    match *words.as_slice() {
        ["IF_FALSE", condition, "GOTO", target] if is_label(target) => {
            Some(Shape::IfFalse { condition, target })
        }

        [label] if label.ends_with(':') && is_label(&label[..label.len() - 1]) => {
            Some(Shape::Label(&label[..label.len() - 1]))
        }

        [dest, "=", left, symbol, right] => {
            let op = Operator::from_symbol(symbol)?;
            Some(Shape::BinaryAssign {
                dest,
                left,
                op,
                right,
            })
        }

        [dest, "=", src] => Some(Shape::CopyAssign { dest, src }),

        _ => None,
    }
}

fn single_word(text: &str) -> Option<&str> {
    let mut words = text.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => Some(word),
        _ => None,
    }
}

/// Las etiquetas tienen la forma `LN`.
fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('L') && {
        let rest = chars.as_str();
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Ubicación del valor de un operando.
#[derive(Copy, Clone)]
enum Location {
    /// Literal embebido en la instrucción.
    Immediate,

    /// Ranura de variable, offset relativo a `BP`.
    Stack(i32),

    /// El acumulador `AX` contiene el valor del temporal.
    Accumulator,
}

/// Traduce el texto TAC completo a un listado de ensamblador.
pub fn lower(tac: &str, options: ListingOptions) -> Listing {
    let mut generator = Generator {
        options,
        lines: Vec::new(),
        warnings: Vec::new(),
        offsets: HashMap::new(),
        next_offset: FIRST_SLOT,
        accumulator: None,
        comparisons: HashMap::new(),
        pool: Vec::new(),
        pool_labels: HashMap::new(),
    };

    generator.run(tac);

    Listing {
        lines: generator.lines,
        warnings: generator.warnings,
    }
}

/// Primera ranura de variable bajo el frame pointer.
const FIRST_SLOT: i32 = -2;

struct Generator {
    options: ListingOptions,
    lines: Vec<String>,
    warnings: Vec<String>,

    /// Offset de cada variable declarada, en orden de declaración.
    offsets: HashMap<String, i32>,
    next_offset: i32,

    /// Temporal cuyo valor vive actualmente en el acumulador.
    ///
    /// `AX` tiene un único ocupante: producir un valor nuevo invalida
    /// al anterior. Consumir un temporal desalojado se reporta como
    /// advertencia en lugar de emitir código incorrecto.
    accumulator: Option<String>,

    /// Comparador que produjo cada temporal de comparación.
    comparisons: HashMap<String, Operator>,

    /// Pool de literales de cadena, en orden de aparición.
    pool: Vec<(String, String)>,
    pool_labels: HashMap<String, String>,
}

impl Generator {
    fn run(&mut self, tac: &str) {
        let lines: Vec<&str> = tac.lines().collect();

        self.collect_strings(&lines);
        self.prologue();

        for line in &lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if self.options.contains(ListingOptions::TRACE_TAC) {
                self.raw(format!("    ; TAC: {}", trimmed));
            }

            match classify(trimmed) {
                Some(shape) => self.translate(shape),
                None => {
                    self.raw(format!("    ; unrecognized TAC: {}", trimmed));
                    self.warnings
                        .push(format!("unrecognized TAC line: {}", trimmed));
                }
            }
        }

        self.epilogue();
    }

    /// Pasada previa: recolecta los literales de `PRINT_STR` en el
    /// pool de datos, uno por contenido distinto.
    fn collect_strings(&mut self, lines: &[&str]) {
        for line in lines {
            if let Some(Shape::PrintStr(content)) = classify(line) {
                if !self.pool_labels.contains_key(content) {
                    let label = format!("msg{}", self.pool.len());
                    self.pool_labels
                        .insert(content.to_owned(), label.clone());
                    self.pool.push((label, content.to_owned()));
                }
            }
        }
    }

    fn prologue(&mut self) {
        self.raw(".MODEL SMALL");
        self.raw(".STACK 100H");
        self.raw(".DATA");

        for (label, content) in self.pool.clone() {
            self.raw(format!("{} DB '{}', '$'", label, content));
        }

        self.raw("newline_char DB 0DH, 0AH, '$'");
        self.raw("num_buffer DB 7 DUP('$')");

        self.raw(".CODE");
        self.raw("MAIN PROC");
        emit!(self, "MOV", "AX, @DATA");
        emit!(self, "MOV", "DS, AX");
        emit!(self, "PUSH", "BP");
        emit!(self, "MOV", "BP, SP");
    }

    fn epilogue(&mut self) {
        self.raw("");
        emit!(self, "POP", "BP");
        emit!(self, "RET");
        self.raw("MAIN ENDP");
        self.raw("");

        for line in PRINT_NUM_PROC {
            self.raw(*line);
        }

        for line in PRINT_NEWLINE_PROC {
            self.raw(*line);
        }

        self.raw("END MAIN");
    }

    fn translate(&mut self, shape: Shape<'_>) {
        match shape {
            Shape::Marker => (),

            // Los comentarios del TAC pasan al listado tal cual
            Shape::Comment(text) => self.raw(format!("    ; {}", text)),

            Shape::Declare(name) => self.declare(name),

            Shape::BinaryAssign {
                dest,
                left,
                op,
                right,
            } => self.binary(dest, left, op, right),

            Shape::CopyAssign { dest, src } => {
                self.load(src, "AX");
                self.store(dest);
            }

            Shape::IfFalse { condition, target } => self.if_false(condition, target),

            Shape::Goto(label) => emit!(self, "JMP", "{}", label),
            Shape::Label(label) => self.raw(format!("{}:", label)),

            Shape::Print(place) => {
                self.load(place, "AX");
                emit!(self, "CALL", "PRINT_NUM");
                emit!(self, "CALL", "PRINT_NEWLINE");
            }

            Shape::PrintStr(content) => self.print_str(content),

            Shape::PrintNewline => emit!(self, "CALL", "PRINT_NEWLINE"),

            Shape::Return(place) => {
                if place.parse::<i32>().is_ok() {
                    emit!(self, "MOV", "AL, {}", place);
                } else {
                    // AL es el byte bajo de AX
                    self.load(place, "AX");
                }

                emit!(self, "MOV", "AH, 4CH");
                emit!(self, "INT", "21H");
            }
        }
    }

    fn declare(&mut self, name: &str) {
        if self.offsets.contains_key(name) {
            return;
        }

        let offset = self.next_offset;
        emit!(self, "SUB", "SP, 2 ; {} at [BP{}]", name, offset);

        self.offsets.insert(name.to_owned(), offset);
        self.next_offset -= 2;
    }

    fn binary(&mut self, dest: &str, left: &str, op: Operator, right: &str) {
        // Si el operando derecho vive en el acumulador, se aparta a BX
        // antes de que la carga del izquierdo lo pise
        if self.in_accumulator(right) && !self.in_accumulator(left) {
            self.load(right, "BX");
            self.load(left, "AX");
        } else {
            self.load(left, "AX");
            self.load(right, "BX");
        }

        match op {
            Operator::Add => emit!(self, "ADD", "AX, BX"),
            Operator::Sub => emit!(self, "SUB", "AX, BX"),
            Operator::Mul => emit!(self, "IMUL", "BX"),

            Operator::Div => {
                emit!(self, "CWD");
                emit!(self, "IDIV", "BX");
            }

            Operator::Mod => {
                emit!(self, "CWD");
                emit!(self, "IDIV", "BX");
                emit!(self, "MOV", "AX, DX ; remainder");
            }

            comparison => {
                emit!(self, "CMP", "AX, BX");
                self.comparisons.insert(dest.to_owned(), comparison);
                return;
            }
        }

        self.store(dest);
    }

    /// Fija el resultado aritmético de `AX` en su destino.
    ///
    /// Un destino temporal no genera instrucción: su descriptor queda
    /// apuntando al acumulador hasta que la siguiente instrucción lo
    /// consuma.
    fn store(&mut self, dest: &str) {
        if let Some(&offset) = self.offsets.get(dest) {
            emit!(self, "MOV", "WORD PTR [BP{}], AX", offset);
            self.accumulator = None;
        } else if dest.starts_with("_t") {
            self.accumulator = Some(dest.to_owned());
        } else {
            self.raw(format!("    ; cannot store to {}", dest));
            self.warnings
                .push(format!("store to undeclared name: {}", dest));
        }
    }

    fn if_false(&mut self, condition: &str, target: &str) {
        let provenance = self
            .comparisons
            .get(condition)
            .and_then(|op| op.inverted_jump());

        match provenance {
            Some((jump, comment)) => emit!(self, jump, "{} {}", target, comment),

            None => {
                self.load(condition, "AX");
                emit!(self, "CMP", "AX, 0");
                emit!(self, "JE", "{}", target);
            }
        }
    }

    fn print_str(&mut self, content: &str) {
        // La pasada previa garantiza la etiqueta
        match self.pool_labels.get(content).cloned() {
            Some(label) => {
                emit!(self, "LEA", "DX, {}", label);
                emit!(self, "MOV", "AH, 09H");
                emit!(self, "INT", "21H");
                emit!(self, "CALL", "PRINT_NEWLINE");
            }

            None => {
                self.raw(format!("    ; missing pool label for \"{}\"", content));
                self.warnings
                    .push(format!("string literal missing from pool: \"{}\"", content));
            }
        }
    }

    /// Carga un operando al registro indicado.
    fn load(&mut self, operand: &str, register: &str) {
        match self.resolve(operand) {
            Some(Location::Immediate) => {
                emit!(self, "MOV", "{}, {}", register, operand);
                if register == "AX" {
                    self.accumulator = None;
                }
            }

            Some(Location::Stack(offset)) => {
                emit!(self, "MOV", "{}, WORD PTR [BP{}]", register, offset);
                if register == "AX" {
                    self.accumulator = None;
                }
            }

            Some(Location::Accumulator) => {
                if register != "AX" {
                    emit!(self, "MOV", "{}, AX", register);
                }
            }

            None => {
                self.raw(format!("    ; cannot load operand {}", operand));
                self.warnings
                    .push(format!("operand without location: {}", operand));
            }
        }
    }

    fn in_accumulator(&self, operand: &str) -> bool {
        self.accumulator.as_deref() == Some(operand)
    }

    /// Resuelve la ubicación actual de un operando.
    fn resolve(&self, operand: &str) -> Option<Location> {
        if let Some(&offset) = self.offsets.get(operand) {
            return Some(Location::Stack(offset));
        }

        if operand.parse::<i32>().is_ok() {
            return Some(Location::Immediate);
        }

        if self.in_accumulator(operand) {
            return Some(Location::Accumulator);
        }

        // Mejor esfuerzo: tras un CMP, el operando izquierdo de la
        // comparación sigue en AX
        if self.comparisons.contains_key(operand) {
            return Some(Location::Accumulator);
        }

        None
    }

    fn raw(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn line(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Rutina de soporte: imprime el entero con signo de `AX` en decimal.
const PRINT_NUM_PROC: &[&str] = &[
    "; PRINT_NUM: prints the signed 16-bit integer in AX",
    "PRINT_NUM PROC",
    "    PUSH    AX",
    "    PUSH    BX",
    "    PUSH    CX",
    "    PUSH    DX",
    "    PUSH    DI",
    "    MOV     CX, 0",
    "    CMP     AX, 0",
    "    JGE     pn_positive",
    "    PUSH    AX",
    "    MOV     AH, 02H",
    "    MOV     DL, '-'",
    "    INT     21H",
    "    POP     AX",
    "    NEG     AX",
    "pn_positive:",
    "    CMP     AX, 0",
    "    JNE     pn_convert",
    "    MOV     AH, 02H",
    "    MOV     DL, '0'",
    "    INT     21H",
    "    JMP     pn_done",
    "pn_convert:",
    "    MOV     BX, 10",
    "    MOV     DX, 0",
    "    DIV     BX",
    "    PUSH    DX",
    "    INC     CX",
    "    CMP     AX, 0",
    "    JNE     pn_convert",
    "    LEA     DI, num_buffer",
    "pn_store:",
    "    POP     DX",
    "    ADD     DL, '0'",
    "    MOV     [DI], DL",
    "    INC     DI",
    "    LOOP    pn_store",
    "    MOV     BYTE PTR [DI], '$'",
    "    LEA     DX, num_buffer",
    "    MOV     AH, 09H",
    "    INT     21H",
    "pn_done:",
    "    POP     DI",
    "    POP     DX",
    "    POP     CX",
    "    POP     BX",
    "    POP     AX",
    "    RET",
    "PRINT_NUM ENDP",
    "",
];

/// Rutina de soporte: imprime CR LF.
const PRINT_NEWLINE_PROC: &[&str] = &[
    "; PRINT_NEWLINE: prints CR LF",
    "PRINT_NEWLINE PROC",
    "    PUSH    AX",
    "    PUSH    DX",
    "    LEA     DX, newline_char",
    "    MOV     AH, 09H",
    "    INT     21H",
    "    POP     DX",
    "    POP     AX",
    "    RET",
    "PRINT_NEWLINE ENDP",
    "",
];
