//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco y
//! los comentarios se descartan durante esta operación. Cada token
//! conserva su lexema original, lo cual permite que fases posteriores
//! reporten errores nombrando exactamente lo que se encontró en el
//! programa fuente.
//!
//! # Contenido de un token
//! A diferencia de lexers que resuelven literales a valores durante
//! el escaneo, este preserva el lexema tal cual: el flujo de tokens es
//! el contrato con ambos analizadores sintácticos y con la traza del
//! reconocedor de precedencia, los cuales imprimen pares `(TIPO, lexema)`.
//! Las constantes numéricas se convierten a valor hasta construir el AST.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores comienzan con letra o `'_'` y continúan con
//!   letras, dígitos o `'_'`.
//! - El lenguaje es case-sensitive: `int` es palabra clave, `Int` es
//!   un identificador.
//! - `scanf` y `'&'` se reconocen como tokens pero ninguna fase
//!   posterior los acepta.
//!
//! # Errores
//! El lexer falla ante el primer carácter ilegal, cadena sin cerrar o
//! comentario de bloque sin cerrar, reportando el offset en bytes.

use std::fmt::{self, Display};
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream at byte {1}")]
    BadChar(char, usize),

    /// Una cadena abierta con `"` nunca se cerró.
    #[error("Unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),

    /// Un comentario `/*` nunca encontró su `*/`.
    #[error("Unterminated block comment starting at byte {0}")]
    UnterminatedComment(usize),
}

/// Tipo de token.
///
/// Esta es una enumeración cerrada: el vocabulario completo del
/// lenguaje fuente. Los nombres que imprime [`Display`] son los que
/// aparecen en trazas y mensajes de error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `int`
    KwInt,

    /// `main`
    KwMain,

    /// `while`
    KwWhile,

    /// `if`
    KwIf,

    /// `else`
    KwElse,

    /// `return`
    KwReturn,

    /// `printf`
    Printf,

    /// `scanf` (reconocido, nunca aceptado)
    Scanf,

    /// Identificador.
    Id,

    /// Literal de entero.
    Num,

    /// Literal de cadena, lexema con comillas incluidas.
    Str,

    /// `+`
    Add,

    /// `-`
    Sub,

    /// `*`
    Mul,

    /// `/`
    Div,

    /// `%`
    Mod,

    /// `=`
    Assign,

    /// `==`
    Eq,

    /// `<=`
    Le,

    /// `>`
    Gt,

    /// `&` (reconocido, nunca aceptado)
    Ampersand,

    /// `(`
    LParen,

    /// `)`
    RParen,

    /// `{`
    LBrace,

    /// `}`
    RBrace,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// Marcador de fin de flujo.
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        let name = match self {
            KwInt     => "KW_INT",
            KwMain    => "KW_MAIN",
            KwWhile   => "KW_WHILE",
            KwIf      => "KW_IF",
            KwElse    => "KW_ELSE",
            KwReturn  => "KW_RETURN",
            Printf    => "IO_PRINTF",
            Scanf     => "IO_SCANF",
            Id        => "ID",
            Num       => "NUM",
            Str       => "STR",
            Add       => "OP_ADD",
            Sub       => "OP_SUB",
            Mul       => "OP_MUL",
            Div       => "OP_DIV",
            Mod       => "OP_MOD",
            Assign    => "OP_ASSIGN",
            Eq        => "OP_EQ",
            Le        => "OP_LE",
            Gt        => "OP_GT",
            Ampersand => "AMPERSAND",
            LParen    => "LPAREN",
            RParen    => "RPAREN",
            LBrace    => "LBRACE",
            RBrace    => "RBRACE",
            Semicolon => "SEMICOLON",
            Comma     => "COMMA",
            Eof       => "$",
        };

        fmt.write_str(name)
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    /// Construye un token a partir de su tipo y lexema.
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
        }
    }

    /// El marcador de fin de flujo.
    pub fn end() -> Self {
        Token::new(TokenKind::Eof, "$")
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "({}, {})", self.kind, self.lexeme)
    }
}

/// Tabla de palabras clave y sus tipos de token.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("main", TokenKind::KwMain),
    ("while", TokenKind::KwWhile),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("return", TokenKind::KwReturn),
    ("printf", TokenKind::Printf),
    ("scanf", TokenKind::Scanf),
];

/// Escáner sobre el texto fuente.
///
/// Avanza carácter por carácter con un solo carácter de lookahead,
/// suficiente para resolver los pares `=`/`==` y los inicios de
/// comentario `//` y `/*`.
struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

/// Reduce el texto fuente a una secuencia de tokens terminada en
/// [`Token::end()`], o al primer error léxico encontrado.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
    };

    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    tokens.push(Token::end());
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    /// Intenta construir un siguiente token.
    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        use TokenKind::*;

        loop {
            let (start, c) = match self.chars.next() {
                Some(next) => next,
                None => return Ok(None),
            };

            let simple = match c {
                c if c.is_ascii_whitespace() => continue,

                '+' => Add,
                '-' => Sub,
                '*' => Mul,
                '%' => Mod,
                '>' => Gt,
                '&' => Ampersand,
                '(' => LParen,
                ')' => RParen,
                '{' => LBrace,
                '}' => RBrace,
                ';' => Semicolon,
                ',' => Comma,

                '/' => match self.chars.peek() {
                    Some((_, '/')) => {
                        self.skip_line_comment();
                        continue;
                    }

                    Some((_, '*')) => {
                        self.chars.next();
                        self.skip_block_comment(start)?;
                        continue;
                    }

                    _ => Div,
                },

                '=' => match self.chars.peek() {
                    Some((_, '=')) => {
                        self.chars.next();
                        return Ok(Some(Token::new(Eq, "==")));
                    }

                    _ => Assign,
                },

                // `<` solo existe como parte de `<=`
                '<' => match self.chars.peek() {
                    Some((_, '=')) => {
                        self.chars.next();
                        return Ok(Some(Token::new(Le, "<=")));
                    }

                    _ => return Err(LexerError::BadChar(c, start)),
                },

                '"' => return self.string(start).map(Some),

                c if c.is_ascii_digit() => return Ok(Some(self.number(start))),
                c if c.is_ascii_alphabetic() || c == '_' => return Ok(Some(self.word(start))),

                c => return Err(LexerError::BadChar(c, start)),
            };

            let end = start + c.len_utf8();
            return Ok(Some(Token::new(simple, &self.source[start..end])));
        }
    }

    /// Extiende una constante entera dígito por dígito.
    fn number(&mut self, start: usize) -> Token {
        let end = self.take_while(start, |c| c.is_ascii_digit());
        Token::new(TokenKind::Num, &self.source[start..end])
    }

    /// Extiende un término que puede ser identificador o palabra clave.
    fn word(&mut self, start: usize) -> Token {
        let end = self.take_while(start, |c| c.is_ascii_alphanumeric() || c == '_');
        let lexeme = &self.source[start..end];

        let kind = KEYWORDS
            .iter()
            .find(|&&(keyword, _)| keyword == lexeme)
            .map(|&(_, kind)| kind)
            .unwrap_or(TokenKind::Id);

        Token::new(kind, lexeme)
    }

    /// Consume una cadena hasta su comilla de cierre.
    ///
    /// Las secuencias de escape no se interpretan: el lexema conserva
    /// `\n` como los dos caracteres originales, comillas incluidas.
    fn string(&mut self, start: usize) -> Result<Token, LexerError> {
        while let Some((i, c)) = self.chars.next() {
            match c {
                '\\' => {
                    // El carácter escapado no puede cerrar la cadena
                    self.chars.next();
                }

                '"' => {
                    let end = i + c.len_utf8();
                    return Ok(Token::new(TokenKind::Str, &self.source[start..end]));
                }

                _ => (),
            }
        }

        Err(LexerError::UnterminatedString(start))
    }

    /// Los comentarios de línea descartan hasta el salto de línea.
    fn skip_line_comment(&mut self) {
        while let Some((_, c)) = self.chars.next() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Los comentarios de bloque descartan hasta `*/`.
    fn skip_block_comment(&mut self, start: usize) -> Result<(), LexerError> {
        while let Some((_, c)) = self.chars.next() {
            if c == '*' {
                if let Some((_, '/')) = self.chars.peek() {
                    self.chars.next();
                    return Ok(());
                }
            }
        }

        Err(LexerError::UnterminatedComment(start))
    }

    /// Avanza mientras el siguiente carácter satisfaga el predicado y
    /// retorna el offset de fin (exclusivo).
    fn take_while(&mut self, start: usize, accept: impl Fn(char) -> bool) -> usize {
        let mut end = start + 1;
        while let Some(&(i, c)) = self.chars.peek() {
            if !accept(c) {
                return i;
            }

            end = i + c.len_utf8();
            self.chars.next();
        }

        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scans_a_minimal_program() {
        use TokenKind::*;

        let source = "int main() { return 0; }";
        assert_eq!(
            kinds(source),
            vec![
                KwInt, KwMain, LParen, RParen, LBrace, KwReturn, Num, Semicolon, RBrace, Eof
            ]
        );
    }

    #[test]
    fn distinguishes_assign_from_eq() {
        use TokenKind::*;

        assert_eq!(kinds("x = y == z"), vec![Id, Assign, Id, Eq, Id, Eof]);
    }

    #[test]
    fn keywords_are_case_sensitive() {
        let tokens = tokenize("int Int").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::KwInt);
        assert_eq!(tokens[1].kind, TokenKind::Id);
        assert_eq!(tokens[1].lexeme, "Int");
    }

    #[test]
    fn string_lexeme_keeps_quotes_and_raw_escapes() {
        let tokens = tokenize(r#"printf("Hola\n");"#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].lexeme, r#""Hola\n""#);
    }

    #[test]
    fn comments_are_discarded() {
        use TokenKind::*;

        let source = "int x; // linea\n/* bloque\nlargo */ int y;";
        assert_eq!(
            kinds(source),
            vec![KwInt, Id, Semicolon, KwInt, Id, Semicolon, Eof]
        );
    }

    #[test]
    fn lone_less_than_is_rejected() {
        match tokenize("a < b") {
            Err(LexerError::BadChar('<', 2)) => (),
            other => panic!("se esperaba BadChar, se obtuvo {:?}", other),
        }
    }

    #[test]
    fn unterminated_string_is_reported() {
        assert!(matches!(
            tokenize("printf(\"hola"),
            Err(LexerError::UnterminatedString(7))
        ));
    }

    #[test]
    fn token_display_matches_trace_format() {
        let token = Token::new(TokenKind::KwInt, "int");
        assert_eq!(token.to_string(), "(KW_INT, int)");
    }
}
