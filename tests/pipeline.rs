//! Pruebas de extremo a extremo de la pipeline de compilación.

use minic::codegen::{self, ListingOptions};
use minic::{compile_to_asm, compile_to_tac, tac, CompilerError};

/// Programa que ejercita todas las formas del lenguaje.
const KITCHEN_SINK: &str = r#"
    int main() {
        int limit = 10;
        int i = 0;
        int acc = 0;
        while (i <= limit) {
            if (i % 2 == 0) {
                acc = acc + i * 2;
            } else {
                acc = acc - 1;
            }
            printf("%d", acc);
            i = i + 1;
        }
        int half = acc / 2;
        if (half > 100) {
            printf("grande");
        }
        printf("listo\n");
        return acc;
    }
"#;

fn tac_lines(source: &str) -> Vec<String> {
    compile_to_tac(source)
        .unwrap()
        .iter()
        .map(|instruction| instruction.to_string())
        .collect()
}

#[test]
fn scenario_declaration_increment_and_return() {
    let lines = tac_lines("int main(){ int x = 5; x = x + 1; return x; }");

    assert!(lines.contains(&String::from("DECLARE x")));
    assert!(lines.contains(&String::from("x = 5")));
    assert!(lines.contains(&String::from("_t0 = x + 1")));
    assert!(lines.contains(&String::from("x = _t0")));
    assert!(lines.contains(&String::from("RETURN x")));
}

#[test]
fn scenario_while_loop_with_printf() {
    let lines =
        tac_lines(r#"int main(){ int i = 0; while (i <= 3) { printf("%d", i); i = i + 1; } return 0; }"#);

    // Etiqueta de inicio, condición derivada de `<=`, cuerpo y salto de vuelta
    let start = lines
        .iter()
        .position(|line| line == "L0:")
        .expect("falta la etiqueta de inicio");

    assert!(lines.contains(&String::from("_t0 = i <= 3")));
    assert!(lines.contains(&String::from("IF_FALSE _t0 GOTO L1")));

    let print = lines
        .iter()
        .position(|line| line == "PRINT i")
        .expect("falta el PRINT del cuerpo");
    let back = lines
        .iter()
        .position(|line| line == "GOTO L0")
        .expect("falta el salto de vuelta");

    assert!(start < print && print < back);
}

#[test]
fn scenario_hello_with_trailing_newline() {
    let lines = tac_lines(r#"int main(){ printf("Hello\n"); return 0; }"#);

    let hello = lines
        .iter()
        .position(|line| line == "PRINT_STR \"Hello\"")
        .expect("falta PRINT_STR");

    assert_eq!(lines.get(hello + 1).map(String::as_str), Some("PRINT_NEWLINE"));
}

#[test]
fn scenario_assignment_to_undeclared_variable_fails() {
    let result = compile_to_tac("int main(){ x = 1; return 0; }");

    match result {
        Err(CompilerError::Semantic(error)) => {
            assert!(error.to_string().contains("`x`"), "error: {}", error)
        }

        other => panic!("se esperaba un error semántico, se obtuvo {:?}", other.err()),
    }
}

#[test]
fn scenario_duplicate_declaration_fails() {
    let result = compile_to_tac("int main(){ int x; int x; return 0; }");

    match result {
        Err(CompilerError::Semantic(error)) => {
            let message = error.to_string();
            assert!(message.contains("`x`"), "error: {}", message);
            assert!(message.contains("already declared"), "error: {}", message);
        }

        other => panic!("se esperaba un error semántico, se obtuvo {:?}", other.err()),
    }
}

#[test]
fn every_jump_target_is_defined_exactly_once() {
    let lines = tac_lines(KITCHEN_SINK);

    let defined: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_suffix(':'))
        .collect();

    let mut unique = defined.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), defined.len(), "etiquetas repetidas: {:?}", defined);

    let targets = lines.iter().filter_map(|line| {
        line.strip_prefix("GOTO ")
            .or_else(|| line.split(" GOTO ").nth(1))
    });

    for target in targets {
        let count = defined.iter().filter(|&&label| label == target).count();
        assert_eq!(count, 1, "el destino {} se define {} veces", target, count);
    }
}

#[test]
fn program_bracket_appears_exactly_once() {
    let lines = tac_lines(KITCHEN_SINK);

    assert_eq!(lines.first().map(String::as_str), Some("START_PROGRAM"));
    assert_eq!(lines.last().map(String::as_str), Some("END_PROGRAM"));
    assert_eq!(lines.iter().filter(|l| *l == "START_PROGRAM").count(), 1);
    assert_eq!(lines.iter().filter(|l| *l == "END_PROGRAM").count(), 1);
}

#[test]
fn tac_emission_is_deterministic() {
    let first = tac::render(&compile_to_tac(KITCHEN_SINK).unwrap());
    let second = tac::render(&compile_to_tac(KITCHEN_SINK).unwrap());

    assert_eq!(first, second);
}

#[test]
fn well_formed_tac_is_fully_recognized_by_the_lowering() {
    let sources = [
        "int main(){ int x = 5; x = x + 1; return x; }",
        r#"int main(){ int i = 0; while (i <= 3) { printf("%d", i); i = i + 1; } return 0; }"#,
        r#"int main(){ printf("Hello\n"); return 0; }"#,
        KITCHEN_SINK,
    ];

    for source in &sources {
        let listing = compile_to_asm(source, ListingOptions::empty()).unwrap();

        assert!(
            listing.warnings.is_empty(),
            "advertencias inesperadas para {:?}: {:?}",
            source,
            listing.warnings
        );
        assert!(
            !listing
                .lines
                .iter()
                .any(|line| line.contains("; unrecognized TAC")),
            "una línea cayó a la ruta de comentarios"
        );
    }
}

#[test]
fn malformed_tac_degrades_with_a_warning() {
    let listing = codegen::lower("START_PROGRAM\nFROTZ 1 2 3\nEND_PROGRAM\n", ListingOptions::empty());

    assert_eq!(listing.warnings.len(), 1);
    assert!(listing
        .lines
        .iter()
        .any(|line| line.contains("; unrecognized TAC: FROTZ 1 2 3")));
}

#[test]
fn comparison_lowering_covers_all_six_operators_with_both_branches() {
    let cases = [
        ("<=", "JG"),
        ("==", "JNE"),
        (">", "JLE"),
        ("<", "JGE"),
        (">=", "JL"),
        ("!=", "JE"),
    ];

    for (symbol, jump) in &cases {
        // TAC escrito a mano: el contrato textual admite comparadores
        // que el front end no produce
        let tac = format!(
            "START_PROGRAM\nDECLARE a\na = 1\n_t0 = a {} 2\nIF_FALSE _t0 GOTO L0\na = 2\nGOTO L1\nL0:\na = 3\nL1:\nRETURN a\nEND_PROGRAM\n",
            symbol
        );

        let listing = codegen::lower(&tac, ListingOptions::empty());
        assert!(listing.warnings.is_empty(), "{}: {:?}", symbol, listing.warnings);

        let text = listing.text();
        let jump_line = format!("{:<8}L0", jump);
        assert!(
            text.contains(&jump_line),
            "comparador {}: se esperaba `{}` hacia la rama falsa:\n{}",
            symbol,
            jump,
            text
        );
        assert!(text.contains("JMP     L1"), "falta el salto sobre la rama falsa");
    }
}

#[test]
fn front_end_comparisons_reach_their_inverted_jumps() {
    let cases = [("<=", "JG"), ("==", "JNE"), (">", "JLE")];

    for (symbol, jump) in &cases {
        let source = format!(
            "int main(){{ int a = 1; if (a {} 2) {{ a = 2; }} else {{ a = 3; }} return a; }}",
            symbol
        );

        let listing = compile_to_asm(&source, ListingOptions::empty()).unwrap();
        let expected = format!("{:<8}L0", jump);
        assert!(
            listing
                .lines
                .iter()
                .any(|line| line.trim_start().starts_with(&expected)),
            "comparador {}: no se encontró `{} L0` en el listado",
            symbol,
            jump
        );
    }
}

#[test]
fn listing_carries_data_code_and_support_sections() {
    let listing = compile_to_asm(KITCHEN_SINK, ListingOptions::TRACE_TAC).unwrap();
    let text = listing.text();

    assert!(text.starts_with(".MODEL SMALL"));
    assert!(text.contains(".DATA"));
    assert!(text.contains("msg0 DB 'grande', '$'"));
    assert!(text.contains(".CODE"));
    assert!(text.contains("MAIN PROC"));
    assert!(text.contains("PRINT_NUM PROC"));
    assert!(text.contains("PRINT_NEWLINE PROC"));
    assert!(text.contains("MOV     AH, 4CH"));
    assert!(text.ends_with("END MAIN\n"));
}
