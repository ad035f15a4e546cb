//! End-to-end tests driving the public API and the `.patitoc` file format.

use patitoc::errors::CompileError;
use std::fs::File;
use std::io::Read;

fn compile_quads(src: &str) -> Vec<patitoc::Quadruple> {
    patitoc::compile_source(src).expect("program should compile")
}

#[test]
fn s1_simple_assignment_matches_the_documented_quadruple_sequence() {
    let quads = compile_quads("program p; var x:int; main { x = 1 + 2 * 3; } end");
    let rendered: Vec<String> = quads.iter().map(|q| q.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "(GOTO, , , 1)",
            "(*, 30001, 30002, 20000)",
            "(+, 30000, 20000, 20001)",
            "(=, 20001, , 1000)",
            "(END, , , )",
        ]
    );
}

#[test]
fn s2_if_else_backpatches_both_branches() {
    let quads = compile_quads(
        "program p; var x:int; main { if (x > 0) { x = 1; } else { x = 2; }; } end",
    );
    let gotof = quads.iter().position(|q| q.operator == "GOTOF").unwrap();
    let goto = quads
        .iter()
        .enumerate()
        .find(|(i, q)| *i > 0 && q.operator == "GOTO")
        .map(|(i, _)| i)
        .unwrap();
    let end = quads.iter().position(|q| q.operator == "END").unwrap();

    assert_eq!(quads[gotof].result.parse::<usize>().unwrap(), goto + 1);
    assert_eq!(quads[goto].result.parse::<usize>().unwrap(), end);
}

#[test]
fn s3_while_loop_jumps_back_to_the_condition() {
    let quads =
        compile_quads("program p; var x:int; main { while (x != 0) do { x = x - 1; }; } end");
    let neq = quads.iter().position(|q| q.operator == "!=").unwrap();
    let gotof = quads.iter().position(|q| q.operator == "GOTOF").unwrap();
    let bottom_goto = quads
        .iter()
        .enumerate()
        .find(|(i, q)| *i > gotof && q.operator == "GOTO")
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(quads[bottom_goto].result.parse::<usize>().unwrap(), neq);
    assert_eq!(quads[gotof].result.parse::<usize>().unwrap(), bottom_goto + 1);
}

#[test]
fn s4_function_call_sequences_era_param_gosub() {
    let quads = compile_quads(
        "program p; int f(a:int)[] { return a + 1; } main { print(f(5)); } end",
    );
    let ops: Vec<&str> = quads.iter().map(|q| q.operator.as_str()).collect();
    assert_eq!(
        ops,
        vec![
            "GOTO", "+", "RETURN", "ENDFUNC", "ERA", "PARAM", "GOSUB", "PRINT", "END"
        ]
    );
}

#[test]
fn s5_narrowing_assignment_is_a_type_error() {
    let err = patitoc::compile_source("program p; var x:int; main { x = 1.5; } end").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Semantic(patitoc::errors::SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn s6_repeated_constant_literal_gets_one_address() {
    let quads = compile_quads("program p; var x:int; main { x = 1 + 1; } end");
    let add = quads.iter().find(|q| q.operator == "+").unwrap();
    assert_eq!(add.operand1, add.operand2);
}

#[test]
fn patitoc_round_trip_header_is_stable_across_compiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.patitoc");

    let src = "program roundtrip; var x:int; main { x = 1 + 2; } end";
    {
        let mut file = File::create(&path).unwrap();
        patitoc::compile_and_write(src, &mut file).unwrap();
    }

    let mut bytes = Vec::new();
    File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();

    assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 0x5041_5449);
    assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 1);

    let quad_count = u32::from_le_bytes(bytes[6..10].try_into().unwrap());
    assert!(quad_count > 0);
}

#[test]
fn function_redefinition_is_rejected() {
    let err = patitoc::compile_source(
        "program p; void f()[]{return;} void f()[]{return;} main { } end",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Semantic(patitoc::errors::SemanticError::FunctionRedefinition { .. })
    ));
}

#[test]
fn arity_mismatch_on_call_is_rejected() {
    let err = patitoc::compile_source(
        "program p; int f(a:int)[] { return a; } main { print(f()); } end",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Semantic(patitoc::errors::SemanticError::ArityMismatch { .. })
    ));
}
