use std::fs;

use pretty_assertions::assert_eq;

use janus_driver::{compile, compile_to_string, run_driver, Mode, StopStage};

const FACTORIAL: &str = "int n = 5;

int fact() {
    int k;
    if (n <= 1) return 1;
    k = n;
    n = n - 1;
    return k * fact();
}

int main(void) {
    return fact();
}
";

#[test]
fn assembly_has_data_and_text_sections() {
    let asm = compile_to_string(FACTORIAL, Mode::Assembly).unwrap();

    assert!(asm.starts_with("\t.data\n\t.globl\tn\n\t.align\t2\nn:\n\t.word\t5\n"));
    assert!(asm.contains("\t.ent\tfact\nfact:\n"));
    assert!(asm.contains("\t.ent\tmain\nmain:\n"));
    assert!(asm.contains("\tjal\tfact\n\tnop\n"));
    assert!(asm.contains("main.epilogue:\n"));
    assert!(asm.trim_end().ends_with(".end\tmain"));
}

#[test]
fn translation_ends_with_boilerplate() {
    let py = compile_to_string(FACTORIAL, Mode::Translate).unwrap();

    assert!(py.starts_with("n = ( 5 )\ndef fact():\n    global n\n    k = 0\n    if ( n <= 1 ):\n"));
    assert!(py.contains("    return ( k * fact() )\n"));
    assert!(py.ends_with("    ret=main()\n    sys.exit(ret)\n"));
}

#[test]
fn lexer_errors_name_the_position() {
    let err = compile_to_string("int main(void) {\n  return 1 @ 2;\n}", Mode::Assembly).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("<input>:2:12"), "{}", message);
    assert!(message.contains("'@'"), "{}", message);
}

#[test]
fn parser_errors_are_reported() {
    let err = compile_to_string("int main(void) { return 1 }", Mode::Translate).unwrap_err();

    assert!(err.to_string().starts_with("Parser encountered an error"));
}

#[test]
fn codegen_errors_name_the_function() {
    let err = compile_to_string("int main(void) { return missing; }", Mode::Assembly).unwrap_err();

    assert_eq!(
        err.to_string(),
        "scope analysis of 'main' failed: variable 'missing' is not declared"
    );
}

#[test]
fn unsupported_code_still_translates() {
    let src = "int add(int a, int b) { return a + b; } int main() { return add(1, 2); }";

    assert!(compile_to_string(src, Mode::Assembly).is_err());
    assert!(compile_to_string(src, Mode::Translate).is_ok());
}

#[test]
fn translation_keeps_shadowed_names_apart() {
    let src = "int g; int main(void) { int g = 5; int x = 1; { int x = 2; } return x; }";
    let py = compile_to_string(src, Mode::Translate).unwrap();

    assert!(!py.contains("global g"), "{}", py);
    assert!(py.contains("    g_0 = ( 5 )\n    x = ( 1 )\n    x_1 = ( 2 )\n    return x\n"));
}

#[test]
fn translation_scope_errors_write_nothing() {
    let dir = std::env::temp_dir().join(format!("janus_driver_scope_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let source = dir.join("undeclared.c");
    fs::write(&source, "int main(void) { return missing; }").unwrap();
    let source = source.to_string_lossy().into_owned();

    let err = run_driver(&source, None, Mode::Translate, None).unwrap_err();
    assert!(err.to_string().contains("'missing'"));
    assert!(!dir.join("undeclared.py").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn stop_stages_produce_nothing() {
    let lexed = compile(FACTORIAL, "fact.c", Mode::Assembly, Some(StopStage::Lexer)).unwrap();
    let parsed = compile(FACTORIAL, "fact.c", Mode::Assembly, Some(StopStage::Parser)).unwrap();

    assert!(lexed.is_none());
    assert!(parsed.is_none());

    // stopping after the lexer skips parse errors
    let lexed = compile("int int int", "bad.c", Mode::Assembly, Some(StopStage::Lexer)).unwrap();
    assert!(lexed.is_none());
}

#[test]
fn driver_writes_next_to_the_source() {
    let dir = std::env::temp_dir().join(format!("janus_driver_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let source = dir.join("fact.c");
    fs::write(&source, FACTORIAL).unwrap();
    let source = source.to_string_lossy().into_owned();

    let written = run_driver(&source, None, Mode::Assembly, None).unwrap().unwrap();
    assert_eq!(written, dir.join("fact.s"));
    assert!(fs::read_to_string(&written).unwrap().contains("\t.ent\tmain\n"));

    let explicit = dir.join("out.py").to_string_lossy().into_owned();
    let written = run_driver(&source, Some(&explicit), Mode::Translate, None).unwrap().unwrap();
    assert!(fs::read_to_string(&written).unwrap().starts_with("n = ( 5 )\n"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_compilation_writes_nothing() {
    let dir = std::env::temp_dir().join(format!("janus_driver_fail_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let source = dir.join("broken.c");
    fs::write(&source, "int main(void) { return f(1); }").unwrap();
    let source = source.to_string_lossy().into_owned();

    assert!(run_driver(&source, None, Mode::Assembly, None).is_err());
    assert!(!dir.join("broken.s").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_source_is_an_error() {
    let err = run_driver("/definitely/not/here.c", None, Mode::Translate, None).unwrap_err();

    assert!(err.to_string().contains("Unable to read source file"));
}
