//! End-to-end tests for the `cpre` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn cpre() -> Command {
    Command::cargo_bin("cpre").expect("binary builds")
}

#[test]
fn preprocesses_a_simple_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.c");
    fs::write(&input, "#define N 3\nint x = N;\n").expect("write input");

    cpre()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("int x = 3 ;"));
}

#[test]
fn define_flag_predefines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.c");
    fs::write(&input, "#ifdef FEATURE\nint on;\n#else\nint off;\n#endif\n").expect("write");

    cpre()
        .arg(&input)
        .arg("-DFEATURE")
        .assert()
        .success()
        .stdout(predicate::str::contains("int on ;"));

    cpre()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("int off ;"));
}

#[test]
fn define_flag_with_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.c");
    fs::write(&input, "int v = VERSION;\n").expect("write");

    cpre()
        .arg(&input)
        .arg("-DVERSION=7")
        .assert()
        .success()
        .stdout(predicate::str::contains("int v = 7 ;"));
}

#[test]
fn include_path_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let incdir = dir.path().join("inc");
    fs::create_dir(&incdir).expect("mkdir");
    fs::write(incdir.join("lib.h"), "#define FROM_LIB 1\n").expect("write header");
    let input = dir.path().join("main.c");
    fs::write(&input, "#include <lib.h>\nint x = FROM_LIB;\n").expect("write");

    cpre()
        .arg(&input)
        .arg("-I")
        .arg(&incdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("int x = 1 ;"));
}

#[test]
fn error_directive_fails_with_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.c");
    fs::write(&input, "#error broken build\n").expect("write");

    cpre()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken build"));
}

#[test]
fn missing_input_fails() {
    cpre()
        .arg("/definitely/not/here.c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open"));
}

#[test]
fn config_file_supplies_defines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.c");
    fs::write(&input, "int v = LEVEL;\n").expect("write");
    let config = dir.path().join("cpre.toml");
    fs::write(&config, "defines = [\"LEVEL=9\"]\n").expect("write config");

    cpre()
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("int v = 9 ;"));
}
