#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};

use axon::ast::Program;
use axon::{lexer, parser};

/// Benchmark-enabled program cases carrying `tag`, as (label, path) pairs.
pub fn workloads(tag: &str) -> Vec<(String, PathBuf)> {
    test_support::bench_cases(Path::new("tests/programs"), Some(tag))
        .unwrap_or_else(|err| panic!("load bench cases: {err}"))
        .into_iter()
        .map(|case| (case.name, case.program_path))
        .collect()
}

pub fn load_source(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}

pub fn load_program(path: &Path) -> Program {
    let source = load_source(path);
    let tokens = lexer::tokenize(&source)
        .unwrap_or_else(|err| panic!("tokenize {}: {err}", path.display()));
    parser::parse_tokens(tokens).unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}
