use std::path::Path;

use anyhow::{Context, Result, ensure};

use axon::{RunStatus, RuntimeConfig};
use test_support::{Case, CaseClass, load_cases, normalize_output};

fn expected_error(case: &Case) -> Result<String> {
    let file = case
        .spec
        .expected
        .stderr_contains_file
        .as_deref()
        .with_context(|| format!("Missing stderr expectation file in {}", case.name))?;
    Ok(case.read_text(file)?.trim().to_string())
}

fn run_case(case: &Case) -> Result<()> {
    let source = case.source()?;
    let config = RuntimeConfig::from_yaml_str(&case.config_yaml()?)
        .with_context(|| format!("Loading config of {}", case.name))?;
    let outcome = axon::run_with_config(&source, config);

    match case.spec.class {
        CaseClass::RuntimeSuccess => {
            ensure!(
                case.spec.expected.exit_code == 0,
                "Case {} expected exit code must be 0 for runtime_success",
                case.name
            );
            ensure!(
                outcome.status.is_completed(),
                "Case {} failed: {}",
                case.name,
                outcome.status
            );
        }
        CaseClass::ParseError => {
            ensure!(
                case.spec.expected.exit_code == 1,
                "Case {} expected exit code must be 1 for parse_error",
                case.name
            );
            ensure!(
                matches!(outcome.status, RunStatus::ParseError { .. }),
                "Expected parse error in {}, got {}",
                case.name,
                outcome.status
            );
        }
        CaseClass::RuntimeError => {
            ensure!(
                case.spec.expected.exit_code == 1,
                "Case {} expected exit code must be 1 for runtime_error",
                case.name
            );
            ensure!(
                matches!(outcome.status, RunStatus::RuntimeError { .. }),
                "Expected runtime error in {}, got {}",
                case.name,
                outcome.status
            );
        }
    }

    if case.spec.class != CaseClass::RuntimeSuccess {
        let expected = expected_error(case)?;
        let actual = outcome.status.to_string();
        ensure!(
            actual.contains(&expected),
            "Expected error containing '{expected}' in {}, got '{actual}'",
            case.name
        );
    }

    if let Some(stdout_file) = case.spec.expected.stdout_file.as_deref() {
        let expected = case.read_text(stdout_file)?;
        assert_eq!(
            normalize_output(&outcome.stdout()),
            normalize_output(&expected),
            "Output mismatch for {}",
            case.name
        );
    }
    Ok(())
}

#[test]
fn runs_program_cases() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    for case in &cases {
        if case.spec.bench.enabled {
            ensure!(
                !case.spec.bench.tags.is_empty(),
                "Case {} has bench enabled but no tags",
                case.name
            );
        }
        run_case(case)?;
    }
    Ok(())
}

#[test]
fn program_cases_are_deterministic() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    for case in &cases {
        let source = case.source()?;
        let config = RuntimeConfig::from_yaml_str(&case.config_yaml()?)?;
        let first = axon::run_with_config(&source, config.clone());
        let second = axon::run_with_config(&source, config);
        ensure!(
            first.trace == second.trace,
            "Trace of {} differs between runs",
            case.name
        );
    }
    Ok(())
}
