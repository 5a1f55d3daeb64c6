use assert_cmd::Command;
use predicates::prelude::*;

fn analyzer() -> Command {
    Command::cargo_bin("analyzer").expect("binary builds")
}

#[test]
fn test_sentinel_only_prints_banner() {
    analyzer()
        .args(["10", "logger"])
        .write_stdin("<END>\n")
        .assert()
        .success()
        .stdout("Pipeline shutdown complete\n")
        .stderr("");
}

#[test]
fn test_logger_echoes_lines_in_order() {
    analyzer()
        .args(["10", "logger"])
        .write_stdin("a\nb\nc\n<END>\n")
        .assert()
        .success()
        .stdout("[logger] a\n[logger] b\n[logger] c\nPipeline shutdown complete\n");
}

#[test]
fn test_full_chain_output() {
    analyzer()
        .args(["20", "uppercaser", "rotator", "logger", "flipper"])
        .write_stdin("hello\n<END>\n")
        .assert()
        .success()
        .stdout("[logger] OHELL\nPipeline shutdown complete\n");
}

#[test]
fn test_uppercase_expand_rotate_chain() {
    analyzer()
        .args(["10", "uppercaser", "expander", "rotator", "logger"])
        .write_stdin("Abc\n<END>\n")
        .assert()
        .success()
        .stdout("[logger] CA B \nPipeline shutdown complete\n");
}

#[test]
fn test_trailing_space_sentinel_does_not_terminate() {
    analyzer()
        .args(["1", "logger"])
        .write_stdin("<END> \n<END>\n")
        .assert()
        .success()
        .stdout("[logger] <END> \nPipeline shutdown complete\n");
}

#[test]
fn test_input_after_sentinel_not_consumed() {
    analyzer()
        .args(["1", "logger"])
        .write_stdin("<END>\nSHOULD_NOT_APPEAR\n")
        .assert()
        .success()
        .stdout("Pipeline shutdown complete\n");
}

#[test]
fn test_banner_appears_exactly_once() {
    let output = analyzer()
        .args(["10", "logger"])
        .write_stdin("x\n<END>\n")
        .output()
        .expect("run failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Pipeline shutdown complete").count(), 1);
}

#[test]
fn test_missing_arguments_prints_usage_on_stdout() {
    analyzer()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("missing arguments"));
}

#[test]
fn test_missing_stage_list_fails() {
    analyzer()
        .args(["10"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_zero_queue_size_rejected() {
    analyzer()
        .args(["0", "logger"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("positive"));
}

#[test]
fn test_non_numeric_queue_size_rejected() {
    analyzer()
        .args(["abc", "logger"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_unknown_stage_prints_usage() {
    analyzer()
        .args(["10", "no_such_stage"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("unknown stage 'no_such_stage'"));
}

#[test]
fn test_so_suffix_rejected() {
    analyzer()
        .args(["10", "logger.so"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains(".so"));
}

#[test]
fn test_unknown_stage_performs_no_pipeline_work() {
    analyzer()
        .args(["10", "uppercaser", "no_such_stage"])
        .write_stdin("hello\n<END>\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[logger]").not())
        .stdout(predicate::str::contains("Pipeline shutdown complete").not());
}

#[test]
fn test_eof_without_sentinel_still_shuts_down() {
    analyzer()
        .args(["10", "logger"])
        .write_stdin("only line\n")
        .assert()
        .success()
        .stdout("[logger] only line\nPipeline shutdown complete\n");
}

#[test]
fn test_empty_input_shuts_down() {
    analyzer()
        .args(["10", "uppercaser", "logger"])
        .write_stdin("")
        .assert()
        .success()
        .stdout("Pipeline shutdown complete\n");
}

#[test]
fn test_non_utf8_input_passes_through_byte_for_byte() {
    let mut input = vec![0xff, 0xfe, b'z', b'\n'];
    input.extend_from_slice(b"<END>\n");
    let output = analyzer()
        .args(["10", "logger"])
        .write_stdin(input)
        .output()
        .expect("run failed");
    let mut expected = b"[logger] ".to_vec();
    expected.extend_from_slice(&[0xff, 0xfe, b'z', b'\n']);
    expected.extend_from_slice(b"Pipeline shutdown complete\n");
    assert_eq!(output.stdout, expected);
}

#[test]
fn test_usage_lists_available_stages() {
    let output = analyzer().output().expect("run failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "logger",
        "typewriter",
        "uppercaser",
        "rotator",
        "flipper",
        "expander",
    ] {
        assert!(stdout.contains(name), "usage is missing '{name}'");
    }
}
