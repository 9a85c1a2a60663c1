/*!
 * CLI Tests
 * Runs the `primes` binary and checks what reaches stdout and the exit status
 */

use pretty_assertions::assert_eq;
use prime_pipeline::{parse_line, Candidate};
use std::process::{Command, Output};

fn primes_bin(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_primes"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("SIEVE_LO")
        .env_remove("SIEVE_HI")
        .output()
        .expect("failed to run primes")
}

fn sorted_primes(output: &Output) -> Vec<Candidate> {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    let mut primes: Vec<_> = stdout
        .lines()
        .map(|line| parse_line(line).unwrap_or_else(|| panic!("bad line {:?}", line)))
        .collect();
    primes.sort_unstable();
    primes
}

#[test]
fn test_default_run_prints_primes_to_35() {
    let output = primes_bin(&[]);

    assert!(output.status.success());
    assert_eq!(
        sorted_primes(&output),
        vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31]
    );
    assert!(output.stderr.is_empty(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_hi_two_prints_one_prime() {
    let output = primes_bin(&["--hi", "2"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "prime 2\n");
}

#[test]
fn test_json_format() {
    let output = primes_bin(&["--hi", "10", "--format", "json"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    for line in stdout.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["prime"].is_u64());
        assert!(value["stage"].is_u64());
        assert!(value["pid"].is_i64());
    }
    assert_eq!(sorted_primes(&output), vec![2, 3, 5, 7]);
}

#[test]
fn test_range_from_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_primes"))
        .env_remove("RUST_LOG")
        .env("SIEVE_HI", "20")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(sorted_primes(&output), vec![2, 3, 5, 7, 11, 13, 17, 19]);
}

#[test]
fn test_range_below_two_is_rejected() {
    let output = primes_bin(&["--lo", "1"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("below 2"), "{}", stderr);
}

#[test]
fn test_crash_still_exits_zero() {
    let output = primes_bin(&["--crash-stage", "2", "--crash-after", "2"]);

    assert!(output.status.success());
    assert_eq!(sorted_primes(&output), vec![2, 3, 5, 7]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("Injected crash in stage 2").count(),
        1,
        "each failure is reported once: {}",
        stderr
    );
}

#[test]
fn test_incomplete_fault_flags_rejected() {
    let output = primes_bin(&["--stall-stage", "1"]);
    assert!(!output.status.success());
}
