//! Binary smoke tests for tallyd.

use crate::prelude::*;

#[test]
fn help_prints_usage() {
    tallyd().args(&["--help"]).passes().stdout_has("USAGE");
}

#[test]
fn version_prints_version() {
    tallyd().args(&["--version"]).passes().stdout_has("tallyd");
}

#[test]
fn unexpected_argument_exits_nonzero() {
    tallyd()
        .args(&["--bogus"])
        .fails_with(1)
        .stderr_has("unexpected argument");
}

#[test]
fn missing_config_exits_one() {
    tallyd()
        .without_config()
        .fails_with(1)
        .stderr_has("TALLY_ENV");
}
