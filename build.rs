//! Build script for prhub - embeds a human-readable version string.
//!
//! The version shown by `prhub --version` is
//! `{CARGO_PKG_VERSION} ({git}) {rustc}`, where `{git}` is
//! `git describe --tags --always --dirty` when a tag is reachable. Without
//! tags it falls back to a pseudo-version `v{version}-{timestamp}-{commit}`,
//! stamped with the commit time for clean trees and the build time for
//! dirty ones.

use std::process::Command;

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    ["src", "build.rs", "Cargo.toml", "Cargo.lock"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", human_readable_version());
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn git(args: &[&str]) -> Option<String> {
    command_output("git", args)
}

/// `None` outside a git checkout. `.cargo-ok` is written by
/// `cargo install --git` and does not count as a local change.
fn is_git_dirty() -> Option<bool> {
    git(&["status", "--porcelain"]).map(|output| {
        output
            .lines()
            .any(|line| line.get(3..).is_some_and(|path| path != ".cargo-ok"))
    })
}

fn pseudo_version() -> String {
    let commit = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = is_git_dirty() == Some(true);

    let commit_time = git(&["log", "-1", "--format=%ct"])
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    let timestamp = match commit_time {
        Some(time) if !dirty => time,
        _ => Utc::now(),
    }
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty { "+dirty" } else { "" };
    format!("v{}-{timestamp}-{commit}{suffix}", env!("CARGO_PKG_VERSION"))
}

fn git_version() -> String {
    match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn human_readable_version() -> String {
    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        Some(format!("({})", git_version())),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
