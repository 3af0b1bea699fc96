// Build script to inject version information from git tags
//
// Falls back to CARGO_PKG_VERSION when git is unavailable at build time.

use std::process::Command;

fn main() {
    let version = get_git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=TRACELOG_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn get_git_version() -> Option<String> {
    // "v0.1.0", "v0.1.0-5-gabc123", or "abc123-dirty"
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let version = String::from_utf8(output.stdout).ok()?;
    let version = version.trim();

    if let Some(tagged) = version.strip_prefix('v') {
        // Keep only the tag part of "0.1.0-5-gabc123"
        return Some(tagged.split('-').next().unwrap_or(tagged).to_string());
    }

    let base_version = env!("CARGO_PKG_VERSION");
    match version.strip_suffix("-dirty") {
        Some(clean) => Some(format!("{}-{}-dirty", base_version, clean)),
        None => Some(format!("{}-{}", base_version, version)),
    }
}
