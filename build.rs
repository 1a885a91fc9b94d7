use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Version shown by `hfwmm --version`. An explicit HFWMM_BUILD_VERSION wins,
/// then the nearest git tag, then a timestamped dev version.
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=HFWMM_BUILD_VERSION");

    let version = std::env::var("HFWMM_BUILD_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_version)
        .unwrap_or_else(|| format!("0.0.0-dev.{}", timestamp()));

    println!("cargo:rustc-env=HFWMM_VERSION={}", version);
}

fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    let version = described.strip_prefix('v').unwrap_or(described);
    match version {
        "" => None,
        v if v.ends_with("-dirty") => Some(format!("{}.{}", v, timestamp())),
        v => Some(v.to_string()),
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
