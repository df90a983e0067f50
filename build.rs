use std::process::Command;

/// Short commit id plus a `-dirty` suffix for uncommitted changes, or
/// `unknown` outside a git checkout.
fn describe_commit() -> String {
    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn main() {
    // Shown by `tally --version`
    println!("cargo:rustc-env=TALLY_BUILD_COMMIT={}", describe_commit());

    // The embedded fallback kernel is compiled in with include_str!
    for path in [".git/HEAD", ".git/index", "kernels/match_kernel.cl"] {
        println!("cargo:rerun-if-changed={path}");
    }
}
