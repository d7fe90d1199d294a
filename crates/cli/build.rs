use std::env;
use std::process::Command;

// Build metadata for `soa-recon --version`: "<commit>[-dirty], <profile>" plus target.
//
// Release tarballs carry no .git, so packagers can pin the commit through
// SOA_RECON_COMMIT in the build environment.
fn main() {
    println!("cargo:rerun-if-env-changed=SOA_RECON_COMMIT");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");

    let revision = match env::var("SOA_RECON_COMMIT") {
        Ok(pinned) if !pinned.trim().is_empty() => pinned.trim().to_string(),
        _ => git_revision().unwrap_or_else(|| "unknown".into()),
    };
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".into());
    println!("cargo:rustc-env=SOA_RECON_BUILD={revision}, {profile}");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".into());
    println!("cargo:rustc-env=SOA_RECON_TARGET={target}");
}

fn git_revision() -> Option<String> {
    let commit = git(&["rev-parse", "--short=7", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some();
    Some(if dirty { format!("{commit}-dirty") } else { commit })
}

/// Trimmed stdout of a successful git invocation; `None` when git is
/// missing, fails, or prints nothing.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
