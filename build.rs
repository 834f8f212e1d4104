use std::{env::var, process::Command};

use which::which;

// Source tarballs have no .git, so the hash can be supplied from outside.
const HASH_ENV: &str = "FUSEPE_GIT_HASH";

fn git_hash() -> Option<String> {
    if let Ok(hash) = var(HASH_ENV) {
        return Some(hash.trim().to_string()).filter(|hash| !hash.is_empty());
    }
    let git = which("git").ok()?;
    let output = Command::new(git)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    String::from_utf8(output.stdout)
        .ok()
        .map(|hash| hash.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed={}", HASH_ENV);
    println!("cargo:rerun-if-env-changed=PROFILE");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = var("CARGO_PKG_VERSION").unwrap();
    match git_hash() {
        Some(hash) => {
            println!("cargo:rustc-env=GIT_HASH={}", hash);
            println!("cargo:rustc-env=FUSEPE_VERSION={} ({})", version, hash);
        }
        None => println!("cargo:rustc-env=FUSEPE_VERSION={}", version),
    }
}
