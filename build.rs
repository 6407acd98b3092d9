use chrono::Utc;
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("version.rs");
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let cargo_toml_path = Path::new(&manifest_dir).join("Cargo.toml");

    // Feature API version lives in [package.metadata] so that it can be bumped
    // independently of the crate version
    let feature_api_version = std::fs::read_to_string(&cargo_toml_path)
        .ok()
        .and_then(|content| content.parse::<toml::Table>().ok())
        .and_then(|cargo_toml| {
            cargo_toml
                .get("package")
                .and_then(|p| p.as_table())
                .and_then(|p| p.get("metadata"))
                .and_then(|m| m.as_table())
                .and_then(|m| m.get("feature_api_version"))
                .and_then(|v| v.as_integer())
        })
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let git_hash = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut f = File::create(&dest_path).expect("version.rs must be writable");

    #[allow(clippy::uninlined_format_args)]
    writeln!(
        &mut f,
        r###"pub const FEATURE_API_VERSION: &str = "{}";
pub const BUILD_TIME: &str = "{}";
pub const GIT_HASH: &str = "{}";"###,
        feature_api_version, build_time, git_hash
    )
    .expect("version.rs write");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
