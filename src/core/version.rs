//! Build metadata generated by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Parse the feature API version string from the build script.
/// Falls back to a stable default if parsing fails.
pub fn get_api_version() -> u32 {
    FEATURE_API_VERSION.parse().unwrap_or(20261017)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line version banner used by the CLI
pub fn version_banner() -> String {
    format!(
        "{} (api {}, built {}, git {})",
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        build_time(),
        git_hash()
    )
}
