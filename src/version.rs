/// Build-time override for release builds, falling back to the package version.
const fn version_or_package(build_version: Option<&'static str>) -> &'static str {
    match build_version {
        Some(version) => version,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Reported by `--version` and `/api/info`.
pub const VERSION: &str = version_or_package(option_env!("LINKBUCKET_VERSION"));
