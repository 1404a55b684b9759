/// Version reported by `--version`, including the library it was built with.
///
/// clap prefixes this with the binary name.
pub fn get_version_string() -> String {
    format!(
        "{} (libretag {})",
        env!("CARGO_PKG_VERSION"),
        libretag::version()
    )
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
