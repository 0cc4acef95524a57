//! Filename masks.

use regex::{Regex, RegexBuilder};

/// Compiles a filename wildcard (`*` any run, `?` one char) into an anchored,
/// case-insensitive regex. Every other character matches literally.
pub fn wildcard_to_regex(mask: &str) -> Result<Regex, regex::Error> {
    let pattern = regex::escape(mask.trim())
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    RegexBuilder::new(&format!("^{pattern}$"))
        .case_insensitive(true)
        .build()
}
