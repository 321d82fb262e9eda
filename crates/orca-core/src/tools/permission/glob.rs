//! Glob patterns for permission rules
//!
//! Supports `*`, `**`, `?`, `[...]` classes and `{a,b}` alternation. In path
//! mode `*` and `?` stop at `/`; otherwise they match anything, which is what
//! command and tool-name patterns want.

use dashmap::DashMap;
use globset::GlobBuilder;
use tracing::warn;

/// Whether a string contains glob metacharacters
pub fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Compile a glob pattern into a matcher
pub fn compile_glob(pattern: &str, path_mode: bool) -> Result<globset::GlobMatcher, globset::Error> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(path_mode)
        .backslash_escape(true)
        .build()?;
    Ok(glob.compile_matcher())
}

/// Glob matcher with a compiled-pattern cache
#[derive(Debug, Default)]
pub struct GlobMatcher {
    cache: DashMap<(String, bool), Option<globset::GlobMatcher>>,
}

impl GlobMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `text` against `pattern`; malformed patterns never match
    pub fn matches(&self, pattern: &str, text: &str, path_mode: bool) -> bool {
        let key = (pattern.to_string(), path_mode);
        if let Some(entry) = self.cache.get(&key) {
            return entry.as_ref().is_some_and(|glob| glob.is_match(text));
        }

        let compiled = match compile_glob(pattern, path_mode) {
            Ok(glob) => Some(glob),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "invalid glob pattern");
                None
            }
        };
        let matched = compiled.as_ref().is_some_and(|glob| glob.is_match(text));
        self.cache.insert(key, compiled);
        matched
    }

    /// Path match; patterns without `/` also match the basename
    pub fn matches_path(&self, pattern: &str, path: &str) -> bool {
        if self.matches(pattern, path, true) {
            return true;
        }
        if pattern.contains('/') {
            return false;
        }
        let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        basename != path && self.matches(pattern, basename, true)
    }
}
