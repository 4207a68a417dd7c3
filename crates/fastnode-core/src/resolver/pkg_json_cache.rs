//! Package.json parse cache trait.
//!
//! Provides a trait for caching parsed package.json files with
//! mtime/size stamps for invalidation.

use serde_json::Value;
use std::path::Path;

/// File stamp for cache invalidation.
#[derive(Debug, Clone, Default)]
pub struct PkgJsonStamp {
    /// Modification time in milliseconds since epoch.
    pub mtime_ms: Option<u64>,
    /// File size in bytes.
    pub size: Option<u64>,
}

impl PkgJsonStamp {
    /// Create stamp from a path by reading its metadata.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_path(path: &Path) -> Self {
        if let Ok(meta) = path.metadata() {
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);
            Self {
                mtime_ms,
                size: Some(meta.len()),
            }
        } else {
            Self::default()
        }
    }

    /// Check if the stamp matches the current file state.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn matches(&self, path: &Path) -> bool {
        let Ok(meta) = path.metadata() else {
            return false;
        };

        // Check mtime
        if let Some(expected_mtime) = self.mtime_ms {
            let current_mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);
            if current_mtime != Some(expected_mtime) {
                return false;
            }
        }

        // Check size
        if let Some(expected_size) = self.size {
            if meta.len() != expected_size {
                return false;
            }
        }

        true
    }
}

/// Cached package.json entry.
#[derive(Debug, Clone)]
pub struct CachedPkgJson {
    /// The parsed package.json value.
    pub value: Value,
    /// File stamp for invalidation.
    pub stamp: PkgJsonStamp,
}

/// Trait for caching parsed package.json files.
///
/// Implementations should be thread-safe (Send + Sync).
pub trait PkgJsonCache: Send + Sync + std::fmt::Debug {
    /// Look up a cached package.json by path.
    ///
    /// Returns None if not cached or if the stamp is invalid.
    fn get(&self, path: &Path) -> Option<Value>;

    /// Store a parsed package.json in the cache.
    fn set(&self, path: &Path, value: Value);
}

/// Walk upward from `start` (a file or directory under the package) looking
/// for the nearest `package.json`, backfilling the cache at every directory
/// level visited along the way so a sibling lookup from a nearby file is a
/// single cache hit instead of repeating the walk.
///
/// Returns the `package.json` path and its parsed value, or `None` if none is
/// found before the filesystem root.
pub fn find_nearest_package_json(
    cache: &dyn PkgJsonCache,
    start: &Path,
) -> Option<(std::path::PathBuf, Value)> {
    let mut dir = if start.is_dir() {
        Some(start)
    } else {
        start.parent()
    };

    while let Some(d) = dir {
        let candidate = d.join("package.json");
        if let Some(value) = cache.get(&candidate) {
            return Some((candidate, value));
        }
        if let Ok(bytes) = std::fs::read(&candidate) {
            if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                cache.set(&candidate, value.clone());
                return Some((candidate, value));
            }
        }
        dir = d.parent();
    }

    None
}

/// Evaluate a package.json's `sideEffects` field against a file path relative
/// to the package root.
///
/// `sideEffects` may be:
/// - absent or `true` → every module has side effects (default, safe)
/// - `false` → no module in the package has side effects
/// - an array of glob-like patterns (supporting `*` as a single path-segment
///   wildcard and `**` as a multi-segment wildcard) → only matching paths
///   have side effects
#[must_use]
pub fn has_side_effects(pkg_json: &Value, relative_path: &Path) -> bool {
    match pkg_json.get("sideEffects") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::Array(patterns)) => {
            let rel = relative_path.to_string_lossy().replace('\\', "/");
            patterns.iter().any(|p| {
                p.as_str()
                    .is_some_and(|pattern| glob_match(pattern, &rel))
            })
        }
        Some(_) => true,
    }
}

/// Minimal glob matcher supporting `*` (any run of non-`/` chars) and `**`
/// (any run of chars, including `/`), sufficient for `sideEffects` patterns
/// like `*.css` or `src/**/*.js`.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(pat: &[u8], txt: &[u8]) -> bool {
        match pat.first() {
            None => txt.is_empty(),
            Some(b'*') if pat.get(1) == Some(&b'*') => {
                let rest = &pat[2..];
                (0..=txt.len()).any(|i| matches(rest, &txt[i..]))
            }
            Some(b'*') => {
                let rest = &pat[1..];
                (0..=txt.len())
                    .take_while(|&i| !txt[..i].contains(&b'/'))
                    .any(|i| matches(rest, &txt[i..]))
            }
            Some(&c) => txt.first() == Some(&c) && matches(&pat[1..], &txt[1..]),
        }
    }
    matches(pattern.as_bytes(), text.as_bytes())
}

/// No-op cache implementation (always misses, never stores).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPkgJsonCache;

impl PkgJsonCache for NoPkgJsonCache {
    fn get(&self, _path: &Path) -> Option<Value> {
        None
    }

    fn set(&self, _path: &Path, _value: Value) {
        // No-op
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_stamp_from_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let stamp = PkgJsonStamp::from_path(&file);
        assert!(stamp.mtime_ms.is_some());
        assert!(stamp.size.is_some());
    }

    #[test]
    fn test_stamp_matches() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let stamp = PkgJsonStamp::from_path(&file);
        assert!(stamp.matches(&file));
    }

    #[test]
    fn test_stamp_mismatch_after_write() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let stamp = PkgJsonStamp::from_path(&file);

        // Modify the file
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&file, r#"{"name": "modified"}"#).unwrap();

        // Stamp should no longer match (size changed)
        assert!(!stamp.matches(&file));
    }

    #[test]
    fn test_stamp_nonexistent_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nonexistent.json");

        let stamp = PkgJsonStamp::from_path(&file);
        assert!(stamp.mtime_ms.is_none());
        assert!(stamp.size.is_none());

        // matches() should return false for nonexistent file
        assert!(!stamp.matches(&file));
    }

    #[derive(Debug, Default)]
    struct InMemoryCache(std::sync::Mutex<std::collections::HashMap<std::path::PathBuf, Value>>);

    impl PkgJsonCache for InMemoryCache {
        fn get(&self, path: &Path) -> Option<Value> {
            self.0.lock().unwrap().get(path).cloned()
        }

        fn set(&self, path: &Path, value: Value) {
            self.0.lock().unwrap().insert(path.to_path_buf(), value);
        }
    }

    #[test]
    fn find_nearest_package_json_walks_upward() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "root-pkg"}"#,
        )
        .unwrap();
        let nested = dir.path().join("src/components");
        fs::create_dir_all(&nested).unwrap();

        let cache = InMemoryCache::default();
        let (found, value) = find_nearest_package_json(&cache, &nested.join("Button.tsx"))
            .expect("should find the root package.json");
        assert_eq!(found, dir.path().join("package.json"));
        assert_eq!(value["name"], "root-pkg");
    }

    #[test]
    fn find_nearest_package_json_backfills_cache() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "x"}"#).unwrap();
        let cache = InMemoryCache::default();

        find_nearest_package_json(&cache, dir.path()).unwrap();
        assert!(cache.get(&dir.path().join("package.json")).is_some());
    }

    #[test]
    fn find_nearest_package_json_none_when_missing() {
        let dir = tempdir().unwrap();
        let cache = InMemoryCache::default();
        assert!(find_nearest_package_json(&cache, dir.path()).is_none());
    }

    #[test]
    fn has_side_effects_defaults_true_when_absent() {
        let pkg = serde_json::json!({"name": "x"});
        assert!(has_side_effects(&pkg, Path::new("index.js")));
    }

    #[test]
    fn has_side_effects_false_short_circuits_everything() {
        let pkg = serde_json::json!({"sideEffects": false});
        assert!(!has_side_effects(&pkg, Path::new("anything.js")));
    }

    #[test]
    fn has_side_effects_array_matches_patterns() {
        let pkg = serde_json::json!({"sideEffects": ["*.css", "src/polyfills/**"]});
        assert!(has_side_effects(&pkg, Path::new("button.css")));
        assert!(has_side_effects(&pkg, Path::new("src/polyfills/array.js")));
        assert!(!has_side_effects(&pkg, Path::new("src/utils.js")));
    }

    #[test]
    fn test_no_cache_always_misses() {
        let cache = NoPkgJsonCache;
        let path = Path::new("/fake/package.json");

        assert!(cache.get(path).is_none());

        // set does nothing
        cache.set(path, serde_json::json!({"name": "test"}));

        // still returns None
        assert!(cache.get(path).is_none());
    }
}
