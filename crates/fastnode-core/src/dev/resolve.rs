//! The dev-server specifier resolver (spec §4.1).
//!
//! Wraps the shared node-style resolver (`crate::resolver::v0`) with the
//! extra cascade steps a dev server needs that a static bundle build does
//! not: virtual module ids, the `/@fs/`, `/@modules/` and `/@style/` URL
//! prefixes the browser sends back, root-absolute URLs, and redirecting
//! bare specifiers to their pre-bundled output when one exists.

use crate::resolver::{resolve_with_kind, PkgJsonCache, ResolutionKind, ResolveContext, ResolveStatus, ResolverConfig};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Node builtins with no browser equivalent. Not exhaustive, covers the
/// common ones a misguided import would name.
const NODE_BUILTINS: &[&str] = &[
    "fs", "path", "os", "crypto", "http", "https", "net", "tls", "child_process", "cluster",
    "dgram", "dns", "events", "stream", "util", "zlib", "url", "querystring", "assert", "buffer",
    "process", "readline", "repl", "tty", "v8", "vm", "worker_threads",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevResolveKind {
    /// A plain on-disk file, served with a rewritten body.
    File,
    /// A pre-bundled dependency chunk under `.howth/deps`.
    OptimizedDep,
    /// A virtual module with no backing file (`\0`-prefixed internal id or
    /// a `virtual:`-namespaced plugin id).
    Virtual,
    /// An absolute http(s)/protocol-relative URL; served unmodified.
    External,
}

#[derive(Debug, Clone)]
pub struct DevResolveResult {
    pub kind: DevResolveKind,
    /// On-disk path for `File`/`OptimizedDep`, `None` otherwise.
    pub file: Option<PathBuf>,
    /// The id to use as the module graph key / plugin-visible id.
    pub id: String,
}

#[derive(Debug, Clone)]
pub enum DevResolveError {
    Invalid(String),
    UnsupportedScheme(String),
    NotFound {
        specifier: String,
        importer: Option<String>,
        tried: Vec<PathBuf>,
    },
    OutsideRoot(PathBuf),
    NodeBuiltin(String),
}

impl std::fmt::Display for DevResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(s) => write!(f, "invalid specifier: {s}"),
            Self::UnsupportedScheme(s) => write!(f, "unsupported scheme in specifier: {s}"),
            Self::NotFound { specifier, importer, .. } => match importer {
                Some(imp) => write!(f, "failed to resolve \"{specifier}\" from \"{imp}\""),
                None => write!(f, "failed to resolve \"{specifier}\""),
            },
            Self::OutsideRoot(p) => write!(f, "resolved path escapes project root: {}", p.display()),
            Self::NodeBuiltin(s) => write!(f, "\"{s}\" is a Node builtin with no browser polyfill"),
        }
    }
}

impl std::error::Error for DevResolveError {}

/// Strip the `?t=...` / `?v=...` cache-busting query Vite-style clients
/// append, so the stripped URL is stable as a module-graph key.
#[must_use]
pub fn strip_version_query(url: &str) -> &str {
    let Some(q_pos) = url.find('?') else {
        return url;
    };
    let (path, query) = url.split_at(q_pos);
    let kept: Vec<&str> = query[1..]
        .split('&')
        .filter(|kv| !kv.starts_with("t=") && !kv.starts_with("v="))
        .collect();
    if kept.is_empty() {
        path
    } else {
        // Caller only needs the path for graph-keying purposes; callers that
        // need the remaining query (e.g. `?import`, `?raw`) use the original.
        url
    }
}

fn is_external(spec: &str) -> bool {
    spec.starts_with("http://")
        || spec.starts_with("https://")
        || spec.starts_with("//")
        || spec.starts_with("data:")
}

/// Resolve one import specifier seen while serving `importer` (the file
/// that contains the import statement; `None` for an HTML entry request).
///
/// `ssr` externalizes Node builtins (and, in the future, SSR-external
/// packages) instead of failing on them, since the server-rendered code
/// actually runs in Node and can `require()` them directly. `scan` is set
/// during dependency discovery crawls, where a bare specifier must resolve
/// to its real on-disk location rather than redirect to a pre-bundled
/// chunk that may not exist yet.
#[allow(clippy::too_many_arguments)]
pub fn resolve_dev_import(
    root: &Path,
    importer: Option<&Path>,
    specifier: &str,
    deps_dir: &Path,
    has_optimized_dep: impl Fn(&str) -> Option<PathBuf>,
    alias: &std::collections::HashMap<String, String>,
    pkg_json_cache: Option<&dyn PkgJsonCache>,
    ssr: bool,
    scan: bool,
) -> Result<DevResolveResult, DevResolveError> {
    if specifier.is_empty() {
        return Err(DevResolveError::Invalid(specifier.to_string()));
    }

    // Step 1: virtual module guard. Internal ids carry a NUL prefix so they
    // can never collide with a real path; plugin-declared virtual modules
    // use the `virtual:` namespace convention.
    if let Some(rest) = specifier.strip_prefix('\0') {
        return Ok(DevResolveResult {
            kind: DevResolveKind::Virtual,
            file: None,
            id: format!("\0{rest}"),
        });
    }
    if specifier.starts_with("virtual:") {
        return Ok(DevResolveResult {
            kind: DevResolveKind::Virtual,
            file: None,
            id: format!("\0{specifier}"),
        });
    }

    // Step 2: already-rewritten browser-facing prefixes.
    if let Some(fs_path) = specifier.strip_prefix("/@fs/") {
        let path = PathBuf::from(format!("/{fs_path}"));
        return finish_file(path, root);
    }
    if let Some(rest) = specifier.strip_prefix("/@style/") {
        return resolve_dev_import(root, importer, rest, deps_dir, has_optimized_dep, alias, pkg_json_cache, ssr, scan);
    }
    if let Some(pkg) = specifier.strip_prefix("/@modules/") {
        return resolve_bare(root, pkg, deps_dir, &has_optimized_dep, pkg_json_cache, scan);
    }

    // Step 3: root-absolute URL (served relative to project root, not fs root).
    if let Some(rel) = specifier.strip_prefix('/') {
        if !rel.starts_with('@') {
            let path = root.join(rel);
            return finish_file(path, root);
        }
    }

    // Step 4/5: relative or filesystem-absolute specifier.
    if specifier.starts_with("./") || specifier.starts_with("../") || is_drive_absolute(specifier) {
        let parent = importer
            .and_then(Path::parent)
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        let ctx = resolver_ctx(root, &parent, pkg_json_cache);
        let result = resolve_with_kind(&ctx, specifier, ResolutionKind::Import);
        return match result.status {
            ResolveStatus::Resolved => finish_file(result.resolved.unwrap(), root),
            ResolveStatus::Unresolved => {
                debug!(specifier, importer = ?importer, "relative import failed to resolve");
                Err(DevResolveError::NotFound {
                    specifier: specifier.to_string(),
                    importer: importer.map(|p| p.display().to_string()),
                    tried: result.tried,
                })
            }
        };
    }

    // Step 6: external / data URLs pass through untouched.
    if is_external(specifier) {
        return Ok(DevResolveResult {
            kind: DevResolveKind::External,
            file: None,
            id: specifier.to_string(),
        });
    }

    // Step 7: alias table (checked before the node_modules walk, as Vite does).
    if let Some(target) = alias.get(specifier) {
        return resolve_dev_import(root, importer, target, deps_dir, has_optimized_dep, alias, pkg_json_cache, ssr, scan);
    }
    for (from, to) in alias {
        if let Some(rest) = specifier.strip_prefix(from.as_str()) {
            let rewritten = format!("{to}{rest}");
            return resolve_dev_import(root, importer, &rewritten, deps_dir, has_optimized_dep, alias, pkg_json_cache, ssr, scan);
        }
    }

    if NODE_BUILTINS.contains(&specifier) {
        if ssr {
            // The SSR render actually runs in Node, so the builtin can be
            // `require()`d at runtime instead of failing the resolve.
            debug!(specifier, "externalizing node builtin for ssr");
            return Ok(DevResolveResult {
                kind: DevResolveKind::External,
                file: None,
                id: specifier.to_string(),
            });
        }
        // Browser code gets a virtual stub that throws on first use, so an
        // unreachable codepath referencing a builtin doesn't kill the whole
        // module graph at resolve time.
        debug!(specifier, "stubbing node builtin for browser");
        return Ok(DevResolveResult {
            kind: DevResolveKind::Virtual,
            file: None,
            id: format!("\0node-builtin:{specifier}"),
        });
    }

    // Step 8: bare specifier. Pre-bundled deps redirect before touching
    // node_modules at all, unless we're scanning for dependencies to
    // optimize in the first place.
    resolve_bare(root, specifier, deps_dir, &has_optimized_dep, pkg_json_cache, scan)
}

fn is_drive_absolute(spec: &str) -> bool {
    let chars: Vec<char> = spec.chars().collect();
    chars.len() >= 3 && chars[0].is_ascii_alphabetic() && chars[1] == ':' && (chars[2] == '\\' || chars[2] == '/')
}

static DEFAULT_RESOLVER_CONFIG: OnceLock<ResolverConfig> = OnceLock::new();

fn resolver_ctx<'a>(root: &Path, parent: &Path, pkg_json_cache: Option<&'a dyn PkgJsonCache>) -> ResolveContext<'a> {
    ResolveContext {
        cwd: root.to_path_buf(),
        parent: parent.to_path_buf(),
        channel: "dev".to_string(),
        config: DEFAULT_RESOLVER_CONFIG.get_or_init(ResolverConfig::default),
        pkg_json_cache,
    }
}

fn finish_file(path: PathBuf, root: &Path) -> Result<DevResolveResult, DevResolveError> {
    let canon = path.canonicalize().unwrap_or(path);
    if !canon.starts_with(root) {
        return Err(DevResolveError::OutsideRoot(canon));
    }
    Ok(DevResolveResult {
        kind: DevResolveKind::File,
        id: canon.display().to_string(),
        file: Some(canon),
    })
}

fn resolve_bare(
    root: &Path,
    specifier: &str,
    deps_dir: &Path,
    has_optimized_dep: &impl Fn(&str) -> Option<PathBuf>,
    pkg_json_cache: Option<&dyn PkgJsonCache>,
    scan: bool,
) -> Result<DevResolveResult, DevResolveError> {
    let pkg_name = package_name_of(specifier);
    if !scan {
        if let Some(chunk) = has_optimized_dep(&pkg_name) {
            let _ = deps_dir;
            return Ok(DevResolveResult {
                kind: DevResolveKind::OptimizedDep,
                id: chunk.display().to_string(),
                file: Some(chunk),
            });
        }
    }

    let ctx = resolver_ctx(root, root, pkg_json_cache);
    let result = resolve_with_kind(&ctx, specifier, ResolutionKind::Import);
    match result.status {
        ResolveStatus::Resolved => finish_file(result.resolved.unwrap(), root),
        ResolveStatus::Unresolved => {
            debug!(specifier, "bare specifier failed to resolve");
            Err(DevResolveError::NotFound {
                specifier: specifier.to_string(),
                importer: None,
                tried: result.tried,
            })
        }
    }
}

fn package_name_of(specifier: &str) -> String {
    if let Some(rest) = specifier.strip_prefix('@') {
        if let Some(slash) = rest.find('/') {
            return format!("@{}", &rest[..slash]);
        }
        return specifier.to_string();
    }
    specifier.split('/').next().unwrap_or(specifier).to_string()
}
