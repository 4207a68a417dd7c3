//! The live module graph for unbundled dev serving.
//!
//! A mutable, cyclic graph of every module ever requested by the browser
//! (or, for `ssr_imported_modules`, by the SSR runtime). Nodes are never
//! removed once created — only edges are pruned — so that URLs stay stable
//! across HMR updates. See spec §3/§4.4.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable handle into the module arena. Never reused even after a node's
/// edges are pruned to nothing, so cached URLs on the client stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

/// The kind of asset a module represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Js,
    Css,
}

/// Whether a module has declared `import.meta.hot.accept()`.
///
/// `Unknown` means the module has never been served/analyzed yet; HMR
/// propagation must pause (not fail) at such a node, per spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfAccepting {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Cached output of the transform pipeline for one module.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub code: String,
    pub map: Option<String>,
}

/// A single node in the module graph, identified by its served URL.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub id: ModuleId,
    /// The URL the browser requested (may carry a query string).
    pub url: String,
    /// Post-resolution canonical id (absolute path or virtual id).
    pub resolved_id: String,
    /// On-disk path, absent for virtual modules.
    pub file: Option<String>,
    pub module_type: ModuleType,

    pub importers: HashSet<ModuleId>,
    pub imported_modules: HashSet<ModuleId>,
    pub ssr_imported_modules: HashSet<ModuleId>,
    /// Reverse of `ssr_imported_modules`, kept so SSR invalidation can walk
    /// upward the same way browser invalidation walks `importers`.
    pub ssr_importers: HashSet<ModuleId>,

    pub accepted_hmr_deps: HashSet<ModuleId>,
    /// `None` means "accepts all exports" (full self-accept, not partial);
    /// `Some(names)` means partial accept of exactly those export names.
    pub accepted_hmr_exports: Option<HashSet<String>>,
    /// Binding names this module imports from each of its deps, used to
    /// decide whether a partially-accepting dep still requires propagation.
    pub imported_bindings: HashMap<ModuleId, HashSet<String>>,

    pub is_self_accepting: SelfAccepting,

    pub transform_result: Option<TransformResult>,
    pub ssr_transform_result: Option<TransformResult>,

    pub last_hmr_timestamp: u64,
    pub last_invalidation_timestamp: u64,
    pub last_hmr_invalidation_received: bool,
}

impl ModuleNode {
    fn new(id: ModuleId, url: String, resolved_id: String, file: Option<String>, module_type: ModuleType) -> Self {
        Self {
            id,
            url,
            resolved_id,
            file,
            module_type,
            importers: HashSet::default(),
            imported_modules: HashSet::default(),
            ssr_imported_modules: HashSet::default(),
            ssr_importers: HashSet::default(),
            accepted_hmr_deps: HashSet::default(),
            accepted_hmr_exports: None,
            imported_bindings: HashMap::default(),
            is_self_accepting: SelfAccepting::Unknown,
            transform_result: None,
            ssr_transform_result: None,
            last_hmr_timestamp: 0,
            last_invalidation_timestamp: 0,
            last_hmr_invalidation_received: false,
        }
    }
}

/// What a fresh URL resolves to, supplied by the caller of
/// `ensure_entry_from_url` since resolution itself is the resolver's (C1)
/// job, not the graph's.
pub struct EntryResolution {
    pub resolved_id: String,
    pub file: Option<String>,
    pub module_type: ModuleType,
}

struct Inner {
    nodes: Vec<ModuleNode>,
    url_to_id: HashMap<String, ModuleId>,
    file_to_ids: HashMap<String, HashSet<ModuleId>>,
    /// Modules that failed to resolve on their last serve attempt; re-queued
    /// for re-resolution when their target file is (re)created. Keyed by
    /// the specifier that failed, value is the set of importer module ids.
    resolve_failed: HashMap<String, HashSet<ModuleId>>,
}

/// The module graph. Readers may run concurrently; at most one writer may
/// hold the lock at a time (spec §4.4 "Ordering").
pub struct ModuleGraph {
    inner: RwLock<Inner>,
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                nodes: Vec::new(),
                url_to_id: HashMap::default(),
                file_to_ids: HashMap::default(),
                resolve_failed: HashMap::default(),
            }),
        }
    }

    /// Create or return the node for `url`. `resolve` is invoked only the
    /// first time this URL is seen; the mapping is remembered afterward.
    ///
    /// Per spec invariant: two URLs differing only in the timestamp query
    /// resolve to the same node. Callers are expected to strip `?t=`/`?v=`
    /// from `url` before calling this (see `dev::resolve::strip_version_query`).
    pub fn ensure_entry_from_url(
        &self,
        url: &str,
        resolve: impl FnOnce() -> EntryResolution,
    ) -> ModuleId {
        {
            let inner = self.inner.read().unwrap();
            if let Some(&id) = inner.url_to_id.get(url) {
                return id;
            }
        }

        let mut inner = self.inner.write().unwrap();
        // Re-check under the write lock in case of a race with another writer.
        if let Some(&id) = inner.url_to_id.get(url) {
            return id;
        }

        let EntryResolution {
            resolved_id,
            file,
            module_type,
        } = resolve();

        let id = ModuleId(inner.nodes.len() as u32);
        let node = ModuleNode::new(id, url.to_string(), resolved_id, file.clone(), module_type);
        inner.nodes.push(node);
        inner.url_to_id.insert(url.to_string(), id);
        if let Some(file) = file {
            inner.file_to_ids.entry(file).or_default().insert(id);
        }
        id
    }

    /// Look up an existing node's id by URL without creating one.
    #[must_use]
    pub fn id_by_url(&self, url: &str) -> Option<ModuleId> {
        self.inner.read().unwrap().url_to_id.get(url).copied()
    }

    /// All module ids backed by the given on-disk file. One file may back
    /// several URLs (different query strings, or js+css for a `.vue`-style
    /// multi-block file).
    #[must_use]
    pub fn get_modules_by_file(&self, file: &str) -> Vec<ModuleId> {
        self.inner
            .read()
            .unwrap()
            .file_to_ids
            .get(file)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Run `f` with read access to a node.
    pub fn with_node<R>(&self, id: ModuleId, f: impl FnOnce(&ModuleNode) -> R) -> Option<R> {
        let inner = self.inner.read().unwrap();
        inner.nodes.get(id.0 as usize).map(f)
    }

    #[must_use]
    pub fn url_of(&self, id: ModuleId) -> Option<String> {
        self.with_node(id, |n| n.url.clone())
    }

    #[must_use]
    pub fn is_self_accepting(&self, id: ModuleId) -> SelfAccepting {
        self.with_node(id, |n| n.is_self_accepting).unwrap_or_default()
    }

    #[must_use]
    pub fn module_type(&self, id: ModuleId) -> Option<ModuleType> {
        self.with_node(id, |n| n.module_type)
    }

    #[must_use]
    pub fn importers_of(&self, id: ModuleId) -> Vec<ModuleId> {
        self.with_node(id, |n| n.importers.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_importers(&self, id: ModuleId) -> bool {
        self.with_node(id, |n| !n.importers.is_empty()).unwrap_or(true)
    }

    #[must_use]
    pub fn accepted_hmr_deps(&self, id: ModuleId) -> HashSet<ModuleId> {
        self.with_node(id, |n| n.accepted_hmr_deps.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn accepted_hmr_exports(&self, id: ModuleId) -> Option<HashSet<String>> {
        self.with_node(id, |n| n.accepted_hmr_exports.clone()).flatten()
    }

    #[must_use]
    pub fn imported_bindings_from(&self, importer: ModuleId, dep: ModuleId) -> HashSet<String> {
        self.with_node(importer, |n| {
            n.imported_bindings.get(&dep).cloned().unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Atomically replace `mod_id`'s outgoing edges and HMR metadata.
    /// Returns the set of modules that were imported before this call but
    /// are no longer imported after it ("pruned").
    #[allow(clippy::too_many_arguments)]
    pub fn update_module_info(
        &self,
        mod_id: ModuleId,
        imported: &[ModuleId],
        imported_bindings: HashMap<ModuleId, HashSet<String>>,
        accepted_deps: &[ModuleId],
        accepted_exports: Option<HashSet<String>>,
        is_self_accepting: bool,
        ssr: bool,
    ) -> HashSet<ModuleId> {
        let mut inner = self.inner.write().unwrap();
        let new_imports: HashSet<ModuleId> = imported.iter().copied().collect();

        let old_imports: HashSet<ModuleId> = {
            let node = &inner.nodes[mod_id.0 as usize];
            if ssr {
                node.ssr_imported_modules.clone()
            } else {
                node.imported_modules.clone()
            }
        };

        let pruned: HashSet<ModuleId> = old_imports.difference(&new_imports).copied().collect();
        let added: HashSet<ModuleId> = new_imports.difference(&old_imports).copied().collect();

        // Flip reverse edges on the removed/added deps.
        for removed in &pruned {
            if let Some(dep) = inner.nodes.get_mut(removed.0 as usize) {
                if ssr {
                    dep.ssr_importers.remove(&mod_id);
                } else {
                    dep.importers.remove(&mod_id);
                }
            }
        }
        for add in &added {
            if let Some(dep) = inner.nodes.get_mut(add.0 as usize) {
                if ssr {
                    dep.ssr_importers.insert(mod_id);
                } else {
                    dep.importers.insert(mod_id);
                }
            }
        }

        let node = &mut inner.nodes[mod_id.0 as usize];
        if ssr {
            node.ssr_imported_modules = new_imports;
        } else {
            node.imported_modules = new_imports;
        }
        node.imported_bindings = imported_bindings;
        node.accepted_hmr_deps = accepted_deps.iter().copied().collect();
        node.accepted_hmr_exports = accepted_exports;
        node.is_self_accepting = if is_self_accepting {
            SelfAccepting::Yes
        } else {
            SelfAccepting::No
        };

        pruned
    }

    /// Clear cached transform results on `mod_id`, bump its invalidation
    /// timestamp, and recursively invalidate every importer that does not
    /// explicitly accept `mod_id`. `seen` deduplicates and guards cycles.
    pub fn invalidate_module(&self, mod_id: ModuleId, seen: &mut HashSet<ModuleId>, timestamp: u64, is_hmr: bool) {
        if !seen.insert(mod_id) {
            return;
        }

        let importers = {
            let mut inner = self.inner.write().unwrap();
            let Some(node) = inner.nodes.get_mut(mod_id.0 as usize) else {
                return;
            };
            node.transform_result = None;
            node.ssr_transform_result = None;
            node.last_invalidation_timestamp = timestamp;
            if is_hmr {
                node.last_hmr_timestamp = timestamp;
            }
            node.importers.clone()
        };

        for importer in importers {
            let accepts_me = self
                .with_node(importer, |n| n.accepted_hmr_deps.contains(&mod_id))
                .unwrap_or(false);
            if !accepts_me {
                self.invalidate_module(importer, seen, timestamp, is_hmr);
            }
        }
    }

    /// Bump every node's invalidation timestamp (full reload / config change).
    pub fn invalidate_all(&self) {
        let timestamp = now_ms();
        let mut inner = self.inner.write().unwrap();
        for node in &mut inner.nodes {
            node.transform_result = None;
            node.ssr_transform_result = None;
            node.last_invalidation_timestamp = timestamp;
        }
    }

    pub fn set_transform_result(&self, id: ModuleId, result: TransformResult, ssr: bool) {
        let mut inner = self.inner.write().unwrap();
        if let Some(node) = inner.nodes.get_mut(id.0 as usize) {
            if ssr {
                node.ssr_transform_result = Some(result);
            } else {
                node.transform_result = Some(result);
            }
        }
    }

    #[must_use]
    pub fn transform_result(&self, id: ModuleId, ssr: bool) -> Option<TransformResult> {
        self.with_node(id, |n| {
            if ssr {
                n.ssr_transform_result.clone()
            } else {
                n.transform_result.clone()
            }
        })
        .flatten()
    }

    /// Record that `importer` failed to resolve `specifier`, so a later
    /// `create` event for that path can re-queue `importer` for a retry
    /// (spec §8 scenario 3).
    pub fn record_resolve_failure(&self, specifier: &str, importer: ModuleId) {
        let mut inner = self.inner.write().unwrap();
        inner
            .resolve_failed
            .entry(specifier.to_string())
            .or_default()
            .insert(importer);
    }

    /// Take (and clear) the importers previously recorded as failing to
    /// resolve `specifier`.
    #[must_use]
    pub fn take_resolve_failed(&self, specifier: &str) -> HashSet<ModuleId> {
        self.inner
            .write()
            .unwrap()
            .resolve_failed
            .remove(specifier)
            .unwrap_or_default()
    }

    /// Walk the SSR import graph upward from `start`, collecting every
    /// module whose `last_hmr_timestamp` equals `timestamp` (i.e. was
    /// invalidated in the same batch). Used to build `ssr_invalidates`.
    #[must_use]
    pub fn ssr_invalidation_set(&self, start: ModuleId, timestamp: u64) -> Vec<ModuleId> {
        let mut seen = HashSet::default();
        let mut out = Vec::new();
        let mut queue = vec![start];
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            let matches = self
                .with_node(id, |n| n.last_hmr_timestamp == timestamp)
                .unwrap_or(false);
            if matches {
                out.push(id);
                let ssr_importers = self.with_node(id, |n| n.ssr_importers.clone()).unwrap_or_default();
                queue.extend(ssr_importers);
            }
        }
        out
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().unwrap().nodes.len()
    }
}

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, ty: ModuleType) -> impl FnOnce() -> EntryResolution + '_ {
        move || EntryResolution {
            resolved_id: id.to_string(),
            file: Some(id.to_string()),
            module_type: ty,
        }
    }

    #[test]
    fn ensure_entry_is_idempotent() {
        let graph = ModuleGraph::new();
        let a1 = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let a2 = graph.ensure_entry_from_url("/src/a.js", || panic!("must not re-resolve"));
        assert_eq!(a1, a2);
    }

    #[test]
    fn edges_are_bidirectional() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let b = graph.ensure_entry_from_url("/src/b.js", entry("/proj/src/b.js", ModuleType::Js));

        graph.update_module_info(a, &[b], HashMap::default(), &[], None, false, false);

        assert!(graph.with_node(a, |n| n.imported_modules.contains(&b)).unwrap());
        assert!(graph.with_node(b, |n| n.importers.contains(&a)).unwrap());
    }

    #[test]
    fn update_module_info_prunes_removed_edges() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let b = graph.ensure_entry_from_url("/src/b.js", entry("/proj/src/b.js", ModuleType::Js));
        let c = graph.ensure_entry_from_url("/src/c.js", entry("/proj/src/c.js", ModuleType::Js));

        graph.update_module_info(a, &[b, c], HashMap::default(), &[], None, false, false);
        let pruned = graph.update_module_info(a, &[b], HashMap::default(), &[], None, false, false);

        assert_eq!(pruned, HashSet::from_iter([c]));
        assert!(!graph.with_node(c, |n| n.importers.contains(&a)).unwrap());
        assert!(graph.with_node(b, |n| n.importers.contains(&a)).unwrap());
    }

    #[test]
    fn invalidate_module_clears_cache_and_bumps_timestamp() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        graph.set_transform_result(
            a,
            TransformResult {
                code: "x".into(),
                map: None,
            },
            false,
        );

        let mut seen = HashSet::default();
        graph.invalidate_module(a, &mut seen, 42, true);

        assert!(graph.transform_result(a, false).is_none());
        assert!(graph.with_node(a, |n| n.last_invalidation_timestamp).unwrap() > 0);
    }

    #[test]
    fn invalidate_stops_at_accepting_importer() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let b = graph.ensure_entry_from_url("/src/b.js", entry("/proj/src/b.js", ModuleType::Js));
        graph.update_module_info(a, &[b], HashMap::default(), &[], None, false, false);
        // a accepts b explicitly
        graph.update_module_info(a, &[b], HashMap::default(), &[b], None, false, false);

        graph.set_transform_result(a, TransformResult { code: "a".into(), map: None }, false);

        let mut seen = HashSet::default();
        graph.invalidate_module(b, &mut seen, 1, true);

        // a accepted b, so a's own cache is untouched
        assert!(graph.transform_result(a, false).is_some());
    }

    #[test]
    fn invalidate_terminates_on_cycles() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let b = graph.ensure_entry_from_url("/src/b.js", entry("/proj/src/b.js", ModuleType::Js));
        graph.update_module_info(a, &[b], HashMap::default(), &[], None, false, false);
        graph.update_module_info(b, &[a], HashMap::default(), &[], None, false, false);

        let mut seen = HashSet::default();
        graph.invalidate_module(a, &mut seen, 1, true);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn multiple_urls_can_share_one_file() {
        let graph = ModuleGraph::new();
        graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        graph.ensure_entry_from_url("/src/a.js?t=123", entry("/proj/src/a.js", ModuleType::Js));

        let ids = graph.get_modules_by_file("/proj/src/a.js");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn ssr_invalidation_set_walks_matching_timestamp_only() {
        let graph = ModuleGraph::new();
        let a = graph.ensure_entry_from_url("/src/a.js", entry("/proj/src/a.js", ModuleType::Js));
        let b = graph.ensure_entry_from_url("/src/b.js", entry("/proj/src/b.js", ModuleType::Js));
        graph.update_module_info(a, &[b], HashMap::default(), &[], None, false, true);

        let mut seen = HashSet::default();
        graph.invalidate_module(a, &mut seen, 100, true);
        graph.invalidate_module(b, &mut seen, 100, true);

        let set = graph.ssr_invalidation_set(b, 100);
        assert!(set.contains(&a));
        assert!(set.contains(&b));
    }
}
