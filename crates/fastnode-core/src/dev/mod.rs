//! Vite-compatible unbundled development server.
//!
//! Serves individual ES modules on demand instead of a single bundle.
//! Each request triggers a resolve → load → transpile → transform → rewrite
//! pipeline, with results cached until the source file changes.

pub mod config;
pub mod env;
pub mod graph;
pub mod hmr;
pub mod prebundle;
pub mod resolve;
pub mod rewrite;
pub mod transform;
pub mod transport;

pub use config::{find_config_file, load_config, load_tsconfig_paths, HowthConfig};
pub use env::{client_env_replacements, load_env_files};
pub use graph::{EntryResolution, ModuleGraph, ModuleId, ModuleNode, ModuleType, SelfAccepting, TransformResult};
pub use hmr::{
    update_modules, HmrBoundary, HmrEngine, HmrModuleGraph, HmrModuleNode, PropagateOutcome,
};
pub use prebundle::{
    ChunkInfo, CrawlStrategy, DiscoveredDepInfo, OptimizedDepInfo, OptimizerMetadata,
    PreBundledDep, PreBundler,
};
pub use resolve::{resolve_dev_import, DevResolveError, DevResolveKind, DevResolveResult};
pub use rewrite::{
    analyze_hot_accept, extract_import_urls, extract_named_bindings, is_self_accepting_module,
    HotAcceptAnalysis, ImportRewriter,
};
pub use transform::ModuleTransformer;
pub use transport::{
    HmrBroadcaster, HmrErrorPayload, HmrUpdatePayload, HmrUpdateType, HmrWireMessage,
};
