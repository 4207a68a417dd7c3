//! `howth dev` command implementation.
//!
//! Unbundled development server: every request resolves, loads and
//! transpiles a single module on demand instead of rebuilding one big
//! bundle on every change. `fastnode_core::dev` owns the pipeline; this
//! module is the axum wiring that turns it into an HTTP/WebSocket server.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fastnode_core::bundler::PluginContainer;
use fastnode_core::dev::{
    load_config, load_env_files, load_tsconfig_paths, resolve_dev_import, update_modules,
    DevResolveKind, HmrBroadcaster, HmrEngine, HmrWireMessage, ModuleGraph, ModuleTransformer,
};
use miette::{IntoDiagnostic, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Entry point file.
    pub entry: PathBuf,
    /// Working directory / project root.
    pub cwd: PathBuf,
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Open browser automatically.
    pub open: bool,
}

/// Shared server state.
struct DevState {
    /// Project root, used to resolve root-absolute specifiers.
    root: PathBuf,
    /// Directory pre-bundled dependency chunks are written to.
    deps_dir: PathBuf,
    /// Import aliases from config/tsconfig.
    alias: HashMap<String, String>,
    /// The module graph: every module ever served, and who imports whom.
    graph: ModuleGraph,
    /// Resolve → load → transpile → transform pipeline, with its own cache.
    transformer: ModuleTransformer,
    /// User/plugin resolve and load hooks.
    plugins: PluginContainer,
    /// Broadcasts HMR updates to every connected browser tab.
    broadcaster: HmrBroadcaster,
    /// URL path of the entry module, served from `index.html`.
    entry_url: String,
    /// Port the HMR client connects back to.
    port: u16,
}

/// Run the dev server.
pub async fn run(action: DevAction) -> Result<()> {
    let root = action.cwd.clone();
    let deps_dir = root.join("node_modules").join(".howth").join("deps");
    let _ = std::fs::create_dir_all(&deps_dir);

    let mode = "development";
    let config = load_config(&root, None).unwrap_or(None).map(|(_, cfg)| cfg);

    let mut alias = config
        .as_ref()
        .map(|cfg| cfg.resolve.alias.clone())
        .unwrap_or_default();
    if let Some(tsconfig_paths) = load_tsconfig_paths(&root) {
        for (from, to) in tsconfig_paths {
            alias.entry(from).or_insert(to);
        }
    }

    let env = load_env_files(&root, mode);
    let entry_url = url_path_for(&root, &action.entry);

    let graph = ModuleGraph::new();
    let transformer = ModuleTransformer::new(root.clone()).with_env(env, mode, false);
    let plugins = PluginContainer::new(root.clone());
    let broadcaster = HmrBroadcaster::new();

    let state = Arc::new(DevState {
        root: root.clone(),
        deps_dir,
        alias,
        graph,
        transformer,
        plugins,
        broadcaster,
        entry_url,
        port: action.port,
    });

    // Set up file watcher with channel for HMR propagation.
    let (rebuild_tx, mut rebuild_rx) = mpsc::channel::<Vec<String>>(16);
    let watch_cwd = root.clone();

    std::thread::spawn(move || {
        if let Err(e) = watch_files(watch_cwd, rebuild_tx) {
            eprintln!("  File watcher error: {}", e);
        }
    });

    let hmr_state = state.clone();
    tokio::spawn(async move {
        while let Some(changed) = rebuild_rx.recv().await {
            for file in changed {
                let canonical = std::fs::canonicalize(&file)
                    .map(|p| p.display().to_string())
                    .unwrap_or(file);
                hmr_state.transformer.invalidate(&canonical);
                update_modules(&hmr_state.graph, &hmr_state.broadcaster, &canonical);
            }
        }
    });

    let app = Router::new()
        .route("/", get(serve_index))
        .route("/@hmr-client", get(serve_hmr_client))
        .route("/__hmr", get(hmr_websocket))
        .route("/*path", get(serve_module))
        .with_state(state.clone());

    // Start server - resolve hostname to IP
    let host_ip = if action.host == "localhost" {
        "127.0.0.1".to_string()
    } else {
        action.host.clone()
    };

    let addr: SocketAddr = format!("{}:{}", host_ip, action.port)
        .parse()
        .into_diagnostic()?;

    println!();
    println!("  Dev server running at http://localhost:{}", action.port);
    println!("  Hot Module Replacement enabled");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    if action.open {
        let url = format!("http://{}:{}", action.host, action.port);
        let _ = open_browser(&url);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;

    Ok(())
}

/// Turn an absolute file path under `root` into its root-relative URL path,
/// e.g. `{root}/src/main.tsx` → `/src/main.tsx`.
fn url_path_for(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let rel_str = rel.display().to_string().replace('\\', "/");
    format!("/{}", rel_str.trim_start_matches('/'))
}

/// Serve `index.html`: the project's own if present, otherwise a minimal
/// page that loads the entry module directly.
async fn serve_index(State(state): State<Arc<DevState>>) -> Response {
    if let Ok(html) = std::fs::read_to_string(state.root.join("index.html")) {
        return html_response(html);
    }
    html_response(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>howth dev</title>
</head>
<body>
  <div id="root"></div>
  <script type="module" src="{}"></script>
</body>
</html>
"#,
        state.entry_url
    ))
}

/// Serve the HMR client runtime at the fixed virtual path every module's
/// injected preamble imports from.
async fn serve_hmr_client(State(state): State<Arc<DevState>>) -> Response {
    js_response(HmrEngine::client_runtime(state.port))
}

/// Resolve and transform one module request. Handles every prefix
/// `resolve_dev_import` understands (`/@fs/`, `/@style/`, `/@modules/`)
/// since they're all just specifiers as far as this handler is concerned.
async fn serve_module(State(state): State<Arc<DevState>>, uri: Uri) -> Response {
    let url_path = uri.path();
    let deps_dir = state.deps_dir.clone();
    let has_optimized_dep = move |name: &str| -> Option<PathBuf> {
        let candidate = deps_dir.join(format!("{name}.js"));
        candidate.exists().then_some(candidate)
    };

    let resolved = resolve_dev_import(
        &state.root,
        None,
        url_path,
        &state.deps_dir,
        has_optimized_dep,
        &state.alias,
        None,
        false,
        false,
    );

    match resolved {
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Ok(result) => match result.kind {
            DevResolveKind::Virtual => {
                let name = result.id.trim_start_matches('\0');
                js_response(format!(
                    "throw new Error({:?});\nexport default undefined;\n",
                    format!("\"{name}\" is not available in the browser")
                ))
            }
            DevResolveKind::External => {
                (StatusCode::NOT_FOUND, "external specifiers are fetched by the browser directly")
                    .into_response()
            }
            DevResolveKind::OptimizedDep => match result.file.and_then(|f| std::fs::read_to_string(f).ok()) {
                Some(code) => js_response(code),
                None => (StatusCode::NOT_FOUND, "pre-bundled chunk missing on disk").into_response(),
            },
            DevResolveKind::File => {
                match state
                    .transformer
                    .transform_and_record(url_path, &state.plugins, &state.graph)
                {
                    Ok((module, _id)) => module_response(module.content_type, module.code),
                    Err(e) => {
                        state.broadcaster.error(e.to_string());
                        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                    }
                }
            }
        },
    }
}

fn html_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(body)
        .unwrap()
        .into_response()
}

fn js_response(body: String) -> Response {
    module_response("application/javascript", body)
}

fn module_response(content_type: &'static str, body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Cache-Control", "no-cache")
        .body(body)
        .unwrap()
        .into_response()
}

/// Handle WebSocket connections for HMR.
async fn hmr_websocket(ws: WebSocketUpgrade, State(state): State<Arc<DevState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_hmr_socket(socket, state))
}

/// Handle an HMR WebSocket connection: send `connected`, then forward every
/// broadcast message as a JSON text frame. A client that falls behind the
/// broadcast channel's ring buffer (`Lagged`) gets a full reload instead of
/// silently missing updates.
async fn handle_hmr_socket(mut socket: WebSocket, state: Arc<DevState>) {
    let mut rx = state.broadcaster.subscribe();

    if let Ok(json) = serde_json::to_string(&HmrWireMessage::Connected) {
        if socket.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                let Ok(json) = serde_json::to_string(&msg) else {
                    continue;
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                let reload = HmrWireMessage::FullReload { path: None };
                let Ok(json) = serde_json::to_string(&reload) else {
                    continue;
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Check if a path should be ignored by the file watcher.
fn should_ignore(path: &std::path::Path) -> bool {
    let path_str = path.to_string_lossy();

    if path_str.contains("/node_modules/")
        || path_str.contains("/target/")
        || path_str.contains("/.git/")
        || path_str.contains("/dist/")
        || path_str.contains("/.next/")
        || path_str.contains("/build/")
        || path_str.contains("/__pycache__/")
    {
        return true;
    }

    if let Some(name) = path.file_name() {
        if name.to_string_lossy().starts_with('.') {
            return true;
        }
    }

    false
}

/// Watch files for changes and send changed-file batches through `rebuild_tx`.
fn watch_files(cwd: PathBuf, rebuild_tx: mpsc::Sender<Vec<String>>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, Config::default()).into_diagnostic()?;
    watcher
        .watch(&cwd, RecursiveMode::Recursive)
        .into_diagnostic()?;

    let mut debounce_set: HashSet<PathBuf> = HashSet::new();
    let mut last_rebuild = std::time::Instant::now();

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                let relevant = event.paths.iter().any(|p| {
                    if should_ignore(p) {
                        return false;
                    }
                    let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
                    matches!(ext, "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "css")
                });

                if !relevant {
                    continue;
                }

                for path in event.paths {
                    if !should_ignore(&path) {
                        debounce_set.insert(path);
                    }
                }

                let now = std::time::Instant::now();
                if now.duration_since(last_rebuild).as_millis() < 50 {
                    continue;
                }

                if debounce_set.is_empty() {
                    continue;
                }

                let changed: Vec<String> = debounce_set
                    .drain()
                    .map(|p| p.display().to_string())
                    .collect();

                last_rebuild = now;

                println!(
                    "  File changed: {}",
                    changed.first().unwrap_or(&"unknown".to_string())
                );

                if rebuild_tx.blocking_send(changed).is_err() {
                    break;
                }
            }
            Ok(Err(e)) => {
                eprintln!("  Watch error: {}", e);
            }
            Err(_) => break,
        }
    }

    Ok(())
}

/// Open a URL in the default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    Ok(())
}
