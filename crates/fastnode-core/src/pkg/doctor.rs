//! Package health diagnostics.
//!
//! Provides read-only analysis of installed `node_modules/` to detect
//! common dependency health issues: orphans, missing edges, duplicates, etc.
//!
//! # JSON Contract (v1.7.1+)
//!
//! - `doctor.schema_version` is currently `1`. Breaking changes require a bump.
//! - Top-level JSON keys are exactly: `{ "ok", "doctor" }` (+ optional `"error"`).
//! - `doctor` keys are exactly: `{ "schema_version", "cwd", "summary", "findings", "notes" }`.
//! - `notes` is **always** serialized as an array (possibly empty).
//! - Each finding includes required keys `{ "code", "severity", "message" }` and may
//!   optionally include `{ "package", "path", "detail", "related" }`. No other keys.
//!
//! # Sort Order (LOCKED v1.7.1+)
//!
//! Findings are sorted by: `severity_rank` desc (error=3, warn=2, info=1),
//! then `code`, then `package`, then `path`. Truncation notice is always last.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::graph::{GraphErrorInfo, PackageGraph};

/// Schema version for doctor report output.
pub const PKG_DOCTOR_SCHEMA_VERSION: u32 = 1;

/// Doctor finding codes.
pub mod codes {
    pub const PKG_DOCTOR_NODE_MODULES_NOT_FOUND: &str = "PKG_DOCTOR_NODE_MODULES_NOT_FOUND";
    pub const PKG_DOCTOR_GRAPH_ERROR: &str = "PKG_DOCTOR_GRAPH_ERROR";
    pub const PKG_DOCTOR_ORPHAN_PACKAGE: &str = "PKG_DOCTOR_ORPHAN_PACKAGE";
    pub const PKG_DOCTOR_MISSING_EDGE_TARGET: &str = "PKG_DOCTOR_MISSING_EDGE_TARGET";
    pub const PKG_DOCTOR_INVALID_PACKAGE_JSON: &str = "PKG_DOCTOR_INVALID_PACKAGE_JSON";
    pub const PKG_DOCTOR_DUPLICATE_PACKAGE_VERSION: &str = "PKG_DOCTOR_DUPLICATE_PACKAGE_VERSION";
    pub const PKG_DOCTOR_MAX_ITEMS_REACHED: &str = "PKG_DOCTOR_MAX_ITEMS_REACHED";
}

/// Severity levels for doctor findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DoctorSeverity {
    #[default]
    Info,
    Warn,
    Error,
}

impl DoctorSeverity {
    /// Parse severity from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to string for JSON serialization.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Get numeric rank for deterministic sorting.
    /// Higher values sort first (error=3, warn=2, info=1).
    /// This is the LOCKED sort order for v1.7.1+.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Error => 3,
            Self::Warn => 2,
            Self::Info => 1,
        }
    }
}

impl Serialize for DoctorSeverity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DoctorSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid severity: {s}")))
    }
}

/// A single diagnostic finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorFinding {
    /// Stable error code.
    pub code: String,
    /// Severity level.
    pub severity: DoctorSeverity,
    /// Human-readable message.
    pub message: String,
    /// Package name (and optionally @version) when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Absolute path when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Small deterministic detail payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Small list of related names/paths for context.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related: Vec<String>,
}

impl DoctorFinding {
    /// Create a new finding.
    #[must_use]
    pub fn new(code: &str, severity: DoctorSeverity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
            package: None,
            path: None,
            detail: None,
            related: Vec::new(),
        }
    }

    /// Set the package field.
    #[must_use]
    pub fn with_package(mut self, pkg: impl Into<String>) -> Self {
        self.package = Some(pkg.into());
        self
    }

    /// Set the path field.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the detail field.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the related field.
    #[must_use]
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}

/// Get a deterministic sort key for a finding.
///
/// **LOCKED SORT ORDER (v1.7.1+):**
/// 1. `severity_rank` (error=3, warn=2, info=1) - descending (errors first)
/// 2. `code` (byte lexicographic)
/// 3. `package` (byte lexicographic, `None` sorts last)
/// 4. `path` (byte lexicographic, `None` sorts last)
///
/// This ordering is applied:
/// - Before truncation
/// - Before severity filtering
/// - Before JSON or human rendering
///
/// The truncation notice (`PKG_DOCTOR_MAX_ITEMS_REACHED`) is appended AFTER
/// sorting and is NOT re-sorted, so it always appears last.
#[must_use]
pub fn doctor_sort_key(
    f: &DoctorFinding,
) -> (std::cmp::Reverse<u8>, &str, Option<&str>, Option<&str>) {
    (
        std::cmp::Reverse(f.severity.rank()),
        &f.code,
        f.package.as_deref(),
        f.path.as_deref(),
    )
}

/// Counts of findings by severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorCounts {
    pub info: u32,
    pub warn: u32,
    pub error: u32,
}

/// Summary of the doctor report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    /// Overall severity (worst of all findings).
    pub severity: DoctorSeverity,
    /// Counts by severity.
    pub counts: DoctorCounts,
    /// Number of packages indexed in graph.
    pub packages_indexed: u32,
    /// Number of reachable packages.
    pub reachable_packages: u32,
    /// Number of orphan packages.
    pub orphans: u32,
    /// Number of missing edge targets.
    pub missing_edges: u32,
    /// Number of invalid packages.
    pub invalid_packages: u32,
}

impl Default for DoctorSummary {
    fn default() -> Self {
        Self {
            severity: DoctorSeverity::Info,
            counts: DoctorCounts::default(),
            packages_indexed: 0,
            reachable_packages: 0,
            orphans: 0,
            missing_edges: 0,
            invalid_packages: 0,
        }
    }
}

/// The complete doctor report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkgDoctorReport {
    /// Schema version for this output format.
    pub schema_version: u32,
    /// Absolute working directory.
    pub cwd: String,
    /// Summary statistics.
    pub summary: DoctorSummary,
    /// All findings (sorted deterministically).
    pub findings: Vec<DoctorFinding>,
    /// Notes (always present, may be empty array).
    /// **LOCKED (v1.7.1+):** This field is always serialized.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl PkgDoctorReport {
    /// Create a new empty report.
    #[must_use]
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            schema_version: PKG_DOCTOR_SCHEMA_VERSION,
            cwd: cwd.into(),
            summary: DoctorSummary::default(),
            findings: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Options for doctor analysis.
#[derive(Debug, Clone)]
pub struct DoctorOptions {
    /// Include root devDependencies in graph traversal.
    pub include_dev_root: bool,
    /// Include optionalDependencies in graph traversal.
    pub include_optional: bool,
    /// Maximum traversal depth.
    pub max_depth: usize,
    /// Maximum number of findings to return (default 200, hard cap 2000).
    pub max_items: usize,
    /// Minimum severity to include in output.
    pub min_severity: DoctorSeverity,
}

impl Default for DoctorOptions {
    fn default() -> Self {
        Self {
            include_dev_root: false,
            include_optional: true,
            max_depth: 25,
            max_items: 200,
            min_severity: DoctorSeverity::Info,
        }
    }
}

/// Build a doctor report from a package graph.
///
/// This is the main entry point for package health diagnostics.
/// It analyzes the graph for common issues and returns a deterministic report.
#[must_use]
pub fn build_doctor_report(
    graph: &PackageGraph,
    cwd_abs: &str,
    opts: &DoctorOptions,
) -> PkgDoctorReport {
    let mut report = PkgDoctorReport::new(cwd_abs);
    let mut all_findings: Vec<DoctorFinding> = Vec::new();

    // Track metrics
    let mut missing_edges_count = 0u32;
    let mut invalid_packages_count = 0u32;

    // 2.1: Ingest graph errors
    for error in &graph.errors {
        let (finding, is_invalid) = map_graph_error(error);
        all_findings.push(finding);
        if is_invalid {
            invalid_packages_count += 1;
        }
    }

    // 2.2: Orphan packages
    for orphan in &graph.orphans {
        let hint = format!(
            "installed but not reachable from root dependencies\n  \
             hint: howth pkg why {}",
            orphan.name
        );
        let finding =
            DoctorFinding::new(codes::PKG_DOCTOR_ORPHAN_PACKAGE, DoctorSeverity::Warn, hint)
                .with_package(format!("{}@{}", orphan.name, orphan.version))
                .with_path(&orphan.path);
        all_findings.push(finding);
    }

    // 2.3: Missing edge targets
    for node in &graph.nodes {
        for edge in &node.dependencies {
            if edge.to.is_none() {
                missing_edges_count += 1;
                let detail = format!(
                    "missing: {} req={} kind={}",
                    edge.name,
                    edge.req.as_deref().unwrap_or("-"),
                    edge.kind
                );
                let hint = format!(
                    "dependency is declared but not installed\n  \
                     hint: howth pkg explain {} --parent {}",
                    edge.name, node.id.path
                );
                let finding = DoctorFinding::new(
                    codes::PKG_DOCTOR_MISSING_EDGE_TARGET,
                    DoctorSeverity::Warn,
                    hint,
                )
                .with_package(format!("{}@{}", node.id.name, node.id.version))
                .with_detail(detail)
                .with_related(vec![edge.name.clone()]);
                all_findings.push(finding);
            }
        }
    }

    // 2.4: Duplicate versions (best-effort)
    let duplicates = detect_duplicate_versions(graph);
    for (name, versions) in duplicates {
        let severity = if versions.len() > 3 {
            DoctorSeverity::Warn
        } else {
            DoctorSeverity::Info
        };

        // Build detail string with up to 5 versions
        let detail = build_duplicate_detail(&versions);
        let finding = DoctorFinding::new(
            codes::PKG_DOCTOR_DUPLICATE_PACKAGE_VERSION,
            severity,
            "multiple versions installed",
        )
        .with_package(name)
        .with_detail(detail);
        all_findings.push(finding);
    }

    // Sort all findings deterministically using LOCKED sort order (v1.7.1+)
    all_findings.sort_by(|a, b| doctor_sort_key(a).cmp(&doctor_sort_key(b)));

    // Filter by severity
    let filtered: Vec<DoctorFinding> = all_findings
        .into_iter()
        .filter(|f| f.severity >= opts.min_severity)
        .collect();

    // Compute counts before truncation
    let mut counts = DoctorCounts::default();
    for f in &filtered {
        match f.severity {
            DoctorSeverity::Info => counts.info += 1,
            DoctorSeverity::Warn => counts.warn += 1,
            DoctorSeverity::Error => counts.error += 1,
        }
    }

    // Truncate if needed
    let max_items = opts.max_items.min(2000);
    let (mut findings, truncated) = if filtered.len() > max_items {
        let truncated_count = filtered.len() - max_items;
        (
            filtered.into_iter().take(max_items).collect::<Vec<_>>(),
            Some(truncated_count),
        )
    } else {
        (filtered, None)
    };

    // Add truncation notice if needed (LOCKED v1.7.1+: notice is always last, never re-sorted)
    if let Some(truncated_count) = truncated {
        findings.push(
            DoctorFinding::new(
                codes::PKG_DOCTOR_MAX_ITEMS_REACHED,
                DoctorSeverity::Info,
                "maximum findings limit reached",
            )
            .with_detail(format!("omitted={truncated_count} max_items={max_items}")),
        );
    }

    // Compute summary
    let overall_severity = if counts.error > 0 {
        DoctorSeverity::Error
    } else if counts.warn > 0 {
        DoctorSeverity::Warn
    } else {
        DoctorSeverity::Info
    };

    // Count packages indexed = reachable + orphans
    let reachable = graph.nodes.len() as u32;
    let orphans = graph.orphans.len() as u32;
    let packages_indexed = reachable + orphans;

    report.summary = DoctorSummary {
        severity: overall_severity,
        counts,
        packages_indexed,
        reachable_packages: reachable,
        orphans,
        missing_edges: missing_edges_count,
        invalid_packages: invalid_packages_count,
    };
    report.findings = findings;

    report
}

/// Map a graph error to a doctor finding.
fn map_graph_error(error: &GraphErrorInfo) -> (DoctorFinding, bool) {
    use super::graph::codes as graph_codes;

    let (code, severity, message, is_invalid) = match error.code.as_str() {
        graph_codes::PKG_GRAPH_NODE_MODULES_NOT_FOUND => (
            codes::PKG_DOCTOR_NODE_MODULES_NOT_FOUND,
            DoctorSeverity::Error,
            "node_modules not found",
            false,
        ),
        graph_codes::PKG_GRAPH_PACKAGE_JSON_INVALID => (
            codes::PKG_DOCTOR_INVALID_PACKAGE_JSON,
            DoctorSeverity::Warn,
            "invalid package.json",
            true,
        ),
        graph_codes::PKG_GRAPH_PACKAGE_JSON_MISSING => (
            codes::PKG_DOCTOR_INVALID_PACKAGE_JSON,
            DoctorSeverity::Warn,
            "missing package.json",
            true,
        ),
        _ => (
            codes::PKG_DOCTOR_GRAPH_ERROR,
            DoctorSeverity::Warn,
            "graph construction error",
            false,
        ),
    };

    let finding = DoctorFinding::new(code, severity, message)
        .with_path(&error.path)
        .with_detail(&error.message);

    (finding, is_invalid)
}

/// Detect packages with multiple versions installed.
fn detect_duplicate_versions(graph: &PackageGraph) -> Vec<(String, Vec<(String, String)>)> {
    // Collect all versions by name from both nodes and orphans
    let mut by_name: HashMap<String, Vec<(String, String)>> = HashMap::new();

    for node in &graph.nodes {
        by_name
            .entry(node.id.name.clone())
            .or_default()
            .push((node.id.version.clone(), node.id.path.clone()));
    }

    for orphan in &graph.orphans {
        by_name
            .entry(orphan.name.clone())
            .or_default()
            .push((orphan.version.clone(), orphan.path.clone()));
    }

    // Filter to names with >1 distinct version and sort
    let mut duplicates: Vec<(String, Vec<(String, String)>)> = by_name
        .into_iter()
        .filter(|(_, versions)| {
            // Check if there are distinct versions
            let mut seen: Vec<&str> = versions.iter().map(|(v, _)| v.as_str()).collect();
            seen.sort_unstable();
            seen.dedup();
            seen.len() > 1
        })
        .map(|(name, mut versions)| {
            // Sort versions deterministically by (version, path)
            versions.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            (name, versions)
        })
        .collect();

    // Sort by name for determinism
    duplicates.sort_by(|a, b| a.0.cmp(&b.0));
    duplicates
}

/// Build detail string for duplicate versions.
fn build_duplicate_detail(versions: &[(String, String)]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let max_show = 5;

    for (version, path) in versions.iter().take(max_show) {
        parts.push(format!("{version}@{path}"));
    }

    let remaining = versions.len().saturating_sub(max_show);
    if remaining > 0 {
        parts.push(format!("...(+{remaining} more)"));
    }

    format!("versions: {}", parts.join(", "))
}
