//! Import specifier scanner.
//!
//! Scans JavaScript/TypeScript source code for import/require specifiers
//! without full parsing.

use std::collections::HashSet;

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecCore {
    /// Specifier exactly as found.
    pub raw: String,
    /// Kind of import (one of the import kind constants).
    pub kind: String,
    /// Line number (1-indexed, best-effort).
    pub line: Option<u32>,
}

impl ImportSpecCore {
    /// Create a new import spec.
    #[must_use]
    pub fn new(raw: impl Into<String>, kind: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            raw: raw.into(),
            kind: kind.into(),
            line,
        }
    }
}

/// Scan source code for import/require specifiers.
///
/// Returns discovered imports in first-appearance order, deduplicated by `raw`.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpecCore> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let mut line_num: u32 = 1;
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        // Track line numbers
        if chars[i] == '\n' {
            line_num += 1;
            i += 1;
            continue;
        }

        // Skip single-line comments
        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            // Skip to end of line
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // Skip block comments
        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    line_num += 1;
                }
                i += 1;
            }
            i += 2; // Skip */
            continue;
        }

        // Check for import statement: import ... from "..."
        if matches_keyword(&chars, i, "import") {
            let start_i = i;
            i += 6;
            if let Some((spec, end)) = scan_import_statement(&chars, i, &mut line_num) {
                if !spec.is_empty() && seen.insert(spec.clone()) {
                    results.push(ImportSpecCore::new(&spec, "esm_import", Some(line_num)));
                }
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        // Check for export ... from "..."
        if matches_keyword(&chars, i, "export") {
            let start_i = i;
            i += 6;
            if let Some((spec, end)) = scan_export_from(&chars, i, &mut line_num) {
                if !spec.is_empty() && seen.insert(spec.clone()) {
                    results.push(ImportSpecCore::new(&spec, "esm_export", Some(line_num)));
                }
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        // Check for require("...")
        if matches_keyword(&chars, i, "require") {
            let start_i = i;
            i += 7;
            if let Some((spec, end)) = scan_require_call(&chars, i) {
                if !spec.is_empty() && seen.insert(spec.clone()) {
                    results.push(ImportSpecCore::new(&spec, "cjs_require", Some(line_num)));
                }
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        // Check for dynamic import: import("...")
        // This is tricky - we look for "import" followed by "("
        // But we already checked for "import" keyword above
        // So here we check for import( pattern that wasn't caught above

        i += 1;
    }

    results
}

/// Check if chars at position match a keyword (with word boundary).
fn matches_keyword(chars: &[char], pos: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    let len = kw.len();

    if pos + len > chars.len() {
        return false;
    }

    // Check preceding character is not alphanumeric
    if pos > 0 && (chars[pos - 1].is_alphanumeric() || chars[pos - 1] == '_') {
        return false;
    }

    // Check keyword matches
    for (j, &c) in kw.iter().enumerate() {
        if chars[pos + j] != c {
            return false;
        }
    }

    // Check following character is not alphanumeric
    if pos + len < chars.len() && (chars[pos + len].is_alphanumeric() || chars[pos + len] == '_') {
        return false;
    }

    true
}

/// Scan an import statement for the "from" specifier.
/// Returns (specifier, end position).
fn scan_import_statement(
    chars: &[char],
    start: usize,
    line_num: &mut u32,
) -> Option<(String, usize)> {
    let len = chars.len();
    let mut i = start;

    // Skip whitespace
    while i < len && chars[i].is_whitespace() {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        i += 1;
    }

    // Check for dynamic import: import("...")
    if i < len && chars[i] == '(' {
        i += 1;
        // Skip whitespace
        while i < len && chars[i].is_whitespace() {
            if chars[i] == '\n' {
                *line_num += 1;
            }
            i += 1;
        }
        // Expect string
        if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
            let quote = chars[i];
            i += 1;
            let spec_start = i;
            while i < len && chars[i] != quote {
                if chars[i] == '\n' {
                    *line_num += 1;
                }
                if chars[i] == '\\' && i + 1 < len {
                    i += 2;
                    continue;
                }
                i += 1;
            }
            let spec: String = chars[spec_start..i].iter().collect();
            i += 1; // Skip closing quote
            return Some((spec, i));
        }
        return None;
    }

    // Regular import: scan until we find "from"
    while i < len {
        if chars[i] == '\n' {
            *line_num += 1;
        }

        // Check for "from"
        if matches_keyword(chars, i, "from") {
            i += 4;
            // Skip whitespace
            while i < len && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    *line_num += 1;
                }
                i += 1;
            }
            // Expect string
            if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
                let quote = chars[i];
                i += 1;
                let spec_start = i;
                while i < len && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < len {
                        i += 2;
                        continue;
                    }
                    i += 1;
                }
                let spec: String = chars[spec_start..i].iter().collect();
                i += 1; // Skip closing quote
                return Some((spec, i));
            }
        }

        // Direct import: import "specifier"
        if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
            let quote = chars[i];
            i += 1;
            let spec_start = i;
            while i < len && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < len {
                    i += 2;
                    continue;
                }
                i += 1;
            }
            let spec: String = chars[spec_start..i].iter().collect();
            i += 1; // Skip closing quote
            return Some((spec, i));
        }

        // Stop at semicolon or newline for side-effect imports
        if chars[i] == ';' {
            break;
        }

        i += 1;

        // Safety limit to avoid infinite loops
        if i > start + 1000 {
            break;
        }
    }

    None
}

/// Scan an export ... from statement.
fn scan_export_from(chars: &[char], start: usize, line_num: &mut u32) -> Option<(String, usize)> {
    let len = chars.len();
    let mut i = start;

    // Look for "from" within reasonable distance
    let limit = (start + 500).min(len);
    while i < limit {
        if chars[i] == '\n' {
            *line_num += 1;
        }

        if matches_keyword(chars, i, "from") {
            i += 4;
            // Skip whitespace
            while i < len && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    *line_num += 1;
                }
                i += 1;
            }
            // Expect string
            if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
                let quote = chars[i];
                i += 1;
                let spec_start = i;
                while i < len && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < len {
                        i += 2;
                        continue;
                    }
                    i += 1;
                }
                let spec: String = chars[spec_start..i].iter().collect();
                i += 1;
                return Some((spec, i));
            }
        }

        i += 1;
    }

    None
}

/// Scan a require("...") call.
fn scan_require_call(chars: &[char], start: usize) -> Option<(String, usize)> {
    let len = chars.len();
    let mut i = start;

    // Skip whitespace
    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }

    // Expect (
    if i >= len || chars[i] != '(' {
        return None;
    }
    i += 1;

    // Skip whitespace
    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }

    // Expect string
    if i >= len || (chars[i] != '"' && chars[i] != '\'' && chars[i] != '`') {
        return None;
    }

    let quote = chars[i];
    i += 1;
    let spec_start = i;

    while i < len && chars[i] != quote {
        if chars[i] == '\\' && i + 1 < len {
            i += 2;
            continue;
        }
        if chars[i] == '\n' {
            // Newline in string - likely not a valid require
            return None;
        }
        i += 1;
    }

    let spec: String = chars[spec_start..i].iter().collect();
    i += 1; // Skip closing quote

    // Skip whitespace and expect )
    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }

    if i < len && chars[i] == ')' {
        i += 1;
        return Some((spec, i));
    }

    // Even without closing paren, we got the specifier
    Some((spec, i))
}
