//! Output text assembly.

use crate::config::OutputFormat;
use crate::vfs::path;
use std::fmt::Write as _;
use std::ops::Range;

/// Replace byte ranges of `source`. Ranges must be sorted and disjoint.
pub(super) fn splice(source: &str, edits: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor || range.end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..range.start]);
        out.push_str(replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// The default binding of an import statement: `x` in `import x from "m"`
/// and `import x, { y } from "m"`.
pub(super) fn default_binding(statement: &str) -> Option<&str> {
    let rest = statement.strip_prefix("import")?.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    let after = rest[end..].trim_start();
    let valid = !name.is_empty()
        && name != "type"
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && (after.starts_with("from") || after.starts_with(','));
    valid.then_some(name)
}

/// Identifier a JSON module is bound to in the bundle.
pub(super) fn json_binding(module_path: &str, index: usize) -> String {
    let stem: String = path::file_stem(module_path)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__json_{stem}_{index}")
}

/// Append one module section with its origin comment.
pub(super) fn push_section(out: &mut String, origin: &str, code: &str) {
    let _ = writeln!(out, "// {origin}");
    out.push_str(code.trim());
    out.push('\n');
}

/// Append one stylesheet section.
pub(super) fn push_css_section(out: &mut String, origin: &str, code: &str) {
    let _ = writeln!(out, "/* {origin} */");
    out.push_str(code.trim());
    out.push('\n');
}

/// Wrap the concatenated body for the output format.
///
/// `externals` are import statements hoisted above the body.
pub(super) fn wrap(format: OutputFormat, externals: &[String], body: &str) -> String {
    let mut out = String::new();
    if format == OutputFormat::Cjs {
        out.push_str("\"use strict\";\n");
    }
    for statement in externals {
        out.push_str(statement);
        out.push('\n');
    }
    match format {
        OutputFormat::Esm | OutputFormat::Cjs => out.push_str(body),
        OutputFormat::Iife => {
            out.push_str("(() => {\n");
            out.push_str(body);
            out.push_str("})();\n");
        }
    }
    out
}

/// Line-level minification: trims lines and drops blank and `//` lines.
pub(super) fn minify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
