//! Import specifier scanner.
//!
//! Finds import/export/require specifiers in JavaScript/TypeScript source
//! without full parsing. Comments and string literals are skipped so that
//! keywords inside them are not reported.

use std::ops::Range;

/// How a specifier was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "s"`, `import "s"`.
    Static,
    /// `export { x } from "s"`, `export * from "s"`.
    Reexport,
    /// `import("s")`.
    Dynamic,
    /// `require("s")`.
    Require,
}

impl ImportKind {
    /// Whether the engine follows this edge when building the graph.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static | Self::Reexport)
    }
}

/// An import found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Specifier exactly as written.
    pub specifier: String,
    pub kind: ImportKind,
    /// Line number (1-indexed).
    pub line: u32,
    /// Byte range of the whole statement, for static imports and re-exports.
    pub statement: Option<Range<usize>>,
}

/// Scan source code for imports, in order of appearance.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportRecord> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut results = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            // An unterminated quote (JSX text, regex literal) is a single byte
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i).map_or(i + 1, |(_, end)| end);
            }
            _ if matches_keyword(bytes, i, "import") => {
                match scan_import(bytes, i) {
                    Some((record, end)) => {
                        results.push(record.at_line(line_of(bytes, i)));
                        i = end;
                    }
                    None => i += 6,
                }
            }
            _ if matches_keyword(bytes, i, "export") => match scan_reexport(bytes, i) {
                Some((record, end)) => {
                    results.push(record.at_line(line_of(bytes, i)));
                    i = end;
                }
                None => i += 6,
            },
            _ if matches_keyword(bytes, i, "require") => match scan_require(bytes, i + 7) {
                Some((spec, end)) => {
                    results.push(ImportRecord {
                        specifier: spec,
                        kind: ImportKind::Require,
                        line: line_of(bytes, i),
                        statement: None,
                    });
                    i = end;
                }
                None => i += 7,
            },
            _ => i += 1,
        }
    }

    results
}

impl ImportRecord {
    fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

fn line_of(bytes: &[u8], pos: usize) -> u32 {
    let newlines = bytes[..pos].iter().filter(|&&b| b == b'\n').count();
    u32::try_from(newlines + 1).unwrap_or(u32::MAX)
}

/// Keyword at `pos` with identifier boundaries on both sides.
fn matches_keyword(bytes: &[u8], pos: usize, keyword: &str) -> bool {
    let kw = keyword.as_bytes();
    if !bytes.get(pos..).is_some_and(|rest| rest.starts_with(kw)) {
        return false;
    }
    if pos > 0 && is_ident_byte(bytes[pos - 1]) {
        return false;
    }
    // `.import` / `obj.require` are member accesses
    if pos > 0 && bytes[pos - 1] == b'.' {
        return false;
    }
    !bytes.get(pos + kw.len()).is_some_and(|&b| is_ident_byte(b))
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Read a string literal starting at `start` (the quote).
/// Returns the contents and the index after the closing quote.
fn skip_string(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                let contents = String::from_utf8_lossy(&bytes[start + 1..i]).into_owned();
                return Some((contents, i + 1));
            }
            b'\n' if quote != b'`' => return None,
            _ => i += 1,
        }
    }
    None
}

/// Consume an optional trailing `;` after a statement.
fn statement_end(bytes: &[u8], end: usize) -> usize {
    let mut i = end;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if bytes.get(i) == Some(&b';') {
        i + 1
    } else {
        end
    }
}

fn scan_import(bytes: &[u8], start: usize) -> Option<(ImportRecord, usize)> {
    let mut i = skip_ws(bytes, start + 6);

    match bytes.get(i)? {
        b'(' => {
            i = skip_ws(bytes, i + 1);
            if !matches!(bytes.get(i)?, b'"' | b'\'' | b'`') {
                return None;
            }
            let (spec, end) = skip_string(bytes, i)?;
            let record = ImportRecord {
                specifier: spec,
                kind: ImportKind::Dynamic,
                line: 0,
                statement: None,
            };
            return Some((record, end));
        }
        // import.meta
        b'.' => return None,
        _ => {}
    }

    // The first string literal before a `;` is the specifier: import
    // clauses themselves contain no strings.
    while i < bytes.len() {
        match bytes[i] {
            b';' => return None,
            b'"' | b'\'' => {
                let (spec, end) = skip_string(bytes, i)?;
                let record = ImportRecord {
                    specifier: spec,
                    kind: ImportKind::Static,
                    line: 0,
                    statement: Some(start..statement_end(bytes, end)),
                };
                return Some((record, end));
            }
            _ => i += 1,
        }
    }
    None
}

fn scan_reexport(bytes: &[u8], start: usize) -> Option<(ImportRecord, usize)> {
    let mut i = skip_ws(bytes, start + 6);

    match bytes.get(i)? {
        b'*' => {
            i += 1;
            // `export * as ns from`
            while i < bytes.len() && !matches_keyword(bytes, i, "from") {
                if bytes[i] == b';' || bytes[i] == b'\n' {
                    return None;
                }
                i += 1;
            }
        }
        b'{' => {
            while i < bytes.len() && bytes[i] != b'}' {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            i = skip_ws(bytes, i + 1);
        }
        _ => return None,
    }

    if !matches_keyword(bytes, i, "from") {
        return None;
    }
    i = skip_ws(bytes, i + 4);
    if !matches!(bytes.get(i)?, b'"' | b'\'') {
        return None;
    }
    let (spec, end) = skip_string(bytes, i)?;
    let record = ImportRecord {
        specifier: spec,
        kind: ImportKind::Reexport,
        line: 0,
        statement: Some(start..statement_end(bytes, end)),
    };
    Some((record, end))
}

fn scan_require(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut i = skip_ws(bytes, start);
    if bytes.get(i)? != &b'(' {
        return None;
    }
    i = skip_ws(bytes, i + 1);
    if !matches!(bytes.get(i)?, b'"' | b'\'' | b'`') {
        return None;
    }
    let (spec, end) = skip_string(bytes, i)?;
    let close = skip_ws(bytes, end);
    if bytes.get(close)? != &b')' {
        return None;
    }
    Some((spec, close + 1))
}
