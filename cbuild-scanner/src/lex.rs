//! Single-pass lexical scan for `#include` directives over raw source
//! bytes (spec §4.2.1).
//!
//! The scanner advances on four anchor characters — `"`, `'`, `/`, `#` —
//! and otherwise passes bytes through untouched. It never builds an AST
//! and never looks past the directives it's asked to find; this is
//! deliberately not a C/C++ parser (spec §1 Non-goals).

const INCLUDE_DIRECTIVE: &[u8] = b"#include";
const RAW_STRING_DELIMITER_WARN_LEN: usize = 16;
const RAW_STRING_DELIMITER_ABORT_LEN: usize = 64;

/// Result of scanning one file's bytes for `#include` directives.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Include path literals from `#include "..."` directives, in order.
    /// System includes (`#include <...>`) are ignored entirely (spec
    /// §4.2.1).
    pub includes: Vec<String>,
    /// Set when the scan hit something it could not tolerate (an
    /// unterminated raw-string delimiter longer than 64 bytes). An abort
    /// conservatively marks the enclosing file `Updated` (spec §4.2.1
    /// "Failure semantics").
    pub aborted: bool,
}

pub fn scan_includes(bytes: &[u8]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut i = 0usize;
    let len = bytes.len();

    while i < len {
        match bytes[i] {
            b'"' => {
                let raw_string = i > 0 && bytes[i - 1] == b'R';
                if raw_string {
                    match skip_raw_string_literal(bytes, i) {
                        Some(next) => i = next,
                        None => {
                            result.aborted = true;
                            break;
                        }
                    }
                } else {
                    match skip_string_literal(bytes, i) {
                        Some(next) => i = next,
                        None => break, // unterminated: stop gracefully, no abort
                    }
                }
            }
            b'\'' => match skip_char_literal(bytes, i) {
                Some(next) => i = next,
                None => break,
            },
            b'/' if i + 1 < len && bytes[i + 1] == b'/' => {
                i = skip_line_comment(bytes, i);
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i = skip_block_comment(bytes, i);
            }
            b'#' => {
                if bytes[i..].starts_with(INCLUDE_DIRECTIVE) {
                    let after = i + INCLUDE_DIRECTIVE.len();
                    match parse_include_target(bytes, after) {
                        Some((include, next)) => {
                            if let Some(path) = include {
                                result.includes.push(path);
                            }
                            i = next;
                        }
                        None => break,
                    }
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    result
}

/// Skips a `"..."` literal starting at the opening quote, honoring `\"`
/// escapes. Returns the index just past the closing quote, or `None` if
/// the literal never terminates.
fn skip_string_literal(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_char_literal(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'\'' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Skips `R"delim(...)delim"` starting at the opening quote (the caller has
/// already confirmed the preceding byte is `R`). Delimiters longer than
/// [`RAW_STRING_DELIMITER_WARN_LEN`] are tolerated with a warning; longer
/// than [`RAW_STRING_DELIMITER_ABORT_LEN`] aborts the whole scan.
fn skip_raw_string_literal(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let delimiter_start = i;
    while i < bytes.len() && bytes[i] != b'(' {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let delimiter = &bytes[delimiter_start..i];
    if delimiter.len() > RAW_STRING_DELIMITER_ABORT_LEN {
        return None;
    }
    if delimiter.len() > RAW_STRING_DELIMITER_WARN_LEN {
        tracing::warn!(
            delimiter_len = delimiter.len(),
            "unusually long raw string delimiter, tolerating"
        );
    }

    let mut terminator = Vec::with_capacity(delimiter.len() + 2);
    terminator.push(b')');
    terminator.extend_from_slice(delimiter);
    terminator.push(b'"');

    i += 1; // past '('
    while i + terminator.len() <= bytes.len() {
        if &bytes[i..i + terminator.len()] == terminator.as_slice() {
            return Some(i + terminator.len());
        }
        i += 1;
    }
    None
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Parses the target of a recognised `#include` directive starting right
/// after the literal `#include` bytes: skips whitespace, then either
/// consumes `<...>` (ignored, system include) or captures `"..."` (the
/// literal bytes between the quotes, no escape processing).
///
/// Returns `(Some(path), next_index)` for a quoted include,
/// `(None, next_index)` for a system include, or `None` on a malformed
/// directive (treated as "no more includes", not an abort — spec
/// §4.2.1).
fn parse_include_target(bytes: &[u8], mut i: usize) -> Option<(Option<String>, usize)> {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    match bytes.get(i) {
        Some(b'<') => {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] != b'>' {
                j += 1;
            }
            if j >= bytes.len() {
                return None;
            }
            Some((None, j + 1))
        }
        Some(b'"') => {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] != b'"' {
                j += 1;
            }
            if j >= bytes.len() {
                return None;
            }
            let literal = String::from_utf8_lossy(&bytes[i + 1..j]).into_owned();
            Some((Some(literal), j + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_quoted_include() {
        let result = scan_includes(b"#include \"foo.h\"\nint x;");
        assert_eq!(result.includes, vec!["foo.h".to_string()]);
        assert!(!result.aborted);
    }

    #[test]
    fn ignores_system_includes() {
        let result = scan_includes(b"#include <vector>\n#include \"local.h\"");
        assert_eq!(result.includes, vec!["local.h".to_string()]);
    }

    #[test]
    fn skips_string_literal_contents() {
        let result = scan_includes(b"const char *s = \"#include <fake.h>\";\n#include \"real.h\"");
        assert_eq!(result.includes, vec!["real.h".to_string()]);
    }

    #[test]
    fn skips_line_comment() {
        let result = scan_includes(b"// #include \"commented.h\"\n#include \"real.h\"");
        assert_eq!(result.includes, vec!["real.h".to_string()]);
    }

    #[test]
    fn skips_block_comment() {
        let result = scan_includes(b"/* #include \"commented.h\" */\n#include \"real.h\"");
        assert_eq!(result.includes, vec!["real.h".to_string()]);
    }

    #[test]
    fn skips_char_literal() {
        let result = scan_includes(b"char c = '\"';\n#include \"real.h\"");
        assert_eq!(result.includes, vec!["real.h".to_string()]);
    }

    #[test]
    fn handles_raw_string_literal() {
        let result = scan_includes(b"auto s = R\"DELIM(#include \"fake.h\")DELIM\";\n#include \"real.h\"");
        assert_eq!(result.includes, vec!["real.h".to_string()]);
    }

    #[test]
    fn aborts_on_overlong_raw_delimiter() {
        let delimiter = "x".repeat(65);
        let source = format!("auto s = R\"{delimiter}(body)\";\n#include \"real.h\"");
        let result = scan_includes(source.as_bytes());
        assert!(result.aborted);
    }

    #[test]
    fn unterminated_string_halts_gracefully() {
        let result = scan_includes(b"const char *s = \"unterminated");
        assert!(result.includes.is_empty());
        assert!(!result.aborted);
    }

    #[test]
    fn handles_cycle_source_text_independently() {
        // The lexical scanner has no notion of files; cycle handling lives
        // in the recursive chain walker (see chain.rs tests).
        let result = scan_includes(b"#include \"a.h\"\n#include \"b.h\"\n");
        assert_eq!(result.includes, vec!["a.h".to_string(), "b.h".to_string()]);
    }
}
