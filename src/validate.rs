#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scope::{Closure, Edit};

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "HB-ERR-PARSE-001";
pub const ERR_BINDING_ARITY: &str = "HB-ERR-RESOLVE-001";
pub const ERR_MISSING_DECLARATION: &str = "HB-ERR-RESOLVE-002";
pub const ERR_CYCLIC_CLOSURES: &str = "HB-ERR-RESOLVE-003";
pub const ERR_OVERLAPPING_EDITS: &str = "HB-ERR-REWRITE-001";
pub const ERR_UNSERIALIZABLE: &str = "HB-ERR-HIBERNATE-001";
pub const ERR_MALFORMED_PAYLOAD: &str = "HB-ERR-HYDRATE-001";
pub const ERR_MODULE_LOAD: &str = "HB-ERR-HYDRATE-002";
pub const ERR_MISSING_EXPORT: &str = "HB-ERR-HYDRATE-003";
pub const ERR_ANCHOR_NOT_FOUND: &str = "HB-ERR-HYDRATE-004";
pub const ERR_INVALID_OPTIONS: &str = "HB-ERR-CONFIG-001";
pub const ERR_IO: &str = "HB-ERR-IO-001";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_PARSE => "Malformed source never produces partial output.",
        ERR_BINDING_ARITY => {
            "Every hoisted closure takes exactly one parameter per captured binding."
        }
        ERR_MISSING_DECLARATION => {
            "Every captured binding resolves to the same declaration at its call site."
        }
        ERR_CYCLIC_CLOSURES => {
            "A JSX tag never names a closure that is only reachable through a lazy reference."
        }
        ERR_OVERLAPPING_EDITS => "Source edits never overlap within one region.",
        ERR_UNSERIALIZABLE => "Only closures carrying an origin descriptor can be hibernated.",
        ERR_MALFORMED_PAYLOAD => "Hydration only accepts payloads produced by the hibernator.",
        ERR_MODULE_LOAD => "A failed module load rejects only the branch that needed it.",
        ERR_MISSING_EXPORT => "Lazy descriptors name an export of the module they load.",
        ERR_ANCHOR_NOT_FOUND => "DOM anchors resolve against the hydration root.",
        ERR_INVALID_OPTIONS => "Transform options are validated before compilation starts.",
        ERR_IO => "Batch compilation reports unreadable files instead of skipping them.",
        _ => "Unknown invariant.",
    }
}

fn get_error_type(code: &str) -> &'static str {
    match code {
        ERR_PARSE => "PARSE_ERROR",
        ERR_BINDING_ARITY | ERR_MISSING_DECLARATION | ERR_OVERLAPPING_EDITS => {
            "COMPILER_INVARIANT_VIOLATION"
        }
        ERR_CYCLIC_CLOSURES => "UNSUPPORTED_CAPTURE",
        ERR_UNSERIALIZABLE => "SERIALIZATION_ERROR",
        ERR_MALFORMED_PAYLOAD | ERR_MODULE_LOAD | ERR_MISSING_EXPORT | ERR_ANCHOR_NOT_FOUND => {
            "HYDRATION_ERROR"
        }
        ERR_INVALID_OPTIONS => "CONFIG_ERROR",
        ERR_IO => "IO_ERROR",
        _ => "COMPILER_INVARIANT_VIOLATION",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: get_error_type(code).to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }

    /// Errors raised outside any source file (runtime protocol, options).
    pub fn runtime(code: &str, message: &str, context: Option<String>) -> Self {
        Self::with_details(code, message, "", 0, 0, context, vec![])
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.file.is_empty() {
            write!(f, " ({}:{}:{})", self.file, self.line, self.column)?;
        }
        if let Some(context) = &self.context {
            write!(f, "\n  context: {}", context)?;
        }
        for hint in &self.hints {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte offset → (line, column) lookup. Columns count UTF-16 code units so
/// they line up with source map consumers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    /// Zero-based (line, utf16 column) of `offset`.
    pub fn position(&self, source: &str, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let end = (offset as usize).min(source.len());
        let column = source
            .get(start..end)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(0);
        (line as u32, column as u32)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A hoisted closure must take one parameter per binding and receive one
/// argument per parameter. Anything else is a resolver bug.
pub fn check_binding_arity(
    closure: &Closure,
    params: &[String],
    args: &[String],
    file: &str,
) -> Result<(), CompilerError> {
    let bindings = closure.bindings.len();
    if bindings == params.len() && params.len() == args.len() {
        return Ok(());
    }
    Err(CompilerError::with_details(
        ERR_BINDING_ARITY,
        &format!(
            "Closure '{}' has {} bindings, {} parameters and {} arguments.",
            closure.alias,
            bindings,
            params.len(),
            args.len()
        ),
        file,
        0,
        0,
        Some(format!("params = [{}], args = [{}]", params.join(", "), args.join(", "))),
        vec![],
    ))
}

/// Sorts `edits` by position and rejects overlapping ranges. Insertions at
/// the same offset keep their recording order.
pub fn check_edits(edits: &mut [Edit], file: &str) -> Result<(), CompilerError> {
    edits.sort_by_key(|edit| (edit.start, edit.end));
    for pair in edits.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.end > next.start {
            return Err(CompilerError::with_details(
                ERR_OVERLAPPING_EDITS,
                &format!(
                    "Edit {}..{} overlaps edit {}..{}.",
                    prev.start, prev.end, next.start, next.end
                ),
                file,
                0,
                0,
                Some(format!("{:?} / {:?}", prev.text, next.text)),
                vec![],
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    use crate::resolve::resolve_bindings;
    use crate::transform::Selection;
    use crate::visitor::ScopeBuilder;

    #[test]
    fn test_arity_mismatch_is_an_invariant_violation() {
        let code = "function App(a, b) { const f = () => a + b; return f; }";
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
        let mut analysis = ScopeBuilder::new(code, &Selection::All, ret.program.span).build(&ret.program);
        resolve_bindings(&mut analysis.tree);
        let f = analysis
            .tree
            .closures()
            .iter()
            .find(|c| c.name.as_deref() == Some("f"))
            .unwrap();

        let params = f.params();
        assert!(check_binding_arity(f, &params, &["a".to_string(), "b".to_string()], "app.js").is_ok());
        let error = check_binding_arity(f, &params, &["a".to_string()], "app.js").unwrap_err();
        assert_eq!(error.code, ERR_BINDING_ARITY);
        assert_eq!(error.error_type, "COMPILER_INVARIANT_VIOLATION");
        assert_eq!(error.context.as_deref(), Some("params = [a, b], args = [a]"));
    }

    #[test]
    fn test_overlapping_edits_are_rejected() {
        let mut edits = vec![Edit::replace(4, 10, "x"), Edit::replace(8, 12, "y")];
        let error = check_edits(&mut edits, "app.js").unwrap_err();
        assert_eq!(error.code, ERR_OVERLAPPING_EDITS);
        assert_eq!(error.file, "app.js");
    }

    #[test]
    fn test_edits_sort_and_keep_insertion_order() {
        let mut edits = vec![
            Edit::replace(5, 9, "call()"),
            Edit::insert(5, "const a = 1; "),
            Edit::replace(0, 2, "x"),
            Edit::insert(5, "const b = 2; "),
            Edit::insert(9, ";"),
        ];
        check_edits(&mut edits, "app.js").unwrap();
        let texts: Vec<&str> = edits.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "const a = 1; ", "const b = 2; ", "call()", ";"]);
    }

    #[test]
    fn test_line_index_counts_utf16_columns() {
        let source = "a\n\u{e9}\u{1f600}b";
        let index = LineIndex::new(source);
        let offset = source.find('b').unwrap() as u32;
        assert_eq!(index.position(source, offset), (1, 3));
    }
}
