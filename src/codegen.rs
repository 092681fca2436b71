//! Codegen module for the closure compiler.
//!
//! Collects the range edits of every region (the program text and one per
//! hoisted closure), validates them, and reassembles the output in a single
//! deterministic pass: program first, hoisted factories in declaration
//! order, then the runtime preamble. Every copied slice of original text is
//! recorded in the source map.

use sourcemap::SourceMapBuilder;
use std::collections::BTreeMap;

use crate::renamer::{Placement, Renamer};
use crate::scope::{Closure, ClosureContext, ClosureId, ClosureKind, Edit, ScopeId};
use crate::transform::TransformOptions;
use crate::validate::{check_edits, CompilerError, LineIndex, ERR_IO};
use crate::visitor::ScopeAnalysis;

pub const PREAMBLE: &str = r#"
function __closure(fn, exportName, capturedArgs) {
  Object.defineProperty(fn, "$origin", {
    value: { url: import.meta.url, exportName, capturedArgs },
    configurable: true,
  });
  return fn;
}

function __lazyRef(exportName, resolve) {
  const ref = () => resolve();
  Object.defineProperty(ref, "$lazy", {
    value: { url: import.meta.url, exportName },
    configurable: true,
  });
  return ref;
}
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub code: String,
    pub map: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMITTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output buffer that tracks its own line/column so copied source can be
/// mapped back.
struct Emitter<'s> {
    source: &'s str,
    index: LineIndex,
    out: String,
    line: u32,
    column: u32,
    map: Option<(SourceMapBuilder, u32)>,
}

impl<'s> Emitter<'s> {
    fn new(source: &'s str, file: &str, source_map: bool) -> Self {
        let map = source_map.then(|| {
            let mut builder = SourceMapBuilder::new(Some(file));
            let id = builder.add_source(file);
            builder.set_source_contents(id, Some(source));
            (builder, id)
        });
        Emitter {
            source,
            index: LineIndex::new(source),
            out: String::with_capacity(source.len() * 2),
            line: 0,
            column: 0,
            map,
        }
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf16() as u32;
            }
        }
    }

    fn mark(&mut self, offset: u32) {
        if let Some((builder, id)) = &mut self.map {
            let (line, column) = self.index.position(self.source, offset);
            builder.add_raw(self.line, self.column, line, column, Some(*id), None, false);
        }
    }

    fn generated(&mut self, text: &str) {
        self.out.push_str(text);
        self.advance(text);
    }

    fn original(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }
        let source = self.source;
        let mut offset = start;
        for piece in source[start as usize..end as usize].split_inclusive('\n') {
            self.mark(offset);
            self.out.push_str(piece);
            self.advance(piece);
            offset += piece.len() as u32;
        }
    }

    /// Copies `[start, end)` with `edits` (sorted, non-overlapping) applied.
    fn splice(&mut self, start: u32, end: u32, edits: &[Edit]) {
        let mut cursor = start;
        for edit in edits {
            self.original(cursor, edit.start);
            self.mark(edit.start);
            self.generated(&edit.text);
            cursor = edit.end;
        }
        self.original(cursor, end);
    }

    fn finish(self, file: &str) -> Result<Generated, CompilerError> {
        let map = match self.map {
            Some((builder, _)) => {
                let mut buf = Vec::new();
                builder.into_sourcemap().to_writer(&mut buf).map_err(|e| {
                    CompilerError::new(ERR_IO, &format!("Source map error: {}", e), file, 0, 0)
                })?;
                Some(String::from_utf8(buf).map_err(|e| {
                    CompilerError::new(ERR_IO, &format!("Source map error: {}", e), file, 0, 0)
                })?)
            }
            None => None,
        };
        Ok(Generated {
            code: self.out,
            map,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EDIT COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

type Region = Option<ClosureId>;

fn registration(name: &str) -> String {
    format!("__closure({0}, \"{0}\", [])", name)
}

fn collect_edits(
    source: &str,
    analysis: &ScopeAnalysis,
    renamer: &Renamer<'_>,
) -> Result<BTreeMap<Region, Vec<Edit>>, CompilerError> {
    let tree = &analysis.tree;
    let mut regions: BTreeMap<Region, Vec<Edit>> = BTreeMap::new();

    for reference in &tree.scope(ScopeId::ROOT).references {
        if let Some(edit) = renamer.reference_edit(reference)? {
            regions
                .entry(tree.region_of(reference.scope))
                .or_default()
                .push(edit);
        }
    }

    for closure in tree.closures() {
        if closure.is_hoisted() {
            let region = tree.region_of(closure.parent);
            let edits = hoisted_site_edits(closure, renamer)?;
            regions.entry(region).or_default().extend(edits);
        } else {
            let edits = in_place_edits(source, closure, analysis);
            regions.entry(None).or_default().extend(edits);
        }
    }
    Ok(regions)
}

/// Edits at the place a hoisted literal used to be.
fn hoisted_site_edits(closure: &Closure, renamer: &Renamer<'_>) -> Result<Vec<Edit>, CompilerError> {
    let span = closure.span;
    let edits = match &closure.context {
        ClosureContext::Declaration { statement, .. } => match renamer.placement(closure.id) {
            Some(Placement::Bound { at, mutable }) => {
                let keyword = if mutable { "let" } else { "const" };
                let name = closure.name.as_deref().unwrap_or(&closure.alias);
                let binding = format!("{} {} = {};", keyword, name, renamer.call(closure.id)?);
                if at == statement.start {
                    vec![Edit::replace(statement.start, statement.end, binding)]
                } else {
                    vec![
                        Edit::insert(at, format!("{} ", binding)),
                        Edit::replace(statement.start, statement.end, ""),
                    ]
                }
            }
            // The single reference carries the call.
            _ => vec![Edit::replace(statement.start, statement.end, "")],
        },
        ClosureContext::Expression => {
            vec![Edit::replace(span.start, span.end, renamer.call(closure.id)?)]
        }
        ClosureContext::ObjectMethod {
            member,
            key,
            computed,
        } => {
            let call = renamer.call(closure.id)?;
            let (open, close) = if *computed { ("[", "]") } else { ("", "") };
            vec![
                Edit::replace(member.start, key.start, open),
                Edit::replace(key.end, member.end, format!("{}: {}", close, call)),
            ]
        }
        ClosureContext::ClassMethod {
            member,
            key,
            computed,
            is_static,
        } => {
            let call = renamer.call(closure.id)?;
            let (open, close) = if *computed { ("[", "]") } else { ("", "") };
            let modifier = if *is_static { "static " } else { "" };
            vec![
                Edit::replace(member.start, key.start, format!("{}{}", modifier, open)),
                Edit::replace(key.end, member.end, format!("{} = {};", close, call)),
            ]
        }
        // Never hoisted.
        ClosureContext::DefaultExport { .. } => Vec::new(),
    };
    Ok(edits)
}

/// Top-level declarations and default exports stay where they are; they
/// only gain an export and a registration call.
fn in_place_edits(source: &str, closure: &Closure, analysis: &ScopeAnalysis) -> Vec<Edit> {
    let name = &closure.alias;
    let span = closure.span;
    match &closure.context {
        ClosureContext::Declaration {
            exported,
            statement,
            ..
        } => {
            let mut edits = Vec::new();
            if !exported && !analysis.exported_names.contains(name) {
                edits.push(Edit::insert(statement.start, "export "));
            }
            edits.push(Edit::insert(
                statement.end,
                format!("\n{};", registration(name)),
            ));
            edits
        }
        ClosureContext::DefaultExport {
            statement,
            declaration: true,
        } => {
            let mut edits = vec![Edit::replace(statement.start, span.start, "export ")];
            if !closure.has_own_id {
                let at = match closure.kind {
                    ClosureKind::Class if source[span.start as usize..].starts_with("class") => {
                        span.start + "class".len() as u32
                    }
                    _ => closure.params_start,
                };
                let gap = if source[..at as usize].ends_with(char::is_whitespace) {
                    ""
                } else {
                    " "
                };
                edits.push(Edit::insert(at, format!("{}{}", gap, name)));
            }
            edits.push(Edit::insert(
                statement.end,
                format!("\nexport default {0};\n{1};", name, registration(name)),
            ));
            edits
        }
        ClosureContext::DefaultExport {
            statement,
            declaration: false,
        } => vec![
            Edit::replace(statement.start, span.start, format!("export const {} = ", name)),
            Edit::replace(
                span.end,
                statement.end,
                format!(";\nexport default {0};\n{1};", name, registration(name)),
            ),
        ],
        _ => Vec::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate(
    source: &str,
    analysis: &ScopeAnalysis,
    options: &TransformOptions,
) -> Result<Generated, CompilerError> {
    let file = options.filename.as_str();
    let tree = &analysis.tree;
    let renamer = Renamer::new(tree, file);
    let mut regions = collect_edits(source, analysis, &renamer)?;
    for edits in regions.values_mut() {
        check_edits(edits, file)?;
    }

    let mut emitter = Emitter::new(source, file, options.source_map);
    let program = regions.remove(&None).unwrap_or_default();
    emitter.splice(0, source.len() as u32, &program);

    for closure in tree.closures().iter().filter(|c| c.is_hoisted()) {
        let edits = regions.remove(&Some(closure.id)).unwrap_or_default();
        emit_factory(&mut emitter, closure, &edits);
    }

    if options.preamble && !tree.closures().is_empty() {
        emitter.generated(PREAMBLE);
    }
    emitter.finish(file)
}

fn emit_factory(emitter: &mut Emitter<'_>, closure: &Closure, edits: &[Edit]) {
    let params = closure.params().join(", ");
    let alias = &closure.alias;
    emitter.generated(&format!("\n\nexport function {}({}) {{\n", alias, params));
    let binding = match (&closure.self_name, closure.self_referencing) {
        (Some(name), true) => {
            emitter.generated(&format!("  const {} = __closure(", name));
            Some(name)
        }
        _ => {
            emitter.generated("  return __closure(");
            None
        }
    };

    let is_method = matches!(
        closure.context,
        ClosureContext::ObjectMethod { .. } | ClosureContext::ClassMethod { .. }
    );
    if is_method {
        let mut head = String::new();
        if closure.is_async {
            head.push_str("async ");
        }
        head.push_str("function");
        if closure.is_generator {
            head.push('*');
        }
        head.push(' ');
        emitter.generated(&head);
        emitter.splice(closure.params_start, closure.span.end, edits);
    } else {
        emitter.splice(closure.span.start, closure.span.end, edits);
    }

    emitter.generated(&format!(", \"{}\", [{}]);\n", alias, params));
    if let Some(name) = binding {
        emitter.generated(&format!("  return {};\n", name));
    }
    emitter.generated("}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_applies_sorted_edits() {
        let source = "let a = b + c;";
        let mut emitter = Emitter::new(source, "t.js", false);
        let edits = vec![Edit::replace(8, 9, "x"), Edit::replace(12, 13, "y(z)")];
        emitter.splice(0, source.len() as u32, &edits);
        let out = emitter.finish("t.js").unwrap();
        assert_eq!(out.code, "let a = x + y(z);");
        assert!(out.map.is_none());
    }

    #[test]
    fn test_source_map_points_back_to_original_lines() {
        let source = "a;\nb;\n";
        let mut emitter = Emitter::new(source, "t.js", true);
        emitter.generated("// head\n");
        emitter.splice(0, source.len() as u32, &[]);
        let out = emitter.finish("t.js").unwrap();
        let map = sourcemap::SourceMap::from_slice(out.map.unwrap().as_bytes()).unwrap();
        let token = map.lookup_token(2, 0).unwrap();
        assert_eq!(token.get_src_line(), 1);
        assert_eq!(token.get_src_col(), 0);
    }
}
