//! Compiler entry point: options, selection and the transform pipeline.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span};

use crate::codegen::generate;
use crate::resolve::resolve_bindings;
use crate::scope::ClosureKind;
use crate::validate::{CompilerError, LineIndex, ERR_INVALID_OPTIONS, ERR_PARSE};
use crate::visitor::ScopeBuilder;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    /// Used for diagnostics, source type detection and the source map.
    #[serde(default)]
    pub filename: String,
    /// Regex over display names; anonymous literals match against `""`.
    /// Absent selects every function and class literal.
    #[serde(default)]
    pub select_closures: Option<String>,
    #[serde(default = "default_true")]
    pub preamble: bool,
    #[serde(default)]
    pub source_map: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            filename: String::new(),
            select_closures: None,
            preamble: true,
            source_map: false,
        }
    }
}

impl TransformOptions {
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(json).map_err(|e| {
            CompilerError::runtime(
                ERR_INVALID_OPTIONS,
                &format!("Invalid transform options: {}", e),
                Some(json.to_string()),
            )
        })
    }

    pub fn selection(&self) -> Result<Selection, CompilerError> {
        match &self.select_closures {
            None => Ok(Selection::All),
            Some(pattern) => Regex::new(pattern).map(Selection::Pattern).map_err(|e| {
                CompilerError::runtime(
                    ERR_INVALID_OPTIONS,
                    &format!("Invalid selectClosures pattern: {}", e),
                    Some(pattern.clone()),
                )
            }),
        }
    }
}

/// Which literals become closures.
#[derive(Clone)]
pub enum Selection {
    All,
    Pattern(Regex),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Selection {
    pub fn selects(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Pattern(re) => re.is_match(name),
            Selection::Custom(predicate) => predicate(name),
        }
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "All"),
            Selection::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
            Selection::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct ClosureInfo {
    /// Export name in the generated module.
    pub alias: String,
    pub name: Option<String>,
    /// `function`, `arrow` or `class`.
    pub kind: String,
    pub params: Vec<String>,
    /// Module imports the closure body uses.
    pub imports: Vec<String>,
    /// False for top-level declarations and default exports.
    pub hoisted: bool,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<String>,
    pub closures: Vec<ClosureInfo>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn transform_native(
    source: String,
    options_json: Option<String>,
) -> napi::Result<TransformOutput> {
    let options = match options_json {
        Some(json) => TransformOptions::from_json(&json),
        None => Ok(TransformOptions::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    transform(&source, &options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

fn source_type_for(filename: &str) -> SourceType {
    SourceType::from_path(filename).unwrap_or_else(|_| {
        SourceType::default()
            .with_module(true)
            .with_typescript(true)
            .with_jsx(true)
    })
}

pub fn transform(source: &str, options: &TransformOptions) -> Result<TransformOutput, CompilerError> {
    let selection = options.selection()?;
    transform_with(source, options, &selection)
}

/// Parse, build scopes, resolve bindings and emit, with an explicit
/// selection that may be a Rust closure.
pub fn transform_with(
    source: &str,
    options: &TransformOptions,
    selection: &Selection,
) -> Result<TransformOutput, CompilerError> {
    let span = info_span!("transform", file = %options.filename);
    let _guard = span.enter();

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(&options.filename)).parse();
    let index = LineIndex::new(source);
    if ret.panicked || !ret.errors.is_empty() {
        let first = ret.errors.first();
        let offset = first
            .and_then(|e| e.labels.as_ref())
            .and_then(|labels| labels.first())
            .map(|label| label.offset() as u32)
            .unwrap_or(0);
        let (line, column) = index.position(source, offset);
        let message = first
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Parser aborted".to_string());
        return Err(CompilerError::with_details(
            ERR_PARSE,
            &message,
            &options.filename,
            line + 1,
            column,
            None,
            ret.errors.iter().skip(1).map(|e| e.to_string()).collect(),
        ));
    }

    let mut analysis = ScopeBuilder::new(source, selection, ret.program.span).build(&ret.program);
    debug!(
        scopes = analysis.tree.len(),
        closures = analysis.tree.closures().len(),
        "built scope tree"
    );
    resolve_bindings(&mut analysis.tree);
    let generated = generate(source, &analysis, options)?;

    let closures = analysis
        .tree
        .closures()
        .iter()
        .map(|closure| {
            let (line, column) = index.position(source, closure.span.start);
            ClosureInfo {
                alias: closure.alias.clone(),
                name: closure.name.clone(),
                kind: match closure.kind {
                    ClosureKind::Function => "function",
                    ClosureKind::Arrow => "arrow",
                    ClosureKind::Class => "class",
                }
                .to_string(),
                params: closure.params(),
                imports: analysis.tree.scope(closure.scope).imports.clone(),
                hoisted: closure.is_hoisted(),
                line: line + 1,
                column,
            }
        })
        .collect();

    Ok(TransformOutput {
        code: generated.code,
        map: generated.map,
        closures,
    })
}
