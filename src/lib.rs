//! # Hibernate Compiler
//!
//! Build time: every selected function and class literal in a module is
//! hoisted into its own exported factory. Free variables become factory
//! parameters, and each original site calls the factory with the captured
//! values. The result can be loaded one closure at a time.
//!
//! Serve time: live values whose closures were tagged by the generated
//! `__closure` calls are hibernated into JavaScript text, and hydrated back
//! into an equivalent graph with lazily loaded modules.
//!
//! ## Pipeline
//!
//! 1. **Scope building** (`visitor`): one pass over the oxc AST records
//!    scopes, declarations, references and extraction candidates.
//! 2. **Binding resolution** (`resolve`): bottom-up, each closure gets its
//!    ordered parameter/argument list.
//! 3. **Rewriting** (`renamer`, `codegen`): per-region edits, factories,
//!    preamble and source map.
//!
//! Identifier invariants:
//!
//! - Call arguments are spelled in the scope the literal was written in, so
//!   a captured name resolves to the same declaration at the call site as
//!   inside the closure, or compilation fails (`HB-ERR-RESOLVE-002`).
//! - A nested declaration is materialized once. Every reference shares that
//!   instance, and a capture of a binding that is not initialized yet is
//!   passed as a `__lazyRef` thunk.
//! - Parameters, bindings and call arguments always have equal length
//!   (`HB-ERR-RESOLVE-001`).
//! - Names that resolve nowhere are globals and are never rewritten.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod cache;
mod codegen;
mod discovery;
mod naming;
mod pattern;
mod renamer;
mod resolve;
pub mod runtime;
mod scope;
mod transform;
mod validate;
mod visitor;

#[cfg(test)]
mod hibernate_tests;
#[cfg(test)]
mod transform_tests;

pub use cache::IncrementalCache;
pub use codegen::PREAMBLE;
pub use discovery::{find_script_files, transform_tree, CompiledFile};
pub use naming::content_alias;
pub use runtime::hibernate::{hibernate, Hibernator, Payload};
pub use runtime::hydrate::{hydrate, resolve_lazy, Hydrator, PartialHydration};
pub use runtime::loader::{InMemorySource, ModuleCache, ModuleRecord, ModuleSource};
pub use runtime::{structurally_equal, Value};
pub use transform::{
    transform, transform_with, ClosureInfo, Selection, TransformOptions, TransformOutput,
};
pub use validate::*;

#[cfg(feature = "napi")]
pub use discovery::transform_tree_native;
#[cfg(feature = "napi")]
pub use transform::transform_native;

#[cfg(feature = "napi")]
#[napi]
pub fn compiler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
