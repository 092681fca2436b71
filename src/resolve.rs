//! Binding resolver.
//!
//! Runs once the scope tree is complete. For every closure, each reference
//! made anywhere inside its scope subtree is resolved statically from the
//! scope it was made in; references that escape the closure become its
//! ordered binding list.

use std::collections::HashSet;
use tracing::debug;

use crate::scope::{
    Binding, BindingArg, ClosureId, ReferenceKind, Resolution, ScopeId, ScopeTree, Target,
};

/// Parameter name used to thread `this` of the scope opened at `offset`.
pub fn this_param(offset: u32) -> String {
    format!("this_{}", offset)
}

/// Parameter name used to thread `arguments` of the function opened at
/// `offset`.
pub fn arguments_param(offset: u32) -> String {
    format!("arguments_{}", offset)
}

pub fn resolve_bindings(tree: &mut ScopeTree) {
    let ids: Vec<ClosureId> = tree.closures().iter().map(|c| c.id).collect();
    for id in ids.into_iter().rev() {
        let resolved = closure_bindings(tree, id);
        let scope = tree.closure(id).scope;
        tree.scope_mut(scope).imports = resolved.imports;
        let closure = tree.closure_mut(id);
        debug!(
            alias = %closure.alias,
            captured = resolved.bindings.len(),
            self_referencing = resolved.self_referencing,
            "resolved closure bindings"
        );
        closure.bindings = resolved.bindings;
        closure.self_referencing = resolved.self_referencing;
    }
}

struct Resolved {
    bindings: Vec<Binding>,
    self_referencing: bool,
    imports: Vec<String>,
}

fn closure_bindings(tree: &ScopeTree, id: ClosureId) -> Resolved {
    let closure = tree.closure(id);
    let own = closure.scope;
    let module_imports = &tree.scope(ScopeId::ROOT).imports;
    let mut resolved = Resolved {
        bindings: Vec::new(),
        self_referencing: false,
        imports: Vec::new(),
    };
    let mut seen = HashSet::new();

    for reference in &tree.scope(own).references {
        let (param, arg, declared_in) = match &reference.kind {
            ReferenceKind::Identifier(name) => {
                let Some(Resolution { scope, target }) = tree.resolve(reference.scope, name) else {
                    // Free: a global, resolved at run time.
                    continue;
                };
                if scope == ScopeId::ROOT {
                    if module_imports.contains(name) && !resolved.imports.contains(name) {
                        resolved.imports.push(name.clone());
                    }
                    continue;
                }
                if tree.is_within(scope, own) {
                    continue;
                }
                let arg = match target {
                    Target::Declaration => {
                        if scope == closure.parent && closure.self_name.as_deref() == Some(name) {
                            resolved.self_referencing = true;
                            continue;
                        }
                        BindingArg::Identifier(name.clone())
                    }
                    Target::Closure(other) if other == id => continue,
                    Target::Closure(other) => BindingArg::Closure(other),
                };
                (name.clone(), arg, scope)
            }
            ReferenceKind::This { owner } => {
                if *owner == ScopeId::ROOT || tree.is_within(*owner, own) {
                    continue;
                }
                let param = this_param(tree.scope(*owner).owner.start);
                (param, BindingArg::This(*owner), *owner)
            }
            ReferenceKind::Arguments { owner } => {
                if tree.is_within(*owner, own) {
                    continue;
                }
                let param = arguments_param(tree.scope(*owner).owner.start);
                (param, BindingArg::Arguments(*owner), *owner)
            }
        };
        if seen.insert(param.clone()) {
            resolved.bindings.push(Binding {
                param,
                arg,
                declared_in,
            });
        }
    }
    resolved
}
