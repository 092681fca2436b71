//! Call-site rendering.
//!
//! Decides where each hoisted declaration is materialized and spells the
//! factory calls. A nested declaration becomes a single `const` binding so
//! every reference shares one instance; a declaration used exactly once,
//! after it and in its own scope, is called in place instead. Arguments are
//! spelled in the scope the literal was written in, which is where its
//! bindings were resolved.

use oxc_span::Span;
use std::collections::{HashMap, HashSet};

use crate::resolve::{arguments_param, this_param};
use crate::scope::{
    BindingArg, Closure, ClosureContext, ClosureId, ClosureKind, Edit, Reference, ReferenceKind,
    ReferencePosition, ScopeId, ScopeTree, Target,
};
use crate::validate::{
    check_binding_arity, CompilerError, ERR_CYCLIC_CLOSURES, ERR_MISSING_DECLARATION,
};

/// Where a hoisted declaration turns back into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Its only reference becomes the factory call.
    Inline(Span),
    /// `const name = alias(args);` (or `let` when reassigned) at `at`.
    Bound { at: u32, mutable: bool },
}

/// Order of a factory call among the edits of its region: offset, then
/// insertions before replacements, then closure order.
type SiteKey = (u32, u8, ClosureId);

pub struct Renamer<'t> {
    tree: &'t ScopeTree,
    file: &'t str,
    placements: HashMap<ClosureId, Placement>,
    /// (capturing closure, captured declaration) pairs that receive a
    /// thunk because the declaration is not initialized at the call.
    lazy: HashSet<(ClosureId, ClosureId)>,
}

impl<'t> Renamer<'t> {
    pub fn new(tree: &'t ScopeTree, file: &'t str) -> Self {
        let mut uses: HashMap<ClosureId, Vec<&Reference>> = HashMap::new();
        for reference in &tree.scope(ScopeId::ROOT).references {
            let Some(closure) = hoisted_declaration(tree, reference) else {
                continue;
            };
            if tree.region_of(reference.scope) == tree.region_of(tree.closure(closure).parent) {
                uses.entry(closure).or_default().push(reference);
            }
        }
        let mut captured_by: HashMap<ClosureId, Vec<ClosureId>> = HashMap::new();
        for closure in tree.closures() {
            for binding in &closure.bindings {
                if let BindingArg::Closure(target) = binding.arg {
                    captured_by.entry(target).or_default().push(closure.id);
                }
            }
        }

        let placements = place_declarations(tree, &uses, &captured_by);
        let lazy = lazy_bindings(tree, &placements);
        Renamer {
            tree,
            file,
            placements,
            lazy,
        }
    }

    pub fn placement(&self, closure: ClosureId) -> Option<Placement> {
        self.placements.get(&closure).copied()
    }

    /// `alias(args)`, spelled in the closure's parent scope.
    pub fn call(&self, closure: ClosureId) -> Result<String, CompilerError> {
        let unit = self.tree.closure(closure);
        let at = unit.parent;
        let mut args = Vec::with_capacity(unit.bindings.len());
        for binding in &unit.bindings {
            let arg = match &binding.arg {
                BindingArg::Identifier(name) => {
                    let resolved = self.tree.resolve(at, name).map(|r| r.scope);
                    if resolved != Some(binding.declared_in) {
                        return Err(CompilerError::with_details(
                            ERR_MISSING_DECLARATION,
                            &format!(
                                "Captured binding '{}' of closure '{}' does not resolve at its call site.",
                                name, unit.alias
                            ),
                            self.file,
                            0,
                            0,
                            None,
                            vec![],
                        ));
                    }
                    name.clone()
                }
                BindingArg::Closure(target) => self.closure_arg(closure, *target, &binding.param),
                BindingArg::This(owner) => self.render_this(*owner, at),
                BindingArg::Arguments(owner) => self.render_arguments(*owner, at),
            };
            args.push(arg);
        }
        check_binding_arity(unit, &unit.params(), &args, self.file)?;
        Ok(format!("{}({})", unit.alias, args.join(", ")))
    }

    /// A captured declaration as an argument. In the declaring region it is
    /// the local binding, or a thunk over it when that binding comes later.
    /// Further in, it is the parameter that already carries it.
    fn closure_arg(&self, closure: ClosureId, target: ClosureId, name: &str) -> String {
        let unit = self.tree.closure(target);
        let site = self.tree.region_of(self.tree.closure(closure).parent);
        if site == self.tree.region_of(unit.parent) && self.lazy.contains(&(closure, target)) {
            format!("__lazyRef(\"{}\", () => {})", unit.alias, name)
        } else {
            name.to_string()
        }
    }

    /// `this` as seen from `at`: renamed to its threaded parameter when `at`
    /// sits in a hoisted closure that does not contain the owner.
    fn render_this(&self, owner: ScopeId, at: ScopeId) -> String {
        if owner == ScopeId::ROOT || !self.is_threaded(owner, at) {
            return "this".to_string();
        }
        this_param(self.tree.scope(owner).owner.start)
    }

    fn render_arguments(&self, owner: ScopeId, at: ScopeId) -> String {
        if !self.is_threaded(owner, at) {
            return "arguments".to_string();
        }
        arguments_param(self.tree.scope(owner).owner.start)
    }

    fn is_threaded(&self, owner: ScopeId, at: ScopeId) -> bool {
        match self.tree.region_of(at) {
            Some(region) => !self.tree.is_within(owner, self.tree.closure(region).scope),
            None => false,
        }
    }

    /// Edit for one reference, if its spelling changes.
    pub fn reference_edit(&self, reference: &Reference) -> Result<Option<Edit>, CompilerError> {
        let span = reference.span;
        let (text, keyword) = match &reference.kind {
            ReferenceKind::This { owner } => (self.render_this(*owner, reference.scope), "this"),
            ReferenceKind::Arguments { owner } => {
                (self.render_arguments(*owner, reference.scope), "arguments")
            }
            ReferenceKind::Identifier(name) => return self.identifier_edit(reference, name),
        };
        if text == keyword {
            return Ok(None);
        }
        Ok(Some(Edit::replace(span.start, span.end, text)))
    }

    fn identifier_edit(&self, reference: &Reference, name: &str) -> Result<Option<Edit>, CompilerError> {
        let Some(closure) = hoisted_declaration(self.tree, reference) else {
            return Ok(None);
        };
        let unit = self.tree.closure(closure);
        let region = self.tree.region_of(reference.scope);
        let value = if region == self.tree.region_of(unit.parent) {
            match self.placement(closure) {
                Some(Placement::Inline(only)) if only == reference.span => self.call(closure)?,
                _ => return Ok(None),
            }
        } else {
            match region {
                Some(region) if self.lazy.contains(&(region, closure)) => format!("{}()", name),
                _ => return Ok(None),
            }
        };
        let text = match reference.position {
            ReferencePosition::Plain => value,
            ReferencePosition::NewCallee => format!("({})", value),
            ReferencePosition::Shorthand => format!("{}: {}", name, value),
            ReferencePosition::AssignTarget => return Ok(None),
            ReferencePosition::JsxName => {
                return Err(CompilerError::with_details(
                    ERR_CYCLIC_CLOSURES,
                    &format!(
                        "JSX tag <{}> names a closure that is only reachable lazily at this point.",
                        name
                    ),
                    self.file,
                    0,
                    0,
                    Some(unit.alias.clone()),
                    vec!["Declare the component before the closures that render it.".to_string()],
                ))
            }
        };
        Ok(Some(Edit::replace(reference.span.start, reference.span.end, text)))
    }
}

fn place_declarations(
    tree: &ScopeTree,
    uses: &HashMap<ClosureId, Vec<&Reference>>,
    captured_by: &HashMap<ClosureId, Vec<ClosureId>>,
) -> HashMap<ClosureId, Placement> {
    let mut placements = HashMap::new();
    for closure in tree.closures().iter().filter(|c| c.is_hoisted()) {
        let ClosureContext::Declaration { statement, .. } = &closure.context else {
            continue;
        };
        let direct = uses.get(&closure.id).map(Vec::as_slice).unwrap_or(&[]);
        let placement = match direct {
            [only]
                if !captured_by.contains_key(&closure.id)
                    && only.scope == closure.parent
                    && only.span.start >= statement.end
                    && matches!(
                        only.position,
                        ReferencePosition::Plain
                            | ReferencePosition::NewCallee
                            | ReferencePosition::Shorthand
                    ) =>
            {
                Placement::Inline(only.span)
            }
            _ => Placement::Bound {
                at: statement.start,
                mutable: direct
                    .iter()
                    .any(|r| r.position == ReferencePosition::AssignTarget),
            },
        };
        placements.insert(closure.id, placement);
    }

    // Function declarations are hoisted: a binding needed before its
    // statement moves up to the statement holding the earliest use. Moving
    // one binding can move the sites of the closures it captures for.
    loop {
        let mut changed = false;
        for closure in tree.closures() {
            if closure.kind != ClosureKind::Function {
                continue;
            }
            let Some(Placement::Bound { at, mutable }) = placements.get(&closure.id).copied() else {
                continue;
            };
            let home = tree.region_of(closure.parent);
            let mut earliest = at;
            for reference in uses.get(&closure.id).into_iter().flatten() {
                earliest = earliest.min(reference.span.start);
            }
            for capturer in captured_by.get(&closure.id).into_iter().flatten() {
                let unit = tree.closure(*capturer);
                if tree.region_of(unit.parent) == home {
                    earliest = earliest.min(site_key(&placements, unit).0);
                }
            }
            let point = closure
                .hoist_points
                .iter()
                .copied()
                .filter(|point| *point <= earliest)
                .max();
            if let Some(point) = point.filter(|point| *point < at) {
                placements.insert(closure.id, Placement::Bound { at: point, mutable });
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    placements
}

fn site_key(placements: &HashMap<ClosureId, Placement>, closure: &Closure) -> SiteKey {
    match (&closure.context, placements.get(&closure.id)) {
        (ClosureContext::Declaration { statement, .. }, Some(Placement::Bound { at, .. })) => {
            (*at, u8::from(*at == statement.start), closure.id)
        }
        (_, Some(Placement::Inline(only))) => (only.start, 1, closure.id),
        _ => (closure.span.start, 1, closure.id),
    }
}

/// Captures whose target binding is not initialized when the capturing
/// factory runs. Outer closures come first, so a call site nested in
/// another closure inherits that closure's choice.
fn lazy_bindings(
    tree: &ScopeTree,
    placements: &HashMap<ClosureId, Placement>,
) -> HashSet<(ClosureId, ClosureId)> {
    let mut lazy = HashSet::new();
    for closure in tree.closures() {
        let site = tree.region_of(closure.parent);
        for binding in &closure.bindings {
            let BindingArg::Closure(target) = binding.arg else {
                continue;
            };
            let unit = tree.closure(target);
            let is_lazy = if site == tree.region_of(unit.parent) {
                site_key(placements, unit) >= site_key(placements, closure)
            } else {
                site.is_some_and(|region| lazy.contains(&(region, target)))
            };
            if is_lazy {
                lazy.insert((closure.id, target));
            }
        }
    }
    lazy
}

/// The hoisted declaration-form closure a reference names, if any.
/// Expression literals are exported under their alias, which never occurs
/// in source, so only declarations can be named.
fn hoisted_declaration(tree: &ScopeTree, reference: &Reference) -> Option<ClosureId> {
    let ReferenceKind::Identifier(name) = &reference.kind else {
        return None;
    };
    let resolution = tree.resolve(reference.scope, name)?;
    let Target::Closure(closure) = resolution.target else {
        return None;
    };
    let unit = tree.closure(closure);
    let is_declaration = matches!(unit.context, ClosureContext::Declaration { .. });
    (is_declaration && unit.is_hoisted()).then_some(closure)
}
