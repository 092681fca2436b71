//! Scope tree for closure extraction.
//!
//! Scopes live in an append-only arena addressed by [`ScopeId`]. A scope is
//! created when the builder enters a function, arrow, class, class member or
//! loop, and finalized when it is popped; nothing is mutated through parent
//! back-pointers afterwards except by the resolver, which only fills in
//! closure bindings.

use indexmap::IndexMap;
use oxc_span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureId(u32);

impl ClosureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Arrow,
    Method,
    Class,
    ClassMember,
    Loop,
}

impl ScopeKind {
    /// Whether `this` is bound by the scope itself rather than forwarded
    /// from the nearest enclosing thisable scope.
    pub fn is_thisable(self) -> bool {
        match self {
            ScopeKind::Program
            | ScopeKind::Function
            | ScopeKind::Method
            | ScopeKind::Class
            | ScopeKind::ClassMember => true,
            ScopeKind::Arrow | ScopeKind::Loop => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Span of the node that opened the scope.
    pub owner: Span,
    /// Nearest thisable scope, itself included.
    pub this_owner: ScopeId,
    /// Declared name → canonical name.
    pub declarations: IndexMap<String, String>,
    /// References made in this scope and, once popped, in all its children.
    pub references: Vec<Reference>,
    /// Names under which closures are exported from this scope.
    pub exports: IndexMap<String, ClosureId>,
    pub children: Vec<ScopeId>,
    /// Module imports used from inside this closure scope.
    pub imports: Vec<String>,
    /// The closure whose own scope this is.
    pub closure: Option<ClosureId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Identifier(String),
    This { owner: ScopeId },
    /// `arguments` of the nearest enclosing non-arrow function.
    Arguments { owner: ScopeId },
}

/// Syntactic slot of a reference; decides how a replacement is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePosition {
    Plain,
    /// Value of a shorthand property (`{ name }`).
    Shorthand,
    /// Callee of a `new` expression.
    NewCallee,
    /// JSX tag name; cannot hold a call expression.
    JsxName,
    /// Left side of an assignment or update.
    AssignTarget,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub span: Span,
    /// Scope the reference was made in.
    pub scope: ScopeId,
    pub position: ReferencePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureKind {
    Function,
    Arrow,
    Class,
}

/// The literal's immediate syntactic parent; picks the rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureContext {
    /// `function f() {}` / `class C {}` statement.
    Declaration {
        top_level: bool,
        exported: bool,
        statement: Span,
    },
    /// Any expression position, declarator initialisers included.
    Expression,
    /// `{ key() {} }`; `member` is the whole property.
    ObjectMethod {
        member: Span,
        key: Span,
        computed: bool,
    },
    /// `class { [static] key() {} }`; `member` starts after any decorators.
    ClassMethod {
        member: Span,
        key: Span,
        computed: bool,
        is_static: bool,
    },
    /// `export default <literal>`
    DefaultExport {
        statement: Span,
        /// Whether the literal is a function/class declaration form.
        declaration: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingArg {
    /// Forward the identifier from the call site.
    Identifier(String),
    /// Another extracted closure, passed by its local binding or as a
    /// lazy reference when that binding is not initialized yet.
    Closure(ClosureId),
    /// Forward `this` of the given thisable scope.
    This(ScopeId),
    /// Forward `arguments` of the given function scope.
    Arguments(ScopeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub param: String,
    pub arg: BindingArg,
    /// Scope holding the captured declaration (or the `this` owner).
    pub declared_in: ScopeId,
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub id: ClosureId,
    /// Human-readable name: the literal's own id, its declarator or its key.
    pub name: Option<String>,
    /// Export name of the hoisted factory (or of the declaration itself
    /// for top-level declarations).
    pub alias: String,
    pub kind: ClosureKind,
    pub context: ClosureContext,
    pub scope: ScopeId,
    pub parent: ScopeId,
    /// Full span of the literal.
    pub span: Span,
    /// Whether the literal carries its own name (`function f`, `class C`).
    pub has_own_id: bool,
    pub is_async: bool,
    pub is_generator: bool,
    /// Start of the parameter list, for methods rewritten to functions.
    pub params_start: u32,
    /// Declarator name bound to this literal (`const f = () => …`).
    pub self_name: Option<String>,
    /// Set by the resolver when the body refers to `self_name`.
    pub self_referencing: bool,
    /// Starts of the statements before a nested declaration in its
    /// statement list. A function binding needed earlier moves to one.
    pub hoist_points: Vec<u32>,
    pub bindings: Vec<Binding>,
}

impl Closure {
    /// Top-level declarations and default exports stay in place; every
    /// other closure is moved into a hoisted factory.
    pub fn is_hoisted(&self) -> bool {
        !matches!(
            self.context,
            ClosureContext::Declaration {
                top_level: true,
                ..
            } | ClosureContext::DefaultExport { .. }
        )
    }

    pub fn params(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.param.clone()).collect()
    }
}

/// A non-destructive text edit against the original source. Insertions are
/// edits with `start == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Edit {
    pub fn replace(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }
}

/// What a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Declaration,
    Closure(ClosureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub scope: ScopeId,
    pub target: Target,
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    closures: Vec<Closure>,
}

impl ScopeTree {
    pub fn new(program: Span) -> Self {
        let mut tree = Self::default();
        tree.scopes.push(Scope {
            kind: ScopeKind::Program,
            parent: None,
            owner: program,
            this_owner: ScopeId::ROOT,
            declarations: IndexMap::new(),
            references: Vec::new(),
            exports: IndexMap::new(),
            children: Vec::new(),
            imports: Vec::new(),
            closure: None,
        });
        tree
    }

    pub fn create_scope(&mut self, kind: ScopeKind, parent: ScopeId, owner: Span) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let this_owner = if kind.is_thisable() {
            id
        } else {
            self.scope(parent).this_owner
        };
        self.scopes.push(Scope {
            kind,
            parent: Some(parent),
            owner,
            this_owner,
            declarations: IndexMap::new(),
            references: Vec::new(),
            exports: IndexMap::new(),
            children: Vec::new(),
            imports: Vec::new(),
            closure: None,
        });
        self.scopes[parent.index()].children.push(id);
        id
    }

    pub fn add_closure(&mut self, closure: Closure) -> ClosureId {
        let id = closure.id;
        self.scopes[closure.scope.index()].closure = Some(id);
        self.closures.push(closure);
        id
    }

    pub fn next_closure_id(&self) -> ClosureId {
        ClosureId(self.closures.len() as u32)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn scopes(&self) -> impl DoubleEndedIterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, scope)| (ScopeId(i as u32), scope))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn closure(&self, id: ClosureId) -> &Closure {
        &self.closures[id.index()]
    }

    pub fn closure_mut(&mut self, id: ClosureId) -> &mut Closure {
        &mut self.closures[id.index()]
    }

    pub fn closures(&self) -> &[Closure] {
        &self.closures
    }

    pub fn declare(&mut self, scope: ScopeId, name: &str) {
        self.scopes[scope.index()]
            .declarations
            .insert(name.to_string(), name.to_string());
    }

    pub fn export(&mut self, scope: ScopeId, name: &str, closure: ClosureId) {
        self.scopes[scope.index()]
            .exports
            .insert(name.to_string(), closure);
    }

    /// Appends the popped child's references to its parent so the parent
    /// sees through inlined inner scopes.
    pub fn merge_into_parent(&mut self, child: ScopeId) {
        let Some(parent) = self.scope(child).parent else {
            return;
        };
        let references = self.scope(child).references.clone();
        self.scopes[parent.index()].references.extend(references);
    }

    /// Static name resolution: nearest scope declaring `name`, checking
    /// declarations before exported closures.
    pub fn resolve(&self, from: ScopeId, name: &str) -> Option<Resolution> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id);
            if scope.declarations.contains_key(name) {
                return Some(Resolution {
                    scope: id,
                    target: Target::Declaration,
                });
            }
            if let Some(&closure) = scope.exports.get(name) {
                return Some(Resolution {
                    scope: id,
                    target: Target::Closure(closure),
                });
            }
            current = scope.parent;
        }
        None
    }

    /// Scope whose `arguments` a reference made in `scope` sees: the
    /// nearest function or method, looking through arrows and loops.
    pub fn arguments_owner(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            match s.kind {
                ScopeKind::Function | ScopeKind::Method => return Some(id),
                ScopeKind::Arrow | ScopeKind::Loop => current = s.parent,
                ScopeKind::Program | ScopeKind::Class | ScopeKind::ClassMember => return None,
            }
        }
        None
    }

    /// Nearest scope that owns `var` declarations made in `scope`.
    pub fn var_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while self.scope(current).kind == ScopeKind::Loop {
            match self.scope(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Whether `scope` is `ancestor` or nested inside it.
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }

    /// Innermost hoisted closure whose scope contains `scope`. Code outside
    /// every hoisted closure belongs to the program region (`None`).
    pub fn region_of(&self, scope: ScopeId) -> Option<ClosureId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(closure) = s.closure {
                if self.closure(closure).is_hoisted() {
                    return Some(closure);
                }
            }
            current = s.parent;
        }
        None
    }
}
