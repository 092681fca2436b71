//! Scope builder.
//!
//! A single pass over the oxc AST that opens a [`Scope`] for every function,
//! arrow, class, class member and loop, records declarations and references
//! as it goes, and registers every selected function/class literal as a
//! [`Closure`]. Interception happens at the parent node so each literal is
//! entered exactly once, with the context that decides its rewrite rule.
//!
//! [`Scope`]: crate::scope::Scope

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

use crate::naming::AliasAllocator;
use crate::pattern::{bound_names, parameter_names};
use crate::scope::{
    Closure, ClosureContext, ClosureId, ClosureKind, Reference, ReferenceKind, ReferencePosition,
    ScopeId, ScopeKind, ScopeTree,
};
use crate::transform::Selection;

/// Output of the builder: the populated tree plus module-level facts the
/// rewriter needs.
#[derive(Debug)]
pub struct ScopeAnalysis {
    pub tree: ScopeTree,
    /// Names listed in `export { … }` clauses without a source.
    pub exported_names: HashSet<String>,
}

pub struct ScopeBuilder<'s> {
    source: &'s str,
    selection: &'s Selection,
    tree: ScopeTree,
    current: ScopeId,
    aliases: AliasAllocator,
    exported_names: HashSet<String>,
    /// Span of the identifier currently sitting in a special slot.
    pending_position: Option<(Span, ReferencePosition)>,
    /// Statement start offsets of every statement list being visited.
    statement_lists: Vec<Vec<u32>>,
}

/// Shape of a literal, independent of its AST node type.
struct Literal<'n, 'a> {
    kind: ClosureKind,
    span: Span,
    own_id: Option<&'n BindingIdentifier<'a>>,
    is_async: bool,
    is_generator: bool,
    params_start: u32,
}

impl<'s> ScopeBuilder<'s> {
    pub fn new(source: &'s str, selection: &'s Selection, program: Span) -> Self {
        Self {
            source,
            selection,
            tree: ScopeTree::new(program),
            current: ScopeId::ROOT,
            aliases: AliasAllocator::new(),
            exported_names: HashSet::new(),
            pending_position: None,
            statement_lists: Vec::new(),
        }
    }

    pub fn build(mut self, program: &Program<'_>) -> ScopeAnalysis {
        self.visit_program(program);
        ScopeAnalysis {
            tree: self.tree,
            exported_names: self.exported_names,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SCOPE STACK
    // ═══════════════════════════════════════════════════════════════════════════

    fn push_scope(&mut self, kind: ScopeKind, owner: Span) -> ScopeId {
        let id = self.tree.create_scope(kind, self.current, owner);
        self.current = id;
        id
    }

    fn pop_scope(&mut self) {
        let popped = self.current;
        self.tree.merge_into_parent(popped);
        if let Some(parent) = self.tree.scope(popped).parent {
            self.current = parent;
        }
    }

    fn declare(&mut self, name: &str) {
        self.tree.declare(self.current, name);
    }

    fn record(&mut self, kind: ReferenceKind, span: Span) {
        let position = match self.pending_position {
            Some((pending, position)) if pending == span => {
                self.pending_position = None;
                position
            }
            _ => ReferencePosition::Plain,
        };
        let scope = self.current;
        self.tree.scope_mut(scope).references.push(Reference {
            kind,
            span,
            scope,
            position,
        });
    }

    fn text(&self, span: Span) -> &'s str {
        &self.source[span.start as usize..span.end as usize]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CLOSURE REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Decides whether the literal becomes a closure and, if so, registers
    /// it in the arena and in its parent's exports. `scope` is the literal's
    /// freshly pushed scope; `parent` the one it was written in.
    fn register(
        &mut self,
        literal: &Literal<'_, '_>,
        context: ClosureContext,
        name: Option<String>,
        self_name: Option<String>,
        parent: ScopeId,
        scope: ScopeId,
    ) -> Option<ClosureId> {
        let own_name = literal.own_id.map(|id| id.name.to_string());
        let name = own_name.clone().or(name);
        if !self.selection.selects(name.as_deref().unwrap_or("")) {
            return None;
        }

        let text = self.text(literal.span);
        let alias = match (&context, &own_name) {
            (ClosureContext::Declaration { top_level: true, .. }, Some(own))
            | (ClosureContext::DefaultExport { .. }, Some(own)) => {
                self.aliases.reserve(own);
                own.clone()
            }
            (ClosureContext::DefaultExport { .. }, None) => {
                self.aliases
                    .allocate(Some("default"), text, literal.span.start)
            }
            _ => self
                .aliases
                .allocate(name.as_deref(), text, literal.span.start),
        };

        let hoist_points = match &context {
            ClosureContext::Declaration {
                top_level: false,
                statement,
                ..
            } => self
                .statement_lists
                .last()
                .map(|starts| starts.iter().copied().filter(|s| *s < statement.start).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let id = self.tree.next_closure_id();
        let export_name = match &own_name {
            Some(own) if binds_own_name(&context) => own.clone(),
            _ => alias.clone(),
        };
        self.tree.add_closure(Closure {
            id,
            name,
            alias,
            kind: literal.kind,
            context,
            scope,
            parent,
            span: literal.span,
            has_own_id: own_name.is_some(),
            is_async: literal.is_async,
            is_generator: literal.is_generator,
            params_start: literal.params_start,
            self_name,
            self_referencing: false,
            hoist_points,
            bindings: Vec::new(),
        });
        self.tree.export(parent, &export_name, id);
        Some(id)
    }

    fn enter_function(
        &mut self,
        func: &Function<'_>,
        context: ClosureContext,
        name: Option<String>,
        self_name: Option<String>,
        scope_kind: ScopeKind,
        candidate: bool,
    ) {
        let parent = self.current;
        let is_declaration = binds_own_name(&context);
        let Some(body) = &func.body else {
            // Overload signatures and `declare function` only bind a name.
            if let (true, Some(id)) = (is_declaration, &func.id) {
                self.declare(&id.name);
            }
            return;
        };

        let scope = self.push_scope(scope_kind, func.span);
        let candidate = candidate && !uses_super(body);
        let literal = Literal {
            kind: ClosureKind::Function,
            span: func.span,
            own_id: func.id.as_ref(),
            is_async: func.r#async,
            is_generator: func.generator,
            params_start: func.params.span.start,
        };
        let registered = if candidate {
            self.register(&literal, context.clone(), name, self_name, parent, scope)
        } else {
            None
        };
        if registered.is_none() && is_declaration {
            if let Some(id) = &func.id {
                self.tree.declare(parent, &id.name);
            }
        }
        if !is_declaration {
            // A named function expression sees its own name.
            if let Some(id) = &func.id {
                self.declare(&id.name);
            }
        }

        for param in parameter_names(&func.params) {
            self.declare(&param.name);
        }
        self.visit_formal_parameters(&func.params);
        self.visit_function_body(body);
        self.pop_scope();
    }

    fn enter_arrow(
        &mut self,
        arrow: &ArrowFunctionExpression<'_>,
        context: ClosureContext,
        name: Option<String>,
        self_name: Option<String>,
    ) {
        let parent = self.current;
        let scope = self.push_scope(ScopeKind::Arrow, arrow.span);
        let literal = Literal {
            kind: ClosureKind::Arrow,
            span: arrow.span,
            own_id: None,
            is_async: arrow.r#async,
            is_generator: false,
            params_start: arrow.params.span.start,
        };
        if !uses_super(&arrow.body) {
            self.register(&literal, context, name, self_name, parent, scope);
        }
        for param in parameter_names(&arrow.params) {
            self.declare(&param.name);
        }
        self.visit_formal_parameters(&arrow.params);
        self.visit_function_body(&arrow.body);
        self.pop_scope();
    }

    fn enter_class(
        &mut self,
        class: &Class<'_>,
        context: ClosureContext,
        name: Option<String>,
        self_name: Option<String>,
    ) {
        let is_declaration = binds_own_name(&context);
        if class.declare {
            if let (true, Some(id)) = (is_declaration, &class.id) {
                self.declare(&id.name);
            }
            return;
        }
        let parent = self.current;
        let scope = self.push_scope(ScopeKind::Class, class.span);
        // Evaluated when the class is defined, so they travel with it.
        for decorator in &class.decorators {
            self.visit_decorator(decorator);
        }
        if let Some(super_class) = &class.super_class {
            self.visit_expression(super_class);
        }
        let literal = Literal {
            kind: ClosureKind::Class,
            span: class.span,
            own_id: class.id.as_ref(),
            is_async: false,
            is_generator: false,
            params_start: class.span.start,
        };
        let registered = self.register(&literal, context, name, self_name, parent, scope);
        if registered.is_none() && is_declaration {
            if let Some(id) = &class.id {
                self.tree.declare(parent, &id.name);
            }
        }
        // The class body always sees the class binding.
        if let Some(id) = &class.id {
            self.declare(&id.name);
        }

        for element in &class.body.body {
            match element {
                ClassElement::MethodDefinition(method) => self.enter_class_method(method),
                ClassElement::PropertyDefinition(prop) => {
                    self.enter_class_field(&prop.key, prop.computed, prop.value.as_ref(), prop.span)
                }
                ClassElement::AccessorProperty(prop) => {
                    self.enter_class_field(&prop.key, prop.computed, prop.value.as_ref(), prop.span)
                }
                ClassElement::StaticBlock(block) => {
                    self.push_scope(ScopeKind::ClassMember, block.span);
                    self.visit_statements(&block.body);
                    self.pop_scope();
                }
                ClassElement::TSIndexSignature(_) => {}
            }
        }
        self.pop_scope();
    }

    fn enter_class_method(&mut self, method: &MethodDefinition<'_>) {
        for decorator in &method.decorators {
            self.visit_decorator(decorator);
        }
        if method.computed {
            self.visit_property_key(&method.key);
        }
        let candidate = method.kind == MethodDefinitionKind::Method;
        let member_start = method
            .decorators
            .last()
            .map_or(method.span.start, |d| d.span.end);
        let context = ClosureContext::ClassMethod {
            member: Span::new(member_start, method.span.end),
            key: method.key.span(),
            computed: method.computed,
            is_static: method.r#static,
        };
        self.enter_function(
            &method.value,
            context,
            key_name(&method.key),
            None,
            ScopeKind::Method,
            candidate,
        );
    }

    fn enter_class_field(
        &mut self,
        key: &PropertyKey<'_>,
        computed: bool,
        value: Option<&Expression<'_>>,
        span: Span,
    ) {
        if computed {
            self.visit_property_key(key);
        }
        let Some(value) = value else {
            return;
        };
        self.push_scope(ScopeKind::ClassMember, span);
        self.visit_literal_or_expression(value, key_name(key), None);
        self.pop_scope();
    }

    /// Enters `expr` as a closure literal when it is one, naming it after
    /// the binding it initializes.
    fn visit_literal_or_expression(
        &mut self,
        expr: &Expression<'_>,
        name: Option<String>,
        self_name: Option<String>,
    ) {
        match expr.without_parentheses() {
            Expression::FunctionExpression(func) => self.enter_function(
                func,
                ClosureContext::Expression,
                name,
                self_name,
                ScopeKind::Function,
                true,
            ),
            Expression::ArrowFunctionExpression(arrow) => {
                self.enter_arrow(arrow, ClosureContext::Expression, name, self_name)
            }
            Expression::ClassExpression(class) => {
                self.enter_class(class, ClosureContext::Expression, name, self_name)
            }
            _ => self.visit_expression(expr),
        }
    }

    fn enter_declaration(&mut self, decl: &Declaration<'_>, top_level: bool, exported: bool) {
        match decl {
            Declaration::FunctionDeclaration(func) => {
                let context = ClosureContext::Declaration {
                    top_level,
                    exported,
                    statement: func.span,
                };
                self.enter_function(func, context, None, None, ScopeKind::Function, true);
            }
            Declaration::ClassDeclaration(class) => {
                let context = ClosureContext::Declaration {
                    top_level,
                    exported,
                    statement: class.span,
                };
                self.enter_class(class, context, None, None);
            }
            Declaration::VariableDeclaration(var) => self.visit_variable_declaration(var),
            Declaration::TSEnumDeclaration(decl) => self.declare(&decl.id.name),
            _ => {}
        }
    }
}

/// Declaration forms bind their own name in the enclosing scope.
fn binds_own_name(context: &ClosureContext) -> bool {
    matches!(
        context,
        ClosureContext::Declaration { .. }
            | ClosureContext::DefaultExport {
                declaration: true,
                ..
            }
    )
}

fn key_name(key: &PropertyKey<'_>) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::PrivateIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.to_string()),
        _ => None,
    }
}

/// `super` is only valid inside methods, so a body that uses it cannot be
/// moved into a free function.
fn uses_super(body: &FunctionBody<'_>) -> bool {
    let mut finder = SuperFinder { found: false };
    finder.visit_function_body(body);
    finder.found
}

struct SuperFinder {
    found: bool,
}

impl<'a> Visit<'a> for SuperFinder {
    fn visit_super(&mut self, _it: &Super) {
        self.found = true;
    }

    // Nested non-arrow functions and classes rebind `super`.
    fn visit_function(&mut self, _it: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_class(&mut self, _it: &Class<'a>) {}
}

impl<'a, 's> Visit<'a> for ScopeBuilder<'s> {
    fn visit_program(&mut self, program: &Program<'a>) {
        self.statement_lists
            .push(program.body.iter().map(|stmt| stmt.span().start).collect());
        for stmt in &program.body {
            match stmt {
                Statement::FunctionDeclaration(func) => {
                    let context = ClosureContext::Declaration {
                        top_level: true,
                        exported: false,
                        statement: func.span,
                    };
                    self.enter_function(func, context, None, None, ScopeKind::Function, true);
                }
                Statement::ClassDeclaration(class) => {
                    let context = ClosureContext::Declaration {
                        top_level: true,
                        exported: false,
                        statement: class.span,
                    };
                    self.enter_class(class, context, None, None);
                }
                Statement::ExportNamedDeclaration(export) => {
                    match &export.declaration {
                        Some(decl) => self.enter_declaration(decl, true, true),
                        None => {
                            if export.source.is_none() {
                                for spec in &export.specifiers {
                                    self.exported_names.insert(spec.local.name().to_string());
                                }
                            }
                            walk::walk_export_named_declaration(self, export);
                        }
                    }
                }
                _ => self.visit_statement(stmt),
            }
        }
        self.statement_lists.pop();
    }

    fn visit_statements(&mut self, stmts: &ArenaVec<'a, Statement<'a>>) {
        self.statement_lists
            .push(stmts.iter().map(|stmt| stmt.span().start).collect());
        walk::walk_statements(self, stmts);
        self.statement_lists.pop();
    }

    fn visit_statement(&mut self, stmt: &Statement<'a>) {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                let context = ClosureContext::Declaration {
                    top_level: false,
                    exported: false,
                    statement: func.span,
                };
                self.enter_function(func, context, None, None, ScopeKind::Function, true);
            }
            Statement::ClassDeclaration(class) => {
                let context = ClosureContext::Declaration {
                    top_level: false,
                    exported: false,
                    statement: class.span,
                };
                self.enter_class(class, context, None, None);
            }
            Statement::TSEnumDeclaration(decl) => self.declare(&decl.id.name),
            Statement::TSTypeAliasDeclaration(_)
            | Statement::TSInterfaceDeclaration(_)
            | Statement::TSModuleDeclaration(_)
            | Statement::TSImportEqualsDeclaration(_) => {}
            _ => walk::walk_statement(self, stmt),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LITERALS IN GENERIC POSITIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        self.enter_function(
            func,
            ClosureContext::Expression,
            None,
            None,
            ScopeKind::Function,
            true,
        );
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        self.enter_arrow(arrow, ClosureContext::Expression, None, None);
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        self.enter_class(class, ClosureContext::Expression, None, None);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BINDING SITES
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        // `var` belongs to the enclosing function, not to a loop body.
        let scope = match decl.kind {
            VariableDeclarationKind::Var => self.tree.var_scope(self.current),
            _ => self.current,
        };
        for declarator in &decl.declarations {
            for bound in bound_names(&declarator.id) {
                self.tree.declare(scope, &bound.name);
            }
        }
        walk::walk_variable_declaration(self, decl);
    }

    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        self.visit_binding_pattern(&decl.id);
        if let Some(init) = &decl.init {
            let name = match &decl.id {
                BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
                _ => None,
            };
            self.visit_literal_or_expression(init, name.clone(), name);
        }
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        if let Some(param) = &clause.param {
            for bound in bound_names(&param.pattern) {
                self.declare(&bound.name);
            }
        }
        walk::walk_catch_clause(self, clause);
    }

    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        let Some(specifiers) = &decl.specifiers else {
            return;
        };
        for spec in specifiers {
            let local = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
            };
            let name = local.name.to_string();
            self.tree.declare(ScopeId::ROOT, &name);
            self.tree.scope_mut(ScopeId::ROOT).imports.push(name);
        }
    }

    fn visit_export_default_declaration(&mut self, decl: &ExportDefaultDeclaration<'a>) {
        let statement = decl.span;
        match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => self.enter_function(
                func,
                ClosureContext::DefaultExport {
                    statement,
                    declaration: true,
                },
                None,
                None,
                ScopeKind::Function,
                true,
            ),
            ExportDefaultDeclarationKind::ClassDeclaration(class) => self.enter_class(
                class,
                ClosureContext::DefaultExport {
                    statement,
                    declaration: true,
                },
                None,
                None,
            ),
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {}
            other => {
                let Some(expr) = other.as_expression() else {
                    return;
                };
                let context = ClosureContext::DefaultExport {
                    statement,
                    declaration: false,
                };
                match expr.without_parentheses() {
                    Expression::ArrowFunctionExpression(arrow) => {
                        self.enter_arrow(arrow, context, None, None)
                    }
                    Expression::FunctionExpression(func) => self.enter_function(
                        func,
                        context,
                        None,
                        None,
                        ScopeKind::Function,
                        true,
                    ),
                    Expression::ClassExpression(class) => {
                        self.enter_class(class, context, None, None)
                    }
                    _ => self.visit_expression(expr),
                }
            }
        }
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.computed {
            self.visit_property_key(&prop.key);
        }
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                self.pending_position = Some((ident.span, ReferencePosition::Shorthand));
            }
            self.visit_expression(&prop.value);
            return;
        }
        match (&prop.kind, &prop.value) {
            (PropertyKind::Get | PropertyKind::Set, Expression::FunctionExpression(func)) => self
                .enter_function(
                    func,
                    ClosureContext::Expression,
                    None,
                    None,
                    ScopeKind::Method,
                    false,
                ),
            (PropertyKind::Init, Expression::FunctionExpression(func)) if prop.method => {
                let context = ClosureContext::ObjectMethod {
                    member: prop.span,
                    key: prop.key.span(),
                    computed: prop.computed,
                };
                self.enter_function(
                    func,
                    context,
                    key_name(&prop.key),
                    None,
                    ScopeKind::Method,
                    true,
                );
            }
            _ => self.visit_literal_or_expression(&prop.value, key_name(&prop.key), None),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOPS
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.push_scope(ScopeKind::Loop, stmt.span);
        walk::walk_for_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.push_scope(ScopeKind::Loop, stmt.span);
        walk::walk_for_in_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.push_scope(ScopeKind::Loop, stmt.span);
        walk::walk_for_of_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_while_statement(&mut self, stmt: &WhileStatement<'a>) {
        self.push_scope(ScopeKind::Loop, stmt.span);
        walk::walk_while_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_do_while_statement(&mut self, stmt: &DoWhileStatement<'a>) {
        self.push_scope(ScopeKind::Loop, stmt.span);
        walk::walk_do_while_statement(self, stmt);
        self.pop_scope();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REFERENCES
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if ident.name.as_str() == "arguments" && self.tree.resolve(self.current, "arguments").is_none() {
            if let Some(owner) = self.tree.arguments_owner(self.current) {
                self.record(ReferenceKind::Arguments { owner }, ident.span);
                return;
            }
        }
        self.record(ReferenceKind::Identifier(ident.name.to_string()), ident.span);
    }

    fn visit_simple_assignment_target(&mut self, target: &SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = target {
            self.pending_position = Some((ident.span, ReferencePosition::AssignTarget));
        }
        walk::walk_simple_assignment_target(self, target);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        prop: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        self.pending_position = Some((prop.binding.span, ReferencePosition::AssignTarget));
        walk::walk_assignment_target_property_identifier(self, prop);
    }

    fn visit_this_expression(&mut self, this: &ThisExpression) {
        let owner = self.tree.scope(self.current).this_owner;
        self.record(ReferenceKind::This { owner }, this.span);
    }

    fn visit_new_expression(&mut self, expr: &NewExpression<'a>) {
        if let Expression::Identifier(ident) = &expr.callee {
            self.pending_position = Some((ident.span, ReferencePosition::NewCallee));
        }
        walk::walk_new_expression(self, expr);
    }

    fn visit_jsx_element_name(&mut self, name: &JSXElementName<'a>) {
        if let JSXElementName::IdentifierReference(ident) = name {
            self.pending_position = Some((ident.span, ReferencePosition::JsxName));
        }
        walk::walk_jsx_element_name(self, name);
    }

    fn visit_jsx_member_expression_object(&mut self, object: &JSXMemberExpressionObject<'a>) {
        if let JSXMemberExpressionObject::IdentifierReference(ident) = object {
            self.pending_position = Some((ident.span, ReferencePosition::JsxName));
        }
        walk::walk_jsx_member_expression_object(self, object);
    }

    fn visit_ts_type(&mut self, _ty: &TSType<'a>) {}
}
