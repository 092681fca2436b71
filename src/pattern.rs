//! Bound-name extraction for parameter and destructuring patterns.

use oxc_ast::ast::{BindingIdentifier, BindingPattern, Expression, FormalParameters, TSType};
use oxc_ast_visit::Visit;
use oxc_span::Span;

/// A name introduced by a pattern, with the span of its binding identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundName {
    pub name: String,
    pub span: Span,
}

/// Names bound by `pattern`, left to right. Default values and computed keys
/// are not entered; they are expressions evaluated in the enclosing scope.
pub fn bound_names(pattern: &BindingPattern) -> Vec<BoundName> {
    let mut names = Vec::new();
    collect_binding_pattern(pattern, &mut names);
    names
}

fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<BoundName>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(BoundName {
                name: id.name.to_string(),
                span: id.span,
            });
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_binding_pattern(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            collect_binding_pattern(&assign.left, names);
        }
    }
}

/// Names bound by a formal parameter list, rest parameter included.
pub fn parameter_names(params: &FormalParameters) -> Vec<BoundName> {
    let mut collector = ParameterCollector { names: Vec::new() };
    collector.visit_formal_parameters(params);
    collector.names
}

struct ParameterCollector {
    names: Vec<BoundName>,
}

impl<'a> Visit<'a> for ParameterCollector {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.names.push(BoundName {
            name: ident.name.to_string(),
            span: ident.span,
        });
    }

    // Defaults and computed keys may hold nested functions whose parameters
    // must not leak into this list.
    fn visit_expression(&mut self, _expr: &Expression<'a>) {}

    fn visit_ts_type(&mut self, _ty: &TSType<'a>) {}
}
