//! Payload reader.
//!
//! Hydration never evaluates payload text. It parses it and accepts only
//! the statement forms the hibernator writes, turning each into an
//! [`Entry`]. Every value position holds a leaf [`Descriptor`], so reading
//! never recurses deeper than one literal. Anything else is a malformed
//! payload.

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::operator::{AssignmentOperator, UnaryOperator};
use serde::{Deserialize, Serialize};

use crate::validate::{CompilerError, ERR_MALFORMED_PAYLOAD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Descriptor {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(String),
    Date(f64),
    /// `refs[n]`, a slot allocated earlier in the payload.
    Ref(u32),
    Lazy { loader: String, export_name: String },
    Anchor(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Head {
    Array,
    Object,
    Closure { loader: String, export_name: String },
    Instance { loader: String, export_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Body {
    Elements(Vec<Descriptor>),
    Properties(Vec<(String, Descriptor)>),
    /// `{"capturedArgs": [...]}` on a closure slot.
    Captured(Vec<Descriptor>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Entry {
    /// `refs[n] = head;`
    Allocate { id: u32, head: Head },
    /// `Object.assign(refs[n], body);`
    Fill { id: u32, body: Body },
    /// One written value.
    Value(Descriptor),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedPayload {
    /// Loader function name → module URL.
    pub loaders: IndexMap<String, String>,
    pub entries: Vec<Entry>,
}

impl ParsedPayload {
    pub fn url_of(&self, loader: &str) -> Option<&str> {
        self.loaders.get(loader).map(|url| url.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Value(value) => Some(value),
            _ => None,
        })
    }
}

pub fn parse_payload(text: &str) -> Result<ParsedPayload, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, SourceType::mjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Parser aborted".to_string());
        return Err(CompilerError::runtime(
            ERR_MALFORMED_PAYLOAD,
            &format!("Payload is not valid JavaScript: {}", message),
            None,
        ));
    }

    let mut reader = Reader {
        text,
        loaders: IndexMap::new(),
    };
    // Loader declarations hoist, so collect them before reading values.
    for statement in &ret.program.body {
        if let Statement::FunctionDeclaration(func) = statement {
            let (name, url) = reader.loader(func)?;
            reader.loaders.insert(name, url);
        }
    }

    // A payload that opens with string values parses them as a directive
    // prologue; they are still values, and they always come first.
    let mut entries: Vec<Entry> = ret
        .program
        .directives
        .iter()
        .map(|directive| Entry::Value(Descriptor::String(directive.expression.value.to_string())))
        .collect();
    for statement in &ret.program.body {
        match statement {
            Statement::FunctionDeclaration(_) => {}
            Statement::ExpressionStatement(stmt) => entries.push(reader.statement(&stmt.expression)?),
            other => return Err(reader.malformed("Unexpected statement", other.span())),
        }
    }

    Ok(ParsedPayload {
        loaders: reader.loaders,
        entries,
    })
}

struct Reader<'s> {
    text: &'s str,
    loaders: IndexMap<String, String>,
}

impl<'s> Reader<'s> {
    fn malformed(&self, message: &str, span: Span) -> CompilerError {
        let snippet = self
            .text
            .get(span.start as usize..span.end as usize)
            .map(|s| s.chars().take(80).collect::<String>());
        CompilerError::runtime(ERR_MALFORMED_PAYLOAD, message, snippet)
    }

    /// `function load_x(){ return import("url") }`
    fn loader(&self, func: &Function) -> Result<(String, String), CompilerError> {
        let name = func.id.as_ref().map(|id| id.name.to_string());
        let statements = func.body.as_ref().map(|body| &body.statements[..]).unwrap_or(&[]);
        let url = match statements {
            [Statement::ReturnStatement(ret)] => match &ret.argument {
                Some(Expression::ImportExpression(import)) => match &import.source {
                    Expression::StringLiteral(s) => Some(s.value.to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };
        match (name, url) {
            (Some(name), Some(url)) => Ok((name, url)),
            _ => Err(self.malformed("Invalid loader declaration", func.span)),
        }
    }

    fn statement(&self, expr: &Expression) -> Result<Entry, CompilerError> {
        match expr.without_parentheses() {
            Expression::AssignmentExpression(assign) => self.allocate(assign),
            Expression::CallExpression(call) if is_object_assign(&call.callee) => self.fill(call),
            other => Ok(Entry::Value(self.leaf(other)?)),
        }
    }

    /// A primitive, a slot reference or a lazy/anchor call.
    fn leaf(&self, expr: &Expression) -> Result<Descriptor, CompilerError> {
        let expr = expr.without_parentheses();
        match expr {
            Expression::NumericLiteral(n) => Ok(Descriptor::Number(n.value)),
            Expression::StringLiteral(s) => Ok(Descriptor::String(s.value.to_string())),
            Expression::BooleanLiteral(b) => Ok(Descriptor::Bool(b.value)),
            Expression::NullLiteral(_) => Ok(Descriptor::Null),
            Expression::Identifier(id) => match id.name.as_str() {
                "undefined" => Ok(Descriptor::Undefined),
                "NaN" => Ok(Descriptor::Number(f64::NAN)),
                "Infinity" => Ok(Descriptor::Number(f64::INFINITY)),
                _ => Err(self.malformed("Unexpected identifier", id.span)),
            },
            Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::UnaryNegation => {
                match unary.argument.without_parentheses() {
                    Expression::NumericLiteral(n) => Ok(Descriptor::Number(-n.value)),
                    Expression::Identifier(id) if id.name.as_str() == "Infinity" => {
                        Ok(Descriptor::Number(f64::NEG_INFINITY))
                    }
                    _ => Err(self.malformed("Negation of a non-number", unary.span)),
                }
            }
            Expression::ComputedMemberExpression(member) => {
                Ok(Descriptor::Ref(self.ref_slot(&member.object, &member.expression, member.span)?))
            }
            Expression::NewExpression(construct) => match (&construct.callee, &construct.arguments[..]) {
                (Expression::Identifier(callee), [arg]) if callee.name.as_str() == "Date" => {
                    match self.leaf(self.argument(arg)?)? {
                        Descriptor::Number(ms) => Ok(Descriptor::Date(ms)),
                        _ => Err(self.malformed("Date expects a number", construct.span)),
                    }
                }
                _ => Err(self.malformed("Unexpected constructor call", construct.span)),
            },
            Expression::CallExpression(call) => self.call(call),
            other => Err(self.malformed("Unexpected expression", other.span())),
        }
    }

    fn argument<'a, 'b>(&self, arg: &'b Argument<'a>) -> Result<&'b Expression<'a>, CompilerError> {
        arg.as_expression()
            .ok_or_else(|| self.malformed("Spread arguments are not allowed", arg.span()))
    }

    fn call(&self, call: &CallExpression) -> Result<Descriptor, CompilerError> {
        match &call.callee {
            Expression::Identifier(callee) if callee.name.as_str() == "__lazyRef" => {
                let (loader, export_name) = self.export_ref(&call.arguments, call.span)?;
                Ok(Descriptor::Lazy { loader, export_name })
            }
            Expression::Identifier(callee) if callee.name.as_str() == "__anchor" => match &call.arguments[..] {
                [arg] => match self.argument(arg)? {
                    Expression::ArrayExpression(path) => {
                        let mut indices = Vec::with_capacity(path.elements.len());
                        for element in &path.elements {
                            match element.as_expression() {
                                Some(Expression::NumericLiteral(n))
                                    if n.value >= 0.0 && n.value.fract() == 0.0 =>
                                {
                                    indices.push(n.value as usize)
                                }
                                _ => return Err(self.malformed("Invalid anchor index", element.span())),
                            }
                        }
                        Ok(Descriptor::Anchor(indices))
                    }
                    other => Err(self.malformed("Anchor expects an index path", other.span())),
                },
                _ => Err(self.malformed("Anchor expects one argument", call.span)),
            },
            Expression::StaticMemberExpression(member) => {
                let Expression::Identifier(object) = &member.object else {
                    return Err(self.malformed("Unexpected call", call.span));
                };
                match (object.name.as_str(), member.property.name.as_str()) {
                    ("Symbol", "for") => match &call.arguments[..] {
                        [arg] => match self.argument(arg)? {
                            Expression::StringLiteral(key) => Ok(Descriptor::Symbol(key.value.to_string())),
                            other => Err(self.malformed("Symbol key must be a string", other.span())),
                        },
                        _ => Err(self.malformed("Symbol.for expects one argument", call.span)),
                    },
                    _ => Err(self.malformed("Unexpected call", call.span)),
                }
            }
            _ => Err(self.malformed("Unexpected call", call.span)),
        }
    }

    /// `refs[n]` with a non-negative integer `n`.
    fn ref_slot(&self, object: &Expression, index: &Expression, span: Span) -> Result<u32, CompilerError> {
        match (object, index) {
            (Expression::Identifier(table), Expression::NumericLiteral(n))
                if table.name.as_str() == "refs"
                    && n.value >= 0.0
                    && n.value.fract() == 0.0
                    && n.value <= u32::MAX as f64 =>
            {
                Ok(n.value as u32)
            }
            _ => Err(self.malformed("Invalid reference slot", span)),
        }
    }

    /// `(loader, "Export")` where `loader` is declared in the payload.
    fn export_ref(&self, args: &[Argument], span: Span) -> Result<(String, String), CompilerError> {
        match args {
            [loader, export] => match (self.argument(loader)?, self.argument(export)?) {
                (Expression::Identifier(loader), Expression::StringLiteral(export))
                    if self.loaders.contains_key(loader.name.as_str()) =>
                {
                    Ok((loader.name.to_string(), export.value.to_string()))
                }
                (Expression::Identifier(loader), Expression::StringLiteral(_)) => {
                    Err(self.malformed("Reference to an undeclared loader", loader.span))
                }
                _ => Err(self.malformed("Expected a loader and an export name", span)),
            },
            _ => Err(self.malformed("Expected a loader and an export name", span)),
        }
    }

    /// `refs[n] = head`
    fn allocate(&self, assign: &AssignmentExpression) -> Result<Entry, CompilerError> {
        if assign.operator != AssignmentOperator::Assign {
            return Err(self.malformed("Expected a reference slot assignment", assign.span));
        }
        let AssignmentTarget::ComputedMemberExpression(slot) = &assign.left else {
            return Err(self.malformed("Expected a reference slot assignment", assign.span));
        };
        let id = self.ref_slot(&slot.object, &slot.expression, slot.span)?;

        let head = match assign.right.without_parentheses() {
            Expression::ArrayExpression(array) if array.elements.is_empty() => Head::Array,
            Expression::ObjectExpression(object) if object.properties.is_empty() => Head::Object,
            Expression::CallExpression(ctor) => {
                let (loader, export_name) = self.export_ref(&ctor.arguments, ctor.span)?;
                match &ctor.callee {
                    Expression::Identifier(callee) if callee.name.as_str() == "__closure" => {
                        Head::Closure { loader, export_name }
                    }
                    Expression::Identifier(callee) if callee.name.as_str() == "__instance" => {
                        Head::Instance { loader, export_name }
                    }
                    _ => return Err(self.malformed("Unexpected allocation head", ctor.span)),
                }
            }
            other => return Err(self.malformed("Unexpected allocation head", other.span())),
        };
        Ok(Entry::Allocate { id, head })
    }

    /// `Object.assign(refs[n], body)`
    fn fill(&self, call: &CallExpression) -> Result<Entry, CompilerError> {
        let [target, body] = &call.arguments[..] else {
            return Err(self.malformed("Object.assign expects two arguments", call.span));
        };
        let Expression::ComputedMemberExpression(slot) = self.argument(target)?.without_parentheses() else {
            return Err(self.malformed("Expected a reference slot", call.span));
        };
        let id = self.ref_slot(&slot.object, &slot.expression, slot.span)?;

        let body = match self.argument(body)?.without_parentheses() {
            Expression::ArrayExpression(array) => Body::Elements(self.elements(array)?),
            Expression::ObjectExpression(object) => match captured_args(object) {
                Some(array) => Body::Captured(self.elements(array)?),
                None => Body::Properties(self.properties(object)?),
            },
            other => return Err(self.malformed("Unexpected fill body", other.span())),
        };
        Ok(Entry::Fill { id, body })
    }

    fn elements(&self, array: &ArrayExpression) -> Result<Vec<Descriptor>, CompilerError> {
        array
            .elements
            .iter()
            .map(|element| match element.as_expression() {
                Some(expr) => self.leaf(expr),
                None => Err(self.malformed("Holes and spreads are not allowed", element.span())),
            })
            .collect()
    }

    fn properties(&self, object: &ObjectExpression) -> Result<Vec<(String, Descriptor)>, CompilerError> {
        let mut properties = Vec::with_capacity(object.properties.len());
        for property in &object.properties {
            let ObjectPropertyKind::ObjectProperty(prop) = property else {
                return Err(self.malformed("Spread properties are not allowed", property.span()));
            };
            if prop.kind != PropertyKind::Init || prop.method || prop.shorthand {
                return Err(self.malformed("Only plain properties are allowed", prop.span));
            }
            let key = match (&prop.key, prop.computed) {
                // Only `["__proto__"]` is written computed; a plain
                // `__proto__` key would set the prototype instead.
                (PropertyKey::StringLiteral(s), true) if s.value.as_str() == "__proto__" => {
                    s.value.to_string()
                }
                (_, true) => return Err(self.malformed("Only plain properties are allowed", prop.span)),
                (key, false) => match property_key(key) {
                    Some(key) if key == "__proto__" => {
                        return Err(self.malformed("Prototype assignment is not allowed", prop.span))
                    }
                    Some(key) => key,
                    None => return Err(self.malformed("Property keys must be strings", prop.span)),
                },
            };
            properties.push((key, self.leaf(&prop.value)?));
        }
        Ok(properties)
    }
}

fn is_object_assign(callee: &Expression) -> bool {
    match callee {
        Expression::StaticMemberExpression(member) => {
            matches!(&member.object, Expression::Identifier(object) if object.name.as_str() == "Object")
                && member.property.name.as_str() == "assign"
        }
        _ => false,
    }
}

/// The array of a `{"capturedArgs": [...]}` body. Record fills never hold
/// array literals, so the shape alone identifies a closure fill.
fn captured_args<'b, 'a>(object: &'b ObjectExpression<'a>) -> Option<&'b ArrayExpression<'a>> {
    match &object.properties[..] {
        [ObjectPropertyKind::ObjectProperty(prop)]
            if prop.kind == PropertyKind::Init
                && !prop.method
                && !prop.computed
                && property_key(&prop.key).as_deref() == Some("capturedArgs") =>
        {
            match prop.value.without_parentheses() {
                Expression::ArrayExpression(array) => Some(&**array),
                _ => None,
            }
        }
        _ => None,
    }
}

fn property_key(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_allocations_fills_and_values() {
        let payload = parse_payload(
            "function load_1(){ return import(\"/m.js\") }\n\
             refs[0] = {};\n\
             refs[1] = __closure(load_1, \"Counter\");\n\
             Object.assign(refs[0], {\"self\": refs[0], \"n\": -0, \"f\": refs[1]});\n\
             Object.assign(refs[1], {\"capturedArgs\": [NaN]});\n\
             refs[0];\n",
        )
        .unwrap();
        assert_eq!(payload.url_of("load_1"), Some("/m.js"));
        assert_eq!(payload.entries[0], Entry::Allocate { id: 0, head: Head::Object });
        assert!(matches!(&payload.entries[1], Entry::Allocate { id: 1, head: Head::Closure { .. } }));
        let Entry::Fill { id: 0, body: Body::Properties(props) } = &payload.entries[2] else {
            panic!("unexpected entry {:?}", payload.entries[2]);
        };
        assert_eq!(props[0], ("self".to_string(), Descriptor::Ref(0)));
        assert!(matches!(props[1].1, Descriptor::Number(n) if n == 0.0 && n.is_sign_negative()));
        assert_eq!(props[2].1, Descriptor::Ref(1));
        assert!(matches!(&payload.entries[3], Entry::Fill { id: 1, body: Body::Captured(args) } if args.len() == 1));
        assert_eq!(payload.values().collect::<Vec<_>>(), vec![&Descriptor::Ref(0)]);
    }

    #[test]
    fn test_reads_computed_proto_key() {
        let payload = parse_payload("refs[0] = {};\nObject.assign(refs[0], {[\"__proto__\"]: 1});\n").unwrap();
        let Entry::Fill { body: Body::Properties(props), .. } = &payload.entries[1] else {
            panic!("unexpected entry {:?}", payload.entries[1]);
        };
        assert_eq!(props[0], ("__proto__".to_string(), Descriptor::Number(1.0)));
    }

    #[test]
    fn test_rejects_arbitrary_code() {
        for text in [
            "fetch(\"/steal\");",
            "refs[0] = 1;",
            "refs[0] += [];",
            "refs[0] = {};\nObject.assign(refs[0], {get x() { return 1 }});",
            "refs[0] = {};\nObject.assign(refs[0], {\"__proto__\": refs[0]});",
            "refs[0] = {};\nObject.assign(refs[0], {[\"x\"]: 1});",
            "refs[0] = [];\nObject.assign(refs[0], [[1]]);",
            "Object.assign(refs[0] = [], [1]);",
            "__lazyRef(load_missing, \"X\");",
            "let x = 1;",
            "((",
        ] {
            let error = parse_payload(text).unwrap_err();
            assert_eq!(error.code, ERR_MALFORMED_PAYLOAD, "accepted {:?}", text);
        }
    }
}
