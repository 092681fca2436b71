//! Serve-time half of the protocol: a live value model, the hibernation
//! serializer and the hydration deserializer.

pub mod descriptor;
pub mod dom;
pub mod hibernate;
pub mod hydrate;
pub mod loader;

pub use markup5ever_rcdom::Handle;

use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use loader::ModuleRecord;

/// Value hook for objects that know how to describe themselves.
pub trait CustomSerialize {
    /// Replacement value serialized in place of `self`.
    fn hibernate(&self) -> Value;
}

/// Module and export of the constructor an instance was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constructor {
    pub url: String,
    pub export_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Object {
    pub constructor: Option<Constructor>,
    pub properties: IndexMap<String, Value>,
}

/// The `$origin` descriptor attached by `__closure`.
#[derive(Debug)]
pub struct Origin {
    pub url: String,
    pub export_name: String,
    pub captured: RefCell<Vec<Value>>,
}

#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    pub origin: Option<Origin>,
    /// Set once hydration has linked the defining module.
    pub module: RefCell<Option<Arc<ModuleRecord>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyRef {
    pub url: String,
    pub export_name: String,
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Registered symbol (`Symbol.for(key)`).
    Symbol(String),
    /// Epoch milliseconds.
    Date(f64),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<FunctionValue>),
    Lazy(Rc<LazyRef>),
    Node(Handle),
    Custom(Rc<dyn CustomSerialize>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let properties = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(Object {
            constructor: None,
            properties,
        })))
    }

    pub fn instance<K: Into<String>>(
        constructor: Constructor,
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let properties = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(Object {
            constructor: Some(constructor),
            properties,
        })))
    }

    /// A function tagged by `__closure` in module `url`.
    pub fn closure(url: &str, export_name: &str, captured: Vec<Value>) -> Self {
        Value::Function(Rc::new(FunctionValue {
            name: export_name.to_string(),
            origin: Some(Origin {
                url: url.to_string(),
                export_name: export_name.to_string(),
                captured: RefCell::new(captured),
            }),
            module: RefCell::new(None),
        }))
    }

    pub fn lazy(url: &str, export_name: &str) -> Self {
        Value::Lazy(Rc::new(LazyRef {
            url: url.to_string(),
            export_name: export_name.to_string(),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Lazy(_) => "lazy",
            Value::Node(_) => "node",
            Value::Custom(_) => "custom",
        }
    }

    /// Property lookup on records; `None` for everything else.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().properties.get(key).cloned(),
            _ => None,
        }
    }

    pub fn index(&self, i: usize) -> Option<Value> {
        match self {
            Value::Array(items) => items.borrow().get(i).cloned(),
            _ => None,
        }
    }

    /// Identity comparison for reference values, equality for the rest.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Lazy(a), Value::Lazy(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => Rc::ptr_eq(a, b),
            _ => primitive_eq(self, other),
        }
    }
}

fn primitive_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) | (Value::Date(x), Value::Date(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        (Value::String(x), Value::String(y)) | (Value::Symbol(x), Value::Symbol(y)) => x == y,
        _ => false,
    }
}

impl fmt::Debug for Value {
    // Shallow on purpose: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "Symbol.for({:?})", s),
            Value::Date(ms) => write!(f, "Date({})", ms),
            Value::Array(items) => write!(f, "Array(len = {})", items.borrow().len()),
            Value::Object(obj) => {
                let obj = obj.borrow();
                let keys: Vec<&str> = obj.properties.keys().map(|k| k.as_str()).collect();
                match &obj.constructor {
                    Some(c) => write!(f, "{} {{ {} }}", c.export_name, keys.join(", ")),
                    None => write!(f, "{{ {} }}", keys.join(", ")),
                }
            }
            Value::Function(func) => match &func.origin {
                Some(origin) => write!(f, "[Function {} from {}]", func.name, origin.url),
                None => write!(f, "[Function {}]", func.name),
            },
            Value::Lazy(lazy) => write!(f, "Lazy({}#{})", lazy.url, lazy.export_name),
            Value::Node(node) => write!(f, "Node({})", dom::describe(node)),
            Value::Custom(_) => write!(f, "[Custom]"),
        }
    }
}

/// Identity key of a reference value.
pub(crate) fn identity(value: &Value) -> Option<usize> {
    match value {
        Value::Array(rc) => Some(Rc::as_ptr(rc) as *const u8 as usize),
        Value::Object(rc) => Some(Rc::as_ptr(rc) as *const u8 as usize),
        Value::Function(rc) => Some(Rc::as_ptr(rc) as *const u8 as usize),
        _ => None,
    }
}

/// Structural equivalence of two graphs: same shape, same primitives, and
/// the same sharing pattern (a sub-object reached twice on one side is
/// reached twice on the other).
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    let mut left_to_right: HashMap<usize, usize> = HashMap::new();
    let mut right_to_left: HashMap<usize, usize> = HashMap::new();
    let mut stack = vec![(a.clone(), b.clone())];

    while let Some((x, y)) = stack.pop() {
        if let (Some(px), Some(py)) = (identity(&x), identity(&y)) {
            match (left_to_right.get(&px), right_to_left.get(&py)) {
                (Some(&r), Some(&l)) if r == py && l == px => continue,
                (None, None) => {
                    left_to_right.insert(px, py);
                    right_to_left.insert(py, px);
                }
                _ => return false,
            }
        }
        match (&x, &y) {
            (Value::Array(l), Value::Array(r)) => {
                let (l, r) = (l.borrow(), r.borrow());
                if l.len() != r.len() {
                    return false;
                }
                stack.extend(l.iter().cloned().zip(r.iter().cloned()));
            }
            (Value::Object(l), Value::Object(r)) => {
                let (l, r) = (l.borrow(), r.borrow());
                if l.constructor != r.constructor || l.properties.len() != r.properties.len() {
                    return false;
                }
                for ((lk, lv), (rk, rv)) in l.properties.iter().zip(r.properties.iter()) {
                    if lk != rk {
                        return false;
                    }
                    stack.push((lv.clone(), rv.clone()));
                }
            }
            (Value::Function(l), Value::Function(r)) => match (&l.origin, &r.origin) {
                (Some(lo), Some(ro)) => {
                    if lo.url != ro.url || lo.export_name != ro.export_name {
                        return false;
                    }
                    let (lc, rc) = (lo.captured.borrow(), ro.captured.borrow());
                    if lc.len() != rc.len() {
                        return false;
                    }
                    stack.extend(lc.iter().cloned().zip(rc.iter().cloned()));
                }
                _ => return false,
            },
            (Value::Lazy(l), Value::Lazy(r)) => {
                if l != r {
                    return false;
                }
            }
            (Value::Node(l), Value::Node(r)) => {
                if dom::path_of(l) != dom::path_of(r) {
                    return false;
                }
            }
            (Value::Custom(_), _) | (_, Value::Custom(_)) => return false,
            _ => {
                if !primitive_eq(&x, &y) {
                    return false;
                }
            }
        }
    }
    true
}
