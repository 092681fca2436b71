//! Hibernation serializer.
//!
//! Writes a live [`Value`] graph as JavaScript text that rebuilds it when
//! evaluated against an empty `refs` table. Reference values get a table
//! slot on first visit and become `refs[n]` afterwards, which makes shared
//! and cyclic structure safe. Containers are written as a flat list of
//! allocations and fills driven by a work list, so neither this walk nor
//! the payload text nests per level of the graph.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use super::dom;
use super::{identity, CustomSerialize, Value};
use crate::validate::{CompilerError, ERR_UNSERIALIZABLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loader {
    pub name: String,
    pub url: String,
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function {}(){{ return import({}) }}",
            self.name,
            json_string(&self.url)
        )
    }
}

/// Loader statements, then slot allocations and fills, then one value
/// expression per write. Every value position holds a leaf or a `refs[n]`
/// backreference, so nesting depth stays constant however deep the graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub loaders: Vec<Loader>,
    pub definitions: Vec<String>,
    pub expressions: Vec<String>,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for loader in &self.loaders {
            writeln!(f, "{}", loader)?;
        }
        for statement in self.definitions.iter().chain(&self.expressions) {
            writeln!(f, "{};", statement)?;
        }
        Ok(())
    }
}

/// Module URL → loader function, one per distinct URL.
#[derive(Debug, Default)]
struct ImportMap {
    loaders: IndexMap<String, String>,
}

impl ImportMap {
    fn loader_for(&mut self, url: &str) -> String {
        if let Some(name) = self.loaders.get(url) {
            return name.clone();
        }
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        let mut len = 8;
        let name = loop {
            let candidate = format!("load_{}", &digest[..len]);
            if !self.loaders.values().any(|taken| *taken == candidate) || len == digest.len() {
                break candidate;
            }
            len += 4;
        };
        self.loaders.insert(url.to_string(), name.clone());
        name
    }

    fn into_loaders(self) -> Vec<Loader> {
        self.loaders
            .into_iter()
            .map(|(url, name)| Loader { name, url })
            .collect()
    }
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        // Display is shortest-round-trip, prints `-0` and never uses an
        // exponent, so the result is always a valid JS literal.
        format!("{}", n)
    }
}

/// `__proto__` as a plain literal key sets the prototype, so it is
/// written computed.
fn property_key(key: &str) -> String {
    if key == "__proto__" {
        format!("[{}]", json_string(key))
    } else {
        json_string(key)
    }
}

fn custom_key(custom: &Rc<dyn CustomSerialize>) -> usize {
    Rc::as_ptr(custom) as *const u8 as usize
}

#[derive(Default)]
pub struct Hibernator {
    refs: HashMap<usize, u32>,
    next_ref: u32,
    imports: ImportMap,
    definitions: Vec<String>,
    expressions: Vec<String>,
    /// Keeps every visited reference value alive so its address cannot be
    /// reused by a later allocation while this payload is open.
    pinned: Vec<Value>,
}

impl Hibernator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the definitions `value` needs and one value expression.
    pub fn write(&mut self, value: &Value) -> Result<(), CompilerError> {
        let mut allocations = Vec::new();
        let mut pending = Vec::new();
        let root = self.leaf(value, &mut allocations, &mut pending)?;

        let mut fills = Vec::new();
        while let Some((id, container)) = pending.pop() {
            let body = self.body(&container, &mut allocations, &mut pending)?;
            fills.push(format!("Object.assign(refs[{}], {})", id, body));
        }

        self.definitions.extend(allocations);
        self.definitions.extend(fills);
        self.expressions.push(root);
        Ok(())
    }

    pub fn finish(self) -> Payload {
        debug!(
            refs = self.next_ref,
            loaders = self.imports.loaders.len(),
            "hibernated payload"
        );
        Payload {
            loaders: self.imports.into_loaders(),
            definitions: self.definitions,
            expressions: self.expressions,
        }
    }

    /// Text for one value position. A container seen for the first time
    /// gets a slot, an allocation statement and a pending fill.
    fn leaf(
        &mut self,
        value: &Value,
        allocations: &mut Vec<String>,
        pending: &mut Vec<(u32, Value)>,
    ) -> Result<String, CompilerError> {
        let text = match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_literal(*n),
            Value::String(s) => json_string(s),
            Value::Symbol(key) => format!("Symbol.for({})", json_string(key)),
            Value::Date(ms) => format!("new Date({})", number_literal(*ms)),
            Value::Lazy(lazy) => {
                let loader = self.imports.loader_for(&lazy.url);
                format!("__lazyRef({}, {})", loader, json_string(&lazy.export_name))
            }
            Value::Node(node) => {
                let path: Vec<String> = dom::path_of(node).iter().map(|i| i.to_string()).collect();
                format!("__anchor([{}])", path.join(", "))
            }
            Value::Custom(custom) => {
                if let Some(&id) = self.refs.get(&custom_key(custom)) {
                    return Ok(format!("refs[{}]", id));
                }
                let (replacement, chain) = expand_custom(value)?;
                let text = self.leaf(&replacement, allocations, pending)?;
                // Later visits of the same hook object reuse the slot of its
                // replacement, which keeps sharing and ends self-containment.
                let slot = identity(&replacement).and_then(|key| self.refs.get(&key).copied());
                if let Some(id) = slot {
                    for custom in chain {
                        if let Value::Custom(rc) = &custom {
                            self.refs.insert(custom_key(rc), id);
                        }
                        self.pinned.push(custom);
                    }
                }
                text
            }
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                let Some(key) = identity(value) else {
                    return Ok("undefined".to_string());
                };
                if let Some(&id) = self.refs.get(&key) {
                    return Ok(format!("refs[{}]", id));
                }
                let head = self.head(value)?;
                let id = self.next_ref;
                self.next_ref += 1;
                self.refs.insert(key, id);
                self.pinned.push(value.clone());
                allocations.push(format!("refs[{}] = {}", id, head));
                pending.push((id, value.clone()));
                format!("refs[{}]", id)
            }
        };
        Ok(text)
    }

    fn head(&mut self, value: &Value) -> Result<String, CompilerError> {
        match value {
            Value::Array(_) => Ok("[]".to_string()),
            Value::Object(obj) => Ok(match &obj.borrow().constructor {
                Some(constructor) => format!(
                    "__instance({}, {})",
                    self.imports.loader_for(&constructor.url),
                    json_string(&constructor.export_name)
                ),
                None => "{}".to_string(),
            }),
            Value::Function(func) => match &func.origin {
                Some(origin) => Ok(format!(
                    "__closure({}, {})",
                    self.imports.loader_for(&origin.url),
                    json_string(&origin.export_name)
                )),
                None => Err(CompilerError::runtime(
                    ERR_UNSERIALIZABLE,
                    &format!(
                        "Function '{}' has no origin descriptor and cannot be hibernated.",
                        func.name
                    ),
                    Some(format!("{:?}", value)),
                )
                .with_hint("Only closures emitted by the compiler carry `$origin`.")),
            },
            _ => Ok("{}".to_string()),
        }
    }

    fn body(
        &mut self,
        container: &Value,
        allocations: &mut Vec<String>,
        pending: &mut Vec<(u32, Value)>,
    ) -> Result<String, CompilerError> {
        match container {
            Value::Array(items) => {
                let items: Vec<Value> = items.borrow().iter().cloned().collect();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(self.leaf(item, allocations, pending)?);
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            Value::Object(obj) => {
                let entries: Vec<(String, Value)> = obj
                    .borrow()
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut parts = Vec::with_capacity(entries.len());
                for (key, child) in &entries {
                    let text = self.leaf(child, allocations, pending)?;
                    parts.push(format!("{}: {}", property_key(key), text));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Value::Function(func) => {
                let captured: Vec<Value> = match &func.origin {
                    Some(origin) => origin.captured.borrow().iter().cloned().collect(),
                    None => Vec::new(),
                };
                let mut parts = Vec::with_capacity(captured.len());
                for arg in &captured {
                    parts.push(self.leaf(arg, allocations, pending)?);
                }
                Ok(format!("{{\"capturedArgs\": [{}]}}", parts.join(", ")))
            }
            _ => Ok("{}".to_string()),
        }
    }
}

/// Follows hook replacements until a non-custom value. Returns it with
/// every custom value passed on the way.
fn expand_custom(value: &Value) -> Result<(Value, Vec<Value>), CompilerError> {
    let mut chain: Vec<Value> = Vec::new();
    let mut current = value.clone();
    while let Value::Custom(custom) = &current {
        let key = custom_key(custom);
        let revisited = chain.iter().any(|seen| match seen {
            Value::Custom(rc) => custom_key(rc) == key,
            _ => false,
        });
        if revisited {
            return Err(CompilerError::runtime(
                ERR_UNSERIALIZABLE,
                "Custom serialization hook never produces a plain value",
                Some(format!("{:?}", value)),
            )
            .with_hint("A hook must return a value other than itself."));
        }
        let next = custom.hibernate();
        chain.push(current);
        current = next;
    }
    Ok((current, chain))
}

pub fn hibernate(value: &Value) -> Result<Payload, CompilerError> {
    let mut hibernator = Hibernator::new();
    hibernator.write(value)?;
    Ok(hibernator.finish())
}
