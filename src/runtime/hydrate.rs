//! Hydration deserializer.
//!
//! Hydration runs in two phases. The first rebuilds the whole value graph
//! synchronously from the parsed payload, writing each value straight into
//! its container, so even a failed hydration leaves a structurally complete
//! graph. The second loads the modules that closures and instances come
//! from, concurrently, and links them. A failed load only leaves the values
//! that needed that module unlinked.

use futures::future::join_all;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

use super::descriptor::{parse_payload, Body, Descriptor, Entry, Head, ParsedPayload};
use super::dom;
use super::loader::{ModuleCache, ModuleRecord};
use super::{Constructor, FunctionValue, Handle, LazyRef, Value};
use crate::validate::{
    CompilerError, ERR_ANCHOR_NOT_FOUND, ERR_MALFORMED_PAYLOAD, ERR_MISSING_EXPORT,
};

/// A hydration that did not fully succeed. `value` is still a complete graph;
/// the parts named in `errors` are missing or unlinked.
#[derive(Debug)]
pub struct PartialHydration {
    pub value: Value,
    pub errors: Vec<CompilerError>,
}

pub async fn hydrate(
    payload: &str,
    root: &Handle,
    modules: &ModuleCache,
) -> Result<Value, PartialHydration> {
    let (mut values, errors) = Hydrator::new(root, modules).run(payload).await;
    let value = if values.is_empty() {
        Value::Undefined
    } else {
        values.swap_remove(0)
    };
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(PartialHydration { value, errors })
    }
}

/// Loads the module behind a lazy reference and checks that it provides
/// the referenced export.
pub async fn resolve_lazy(
    lazy: &LazyRef,
    modules: &ModuleCache,
) -> Result<Arc<ModuleRecord>, CompilerError> {
    let record = modules.load(&lazy.url).await?;
    if record.has_export(&lazy.export_name) {
        Ok(record)
    } else {
        Err(missing_export(&lazy.url, &lazy.export_name))
    }
}

fn missing_export(url: &str, export_name: &str) -> CompilerError {
    CompilerError::runtime(
        ERR_MISSING_EXPORT,
        &format!("Module '{}' has no export '{}'", url, export_name),
        Some(url.to_string()),
    )
}

pub struct Hydrator {
    root: Handle,
    modules: ModuleCache,
}

impl Hydrator {
    pub fn new(root: &Handle, modules: &ModuleCache) -> Self {
        Hydrator {
            root: root.clone(),
            modules: modules.clone(),
        }
    }

    /// Hydrates every expression of a multi-value payload. On failure the
    /// partial values are returned as an array.
    pub async fn hydrate_all(&self, payload: &str) -> Result<Vec<Value>, PartialHydration> {
        let (values, errors) = self.run(payload).await;
        if errors.is_empty() {
            Ok(values)
        } else {
            Err(PartialHydration {
                value: Value::array(values),
                errors,
            })
        }
    }

    async fn run(&self, payload: &str) -> (Vec<Value>, Vec<CompilerError>) {
        let parsed = match parse_payload(payload) {
            Ok(parsed) => parsed,
            Err(error) => return (Vec::new(), vec![error]),
        };

        let mut build = Build {
            payload: &parsed,
            root: &self.root,
            refs: HashMap::new(),
            links: Vec::new(),
            errors: Vec::new(),
        };
        let values = build.run();
        let Build {
            links, mut errors, ..
        } = build;
        debug!(
            values = values.len(),
            links = links.len(),
            "rebuilt value graph"
        );

        self.link(links, &mut errors).await;
        for error in &errors {
            warn!(code = %error.code, message = %error.message, "hydration branch failed");
        }
        (values, errors)
    }

    async fn link(&self, links: Vec<Link>, errors: &mut Vec<CompilerError>) {
        let urls: IndexSet<String> = links.iter().map(|link| link.url.clone()).collect();
        let results = join_all(urls.iter().map(|url| self.modules.load(url))).await;
        for (url, result) in urls.iter().zip(&results) {
            if let Err(error) = result {
                debug!(url = %url, "module load failed during hydration");
                errors.push(error.clone());
            }
        }
        let loaded: HashMap<&str, Result<Arc<ModuleRecord>, CompilerError>> = urls
            .iter()
            .map(|url| url.as_str())
            .zip(results)
            .collect();

        for link in links {
            let Some(Ok(record)) = loaded.get(link.url.as_str()) else {
                continue;
            };
            if !record.has_export(&link.export_name) {
                errors.push(missing_export(&link.url, &link.export_name));
                continue;
            }
            if let Some(function) = link.function {
                *function.module.borrow_mut() = Some(record.clone());
            }
        }
    }
}

/// A module export that a hydrated value depends on.
struct Link {
    url: String,
    export_name: String,
    function: Option<Rc<FunctionValue>>,
}

struct Build<'p> {
    payload: &'p ParsedPayload,
    root: &'p Handle,
    refs: HashMap<u32, Value>,
    links: Vec<Link>,
    errors: Vec<CompilerError>,
}

impl<'p> Build<'p> {
    /// Allocations create empty containers, fills write leaves into them
    /// and values collect the written roots. Each entry is handled once, in
    /// payload order, so graph depth never shows up as recursion.
    fn run(&mut self) -> Vec<Value> {
        let payload = self.payload;
        let mut roots = Vec::new();
        for entry in &payload.entries {
            match entry {
                Entry::Allocate { id, head } => {
                    if self.refs.contains_key(id) {
                        self.malformed(format!("refs[{}] is allocated twice", id));
                        continue;
                    }
                    let value = self.allocate(head);
                    self.refs.insert(*id, value);
                }
                Entry::Fill { id, body } => self.fill(*id, body),
                Entry::Value(descriptor) => {
                    let value = self.materialize(descriptor);
                    roots.push(value);
                }
            }
        }
        roots
    }

    fn malformed(&mut self, message: String) -> Value {
        self.errors
            .push(CompilerError::runtime(ERR_MALFORMED_PAYLOAD, &message, None));
        Value::Undefined
    }

    fn url_of(&mut self, loader: &str) -> Option<String> {
        let url = self.payload.url_of(loader).map(|url| url.to_string());
        if url.is_none() {
            self.malformed(format!("Unknown loader '{}'", loader));
        }
        url
    }

    fn materialize(&mut self, descriptor: &Descriptor) -> Value {
        match descriptor {
            Descriptor::Undefined => Value::Undefined,
            Descriptor::Null => Value::Null,
            Descriptor::Bool(b) => Value::Bool(*b),
            Descriptor::Number(n) => Value::Number(*n),
            Descriptor::String(s) => Value::String(s.clone()),
            Descriptor::Symbol(key) => Value::Symbol(key.clone()),
            Descriptor::Date(ms) => Value::Date(*ms),
            Descriptor::Ref(id) => match self.refs.get(id) {
                Some(value) => value.clone(),
                None => self.malformed(format!("refs[{}] is used before it is allocated", id)),
            },
            Descriptor::Lazy {
                loader,
                export_name,
            } => match self.url_of(loader) {
                Some(url) => Value::lazy(&url, export_name),
                None => Value::Undefined,
            },
            Descriptor::Anchor(path) => match dom::resolve_path(self.root, path) {
                Some(node) => Value::Node(node),
                None => {
                    self.errors.push(CompilerError::runtime(
                        ERR_ANCHOR_NOT_FOUND,
                        &format!("No node at path {:?} under the hydration root", path),
                        Some(dom::describe(self.root)),
                    ));
                    Value::Undefined
                }
            },
        }
    }

    fn allocate(&mut self, head: &Head) -> Value {
        match head {
            Head::Array => Value::array(Vec::new()),
            Head::Object => Value::object(Vec::<(String, Value)>::new()),
            Head::Instance {
                loader,
                export_name,
            } => {
                let Some(url) = self.url_of(loader) else {
                    return Value::Undefined;
                };
                self.links.push(Link {
                    url: url.clone(),
                    export_name: export_name.clone(),
                    function: None,
                });
                Value::instance(
                    Constructor {
                        url,
                        export_name: export_name.clone(),
                    },
                    Vec::<(String, Value)>::new(),
                )
            }
            Head::Closure {
                loader,
                export_name,
            } => {
                let Some(url) = self.url_of(loader) else {
                    return Value::Undefined;
                };
                let value = Value::closure(&url, export_name, Vec::new());
                if let Value::Function(function) = &value {
                    self.links.push(Link {
                        url,
                        export_name: export_name.clone(),
                        function: Some(function.clone()),
                    });
                }
                value
            }
        }
    }

    fn fill(&mut self, id: u32, body: &Body) {
        let Some(target) = self.refs.get(&id).cloned() else {
            self.malformed(format!("refs[{}] is filled before it is allocated", id));
            return;
        };
        match (&target, body) {
            (Value::Array(items), Body::Elements(elements)) => {
                let values: Vec<Value> = elements.iter().map(|e| self.materialize(e)).collect();
                items.borrow_mut().extend(values);
            }
            (Value::Object(object), Body::Properties(properties)) => {
                for (key, child) in properties {
                    let value = self.materialize(child);
                    object.borrow_mut().properties.insert(key.clone(), value);
                }
            }
            (Value::Function(function), Body::Captured(captured)) => {
                let values: Vec<Value> = captured.iter().map(|e| self.materialize(e)).collect();
                if let Some(origin) = &function.origin {
                    origin.captured.borrow_mut().extend(values);
                }
            }
            // An allocation that already failed was reported there.
            (Value::Undefined, _) => {}
            _ => {
                self.malformed(format!("refs[{}] is filled with a body that does not match its head", id));
            }
        }
    }
}
