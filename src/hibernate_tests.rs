#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use crate::runtime::dom::{parse_html, resolve_path};
    use crate::runtime::hibernate::{hibernate, Hibernator};
    use crate::runtime::hydrate::{hydrate, Hydrator};
    use crate::runtime::loader::{InMemorySource, ModuleCache, ModuleRecord};
    use crate::runtime::{
        structurally_equal, Constructor, CustomSerialize, FunctionValue, Handle, Value,
    };
    use crate::validate::ERR_UNSERIALIZABLE;

    const COUNTER_URL: &str = "/_build/counter.js";
    const SHAPES_URL: &str = "/_build/shapes.js";

    fn fixtures() -> (Handle, ModuleCache) {
        let root = parse_html("<html><head></head><body><p>hi</p><button>+</button></body></html>")
            .unwrap();
        let source = InMemorySource::new([
            ModuleRecord::new(COUNTER_URL, &["Counter_a1b2c3d4", "increment_e5f6g7h8"]),
            ModuleRecord::new(SHAPES_URL, &["Point", "Panel"]),
        ]);
        (root, ModuleCache::new(Arc::new(source)))
    }

    fn round_trip(value: &Value) -> Value {
        let text = hibernate(value).unwrap().to_string();
        let (root, modules) = fixtures();
        block_on(hydrate(&text, &root, &modules))
            .unwrap_or_else(|partial| panic!("hydration failed: {:?}\n{}", partial.errors, text))
    }

    #[test]
    fn test_primitives_round_trip() {
        let value = Value::array(vec![
            Value::Undefined,
            Value::Null,
            Value::Bool(true),
            Value::Number(-0.0),
            Value::Number(f64::NAN),
            Value::Number(f64::NEG_INFINITY),
            Value::Number(1e21),
            Value::string("quote \" and \\ and \n"),
            Value::Symbol("app.key".to_string()),
            Value::Date(1_700_000_000_000.0),
        ]);
        let text = hibernate(&value).unwrap().to_string();
        assert!(text.contains("-0"));
        assert!(text.contains("Symbol.for(\"app.key\")"));
        assert!(text.contains("new Date(1700000000000)"));
        assert!(structurally_equal(&value, &round_trip(&value)));
    }

    #[test]
    fn test_shared_sub_objects_stay_shared() {
        let shared = Value::object([("n", Value::Number(1.0))]);
        let value = Value::object([("left", shared.clone()), ("right", shared)]);
        let text = hibernate(&value).unwrap().to_string();
        assert!(text.contains("\"right\": refs[1]"));

        let hydrated = round_trip(&value);
        let (left, right) = (hydrated.get("left").unwrap(), hydrated.get("right").unwrap());
        assert!(left.same(&right));
        assert!(structurally_equal(&value, &hydrated));
    }

    #[test]
    fn test_cycle_through_tagged_closure() {
        let state = Value::object([("count", Value::Number(0.0))]);
        let increment = Value::closure(COUNTER_URL, "increment_e5f6g7h8", vec![state.clone()]);
        if let Value::Object(obj) = &state {
            obj.borrow_mut()
                .properties
                .insert("onClick".to_string(), increment);
        }

        let hydrated = round_trip(&state);
        assert!(structurally_equal(&state, &hydrated));
        let Some(Value::Function(handler)) = hydrated.get("onClick") else {
            panic!("closure lost");
        };
        let captured = handler.origin.as_ref().unwrap().captured.borrow()[0].clone();
        assert!(captured.same(&hydrated));
        assert!(handler.module.borrow().is_some());
    }

    #[test]
    fn test_instances_lazy_refs_and_anchors() {
        let (root, modules) = fixtures();
        let button = resolve_path(&root, &[0, 1, 1]).unwrap();
        let point = Value::instance(
            Constructor {
                url: SHAPES_URL.to_string(),
                export_name: "Point".to_string(),
            },
            [("x", Value::Number(1.0)), ("y", Value::Number(2.0))],
        );
        let value = Value::array(vec![
            point,
            Value::lazy(SHAPES_URL, "Panel"),
            Value::Node(button.clone()),
        ]);

        let payload = hibernate(&value).unwrap();
        assert_eq!(payload.loaders.len(), 1);
        assert!(payload.loaders[0].name.starts_with("load_"));
        let text = payload.to_string();
        assert!(text.contains("__anchor([0, 1, 1])"));

        let hydrated = block_on(hydrate(&text, &root, &modules)).unwrap();
        assert!(structurally_equal(&value, &hydrated));
        let Some(Value::Node(node)) = hydrated.index(2) else {
            panic!("anchor lost");
        };
        assert!(Rc::ptr_eq(&node, &button));
    }

    #[test]
    fn test_untagged_function_is_fatal() {
        let handler = Value::Function(Rc::new(FunctionValue {
            name: "handler".to_string(),
            origin: None,
            module: RefCell::new(None),
        }));
        let value = Value::object([("onClick", handler)]);
        let error = hibernate(&value).unwrap_err();
        assert_eq!(error.code, ERR_UNSERIALIZABLE);
        assert!(error.message.contains("handler"));
        assert!(error.context.unwrap().contains("handler"));
    }

    struct Celsius(f64);

    impl CustomSerialize for Celsius {
        fn hibernate(&self) -> Value {
            Value::object([("celsius", Value::Number(self.0))])
        }
    }

    #[test]
    fn test_custom_values_delegate_to_hook() {
        let value = Value::array(vec![Value::Custom(Rc::new(Celsius(21.5)))]);
        let hydrated = round_trip(&value);
        let reading = hydrated.index(0).unwrap();
        assert!(matches!(reading.get("celsius"), Some(Value::Number(n)) if n == 21.5));
    }

    #[test]
    fn test_shared_custom_value_keeps_identity() {
        let reading = Value::Custom(Rc::new(Celsius(3.0)));
        let value = Value::array(vec![reading.clone(), reading]);
        let hydrated = round_trip(&value);
        assert!(hydrated.index(0).unwrap().same(&hydrated.index(1).unwrap()));
    }

    /// Hook output that contains the hook object itself.
    struct Looped {
        me: RefCell<Option<Value>>,
    }

    impl CustomSerialize for Looped {
        fn hibernate(&self) -> Value {
            Value::object([("me", self.me.borrow().clone().unwrap_or(Value::Null))])
        }
    }

    #[test]
    fn test_self_containing_custom_value_terminates() {
        let looped = Rc::new(Looped { me: RefCell::new(None) });
        let value = Value::Custom(looped.clone());
        *looped.me.borrow_mut() = Some(value.clone());

        let hydrated = round_trip(&value);
        assert!(hydrated.get("me").unwrap().same(&hydrated));
        looped.me.borrow_mut().take();
    }

    /// Hook that answers with itself.
    struct Mirror {
        me: RefCell<Option<Value>>,
    }

    impl CustomSerialize for Mirror {
        fn hibernate(&self) -> Value {
            self.me.borrow().clone().unwrap_or(Value::Null)
        }
    }

    #[test]
    fn test_hook_returning_itself_is_fatal() {
        let mirror = Rc::new(Mirror { me: RefCell::new(None) });
        let value = Value::Custom(mirror.clone());
        *mirror.me.borrow_mut() = Some(value.clone());

        let error = hibernate(&value).unwrap_err();
        assert_eq!(error.code, ERR_UNSERIALIZABLE);
        mirror.me.borrow_mut().take();
    }

    #[test]
    fn test_proto_key_stays_an_own_property() {
        let value = Value::object([("__proto__", Value::Number(1.0)), ("a", Value::Null)]);
        let text = hibernate(&value).unwrap().to_string();
        assert!(text.contains("[\"__proto__\"]: 1"));
        assert!(!text.contains("{\"__proto__\""));

        let hydrated = round_trip(&value);
        assert!(matches!(hydrated.get("__proto__"), Some(Value::Number(n)) if n == 1.0));
        assert!(structurally_equal(&value, &hydrated));
    }

    #[test]
    fn test_deep_chain_round_trips() {
        let depth = 1_000;
        let mut value = Value::array(vec![Value::Number(0.0)]);
        for i in 1..depth {
            value = Value::array(vec![Value::Number(i as f64), value]);
        }
        let payload = hibernate(&value).unwrap();
        assert_eq!(payload.definitions.len(), 2 * depth);
        assert!(payload.definitions.iter().all(|d| d.len() < 64));

        let hydrated = round_trip(&value);
        assert!(structurally_equal(&value, &hydrated));
    }

    #[test]
    fn test_hibernator_shares_refs_across_writes() {
        let shared = Value::array(vec![Value::Number(1.0)]);
        let mut hibernator = Hibernator::new();
        hibernator.write(&shared).unwrap();
        hibernator.write(&Value::string("between")).unwrap();
        hibernator.write(&shared).unwrap();
        let payload = hibernator.finish();
        assert_eq!(payload.expressions[0], "refs[0]");
        assert_eq!(payload.expressions[2], "refs[0]");
        assert_eq!(payload.definitions.len(), 2);

        let (root, modules) = fixtures();
        let values = block_on(Hydrator::new(&root, &modules).hydrate_all(&payload.to_string())).unwrap();
        assert_eq!(values.len(), 3);
        assert!(values[0].same(&values[2]));
        assert!(matches!(&values[1], Value::String(s) if s == "between"));
    }

    #[test]
    fn test_one_loader_per_url() {
        let value = Value::array(vec![
            Value::closure(COUNTER_URL, "Counter_a1b2c3d4", vec![]),
            Value::closure(COUNTER_URL, "increment_e5f6g7h8", vec![]),
            Value::lazy(SHAPES_URL, "Panel"),
        ]);
        let payload = hibernate(&value).unwrap();
        let urls: Vec<&str> = payload.loaders.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec![COUNTER_URL, SHAPES_URL]);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROPERTIES
    // ═══════════════════════════════════════════════════════════════════════════

    #[derive(Debug, Clone)]
    enum Shape {
        Null,
        Bool(bool),
        Number(f64),
        Text(String),
        List(Vec<Shape>),
        Record(Vec<(String, Shape)>),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        let leaf = prop_oneof![
            Just(Shape::Null),
            any::<bool>().prop_map(Shape::Bool),
            any::<f64>().prop_map(Shape::Number),
            "[a-z\\\\\"\\n\u{e9} ]{0,8}".prop_map(Shape::Text),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::List),
                prop::collection::vec(("[a-z]{1,3}", inner), 0..4).prop_map(Shape::Record),
            ]
        })
    }

    fn build(shape: &Shape) -> Value {
        match shape {
            Shape::Null => Value::Null,
            Shape::Bool(b) => Value::Bool(*b),
            Shape::Number(n) => Value::Number(*n),
            Shape::Text(s) => Value::string(s.clone()),
            Shape::List(items) => Value::array(items.iter().map(build).collect()),
            Shape::Record(entries) => {
                Value::object(entries.iter().map(|(k, v)| (k.clone(), build(v))))
            }
        }
    }

    proptest! {
        #[test]
        fn test_round_trip_is_structurally_equal(shape in shape()) {
            let value = build(&shape);
            let text = hibernate(&value).unwrap().to_string();
            prop_assert_eq!(&text, &hibernate(&value).unwrap().to_string());

            let (root, modules) = fixtures();
            let hydrated = block_on(hydrate(&text, &root, &modules));
            prop_assert!(hydrated.is_ok(), "payload: {}", text);
            prop_assert!(structurally_equal(&value, &hydrated.unwrap()), "payload: {}", text);
        }
    }
}
