#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;

    use crate::codegen::PREAMBLE;
    use crate::transform::{transform, transform_with, Selection, TransformOptions, TransformOutput};
    use crate::validate::{ERR_CYCLIC_CLOSURES, ERR_INVALID_OPTIONS, ERR_PARSE};

    fn compile(code: &str) -> TransformOutput {
        transform(code, &TransformOptions::default()).unwrap()
    }

    fn alias(output: &TransformOutput, name: &str) -> String {
        output
            .closures
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| c.alias.clone())
            .unwrap_or_else(|| panic!("no closure named {} in {:?}", name, output.closures))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TOP-LEVEL REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_top_level_function_is_exported_and_registered() {
        let out = compile("function App(){ return \"Hello App\"; }");
        assert!(out.code.starts_with(
            "export function App(){ return \"Hello App\"; }\n__closure(App, \"App\", []);"
        ));
        assert!(out.code.ends_with(PREAMBLE));

        let app = &out.closures[0];
        assert_eq!(app.alias, "App");
        assert_eq!(app.kind, "function");
        assert!(!app.hoisted);
        assert_eq!((app.line, app.column), (1, 0));
    }

    #[test]
    fn test_existing_exports_are_not_duplicated() {
        let out = compile("export function App() {}\nfunction Page() {}\nexport { Page };");
        assert!(!out.code.contains("export export"));
        assert!(!out.code.contains("export function Page"));
        assert!(out.code.contains("__closure(App, \"App\", []);"));
        assert!(out.code.contains("__closure(Page, \"Page\", []);"));
    }

    #[test]
    fn test_no_closures_means_no_preamble() {
        let out = compile("const x = 1;");
        assert_eq!(out.code, "const x = 1;");
        assert!(out.closures.is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HOISTING
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_nested_declaration_becomes_factory_call() {
        let out = compile(
            "function App(){ const a=1; function Component(){ return a; } return Component(); }",
        );
        let component = alias(&out, "Component");
        assert!(component.starts_with("Component_"));
        assert!(out.code.contains(&format!("const a=1;  return {}(a)(); }}", component)));
        assert!(out.code.contains(&format!(
            "export function {0}(a) {{\n  return __closure(function Component(){{ return a; }}, \"{0}\", [a]);\n}}",
            component
        )));
    }

    #[test]
    fn test_zero_capture_factory() {
        let out = compile("function App(){ const g = () => 1; return g; }");
        let g = alias(&out, "g");
        assert!(out.code.contains(&format!("const g = {}();", g)));
        assert!(out.code.contains(&format!(
            "export function {0}() {{\n  return __closure(() => 1, \"{0}\", []);\n}}",
            g
        )));
    }

    #[test]
    fn test_free_globals_are_left_verbatim() {
        let out = compile("export const h = function () { return undeclaredGlobal; };");
        let h = alias(&out, "h");
        assert!(out.code.contains(&format!("export const h = {}();", h)));
        assert!(out.code.contains("return undeclaredGlobal;"));
        assert!(out.closures[0].params.is_empty());
    }

    #[test]
    fn test_this_is_threaded_into_arrow() {
        let out = compile("function Outer() { const f = () => this.x; return f; }");
        let f = alias(&out, "f");
        assert!(out.code.contains(&format!("const f = {}(this);", f)));
        assert!(out.code.contains(&format!(
            "export function {0}(this_0) {{\n  return __closure(() => this_0.x, \"{0}\", [this_0]);\n}}",
            f
        )));
    }

    #[test]
    fn test_sibling_closure_is_passed_by_alias() {
        let out = compile(
            "function Outer(){ function helper(){ return 1; } const use = () => helper; return use; }",
        );
        let helper = alias(&out, "helper");
        let user = alias(&out, "use");
        assert!(out.code.contains(&format!("const helper = {}();", helper)));
        assert!(out.code.contains(&format!("const use = {}(helper);", user)));
        assert!(out.code.contains(&format!(
            "export function {0}(helper) {{\n  return __closure(() => helper, \"{0}\", [helper]);\n}}",
            user
        )));
    }

    #[test]
    fn test_reference_positions() {
        let out = compile(
            "function Outer(){ function helper(){ return 1; } class Point {} return [{ helper }, new Point()]; }",
        );
        let helper = alias(&out, "helper");
        let point = alias(&out, "Point");
        assert!(out.code.contains(&format!("{{ helper: {}() }}", helper)));
        assert!(out.code.contains(&format!("new ({}())()", point)));
    }

    #[test]
    fn test_jsx_tag_keeps_local_binding() {
        let out = compile("function App(){ function Item(){ return <li/>; } return <Item/>; }");
        let item = alias(&out, "Item");
        assert!(out.code.contains(&format!("const Item = {}();", item)));
        assert!(out.code.contains("return <Item/>;"));
    }

    #[test]
    fn test_self_referencing_arrow() {
        let out = compile("function Outer(){ const tick = () => setTimeout(tick, 10); return tick; }");
        let tick = alias(&out, "tick");
        assert!(out.code.contains(&format!(
            "  const tick = __closure(() => setTimeout(tick, 10), \"{}\", []);\n  return tick;\n}}",
            tick
        )));
    }

    #[test]
    fn test_object_method_becomes_property() {
        let out = compile("function Outer(name) { return { greet() { return name; } }; }");
        let greet = alias(&out, "greet");
        assert!(out.code.contains(&format!("return {{ greet: {}(name) }};", greet)));
        assert!(out
            .code
            .contains("return __closure(function () { return name; }"));
    }

    #[test]
    fn test_class_method_becomes_field() {
        let out = compile("function Outer(n) { return class Box { size() { return n; } }; }");
        let boxed = alias(&out, "Box");
        let size = alias(&out, "size");
        assert!(out.code.contains(&format!("return {}(n);", boxed)));
        assert!(out.code.contains(&format!(
            "__closure(class Box {{ size = {}(n); }}, \"{}\", [n])",
            size, boxed
        )));
    }

    #[test]
    fn test_anonymous_default_exports_are_named() {
        let out = compile("export default function () { return 1; }");
        let name = &out.closures[0].alias;
        assert!(name.starts_with("default_"));
        assert!(out.code.starts_with(&format!(
            "export function {0}() {{ return 1; }}\nexport default {0};\n__closure({0}, \"{0}\", []);",
            name
        )));

        let out = compile("export default () => 1;");
        let name = &out.closures[0].alias;
        assert!(out.code.starts_with(&format!(
            "export const {0} = () => 1;\nexport default {0};\n__closure({0}, \"{0}\", []);",
            name
        )));
    }

    #[test]
    fn test_call_arguments_resolve_where_the_declaration_is() {
        let out = compile(
            "function App(xs){ const item=1; function show(){ return item; } for (const item of xs) { show(); } }",
        );
        let show = alias(&out, "show");
        assert!(out.code.contains(&format!("const show = {}(item);", show)));
        assert!(out.code.contains("for (const item of xs) { show(); }"));
    }

    #[test]
    fn test_repeated_references_share_one_instance() {
        let out = compile("function App(){ function Item(){ return 1; } return [Item, Item]; }");
        let item = alias(&out, "Item");
        assert!(out.code.contains(&format!("const Item = {}(); return [Item, Item];", item)));
    }

    #[test]
    fn test_reassigned_declaration_is_bound_with_let() {
        let out = compile(
            "function App(){ function handler(){ return 1; } handler = null; return handler; }",
        );
        let handler = alias(&out, "handler");
        assert!(out.code.contains(&format!("let handler = {}(); handler = null;", handler)));
    }

    #[test]
    fn test_function_used_before_its_declaration_is_bound_early() {
        let out = compile("function App(){ return render(); function render(){ return 1; } }");
        let render = alias(&out, "render");
        assert!(out
            .code
            .contains(&format!("function App(){{ const render = {}(); return render();  }}", render)));
    }

    #[test]
    fn test_var_in_loop_body_is_captured_from_function() {
        let out = compile(
            "function App() { for (var i = 0; i < 3; i++) {} while (true) { var last = i; break; } const f = () => i + last; return f; }",
        );
        let f = alias(&out, "f");
        assert!(out.code.contains(&format!("const f = {}(i, last);", f)));
    }

    #[test]
    fn test_arguments_is_threaded_into_arrow() {
        let out = compile("function App(){ const f = () => arguments[0]; return f; }");
        let f = alias(&out, "f");
        assert!(out.code.contains(&format!("const f = {}(arguments);", f)));
        assert!(out.code.contains(&format!(
            "export function {0}(arguments_0) {{\n  return __closure(() => arguments_0[0], \"{0}\", [arguments_0]);\n}}",
            f
        )));
    }

    #[test]
    fn test_class_field_arrow_keeps_instance_this() {
        let code =
            "function App() { class Counter { count = 0; bump = () => this.count++; } return Counter; }";
        let out = compile(code);
        let counter = alias(&out, "Counter");
        let bump = alias(&out, "bump");
        let this = format!("this_{}", code.find("bump").unwrap());
        assert!(out.code.contains(&format!("return {}();", counter)));
        assert!(out.code.contains(&format!("bump = {}(this);", bump)));
        assert!(out.code.contains(&format!(
            "return __closure(() => {0}.count++, \"{1}\", [{0}]);",
            this, bump
        )));
    }

    #[test]
    fn test_async_and_generator_methods_keep_their_kind() {
        let out = compile(
            "function Outer(n) { return { async load() { return n; }, *items() { yield n; } }; }",
        );
        let load = alias(&out, "load");
        let items = alias(&out, "items");
        assert!(out
            .code
            .contains(&format!("return {{ load: {}(n), items: {}(n) }};", load, items)));
        assert!(out.code.contains("return __closure(async function () { return n; }"));
        assert!(out.code.contains("return __closure(function* () { yield n; }"));
    }

    #[test]
    fn test_static_method_becomes_static_field() {
        let out = compile("function Outer(n) { return class Box { static make() { return n; } }; }");
        let make = alias(&out, "make");
        assert!(out.code.contains(&format!("class Box {{ static make = {}(n); }}", make)));
    }

    #[test]
    fn test_computed_method_key_is_kept() {
        let out = compile("function Outer(key, n) { return { [key]() { return n; } }; }");
        let method = out
            .closures
            .iter()
            .find(|c| c.hoisted && c.name.is_none())
            .map(|c| c.alias.clone())
            .unwrap();
        assert!(out.code.contains(&format!("return {{ [key]: {}(n) }};", method)));
    }

    #[test]
    fn test_anonymous_default_exported_class_is_named() {
        let out = compile("export default class {}");
        let name = &out.closures[0].alias;
        assert!(name.starts_with("default_"));
        assert_eq!(out.closures[0].kind, "class");
        assert!(out.code.starts_with(&format!(
            "export class {0} {{}}\nexport default {0};\n__closure({0}, \"{0}\", []);",
            name
        )));
    }

    #[test]
    fn test_closures_report_their_imports() {
        let out = compile(
            "import { fmt } from \"./fmt.js\";\nfunction App(){ const label = () => fmt(1); return label; }",
        );
        let label = out.closures.iter().find(|c| c.name.as_deref() == Some("label")).unwrap();
        assert_eq!(label.imports, vec!["fmt".to_string()]);
        assert!(label.params.is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MUTUAL RECURSION
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_mutual_recursion_uses_a_lazy_reference() {
        let out = compile(
            "function Outer(){ function even(){ return odd(); } function odd(){ return even(); } return even; }",
        );
        let even = alias(&out, "even");
        let odd = alias(&out, "odd");
        assert!(out.code.contains(&format!(
            "function Outer(){{ const odd = {1}(__lazyRef(\"{0}\", () => even)); const even = {0}(odd);  return even; }}",
            even, odd
        )));
        assert!(out.code.contains("function odd(){ return even()(); }"));
        assert!(out.code.contains("function even(){ return odd(); }"));
    }

    #[test]
    fn test_jsx_tag_reached_only_lazily_is_rejected() {
        let error = transform(
            "function App(){ function A(){ return <B/>; } function B(){ return <A/>; } return <A/>; }",
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(error.code, ERR_CYCLIC_CLOSURES);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FAILURES, OPTIONS, DETERMINISM
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_parse_error_is_fatal() {
        let options = TransformOptions {
            filename: "broken.js".to_string(),
            ..TransformOptions::default()
        };
        let error = transform("function (\n", &options).unwrap_err();
        assert_eq!(error.code, ERR_PARSE);
        assert_eq!(error.file, "broken.js");
        assert!(error.line >= 1);
    }

    #[test]
    fn test_output_is_deterministic() {
        let code = "function App(){ const a = 1; const f = () => a; const g = () => f; return [f, g]; }";
        let first = compile(code);
        let second = compile(code);
        assert_eq!(first, second);
    }

    #[test]
    fn test_options_from_json() {
        let options =
            TransformOptions::from_json(r#"{"selectClosures": "^[A-Z]", "preamble": false}"#).unwrap();
        let out = transform("function App(){ const helper = () => 1; return helper; }", &options).unwrap();
        assert_eq!(out.closures.len(), 1);
        assert!(!out.code.contains("function __lazyRef"));

        let error = TransformOptions::from_json(r#"{"selectClosures": "("}"#)
            .unwrap()
            .selection()
            .unwrap_err();
        assert_eq!(error.code, ERR_INVALID_OPTIONS);
    }

    #[test]
    fn test_custom_selection() {
        let selection = Selection::Custom(Arc::new(|name: &str| name.starts_with("on")));
        let out = transform_with(
            "function App(){ const onClick = () => 1; const other = () => 2; return [onClick, other]; }",
            &TransformOptions::default(),
            &selection,
        )
        .unwrap();
        let names: Vec<Option<&str>> = out.closures.iter().map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec![Some("onClick")]);
    }

    #[test]
    fn test_source_map_is_emitted_on_request() {
        let options = TransformOptions {
            filename: "app.js".to_string(),
            source_map: true,
            ..TransformOptions::default()
        };
        let out = transform("const x = 1;\nfunction App() { return x; }\n", &options).unwrap();
        let map = sourcemap::SourceMap::from_slice(out.map.unwrap().as_bytes()).unwrap();
        let token = map.lookup_token(1, 7).unwrap();
        assert_eq!(token.get_src_line(), 1);
        assert_eq!(token.get_source(), Some("app.js"));
    }

    /// A component with nested closures; closure `i` captures the props
    /// named by its mask and may call closures declared before it.
    fn program(closures: &[(u8, u8, bool)]) -> String {
        let mut body = String::new();
        for (i, (form, mask, calls_previous)) in closures.iter().enumerate() {
            let mut terms: Vec<String> = ["a", "b", "c"]
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, name)| name.to_string())
                .collect();
            if *calls_previous && i > 0 {
                terms.push(format!("f{}()", i - 1));
            }
            if terms.is_empty() {
                terms.push("0".to_string());
            }
            let expr = terms.join(" + ");
            match form % 3 {
                0 => body.push_str(&format!("const f{} = () => {}; ", i, expr)),
                1 => body.push_str(&format!("function f{}() {{ return {}; }} ", i, expr)),
                _ => body.push_str(&format!("const f{} = function () {{ return {}; }}; ", i, expr)),
            }
        }
        let names: Vec<String> = (0..closures.len()).map(|i| format!("f{}", i)).collect();
        format!("function App(a, b, c) {{ {}return [{}]; }}", body, names.join(", "))
    }

    proptest! {
        #[test]
        fn test_compilation_is_deterministic(
            closures in prop::collection::vec((0u8..3, 0u8..8, any::<bool>()), 1..8)
        ) {
            let code = program(&closures);
            let first = transform(&code, &TransformOptions::default());
            prop_assert!(first.is_ok(), "source: {}", code);
            let second = transform(&code, &TransformOptions::default());
            prop_assert_eq!(first, second);
        }
    }
}
