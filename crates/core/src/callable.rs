//! Callable fragment encoder: recover a callable's source, re-emit it as a
//! free-standing expression and strip the attributes the host runtime
//! recreates on its own.

use exval_syntax::{Fragment, ParamKind, Shape};

use crate::descriptor::Layout;
use crate::encoder::{Token, TokenStream};
use crate::error::ExvalError;
use crate::heap::{Heap, ObjectId, Value};

/// Attributes that only exist as call-site artifacts.
const VOLATILE: &[&str] = &["length", "arguments", "caller"];

/// `{ [native code] }` bodies carry nothing that can be re-emitted.
pub fn is_native_stub(source: &str) -> bool {
    let Some(rest) = source.trim_end().strip_suffix('}') else {
        return false;
    };
    match rest.trim_end().strip_suffix("[native code]") {
        Some(head) => head.trim_end().ends_with('{'),
        None => false,
    }
}

/// Parse a callable's own source: as an expression first, then as a
/// member fragment lifted out of a template body.
pub fn recover(source: &str) -> Result<Fragment, ExvalError> {
    if is_native_stub(source) {
        return Err(ExvalError::UnparseableCallable {
            source_text: source.to_owned(),
            reason: "host-native callable has no recoverable source".to_owned(),
        });
    }
    exval_syntax::parse(source).map_err(|err| ExvalError::UnparseableCallable {
        source_text: source.to_owned(),
        reason: err.to_string(),
    })
}

fn params_text(source: &str, fragment: &Fragment) -> String {
    fragment
        .params
        .iter()
        .map(|p| {
            let text = p.span.slice(source);
            match p.kind {
                ParamKind::Ident => text.trim().to_owned(),
                ParamKind::Default | ParamKind::Rest | ParamKind::Pattern => text.to_owned(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Re-emit `fragment` as an expression. Templates with a declared base
/// embed a reference to `delegate`, the callable's own delegation link.
pub fn render(source: &str, fragment: &Fragment, delegate: Option<ObjectId>) -> Vec<Token> {
    let body = fragment.body.slice(source);
    let mut out = TokenStream::new();
    match fragment.shape {
        Shape::Arrow => out.text(source),
        Shape::Function | Shape::Method(_) => {
            if fragment.is_async {
                out.text("async ");
            }
            out.text("function");
            if fragment.is_generator {
                out.text("*");
            }
            out.text(&format!("({})", params_text(source, fragment)));
            out.text(body);
        }
        Shape::Class => {
            if fragment.superclass.is_some() {
                out.text("class extends ");
                match delegate {
                    Some(base) => out.reference(base),
                    None => out.text("null"),
                }
                out.text(body);
            } else {
                out.text("class");
                out.text(body);
            }
        }
    }
    out.into_tokens()
}

/// The base a template's `extends` clause names: the delegation link, or
/// `None` for `extends null`. A template declaring any other base whose
/// delegation link is still the universal callable base was never linked
/// to that base and cannot be re-emitted.
pub fn base(
    heap: &Heap,
    source: &str,
    fragment: &Fragment,
    delegate: Option<ObjectId>,
) -> Result<Option<ObjectId>, ExvalError> {
    let Some(superclass) = &fragment.superclass else {
        return Ok(delegate);
    };
    if delegate != Some(heap.intrinsics().function_prototype) {
        return Ok(delegate);
    }
    let declared = superclass.slice(source).trim();
    if declared == "null" {
        return Ok(None);
    }
    Err(ExvalError::UnparseableCallable {
        source_text: source.to_owned(),
        reason: format!("base `{}` is not the template's delegation link", declared),
    })
}

/// Remove from `layout` every attribute the emitted fragment recreates by
/// itself. Returns the delegation link still to be applied explicitly,
/// `None` when the fragment already implies it.
pub fn trim(
    heap: &Heap,
    id: ObjectId,
    fragment: &Fragment,
    layout: &mut Layout,
    preserve_names: bool,
) -> Option<Option<ObjectId>> {
    for name in VOLATILE {
        layout.drop(name);
    }

    let named = matches!(heap.read(id, "name"), Ok(Value::Str(ref n)) if !n.is_empty());
    if !(preserve_names && named) {
        layout.drop("name");
    }

    if fragment.shape == Shape::Class || default_prototype(heap, id, fragment) {
        layout.drop("prototype");
    }

    let intrinsics = heap.intrinsics();
    let implied = fragment.superclass.is_some()
        || layout.delegate == Some(intrinsics.function_prototype)
        || layout.delegate == Some(intrinsics.generator_function_prototype);
    if implied {
        None
    } else {
        Some(layout.delegate)
    }
}

/// Whether the `prototype` attribute is exactly what evaluating the
/// fragment would create: nothing of its own, or only a `constructor`
/// pointing back at the callable.
fn default_prototype(heap: &Heap, id: ObjectId, fragment: &Fragment) -> bool {
    let Ok(Value::Object(proto)) = heap.read(id, "prototype") else {
        return false;
    };
    let intrinsics = heap.intrinsics();
    let expected_base = if fragment.is_generator {
        intrinsics.generator_prototype
    } else {
        intrinsics.object_prototype
    };
    let obj = heap.get(proto);
    if obj.proto != Some(expected_base) {
        return false;
    }
    let names: Vec<&str> = obj.properties.keys().map(String::as_str).collect();
    match names.as_slice() {
        [] => true,
        ["constructor"] => heap.read(proto, "constructor") == Ok(Value::Object(id)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::classify;
    use crate::encoder::render_plain;

    fn fragment_text(source: &str) -> String {
        let fragment = recover(source).unwrap();
        render_plain(&render(source, &fragment, None))
    }

    #[test]
    fn native_stubs_are_detected() {
        assert!(is_native_stub("function pow() { [native code] }"));
        assert!(is_native_stub("function () {\n    [native code]\n}"));
        assert!(!is_native_stub("function f() { return '[native code]'; }"));
        assert!(!is_native_stub("x => x"));
    }

    #[test]
    fn native_stub_is_unparseable() {
        let err = recover("function pow() { [native code] }").unwrap_err();
        assert_eq!(err.kind(), "UnparseableCallable");
    }

    #[test]
    fn garbage_is_unparseable() {
        let err = recover("this is not code {").unwrap_err();
        assert_eq!(err.kind(), "UnparseableCallable");
    }

    #[test]
    fn arrows_are_verbatim() {
        assert_eq!(fragment_text("(a, b) => a + b"), "(a, b) => a + b");
        assert_eq!(fragment_text("async x => { await x; }"), "async x => { await x; }");
    }

    #[test]
    fn functions_drop_their_name_and_keep_markers() {
        assert_eq!(fragment_text("function add(a, b) { return a + b; }"), "function(a,b){ return a + b; }");
        assert_eq!(fragment_text("function* gen() { yield 1; }"), "function*(){ yield 1; }");
        assert_eq!(fragment_text("async function load(url) { }"), "async function(url){ }");
    }

    #[test]
    fn non_identifier_params_keep_their_source() {
        assert_eq!(
            fragment_text("function f(a, b = a * 2, { c }, ...rest) {}"),
            "function(a,b = a * 2,{ c },...rest){}"
        );
    }

    #[test]
    fn member_fragments_become_functions() {
        assert_eq!(fragment_text("get size() { return 1; }"), "function(){ return 1; }");
        assert_eq!(fragment_text("method(x) { return x; }"), "function(x){ return x; }");
        assert_eq!(fragment_text("*items() { yield 1; }"), "function*(){ yield 1; }");
    }

    #[test]
    fn templates_without_base() {
        assert_eq!(fragment_text("class Point { constructor(x) { this.x = x; } }"), "class{ constructor(x) { this.x = x; } }");
    }

    #[test]
    fn templates_with_base_embed_the_delegate() {
        let mut heap = Heap::new();
        let base = heap.callable("class Base {}").unwrap();
        let source = "class Derived extends Base { }";
        let fragment = recover(source).unwrap();
        let tokens = render(source, &fragment, Some(base));
        assert_eq!(
            tokens,
            vec![
                Token::Text("class extends ".to_owned()),
                Token::Ref(base),
                Token::Text("{ }".to_owned()),
            ]
        );
    }

    #[test]
    fn template_base_must_be_linked() {
        let mut heap = Heap::new();
        let universal = heap.intrinsics().function_prototype;
        let base_class = heap.callable("class Base {}").unwrap();

        let source = "class Derived extends Base { }";
        let fragment = recover(source).unwrap();
        assert_eq!(base(&heap, source, &fragment, Some(base_class)), Ok(Some(base_class)));
        let err = base(&heap, source, &fragment, Some(universal)).unwrap_err();
        assert_eq!(err.kind(), "UnparseableCallable");
        assert!(err.to_string().contains("Base"), "{}", err);

        let source = "class Orphan extends null { }";
        let fragment = recover(source).unwrap();
        assert_eq!(base(&heap, source, &fragment, Some(universal)), Ok(None));

        let source = "function f() {}";
        let fragment = recover(source).unwrap();
        assert_eq!(base(&heap, source, &fragment, Some(universal)), Ok(Some(universal)));
    }

    #[test]
    fn trim_drops_runtime_attributes() {
        let mut heap = Heap::new();
        let f = heap.callable("function named(a) { return a; }").unwrap();
        heap.set(f, "extra", 1.0);
        let fragment = recover("function named(a) { return a; }").unwrap();

        let mut layout = classify(&heap, f);
        let rebase = trim(&heap, f, &fragment, &mut layout, false);
        assert_eq!(rebase, None);
        assert!(layout.custom.is_empty());
        assert_eq!(layout.plain, vec!["extra"]);

        let mut layout = classify(&heap, f);
        trim(&heap, f, &fragment, &mut layout, true);
        assert_eq!(layout.custom, vec!["name"]);
    }

    #[test]
    fn trim_keeps_a_populated_prototype() {
        let mut heap = Heap::new();
        let source = "function Animal() {}";
        let f = heap.callable(source).unwrap();
        let proto = heap.read(f, "prototype").unwrap().as_object().unwrap();
        let speak = heap.callable("function speak() {}").unwrap();
        heap.set(proto, "speak", speak);

        let fragment = recover(source).unwrap();
        let mut layout = classify(&heap, f);
        trim(&heap, f, &fragment, &mut layout, false);
        assert_eq!(layout.custom, vec!["prototype"]);
    }

    #[test]
    fn trim_reports_foreign_delegates() {
        let mut heap = Heap::new();
        let source = "x => x";
        let f = heap.callable(source).unwrap();
        heap.set_proto(f, None);
        let fragment = recover(source).unwrap();
        let mut layout = classify(&heap, f);
        assert_eq!(trim(&heap, f, &fragment, &mut layout, false), Some(None));
    }

    #[test]
    fn template_prototype_is_always_dropped() {
        let mut heap = Heap::new();
        let source = "class A { m() {} }";
        let f = heap.callable(source).unwrap();
        let proto = heap.read(f, "prototype").unwrap().as_object().unwrap();
        heap.set(proto, "extra", 1.0);
        let fragment = recover(source).unwrap();
        let mut layout = classify(&heap, f);
        trim(&heap, f, &fragment, &mut layout, false);
        assert!(layout.custom.is_empty());
    }
}
