//! The built-in global environment every [`Heap`] starts with.
//!
//! Only structure matters here: the natives are opaque stubs, but their
//! placement mirrors the host runtime closely enough that canonical paths
//! such as `Math.pow` or `Object.prototype.toString` resolve the same way.

use std::collections::HashMap;

use crate::heap::{Heap, ObjectId, ObjectKind, Property, Value};

/// Handles to the built-ins the serializer treats specially.
#[derive(Debug, Clone, Default)]
pub struct Intrinsics {
    /// The global environment (`globalThis`).
    pub global: ObjectId,
    /// The universal base object every plain composite delegates to.
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub array_prototype: ObjectId,
    /// Shared base of generator callables. Not reachable by attribute walk.
    pub generator_function_prototype: ObjectId,
    /// Shared base of generator instances.
    pub generator_prototype: ObjectId,
    /// Module-loader bookkeeping that an environment scan normally skips.
    pub host_internals: Vec<ObjectId>,
    /// Deprecated members per holder; reading them on a real host prints
    /// a warning, so the scan never visits them.
    pub deprecated: HashMap<ObjectId, Vec<&'static str>>,
}

impl Intrinsics {
    pub fn is_deprecated(&self, holder: ObjectId, key: &str) -> bool {
        self.deprecated
            .get(&holder)
            .is_some_and(|names| names.contains(&key))
    }
}

const OBJECT_STATICS: &[(&str, u32)] = &[
    ("create", 2),
    ("assign", 2),
    ("defineProperty", 3),
    ("defineProperties", 2),
    ("getPrototypeOf", 1),
    ("setPrototypeOf", 2),
    ("getOwnPropertyNames", 1),
    ("getOwnPropertyDescriptor", 2),
    ("keys", 1),
    ("freeze", 1),
];

const OBJECT_METHODS: &[(&str, u32)] = &[
    ("hasOwnProperty", 1),
    ("isPrototypeOf", 1),
    ("propertyIsEnumerable", 1),
    ("toString", 0),
    ("toLocaleString", 0),
    ("valueOf", 0),
];

const FUNCTION_METHODS: &[(&str, u32)] = &[("apply", 2), ("bind", 1), ("call", 1), ("toString", 0)];

const ARRAY_METHODS: &[(&str, u32)] = &[
    ("concat", 1),
    ("filter", 1),
    ("forEach", 1),
    ("indexOf", 1),
    ("join", 1),
    ("map", 1),
    ("pop", 0),
    ("push", 1),
    ("reduce", 1),
    ("slice", 2),
    ("sort", 1),
    ("splice", 2),
];

const MATH_METHODS: &[(&str, u32)] = &[
    ("abs", 1),
    ("ceil", 1),
    ("floor", 1),
    ("max", 2),
    ("min", 2),
    ("pow", 2),
    ("random", 0),
    ("round", 1),
    ("sqrt", 1),
];

/// Populate `heap` with the global environment and record the intrinsics.
pub(crate) fn install(heap: &mut Heap) {
    let object_prototype = heap.alloc(ObjectKind::Ordinary, None);
    let function_prototype = heap.alloc(
        ObjectKind::Callable {
            source: "function () { [native code] }".to_owned(),
        },
        Some(object_prototype),
    );
    let array_prototype = heap.alloc(ObjectKind::Sequence, Some(object_prototype));
    heap.define(array_prototype, "length", Property::data(0.0, true, false, false));
    {
        let i = heap.intrinsics_mut();
        i.object_prototype = object_prototype;
        i.function_prototype = function_prototype;
        i.array_prototype = array_prototype;
    }

    let global = heap.object();
    heap.intrinsics_mut().global = global;
    heap.define(global, "globalThis", Property::hidden(global));

    // Object
    let object = builtin(heap, global, "Object", 1, object_prototype);
    methods(heap, object, OBJECT_STATICS);
    methods(heap, object_prototype, OBJECT_METHODS);
    let proto_get = heap.native("get __proto__", 0);
    let proto_set = heap.native("set __proto__", 1);
    heap.define(
        object_prototype,
        "__proto__",
        Property::accessor(Some(proto_get), Some(proto_set), false, true),
    );

    // Function
    builtin(heap, global, "Function", 1, function_prototype);
    methods(heap, function_prototype, FUNCTION_METHODS);
    heap.define(function_prototype, "length", Property::data(0.0, false, false, true));
    heap.define(function_prototype, "name", Property::data("", false, false, true));

    // Array
    let array = builtin(heap, global, "Array", 1, array_prototype);
    methods(heap, array, &[("isArray", 1), ("from", 1), ("of", 0)]);
    methods(heap, array_prototype, ARRAY_METHODS);

    install_generators(heap, function_prototype, object_prototype);

    for (name, arity, members) in [
        ("Number", 1, &[("toFixed", 1), ("toString", 1), ("valueOf", 0)][..]),
        ("Boolean", 1, &[("toString", 0), ("valueOf", 0)][..]),
        ("String", 1, &[("charAt", 1), ("indexOf", 1), ("slice", 2), ("split", 2), ("trim", 0)][..]),
        ("Map", 0, &[("get", 1), ("set", 2), ("has", 1), ("delete", 1)][..]),
        ("Set", 0, &[("add", 1), ("has", 1), ("delete", 1)][..]),
        ("WeakMap", 0, &[("get", 1), ("set", 2), ("has", 1), ("delete", 1)][..]),
        ("Date", 7, &[("getTime", 0), ("toISOString", 0)][..]),
        ("RegExp", 2, &[("exec", 1), ("test", 1)][..]),
        ("Promise", 1, &[("then", 2), ("catch", 1), ("finally", 1)][..]),
    ] {
        let prototype = heap.object();
        builtin(heap, global, name, arity, prototype);
        methods(heap, prototype, members);
    }

    let error_prototype = heap.object();
    builtin(heap, global, "Error", 1, error_prototype);
    methods(heap, error_prototype, &[("toString", 0)]);
    heap.define(error_prototype, "message", Property::hidden(""));
    for name in ["TypeError", "RangeError"] {
        let prototype = heap.object_with_proto(Some(error_prototype));
        let ctor = builtin(heap, global, name, 1, prototype);
        heap.define(prototype, "name", Property::hidden(name));
        let error = heap.read(global, "Error").ok().and_then(|v| v.as_object());
        heap.set_proto(ctor, error);
    }

    let json = namespace(heap, global, "JSON");
    methods(heap, json, &[("parse", 2), ("stringify", 3)]);

    let math = namespace(heap, global, "Math");
    methods(heap, math, MATH_METHODS);
    heap.define(math, "PI", Property::data(std::f64::consts::PI, false, false, false));
    heap.define(math, "E", Property::data(std::f64::consts::E, false, false, false));

    let buffer_prototype = heap.object();
    let buffer = builtin(heap, global, "Buffer", 2, buffer_prototype);
    methods(heap, buffer, &[("from", 3), ("alloc", 3), ("isBuffer", 1)]);
    methods(heap, buffer_prototype, &[("toString", 3), ("write", 4)]);

    install_process(heap, global);
    install_require(heap, global);

    heap.define(global, "GLOBAL", Property::hidden(global));
    heap.define(global, "root", Property::hidden(global));
    heap.intrinsics_mut()
        .deprecated
        .insert(global, vec!["GLOBAL", "root"]);
}

fn install_generators(heap: &mut Heap, function_prototype: ObjectId, object_prototype: ObjectId) {
    let generator_function_prototype = heap.object_with_proto(Some(function_prototype));
    let generator_prototype = heap.object_with_proto(Some(object_prototype));
    methods(heap, generator_prototype, &[("next", 1), ("return", 1), ("throw", 1)]);

    let generator_function = heap.native("GeneratorFunction", 1);
    let function = heap.read(heap.global(), "Function").ok().and_then(|v| v.as_object());
    heap.set_proto(generator_function, function);
    heap.define(
        generator_function,
        "prototype",
        Property::data(generator_function_prototype, false, false, false),
    );
    heap.define(
        generator_function_prototype,
        "constructor",
        Property::data(generator_function, false, false, true),
    );
    heap.define(
        generator_function_prototype,
        "prototype",
        Property::data(generator_prototype, false, false, true),
    );
    heap.define(
        generator_prototype,
        "constructor",
        Property::data(generator_function_prototype, false, false, true),
    );

    let i = heap.intrinsics_mut();
    i.generator_function_prototype = generator_function_prototype;
    i.generator_prototype = generator_prototype;
}

fn install_process(heap: &mut Heap, global: ObjectId) {
    let process = namespace(heap, global, "process");
    let env = heap.object();
    heap.set(process, "env", env);
    let argv = heap.sequence(vec![Some(Value::from("exval"))]);
    heap.set(process, "argv", argv);
    heap.set(process, "platform", "linux");
    methods(heap, process, &[("nextTick", 1), ("cwd", 0), ("exit", 1)]);

    let emitter_prototype = heap.object();
    let emitter = heap.native("EventEmitter", 0);
    link_constructor(heap, emitter, emitter_prototype);
    methods(heap, emitter_prototype, &[("on", 2), ("emit", 1)]);
    heap.define(process, "EventEmitter", Property::hidden(emitter));
    heap.intrinsics_mut()
        .deprecated
        .insert(process, vec!["EventEmitter"]);
}

fn install_require(heap: &mut Heap, global: ObjectId) {
    let require = heap.native("require", 1);
    heap.define(global, "require", Property::hidden(require));
    methods(heap, require, &[("resolve", 2)]);
    let cache = heap.object();
    let extensions = heap.object();
    heap.set(require, "cache", cache);
    heap.set(require, "extensions", extensions);
    heap.intrinsics_mut().host_internals = vec![cache, extensions];
}

/// A native constructor `name` installed on `holder`, linked both ways
/// with `prototype`.
fn builtin(heap: &mut Heap, holder: ObjectId, name: &str, arity: u32, prototype: ObjectId) -> ObjectId {
    let ctor = heap.native(name, arity);
    link_constructor(heap, ctor, prototype);
    heap.define(holder, name, Property::hidden(ctor));
    ctor
}

fn link_constructor(heap: &mut Heap, ctor: ObjectId, prototype: ObjectId) {
    heap.define(ctor, "prototype", Property::data(prototype, false, false, false));
    heap.define(prototype, "constructor", Property::hidden(ctor));
}

fn namespace(heap: &mut Heap, holder: ObjectId, name: &str) -> ObjectId {
    let ns = heap.object();
    heap.define(holder, name, Property::hidden(ns));
    ns
}

fn methods(heap: &mut Heap, holder: ObjectId, members: &[(&str, u32)]) {
    for (name, arity) in members {
        let f = heap.native(name, *arity);
        heap.define(holder, *name, Property::hidden(f));
    }
}
