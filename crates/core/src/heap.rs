//! Value heap: every composite value lives in one arena and is addressed by
//! an [`ObjectId`] handle. Identity is handle equality, so two structurally
//! equal objects are always distinct values.

use std::fmt;

use exval_syntax::{MethodKind, Shape, SyntaxError};
use indexmap::IndexMap;

use crate::error::AccessDenied;
use crate::realm::{self, Intrinsics};

// ──────────────────────────────────────────────
// Handles and values
// ──────────────────────────────────────────────

/// Opaque handle referencing an object on a [`Heap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique symbol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

/// Any serializable runtime datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Symbol(SymbolId),
    Object(ObjectId),
}

impl Value {
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) => "object",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

// ──────────────────────────────────────────────
// Attributes
// ──────────────────────────────────────────────

/// Either a plain data slot or an accessor pair, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor {
        get: Option<ObjectId>,
        set: Option<ObjectId>,
    },
}

/// One own attribute of a composite value.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable, configurable data attribute.
    pub fn plain(value: impl Into<Value>) -> Self {
        Property::data(value, true, true, true)
    }

    /// Writable, configurable, non-enumerable data attribute, the way the
    /// host runtime installs methods and `constructor` links.
    pub fn hidden(value: impl Into<Value>) -> Self {
        Property::data(value, true, false, true)
    }

    pub fn data(value: impl Into<Value>, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property {
            slot: Slot::Data {
                value: value.into(),
                writable,
            },
            enumerable,
            configurable,
        }
    }

    pub fn accessor(
        get: Option<ObjectId>,
        set: Option<ObjectId>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Property {
            slot: Slot::Accessor { get, set },
            enumerable,
            configurable,
        }
    }

    /// Default visibility and writability: a literal or an assignment
    /// recreates this attribute exactly.
    pub fn is_plain(&self) -> bool {
        matches!(self.slot, Slot::Data { writable: true, .. }) && self.enumerable && self.configurable
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data { value, .. } => Some(value),
            Slot::Accessor { .. } => None,
        }
    }
}

// ──────────────────────────────────────────────
// Objects
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// A composite record.
    Ordinary,
    /// An ordered, index-addressed composite with a `length` attribute.
    Sequence,
    /// An invocable composite with recoverable source text.
    Callable { source: String },
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    pub kind: ObjectKind,
    /// Delegation link.
    pub proto: Option<ObjectId>,
    /// Own attributes in declaration order.
    pub properties: IndexMap<String, Property>,
}

impl HeapObject {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Callable { .. })
    }

    /// Current `length` of a sequence.
    pub fn length(&self) -> Option<u32> {
        if self.kind != ObjectKind::Sequence {
            return None;
        }
        match self.get("length").and_then(Property::value) {
            Some(Value::Number(n)) => Some(*n as u32),
            _ => Some(0),
        }
    }
}

/// Parse an attribute name as a sequence index (`"0"`, `"17"`, never `"017"`).
pub fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i != u32::MAX)
}

pub(crate) fn native_source(name: &str) -> String {
    format!("function {}() {{ [native code] }}", name)
}

// ──────────────────────────────────────────────
// Heap
// ──────────────────────────────────────────────

/// Arena of composite values plus the realm of intrinsics they delegate to.
///
/// Handles are only meaningful for the heap that issued them; passing a
/// foreign handle is a programming error and panics on lookup.
#[derive(Debug, Clone)]
pub struct Heap {
    objects: Vec<HeapObject>,
    next_symbol: u32,
    intrinsics: Intrinsics,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    /// A heap holding only the realm's global environment.
    pub fn new() -> Self {
        let mut heap = Heap {
            objects: Vec::new(),
            next_symbol: 0,
            intrinsics: Intrinsics::default(),
        };
        realm::install(&mut heap);
        heap
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub(crate) fn intrinsics_mut(&mut self) -> &mut Intrinsics {
        &mut self.intrinsics
    }

    /// The realm's global environment.
    pub fn global(&self) -> ObjectId {
        self.intrinsics.global
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> &HeapObject {
        &self.objects[id.index()]
    }

    fn get_mut(&mut self, id: ObjectId) -> &mut HeapObject {
        &mut self.objects[id.index()]
    }

    pub(crate) fn alloc(&mut self, kind: ObjectKind, proto: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(HeapObject {
            kind,
            proto,
            properties: IndexMap::new(),
        });
        id
    }

    /// An empty composite delegating to the universal base object.
    pub fn object(&mut self) -> ObjectId {
        let proto = self.intrinsics.object_prototype;
        self.alloc(ObjectKind::Ordinary, Some(proto))
    }

    /// An empty composite with an explicit delegation link.
    pub fn object_with_proto(&mut self, proto: Option<ObjectId>) -> ObjectId {
        self.alloc(ObjectKind::Ordinary, proto)
    }

    /// A sequence from its slots; `None` leaves an absent slot.
    pub fn sequence<I>(&mut self, items: I) -> ObjectId
    where
        I: IntoIterator<Item = Option<Value>>,
    {
        let proto = self.intrinsics.array_prototype;
        let id = self.alloc(ObjectKind::Sequence, Some(proto));
        self.define(id, "length", Property::data(0.0, true, false, false));
        let mut len = 0u32;
        for item in items {
            if let Some(value) = item {
                self.set(id, len.to_string(), value);
            }
            len += 1;
        }
        self.set_length(id, len);
        id
    }

    /// A callable created from its source text, with the `length`, `name`
    /// and `prototype` attributes the host runtime would give it.
    pub fn callable(&mut self, source: &str) -> Result<ObjectId, SyntaxError> {
        let fragment = exval_syntax::parse(source)?;
        let proto = if fragment.is_generator {
            self.intrinsics.generator_function_prototype
        } else {
            self.intrinsics.function_prototype
        };
        let id = self.alloc(
            ObjectKind::Callable {
                source: source.to_owned(),
            },
            Some(proto),
        );

        let name = match (fragment.shape, fragment.name.as_deref()) {
            (Shape::Method(MethodKind::Getter), Some(n)) => format!("get {}", n),
            (Shape::Method(MethodKind::Setter), Some(n)) => format!("set {}", n),
            (_, n) => n.unwrap_or_default().to_owned(),
        };
        self.define(id, "length", Property::data(fragment.arity() as f64, false, false, true));
        self.define(id, "name", Property::data(name, false, false, true));

        if fragment.has_prototype() {
            let prototype = if fragment.is_generator {
                let generator_prototype = self.intrinsics.generator_prototype;
                self.object_with_proto(Some(generator_prototype))
            } else {
                let p = self.object();
                self.define(p, "constructor", Property::hidden(id));
                p
            };
            let writable = fragment.shape != Shape::Class;
            self.define(id, "prototype", Property::data(prototype, writable, false, false));
        }
        Ok(id)
    }

    /// An opaque host-native callable; its source cannot be recovered.
    pub fn native(&mut self, name: &str, arity: u32) -> ObjectId {
        let proto = self.intrinsics.function_prototype;
        let id = self.alloc(
            ObjectKind::Callable {
                source: native_source(name),
            },
            Some(proto),
        );
        self.define(id, "length", Property::data(arity as f64, false, false, true));
        self.define(id, "name", Property::data(name, false, false, true));
        id
    }

    /// A fresh symbol value.
    pub fn symbol(&mut self) -> Value {
        self.next_symbol += 1;
        Value::Symbol(SymbolId(self.next_symbol))
    }

    /// Assign `value` to `key`: overwrites the value of an existing data
    /// attribute, otherwise adds a plain attribute.
    pub fn set(&mut self, target: ObjectId, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let obj = self.get_mut(target);
        match obj.properties.get_mut(&key) {
            Some(Property {
                slot: Slot::Data { value: slot, .. },
                ..
            }) => *slot = value,
            _ => {
                obj.properties.insert(key.clone(), Property::plain(value));
            }
        }
        self.grow_length(target, &key);
    }

    /// Add or replace an attribute with an explicit descriptor.
    pub fn define(&mut self, target: ObjectId, key: impl Into<String>, property: Property) {
        let key = key.into();
        self.get_mut(target).properties.insert(key.clone(), property);
        self.grow_length(target, &key);
    }

    pub fn remove(&mut self, target: ObjectId, key: &str) -> Option<Property> {
        self.get_mut(target).properties.shift_remove(key)
    }

    pub fn set_proto(&mut self, target: ObjectId, proto: Option<ObjectId>) {
        self.get_mut(target).proto = proto;
    }

    /// Read an own attribute the way a property get would, without running
    /// code: accessors are denied, missing attributes read as `undefined`.
    pub fn read(&self, target: ObjectId, key: &str) -> Result<Value, AccessDenied> {
        match self.get(target).get(key) {
            None => Ok(Value::Undefined),
            Some(Property {
                slot: Slot::Data { value, .. },
                ..
            }) => Ok(value.clone()),
            Some(_) => Err(AccessDenied),
        }
    }

    fn grow_length(&mut self, target: ObjectId, key: &str) {
        let Some(len) = self.get(target).length() else {
            return;
        };
        if let Some(index) = array_index(key) {
            if index >= len {
                self.set_length(target, index + 1);
            }
        }
    }

    fn set_length(&mut self, target: ObjectId, len: u32) {
        if let Some(Property {
            slot: Slot::Data { value, .. },
            ..
        }) = self.get_mut(target).properties.get_mut("length")
        {
            *value = Value::Number(len as f64);
        }
    }
}
