//! JSON graph documents: a serde description of a value graph, so graphs
//! can be built outside Rust and loaded onto a [`Heap`].
//!
//! ```json
//! { "root": {"$ref": "point"},
//!   "objects": {
//!     "point": { "properties": { "x": 1, "norm": {"$ref": "norm"} } },
//!     "norm":  { "kind": "callable", "source": "function () { return 1; }" } } }
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DocumentError;
use crate::heap::{Heap, ObjectId, Property, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDocument {
    pub root: DocValue,
    #[serde(default)]
    pub objects: IndexMap<String, DocObject>,
}

/// A value inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Special(Special),
}

/// Values JSON cannot express directly, written as single-key objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Special {
    #[serde(rename = "$ref")]
    Ref(String),
    #[serde(rename = "$undefined")]
    Undefined(bool),
    /// Dotted path from the global environment, e.g. `Math.pow`.
    #[serde(rename = "$global")]
    Global(String),
    /// `NaN`, `Infinity`, `-Infinity` or `-0`.
    #[serde(rename = "$number")]
    Number(String),
    /// A fresh symbol; the description is informational only.
    #[serde(rename = "$symbol")]
    Symbol(String),
    /// An absent sequence slot.
    #[serde(rename = "$hole")]
    Hole(bool),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    #[default]
    Object,
    Sequence,
    Callable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocObject {
    #[serde(default)]
    pub kind: DocKind,
    /// Absent keeps the kind's default delegation link; `null` removes it.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub proto: Option<DocValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<DocValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, DocValue>,
    #[serde(default)]
    pub descriptors: IndexMap<String, DocDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocDescriptor {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<DocValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub get: Option<DocValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub set: Option<DocValue>,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub enumerable: bool,
    #[serde(default)]
    pub configurable: bool,
}

/// Distinguish an explicit `null` from an absent field.
fn present<'de, D>(de: D) -> Result<Option<DocValue>, D::Error>
where
    D: Deserializer<'de>,
{
    DocValue::deserialize(de).map(Some)
}

/// Parse `json` and materialize it onto `heap`, returning the root value.
pub fn load(heap: &mut Heap, json: &str) -> Result<Value, DocumentError> {
    let doc: GraphDocument = serde_json::from_str(json)?;
    materialize(heap, &doc)
}

/// Allocate every declared object, then wire attributes and links. Two
/// passes let objects reference each other in any order.
pub fn materialize(heap: &mut Heap, doc: &GraphDocument) -> Result<Value, DocumentError> {
    let mut ids: HashMap<&str, ObjectId> = HashMap::new();
    for (name, obj) in &doc.objects {
        let id = match obj.kind {
            DocKind::Object => heap.object(),
            DocKind::Sequence => {
                let len = obj.items.as_ref().map_or(0, Vec::len);
                heap.sequence(vec![None; len])
            }
            DocKind::Callable => {
                let source = obj
                    .source
                    .as_deref()
                    .ok_or_else(|| DocumentError::MissingSource(name.clone()))?;
                let id = heap.callable(source).map_err(|source| DocumentError::InvalidSource {
                    id: name.clone(),
                    source,
                })?;
                if obj.proto.is_none() && declares_base(source) {
                    return Err(DocumentError::MissingBase(name.clone()));
                }
                id
            }
        };
        ids.insert(name.as_str(), id);
    }

    let resolver = Resolver { ids: &ids };
    for (name, obj) in &doc.objects {
        let id = ids[name.as_str()];
        if let Some(proto) = &obj.proto {
            let proto = match resolver.value(heap, name, proto)? {
                Value::Null => None,
                Value::Object(p) => Some(p),
                _ => {
                    return Err(DocumentError::NotAnObject {
                        id: name.clone(),
                        what: "proto".to_owned(),
                    })
                }
            };
            heap.set_proto(id, proto);
        }

        if let Some(items) = &obj.items {
            if obj.kind != DocKind::Sequence {
                return Err(DocumentError::UnexpectedItems(name.clone()));
            }
            for (i, item) in items.iter().enumerate() {
                if matches!(item, DocValue::Special(Special::Hole(_))) {
                    continue;
                }
                let value = resolver.value(heap, name, item)?;
                heap.set(id, i.to_string(), value);
            }
        }

        for (key, value) in &obj.properties {
            let value = resolver.value(heap, name, value)?;
            heap.set(id, key.clone(), value);
        }

        for (key, desc) in &obj.descriptors {
            let property = resolver.descriptor(heap, name, key, desc)?;
            heap.define(id, key.clone(), property);
        }
    }

    resolver.value(heap, "root", &doc.root)
}

/// Whether a template source extends anything but `null`.
fn declares_base(source: &str) -> bool {
    match exval_syntax::parse(source) {
        Ok(fragment) => fragment
            .superclass
            .map_or(false, |span| span.slice(source).trim() != "null"),
        Err(_) => false,
    }
}

struct Resolver<'d> {
    ids: &'d HashMap<&'d str, ObjectId>,
}

impl Resolver<'_> {
    fn value(&self, heap: &mut Heap, owner: &str, value: &DocValue) -> Result<Value, DocumentError> {
        Ok(match value {
            DocValue::Null => Value::Null,
            DocValue::Bool(b) => Value::Bool(*b),
            DocValue::Number(n) => Value::Number(*n),
            DocValue::Str(s) => Value::Str(s.clone()),
            DocValue::Special(special) => match special {
                Special::Ref(target) => self
                    .ids
                    .get(target.as_str())
                    .map(|id| Value::Object(*id))
                    .ok_or_else(|| DocumentError::UnknownObject(target.clone()))?,
                Special::Undefined(_) => Value::Undefined,
                Special::Global(path) => Value::Object(global(heap, path)?),
                Special::Number(text) => Value::Number(special_number(text)?),
                Special::Symbol(_) => heap.symbol(),
                Special::Hole(_) => return Err(DocumentError::MisplacedHole(owner.to_owned())),
            },
        })
    }

    fn accessor(
        &self,
        heap: &mut Heap,
        owner: &str,
        what: String,
        value: &Option<DocValue>,
    ) -> Result<Option<ObjectId>, DocumentError> {
        let Some(value) = value else {
            return Ok(None);
        };
        match self.value(heap, owner, value)? {
            Value::Object(id) => Ok(Some(id)),
            Value::Undefined => Ok(None),
            _ => Err(DocumentError::NotAnObject {
                id: owner.to_owned(),
                what,
            }),
        }
    }

    fn descriptor(
        &self,
        heap: &mut Heap,
        owner: &str,
        key: &str,
        desc: &DocDescriptor,
    ) -> Result<Property, DocumentError> {
        if desc.get.is_some() || desc.set.is_some() {
            let get = self.accessor(heap, owner, format!("getter of {}", key), &desc.get)?;
            let set = self.accessor(heap, owner, format!("setter of {}", key), &desc.set)?;
            return Ok(Property::accessor(get, set, desc.enumerable, desc.configurable));
        }
        let value = match &desc.value {
            Some(v) => self.value(heap, owner, v)?,
            None => Value::Undefined,
        };
        Ok(Property::data(value, desc.writable, desc.enumerable, desc.configurable))
    }
}

fn special_number(text: &str) -> Result<f64, DocumentError> {
    match text {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "-0" => Ok(-0.0),
        other => Err(DocumentError::InvalidNumber(other.to_owned())),
    }
}

/// Follow a dotted path from the global environment.
fn global(heap: &Heap, path: &str) -> Result<ObjectId, DocumentError> {
    let mut current = heap.global();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match heap.read(current, segment) {
            Ok(Value::Object(next)) => next,
            _ => return Err(DocumentError::UnresolvedGlobal(path.to_owned())),
        };
    }
    Ok(current)
}
