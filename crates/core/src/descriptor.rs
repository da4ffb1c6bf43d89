//! Descriptor analysis: split one composite's own attributes into those a
//! literal or an assignment can recreate and those that need an explicit
//! descriptor.

use crate::heap::{Heap, ObjectId};

/// The attribute layout of one composite value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Delegation link, `None` when the value has no base at all.
    pub delegate: Option<ObjectId>,
    /// Every own attribute name in declaration order.
    pub own: Vec<String>,
    /// Writable, enumerable, configurable data attributes.
    pub plain: Vec<String>,
    /// Accessors and data attributes with any non-default flag.
    pub custom: Vec<String>,
    /// No base beyond the universal base object and nothing custom.
    pub is_plain: bool,
}

impl Layout {
    /// Forget `name` entirely; used once an encoder has represented it
    /// some other way.
    pub fn drop(&mut self, name: &str) {
        self.plain.retain(|n| n != name);
        self.custom.retain(|n| n != name);
    }

    pub fn has_custom(&self, name: &str) -> bool {
        self.custom.iter().any(|n| n == name)
    }
}

pub fn classify(heap: &Heap, id: ObjectId) -> Layout {
    let obj = heap.get(id);
    let mut own = Vec::with_capacity(obj.properties.len());
    let mut plain = Vec::new();
    let mut custom = Vec::new();

    for (name, prop) in &obj.properties {
        own.push(name.clone());
        // Assigning `__proto__` changes the delegation link instead of
        // creating an attribute.
        if prop.is_plain() && name != "__proto__" {
            plain.push(name.clone());
        } else {
            custom.push(name.clone());
        }
    }

    let is_plain = obj.proto == Some(heap.intrinsics().object_prototype) && custom.is_empty();
    Layout {
        delegate: obj.proto,
        own,
        plain,
        custom,
        is_plain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Property;

    #[test]
    fn plain_record() {
        let mut heap = Heap::new();
        let obj = heap.object();
        heap.set(obj, "foo", "bar");
        heap.set(obj, "n", 1.0);
        let layout = classify(&heap, obj);
        assert!(layout.is_plain);
        assert_eq!(layout.plain, vec!["foo", "n"]);
        assert!(layout.custom.is_empty());
    }

    #[test]
    fn hidden_or_readonly_attributes_are_custom() {
        let mut heap = Heap::new();
        let obj = heap.object();
        heap.set(obj, "a", 1.0);
        heap.define(obj, "b", Property::hidden(2.0));
        heap.define(obj, "c", Property::data(3.0, false, true, true));
        let layout = classify(&heap, obj);
        assert!(!layout.is_plain);
        assert_eq!(layout.own, vec!["a", "b", "c"]);
        assert_eq!(layout.plain, vec!["a"]);
        assert_eq!(layout.custom, vec!["b", "c"]);
    }

    #[test]
    fn foreign_or_missing_delegate_is_not_plain() {
        let mut heap = Heap::new();
        let base = heap.object();
        let child = heap.object_with_proto(Some(base));
        let orphan = heap.object_with_proto(None);
        assert!(!classify(&heap, child).is_plain);
        assert_eq!(classify(&heap, child).delegate, Some(base));
        assert!(!classify(&heap, orphan).is_plain);
        assert_eq!(classify(&heap, orphan).delegate, None);
    }

    #[test]
    fn own_proto_attribute_is_always_custom() {
        let mut heap = Heap::new();
        let obj = heap.object_with_proto(None);
        heap.set(obj, "__proto__", 1.0);
        let layout = classify(&heap, obj);
        assert_eq!(layout.custom, vec!["__proto__"]);
        assert!(layout.plain.is_empty());
    }

    #[test]
    fn drop_removes_from_both_lists() {
        let mut heap = Heap::new();
        let seq = heap.sequence(vec![Some(1.0.into())]);
        let mut layout = classify(&heap, seq);
        assert!(layout.has_custom("length"));
        layout.drop("length");
        layout.drop("0");
        assert!(layout.plain.is_empty());
        assert!(layout.custom.is_empty());
        assert_eq!(layout.own, vec!["length", "0"]);
    }
}
