//! Value encoder: turns one value into a token stream of literal text and
//! embedded references to other values. References are resolved later by
//! the assembler, which decides what gets inlined and what gets a name.

use std::collections::BTreeSet;

use exval_syntax::Shape;

use crate::callable;
use crate::descriptor::{classify, Layout};
use crate::error::ExvalError;
use crate::heap::{Heap, ObjectId, ObjectKind, Property, Slot, Value};
use crate::literal;
use crate::path_table::{PathStep, PathTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    /// An embedded reference to another value.
    Ref(ObjectId),
    /// The temporary bound by an assignment scope.
    Scratch,
}

/// Token builder that merges adjacent text.
#[derive(Debug, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        TokenStream::default()
    }

    pub fn text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Token::Text(last)) = self.tokens.last_mut() {
            last.push_str(s);
        } else {
            self.tokens.push(Token::Text(s.to_owned()));
        }
    }

    pub fn reference(&mut self, id: ObjectId) {
        self.tokens.push(Token::Ref(id));
    }

    pub fn scratch(&mut self) {
        self.tokens.push(Token::Scratch);
    }

    pub fn extend(&mut self, tokens: Vec<Token>) {
        for token in tokens {
            match token {
                Token::Text(s) => self.text(&s),
                other => self.tokens.push(other),
            }
        }
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

/// Every object embedded in `tokens`, in order.
pub fn refs(tokens: &[Token]) -> impl Iterator<Item = ObjectId> + '_ {
    tokens.iter().filter_map(|t| match t {
        Token::Ref(id) => Some(*id),
        _ => None,
    })
}

#[cfg(test)]
pub(crate) fn render_plain(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            Token::Text(s) => s.clone(),
            Token::Ref(id) => format!("<{}>", id),
            Token::Scratch => "t".to_owned(),
        })
        .collect()
}

/// The structural encoding of one object.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub tokens: Vec<Token>,
    /// What to declare while the object is still being built, should it
    /// turn out to be part of a cycle.
    pub placeholder: Vec<Token>,
    /// Own attributes of the placeholder that patching it must not replace.
    pub keep: Vec<String>,
}

pub struct Encoder<'a> {
    heap: &'a Heap,
    paths: &'a PathTable,
    preserve_names: bool,
    gap_limit: usize,
    /// Identifiers seen in any encoded callable's source.
    pub identifiers: BTreeSet<String>,
}

impl<'a> Encoder<'a> {
    pub fn new(heap: &'a Heap, paths: &'a PathTable, preserve_names: bool, gap_limit: usize) -> Self {
        Encoder {
            heap,
            paths,
            preserve_names,
            gap_limit,
            identifiers: BTreeSet::new(),
        }
    }

    /// Encode `value`. Objects become a bare reference when `embedded`,
    /// otherwise their canonical path or their structure.
    pub fn encode(&mut self, value: &Value, embedded: bool) -> Result<Vec<Token>, ExvalError> {
        let text = match value {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => literal::number(*n),
            Value::Str(s) => literal::text(s),
            Value::Symbol(_) => {
                return Err(ExvalError::UnsupportedValueKind { kind: "symbol" });
            }
            Value::Object(id) if embedded => return Ok(vec![Token::Ref(*id)]),
            Value::Object(id) => {
                if let Some(path) = self.path(*id) {
                    return Ok(path);
                }
                return self.structure(*id).map(|e| e.tokens);
            }
        };
        Ok(vec![Token::Text(text)])
    }

    /// The canonical path to `id` as tokens, if it has one.
    pub fn path(&self, id: ObjectId) -> Option<Vec<Token>> {
        let path = self.paths.lookup(id)?;
        let mut out = TokenStream::new();
        for (i, step) in path.iter().enumerate() {
            match step {
                PathStep::Name(name) if i == 0 => out.text(name),
                PathStep::Name(name) => out.text(&literal::attribute_access(name)),
                PathStep::Computed(key) => {
                    out.text("[");
                    out.reference(*key);
                    out.text("]");
                }
            }
        }
        Some(out.into_tokens())
    }

    /// Rebuild `id` from its structure, ignoring any canonical path.
    pub fn structure(&mut self, id: ObjectId) -> Result<Encoded, ExvalError> {
        let heap = self.heap;
        match &heap.get(id).kind {
            ObjectKind::Ordinary => self.composite(id),
            ObjectKind::Sequence => self.sequence(id),
            ObjectKind::Callable { source } => self.callable(id, source),
        }
    }

    fn composite(&mut self, id: ObjectId) -> Result<Encoded, ExvalError> {
        let mut layout = classify(self.heap, id);
        let placeholder = vec![Token::Text("{}".to_owned())];
        if layout.is_plain {
            let tokens = self.literal(id, &layout.plain)?;
            return Ok(Encoded {
                tokens,
                placeholder,
                keep: Vec::new(),
            });
        }

        let mut base = TokenStream::new();
        base.text("Object.create(");
        self.delegate(&mut base, layout.delegate);
        if !layout.custom.is_empty() {
            base.text(",");
            base.extend(self.descriptors(id, &layout.custom)?);
        }
        base.text(")");
        layout.custom.clear();
        let tokens = self.finish(base.into_tokens(), id, &layout, None)?;
        Ok(Encoded {
            tokens,
            placeholder,
            keep: Vec::new(),
        })
    }

    fn sequence(&mut self, id: ObjectId) -> Result<Encoded, ExvalError> {
        let heap = self.heap;
        let obj = heap.get(id);
        let len = obj.length().unwrap_or(0);
        let mut layout = classify(self.heap, id);
        layout.drop("length");

        let slot = |i: u32| obj.get(&i.to_string());
        let gaps = (0..len)
            .filter(|i| match slot(*i) {
                None => true,
                Some(p) => p.value() == Some(&Value::Undefined),
            })
            .count();
        let dense = len == 0 || gaps < (len as usize).min(self.gap_limit);

        let mut out = TokenStream::new();
        if dense {
            out.text("[");
            let mut trailing_hole = false;
            for i in 0..len {
                if i > 0 {
                    out.text(",");
                }
                trailing_hole = true;
                if let Some(prop) = slot(i).filter(|p| p.is_plain()) {
                    if let Some(value) = prop.value() {
                        out.extend(self.encode(value, true)?);
                        trailing_hole = false;
                        layout.drop(&i.to_string());
                    }
                }
            }
            if trailing_hole {
                out.text(",");
            }
            out.text("]");
        } else {
            out.text(&format!("new Array({})", len));
        }

        let rebase = if layout.delegate == Some(heap.intrinsics().array_prototype) {
            None
        } else {
            Some(layout.delegate)
        };
        let tokens = self.finish(out.into_tokens(), id, &layout, rebase)?;
        Ok(Encoded {
            tokens,
            placeholder: vec![Token::Text("[]".to_owned())],
            keep: Vec::new(),
        })
    }

    fn callable(&mut self, id: ObjectId, source: &str) -> Result<Encoded, ExvalError> {
        let fragment = callable::recover(source)?;
        self.identifiers.extend(fragment.identifiers.iter().cloned());

        let mut layout = classify(self.heap, id);
        let base = callable::base(self.heap, source, &fragment, layout.delegate)?;
        let fragment_tokens = callable::render(source, &fragment, base);
        let had_prototype = layout.plain.iter().chain(&layout.custom).any(|n| n == "prototype");
        let rebase = callable::trim(self.heap, id, &fragment, &mut layout, self.preserve_names);

        // A dropped default `prototype` is recreated by the placeholder
        // fragment too, and that one points back at the placeholder.
        let mut keep = Vec::new();
        let trimmed = !layout.plain.iter().chain(&layout.custom).any(|n| n == "prototype");
        if had_prototype && trimmed && fragment.shape != Shape::Class {
            keep.push("prototype".to_owned());
        }

        let tokens = self.finish(fragment_tokens.clone(), id, &layout, rebase)?;
        Ok(Encoded {
            tokens,
            placeholder: fragment_tokens,
            keep,
        })
    }

    /// `{k:v,...}` over the listed plain attributes.
    fn literal(&mut self, id: ObjectId, names: &[String]) -> Result<Vec<Token>, ExvalError> {
        let heap = self.heap;
        let obj = heap.get(id);
        let mut out = TokenStream::new();
        out.text("{");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                out.text(",");
            }
            out.text(&literal::map_key(name));
            out.text(":");
            let value = obj.get(name).and_then(Property::value).unwrap_or(&Value::Undefined);
            out.extend(self.encode(value, true)?);
        }
        out.text("}");
        Ok(out.into_tokens())
    }

    fn delegate(&self, out: &mut TokenStream, delegate: Option<ObjectId>) {
        match delegate {
            Some(d) if d == self.heap.intrinsics().object_prototype => out.text("Object.prototype"),
            Some(d) => out.reference(d),
            None => out.text("null"),
        }
    }

    /// `{name:{value:v,writable:true},...}`; flags that are false are the
    /// host runtime's default and left out.
    fn descriptors(&mut self, id: ObjectId, names: &[String]) -> Result<Vec<Token>, ExvalError> {
        let heap = self.heap;
        let obj = heap.get(id);
        let mut out = TokenStream::new();
        out.text("{");
        for (i, name) in names.iter().enumerate() {
            let Some(prop) = obj.get(name) else {
                continue;
            };
            if i > 0 {
                out.text(",");
            }
            // A literal `__proto__` key, quoted or not, sets the map's own
            // delegation link instead.
            if name == "__proto__" {
                out.text("['__proto__']");
            } else {
                out.text(&literal::map_key(name));
            }
            out.text(":{");
            let mut fields: Vec<Vec<Token>> = Vec::new();
            match &prop.slot {
                Slot::Data { value, writable } => {
                    let mut field = vec![Token::Text("value:".to_owned())];
                    field.extend(self.encode(value, true)?);
                    fields.push(field);
                    if *writable {
                        fields.push(vec![Token::Text("writable:true".to_owned())]);
                    }
                }
                Slot::Accessor { get, set } => {
                    if let Some(g) = get {
                        fields.push(vec![Token::Text("get:".to_owned()), Token::Ref(*g)]);
                    }
                    if let Some(s) = set {
                        fields.push(vec![Token::Text("set:".to_owned()), Token::Ref(*s)]);
                    }
                }
            }
            if prop.enumerable {
                fields.push(vec![Token::Text("enumerable:true".to_owned())]);
            }
            if prop.configurable {
                fields.push(vec![Token::Text("configurable:true".to_owned())]);
            }
            for (j, field) in fields.into_iter().enumerate() {
                if j > 0 {
                    out.text(",");
                }
                out.extend(field);
            }
            out.text("}");
        }
        out.text("}");
        Ok(out.into_tokens())
    }

    /// Apply what the base expression does not express yet: custom
    /// descriptors, then the delegation link, then plain assignments.
    fn finish(
        &mut self,
        base: Vec<Token>,
        id: ObjectId,
        layout: &Layout,
        rebase: Option<Option<ObjectId>>,
    ) -> Result<Vec<Token>, ExvalError> {
        let mut tokens = base;

        if !layout.custom.is_empty() {
            let mut out = TokenStream::new();
            out.text("Object.defineProperties(");
            out.extend(tokens);
            out.text(",");
            out.extend(self.descriptors(id, &layout.custom)?);
            out.text(")");
            tokens = out.into_tokens();
        }

        if let Some(delegate) = rebase {
            let mut out = TokenStream::new();
            out.text("Object.setPrototypeOf(");
            out.extend(tokens);
            out.text(",");
            self.delegate(&mut out, delegate);
            out.text(")");
            tokens = out.into_tokens();
        }

        if !layout.plain.is_empty() {
            let heap = self.heap;
            let obj = heap.get(id);
            let mut out = TokenStream::new();
            out.text("function(");
            out.scratch();
            out.text("){");
            for name in &layout.plain {
                let value = obj.get(name).and_then(Property::value).unwrap_or(&Value::Undefined);
                out.scratch();
                out.text(&literal::attribute_access(name));
                out.text("=");
                out.extend(self.encode(value, true)?);
                out.text(";");
            }
            out.text("return ");
            out.scratch();
            out.text("}(");
            out.extend(tokens);
            out.text(")");
            tokens = out.into_tokens();
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Options;

    fn structure(heap: &Heap, id: ObjectId) -> String {
        let paths = PathTable::build(heap, &Options::default());
        let mut encoder = Encoder::new(heap, &paths, false, 10);
        render_plain(&encoder.structure(id).unwrap().tokens)
    }

    #[test]
    fn token_stream_merges_text() {
        let mut s = TokenStream::new();
        s.text("a");
        s.text("b");
        s.reference(ObjectId::default());
        s.text("");
        s.text("c");
        assert_eq!(
            s.into_tokens(),
            vec![
                Token::Text("ab".to_owned()),
                Token::Ref(ObjectId::default()),
                Token::Text("c".to_owned()),
            ]
        );
    }

    #[test]
    fn primitives() {
        let heap = Heap::new();
        let paths = PathTable::default();
        let mut encoder = Encoder::new(&heap, &paths, false, 10);
        let text = |e: &mut Encoder, v: Value| render_plain(&e.encode(&v, false).unwrap());
        assert_eq!(text(&mut encoder, Value::Undefined), "undefined");
        assert_eq!(text(&mut encoder, Value::Null), "null");
        assert_eq!(text(&mut encoder, Value::Bool(true)), "true");
        assert_eq!(text(&mut encoder, Value::Number(-1.5)), "-1.5");
        assert_eq!(text(&mut encoder, Value::from("x")), "'x'");
    }

    #[test]
    fn symbols_fail_fast() {
        let mut heap = Heap::new();
        let sym = heap.symbol();
        let paths = PathTable::default();
        let mut encoder = Encoder::new(&heap, &paths, false, 10);
        let err = encoder.encode(&sym, true).unwrap_err();
        assert_eq!(err, ExvalError::UnsupportedValueKind { kind: "symbol" });
    }

    #[test]
    fn embedded_objects_are_references() {
        let mut heap = Heap::new();
        let obj = heap.object();
        let paths = PathTable::default();
        let mut encoder = Encoder::new(&heap, &paths, false, 10);
        assert_eq!(encoder.encode(&Value::Object(obj), true).unwrap(), vec![Token::Ref(obj)]);
    }

    #[test]
    fn plain_composite_literal() {
        let mut heap = Heap::new();
        let obj = heap.object();
        let inner = heap.object();
        heap.set(obj, "foo", "bar");
        heap.set(obj, "deep", inner);
        heap.set(obj, "a-b", 1.0);
        assert_eq!(structure(&heap, obj), format!("{{foo:'bar',deep:<{}>,'a-b':1}}", inner));
    }

    #[test]
    fn composite_with_custom_attributes() {
        let mut heap = Heap::new();
        let obj = heap.object();
        heap.define(obj, "hidden", Property::data(1.0, false, false, true));
        heap.set(obj, "shown", 2.0);
        assert_eq!(
            structure(&heap, obj),
            "function(t){t.shown=2;return t}(Object.create(Object.prototype,{hidden:{value:1,configurable:true}}))"
        );
    }

    #[test]
    fn composite_without_delegate() {
        let mut heap = Heap::new();
        let obj = heap.object_with_proto(None);
        assert_eq!(structure(&heap, obj), "Object.create(null)");
    }

    #[test]
    fn composite_with_accessor() {
        let mut heap = Heap::new();
        let getter = heap.callable("get x() { return 1; }").unwrap();
        let obj = heap.object();
        heap.define(obj, "x", Property::accessor(Some(getter), None, true, true));
        assert_eq!(
            structure(&heap, obj),
            format!("Object.create(Object.prototype,{{x:{{get:<{}>,enumerable:true,configurable:true}}}})", getter)
        );
    }

    #[test]
    fn sequences_keep_holes() {
        let mut heap = Heap::new();
        let seq = heap.sequence(vec![Some(1.0.into()), None, Some(3.0.into())]);
        assert_eq!(structure(&heap, seq), "[1,,3]");
        let trailing = heap.sequence(vec![Some(1.0.into()), None]);
        assert_eq!(structure(&heap, trailing), "[1,,]");
        let empty = heap.sequence(Vec::new());
        assert_eq!(structure(&heap, empty), "[]");
    }

    #[test]
    fn sparse_sequence_uses_sized_form() {
        let mut heap = Heap::new();
        let mut items = vec![None; 11];
        items[3] = Some(Value::from("x"));
        let seq = heap.sequence(items);
        assert_eq!(structure(&heap, seq), "function(t){t[3]='x';return t}(new Array(11))");
    }

    #[test]
    fn density_boundary() {
        let mut heap = Heap::new();
        let mut ten_gaps = vec![None; 10];
        ten_gaps.push(Some(Value::from(1.0)));
        let seq = heap.sequence(ten_gaps);
        assert!(structure(&heap, seq).contains("new Array(11)"));

        let mut nine_gaps = vec![Some(Value::Undefined); 9];
        nine_gaps.push(Some(Value::from(1.0)));
        nine_gaps.push(Some(Value::from(2.0)));
        let seq = heap.sequence(nine_gaps);
        assert_eq!(
            structure(&heap, seq),
            "[undefined,undefined,undefined,undefined,undefined,undefined,undefined,undefined,undefined,1,2]"
        );
    }

    #[test]
    fn sequence_extras() {
        let mut heap = Heap::new();
        let seq = heap.sequence(vec![Some(1.0.into())]);
        heap.set(seq, "label", "x");
        heap.define(seq, "frozen", Property::data(true, false, false, false));
        assert_eq!(
            structure(&heap, seq),
            "function(t){t.label='x';return t}(Object.defineProperties([1],{frozen:{value:true}}))"
        );
    }

    #[test]
    fn callable_with_extra_attributes() {
        let mut heap = Heap::new();
        let f = heap.callable("function tagged() { return 1; }").unwrap();
        heap.set(f, "tag", "x");
        assert_eq!(structure(&heap, f), "function(t){t.tag='x';return t}(function(){ return 1; })");
    }

    #[test]
    fn callable_with_preserved_name() {
        let mut heap = Heap::new();
        let f = heap.callable("function tagged() {}").unwrap();
        let paths = PathTable::default();
        let mut encoder = Encoder::new(&heap, &paths, true, 10);
        assert_eq!(
            render_plain(&encoder.structure(f).unwrap().tokens),
            "Object.defineProperties(function(){},{name:{value:'tagged',configurable:true}})"
        );
        assert!(encoder.identifiers.contains("tagged"));
    }

    #[test]
    fn native_callable_is_rejected() {
        let heap = Heap::new();
        let math = heap.read(heap.global(), "Math").unwrap().as_object().unwrap();
        let pow = heap.read(math, "pow").unwrap().as_object().unwrap();
        let paths = PathTable::default();
        let mut encoder = Encoder::new(&heap, &paths, false, 10);
        assert_eq!(encoder.structure(pow).unwrap_err().kind(), "UnparseableCallable");
    }

    #[test]
    fn canonical_values_short_circuit() {
        let heap = Heap::new();
        let paths = PathTable::build(&heap, &Options::default());
        let mut encoder = Encoder::new(&heap, &paths, false, 10);
        let proto = Value::Object(heap.intrinsics().object_prototype);
        assert_eq!(render_plain(&encoder.encode(&proto, false).unwrap()), "Object.prototype");
    }
}
