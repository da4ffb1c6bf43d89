//! Reference graph builder and assembler.
//!
//! COUNTING walks every value the root embeds breadth-first, encoding each
//! once and counting how often it is referenced. BUILDING then expands the
//! root depth-first: values referenced once are inlined, values referenced
//! more often get a binding. A binding revisited while its own text is
//! still being built closes a cycle; it is declared as an empty
//! placeholder and patched in place once everything else exists.
//! Declarations are emitted in dependency order; a binding caught in a
//! dependency cycle is turned into a placeholder too.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::encoder::{refs, Encoder, Token};
use crate::error::ExvalError;
use crate::heap::{Heap, ObjectId, Value};
use crate::literal;
use crate::path_table::PathTable;

/// Transfers the delegation link and every own attribute of `s` onto `t`.
/// Attributes listed in `k`, and attributes of `t` that can no longer be
/// redefined, are left alone.
pub const COPY_HELPER: &str = "function(t,s,k){\
Object.setPrototypeOf(t,Object.getPrototypeOf(s));\
Object.getOwnPropertyNames(s).forEach(function(n){\
var d=Object.getOwnPropertyDescriptor(t,n);\
if((!k||k.indexOf(n)<0)&&(!d||d.configurable||d.writable))Object.defineProperty(t,n,Object.getOwnPropertyDescriptor(s,n))\
})}";

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const RESERVED_WORDS: &[&str] = &[
    "abstract", "arguments", "await", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "debugger", "default", "delete", "do", "double", "else",
    "enum", "eval", "export", "extends", "false", "final", "finally", "float", "for",
    "function", "goto", "if", "implements", "import", "in", "instanceof", "int", "interface",
    "let", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "typeof", "var", "void", "volatile", "while", "with", "yield",
    "undefined", "NaN", "Infinity", "Object", "Array",
];

/// Base-52 name for `index`: 0 is `a`, 51 is `Z`, 52 is `ba`.
pub fn binding_name(index: usize) -> String {
    let base = ALPHABET.len();
    let mut chars = Vec::new();
    let mut i = index;
    loop {
        let pos = i % base;
        chars.push(ALPHABET[pos] as char);
        i = (i - pos) / base;
        if i == 0 {
            break;
        }
    }
    chars.iter().rev().collect()
}

/// Hands out binding names that collide with nothing the output can see.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    next: usize,
    taken: BTreeSet<String>,
}

impl NameAllocator {
    pub fn new<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut taken: BTreeSet<String> = RESERVED_WORDS.iter().map(|w| w.to_string()).collect();
        taken.extend(extra);
        NameAllocator { next: 0, taken }
    }

    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_owned());
    }

    pub fn allocate(&mut self) -> String {
        loop {
            let name = binding_name(self.next);
            self.next += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    InProgress,
    Done,
}

#[derive(Debug)]
struct Record {
    count: usize,
    tokens: Vec<Token>,
    placeholder: Vec<Token>,
    keep: Vec<String>,
    state: State,
    circular: bool,
    /// Expanded text, once bound.
    text: String,
    /// Bindings the expanded text names.
    deps: Vec<ObjectId>,
}

/// Knobs for one assembly run.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub preserve_names: bool,
    pub gap_limit: usize,
    pub compact_threshold: usize,
}

pub struct Assembler<'a> {
    encoder: Encoder<'a>,
    records: HashMap<ObjectId, Record>,
    /// Canonical values, already rendered as path tokens.
    canonical: HashMap<ObjectId, Vec<Token>>,
    hoisted: Vec<ObjectId>,
    compact_threshold: usize,
    names: HashMap<ObjectId, String>,
    allocator: NameAllocator,
    scratch: Option<String>,
    /// Bindings in the order their text was finished.
    bound: Vec<ObjectId>,
    /// Bindings named by each expansion in progress.
    frames: Vec<Vec<ObjectId>>,
    /// Expanded placeholders of circular bindings, with the bindings they name.
    placeholders: HashMap<ObjectId, (String, Vec<ObjectId>)>,
}

impl<'a> Assembler<'a> {
    pub fn new(heap: &'a Heap, paths: &'a PathTable, settings: Settings, reserved: &BTreeSet<String>) -> Self {
        Assembler {
            encoder: Encoder::new(heap, paths, settings.preserve_names, settings.gap_limit),
            records: HashMap::new(),
            canonical: HashMap::new(),
            hoisted: Vec::new(),
            compact_threshold: settings.compact_threshold.max(1),
            names: HashMap::new(),
            allocator: NameAllocator::new(reserved.iter().cloned()),
            scratch: None,
            bound: Vec::new(),
            frames: Vec::new(),
            placeholders: HashMap::new(),
        }
    }

    /// Serialize `value` to one self-contained expression.
    pub fn run(mut self, value: &Value) -> Result<String, ExvalError> {
        let root = self.encoder.encode(value, true)?;
        self.count(&root)?;

        for ident in std::mem::take(&mut self.encoder.identifiers) {
            self.allocator.reserve(&ident);
        }

        let root_text = self.expand(&root)?;
        debug!(
            records = self.records.len(),
            canonical = self.canonical.len(),
            hoisted = self.hoisted.len(),
            bound = self.bound.len(),
            "value graph assembled"
        );
        self.wrap(root_text)
    }

    // ──────────────────────────────────────────────
    // COUNTING
    // ──────────────────────────────────────────────

    fn count(&mut self, root: &[Token]) -> Result<(), ExvalError> {
        let mut queue: Vec<ObjectId> = Vec::new();
        let mut head = 0usize;
        self.visit(root, &mut queue)?;

        while head < queue.len() {
            let id = queue[head];
            head += 1;
            let tokens = match self.records.get(&id) {
                Some(record) => record.tokens.clone(),
                None => return Err(ExvalError::ReferenceNotFound(id)),
            };
            self.visit(&tokens, &mut queue)?;

            if head >= self.compact_threshold {
                queue.drain(..head);
                head = 0;
            }
        }
        Ok(())
    }

    fn visit(&mut self, tokens: &[Token], queue: &mut Vec<ObjectId>) -> Result<(), ExvalError> {
        for id in refs(tokens) {
            if self.canonical.contains_key(&id) {
                continue;
            }
            if let Some(record) = self.records.get_mut(&id) {
                record.count += 1;
                if record.count == 2 {
                    trace!(object = %id, "hoisting shared value");
                    self.hoisted.push(id);
                }
                continue;
            }
            if let Some(path) = self.encoder.path(id) {
                let nested: Vec<ObjectId> = refs(&path).collect();
                self.canonical.insert(id, path);
                for key in nested {
                    self.visit(&[Token::Ref(key)], queue)?;
                }
                continue;
            }
            let encoded = self.encoder.structure(id)?;
            // A template placeholder names its base as well, so the base
            // always ends up as one shared binding.
            let placeholder_refs: Vec<Token> = refs(&encoded.placeholder).map(Token::Ref).collect();
            self.records.insert(
                id,
                Record {
                    count: 1,
                    tokens: encoded.tokens,
                    placeholder: encoded.placeholder,
                    keep: encoded.keep,
                    state: State::Pending,
                    circular: false,
                    text: String::new(),
                    deps: Vec::new(),
                },
            );
            queue.push(id);
            self.visit(&placeholder_refs, queue)?;
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // BUILDING
    // ──────────────────────────────────────────────

    fn expand(&mut self, tokens: &[Token]) -> Result<String, ExvalError> {
        let mut out = String::new();
        for token in tokens {
            match token {
                Token::Text(s) => out.push_str(s),
                Token::Scratch => {
                    if self.scratch.is_none() {
                        self.scratch = Some(self.allocator.allocate());
                    }
                    out.push_str(self.scratch.as_deref().unwrap_or("t"));
                }
                Token::Ref(id) => {
                    let text = self.reference(*id)?;
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }

    fn reference(&mut self, id: ObjectId) -> Result<String, ExvalError> {
        if let Some(path) = self.canonical.get(&id).cloned() {
            return self.expand(&path);
        }
        let record = self.records.get(&id).ok_or(ExvalError::ReferenceNotFound(id))?;
        if record.count >= 2 {
            let name = self.bind(id)?;
            if let Some(frame) = self.frames.last_mut() {
                frame.push(id);
            }
            return Ok(name);
        }
        // A value referenced once can only be re-entered through a
        // placeholder, which expands it a second time from scratch.
        if record.state == State::InProgress {
            return Err(ExvalError::ReferenceNotFound(id));
        }
        let tokens = record.tokens.clone();
        self.set_state(id, State::InProgress);
        let text = self.expand(&tokens)?;
        self.set_state(id, State::Done);
        Ok(text)
    }

    fn bind(&mut self, id: ObjectId) -> Result<String, ExvalError> {
        let name = match self.names.get(&id) {
            Some(name) => name.clone(),
            None => {
                let name = self.allocator.allocate();
                self.names.insert(id, name.clone());
                name
            }
        };

        let record = self.records.get_mut(&id).ok_or(ExvalError::ReferenceNotFound(id))?;
        match record.state {
            State::Done => return Ok(name),
            State::InProgress => {
                if !record.circular {
                    trace!(object = %id, binding = %name, "cycle closed");
                }
                record.circular = true;
                return Ok(name);
            }
            State::Pending => record.state = State::InProgress,
        }
        let tokens = record.tokens.clone();
        let (text, deps) = self.expand_frame(&tokens)?;

        let record = self.records.get_mut(&id).ok_or(ExvalError::ReferenceNotFound(id))?;
        record.state = State::Done;
        record.text = text;
        record.deps = deps;
        self.bound.push(id);
        Ok(name)
    }

    /// Expand `tokens`, collecting the bindings they name.
    fn expand_frame(&mut self, tokens: &[Token]) -> Result<(String, Vec<ObjectId>), ExvalError> {
        self.frames.push(Vec::new());
        let text = self.expand(tokens);
        let deps = self.frames.pop().unwrap_or_default();
        Ok((text?, deps))
    }

    fn set_state(&mut self, id: ObjectId, state: State) {
        if let Some(record) = self.records.get_mut(&id) {
            record.state = state;
        }
    }

    fn is_circular(&self, id: ObjectId) -> bool {
        self.records.get(&id).map_or(false, |r| r.circular)
    }

    /// Bindings that must be declared before `id`: those its placeholder
    /// names when it is patched later, those its text names otherwise.
    fn dependencies(&mut self, id: ObjectId) -> Result<Vec<ObjectId>, ExvalError> {
        let record = self.records.get(&id).ok_or(ExvalError::ReferenceNotFound(id))?;
        if !record.circular {
            return Ok(record.deps.clone());
        }
        if let Some((_, deps)) = self.placeholders.get(&id) {
            return Ok(deps.clone());
        }
        let placeholder = record.placeholder.clone();
        let (text, deps) = self.expand_frame(&placeholder)?;
        self.placeholders.insert(id, (text, deps.clone()));
        Ok(deps)
    }

    /// Declaration order for every binding. A binding whose text would
    /// need one declared after it is declared as a placeholder instead
    /// and patched once all declarations exist.
    fn declaration_order(&mut self) -> Result<Vec<ObjectId>, ExvalError> {
        loop {
            let bound = self.bound.clone();
            let mut graph = HashMap::with_capacity(bound.len());
            for id in &bound {
                graph.insert(*id, self.dependencies(*id)?);
            }
            let cycle = match topological(&bound, &graph) {
                Ok(order) => return Ok(order),
                Err(cycle) => cycle,
            };
            let demoted = cycle
                .iter()
                .copied()
                .find(|id| !self.is_circular(*id))
                .ok_or(ExvalError::ReferenceNotFound(cycle[0]))?;
            trace!(object = %demoted, "declaration cycle broken");
            if let Some(record) = self.records.get_mut(&demoted) {
                record.circular = true;
            }
        }
    }

    fn wrap(mut self, root: String) -> Result<String, ExvalError> {
        if self.bound.is_empty() {
            return Ok(root);
        }
        let order = self.declaration_order()?;

        let mut vars: Vec<String> = Vec::with_capacity(order.len() + 1);
        for id in &order {
            let name = self.names.get(id).ok_or(ExvalError::ReferenceNotFound(*id))?;
            let record = self.records.get(id).ok_or(ExvalError::ReferenceNotFound(*id))?;
            let text = if record.circular {
                self.placeholders.get(id).map(|(text, _)| text).ok_or(ExvalError::ReferenceNotFound(*id))?
            } else {
                &record.text
            };
            vars.push(format!("{}={}", name, text));
        }

        let mut patches = String::new();
        if self.bound.iter().any(|id| self.is_circular(*id)) {
            let helper = self.allocator.allocate();
            vars.push(format!("{}={}", helper, COPY_HELPER));
            for id in &self.bound {
                let Some(record) = self.records.get(id).filter(|r| r.circular) else {
                    continue;
                };
                let name = self.names.get(id).ok_or(ExvalError::ReferenceNotFound(*id))?;
                if record.keep.is_empty() {
                    patches.push_str(&format!("{}({},{});", helper, name, record.text));
                } else {
                    let keep: Vec<String> = record.keep.iter().map(|k| literal::text(k)).collect();
                    patches.push_str(&format!("{}({},{},[{}]);", helper, name, record.text, keep.join(",")));
                }
            }
        }

        Ok(format!("function(){{var {};{}return {}}}()", vars.join(","), patches, root))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order `nodes` so each follows everything it depends on. A dependency
/// cycle comes back as the nodes along it.
fn topological(nodes: &[ObjectId], graph: &HashMap<ObjectId, Vec<ObjectId>>) -> Result<Vec<ObjectId>, Vec<ObjectId>> {
    let mut marks: HashMap<ObjectId, Mark> = HashMap::with_capacity(nodes.len());
    let mut order = Vec::with_capacity(nodes.len());
    let none = Vec::new();

    for &start in nodes {
        if marks.contains_key(&start) {
            continue;
        }
        marks.insert(start, Mark::Visiting);
        let mut stack: Vec<(ObjectId, usize)> = vec![(start, 0)];
        while let Some(top) = stack.last_mut() {
            let (id, next) = *top;
            let edges = graph.get(&id).unwrap_or(&none);
            if next == edges.len() {
                stack.pop();
                marks.insert(id, Mark::Done);
                order.push(id);
                continue;
            }
            top.1 += 1;
            let dep = edges[next];
            if dep == id || !graph.contains_key(&dep) {
                continue;
            }
            match marks.get(&dep) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => {
                    let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                    return Err(stack[from..].iter().map(|(n, _)| *n).collect());
                }
                None => {
                    marks.insert(dep, Mark::Visiting);
                    stack.push((dep, 0));
                }
            }
        }
    }
    Ok(order)
}

/// Own attribute names of the root environment; generated names must not
/// shadow them.
pub fn root_names(heap: &Heap, root: ObjectId) -> BTreeSet<String> {
    heap.get(root).properties.keys().cloned().collect()
}
