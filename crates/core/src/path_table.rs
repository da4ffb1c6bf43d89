//! Canonical path table: the shortest known access path from the root
//! environment to every composite reachable from it.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write;

use tracing::debug;

use crate::heap::{Heap, ObjectId, Value};
use crate::literal;
use crate::serializer::Options;

/// Expression re-deriving the generator prototype, which no attribute
/// walk from the global environment reaches.
pub const GENERATOR_PROTOTYPE_PATH: &str = "(function*(){})()";

/// One access step of a canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A named attribute; the first step of a path is a raw expression.
    Name(String),
    /// `[<value>]` where the key is itself an object reference.
    Computed(ObjectId),
}

impl PathStep {
    fn name_len(&self) -> usize {
        match self {
            PathStep::Name(n) => n.chars().count(),
            PathStep::Computed(_) => 0,
        }
    }
}

impl From<&str> for PathStep {
    fn from(s: &str) -> Self {
        PathStep::Name(s.to_owned())
    }
}

/// Total order on paths: fewer steps first, then fewer characters in the
/// named steps.
pub fn compare_paths(a: &[PathStep], b: &[PathStep]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        let la: usize = a.iter().map(PathStep::name_len).sum();
        let lb: usize = b.iter().map(PathStep::name_len).sum();
        la.cmp(&lb)
    })
}

/// Read-only once built; share it across any number of serializations.
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    entries: HashMap<ObjectId, Vec<PathStep>>,
}

struct Scan<'h> {
    heap: &'h Heap,
    table: PathTable,
    scanned: HashSet<ObjectId>,
    skipped: usize,
}

impl<'h> Scan<'h> {
    fn register(&mut self, id: ObjectId, path: Vec<PathStep>) {
        self.scanned.insert(id);
        self.table.entries.insert(id, path);
    }

    /// Depth-first walk in declaration order. Children are pushed in
    /// reverse so they pop in order, which visits exactly what a
    /// recursive walk would.
    fn walk(&mut self, start: ObjectId, path: Vec<PathStep>) {
        let mut stack = vec![(start, path)];
        while let Some((id, path)) = stack.pop() {
            if !self.scanned.insert(id) && !path.is_empty() {
                match self.table.entries.get(&id) {
                    Some(current) if compare_paths(&path, current) == Ordering::Less => {}
                    _ => continue,
                }
            }
            if !path.is_empty() {
                self.table.entries.insert(id, path.clone());
            }
            self.push_children(&mut stack, id, &path);
        }
    }

    fn push_children(&mut self, stack: &mut Vec<(ObjectId, Vec<PathStep>)>, id: ObjectId, path: &[PathStep]) {
        let intrinsics = self.heap.intrinsics();
        let obj = self.heap.get(id);
        let mut children = Vec::new();
        for key in obj.properties.keys() {
            if intrinsics.is_deprecated(id, key) {
                self.skipped += 1;
                continue;
            }
            // Denied reads become the null placeholder, which is not
            // walked any further.
            let value = self.heap.read(id, key).unwrap_or(Value::Null);
            if let Value::Object(child) = value {
                let mut child_path = path.to_vec();
                child_path.push(PathStep::Name(key.clone()));
                children.push((child, child_path));
            }
        }
        stack.extend(children.into_iter().rev());
    }
}

impl PathTable {
    pub fn build(heap: &Heap, options: &Options) -> PathTable {
        let intrinsics = heap.intrinsics();
        let root = options.root_environment.unwrap_or(intrinsics.global);

        let mut scanned: HashSet<ObjectId> = options.scan_ignore.iter().copied().collect();
        if options.include_host_runtime_internals {
            scanned.extend(intrinsics.host_internals.iter().copied());
        }
        let mut scan = Scan {
            heap,
            table: PathTable::default(),
            scanned,
            skipped: 0,
        };

        for (id, path) in &options.shared_objects {
            scan.register(*id, path.clone());
        }
        scan.walk(root, Vec::new());
        for (id, path) in &options.shared_objects {
            // Shared objects only found outside the root still expose
            // their members.
            if scan.table.entries.get(id) == Some(path) {
                let mut stack = Vec::new();
                scan.push_children(&mut stack, *id, path);
                while let Some((child, child_path)) = stack.pop() {
                    scan.walk(child, child_path);
                }
            }
        }
        if root == intrinsics.global {
            scan.walk(
                intrinsics.generator_prototype,
                vec![PathStep::from(GENERATOR_PROTOTYPE_PATH)],
            );
        }

        debug!(
            entries = scan.table.entries.len(),
            skipped = scan.skipped,
            "canonical path table built"
        );
        scan.table
    }

    pub fn lookup(&self, id: ObjectId) -> Option<&[PathStep]> {
        self.entries.get(&id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names every path starts from.
    pub fn heads(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .filter_map(|path| match path.first() {
                Some(PathStep::Name(name)) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every entry as rendered text, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, String)> + '_ {
        let mut rows: Vec<(ObjectId, String)> = self
            .entries
            .iter()
            .map(|(id, path)| (*id, self.render(path)))
            .collect();
        rows.sort_by(|a, b| a.1.cmp(&b.1));
        rows.into_iter()
    }

    /// Render `path` to source text. Computed steps resolve through the
    /// table itself and fall back to `[?]` when their key is unknown.
    pub fn render(&self, path: &[PathStep]) -> String {
        let mut out = String::new();
        for (i, step) in path.iter().enumerate() {
            match step {
                PathStep::Name(name) if i == 0 => out.push_str(name),
                PathStep::Name(name) => out.push_str(&literal::attribute_access(name)),
                PathStep::Computed(key) => match self.entries.get(key) {
                    Some(key_path) if key_path.as_slice() != path => {
                        let _ = write!(out, "[{}]", self.render(key_path));
                    }
                    _ => out.push_str("[?]"),
                },
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(heap: &Heap, holder: ObjectId, key: &str) -> ObjectId {
        heap.read(holder, key).ok().and_then(|v| v.as_object()).unwrap()
    }

    fn path_of(table: &PathTable, id: ObjectId) -> Option<String> {
        table.lookup(id).map(|p| table.render(p))
    }

    #[test]
    fn global_members_resolve_to_short_paths() {
        let heap = Heap::new();
        let table = PathTable::build(&heap, &Options::default());
        let g = heap.global();
        let math = member(&heap, g, "Math");
        assert_eq!(path_of(&table, math).as_deref(), Some("Math"));
        assert_eq!(path_of(&table, member(&heap, math, "pow")).as_deref(), Some("Math.pow"));

        let i = heap.intrinsics();
        assert_eq!(path_of(&table, i.object_prototype).as_deref(), Some("Object.prototype"));
        let to_string = member(&heap, i.object_prototype, "toString");
        assert_eq!(path_of(&table, to_string).as_deref(), Some("Object.prototype.toString"));
        assert_eq!(path_of(&table, i.function_prototype).as_deref(), Some("Function.prototype"));
    }

    #[test]
    fn root_is_never_published() {
        let heap = Heap::new();
        let table = PathTable::build(&heap, &Options::default());
        assert_eq!(table.lookup(heap.global()), None);
    }

    #[test]
    fn generator_bases_are_seeded() {
        let heap = Heap::new();
        let table = PathTable::build(&heap, &Options::default());
        let i = heap.intrinsics();
        assert_eq!(
            path_of(&table, i.generator_prototype).as_deref(),
            Some("(function*(){})()")
        );
        assert_eq!(
            path_of(&table, i.generator_function_prototype).as_deref(),
            Some("(function*(){})().constructor")
        );
        let next = member(&heap, i.generator_prototype, "next");
        assert_eq!(path_of(&table, next).as_deref(), Some("(function*(){})().next"));
    }

    #[test]
    fn deprecated_and_private_members_are_skipped() {
        let heap = Heap::new();
        let table = PathTable::build(&heap, &Options::default());
        let g = heap.global();
        let process = member(&heap, g, "process");
        let emitter = member(&heap, process, "EventEmitter");
        assert_eq!(table.lookup(emitter), None);

        let cache = heap.intrinsics().host_internals[0];
        assert_eq!(table.lookup(cache), None);

        let table = PathTable::build(&heap, &Options::default().include_host_runtime_internals(false));
        assert_eq!(path_of(&table, cache).as_deref(), Some("require.cache"));
    }

    #[test]
    fn shorter_paths_replace_longer_ones() {
        let mut heap = Heap::new();
        let root = heap.object();
        let deep = heap.object();
        let middle = heap.object();
        heap.set(root, "first", middle);
        heap.set(middle, "target", deep);
        heap.set(root, "t", deep);
        let table = PathTable::build(&heap, &Options::default().root_environment(root));
        assert_eq!(path_of(&table, deep).as_deref(), Some("t"));
    }

    #[test]
    fn equal_length_ties_keep_the_first_path() {
        let mut heap = Heap::new();
        let root = heap.object();
        let shared = heap.object();
        heap.set(root, "ab", shared);
        heap.set(root, "cd", shared);
        heap.set(root, "e", shared);
        let table = PathTable::build(&heap, &Options::default().root_environment(root));
        assert_eq!(path_of(&table, shared).as_deref(), Some("e"));

        let mut heap = Heap::new();
        let root = heap.object();
        let shared = heap.object();
        heap.set(root, "ab", shared);
        heap.set(root, "cd", shared);
        let table = PathTable::build(&heap, &Options::default().root_environment(root));
        assert_eq!(path_of(&table, shared).as_deref(), Some("ab"));
    }

    #[test]
    fn shared_objects_and_ignores() {
        let mut heap = Heap::new();
        let root = heap.object();
        let registry = heap.object();
        let item = heap.object();
        heap.set(registry, "item", item);
        let hidden = heap.object();
        heap.set(root, "hidden", hidden);

        let options = Options::default()
            .root_environment(root)
            .shared_object(registry, vec![PathStep::from("registry")])
            .scan_ignore(hidden);
        let table = PathTable::build(&heap, &options);
        assert_eq!(path_of(&table, registry).as_deref(), Some("registry"));
        assert_eq!(path_of(&table, item).as_deref(), Some("registry.item"));
        assert_eq!(table.lookup(hidden), None);
    }

    #[test]
    fn heads_name_where_paths_start() {
        let mut heap = Heap::new();
        let root = heap.object();
        let inner = heap.object();
        heap.set(root, "outer", inner);
        let shared = heap.object();
        let options = Options::default()
            .root_environment(root)
            .shared_object(shared, vec![PathStep::from("a")]);
        let table = PathTable::build(&heap, &options);
        let heads: Vec<String> = table.heads().into_iter().collect();
        assert_eq!(heads, vec!["a".to_owned(), "outer".to_owned()]);
    }

    #[test]
    fn paths_compare_by_steps_then_characters() {
        let short: Vec<PathStep> = vec!["Math".into()];
        let long: Vec<PathStep> = vec!["a".into(), "b".into()];
        assert_eq!(compare_paths(&short, &long), Ordering::Less);
        let wide: Vec<PathStep> = vec!["abc".into(), "d".into()];
        assert_eq!(compare_paths(&long, &wide), Ordering::Less);
        assert_eq!(compare_paths(&long, &long), Ordering::Equal);
    }

    #[test]
    fn render_quotes_odd_names() {
        let table = PathTable::default();
        let path: Vec<PathStep> = vec!["x".into(), "bar ".into(), "5".into(), "NaN".into()];
        assert_eq!(table.render(&path), "x['bar '][5].NaN");
    }
}
