//! Public facade: configure once, stringify many times.

use std::collections::BTreeSet;

use tracing::instrument;

use crate::assemble::{root_names, Assembler, Settings};
use crate::error::ExvalError;
use crate::heap::{Heap, ObjectId, Value};
use crate::path_table::{PathStep, PathTable};

pub const DEFAULT_SEQUENCE_GAP_LIMIT: usize = 10;
pub const DEFAULT_WORKLIST_COMPACT_THRESHOLD: usize = 1024;

/// Serializer configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Environment the canonical path scan starts from; the realm's global
    /// when unset.
    pub root_environment: Option<ObjectId>,
    /// Values registered with a caller-chosen path before the scan.
    pub shared_objects: Vec<(ObjectId, Vec<PathStep>)>,
    /// Values the scan never enters.
    pub scan_ignore: Vec<ObjectId>,
    /// Keep module-loader bookkeeping out of the path table.
    pub include_host_runtime_internals: bool,
    /// Keep the `name` attribute of named callables.
    pub preserve_callable_names: bool,
    /// A sequence with at least `min(length, limit)` gaps is emitted in
    /// sized form.
    pub sequence_gap_limit: usize,
    pub worklist_compact_threshold: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            root_environment: None,
            shared_objects: Vec::new(),
            scan_ignore: Vec::new(),
            include_host_runtime_internals: true,
            preserve_callable_names: false,
            sequence_gap_limit: DEFAULT_SEQUENCE_GAP_LIMIT,
            worklist_compact_threshold: DEFAULT_WORKLIST_COMPACT_THRESHOLD,
        }
    }
}

impl Options {
    pub fn root_environment(mut self, root: ObjectId) -> Self {
        self.root_environment = Some(root);
        self
    }

    pub fn shared_object(mut self, id: ObjectId, path: Vec<PathStep>) -> Self {
        self.shared_objects.push((id, path));
        self
    }

    pub fn scan_ignore(mut self, id: ObjectId) -> Self {
        self.scan_ignore.push(id);
        self
    }

    pub fn include_host_runtime_internals(mut self, on: bool) -> Self {
        self.include_host_runtime_internals = on;
        self
    }

    pub fn preserve_callable_names(mut self, on: bool) -> Self {
        self.preserve_callable_names = on;
        self
    }

    pub fn sequence_gap_limit(mut self, limit: usize) -> Self {
        self.sequence_gap_limit = limit;
        self
    }

    pub fn worklist_compact_threshold(mut self, threshold: usize) -> Self {
        self.worklist_compact_threshold = threshold;
        self
    }
}

/// A configured serializer. Holds the canonical path table, which is
/// immutable after construction and shared by every `stringify` call.
#[derive(Debug, Clone)]
pub struct Serializer {
    options: Options,
    paths: PathTable,
    root_names: BTreeSet<String>,
}

impl Serializer {
    /// Scan the root environment of `heap` and build the path table.
    pub fn configure(heap: &Heap, options: Options) -> Serializer {
        let paths = PathTable::build(heap, &options);
        let root = options.root_environment.unwrap_or(heap.global());
        let mut reserved = root_names(heap, root);
        reserved.extend(paths.heads());
        Serializer {
            root_names: reserved,
            options,
            paths,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Emit source text that rebuilds `value` when evaluated. `heap` must
    /// be the heap this serializer was configured with.
    #[instrument(level = "debug", skip_all)]
    pub fn stringify(&self, heap: &Heap, value: &Value) -> Result<String, ExvalError> {
        let settings = Settings {
            preserve_names: self.options.preserve_callable_names,
            gap_limit: self.options.sequence_gap_limit,
            compact_threshold: self.options.worklist_compact_threshold,
        };
        Assembler::new(heap, &self.paths, settings, &self.root_names).run(value)
    }
}
