use super::ast::{Literal, NodeId};
use super::{ArgPosition, Issue, Sink, Taint};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct VarEntry {
    pub taints: Vec<Taint>,
    pub value: Option<Literal>,
    pub variable: Option<String>,
    pub position: Option<ArgPosition>,
    pub keyword: Option<String>,
}

/// One of the seven categories a sensitive operation's first occurrence is
/// recorded under (§4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensitiveCategory {
    CommandExecution,
    Encoder,
    Decoder,
    NetworkSender,
    NetworkReceiver,
    SensitiveInfoAcquisition,
    FileOperation,
}

impl SensitiveCategory {
    pub fn from_rule_type(type_: &str) -> Option<Self> {
        match type_ {
            "command-execution" => Some(Self::CommandExecution),
            "encoder" => Some(Self::Encoder),
            "decoder" => Some(Self::Decoder),
            "network-sender" => Some(Self::NetworkSender),
            "network-receiver" => Some(Self::NetworkReceiver),
            "sensitive-info-acquisition" => Some(Self::SensitiveInfoAcquisition),
            "file-operation" => Some(Self::FileOperation),
            _ => None,
        }
    }
}

/// Per-file analyzer state (§4.4.1). Owns the arena-parallel taint/sink
/// side-tables, the namespace-scoped symbol tables, and the accumulated
/// issue list for one file.
pub struct AnalyzerState {
    pub filepath: String,
    pub imports: HashSet<String>,
    pub import_aliases: HashMap<String, String>,
    pub variables: HashMap<String, HashMap<String, VarEntry>>,
    pub constants: HashMap<String, VarEntry>,
    pub namespace_stack: Vec<String>,
    pub node_taints: HashMap<NodeId, Vec<Taint>>,
    pub node_sinks: HashMap<NodeId, Vec<Sink>>,
    pub sensitive_slots: HashMap<SensitiveCategory, (u64, Taint)>,
    pub sensitive_serial: u64,
    pub results: Vec<Issue>,
}

impl AnalyzerState {
    pub fn new(filepath: &str) -> Self {
        let mut variables = HashMap::new();
        variables.insert(String::new(), HashMap::new());
        AnalyzerState {
            filepath: filepath.to_string(),
            imports: HashSet::new(),
            import_aliases: HashMap::new(),
            variables,
            constants: HashMap::new(),
            namespace_stack: Vec::new(),
            node_taints: HashMap::new(),
            node_sinks: HashMap::new(),
            sensitive_slots: HashMap::new(),
            sensitive_serial: 0,
            results: Vec::new(),
        }
    }

    pub fn namespace(&self) -> String {
        self.namespace_stack.join(".")
    }

    pub fn push_namespace(&mut self, name: &str) {
        self.namespace_stack.push(name.to_string());
        self.variables.entry(self.namespace()).or_default();
    }

    pub fn pop_namespace(&mut self) {
        self.namespace_stack.pop();
    }

    /// Walks the namespace stack inside-out (current namespace, then each
    /// dotted prefix shortened one segment at a time, down to the module
    /// root) looking for `var`. Mirrors `_get_namespace_by_var`.
    pub fn namespace_for_var(&self, var: &str) -> Option<String> {
        let current = self.namespace();
        if self.variables.get(&current).map(|t| t.contains_key(var)).unwrap_or(false) {
            return Some(current);
        }
        for i in (0..self.namespace_stack.len()).rev() {
            let ns = self.namespace_stack[..i].join(".");
            if self.variables.get(&ns).map(|t| t.contains_key(var)).unwrap_or(false) {
                return Some(ns);
            }
        }
        None
    }

    pub fn declare_var(&mut self, var: &str, entry: VarEntry) {
        let ns = self.namespace();
        self.variables.entry(ns).or_default().insert(var.to_string(), entry);
    }

    /// Clears a target's prior bindings before an assignment, per §4.4.4
    /// ("assigning to a target first clears the target's prior taint/
    /// value/variable bindings").
    pub fn reset_var(&mut self, var: &str) {
        self.declare_var(var, VarEntry::default());
    }

    pub fn del_var(&mut self, var: &str) {
        if let Some(ns) = self.namespace_for_var(var) {
            self.variables.entry(ns).or_default().remove(var);
        }
    }

    /// Returns the resolved `variable` binding for `var`: its own
    /// `variable` field if present, else an import alias, else a bare
    /// import module name, else `None`. Mirrors `_get_variable_by_var_id`.
    pub fn variable_binding(&self, var: &str) -> Option<String> {
        match self.namespace_for_var(var) {
            Some(ns) => self.variables.get(&ns).and_then(|t| t.get(var)).and_then(|e| e.variable.clone()),
            None => {
                if let Some(path) = self.import_aliases.get(var) {
                    Some(path.clone())
                } else if self.imports.contains(var) {
                    Some(var.to_string())
                } else {
                    None
                }
            }
        }
    }

    pub fn value_of(&self, var: &str) -> Option<Literal> {
        let ns = self.namespace_for_var(var)?;
        self.variables.get(&ns).and_then(|t| t.get(var)).and_then(|e| e.value.clone())
    }

    /// The taint list currently recorded against `var`, searched the same
    /// way `value_of`/`variable_binding` are. Used to spread a variable's
    /// taints onto the `Name`/`Attribute` node that references it.
    pub fn var_taints(&self, var: &str) -> Vec<Taint> {
        let Some(ns) = self.namespace_for_var(var) else { return Vec::new() };
        self.variables.get(&ns).and_then(|t| t.get(var)).map(|e| e.taints.clone()).unwrap_or_default()
    }

    /// Sets an assign target's static value in the *current* namespace
    /// (assign targets always declare into the current scope, unlike the
    /// inside-out search `add_taint_to_var` does for an existing variable).
    pub fn set_var_value(&mut self, var: &str, value: Literal) {
        let ns = self.namespace();
        self.variables.entry(ns).or_default().entry(var.to_string()).or_default().value = Some(value);
    }

    /// Sets an assign target's `variable` binding in the current namespace.
    pub fn set_var_variable(&mut self, var: &str, variable: String) {
        let ns = self.namespace();
        self.variables.entry(ns).or_default().entry(var.to_string()).or_default().variable = Some(variable);
    }

    /// Deep-copies `src`'s entire table entry into `dest` in the current
    /// namespace. Returns false if `src` has no entry to copy.
    pub fn copy_var(&mut self, src: &str, dest: &str) -> bool {
        let Some(ns) = self.namespace_for_var(src) else { return false };
        let Some(entry) = self.variables.get(&ns).and_then(|t| t.get(src)).cloned() else {
            return false;
        };
        self.declare_var(dest, entry);
        true
    }

    pub fn add_taint_to_var(&mut self, var: &str, taint: Taint) {
        let Some(ns) = self.namespace_for_var(var) else { return };
        let entry = self.variables.entry(ns).or_default().entry(var.to_string()).or_default();
        if !entry.taints.contains(&taint) {
            entry.taints.push(taint);
        }
    }

    pub fn add_taint_to_constant(&mut self, key: &str, taint: Taint) {
        let entry = self.constants.entry(key.to_string()).or_default();
        if !entry.taints.contains(&taint) {
            entry.taints.push(taint);
        }
    }

    pub fn constant_taints(&self, key: &str) -> Vec<Taint> {
        self.constants.get(key).map(|e| e.taints.clone()).unwrap_or_default()
    }

    pub fn add_taint_to_node(&mut self, node: NodeId, taint: Taint) {
        let list = self.node_taints.entry(node).or_default();
        if !list.contains(&taint) {
            list.push(taint);
        }
    }

    pub fn add_sink_to_node(&mut self, node: NodeId, sink: Sink) {
        let list = self.node_sinks.entry(node).or_default();
        if !list.contains(&sink) {
            list.push(sink);
        }
    }

    pub fn taints_of(&self, node: NodeId) -> &[Taint] {
        self.node_taints.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn sinks_of(&self, node: NodeId) -> &[Sink] {
        self.node_sinks.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn record_sensitive_operation(&mut self, category: SensitiveCategory, taint: Taint) {
        if !self.sensitive_slots.contains_key(&category) {
            let serial = self.sensitive_serial;
            self.sensitive_slots.insert(category, (serial, taint));
        }
        self.sensitive_serial += 1;
    }

    pub fn push_issue(&mut self, issue: Issue) {
        if !self.results.contains(&issue) {
            self.results.push(issue);
        }
    }
}
