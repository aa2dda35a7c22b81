pub mod file_rules;
pub mod rule;

use crate::error::{RepoWardenError, Result};
use rule::Rule;
use std::collections::HashMap;
use std::path::Path;

pub use file_rules::FileRules;
pub use rule::{Accordance, Position, SinkDescriptor, TaintDescriptor};

/// All loaded rules, pre-indexed by accordance and key so a single AST
/// node visit costs O(1) per descriptor class instead of O(#rules).
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: HashMap<String, Rule>,
    by_function: HashMap<String, Vec<String>>,
    by_attribute: HashMap<String, Vec<String>>,
    by_type: HashMap<String, Vec<String>>,
}

impl RuleSet {
    fn index(&mut self) {
        self.by_function.clear();
        self.by_attribute.clear();
        self.by_type.clear();
        for rule in self.rules.values() {
            for taint in &rule.taints {
                if let Some(key) = taint.key() {
                    let bucket = match taint.accordance {
                        Accordance::Function => &mut self.by_function,
                        Accordance::Attribute => &mut self.by_attribute,
                        Accordance::Type => &mut self.by_type,
                    };
                    bucket.entry(key.to_string()).or_default().push(rule.id.clone());
                }
            }
            for sink in &rule.sinks {
                let bucket = match sink.accordance {
                    Accordance::Function => &mut self.by_function,
                    Accordance::Attribute => &mut self.by_attribute,
                    Accordance::Type => &mut self.by_type,
                };
                if !sink.function.is_empty() {
                    bucket.entry(sink.function.clone()).or_default().push(rule.id.clone());
                }
            }
        }
    }

    pub fn rules_for_function(&self, name: &str) -> Vec<&Rule> {
        self.by_function
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.rules.get(id))
            .collect()
    }

    pub fn rules_for_attribute(&self, name: &str) -> Vec<&Rule> {
        self.by_attribute
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.rules.get(id))
            .collect()
    }

    pub fn rules_for_type(&self, name: &str) -> Vec<&Rule> {
        self.by_type
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.rules.get(id))
            .collect()
    }
}

/// Loads rules from a directory (one rule document per regular file) or a
/// single file. A bad top-level path is a configuration error (fatal at
/// startup); a document missing `id` is silently skipped.
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let mut set = RuleSet::default();

    if path.is_dir() {
        let entries = std::fs::read_dir(path)
            .map_err(|e| RepoWardenError::Config(format!("cannot read rule dir {path:?}: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| RepoWardenError::Config(e.to_string()))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                load_rule_file(&entry.path(), &mut set)?;
            }
        }
    } else if path.is_file() {
        load_rule_file(path, &mut set)?;
    } else {
        return Err(RepoWardenError::Config(format!(
            "rule path {path:?} is neither a file nor a directory"
        )));
    }

    set.index();
    Ok(set)
}

/// A genuine YAML syntax error is a fatal configuration error and propagates.
/// A document missing `id` is silently skipped, matching `load_rule`'s own
/// `"id" not in rule` check. A document that parses as YAML, carries an
/// `id`, but fails to deserialize into a well-formed rule (bad `accordance`,
/// malformed `position`, ...) is a per-rule descriptor error: logged and
/// dropped, the rest of the rule set still loads.
fn load_rule_file(path: &Path, set: &mut RuleSet) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RepoWardenError::Config(format!("cannot read rule file {path:?}: {e}")))?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| RepoWardenError::Config(format!("malformed YAML in rule file {path:?}: {e}")))?;

    if value.get("id").is_none() {
        log::debug!("skipping rule file {path:?}: no \"id\" field");
        return Ok(());
    }

    match serde_yaml::from_value::<Rule>(value) {
        Ok(rule) => {
            set.rules.insert(rule.id.clone(), rule);
            Ok(())
        }
        Err(e) => {
            let err = RepoWardenError::RuleDescriptor(format!("{path:?}: {e}"));
            log::warn!("dropping rule {path:?}: {err}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_rule_missing_id() {
        let dir = tempdir();
        let mut f = std::fs::File::create(dir.join("bad.yml")).unwrap();
        writeln!(f, "name: no id here").unwrap();
        let set = load_rules(&dir).unwrap();
        assert!(set.rules.is_empty());
    }

    #[test]
    fn loads_and_indexes_a_function_taint() {
        let dir = tempdir();
        let mut f = std::fs::File::create(dir.join("input.yml")).unwrap();
        writeln!(
            f,
            "id: \"0001\"\nname: input\ntaints:\n  - accordance: function\n    function: input\n    position: ret\n"
        )
        .unwrap();
        let set = load_rules(&dir).unwrap();
        assert_eq!(set.rules_for_function("input").len(), 1);
    }

    #[test]
    fn malformed_yaml_is_fatal() {
        let dir = tempdir();
        let mut f = std::fs::File::create(dir.join("broken.yml")).unwrap();
        writeln!(f, "id: \"0001\"\n  name: not valid yaml indentation").unwrap();
        assert!(load_rules(&dir).is_err());
    }

    #[test]
    fn bad_descriptor_is_dropped_not_fatal() {
        let dir = tempdir();
        let mut bad = std::fs::File::create(dir.join("bad_accordance.yml")).unwrap();
        writeln!(bad, "id: \"0002\"\nname: bad\ntaints:\n  - accordance: nonsense\n    function: foo\n").unwrap();
        let mut good = std::fs::File::create(dir.join("good.yml")).unwrap();
        writeln!(
            good,
            "id: \"0001\"\nname: input\ntaints:\n  - accordance: function\n    function: input\n    position: ret\n"
        )
        .unwrap();
        let set = load_rules(&dir).unwrap();
        assert!(!set.rules.contains_key("0002"));
        assert_eq!(set.rules_for_function("input").len(), 1);
    }

    fn tempdir() -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("repowarden-test-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
