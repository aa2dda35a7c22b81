use super::ast::{Ast, NodeId, NodeKind};
use super::resolve;
use super::state::AnalyzerState;
use super::{Issue, Sink, Taint};
use crate::rules::{Accordance, RuleSet};

/// Phase-B of the walk (§4.4.6): for a `Call` node, match its accumulated
/// sinks against every non-classification rule's sink descriptors, then
/// for each match look up the taint state of the sink's own argument node
/// and match against the rule's taint descriptors, emitting an `Issue` for
/// every (taint, sink) pair that agrees on the rule's discriminator field.
/// Mirrors `check_taint`.
pub fn check_taint(ast: &Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    if !matches!(ast.get(node).kind, NodeKind::Call { .. }) {
        return;
    }

    let sinks: Vec<Sink> = state.sinks_of(node).to_vec();
    if sinks.is_empty() {
        return;
    }
    let filepath = state.filepath.clone();

    for rule in rules.rules.values() {
        if rule.is_taint_only() {
            continue;
        }

        for sink_rule in &rule.sinks {
            let sink_key: &str = match sink_rule.accordance {
                Accordance::Function | Accordance::Attribute => &sink_rule.function,
                Accordance::Type => &sink_rule.type_,
            };

            for sink in sinks.iter().filter(|s| s.accordance == sink_rule.accordance && s.discriminator() == sink_key) {
                let Some(arg_node) = resolve::call_arg_node(ast, node, sink.position.as_ref(), sink.keyword.as_deref())
                else {
                    continue;
                };
                let arg_taints: Vec<Taint> = state.taints_of(arg_node).to_vec();

                for taint_rule in &rule.taints {
                    let Some(taint_key) = taint_rule.key() else { continue };
                    for t in arg_taints
                        .iter()
                        .filter(|t| t.accordance == taint_rule.accordance && t.discriminator() == taint_key)
                    {
                        let severity = taint_rule.severity.max(sink_rule.severity);
                        let confidence = taint_rule.confidence.max(sink_rule.confidence);
                        let message = rule
                            .template
                            .replace("{SINK}", sink.discriminator())
                            .replace("{TAINT}", t.discriminator());

                        state.push_issue(Issue {
                            rule_id: rule.id.clone(),
                            name: rule.name.clone(),
                            taint: t.clone(),
                            sink: sink.clone(),
                            severity,
                            confidence,
                            message,
                            file_path: filepath.clone(),
                        });
                    }
                }
            }
        }
    }
}
