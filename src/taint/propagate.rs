use super::ast::{Ast, Literal, NodeId, NodeKind};
use super::check::check_taint;
use super::resolve;
use super::state::AnalyzerState;
use super::{ArgPosition, Taint};
use crate::rules::{Accordance, Position, RuleSet};

/// Drives the two-phase walk described in §4.4.2: for every node, mark and
/// spread taint through its whole subtree before running the taint-sink
/// check on its direct children. Mirrors `generic_visit`'s two `for field,
/// value in ast.iter_fields(node)` loops, made explicit recursion instead
/// of iterating `ast.iter_fields`.
pub fn walk_module(ast: &mut Ast, state: &mut AnalyzerState, rules: &RuleSet) {
    walk(ast, state, rules, ast.root);
}

fn walk(ast: &mut Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    let children = ast.get(node).children.clone();
    for &child in &children {
        pre_visit(ast, state, child);
        visit(ast, state, rules, child);
        walk(ast, state, rules, child);
        post_visit(ast, state, child);
    }
    for &child in &children {
        check_taint(ast, state, rules, child);
    }
}

fn pre_visit(ast: &mut Ast, state: &mut AnalyzerState, node: NodeId) {
    let n = ast.get(node);
    let taint = Taint::universal(n.lineno, n.col_offset, n.end_lineno, n.end_col_offset);
    ast.get_mut(node).namespace = state.namespace();
    state.add_taint_to_node(node, taint);
}

fn visit(ast: &mut Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    let kind_snapshot = ast.get(node).kind.clone_shallow();
    match kind_snapshot {
        ShallowKind::Import => visit_import(ast, state, node),
        ShallowKind::ImportFrom => visit_import_from(ast, state, node),
        ShallowKind::ClassDef => {
            let name = { let NodeKind::ClassDef { name } = &ast.get(node).kind else { unreachable!() }; name.clone() };
            state.push_namespace(&name);
        }
        ShallowKind::FunctionDef => {
            let (name, params) = {
                let NodeKind::FunctionDef { name, params } = &ast.get(node).kind else { unreachable!() };
                (name.clone(), params.clone())
            };
            state.push_namespace(&name);
            for p in &params {
                state.declare_var(
                    &p.name,
                    super::state::VarEntry {
                        position: p.position.map(ArgPosition::Index),
                        keyword: p.keyword.clone(),
                        ..Default::default()
                    },
                );
                state.add_taint_to_var(&p.name, input_taint());
            }
        }
        ShallowKind::Assign => visit_assign(ast, state, node),
        ShallowKind::Call => mark_spread_taint(ast, state, rules, node),
        ShallowKind::Constant => mark_spread_taint(ast, state, rules, node),
        ShallowKind::Name { store, del } => {
            let id = { let NodeKind::Name { id, .. } = &ast.get(node).kind else { unreachable!() }; id.clone() };
            if del {
                state.del_var(&id);
            } else if !store {
                mark_spread_taint(ast, state, rules, node);
            }
        }
        ShallowKind::Attribute { store } => {
            if !store {
                mark_spread_taint(ast, state, rules, node);
            }
        }
        ShallowKind::WithItem => visit_withitem(ast, state, node),
        ShallowKind::Other => {}
    }
}

fn post_visit(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    if matches!(ast.get(node).kind, NodeKind::ClassDef { .. } | NodeKind::FunctionDef { .. }) {
        state.pop_namespace();
    }
}

fn input_taint() -> Taint {
    Taint {
        rule_id: "0000".to_string(),
        accordance: Accordance::Type,
        type_: Some("input".to_string()),
        function: None,
        attribute: None,
        position: None,
        keyword: None,
        lineno: -1,
        col_offset: -1,
        end_lineno: -1,
        end_col_offset: -1,
    }
}

fn visit_import(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    let NodeKind::Import { names } = &ast.get(node).kind else { return };
    for alias in names {
        if let Some(asname) = &alias.asname {
            state.import_aliases.insert(asname.clone(), alias.name.clone());
        }
        state.imports.insert(alias.name.clone());
    }
}

fn visit_import_from(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    let NodeKind::ImportFrom { module, names } = &ast.get(node).kind else { return };
    let Some(module) = module else {
        // `from . import xxx`: relative imports with no resolvable module
        // fall back to plain-import handling, matching `visit_ImportFrom`.
        for alias in names {
            if let Some(asname) = &alias.asname {
                state.import_aliases.insert(asname.clone(), alias.name.clone());
            }
            state.imports.insert(alias.name.clone());
        }
        return;
    };
    for alias in names {
        let member = format!("{module}.{}", alias.name);
        match &alias.asname {
            Some(asname) => {
                state.import_aliases.insert(asname.clone(), member.clone());
            }
            None => {
                state.import_aliases.insert(alias.name.clone(), member.clone());
            }
        }
        state.imports.insert(member);
    }
}

fn visit_assign(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    let (targets, value) = {
        let NodeKind::Assign { targets, value } = &ast.get(node).kind else { return };
        (targets.clone(), *value)
    };
    let target_names = assign_target_names(ast, state, &targets);

    for name in &target_names {
        state.reset_var(name);
    }

    match &ast.get(value).kind {
        NodeKind::Constant { value: lit } => {
            let lit = lit.clone();
            for name in &target_names {
                state.set_var_value(name, lit.clone());
            }
        }
        NodeKind::Name { id, .. } => {
            let id = id.clone();
            if let Some(lit) = state.value_of(&id) {
                for name in &target_names {
                    state.set_var_value(name, lit.clone());
                }
            } else {
                let mut copy_failed = false;
                for name in &target_names {
                    if !state.copy_var(&id, name) {
                        copy_failed = true;
                        break;
                    }
                }
                if copy_failed {
                    if let Some(variable) = state.variable_binding(&id) {
                        for name in &target_names {
                            state.set_var_variable(name, variable.clone());
                        }
                    }
                }
            }
        }
        NodeKind::Attribute { .. } => {
            if let Some(attribute) = resolve::resolve_ref(ast, state, value) {
                for name in &target_names {
                    state.set_var_variable(name, attribute.clone());
                }
            }
        }
        _ => {}
    }
}

fn visit_withitem(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    let NodeKind::WithItem { optional_var, .. } = &ast.get(node).kind else { return };
    let Some(ov) = optional_var else { return };
    if let NodeKind::Name { id, store, .. } = &ast.get(*ov).kind {
        if *store {
            state.reset_var(id);
        }
    }
}

fn mark_spread_taint(ast: &Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    mark_taint(ast, state, rules, node);
    spread_taint(ast, state, node);
}

fn mark_taint(ast: &Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    match &ast.get(node).kind {
        NodeKind::Call { .. } => mark_taint_call(ast, state, rules, node),
        NodeKind::Name { id, .. } => mark_taint_name(state, node, &id.clone()),
        NodeKind::Constant { value } => mark_taint_constant(state, node, &value.clone()),
        NodeKind::Attribute { .. } => mark_taint_attribute(ast, state, rules, node),
        _ => {}
    }
}

fn node_loc(ast: &Ast, node: NodeId) -> (i32, i32, i32, i32) {
    let n = ast.get(node);
    (n.lineno, n.col_offset, n.end_lineno, n.end_col_offset)
}

fn to_arg_position(p: &Position) -> ArgPosition {
    match p {
        Position::Index(i) => ArgPosition::Index(*i),
        Position::Return => ArgPosition::Return,
    }
}

fn mark_taint_call(ast: &Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    let real_call = resolve::resolve_call_func(ast, state, node);
    let (lineno, col_offset, end_lineno, end_col_offset) = node_loc(ast, node);

    for rule in rules.rules_for_function(&real_call) {
        let rule_id = rule.id.clone();
        let rule_type = rule.type_.clone();
        for t in &rule.taints {
            if t.accordance != Accordance::Function || t.function.as_deref() != Some(real_call.as_str()) {
                continue;
            }
            let taint = Taint {
                rule_id: rule_id.clone(),
                accordance: Accordance::Function,
                type_: if rule_type.is_empty() { None } else { Some(rule_type.clone()) },
                function: Some(real_call.clone()),
                attribute: None,
                position: t.position.as_ref().map(to_arg_position),
                keyword: t.keyword.clone(),
                lineno,
                col_offset,
                end_lineno,
                end_col_offset,
            };

            if !rule_type.is_empty() {
                if let Some(category) = super::state::SensitiveCategory::from_rule_type(&rule_type) {
                    state.record_sensitive_operation(category, taint.clone());
                }
            }

            if t.position == Some(Position::Return) {
                state.add_taint_to_node(node, taint);
                continue;
            }

            let arg_position = t.position.as_ref().map(to_arg_position);
            if let Some(arg_node) = resolve::call_arg_node(ast, node, arg_position.as_ref(), t.keyword.as_deref()) {
                match &ast.get(arg_node).kind {
                    NodeKind::Name { id, .. } => state.add_taint_to_var(&id.clone(), taint),
                    NodeKind::Attribute { .. } => {
                        if let Some(name) = resolve::resolve_ref(ast, state, arg_node) {
                            state.add_taint_to_var(&name, taint);
                        }
                    }
                    NodeKind::Constant { value } => {
                        let key = value.key();
                        state.add_taint_to_constant(&key, taint);
                    }
                    _ => {}
                }
            }
        }

        for s in &rule.sinks {
            if s.accordance != Accordance::Function || s.function != real_call {
                continue;
            }
            let sink = super::Sink {
                rule_id: rule_id.clone(),
                accordance: Accordance::Function,
                function: real_call.clone(),
                type_: rule_type.clone(),
                position: s.position.as_ref().map(to_arg_position),
                keyword: s.keyword.clone(),
                lineno,
                col_offset,
                end_lineno,
                end_col_offset,
            };
            state.add_sink_to_node(node, sink);
        }
    }
}

fn mark_taint_name(state: &mut AnalyzerState, node: NodeId, id: &str) {
    for t in state.var_taints(id) {
        state.add_taint_to_node(node, t);
    }
}

fn mark_taint_constant(state: &mut AnalyzerState, node: NodeId, lit: &Literal) {
    for t in state.constant_taints(&lit.key()) {
        state.add_taint_to_node(node, t);
    }
}

fn mark_taint_attribute(ast: &Ast, state: &mut AnalyzerState, rules: &RuleSet, node: NodeId) {
    let Some(real_attr) = resolve::resolve_ref(ast, state, node) else { return };

    for t in state.var_taints(&real_attr) {
        state.add_taint_to_node(node, t);
    }

    let (lineno, col_offset, end_lineno, end_col_offset) = node_loc(ast, node);
    for rule in rules.rules_for_attribute(&real_attr) {
        for t in &rule.taints {
            if t.accordance == Accordance::Attribute
                && t.attribute.as_deref() == Some(real_attr.as_str())
                && t.position == Some(Position::Return)
            {
                state.add_taint_to_node(
                    node,
                    Taint {
                        rule_id: rule.id.clone(),
                        accordance: Accordance::Attribute,
                        type_: if rule.type_.is_empty() { None } else { Some(rule.type_.clone()) },
                        function: None,
                        attribute: Some(real_attr.clone()),
                        position: Some(ArgPosition::Return),
                        keyword: None,
                        lineno,
                        col_offset,
                        end_lineno,
                        end_col_offset,
                    },
                );
            }
        }
    }
}

/// Resolves the dotted/tuple/list assign-target list of an `Assign` node's
/// `targets`, mirroring `_get_assign_single_target_list`.
fn assign_target_names(ast: &Ast, state: &AnalyzerState, targets: &[NodeId]) -> Vec<String> {
    let mut out = Vec::new();
    for &t in targets {
        collect_target(ast, state, t, &mut out);
    }
    out
}

fn collect_target(ast: &Ast, state: &AnalyzerState, node: NodeId, out: &mut Vec<String>) {
    match &ast.get(node).kind {
        NodeKind::Name { id, .. } => out.push(id.clone()),
        NodeKind::Tuple { elts, .. } | NodeKind::List { elts, .. } => {
            for &e in elts {
                collect_target(ast, state, e, out);
            }
        }
        NodeKind::Attribute { .. } => {
            if let Some(name) = resolve::resolve_ref(ast, state, node) {
                out.push(name);
            }
        }
        _ => {}
    }
}

/// Propagates a node's non-universal taints to its parent, stopping at a
/// namespace boundary or the module root. `Assign`/`WithItem` nodes also
/// fan their own accumulated taints out to the bound variable(s) first.
/// Mirrors `spread_taint`'s recursive walk up the parent chain.
fn spread_taint(ast: &Ast, state: &mut AnalyzerState, node: NodeId) {
    match &ast.get(node).kind {
        NodeKind::Assign { targets, .. } => {
            let targets = targets.clone();
            let names = assign_target_names(ast, state, &targets);
            let taints: Vec<Taint> = state.taints_of(node).iter().filter(|t| !t.is_universal()).cloned().collect();
            for name in &names {
                for t in &taints {
                    state.add_taint_to_var(name, t.clone());
                }
            }
        }
        NodeKind::WithItem { optional_var, .. } => {
            if let Some(ov) = optional_var {
                if let NodeKind::Name { id, store, .. } = &ast.get(*ov).kind {
                    if *store {
                        let id = id.clone();
                        let taints: Vec<Taint> =
                            state.taints_of(node).iter().filter(|t| !t.is_universal()).cloned().collect();
                        for t in taints {
                            state.add_taint_to_var(&id, t);
                        }
                    }
                }
            }
        }
        _ => {}
    }

    let n = ast.get(node);
    let Some(parent) = n.parent else { return };
    let parent_node = ast.get(parent);
    if matches!(parent_node.kind, NodeKind::Module) || n.namespace != parent_node.namespace {
        return;
    }
    let node_lineno = n.lineno;

    let taints: Vec<Taint> = state.taints_of(node).to_vec();
    for t in taints {
        if t.is_universal() {
            continue;
        }
        // An argument-position binding taint created on this exact line
        // (e.g. `os.system(cmd)` tainting `cmd`) doesn't re-propagate past
        // the line that created it — only return-value taints without a
        // keyword do.
        let skip_same_line = t.position != Some(ArgPosition::Return) || t.keyword.is_some();
        if skip_same_line && t.lineno == node_lineno {
            continue;
        }
        state.add_taint_to_node(parent, t);
    }

    spread_taint(ast, state, parent);
}

/// A cheap discriminant-only view of `NodeKind`, just enough to route
/// `visit` without holding a borrow of `ast.get(node).kind` across the
/// mutation each arm performs.
enum ShallowKind {
    Import,
    ImportFrom,
    ClassDef,
    FunctionDef,
    Assign,
    Call,
    Name { store: bool, del: bool },
    Attribute { store: bool },
    Constant,
    WithItem,
    Other,
}

trait CloneShallow {
    fn clone_shallow(&self) -> ShallowKind;
}

impl CloneShallow for NodeKind {
    fn clone_shallow(&self) -> ShallowKind {
        match self {
            NodeKind::Import { .. } => ShallowKind::Import,
            NodeKind::ImportFrom { .. } => ShallowKind::ImportFrom,
            NodeKind::ClassDef { .. } => ShallowKind::ClassDef,
            NodeKind::FunctionDef { .. } => ShallowKind::FunctionDef,
            NodeKind::Assign { .. } => ShallowKind::Assign,
            NodeKind::Call { .. } => ShallowKind::Call,
            NodeKind::Name { store, del, .. } => ShallowKind::Name { store: *store, del: *del },
            NodeKind::Attribute { store, .. } => ShallowKind::Attribute { store: *store },
            NodeKind::Constant { .. } => ShallowKind::Constant,
            NodeKind::WithItem { .. } => ShallowKind::WithItem,
            NodeKind::Module | NodeKind::Tuple { .. } | NodeKind::List { .. } | NodeKind::With { .. } | NodeKind::Other => {
                ShallowKind::Other
            }
        }
    }
}
