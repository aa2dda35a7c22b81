use super::ast::{Ast, Literal, NodeId, NodeKind};
use super::state::AnalyzerState;
use super::ArgPosition;

/// Resolves a `Call` node's own callee to a canonical name, mirroring
/// `get_real_call`: an `Attribute` callee recurses through
/// [`resolve_ref`]; a bare `Name` callee checks the variable/import tables
/// first and falls back to the identifier itself; anything else is
/// unresolvable.
pub fn resolve_call_func(ast: &Ast, state: &AnalyzerState, call_node: NodeId) -> String {
    let NodeKind::Call { func, .. } = &ast.get(call_node).kind else {
        return String::new();
    };
    match &ast.get(*func).kind {
        NodeKind::Attribute { .. } => resolve_ref(ast, state, *func).unwrap_or_default(),
        NodeKind::Name { id, .. } => state.variable_binding(id).unwrap_or_else(|| id.clone()),
        _ => String::new(),
    }
}

/// Resolves any `Name`/`Attribute`/`Call` node to its fully-qualified
/// dotted name, mirroring `_get_attr_real_name`. The `__import__`/
/// `importlib.import_module` special case lets
/// `__import__("base64").b64decode` resolve to `base64.b64decode`.
pub fn resolve_ref(ast: &Ast, state: &AnalyzerState, node: NodeId) -> Option<String> {
    match &ast.get(node).kind {
        NodeKind::Name { id, .. } => Some(state.variable_binding(id).unwrap_or_else(|| {
            state.import_aliases.get(id).cloned().unwrap_or_else(|| id.clone())
        })),
        NodeKind::Attribute { value, attr, .. } => match resolve_ref(ast, state, *value) {
            Some(upper) => Some(format!("{upper}.{attr}")),
            None => Some(attr.clone()),
        },
        NodeKind::Call { .. } => {
            let real = resolve_call_func(ast, state, node);
            if real == "__import__" || real == "importlib.__import__" || real == "importlib.import_module" {
                resolve_import_call(ast, state, node, &real)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn resolve_import_call(ast: &Ast, state: &AnalyzerState, call_node: NodeId, func: &str) -> Option<String> {
    if func == "__import__" || func == "importlib.__import__" {
        get_call_parameter(ast, state, call_node, "name", Some(0))
    } else {
        let name = get_call_parameter(ast, state, call_node, "name", Some(0))?;
        let package = get_call_parameter(ast, state, call_node, "package", Some(1));
        Some(match package {
            Some(p) => format!("{p}{name}"),
            None => name,
        })
    }
}

fn get_call_parameter(
    ast: &Ast,
    state: &AnalyzerState,
    call_node: NodeId,
    name: &str,
    arg_index: Option<usize>,
) -> Option<String> {
    let NodeKind::Call { args, keywords, .. } = &ast.get(call_node).kind else {
        return None;
    };
    if let Some(idx) = arg_index {
        if let Some(&a) = args.get(idx) {
            return node_value(ast, state, a);
        }
    }
    for kw in keywords {
        if kw.arg.as_deref() == Some(name) {
            return node_value(ast, state, kw.value);
        }
    }
    None
}

fn node_value(ast: &Ast, state: &AnalyzerState, node: NodeId) -> Option<String> {
    match &ast.get(node).kind {
        NodeKind::Constant { value } => literal_to_string(value),
        NodeKind::Name { id, .. } => state.value_of(id).as_ref().and_then(literal_to_string),
        _ => None,
    }
}

fn literal_to_string(lit: &Literal) -> Option<String> {
    match lit {
        Literal::Str(s) => Some(s.clone()),
        Literal::Int(i) => Some(i.to_string()),
        Literal::Float(f) => Some(f.to_string()),
        Literal::Bool(b) => Some(b.to_string()),
        Literal::None => Some("None".to_string()),
        Literal::Other => None,
    }
}

/// The argument node at a descriptor's `position`/`keyword`, mirroring
/// `_get_call_arg_node`. `position` here is always a plain index (`"ret"`
/// never reaches this call — return-value binding is handled by tainting
/// the call node itself, not one of its arguments).
pub fn call_arg_node(ast: &Ast, call_node: NodeId, position: Option<&ArgPosition>, keyword: Option<&str>) -> Option<NodeId> {
    let NodeKind::Call { args, keywords, .. } = &ast.get(call_node).kind else {
        return None;
    };
    if let Some(ArgPosition::Index(p)) = position {
        if let Some(&a) = args.get(*p as usize) {
            return Some(a);
        }
    }
    if let Some(k) = keyword {
        for kw in keywords {
            if kw.arg.as_deref() == Some(k) {
                return Some(kw.value);
            }
        }
    }
    None
}
