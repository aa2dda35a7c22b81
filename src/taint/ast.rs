use crate::error::{RepoWardenError, Result};
use rustpython_ast as py;
use rustpython_parser::{source_code::LineIndex, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub position: Option<u32>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordArg {
    pub arg: Option<String>,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct ImportAlias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    Other,
}

impl Literal {
    /// A stable string key for the constants table, keyed by the literal's
    /// value per §4.4.1 ("constants: mapping literal-value -> taints").
    /// Distinct literal kinds never collide (each carries a type tag).
    pub fn key(&self) -> String {
        match self {
            Literal::Str(s) => format!("s:{s}"),
            Literal::Int(i) => format!("i:{i}"),
            Literal::Float(f) => format!("f:{f}"),
            Literal::Bool(b) => format!("b:{b}"),
            Literal::None => "n:".to_string(),
            Literal::Other => "o:".to_string(),
        }
    }
}

/// The minimal tagged sum over AST kinds the analyzer actually branches on
/// (Design Notes §9, "dynamic dispatch on node kind"). Everything this
/// crate doesn't special-case collapses into `Other`, still walked for its
/// children but never itself marked/propagated/checked.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Module,
    FunctionDef { name: String, params: Vec<Param> },
    ClassDef { name: String },
    Import { names: Vec<ImportAlias> },
    ImportFrom { module: Option<String>, names: Vec<ImportAlias> },
    Assign { targets: Vec<NodeId>, value: NodeId },
    Call { func: NodeId, args: Vec<NodeId>, keywords: Vec<KeywordArg> },
    Name { id: String, store: bool, del: bool },
    Attribute { value: NodeId, attr: String, store: bool },
    Constant { value: Literal },
    Tuple { elts: Vec<NodeId>, store: bool },
    List { elts: Vec<NodeId>, store: bool },
    With { items: Vec<NodeId> },
    WithItem { context_expr: NodeId, optional_var: Option<NodeId> },
    Other,
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Filled in during traversal (empty until `propagate::walk_module` visits it).
    pub namespace: String,
    pub lineno: i32,
    pub col_offset: i32,
    pub end_lineno: i32,
    pub end_col_offset: i32,
    pub kind: NodeKind,
    /// All direct AST children, in source order, for the generic pre-order
    /// walk. Semantically-typed fields in `kind` index into the same arena.
    pub children: Vec<NodeId>,
}

/// An arena of AST nodes addressed by index, built in one translation pass
/// over `rustpython_parser::parse`'s output (Design Notes §9, "cyclic AST
/// annotations... implement with an arena of AST nodes addressed by
/// index").
pub struct Ast {
    pub nodes: Vec<AstNode>,
    pub root: NodeId,
}

impl Ast {
    pub fn parse(source: &str, filepath: &str) -> Result<Ast> {
        let parsed = rustpython_parser::parse(source, Mode::Module, filepath)
            .map_err(|e| RepoWardenError::Parse(format!("{filepath}: {e}")))?;
        let module = match parsed {
            py::Mod::Module(m) => m,
            _ => {
                return Err(RepoWardenError::Parse(format!(
                    "{filepath}: expected a module"
                )))
            }
        };

        let line_index = LineIndex::from_source_text(source);
        let mut builder = Builder { nodes: Vec::new(), source, line_index };
        let root = builder.push(NodeKind::Module, None, Default::default(), |b, id| {
            module.body.iter().map(|s| b.stmt(s, id)).collect()
        });
        Ok(Ast { nodes: builder.nodes, root })
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0 as usize]
    }
}

struct Builder<'a> {
    nodes: Vec<AstNode>,
    source: &'a str,
    line_index: LineIndex,
}

impl<'a> Builder<'a> {
    fn push(
        &mut self,
        kind: NodeKind,
        parent: Option<NodeId>,
        range: rustpython_parser::text_size::TextRange,
        children: impl FnOnce(&mut Self, NodeId) -> Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let (lineno, col_offset) = self.locate(range.start());
        let (end_lineno, end_col_offset) = self.locate(range.end());
        self.nodes.push(AstNode {
            id,
            parent,
            namespace: String::new(),
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
            kind,
            children: Vec::new(),
        });
        let kids = children(self, id);
        self.nodes[id.0 as usize].children = kids;
        id
    }

    fn locate(&self, offset: rustpython_parser::text_size::TextSize) -> (i32, i32) {
        let loc = self.line_index.source_location(offset, self.source);
        (loc.row.get() as i32, loc.column.to_zero_indexed() as i32)
    }

    fn stmt(&mut self, stmt: &py::Stmt, parent: NodeId) -> NodeId {
        use py::Stmt::*;
        match stmt {
            FunctionDef(f) => self.push(
                NodeKind::FunctionDef { name: f.name.to_string(), params: params_of(&f.args) },
                Some(parent),
                f.range,
                |b, id| f.body.iter().map(|s| b.stmt(s, id)).collect(),
            ),
            AsyncFunctionDef(f) => self.push(
                NodeKind::FunctionDef { name: f.name.to_string(), params: params_of(&f.args) },
                Some(parent),
                f.range,
                |b, id| f.body.iter().map(|s| b.stmt(s, id)).collect(),
            ),
            ClassDef(c) => self.push(
                NodeKind::ClassDef { name: c.name.to_string() },
                Some(parent),
                c.range,
                |b, id| c.body.iter().map(|s| b.stmt(s, id)).collect(),
            ),
            Import(i) => self.push(
                NodeKind::Import { names: alias_list(&i.names) },
                Some(parent),
                i.range,
                |_, _| Vec::new(),
            ),
            ImportFrom(i) => self.push(
                NodeKind::ImportFrom {
                    module: i.module.as_ref().map(|m| m.to_string()),
                    names: alias_list(&i.names),
                },
                Some(parent),
                i.range,
                |_, _| Vec::new(),
            ),
            Assign(a) => self.push(
                NodeKind::Other,
                Some(parent),
                a.range,
                |b, id| {
                    let targets: Vec<NodeId> = a.targets.iter().map(|t| b.expr(t, id)).collect();
                    let value = b.expr(&a.value, id);
                    b.nodes[id.0 as usize].kind = NodeKind::Assign { targets: targets.clone(), value };
                    let mut kids = targets;
                    kids.push(value);
                    kids
                },
            ),
            With(w) => self.push(NodeKind::Other, Some(parent), w.range, |b, id| {
                let items: Vec<NodeId> = w.items.iter().map(|it| b.withitem(it, id)).collect();
                b.nodes[id.0 as usize].kind = NodeKind::With { items: items.clone() };
                let mut kids = items;
                kids.extend(w.body.iter().map(|s| b.stmt(s, id)));
                kids
            }),
            AsyncWith(w) => self.push(NodeKind::Other, Some(parent), w.range, |b, id| {
                let items: Vec<NodeId> = w.items.iter().map(|it| b.withitem(it, id)).collect();
                b.nodes[id.0 as usize].kind = NodeKind::With { items: items.clone() };
                let mut kids = items;
                kids.extend(w.body.iter().map(|s| b.stmt(s, id)));
                kids
            }),
            Expr(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.value, id)]
            }),
            Return(r) => self.push(NodeKind::Other, Some(parent), r.range, |b, id| {
                r.value.as_ref().map(|v| vec![b.expr(v, id)]).unwrap_or_default()
            }),
            If(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids = vec![b.expr(&s.test, id)];
                kids.extend(s.body.iter().map(|x| b.stmt(x, id)));
                kids.extend(s.orelse.iter().map(|x| b.stmt(x, id)));
                kids
            }),
            While(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids = vec![b.expr(&s.test, id)];
                kids.extend(s.body.iter().map(|x| b.stmt(x, id)));
                kids.extend(s.orelse.iter().map(|x| b.stmt(x, id)));
                kids
            }),
            For(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids = vec![b.expr(&s.target, id), b.expr(&s.iter, id)];
                kids.extend(s.body.iter().map(|x| b.stmt(x, id)));
                kids.extend(s.orelse.iter().map(|x| b.stmt(x, id)));
                kids
            }),
            AsyncFor(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids = vec![b.expr(&s.target, id), b.expr(&s.iter, id)];
                kids.extend(s.body.iter().map(|x| b.stmt(x, id)));
                kids.extend(s.orelse.iter().map(|x| b.stmt(x, id)));
                kids
            }),
            Try(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids: Vec<NodeId> = s.body.iter().map(|x| b.stmt(x, id)).collect();
                for h in &s.handlers {
                    let py::ExceptHandler::ExceptHandler(h) = h;
                    kids.extend(h.body.iter().map(|x| b.stmt(x, id)));
                }
                kids.extend(s.orelse.iter().map(|x| b.stmt(x, id)));
                kids.extend(s.finalbody.iter().map(|x| b.stmt(x, id)));
                kids
            }),
            AugAssign(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                vec![b.expr(&s.target, id), b.expr(&s.value, id)]
            }),
            AnnAssign(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                let mut kids = vec![b.expr(&s.target, id)];
                if let Some(v) = &s.value {
                    kids.push(b.expr(v, id));
                }
                kids
            }),
            Raise(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                s.exc.as_ref().map(|e| vec![b.expr(e, id)]).unwrap_or_default()
            }),
            Assert(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                vec![b.expr(&s.test, id)]
            }),
            Delete(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                s.targets.iter().map(|t| b.expr(t, id)).collect()
            }),
            other => {
                let range = stmt_fallback_range(other);
                self.push(NodeKind::Other, Some(parent), range, |_, _| Vec::new())
            }
        }
    }

    fn withitem(&mut self, item: &py::WithItem, parent: NodeId) -> NodeId {
        let range = item.context_expr.range();
        self.push(NodeKind::Other, Some(parent), range, |b, id| {
            let ctx = b.expr(&item.context_expr, id);
            let opt = item.optional_vars.as_ref().map(|v| b.expr(v, id));
            b.nodes[id.0 as usize].kind = NodeKind::WithItem { context_expr: ctx, optional_var: opt };
            let mut kids = vec![ctx];
            if let Some(o) = opt {
                kids.push(o);
            }
            kids
        })
    }

    fn expr(&mut self, expr: &py::Expr, parent: NodeId) -> NodeId {
        use py::Expr::*;
        match expr {
            Call(c) => self.push(NodeKind::Other, Some(parent), c.range, |b, id| {
                let func = b.expr(&c.func, id);
                let args: Vec<NodeId> = c.args.iter().map(|a| b.expr(a, id)).collect();
                let keywords: Vec<KeywordArg> = c
                    .keywords
                    .iter()
                    .map(|k| KeywordArg { arg: k.arg.as_ref().map(|a| a.to_string()), value: b.expr(&k.value, id) })
                    .collect();
                b.nodes[id.0 as usize].kind =
                    NodeKind::Call { func, args: args.clone(), keywords: keywords.clone() };
                let mut kids = vec![func];
                kids.extend(args);
                kids.extend(keywords.iter().map(|k| k.value));
                kids
            }),
            Name(n) => {
                let store = matches!(n.ctx, py::ExprContext::Store);
                let del = matches!(n.ctx, py::ExprContext::Del);
                self.push(
                    NodeKind::Name { id: n.id.to_string(), store, del },
                    Some(parent),
                    n.range,
                    |_, _| Vec::new(),
                )
            }
            Attribute(a) => self.push(NodeKind::Other, Some(parent), a.range, |b, id| {
                let value = b.expr(&a.value, id);
                let store = matches!(a.ctx, py::ExprContext::Store);
                b.nodes[id.0 as usize].kind =
                    NodeKind::Attribute { value, attr: a.attr.to_string(), store };
                vec![value]
            }),
            Constant(c) => self.push(
                NodeKind::Constant { value: literal_of(&c.value) },
                Some(parent),
                c.range,
                |_, _| Vec::new(),
            ),
            Tuple(t) => self.push(NodeKind::Other, Some(parent), t.range, |b, id| {
                let elts: Vec<NodeId> = t.elts.iter().map(|e| b.expr(e, id)).collect();
                let store = matches!(t.ctx, py::ExprContext::Store);
                b.nodes[id.0 as usize].kind = NodeKind::Tuple { elts: elts.clone(), store };
                elts
            }),
            List(l) => self.push(NodeKind::Other, Some(parent), l.range, |b, id| {
                let elts: Vec<NodeId> = l.elts.iter().map(|e| b.expr(e, id)).collect();
                let store = matches!(l.ctx, py::ExprContext::Store);
                b.nodes[id.0 as usize].kind = NodeKind::List { elts: elts.clone(), store };
                elts
            }),
            Subscript(s) => self.push(NodeKind::Other, Some(parent), s.range, |b, id| {
                vec![b.expr(&s.value, id), b.expr(&s.slice, id)]
            }),
            BinOp(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.left, id), b.expr(&e.right, id)]
            }),
            BoolOp(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                e.values.iter().map(|v| b.expr(v, id)).collect()
            }),
            UnaryOp(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.operand, id)]
            }),
            Compare(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                let mut kids = vec![b.expr(&e.left, id)];
                kids.extend(e.comparators.iter().map(|c| b.expr(c, id)));
                kids
            }),
            IfExp(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.test, id), b.expr(&e.body, id), b.expr(&e.orelse, id)]
            }),
            Dict(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                let mut kids = Vec::new();
                for (k, v) in e.keys.iter().zip(e.values.iter()) {
                    if let Some(k) = k {
                        kids.push(b.expr(k, id));
                    }
                    kids.push(b.expr(v, id));
                }
                kids
            }),
            Set(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                e.elts.iter().map(|x| b.expr(x, id)).collect()
            }),
            Starred(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.value, id)]
            }),
            Await(e) => self.push(NodeKind::Other, Some(parent), e.range, |b, id| {
                vec![b.expr(&e.value, id)]
            }),
            other => {
                let range = expr_fallback_range(other);
                self.push(NodeKind::Other, Some(parent), range, |_, _| Vec::new())
            }
        }
    }
}

fn params_of(args: &py::Arguments) -> Vec<Param> {
    let mut pos = 0u32;
    let mut params = Vec::new();
    for a in &args.posonlyargs {
        params.push(Param { name: a.def.arg.to_string(), position: Some(pos), keyword: None });
        pos += 1;
    }
    for a in &args.args {
        params.push(Param {
            name: a.def.arg.to_string(),
            position: Some(pos),
            keyword: Some(a.def.arg.to_string()),
        });
        pos += 1;
    }
    for a in &args.kwonlyargs {
        params.push(Param { name: a.def.arg.to_string(), position: None, keyword: Some(a.def.arg.to_string()) });
    }
    params
}

fn alias_list(names: &[py::Alias]) -> Vec<ImportAlias> {
    names
        .iter()
        .map(|a| ImportAlias { name: a.name.to_string(), asname: a.asname.as_ref().map(|n| n.to_string()) })
        .collect()
}

fn literal_of(c: &py::Constant) -> Literal {
    match c {
        py::Constant::None => Literal::None,
        py::Constant::Bool(b) => Literal::Bool(*b),
        py::Constant::Str(s) => Literal::Str(s.clone()),
        py::Constant::Int(i) => i.to_string().parse::<i64>().map(Literal::Int).unwrap_or(Literal::Other),
        py::Constant::Float(f) => Literal::Float(*f),
        _ => Literal::Other,
    }
}

fn stmt_fallback_range(stmt: &py::Stmt) -> rustpython_parser::text_size::TextRange {
    use rustpython_ast::Node;
    stmt.range()
}

fn expr_fallback_range(expr: &py::Expr) -> rustpython_parser::text_size::TextRange {
    use rustpython_ast::Node;
    expr.range()
}
