//! Lowering: script AST → bar-loop IR.
//!
//! One pass over the AST in source order. Literals and resolved inputs fold
//! to constants, names resolve against lexical scopes, TA calls are hoisted
//! into batch precompute steps (deduplicated by function and inputs), and the
//! remaining statements become per-bar [`Stmt`]s.
//!
//! A declared series is *pure* when it is declared at top level and reads
//! only bar data, TA outputs or other pure series. Only pure series may feed
//! a TA call; they are then computed as whole arrays before the loop.

pub mod builtins;
pub mod ir;
pub mod render;
pub mod scope;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::ast::{self, ExprKind, Literal, Pattern, Statement};
use crate::context::BarField;
use crate::domain::Direction;
use crate::input::{InputOverrides, InputValue};
use crate::plot::PlotOptions;
use crate::strategy::StrategyField;
use crate::ta::TaFunction;
use crate::value::{from_bool, nz, truthy, FixNanMode, NA};

use builtins::{resolve_callee, Builtin, CallArgs, InputKind, TaKind};
use ir::{
    apply_binary, apply_unary, Expr, LoweredProgram, MathFn, Precompute, ResolvedInput, Slot,
    SlotId, SlotKind, Stmt, StrategyDecl,
};
use scope::{Binding, Scope};

/// Default `qty` of `strategy.entry` when `strategy()` sets none.
pub const DEFAULT_QTY: f64 = 1.0;

/// Largest history offset or TA length a script may ask for.
pub const MAX_LENGTH: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {path}")]
pub struct LowerError {
    pub message: String,
    pub path: String,
}

impl LowerError {
    fn new(message: impl Into<String>, path: &str) -> Self {
        Self {
            message: message.into(),
            path: path.to_string(),
        }
    }
}

type Result<T> = std::result::Result<T, LowerError>;

#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    pub fixnan: FixNanMode,
    pub overrides: InputOverrides,
}

/// Lower a decoded script.
pub fn lower(program: &ast::Program, options: &LowerOptions) -> Result<LoweredProgram> {
    let mut lowerer = Lowerer::new(options);
    let body = lowerer.block(&program.body)?;
    lowerer.finish(body)
}

/// A lowered expression before it is committed to a statement.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Scalar(f64),
    Text(String),
    Series(Expr),
    Tuple(Vec<SlotId>),
}

struct Lowerer<'o> {
    options: &'o LowerOptions,
    scope: Scope,
    slots: Vec<Slot>,
    precompute: Vec<Precompute>,
    feeds: Vec<SlotId>,
    state_feeds: Vec<(SlotId, StrategyField)>,
    bar_slots: HashMap<BarField, SlotId>,
    state_slots: HashMap<StrategyField, SlotId>,
    ta_cache: HashMap<String, Vec<SlotId>>,
    /// Definitions of pure user series, batched on first use by a TA call.
    pure_defs: HashMap<SlotId, Expr>,
    batched: HashSet<SlotId>,
    title: Option<String>,
    strategy: Option<StrategyDecl>,
    /// Path of the first strategy surface use.
    strategy_use: Option<String>,
    inputs: Vec<ResolvedInput>,
    plots: usize,
    temps: usize,
}

impl<'o> Lowerer<'o> {
    fn new(options: &'o LowerOptions) -> Self {
        Self {
            options,
            scope: Scope::new(),
            slots: Vec::new(),
            precompute: Vec::new(),
            feeds: Vec::new(),
            state_feeds: Vec::new(),
            bar_slots: HashMap::new(),
            state_slots: HashMap::new(),
            ta_cache: HashMap::new(),
            pure_defs: HashMap::new(),
            batched: HashSet::new(),
            title: None,
            strategy: None,
            strategy_use: None,
            inputs: Vec::new(),
            plots: 0,
            temps: 0,
        }
    }

    fn finish(self, mut body: Vec<Stmt>) -> Result<LoweredProgram> {
        if self.strategy.is_none() {
            if let Some(path) = &self.strategy_use {
                return Err(LowerError::new(
                    "strategy functions need a strategy() declaration",
                    path,
                ));
            }
        }
        // Batched series are fed from their arrays; their per-bar assignment
        // would be a second write.
        body.retain(|stmt| match stmt {
            Stmt::Assign { slot, .. } => !self.batched.contains(slot),
            _ => true,
        });
        let title = self
            .title
            .or_else(|| self.strategy.as_ref().map(|s| s.title.clone()));
        debug!(
            slots = self.slots.len(),
            precompute = self.precompute.len(),
            statements = body.len(),
            "lowered program"
        );
        Ok(LoweredProgram {
            title,
            strategy: self.strategy,
            inputs: self.inputs,
            slots: self.slots,
            precompute: self.precompute,
            feeds: self.feeds,
            state_feeds: self.state_feeds,
            body,
        })
    }

    // ── Slots ──

    fn new_slot(&mut self, name: String, kind: SlotKind, pure: bool) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot { name, kind, pure });
        id
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |name: &str| self.slots.iter().any(|s| s.name == name);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|k| format!("{base}_{k}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    fn bar_slot(&mut self, field: BarField) -> SlotId {
        if let Some(id) = self.bar_slots.get(&field) {
            return *id;
        }
        let id = self.new_slot(field.name().to_string(), SlotKind::Bar(field), true);
        self.bar_slots.insert(field, id);
        id
    }

    fn state_slot(&mut self, field: StrategyField) -> SlotId {
        if let Some(id) = self.state_slots.get(&field) {
            return *id;
        }
        let name = format!("strategy.{}", field.name());
        let id = self.new_slot(name, SlotKind::Strategy(field), false);
        self.state_slots.insert(field, id);
        self.state_feeds.push((id, field));
        id
    }

    fn is_pure(&self, expr: &Expr) -> bool {
        expr.reads().iter().all(|(slot, _)| self.slots[slot.0].pure)
    }

    fn note_strategy_use(&mut self, path: &str) {
        if self.strategy_use.is_none() {
            self.strategy_use = Some(path.to_string());
        }
    }

    /// Schedule a pure user series (and the series it reads) for batch
    /// computation.
    fn ensure_batched(&mut self, slot: SlotId) {
        if self.batched.contains(&slot) || self.slots[slot.0].kind != SlotKind::User {
            return;
        }
        let Some(expr) = self.pure_defs.get(&slot).cloned() else {
            return;
        };
        for (dep, _) in expr.reads() {
            self.ensure_batched(dep);
        }
        debug!(slot = %self.slots[slot.0].name, "batched derived series");
        self.precompute.push(Precompute::Derived { slot, expr });
        self.batched.insert(slot);
        self.feeds.push(slot);
    }

    // ── Statements ──

    fn block(&mut self, statements: &[Statement]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for statement in statements {
            self.statement(statement, &mut out)?;
        }
        Ok(out)
    }

    fn scoped_block(&mut self, statements: &[Statement]) -> Result<Vec<Stmt>> {
        self.scope.push();
        let result = self.block(statements);
        self.scope.pop();
        result
    }

    fn statement(&mut self, statement: &Statement, out: &mut Vec<Stmt>) -> Result<()> {
        match statement {
            Statement::Expression(expr) => self.expression_statement(expr, out),
            Statement::VariableDeclaration { declarations, .. } => {
                for declarator in declarations {
                    self.declare(declarator, out)?;
                }
                Ok(())
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                let test_value = self.operand(test)?;
                let test_expr = self.to_expr(test_value, &test.path)?;
                let then = self.scoped_block(consequent)?;
                let otherwise = match alternate {
                    Some(alternate) => self.scoped_block(alternate)?,
                    None => Vec::new(),
                };
                out.push(Stmt::If {
                    test: test_expr,
                    then,
                    otherwise,
                });
                Ok(())
            }
        }
    }

    fn declare(&mut self, declarator: &ast::Declarator, out: &mut Vec<Stmt>) -> Result<()> {
        let path = declarator.path.as_str();
        let Some(init) = &declarator.init else {
            return Err(LowerError::new("declaration without initializer", path));
        };
        match &declarator.id {
            Pattern::Identifier(name) => {
                if self.scope.lookup(name).is_some() {
                    return Err(LowerError::new(format!("`{name}` is already declared"), path));
                }
                let binding = match self.operand(init)? {
                    Operand::Scalar(v) => Binding::Scalar(v),
                    Operand::Text(t) => Binding::Text(t),
                    Operand::Tuple(_) => {
                        return Err(LowerError::new(
                            format!("tuple result must be destructured, not bound to `{name}`"),
                            &init.path,
                        ))
                    }
                    Operand::Series(expr) => {
                        let pure = self.scope.is_top_level() && self.is_pure(&expr);
                        let slot_name = self.unique_name(name);
                        let slot = self.new_slot(slot_name, SlotKind::User, pure);
                        if pure {
                            self.pure_defs.insert(slot, expr.clone());
                        }
                        out.push(Stmt::Assign { slot, value: expr });
                        Binding::Series(slot)
                    }
                };
                self.bind(name, binding, path)
            }
            Pattern::Array(names) => {
                let Operand::Tuple(outputs) = self.operand(init)? else {
                    return Err(LowerError::new(
                        "array destructuring needs a tuple-valued call",
                        &init.path,
                    ));
                };
                if outputs.len() != names.len() {
                    return Err(LowerError::new(
                        format!(
                            "tuple has {} values but {} names are bound",
                            outputs.len(),
                            names.len()
                        ),
                        path,
                    ));
                }
                for (name, slot) in names.iter().zip(outputs) {
                    self.bind(name, Binding::Series(slot), path)?;
                }
                Ok(())
            }
        }
    }

    fn bind(&mut self, name: &str, binding: Binding, path: &str) -> Result<()> {
        self.scope
            .declare(name, binding)
            .map_err(|()| LowerError::new(format!("`{name}` is already declared"), path))
    }

    fn expression_statement(&mut self, expr: &ast::Expr, out: &mut Vec<Stmt>) -> Result<()> {
        if let ExprKind::Call { callee, arguments } = &expr.kind {
            let builtin = callee.dotted_name().as_deref().and_then(resolve_callee);
            if let Some(builtin) = builtin.filter(|b| b.is_statement()) {
                let args = CallArgs::new(arguments);
                return self.statement_call(builtin, &args, &expr.path, out);
            }
        }
        // A bare expression has no effect beyond what it hoists.
        self.operand(expr).map(|_| ())
    }

    fn statement_call(
        &mut self,
        builtin: Builtin,
        args: &CallArgs<'_>,
        path: &str,
        out: &mut Vec<Stmt>,
    ) -> Result<()> {
        match builtin {
            Builtin::Strategy => {
                if self.strategy.is_some() {
                    return Err(LowerError::new("duplicate strategy() declaration", path));
                }
                let title = self.opt_text(args.get(0, "title"))?.unwrap_or_default();
                let initial_capital = self.opt_constant(args.named("initial_capital"))?;
                let default_qty = self
                    .opt_constant(args.named("default_qty_value"))?
                    .unwrap_or(DEFAULT_QTY);
                debug!(%title, ?initial_capital, default_qty, "strategy declared");
                if self.title.is_none() {
                    self.title = Some(title.clone());
                }
                self.strategy = Some(StrategyDecl {
                    title,
                    initial_capital,
                    default_qty,
                });
            }
            Builtin::Indicator => {
                let title = self.opt_text(args.get(0, "title"))?.unwrap_or_default();
                self.title = Some(title);
            }
            Builtin::Entry => {
                self.note_strategy_use(path);
                let id = self.required_text(args.get(0, "id"), "id", path)?;
                let direction_text = self.required_text(args.get(1, "direction"), "direction", path)?;
                let direction = Direction::parse(&direction_text).ok_or_else(|| {
                    LowerError::new(format!("unknown direction `{direction_text}`"), path)
                })?;
                let qty = match args.get(2, "qty") {
                    Some(arg) => {
                        let value = self.operand(arg)?;
                        self.to_expr(value, &arg.path)?
                    }
                    None => Expr::Const(
                        self.strategy
                            .as_ref()
                            .map(|s| s.default_qty)
                            .unwrap_or(DEFAULT_QTY),
                    ),
                };
                out.push(Stmt::Entry { id, direction, qty });
            }
            Builtin::Exit => {
                self.note_strategy_use(path);
                let id = self.required_text(args.get(0, "id"), "id", path)?;
                let from_entry = self.opt_text(args.get(1, "from_entry"))?;
                out.push(Stmt::Exit { id, from_entry });
            }
            Builtin::Close => {
                self.note_strategy_use(path);
                let id = self.required_text(args.get(0, "id"), "id", path)?;
                out.push(Stmt::Close { id });
            }
            Builtin::CloseAll => {
                self.note_strategy_use(path);
                out.push(Stmt::CloseAll);
            }
            Builtin::Plot => {
                let Some(arg) = args.get(0, "series") else {
                    return Err(LowerError::new("plot() needs a value", path));
                };
                let value = self.operand(arg)?;
                let value = self.to_expr(value, &arg.path)?;
                let ordinal = self.plots;
                self.plots += 1;
                let title = self
                    .opt_text(args.get(1, "title"))?
                    .unwrap_or_else(|| format!("plot_{ordinal}"));
                let mut options = PlotOptions::new();
                for (key, arg) in args.named_all() {
                    if matches!(*key, "title" | "series") {
                        continue;
                    }
                    let json = match self.operand(arg)? {
                        Operand::Scalar(v) => serde_json::Number::from_f64(v)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null),
                        Operand::Text(t) => serde_json::Value::String(t),
                        _ => {
                            return Err(LowerError::new(
                                format!("plot option `{key}` must be a constant"),
                                &arg.path,
                            ))
                        }
                    };
                    options.insert((*key).to_string(), json);
                }
                out.push(Stmt::Plot {
                    title,
                    value,
                    options,
                });
            }
            _ => return self.operand_call(builtin, args, path).map(|_| ()),
        }
        Ok(())
    }

    // ── Expressions ──

    fn operand(&mut self, expr: &ast::Expr) -> Result<Operand> {
        let path = expr.path.as_str();
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Number(v) => Operand::Scalar(*v),
                Literal::Bool(b) => Operand::Scalar(from_bool(*b)),
                Literal::String(s) => Operand::Text(s.clone()),
                Literal::Null => Operand::Scalar(NA),
            }),
            ExprKind::Identifier(name) => self.identifier(name, path),
            ExprKind::Member {
                object,
                property,
                computed: true,
            } => self.history(object, property, path),
            ExprKind::Member { .. } => match expr.dotted_name() {
                Some(name) => self.named_value(&name, path),
                None => Err(LowerError::new("unsupported member expression", path)),
            },
            ExprKind::Call { callee, arguments } => {
                let Some(name) = callee.dotted_name() else {
                    return Err(LowerError::new("callee must be a name", path));
                };
                let Some(builtin) = resolve_callee(&name) else {
                    return Err(LowerError::new(format!("unknown function `{name}`"), path));
                };
                if builtin.is_statement() {
                    return Err(LowerError::new(
                        format!("`{name}` can only be used as a statement"),
                        path,
                    ));
                }
                self.operand_call(builtin, &CallArgs::new(arguments), path)
            }
            ExprKind::Object(_) => Err(LowerError::new(
                "object literal is only allowed as trailing call arguments",
                path,
            )),
            ExprKind::Binary { op, left, right } => {
                let a = self.operand(left)?;
                let b = self.operand(right)?;
                match (a, b) {
                    (Operand::Scalar(a), Operand::Scalar(b)) => {
                        Ok(Operand::Scalar(apply_binary(*op, a, b)))
                    }
                    (Operand::Text(a), Operand::Text(b))
                        if matches!(op, ast::BinaryOp::Eq | ast::BinaryOp::Ne) =>
                    {
                        let equal = a == b;
                        Ok(Operand::Scalar(from_bool(
                            equal == (*op == ast::BinaryOp::Eq),
                        )))
                    }
                    (a, b) => Ok(Operand::Series(Expr::Binary {
                        op: *op,
                        left: Box::new(self.to_expr(a, &left.path)?),
                        right: Box::new(self.to_expr(b, &right.path)?),
                    })),
                }
            }
            ExprKind::Unary { op, argument } => match self.operand(argument)? {
                Operand::Scalar(v) => Ok(Operand::Scalar(apply_unary(*op, v))),
                other => Ok(Operand::Series(Expr::Unary {
                    op: *op,
                    operand: Box::new(self.to_expr(other, &argument.path)?),
                })),
            },
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let t = self.operand(test)?;
                let a = self.operand(consequent)?;
                let b = self.operand(alternate)?;
                if let Operand::Scalar(t) = t {
                    return Ok(if truthy(t) { a } else { b });
                }
                Ok(Operand::Series(Expr::Conditional {
                    test: Box::new(self.to_expr(t, &test.path)?),
                    then: Box::new(self.to_expr(a, &consequent.path)?),
                    otherwise: Box::new(self.to_expr(b, &alternate.path)?),
                }))
            }
        }
    }

    fn to_expr(&self, operand: Operand, path: &str) -> Result<Expr> {
        match operand {
            Operand::Scalar(v) => Ok(Expr::Const(v)),
            Operand::Series(expr) => Ok(expr),
            Operand::Text(text) => Err(LowerError::new(
                format!("expected a number, found text \"{text}\""),
                path,
            )),
            Operand::Tuple(_) => Err(LowerError::new(
                "tuple result must be destructured",
                path,
            )),
        }
    }

    fn identifier(&mut self, name: &str, path: &str) -> Result<Operand> {
        if let Some(binding) = self.scope.lookup(name) {
            return Ok(match binding {
                Binding::Scalar(v) => Operand::Scalar(*v),
                Binding::Text(t) => Operand::Text(t.clone()),
                Binding::Series(slot) => Operand::Series(Expr::Read {
                    slot: *slot,
                    offset: 0,
                }),
            });
        }
        if let Some(field) = BarField::from_name(name) {
            let slot = self.bar_slot(field);
            return Ok(Operand::Series(Expr::Read { slot, offset: 0 }));
        }
        match name {
            "na" => Ok(Operand::Scalar(NA)),
            "true" => Ok(Operand::Scalar(1.0)),
            "false" => Ok(Operand::Scalar(0.0)),
            _ => Err(LowerError::new(format!("undeclared identifier `{name}`"), path)),
        }
    }

    fn named_value(&mut self, name: &str, path: &str) -> Result<Operand> {
        match name {
            "strategy.long" => return Ok(Operand::Text(Direction::Long.as_str().to_string())),
            "strategy.short" => return Ok(Operand::Text(Direction::Short.as_str().to_string())),
            "ta.tr" => return self.ta_call(TaKind::Tr, &CallArgs::new(&[]), path),
            _ => {}
        }
        if let Some(field) = name.strip_prefix("strategy.").and_then(StrategyField::from_name) {
            self.note_strategy_use(path);
            let slot = self.state_slot(field);
            return Ok(Operand::Series(Expr::Read { slot, offset: 0 }));
        }
        if name.starts_with("color.") {
            return Ok(Operand::Text(name.to_string()));
        }
        Err(LowerError::new(format!("unknown name `{name}`"), path))
    }

    fn history(&mut self, object: &ast::Expr, property: &ast::Expr, path: &str) -> Result<Operand> {
        let offset = match self.operand(property)? {
            Operand::Scalar(v)
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= MAX_LENGTH as f64 =>
            {
                v as usize
            }
            Operand::Scalar(v) => {
                return Err(LowerError::new(
                    format!("history offset must be an integer in 0..={MAX_LENGTH}, got {v}"),
                    &property.path,
                ))
            }
            _ => {
                return Err(LowerError::new(
                    "history offset must be a constant",
                    &property.path,
                ))
            }
        };
        match self.operand(object)? {
            Operand::Series(Expr::Read { slot, offset: base }) => {
                let offset = base
                    .checked_add(offset)
                    .filter(|&total| total <= MAX_LENGTH)
                    .ok_or_else(|| {
                        LowerError::new(
                            format!("combined history offset exceeds {MAX_LENGTH}"),
                            path,
                        )
                    })?;
                Ok(Operand::Series(Expr::Read { slot, offset }))
            }
            Operand::Scalar(v) if offset == 0 => Ok(Operand::Scalar(v)),
            Operand::Scalar(v) => Ok(Operand::Series(Expr::Lagged { value: v, offset })),
            _ => Err(LowerError::new(
                "history operator needs a series name",
                path,
            )),
        }
    }

    fn operand_call(&mut self, builtin: Builtin, args: &CallArgs<'_>, path: &str) -> Result<Operand> {
        match builtin {
            Builtin::Ta(kind) => self.ta_call(kind, args, path),
            Builtin::Math(func) => self.math_call(func, args, path),
            Builtin::Nz => {
                let value = self.required(args.get(0, "source"), "source", path)?;
                let replacement = match args.get(1, "replacement") {
                    Some(arg) => self.operand(arg)?,
                    None => Operand::Scalar(0.0),
                };
                match (value, replacement) {
                    (Operand::Scalar(v), Operand::Scalar(r)) => Ok(Operand::Scalar(nz(v, r))),
                    (value, replacement) => Ok(Operand::Series(Expr::Nz {
                        value: Box::new(self.to_expr(value, path)?),
                        replacement: Box::new(self.to_expr(replacement, path)?),
                    })),
                }
            }
            Builtin::Na => match self.required(args.get(0, "x"), "x", path)? {
                Operand::Scalar(v) => Ok(Operand::Scalar(from_bool(v.is_nan()))),
                other => Ok(Operand::Series(Expr::IsNa(Box::new(self.to_expr(other, path)?)))),
            },
            Builtin::Input(kind) => self.input_call(kind, args, path),
            _ => Err(LowerError::new("statement call used as a value", path)),
        }
    }

    fn math_call(&mut self, func: MathFn, args: &CallArgs<'_>, path: &str) -> Result<Operand> {
        let (min, max) = func.arity();
        let count = args.positional_len();
        if count < min || count > max {
            return Err(LowerError::new(
                format!("{} takes {min} to {max} arguments, got {count}", func.name()),
                path,
            ));
        }
        let mut operands = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(arg) = args.get(index, "") {
                operands.push(self.operand(arg)?);
            }
        }
        if operands.iter().all(|o| matches!(o, Operand::Scalar(_))) {
            let values: Vec<f64> = operands
                .iter()
                .filter_map(|o| match o {
                    Operand::Scalar(v) => Some(*v),
                    _ => None,
                })
                .collect();
            return Ok(Operand::Scalar(func.apply(&values)));
        }
        let args = operands
            .into_iter()
            .map(|o| self.to_expr(o, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Operand::Series(Expr::Math { func, args }))
    }

    // ── TA hoisting ──

    fn ta_call(&mut self, kind: TaKind, args: &CallArgs<'_>, path: &str) -> Result<Operand> {
        let (func, inputs) = match kind {
            TaKind::Sma | TaKind::Ema | TaKind::Rma | TaKind::Stdev | TaKind::Rsi => {
                let src = self.source(args.get(0, "source"), "source", path)?;
                let period = self.length(args.get(1, "length"), "length", None, 1, path)?;
                let func = match kind {
                    TaKind::Sma => TaFunction::Sma { period },
                    TaKind::Ema => TaFunction::Ema { period },
                    TaKind::Rma => TaFunction::Rma { period },
                    TaKind::Stdev => TaFunction::Stdev { period },
                    _ => TaFunction::Rsi { period },
                };
                (func, vec![src])
            }
            TaKind::Change => {
                let src = self.source(args.get(0, "source"), "source", path)?;
                let length = self.length(args.get(1, "length"), "length", Some(1), 1, path)?;
                (TaFunction::Change { length }, vec![src])
            }
            TaKind::Highest | TaKind::Lowest => {
                let (src, period) = if args.positional_len() == 1 && args.named("source").is_none()
                {
                    let field = if kind == TaKind::Highest { BarField::High } else { BarField::Low };
                    let period = self.length(args.get(0, "length"), "length", None, 1, path)?;
                    (self.bar_slot(field), period)
                } else {
                    let src = self.source(args.get(0, "source"), "source", path)?;
                    let period = self.length(args.get(1, "length"), "length", None, 1, path)?;
                    (src, period)
                };
                let func = if kind == TaKind::Highest {
                    TaFunction::Highest { period }
                } else {
                    TaFunction::Lowest { period }
                };
                (func, vec![src])
            }
            TaKind::PivotHigh | TaKind::PivotLow => {
                let (src, first) = if args.positional_len() == 2 && args.named("source").is_none() {
                    let field = if kind == TaKind::PivotHigh { BarField::High } else { BarField::Low };
                    (self.bar_slot(field), 0)
                } else {
                    (self.source(args.get(0, "source"), "source", path)?, 1)
                };
                let left = self.length(args.get(first, "leftbars"), "leftbars", None, 0, path)?;
                let right = self.length(args.get(first + 1, "rightbars"), "rightbars", None, 0, path)?;
                let func = if kind == TaKind::PivotHigh {
                    TaFunction::PivotHigh { left, right }
                } else {
                    TaFunction::PivotLow { left, right }
                };
                (func, vec![src])
            }
            TaKind::Crossover | TaKind::Crossunder => {
                let a = self.source(args.get(0, "source1"), "source1", path)?;
                let b = self.source(args.get(1, "source2"), "source2", path)?;
                let func = if kind == TaKind::Crossover {
                    TaFunction::Crossover
                } else {
                    TaFunction::Crossunder
                };
                (func, vec![a, b])
            }
            TaKind::Bb => {
                let src = self.source(args.get(0, "source"), "source", path)?;
                let period = self.length(args.get(1, "length"), "length", None, 1, path)?;
                let mult = self.constant(args.get(2, "mult"), "mult", path)?;
                (TaFunction::Bb { period, mult }, vec![src])
            }
            TaKind::Macd => {
                let src = self.source(args.get(0, "source"), "source", path)?;
                let fast = self.length(args.get(1, "fastlen"), "fastlen", Some(12), 1, path)?;
                let slow = self.length(args.get(2, "slowlen"), "slowlen", Some(26), 1, path)?;
                let signal = self.length(args.get(3, "siglen"), "siglen", Some(9), 1, path)?;
                (TaFunction::Macd { fast, slow, signal }, vec![src])
            }
            TaKind::Tr | TaKind::Atr => {
                let func = if kind == TaKind::Tr {
                    TaFunction::Tr
                } else {
                    let period = self.length(args.get(0, "length"), "length", None, 1, path)?;
                    TaFunction::Atr { period }
                };
                let inputs = vec![
                    self.bar_slot(BarField::High),
                    self.bar_slot(BarField::Low),
                    self.bar_slot(BarField::Close),
                ];
                (func, inputs)
            }
            TaKind::FixNan => {
                let src = self.source(args.get(0, "source"), "source", path)?;
                (
                    TaFunction::FixNan {
                        mode: self.options.fixnan,
                    },
                    vec![src],
                )
            }
            TaKind::ValueWhen => {
                let cond = self.source(args.get(0, "condition"), "condition", path)?;
                let src = self.source(args.get(1, "source"), "source", path)?;
                let occurrence =
                    self.length(args.get(2, "occurrence"), "occurrence", Some(0), 0, path)?;
                (TaFunction::ValueWhen { occurrence }, vec![cond, src])
            }
        };
        let outputs = self.hoist(func, inputs);
        Ok(match outputs.as_slice() {
            [single] => Operand::Series(Expr::Read {
                slot: *single,
                offset: 0,
            }),
            _ => Operand::Tuple(outputs),
        })
    }

    fn hoist(&mut self, func: TaFunction, inputs: Vec<SlotId>) -> Vec<SlotId> {
        let key = format!("{func:?}|{inputs:?}");
        if let Some(outputs) = self.ta_cache.get(&key) {
            return outputs.clone();
        }
        let input_names: Vec<&str> = inputs.iter().map(|s| self.slots[s.0].name.as_str()).collect();
        let label = func.label(&input_names);
        let outputs: Vec<SlotId> = func
            .output_names()
            .iter()
            .map(|suffix| {
                let name = if suffix.is_empty() {
                    label.clone()
                } else {
                    format!("{label}.{suffix}")
                };
                self.new_slot(name, SlotKind::Ta, true)
            })
            .collect();
        debug!(%label, outputs = outputs.len(), "hoisted ta call");
        self.precompute.push(Precompute::Ta {
            func,
            inputs,
            outputs: outputs.clone(),
        });
        self.feeds.extend(outputs.iter().copied());
        self.ta_cache.insert(key, outputs.clone());
        outputs
    }

    /// A series argument of a TA call, as a slot computable before the loop.
    fn source(&mut self, arg: Option<&ast::Expr>, name: &str, path: &str) -> Result<SlotId> {
        let Some(arg) = arg else {
            return Err(LowerError::new(format!("missing argument `{name}`"), path));
        };
        let operand = self.operand(arg)?;
        let expr = self.to_expr(operand, &arg.path)?;
        if !self.is_pure(&expr) {
            return Err(LowerError::new(
                format!("argument `{name}` depends on strategy state or conditional assignments"),
                &arg.path,
            ));
        }
        if let Expr::Read { slot, offset: 0 } = expr {
            self.ensure_batched(slot);
            return Ok(slot);
        }
        self.temps += 1;
        let slot_name = self.unique_name(&format!("tmp{}", self.temps));
        let slot = self.new_slot(slot_name, SlotKind::User, true);
        self.pure_defs.insert(slot, expr);
        self.ensure_batched(slot);
        Ok(slot)
    }

    // ── Constant arguments ──

    fn required(&mut self, arg: Option<&ast::Expr>, name: &str, path: &str) -> Result<Operand> {
        match arg {
            Some(arg) => self.operand(arg),
            None => Err(LowerError::new(format!("missing argument `{name}`"), path)),
        }
    }

    fn constant(&mut self, arg: Option<&ast::Expr>, name: &str, path: &str) -> Result<f64> {
        let Some(arg) = arg else {
            return Err(LowerError::new(format!("missing argument `{name}`"), path));
        };
        match self.operand(arg)? {
            Operand::Scalar(v) => Ok(v),
            _ => Err(LowerError::new(
                format!("argument `{name}` must be a constant number"),
                &arg.path,
            )),
        }
    }

    fn opt_constant(&mut self, arg: Option<&ast::Expr>) -> Result<Option<f64>> {
        match arg {
            Some(arg) => self.constant(Some(arg), "value", &arg.path).map(Some),
            None => Ok(None),
        }
    }

    /// A constant integer argument in `min..=MAX_LENGTH`, or `default` when absent.
    fn length(
        &mut self,
        arg: Option<&ast::Expr>,
        name: &str,
        default: Option<usize>,
        min: usize,
        path: &str,
    ) -> Result<usize> {
        let value = match (arg, default) {
            (None, Some(default)) => return Ok(default),
            (arg, _) => self.constant(arg, name, path)?,
        };
        let at = arg.map_or(path, |a| a.path.as_str());
        let in_range = value >= min as f64 && value <= MAX_LENGTH as f64;
        if !value.is_finite() || value.fract() != 0.0 || !in_range {
            return Err(LowerError::new(
                format!("argument `{name}` must be an integer in {min}..={MAX_LENGTH}, got {value}"),
                at,
            ));
        }
        Ok(value as usize)
    }

    fn opt_text(&mut self, arg: Option<&ast::Expr>) -> Result<Option<String>> {
        let Some(arg) = arg else {
            return Ok(None);
        };
        match self.operand(arg)? {
            Operand::Text(text) => Ok(Some(text)),
            _ => Err(LowerError::new("expected a string", &arg.path)),
        }
    }

    fn required_text(&mut self, arg: Option<&ast::Expr>, name: &str, path: &str) -> Result<String> {
        self.opt_text(arg)?
            .ok_or_else(|| LowerError::new(format!("missing argument `{name}`"), path))
    }

    // ── Inputs ──

    fn input_call(&mut self, kind: InputKind, args: &CallArgs<'_>, path: &str) -> Result<Operand> {
        let Some(default_arg) = args.get(0, "defval") else {
            return Err(LowerError::new("input needs a default value", path));
        };
        let title = self.opt_text(args.get(1, "title"))?.unwrap_or_default();
        let default = self.operand(default_arg)?;
        let kind = match kind {
            InputKind::Inferred => match (&default_arg.kind, &default) {
                (ExprKind::Literal(Literal::Bool(_)), _) => InputKind::Bool,
                (_, Operand::Text(_)) => InputKind::String,
                (_, Operand::Series(_)) => InputKind::Source,
                (_, Operand::Scalar(v)) if v.fract() == 0.0 => InputKind::Int,
                _ => InputKind::Float,
            },
            kind => kind,
        };
        let options = self.options;
        let overrides = &options.overrides;
        let (value, operand) = match (kind, default) {
            (InputKind::Int, Operand::Scalar(d)) => {
                let v = overrides.int(d as i64, &title);
                (InputValue::Int(v), Operand::Scalar(v as f64))
            }
            (InputKind::Float, Operand::Scalar(d)) => {
                let v = overrides.float(d, &title);
                (InputValue::Float(v), Operand::Scalar(v))
            }
            (InputKind::Bool, Operand::Scalar(d)) => {
                let v = overrides.bool(truthy(d), &title);
                (InputValue::Bool(v), Operand::Scalar(from_bool(v)))
            }
            (InputKind::String, Operand::Text(d)) => {
                let v = overrides.string(&d, &title);
                (InputValue::String(v.clone()), Operand::Text(v))
            }
            (InputKind::Source, Operand::Series(Expr::Read { slot, offset: 0 })) => {
                let default_field = match self.slots[slot.0].kind {
                    SlotKind::Bar(field) => field,
                    _ => {
                        return Err(LowerError::new(
                            "input.source default must be a bar field",
                            &default_arg.path,
                        ))
                    }
                };
                let chosen = overrides.string(default_field.name(), &title);
                let field = BarField::from_name(&chosen).unwrap_or(default_field);
                let slot = self.bar_slot(field);
                (
                    InputValue::String(field.name().to_string()),
                    Operand::Series(Expr::Read { slot, offset: 0 }),
                )
            }
            _ => {
                return Err(LowerError::new(
                    "input default does not match its type",
                    &default_arg.path,
                ))
            }
        };
        debug!(%title, ?value, "resolved input");
        self.inputs.push(ResolvedInput { title, value });
        Ok(operand)
    }
}
