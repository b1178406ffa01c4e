//! Lowered program: typed bar-loop IR.
//!
//! Every value a script reads per bar lives in a numbered slot. Bar slots
//! read the bar context, all other slots are forward series owned by the bar
//! loop. Batch work (hoisted TA calls and the derived series they consume)
//! runs before the loop; each bar then feeds those arrays into their series,
//! samples strategy state and runs the statements in source order.

use serde::Serialize;

use crate::ast::{BinaryOp, UnaryOp};
use crate::context::BarField;
use crate::domain::Direction;
use crate::input::InputValue;
use crate::plot::PlotOptions;
use crate::strategy::StrategyField;
use crate::ta::TaFunction;
use crate::value::{from_bool, truthy, NA};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum SlotKind {
    Bar(BarField),
    Strategy(StrategyField),
    Ta,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub name: String,
    pub kind: SlotKind,
    /// Computable over the whole bar array before the loop.
    pub pure: bool,
}

impl Slot {
    /// Whether the slot is backed by a forward series in the bar loop.
    pub fn is_series(&self) -> bool {
        !matches!(self.kind, SlotKind::Bar(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MathFn {
    Abs,
    Max,
    Min,
    Sqrt,
    Pow,
    Log,
    Exp,
    Round,
    Floor,
    Ceil,
    Sign,
}

impl MathFn {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => MathFn::Abs,
            "max" => MathFn::Max,
            "min" => MathFn::Min,
            "sqrt" => MathFn::Sqrt,
            "pow" => MathFn::Pow,
            "log" => MathFn::Log,
            "exp" => MathFn::Exp,
            "round" => MathFn::Round,
            "floor" => MathFn::Floor,
            "ceil" => MathFn::Ceil,
            "sign" => MathFn::Sign,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            MathFn::Abs => "math.abs",
            MathFn::Max => "math.max",
            MathFn::Min => "math.min",
            MathFn::Sqrt => "math.sqrt",
            MathFn::Pow => "math.pow",
            MathFn::Log => "math.log",
            MathFn::Exp => "math.exp",
            MathFn::Round => "math.round",
            MathFn::Floor => "math.floor",
            MathFn::Ceil => "math.ceil",
            MathFn::Sign => "math.sign",
        }
    }

    /// Accepted argument counts as `(min, max)`.
    pub fn arity(self) -> (usize, usize) {
        match self {
            MathFn::Max | MathFn::Min => (1, usize::MAX),
            MathFn::Pow => (2, 2),
            _ => (1, 1),
        }
    }

    /// NA in any argument yields NA.
    pub fn apply(self, args: &[f64]) -> f64 {
        if args.is_empty() || args.iter().any(|a| a.is_nan()) {
            return NA;
        }
        let x = args[0];
        match self {
            MathFn::Abs => x.abs(),
            MathFn::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            MathFn::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            MathFn::Sqrt => x.sqrt(),
            MathFn::Pow => x.powf(args.get(1).copied().unwrap_or(NA)),
            MathFn::Log => x.ln(),
            MathFn::Exp => x.exp(),
            MathFn::Round => x.round(),
            MathFn::Floor => x.floor(),
            MathFn::Ceil => x.ceil(),
            MathFn::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Per-bar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// `slot[offset]`.
    Read { slot: SlotId, offset: usize },
    /// History of a loop-invariant value: `value` once `offset` bars exist.
    Lagged { value: f64, offset: usize },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    IsNa(Box<Expr>),
    Nz {
        value: Box<Expr>,
        replacement: Box<Expr>,
    },
    Math {
        func: MathFn,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Call `f` on this node and every node below it.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Read { .. } | Expr::Lagged { .. } => {}
            Expr::Unary { operand, .. } | Expr::IsNa(operand) => operand.visit(f),
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                test.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::Nz { value, replacement } => {
                value.visit(f);
                replacement.visit(f);
            }
            Expr::Math { args, .. } => args.iter().for_each(|a| a.visit(f)),
        }
    }

    /// Every `(slot, offset)` the expression may read.
    pub fn reads(&self) -> Vec<(SlotId, usize)> {
        let mut out = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Read { slot, offset } = e {
                out.push((*slot, *offset));
            }
        });
        out
    }

    /// Largest history offset, including lagged constants.
    pub fn max_offset(&self) -> usize {
        let mut max = 0;
        self.visit(&mut |e| {
            if let Expr::Read { offset, .. } | Expr::Lagged { offset, .. } = e {
                max = max.max(*offset);
            }
        });
        max
    }
}

pub fn apply_unary(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Neg => -x,
        UnaryOp::Plus => x,
        UnaryOp::Not => {
            if x.is_nan() {
                NA
            } else {
                from_bool(!truthy(x))
            }
        }
    }
}

/// Strict binary operator semantics. Comparisons follow IEEE-754: any NA
/// operand makes `<`, `<=`, `>`, `>=`, `==` false and `!=` true. Logical
/// operators treat NA as false. Short-circuiting happens in the evaluator.
pub fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Lt => from_bool(a < b),
        BinaryOp::Le => from_bool(a <= b),
        BinaryOp::Gt => from_bool(a > b),
        BinaryOp::Ge => from_bool(a >= b),
        BinaryOp::Eq => from_bool(a == b),
        BinaryOp::Ne => from_bool(a != b),
        BinaryOp::And => from_bool(truthy(a) && truthy(b)),
        BinaryOp::Or => from_bool(truthy(a) || truthy(b)),
    }
}

/// Per-bar statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        slot: SlotId,
        value: Expr,
    },
    If {
        test: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Entry {
        id: String,
        direction: Direction,
        qty: Expr,
    },
    Exit {
        id: String,
        from_entry: Option<String>,
    },
    Close {
        id: String,
    },
    CloseAll,
    Plot {
        title: String,
        value: Expr,
        options: PlotOptions,
    },
}

/// Work done over the whole bar array before the loop, in dependency order.
#[derive(Debug, Clone, PartialEq)]
pub enum Precompute {
    /// A pure declared series consumed by a TA call.
    Derived { slot: SlotId, expr: Expr },
    /// A hoisted TA call.
    Ta {
        func: TaFunction,
        inputs: Vec<SlotId>,
        outputs: Vec<SlotId>,
    },
}

impl Precompute {
    pub fn outputs(&self) -> Vec<SlotId> {
        match self {
            Precompute::Derived { slot, .. } => vec![*slot],
            Precompute::Ta { outputs, .. } => outputs.clone(),
        }
    }

    pub fn inputs(&self) -> Vec<SlotId> {
        match self {
            Precompute::Derived { expr, .. } => expr.reads().into_iter().map(|(s, _)| s).collect(),
            Precompute::Ta { inputs, .. } => inputs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDecl {
    pub title: String,
    pub initial_capital: Option<f64>,
    pub default_qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInput {
    pub title: String,
    pub value: InputValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredProgram {
    /// Title from `strategy()`, `indicator()` or `study()`.
    pub title: Option<String>,
    pub strategy: Option<StrategyDecl>,
    pub inputs: Vec<ResolvedInput>,
    pub slots: Vec<Slot>,
    pub precompute: Vec<Precompute>,
    /// Series filled from precomputed arrays at the top of each bar.
    pub feeds: Vec<SlotId>,
    /// Strategy state series sampled after `on_bar_update`.
    pub state_feeds: Vec<(SlotId, StrategyField)>,
    pub body: Vec<Stmt>,
}

impl LoweredProgram {
    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    /// The slot holding declared series `name`, if any.
    pub fn find_slot(&self, name: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.kind == SlotKind::User && s.name == name)
            .map(SlotId)
    }

    pub fn uses_strategy(&self) -> bool {
        self.strategy.is_some()
    }
}
