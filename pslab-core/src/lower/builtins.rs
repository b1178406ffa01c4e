//! Builtin function names and call-argument handling.

use crate::ast::{Expr, ExprKind};

use super::ir::MathFn;

/// Batch functions hoisted out of the bar loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaKind {
    Sma,
    Ema,
    Rma,
    Stdev,
    Change,
    Highest,
    Lowest,
    Rsi,
    Bb,
    Macd,
    PivotHigh,
    PivotLow,
    Crossover,
    Crossunder,
    Tr,
    Atr,
    FixNan,
    ValueWhen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Int,
    Float,
    Bool,
    String,
    Source,
    /// `input(defval, title)`: typed by its default.
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Ta(TaKind),
    Math(MathFn),
    Nz,
    Na,
    Input(InputKind),
    Strategy,
    Indicator,
    Entry,
    Exit,
    Close,
    CloseAll,
    Plot,
}

impl Builtin {
    /// Calls with side effects, allowed only as statements.
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            Builtin::Strategy
                | Builtin::Indicator
                | Builtin::Entry
                | Builtin::Exit
                | Builtin::Close
                | Builtin::CloseAll
                | Builtin::Plot
        )
    }
}

/// Resolve a dotted callee name. TA functions answer with or without the
/// `ta.` prefix.
pub fn resolve_callee(name: &str) -> Option<Builtin> {
    let builtin = match name {
        "nz" => Builtin::Nz,
        "na" => Builtin::Na,
        "input" => Builtin::Input(InputKind::Inferred),
        "input.int" => Builtin::Input(InputKind::Int),
        "input.float" => Builtin::Input(InputKind::Float),
        "input.bool" => Builtin::Input(InputKind::Bool),
        "input.string" => Builtin::Input(InputKind::String),
        "input.source" => Builtin::Input(InputKind::Source),
        "strategy" => Builtin::Strategy,
        "indicator" | "study" => Builtin::Indicator,
        "strategy.entry" => Builtin::Entry,
        "strategy.exit" => Builtin::Exit,
        "strategy.close" => Builtin::Close,
        "strategy.close_all" => Builtin::CloseAll,
        "plot" => Builtin::Plot,
        _ => {
            if let Some(f) = name.strip_prefix("math.").and_then(MathFn::parse) {
                return Some(Builtin::Math(f));
            }
            let bare = name.strip_prefix("ta.").unwrap_or(name);
            return ta_kind(bare).map(Builtin::Ta);
        }
    };
    Some(builtin)
}

fn ta_kind(name: &str) -> Option<TaKind> {
    Some(match name {
        "sma" => TaKind::Sma,
        "ema" => TaKind::Ema,
        "rma" => TaKind::Rma,
        "stdev" => TaKind::Stdev,
        "change" => TaKind::Change,
        "highest" => TaKind::Highest,
        "lowest" => TaKind::Lowest,
        "rsi" => TaKind::Rsi,
        "bb" => TaKind::Bb,
        "macd" => TaKind::Macd,
        "pivothigh" => TaKind::PivotHigh,
        "pivotlow" => TaKind::PivotLow,
        "crossover" => TaKind::Crossover,
        "crossunder" => TaKind::Crossunder,
        "tr" => TaKind::Tr,
        "atr" => TaKind::Atr,
        "fixnan" => TaKind::FixNan,
        "valuewhen" => TaKind::ValueWhen,
        _ => return None,
    })
}

/// Call arguments split into positional ones and named ones from a trailing
/// object literal (`plot(x, {title: "T", color: color.red})`).
pub struct CallArgs<'a> {
    positional: &'a [Expr],
    named: Vec<(&'a str, &'a Expr)>,
}

impl<'a> CallArgs<'a> {
    pub fn new(arguments: &'a [Expr]) -> Self {
        match arguments.split_last() {
            Some((last, rest)) => match &last.kind {
                ExprKind::Object(props) => Self {
                    positional: rest,
                    named: props.iter().map(|p| (p.key.as_str(), &p.value)).collect(),
                },
                _ => Self {
                    positional: arguments,
                    named: Vec::new(),
                },
            },
            None => Self {
                positional: arguments,
                named: Vec::new(),
            },
        }
    }

    /// Named argument `name`, else positional `index`.
    pub fn get(&self, index: usize, name: &str) -> Option<&'a Expr> {
        self.named(name).or_else(|| self.positional.get(index))
    }

    pub fn named(&self, name: &str) -> Option<&'a Expr> {
        self.named
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    pub fn named_all(&self) -> &[(&'a str, &'a Expr)] {
        &self.named
    }

    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, Property};

    fn lit(v: f64) -> Expr {
        Expr {
            kind: ExprKind::Literal(Literal::Number(v)),
            path: String::new(),
        }
    }

    #[test]
    fn resolves_prefixed_and_bare_names() {
        assert_eq!(resolve_callee("ta.sma"), Some(Builtin::Ta(TaKind::Sma)));
        assert_eq!(resolve_callee("sma"), Some(Builtin::Ta(TaKind::Sma)));
        assert_eq!(resolve_callee("math.abs"), Some(Builtin::Math(MathFn::Abs)));
        assert_eq!(resolve_callee("study"), Some(Builtin::Indicator));
        assert_eq!(resolve_callee("ta.nope"), None);
        assert!(resolve_callee("plot").unwrap().is_statement());
        assert!(!resolve_callee("nz").unwrap().is_statement());
    }

    #[test]
    fn trailing_object_becomes_named_arguments() {
        let args = vec![
            lit(1.0),
            Expr {
                kind: ExprKind::Object(vec![Property {
                    key: "title".into(),
                    value: lit(2.0),
                }]),
                path: String::new(),
            },
        ];
        let call = CallArgs::new(&args);
        assert_eq!(call.positional_len(), 1);
        assert_eq!(call.get(1, "title"), Some(&lit(2.0)));
        assert_eq!(call.get(0, "series"), Some(&lit(1.0)));
        assert_eq!(call.get(2, "color"), None);
    }
}
