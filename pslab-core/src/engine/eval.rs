//! Expression evaluation over a [`SeriesReader`].
//!
//! The same evaluator serves the bar loop (reads go through forward series and
//! the bar context) and batch precompute (reads index whole arrays).

use crate::ast::BinaryOp;
use crate::lower::ir::{apply_binary, apply_unary, Expr, SlotId};
use crate::value::{from_bool, nz, truthy, NA};

/// Read access to slot values relative to the bar being evaluated.
pub trait SeriesReader {
    /// Value of `slot` at `offset` bars back; NA before the first bar.
    fn read(&self, slot: SlotId, offset: usize) -> f64;

    /// Index of the bar being evaluated.
    fn bar_index(&self) -> usize;
}

pub fn eval<R: SeriesReader + ?Sized>(expr: &Expr, reader: &R) -> f64 {
    match expr {
        Expr::Const(v) => *v,
        Expr::Read { slot, offset } => reader.read(*slot, *offset),
        Expr::Lagged { value, offset } => {
            if reader.bar_index() < *offset {
                NA
            } else {
                *value
            }
        }
        Expr::Unary { op, operand } => apply_unary(*op, eval(operand, reader)),
        // Short-circuit: the right side is not evaluated once the left decides.
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => from_bool(truthy(eval(left, reader)) && truthy(eval(right, reader))),
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => from_bool(truthy(eval(left, reader)) || truthy(eval(right, reader))),
        Expr::Binary { op, left, right } => {
            apply_binary(*op, eval(left, reader), eval(right, reader))
        }
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => {
            if truthy(eval(test, reader)) {
                eval(then, reader)
            } else {
                eval(otherwise, reader)
            }
        }
        Expr::IsNa(value) => from_bool(eval(value, reader).is_nan()),
        Expr::Nz { value, replacement } => nz(eval(value, reader), eval(replacement, reader)),
        Expr::Math { func, args } => {
            let values: Vec<f64> = args.iter().map(|a| eval(a, reader)).collect();
            func.apply(&values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnaryOp;

    /// Reads a fixed column per slot at a given bar.
    struct Columns {
        columns: Vec<Vec<f64>>,
        bar: usize,
    }

    impl SeriesReader for Columns {
        fn read(&self, slot: SlotId, offset: usize) -> f64 {
            if offset > self.bar {
                return NA;
            }
            self.columns[slot.0][self.bar - offset]
        }

        fn bar_index(&self) -> usize {
            self.bar
        }
    }

    fn read(slot: usize, offset: usize) -> Box<Expr> {
        Box::new(Expr::Read {
            slot: SlotId(slot),
            offset,
        })
    }

    #[test]
    fn reads_and_arithmetic() {
        let r = Columns {
            columns: vec![vec![1.0, 2.0, 4.0]],
            bar: 2,
        };
        let diff = Expr::Binary {
            op: BinaryOp::Sub,
            left: read(0, 0),
            right: read(0, 1),
        };
        assert_eq!(eval(&diff, &r), 2.0);
        let before_start = Expr::Binary {
            op: BinaryOp::Sub,
            left: read(0, 0),
            right: read(0, 3),
        };
        assert!(eval(&before_start, &r).is_nan());
    }

    #[test]
    fn lagged_constant_is_na_until_enough_bars() {
        let expr = Expr::Lagged {
            value: 5.0,
            offset: 2,
        };
        let early = Columns {
            columns: vec![],
            bar: 1,
        };
        let later = Columns {
            columns: vec![],
            bar: 2,
        };
        assert!(eval(&expr, &early).is_nan());
        assert_eq!(eval(&expr, &later), 5.0);
    }

    #[test]
    fn logical_operators_short_circuit_and_treat_na_as_false() {
        let r = Columns {
            columns: vec![vec![NA], vec![1.0]],
            bar: 0,
        };
        let and = Expr::Binary {
            op: BinaryOp::And,
            left: read(0, 0),
            right: read(1, 0),
        };
        let or = Expr::Binary {
            op: BinaryOp::Or,
            left: read(0, 0),
            right: read(1, 0),
        };
        assert_eq!(eval(&and, &r), 0.0);
        assert_eq!(eval(&or, &r), 1.0);
        let not_na = Expr::Unary {
            op: UnaryOp::Not,
            operand: read(0, 0),
        };
        assert!(eval(&not_na, &r).is_nan());
    }

    #[test]
    fn conditional_nz_and_is_na() {
        let r = Columns {
            columns: vec![vec![NA]],
            bar: 0,
        };
        let cond = Expr::Conditional {
            test: Box::new(Expr::IsNa(read(0, 0))),
            then: Box::new(Expr::Const(1.0)),
            otherwise: Box::new(Expr::Const(2.0)),
        };
        assert_eq!(eval(&cond, &r), 1.0);
        let filled = Expr::Nz {
            value: read(0, 0),
            replacement: Box::new(Expr::Const(7.0)),
        };
        assert_eq!(eval(&filled, &r), 7.0);
    }
}
