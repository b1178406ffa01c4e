//! Human-readable bar-loop listing of a lowered program (`pslab emit`).
//!
//! The listing shows what runs where: the batch section computed once over
//! all bars, then the loop body with its series feeds, strategy hooks and
//! the final `next()` advance.

use std::fmt::Write;

use super::ir::{Expr, LoweredProgram, Precompute, SlotId, SlotKind, Stmt};

/// Render `program` as bar-loop pseudo-source.
pub fn render(program: &LoweredProgram) -> String {
    let mut out = String::new();
    let r = Renderer { program };
    r.write(&mut out);
    out
}

struct Renderer<'a> {
    program: &'a LoweredProgram,
}

impl Renderer<'_> {
    fn write(&self, out: &mut String) {
        let p = self.program;
        if let Some(title) = &p.title {
            let _ = writeln!(out, "// {title}");
        }
        for input in &p.inputs {
            let _ = writeln!(out, "// input \"{}\" = {:?}", input.title, input.value);
        }

        let _ = writeln!(out, "\n// batch, once over all bars");
        for step in &p.precompute {
            match step {
                Precompute::Derived { slot, expr } => {
                    let _ = writeln!(
                        out,
                        "{}Array = map(i => {})",
                        self.ident(*slot),
                        self.batch_expr(expr)
                    );
                }
                Precompute::Ta {
                    func,
                    inputs,
                    outputs,
                } => {
                    let targets: Vec<String> =
                        outputs.iter().map(|s| format!("{}Array", self.ident(*s))).collect();
                    let args: Vec<String> =
                        inputs.iter().map(|s| format!("{}Array", self.ident(*s))).collect();
                    let mut call = format!("{}({}", func.name(), args.join(", "));
                    for param in func.params() {
                        let _ = write!(call, ", {param}");
                    }
                    call.push(')');
                    if func.emit_delay() > 0 {
                        call = format!("delay({call}, {})", func.emit_delay());
                    }
                    let _ = writeln!(out, "[{}] = {call}", targets.join(", "));
                }
            }
        }

        let _ = writeln!(out, "\nfor i in 0..bars.len() {{");
        let _ = writeln!(out, "    ctx.advance()");
        if let Some(strategy) = &p.strategy {
            let _ = writeln!(
                out,
                "    if i == 0 {{ strategy.call(\"{}\", {}) }}",
                strategy.title,
                strategy
                    .initial_capital
                    .map_or_else(|| "default".to_string(), |c| c.to_string())
            );
            let _ = writeln!(out, "    strategy.on_bar_update(i, open, time)");
        }
        for (slot, field) in &p.state_feeds {
            let _ = writeln!(
                out,
                "    {}Series.set(strategy.{}())",
                self.ident(*slot),
                field.name()
            );
        }
        for slot in &p.feeds {
            let name = self.ident(*slot);
            let _ = writeln!(out, "    {name}Series.set({name}Array[i])");
        }
        self.stmts(out, &p.body, 1);
        let series: Vec<SlotId> = (0..p.slots.len())
            .map(SlotId)
            .filter(|s| p.slot(*s).is_series())
            .collect();
        if !series.is_empty() {
            let _ = writeln!(out, "    if !ctx.is_last_bar() {{");
            for slot in series {
                let _ = writeln!(out, "        {}Series.next()", self.ident(slot));
            }
            let _ = writeln!(out, "    }}");
        }
        let _ = writeln!(out, "}}");
    }

    fn stmts(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        let pad = "    ".repeat(depth);
        for stmt in stmts {
            match stmt {
                Stmt::Assign { slot, value } => {
                    let _ = writeln!(
                        out,
                        "{pad}{}Series.set({})",
                        self.ident(*slot),
                        self.expr(value)
                    );
                }
                Stmt::If {
                    test,
                    then,
                    otherwise,
                } => {
                    let _ = writeln!(out, "{pad}if {} {{", self.expr(test));
                    self.stmts(out, then, depth + 1);
                    if !otherwise.is_empty() {
                        let _ = writeln!(out, "{pad}}} else {{");
                        self.stmts(out, otherwise, depth + 1);
                    }
                    let _ = writeln!(out, "{pad}}}");
                }
                Stmt::Entry { id, direction, qty } => {
                    let _ = writeln!(
                        out,
                        "{pad}strategy.entry(\"{id}\", {}, {})",
                        direction.as_str(),
                        self.expr(qty)
                    );
                }
                Stmt::Exit { id, from_entry } => match from_entry {
                    Some(from) => {
                        let _ = writeln!(out, "{pad}strategy.exit(\"{id}\", \"{from}\")");
                    }
                    None => {
                        let _ = writeln!(out, "{pad}strategy.exit(\"{id}\")");
                    }
                },
                Stmt::Close { id } => {
                    let _ = writeln!(out, "{pad}strategy.close(\"{id}\")");
                }
                Stmt::CloseAll => {
                    let _ = writeln!(out, "{pad}strategy.close_all()");
                }
                Stmt::Plot { title, value, .. } => {
                    let _ = writeln!(out, "{pad}plot(\"{title}\", time, {})", self.expr(value));
                }
            }
        }
    }

    /// Series variable stem for a slot.
    fn ident(&self, slot: SlotId) -> String {
        let s = self.program.slot(slot);
        match &s.kind {
            SlotKind::Bar(field) => field.name().to_string(),
            SlotKind::Strategy(field) => format!("strategy_{}", field.name()),
            SlotKind::Ta => format!("ta{}", slot.0),
            SlotKind::User => s
                .name
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect(),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        self.expr_with(expr, &|slot, offset| {
            let s = self.program.slot(slot);
            match s.kind {
                SlotKind::Bar(_) if offset == 0 => self.ident(slot),
                SlotKind::Bar(_) => format!("{}[{offset}]", self.ident(slot)),
                _ => format!("{}Series.get({offset})", self.ident(slot)),
            }
        })
    }

    fn batch_expr(&self, expr: &Expr) -> String {
        self.expr_with(expr, &|slot, offset| {
            if offset == 0 {
                format!("{}Array[i]", self.ident(slot))
            } else {
                format!("{}Array[i-{offset}]", self.ident(slot))
            }
        })
    }

    fn expr_with(&self, expr: &Expr, read: &dyn Fn(SlotId, usize) -> String) -> String {
        match expr {
            Expr::Const(v) if v.is_nan() => "na".to_string(),
            Expr::Const(v) => v.to_string(),
            Expr::Read { slot, offset } => read(*slot, *offset),
            Expr::Lagged { value, offset } => format!("lag({value}, {offset})"),
            Expr::Unary { op, operand } => {
                format!("{}{}", op.symbol(), self.expr_with(operand, read))
            }
            Expr::Binary { op, left, right } => format!(
                "({} {} {})",
                self.expr_with(left, read),
                op.symbol(),
                self.expr_with(right, read)
            ),
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => format!(
                "({} ? {} : {})",
                self.expr_with(test, read),
                self.expr_with(then, read),
                self.expr_with(otherwise, read)
            ),
            Expr::IsNa(value) => format!("na({})", self.expr_with(value, read)),
            Expr::Nz { value, replacement } => format!(
                "nz({}, {})",
                self.expr_with(value, read),
                self.expr_with(replacement, read)
            ),
            Expr::Math { func, args } => {
                let args: Vec<String> = args.iter().map(|a| self.expr_with(a, read)).collect();
                format!("{}({})", func.name(), args.join(", "))
            }
        }
    }
}
