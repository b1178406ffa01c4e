//! Lexical scopes for declared names.
//!
//! A declaration inside an `if` branch is visible only in that branch.
//! Redeclaring a name that is still visible is rejected; sibling branches may
//! reuse names.

use std::collections::HashMap;

use super::ir::SlotId;

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Loop-invariant number (literals, folded constants, resolved inputs).
    Scalar(f64),
    /// Loop-invariant text (ids, titles, `strategy.long`, colors).
    Text(String),
    /// Per-bar value held in a forward series.
    Series(SlotId),
}

#[derive(Debug)]
pub struct Scope {
    frames: Vec<HashMap<String, Binding>>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Bind `name` in the innermost frame. Fails if `name` is visible.
    pub fn declare(&mut self, name: &str, binding: Binding) -> Result<(), ()> {
        if self.lookup(name).is_some() {
            return Err(());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), binding);
        }
        Ok(())
    }
}
