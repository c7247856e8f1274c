//! Status transition tables
//!
//! Each entity with a lifecycle declares a static table of permitted status
//! changes and the side effects every change triggers. Callers resolve a
//! `(from, to)` pair against the table and then apply the returned effects
//! explicitly, so no field is ever written implicitly by a status change.

use crate::error::AppError;
use crate::AppResult;
use std::fmt;

/// How a table treats pairs it does not list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    /// Unlisted transitions are rejected with `InvalidTransition`
    Strict,
    /// Unlisted transitions are allowed and carry no effects
    Open,
}

/// One permitted status change
#[derive(Debug)]
pub struct TransitionRule<S: 'static, E: 'static> {
    /// Source statuses; empty matches any source
    pub from: &'static [S],
    pub to: S,
    pub effects: &'static [E],
}

/// Transition table for one entity
#[derive(Debug)]
pub struct TransitionTable<S: 'static, E: 'static> {
    entity: &'static str,
    mode: TransitionMode,
    rules: &'static [TransitionRule<S, E>],
}

impl<S, E> TransitionTable<S, E>
where
    S: Copy + PartialEq + fmt::Display,
{
    pub const fn new(
        entity: &'static str,
        mode: TransitionMode,
        rules: &'static [TransitionRule<S, E>],
    ) -> Self {
        Self {
            entity,
            mode,
            rules,
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Resolve a status change to its side effects.
    ///
    /// Moving to the current status is a no-op with no effects.
    pub fn resolve(&self, from: S, to: S) -> AppResult<&'static [E]> {
        if from == to {
            return Ok(&[]);
        }

        let rule = self
            .rules
            .iter()
            .find(|r| r.to == to && (r.from.is_empty() || r.from.contains(&from)));

        match (rule, self.mode) {
            (Some(rule), _) => Ok(rule.effects),
            (None, TransitionMode::Open) => Ok(&[]),
            (None, TransitionMode::Strict) => Err(AppError::InvalidTransition {
                entity: self.entity,
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    /// Check whether a change is permitted without returning effects
    pub fn allows(&self, from: S, to: S) -> bool {
        self.resolve(from, to).is_ok()
    }

    /// Statuses reachable from `from` in one step
    pub fn targets(&self, from: S) -> Vec<S> {
        let mut out: Vec<S> = Vec::new();
        for rule in self.rules {
            if (rule.from.is_empty() || rule.from.contains(&from))
                && rule.to != from
                && !out.contains(&rule.to)
            {
                out.push(rule.to);
            }
        }
        out
    }
}
