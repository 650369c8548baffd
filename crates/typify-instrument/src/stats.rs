//! Per-strategy instrumentation counters

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Candidates seen and candidates instrumented for one strategy
#[derive(Debug, Default)]
pub struct StatEntry {
    total: AtomicUsize,
    matched: AtomicUsize,
}

impl StatEntry {
    /// Count one candidate, and one instrumentation if `matched`
    pub fn record(&self, matched: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn matched(&self) -> usize {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            total: self.total(),
            matched: self.matched(),
        }
    }
}

/// Counters shared by every file of a run
#[derive(Debug, Default)]
pub struct Stats {
    pub function_declaration: StatEntry,
    pub var_function_expression: StatEntry,
    pub return_function_expression: StatEntry,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            function_declaration: self.function_declaration.snapshot(),
            var_function_expression: self.var_function_expression.snapshot(),
            return_function_expression: self.return_function_expression.snapshot(),
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub total: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub function_declaration: EntrySnapshot,
    pub var_function_expression: EntrySnapshot,
    pub return_function_expression: EntrySnapshot,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Function declarations", self.function_declaration),
            ("Var function expression", self.var_function_expression),
            ("Return function expression", self.return_function_expression),
        ];
        for (i, (label, entry)) in rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{label}: {} / {}", entry.matched, entry.total)?;
        }
        Ok(())
    }
}
