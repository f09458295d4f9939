//! Frequency aggregation of classified error lines

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::result::ExecutionResult;

/// One distinct error line and how often it was seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub line: String,
    pub count: usize,
}

/// Error lines across a whole request, most frequent first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub entries: Vec<ErrorCount>,
}

impl AggregatedReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of error lines
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Occurrences of one line
    pub fn count(&self, line: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.line == line)
            .map(|e| e.count)
            .unwrap_or(0)
    }
}

/// Merge the classified errors of all results into frequency counts.
///
/// Results are visited in (target, script) order, so ties between equally frequent
/// lines are broken by first appearance in that order, whatever order the results
/// arrive in.
pub fn aggregate(results: &[ExecutionResult]) -> AggregatedReport {
    let mut ordered: Vec<&ExecutionResult> = results.iter().collect();
    ordered.sort_by(|a, b| {
        a.target
            .cmp(&b.target)
            .then_with(|| a.script.cmp(&b.script))
            .then_with(|| a.errors.cmp(&b.errors))
    });

    // line -> (count, first seen)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut position = 0;
    for result in ordered {
        for line in &result.errors {
            let entry = counts.entry(line.as_str()).or_insert((0, position));
            entry.0 += 1;
            position += 1;
        }
    }

    let mut entries: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(line, (count, first))| (line, count, first))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));

    AggregatedReport {
        entries: entries
            .into_iter()
            .map(|(line, count, _)| ErrorCount {
                line: line.to_string(),
                count,
            })
            .collect(),
    }
}
