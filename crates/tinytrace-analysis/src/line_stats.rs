use indexmap::IndexMap;
use tinytrace_core::LineStats;

/// Accumulates per-line execution counts and wall time.
///
/// Lines are kept in first-encountered order for export.
#[derive(Debug, Default)]
pub struct LineStatsTracker {
    lines: IndexMap<u32, LineStats>,
}

impl LineStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one execution of `line` taking `elapsed` seconds and returns
    /// the line's stats as of this execution.
    pub fn record(&mut self, line: u32, elapsed: f64) -> LineStats {
        let stats = self.lines.entry(line).or_insert_with(|| LineStats::new(line));
        stats.record(elapsed);
        stats.clone()
    }

    pub fn get(&self, line: u32) -> Option<&LineStats> {
        self.lines.get(&line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines in first-encountered order.
    pub fn export(&self) -> Vec<LineStats> {
        self.lines.values().cloned().collect()
    }
}
