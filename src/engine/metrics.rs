//! Chain run metrics.
//!
//! The intended usage is:
//!
//! - `Chain::apply` for normal operation.
//! - `Chain::apply_with_metrics` for profiling and for seeing what each link
//!   produced.
//!
//! Metrics are opt-in. The plain `apply` path records nothing; the metrics
//! path renders one bounded preview per link, which allocates.

use crate::value::Value;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for [`Chain::apply_with_metrics`](super::Chain::apply_with_metrics).
    pub total: Duration,
    /// One entry per link that actually ran, in chain order.
    pub steps: Vec<StepMetrics>,
    /// Links never reached because the value went null.
    pub skipped: usize,
}

/// Timing and output of a single link.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    /// Link label, e.g. `css("li")`.
    pub link: String,
    pub duration: Duration,
    /// Bounded preview of the value the link produced.
    pub output: String,
    /// Whether the output was still a node or node list.
    pub node_like: bool,
}

/// Chain output bundled with timing information.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub value: Value,
    pub metrics: RunMetrics,
}

impl RunMetrics {
    /// Slowest link that ran, if any.
    pub fn slowest(&self) -> Option<&StepMetrics> {
        self.steps.iter().max_by_key(|step| step.duration)
    }
}
