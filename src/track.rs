//! Safety-car and virtual-safety-car periods from the track status log.

use crate::data::{Lap, TrackStatusEvent};

/// Closed interval `[start, end]` of neutralized pace, in session seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeutralizedPeriod {
    pub start: f64,
    pub end: f64,
}

impl NeutralizedPeriod {
    /// A lap overlaps unless it ended before the period started or started
    /// after it ended. Missing timing can't be cleared, so it counts as overlapping.
    pub fn overlaps(&self, lap: &Lap) -> bool {
        match (lap.lap_start_time, lap.lap_end_time) {
            (Some(start), Some(end)) => !(end < self.start || start > self.end),
            _ => true,
        }
    }
}

pub fn extract_sc_vsc_periods(events: &[TrackStatusEvent]) -> Vec<NeutralizedPeriod> {
    let mut periods = Vec::new();
    let mut open: Option<f64> = None;

    for event in events {
        if event.message.contains("SCDeployed") || event.message.contains("VSCDeployed") {
            open = Some(event.time);
        } else if event.message.contains("AllClear") {
            if let Some(start) = open.take() {
                periods.push(NeutralizedPeriod { start, end: event.time });
            }
        }
    }

    // still neutralized when the log ends
    if let Some(start) = open {
        periods.push(NeutralizedPeriod { start, end: f64::INFINITY });
    }
    periods
}
