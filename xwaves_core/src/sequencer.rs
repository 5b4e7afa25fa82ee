//! Expansion of trip legs into the ordered list of stage positions.
//!
//! Positions are computed as `start + i * step` rather than by accumulation,
//! and the final point of every leg is exactly `end_ps`. A candidate that
//! lands within `step * 1e-9` of the end is folded into the endpoint so no
//! near-duplicate pair appears at the end of a leg. Legs are concatenated in
//! declaration order without sorting or de-duplication.

use crate::config::{LegDescriptor, check_leg};
use crate::error::{ScanError, invalid};

/// Upper bound on positions produced by a single leg.
pub const MAX_POSITIONS_PER_LEG: usize = 1_000_000;

const END_SNAP_FRACTION: f64 = 1e-9;

/// Number of steps needed to walk a valid leg: `ceil((end - start) / step)`,
/// with the same endpoint snapping as [`expand_leg`].
pub fn leg_step_count(leg: &LegDescriptor) -> usize {
    let span = leg.end_ps - leg.start_ps;
    if span <= 0.0 {
        return 0;
    }
    let steps = (span / leg.step_ps - END_SNAP_FRACTION).ceil();
    if steps <= 0.0 {
        0
    } else if steps >= usize::MAX as f64 {
        usize::MAX
    } else {
        steps as usize
    }
}

/// Expand one leg into positions.
pub fn expand_leg(leg: &LegDescriptor) -> Result<Vec<f64>, ScanError> {
    check_leg(leg)?;
    let steps = leg_step_count(leg);
    if steps >= MAX_POSITIONS_PER_LEG {
        return Err(invalid(format!(
            "leg {}..{} ps with step {} ps needs more than {MAX_POSITIONS_PER_LEG} positions",
            leg.start_ps, leg.end_ps, leg.step_ps
        )));
    }

    let mut out = Vec::with_capacity(steps + 1);
    out.extend((0..steps).map(|i| leg.start_ps + (i as f64) * leg.step_ps));
    // Large offsets with tiny steps can round a candidate onto the endpoint.
    while out.last().is_some_and(|&p| p >= leg.end_ps) {
        out.pop();
    }
    out.push(leg.end_ps);
    Ok(out)
}

/// Expand all legs, in order, into a single position list.
pub fn expand(legs: &[LegDescriptor]) -> Result<Vec<f64>, ScanError> {
    let mut out = Vec::new();
    for leg in legs {
        out.extend(expand_leg(leg)?);
    }
    Ok(out)
}
