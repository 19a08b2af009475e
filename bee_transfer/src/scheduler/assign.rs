//! Tip and angle assignment.
//!
//! Picks the next transfers for a free channel set from the pending list.
//! Two transfers are paired when both their source wells and their
//! destination wells can sit under the two tips at some stage rotation.
//! The search widens the index distance between the two candidates one step
//! at a time; when no pair works, the first candidate goes out single-tip.
//!
//! Destination wells written as `any` are resolved here and reserved before
//! the caller releases the pending-list lock.
//!
//! Several transfers may pool into one well. A transfer whose well is
//! `Reserved` by a run in flight waits until that run marks it `Used`; a
//! well that is already `Used` takes further dispenses and stays `Used`.

use bee_common::plate::{DestinationPlate, PlateError, Transfer, WellUsage};
use bee_common::wells::{LabwareFormat, Well, WellSpec, angle_for_two_tips};
use tracing::debug;

/// Transfers picked for one run with their stage angles.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// One transfer per channel, destination wells resolved and reserved.
    pub transfers: Vec<Transfer>,
    pub source_angle: f64,
    pub dest_angle: f64,
}

impl Assignment {
    pub fn is_dual(&self) -> bool {
        self.transfers.len() > 1
    }
}

/// Where the two tips sit relative to each other over each stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipPair {
    pub channels: (u8, u8),
    pub source_spacing: f64,
    pub dest_spacing: f64,
}

/// Take the next assignment for `source` → `dest` out of `pending`.
///
/// `pair` is `None` when only one channel is available. Returns `Ok(None)`
/// when no pending transfer matches, or when every match waits on a well
/// held by a run in flight.
pub fn take_assignment(
    pending: &mut Vec<Transfer>,
    dest: &mut DestinationPlate,
    source: &str,
    source_format: LabwareFormat,
    pair: Option<TipPair>,
) -> Result<Option<Assignment>, PlateError> {
    let candidates: Vec<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, t)| t.source.barcode == source && t.destination.barcode == dest.barcode())
        .filter(|(_, t)| !in_flight(dest, t))
        .map(|(i, _)| i)
        .collect();
    let Some(&first) = candidates.first() else {
        return Ok(None);
    };

    if let Some(pair) = pair.filter(|_| candidates.len() > 1) {
        for increment in 1..candidates.len() {
            for k in 0..candidates.len() - increment {
                let (a, b) = (candidates[k], candidates[k + increment]);
                let Some(source_angle) = angle_for_two_tips(
                    source_format,
                    &pending[a].source_well,
                    &pending[b].source_well,
                    pair.channels.0,
                    pair.channels.1,
                    pair.source_spacing,
                ) else {
                    continue;
                };
                let Some((well_a, well_b, dest_angle)) = dest_pair(
                    dest,
                    pending[a].primary_destination(),
                    pending[b].primary_destination(),
                    pair,
                ) else {
                    continue;
                };

                claim(dest, well_a)?;
                claim(dest, well_b)?;
                let first = claim_rest(dest, pending[a].with_destination(well_a))?;
                let second = claim_rest(dest, pending[b].with_destination(well_b))?;
                // higher index first so the lower one stays valid
                pending.remove(b);
                pending.remove(a);
                debug!(
                    "Paired {} and {} at source {:.2}°, destination {:.2}°",
                    first, second, source_angle, dest_angle
                );
                return Ok(Some(Assignment {
                    transfers: vec![first, second],
                    source_angle,
                    dest_angle,
                }));
            }
        }
    }

    let well = match pending[first].primary_destination() {
        WellSpec::At(well) => well,
        WellSpec::Any => dest
            .first_available_well()
            .ok_or_else(|| PlateError::NoAvailableWell(dest.barcode().to_string()))?,
    };
    claim(dest, well)?;
    let transfer = claim_rest(dest, pending[first].with_destination(well))?;
    pending.remove(first);
    debug!("Single tip for {}", transfer);
    Ok(Some(Assignment {
        transfers: vec![transfer],
        source_angle: 0.0,
        dest_angle: 0.0,
    }))
}

/// Whether one of the transfer's explicit wells is held by a run in flight.
fn in_flight(dest: &DestinationPlate, transfer: &Transfer) -> bool {
    transfer
        .resolved_destinations()
        .any(|well| dest.usage(&well) == WellUsage::Reserved)
}

/// Reserve `well` unless an earlier transfer already filled it.
fn claim(dest: &mut DestinationPlate, well: Well) -> Result<(), PlateError> {
    match dest.usage(&well) {
        WellUsage::Used => Ok(()),
        _ => dest.reserve(well),
    }
}

/// Resolve and claim the destination wells after the primary one.
fn claim_rest(dest: &mut DestinationPlate, mut transfer: Transfer) -> Result<Transfer, PlateError> {
    for spec in transfer.destination_wells.iter_mut().skip(1) {
        let well = match *spec {
            WellSpec::At(well) => well,
            WellSpec::Any => dest
                .first_available_well()
                .ok_or_else(|| PlateError::NoAvailableWell(dest.barcode().to_string()))?,
        };
        claim(dest, well)?;
        *spec = WellSpec::At(well);
    }
    Ok(transfer)
}

/// Destination wells and angle for a candidate pair, resolving `any`.
fn dest_pair(
    dest: &DestinationPlate,
    a: WellSpec,
    b: WellSpec,
    pair: TipPair,
) -> Option<(Well, Well, f64)> {
    let format = dest.format();
    let angle = |w1: &Well, w2: &Well| {
        angle_for_two_tips(
            format,
            w1,
            w2,
            pair.channels.0,
            pair.channels.1,
            pair.dest_spacing,
        )
    };
    let free = move |exclude: Well| {
        (0..format.well_count())
            .filter_map(move |index| Well::from_index(format, index).ok())
            .filter(move |w| *w != exclude && dest.usage(w) == WellUsage::Unused)
    };

    match (a, b) {
        (WellSpec::At(wa), WellSpec::At(wb)) => angle(&wa, &wb).map(|deg| (wa, wb, deg)),
        (WellSpec::At(wa), WellSpec::Any) => {
            free(wa).find_map(|wb| angle(&wa, &wb).map(|deg| (wa, wb, deg)))
        }
        (WellSpec::Any, WellSpec::At(wb)) => {
            free(wb).find_map(|wa| angle(&wa, &wb).map(|deg| (wa, wb, deg)))
        }
        (WellSpec::Any, WellSpec::Any) => {
            let wa = dest.first_available_well()?;
            free(wa).find_map(|wb| angle(&wa, &wb).map(|deg| (wa, wb, deg)))
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
