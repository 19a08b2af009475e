//! Resource arbiter for stages and channels.
//!
//! Grants mutually exclusive access to plate stages and pipetting channels
//! across scheduler threads. Requests block until the resource frees up,
//! re-checking at least every poll interval so the abort signal and the
//! optional acquire timeout are honoured.
//!
//! Every grant is returned as a lease guard. Dropping the guard releases the
//! resource, so a failing transfer cannot leave a stage or channel locked.
//!
//! A stage carries three independent facts:
//! - its lock status (`Free`, `Reserved` for plate loading, `Locked` by a
//!   channel set for a transfer)
//! - the plate currently loaded on it
//! - a holder count of scheduler threads working from its plate; the plate
//!   is unloaded only when the count returns to zero

use crate::abort::AbortSignal;
use crate::error::ArbiterError;
use bee_common::consts::POLL_INTERVAL_MS;
use bee_common::plate::PlateRef;
use bee_hal::Deck;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Role a stage is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    Source,
    Destination,
}

/// Lock status of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Free,
    /// Held by a scheduler while a plate is loaded or unloaded.
    Reserved(StageMode),
    /// Held by a transfer for the listed channels.
    Locked { mode: StageMode, channels: Vec<u8> },
}

#[derive(Debug)]
struct StageSlot {
    id: u8,
    status: StageStatus,
    plate: Option<PlateRef>,
    holders: usize,
}

#[derive(Debug)]
struct ChannelSlot {
    id: u8,
    busy: bool,
}

#[derive(Debug, Default)]
struct Resources {
    stages: Vec<StageSlot>,
    channels: Vec<ChannelSlot>,
}

impl Resources {
    fn stage(&self, id: u8) -> Result<&StageSlot, ArbiterError> {
        self.stages
            .iter()
            .find(|s| s.id == id)
            .ok_or(ArbiterError::UnknownStage(id))
    }

    fn stage_mut(&mut self, id: u8) -> Result<&mut StageSlot, ArbiterError> {
        self.stages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ArbiterError::UnknownStage(id))
    }
}

pub struct ResourceArbiter {
    resources: Mutex<Resources>,
    released: Condvar,
    poll_interval: Duration,
    timeout: Option<Duration>,
    abort: AbortSignal,
}

impl std::fmt::Debug for ResourceArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceArbiter")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ResourceArbiter {
    /// Arbiter over the given stage and channel ids. Waits are unbounded
    /// until [`with_timeout`](Self::with_timeout) sets a limit.
    pub fn new(
        stages: impl IntoIterator<Item = u8>,
        channels: impl IntoIterator<Item = u8>,
        abort: AbortSignal,
    ) -> Self {
        let resources = Resources {
            stages: stages
                .into_iter()
                .map(|id| StageSlot {
                    id,
                    status: StageStatus::Free,
                    plate: None,
                    holders: 0,
                })
                .collect(),
            channels: channels
                .into_iter()
                .map(|id| ChannelSlot { id, busy: false })
                .collect(),
        };
        Self {
            resources: Mutex::new(resources),
            released: Condvar::new(),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            timeout: None,
            abort,
        }
    }

    /// Arbiter over every stage and channel of `deck`, with the deck's poll
    /// interval and acquire timeout.
    pub fn for_deck(deck: &Deck, abort: AbortSignal) -> Self {
        Self::new(
            deck.stages().iter().map(|s| s.id()),
            deck.channels().iter().map(|c| c.id()),
            abort,
        )
        .with_poll_interval(deck.config().poll_interval())
        .with_timeout(deck.config().acquire_timeout())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `attempt` grants something, the abort signal is raised,
    /// or the timeout expires.
    fn wait_until<T>(
        &self,
        resource: impl Fn() -> String,
        mut attempt: impl FnMut(&mut Resources) -> Result<Option<T>, ArbiterError>,
    ) -> Result<T, ArbiterError> {
        let started = Instant::now();
        let mut resources = self.resources.lock();
        loop {
            if let Some(granted) = attempt(&mut resources)? {
                return Ok(granted);
            }
            if self.abort.is_aborted() {
                return Err(ArbiterError::Cancelled(resource()));
            }
            let waited = started.elapsed();
            if let Some(timeout) = self.timeout {
                if waited >= timeout {
                    warn!("Gave up waiting for {} after {:?}", resource(), waited);
                    return Err(ArbiterError::TimedOut {
                        resource: resource(),
                        waited,
                    });
                }
            }
            trace!("Waiting for {}", resource());
            self.released.wait_for(&mut resources, self.poll_interval);
        }
    }

    // ─── Stages ─────────────────────────────────────────────────────

    /// Reserve an empty stage for loading a plate.
    pub fn request_stage(&self, mode: StageMode) -> Result<StageLease<'_>, ArbiterError> {
        let stage = self.wait_until(
            || format!("an empty {mode:?} stage"),
            |resources| {
                let slot = resources
                    .stages
                    .iter_mut()
                    .find(|s| s.status == StageStatus::Free && s.plate.is_none());
                Ok(slot.map(|slot| {
                    slot.status = StageStatus::Reserved(mode);
                    slot.id
                }))
            },
        )?;
        debug!("Stage {} reserved as {:?}", stage, mode);
        Ok(StageLease {
            arbiter: self,
            stage,
        })
    }

    /// Lock a loaded stage for a transfer by `channels`.
    ///
    /// The plate must already be recorded with [`set_loaded`](Self::set_loaded).
    pub fn request_stage_for_transfer(
        &self,
        channels: &[u8],
        stage: u8,
        is_destination: bool,
    ) -> Result<StageLease<'_>, ArbiterError> {
        let mode = if is_destination {
            StageMode::Destination
        } else {
            StageMode::Source
        };
        self.wait_until(
            || format!("stage {stage} for channels {channels:?}"),
            |resources| {
                let slot = resources.stage_mut(stage)?;
                if slot.plate.is_none() {
                    return Err(ArbiterError::NotLoaded(stage));
                }
                if slot.status != StageStatus::Free {
                    return Ok(None);
                }
                slot.status = StageStatus::Locked {
                    mode,
                    channels: channels.to_vec(),
                };
                Ok(Some(()))
            },
        )?;
        debug!("Stage {} locked by channels {:?}", stage, channels);
        Ok(StageLease {
            arbiter: self,
            stage,
        })
    }

    pub fn is_stage_available(&self, stage: u8) -> bool {
        self.resources
            .lock()
            .stage(stage)
            .is_ok_and(|slot| slot.status == StageStatus::Free)
    }

    /// Release a stage lock. Unlocking a free stage is a no-op.
    pub fn unlock_stage(&self, stage: u8) {
        let mut resources = self.resources.lock();
        match resources.stage_mut(stage) {
            Ok(slot) => {
                if slot.status != StageStatus::Free {
                    slot.status = StageStatus::Free;
                    debug!("Stage {} unlocked", stage);
                }
            }
            Err(e) => warn!("Ignoring unlock: {}", e),
        }
        drop(resources);
        self.released.notify_all();
    }

    /// Record the plate on a stage, or `None` once it has been taken away.
    pub fn set_loaded(&self, stage: u8, plate: Option<PlateRef>) -> Result<(), ArbiterError> {
        let mut resources = self.resources.lock();
        let slot = resources.stage_mut(stage)?;
        match &plate {
            Some(p) => debug!("Stage {} loaded with {}", stage, p),
            None => debug!("Stage {} emptied", stage),
        }
        slot.plate = plate;
        drop(resources);
        self.released.notify_all();
        Ok(())
    }

    pub fn loaded_plate(&self, stage: u8) -> Option<PlateRef> {
        self.resources
            .lock()
            .stage(stage)
            .ok()
            .and_then(|slot| slot.plate.clone())
    }

    pub fn stage_status(&self, stage: u8) -> Option<StageStatus> {
        self.resources
            .lock()
            .stage(stage)
            .ok()
            .map(|slot| slot.status.clone())
    }

    // ─── Holder counts ──────────────────────────────────────────────

    /// Register one more thread working from the stage's plate.
    pub fn retain(&self, stage: u8) -> Result<StageRetain<'_>, ArbiterError> {
        let mut resources = self.resources.lock();
        let slot = resources.stage_mut(stage)?;
        slot.holders += 1;
        debug!("Stage {} holders: {}", stage, slot.holders);
        Ok(StageRetain {
            arbiter: self,
            stage,
            released: false,
        })
    }

    /// Join a stage that still has holders working from the plate `barcode`.
    ///
    /// Returns `None` once the last holder has let go, since the plate may
    /// already be on its way out.
    pub fn retain_loaded(&self, barcode: &str) -> Option<StageRetain<'_>> {
        let mut resources = self.resources.lock();
        let slot = resources.stages.iter_mut().find(|s| {
            s.holders > 0 && s.plate.as_ref().is_some_and(|p| p.barcode == barcode)
        })?;
        slot.holders += 1;
        debug!("Stage {} holders: {} (joined)", slot.id, slot.holders);
        Some(StageRetain {
            arbiter: self,
            stage: slot.id,
            released: false,
        })
    }

    fn release(&self, stage: u8) -> usize {
        let mut resources = self.resources.lock();
        match resources.stage_mut(stage) {
            Ok(slot) => {
                slot.holders = slot.holders.saturating_sub(1);
                debug!("Stage {} holders: {}", stage, slot.holders);
                slot.holders
            }
            Err(e) => {
                warn!("Ignoring release: {}", e);
                0
            }
        }
    }

    pub fn holders(&self, stage: u8) -> usize {
        self.resources
            .lock()
            .stage(stage)
            .map_or(0, |slot| slot.holders)
    }

    /// A loaded stage nobody works from any more.
    pub fn ready_to_unload(&self, stage: u8) -> bool {
        self.resources
            .lock()
            .stage(stage)
            .is_ok_and(|slot| slot.holders == 0 && slot.plate.is_some())
    }

    // ─── Channels ───────────────────────────────────────────────────

    /// Take `count` free channels at once, lowest ids first.
    pub fn request_channels(&self, count: usize) -> Result<ChannelLease<'_>, ArbiterError> {
        let channels = self.wait_until(
            || format!("{count} free channel(s)"),
            |resources| {
                let available = resources.channels.len();
                if count > available {
                    return Err(ArbiterError::NotEnoughChannels {
                        requested: count,
                        available,
                    });
                }
                let free: Vec<usize> = resources
                    .channels
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.busy)
                    .map(|(i, _)| i)
                    .take(count)
                    .collect();
                if free.len() < count {
                    return Ok(None);
                }
                Ok(Some(
                    free.into_iter()
                        .map(|i| {
                            let slot = &mut resources.channels[i];
                            slot.busy = true;
                            slot.id
                        })
                        .collect::<Vec<u8>>(),
                ))
            },
        )?;
        debug!("Channels {:?} granted", channels);
        Ok(ChannelLease {
            arbiter: self,
            channels,
        })
    }

    pub fn request_channel(&self) -> Result<ChannelLease<'_>, ArbiterError> {
        self.request_channels(1)
    }

    /// Release a channel. Unlocking a free channel is a no-op.
    pub fn unlock_channel(&self, channel: u8) {
        let mut resources = self.resources.lock();
        match resources.channels.iter_mut().find(|c| c.id == channel) {
            Some(slot) => {
                if slot.busy {
                    slot.busy = false;
                    debug!("Channel {} unlocked", channel);
                }
            }
            None => warn!("Ignoring unlock: {}", ArbiterError::UnknownChannel(channel)),
        }
        drop(resources);
        self.released.notify_all();
    }

    pub fn busy_channels(&self) -> Vec<u8> {
        self.resources
            .lock()
            .channels
            .iter()
            .filter(|c| c.busy)
            .map(|c| c.id)
            .collect()
    }
}

/// Stage grant, released on drop.
#[must_use = "the stage is released as soon as the lease is dropped"]
#[derive(Debug)]
pub struct StageLease<'a> {
    arbiter: &'a ResourceArbiter,
    stage: u8,
}

impl StageLease<'_> {
    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn release(self) {}
}

impl Drop for StageLease<'_> {
    fn drop(&mut self) {
        self.arbiter.unlock_stage(self.stage);
    }
}

/// Channel grant, released on drop.
#[must_use = "the channels are released as soon as the lease is dropped"]
#[derive(Debug)]
pub struct ChannelLease<'a> {
    arbiter: &'a ResourceArbiter,
    channels: Vec<u8>,
}

impl ChannelLease<'_> {
    pub fn ids(&self) -> &[u8] {
        &self.channels
    }

    /// Give back one channel early and keep the rest.
    pub fn release_channel(&mut self, channel: u8) {
        if let Some(index) = self.channels.iter().position(|&c| c == channel) {
            self.channels.remove(index);
            self.arbiter.unlock_channel(channel);
        }
    }

    /// Keep only the first `count` channels.
    pub fn truncate(&mut self, count: usize) {
        while self.channels.len() > count {
            if let Some(channel) = self.channels.pop() {
                self.arbiter.unlock_channel(channel);
            }
        }
    }
}

impl Drop for ChannelLease<'_> {
    fn drop(&mut self) {
        for &channel in &self.channels {
            self.arbiter.unlock_channel(channel);
        }
    }
}

/// One holder of a stage's plate. Dropping it without calling
/// [`release`](Self::release) still decrements the count.
#[must_use]
#[derive(Debug)]
pub struct StageRetain<'a> {
    arbiter: &'a ResourceArbiter,
    stage: u8,
    released: bool,
}

impl StageRetain<'_> {
    pub fn stage(&self) -> u8 {
        self.stage
    }

    /// Let go of the plate. Returns `true` when this was the last holder.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.arbiter.release(self.stage) == 0
    }
}

impl Drop for StageRetain<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.arbiter.release(self.stage);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
