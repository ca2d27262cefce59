//! Per-vehicle lap and checkpoint state machine.
//!
//! ```text
//! NotRacing --start_race--> Racing --last lap completed--> Finished
//! ```
//!
//! Checkpoint passes are fed in by the race system in the order they are
//! detected. Every pass is recorded for lap validity scoring, but only
//! in-sequence passes advance the counter.

use std::collections::BTreeMap;

use engine_component::Component;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::RaceError;

/// Rules for what counts as a completed lap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapPolicy {
    /// Accept a start/finish pass as a lap once all but one checkpoint have
    /// been recorded this lap, even if they were hit out of order. The
    /// resulting lap is still recorded as invalid.
    pub lenient_completion: bool,
}

impl LapPolicy {
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            lenient_completion: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapState {
    #[default]
    NotRacing,
    Racing,
    Finished,
}

/// One completed lap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    /// 1-based.
    pub lap_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Last pass time of every checkpoint index seen during the lap.
    pub checkpoint_times: BTreeMap<u32, f64>,
    /// Whether every checkpoint of the track was passed.
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LapCounterComponent {
    current_lap: u32,
    total_laps: u32,
    current_checkpoint: u32,
    total_checkpoints: u32,
    /// Passes recorded during the lap in progress.
    pass_times: BTreeMap<u32, f64>,
    laps: Vec<LapRecord>,
    best_lap_time: Option<f64>,
    race_start_time: f64,
    lap_start_time: f64,
    finish_time: Option<f64>,
    state: LapState,
    policy: LapPolicy,
}

impl LapCounterComponent {
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidLapCount`] or
    /// [`RaceError::InvalidCheckpointCount`] for a zero count.
    pub fn new(total_laps: u32, total_checkpoints: u32) -> Result<Self, RaceError> {
        validate_laps(total_laps)?;
        validate_checkpoints(total_checkpoints)?;
        Ok(Self {
            current_lap: 0,
            total_laps,
            current_checkpoint: 0,
            total_checkpoints,
            pass_times: BTreeMap::new(),
            laps: Vec::new(),
            best_lap_time: None,
            race_start_time: 0.0,
            lap_start_time: 0.0,
            finish_time: None,
            state: LapState::NotRacing,
            policy: LapPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: LapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: LapPolicy) {
        self.policy = policy;
    }

    /// Returns the active validation policy.
    #[must_use]
    pub fn policy(&self) -> LapPolicy {
        self.policy
    }

    /// # Errors
    ///
    /// Returns [`RaceError::InvalidCheckpointCount`] for zero.
    pub fn set_total_checkpoints(&mut self, total_checkpoints: u32) -> Result<(), RaceError> {
        validate_checkpoints(total_checkpoints)?;
        self.total_checkpoints = total_checkpoints;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`RaceError::InvalidLapCount`] for zero.
    pub fn set_total_laps(&mut self, total_laps: u32) -> Result<(), RaceError> {
        validate_laps(total_laps)?;
        self.total_laps = total_laps;
        Ok(())
    }

    /// Begin lap 1 at `now`, discarding any previous history.
    pub fn start_race(&mut self, now: f64) {
        self.current_lap = 1;
        self.current_checkpoint = 0;
        self.pass_times.clear();
        self.laps.clear();
        self.best_lap_time = None;
        self.race_start_time = now;
        self.lap_start_time = now;
        self.finish_time = None;
        self.state = LapState::Racing;
    }

    /// Back to `NotRacing` with no history.
    pub fn reset(&mut self) {
        self.start_race(0.0);
        self.current_lap = 0;
        self.race_start_time = 0.0;
        self.lap_start_time = 0.0;
        self.state = LapState::NotRacing;
    }

    /// Feed one detected checkpoint pass. Returns `true` if the pass was
    /// accepted, either as the next checkpoint in sequence or as a lap
    /// completion.
    pub fn pass_checkpoint(&mut self, index: u32, timestamp: f64) -> bool {
        if self.state != LapState::Racing {
            return false;
        }
        if index >= self.total_checkpoints {
            debug!(index, total = self.total_checkpoints, "ignoring out-of-range checkpoint");
            return false;
        }

        self.pass_times.insert(index, timestamp);
        let last = self.total_checkpoints - 1;

        if index == 0 && self.current_checkpoint == last {
            self.complete_lap(timestamp);
            return true;
        }

        if index == (self.current_checkpoint + 1) % self.total_checkpoints {
            self.current_checkpoint = index;
            trace!(index, lap = self.current_lap, "checkpoint accepted");
            return true;
        }

        if index == 0
            && self.policy.lenient_completion
            && self.pass_times.len() >= last as usize
        {
            debug!(lap = self.current_lap, recorded = self.pass_times.len(), "lenient lap completion");
            self.complete_lap(timestamp);
            return true;
        }

        if index > self.current_checkpoint || (index == 0 && self.current_checkpoint == last) {
            self.current_checkpoint = index;
        }
        false
    }

    fn complete_lap(&mut self, timestamp: f64) {
        let duration = timestamp - self.lap_start_time;
        let valid = (0..self.total_checkpoints).all(|i| self.pass_times.contains_key(&i));
        let record = LapRecord {
            lap_number: self.current_lap,
            start_time: self.lap_start_time,
            end_time: timestamp,
            duration,
            checkpoint_times: std::mem::take(&mut self.pass_times),
            valid,
        };
        debug!(lap = record.lap_number, duration, valid, "lap completed");

        if valid && self.best_lap_time.is_none_or(|best| duration < best) {
            self.best_lap_time = Some(duration);
        }
        self.laps.push(record);

        self.current_lap += 1;
        self.current_checkpoint = 0;
        self.lap_start_time = timestamp;
        if self.current_lap > self.total_laps {
            self.state = LapState::Finished;
            self.finish_time = Some(timestamp);
        }
    }

    /// Returns the lap in progress, 1-based.
    #[must_use]
    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    /// Returns the number of laps needed to finish.
    #[must_use]
    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    /// Returns the index of the last checkpoint reached this lap.
    #[must_use]
    pub fn current_checkpoint(&self) -> u32 {
        self.current_checkpoint
    }

    /// Returns the number of checkpoints per lap.
    #[must_use]
    pub fn total_checkpoints(&self) -> u32 {
        self.total_checkpoints
    }

    /// Passes recorded so far during the lap in progress.
    #[must_use]
    pub fn pass_times(&self) -> &BTreeMap<u32, f64> {
        &self.pass_times
    }

    /// Returns every completed lap, oldest first.
    #[must_use]
    pub fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    /// Returns the most recently completed lap.
    #[must_use]
    pub fn last_lap(&self) -> Option<&LapRecord> {
        self.laps.last()
    }

    /// Fastest valid lap, in ms.
    #[must_use]
    pub fn best_lap_time(&self) -> Option<f64> {
        self.best_lap_time
    }

    /// Time from the start to the last completed lap, in ms.
    #[must_use]
    pub fn total_race_time(&self) -> f64 {
        self.laps
            .last()
            .map_or(0.0, |lap| lap.end_time - self.race_start_time)
    }

    /// Returns the timestamp of the final lap, once finished.
    #[must_use]
    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    /// Returns the current lap state.
    #[must_use]
    pub fn state(&self) -> LapState {
        self.state
    }

    #[must_use]
    pub fn is_racing(&self) -> bool {
        self.state == LapState::Racing
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == LapState::Finished
    }
}

impl Component for LapCounterComponent {
    fn type_name() -> &'static str {
        "LapCounter"
    }
}

fn validate_laps(total_laps: u32) -> Result<(), RaceError> {
    if total_laps == 0 {
        return Err(RaceError::InvalidLapCount(total_laps));
    }
    Ok(())
}

fn validate_checkpoints(total_checkpoints: u32) -> Result<(), RaceError> {
    if total_checkpoints == 0 {
        return Err(RaceError::InvalidCheckpointCount(total_checkpoints));
    }
    Ok(())
}
