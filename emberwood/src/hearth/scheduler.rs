//! The Hearth's scheduler - owner of the ready queue and the sleeping set
//!
//! This is the collaborator the chime drives: `put_to_sleep` moves a spark
//! out of the ready set under a wake tick, and `wake_due` - interrupt
//! context only - stirs every spark whose tick has come and reports the
//! new earliest wake tick so the chime can keep its threshold honest.

use super::spark::{Spark, SparkId, SparkState};
use crate::chime::{SleepRoster, Tick, NO_SLEEPERS};
use crate::vigil::irq::IrqContext;
use heapless::{Deque, Vec};

/// Fixed capacity; the Hearth owns no heap.
pub const MAX_SPARKS: usize = 64;

/// One entry in the sleeping set: a spark and the tick that frees it.
#[derive(Debug, Clone, Copy)]
pub struct Sleeper {
    pub spark: SparkId,
    pub wake_tick: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HearthError {
    OutOfSparks,
    SparkNotFound,
}

pub struct Scheduler {
    sparks: Vec<Spark, MAX_SPARKS>,
    ready: Deque<SparkId, MAX_SPARKS>,
    sleeping: Vec<Sleeper, MAX_SPARKS>,
    current: Option<SparkId>,
    next_id: u64,
    /// Total sparks stirred awake since boot.
    wakeups: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            sparks: Vec::new(),
            ready: Deque::new(),
            sleeping: Vec::new(),
            current: None,
            next_id: 1,
            wakeups: 0,
        }
    }

    /// Kindle a new spark and queue it as ready.
    pub fn spawn(&mut self, name: &'static str) -> Result<SparkId, HearthError> {
        if self.sparks.len() >= MAX_SPARKS {
            return Err(HearthError::OutOfSparks);
        }

        let id = SparkId(self.next_id);
        self.next_id += 1;

        // Capacity checked above; both pushes cannot fail.
        let _ = self.sparks.push(Spark::new(id, name));
        let _ = self.ready.push_back(id);

        Ok(id)
    }

    /// The spark currently burning on the CPU, if any.
    pub fn current(&self) -> Option<SparkId> {
        self.current
    }

    /// Mark a spark as the one burning on the CPU.
    pub fn make_current(&mut self, id: SparkId) -> Result<(), HearthError> {
        self.take_from_ready(id);
        let spark = self
            .find_spark_mut(id)
            .ok_or(HearthError::SparkNotFound)?;
        spark.state = SparkState::Blazing;
        self.current = Some(id);
        Ok(())
    }

    pub fn state_of(&self, id: SparkId) -> Option<SparkState> {
        self.find_spark(id).map(|s| s.state)
    }

    /// Whether the spark sits in the ready queue.
    pub fn is_ready(&self, id: SparkId) -> bool {
        self.ready.iter().any(|&r| r == id)
    }

    /// Earliest wake tick in the sleeping set, or the sentinel.
    pub fn min_wake_tick(&self) -> Tick {
        self.sleeping
            .iter()
            .map(|s| s.wake_tick)
            .fold(NO_SLEEPERS, Tick::min)
    }

    pub fn sleeping_count(&self) -> usize {
        self.sleeping.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let count = |state: fn(&SparkState) -> bool| {
            self.sparks.iter().filter(|s| state(&s.state)).count()
        };
        SchedulerStats {
            total_sparks: self.sparks.len(),
            blazing_sparks: count(|s| matches!(s, SparkState::Blazing)),
            glowing_sparks: count(|s| matches!(s, SparkState::Glowing)),
            banked_sparks: count(|s| matches!(s, SparkState::Banked(_))),
            wakeups: self.wakeups,
        }
    }

    fn find_spark(&self, id: SparkId) -> Option<&Spark> {
        self.sparks.iter().find(|s| s.id == id)
    }

    fn find_spark_mut(&mut self, id: SparkId) -> Option<&mut Spark> {
        self.sparks.iter_mut().find(|s| s.id == id)
    }

    /// Pull a spark out of the ready queue, preserving the order of the
    /// rest. Returns whether it was queued.
    fn take_from_ready(&mut self, id: SparkId) -> bool {
        let mut found = false;
        for _ in 0..self.ready.len() {
            if let Some(head) = self.ready.pop_front() {
                if head == id && !found {
                    found = true;
                } else {
                    let _ = self.ready.push_back(head);
                }
            }
        }
        found
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepRoster for Scheduler {
    fn put_to_sleep(&mut self, spark: SparkId, wake_tick: Tick) {
        self.take_from_ready(spark);
        if self.current == Some(spark) {
            self.current = None;
        }
        if let Some(s) = self.find_spark_mut(spark) {
            s.state = SparkState::Banked(wake_tick);
        }
        assert!(
            self.sleeping.push(Sleeper { spark, wake_tick }).is_ok(),
            "sleeping set overflow"
        );
    }

    fn wake_due(&mut self, _irq: &IrqContext, now: Tick) -> Tick {
        let mut next_wake = NO_SLEEPERS;
        let mut i = 0;
        while i < self.sleeping.len() {
            let entry = self.sleeping[i];
            if entry.wake_tick <= now {
                self.sleeping.swap_remove(i);
                if let Some(spark) = self.find_spark_mut(entry.spark) {
                    spark.state = SparkState::Glowing;
                    spark.wakeups += 1;
                }
                let _ = self.ready.push_back(entry.spark);
                self.wakeups += 1;
            } else {
                if entry.wake_tick < next_wake {
                    next_wake = entry.wake_tick;
                }
                i += 1;
            }
        }
        next_wake
    }
}

/// Statistics about the Hearth.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub total_sparks: usize,
    pub blazing_sparks: usize,
    pub glowing_sparks: usize,
    pub banked_sparks: usize,
    pub wakeups: u64,
}
