//! Spark definitions - the threads tended by the Hearth

use crate::chime::Tick;

/// A unique identifier for a spark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SparkId(pub u64);

/// The state of a spark in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparkState {
    /// Actively burning on the CPU.
    Blazing,

    /// Ready on the hearth, waiting for the CPU.
    Glowing,

    /// Banked until the given wake tick; only the chime's interrupt
    /// handler may stir it back to Glowing. There is no early-abort path
    /// for a banked spark.
    Banked(Tick),
}

/// A spark on the hearth.
pub struct Spark {
    pub(crate) id: SparkId,
    pub(crate) name: &'static str,
    pub(crate) state: SparkState,
    /// How many times the chime has woken this spark.
    pub(crate) wakeups: u64,
}

impl Spark {
    pub(crate) fn new(id: SparkId, name: &'static str) -> Self {
        Self {
            id,
            name,
            state: SparkState::Glowing,
            wakeups: 0,
        }
    }

    pub fn id(&self) -> SparkId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> SparkState {
        self.state
    }
}
