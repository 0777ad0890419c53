//! Function-pointer finite state machine engine and session state tables.
//!
//! Two independent tables run over one shared [`SessionContext`]:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  ECG / HRV table                 GSR table                    │
//! │  ┌────────────────┬──────────┐   ┌──────────────┬──────────┐  │
//! │  │ Idle           │ enter    │   │ Idle         │ enter    │  │
//! │  │ WaitForContact │ enter    │   │ Entry        │ enter    │  │
//! │  │ Recording      │ en/exit  │   │ Streaming    │ en/exit  │  │
//! │  │                │          │   │ Complete     │ enter    │  │
//! │  └────────────────┴──────────┘   └──────────────┴──────────┘  │
//! │                 │                            │                │
//! │                 └──────▶ SessionContext ◀────┘                │
//! │                 (sessions · leases · effects · vitals)        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, and updates the current pointer.
//! Handlers never touch hardware; they adjust channel leases and queue
//! effects in the context, and the service applies both after the tick.

pub mod context;
pub mod countdown;
pub mod ecg_states;
pub mod gsr_states;
pub mod leases;

use core::fmt;

use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// A state identifier that can index a fixed-size table.
pub trait StateKey: Copy + Eq + fmt::Debug {
    /// Number of states, i.e. the table length.
    const COUNT: usize;

    fn index(self) -> usize;

    /// Inverse of [`index`](Self::index).  Out-of-range input is a bug:
    /// debug builds panic, release builds return the initial state.
    fn from_index(idx: usize) -> Self;
}

/// States of the ECG / HRV session path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EcgState {
    Idle = 0,
    WaitForContact = 1,
    Recording = 2,
}

impl StateKey for EcgState {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::WaitForContact,
            2 => Self::Recording,
            _ => {
                debug_assert!(false, "invalid ECG state index: {idx}");
                Self::Idle
            }
        }
    }
}

/// States of the GSR session path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GsrState {
    Idle = 0,
    Entry = 1,
    Streaming = 2,
    Complete = 3,
}

impl StateKey for GsrState {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Entry,
            2 => Self::Streaming,
            3 => Self::Complete,
            _ => {
                debug_assert!(false, "invalid GSR state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public session vocabulary
// ---------------------------------------------------------------------------

/// Measurement product selected when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionMode {
    Ecg,
    Hrv,
    Gsr,
}

/// The session currently in the foreground.  Mutated only on the FSM
/// thread; everyone else sees it through [`StatusSnapshot`](crate::app::events::StatusSnapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionOwner {
    #[default]
    None,
    Ecg,
    Hrv,
    Gsr,
}

impl From<SessionMode> for SessionOwner {
    fn from(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Ecg => Self::Ecg,
            SessionMode::Hrv => Self::Hrv,
            SessionMode::Gsr => Self::Gsr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Stabilizing,
    Active,
}

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    WaitForContact,
    Recording {
        phase: RecordingPhase,
    },
    GsrEntry,
    GsrStreaming,
    GsrComplete,
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<C> = fn(&mut C);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn<S, C> = fn(&mut C) -> Option<S>;

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor<S, C> {
    pub id: S,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<C>>,
    pub on_exit: Option<StateActionFn<C>>,
    pub on_update: StateUpdateFn<S, C>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and the current pointer; the context is passed in
/// on every call so several machines can share one blackboard.
pub struct Fsm<S: StateKey, C, const N: usize> {
    /// Log prefix, e.g. `"ECG"`.
    label: &'static str,
    /// Fixed-size table indexed by `S::index()`.
    table: [StateDescriptor<S, C>; N],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl<S: StateKey, C, const N: usize> Fsm<S, C, N> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(label: &'static str, table: [StateDescriptor<S, C>; N], initial: S) -> Self {
        debug_assert_eq!(N, S::COUNT, "{label}: table length must match state count");
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id.index() == i),
            "{label}: table rows out of order"
        );
        Self {
            label,
            table,
            current: initial.index(),
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut C) {
        info!("{} FSM starting in state: {}", self.label, self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  Returns the new state if a transition
    /// happened.
    pub fn tick(&mut self, ctx: &mut C) -> Option<S> {
        self.tick_count += 1;

        let next = (self.table[self.current].on_update)(ctx)?;
        self.transition(next, ctx);
        Some(next)
    }

    /// Force an immediate transition (used on hardware failure to drop a
    /// session regardless of what `on_update` would return).
    pub fn force_transition(&mut self, next: S, ctx: &mut C) {
        if next.index() != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> S {
        S::from_index(self.current)
    }

    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: S, ctx: &mut C) {
        let next_idx = next_id.index();

        info!(
            "{} FSM transition: {} -> {}",
            self.label, self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

/// The ECG / HRV session machine.
pub type EcgFsm = Fsm<EcgState, context::SessionContext, { EcgState::COUNT }>;

/// The GSR session machine.
pub type GsrFsm = Fsm<GsrState, context::SessionContext, { GsrState::COUNT }>;
