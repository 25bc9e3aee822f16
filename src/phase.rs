//! The authoritative session phase state machine.
//!
//! All marker and lifecycle inputs funnel into [`PhaseTracker::apply`],
//! which is total: every input maps to exactly one next phase or to a no-op.
//! The tracker owns the only copy of the current phase; nothing else in the
//! engine mutates it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser::{Marker, UrlMarkerKind};
use crate::raid::RaidDescriptor;

/// Sub-screen of the pre-raid "prepare to escape" flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeStage {
    Insurance,
    Confirmation,
    LookingForGroup,
}

/// The engine's current belief about what the game client is doing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum SessionPhase {
    /// No game process is being tracked.
    Idle,
    MainMenu,
    LookingForRaid,
    PreparingToEscape { stage: EscapeStage },
    InRaid {
        descriptor: RaidDescriptor,
        started_at: DateTime<Utc>,
    },
    RaidEnded,
}

impl SessionPhase {
    pub fn is_in_raid(&self) -> bool {
        matches!(self, Self::InRaid { .. })
    }

    /// Phase identity for change detection. `started_at` is bookkeeping and
    /// must not make a repeated marker look like a new transition; a new
    /// raid descriptor is a change even when both sides are `InRaid`.
    fn same_as(&self, other: &SessionPhase) -> bool {
        match (self, other) {
            (Self::Idle, Self::Idle)
            | (Self::MainMenu, Self::MainMenu)
            | (Self::LookingForRaid, Self::LookingForRaid)
            | (Self::RaidEnded, Self::RaidEnded) => true,
            (Self::PreparingToEscape { stage: a }, Self::PreparingToEscape { stage: b }) => a == b,
            (Self::InRaid { descriptor: a, .. }, Self::InRaid { descriptor: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Inputs the tracker consumes. Lifecycle events are synthetic, derived
/// from liveness probing rather than log content; `RaidResolved` carries a
/// descriptor the coordinator already resolved from the trace log.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    LifecycleStart,
    LifecycleEnd,
    Marker(Marker),
    RaidResolved(RaidDescriptor),
}

/// Single owner of the current [`SessionPhase`].
#[derive(Debug)]
pub struct PhaseTracker {
    phase: SessionPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_in_raid(&self) -> bool {
        self.phase().is_in_raid()
    }

    /// Applies one event and returns the new phase only when it genuinely
    /// differs from the current one. Re-applying an event whose outcome is
    /// the current phase neither emits nor mutates anything, so repeated
    /// file-change notifications are absorbed here rather than debounced
    /// upstream.
    pub fn apply(&mut self, event: PhaseEvent) -> Option<SessionPhase> {
        let next = self.next_phase(event)?;
        if self.phase.same_as(&next) {
            return None;
        }
        self.phase = next.clone();
        Some(next)
    }

    fn next_phase(&self, event: PhaseEvent) -> Option<SessionPhase> {
        match event {
            PhaseEvent::LifecycleStart => {
                // A session opening mid-search keeps its search phase.
                if matches!(self.phase(), SessionPhase::LookingForRaid) {
                    Some(SessionPhase::LookingForRaid)
                } else {
                    Some(SessionPhase::MainMenu)
                }
            }
            PhaseEvent::LifecycleEnd => Some(SessionPhase::Idle),
            PhaseEvent::RaidResolved(descriptor) => Some(SessionPhase::InRaid {
                descriptor,
                started_at: Utc::now(),
            }),
            PhaseEvent::Marker(Marker::SearchingTrace) => Some(SessionPhase::LookingForRaid),
            // The create trace itself carries no fields; the coordinator
            // resolves the descriptor and feeds `RaidResolved` instead.
            PhaseEvent::Marker(Marker::NewRaidTrace) => None,
            PhaseEvent::Marker(Marker::Url(kind)) => match kind {
                UrlMarkerKind::Insurance => Some(SessionPhase::PreparingToEscape {
                    stage: EscapeStage::Insurance,
                }),
                UrlMarkerKind::GroupCancel => Some(SessionPhase::PreparingToEscape {
                    stage: EscapeStage::Confirmation,
                }),
                UrlMarkerKind::GroupStatus => Some(SessionPhase::PreparingToEscape {
                    stage: EscapeStage::LookingForGroup,
                }),
                UrlMarkerKind::RaidEnd => Some(SessionPhase::RaidEnded),
                UrlMarkerKind::Items => Some(SessionPhase::MainMenu),
                UrlMarkerKind::BotGenerate => Some(SessionPhase::InRaid {
                    descriptor: RaidDescriptor::offline(),
                    started_at: Utc::now(),
                }),
                // Keepalive-driven raid resolution is the coordinator's job;
                // by itself the marker moves nothing.
                UrlMarkerKind::Keepalive => None,
            },
        }
    }
}
