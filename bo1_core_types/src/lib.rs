//! Shared event schema for the Board of One streaming client.
//!
//! This crate is the single versioned catalog of deliberation stream events:
//! - [`EventType`]: the closed set of event-type strings (plus a forward
//!   compatible [`EventType::Other`] for names this build does not know)
//! - [`EventPayload`]: one typed payload shape per event type
//! - [`SCHEMA_VERSION`]: the schema version this catalog describes

mod event_type;
mod payloads;

pub use event_type::EventType;
pub use payloads::{
    ClarificationRequested, CompletePayload, Contribution, Convergence, DecompositionComplete,
    ErrorPayload, EventPayload, FacilitatorDecision, GapDetected, MetaSynthesisComplete,
    ModeratorIntervention, PersonaInfo, PersonaSelected, PersonaSelectionComplete, PersonaVote,
    PhaseCostBreakdown, PhaseStarted, ResearchComplete, ResearchStarted, RoundStarted,
    SessionStarted, SubProblem, SubProblemComplete, SubProblemStarted, SynthesisComplete,
    VotingComplete, VotingStarted,
};

/// Event schema version described by this crate.
///
/// Bumped whenever a payload shape changes in a way older clients would
/// misread. Additive fields do not require a bump.
pub const SCHEMA_VERSION: u32 = 1;

/// Payload field carrying the server's per-event schema version.
pub const SCHEMA_VERSION_FIELD: &str = "schema_version";
