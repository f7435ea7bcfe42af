use serde::{Deserialize, Serialize};
use std::fmt;

/// Stream event discriminator.
///
/// Serialized as its wire string. Names missing from the catalog decode to
/// [`EventType::Other`] so newer servers can add events without breaking
/// older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    SessionStarted,
    DecompositionStarted,
    DecompositionComplete,
    PersonaSelectionStarted,
    PersonaSelected,
    PersonaSelectionComplete,
    SubProblemStarted,
    InitialRoundStarted,
    RoundStarted,
    Contribution,
    FacilitatorDecision,
    ModeratorIntervention,
    Convergence,
    VotingStarted,
    PersonaVote,
    VotingComplete,
    SynthesisStarted,
    SynthesisComplete,
    SubProblemComplete,
    MetaSynthesisStarted,
    MetaSynthesisComplete,
    ResearchStarted,
    ResearchComplete,
    PhaseCostBreakdown,
    ClarificationRequested,
    Complete,
    Error,
    /// Synthesized by the client when a reconnect skipped sequence numbers.
    GapDetected,
    /// Any event name not in this catalog.
    Other(String),
}

impl EventType {
    /// Get the wire name of this event type.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::SessionStarted => "session_started",
            EventType::DecompositionStarted => "decomposition_started",
            EventType::DecompositionComplete => "decomposition_complete",
            EventType::PersonaSelectionStarted => "persona_selection_started",
            EventType::PersonaSelected => "persona_selected",
            EventType::PersonaSelectionComplete => "persona_selection_complete",
            EventType::SubProblemStarted => "subproblem_started",
            EventType::InitialRoundStarted => "initial_round_started",
            EventType::RoundStarted => "round_started",
            EventType::Contribution => "contribution",
            EventType::FacilitatorDecision => "facilitator_decision",
            EventType::ModeratorIntervention => "moderator_intervention",
            EventType::Convergence => "convergence",
            EventType::VotingStarted => "voting_started",
            EventType::PersonaVote => "persona_vote",
            EventType::VotingComplete => "voting_complete",
            EventType::SynthesisStarted => "synthesis_started",
            EventType::SynthesisComplete => "synthesis_complete",
            EventType::SubProblemComplete => "subproblem_complete",
            EventType::MetaSynthesisStarted => "meta_synthesis_started",
            EventType::MetaSynthesisComplete => "meta_synthesis_complete",
            EventType::ResearchStarted => "research_started",
            EventType::ResearchComplete => "research_complete",
            EventType::PhaseCostBreakdown => "phase_cost_breakdown",
            EventType::ClarificationRequested => "clarification_requested",
            EventType::Complete => "complete",
            EventType::Error => "error",
            EventType::GapDetected => "gap_detected",
            EventType::Other(name) => name.as_str(),
        }
    }

    /// Parse a wire name. Never fails; unknown names become [`EventType::Other`].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "session_started" => EventType::SessionStarted,
            "decomposition_started" => EventType::DecompositionStarted,
            "decomposition_complete" => EventType::DecompositionComplete,
            "persona_selection_started" => EventType::PersonaSelectionStarted,
            "persona_selected" => EventType::PersonaSelected,
            "persona_selection_complete" => EventType::PersonaSelectionComplete,
            "subproblem_started" => EventType::SubProblemStarted,
            "initial_round_started" => EventType::InitialRoundStarted,
            "round_started" => EventType::RoundStarted,
            "contribution" => EventType::Contribution,
            "facilitator_decision" => EventType::FacilitatorDecision,
            "moderator_intervention" => EventType::ModeratorIntervention,
            "convergence" => EventType::Convergence,
            "voting_started" => EventType::VotingStarted,
            "persona_vote" => EventType::PersonaVote,
            "voting_complete" => EventType::VotingComplete,
            "synthesis_started" => EventType::SynthesisStarted,
            "synthesis_complete" => EventType::SynthesisComplete,
            "subproblem_complete" => EventType::SubProblemComplete,
            "meta_synthesis_started" => EventType::MetaSynthesisStarted,
            "meta_synthesis_complete" => EventType::MetaSynthesisComplete,
            "research_started" => EventType::ResearchStarted,
            "research_complete" => EventType::ResearchComplete,
            "phase_cost_breakdown" => EventType::PhaseCostBreakdown,
            "clarification_requested" => EventType::ClarificationRequested,
            "complete" => EventType::Complete,
            "error" => EventType::Error,
            "gap_detected" => EventType::GapDetected,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Get every event type in the catalog (excludes [`EventType::Other`]).
    pub fn all() -> Vec<EventType> {
        vec![
            EventType::SessionStarted,
            EventType::DecompositionStarted,
            EventType::DecompositionComplete,
            EventType::PersonaSelectionStarted,
            EventType::PersonaSelected,
            EventType::PersonaSelectionComplete,
            EventType::SubProblemStarted,
            EventType::InitialRoundStarted,
            EventType::RoundStarted,
            EventType::Contribution,
            EventType::FacilitatorDecision,
            EventType::ModeratorIntervention,
            EventType::Convergence,
            EventType::VotingStarted,
            EventType::PersonaVote,
            EventType::VotingComplete,
            EventType::SynthesisStarted,
            EventType::SynthesisComplete,
            EventType::SubProblemComplete,
            EventType::MetaSynthesisStarted,
            EventType::MetaSynthesisComplete,
            EventType::ResearchStarted,
            EventType::ResearchComplete,
            EventType::PhaseCostBreakdown,
            EventType::ClarificationRequested,
            EventType::Complete,
            EventType::Error,
            EventType::GapDetected,
        ]
    }

    /// Check if this type is part of the catalog.
    pub fn is_known(&self) -> bool {
        !matches!(self, EventType::Other(_))
    }

    /// Check if this event ends the deliberation stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::Complete)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match EventType::from_wire(&name) {
            EventType::Other(_) => EventType::Other(name),
            known => known,
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        EventType::from_wire(name)
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
