//! Typed payload shapes, one per [`EventType`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::event_type::EventType;

/// Marker payload shared by every `*_started` phase event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStarted {
    pub message: Option<String>,
    pub sub_problem_index: Option<u32>,
    pub round_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub problem_statement: Option<String>,
    pub max_rounds: Option<u32>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProblem {
    pub id: String,
    pub goal: String,
    pub rationale: Option<String>,
    pub complexity_score: Option<u32>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionComplete {
    #[serde(default)]
    pub sub_problems: Vec<SubProblem>,
    pub count: Option<u32>,
}

/// Expert persona as described in selection events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaInfo {
    pub code: String,
    pub name: String,
    pub display_name: Option<String>,
    pub archetype: Option<String>,
    #[serde(default)]
    pub domain_expertise: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSelected {
    pub persona: PersonaInfo,
    pub rationale: Option<String>,
    pub order: Option<u32>,
    pub sub_problem_index: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaSelectionComplete {
    #[serde(default)]
    pub personas: Vec<String>,
    pub sub_problem_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProblemStarted {
    pub sub_problem_index: u32,
    pub sub_problem_id: Option<String>,
    pub goal: Option<String>,
    pub total_sub_problems: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStarted {
    pub round_number: u32,
    #[serde(default)]
    pub experts: Vec<String>,
    pub sub_problem_index: Option<u32>,
}

/// A single expert's turn in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub persona_code: String,
    pub persona_name: Option<String>,
    pub content: String,
    pub round: Option<u32>,
    pub archetype: Option<String>,
    #[serde(default)]
    pub domain_expertise: Vec<String>,
    pub contribution_type: Option<String>,
    pub sub_problem_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitatorDecision {
    pub action: String,
    pub reasoning: Option<String>,
    pub next_speaker: Option<String>,
    pub moderator_type: Option<String>,
    pub round: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeratorIntervention {
    pub moderator_type: String,
    pub content: String,
    pub trigger_reason: Option<String>,
    pub round: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub score: f64,
    #[serde(default)]
    pub converged: bool,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub should_stop: bool,
    pub stop_reason: Option<String>,
    pub round: Option<u32>,
    pub max_rounds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingStarted {
    #[serde(default)]
    pub experts: Vec<String>,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaVote {
    pub persona_code: String,
    pub persona_name: Option<String>,
    pub recommendation: String,
    #[serde(default)]
    pub confidence: f64,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingComplete {
    #[serde(default)]
    pub votes_count: u32,
    pub consensus_level: Option<String>,
    pub avg_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisComplete {
    pub synthesis: String,
    pub word_count: Option<u32>,
    pub sub_problem_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProblemComplete {
    pub sub_problem_index: u32,
    pub sub_problem_id: Option<String>,
    pub goal: Option<String>,
    pub synthesis: Option<String>,
    pub cost: Option<f64>,
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub expert_panel: Vec<String>,
    pub contribution_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSynthesisComplete {
    pub synthesis: String,
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchStarted {
    pub query: Option<String>,
    pub persona_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchComplete {
    pub query: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    pub cost: Option<f64>,
}

/// Per-phase spend, reported as the deliberation progresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseCostBreakdown {
    #[serde(default)]
    pub phase_costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequested {
    pub question: String,
    pub reason: Option<String>,
    pub phase: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    pub session_id: Option<String>,
    pub final_output: Option<String>,
    pub synthesis: Option<String>,
    pub total_cost: Option<f64>,
    pub total_rounds: Option<u32>,
    pub stop_reason: Option<String>,
}

/// Server-reported deliberation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub error_type: Option<String>,
    pub recoverable: Option<bool>,
}

/// Diagnostic emitted when a resumed stream skipped sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapDetected {
    pub session_id: String,
    pub expected_sequence: u64,
    pub actual_sequence: u64,
    pub missed_count: u64,
}

/// Typed payload for a stream event.
///
/// Each [`EventType`] maps to exactly one variant; unknown types decode to
/// [`EventPayload::Opaque`] with the raw JSON left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    SessionStarted(SessionStarted),
    DecompositionStarted(PhaseStarted),
    DecompositionComplete(DecompositionComplete),
    PersonaSelectionStarted(PhaseStarted),
    PersonaSelected(PersonaSelected),
    PersonaSelectionComplete(PersonaSelectionComplete),
    SubProblemStarted(SubProblemStarted),
    InitialRoundStarted(PhaseStarted),
    RoundStarted(RoundStarted),
    Contribution(Contribution),
    FacilitatorDecision(FacilitatorDecision),
    ModeratorIntervention(ModeratorIntervention),
    Convergence(Convergence),
    VotingStarted(VotingStarted),
    PersonaVote(PersonaVote),
    VotingComplete(VotingComplete),
    SynthesisStarted(PhaseStarted),
    SynthesisComplete(SynthesisComplete),
    SubProblemComplete(SubProblemComplete),
    MetaSynthesisStarted(PhaseStarted),
    MetaSynthesisComplete(MetaSynthesisComplete),
    ResearchStarted(ResearchStarted),
    ResearchComplete(ResearchComplete),
    PhaseCostBreakdown(PhaseCostBreakdown),
    ClarificationRequested(ClarificationRequested),
    Complete(CompletePayload),
    Error(ErrorPayload),
    GapDetected(GapDetected),
    Opaque(Value),
}

impl EventPayload {
    /// Decode `data` into the payload shape registered for `event_type`.
    ///
    /// A null payload is read as an empty object, so shapes without required
    /// fields still decode.
    pub fn decode(event_type: &EventType, data: &Value) -> Result<Self, serde_json::Error> {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data.clone()
        };

        let payload = match event_type {
            EventType::SessionStarted => EventPayload::SessionStarted(serde_json::from_value(data)?),
            EventType::DecompositionStarted => {
                EventPayload::DecompositionStarted(serde_json::from_value(data)?)
            }
            EventType::DecompositionComplete => {
                EventPayload::DecompositionComplete(serde_json::from_value(data)?)
            }
            EventType::PersonaSelectionStarted => {
                EventPayload::PersonaSelectionStarted(serde_json::from_value(data)?)
            }
            EventType::PersonaSelected => {
                EventPayload::PersonaSelected(serde_json::from_value(data)?)
            }
            EventType::PersonaSelectionComplete => {
                EventPayload::PersonaSelectionComplete(serde_json::from_value(data)?)
            }
            EventType::SubProblemStarted => {
                EventPayload::SubProblemStarted(serde_json::from_value(data)?)
            }
            EventType::InitialRoundStarted => {
                EventPayload::InitialRoundStarted(serde_json::from_value(data)?)
            }
            EventType::RoundStarted => EventPayload::RoundStarted(serde_json::from_value(data)?),
            EventType::Contribution => EventPayload::Contribution(serde_json::from_value(data)?),
            EventType::FacilitatorDecision => {
                EventPayload::FacilitatorDecision(serde_json::from_value(data)?)
            }
            EventType::ModeratorIntervention => {
                EventPayload::ModeratorIntervention(serde_json::from_value(data)?)
            }
            EventType::Convergence => EventPayload::Convergence(serde_json::from_value(data)?),
            EventType::VotingStarted => EventPayload::VotingStarted(serde_json::from_value(data)?),
            EventType::PersonaVote => EventPayload::PersonaVote(serde_json::from_value(data)?),
            EventType::VotingComplete => {
                EventPayload::VotingComplete(serde_json::from_value(data)?)
            }
            EventType::SynthesisStarted => {
                EventPayload::SynthesisStarted(serde_json::from_value(data)?)
            }
            EventType::SynthesisComplete => {
                EventPayload::SynthesisComplete(serde_json::from_value(data)?)
            }
            EventType::SubProblemComplete => {
                EventPayload::SubProblemComplete(serde_json::from_value(data)?)
            }
            EventType::MetaSynthesisStarted => {
                EventPayload::MetaSynthesisStarted(serde_json::from_value(data)?)
            }
            EventType::MetaSynthesisComplete => {
                EventPayload::MetaSynthesisComplete(serde_json::from_value(data)?)
            }
            EventType::ResearchStarted => {
                EventPayload::ResearchStarted(serde_json::from_value(data)?)
            }
            EventType::ResearchComplete => {
                EventPayload::ResearchComplete(serde_json::from_value(data)?)
            }
            EventType::PhaseCostBreakdown => {
                EventPayload::PhaseCostBreakdown(serde_json::from_value(data)?)
            }
            EventType::ClarificationRequested => {
                EventPayload::ClarificationRequested(serde_json::from_value(data)?)
            }
            EventType::Complete => EventPayload::Complete(serde_json::from_value(data)?),
            EventType::Error => EventPayload::Error(serde_json::from_value(data)?),
            EventType::GapDetected => EventPayload::GapDetected(serde_json::from_value(data)?),
            EventType::Other(_) => EventPayload::Opaque(data),
        };
        Ok(payload)
    }

    /// Check if this payload is the opaque fallback.
    pub fn is_opaque(&self) -> bool {
        matches!(self, EventPayload::Opaque(_))
    }
}
