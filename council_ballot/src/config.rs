// ********* Input data structures ***********

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

/// The identifier of a candidate, as published by the candidates endpoint.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered candidate.
///
/// Everything except the `id` is display metadata. The selection logic never
/// looks at it.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub bio: String,
    /// Weekly activity, in hours.
    #[serde(default)]
    pub activity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(rename = "isWinner", default)]
    pub is_winner: bool,
}

impl Candidate {
    pub fn activity_level(&self) -> ActivityLevel {
        ActivityLevel::from_hours(self.activity)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ActivityLevel {
    High,
    Medium,
    Low,
}

impl ActivityLevel {
    pub fn from_hours(hours: u32) -> ActivityLevel {
        match hours {
            h if h >= 14 => ActivityLevel::High,
            h if h >= 7 => ActivityLevel::Medium,
            _ => ActivityLevel::Low,
        }
    }
}

impl Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityLevel::High => write!(f, "High Activity"),
            ActivityLevel::Medium => write!(f, "Medium Activity"),
            ActivityLevel::Low => write!(f, "Low Activity"),
        }
    }
}

// ********* Configuration **********

/// The size of the slate a voter must fill.
///
/// Only built through [`SelectionLimits::new`], deserialization included, so
/// the executive seats are never more than the council seats.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "LimitsDef")]
pub struct SelectionLimits {
    council_seats: usize,
    executive_seats: usize,
}

#[derive(Deserialize)]
struct LimitsDef {
    council_seats: usize,
    executive_seats: usize,
}

impl TryFrom<LimitsDef> for SelectionLimits {
    type Error = BallotErrors;

    fn try_from(def: LimitsDef) -> Result<Self, Self::Error> {
        SelectionLimits::new(def.council_seats, def.executive_seats)
    }
}

impl SelectionLimits {
    pub const DEFAULT_LIMITS: SelectionLimits = SelectionLimits {
        council_seats: 15,
        executive_seats: 7,
    };

    pub fn new(council_seats: usize, executive_seats: usize) -> Result<SelectionLimits, BallotErrors> {
        if executive_seats == 0 || executive_seats > council_seats {
            return Err(BallotErrors::InvalidLimits {
                council_seats,
                executive_seats,
            });
        }
        Ok(SelectionLimits {
            council_seats,
            executive_seats,
        })
    }

    pub fn council_seats(&self) -> usize {
        self.council_seats
    }

    /// Executive officers are chosen among the council members.
    pub fn executive_seats(&self) -> usize {
        self.executive_seats
    }

    /// Council members on a full ballot that are not executive officers.
    pub fn plain_council_seats(&self) -> usize {
        self.council_seats - self.executive_seats
    }
}

impl Default for SelectionLimits {
    fn default() -> Self {
        SelectionLimits::DEFAULT_LIMITS
    }
}

// ********* Selection state machine **********

/// Where a single candidate stands on the ballot being filled.
///
/// One click moves a candidate along the cycle
/// `None -> Council -> Executive -> None`. There is no way back from
/// `Executive` to `Council` with a single gesture.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SelectionStatus {
    None,
    Council,
    Executive,
}

/// The facts about the whole ballot that a transition depends on.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TransitionContext {
    pub council_len: usize,
    pub executive_len: usize,
    pub limits: SelectionLimits,
}

/// The effect of one click on one candidate.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Transition {
    /// Appended to the council picks.
    Select,
    /// Appended to the executive picks, staying in the council.
    Promote,
    /// Removed from the council because no executive slot is left.
    Deselect,
    /// Removed from both the executive and the council picks.
    Remove,
    /// Nothing changes and the voter is told why.
    Refuse(UserMessage),
}

impl Transition {
    /// The status of the clicked candidate once the transition is applied.
    pub fn target(&self, from: SelectionStatus) -> SelectionStatus {
        match self {
            Transition::Select => SelectionStatus::Council,
            Transition::Promote => SelectionStatus::Executive,
            Transition::Deselect | Transition::Remove => SelectionStatus::None,
            Transition::Refuse(_) => from,
        }
    }
}

/// A transient message meant for the voter.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum UserMessage {
    VotingClosed,
    CouncilLimitReached { max: usize },
}

impl Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserMessage::VotingClosed => write!(f, "Voting is currently closed"),
            UserMessage::CouncilLimitReached { max } => {
                write!(f, "You can only select {} council members", max)
            }
        }
    }
}

// ******** Output data structures *********

/// Rendering instructions for one candidate card.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: CandidateId,
    pub selected: bool,
    pub executive: bool,
    #[serde(rename = "badgeNumber")]
    pub badge_number: Option<usize>,
}

/// The counters and the state of the submit button.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionSummary {
    #[serde(rename = "selectedCount")]
    pub selected_count: usize,
    #[serde(rename = "executiveCount")]
    pub executive_count: usize,
    #[serde(rename = "canSubmit")]
    pub can_submit: bool,
}

/// Why a ballot cannot be submitted yet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SubmitBlocker {
    CouncilIncomplete { required: usize, selected: usize },
    ExecutiveIncomplete { required: usize, selected: usize },
}

impl Display for SubmitBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitBlocker::CouncilIncomplete { required, .. } => {
                write!(f, "Please select exactly {} candidates", required)
            }
            SubmitBlocker::ExecutiveIncomplete { required, .. } => {
                write!(f, "Please designate exactly {} executive officers", required)
            }
        }
    }
}

/// Errors in the data handed to the library.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BallotErrors {
    InvalidLimits {
        council_seats: usize,
        executive_seats: usize,
    },
    DuplicateCandidate(CandidateId),
    UnknownCandidate(CandidateId),
    ExecutiveNotInCouncil(CandidateId),
    SelectionOverflow { council: usize, executive: usize },
}

impl Error for BallotErrors {}

impl Display for BallotErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BallotErrors::InvalidLimits {
                council_seats,
                executive_seats,
            } => write!(
                f,
                "invalid limits: {} executive seats for {} council seats",
                executive_seats, council_seats
            ),
            BallotErrors::DuplicateCandidate(cid) => {
                write!(f, "candidate id {} is registered more than once", cid)
            }
            BallotErrors::UnknownCandidate(cid) => write!(f, "unknown candidate id {}", cid),
            BallotErrors::ExecutiveNotInCouncil(cid) => {
                write!(f, "executive officer {} is not a council pick", cid)
            }
            BallotErrors::SelectionOverflow { council, executive } => write!(
                f,
                "selection holds {} council and {} executive picks, above the limits",
                council, executive
            ),
        }
    }
}
