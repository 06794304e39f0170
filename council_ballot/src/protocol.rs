//! The contract with the election backend.
//!
//! The payloads mirror the JSON documents exchanged with the server. The
//! selection state machine only ever talks to the backend through
//! [`ElectionBackend`].

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

use crate::{Candidate, CandidateId, SelectionState};

/// The ballot sent on submission: both pick lists, in the order they were made.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub council: Vec<CandidateId>,
    pub executive: Vec<CandidateId>,
}

impl VoteRequest {
    pub fn from_selection(state: &SelectionState) -> VoteRequest {
        VoteRequest {
            council: state.council().to_vec(),
            executive: state.executive().to_vec(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub email: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserInfo,
}

/// Asks for a voter id, identifying the voter by email and the end of their
/// phone number.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterIdRequest {
    pub email: String,
    #[serde(rename = "phoneLast4")]
    pub phone_last4: String,
}

impl VoterIdRequest {
    /// Checks the fields in the order the server reports them.
    pub fn check(&self) -> Result<(), BackendError> {
        let refuse = |message: &str| -> Result<(), BackendError> {
            Err(BackendError::Rejected {
                status: 400,
                message: message.to_string(),
            })
        };
        if self.email.is_empty() || self.phone_last4.is_empty() {
            return refuse("Email and last 4 digits of phone are required");
        }
        if !self.email.contains('@') || !self.email.contains('.') {
            return refuse("Invalid email format");
        }
        if self.phone_last4.len() != 4 || !self.phone_last4.chars().all(|c| c.is_ascii_digit()) {
            return refuse("Phone last 4 digits must be 4 numbers");
        }
        Ok(())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterIdResponse {
    pub message: String,
    #[serde(rename = "voterId")]
    pub voter_id: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(rename = "hasVoted", default)]
    pub has_voted: bool,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AdminToggleResponse {
    #[serde(rename = "isOpen")]
    pub is_open: bool,
    pub message: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResultsStats {
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    #[serde(rename = "totalVotes")]
    pub total_votes: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: CandidateId,
    pub name: String,
    #[serde(rename = "councilVotes")]
    pub council_votes: u64,
    #[serde(rename = "executiveVotes")]
    pub executive_votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    #[serde(rename = "isOpen")]
    pub is_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: ResultsStats,
    /// Only published once the election is closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CandidateResult>>,
}

impl ResultsResponse {
    /// Parses a results payload. Either the whole document is usable or
    /// nothing is returned.
    pub fn from_json(payload: &str) -> Result<ResultsResponse, BackendError> {
        let res: ResultsResponse = serde_json::from_str(payload)
            .map_err(|e| BackendError::Malformed(format!("results payload: {}", e)))?;
        if !res.is_open && res.results.is_none() {
            return Err(BackendError::Malformed(
                "results payload: closed election without results".to_string(),
            ));
        }
        Ok(res)
    }

    /// The `n` candidates with the most executive votes. Ties keep the
    /// published order.
    pub fn executive_officers(&self, n: usize) -> Vec<&CandidateResult> {
        let mut by_executive: Vec<&CandidateResult> =
            self.results.iter().flat_map(|r| r.iter()).collect();
        by_executive.sort_by(|a, b| b.executive_votes.cmp(&a.executive_votes));
        by_executive.truncate(n);
        by_executive
    }

    /// Share of the eligible voters that cast a ballot, rounded to the
    /// nearest percent (halves round up).
    pub fn turnout_percent(&self, eligible_voters: u64) -> Option<u64> {
        if eligible_voters == 0 {
            return None;
        }
        let votes = self.stats.total_votes as u64;
        Some((votes * 200 + eligible_voters) / (2 * eligible_voters))
    }
}

/// Failures when talking to the backend.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BackendError {
    /// The request did not reach the backend or no answer came back.
    Network(String),
    /// The backend answered with an error status and a message for the user.
    Rejected { status: u16, message: String },
    /// The answer could not be understood.
    Malformed(String),
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(_) => true,
            BackendError::Rejected { status, .. } => *status >= 500,
            BackendError::Malformed(_) => false,
        }
    }
}

impl Error for BackendError {}

impl Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Network(msg) => write!(f, "network error: {}", msg),
            BackendError::Rejected { status, message } => write!(f, "{} ({})", message, status),
            BackendError::Malformed(msg) => write!(f, "malformed payload: {}", msg),
        }
    }
}

/// The server side of the election, as seen by a voting client.
pub trait ElectionBackend {
    fn candidates(&mut self) -> Result<Vec<Candidate>, BackendError>;

    fn demo_login(&mut self) -> Result<AuthResponse, BackendError>;

    fn session(&mut self) -> Result<SessionResponse, BackendError>;

    fn logout(&mut self) -> Result<MessageResponse, BackendError>;

    fn submit_vote(&mut self, request: &VoteRequest) -> Result<MessageResponse, BackendError>;

    fn results(&mut self) -> Result<ResultsResponse, BackendError>;

    fn authenticate_admin(&mut self, password: &str) -> Result<MessageResponse, BackendError>;

    fn toggle_election_status(&mut self) -> Result<AdminToggleResponse, BackendError>;

    /// Issues a voter id while the election is open.
    fn request_voter_id(
        &mut self,
        request: &VoterIdRequest,
    ) -> Result<VoterIdResponse, BackendError>;

    /// Accepts an id issued by [`ElectionBackend::request_voter_id`] that has not voted yet.
    fn verify_voter_id(&mut self, voter_id: &str) -> Result<MessageResponse, BackendError>;
}
