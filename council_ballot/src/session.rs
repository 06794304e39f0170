//! The voting session: the single owner of a voter's selection.

use log::{debug, info, warn};

use std::error::Error;
use std::fmt::Display;

use crate::protocol::{BackendError, ElectionBackend, MessageResponse, UserInfo, VoteRequest};
use crate::*;

/// Why a submission did not go through. The selection is left as it was in
/// every case, so the voter can try again.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmitError {
    NotAuthenticated,
    Incomplete(SubmitBlocker),
    /// The backend refused the ballot, with a message for the voter.
    Rejected(String),
    /// The backend could not be reached or its answer was not understood.
    Failed(BackendError),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::Failed(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl Error for SubmitError {}

impl Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::NotAuthenticated => {
                write!(f, "You must be authenticated before submitting.")
            }
            SubmitError::Incomplete(blocker) => write!(f, "{}", blocker),
            SubmitError::Rejected(message) => write!(f, "{}", message),
            SubmitError::Failed(_) => write!(
                f,
                "An error occurred while submitting your vote. Please try again."
            ),
        }
    }
}

/// Everything a voting client holds between two clicks.
///
/// The selection starts empty when a voter authenticates, and is cleared on
/// logout and after a confirmed submission.
#[derive(Debug, Clone)]
pub struct VotingSession {
    roster: Roster,
    limits: SelectionLimits,
    election_open: bool,
    user: Option<UserInfo>,
    selection: SelectionState,
}

impl VotingSession {
    pub fn new(roster: Roster, limits: SelectionLimits, election_open: bool) -> VotingSession {
        VotingSession {
            roster,
            limits,
            election_open,
            user: None,
            selection: SelectionState::new(),
        }
    }

    /// Loads the candidates and the election status from the backend.
    pub fn start<B: ElectionBackend + ?Sized>(
        backend: &mut B,
        limits: SelectionLimits,
    ) -> Result<VotingSession, BackendError> {
        let candidates = backend.candidates()?;
        let roster = Roster::new(candidates)
            .map_err(|e| BackendError::Malformed(format!("candidates: {}", e)))?;
        let election_open = backend.results()?.is_open;
        info!(
            "start: {} candidates, election open: {}",
            roster.len(),
            election_open
        );
        Ok(VotingSession::new(roster, limits, election_open))
    }

    pub fn authenticate(&mut self, user: UserInfo) {
        info!("authenticate: {}", user.email);
        self.user = Some(user);
        self.selection.clear();
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.selection.clear();
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn limits(&self) -> &SelectionLimits {
        &self.limits
    }

    pub fn election_open(&self) -> bool {
        self.election_open
    }

    pub fn set_election_open(&mut self, open: bool) {
        self.election_open = open;
    }

    pub fn toggle(&mut self, id: CandidateId) -> Option<UserMessage> {
        self.selection
            .toggle(id, &self.roster, &self.limits, self.election_open)
    }

    pub fn state(&self) -> &SelectionState {
        &self.selection
    }

    pub fn can_submit(&self) -> bool {
        can_submit(&self.selection, &self.limits)
    }

    pub fn reset(&mut self) {
        self.selection.clear();
    }

    pub fn render(&self) -> Vec<CandidateView> {
        render(&self.selection, self.roster.candidates())
    }

    pub fn summary(&self) -> SelectionSummary {
        summary(&self.selection, &self.limits)
    }

    /// Sends the current selection to the backend.
    ///
    /// Only a confirmed submission clears the selection and the user.
    pub fn submit<B: ElectionBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<MessageResponse, SubmitError> {
        if self.user.is_none() {
            return Err(SubmitError::NotAuthenticated);
        }
        check_submission(&self.selection, &self.limits).map_err(SubmitError::Incomplete)?;

        let request = VoteRequest::from_selection(&self.selection);
        debug!("submit: sending {:?}", request);
        match backend.submit_vote(&request) {
            Ok(resp) => {
                info!("submit: {}", resp.message);
                self.selection.clear();
                self.user = None;
                Ok(resp)
            }
            Err(BackendError::Rejected { status, message }) if status < 500 => {
                warn!("submit: rejected ({}): {}", status, message);
                Err(SubmitError::Rejected(message))
            }
            Err(e) => {
                warn!("submit: failed: {}", e);
                Err(SubmitError::Failed(e))
            }
        }
    }
}
