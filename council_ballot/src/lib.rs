/*!
Ballot selection for council elections with executive officers.

A voter fills a slate of council members by clicking candidates. A click on an
unselected candidate adds it to the council picks, a click on a council pick
promotes it to executive officer, and a click on an executive officer removes
it from the ballot altogether.

```
use council_ballot::*;

let roster = Roster::new(vec![Candidate {
    id: CandidateId(1),
    name: "Anna".to_string(),
    position: String::new(),
    bio: String::new(),
    activity: 10,
    photo: None,
    is_winner: false,
}])?;
let limits = SelectionLimits::DEFAULT_LIMITS;

let mut state = SelectionState::new();
assert_eq!(state.toggle(CandidateId(1), &roster, &limits, true), None);
assert_eq!(state.council(), &[CandidateId(1)]);
assert!(!can_submit(&state, &limits));
# Ok::<(), BallotErrors>(())
```
*/
pub mod builder;
mod config;
pub mod protocol;
pub mod session;
mod tally;

use log::{debug, warn};

use std::collections::HashSet;

pub use crate::config::*;
pub use crate::tally::*;

/// The registered candidates, in display order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Roster {
    candidates: Vec<Candidate>,
}

impl Roster {
    pub fn new(candidates: Vec<Candidate>) -> Result<Roster, BallotErrors> {
        let mut seen: HashSet<CandidateId> = HashSet::new();
        for c in candidates.iter() {
            if !seen.insert(c.id) {
                return Err(BallotErrors::DuplicateCandidate(c.id));
            }
        }
        Ok(Roster { candidates })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl SelectionStatus {
    /// The single deterministic step of the click cycle.
    pub fn next(self, ctx: &TransitionContext) -> Transition {
        match self {
            SelectionStatus::None if ctx.council_len >= ctx.limits.council_seats() => {
                Transition::Refuse(UserMessage::CouncilLimitReached {
                    max: ctx.limits.council_seats(),
                })
            }
            SelectionStatus::None => Transition::Select,
            SelectionStatus::Council if ctx.executive_len < ctx.limits.executive_seats() => {
                Transition::Promote
            }
            // All the executive slots are taken: the click is read as a deselection.
            SelectionStatus::Council => Transition::Deselect,
            SelectionStatus::Executive => Transition::Remove,
        }
    }
}

/// The picks of a voter, in the order they were made.
///
/// Invariants, maintained by every operation:
/// - no id appears twice in either list
/// - every executive pick is also a council pick
/// - the lists never grow past the limits they were toggled with
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SelectionState {
    council: Vec<CandidateId>,
    executive: Vec<CandidateId>,
}

impl SelectionState {
    pub fn new() -> SelectionState {
        SelectionState::default()
    }

    /// Rebuilds a selection from previously recorded picks.
    pub fn from_picks(
        council: &[CandidateId],
        executive: &[CandidateId],
        limits: &SelectionLimits,
    ) -> Result<SelectionState, BallotErrors> {
        let state = SelectionState {
            council: council.to_vec(),
            executive: executive.to_vec(),
        };
        state.check_invariants(limits)?;
        Ok(state)
    }

    pub fn council(&self) -> &[CandidateId] {
        &self.council
    }

    pub fn executive(&self) -> &[CandidateId] {
        &self.executive
    }

    pub fn is_empty(&self) -> bool {
        self.council.is_empty()
    }

    /// The status of one candidate card.
    ///
    /// It is not stored: it is read from the two pick lists, executive first.
    /// `toggle` steps the cycle only through this value and
    /// [`SelectionStatus::next`], so the lists stay the single source of truth.
    pub fn status(&self, id: CandidateId) -> SelectionStatus {
        if self.executive.contains(&id) {
            SelectionStatus::Executive
        } else if self.council.contains(&id) {
            SelectionStatus::Council
        } else {
            SelectionStatus::None
        }
    }

    pub fn clear(&mut self) {
        self.council.clear();
        self.executive.clear();
    }

    /// Applies one click on the candidate `id`.
    ///
    /// Returns the message to show to the voter, if any. Clicks on unknown
    /// candidates are logged and otherwise ignored.
    pub fn toggle(
        &mut self,
        id: CandidateId,
        roster: &Roster,
        limits: &SelectionLimits,
        election_open: bool,
    ) -> Option<UserMessage> {
        if !election_open {
            debug!("toggle: election closed, ignoring click on {}", id);
            return Some(UserMessage::VotingClosed);
        }
        if !roster.contains(id) {
            warn!("toggle: candidate with id {} not found", id);
            return None;
        }

        let from = self.status(id);
        let ctx = TransitionContext {
            council_len: self.council.len(),
            executive_len: self.executive.len(),
            limits: *limits,
        };
        let transition = from.next(&ctx);
        debug!(
            "toggle: candidate {}: {:?} -> {:?} via {:?}",
            id,
            from,
            transition.target(from),
            transition
        );

        match transition {
            Transition::Select => self.council.push(id),
            Transition::Promote => self.executive.push(id),
            Transition::Deselect => self.council.retain(|cid| *cid != id),
            Transition::Remove => {
                self.executive.retain(|cid| *cid != id);
                self.council.retain(|cid| *cid != id);
            }
            Transition::Refuse(msg) => return Some(msg),
        }
        None
    }

    /// Same as `toggle`, but leaves `self` untouched and returns the new state.
    pub fn toggled(
        &self,
        id: CandidateId,
        roster: &Roster,
        limits: &SelectionLimits,
        election_open: bool,
    ) -> (SelectionState, Option<UserMessage>) {
        let mut next = self.clone();
        let msg = next.toggle(id, roster, limits, election_open);
        (next, msg)
    }

    pub fn check_invariants(&self, limits: &SelectionLimits) -> Result<(), BallotErrors> {
        if self.council.len() > limits.council_seats()
            || self.executive.len() > limits.executive_seats()
        {
            return Err(BallotErrors::SelectionOverflow {
                council: self.council.len(),
                executive: self.executive.len(),
            });
        }
        let mut seen: HashSet<CandidateId> = HashSet::new();
        for cid in self.council.iter() {
            if !seen.insert(*cid) {
                return Err(BallotErrors::DuplicateCandidate(*cid));
            }
        }
        let mut seen_exec: HashSet<CandidateId> = HashSet::new();
        for cid in self.executive.iter() {
            if !seen_exec.insert(*cid) {
                return Err(BallotErrors::DuplicateCandidate(*cid));
            }
            if !seen.contains(cid) {
                return Err(BallotErrors::ExecutiveNotInCouncil(*cid));
            }
        }
        Ok(())
    }
}

/// True when the ballot holds exactly the required number of picks.
pub fn can_submit(state: &SelectionState, limits: &SelectionLimits) -> bool {
    check_submission(state, limits).is_ok()
}

/// Returns the first unmet submission requirement.
pub fn check_submission(
    state: &SelectionState,
    limits: &SelectionLimits,
) -> Result<(), SubmitBlocker> {
    if state.council.len() != limits.council_seats() {
        return Err(SubmitBlocker::CouncilIncomplete {
            required: limits.council_seats(),
            selected: state.council.len(),
        });
    }
    if state.executive.len() != limits.executive_seats() {
        return Err(SubmitBlocker::ExecutiveIncomplete {
            required: limits.executive_seats(),
            selected: state.executive.len(),
        });
    }
    Ok(())
}

/// The rendering instructions for every candidate of the roster.
///
/// Council picks carry their position in the council list as badge, executive
/// officers their position in the executive list.
pub fn render(state: &SelectionState, candidates: &[Candidate]) -> Vec<CandidateView> {
    candidates
        .iter()
        .map(|c| {
            let council_pos = state.council.iter().position(|cid| *cid == c.id);
            let executive_pos = state.executive.iter().position(|cid| *cid == c.id);
            CandidateView {
                id: c.id,
                selected: council_pos.is_some(),
                executive: executive_pos.is_some(),
                badge_number: executive_pos.or(council_pos).map(|idx| idx + 1),
            }
        })
        .collect()
}

pub fn summary(state: &SelectionState, limits: &SelectionLimits) -> SelectionSummary {
    SelectionSummary {
        selected_count: state.council.len(),
        executive_count: state.executive.len(),
        can_submit: can_submit(state, limits),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::*;

    pub fn candidate(id: u32, name: &str) -> Candidate {
        Candidate {
            id: CandidateId(id),
            name: name.to_string(),
            position: String::new(),
            bio: String::new(),
            activity: id,
            photo: None,
            is_winner: false,
        }
    }

    /// Candidates `1..=n`, named `C1`, `C2`, ...
    pub fn roster(n: u32) -> Roster {
        Roster::new((1..=n).map(|i| candidate(i, &format!("C{}", i))).collect()).unwrap()
    }

    pub fn ids(v: &[u32]) -> Vec<CandidateId> {
        v.iter().map(|i| CandidateId(*i)).collect()
    }
}
