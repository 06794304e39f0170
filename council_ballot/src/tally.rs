// The ballot box: accepting complete ballots and counting them.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;

use crate::protocol::{AdminToggleResponse, CandidateResult, ResultsResponse, ResultsStats, VoteRequest};
use crate::{CandidateId, Roster, SelectionLimits};

/// A ballot as stored by the backend.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecordedVote {
    pub id: String,
    pub voter_id: String,
    pub selected_candidates: Vec<CandidateId>,
    pub executive_candidates: Vec<CandidateId>,
    pub timestamp: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotesData {
    pub voter_ids: Vec<String>,
    pub votes: Vec<RecordedVote>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElectionStatus {
    pub is_open: bool,
}

impl Default for ElectionStatus {
    fn default() -> Self {
        ElectionStatus { is_open: true }
    }
}

/// Reasons for the backend to refuse a ballot.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BallotRejection {
    AlreadyVoted,
    MissingSelections,
    WrongCouncilCount { required: usize },
    WrongExecutiveCount { required: usize },
    InvalidCandidate(CandidateId),
    DuplicatePick(CandidateId),
    ExecutiveNotInCouncil(CandidateId),
    ElectionClosed,
}

impl Error for BallotRejection {}

impl Display for BallotRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BallotRejection::AlreadyVoted => write!(f, "You have already voted"),
            BallotRejection::MissingSelections => write!(
                f,
                "Selected candidates and executive candidates are required"
            ),
            BallotRejection::WrongCouncilCount { required } => {
                write!(f, "You must select exactly {} candidates", required)
            }
            BallotRejection::WrongExecutiveCount { required } => {
                write!(f, "You must select exactly {} executive officers", required)
            }
            BallotRejection::InvalidCandidate(_) => write!(f, "Invalid candidate ID provided"),
            BallotRejection::DuplicatePick(_) => {
                write!(f, "A candidate may only be selected once")
            }
            BallotRejection::ExecutiveNotInCouncil(_) => write!(
                f,
                "Executive officers must be chosen among the selected candidates"
            ),
            BallotRejection::ElectionClosed => write!(f, "Election is currently closed"),
        }
    }
}

/// All the ballots of one election, with the status of the election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotBox {
    roster: Roster,
    limits: SelectionLimits,
    status: ElectionStatus,
    votes: VotesData,
}

impl BallotBox {
    pub fn new(
        roster: Roster,
        limits: SelectionLimits,
        status: ElectionStatus,
        votes: VotesData,
    ) -> BallotBox {
        BallotBox {
            roster,
            limits,
            status,
            votes,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn limits(&self) -> &SelectionLimits {
        &self.limits
    }

    pub fn status(&self) -> ElectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open
    }

    pub fn votes(&self) -> &VotesData {
        &self.votes
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.votes.voter_ids.iter().any(|v| v == voter_id)
    }

    /// Runs every acceptance rule without recording anything.
    pub fn check(&self, voter_id: &str, request: &VoteRequest) -> Result<(), BallotRejection> {
        if self.has_voted(voter_id) {
            return Err(BallotRejection::AlreadyVoted);
        }
        if request.council.is_empty() || request.executive.is_empty() {
            return Err(BallotRejection::MissingSelections);
        }
        if request.council.len() != self.limits.council_seats() {
            return Err(BallotRejection::WrongCouncilCount {
                required: self.limits.council_seats(),
            });
        }
        if request.executive.len() != self.limits.executive_seats() {
            return Err(BallotRejection::WrongExecutiveCount {
                required: self.limits.executive_seats(),
            });
        }
        if let Some(cid) = request
            .council
            .iter()
            .chain(request.executive.iter())
            .find(|cid| !self.roster.contains(**cid))
        {
            return Err(BallotRejection::InvalidCandidate(*cid));
        }
        let mut council: HashSet<CandidateId> = HashSet::new();
        for cid in request.council.iter() {
            if !council.insert(*cid) {
                return Err(BallotRejection::DuplicatePick(*cid));
            }
        }
        let mut executive: HashSet<CandidateId> = HashSet::new();
        for cid in request.executive.iter() {
            if !executive.insert(*cid) {
                return Err(BallotRejection::DuplicatePick(*cid));
            }
            if !council.contains(cid) {
                return Err(BallotRejection::ExecutiveNotInCouncil(*cid));
            }
        }
        if !self.status.is_open {
            return Err(BallotRejection::ElectionClosed);
        }
        Ok(())
    }

    /// Records a ballot for `voter_id` once it passes all the acceptance rules.
    pub fn cast(
        &mut self,
        voter_id: &str,
        request: &VoteRequest,
        timestamp: &str,
    ) -> Result<&RecordedVote, BallotRejection> {
        self.check(voter_id, request)?;
        let vote = RecordedVote {
            id: vote_id(voter_id, timestamp, request),
            voter_id: voter_id.to_string(),
            selected_candidates: request.council.clone(),
            executive_candidates: request.executive.clone(),
            timestamp: timestamp.to_string(),
        };
        info!("cast: recorded vote {} for voter {}", vote.id, voter_id);
        self.votes.voter_ids.push(voter_id.to_string());
        self.votes.votes.push(vote);
        Ok(&self.votes.votes[self.votes.votes.len() - 1])
    }

    pub fn toggle_open(&mut self) -> AdminToggleResponse {
        self.status.is_open = !self.status.is_open;
        let message = if self.status.is_open {
            "Election is now open"
        } else {
            "Election is now closed"
        };
        info!("toggle_open: {}", message);
        AdminToggleResponse {
            is_open: self.status.is_open,
            message: message.to_string(),
        }
    }

    pub fn stats(&self) -> ResultsStats {
        ResultsStats {
            total_candidates: self.roster.len(),
            total_votes: self.votes.votes.len(),
        }
    }

    /// Counts the recorded ballots, whatever the status of the election.
    pub fn tally(&self) -> Vec<CandidateResult> {
        count_votes(
            &self.roster,
            self.votes
                .votes
                .iter()
                .map(|v| (v.selected_candidates.as_slice(), v.executive_candidates.as_slice())),
        )
    }

    /// The public results. Counts are withheld while the election is open.
    pub fn results(&self) -> ResultsResponse {
        if self.status.is_open {
            return ResultsResponse {
                is_open: true,
                message: Some("Election is open. Results are not available yet.".to_string()),
                stats: self.stats(),
                results: None,
            };
        }
        ResultsResponse {
            is_open: false,
            message: None,
            stats: self.stats(),
            results: Some(self.tally()),
        }
    }

    pub fn export_header(&self) -> Vec<String> {
        let mut header = vec!["Voter ID".to_string()];
        header.extend((1..=self.limits.executive_seats()).map(|i| format!("Executive {}", i)));
        header.extend((1..=self.limits.plain_council_seats()).map(|i| format!("Council {}", i)));
        header
    }

    /// One row per ballot: the voter, the executive officers in ballot order,
    /// then the other council members. Short ballots are padded with blanks.
    pub fn export_rows(&self) -> Vec<Vec<String>> {
        let executive_seats = self.limits.executive_seats();
        let plain_seats = self.limits.plain_council_seats();
        let name_of = |cid: &CandidateId| match self.roster.get(*cid) {
            Some(c) => c.name.clone(),
            None => format!("Unknown ID: {}", cid),
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        for vote in self.votes.votes.iter() {
            let mut row = vec![vote.voter_id.clone()];
            let executives: HashSet<CandidateId> =
                vote.executive_candidates.iter().cloned().collect();

            let mut exec_names: Vec<String> = vote
                .executive_candidates
                .iter()
                .take(executive_seats)
                .map(name_of)
                .collect();
            exec_names.resize(executive_seats, String::new());
            row.extend(exec_names);

            let mut council_names: Vec<String> = vote
                .selected_candidates
                .iter()
                .filter(|cid| !executives.contains(cid))
                .take(plain_seats)
                .map(name_of)
                .collect();
            council_names.resize(plain_seats, String::new());
            row.extend(council_names);

            rows.push(row);
        }
        rows
    }
}

/// Counts council and executive votes for every candidate of the roster.
///
/// The result is sorted by council votes, then executive votes, both
/// decreasing. Candidates with the same counts keep the roster order. Picks
/// of candidates outside the roster are not counted.
pub fn count_votes<'a>(
    roster: &Roster,
    ballots: impl Iterator<Item = (&'a [CandidateId], &'a [CandidateId])>,
) -> Vec<CandidateResult> {
    let mut counts: HashMap<CandidateId, (u64, u64)> = roster
        .candidates()
        .iter()
        .map(|c| (c.id, (0, 0)))
        .collect();
    let mut num_ballots = 0;
    for (council, executive) in ballots {
        num_ballots += 1;
        for cid in council.iter() {
            if let Some(e) = counts.get_mut(cid) {
                e.0 += 1;
            }
        }
        for cid in executive.iter() {
            if let Some(e) = counts.get_mut(cid) {
                e.1 += 1;
            }
        }
    }
    debug!("count_votes: counted {} ballots", num_ballots);

    let mut results: Vec<CandidateResult> = roster
        .candidates()
        .iter()
        .map(|c| {
            let (council_votes, executive_votes) = counts.get(&c.id).cloned().unwrap_or((0, 0));
            CandidateResult {
                id: c.id,
                name: c.name.clone(),
                council_votes,
                executive_votes,
            }
        })
        .collect();
    results.sort_by(|a, b| {
        (b.council_votes, b.executive_votes).cmp(&(a.council_votes, a.executive_votes))
    });
    results
}

// Identifier of a recorded vote, derived from its content.
fn vote_id(voter_id: &str, timestamp: &str, request: &VoteRequest) -> String {
    let material = format!(
        "{}|{}|{:?}|{:?}",
        voter_id, timestamp, request.council, request.executive
    );
    let h = sha256::digest(material.as_str());
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn request(council: &[u32], executive: &[u32]) -> VoteRequest {
        VoteRequest {
            council: ids(council),
            executive: ids(executive),
        }
    }

    fn small_box(is_open: bool) -> BallotBox {
        BallotBox::new(
            roster(5),
            SelectionLimits::new(3, 2).unwrap(),
            ElectionStatus { is_open },
            VotesData::default(),
        )
    }

    #[test]
    fn accepts_a_complete_ballot_once() {
        let mut bb = small_box(true);
        let vote = bb
            .cast("v1", &request(&[3, 1, 2], &[1, 3]), "2024-05-01T10:00:00Z")
            .unwrap()
            .clone();
        assert_eq!(vote.selected_candidates, ids(&[3, 1, 2]));
        assert_eq!(vote.executive_candidates, ids(&[1, 3]));
        assert_eq!(vote.id.len(), 36);
        assert!(bb.has_voted("v1"));
        assert_eq!(
            bb.cast("v1", &request(&[3, 1, 2], &[1, 3]), "2024-05-01T10:01:00Z"),
            Err(BallotRejection::AlreadyVoted)
        );
        assert_eq!(bb.votes().votes.len(), 1);
    }

    #[test]
    fn rejection_rules() {
        let bb = small_box(true);
        let cases = vec![
            (request(&[], &[]), BallotRejection::MissingSelections),
            (
                request(&[1, 2], &[1]),
                BallotRejection::WrongCouncilCount { required: 3 },
            ),
            (
                request(&[1, 2, 3], &[1]),
                BallotRejection::WrongExecutiveCount { required: 2 },
            ),
            (
                request(&[1, 2, 9], &[1, 2]),
                BallotRejection::InvalidCandidate(CandidateId(9)),
            ),
            (
                request(&[1, 2, 2], &[1, 2]),
                BallotRejection::DuplicatePick(CandidateId(2)),
            ),
            (
                request(&[1, 2, 3], &[1, 4]),
                BallotRejection::ExecutiveNotInCouncil(CandidateId(4)),
            ),
        ];
        for (req, expected) in cases {
            assert_eq!(bb.check("v", &req), Err(expected));
        }
        assert_eq!(
            small_box(false).check("v", &request(&[1, 2, 3], &[1, 2])),
            Err(BallotRejection::ElectionClosed)
        );
        assert_eq!(
            BallotRejection::WrongCouncilCount { required: 15 }.to_string(),
            "You must select exactly 15 candidates"
        );
    }

    #[test]
    fn results_are_hidden_while_open() {
        let mut bb = small_box(true);
        bb.cast("v1", &request(&[1, 2, 3], &[1, 2]), "t").unwrap();
        let res = bb.results();
        assert!(res.is_open);
        assert_eq!(res.results, None);
        assert_eq!(res.stats.total_votes, 1);
        assert_eq!(res.stats.total_candidates, 5);

        let toggled = bb.toggle_open();
        assert_eq!(toggled.message, "Election is now closed");
        assert!(!toggled.is_open);
        assert!(bb.results().results.is_some());
    }

    #[test]
    fn tally_sorts_by_council_then_executive_votes() {
        let mut bb = small_box(true);
        bb.cast("v1", &request(&[1, 2, 3], &[3, 2]), "t").unwrap();
        bb.cast("v2", &request(&[2, 3, 4], &[2, 4]), "t").unwrap();
        bb.cast("v3", &request(&[5, 3, 2], &[5, 3]), "t").unwrap();
        bb.toggle_open();
        let results = bb.results().results.unwrap();
        let summary: Vec<(u32, u64, u64)> = results
            .iter()
            .map(|r| (r.id.0, r.council_votes, r.executive_votes))
            .collect();
        assert_eq!(
            summary,
            vec![(2, 3, 2), (3, 3, 2), (4, 1, 1), (5, 1, 1), (1, 1, 0)]
        );
    }

    #[test]
    fn unknown_ids_in_stored_votes_are_not_counted() {
        let votes = VotesData {
            voter_ids: vec!["old".to_string()],
            votes: vec![RecordedVote {
                id: "x".to_string(),
                voter_id: "old".to_string(),
                selected_candidates: ids(&[1, 42]),
                executive_candidates: ids(&[42]),
                timestamp: "t".to_string(),
            }],
        };
        let bb = BallotBox::new(
            roster(2),
            SelectionLimits::new(2, 1).unwrap(),
            ElectionStatus { is_open: false },
            votes,
        );
        let results = bb.tally();
        assert_eq!(results.len(), 2);
        assert_eq!((results[0].id.0, results[0].council_votes), (1, 1));
        assert_eq!(results[1].council_votes + results[1].executive_votes, 0);
    }

    #[test]
    fn export_layout() {
        let votes = VotesData {
            voter_ids: vec!["a".to_string(), "b".to_string()],
            votes: vec![
                RecordedVote {
                    id: "1".to_string(),
                    voter_id: "a".to_string(),
                    selected_candidates: ids(&[1, 2, 3]),
                    executive_candidates: ids(&[3, 1]),
                    timestamp: "t".to_string(),
                },
                RecordedVote {
                    id: "2".to_string(),
                    voter_id: "b".to_string(),
                    selected_candidates: ids(&[7]),
                    executive_candidates: ids(&[7]),
                    timestamp: "t".to_string(),
                },
            ],
        };
        let bb = BallotBox::new(
            roster(3),
            SelectionLimits::new(3, 2).unwrap(),
            ElectionStatus::default(),
            votes,
        );
        assert_eq!(
            bb.export_header(),
            vec!["Voter ID", "Executive 1", "Executive 2", "Council 1"]
        );
        assert_eq!(
            bb.export_rows(),
            vec![
                vec!["a", "C3", "C1", "C2"],
                vec!["b", "Unknown ID: 7", "", ""],
            ]
        );
    }
}
