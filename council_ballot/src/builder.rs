use crate::*;

/// A builder for counting ballots outside of a ballot box.
///
/// Useful when the ballots were collected by some other mean and only the
/// counts are needed.
///
/// ```
/// pub use council_ballot::builder::Builder;
/// pub use council_ballot::*;
///
/// let limits = SelectionLimits::new(2, 1)?;
/// let mut builder = Builder::new(&limits)?;
///
/// builder.add_ballot(&[CandidateId(3), CandidateId(1)], &[CandidateId(1)])?;
/// builder.add_ballot(&[CandidateId(1), CandidateId(2)], &[CandidateId(2)])?;
///
/// let results = builder.tally();
/// assert_eq!(results[0].id, CandidateId(1));
/// assert_eq!(results[0].council_votes, 2);
/// # Ok::<(), BallotErrors>(())
/// ```
pub struct Builder {
    pub(crate) _limits: SelectionLimits,
    pub(crate) _roster: Option<Roster>,
    pub(crate) _ballots: Vec<SelectionState>,
}

impl Builder {
    pub fn new(limits: &SelectionLimits) -> Result<Builder, BallotErrors> {
        Ok(Builder {
            _limits: *limits,
            _roster: None,
            _ballots: Vec::new(),
        })
    }

    /// Registers the candidates. Ballots naming anybody else are refused.
    pub fn candidates(self, cands: &[Candidate]) -> Result<Builder, BallotErrors> {
        Ok(Builder {
            _limits: self._limits,
            _roster: Some(Roster::new(cands.to_vec())?),
            _ballots: Vec::new(),
        })
    }

    /// Adds a ballot. It may be partially filled, but it must be a selection
    /// the voting session could have produced.
    pub fn add_ballot(
        &mut self,
        council: &[CandidateId],
        executive: &[CandidateId],
    ) -> Result<(), BallotErrors> {
        let state = SelectionState::from_picks(council, executive, &self._limits)?;
        if let Some(roster) = self._roster.as_ref() {
            if let Some(cid) = council.iter().find(|cid| !roster.contains(**cid)) {
                return Err(BallotErrors::UnknownCandidate(*cid));
            }
        }
        self._ballots.push(state);
        Ok(())
    }

    pub fn num_ballots(&self) -> usize {
        self._ballots.len()
    }

    /// Counts the ballots added so far.
    ///
    /// Without registered candidates, the candidates are inferred from the
    /// ballots, in order of first appearance, and named after their id.
    pub fn tally(&self) -> Vec<protocol::CandidateResult> {
        let roster = match self._roster.clone() {
            Some(r) => r,
            None => self.inferred_roster(),
        };
        count_votes(
            &roster,
            self._ballots
                .iter()
                .map(|s| (s.council(), s.executive())),
        )
    }

    fn inferred_roster(&self) -> Roster {
        let mut seen: Vec<CandidateId> = Vec::new();
        for cid in self._ballots.iter().flat_map(|s| s.council().iter()) {
            if !seen.contains(cid) {
                seen.push(*cid);
            }
        }
        Roster {
            candidates: seen
                .into_iter()
                .map(|cid| Candidate {
                    id: cid,
                    name: cid.to_string(),
                    position: String::new(),
                    bio: String::new(),
                    activity: 0,
                    photo: None,
                    is_winner: false,
                })
                .collect(),
        }
    }
}
