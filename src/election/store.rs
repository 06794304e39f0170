//! A backend that keeps the election in local JSON files.
//!
//! The votes and the status of the election are written back after every
//! change. A change that cannot be saved is rolled back.

use chrono::{SecondsFormat, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::election::io_roster::read_roster;
use crate::election::*;

const DEMO_USER_NAME: &str = "Demo User";
const DEMO_USER_EMAIL: &str = "demo@example.com";

// Who is currently logged in. An administrator who did not log in as a voter
// has no voter id.
#[derive(Debug, Clone)]
struct Login {
    voter_id: Option<String>,
    user: UserInfo,
    is_admin: bool,
}

#[derive(Debug)]
pub struct LocalBackend {
    ballot_box: BallotBox,
    votes_path: PathBuf,
    status_path: PathBuf,
    admin_password: Option<String>,
    current: Option<Login>,
    issued_voter_ids: HashSet<String>,
}

fn rejected(status: u16, message: &str) -> BackendError {
    BackendError::Rejected {
        status,
        message: message.to_string(),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `<prefix>_` followed by 8 random upper-case hex digits.
fn random_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, hex[..8].to_uppercase())
}

impl LocalBackend {
    pub fn open(config: &ElectionConfig, root: &Path) -> ElectionResult<LocalBackend> {
        let roster = read_roster(root, &config.candidate_source)?;
        let limits = config.rules.limits()?;
        let votes_path = config.votes_path(root);
        let status_path = config.status_path(root);
        let votes: VotesData = read_json_or_default(&votes_path)?;
        let status: ElectionStatus = read_json_or_default(&status_path)?;
        info!(
            "open: {} candidates, {} votes, election open: {}",
            roster.len(),
            votes.votes.len(),
            status.is_open
        );
        Ok(LocalBackend {
            ballot_box: BallotBox::new(roster, limits, status, votes),
            votes_path,
            status_path,
            admin_password: config.admin_password.clone(),
            current: None,
            issued_voter_ids: HashSet::new(),
        })
    }

    pub fn ballot_box(&self) -> &BallotBox {
        &self.ballot_box
    }
}

impl ElectionBackend for LocalBackend {
    fn candidates(&mut self) -> Result<Vec<Candidate>, BackendError> {
        Ok(self.ballot_box.roster().candidates().to_vec())
    }

    fn demo_login(&mut self) -> Result<AuthResponse, BackendError> {
        let voter_id = random_id("DEMO_USER");
        let user = UserInfo {
            name: DEMO_USER_NAME.to_string(),
            email: DEMO_USER_EMAIL.to_string(),
        };
        info!("demo_login: voter {}", voter_id);
        self.current = Some(Login {
            voter_id: Some(voter_id),
            user: user.clone(),
            is_admin: false,
        });
        Ok(AuthResponse {
            message: "Demo mode activated successfully".to_string(),
            user,
        })
    }

    fn session(&mut self) -> Result<SessionResponse, BackendError> {
        Ok(match self.current.as_ref() {
            Some(login) => SessionResponse {
                authenticated: true,
                user: Some(login.user.clone()),
                has_voted: login
                    .voter_id
                    .as_deref()
                    .map(|v| self.ballot_box.has_voted(v))
                    .unwrap_or(false),
                is_admin: login.is_admin,
            },
            None => SessionResponse {
                authenticated: false,
                user: None,
                has_voted: false,
                is_admin: false,
            },
        })
    }

    fn logout(&mut self) -> Result<MessageResponse, BackendError> {
        self.current = None;
        Ok(MessageResponse {
            message: "Logged out successfully".to_string(),
        })
    }

    fn submit_vote(&mut self, request: &VoteRequest) -> Result<MessageResponse, BackendError> {
        let voter_id = match self.current.as_ref() {
            Some(Login {
                voter_id: Some(v), ..
            }) => v.clone(),
            Some(_) => return Err(rejected(403, "Admin accounts cannot vote")),
            None => return Err(rejected(401, "Authentication required")),
        };
        let previous = self.ballot_box.clone();
        match self.ballot_box.cast(&voter_id, request, &now()) {
            Ok(vote) => debug!("submit_vote: vote {}", vote.id),
            Err(rejection) => {
                warn!("submit_vote: voter {}: {}", voter_id, rejection);
                return Err(rejected(400, &rejection.to_string()));
            }
        }
        if let Err(e) = write_json(&self.votes_path, self.ballot_box.votes()) {
            warn!("submit_vote: could not save the vote: {}", e);
            self.ballot_box = previous;
            return Err(rejected(500, "Failed to save vote"));
        }
        Ok(MessageResponse {
            message: "Vote submitted successfully".to_string(),
        })
    }

    fn results(&mut self) -> Result<ResultsResponse, BackendError> {
        Ok(self.ballot_box.results())
    }

    fn authenticate_admin(&mut self, password: &str) -> Result<MessageResponse, BackendError> {
        if password.is_empty() {
            return Err(rejected(400, "Password is required"));
        }
        match self.admin_password.as_deref() {
            Some(expected) if expected == password => {
                match self.current.as_mut() {
                    Some(login) => login.is_admin = true,
                    None => {
                        self.current = Some(Login {
                            voter_id: None,
                            user: UserInfo {
                                name: "Administrator".to_string(),
                                email: "".to_string(),
                            },
                            is_admin: true,
                        })
                    }
                }
                info!("authenticate_admin: admin authenticated");
                Ok(MessageResponse {
                    message: "Admin authenticated".to_string(),
                })
            }
            _ => {
                warn!("authenticate_admin: invalid password");
                Err(rejected(401, "Invalid password"))
            }
        }
    }

    fn toggle_election_status(&mut self) -> Result<AdminToggleResponse, BackendError> {
        match self.current.as_ref() {
            None => return Err(rejected(401, "Authentication required")),
            Some(login) if !login.is_admin => return Err(rejected(403, "Admin access required")),
            Some(_) => {}
        }
        let resp = self.ballot_box.toggle_open();
        if let Err(e) = write_json(&self.status_path, &self.ballot_box.status()) {
            warn!("toggle_election_status: could not save the status: {}", e);
            self.ballot_box.toggle_open();
            return Err(rejected(500, "Failed to update election status"));
        }
        Ok(resp)
    }

    fn request_voter_id(
        &mut self,
        request: &VoterIdRequest,
    ) -> Result<VoterIdResponse, BackendError> {
        request.check()?;
        if !self.ballot_box.is_open() {
            return Err(rejected(400, "Election is currently closed"));
        }
        let voter_id = random_id("VOTER");
        info!("request_voter_id: issued {} for {}", voter_id, request.email);
        self.issued_voter_ids.insert(voter_id.clone());
        Ok(VoterIdResponse {
            message: "Voter ID generated successfully".to_string(),
            voter_id,
        })
    }

    fn verify_voter_id(&mut self, voter_id: &str) -> Result<MessageResponse, BackendError> {
        if voter_id.is_empty() {
            return Err(rejected(400, "Voter ID is required"));
        }
        if !self.ballot_box.is_open() {
            return Err(rejected(400, "Election is currently closed"));
        }
        if !self.issued_voter_ids.contains(voter_id) {
            return Err(rejected(400, "Invalid voter ID"));
        }
        if self.ballot_box.has_voted(voter_id) {
            return Err(rejected(400, "This voter ID has already been used"));
        }
        Ok(MessageResponse {
            message: "Voter ID verified successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_backend(test_name: &str) -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let src = test_dir().join(test_name);
        for f in ["candidates.json", "votes.json", "election_status.json"] {
            fs::copy(src.join(f), dir.path().join(f)).unwrap();
        }
        let (config, _) =
            read_config(&src.join(format!("{}_config.json", test_name)).display().to_string())
                .unwrap();
        let backend = LocalBackend::open(&config, dir.path()).unwrap();
        (dir, backend)
    }

    fn ballot(council: &[u32], executive: &[u32]) -> VoteRequest {
        VoteRequest {
            council: council.iter().map(|x| CandidateId(*x)).collect(),
            executive: executive.iter().map(|x| CandidateId(*x)).collect(),
        }
    }

    #[test]
    fn demo_voter_votes_once() {
        let (_dir, mut backend) = scratch_backend("open_election");
        assert!(!backend.session().unwrap().authenticated);
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])),
            Err(rejected(401, "Authentication required"))
        );

        let auth = backend.demo_login().unwrap();
        assert_eq!(auth.user.name, "Demo User");
        assert_eq!(auth.user.email, "demo@example.com");
        let session = backend.session().unwrap();
        assert!(session.authenticated);
        assert!(!session.has_voted);

        backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])).unwrap();
        assert!(backend.session().unwrap().has_voted);
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])),
            Err(rejected(400, "You have already voted"))
        );

        // The vote is on disk.
        let stored: VotesData = read_json_or_default(&backend.votes_path).unwrap();
        assert_eq!(stored.votes.len(), 2);
        assert_eq!(stored, *backend.ballot_box().votes());

        backend.logout().unwrap();
        assert!(!backend.session().unwrap().authenticated);
    }

    #[test]
    fn bad_ballots_are_not_recorded() {
        let (_dir, mut backend) = scratch_backend("open_election");
        backend.demo_login().unwrap();
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2], &[1])),
            Err(rejected(400, "You must select exactly 3 candidates"))
        );
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2, 9], &[1, 2])),
            Err(rejected(400, "Invalid candidate ID provided"))
        );
        assert_eq!(backend.ballot_box().votes().votes.len(), 1);
    }

    #[test]
    fn only_admins_toggle_the_status() {
        let (_dir, mut backend) = scratch_backend("open_election");
        assert_eq!(
            backend.toggle_election_status(),
            Err(rejected(401, "Authentication required"))
        );
        backend.demo_login().unwrap();
        assert_eq!(
            backend.toggle_election_status(),
            Err(rejected(403, "Admin access required"))
        );
        assert_eq!(
            backend.authenticate_admin(""),
            Err(rejected(400, "Password is required"))
        );
        assert_eq!(
            backend.authenticate_admin("guess"),
            Err(rejected(401, "Invalid password"))
        );
        assert_eq!(
            backend.authenticate_admin("council-admin").unwrap().message,
            "Admin authenticated"
        );
        assert!(backend.session().unwrap().is_admin);

        let resp = backend.toggle_election_status().unwrap();
        assert!(!resp.is_open);
        let stored: ElectionStatus = read_json_or_default(&backend.status_path).unwrap();
        assert!(!stored.is_open);

        // Closed: the results are published and ballots refused.
        assert!(backend.results().unwrap().results.is_some());
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])),
            Err(rejected(400, "Election is currently closed"))
        );

        let resp = backend.toggle_election_status().unwrap();
        assert_eq!(resp.message, "Election is now open");
    }

    #[test]
    fn reopened_store_gives_new_voter_ids() {
        let (dir, mut first) = scratch_backend("open_election");
        first.demo_login().unwrap();
        first.submit_vote(&ballot(&[1, 2, 3], &[1, 2])).unwrap();

        // A second run of the program on the same data files.
        let (config, _) = read_config(
            &test_dir()
                .join("open_election")
                .join("open_election_config.json")
                .display()
                .to_string(),
        )
        .unwrap();
        let mut second = LocalBackend::open(&config, dir.path()).unwrap();
        second.demo_login().unwrap();
        assert!(!second.session().unwrap().has_voted);
        second.submit_vote(&ballot(&[3, 4, 5], &[5, 3])).unwrap();

        let first_id = first.current.as_ref().and_then(|l| l.voter_id.clone());
        let second_id = second.current.as_ref().and_then(|l| l.voter_id.clone());
        assert_ne!(first_id, second_id);
        assert!(second_id.unwrap().starts_with("DEMO_USER_"));
        assert_eq!(second.ballot_box().votes().votes.len(), 3);
    }

    #[test]
    fn admin_login_cannot_vote() {
        let (_dir, mut backend) = scratch_backend("open_election");
        backend.authenticate_admin("council-admin").unwrap();
        let session = backend.session().unwrap();
        assert!(session.is_admin);
        assert!(!session.has_voted);
        assert_eq!(
            backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])),
            Err(rejected(403, "Admin accounts cannot vote"))
        );
        assert_eq!(backend.ballot_box().votes().votes.len(), 1);

        // A demo voter who becomes admin keeps voting under their own id.
        backend.demo_login().unwrap();
        backend.authenticate_admin("council-admin").unwrap();
        backend.submit_vote(&ballot(&[1, 2, 3], &[1, 2])).unwrap();
        assert_eq!(backend.ballot_box().votes().votes.len(), 2);
    }

    #[test]
    fn voter_ids_are_issued_then_verified() {
        let (_dir, mut backend) = scratch_backend("open_election");
        let bad = VoterIdRequest {
            email: "jane.doe".to_string(),
            phone_last4: "0042".to_string(),
        };
        assert_eq!(
            backend.request_voter_id(&bad),
            Err(rejected(400, "Invalid email format"))
        );
        let request = VoterIdRequest {
            email: "jane@school.edu".to_string(),
            phone_last4: "0042".to_string(),
        };
        let issued = backend.request_voter_id(&request).unwrap();
        assert!(issued.voter_id.starts_with("VOTER_"));
        assert_eq!(issued.voter_id.len(), "VOTER_".len() + 8);
        let again = backend.request_voter_id(&request).unwrap();
        assert_ne!(issued.voter_id, again.voter_id);

        assert_eq!(
            backend.verify_voter_id(""),
            Err(rejected(400, "Voter ID is required"))
        );
        assert_eq!(
            backend.verify_voter_id("VOTER_00000000"),
            Err(rejected(400, "Invalid voter ID"))
        );
        assert_eq!(
            backend.verify_voter_id(&issued.voter_id).unwrap().message,
            "Voter ID verified successfully"
        );

        // An issued id that already voted is refused.
        backend
            .ballot_box
            .cast(&issued.voter_id, &ballot(&[1, 2, 3], &[1, 2]), &now())
            .unwrap();
        assert_eq!(
            backend.verify_voter_id(&issued.voter_id),
            Err(rejected(400, "This voter ID has already been used"))
        );

        backend.authenticate_admin("council-admin").unwrap();
        backend.toggle_election_status().unwrap();
        assert_eq!(
            backend.request_voter_id(&request),
            Err(rejected(400, "Election is currently closed"))
        );
        assert_eq!(
            backend.verify_voter_id(&again.voter_id),
            Err(rejected(400, "Election is currently closed"))
        );
    }

    #[test]
    fn unsaved_votes_are_rolled_back() {
        let (dir, mut backend) = scratch_backend("open_election");
        backend.votes_path = dir.path().join("missing_dir").join("votes.json");
        backend.demo_login().unwrap();
        let err = backend
            .submit_vote(&ballot(&[1, 2, 3], &[1, 2]))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(backend.ballot_box().votes().votes.len(), 1);
        assert!(!backend.session().unwrap().has_voted);
    }
}
