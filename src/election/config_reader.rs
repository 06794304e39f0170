use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::election::*;

pub const DEFAULT_VOTES_FILE: &str = "votes.json";
pub const DEFAULT_STATUS_FILE: &str = "election_status.json";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_jurisdiction: Option<String>,
    #[serde(rename = "contestOffice")]
    pub contest_office: Option<String>,
}

impl OutputSettings {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            contest: self.contest_name.clone(),
            date: self.contest_date.clone(),
            jurisdiction: self.contest_jurisdiction.clone(),
            office: self.contest_office.clone(),
        }
    }
}

/// The header of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub jurisdiction: Option<String>,
    pub office: Option<String>,
}

/// Where the candidates are listed.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSource {
    /// "json" or "xlsx"
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Excel only. Defaults to the first worksheet.
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionRules {
    #[serde(rename = "councilSeats")]
    pub council_seats: Option<usize>,
    #[serde(rename = "executiveSeats")]
    pub executive_seats: Option<usize>,
    #[serde(rename = "eligibleVoters")]
    pub eligible_voters: Option<u64>,
}

impl ElectionRules {
    pub fn limits(&self) -> ElectionResult<SelectionLimits> {
        let defaults = SelectionLimits::DEFAULT_LIMITS;
        SelectionLimits::new(
            self.council_seats.unwrap_or(defaults.council_seats()),
            self.executive_seats.unwrap_or(defaults.executive_seats()),
        )
        .context(InvalidDataSnafu {})
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "candidateSource")]
    pub candidate_source: CandidateSource,
    #[serde(default)]
    pub rules: ElectionRules,
    #[serde(rename = "votesFile")]
    pub votes_file: Option<String>,
    #[serde(rename = "statusFile")]
    pub status_file: Option<String>,
    #[serde(rename = "adminPassword")]
    pub admin_password: Option<String>,
}

impl ElectionConfig {
    pub fn votes_path(&self, root: &Path) -> PathBuf {
        root.join(self.votes_file.as_deref().unwrap_or(DEFAULT_VOTES_FILE))
    }

    pub fn status_path(&self, root: &Path) -> PathBuf {
        root.join(self.status_file.as_deref().unwrap_or(DEFAULT_STATUS_FILE))
    }
}

/// Reads the configuration, and returns it with the directory that relative
/// paths are resolved against.
pub fn read_config(path: &str) -> ElectionResult<(ElectionConfig, PathBuf)> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ElectionConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu { path })?;
    info!("config: {:?}", config);
    let root_p = Path::new(path)
        .parent()
        .context(MissingParentDirSnafu { path })?;
    Ok((config, root_p.to_path_buf()))
}

pub fn read_summary(path: &str) -> ElectionResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Reads a data file, or starts from the default value when there is none
/// yet. A file that exists but cannot be parsed is an error.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> ElectionResult<T> {
    let p = path.display().to_string();
    if !path.exists() {
        info!("{} not found, starting from an empty state", p);
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: p.clone() })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path: p })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ElectionResult<()> {
    let js = serde_json::to_string_pretty(value).context(WritingJsonSnafu {})?;
    fs::write(path, js).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ElectionConfig = serde_json::from_str(
            r#"{
                "outputSettings": {"contestName": "Student council"},
                "candidateSource": {"provider": "json", "filePath": "candidates.json"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.rules.limits().unwrap(), SelectionLimits::DEFAULT_LIMITS);
        assert_eq!(config.rules.eligible_voters, None);
        let root = Path::new("/data/election");
        assert_eq!(config.votes_path(root), root.join("votes.json"));
        assert_eq!(config.status_path(root), root.join("election_status.json"));
        assert_eq!(config.output_settings.output_config().date, None);
    }

    #[test]
    fn invalid_rules_are_refused() {
        let rules = ElectionRules {
            council_seats: Some(3),
            executive_seats: Some(4),
            eligible_voters: None,
        };
        assert!(matches!(
            rules.limits(),
            Err(ElectionError::InvalidData { .. })
        ));
    }

    #[test]
    fn malformed_data_files_fail_closed() {
        let dir = tempfile::tempdir().unwrap();
        let missing: VotesData = read_json_or_default(&dir.path().join("votes.json")).unwrap();
        assert_eq!(missing, VotesData::default());
        let status: ElectionStatus =
            read_json_or_default(&dir.path().join("election_status.json")).unwrap();
        assert!(status.is_open);

        let p = dir.path().join("election_status.json");
        fs::write(&p, "{\"is_open\": ").unwrap();
        assert!(matches!(
            read_json_or_default::<ElectionStatus>(&p),
            Err(ElectionError::ParsingJson { .. })
        ));

        write_json(&p, &ElectionStatus { is_open: false }).unwrap();
        let status: ElectionStatus = read_json_or_default(&p).unwrap();
        assert!(!status.is_open);
    }
}
