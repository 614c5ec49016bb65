use crate::audit_run::*;

use bayesian_audit::tiebreak::{Resolution, TieBreakEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_juridiction: Option<String>,
    #[serde(rename = "contestOffice")]
    pub contest_office: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub jurisdiction: Option<String>,
    pub office: Option<String>,
}

impl OutputSettings {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            contest: self.contest_name.clone(),
            date: self.contest_date.clone(),
            jurisdiction: self.contest_juridiction.clone(),
            office: self.contest_office.clone(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "firstVoteColumnIndex")]
    _first_vote_column_index: Option<JSValue>,
    #[serde(rename = "firstVoteRowIndex")]
    _first_vote_row_index: Option<JSValue>,
    #[serde(rename = "idColumnIndex")]
    pub id_column_index: Option<JSValue>,
    #[serde(rename = "countColumnIndex")]
    pub count_column_index: Option<JSValue>,
}

impl FileSource {
    /// A CSV source with the choices starting in the first column and no
    /// header row.
    pub fn simple_csv(path: &str) -> FileSource {
        FileSource {
            provider: "csv".to_string(),
            file_path: path.to_string(),
            _first_vote_column_index: Some(JSValue::from(1)),
            _first_vote_row_index: None,
            id_column_index: None,
            count_column_index: None,
        }
    }

    /// 0-based index of the first column of choices.
    pub fn first_vote_column_index(&self) -> AuditCliResult<usize> {
        let x = read_js_int(&self._first_vote_column_index)?;
        x.checked_sub(1).context(ParsingJsonNumberSnafu {
            field: "firstVoteColumnIndex",
        })
    }

    /// 1-based index of the first row with a ballot. Defaults to 1.
    pub fn first_vote_row_index(&self) -> AuditCliResult<usize> {
        match self._first_vote_row_index {
            None => Ok(1),
            Some(_) => {
                let x = read_js_int(&self._first_vote_row_index)?;
                ensure!(
                    x >= 1,
                    ParsingJsonNumberSnafu {
                        field: "firstVoteRowIndex"
                    }
                );
                Ok(x)
            }
        }
    }

    pub fn id_column_index_int(&self) -> AuditCliResult<Option<usize>> {
        optional_column(&self.id_column_index, "idColumnIndex")
    }

    pub fn count_column_index_int(&self) -> AuditCliResult<Option<usize>> {
        optional_column(&self.count_column_index, "countColumnIndex")
    }
}

fn optional_column(x: &Option<JSValue>, field: &'static str) -> AuditCliResult<Option<usize>> {
    match x {
        None => Ok(None),
        Some(JSValue::String(s)) if s.is_empty() => Ok(None),
        Some(_) => {
            let idx = read_js_int(x)?;
            idx.checked_sub(1)
                .map(Some)
                .context(ParsingJsonNumberSnafu { field })
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCandidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditRules {
    #[serde(rename = "socialChoiceFunction")]
    pub social_choice_function: Option<String>,
    #[serde(rename = "numberOfWinners")]
    pub number_of_winners: Option<JSValue>,
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
    #[serde(rename = "tiebreakString")]
    pub tiebreak_string: Option<String>,
    #[serde(rename = "tiebreakEventsFile")]
    pub tiebreak_events_file: Option<String>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<JSValue>,
}

impl AuditRules {
    pub fn number_of_winners(&self) -> AuditCliResult<usize> {
        match self.number_of_winners {
            None => Ok(1),
            Some(_) => read_js_int(&self.number_of_winners),
        }
    }

    pub fn random_seed(&self) -> AuditCliResult<Option<u64>> {
        match &self.random_seed {
            None => Ok(None),
            Some(JSValue::String(s)) if s.is_empty() => Ok(None),
            Some(_) => read_js_int(&self.random_seed).map(|x| Some(x as u64)),
        }
    }
}

/// The parameters of the audit. Missing values take the default parameters.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditSection {
    #[serde(rename = "riskLimit")]
    pub risk_limit: Option<f64>,
    #[serde(rename = "batchSize")]
    pub batch_size: Option<usize>,
    pub trials: Option<u32>,
    #[serde(rename = "maxRounds")]
    pub max_rounds: Option<u32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "cvrFileSources", default)]
    pub cvr_file_sources: Vec<FileSource>,
    #[serde(default)]
    pub candidates: Vec<ConfigCandidate>,
    #[serde(default)]
    pub rules: AuditRules,
    pub audit: Option<AuditSection>,
}

pub fn read_config(path: &str) -> AuditCliResult<AuditConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: AuditConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: String) -> AuditCliResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawResolution {
    Single(String),
    Permutation(Vec<String>),
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct RawEvent(u32, Vec<String>, RawResolution, u8);

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct RawEvents {
    events: Vec<RawEvent>,
}

/// Reads the tie-breaking decisions of the official count.
///
/// The file refers to the candidates by name, `lookup` gives their ids.
pub fn read_tiebreak_events<F>(path: &str, lookup: F) -> AuditCliResult<Vec<TieBreakEvent>>
where
    F: Fn(&str) -> Option<CandidateId>,
{
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let raw: RawEvents = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    let find = |name: &String| -> AuditCliResult<CandidateId> {
        lookup(name)
            .context(UnknownEventCandidateSnafu { name: name.clone() })
    };

    let mut res: Vec<TieBreakEvent> = Vec::new();
    for RawEvent(round, names, resolution, case) in raw.events.iter() {
        let candidates = names.iter().map(find).collect::<AuditCliResult<Vec<_>>>()?;
        let resolution = match resolution {
            RawResolution::Single(name) => Resolution::Single(find(name)?),
            RawResolution::Permutation(order) => {
                Resolution::Permutation(order.iter().map(find).collect::<AuditCliResult<Vec<_>>>()?)
            }
        };
        if !(1..=3).contains(case) {
            whatever!("round {}: unknown tie-breaking case {}", round, case)
        }
        res.push(TieBreakEvent {
            round: *round,
            candidates,
            resolution,
            case: *case,
        });
    }
    info!("read_tiebreak_events: {} events from {}", res.len(), path);
    Ok(res)
}

// Numbers, numbers in strings, and spreadsheet column letters (A is 1).
fn read_js_int(x: &Option<JSValue>) -> AuditCliResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu { field: "number" }),
        Some(JSValue::String(s)) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            s.to_ascii_lowercase()
                .chars()
                .try_fold(0usize, |acc, c| {
                    acc.checked_mul(26)?
                        .checked_add(c as usize - 'a' as usize + 1)
                })
                .context(ParsingJsonNumberSnafu { field: "column" })
        }
        Some(JSValue::String(s)) => s
            .parse::<usize>()
            .ok()
            .context(ParsingJsonNumberSnafu { field: "number" }),
        _ => None.context(ParsingJsonNumberSnafu { field: "number" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_indices() {
        assert_eq!(read_js_int(&Some(JSValue::from(3))).unwrap(), 3);
        assert_eq!(read_js_int(&Some(JSValue::from("12"))).unwrap(), 12);
        assert_eq!(read_js_int(&Some(JSValue::from("A"))).unwrap(), 1);
        assert_eq!(read_js_int(&Some(JSValue::from("c"))).unwrap(), 3);
        assert_eq!(read_js_int(&Some(JSValue::from("AA"))).unwrap(), 27);
        assert!(read_js_int(&Some(JSValue::from("1x"))).is_err());
        assert!(read_js_int(&Some(JSValue::from("ZZZZZZZZZZZZZZZZZZ"))).is_err());
        assert!(read_js_int(&None).is_err());
    }

    #[test]
    fn parse_config() {
        let js = r#"{
            "outputSettings": {"contestName": "Mayor", "contestDate": "2022-11-08"},
            "cvrFileSources": [{"provider": "csv", "filePath": "b.csv", "contestId": "ignored",
                "firstVoteColumnIndex": "2", "firstVoteRowIndex": 2, "countColumnIndex": "B"}],
            "candidates": [{"name": "Alice"}, {"name": "Bob", "excluded": true}],
            "rules": {"socialChoiceFunction": "irv", "numberOfWinners": "2", "randomSeed": "42",
                "rulesDescription": "ignored"},
            "audit": {"riskLimit": 0.1, "batchSize": 10}
        }"#;
        let config: AuditConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.output_settings.contest_name, "Mayor");
        let cfs = &config.cvr_file_sources[0];
        assert_eq!(cfs.first_vote_column_index().unwrap(), 1);
        assert_eq!(cfs.first_vote_row_index().unwrap(), 2);
        assert_eq!(cfs.count_column_index_int().unwrap(), Some(1));
        assert_eq!(cfs.id_column_index_int().unwrap(), None);
        assert_eq!(config.candidates[1].excluded, Some(true));
        assert_eq!(config.rules.number_of_winners().unwrap(), 2);
        assert_eq!(config.rules.random_seed().unwrap(), Some(42));
        let audit = config.audit.unwrap();
        assert_eq!(audit.risk_limit, Some(0.1));
        assert_eq!(audit.trials, None);
    }

    #[test]
    fn minimal_config() {
        let js = r#"{"outputSettings": {"contestName": "x"}}"#;
        let config: AuditConfig = serde_json::from_str(js).unwrap();
        assert!(config.cvr_file_sources.is_empty());
        assert_eq!(config.rules, AuditRules::default());
        assert_eq!(config.rules.number_of_winners().unwrap(), 1);
        assert_eq!(config.rules.random_seed().unwrap(), None);
        assert_eq!(config.audit, None);
    }

    #[test]
    fn parse_tiebreak_events() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tiebreak_events.json");
        let lookup = |name: &str| match name {
            "Alice" => Some(CandidateId(1)),
            "Bob" => Some(CandidateId(2)),
            "Carol" => Some(CandidateId(3)),
            _ => None,
        };
        let events = read_tiebreak_events(path, lookup).unwrap();
        assert_eq!(
            events,
            vec![
                TieBreakEvent {
                    round: 1,
                    candidates: vec![CandidateId(1), CandidateId(2)],
                    resolution: Resolution::Permutation(vec![CandidateId(2), CandidateId(1)]),
                    case: 1,
                },
                TieBreakEvent {
                    round: 3,
                    candidates: vec![CandidateId(1), CandidateId(3)],
                    resolution: Resolution::Single(CandidateId(3)),
                    case: 3,
                },
            ]
        );
        let none = |_: &str| -> Option<CandidateId> { None };
        assert!(matches!(
            read_tiebreak_events(path, none),
            Err(AuditCliError::UnknownEventCandidate { .. })
        ));
    }
}
