use log::{debug, info, warn};

use bayesian_audit::audit::audit;
use bayesian_audit::builder::Builder;
use bayesian_audit::election::{Election, SimulatedElection};
use bayesian_audit::scf::{Borda, InstantRunoff};
use bayesian_audit::tiebreak::{linear_order_from_events, TieBreakEvent};
use bayesian_audit::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

pub mod config_reader;
mod io_common;
mod io_csv;

use crate::audit_run::config_reader::*;
use crate::audit_run::io_csv::read_csv_ranking;

#[derive(Debug, Snafu)]
pub enum AuditCliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Could not read a non-negative integer for {field}"))]
    ParsingJsonNumber { field: String },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}: error parsing line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("{path}: line {lineno} is too short"))]
    CsvLineTooShort { path: String, lineno: usize },
    #[snafu(display("{path}: line {lineno}: cannot read the count {value:?}"))]
    CsvCount {
        path: String,
        lineno: usize,
        value: String,
    },
    #[snafu(display("Tie-breaking events: unknown candidate {name}"))]
    UnknownEventCandidate { name: String },
    #[snafu(display("Ballot {id}: {source}"))]
    InvalidBallot { source: AuditErrors, id: String },
    #[snafu(display("The audit could not run: {source}"))]
    Audit { source: AuditErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditCliResult<T> = Result<T, AuditCliError>;

/// A ballot, as parsed by the readers.
/// Choices are still names here, and may be empty.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedBallot {
    pub id: Option<String>,
    pub count: u64,
    pub choices: Vec<String>,
}

const SIMULATED_BALLOTS: usize = 10000;
const SIMULATED_BIAS: f64 = 1.0;

// Everything needed to audit an election with real ballots.
struct Contest {
    output_settings: OutputSettings,
    candidates: Vec<Candidate>,
    ballots: Vec<ParsedBallot>,
    rules: AuditRules,
    audit: Option<AuditSection>,
    root: PathBuf,
}

fn status_name(status: AuditStatus) -> &'static str {
    match status {
        AuditStatus::Confirmed => "confirmed",
        AuditStatus::Exhausted => "exhausted",
        AuditStatus::RoundLimit => "roundLimit",
    }
}

fn outcome_to_json<E: Election>(election: &E, outcome: Option<&Outcome>) -> JSValue {
    match outcome {
        Some(o) => {
            let names: Vec<String> = o
                .candidates()
                .iter()
                .map(|cid| election.candidate_name(*cid))
                .collect();
            json!(names)
        }
        None => JSValue::Null,
    }
}

fn round_stats_to_json<E: Election>(election: &E, res: &AuditResult) -> Vec<JSValue> {
    res.round_stats
        .iter()
        .map(|rs| {
            json!({
                "round": rs.round,
                "sampleSize": rs.sample_size,
                "bestOutcome": outcome_to_json(election, Some(&rs.best_outcome)),
                "frequency": rs.frequency,
                "distinctOutcomes": rs.distinct_outcomes,
            })
        })
        .collect()
}

fn build_summary_js<E: Election>(
    output: &OutputConfig,
    election: &E,
    params: &AuditParams,
    res: &AuditResult,
) -> JSValue {
    json!({
        "config": output,
        "audit": {
            "status": status_name(res.status),
            "outcome": outcome_to_json(election, res.outcome.as_ref()),
            "samplesExamined": res.samples_examined,
            "ballotsCast": election.num_ballots(),
            "rounds": res.rounds,
            "fullCount": outcome_to_json(election, res.full_count.as_ref()),
            "riskLimit": params.alpha,
            "batchSize": params.batch_size,
            "trials": params.trials,
        },
        "rounds": round_stats_to_json(election, res),
    })
}

// Flags take precedence over the configuration file.
fn audit_params(section: &Option<AuditSection>, args: &Args) -> AuditCliResult<AuditParams> {
    let section = section.clone().unwrap_or_default();
    let defaults = AuditParams::DEFAULT_PARAMS;
    let params = AuditParams {
        alpha: args.alpha.or(section.risk_limit).unwrap_or(defaults.alpha),
        batch_size: args
            .batch_size
            .or(section.batch_size)
            .unwrap_or(defaults.batch_size),
        trials: args.trials.or(section.trials).unwrap_or(defaults.trials),
        max_rounds: args.max_rounds.or(section.max_rounds),
    };
    params.validate().context(AuditSnafu {})?;
    Ok(params)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    let seed = match seed {
        Some(s) => s,
        None => {
            let s: u64 = rand::random();
            info!("No seed provided, using random seed {}", s);
            s
        }
    };
    debug!("make_rng: seed {}", seed);
    StdRng::seed_from_u64(seed)
}

fn read_ranking_data(root: &Path, cfs: &FileSource) -> AuditCliResult<Vec<ParsedBallot>> {
    let p: PathBuf = root.join(&cfs.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read rank file {:?}", p2);
    match cfs.provider.as_str() {
        "csv" => read_csv_ranking(&p2, cfs),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

fn load_contest(args: &Args) -> AuditCliResult<Contest> {
    let (config, root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            info!("config: {:?}", config);
            let root = Path::new(config_path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            (Some(config), root)
        }
        None => (None, PathBuf::new()),
    };

    let ballots: Vec<ParsedBallot> = match (&args.input, &config) {
        (Some(input), _) => read_csv_ranking(input, &FileSource::simple_csv(input))?,
        (None, Some(c)) => {
            if c.cvr_file_sources.is_empty() {
                whatever!("No ballot files in the configuration");
            }
            let mut data: Vec<ParsedBallot> = Vec::new();
            for cfs in c.cvr_file_sources.iter() {
                let mut file_data = read_ranking_data(&root, cfs)?;
                data.append(&mut file_data);
            }
            data
        }
        (None, None) => {
            whatever!("No election to audit: use --config, --input or --simulate-candidates")
        }
    };

    let candidates: Vec<Candidate> = match (&args.candidates, &config) {
        (Some(names), _) => names.iter().map(|n| simple_candidate(n)).collect(),
        (None, Some(c)) if !c.candidates.is_empty() => c
            .candidates
            .iter()
            .map(|c| Candidate {
                name: c.name.clone(),
                code: match c.code.clone() {
                    Some(x) if x.is_empty() => None,
                    x => x,
                },
                excluded: c.excluded.unwrap_or(false),
            })
            .collect(),
        _ => {
            let names = io_common::candidates_from_ballots(&ballots);
            warn!("No candidates declared, using the names found in the ballots: {:?}", names);
            names.iter().map(|n| simple_candidate(n)).collect()
        }
    };

    let output_settings = match &config {
        Some(c) => c.output_settings.clone(),
        None => OutputSettings {
            contest_name: args
                .input
                .as_deref()
                .map(io_common::simplify_file_name)
                .unwrap_or_default(),
            ..OutputSettings::default()
        },
    };

    Ok(Contest {
        output_settings,
        candidates,
        ballots,
        rules: config.as_ref().map(|c| c.rules.clone()).unwrap_or_default(),
        audit: config.and_then(|c| c.audit),
        root,
    })
}

fn simple_candidate(name: &str) -> Candidate {
    Candidate {
        name: name.to_string(),
        code: None,
        excluded: false,
    }
}

fn tiebreak_mode(
    rules: &AuditRules,
    root: &Path,
    builder: &Builder,
    rng: &mut StdRng,
) -> AuditCliResult<TieBreakMode> {
    let mode = match rules.tiebreak_mode.as_deref().unwrap_or("useCandidateOrder") {
        "useCandidateOrder" => TieBreakMode::UseCandidateOrder,
        "hash" => match &rules.tiebreak_string {
            Some(s) => TieBreakMode::Hash(s.clone()),
            None => whatever!("Tiebreak mode 'hash' requires a tiebreakString"),
        },
        "events" => {
            let events_path = match &rules.tiebreak_events_file {
                Some(p) => root.join(p).display().to_string(),
                None => whatever!("Tiebreak mode 'events' requires a tiebreakEventsFile"),
            };
            let events: Vec<TieBreakEvent> =
                read_tiebreak_events(&events_path, |name| builder.candidate_id(name))?;
            let order = linear_order_from_events(&builder.candidate_ids(), &events, rng)
                .context(AuditSnafu {})?;
            TieBreakMode::LinearOrder(order)
        }
        x => whatever!("Cannot use tiebreak mode {:?} (not implemented)", x),
    };
    Ok(mode)
}

fn audit_election<E: Election>(
    election: &mut E,
    params: &AuditParams,
    rng: &mut StdRng,
    output: &OutputConfig,
) -> AuditCliResult<JSValue> {
    let res = audit(election, params, rng).context(AuditSnafu {})?;
    info!(
        "Audit finished: {} after {} rounds and {} ballots",
        status_name(res.status),
        res.rounds,
        res.samples_examined
    );
    Ok(build_summary_js(output, election, params, &res))
}

fn run_simulation(args: &Args, num_candidates: u32) -> AuditCliResult<JSValue> {
    if args.config.is_some() || args.input.is_some() {
        warn!("Running a simulated election: the ballots of --config and --input are ignored");
    }
    let params = audit_params(&None, args)?;
    let mut rng = make_rng(args.seed);
    let mut election = SimulatedElection::new(
        num_candidates,
        args.simulate_ballots.unwrap_or(SIMULATED_BALLOTS),
        args.bias.unwrap_or(SIMULATED_BIAS),
        StdRng::seed_from_u64(rng.gen()),
    );
    let output = OutputConfig {
        contest: "simulation".to_string(),
        date: None,
        jurisdiction: None,
        office: None,
    };
    audit_election(&mut election, &params, &mut rng, &output)
}

fn run_contest(args: &Args, contest: Contest) -> AuditCliResult<JSValue> {
    let params = audit_params(&contest.audit, args)?;
    let mut rng = make_rng(args.seed.or(contest.rules.random_seed()?));

    let mut builder = Builder::new()
        .candidates_full(&contest.candidates)
        .context(AuditSnafu {})?;
    for pb in contest.ballots.iter() {
        builder
            .add_vote(&pb.choices, pb.count)
            .context(InvalidBallotSnafu {
                id: pb.id.clone().unwrap_or_default(),
            })?;
    }
    info!(
        "{} candidates, {} ballots",
        contest.candidates.len(),
        builder.num_ballots()
    );

    let tiebreak = tiebreak_mode(&contest.rules, &contest.root, &builder, &mut rng)?;
    let output = contest.output_settings.output_config();
    let scf_name = args
        .scf
        .clone()
        .or_else(|| contest.rules.social_choice_function.clone())
        .unwrap_or_else(|| "borda".to_string());
    match scf_name.as_str() {
        "borda" => {
            let mut election = builder
                .build(Borda::new(tiebreak), &mut rng)
                .context(AuditSnafu {})?;
            audit_election(&mut election, &params, &mut rng, &output)
        }
        "irv" => {
            let scf = InstantRunoff {
                tiebreak_mode: tiebreak,
                number_of_winners: contest.rules.number_of_winners()?,
            };
            let mut election = builder.build(scf, &mut rng).context(AuditSnafu {})?;
            audit_election(&mut election, &params, &mut rng, &output)
        }
        x => whatever!("Unknown social choice function {:?}", x),
    }
}

/// Runs the audit described by the arguments and returns the summary, with
/// the default location of the summary from the configuration if any.
pub fn run_audit(args: &Args) -> AuditCliResult<(JSValue, Option<PathBuf>)> {
    if let Some(m) = args.simulate_candidates {
        return Ok((run_simulation(args, m)?, None));
    }
    let contest = load_contest(args)?;
    let default_out = contest.output_settings.output_directory.as_ref().map(|dir| {
        let file_name = format!(
            "{}_audit_summary.json",
            contest.output_settings.contest_name.replace(' ', "_")
        );
        contest.root.join(dir).join(file_name)
    });
    Ok((run_contest(args, contest)?, default_out))
}

pub fn run(args: &Args) -> AuditCliResult<()> {
    let (result_js, default_out) = run_audit(args)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path: Option<String> = match (&args.out, default_out) {
        (Some(p), _) if p == "stdout" => None,
        (Some(p), _) if p.is_empty() => None,
        (Some(p), _) => Some(p.clone()),
        (None, Some(p)) => Some(p.display().to_string()),
        (None, None) => None,
    };
    match out_path {
        Some(p) => {
            info!("Writing the summary to {}", p);
            fs::write(&p, pretty_js_stats.as_bytes()).context(WritingSummarySnafu { path: p })?;
        }
        None => println!("{}", pretty_js_stats),
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p.clone())?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn testdata(name: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn temp_file(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("bayesaudit-{}-{}", std::process::id(), name))
            .display()
            .to_string()
    }

    #[test]
    fn unanimous_input_is_confirmed() {
        init_logs();
        let args = Args {
            input: Some(testdata("unanimous.csv")),
            seed: Some(3),
            ..Args::default()
        };
        let (js, default_out) = run_audit(&args).unwrap();
        assert_eq!(default_out, None);
        assert_eq!(js["config"]["contest"], json!("unanimous.csv"));
        assert_eq!(js["audit"]["status"], json!("confirmed"));
        assert_eq!(js["audit"]["outcome"], json!(["Alice", "Bob", "Carol"]));
        assert_eq!(js["audit"]["ballotsCast"], json!(30));
        assert_eq!(js["audit"]["fullCount"], JSValue::Null);
        let examined = js["audit"]["samplesExamined"].as_u64().unwrap();
        assert!(examined < 30);
        let rounds = js["rounds"].as_array().unwrap();
        assert_eq!(rounds.len() as u64, js["audit"]["rounds"].as_u64().unwrap());
        assert_eq!(rounds[0]["sampleSize"], json!(4));
    }

    #[test]
    fn config_with_counts() {
        init_logs();
        let args = Args {
            config: Some(testdata("counts_config.json")),
            ..Args::default()
        };
        let (js, _) = run_audit(&args).unwrap();
        assert_eq!(js["config"]["contest"], json!("Counts test"));
        assert_eq!(js["config"]["office"], json!("Mayor"));
        assert_eq!(js["audit"]["ballotsCast"], json!(10));
        assert_eq!(js["audit"]["trials"], json!(50));
        assert_eq!(js["audit"]["riskLimit"], json!(0.05));
        // The seed comes from the configuration.
        let (js2, _) = run_audit(&args).unwrap();
        assert_eq!(js, js2);
    }

    #[test]
    fn flags_override_the_configuration() {
        let args = Args {
            config: Some(testdata("counts_config.json")),
            trials: Some(20),
            batch_size: Some(3),
            max_rounds: Some(1),
            alpha: Some(0.0),
            ..Args::default()
        };
        let (js, _) = run_audit(&args).unwrap();
        assert_eq!(js["audit"]["trials"], json!(20));
        assert_eq!(js["audit"]["batchSize"], json!(3));
        assert_eq!(js["audit"]["rounds"], json!(1));
        assert_eq!(js["rounds"][0]["sampleSize"], json!(3));
    }

    #[test]
    fn irv_with_tiebreak_events() {
        init_logs();
        let args = Args {
            config: Some(testdata("events_config.json")),
            seed: Some(5),
            ..Args::default()
        };
        let (js, _) = run_audit(&args).unwrap();
        assert_eq!(js["audit"]["status"], json!("confirmed"));
        assert_eq!(js["audit"]["outcome"], json!(["Alice"]));
    }

    #[test]
    fn simulated_election() {
        init_logs();
        // With a bias below 1, every ballot is (1, 2, 3).
        let args = Args {
            simulate_candidates: Some(3),
            simulate_ballots: Some(500),
            bias: Some(0.5),
            seed: Some(1),
            ..Args::default()
        };
        let (js, _) = run_audit(&args).unwrap();
        assert_eq!(js["config"]["contest"], json!("simulation"));
        assert_eq!(js["audit"]["status"], json!("confirmed"));
        assert_eq!(js["audit"]["outcome"], json!(["1", "2", "3"]));
        assert_eq!(js["audit"]["ballotsCast"], json!(500));
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let args = Args {
            simulate_candidates: Some(3),
            alpha: Some(1.5),
            ..Args::default()
        };
        assert!(matches!(
            run_audit(&args),
            Err(AuditCliError::Audit {
                source: AuditErrors::InvalidRiskLimit(_)
            })
        ));
    }

    #[test]
    fn nothing_to_audit() {
        assert!(matches!(
            run_audit(&Args::default()),
            Err(AuditCliError::Whatever { .. })
        ));
    }

    #[test]
    fn unknown_names_in_ballots() {
        let args = Args {
            input: Some(testdata("unanimous.csv")),
            candidates: Some(vec!["Alice".to_string(), "Bob".to_string()]),
            seed: Some(0),
            ..Args::default()
        };
        assert!(matches!(
            run_audit(&args),
            Err(AuditCliError::InvalidBallot { .. })
        ));
    }

    #[test]
    fn reference_summary() {
        init_logs();
        let out = temp_file("summary.json");
        let args = Args {
            input: Some(testdata("unanimous.csv")),
            seed: Some(11),
            out: Some(out.clone()),
            ..Args::default()
        };
        run(&args).unwrap();
        let written = read_summary(out.clone()).unwrap();
        assert_eq!(written["audit"]["status"], json!("confirmed"));

        // Same seed, same summary.
        let args_ref = Args {
            reference: Some(out.clone()),
            out: Some(temp_file("summary2.json")),
            ..args.clone()
        };
        assert!(run(&args_ref).is_ok());

        let args_bad = Args {
            reference: Some(testdata("tiebreak_events.json")),
            ..args_ref
        };
        assert!(run(&args_bad).is_err());
    }
}
