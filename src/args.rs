use clap::Parser;

/// This is a program for Bayesian ballot-polling audits of elections.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the election and audit description, in JSON format.
    /// It follows the layout of the configuration files of tabulators, with an extra 'audit' section.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of an audit in JSON format. If provided,
    /// bayesaudit will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the audit will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) A CSV file with one ballot per row, for a quick audit without a configuration file.
    /// Setting this option overrides the ballot files specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (list of comma-separated values or not specified) The names of the candidates when using --input.
    /// If not specified, the candidates are the names found in the input, in order of appearance.
    #[clap(long, value_parser, use_value_delimiter = true)]
    pub candidates: Option<Vec<String>>,

    /// (integer) Audits a simulated election with this number of candidates instead of real ballots.
    #[clap(long, value_parser)]
    pub simulate_candidates: Option<u32>,

    /// (integer, default 10000) The number of ballots cast in the simulated election.
    #[clap(long, value_parser)]
    pub simulate_ballots: Option<usize>,

    /// (number, default 1.0) The amount of noise in the simulated ballots. Small values make the
    /// ballots agree with the order of the candidates.
    #[clap(long, value_parser)]
    pub bias: Option<f64>,

    /// (borda or irv) The social choice function. Overrides the configuration.
    #[clap(long, value_parser)]
    pub scf: Option<String>,

    /// (number in [0, 1), default 0.05) The risk tolerance of the audit.
    #[clap(long, value_parser)]
    pub alpha: Option<f64>,

    /// (integer, default 4) The number of ballots added to the sample at each round.
    #[clap(long, value_parser)]
    pub batch_size: Option<usize>,

    /// (integer, default 100) The number of simulated completions at each round.
    #[clap(long, value_parser)]
    pub trials: Option<u32>,

    /// (integer or not specified) Stops the audit after this number of rounds.
    #[clap(long, value_parser)]
    pub max_rounds: Option<u32>,

    /// (integer or not specified) The seed of the random generator. If not specified, a seed is
    /// chosen at random and written to the logs.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
