//! Cricket Talent Score CLI
//!
//! Evaluates a batter's career statistics against a reference set of elite players.

use clap::{Args, Parser, Subcommand};
use cricket::{Config, RawPlayerStats, Result};

#[derive(Parser)]
#[command(name = "cricket")]
#[command(about = "Cricket player talent score by similarity to elite players", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a player's talent score
    Score {
        #[command(flatten)]
        player: PlayerArgs,
        /// JSON file with one player or an array of players
        #[arg(long)]
        input: Option<String>,
        /// Override the classification policy (graded or legacy)
        #[arg(long)]
        policy: Option<cricket::predict::TierPolicy>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Show derived ratios without scoring
    Derive {
        #[command(flatten)]
        player: PlayerArgs,
    },
    /// Scoring artifact commands
    Artifact {
        #[command(subcommand)]
        action: ArtifactCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum ArtifactCommands {
    /// Download the artifact into the cache if it is not there yet
    Fetch {
        /// Download even if a cached copy exists
        #[arg(long)]
        force: bool,
    },
    /// Show artifact information
    Info,
}

#[derive(Args, Clone, Debug)]
struct PlayerArgs {
    /// Player name (display only)
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value_t = 1)]
    matches: u32,
    #[arg(long, default_value_t = 1)]
    innings: u32,
    #[arg(long, default_value_t = 0)]
    runs: u32,
    #[arg(long, default_value_t = 0)]
    highest_score: u32,
    /// Batting average
    #[arg(long, default_value_t = 0.0)]
    average: f64,
    #[arg(long, default_value_t = 0.0)]
    strike_rate: f64,
    /// Career duration in years
    #[arg(long, default_value_t = 0.0)]
    duration: f64,
    #[arg(long)]
    country: Option<String>,
    /// Number of times not out
    #[arg(long, default_value_t = 0)]
    not_outs: u32,
    /// Innings out for 0
    #[arg(long, default_value_t = 0)]
    ducks: u32,
    /// Scores of 100+
    #[arg(long, default_value_t = 0)]
    centuries: u32,
    /// Scores of 50-99
    #[arg(long, default_value_t = 0)]
    half_centuries: u32,
    #[arg(long, default_value_t = 0)]
    balls_faced: u32,
}

impl PlayerArgs {
    fn into_stats(self) -> RawPlayerStats {
        RawPlayerStats {
            name: self.name,
            matches: self.matches,
            innings: self.innings,
            runs: self.runs,
            highest_score: self.highest_score,
            average: self.average,
            strike_rate: self.strike_rate,
            duration: self.duration,
            country: self.country.unwrap_or_default(),
            not_outs: self.not_outs,
            ducks: self.ducks,
            centuries: self.centuries,
            half_centuries: self.half_centuries,
            balls_faced: self.balls_faced,
        }
    }
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Score {
            player,
            input,
            policy,
            format,
        } => commands::score(&config, player, input, policy, format),
        Commands::Derive { player } => commands::derive(player),
        Commands::Artifact { action } => match action {
            ArtifactCommands::Fetch { force } => commands::artifact_fetch(&config, force),
            ArtifactCommands::Info => commands::artifact_info(&config),
        },
        Commands::Init => commands::init(&cli.config, &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::NdArray;
    use cricket::data::ArtifactCache;
    use cricket::features::DerivedFeatures;
    use cricket::predict::{format_evaluation, round2, Evaluation, TalentScorer, TierPolicy};
    use cricket::TalentError;

    type ScoringBackend = NdArray<f32>;

    pub fn init(config_path: &str, config: &Config) -> Result<()> {
        let config = if std::path::Path::new(config_path).exists() {
            println!("Keeping existing config at {}", config_path);
            config.clone()
        } else {
            let defaults = Config::default();
            defaults.save(config_path)?;
            println!("Created default config at {}", config_path);
            defaults
        };

        if let Some(dir) = std::path::Path::new(&config.artifact.cache_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
                println!("Artifact cache directory: {}", dir.display());
            }
        }

        println!("\nNext steps:");
        println!("  1. Set artifact.url in {}", config_path);
        println!("  2. Run 'cricket artifact fetch' to download the scoring artifact");
        println!("  3. Run 'cricket score --country <COUNTRY> ...' to evaluate a player");

        Ok(())
    }

    pub fn derive(player: PlayerArgs) -> Result<()> {
        let stats = player.into_stats();
        stats.validate()?;
        let derived = DerivedFeatures::from_stats(&stats);

        println!("Derived Stats");
        println!("───────────────────────────────");
        for (label, value) in derived.labelled() {
            println!("  {:<24} {:.2}", label, value);
        }
        Ok(())
    }

    fn load_players(player: PlayerArgs, input: Option<String>) -> Result<Vec<RawPlayerStats>> {
        match input {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                    TalentError::InvalidInput(format!("{} is not valid JSON: {}", path, e))
                })?;
                let players: serde_json::Result<Vec<RawPlayerStats>> = if value.is_array() {
                    serde_json::from_value(value)
                } else {
                    serde_json::from_value(value).map(|p| vec![p])
                };
                players.map_err(|e| {
                    TalentError::InvalidInput(format!("{} has invalid player data: {}", path, e))
                })
            }
            None => {
                if player.country.is_none() {
                    return Err(TalentError::InvalidInput(
                        "--country is required (or use --input)".to_string(),
                    ));
                }
                Ok(vec![player.into_stats()])
            }
        }
    }

    fn build_scorer(config: &Config, policy: TierPolicy) -> Result<TalentScorer<ScoringBackend>> {
        let cache = ArtifactCache::from_config(&config.artifact)?;
        let artifact = cache.load()?;
        TalentScorer::from_artifact(artifact, policy, Default::default())
    }

    pub fn score(
        config: &Config,
        player: PlayerArgs,
        input: Option<String>,
        policy: Option<TierPolicy>,
        format: OutputFormat,
    ) -> Result<()> {
        let players = load_players(player, input)?;
        let policy = policy.unwrap_or(config.classification.policy);
        let scorer = build_scorer(config, policy)?;
        log::debug!("Scoring {} player(s) with {} tiers", players.len(), policy);

        let results = scorer.evaluate_batch(&players);
        let mut failures = 0;

        if let OutputFormat::Csv = format {
            println!("name,country,score,class,not_out_ratio,duck_rate,century_frequency,century_conversion_rate,balls_per_innings");
        }

        let mut json_rows = Vec::new();
        for (stats, result) in players.iter().zip(results) {
            match result {
                Ok(eval) => match format {
                    OutputFormat::Table => {
                        println!("Hey {}, your class -> {}!", eval.name, eval.classification);
                        println!("{}", format_evaluation(&eval));
                    }
                    OutputFormat::Csv => println!("{}", csv_row(&eval)),
                    OutputFormat::Json => json_rows.push(json_row(&eval)),
                },
                // Bad submissions are reported and skipped; anything else is fatal
                Err(e) if e.is_recoverable() => {
                    failures += 1;
                    eprintln!("Skipping {}: {}", stats.display_name(), e);
                    if let TalentError::UnknownCountry { .. } = e {
                        eprintln!("  Known countries: {}", scorer.countries().join(", "));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if let OutputFormat::Json = format {
            let output = serde_json::to_string_pretty(&json_rows).map_err(|e| {
                TalentError::InvalidInput(format!("failed to render JSON: {}", e))
            })?;
            println!("{}", output);
        }

        if failures > 0 && failures == players.len() {
            return Err(TalentError::InvalidInput(
                "no player could be evaluated; please re-enter the data".to_string(),
            ));
        }
        Ok(())
    }

    fn json_row(eval: &Evaluation) -> serde_json::Value {
        let d = &eval.derived;
        serde_json::json!({
            "name": eval.name,
            "country": eval.country,
            "score": eval.score.value(),
            "class": eval.classification.label(),
            "derived": {
                "not_out_ratio": round2(d.not_out_ratio),
                "duck_rate": round2(d.duck_rate),
                "century_frequency": round2(d.century_frequency),
                "century_conversion_rate": round2(d.century_conversion_rate),
                "balls_per_innings": round2(d.balls_per_innings),
            }
        })
    }

    fn csv_row(eval: &Evaluation) -> String {
        let mut fields = vec![
            eval.name.replace(',', " "),
            eval.country.clone(),
            format!("{:.2}", eval.score.value()),
            eval.classification.label().to_string(),
        ];
        fields.extend(eval.derived.to_vec().iter().map(|v| format!("{:.2}", v)));
        fields.join(",")
    }

    pub fn artifact_fetch(config: &Config, force: bool) -> Result<()> {
        let cache = ArtifactCache::from_config(&config.artifact)?;
        let path = if force {
            cache.refresh()?
        } else {
            cache.ensure()?
        };
        println!("Artifact ready at {}", path.display());
        Ok(())
    }

    pub fn artifact_info(config: &Config) -> Result<()> {
        let cache = ArtifactCache::from_config(&config.artifact)?;
        if !cache.is_cached() {
            println!("No artifact cached at {}", cache.path().display());
            println!("Run 'cricket artifact fetch' first");
            return Ok(());
        }

        let artifact = cricket::model::ScoringArtifact::load(cache.path())?;
        let pipeline = &artifact.pipeline;

        println!("Artifact Information");
        println!("───────────────────────────────");
        println!("  Path:            {}", cache.path().display());
        if let Some(url) = cache.url() {
            println!("  Source:          {}", url);
        }
        println!("  Numeric columns: {}", pipeline.numeric_columns.len());
        println!("  Categories:      {}", pipeline.categories.len());
        println!("  Encoded width:   {}", pipeline.encoded_dim());
        println!(
            "  Projection:      {}",
            if pipeline.projection.is_some() { "yes" } else { "no" }
        );
        println!("  Output dim:      {}", pipeline.output_dim());
        println!("  Elite players:   {}", artifact.elite_data.len());
        println!("  Countries:       {}", artifact.countries.len());
        println!("  Policy:          {}", config.classification.policy);

        Ok(())
    }
}
