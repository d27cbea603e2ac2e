use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tiredeg::aggregator::{read_tire_metrics, write_tire_metrics};
use tiredeg::features::{prepare_features, split_by_year, write_features};
use tiredeg::impute::impute;
use tiredeg::multiplier::{multiplier_matrix, summarize, write_summary};
use tiredeg::ranking::{rank_drivers, write_rankings};
use tiredeg::{CsvSessionProvider, PipelineConfig, SeasonAggregator, SessionProvider};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stint degradation metrics and driver rankings", long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML); defaults are used if it doesn't exist
    #[arg(short, long, env = "TIREDEG_CONFIG", default_value = "tiredeg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the per-lap tire metrics table for the configured seasons
    Collect {
        /// Output CSV (defaults to <output_dir>/tire_metrics.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank drivers from a tire metrics table
    Rank {
        /// Tire metrics CSV (defaults to <output_dir>/tire_metrics.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Rows to print
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Per driver × race feature tables, split into train and test seasons
    Features {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Imputed driver × race tire multiplier matrix plus a standings summary
    Multipliers,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    let metrics_path = config.output_dir.join("tire_metrics.csv");

    match cli.command {
        Command::Collect { output } => {
            let provider = CsvSessionProvider::new(&config.data_dir);
            let mut aggregator = SeasonAggregator::new(&provider, &config);
            let table = aggregator.collect()?;
            let rows = table.rows();
            if rows.is_empty() {
                bail!("no stint produced any valid laps");
            }
            let output = output.unwrap_or(metrics_path);
            write_tire_metrics(&output, &rows)?;
            info!("wrote {} rows to {}", rows.len(), output.display());
        }
        Command::Rank { input, top } => {
            let input = input.unwrap_or(metrics_path);
            let rows = read_tire_metrics(&input).with_context(|| format!("reading {}", input.display()))?;
            let rankings = rank_drivers(&rows, &config.ranking);

            println!("\nTop {top} Drivers (Overall Performance):");
            println!("{:>4}  {:<6} {:>9} {:>8} {:>9} {:>8}", "Rank", "Driver", "Composite", "Pts/Race", "Deg %", "Gained");
            for r in rankings.iter().take(top) {
                println!(
                    "{:>4}  {:<6} {:>9.3} {:>8.2} {:>9.3} {:>8.2}",
                    r.rank, r.driver, r.composite_score, r.points_per_race, r.degradation_pct, r.avg_positions_gained
                );
            }

            let output = config.output_dir.join("driver_rankings.csv");
            write_rankings(&output, &rankings)?;
            info!("wrote {} rankings to {}", rankings.len(), output.display());
        }
        Command::Features { input } => {
            let input = input.unwrap_or(metrics_path);
            let rows = read_tire_metrics(&input).with_context(|| format!("reading {}", input.display()))?;
            let features = prepare_features(&rows);
            let (train, test) = split_by_year(&features, &config.features.train_years, &config.features.test_years);

            write_features(config.output_dir.join("features_train.csv"), &train)?;
            write_features(config.output_dir.join("features_test.csv"), &test)?;
            info!("{} training rows, {} test rows", train.len(), test.len());
        }
        Command::Multipliers => {
            let provider = CsvSessionProvider::new(&config.data_dir);
            let matrix = multiplier_matrix(&provider, &config.seasons, &config.multiplier)?;
            let filled = impute(&matrix);
            info!(
                "imputed {} of {} cells",
                filled.filled_cells() - matrix.filled_cells(),
                matrix.drivers().len() * matrix.races().len()
            );
            filled.write_csv(config.output_dir.join("tire_multipliers.csv"))?;

            let mut standings = std::collections::HashMap::new();
            for &year in &config.seasons {
                for (code, points) in provider.driver_standings(year)? {
                    *standings.entry(code).or_insert(0.0) += points;
                }
            }
            let summary = summarize(&matrix, &standings);
            write_summary(config.output_dir.join("multipliers_with_points.csv"), &summary)?;
        }
    }

    info!("Execution done");
    Ok(())
}
