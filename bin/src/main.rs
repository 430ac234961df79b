//! CLI for the basket-risk analysis pipeline.
//!
//! Runs the risk analysis over CSV price files, publishes the results and
//! prints the ranking, and lets the universe and methodology be inspected.

use basket_risk::{
    AnalysisConfig, CsvPriceProvider, FileSink, Instrument, PipelineOutput, RiskComponent,
    RiskPipeline, publish,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "basket-risk")]
#[command(about = "Risk statistics and composite risk ranking for an equity basket", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the universe and write reports
    Analyze {
        /// Directory with one `<TICKER>.csv` per symbol ('.' replaced by '_')
        #[arg(long)]
        data_dir: PathBuf,
        /// Output root for reports, data and plots
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// First date of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// List the instruments of the universe by sector
    Universe {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the risk score components and weights
    Methodology {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as JSON
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("basket_risk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> basket_risk::Result<()> {
    match command {
        Commands::Analyze {
            data_dir,
            output,
            config,
            start,
            end,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(start) = start {
                config.start_date = start;
            }
            if let Some(end) = end {
                config.end_date = end;
            }
            analyze(config, &data_dir, &output)
        }
        Commands::Universe { config } => {
            list_universe(&load_config(config.as_deref())?);
            Ok(())
        }
        Commands::Methodology { config } => {
            show_methodology(&load_config(config.as_deref())?);
            Ok(())
        }
        Commands::Config => {
            println!("{}", AnalysisConfig::default().to_json()?);
            Ok(())
        }
    }
}

/// Load the configuration file, or the defaults when none is given.
fn load_config(path: Option<&Path>) -> basket_risk::Result<AnalysisConfig> {
    let config = match path {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Run the pipeline, publish to `output` and print the ranking.
fn analyze(config: AnalysisConfig, data_dir: &Path, output: &Path) -> basket_risk::Result<()> {
    let provider = CsvPriceProvider::new(data_dir);
    let result = RiskPipeline::new(config.clone())?.run(&provider)?;

    let mut sink = FileSink::create(output)?;
    publish(&result, &config, &mut sink)?;

    print_ranking(&result);
    print_summary(&result);
    println!("\nResults written to {}", output.display());
    Ok(())
}

fn print_ranking(output: &PipelineOutput) {
    println!(
        "{:>4}  {:<10} {:<24} {:<14} {:>6}  {:<12} {:>8} {:>8} {:>7}",
        "Rank", "Symbol", "Name", "Sector", "Score", "Category", "Vol %", "Ret %", "Sharpe"
    );
    for (i, row) in output.table.rows().iter().enumerate() {
        let m = &row.metrics;
        println!(
            "{:>4}  {:<10} {:<24} {:<14} {:>6.3}  {:<12} {:>8.2} {:>8.2} {:>7.3}",
            i + 1,
            m.symbol,
            m.name,
            m.sector,
            row.risk_score,
            row.risk_category.to_string(),
            m.annual_volatility * 100.0,
            m.annual_return * 100.0,
            m.sharpe_ratio
        );
    }
}

fn print_summary(output: &PipelineOutput) {
    let summary = &output.summary;
    println!(
        "\nRanked {} of {} symbols ({} scoring)",
        summary.succeeded.len(),
        summary.requested,
        summary.scoring
    );
    if !summary.excluded.is_empty() {
        println!("Excluded:");
        for exclusion in &summary.excluded {
            println!("  {} ({}): {}", exclusion.symbol, exclusion.name, exclusion.reason);
        }
    }
}

/// Group instruments by sector, sectors and tickers sorted.
fn by_sector(universe: &[Instrument]) -> BTreeMap<&str, Vec<&Instrument>> {
    let mut sectors: BTreeMap<&str, Vec<&Instrument>> = BTreeMap::new();
    for instrument in universe {
        sectors.entry(instrument.sector.as_str()).or_default().push(instrument);
    }
    for members in sectors.values_mut() {
        members.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    }
    sectors
}

fn list_universe(config: &AnalysisConfig) {
    println!("Universe ({} instruments)\n", config.universe.len());
    for (sector, members) in by_sector(&config.universe) {
        println!("{}:", sector);
        for instrument in members {
            println!("  {:<10} {}", instrument.ticker, instrument.name);
        }
        println!();
    }
}

fn show_methodology(config: &AnalysisConfig) {
    println!("Risk score = weighted mean of dense percentile ranks\n");
    for component in RiskComponent::ALL {
        println!(
            "  {:<18} {:>5.1}%  {}",
            component.column(),
            component.weight(&config.risk_weights) * 100.0,
            component.description()
        );
    }
    println!(
        "\nExtreme day: |Z| > {}; minimum history: {} returns; {} trading days per year",
        config.extreme_z_threshold, config.min_observations, config.trading_days_per_year
    );
    println!("Categories: score <= 0.33 Low, <= 0.66 Medium, otherwise High");
}
