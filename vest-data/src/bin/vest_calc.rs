use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vest_core::calculations::{
    AmtCalculator, AmtConfig, BracketEngine, RateMode, TaxBreakdown, generate_vest_schedule,
    sale_gain, schedule_summary,
};
use vest_core::reference::{SourceRegistry, SourceSpec};
use vest_core::{
    FilingStatusCode, GrantTerms, Jurisdiction, ReferenceSnapshot, TaxProfile, TaxType, VestEvent,
};
use vest_data::{CsvSourceFactory, GrantLoader};

/// Vest schedules and tax estimates for equity grants.
///
/// Reference data is read from a directory holding `brackets.csv`,
/// `tax_year_config.csv`, `filing_thresholds.csv` and optionally
/// `state_levies.csv`.
#[derive(Parser, Debug)]
#[command(name = "vest-calc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Reference data as `backend:location`; a bare directory uses the csv backend
    #[arg(short, long, global = true, default_value = "csv:vest-data/data")]
    data: SourceSpec,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the vest schedule of each grant in a grants CSV
    Schedule {
        #[arg(short, long)]
        grants: PathBuf,

        /// Only this grant
        #[arg(long)]
        grant_id: Option<i64>,

        /// Reference date for the vested/unvested split (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Estimate the tax on every vest event at a given share price
    VestTax {
        #[arg(short, long)]
        grants: PathBuf,

        #[arg(long)]
        grant_id: Option<i64>,

        /// Share price at vest
        #[arg(long)]
        price: Decimal,

        /// Only events in this tax year
        #[arg(long)]
        year: Option<i32>,

        /// Use effective rates computed from this total income instead of marginal rates
        #[arg(long)]
        known_income: Option<Decimal>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Estimate the tax on a sale
    Sale {
        #[arg(long)]
        shares: Decimal,

        #[arg(long)]
        sale_price: Decimal,

        /// Cost basis per share
        #[arg(long)]
        basis: Decimal,

        #[arg(long, default_value_t = Decimal::ZERO)]
        fees: Decimal,

        #[arg(long)]
        acquired: NaiveDate,

        #[arg(long)]
        sold: NaiveDate,

        /// Total income for the year of the sale, gains included
        #[arg(long)]
        total_income: Decimal,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Project the AMT of exercising incentive options
    Amt {
        #[arg(long)]
        shares: Decimal,

        #[arg(long)]
        strike: Decimal,

        /// Fair market value per share at exercise
        #[arg(long)]
        fmv: Decimal,

        #[arg(long)]
        year: i32,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Load the reference data and list what it holds
    CheckData,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    /// Filing status (S, MFJ, MFS, HOH, QSS)
    #[arg(long, default_value = "S", value_parser = parse_filing_status)]
    status: FilingStatusCode,

    /// Two-letter state code
    #[arg(long)]
    state: Option<String>,

    /// Expected annual income
    #[arg(long)]
    income: Option<Decimal>,

    /// Wages already paid this year
    #[arg(long, default_value_t = Decimal::ZERO)]
    ytd_wages: Decimal,

    /// Leave Social Security and Medicare out
    #[arg(long, default_value_t = false)]
    no_fica: bool,

    #[arg(long)]
    federal_rate: Option<Decimal>,

    #[arg(long)]
    state_rate: Option<Decimal>,

    /// Long-term capital gains rate; short-term gains use --federal-rate
    #[arg(long)]
    ltcg_rate: Option<Decimal>,
}

impl ProfileArgs {
    fn to_profile(&self) -> TaxProfile {
        let use_manual_rates = self.federal_rate.is_some()
            || self.state_rate.is_some()
            || self.ltcg_rate.is_some();
        TaxProfile {
            state: self.state.clone(),
            annual_income: self.income,
            ytd_wages: self.ytd_wages,
            include_fica: !self.no_fica,
            use_manual_rates,
            manual_federal_rate: self.federal_rate,
            manual_state_rate: self.state_rate,
            manual_ltcg_rate: self.ltcg_rate,
            ..TaxProfile::new(self.status)
        }
    }
}

fn parse_filing_status(s: &str) -> Result<FilingStatusCode, String> {
    FilingStatusCode::parse(s).ok_or_else(|| format!("unknown filing status '{s}'"))
}

#[derive(Serialize)]
struct VestTaxRow<'a> {
    grant_id: i64,
    event: &'a VestEvent,
    breakdown: TaxBreakdown,
}

#[derive(Serialize)]
struct DataSummary {
    years: Vec<i32>,
    tables: Vec<String>,
    state_levies: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Schedule {
            grants,
            grant_id,
            as_of,
        } => {
            let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
            for grant in load_grants(grants, *grant_id)? {
                let events = generate_vest_schedule(&grant);
                let summary = schedule_summary(&events, as_of);
                if cli.json {
                    print_json(&serde_json::json!({
                        "grant_id": grant.id,
                        "events": events,
                        "summary": summary,
                    }))?;
                    continue;
                }
                println!(
                    "Grant {} ({} {}, {} units)",
                    grant.id,
                    grant.category.as_str(),
                    grant.share_category.as_str(),
                    grant.quantity
                );
                for event in &events {
                    let marker = if event.is_cliff { " (cliff)" } else { "" };
                    println!("  {}  {:>12}{}", event.vest_date, event.shares_vested, marker);
                }
                println!(
                    "  vested as of {}: {}, unvested: {}",
                    as_of, summary.vested, summary.unvested
                );
            }
        }

        Command::VestTax {
            grants,
            grant_id,
            price,
            year,
            known_income,
            profile,
        } => {
            let snapshot = load_snapshot(&cli.data).await?;
            let orchestrator = snapshot.orchestrator();
            let profile = profile.to_profile();
            let grants = load_grants(grants, *grant_id)?;

            let schedules: Vec<_> = grants
                .iter()
                .map(|grant| (grant, generate_vest_schedule(grant)))
                .collect();

            let mut rows = Vec::new();
            for (grant, events) in &schedules {
                for event in events {
                    if year.is_some_and(|y| y != event.tax_year) {
                        continue;
                    }
                    let mode = match known_income {
                        Some(income) => RateMode::Effective(orchestrator.effective_rates(
                            &profile,
                            event.tax_year,
                            *income,
                        )),
                        None => RateMode::MarginalProgressive,
                    };
                    let breakdown =
                        orchestrator.breakdown_for_vest(grant, event, *price, &profile, &mode);
                    if breakdown.data_missing {
                        warn!(
                            grant_id = grant.id,
                            tax_year = event.tax_year,
                            "reference data missing; some taxes are reported as zero"
                        );
                    }
                    rows.push(VestTaxRow {
                        grant_id: grant.id,
                        event,
                        breakdown,
                    });
                }
            }

            if cli.json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    let b = &row.breakdown;
                    println!(
                        "grant {} {}  gross {}  federal {}  state {}  fica {}  sdi {}  total {}  net {}",
                        row.grant_id,
                        row.event.vest_date,
                        b.gross_value,
                        b.federal_tax,
                        b.state_tax,
                        b.total_fica,
                        b.state_sdi,
                        b.total_tax,
                        b.net_amount
                    );
                    if !b.amt_preference.is_zero() {
                        println!("    AMT preference {}", b.amt_preference);
                    }
                }
            }
        }

        Command::Sale {
            shares,
            sale_price,
            basis,
            fees,
            acquired,
            sold,
            total_income,
            profile,
        } => {
            if sold < acquired {
                bail!("sale date {sold} is before acquisition date {acquired}");
            }
            let snapshot = load_snapshot(&cli.data).await?;
            let gain = sale_gain(*shares, *sale_price, *basis, *fees);
            let result = snapshot.orchestrator().capital_gains(
                gain,
                *acquired,
                *sold,
                *total_income,
                &profile.to_profile(),
            );

            if cli.json {
                print_json(&result)?;
            } else {
                println!(
                    "gain {} ({:?}, {} days held)",
                    result.gain, result.holding_period, result.holding_days
                );
                println!("  federal {} @ {}", result.federal_tax, result.federal_rate);
                println!("  niit    {} @ {}", result.niit_tax, result.niit_rate);
                println!("  state   {} @ {}", result.state_tax, result.state_rate);
                println!("  total   {}  net {}", result.total_tax, result.net_gain);
            }
        }

        Command::Amt {
            shares,
            strike,
            fmv,
            year,
            profile,
        } => {
            let snapshot = load_snapshot(&cli.data).await?;
            let profile = profile.to_profile();
            let Some(income) = profile.annual_income else {
                bail!("--income is required for an AMT projection");
            };
            let Some(year_config) = snapshot.configs.for_year(*year) else {
                bail!("no year constants available in {}", cli.data);
            };
            let config = AmtConfig::from_tax_year_config(year_config);
            config
                .validate()
                .with_context(|| format!("Invalid AMT constants for {}", year_config.tax_year))?;

            let regular_tax = BracketEngine::new(&snapshot.tables)
                .progressive_tax(
                    &Jurisdiction::Federal,
                    *year,
                    profile.filing_status,
                    TaxType::Ordinary,
                    income,
                )
                .total_tax;
            let projection = AmtCalculator::new(config).project_iso_exercise(
                income,
                *shares,
                *strike,
                *fmv,
                profile.filing_status,
                regular_tax,
            );

            if cli.json {
                print_json(&projection)?;
            } else {
                println!(
                    "bargain element {} ({} per share)",
                    projection.total_bargain_element, projection.bargain_element_per_share
                );
                println!("  AMTI            {}", projection.amt.amti);
                println!("  exemption       {}", projection.amt.exemption_allowed);
                println!("  tentative AMT   {}", projection.amt.tentative_amt);
                println!("  regular tax     {}", projection.amt.regular_tax);
                println!(
                    "  AMT owed        {} ({})",
                    projection.amt.amt_owed,
                    projection.severity.as_str()
                );
            }
        }

        Command::CheckData => {
            let snapshot = load_snapshot(&cli.data).await?;
            let summary = DataSummary {
                years: snapshot.configs.years().collect(),
                tables: snapshot.tables.tables().map(|t| t.key().to_string()).collect(),
                state_levies: snapshot
                    .states
                    .iter()
                    .map(|l| format!("{} {}", l.jurisdiction, l.tax_year))
                    .collect(),
            };
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("year constants: {:?}", summary.years);
                println!("bracket tables: {}", summary.tables.len());
                for table in &summary.tables {
                    println!("  {table}");
                }
                println!("state levies: {:?}", summary.state_levies);
            }
        }
    }

    Ok(())
}

async fn load_snapshot(spec: &SourceSpec) -> Result<ReferenceSnapshot> {
    SourceRegistry::default()
        .with(CsvSourceFactory)
        .load(spec)
        .await
        .with_context(|| format!("Failed to load reference data: {spec}"))
}

fn load_grants(
    path: &Path,
    grant_id: Option<i64>,
) -> Result<Vec<GrantTerms>> {
    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let records = GrantLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
    let mut grants = GrantLoader::build(&records)
        .with_context(|| format!("Invalid grant in {}", path.display()))?;

    if let Some(id) = grant_id {
        grants.retain(|g| g.id == id);
        if grants.is_empty() {
            bail!("grant {id} not found in {}", path.display());
        }
    }
    info!(count = grants.len(), "loaded grants");
    Ok(grants)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
