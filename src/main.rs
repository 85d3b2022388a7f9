use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use stamp_catalog::config::{CatalogConfig, DEFAULT_CONFIG_FILE};
use stamp_catalog::details::create_stamp_detail_data;
use stamp_catalog::export::write_stamps_csv;
use stamp_catalog::{
    CacheCoordinator, CatalogSnapshot, GroupKey, HttpCatalogSource, Level, SqliteCacheStore,
    StampWithInstances,
};

#[derive(Parser)]
#[command(name = "stamp-catalog")]
#[command(about = "Local-first stamp catalog: sync, browse and export")]
struct Cli {
    /// CONL configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Cache database path (overrides the config file)
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Catalog id (overrides the config file)
    #[arg(long)]
    catalog: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the catalog (cache first, remote when empty) and report counts
    Sync,
    /// Remove the local cache database
    Clean,
    #[command(flatten)]
    Browse(BrowseCommand),
}

/// Commands that read the loaded catalog
#[derive(Subcommand)]
enum BrowseCommand {
    /// List countries with stamp counts and year ranges
    Countries,
    /// List the series of a country
    Series { country: String },
    /// List item types of a series
    Types { series: String },
    /// List stamp groups of a series and item type
    Groups { series: String, item_type: String },
    /// List stamps (with varieties) of a stamp group
    Stamps {
        series: String,
        item_type: String,
        group: String,
    },
    /// List issue years of a country, oldest first
    Years { country: String },
    /// List releases of a country in a year
    Releases { country: String, year: i32 },
    /// List categories of a release
    Categories {
        country: String,
        year: i32,
        release: String,
    },
    /// List paper types of a category
    PaperTypes {
        country: String,
        year: i32,
        release: String,
        category: String,
    },
    /// List stamps (with varieties) printed on a paper type
    PaperStamps {
        country: String,
        year: i32,
        release: String,
        category: String,
        paper_type: String,
    },
    /// Show the detail page data of one stamp
    Details {
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a stamp group (with varieties) as CSV
    Export {
        series: String,
        item_type: String,
        group: String,
        /// Output CSV file
        #[arg(short, long, default_value = "stamps.csv")]
        output: PathBuf,
    },
}

fn year_range(start: Option<i32>, end: Option<i32>) -> String {
    match (start, end) {
        (Some(s), Some(e)) if s == e => s.to_string(),
        (Some(s), Some(e)) => format!("{}-{}", s, e),
        _ => "undated".to_string(),
    }
}

fn load_catalog(config: &CatalogConfig) -> Result<Arc<CatalogSnapshot>> {
    let store = SqliteCacheStore::open(&config.cache_path)
        .with_context(|| format!("Failed to open cache {}", config.cache_path.display()))?;
    let remote = HttpCatalogSource::new(config.base_url.clone())?;
    let coordinator = CacheCoordinator::new(store, remote, config.request());
    let snapshot = coordinator.initialize();
    coordinator.close();

    if let Some(error) = &snapshot.error {
        bail!("{} (catalog {})", error, config.catalog_id);
    }
    Ok(snapshot)
}

fn print_stamps(rows: &[StampWithInstances]) {
    if rows.is_empty() {
        println!("No stamps found");
        return;
    }
    for row in rows {
        let stamp = &row.stamp;
        println!(
            "{:<16} {:<40} {:>6} {:<8} {}",
            stamp.id, stamp.name, stamp.issue_year, stamp.denomination, stamp.catalog_number
        );
        for instance in &row.instances {
            println!(
                "  └ {:<12} {:<40} {}",
                instance.id, instance.name, instance.variety_type
            );
        }
    }
}

fn run_sync(config: &CatalogConfig) -> Result<()> {
    println!("Loading catalog {}...", config.catalog_id);
    let snapshot = load_catalog(config)?;
    println!(
        "Done! {} raw records, {} normalized stamps in {}",
        snapshot.stamps.len(),
        snapshot.normalized_stamps.len(),
        config.cache_path.display()
    );
    Ok(())
}

fn run_details(snapshot: &CatalogSnapshot, id: &str, json: bool) -> Result<()> {
    let hierarchy = snapshot.hierarchy();
    let Some(stamp) = hierarchy.stamp_by_id(id) else {
        bail!("No stamp with id {}", id);
    };
    let data = create_stamp_detail_data(stamp);
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} ({})", data.name, data.id);
    println!("  Country:        {}", data.country);
    println!("  Year:           {}", data.issue_year);
    println!("  Denomination:   {}", data.denomination);
    println!("  Perforation:    {}", data.details.perforation);
    println!("  Watermark:      {}", data.details.watermark);
    println!("  Printing:       {}", data.details.printing_method);
    println!("  Paper:          {}", data.details.paper_type);
    println!("  Mint / used:    {} / {}", data.market_info.mint_value, data.market_info.used_value);
    println!("  Rarity:         {}", data.market_info.rarity);
    println!();
    println!("{}", data.bibliography);

    let instances = hierarchy.instances_of(id);
    if !instances.is_empty() {
        println!();
        println!("Varieties:");
        for instance in instances {
            println!("  {} {}", instance.id, instance.name);
        }
    }
    Ok(())
}

fn run_export(rows: &[StampWithInstances], output: &Path) -> Result<()> {
    let file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let written = write_stamps_csv(file, rows)?;
    println!("Wrote {} rows to {}", written, output.display());
    Ok(())
}

fn run_clean(config: &CatalogConfig) -> Result<()> {
    println!("Cleaning local cache...");

    let db_path = &config.cache_path;
    if db_path.exists() {
        fs::remove_file(db_path)?;
        println!("  Removed {}", db_path.display());
    }

    println!("Clean complete!");
    Ok(())
}

fn country_key(value: &str) -> GroupKey {
    GroupKey::parse(value, Level::Country)
}

fn run_browse(command: BrowseCommand, config: &CatalogConfig) -> Result<()> {
    let snapshot = load_catalog(config)?;
    let hierarchy = snapshot.hierarchy();

    match command {
        BrowseCommand::Countries => {
            for country in hierarchy.group_by_country() {
                println!(
                    "{:<8} {:<32} {:>6} stamps  {}",
                    country.id.label(Level::Country),
                    country.name,
                    country.total_years,
                    year_range(country.year_start, country.year_end)
                );
            }
        }
        BrowseCommand::Series { country } => {
            for series in hierarchy.group_by_series(&country_key(&country)) {
                println!(
                    "{:<40} {:>6} stamps  {}",
                    series.id.label(Level::Series),
                    series.total_types,
                    year_range(series.period_start, series.period_end)
                );
            }
        }
        BrowseCommand::Types { series } => {
            for item_type in hierarchy.get_types_for_series(&GroupKey::parse(&series, Level::Series)) {
                println!("{:<40} {:>6} stamps", item_type.id.label(Level::Type), item_type.total_stamps);
            }
        }
        BrowseCommand::Groups { series, item_type } => {
            let groups = hierarchy.get_stamp_groups_for_type(
                &GroupKey::parse(&series, Level::Series),
                &GroupKey::parse(&item_type, Level::Type),
            );
            for group in groups {
                println!(
                    "{:<40} {:>6} stamps  perf {}, wmk {}, {}",
                    group.id.label(Level::StampGroup),
                    group.total_stamps,
                    group.perforation,
                    group.watermark,
                    group.printer
                );
            }
        }
        BrowseCommand::Stamps {
            series,
            item_type,
            group,
        } => {
            let rows = hierarchy.get_stamps_for_stamp_group(
                &GroupKey::parse(&series, Level::Series),
                &GroupKey::parse(&item_type, Level::Type),
                &GroupKey::parse(&group, Level::StampGroup),
            );
            print_stamps(&rows);
        }
        BrowseCommand::Years { country } => {
            for year in hierarchy.get_years_for_country(&country_key(&country)) {
                println!("{}  {:>6} stamps", year.year, year.total_stamps);
            }
        }
        BrowseCommand::Releases { country, year } => {
            for release in hierarchy.get_releases_for_year(&country_key(&country), year) {
                println!(
                    "{:<40} {:>6} stamps  {}",
                    release.id.label(Level::Release),
                    release.total_stamps,
                    release.release_date
                );
            }
        }
        BrowseCommand::Categories {
            country,
            year,
            release,
        } => {
            let categories = hierarchy.get_categories_for_release(
                &country_key(&country),
                year,
                &GroupKey::parse(&release, Level::Release),
            );
            for category in categories {
                println!("{:<40} {:>6} stamps", category.id.label(Level::Category), category.total_stamps);
            }
        }
        BrowseCommand::PaperTypes {
            country,
            year,
            release,
            category,
        } => {
            let papers = hierarchy.get_paper_types_for_category(
                &country_key(&country),
                year,
                &GroupKey::parse(&release, Level::Release),
                &GroupKey::parse(&category, Level::Category),
            );
            for paper in papers {
                println!("{:<40} {:>6} stamps", paper.id.label(Level::PaperType), paper.total_stamps);
            }
        }
        BrowseCommand::PaperStamps {
            country,
            year,
            release,
            category,
            paper_type,
        } => {
            let rows = hierarchy.get_stamps_for_paper_type(
                &country_key(&country),
                year,
                &GroupKey::parse(&release, Level::Release),
                &GroupKey::parse(&category, Level::Category),
                &GroupKey::parse(&paper_type, Level::PaperType),
            );
            print_stamps(&rows);
        }
        BrowseCommand::Details { id, json } => run_details(&snapshot, &id, json)?,
        BrowseCommand::Export {
            series,
            item_type,
            group,
            output,
        } => {
            let rows = hierarchy.get_stamps_for_stamp_group(
                &GroupKey::parse(&series, Level::Series),
                &GroupKey::parse(&item_type, Level::Type),
                &GroupKey::parse(&group, Level::StampGroup),
            );
            run_export(&rows, &output)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CatalogConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_id = catalog;
    }

    match cli.command {
        Commands::Sync => run_sync(&config),
        Commands::Clean => run_clean(&config),
        Commands::Browse(command) => run_browse(command, &config),
    }
}
