use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use skinalyze_catalog::{CatalogClient, ProductType, Recommendations, Recommender, SkinType};
use skinalyze_core::{Condition, ConditionDetector};
use std::convert::Infallible;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

mod artifacts;
mod config;
mod render;

use config::Config;

#[derive(Parser)]
#[command(name = "skinalyze", about = "Skin condition analysis and product recommendations")]
struct Cli {
    /// TOML settings file (defaults to $SKINALYZE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect skin conditions in a photo and recommend products
    Analyze {
        /// Image file, or `-` to read a camera snapshot from stdin
        image: InputSource,
        #[command(flatten)]
        selection: Selection,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Detect skin conditions only
    Detect {
        /// Image file, or `-` to read from stdin
        image: InputSource,
        #[arg(long)]
        json: bool,
    },
    /// Fetch recommendations for known condition labels
    Recommend {
        /// Condition label, e.g. "Acne" or "Dark Spots" (repeatable)
        #[arg(short, long = "condition", required = true)]
        conditions: Vec<String>,
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        json: bool,
    },
    /// Download detector models that are not cached yet
    FetchModels,
    /// Check that the product catalog is reachable
    Health,
    /// List skin type and product type ids
    Types,
}

#[derive(Args)]
struct Selection {
    /// Skin type: 1-6 or oily, dry, normal, combination, sensitive, all
    #[arg(short, long)]
    skin_type: Option<SkinType>,
    /// Restrict to one product type: 1-5 or cleansers, serums, toners, moisturisers, sunscreens
    #[arg(short, long, conflicts_with = "all_tabs")]
    product_type: Option<ProductType>,
    /// Show all products plus one section per product type
    #[arg(long)]
    all_tabs: bool,
}

impl Selection {
    /// Result sections to fetch, as (title, product type filter).
    fn sections(&self) -> Vec<(&'static str, Option<ProductType>)> {
        match (self.product_type, self.all_tabs) {
            (Some(product_type), _) => vec![(product_type.name(), Some(product_type))],
            (None, true) => std::iter::once(("All Products", None))
                .chain(ProductType::ALL.into_iter().map(|p| (p.name(), Some(p))))
                .collect(),
            (None, false) => vec![("All Products", None)],
        }
    }
}

/// Where the photo comes from: an uploaded file or a snapshot piped on stdin.
#[derive(Debug, Clone)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

impl FromStr for InputSource {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(s))
        })
    }
}

impl InputSource {
    async fn read(&self) -> Result<Vec<u8>> {
        match self {
            InputSource::File(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display())),
            InputSource::Stdin => {
                let mut bytes = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut bytes)
                    .await
                    .context("reading image from stdin")?;
                Ok(bytes)
            }
        }
    }
}

#[derive(Serialize)]
struct Section {
    title: &'static str,
    recommendations: Recommendations,
}

#[derive(Serialize)]
struct Report<'a> {
    conditions: &'a [Condition],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sections: Vec<Section>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Analyze {
            image,
            selection,
            json,
        } => {
            let conditions = detect(&config, &image).await?;
            let sections = match selection.skin_type {
                Some(skin_type) if !conditions.is_empty() => {
                    let labels: Vec<&str> = conditions.iter().map(|c| c.label()).collect();
                    fetch_sections(&config, &labels, skin_type, &selection).await?
                }
                _ => Vec::new(),
            };

            let mut out = std::io::stdout().lock();
            if json {
                print_json(&mut out, &Report { conditions: &conditions, sections })?;
            } else {
                render::conditions(&mut out, &conditions)?;
                if !conditions.is_empty() && selection.skin_type.is_none() {
                    writeln!(out, "Pass --skin-type to see recommended products.")?;
                }
                for section in &sections {
                    render::recommendations(&mut out, section.title, &section.recommendations)?;
                }
            }
        }
        Commands::Detect { image, json } => {
            let conditions = detect(&config, &image).await?;
            let mut out = std::io::stdout().lock();
            if json {
                print_json(&mut out, &conditions)?;
            } else {
                render::conditions(&mut out, &conditions)?;
            }
        }
        Commands::Recommend {
            conditions,
            selection,
            json,
        } => {
            let skin_type = selection
                .skin_type
                .context("--skin-type is required for recommendations")?;
            let sections = fetch_sections(&config, &conditions, skin_type, &selection).await?;

            let mut out = std::io::stdout().lock();
            if json {
                print_json(&mut out, &sections)?;
            } else {
                for section in &sections {
                    render::recommendations(&mut out, section.title, &section.recommendations)?;
                }
            }
        }
        Commands::FetchModels => {
            let paths = artifacts::ensure_all(&config)
                .await
                .context("fetching detector models")?;
            for condition in Condition::ALL {
                println!("{condition}: {}", paths.get(condition).display());
            }
        }
        Commands::Health => {
            let client = CatalogClient::new(&config.catalog_url, config.request_timeout())?;
            let health = client
                .health()
                .await
                .with_context(|| format!("catalog at {} is unhealthy", client.base_url()))?;
            println!("{}: {} ({})", client.base_url(), health.status, health.message);
        }
        Commands::Types => {
            render::id_tables(&mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

/// Make sure the models are on disk, load them, and analyze one image.
async fn detect(config: &Config, image: &InputSource) -> Result<Vec<Condition>> {
    let bytes = image.read().await?;
    let paths = artifacts::ensure_all(config)
        .await
        .context("fetching detector models")?;
    let mut detector =
        ConditionDetector::load(&paths, config.detector).context("loading detector models")?;
    let conditions = detector.analyze_bytes(&bytes).context("analyzing image")?;
    Ok(conditions)
}

async fn fetch_sections<S: AsRef<str>>(
    config: &Config,
    labels: &[S],
    skin_type: SkinType,
    selection: &Selection,
) -> Result<Vec<Section>> {
    let client = CatalogClient::new(&config.catalog_url, config.request_timeout())?;
    let recommender = Recommender::new(client).dedupe_concerns(config.dedupe_concerns);

    let mut sections = Vec::new();
    for (title, product_type) in selection.sections() {
        let recommendations = match product_type {
            Some(product_type) => {
                recommender
                    .recommend_by_type(labels, skin_type, product_type)
                    .await
            }
            None => recommender.recommend(labels, skin_type).await,
        };
        sections.push(Section {
            title,
            recommendations,
        });
    }
    Ok(sections)
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
