mod content;
mod embed;
mod error;
mod notion;
mod settings;
mod views;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use content::{Category, ContentRecord};
use notion::NotionClient;
use settings::Settings;

#[derive(Parser)]
#[command(name = "notion_site", about = "Personal site content served from a Notion page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the home page (bio, latest insight, updates)
    Home,
    /// Render one update's detail page
    Update {
        /// Block id of the update (dashes optional)
        id: String,
        /// Render as if the embedded frame had failed to load
        #[arg(long)]
        frame_failed: bool,
    },
    /// Print extracted records as JSON
    Records {
        /// Only records of this category
        #[arg(short, long)]
        category: Option<CategoryArg>,
    },
    /// Show how a link would be rendered
    Classify {
        url: String,
        /// Ask for an embedded frame
        #[arg(long)]
        embed: bool,
        /// Treat the frame as having failed to load
        #[arg(long)]
        frame_failed: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Insight,
    Update,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Insight => Category::Insight,
            CategoryArg::Update => Category::Update,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    match cli.command {
        Commands::Home => {
            let records = fetch_records(&settings).await?;
            print!("{}", views::home(&records));
        }
        Commands::Update { id, frame_failed } => {
            let records = fetch_records(&settings).await?;
            let mut view = views::detail(&records, &id);
            if frame_failed {
                view.report_frame_failure();
            }
            print!("{}", view);
        }
        Commands::Records { category } => {
            let records = fetch_records(&settings).await?;
            let selected: Vec<&ContentRecord> = match category {
                Some(c) => content::filter_by_category(&records, c.into()),
                None => records.iter().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&selected)?);
        }
        Commands::Classify { url, embed, frame_failed } => {
            let strategy = embed::classify(&url, embed, frame_failed);
            println!("{}", serde_json::to_string_pretty(&strategy)?);
        }
    }

    tracing::debug!("Done in {:.2}s", t0.elapsed().as_secs_f64());
    Ok(())
}

/// One snapshot per invocation; every view filters the same records.
async fn fetch_records(settings: &Settings) -> anyhow::Result<Vec<ContentRecord>> {
    let Some(page_id) = settings.page_id() else {
        warn!("NOTION_PAGE_ID environment variable is not set");
        return Ok(Vec::new());
    };

    let client = NotionClient::new(
        &settings.api_base,
        settings.token().map(str::to_string),
        settings.timeout(),
    )
    .context("Failed to build HTTP client")?;

    Ok(content::load_records(&client, page_id, settings.timeout()).await)
}
