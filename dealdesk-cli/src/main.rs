//! DealDesk - amoCRM deals from the terminal.
//!
//! ```bash
//! # Sample data, no network
//! dealdesk --mock list
//!
//! # Real account
//! AMOCRM_BASE_URL=https://acme.amocrm.ru/api/v4 AMOCRM_ACCESS_TOKEN=... dealdesk list
//!
//! # Expand deals one after another
//! dealdesk show 3 5
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use dealdesk_adapters_amocrm::{AmoCrmClient, AmoCrmConfig, CrmError, Deal, MockExecutor};
use dealdesk_core::{RequestScheduler, SchedulerConfig, SerialDispatcher};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod render;

#[derive(Parser)]
#[command(name = "dealdesk")]
#[command(version)]
#[command(about = "DealDesk - amoCRM deals with rate-limited API access", long_about = None)]
struct Cli {
    /// Serve built-in sample deals instead of calling amoCRM
    #[arg(long, global = true)]
    mock: bool,

    /// amoCRM API root (overrides AMOCRM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// OAuth access token (overrides AMOCRM_ACCESS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Maximum concurrent API requests (overrides DEALDESK_MAX_CONCURRENT)
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Minimum spacing per request slot in milliseconds (overrides DEALDESK_MIN_SPACING_MS)
    #[arg(long, global = true)]
    min_spacing_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the deals table
    List {
        /// Skip the per-deal contact lookups
        #[arg(long)]
        no_contacts: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show details for one or more deals, fetched one at a time
    Show {
        /// Deal ids
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Print the effective configuration
    Config,
}

impl Cli {
    fn scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::from_env();
        if let Some(ceiling) = self.max_concurrent {
            config = config.with_ceiling(ceiling);
        }
        if let Some(ms) = self.min_spacing_ms {
            config = config.with_min_spacing(Duration::from_millis(ms));
        }
        config
    }

    fn crm_config(&self) -> AmoCrmConfig {
        let mut config = AmoCrmConfig::from_env();
        if let Some(url) = &self.base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(token) = &self.token {
            config.access_token = token.clone();
        }
        config
    }

    fn client(&self, scheduler: RequestScheduler) -> anyhow::Result<AmoCrmClient> {
        let config = self.crm_config();
        if self.mock {
            info!("Using sample data");
            return Ok(AmoCrmClient::with_executor(
                Arc::new(MockExecutor::new()),
                config.access_token,
                scheduler,
            ));
        }

        if !config.has_token() {
            anyhow::bail!("No access token: set AMOCRM_ACCESS_TOKEN, pass --token, or use --mock");
        }
        AmoCrmClient::new(&config, scheduler).context("Failed to create amoCRM client")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "dealdesk=debug,dealdesk_core=debug,dealdesk_adapters_amocrm=debug"
    } else {
        "dealdesk=info,dealdesk_core=warn,dealdesk_adapters_amocrm=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so `list --json` stays machine readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let scheduler_config = cli.scheduler_config();
    let today = Local::now().date_naive();

    match &cli.command {
        Commands::Config => {
            let crm = cli.crm_config();
            println!("=== Scheduler ===");
            println!("Max concurrent: {}", scheduler_config.ceiling);
            println!("Min spacing: {} ms", scheduler_config.min_spacing.as_millis());
            println!("Pacing: {:?}", scheduler_config.pacing);
            println!();
            println!("=== amoCRM ===");
            println!("Base URL: {}", crm.base_url);
            println!(
                "Access token: {}",
                if crm.has_token() { "set" } else { "not set" }
            );
            println!("Request timeout: {} s", crm.request_timeout.as_secs());
            println!("Mock: {}", cli.mock);
        }

        Commands::List { no_contacts, json } => {
            let scheduler = RequestScheduler::new(scheduler_config)
                .context("Invalid scheduler configuration")?;
            let client = cli.client(scheduler.clone())?;

            let deals = client
                .get_deals(!no_contacts)
                .await
                .context("Failed to load deals")?;

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&render::deals_json(&deals, today))?
                );
            } else {
                print!("{}", render::deals_table(&deals, today));
            }

            scheduler.drain().await;
            debug!(metrics = ?scheduler.metrics().snapshot(), "Scheduler metrics");
        }

        Commands::Show { ids } => {
            let cooldown = scheduler_config.min_spacing;
            let scheduler = RequestScheduler::new(scheduler_config)
                .context("Invalid scheduler configuration")?;
            let dispatcher =
                SerialDispatcher::new(cooldown).context("Invalid dispatcher configuration")?;
            let client = cli.client(scheduler.clone())?;

            let tickets: Vec<_> = ids
                .iter()
                .map(|&id| {
                    let client = client.clone();
                    (id, dispatcher.enqueue_serial(move || fetch_details(client, id)))
                })
                .collect();

            // Render each deal as soon as its fetch settles
            for (id, ticket) in tickets {
                match ticket.await {
                    Ok(deal) => print!("{}", render::deal_details(&deal, today)),
                    Err(e) => print!("{}", render::details_unavailable(id, &e)),
                }
                println!();
            }

            dispatcher.drain().await;
            scheduler.drain().await;
            debug!(
                requests = ?scheduler.metrics().snapshot(),
                fetches = ?dispatcher.metrics().snapshot(),
                "Scheduler metrics"
            );
        }
    }

    Ok(())
}

/// Deal details plus its first contact
async fn fetch_details(client: AmoCrmClient, deal_id: u64) -> Result<Deal, CrmError> {
    let mut deal = client.get_deal_details(deal_id).await?;
    if let Some(contact_id) = deal.primary_contact_id() {
        deal.contact = Some(client.get_contact(contact_id).await?);
    }
    Ok(deal)
}
