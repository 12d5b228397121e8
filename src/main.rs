use basket_buddy::{
    config::{database, settings},
    core::{
        cache::{MemoryBackend, Recommendation, RecommendationCache},
        rule_store,
        sample_data::{self, DemoOptions},
        scheduler::{self, Scheduler},
        settings::{self as rec_settings, ConfigUpdate},
    },
    errors::Result,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sea_orm::DatabaseConnection;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "basket-buddy")]
#[command(about = "Product recommendations mined from sales history")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "BASKET_BUDDY_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the periodic remine and precompute jobs until Ctrl-C
    ///
    /// The cache warmed here lives in this process only. `recommend` and `cart` run in
    /// their own process with an empty cache and read the stored rules directly.
    Serve,

    /// Run the mining pipeline now
    Remine {
        /// Ignore the refresh interval
        #[arg(long)]
        force: bool,
    },

    /// Recompute recommendations for the best-selling products (no lasting effect outside
    /// `serve`, whose scheduler runs this on its own)
    Precompute,

    /// Recommendations for one product
    Recommend {
        /// Product id
        product_id: i64,

        /// Number of results (default: configured max_recommendations)
        #[arg(short, long)]
        limit: Option<u64>,

        /// Product ids to leave out, comma separated
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },

    /// Recommendations for a cart
    Cart {
        /// Product ids in the cart
        #[arg(required = true)]
        product_ids: Vec<i64>,

        /// Number of results (default: configured max_recommendations)
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Stored rules for one product
    Rules {
        /// Origin product id
        product_id: i64,

        /// Number of rules to show
        #[arg(short, long, default_value_t = 10)]
        limit: u64,
    },

    /// Show or change mining thresholds
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate synthetic sales, then remine
    SeedDemo {
        /// Number of sales
        #[arg(long, default_value_t = 100)]
        sales: usize,

        /// Maximum products in a random sale
        #[arg(long, default_value_t = 5)]
        max_products_per_sale: usize,

        /// Minimum catalog size; missing products are created
        #[arg(long, default_value_t = 15)]
        products: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current thresholds
    Show,

    /// Update one or more thresholds
    Set {
        /// Minimum pair support, in (0, 1]
        #[arg(long)]
        min_support: Option<f64>,

        /// Minimum rule confidence, in [0, 1]
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Minimum rule lift
        #[arg(long)]
        min_lift: Option<f64>,

        /// Default number of recommendations
        #[arg(long)]
        max_recommendations: Option<i32>,

        /// Days between scheduled remines
        #[arg(long)]
        refresh_interval_days: Option<i32>,
    },
}

async fn default_limit(db: &DatabaseConnection) -> Result<u64> {
    let config = rec_settings::get_or_create_config(db).await?;
    Ok(u64::try_from(config.max_recommendations).unwrap_or(1))
}

fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("No recommendations.");
        return;
    }
    for (rank, r) in recommendations.iter().enumerate() {
        let name = r.product.as_ref().map_or("(unavailable)", |p| p.name.as_str());
        println!(
            "{:>2}. #{} {} - score {:.3}, confidence {:.2}, lift {:.2}",
            rank + 1,
            r.product_id,
            name,
            r.score,
            r.confidence,
            r.lift
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file before anything reads DATABASE_URL
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = settings::load_config(&cli.config)
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Initialize database
    let db = database::init_database(&app_config.database_url)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    let cache = RecommendationCache::new(MemoryBackend::new(), app_config.cache.product_ttl());

    match cli.command {
        Commands::Serve => {
            let scheduler = Arc::new(Scheduler::new(db, Arc::new(cache), app_config.scheduler));
            scheduler.run().await?;
        }
        Commands::Remine { force } => {
            let outcome = scheduler::run_remine(&db, &cache, force, Utc::now()).await?;
            println!("{outcome:?}");
        }
        Commands::Precompute => {
            let warmed =
                scheduler::precompute_popular(&db, &cache, &app_config.scheduler, Utc::now())
                    .await?;
            println!("Precomputed recommendations for {warmed} products.");
        }
        Commands::Recommend {
            product_id,
            limit,
            exclude,
        } => {
            let limit = match limit {
                Some(limit) => limit,
                None => default_limit(&db).await?,
            };
            let recommendations = cache.get_for_product(&db, product_id, limit, &exclude).await?;
            print_recommendations(&recommendations);
        }
        Commands::Cart { product_ids, limit } => {
            let limit = match limit {
                Some(limit) => limit,
                None => default_limit(&db).await?,
            };
            let recommendations = cache.get_for_cart(&db, &product_ids, limit).await?;
            print_recommendations(&recommendations);
        }
        Commands::Rules { product_id, limit } => {
            let rules = rule_store::query_by_origin(&db, product_id, limit).await?;
            if rules.is_empty() {
                println!("No rules for product #{product_id}.");
            }
            for rule in rules {
                println!(
                    "#{} -> #{}: support {:.3}, confidence {:.3}, lift {:.3}",
                    rule.origin_product_id,
                    rule.recommended_product_id,
                    rule.support,
                    rule.confidence,
                    rule.lift
                );
            }
        }
        Commands::Config { action } => {
            let config = match action {
                ConfigAction::Show => rec_settings::get_or_create_config(&db).await?,
                ConfigAction::Set {
                    min_support,
                    min_confidence,
                    min_lift,
                    max_recommendations,
                    refresh_interval_days,
                } => {
                    rec_settings::update_config(
                        &db,
                        ConfigUpdate {
                            min_support,
                            min_confidence,
                            min_lift,
                            max_recommendations,
                            refresh_interval_days,
                        },
                    )
                    .await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::SeedDemo {
            sales,
            max_products_per_sale,
            products,
        } => {
            let options = DemoOptions {
                sales,
                max_products_per_sale,
                products,
            };
            let recorded =
                sample_data::seed_demo_sales(&db, &mut rand::thread_rng(), &options).await?;
            println!("Recorded {recorded} demo sales.");
            let outcome = scheduler::run_remine(&db, &cache, true, Utc::now()).await?;
            println!("{outcome:?}");
        }
    }

    Ok(())
}
