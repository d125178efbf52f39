use anyhow::Result;
use clap::Parser;
use crash::{BranchCrashState, BranchId};
use dummy_pricing::{router, BranchStore};
use log::info;
use rand::Rng;
use std::sync::Arc;

const BRANCH_NAMES: [&str; 8] = [
    "Harbour",
    "Old Town",
    "Airport",
    "Riverside",
    "Market Hall",
    "University",
    "Station",
    "Docklands",
];

#[derive(Parser)]
#[command(name = "dummy-pricing")]
#[command(about = "In-memory pricing backend for the crash console")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Number of branches to seed
    #[arg(short, long, default_value_t = 4)]
    branches: usize,

    /// Require this bearer token on every API call
    #[arg(short, long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("=== Dummy Pricing Backend Starting ===");

    let store = Arc::new(BranchStore::new());
    let mut rng = rand::thread_rng();
    for i in 0..args.branches {
        let name = match BRANCH_NAMES.get(i) {
            Some(name) => name.to_string(),
            None => format!("Branch {}", i + 1),
        };
        let items = rng.gen_range(5..40);
        store.insert(BranchCrashState::new(BranchId::new(format!("b{}", i + 1)), name), items);
    }
    info!("Seeded {} branches", args.branches);

    let app = router(store, args.token);
    let addr = format!("0.0.0.0:{}", args.port);
    info!("Dummy pricing backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
