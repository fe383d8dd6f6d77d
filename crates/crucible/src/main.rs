use clap::Parser;
use crucible::args::NodeArgs;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let args = NodeArgs::parse();
    args.run().await?;
    Ok(())
}

/// Initializes the tracing subscriber, filter via `RUST_LOG`
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
}
