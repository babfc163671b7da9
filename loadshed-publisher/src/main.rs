use clap::Parser;
use tracing::info;

use loadshed::logging::init_tracing;
use loadshed_publisher::{PublisherArgs, publish};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = PublisherArgs::parse();
    init_tracing();

    let client = reqwest::Client::builder().build()?;
    let summary = publish(&client, &args).await;

    info!(
        url = %args.url,
        admitted = summary.admitted,
        rejected = summary.rejected,
        failed = summary.failed,
        "published {} messages",
        summary.total()
    );

    Ok(())
}
