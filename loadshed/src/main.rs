use std::sync::Arc;

use clap::Parser;
use tracing::info;

use loadshed::logging::init_tracing;
use loadshed::transport::serve;
use loadshed::{LOADSHED_VERSION, LoadShedService, ServerArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing();

    let harness = args.harness_config()?;
    info!(
        version = LOADSHED_VERSION,
        limit = harness.limit,
        sleep = ?harness.sleep,
        mode = %harness.mode,
        acquire_timeout = ?harness.acquire_timeout,
        "loadshed starting"
    );

    let service = Arc::new(LoadShedService::from_config(&harness)?);
    serve(args.server_config(), service).await
}
