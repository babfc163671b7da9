//! loadshed-publisher: fire a burst of requests at a gated endpoint and tally
//! how the gate answered.

use clap::Parser;
use futures::StreamExt;
use loadshed::Outcome;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

/// Flags for `loadshed-publisher`.
#[derive(Debug, Clone, Parser)]
#[command(name = "loadshed-publisher", version, about = "Send n requests to a loadshed endpoint")]
pub struct PublisherArgs {
    /// Endpoint to publish to.
    #[arg(long, env = "LOADSHED_URL", default_value = "http://127.0.0.1:8080/pubsub", value_parser = parse_url)]
    pub url: String,

    /// Number of messages to publish.
    #[arg(short = 'n', long = "count", value_parser = clap::value_parser!(u64).range(1..))]
    pub count: u64,

    /// Maximum requests in flight at once. Defaults to all of them.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Request body.
    #[arg(long, default_value = "foo")]
    pub payload: String,
}

fn parse_url(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("url must not be empty".to_string());
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(format!("url '{trimmed}' must start with http:// or https://"));
    }
    Ok(trimmed.to_string())
}

/// Tally of how the endpoint answered a burst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub admitted: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl PublishSummary {
    pub fn total(&self) -> u64 {
        self.admitted + self.rejected + self.failed
    }

    fn add(&mut self, delivery: &Result<Outcome, PublishError>) {
        match delivery {
            Ok(Outcome::Admitted) => self.admitted += 1,
            Ok(Outcome::Rejected) => self.rejected += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Send `args.count` requests, at most `args.concurrency` in flight.
pub async fn publish(client: &reqwest::Client, args: &PublisherArgs) -> PublishSummary {
    let in_flight = args.concurrency.unwrap_or(args.count).max(1);
    let in_flight = usize::try_from(in_flight).unwrap_or(usize::MAX);

    let mut deliveries = futures::stream::iter(0..args.count)
        .map(|_| send_one(client, &args.url, &args.payload))
        .buffer_unordered(in_flight);

    let mut summary = PublishSummary::default();
    while let Some(delivery) = deliveries.next().await {
        if let Err(e) = &delivery {
            tracing::debug!(error = %e, "Publish failed");
        }
        summary.add(&delivery);
    }
    summary
}

async fn send_one(
    client: &reqwest::Client,
    url: &str,
    payload: &str,
) -> Result<Outcome, PublishError> {
    let response = client.post(url).body(payload.to_string()).send().await?;
    classify(response.status())
}

fn classify(status: StatusCode) -> Result<Outcome, PublishError> {
    if status.is_success() {
        Ok(Outcome::Admitted)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Ok(Outcome::Rejected)
    } else {
        Err(PublishError::UnexpectedStatus(status))
    }
}
