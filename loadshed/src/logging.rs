//! Tracing subscriber setup shared by the harness binaries.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with LOADSHED_LOG and LOG_FORMAT support.
///
/// `RUST_LOG` takes precedence when set. Otherwise `LOADSHED_LOG` picks the
/// level for the harness crates. Output goes to stderr.
pub fn init_tracing() {
    let filter = env_filter();
    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn env_filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let level = base_level(std::env::var("LOADSHED_LOG").ok().as_deref());
    EnvFilter::new(format!(
        "loadshed={level},loadshed_server={level},loadshed_publisher={level}"
    ))
}

fn base_level(requested: Option<&str>) -> &'static str {
    match requested {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}
