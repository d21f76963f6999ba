use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise both crates of the workspace log at
/// `level` (falling back to `info` when `level` is not a valid directive).
pub fn init_tracing(level: &str) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(level),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn default_filter(level: &str) -> EnvFilter {
    let level = level.trim().to_ascii_lowercase();
    let mut filter = EnvFilter::new("warn");
    for krate in ["windsolar_ingestion", "windsolar_client", "ingestion_service", "backfill_generation"] {
        match format!("{krate}={level}").parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => {
                if let Ok(directive) = format!("{krate}=info").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
    }
    filter
}
