use clap::Parser;

/// Process-level flags: bind address, log filter, client auth override.
/// Distinct from the business `AppConfig` served by `ConfigStore` — this
/// is where *this binary* starts, not how the proxy behaves.
#[derive(Debug, Parser)]
#[command(name = "aicodeswitch", about = "LLM dialect-translating reverse proxy")]
pub struct Cli {
    #[arg(long, env = "AICODESWITCH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "AICODESWITCH_PORT", default_value_t = 8787)]
    pub port: u16,

    #[arg(long, env = "AICODESWITCH_LOG", default_value = "aicodeswitch=info,tower_http=warn")]
    pub log_filter: String,

    /// Overrides the in-memory `AppConfig.apiKey` at startup, ahead of
    /// whatever the seed file (if any) set.
    #[arg(long, env = "AICODESWITCH_API_KEY")]
    pub api_key: Option<String>,

    /// Path to a JSON file seeding vendors/services/routes/rules into the
    /// in-memory config store. Without it the proxy starts with no active
    /// routes, so every request fails `NoMatchingRoute` until an embedder
    /// wires a real `ConfigStore`.
    #[arg(long, env = "AICODESWITCH_SEED")]
    pub seed: Option<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_args() {
        let cli = Cli::parse_from(["aicodeswitch"]);
        assert_eq!(cli.port, 8787);
        assert!(cli.seed.is_none());
    }
}
