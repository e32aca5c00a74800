//! Command-line interface definitions.
//!
//! All options can be provided via command-line flags, and the credentials
//! and endpoints also via environment variables.

use clap::Parser;

/// Command-line arguments for the preview digest.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, built-in programme list
/// CHANNEL_ACCESS_TOKEN=... YOUR_USER_ID=U1,U2 tv_preview_digest
///
/// # Print the digest without sending it
/// tv_preview_digest --dry-run
///
/// # Render pages through Browserless and use a custom programme list
/// tv_preview_digest --browserless-url http://localhost:3000 --sources sources.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// LINE channel access token
    #[arg(long, env = "CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub channel_access_token: Option<String>,

    /// Comma-separated LINE user IDs to deliver to
    #[arg(long, env = "YOUR_USER_ID", value_delimiter = ',')]
    pub user_ids: Vec<String>,

    /// YAML file replacing the built-in programme list
    #[arg(short, long, env = "DIGEST_SOURCES")]
    pub sources: Option<String>,

    /// Browserless base URL; pages are fetched over plain HTTP when unset
    #[arg(long, env = "BROWSERLESS_URL")]
    pub browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    pub browserless_token: Option<String>,

    /// Seconds to wait for a page (and its awaited element)
    #[arg(short, long, default_value_t = 15)]
    pub timeout_secs: u64,

    /// LINE Messaging API base URL
    #[arg(long, env = "LINE_API_BASE", default_value = crate::notify::LINE_API_BASE)]
    pub line_api_base: String,

    /// Print the digest instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with an error when the token or user IDs are missing
    #[arg(long)]
    pub require_credentials: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "tv_preview_digest",
            "--channel-access-token",
            "tok",
            "--user-ids",
            "U1,U2",
            "--dry-run",
        ]);

        assert_eq!(cli.channel_access_token.as_deref(), Some("tok"));
        assert_eq!(cli.user_ids, vec!["U1", "U2"]);
        assert!(cli.dry_run);
        assert!(!cli.require_credentials);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "tv_preview_digest",
            "-s",
            "/tmp/sources.yaml",
            "-t",
            "30",
        ]);

        assert_eq!(cli.sources.as_deref(), Some("/tmp/sources.yaml"));
        assert_eq!(cli.timeout_secs, 30);
    }

    // Only options without an `env` source are checked against parsed values,
    // so exported variables on the test machine cannot change the outcome.
    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tv_preview_digest"]);
        assert_eq!(cli.timeout_secs, 15);
        assert!(!cli.dry_run);
        assert!(!cli.require_credentials);
    }

    #[test]
    fn test_line_api_base_default() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "line_api_base")
            .unwrap();
        let defaults: Vec<_> = arg.get_default_values().iter().map(|v| v.to_str()).collect();
        assert_eq!(defaults, vec![Some(crate::notify::LINE_API_BASE)]);
        assert_eq!(arg.get_env().and_then(|e| e.to_str()), Some("LINE_API_BASE"));
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::parse_from([
            "tv_preview_digest",
            "--browserless-url",
            "http://localhost:3000",
            "--line-api-base",
            "http://localhost:8080",
        ]);
        assert_eq!(cli.browserless_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(cli.line_api_base, "http://localhost:8080");
    }
}
