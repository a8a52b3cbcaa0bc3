//! Command-line argument definitions

use clap::{Parser, Subcommand};

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "gigya-cli",
    version,
    about = "Call the Gigya API and inspect identity tokens",
    long_about = "Call the Gigya API and inspect identity tokens.\n\n\
                  Credentials come from GIGYA_API_KEY, GIGYA_USER_KEY, GIGYA_USER_SECRET\n\
                  and GIGYA_DATACENTER. Token validation also reads\n\
                  GIGYA_WHITELISTED_API_KEYS.\n\n\
                  SECURITY WARNING: --debug-connection logs full requests and responses.\n\
                  Secrets are redacted but account data is not."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Print JSON on a single line
    #[arg(long, global = true)]
    pub compact: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log every request and response (also `GIGYA_DEBUG_CONNECTION=1`)
    #[arg(long, global = true)]
    pub debug_connection: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call `AREA.FUNCTION` and print the response
    Call {
        /// API area, e.g. `accounts`
        area: String,

        /// Function name, e.g. `getAccountInfo`
        function: String,

        /// Request parameter as key=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Send a POST instead of a GET
        #[arg(long)]
        post: bool,

        /// Fail on error envelopes instead of printing them
        #[arg(long)]
        strict: bool,
    },

    /// Fetch `AREA.getFIELD` and walk into the result
    Get {
        /// API area, e.g. `accounts`
        area: String,

        /// Field to fetch; a leading `__` keeps its casing
        field: String,

        /// Keys or array indexes to navigate into
        path: Vec<String>,
    },

    /// Validate an identity token and print its claims
    Validate {
        /// The token
        token: String,

        /// The signature uses the issuer's alphabet
        #[arg(long)]
        issuer_format: bool,
    },

    /// Mint an unsigned token shaped like the issuer's
    TestToken {
        /// Subject; random when omitted
        #[arg(long)]
        uid: Option<String>,

        /// Lifetime in seconds; negative for an expired token
        #[arg(long, allow_negative_numbers = true)]
        expires_in: Option<i64>,

        /// Write the token in the issuer's alphabet
        #[arg(long)]
        issuer_format: bool,
    },
}

/// Parse a `key=value` parameter
///
/// Only the first `=` separates; the value may contain more.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}
