//! Command implementations
//!
//! Each command returns what it would print so it can be driven from tests
//! with a mock transport; [`execute`] wires them to the environment.

use anyhow::{Context, bail};
use chrono::TimeDelta;
use gigya_auth::{TestTokenBuilder, TokenFormat, TrustConfig, TrustValidator};
use gigya_client::config::env;
use gigya_client::{CallOptions, Connection, ConnectionConfig, Field, HttpMethod, Params, Step};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::cli::{Cli, Commands};

/// Run a parsed command line against the environment's configuration
///
/// # Errors
///
/// Missing configuration, strict-call failures, proxy misuse and rejected
/// tokens.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let compact = cli.compact;

    match cli.command {
        Commands::Call {
            area,
            function,
            params,
            post,
            strict,
        } => {
            let connection = connect(cli.debug_connection)?;
            let method = if post { HttpMethod::Post } else { HttpMethod::Get };
            let response = call(&connection, method, &area, &function, params, strict).await?;
            print_json(&response, compact)
        }
        Commands::Get { area, field, path } => {
            let connection = connect(cli.debug_connection)?;
            let value = get(&connection, &area, &field, &path).await?;
            print_json(&value, compact)
        }
        Commands::Validate {
            token,
            issuer_format,
        } => {
            let connection = connect(cli.debug_connection)?;
            let config = TrustConfig::from_env().context("token validation is not configured")?;
            let validator = TrustValidator::new(connection, config);
            let summary = validate(&validator, &token, token_format(issuer_format)).await?;
            print_json(&summary, compact)
        }
        Commands::TestToken {
            uid,
            expires_in,
            issuer_format,
        } => {
            let api_key = std::env::var(env::API_KEY).ok();
            println!("{}", test_token(uid, api_key, expires_in, issuer_format)?);
            Ok(())
        }
    }
}

fn connect(debug_connection: bool) -> anyhow::Result<Connection> {
    let mut config = ConnectionConfig::from_env().context("connection is not configured")?;
    config.debug |= debug_connection;
    Ok(Connection::new(config)?)
}

fn token_format(issuer_format: bool) -> TokenFormat {
    if issuer_format {
        TokenFormat::Issuer
    } else {
        TokenFormat::Standard
    }
}

/// Send one remote call and return the response body
///
/// # Errors
///
/// Only in strict mode: error envelopes and transport failures.
pub async fn call(
    connection: &Connection,
    method: HttpMethod,
    area: &str,
    function: &str,
    params: Vec<(String, String)>,
    strict: bool,
) -> anyhow::Result<Value> {
    let params: Params = params
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let options = if strict {
        CallOptions::strict()
    } else {
        CallOptions::default()
    };

    let response = connection
        .call(method, area, function, params, &options)
        .await
        .with_context(|| format!("{area}.{function} failed"))?;
    if response.is_error() {
        warn!(
            error_code = response.error_code(),
            message = response.error_message().unwrap_or_default(),
            "{area}.{function} returned an error"
        );
    }
    Ok(response.into_value())
}

/// Fetch `area.get<field>` through the proxy and navigate `path`
///
/// Absent values print as `null`.
///
/// # Errors
///
/// Fails when the path runs through a scalar.
pub async fn get(
    connection: &Connection,
    area: &str,
    field: &str,
    path: &[String],
) -> anyhow::Result<Value> {
    let mut step = connection.area(area).get(Field::parse(field)).await?;

    for key in path {
        step = match step {
            Step::Cursor(cursor) => cursor.get(Field::parse(key)).await?,
            Step::Value(value) => bail!("cannot navigate into `{key}` of scalar {value}"),
            Step::Response(_) => bail!("cannot navigate into `{key}` of a setter response"),
        };
    }

    if let Step::Cursor(cursor) = &step {
        debug!(path = ?cursor.path(), "Resolved proxy path");
    }
    Ok(step.to_value().unwrap_or(Value::Null))
}

/// Validate a token and summarize the outcome
///
/// # Errors
///
/// Any rejection reported by the validator.
pub async fn validate(
    validator: &TrustValidator,
    token: &str,
    format: TokenFormat,
) -> anyhow::Result<Value> {
    let validated = validator
        .validate(token, format)
        .await
        .context("token rejected")?;

    Ok(json!({
        "verified": validated.verified,
        "algorithm": validated.algorithm,
        "keyId": validated.key_id,
        "expired": validated.claims.is_expired_at(chrono::Utc::now()),
        "claims": validated.claims.to_value(),
    }))
}

/// Mint an unsigned development token
///
/// # Errors
///
/// Token encoding failures.
pub fn test_token(
    uid: Option<String>,
    api_key: Option<String>,
    expires_in: Option<i64>,
    issuer_format: bool,
) -> anyhow::Result<String> {
    let mut builder = TestTokenBuilder::new().issuer_format(issuer_format);
    if let Some(uid) = uid {
        builder = builder.uid(uid);
    }
    if let Some(api_key) = api_key {
        builder = builder.api_key(api_key);
    }
    if let Some(seconds) = expires_in {
        builder = builder.expires_in(TimeDelta::seconds(seconds));
    }
    Ok(builder.build()?)
}

fn print_json(value: &Value, compact: bool) -> anyhow::Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}
