//! Session commands - get, set, destroy, touch and purge.

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use console::Style;
use kvsession_core::{SessionData, TouchOutcome, to_epoch_seconds};
use serde_json::{Value, json};

use super::Context;

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Session id
    pub id: String,
}

/// Arguments for the set command.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Session id
    pub id: String,

    /// Session payload as a JSON object
    pub data: String,
}

/// Arguments for the destroy command.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Session id
    pub id: String,
}

/// Arguments for the touch command.
#[derive(Args, Debug)]
pub struct TouchArgs {
    /// Session id
    pub id: String,

    /// Session payload as the caller holds it (defaults to the stored one)
    pub data: Option<String>,
}

/// Arguments for the purge command.
#[derive(Args, Debug)]
pub struct PurgeArgs {}

pub async fn get(args: GetArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let session = store.get(&args.id).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    match session {
        Some(session) => {
            if ctx.verbose
                && let Some(updated) = session.updated()
            {
                let dim = Style::new().dim();
                println!(
                    "{}",
                    dim.apply_to(format!("updated {}", format_millis(updated)))
                );
            }
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        None => {
            let yellow = Style::new().yellow();
            println!("{}", yellow.apply_to(format!("No session '{}'", args.id)));
        }
    }
    Ok(())
}

pub async fn set(args: SetArgs, ctx: &Context) -> Result<()> {
    let session = parse_session(&args.data)?;
    let store = ctx.open_store()?;
    let written = store.set(&args.id, session).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&written)?);
    } else {
        let green = Style::new().green();
        println!(
            "{} {}",
            green.apply_to("Stored"),
            store.storage_key(&args.id)
        );
    }
    Ok(())
}

pub async fn destroy(args: DestroyArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    store.destroy(&args.id).await?;

    if ctx.json_output {
        println!("{}", json!({ "destroyed": args.id }));
    } else {
        println!("Destroyed {}", store.storage_key(&args.id));
    }
    Ok(())
}

pub async fn touch(args: TouchArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    let session = match args.data {
        Some(ref data) => parse_session(data)?,
        None => match store.get(&args.id).await? {
            Some(session) => session,
            None => bail!("No session '{}'", args.id),
        },
    };

    let outcome = store.touch(&args.id, &session).await?;

    if ctx.json_output {
        let value = match outcome {
            TouchOutcome::Skipped => json!({ "outcome": "skipped" }),
            TouchOutcome::Refreshed { expires, updated } => {
                json!({ "outcome": "refreshed", "expires": expires, "updated": updated })
            }
            TouchOutcome::Missing => json!({ "outcome": "missing" }),
        };
        println!("{}", value);
        return Ok(());
    }

    match outcome {
        TouchOutcome::Skipped => {
            let dim = Style::new().dim();
            println!(
                "{}",
                dim.apply_to("Skipped: touched within the touch interval")
            );
        }
        TouchOutcome::Refreshed { expires, .. } => {
            let green = Style::new().green();
            println!(
                "{} until {}",
                green.apply_to("Refreshed"),
                format_seconds(expires)
            );
        }
        TouchOutcome::Missing => {
            let yellow = Style::new().yellow();
            println!(
                "{}",
                yellow.apply_to(format!("Session '{}' no longer stored", args.id))
            );
        }
    }
    Ok(())
}

pub async fn purge(_args: PurgeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let removed = store
        .backend()
        .purge_expired(to_epoch_seconds(Utc::now()))
        .await?;

    if ctx.json_output {
        println!("{}", json!({ "purged": removed }));
    } else {
        println!("Purged {} expired session(s)", removed);
    }
    Ok(())
}

fn parse_session(data: &str) -> Result<SessionData> {
    let value: Value = serde_json::from_str(data).context("Session data is not valid JSON")?;
    if !value.is_object() {
        bail!("Session data must be a JSON object");
    }
    Ok(SessionData::from_value(value)?)
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn format_seconds(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_object() {
        let session = parse_session(r#"{"cookie":{"maxAge":1000},"user":"ada"}"#).unwrap();
        assert_eq!(session.cookie_max_age_ms(), Some(1000));
        assert_eq!(session.field("user"), Some(&json!("ada")));
    }

    #[test]
    fn test_parse_session_rejects_non_object() {
        assert!(parse_session("[1, 2]").is_err());
        assert!(parse_session("not json").is_err());
    }

    #[test]
    fn test_format_timestamps() {
        assert_eq!(format_seconds(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_millis(1_000), "1970-01-01T00:00:01+00:00");
    }
}
