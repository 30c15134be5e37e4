//! `query`: ad-hoc parameterized Cypher reads.

use std::process::ExitCode;

use anyhow::Result;
use biblio_core::{Properties, PropertyValue};
use clap::Args;
use colored::Colorize;

use super::Context;

#[derive(Args)]
pub struct QueryArgs {
    /// Cypher query string
    pub cypher: String,

    /// Columns to return, comma separated, as named in RETURN
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub columns: Vec<String>,

    /// Query parameter as name=value; repeatable
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, PropertyValue)>,
}

/// Integers, floats and booleans are typed; anything else is text.
fn parse_literal(raw: &str) -> PropertyValue {
    if let Ok(i) = raw.parse::<i64>() {
        return PropertyValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return PropertyValue::Float(f);
    }
    match raw {
        "true" => PropertyValue::Bool(true),
        "false" => PropertyValue::Bool(false),
        "null" => PropertyValue::Null,
        _ => PropertyValue::Text(raw.to_string()),
    }
}

fn parse_param(raw: &str) -> Result<(String, PropertyValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    Ok((name.trim().to_string(), parse_literal(value)))
}

pub async fn execute(args: QueryArgs, ctx: &Context) -> Result<ExitCode> {
    let graph = ctx.graph().await?;
    let params: Properties = args.params.into_iter().collect();
    let rows = graph.read_query(&args.cypher, &params, &args.columns).await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("{}", "No results.".dimmed());
    } else {
        for (i, row) in rows.iter().enumerate() {
            println!("{}: {}", (i + 1).to_string().dimmed(), serde_json::Value::Object(row.clone()));
        }
    }
    Ok(ExitCode::SUCCESS)
}
