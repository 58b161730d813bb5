//! srf - validate documents against endpoint input schemas

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use serde_json::Value;
use srf_core::{transform_errors, Constraint, Field, FieldType, Schema};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "srf")]
#[command(about = "srf - Check request payloads against endpoint input schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON document against a schema
    Validate {
        /// Schema file (.json or .toml)
        #[arg(short, long)]
        schema: String,

        /// JSON document to validate, `-` for stdin
        #[arg(short, long)]
        data: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print the fields a schema declares
    Schema {
        /// Schema file (.json or .toml)
        #[arg(short, long)]
        schema: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("srf=debug,srf_core=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Validate {
            schema,
            data,
            format,
        } => validate_command(&schema, &data, format),
        Commands::Schema { schema, format } => schema_command(&schema, format),
    }
}

fn load_schema(path: &str) -> Result<Schema> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read schema: {}", path))?;

    let schema = match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Schema::from_toml(&text),
        Some("json") => Schema::from_json(&text),
        _ => bail!("Unsupported schema format: {} (expected .json or .toml)", path),
    }
    .with_context(|| format!("Failed to load schema: {}", path))?;

    tracing::debug!(path, fields = schema.fields.len(), "Loaded schema");
    Ok(schema)
}

fn load_data(path: &str) -> Result<Value> {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read data from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read data: {}", path))?
    };

    serde_json::from_str(&text).with_context(|| format!("Data is not valid JSON: {}", path))
}

fn validate_command(schema_path: &str, data_path: &str, format: Format) -> Result<ExitCode> {
    let schema = load_schema(schema_path)?;
    let data = load_data(data_path)?;

    let start = Instant::now();
    let result = schema.validate(&data);
    let elapsed = start.elapsed();
    tracing::debug!(elapsed_us = elapsed.as_micros() as u64, "Validation finished");

    match (result, format) {
        (Ok(normalized), Format::Json) => {
            println!("{}", serde_json::to_string_pretty(&normalized)?);
            Ok(ExitCode::SUCCESS)
        }
        (Err(errors), Format::Json) => {
            println!("{}", serde_json::to_string_pretty(&transform_errors(&errors))?);
            Ok(ExitCode::FAILURE)
        }
        (Ok(normalized), Format::Text) => {
            println!("{} {} is valid", "✓".green(), data_path);
            println!("\n{} Normalized", "═".blue().bold());
            println!("{}", serde_json::to_string_pretty(&normalized)?);
            println!(
                "\n{} Validated in {:.3}ms",
                "▸".blue(),
                elapsed.as_secs_f64() * 1000.0
            );
            Ok(ExitCode::SUCCESS)
        }
        (Err(errors), Format::Text) => {
            let map = transform_errors(&errors);
            println!(
                "{} {} is invalid ({} fields, {} errors)",
                "✗".red(),
                data_path,
                map.len(),
                errors.len()
            );
            for (path, messages) in map.iter() {
                println!("{} {}", "▸".blue(), path.bold());
                for message in messages {
                    println!("    {}", message);
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// One line of the schema summary
#[derive(Debug, Serialize)]
struct FieldSummary {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    constraints: Vec<String>,
}

fn summarize(schema: &Schema, prefix: &str, out: &mut Vec<FieldSummary>) {
    for field in &schema.fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };
        out.push(FieldSummary {
            path: path.clone(),
            kind: type_label(&field.kind),
            required: field.required,
            default: field.default.clone(),
            constraints: field.constraints.iter().map(constraint_label).collect(),
        });
        nested(field, &path, out);
    }
}

fn nested(field: &Field, path: &str, out: &mut Vec<FieldSummary>) {
    let mut kind = &field.kind;
    let mut path = path.to_string();
    while let FieldType::Array { items } = kind {
        path.push_str(".*");
        kind = items;
    }
    if let FieldType::Object(schema) = kind {
        summarize(schema, &path, out);
    }
}

fn type_label(kind: &FieldType) -> String {
    match kind {
        FieldType::Array { items } => format!("array<{}>", type_label(items)),
        other => other.name().to_string(),
    }
}

fn constraint_label(constraint: &Constraint) -> String {
    match constraint {
        Constraint::Min(n) => format!(">= {}", n),
        Constraint::Max(n) => format!("<= {}", n),
        Constraint::MinLength(n) => format!("length >= {}", n),
        Constraint::MaxLength(n) => format!("length <= {}", n),
        Constraint::Pattern(p) => format!("matches /{}/", p.as_str()),
        Constraint::OneOf(values) => format!(
            "one of [{}]",
            values
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn schema_command(schema_path: &str, format: Format) -> Result<ExitCode> {
    let schema = load_schema(schema_path)?;
    let mut fields = Vec::new();
    summarize(&schema, "", &mut fields);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&fields)?),
        Format::Text => {
            println!("{} Schema {}", "═".blue().bold(), schema_path);
            for field in &fields {
                let presence = if field.required {
                    "required".yellow()
                } else {
                    "optional".normal()
                };
                print!("{} {} {} {}", "▸".blue(), field.path.bold(), field.kind, presence);
                if let Some(default) = &field.default {
                    print!(" (default {})", default);
                }
                println!();
                for constraint in &field.constraints {
                    println!("    {}", constraint);
                }
            }
            println!("\n{} {} fields", "✓".green(), fields.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}
