//! Command-line entry point for the data capture engine.
//!
//! Deliberately thin: this crate only resolves `DATABASE_URL`/`--actor` and
//! renders results as JSON. All business logic lives behind
//! `capture_core::DataCaptureService`, which `capture-storage` implements.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use capture_core::{
    clock::SystemClock,
    model::{FieldDefinitionInput, FieldSave, SaveDefaults},
    value::{CaptureValue, DataType},
    DataCaptureService,
};
use capture_storage::PostgresGateway;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capture-cli", about = "Versioned data capture engine", version)]
struct Cli {
    /// Postgres connection string. Falls back to $DATABASE_URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Actor attributed to any write this invocation performs.
    #[arg(long, env = "CAPTURE_ACTOR")]
    actor: String,

    /// Application namespace the operation is scoped to.
    #[arg(long)]
    application: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates or updates a field definition.
    DefineField {
        #[arg(long)]
        field_name: String,
        #[arg(long, value_enum)]
        data_type: CliDataType,
        #[arg(long)]
        label: String,
        /// Marks the field inactive. An inactive field still reads back but
        /// rejects every subsequent `saveRecord` with `InactiveField`.
        #[arg(long)]
        inactive: bool,
    },
    /// Saves one or more field values within a context.
    Save(SaveArgs),
    /// Prints the current values for a context.
    Get(ContextArgs),
    /// Prints the full change history of one field within a context.
    AuditTrail {
        #[command(flatten)]
        context: ContextArgs,
        #[arg(long)]
        field_name: String,
    },
}

#[derive(Args)]
struct ContextArgs {
    /// Business key as KEY=VALUE. Repeatable.
    #[arg(long = "context", value_parser = parse_pair)]
    context: Vec<(String, String)>,
    /// Restrict the result to these field names. Defaults to every known
    /// field.
    #[arg(long)]
    field: Vec<String>,
}

#[derive(Args)]
struct SaveArgs {
    #[command(flatten)]
    context: ContextArgs,
    /// Field value as NAME[:TYPE]=VALUE, e.g. `weight:number=72.5`.
    /// TYPE defaults to `string`.
    #[arg(long = "field-value", value_parser = parse_field_value)]
    fields: Vec<(String, CaptureValue)>,
    #[arg(long)]
    reason: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliDataType {
    String,
    Number,
    Date,
    Boolean,
}

impl From<CliDataType> for DataType {
    fn from(value: CliDataType) -> Self {
        match value {
            CliDataType::String => DataType::String,
            CliDataType::Number => DataType::Number,
            CliDataType::Date => DataType::Date,
            CliDataType::Boolean => DataType::Boolean,
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_field_value(s: &str) -> Result<(String, CaptureValue), String> {
    let (name_and_type, raw_value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME[:TYPE]=VALUE, got '{s}'"))?;
    let (name, type_str) = match name_and_type.split_once(':') {
        Some((name, ty)) => (name, ty),
        None => (name_and_type, "string"),
    };
    let data_type: DataType = type_str
        .parse()
        .map_err(|_| format!("unknown type '{type_str}' for field '{name}'"))?;
    let value = match data_type {
        DataType::String => CaptureValue::String(raw_value.to_string()),
        DataType::Number => CaptureValue::Number(
            raw_value
                .parse::<BigDecimal>()
                .map_err(|e| format!("invalid number '{raw_value}': {e}"))?,
        ),
        DataType::Date => CaptureValue::Date(
            NaiveDate::parse_from_str(raw_value, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{raw_value}' (expected YYYY-MM-DD): {e}"))?,
        ),
        DataType::Boolean => CaptureValue::Boolean(match raw_value {
            "true" => true,
            "false" => false,
            other => return Err(format!("invalid boolean '{other}', expected true/false")),
        }),
    };
    Ok((name.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let pool = capture_storage::connect(&cli.database_url).await?;
    let gateway = PostgresGateway::new(pool, SystemClock);

    match cli.command {
        Command::DefineField { field_name, data_type, label, inactive } => {
            let definition = gateway
                .define_field(
                    &cli.application,
                    FieldDefinitionInput {
                        field_name,
                        data_type: data_type.into(),
                        label,
                        attributes: Vec::new(),
                        active: !inactive,
                    },
                    &cli.actor,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&format_definition(&definition))?);
        }
        Command::Save(args) => {
            let fields: Vec<FieldSave> = args
                .fields
                .into_iter()
                .map(|(field_name, value)| FieldSave {
                    field_name,
                    value,
                    reason: args.reason.clone(),
                    event_type: None,
                    signature_type: None,
                })
                .collect();
            let result = gateway
                .save_record(
                    &cli.application,
                    &args.context.context,
                    fields,
                    &cli.actor,
                    SaveDefaults { reason: args.reason, ..Default::default() },
                )
                .await?;
            println!(
                "{}",
                serde_json::json!({
                    "context_group_id": result.context_group_id,
                    "saved": result.saved.iter().map(|f| serde_json::json!({
                        "field_name": f.field_name,
                        "capture_data_id": f.capture_data_id,
                        "version_id": f.version_id,
                        "sequential_version_num": f.sequential_version_num,
                    })).collect::<Vec<_>>(),
                })
            );
        }
        Command::Get(args) => {
            let field_names = (!args.field.is_empty()).then_some(args.field);
            let record = gateway.get_record(&cli.application, &args.context, field_names).await?;
            let rendered: BTreeMap<_, _> = record
                .into_iter()
                .map(|(name, view)| (name, format_value(view.value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::AuditTrail { context, field_name } => {
            let trail = gateway
                .get_field_audit_trail(&cli.application, &context.context, &field_name)
                .await?;
            let rendered: Vec<_> = trail
                .into_iter()
                .map(|v| {
                    serde_json::json!({
                        "sequential_version_num": v.sequential_version_num,
                        "value": format_value(v.value),
                        "changed_at": v.changed_at.to_string(),
                        "actor": v.actor,
                        "change_reason": v.change_reason,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }

    Ok(())
}

fn format_value(value: Option<CaptureValue>) -> serde_json::Value {
    match value {
        None => serde_json::Value::Null,
        Some(CaptureValue::String(s)) => serde_json::Value::String(s),
        Some(CaptureValue::Boolean(b)) => serde_json::Value::Bool(b),
        Some(CaptureValue::Date(d)) => serde_json::Value::String(d.to_string()),
        Some(CaptureValue::Number(n)) => serde_json::Value::String(n.to_string()),
    }
}

fn format_definition(def: &capture_core::model::FieldDefinition) -> serde_json::Value {
    serde_json::json!({
        "id": def.id,
        "field_name": def.field_name,
        "data_type": def.data_type.to_string(),
        "label": def.label,
        "active": def.active,
    })
}
