use clap::{Parser, Subcommand};
use colored::Colorize;

use carina_core::provider::Provider;
use carina_core::resource::{Resource, Value};
use carina_core::schema::{AttributeSchema, ResourceSchema};
use carina_provider_azurerm::AzurermProvider;
use carina_provider_azurerm::data_sources;

#[derive(Parser)]
#[command(name = "carina")]
#[command(about = "Read infrastructure state through typed data sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show data source schemas
    Schema {
        /// Data source type (e.g., blueprint_definition); all when omitted
        data_source: Option<String>,
    },
    /// Validate data source inputs without calling the remote API
    Validate {
        /// Data source type (e.g., blueprint_definition)
        data_source: String,

        /// Input attribute as key=value (repeatable)
        #[arg(long = "attr", short = 'a', value_parser = parse_attr)]
        attrs: Vec<(String, String)>,
    },
    /// Read a data source and print its attributes as JSON
    Read {
        /// Data source type (e.g., blueprint_definition)
        data_source: String,

        /// Input attribute as key=value (repeatable, e.g. -a read_timeout=30s)
        #[arg(long = "attr", short = 'a', value_parser = parse_attr)]
        attrs: Vec<(String, String)>,

        /// Binding name used in messages
        #[arg(long, default_value = "this")]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema { data_source } => run_schema(data_source.as_deref()),
        Commands::Validate { data_source, attrs } => run_validate(&data_source, attrs),
        Commands::Read {
            data_source,
            attrs,
            name,
        } => run_read(&data_source, attrs, &name).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Parse a `key=value` argument
fn parse_attr(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid attribute '{}': expected key=value", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid attribute '{}': empty key", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn build_resource(data_source: &str, name: &str, attrs: Vec<(String, String)>) -> Resource {
    attrs
        .into_iter()
        .fold(Resource::data_source(data_source, name), |resource, (k, v)| {
            resource.with_attribute(k, Value::String(v))
        })
}

fn get_schema(data_source: &str) -> Result<ResourceSchema, String> {
    data_sources::get_schema(data_source)
        .ok_or_else(|| format!("Unknown data source type: {}", data_source))
}

fn validate_inputs(schema: &ResourceSchema, resource: &Resource) -> Result<(), String> {
    schema.validate(&resource.attributes).map_err(|errors| {
        errors
            .iter()
            .map(|e| format!("{}: {}", resource.id, e))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn run_schema(data_source: Option<&str>) -> Result<(), String> {
    let schemas = match data_source {
        Some(name) => vec![get_schema(name)?],
        None => data_sources::schemas(),
    };

    for schema in &schemas {
        print!("{}", render_schema(schema));
    }
    Ok(())
}

fn render_schema(schema: &ResourceSchema) -> String {
    let mut out = format!("{}\n", schema.resource_type.bold());
    if let Some(desc) = &schema.description {
        out.push_str(&format!("  {}\n", desc.dimmed()));
    }

    out.push_str(&format!("  {}\n", "Inputs:".cyan()));
    for attr in schema.inputs() {
        out.push_str(&render_attribute(attr));
    }
    out.push_str(&format!("  {}\n", "Computed:".cyan()));
    for attr in schema.computed() {
        out.push_str(&render_attribute(attr));
    }
    out
}

fn render_attribute(attr: &AttributeSchema) -> String {
    let required = if attr.required { " (required)" } else { "" };
    let mut line = format!("    {}: {}{}", attr.name, attr.attr_type, required);
    if let Some(desc) = &attr.description {
        line.push_str(&format!("  {}", desc));
    }
    line.push('\n');
    line
}

fn run_validate(data_source: &str, attrs: Vec<(String, String)>) -> Result<(), String> {
    let schema = get_schema(data_source)?;
    let resource = build_resource(data_source, "this", attrs);

    println!("{}", "Validating...".cyan());
    validate_inputs(&schema, &resource)?;
    println!(
        "{}",
        format!("✓ {} inputs validated successfully.", data_source)
            .green()
            .bold()
    );
    Ok(())
}

async fn run_read(
    data_source: &str,
    attrs: Vec<(String, String)>,
    name: &str,
) -> Result<(), String> {
    let schema = get_schema(data_source)?;
    let resource = build_resource(data_source, name, attrs);

    // Fail before building clients when the inputs are malformed
    validate_inputs(&schema, &resource)?;

    let provider = AzurermProvider::from_env().map_err(|e| e.to_string())?;
    log::debug!("Using ARM endpoint {}", provider.config().endpoint);
    let state = provider
        .read_data_source(&resource)
        .await
        .map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&state.to_json())
        .map_err(|e| format!("Failed to render state: {}", e))?;
    println!("{}", json);
    Ok(())
}
