use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schemascope_catalog::{
    snapshot_schema, SchemaIntrospector, SnowflakeConnection, SnowflakeIntrospector,
    TableNameOptions, ViewDefinition, ViewNameOptions,
};
use schemascope_core::{Config, Diagnostic, SchemaLocation, Severity};

/// SchemaScope - Warehouse schema introspection
#[derive(Parser)]
#[command(name = "schemascope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schemascope.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables in a schema
    Tables {
        /// Schema to inspect (default: the session's current schema)
        #[arg(short, long)]
        schema: Option<String>,

        /// Include transient tables
        #[arg(long)]
        transient: bool,

        /// List external tables only
        #[arg(long, conflicts_with = "transient")]
        external: bool,
    },

    /// List views in a schema
    Views {
        #[arg(short, long)]
        schema: Option<String>,

        /// List materialized views only
        #[arg(short, long)]
        materialized: bool,
    },

    /// Show the columns of a table
    Columns {
        table: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Show primary, foreign and unique keys of a table
    Keys {
        table: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Print the SQL definition of a view
    ViewDefinition {
        view: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Introspect a whole schema into a JSON snapshot
    Snapshot {
        #[arg(short, long)]
        schema: Option<String>,

        /// Output file for the snapshot
        #[arg(short, long, default_value = "snapshot.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Secrets may live in .env
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else if Path::new("schemascope.toml").exists() {
        Config::from_file(Path::new("schemascope.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    let introspector = connect(&config, cli.verbose)?;

    let result = match cli.command {
        Commands::Tables { schema, transient, external } => {
            let options = TableNameOptions {
                include_transient_tables: transient,
                external_tables: external,
            };
            tables_command(&introspector, schema.as_deref(), options).await
        }
        Commands::Views { schema, materialized } => {
            let options = ViewNameOptions { materialized_views: materialized };
            views_command(&introspector, schema.as_deref(), options).await
        }
        Commands::Columns { table, schema } => {
            columns_command(&introspector, schema.as_deref(), &table).await
        }
        Commands::Keys { table, schema } => {
            keys_command(&introspector, schema.as_deref(), &table).await
        }
        Commands::ViewDefinition { view, schema } => {
            view_definition_command(&introspector, schema.as_deref(), &view).await
        }
        Commands::Snapshot { schema, output } => {
            snapshot_command(&introspector, schema.as_deref(), &output, cli.verbose).await
        }
    };

    print_diagnostics(&introspector.take_diagnostics());
    result
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Build the Snowflake introspector from `[warehouse]` settings
///
/// Credentials come from `SNOWFLAKE_PASSWORD` or `SNOWFLAKE_PRIVATE_KEY_PATH`.
fn connect(config: &Config, verbose: bool) -> Result<SnowflakeIntrospector> {
    let warehouse_config = config.warehouse.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "No warehouse configuration found in schemascope.toml. \
             Add a [warehouse] section with type and connection settings."
        )
    })?;

    if !warehouse_config.warehouse_type.eq_ignore_ascii_case("snowflake") {
        return Err(anyhow::anyhow!(
            "Unsupported warehouse type '{}'. Supported: snowflake",
            warehouse_config.warehouse_type
        ));
    }

    let setting = |key: &str, env: &str| {
        warehouse_config
            .setting(key)
            .map(str::to_string)
            .or_else(|| std::env::var(env).ok())
    };

    let account = setting("account", "SNOWFLAKE_ACCOUNT")
        .ok_or_else(|| anyhow::anyhow!("Snowflake requires 'account' in warehouse settings"))?;
    let user = setting("user", "SNOWFLAKE_USER")
        .ok_or_else(|| anyhow::anyhow!("Snowflake requires 'user' in warehouse settings"))?;

    let mut builder = if let Ok(password) = std::env::var("SNOWFLAKE_PASSWORD") {
        SnowflakeConnection::with_password(&account, &user, password)
    } else if let Ok(key_path) = std::env::var("SNOWFLAKE_PRIVATE_KEY_PATH") {
        let pem = std::fs::read_to_string(&key_path)
            .with_context(|| format!("Failed to read private key from {}", key_path))?;
        SnowflakeConnection::with_key_pair(&account, &user, pem)
    } else {
        return Err(anyhow::anyhow!(
            "No Snowflake credentials. Set SNOWFLAKE_PASSWORD or SNOWFLAKE_PRIVATE_KEY_PATH."
        ));
    };

    if let Some(warehouse) = warehouse_config.setting("warehouse") {
        builder = builder.with_warehouse(warehouse);
    }
    if let Some(role) = warehouse_config.setting("role") {
        builder = builder.with_role(role);
    }
    if let Some(database) = warehouse_config.setting("database") {
        builder = builder.with_database(database);
    }
    if let Some(schema) = warehouse_config.setting("schema") {
        builder = builder.with_schema(schema);
    }

    if verbose {
        eprintln!("{} {}...", "Connecting to Snowflake account".cyan(), account);
    }

    let conn = builder.build().context("Failed to connect to Snowflake")?;
    let introspector = SnowflakeIntrospector::from_config(Arc::new(conn), config)
        .context("Invalid introspection configuration")?;

    tracing::debug!(identity = introspector.connection_identity(), "Connected");
    Ok(introspector)
}

async fn resolve(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
) -> Result<SchemaLocation> {
    introspector
        .resolve_location(schema)
        .await
        .context("Failed to resolve schema location")
}

async fn tables_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    options: TableNameOptions,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;
    let tables = introspector.table_names(&location, options).await?;

    println!("{} {}", "Tables in".bold(), location.to_string().green());
    if tables.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for table in tables {
        println!("  {}", table);
    }

    Ok(())
}

async fn views_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    options: ViewNameOptions,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;
    let views = introspector.view_names(&location, options).await?;

    let kind = if options.materialized_views { "Materialized views in" } else { "Views in" };
    println!("{} {}", kind.bold(), location.to_string().green());
    if views.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for view in views {
        println!("  {}", view);
    }

    Ok(())
}

async fn columns_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    table: &str,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;
    let columns = introspector.columns(&location, table).await?;

    println!("{} {}.{}", "Columns of".bold(), location, table.green());
    for column in &columns.columns {
        let mut flags = Vec::new();
        if column.is_primary_key {
            flags.push("PK".yellow().to_string());
        }
        if !column.nullable {
            flags.push("NOT NULL".to_string());
        }
        if let Some(identity) = &column.identity {
            flags.push(format!("IDENTITY({}, {})", identity.start, identity.increment));
        } else if let Some(default) = &column.default_value {
            flags.push(format!("DEFAULT {}", default));
        }

        println!(
            "  {:<32} {:<24} {}",
            column.name,
            column.display_type.cyan(),
            flags.join(" ")
        );
        if let Some(comment) = &column.comment {
            println!("  {:<32} {}", "", format!("-- {}", comment).dimmed());
        }
    }

    Ok(())
}

async fn keys_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    table: &str,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;
    let primary_key = introspector.pk_constraint(&location, table).await?;
    let foreign_keys = introspector.foreign_keys_for(&location, table).await?;
    let unique_constraints = introspector.unique_constraints_for(&location, table).await?;

    println!("{} {}.{}", "Keys of".bold(), location, table.green());

    println!("{}", "Primary key:".bold());
    if primary_key.constrained_columns.is_empty() {
        println!("  {}", "(none)".dimmed());
    } else {
        println!(
            "  {} ({})",
            primary_key.name.as_deref().unwrap_or("<unnamed>"),
            primary_key.constrained_columns.join(", ")
        );
    }

    println!("{}", "Foreign keys:".bold());
    if foreign_keys.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for fk in &foreign_keys {
        let referred = match &fk.referred_schema {
            Some(schema) => format!("{}.{}", schema, fk.referred_table),
            None => fk.referred_table.clone(),
        };
        println!(
            "  {} ({}) -> {} ({})",
            fk.name.as_deref().unwrap_or("<unnamed>"),
            fk.constrained_columns.join(", "),
            referred.yellow(),
            fk.referred_columns.join(", ")
        );
    }

    println!("{}", "Unique constraints:".bold());
    if unique_constraints.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for unique in &unique_constraints {
        println!(
            "  {} ({})",
            unique.name.as_deref().unwrap_or("<unnamed>"),
            unique.constrained_columns.join(", ")
        );
    }

    Ok(())
}

async fn view_definition_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    view: &str,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;

    match introspector.view_definition(&location, view).await? {
        ViewDefinition::Available(text) => println!("{}", text),
        ViewDefinition::Unavailable { reason } => {
            eprintln!("{} {}", "Definition unavailable:".yellow(), reason);
        }
    }

    Ok(())
}

async fn snapshot_command(
    introspector: &SnowflakeIntrospector,
    schema: Option<&str>,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let location = resolve(introspector, schema).await?;

    if verbose {
        eprintln!("{} {}...", "Introspecting".cyan(), location);
    }

    let snapshot = snapshot_schema(introspector, &location).await?;

    snapshot
        .save_to_file(output)
        .with_context(|| format!("Failed to write snapshot to {}", output.display()))?;

    println!("{}", "Summary:".bold());
    println!("  Tables:   {}", snapshot.summary.tables);
    println!("  Views:    {}", snapshot.summary.views);
    println!("  Columns:  {}", snapshot.summary.columns);
    if snapshot.summary.warnings > 0 {
        println!("  Warnings: {}", snapshot.summary.warnings.to_string().yellow().bold());
    } else {
        println!("  Warnings: {}", snapshot.summary.warnings.to_string().green());
    }

    // The walk drained the introspector into the report
    print_diagnostics(&snapshot.diagnostics);

    eprintln!("{} {}", "Snapshot saved to:".green(), output.display());

    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let severity = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };

        let object = diag
            .object
            .as_ref()
            .map(|object| format!(" [{}]", object))
            .unwrap_or_default();

        eprintln!("{} {}{}: {}", severity, diag.code, object, diag.message);
    }
}
