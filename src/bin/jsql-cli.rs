//! jsql interactive shell
//!
//! Loads a schema over an in-memory store, optionally ingests JSON/NDJSON
//! files, then reads `;`-terminated statements from stdin.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use futures::executor::block_on;
use jsql::{Engine, EngineConfig, IngestFormat, MemoryStore, Params, SchemaConfig, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "jsql-cli", version, about = "Interactive shell for the jsql query engine")]
struct Args {
    /// Schema file (JSON)
    #[arg(short, long)]
    schema: PathBuf,

    /// Load records before the prompt, as `table=path` (.ndjson/.jsonl or .json)
    #[arg(short, long, value_name = "TABLE=PATH")]
    ingest: Vec<String>,

    /// Disable index and count shortcuts
    #[arg(long)]
    strict: bool,

    /// Run a single statement and exit
    #[arg(short = 'e', long)]
    execute: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let schema = SchemaConfig::from_file(&args.schema)
        .with_context(|| format!("loading schema {}", args.schema.display()))?;
    let config = if args.strict { EngineConfig::strict() } else { EngineConfig::default() };
    let engine = block_on(Engine::open(&schema, Arc::new(MemoryStore::new()), config))?;

    for spec in &args.ingest {
        let (table, path) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("--ingest expects TABLE=PATH, got '{}'", spec))?;
        ingest_file(&engine, table, Path::new(path))?;
    }

    let mut params = Params::new();
    if let Some(sql) = args.execute {
        return execute(&engine, &sql, &params);
    }
    interactive_mode(&engine, &schema, &mut params)
}

fn ingest_file(engine: &Engine, table: &str, path: &Path) -> Result<()> {
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("ndjson") | Some("jsonl") => IngestFormat::Ndjson,
        _ => IngestFormat::Json,
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let report = block_on(engine.ingest(BufReader::new(file), table, format))?;
    println!(
        "📥 {}: {} inserted, {} skipped ({})",
        table,
        report.inserted,
        report.skipped,
        path.display()
    );
    Ok(())
}

fn execute(engine: &Engine, sql: &str, params: &Params) -> Result<()> {
    let output = block_on(engine.query(sql, params))?;
    let rows = output.len();
    println!("{}", serde_json::to_string_pretty(&output.into_json())?);
    println!("📊 {} row(s)", rows);
    Ok(())
}

fn interactive_mode(engine: &Engine, schema: &SchemaConfig, params: &mut Params) -> Result<()> {
    println!("🚀 jsql v{}", VERSION);
    println!("📂 Schema: {} (version {})", schema.name, schema.version);
    println!("💡 Type '.help' for help, '.exit' to quit\n");

    let stdin = io::stdin();
    let mut buffer = String::new();
    let mut statement = String::new();

    loop {
        if statement.is_empty() {
            print!("jsql> ");
        } else {
            print!("   -> ");
        }
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }
        let input = buffer.trim();

        if input.starts_with('.') {
            if !statement.is_empty() {
                eprintln!("⚠️  Incomplete statement discarded");
                statement.clear();
            }
            match input {
                ".exit" | ".quit" => break,
                ".help" => print_interactive_help(),
                ".tables" => list_tables(engine),
                ".params" => {
                    for (name, value) in params.iter() {
                        println!("  ${} = {}", name, serde_json::Value::from(value.clone()));
                    }
                }
                ".schema" => {
                    for table in &schema.tables {
                        show_table_schema(schema, &table.name);
                    }
                }
                cmd if cmd.starts_with(".schema ") => show_table_schema(schema, cmd[8..].trim()),
                _ => eprintln!("❌ Unknown command: {} (try .help)", input),
            }
            continue;
        }

        if input.is_empty() {
            continue;
        }

        if statement.is_empty() && input.starts_with('$') {
            if let Err(e) = bind_param(params, input) {
                eprintln!("❌ Error: {:#}", e);
            }
            continue;
        }

        statement.push_str(input);
        statement.push(' ');
        if input.ends_with(';') {
            let sql = statement.trim().trim_end_matches(';').trim().to_string();
            statement.clear();
            if let Err(e) = execute(engine, &sql, params) {
                eprintln!("❌ Error: {:#}", e);
            }
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

/// `$name = <json>` binds a parameter for later statements
fn bind_param(params: &mut Params, input: &str) -> Result<()> {
    let (name, json) = input[1..]
        .split_once('=')
        .ok_or_else(|| anyhow!("expected $name = <json>"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter name is empty");
    }
    let value: serde_json::Value = serde_json::from_str(json.trim())
        .with_context(|| format!("parameter ${} is not valid JSON", name))?;
    params.insert(name.to_string(), Value::from(value));
    Ok(())
}

fn list_tables(engine: &Engine) {
    for table in engine.tables() {
        let cached = match table.cache() {
            Some(cache) => format!(", cached ({} rows)", cache.stats().size),
            None => String::new(),
        };
        println!("  {} (key: {}{})", table.name, table.key_field, cached);
    }
}

fn show_table_schema(schema: &SchemaConfig, name: &str) {
    let Some(table) = schema.tables.iter().find(|t| t.name == name) else {
        eprintln!("❌ Unknown table: {}", name);
        return;
    };
    println!("📋 {}", table.name);
    let generated = if table.auto_increment { " (auto increment)" } else { "" };
    println!("  {} key{}", table.key_path, generated);
    for column in &table.columns {
        let mut flags = Vec::new();
        if column.unique {
            flags.push("unique".to_string());
        }
        if !column.indexed {
            flags.push("not indexed".to_string());
        }
        if !column.default.is_null() {
            flags.push(format!("default {}", serde_json::Value::from(column.default.clone())));
        }
        if flags.is_empty() {
            println!("  {}", column.key);
        } else {
            println!("  {} [{}]", column.key, flags.join(", "));
        }
    }
}

fn print_interactive_help() {
    println!(
        r#"
Commands:
  .help              Show this help
  .exit, .quit       Leave the shell
  .tables            List tables
  .schema [table]    Show table columns
  .params            Show bound parameters
  $name = <json>     Bind a parameter

Statements end with ';':
  SELECT name, age FROM users WHERE age >= $min ORDER BY age DESC LIMIT 10;
  SELECT COUNT(*) FROM users GROUP BY city;
  $ann = {{"name": "Ann", "age": 31}}
  INSERT INTO users VALUES ($ann);
  UPDATE users SET age = 32 WHERE name = 'Ann';
  DELETE FROM users WHERE age < 18;
  RESET users;
"#
    );
}
