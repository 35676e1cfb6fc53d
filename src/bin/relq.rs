//! relq — compile REST query strings from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Compile against an entity from the schema file
//! relq compile 'select=id,department(*)&sort=-id&limit=10' --entity subjects
//!
//! # Show the generated SQL
//! relq compile 'filter=and(id.gt(3),name.like(Data%25))' -e subjects --format sql
//!
//! # See what was dropped and why
//! relq explain 'select=id,bogus&filter=eq(id,1)' -e subjects
//! ```

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use relq::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relq")]
#[command(version)]
#[command(about = "Compile REST query strings into relational query descriptors", long_about = None)]
#[command(after_help = "EXAMPLES:
    relq compile 'select=id,name&sort=-id' -e subjects
    relq compile 'filter=department.name.eq(Physics)' -e subjects -f sql
    relq explain 'select=department(id,name)&limit=abc' -e subjects")]
struct Cli {
    /// Schema file (TOML)
    #[arg(short, long, global = true, env = "RELQ_SCHEMA")]
    schema: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Sql,
    Tree,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query string into a descriptor
    Compile {
        /// Raw query string, e.g. 'select=id&sort=-id'
        query: String,

        /// Entity to compile against (optional when the schema has one entity)
        #[arg(short, long)]
        entity: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// Compile a query string and explain every part, including dropped fragments
    Explain {
        query: String,

        #[arg(short, long)]
        entity: Option<String>,
    },
    /// List the entities in the schema file
    Entities,
    /// Show the query-string syntax reference
    Syntax,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "relq=debug" } else { "relq=warn" };
    let filter = EnvFilter::try_from_env("RELQ_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Compile {
            query,
            entity,
            format,
        } => {
            let registry = load_registry(cli)?;
            let schema = select_entity(&registry, entity.as_deref())?;
            compile_query(query, schema, *format)
        }
        Commands::Explain { query, entity } => {
            let registry = load_registry(cli)?;
            let schema = select_entity(&registry, entity.as_deref())?;
            explain_query(query, schema);
            Ok(())
        }
        Commands::Entities => {
            let registry = load_registry(cli)?;
            list_entities(&registry);
            Ok(())
        }
        Commands::Syntax => {
            show_syntax();
            Ok(())
        }
    }
}

fn load_registry(cli: &Cli) -> anyhow::Result<SchemaRegistry> {
    let path = match &cli.schema {
        Some(path) => path.clone(),
        None => SchemaRegistry::default_path()
            .ok_or_else(|| anyhow!("No schema file. Use --schema or set RELQ_SCHEMA"))?,
    };
    if cli.verbose {
        eprintln!("{} {}", "Schema:".dimmed(), path.display());
    }

    let registry = SchemaRegistry::load(&path)
        .with_context(|| format!("Failed to load schema from {}", path.display()))?;
    if registry.is_empty() {
        bail!("Schema file {} declares no entities", path.display());
    }
    Ok(registry)
}

fn select_entity<'r>(
    registry: &'r SchemaRegistry,
    entity: Option<&str>,
) -> anyhow::Result<&'r SchemaDescriptor> {
    let name = match entity {
        Some(name) => name.to_string(),
        None if registry.len() == 1 => registry.names().next().unwrap_or_default().to_string(),
        None => bail!(
            "Several entities in schema; pick one with --entity ({})",
            registry.names().collect::<Vec<_>>().join(", ")
        ),
    };

    registry.get(&name).ok_or_else(|| {
        anyhow!(
            "Unknown entity '{}'. Available: {}",
            name,
            registry.names().collect::<Vec<_>>().join(", ")
        )
    })
}

fn compile_query(query: &str, schema: &SchemaDescriptor, format: OutputFormat) -> anyhow::Result<()> {
    let params = QueryParams::parse(query);
    let descriptor = compile(&params, schema);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&descriptor)?),
        OutputFormat::Sql => println!("{}", descriptor.to_select_sql(schema)),
        OutputFormat::Tree => print_descriptor(&descriptor),
    }
    Ok(())
}

fn print_descriptor(descriptor: &QueryDescriptor) {
    if descriptor.is_empty() {
        println!("{}", "(empty descriptor: no restrictions)".dimmed());
        return;
    }

    if let Some(select) = &descriptor.select {
        println!("  {}", "Select:".dimmed());
        for col in &select.columns {
            println!("    • {}", col.white());
        }
        for (name, selection) in &select.relations {
            match selection {
                RelationSelect::All => println!("    • {}{}", name.cyan(), "(*)".dimmed()),
                RelationSelect::Columns(tree) => {
                    let cols: Vec<&str> = tree.columns.iter().map(String::as_str).collect();
                    println!("    • {}({})", name.cyan(), cols.join(", ").white());
                }
            }
        }
    }

    if let Some(filter) = &descriptor.filter {
        println!("  {}", "Filter:".dimmed());
        print_condition(filter, 2);
    }

    if !descriptor.sort.is_empty() {
        println!("  {}", "Sort:".dimmed());
        for item in &descriptor.sort {
            let arrow = match item.direction {
                SortDirection::Asc => "↑",
                SortDirection::Desc => "↓",
            };
            println!("    {} {}", arrow.cyan(), item.column.to_string().white());
        }
    }

    if let Some(n) = descriptor.limit {
        println!("  {} {}", "Limit:".dimmed(), n.to_string().yellow());
    }
    if let Some(n) = descriptor.offset {
        println!("  {} {}", "Offset:".dimmed(), n.to_string().yellow());
    }

    if !descriptor.aggregates.is_empty() {
        println!("  {}", "Aggregates:".dimmed());
        for agg in &descriptor.aggregates {
            println!("    • {}", agg.to_string().white());
        }
    }
}

fn print_condition(condition: &Condition, depth: usize) {
    let indent = "  ".repeat(depth);
    match condition {
        Condition::Comparison { column, op, value } => {
            let value = match value {
                Operand::Single(v) => v.to_string(),
                Operand::List(values) => {
                    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    format!("({})", values.join(", "))
                }
            };
            println!(
                "{}{} {} {}",
                indent,
                column.to_string().white(),
                op.name().cyan(),
                value.yellow()
            );
        }
        Condition::Logical { op, children } => {
            println!("{}{}", indent, op.name().to_uppercase().cyan().bold());
            for child in children {
                print_condition(child, depth + 1);
            }
        }
    }
}

fn explain_query(query: &str, schema: &SchemaDescriptor) {
    println!("{}", "relq Query Explanation".cyan().bold());
    println!();
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!("{} {}", "Table:".dimmed(), schema.table().white());
    println!();

    let params = QueryParams::parse(query);
    for (key, value) in params.iter() {
        println!("  {} {} = {}", "param".dimmed(), key.cyan(), value.fragments().join(" & "));
    }
    println!();

    let compiled = compile_report(&params, schema);
    println!("{}", "Descriptor:".green().bold());
    print_descriptor(&compiled.descriptor);

    if !compiled.rejections.is_empty() {
        println!();
        println!("{}", "Dropped fragments:".yellow().bold());
        for rejection in &compiled.rejections {
            println!("  [{}] {}", rejection.kind().red(), rejection);
        }
    }

    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("  {}", compiled.descriptor.to_select_sql(schema).white());
}

fn list_entities(registry: &SchemaRegistry) {
    for name in registry.names() {
        let Some(schema) = registry.get(name) else {
            continue;
        };
        println!("{} {}", name.cyan().bold(), format!("({})", schema.table()).dimmed());

        let cols: Vec<&str> = schema.columns().keys().map(String::as_str).collect();
        println!("  {} {}", "columns:".dimmed(), cols.join(", "));

        for (rel_name, relation) in schema.relations() {
            let cols: Vec<&str> = relation.columns.keys().map(String::as_str).collect();
            println!(
                "  {} {} → {} [{}]",
                "relation:".dimmed(),
                rel_name.white(),
                relation.table,
                cols.join(", ")
            );
        }

        if !schema.aggregates().is_empty() {
            let aggs: Vec<String> = schema
                .aggregates()
                .iter()
                .map(|(alias, col)| format!("{} = COUNT({})", alias, col))
                .collect();
            println!("  {} {}", "aggregates:".dimmed(), aggs.join(", "));
        }
    }
}

fn show_syntax() {
    println!("{}", "relq Syntax Reference".cyan().bold());
    println!();

    let params = [
        ("select", "id,department(*)", "Projection; rel(*) = whole relation"),
        ("filter", "and(id.gt(3),name.eq(x))", "Predicate tree"),
        ("sort", "-id,name.desc", "'-' prefix or .asc/.desc suffix"),
        ("limit", "10", "Non-negative integer"),
        ("offset", "20", "Non-negative integer"),
        ("aggregate", "count", "Named COUNT aggregates"),
    ];

    println!(
        "{:10} {:28} {}",
        "Param".white().bold(),
        "Example".white().bold(),
        "Meaning".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for (param, example, meaning) in params {
        println!("{:10} {:28} {}", param.cyan().bold(), example.yellow(), meaning.dimmed());
    }

    println!();
    println!(
        "{:10} {:10} {}",
        "Operator".white().bold(),
        "SQL".white().bold(),
        "Values".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for op in Operator::ALL {
        let values = if op.takes_list() { "all listed" } else { "first only" };
        println!("{:10} {:10} {}", op.name().cyan().bold(), op.sql().white(), values.dimmed());
    }
    println!();
    println!(
        "{}",
        "Combinators: and(...), or(...). Values: true, false, null, numbers, 'quoted', bare."
            .dimmed()
    );
}
