use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use campus_core::fields::{self, FieldUsage};
use campus_core::{
    render_number, Course, DataSource, Dataset, Deadline, FilterCriteria, JsonFileSource, RecordKind, RecordMut,
    Student, StudentRequest, SummaryCounts, Task,
};
use campus_query::{ListQuery, QueryError, SummaryScope};
use campus_store::{accept_request, reject_request, toggle_task, CollectionBuilder, Edit};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campusctl", version, about = "Query the campus portal's record lists")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human, env = "CAMPUS_OUTPUT")]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in datasets
    Datasets,
    /// Show records matching every field=value criterion
    Filter {
        /// Built-in dataset name or path to a JSON array of objects
        source: String,
        /// Criterion as field=value; `all` leaves the field unconstrained
        #[arg(short = 'w', long = "where")]
        criteria: Vec<String>,
        /// Explain stage counts
        #[arg(long = "explain", action = ArgAction::SetTrue)]
        explain: bool,
    },
    /// Count records per category of one or more fields
    Summarize {
        source: String,
        /// Field to group by (repeatable)
        #[arg(short = 'b', long = "by", required = true)]
        fields: Vec<String>,
        #[arg(short = 'w', long = "where")]
        criteria: Vec<String>,
        /// Count only the records matching the criteria
        #[arg(long = "filtered", action = ArgAction::SetTrue)]
        filtered: bool,
    },
    /// Total a numeric field, optionally per category
    Sum {
        source: String,
        field: String,
        #[arg(long = "group-by")]
        group_by: Option<String>,
    },
    /// Search text fields
    Search {
        source: String,
        term: String,
        /// Field to search (repeatable); defaults to the dataset's text fields
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
        /// Rank by fuzzy match instead of substring
        #[arg(long = "fuzzy", action = ArgAction::SetTrue)]
        fuzzy: bool,
        /// Limit fuzzy results
        #[arg(long = "limit", default_value_t = 20, env = "CAMPUS_SEARCH_LIMIT")]
        limit: usize,
    },
    /// Filter options for a field: `all` followed by each distinct value
    Options { source: String, field: String },
    /// Apply edits and print the resulting snapshot
    Edit {
        source: String,
        /// Accept request ids
        #[arg(long = "accept")]
        accept: Vec<u64>,
        /// Reject request ids
        #[arg(long = "reject")]
        reject: Vec<u64>,
        /// Toggle task ids between completed and pending
        #[arg(long = "toggle")]
        toggle: Vec<u64>,
        /// Generic edit as id:field=value
        #[arg(long = "set")]
        set: Vec<String>,
    },
}

impl Commands {
    fn source(&self) -> Option<&str> {
        match self {
            Commands::Datasets => None,
            Commands::Filter { source, .. }
            | Commands::Summarize { source, .. }
            | Commands::Sum { source, .. }
            | Commands::Search { source, .. }
            | Commands::Options { source, .. }
            | Commands::Edit { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Builtin(Dataset),
    File(PathBuf),
}

impl FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<Dataset>() {
            Ok(d) => Source::Builtin(d),
            Err(_) => Source::File(PathBuf::from(s)),
        })
    }
}

fn init_tracing() {
    let env = std::env::var("CAMPUS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let Some(raw) = cli.command.source() else {
        return list_datasets(cli.output);
    };
    let source: Source = raw.parse().unwrap_or_else(|never| match never {});
    info!(source = %raw, "loading records");
    match &source {
        Source::File(path) => {
            let records = JsonFileSource::new(path)
                .load()
                .with_context(|| format!("loading records from {}", path.display()))?;
            execute(&records, None, cli.output, &cli.command)
        }
        Source::Builtin(d) => match d.kind() {
            RecordKind::Course => execute(&d.load_as::<Course>()?, Some(d.kind()), cli.output, &cli.command),
            RecordKind::Task => execute(&d.load_as::<Task>()?, Some(d.kind()), cli.output, &cli.command),
            RecordKind::Request => execute(&d.load_as::<StudentRequest>()?, Some(d.kind()), cli.output, &cli.command),
            RecordKind::Student => execute(&d.load_as::<Student>()?, Some(d.kind()), cli.output, &cli.command),
            RecordKind::Deadline => execute(&d.load_as::<Deadline>()?, Some(d.kind()), cli.output, &cli.command),
        },
    }
}

fn list_datasets(output: Output) -> Result<()> {
    match output {
        Output::Human => {
            for d in Dataset::ALL {
                println!("{} • {} • {}", d.name(), d.kind(), d.describe());
            }
        }
        Output::Json => {
            let rows: Vec<serde_json::Value> = Dataset::ALL
                .iter()
                .map(|d| serde_json::json!({ "name": d.name(), "kind": d.kind().to_string(), "about": d.describe() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// Reject field names the record kind does not have before running the engine.
/// Schema-less sources skip this and rely on the engine's defaults.
fn check(kind: Option<RecordKind>, field: &str, usage: FieldUsage) -> Result<()> {
    if let Some(kind) = kind {
        fields::check_field(kind, field, usage).map_err(QueryError::from)?;
    }
    Ok(())
}

fn parse_criteria(kind: Option<RecordKind>, raw: &[String]) -> Result<FilterCriteria> {
    let criteria = FilterCriteria::parse_pairs(raw.iter().map(String::as_str))?;
    for field in criteria.fields() {
        check(kind, field, FieldUsage::Filter)?;
    }
    Ok(criteria)
}

fn execute<R: RecordMut + Clone + Serialize>(records: &[R], kind: Option<RecordKind>, output: Output, cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::Datasets => list_datasets(output),
        Commands::Filter { criteria, explain, .. } => {
            let criteria = parse_criteria(kind, criteria)?;
            let out = ListQuery::new().criteria(criteria).run(records);
            match output {
                Output::Human => {
                    print_records(&out.items)?;
                    if *explain {
                        println!("explain: total={} after_criteria={}", out.debug.total, out.debug.after_criteria);
                    }
                }
                Output::Json if *explain => {
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "items": out.items, "explain": out.debug }))?);
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&out.items)?),
            }
            Ok(())
        }
        Commands::Summarize { fields: by, criteria, filtered, .. } => {
            for f in by {
                check(kind, f, FieldUsage::Group)?;
            }
            let criteria = parse_criteria(kind, criteria)?;
            let scope = if *filtered { SummaryScope::Filtered } else { SummaryScope::Collection };
            let out = ListQuery::new().criteria(criteria).summarize(by.iter().cloned()).scope(scope).run(records);
            match output {
                Output::Human => print_summary(&out.summary),
                Output::Json => println!("{}", serde_json::to_string_pretty(&out.summary)?),
            }
            Ok(())
        }
        Commands::Sum { field, group_by, .. } => {
            check(kind, field, FieldUsage::Sum)?;
            match group_by {
                None => {
                    let total = campus_query::sum_by(records, field)?;
                    match output {
                        Output::Human => println!("{}: {}", field, render_number(total)),
                        Output::Json => println!("{}", serde_json::json!({ "field": field, "total": total })),
                    }
                }
                Some(group) => {
                    check(kind, group, FieldUsage::Group)?;
                    let groups = campus_query::sum_by_group(records, group, field)?;
                    match output {
                        Output::Human => {
                            for (g, total) in groups.iter() {
                                println!("{} • {}", g, render_number(*total));
                            }
                            let all: f64 = groups.iter().map(|(_, t)| t).sum();
                            println!("total • {}", render_number(all));
                        }
                        Output::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
                    }
                }
            }
            Ok(())
        }
        Commands::Search { term, fields: named, fuzzy, limit, .. } => {
            let search_fields: Vec<String> = if !named.is_empty() {
                named.clone()
            } else if let Some(kind) = kind {
                fields::default_search_fields(kind).into_iter().map(str::to_string).collect()
            } else {
                bail!("--field is required when searching a JSON file");
            };
            for f in search_fields.iter() {
                check(kind, f, FieldUsage::Search)?;
            }
            let refs: Vec<&str> = search_fields.iter().map(String::as_str).collect();
            if *fuzzy {
                let hits = campus_query::fuzzy_search(records, term, &refs, *limit);
                match output {
                    Output::Human => {
                        for h in hits.iter() {
                            print!("[{}] ", h.score);
                            print_records(&[&records[h.index]])?;
                        }
                    }
                    Output::Json => {
                        let rows: Vec<serde_json::Value> = hits
                            .iter()
                            .map(|h| Ok(serde_json::json!({ "score": h.score, "record": serde_json::to_value(&records[h.index])? })))
                            .collect::<Result<_, serde_json::Error>>()?;
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                    }
                }
            } else {
                let out = ListQuery::new().search(term.as_str(), refs.iter().copied()).run(records);
                match output {
                    Output::Human => print_records(&out.items)?,
                    Output::Json => println!("{}", serde_json::to_string_pretty(&out.items)?),
                }
            }
            Ok(())
        }
        Commands::Options { field, .. } => {
            check(kind, field, FieldUsage::Group)?;
            let mut options = vec![campus_core::ALL.to_string()];
            options.extend(campus_query::distinct_values(records, field));
            match output {
                Output::Human => println!("{}", options.join(" • ")),
                Output::Json => println!("{}", serde_json::to_string_pretty(&options)?),
            }
            Ok(())
        }
        Commands::Edit { accept, reject, toggle, set, .. } => {
            let mut batch: Vec<Edit> = Vec::new();
            batch.extend(accept.iter().map(|id| accept_request(*id)));
            batch.extend(reject.iter().map(|id| reject_request(*id)));
            batch.extend(toggle.iter().map(|id| toggle_task(*id)));
            for raw in set.iter() {
                batch.push(parse_set(raw)?);
            }
            if batch.is_empty() {
                bail!("no edits given; use --accept, --reject, --toggle or --set");
            }
            let mut builder = CollectionBuilder::new(records.to_vec());
            let report = builder.apply(batch);
            if report.unknown_ids > 0 || report.rejected > 0 {
                warn!(unknown_ids = report.unknown_ids, rejected = report.rejected, "some edits were not applied");
            }
            let snap = builder.freeze();
            match output {
                Output::Human => {
                    println!(
                        "epoch {} • applied {} • unknown {} • rejected {}",
                        snap.epoch, report.applied, report.unknown_ids, report.rejected
                    );
                    let items: Vec<&R> = snap.items.iter().collect();
                    print_records(&items)?;
                }
                Output::Json => {
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "report": report, "snapshot": &*snap }))?);
                }
            }
            Ok(())
        }
    }
}

/// `id:field=value`
fn parse_set(raw: &str) -> Result<Edit> {
    let (id, rest) = raw.split_once(':').ok_or_else(|| anyhow!("malformed --set `{raw}`; expected id:field=value"))?;
    let (field, value) = rest.split_once('=').ok_or_else(|| anyhow!("malformed --set `{raw}`; expected id:field=value"))?;
    let id: u64 = id.trim().parse().with_context(|| format!("invalid record id in `{raw}`"))?;
    Ok(Edit::set(id, field.trim(), value.trim()))
}

fn print_records<R: Serialize>(items: &[&R]) -> Result<()> {
    for r in items {
        let value = serde_json::to_value(r)?;
        let line = match value.as_object() {
            Some(obj) => obj
                .iter()
                .filter(|(k, _)| k.as_str() != "description")
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => format!("{k}={s}"),
                    other => format!("{k}={other}"),
                })
                .collect::<Vec<_>>()
                .join(" • "),
            None => value.to_string(),
        };
        println!("{line}");
    }
    if items.is_empty() {
        println!("(no records)");
    }
    Ok(())
}

fn print_summary(summary: &SummaryCounts) {
    for (field, tally) in summary.iter() {
        let buckets: Vec<String> = tally.iter().map(|(v, c)| format!("{v}={c}")).collect();
        let mut line = format!("{}: {}", field, if buckets.is_empty() { "-".to_string() } else { buckets.join(" • ") });
        if tally.missing > 0 {
            line.push_str(&format!(" (missing {})", tally.missing));
        }
        println!("{line}");
    }
}
