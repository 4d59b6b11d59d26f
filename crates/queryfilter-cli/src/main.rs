use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use queryfilter_core::{
    create_query_filter, parse_search_params_with, stringify_search_params, QsOptions,
    QueryFilterRequest, SearchDropdownOption, DEFAULT_ARRAY_LIMIT, DEFAULT_DEPTH,
    DEFAULT_PARAMETER_LIMIT,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "queryfilter")]
#[command(about="Build table query filters and encode URL search params", long_about=None)]
struct Cli {
    #[command(flatten)]
    qs: QsArgs,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct QsArgs {
    #[arg(long, global = true, env = "QUERYFILTER_DEPTH", default_value_t = DEFAULT_DEPTH)]
    depth: usize,
    #[arg(
        long,
        global = true,
        env = "QUERYFILTER_ARRAY_LIMIT",
        default_value_t = DEFAULT_ARRAY_LIMIT
    )]
    array_limit: usize,
    #[arg(
        long,
        global = true,
        env = "QUERYFILTER_PARAMETER_LIMIT",
        default_value_t = DEFAULT_PARAMETER_LIMIT
    )]
    parameter_limit: usize,
}

impl From<&QsArgs> for QsOptions {
    fn from(args: &QsArgs) -> Self {
        QsOptions {
            depth: args.depth,
            array_limit: args.array_limit,
            parameter_limit: args.parameter_limit,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the search filter for queries run against a table
    Filter {
        #[arg(long)]
        table_id: String,
        /// KEY or KEY=LABEL; repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<SearchDropdownOption>,
        #[arg(long, requires = "end", allow_negative_numbers = true)]
        start: Option<i64>,
        #[arg(long, requires = "start", allow_negative_numbers = true)]
        end: Option<i64>,
    },
    /// Decode a query string to JSON
    Parse { raw: String },
    /// Encode a JSON object as a query string
    Stringify { json: String },
}

fn parse_tag(s: &str) -> std::result::Result<SearchDropdownOption, String> {
    let (key, label) = s.split_once('=').unwrap_or((s, s));
    if key.is_empty() {
        return Err(format!("empty tag key in {s:?}"));
    }
    Ok(SearchDropdownOption::new(key, label))
}

fn run(cli: Cli) -> Result<String> {
    match cli.cmd {
        Cmd::Filter {
            table_id,
            tags,
            start,
            end,
        } => {
            let mut req = QueryFilterRequest::new(table_id);
            if !tags.is_empty() {
                req = req.with_tags(tags);
            }
            // clap rejects a lone bound
            if let (Some(start), Some(end)) = (start, end) {
                req = req.with_time_range(start, end);
            }
            debug!(table_id = %req.table_id, "building query filter");
            Ok(serde_json::to_string_pretty(&create_query_filter(&req))?)
        }
        Cmd::Parse { raw } => {
            let opts = QsOptions::from(&cli.qs);
            let params = parse_search_params_with(&raw, &opts);
            Ok(serde_json::to_string_pretty(&params)?)
        }
        Cmd::Stringify { json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("stringify expects a JSON object")?;
            Ok(stringify_search_params(&value)?)
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let out = run(Cli::parse())?;
    println!("{out}");
    Ok(())
}
