use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use roadview::{
    models::{Bias, DomainPolicy, SourceType, parse_published_at},
    search::{SearchFilters, SearchRequest, SortMode},
};

#[derive(Debug, Parser)]
#[command(
    name = "roadview",
    about = "Index documents and rank them by TF-IDF, with per-domain policies"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage domain records and their policies
    Domain {
        #[command(subcommand)]
        action: DomainAction,
    },
    /// Index a JSON batch of documents from a file, or stdin with "-"
    Index(IndexArgs),
    /// Search indexed documents
    Search(SearchArgs),
    /// Show corpus statistics
    Status(StatusArgs),
    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Domain subcommands --

#[derive(Debug, Subcommand)]
pub enum DomainAction {
    /// Create or update a domain; omitted fields keep their current value
    Upsert {
        /// Domain name (host), case-insensitive
        name: String,
        /// index, noindex or block
        #[arg(short, long)]
        policy: Option<DomainPolicy>,
        /// Default bias inherited by documents: left, center, right, na
        #[arg(long)]
        bias: Option<Bias>,
        /// Credibility score copied onto documents (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        base_cred: Option<u8>,
        /// Human-readable name
        #[arg(long)]
        display_name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all registered domains
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one domain record
    Show {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Config subcommands --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting (default_page_size, max_page_size, snippet_chars)
    Set { key: String, value: String },
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// JSON file holding `{"docs": [...]}` or a bare array; "-" reads stdin
    pub path: PathBuf,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Only documents with this bias
    #[arg(long)]
    pub bias: Option<Bias>,

    /// Only documents of this source type
    #[arg(short = 's', long)]
    pub source_type: Option<SourceType>,

    /// Only documents from this domain
    #[arg(short = 'd', long)]
    pub domain: Option<String>,

    /// Minimum credibility score
    #[arg(long)]
    pub min_cred: Option<u8>,

    /// Earliest publication date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<DateTime<Utc>>,

    /// Latest publication date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<DateTime<Utc>>,

    /// relevance, recency, credibility or domain
    #[arg(long, default_value = "relevance")]
    pub sort: SortMode,

    /// Page number, starting at 1
    #[arg(short = 'p', long)]
    pub page: Option<usize>,

    /// Results per page
    #[arg(short = 'n', long)]
    pub page_size: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            filters: SearchFilters {
                bias: self.bias,
                source_type: self.source_type,
                domain: self.domain.clone(),
                min_cred: self.min_cred,
                from: self.from,
                to: self.to,
            },
            sort: self.sort,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    parse_published_at(value)
        .ok_or_else(|| format!("unrecognized date: {value}"))
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "roadview",
            &mut std::io::stdout(),
        );
    }
}
