use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use confpack::exporter::BreadcrumbKind;
use confpack::models::RootKind;
use confpack::output::OutputFormat;
use confpack::page::PageField;

#[derive(Parser, Debug)]
#[command(
    name = "confpack",
    version,
    about = "Crawl Confluence space hierarchies and export them as XML document packs",
    after_help = "EXAMPLES:\n  confpack auth login --domain yourcompany.atlassian.net --email you@example.com --token <token>\n  confpack crawl DOCS --tree\n  confpack export DOCS --dest ./pack --all-in-one\n  confpack export DOCS --dest ./pack --include 'https://yourcompany.atlassian.net/wiki/spaces/DOCS/pages/123456/Guides/**'\n"
)]
pub struct Cli {
    #[arg(
        short = 'q',
        long,
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v, -vv)")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(subcommand, about = "Manage authentication")]
    Auth(AuthCommand),
    #[command(about = "Crawl a space or subtree and list its hierarchy")]
    Crawl(CrawlArgs),
    #[command(about = "Crawl, filter, and export a space to XML documents")]
    Export(ExportArgs),
    #[command(subcommand, about = "Inspect or clear the crawl cache")]
    Cache(CacheCommand),
    #[command(about = "Generate shell completions")]
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

#[derive(ValueEnum, Debug, Clone)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    Pwsh,
}

// --- Auth ---

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    #[command(about = "Log in and store credentials")]
    Login(AuthLoginArgs),
    #[command(about = "Show current authentication status")]
    Status,
    #[command(about = "Clear stored credentials")]
    Logout,
}

#[derive(Args, Debug)]
pub struct AuthLoginArgs {
    #[arg(
        long,
        env = "CONFLUENCE_DOMAIN",
        help = "Confluence domain (e.g. yourcompany.atlassian.net)"
    )]
    pub domain: Option<String>,
    #[arg(long, env = "CONFLUENCE_EMAIL", help = "Email address for basic auth")]
    pub email: Option<String>,
    #[arg(
        long,
        env = "CONFLUENCE_TOKEN",
        hide_env_values = true,
        help = "API token for basic auth"
    )]
    pub token: Option<String>,
    #[arg(
        long,
        env = "CONFLUENCE_BEARER_TOKEN",
        hide_env_values = true,
        help = "Bearer token for OAuth"
    )]
    pub bearer: Option<String>,
}

// --- Crawl ---

#[derive(Args, Debug)]
pub struct CrawlArgs {
    #[arg(help = "Space key or id, page/folder URL, or content id to crawl from")]
    pub target: String,
    #[arg(
        long,
        value_enum,
        default_value_t = RootKind::Page,
        help = "Endpoint to use when the target is a bare content id"
    )]
    pub root_kind: RootKind,
    #[arg(long, help = "Render an indented tree instead of a table")]
    pub tree: bool,
    #[arg(short = 'o', long, default_value_t = OutputFormat::Table, help = "Output format: json or table")]
    pub output: OutputFormat,
    #[arg(short = 'n', long, help = "Cap nodes fetched per crawl request")]
    pub limit: Option<usize>,
    #[command(flatten)]
    pub cache: CacheArgs,
}

// --- Export ---

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(help = "Space key or id to export")]
    pub space: String,
    #[arg(long, help = "Output directory")]
    pub dest: PathBuf,
    #[arg(
        long,
        help = "Only export content matching this pattern (page/folder URL or id, optionally suffixed with /* or /**); repeatable"
    )]
    pub include: Vec<String>,
    #[arg(
        long,
        help = "Exclude content matching this pattern; overrides --include; repeatable"
    )]
    pub exclude: Vec<String>,
    #[arg(
        long,
        value_enum,
        default_value_t = BreadcrumbKind::Title,
        help = "Name files by title path or id path"
    )]
    pub breadcrumb: BreadcrumbKind,
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        help = "Restrict document fields (source-type, confluence-url, title, markdown-content)"
    )]
    pub fields: Option<Vec<PageField>>,
    #[arg(long, help = "Also write all_in_one.txt concatenating every document")]
    pub all_in_one: bool,
    #[arg(
        long,
        default_value = "4",
        help = "Concurrent body-fetch requests"
    )]
    pub concurrency: usize,
    #[arg(
        long,
        help = "Fail the export when a page body cannot be converted to markdown"
    )]
    pub strict_markdown: bool,
    #[command(flatten)]
    pub cache: CacheArgs,
}

// --- Cache ---

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[arg(long, help = "Cache crawl results in this directory")]
    pub cache_dir: Option<PathBuf>,
    #[arg(
        long,
        default_value = "900",
        help = "Cache TTL in seconds (0 = never expire)"
    )]
    pub expire: u64,
    #[arg(long, help = "Ignore cached crawl results but still refresh them")]
    pub force_refresh: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    #[command(about = "List cache entries")]
    List(CacheListArgs),
    #[command(about = "Delete all cache entries")]
    Clear(CacheClearArgs),
}

#[derive(Args, Debug)]
pub struct CacheListArgs {
    #[arg(long, help = "Cache directory")]
    pub cache_dir: PathBuf,
    #[arg(short = 'o', long, default_value_t = OutputFormat::Table, help = "Output format: json or table")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CacheClearArgs {
    #[arg(long, help = "Cache directory")]
    pub cache_dir: PathBuf,
}
