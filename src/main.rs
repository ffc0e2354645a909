use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io;
use std::io::Write;

mod cli;
mod commands;
mod context;
mod resolve;

use cli::{Cli, Commands, Shell};
use context::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Only auto-load dotenv when explicitly requested or in dev builds, to
    // avoid silently operating against the wrong tenant.
    if cfg!(debug_assertions) || std::env::var_os("CONFPACK_LOAD_DOTENV").is_some() {
        dotenvy::dotenv().ok();
    }
    let cli = Cli::parse();
    let ctx = AppContext {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Auth(cmd) => commands::auth::handle(&ctx, cmd).await,
        Commands::Crawl(args) => commands::crawl::handle(&ctx, args).await,
        Commands::Export(args) => commands::export::handle(&ctx, args).await,
        Commands::Cache(cmd) => commands::cache::handle(&ctx, cmd),
        Commands::Completions(args) => generate_completions(&ctx, args),
    };

    if let Err(err) = result {
        if !ctx.quiet {
            if ctx.verbose > 0 {
                eprintln!("{err:?}");
            } else {
                eprintln!("{}", format_error_chain(&err));
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

fn format_error_chain(err: &anyhow::Error) -> String {
    let mut out = err.to_string();
    for cause in err.chain().skip(1) {
        out.push_str(": ");
        out.push_str(&cause.to_string());
    }
    out
}

fn generate_completions(ctx: &AppContext, args: cli::CompletionsArgs) -> Result<()> {
    if ctx.quiet {
        return Ok(());
    }
    let mut cmd = Cli::command();
    let shell = match args.shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::Pwsh => clap_complete::Shell::PowerShell,
    };

    // Generating straight into stdout can panic on broken pipes
    // (e.g. `confpack completions bash | head`), so buffer first.
    let mut buf: Vec<u8> = Vec::new();
    clap_complete::generate(shell, &mut cmd, "confpack", &mut buf);

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout.write_all(&buf) {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }

    Ok(())
}
