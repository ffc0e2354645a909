use anyhow::Result;
use confpack::client::ApiClient;
use confpack::config::Config;

#[derive(Debug, Clone, Copy)]
pub struct AppContext {
    pub quiet: bool,
    pub verbose: u8,
}

pub fn load_client(ctx: &AppContext) -> Result<ApiClient> {
    let Some((config, _)) = Config::resolve()? else {
        return Err(anyhow::anyhow!("Not logged in. Run confpack auth login"));
    };
    ApiClient::new(config.base_url, config.auth, ctx.verbose)
}

pub fn print_line(ctx: &AppContext, message: &str) {
    if !ctx.quiet {
        println!("{message}");
    }
}
