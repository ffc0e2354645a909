use anyhow::{Context, Result};
use confpack::auth::AuthMethod;
use confpack::client::ApiClient;
use confpack::config::{Config, ConfigSource};
use confpack::models::Space;
use dialoguer::{Input, Password};

use crate::cli::{AuthCommand, AuthLoginArgs};
use crate::context::{AppContext, print_line};

pub async fn handle(ctx: &AppContext, cmd: AuthCommand) -> Result<()> {
    match cmd {
        AuthCommand::Login(args) => auth_login(ctx, args).await,
        AuthCommand::Status => auth_status(ctx).await,
        AuthCommand::Logout => auth_logout(ctx),
    }
}

async fn auth_login(ctx: &AppContext, args: AuthLoginArgs) -> Result<()> {
    let domain = match args.domain {
        Some(domain) => domain,
        None => Input::new()
            .with_prompt("Confluence domain (e.g. yourcompany.atlassian.net)")
            .interact_text()?,
    };

    let auth = if let Some(token) = args.bearer {
        AuthMethod::Bearer { token }
    } else {
        let email = match args.email {
            Some(email) => email,
            None => Input::new().with_prompt("Email").interact_text()?,
        };
        let token = match args.token {
            Some(token) => token,
            None => Password::new()
                .with_prompt("API token")
                .with_confirmation("Confirm token", "Tokens do not match")
                .interact()?,
        };
        AuthMethod::Basic { email, token }
    };

    let client = ApiClient::new(domain, auth.clone(), ctx.verbose)?;
    let visible = probe_spaces(&client)
        .await
        .context("Failed to validate credentials")?;

    let config = Config {
        base_url: client.base_url().to_string(),
        auth,
    };
    let path = config.save()?;
    match visible {
        Some(space) => print_line(
            ctx,
            &format!(
                "Authenticated against {} (space {} is visible). Credentials saved to {}",
                config.base_url,
                space.key,
                path.display()
            ),
        ),
        None => print_line(
            ctx,
            &format!(
                "Authenticated against {}, but no spaces are visible to this account. \
                 Credentials saved to {}",
                config.base_url,
                path.display()
            ),
        ),
    }
    Ok(())
}

async fn auth_status(ctx: &AppContext) -> Result<()> {
    let Some((config, source)) = Config::resolve()? else {
        print_line(ctx, "Not logged in.");
        return Ok(());
    };

    let client = ApiClient::new(config.base_url, config.auth.clone(), ctx.verbose)?;
    probe_spaces(&client).await.context("Failed to validate auth")?;

    let via = match source {
        ConfigSource::Env => "environment".to_string(),
        ConfigSource::File(path) => format!("config {}", path.display()),
    };
    print_line(
        ctx,
        &format!(
            "Logged in to {} with {} auth (via {via})",
            client.base_url(),
            config.auth.description()
        ),
    );
    Ok(())
}

fn auth_logout(ctx: &AppContext) -> Result<()> {
    if Config::clear()? {
        print_line(ctx, "Logged out.");
    } else {
        print_line(ctx, "No stored credentials.");
    }
    Ok(())
}

/// Cheapest authenticated request there is: list one space. Doubles as a
/// sanity check that the account can see anything worth crawling.
async fn probe_spaces(client: &ApiClient) -> Result<Option<Space>> {
    let url = client.v2_url("/spaces?limit=1");
    let results = client.get_paginated_results(url, Some(1)).await?;
    match results.into_iter().next() {
        Some(value) => Ok(Some(
            serde_json::from_value(value).context("Unexpected response shape")?,
        )),
        None => Ok(None),
    }
}
