//! Account commands - register, login, logout, password reset

use std::env;
use std::io::{self, BufRead};

use anyhow::Result;
use colored::Colorize;
use dialoguer::Password;
use taskline_core::services::LogEvent;

use super::{get_context, record};

/// Get password from TASKLINE_PASSWORD, piped stdin, or an interactive prompt
fn get_password(prompt: &str, confirm: bool) -> Result<String> {
    if let Ok(p) = env::var("TASKLINE_PASSWORD") {
        return Ok(p);
    }

    if atty::isnt(atty::Stream::Stdin) {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut password = Password::new().with_prompt(prompt);
    if confirm {
        password = password.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(password.interact()?)
}

fn print_signed_in(email: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "signedIn": true, "email": email }));
    } else {
        println!("{} {}", "Signed in as".green(), email.bold());
    }
}

pub async fn register(email: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let password = get_password("Choose a password", true)?;

    let mut session = ctx.session();
    match session.register(email, &password).await {
        Ok(user) => {
            record(LogEvent::new("account_registered").with_command("register"));
            print_signed_in(&user.email, json);
            Ok(())
        }
        Err(e) => {
            record(
                LogEvent::new("register_failed")
                    .with_command("register")
                    .with_error(e.to_string()),
            );
            Err(e.into())
        }
    }
}

pub async fn login(email: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let password = get_password("Password", false)?;

    let mut session = ctx.session();
    match session.login(email, &password).await {
        Ok(user) => {
            record(LogEvent::new("login_succeeded").with_command("login"));
            print_signed_in(&user.email, json);
            Ok(())
        }
        Err(e) => {
            record(
                LogEvent::new("login_failed")
                    .with_command("login")
                    .with_error(e.to_string()),
            );
            Err(e.into())
        }
    }
}

pub async fn logout(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut session = ctx.session();
    let was_signed_in = session.identity().is_some();
    session.logout().await?;

    if json {
        println!("{}", serde_json::json!({ "signedIn": false }));
    } else if was_signed_in {
        println!("{}", "Signed out".green());
    } else {
        println!("{}", "Not signed in".dimmed());
    }
    Ok(())
}

pub async fn reset_password(email: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut session = ctx.session();
    session.reset_password(email).await?;

    if json {
        println!("{}", serde_json::json!({ "resetRequested": true }));
    } else {
        println!("{}", "Password reset requested".green());
        println!("{}", "Follow the instructions sent to your email address.".dimmed());
    }
    Ok(())
}

pub async fn whoami(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let session = ctx.session();
    let snapshot = session.wait_until_loaded().await;

    match (snapshot.identity, json) {
        (Some(user), true) => println!("{}", serde_json::to_string_pretty(&user)?),
        (Some(user), false) => println!("{}", user.email),
        (None, true) => println!("{}", serde_json::json!(null)),
        (None, false) => println!("{}", "Not signed in. Use 'tk login' or 'tk register'.".yellow()),
    }
    Ok(())
}
