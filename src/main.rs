#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # notas
//!
//! Serves the grade consultation site and sends assignment feedback.
//!
//! Configuration is read from the environment (or a `.env` file), see
//! [`notas::Config::from_env`].

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use notas::{
    App, Config,
    batch::{self, OutcomeRow},
    web,
};
use tabled::Table;
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Run the web front end
    Serve(SocketAddr),
    /// Notify every pending group of an assignment
    Notify(String),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the listen address
    fn a() -> impl Parser<SocketAddr> {
        long("addr")
            .help("Address to listen on")
            .argument::<SocketAddr>("ADDR")
            .fallback(SocketAddr::from(([127, 0, 0, 1], 5000)))
            .display_fallback()
    }

    /// parses the assignment name
    fn n() -> impl Parser<String> {
        positional("ASSIGNMENT").help("Assignment whose groups should be notified")
    }

    let serve = construct!(Cmd::Serve(a()))
        .to_options()
        .command("serve")
        .help("Serve the grade consultation site");

    let notify = construct!(Cmd::Notify(n()))
        .to_options()
        .command("notify")
        .help("E-mail feedback to every group not yet notified");

    let cmd = construct!([serve, notify]);

    cmd.to_options()
        .descr("Grade consultation and feedback notifications")
        .run()
}

/// Runs a batch from the terminal and prints a summary table.
fn notify(app: &App, assignment: &str) -> Result<()> {
    let mut rows = Vec::new();
    let summary = batch::notify_assignment(
        &app.groups,
        &app.notifier,
        &app.config.course,
        assignment,
        |outcome| {
            if outcome.sent {
                tracing::info!("Group {} notified ({})", outcome.group, outcome.emails.join(", "));
            }
            rows.push(OutcomeRow::from(outcome));
        },
    )
    .with_context(|| format!("Could not notify groups for `{assignment}`"))?;

    println!("{}", Table::new(rows));
    println!("{summary}");
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();
    let config = Config::from_env()?;
    // Blocking clients are built and dropped outside the runtime.
    let app = Arc::new(App::from_config(config)?);

    match cmd {
        Cmd::Serve(addr) => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(web::serve(Arc::clone(&app), addr))?;
        }
        Cmd::Notify(assignment) => notify(&app, &assignment)?,
    };

    Ok(())
}
