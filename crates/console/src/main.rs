//! Interactive operator console.

use std::collections::HashSet;
use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use partnerdesk_console::{Command, ConsoleApp, ConsoleConfig, ParseError, View, execute};
use partnerdesk_core::NotificationId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsoleConfig::from_env()?;
    partnerdesk_observability::init(config.log_format);

    let app = ConsoleApp::from_config(&config)?;
    match app.start().await {
        View::Showing(route) => println!("partnerdesk console, at {route} (type 'help')"),
        View::Waiting => println!("partnerdesk console (type 'help')"),
    }

    let mut seen: HashSet<NotificationId> = HashSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}> ", app.location());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match line.parse::<Command>() {
            Ok(command) => execute(&app, command).await,
            Err(ParseError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        // Surface notifications raised by the command.
        let live = app.notifications().entries();
        for entry in live.iter().filter(|e| !seen.contains(&e.id)) {
            println!("  [{}] {}", entry.severity, entry.text);
        }
        seen = live.iter().map(|e| e.id).collect();
        println!("{}", reply.text);
        if reply.quit {
            break;
        }
    }

    app.shutdown();
    tracing::info!("console closed");
    Ok(())
}
