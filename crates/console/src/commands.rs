//! Line-oriented operator commands.

use core::str::FromStr;
use std::fmt::Write as _;

use thiserror::Error;

use partnerdesk_auth::Route;
use partnerdesk_companies::{Outcome, RequestStatus};
use partnerdesk_core::{CompanyId, NotificationId};

use crate::app::{ConsoleApp, View};

pub const HELP: &str = "\
commands:
  login <email> <password>   sign in
  logout                     sign out
  whoami                     show the signed-in identity
  open <path>                navigate (/, /login, /register, /admin/requests, /dashboard)
  requests                   list onboarding requests (admin)
  approve <id> [notes]       approve a pending request (admin)
  reject <id> [notes]        reject a pending request (admin)
  toasts                     list live notifications
  dismiss <id>               close a notification
  theme [dark|color <hex>]   show or change display preferences
  help                       this text
  quit                       leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeChange {
    Show,
    ToggleDark,
    Color(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Whoami,
    Open(String),
    Requests,
    Decide {
        id: CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    },
    Toasts,
    Dismiss(NotificationId),
    Theme(ThemeChange),
    Help,
    Quit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "login" => match args.as_slice() {
                [email, password] => Ok(Command::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                }),
                _ => Err(ParseError::Usage("login <email> <password>")),
            },
            "logout" => Ok(Command::Logout),
            "whoami" => Ok(Command::Whoami),
            "open" => match args.as_slice() {
                [path] => Ok(Command::Open(path.to_string())),
                _ => Err(ParseError::Usage("open <path>")),
            },
            "requests" => Ok(Command::Requests),
            verb @ ("approve" | "reject") => {
                let outcome = if verb == "approve" {
                    Outcome::Approved
                } else {
                    Outcome::Rejected
                };
                let (id, notes) = match rest.split_once(char::is_whitespace) {
                    Some((id, notes)) => (id, Some(notes.trim().to_string())),
                    None => (rest, None),
                };
                if id.is_empty() {
                    return Err(ParseError::Usage("approve|reject <id> [notes]"));
                }
                let id = id
                    .parse::<CompanyId>()
                    .map_err(|e| ParseError::InvalidArgument(e.to_string()))?;
                Ok(Command::Decide {
                    id,
                    outcome,
                    notes: notes.filter(|n| !n.is_empty()),
                })
            }
            "toasts" => Ok(Command::Toasts),
            "dismiss" => match args.as_slice() {
                [id] => id
                    .parse::<NotificationId>()
                    .map(Command::Dismiss)
                    .map_err(|e| ParseError::InvalidArgument(e.to_string())),
                _ => Err(ParseError::Usage("dismiss <id>")),
            },
            "theme" => match args.as_slice() {
                [] => Ok(Command::Theme(ThemeChange::Show)),
                ["dark"] => Ok(Command::Theme(ThemeChange::ToggleDark)),
                ["color", hex] => Ok(Command::Theme(ThemeChange::Color(hex.to_string()))),
                _ => Err(ParseError::Usage("theme [dark|color <hex>]")),
            },
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Text printed back to the operator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

fn describe(view: View) -> String {
    match view {
        View::Waiting => "waiting for the session to resolve...".to_string(),
        View::Showing(route) => format!("now at {route}"),
    }
}

/// Run one command against the console.
pub async fn execute(app: &ConsoleApp, command: Command) -> Reply {
    match command {
        Command::Login { email, password } => match app.login(&email, &password).await {
            Ok(view) => Reply::line(describe(view)),
            Err(err) => Reply::line(format!("sign-in failed: {err}")),
        },
        Command::Logout => Reply::line(describe(app.logout().await)),
        Command::Whoami => {
            let session = app.session().state();
            match session.identity() {
                Some(identity) => Reply::line(format!(
                    "{} <{}> role={} company={}",
                    identity.name,
                    identity.email,
                    identity.role,
                    identity.company_id.as_ref().map(|c| c.as_str()).unwrap_or("-")
                )),
                None => Reply::line(match session.last_error() {
                    Some(err) => format!("signed out ({err})"),
                    None => "signed out".to_string(),
                }),
            }
        }
        Command::Open(path) => Reply::line(describe(app.open(&path))),
        Command::Requests => {
            if let Some(refused) = enter_review_queue(app) {
                return refused;
            }
            match app.refresh_requests().await {
                Ok(requests) => {
                    let mut text = String::new();
                    for request in &requests {
                        let _ = write!(
                            text,
                            "{:<4} {:<9} {}",
                            request.id().as_str(),
                            request.status().as_str(),
                            request.company().name
                        );
                        if let Some(notes) = request.admin_notes() {
                            let _ = write!(text, "  ({notes})");
                        }
                        text.push('\n');
                    }
                    let state = app.requests().state();
                    let _ = write!(
                        text,
                        "{} pending, {} approved, {} rejected",
                        state.count_by_status(RequestStatus::Pending),
                        state.count_by_status(RequestStatus::Approved),
                        state.count_by_status(RequestStatus::Rejected)
                    );
                    Reply::line(text)
                }
                Err(err) => Reply::line(format!("could not load requests: {err}")),
            }
        }
        Command::Decide { id, outcome, notes } => {
            if let Some(refused) = enter_review_queue(app) {
                return refused;
            }
            match app.decide(&id, outcome, notes).await {
                Ok(request) => Reply::line(format!("{} is now {}", request.company().name, request.status())),
                Err(err) => Reply::line(format!("could not {} {id}: {err}", outcome.verb())),
            }
        }
        Command::Toasts => {
            let entries = app.notifications().entries();
            if entries.is_empty() {
                return Reply::line("no notifications");
            }
            let text = entries
                .iter()
                .map(|e| format!("{} [{}] {}", e.id, e.severity, e.text))
                .collect::<Vec<_>>()
                .join("\n");
            Reply::line(text)
        }
        Command::Dismiss(id) => {
            if app.dismiss(id) {
                Reply::line("dismissed")
            } else {
                Reply::line("already gone")
            }
        }
        Command::Theme(change) => {
            let prefs = match change {
                ThemeChange::Show => app.theme().current(),
                ThemeChange::ToggleDark => app.theme().toggle_dark_mode().await,
                ThemeChange::Color(hex) => match app.theme().set_primary_color(&hex).await {
                    Ok(prefs) => prefs,
                    Err(err) => return Reply::line(err.to_string()),
                },
            };
            Reply::line(format!(
                "dark mode {}, primary color {}",
                if prefs.dark_mode { "on" } else { "off" },
                prefs.primary_color
            ))
        }
        Command::Help => Reply::line(HELP),
        Command::Quit => Reply {
            text: "bye".to_string(),
            quit: true,
        },
    }
}

/// Navigate to the review queue; `Some` when the gate kept us out.
fn enter_review_queue(app: &ConsoleApp) -> Option<Reply> {
    match app.open(Route::AdminRequests.path()) {
        View::Showing(Route::AdminRequests) => None,
        other => Some(Reply::line(format!("not permitted; {}", describe(other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            "login admin@demo.com password".parse::<Command>().unwrap(),
            Command::Login {
                email: "admin@demo.com".into(),
                password: "password".into()
            }
        );
        assert_eq!(
            "approve 2 looks good".parse::<Command>().unwrap(),
            Command::Decide {
                id: CompanyId::new("2"),
                outcome: Outcome::Approved,
                notes: Some("looks good".into())
            }
        );
        assert_eq!(
            "reject 3".parse::<Command>().unwrap(),
            Command::Decide {
                id: CompanyId::new("3"),
                outcome: Outcome::Rejected,
                notes: None
            }
        );
        assert_eq!(
            "theme color #ff0000".parse::<Command>().unwrap(),
            Command::Theme(ThemeChange::Color("#ff0000".into()))
        );
        assert_eq!("  QUIT ".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!("".parse::<Command>().unwrap_err(), ParseError::Empty);
        assert_eq!(
            "login only-email".parse::<Command>().unwrap_err(),
            ParseError::Usage("login <email> <password>")
        );
        assert!(matches!("fly".parse::<Command>(), Err(ParseError::Unknown(_))));
        assert!(matches!("dismiss nope".parse::<Command>(), Err(ParseError::InvalidArgument(_))));
        assert_eq!(
            "approve".parse::<Command>().unwrap_err(),
            ParseError::Usage("approve|reject <id> [notes]")
        );
    }
}
