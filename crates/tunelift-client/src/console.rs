//! Line-oriented console front end.
//!
//! Reads commands from stdin and prints whatever the orchestrator's views
//! change to.  Stdin is read on a plain thread so a pending read never holds
//! up runtime shutdown.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use tunelift_proto::api::Service;
use tunelift_proto::prefs::PrefsStore;

use crate::alert::{Alert, AlertKind};
use crate::auth_poller::{AuthHealth, AuthSnapshot};
use crate::core::Views;
use crate::event::{Command, Event};
use crate::migration::MigrationJob;
use crate::playlists::PlaylistView;
use crate::theme::{bold, paint, progress_bar, Palette};

const HELP: &str = "\
commands:
  connect <spotify|youtube>    authorize a service
  reauth <spotify|youtube>     force re-authorization
  refresh <spotify|youtube>    refresh the service token
  logout <spotify|youtube>     forget the service credentials
  playlists <spotify|youtube>  list playlists
  migrate <playlist id>        copy a Spotify playlist to YouTube Music
  status                       show current state
  dismiss                      hide the current message
  theme                        toggle light/dark
  help                         this text
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    Status,
    Theme,
    Help,
    Empty,
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let service = |verb: &str| -> Result<Service, String> {
        if rest.is_empty() {
            return Err(format!("usage: {} <spotify|youtube>", verb));
        }
        rest.parse::<Service>()
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "connect" => Input::Command(Command::Connect(service("connect")?)),
        "reauth" => Input::Command(Command::Reauthorize(service("reauth")?)),
        "refresh" => Input::Command(Command::RefreshToken(service("refresh")?)),
        "logout" => Input::Command(Command::Logout(service("logout")?)),
        "playlists" | "ls" => Input::Command(Command::LoadPlaylists(service("playlists")?)),
        "migrate" => {
            if rest.is_empty() {
                return Err("usage: migrate <playlist id>".to_string());
            }
            Input::Command(Command::Migrate(rest.to_string()))
        }
        "status" => Input::Status,
        "dismiss" => Input::Command(Command::DismissAlert),
        "theme" => Input::Theme,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Command(Command::Quit),
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(input)
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run(
    event_tx: mpsc::Sender<Event>,
    mut views: Views,
    mut prefs: PrefsStore,
) -> anyhow::Result<()> {
    let mut palette = Palette::for_theme(prefs.theme());
    let mut lines = spawn_stdin_reader();

    println!("{}", bold("tunelift"));
    println!("{}", paint(palette.secondary, "type 'help' for commands"));

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    debug!("console: stdin closed");
                    let _ = event_tx.send(Event::Command(Command::Quit)).await;
                    break;
                };
                match parse_line(&line) {
                    Ok(Input::Command(cmd)) => {
                        let quit = cmd == Command::Quit;
                        if event_tx.send(Event::Command(cmd)).await.is_err() || quit {
                            break;
                        }
                    }
                    Ok(Input::Status) => {
                        render_status(&palette, &views);
                        let _ = event_tx.send(Event::Command(Command::RefreshAuth)).await;
                    }
                    Ok(Input::Theme) => match prefs.toggle_theme() {
                        Ok(theme) => {
                            palette = Palette::for_theme(theme);
                            println!("{}", paint(palette.accent, &format!("theme: {:?}", theme)));
                        }
                        Err(e) => warn!("console: failed to save theme: {}", e),
                    },
                    Ok(Input::Help) => println!("{}", HELP),
                    Ok(Input::Empty) => {}
                    Err(message) => println!("{}", paint(palette.error, &message)),
                }
            }
            Ok(()) = views.auth.changed() => {
                let snapshot = *views.auth.borrow_and_update();
                render_auth(&palette, &snapshot);
            }
            Ok(()) = views.alert.changed() => {
                let alert = views.alert.borrow_and_update().clone();
                if let Some(alert) = alert {
                    render_alert(&palette, &alert);
                }
            }
            Ok(()) = views.job.changed() => {
                let job = views.job.borrow_and_update().clone();
                if let Some(job) = job {
                    render_job(&palette, &job);
                }
            }
            Ok(()) = views.playlists.changed() => {
                let all = views.playlists.borrow_and_update().clone();
                for service in Service::ALL {
                    if let Some(view) = all.get(&service) {
                        render_playlists(&palette, service, view);
                    }
                }
            }
        }
    }
    Ok(())
}

// ── rendering ─────────────────────────────────────────────────────────────────

fn render_status(palette: &Palette, views: &Views) {
    render_auth(palette, &views.auth.borrow());
    render_health(palette, &views.auth_health.borrow());
    if let Some(alert) = views.alert.borrow().as_ref() {
        render_alert(palette, alert);
    }
    if let Some(job) = views.job.borrow().as_ref() {
        render_job(palette, job);
    }
}

fn render_auth(palette: &Palette, snapshot: &AuthSnapshot) {
    let line = Service::ALL
        .iter()
        .map(|&service| {
            if snapshot.is_authorized(service) {
                paint(palette.success, &format!("{} connected", service))
            } else {
                paint(palette.secondary, &format!("{} not connected", service))
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", line);
}

fn render_health(palette: &Palette, health: &AuthHealth) {
    let Some((at, error)) = health.failing() else {
        return;
    };
    let last_ok = health
        .last_success
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{}",
        paint(
            palette.error,
            &format!(
                "status refresh failed {}x, last at {}: {} (last ok {})",
                health.failures,
                at.format("%H:%M:%S"),
                error,
                last_ok
            )
        )
    );
}

fn render_alert(palette: &Palette, alert: &Alert) {
    let color = match alert.kind {
        AlertKind::Success => palette.success,
        AlertKind::Error => palette.error,
    };
    println!("{}", paint(color, &alert.message));
}

fn render_job(palette: &Palette, job: &MigrationJob) {
    if let Some(error) = &job.error {
        println!("{}", paint(palette.error, &format!("migration failed: {}", error)));
    } else if let Some(result) = &job.result {
        println!(
            "{}",
            paint(palette.success, &format!("migration complete: {}", result))
        );
    } else {
        println!(
            "{} {}",
            paint(palette.pending, &progress_bar(job.progress, 20)),
            paint(palette.primary, &job.description)
        );
    }
}

fn render_playlists(palette: &Palette, service: Service, view: &PlaylistView) {
    if view.loading {
        println!("{}", paint(palette.secondary, &format!("loading {} playlists...", service)));
        return;
    }
    if let Some(error) = &view.error {
        println!("{}", paint(palette.error, &error.to_string()));
        return;
    }
    println!("{}", bold(&format!("{} playlists ({})", service, view.playlists.len())));
    for playlist in &view.playlists {
        println!(
            "  {}  {} {}",
            paint(palette.secondary, &playlist.id),
            paint(palette.primary, &playlist.name),
            paint(palette.secondary, &format!("({} tracks)", playlist.track_count))
        );
        if let Some(description) = &playlist.description {
            println!("      {}", paint(palette.secondary, description));
        }
    }
}
