//! External authorization surface.
//!
//! The surface is a foreign window: once opened, the only thing the client
//! can observe is whether it has been closed, and only when the opener
//! process stays alive for as long as the window.

use std::process::Stdio;

use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("no opener configured")]
    NoOpener,
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait AuthSurface: Send {
    fn open(&self, url: &str) -> Result<Box<dyn SurfaceHandle>, SurfaceError>;
}

pub trait SurfaceHandle: Send {
    fn is_closed(&mut self) -> bool;
}

/// Opens the URL with an external program (a browser in app mode, or the
/// platform opener).
///
/// An observed opener's exit is the window closing.  A detached opener
/// (`xdg-open`, `open`, `start`) hands the URL to a browser and exits, so its
/// windows never report closed and the flow waits for the signal.
pub struct BrowserSurface {
    opener: Vec<String>,
    detached: bool,
}

impl BrowserSurface {
    pub fn new(opener: Vec<String>) -> Self {
        Self {
            opener,
            detached: false,
        }
    }

    pub fn detached(opener: Vec<String>) -> Self {
        Self {
            opener,
            detached: true,
        }
    }
}

impl AuthSurface for BrowserSurface {
    fn open(&self, url: &str) -> Result<Box<dyn SurfaceHandle>, SurfaceError> {
        let (program, args) = self.opener.split_first().ok_or(SurfaceError::NoOpener)?;
        info!("opening authorization surface: {} {}", program, url);
        let child = tokio::process::Command::new(program)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| SurfaceError::Launch {
                program: program.clone(),
                source,
            })?;
        Ok(Box::new(BrowserWindow {
            child,
            detached: self.detached,
            seen_running: false,
        }))
    }
}

struct BrowserWindow {
    child: tokio::process::Child,
    detached: bool,
    /// A check has seen the opener still running.
    seen_running: bool,
}

impl SurfaceHandle for BrowserWindow {
    fn is_closed(&mut self) -> bool {
        // try_wait also reaps a detached opener.
        match self.child.try_wait() {
            Ok(None) => {
                self.seen_running = true;
                false
            }
            Ok(Some(_)) if self.detached => false,
            Ok(Some(status)) if status.success() && !self.seen_running => {
                // Handed the URL to an already running browser.
                info!("authorization surface detached ({}), waiting for signal", status);
                self.detached = true;
                false
            }
            Ok(Some(status)) => {
                debug!("authorization surface exited: {}", status);
                true
            }
            Err(e) => {
                warn!("authorization surface not observable: {}", e);
                !self.detached
            }
        }
    }
}
