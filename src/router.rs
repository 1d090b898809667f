//! Navigation side effects.
//!
//! The session layer never draws screens; it emits navigation commands over a
//! channel the UI shell consumes. `Router::replace` is idempotent so repeated
//! state notifications (a second 401, say) do not re-trigger a transition
//! animation. The binder task is pure reaction: state in, route command out.

use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::session::SessionState;

/// Screens the session layer can command navigation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Splash,
    Login,
    Register,
    Library,
}

pub struct Router {
    current: Mutex<Route>,
    commands: mpsc::UnboundedSender<Route>,
}

impl Router {
    /// The receiver is the UI shell's end: it performs the actual screen
    /// transitions. The initial route is the splash screen.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                current: Mutex::new(Route::Splash),
                commands: tx,
            },
            rx,
        )
    }

    /// Command navigation to `route`. Re-issuing the current route is a no-op.
    pub fn replace(&self, route: Route) {
        let mut current = self.current.lock().expect("router lock poisoned");
        if *current == route {
            return;
        }
        debug!(from = ?*current, to = ?route, "navigating");
        *current = route;
        if self.commands.send(route).is_err() {
            warn!("navigation command dropped, UI receiver is gone");
        }
    }

    pub fn current(&self) -> Route {
        *self.current.lock().expect("router lock poisoned")
    }
}

/// Translate session state transitions into navigation commands:
/// `Authenticated` lands on the library, `Unauthenticated` on the login
/// screen. `Loading` keeps whatever is showing (the splash screen at start).
pub fn spawn_navigation_binder(
    mut states: watch::Receiver<SessionState>,
    router: Arc<Router>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let state = *states.borrow_and_update();
            match state {
                SessionState::Authenticated => router.replace(Route::Library),
                SessionState::Unauthenticated => router.replace(Route::Login),
                SessionState::Loading => {}
            }
            if states.changed().await.is_err() {
                break;
            }
        }
    })
}
