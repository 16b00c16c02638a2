//! # Session State Machine
//!
//! Drives one client through menu → connect → play → disconnect.
//!
//! ## States
//!
//! - **Initialize**: first update moves straight to the menu
//! - **Menu**: waits for a connect request
//! - **Connecting**: opens the transport. Success → Connected, failure → Menu
//! - **Connected**: playing. A disconnect request or a lost link → Disconnecting
//! - **Disconnecting**: closes the transport and tears down every replica → Menu
//!
//! Every state has `on_enter`, `on_exit`, `on_update` (returns true when the
//! state is finished) and a successor ([`SessionStateMachine::next_state`]).
//! The hooks are public so a host can inspect them, but [`SessionStateMachine::update`]
//! and [`SessionStateMachine::settle`] are the only drivers that keep them in
//! order. Side effects on input, camera and menus go through
//! [`ControlSurface`]; transport and replica work through [`SessionHost`].
//!
//! A link that drops while connected but before the server assigned an
//! avatar counts as a refused connection and is reported like a failed
//! connect.

use std::fmt;

use tether_shared::protocol::is_valid_nickname;

use crate::error::ConnectError;

/// Session states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStateKind {
    /// Process start.
    Initialize,
    /// Not connected, menu visible.
    Menu,
    /// Connection attempt in flight.
    Connecting,
    /// In game.
    Connected,
    /// Tearing the session down.
    Disconnecting,
}

impl SessionStateKind {
    /// Stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "Initialize",
            Self::Menu => "Menu",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
        }
    }
}

impl fmt::Display for SessionStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// UI and input side effects of session transitions.
pub trait ControlSurface {
    /// Stops player input from moving the avatar.
    fn lock_player_input(&mut self);
    /// Lets player input move the avatar.
    fn unlock_player_input(&mut self);
    /// Shows or hides the main menu.
    fn set_menu_visible(&mut self, visible: bool);
    /// Puts the camera back behind the local avatar.
    fn reset_camera(&mut self);
    /// Shows a user-facing error.
    fn show_error(&mut self, message: &str);
}

/// Control surface that does nothing. For headless clients.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessControls;

impl ControlSurface for HeadlessControls {
    fn lock_player_input(&mut self) {}
    fn unlock_player_input(&mut self) {}
    fn set_menu_visible(&mut self, _visible: bool) {}
    fn reset_camera(&mut self) {}
    fn show_error(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Everything the state machine needs from its owner.
pub trait SessionHost {
    /// Opens the transport.
    ///
    /// # Errors
    ///
    /// Whatever prevented the connection.
    fn open_connection(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError>;
    /// Closes the transport. Idempotent.
    fn close_connection(&mut self);
    /// True while the transport link is up.
    fn is_link_up(&self) -> bool;
    /// True once the server has told us which avatar is ours.
    fn is_avatar_assigned(&self) -> bool;
    /// Destroys every replica, local included.
    fn teardown_replicas(&mut self);
    /// UI side effects.
    fn controls(&mut self) -> &mut dyn ControlSurface;
}

/// Target address, nickname and current state of the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionSession {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Player nickname.
    pub nickname: String,
    /// Current state.
    pub state: SessionStateKind,
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            nickname: String::new(),
            state: SessionStateKind::Initialize,
        }
    }
}

/// Upper bound on transitions taken by one [`SessionStateMachine::settle`].
const MAX_SETTLE_STEPS: usize = 8;

/// Client session lifecycle.
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    session: ConnectionSession,
    connect_requested: bool,
    disconnect_requested: bool,
    connect_outcome: Option<Result<(), ConnectError>>,
    last_error: Option<ConnectError>,
    transitions: u64,
}

impl SessionStateMachine {
    /// Creates a machine in `Initialize`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionStateKind {
        self.session.state
    }

    /// Session details.
    #[must_use]
    pub const fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// Error from the most recent failed connect, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ConnectError> {
        self.last_error.as_ref()
    }

    /// Transitions taken so far.
    #[must_use]
    pub const fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Queues a connect for the next update.
    ///
    /// # Errors
    ///
    /// `Busy` outside `Initialize`/`Menu`, `InvalidNickname` for a blank or
    /// oversized nickname.
    pub fn request_connect(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError> {
        if !matches!(self.state(), SessionStateKind::Initialize | SessionStateKind::Menu) {
            return Err(ConnectError::Busy(self.state().name()));
        }
        if !is_valid_nickname(nickname) {
            return Err(ConnectError::InvalidNickname(nickname.to_string()));
        }
        self.session.host = host.to_string();
        self.session.port = port;
        self.session.nickname = nickname.to_string();
        self.connect_requested = true;
        self.last_error = None;
        Ok(())
    }

    /// Queues a disconnect for the next update. Ignored unless connected.
    pub fn request_disconnect(&mut self) {
        if self.state() == SessionStateKind::Connected {
            self.disconnect_requested = true;
        }
    }

    /// Runs the current state's update and transitions if it is finished.
    /// Returns true if a transition happened.
    pub fn update(&mut self, host: &mut dyn SessionHost) -> bool {
        if !self.on_update(host) {
            return false;
        }
        let next = self.next_state();
        self.transition_to(host, next);
        true
    }

    /// Updates until no state wants to transition.
    pub fn settle(&mut self, host: &mut dyn SessionHost) {
        for _ in 0..MAX_SETTLE_STEPS {
            if !self.update(host) {
                return;
            }
        }
    }

    fn transition_to(&mut self, host: &mut dyn SessionHost, next: SessionStateKind) {
        let previous = self.state();
        self.on_exit(host);
        self.session.state = next;
        self.transitions += 1;
        tracing::info!("Session state transition: {} -> {}", previous, next);
        self.on_enter(host);
    }

    /// Entry side effects of the current state.
    pub fn on_enter(&mut self, host: &mut dyn SessionHost) {
        match self.state() {
            SessionStateKind::Initialize => {}
            SessionStateKind::Menu => {
                let controls = host.controls();
                controls.lock_player_input();
                controls.set_menu_visible(true);
                if let Some(error) = &self.last_error {
                    controls.show_error(&error.to_string());
                }
            }
            SessionStateKind::Connecting => {
                self.connect_requested = false;
                let outcome = host.open_connection(&self.session.host, self.session.port, &self.session.nickname);
                self.connect_outcome = Some(outcome);
            }
            SessionStateKind::Connected => {
                let controls = host.controls();
                controls.unlock_player_input();
                controls.reset_camera();
            }
            SessionStateKind::Disconnecting => {
                self.disconnect_requested = false;
                host.close_connection();
                host.teardown_replicas();
            }
        }
    }

    /// Exit side effects of the current state.
    pub fn on_exit(&mut self, host: &mut dyn SessionHost) {
        match self.state() {
            SessionStateKind::Menu => host.controls().set_menu_visible(false),
            SessionStateKind::Connecting => {
                if let Some(Err(error)) = self.connect_outcome.take() {
                    tracing::warn!(
                        "Connect to {}:{} failed: {}",
                        self.session.host,
                        self.session.port,
                        error
                    );
                    self.last_error = Some(error);
                }
            }
            SessionStateKind::Connected => {
                if !self.disconnect_requested && !host.is_link_up() && !host.is_avatar_assigned() {
                    tracing::warn!(
                        "{}:{} dropped the connection before assigning an avatar",
                        self.session.host,
                        self.session.port
                    );
                    self.last_error = Some(ConnectError::Refused(
                        "server closed the connection before assigning an avatar".to_string(),
                    ));
                }
                host.controls().lock_player_input();
            }
            SessionStateKind::Initialize | SessionStateKind::Disconnecting => {}
        }
    }

    /// True when the current state is finished and should transition.
    #[must_use]
    pub fn on_update(&self, host: &dyn SessionHost) -> bool {
        match self.state() {
            SessionStateKind::Initialize => true,
            SessionStateKind::Menu => self.connect_requested,
            SessionStateKind::Connecting => self.connect_outcome.is_some(),
            SessionStateKind::Connected => self.disconnect_requested || !host.is_link_up(),
            SessionStateKind::Disconnecting => true,
        }
    }

    /// State the current one hands over to once finished.
    #[must_use]
    pub fn next_state(&self) -> SessionStateKind {
        match self.state() {
            SessionStateKind::Initialize | SessionStateKind::Disconnecting => SessionStateKind::Menu,
            SessionStateKind::Menu => SessionStateKind::Connecting,
            SessionStateKind::Connecting => {
                if matches!(self.connect_outcome, Some(Ok(()))) {
                    SessionStateKind::Connected
                } else {
                    SessionStateKind::Menu
                }
            }
            SessionStateKind::Connected => SessionStateKind::Disconnecting,
        }
    }
}
