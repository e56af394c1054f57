//! Pure transition function for transport events
//!
//! Each event maps to at most one [`Step`]; the manager performs the side
//! effects. Keeping this free of I/O makes the state machine testable without
//! a runtime.

use bdaybot_domain::{
    ConnectionState, DisconnectClass, DisconnectReason, Environment, LinkToken, SessionMaterial,
};

use crate::ports::TransportEvent;

/// Side effect requested by a transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Show the token to an operator and keep waiting.
    PresentLink(LinkToken),
    /// Nobody can scan the token; fail the attempt.
    RequireAuthentication(LinkToken),
    MarkReady,
    StoreCredentials(SessionMaterial),
    /// Reconnect after the reconnect delay.
    Restart { clear_session: bool },
    /// Not ready; the next caller decides what to do.
    MarkClosed(DisconnectReason),
}

/// Decide what `event` means in `state`.
///
/// Link tokens and open notifications only matter while connecting; a stray
/// one afterwards is ignored. Nothing happens while idle.
pub fn transition(
    state: ConnectionState,
    environment: Environment,
    event: TransportEvent,
) -> Option<Step> {
    if state == ConnectionState::Idle {
        return None;
    }

    match event {
        TransportEvent::CredentialsUpdated(update) => Some(Step::StoreCredentials(update)),
        TransportEvent::LinkToken(token) if state.is_connecting() => match environment {
            Environment::Interactive => Some(Step::PresentLink(token)),
            Environment::Ephemeral => Some(Step::RequireAuthentication(token)),
        },
        TransportEvent::Open if state.is_connecting() => Some(Step::MarkReady),
        TransportEvent::LinkToken(_) | TransportEvent::Open => None,
        TransportEvent::Closed(_) if state == ConnectionState::Closed => None,
        TransportEvent::Closed(reason) => match reason.classify() {
            DisconnectClass::SessionInvalidated => Some(Step::Restart { clear_session: true }),
            DisconnectClass::RestartRequired => Some(Step::Restart { clear_session: false }),
            DisconnectClass::Other => Some(Step::MarkClosed(reason)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTING: [ConnectionState; 2] =
        [ConnectionState::Initializing, ConnectionState::AwaitingLink];

    #[test]
    fn link_token_depends_on_environment() {
        let token = LinkToken::new("2@abc");
        for state in CONNECTING {
            assert_eq!(
                transition(state, Environment::Interactive, TransportEvent::LinkToken(token.clone())),
                Some(Step::PresentLink(token.clone()))
            );
            assert_eq!(
                transition(state, Environment::Ephemeral, TransportEvent::LinkToken(token.clone())),
                Some(Step::RequireAuthentication(token.clone()))
            );
        }
    }

    #[test]
    fn open_only_counts_while_connecting() {
        assert_eq!(
            transition(ConnectionState::Initializing, Environment::Interactive, TransportEvent::Open),
            Some(Step::MarkReady)
        );
        assert_eq!(
            transition(ConnectionState::Ready, Environment::Interactive, TransportEvent::Open),
            None
        );
    }

    #[test]
    fn disconnects_are_classified() {
        let closed = |code| TransportEvent::Closed(DisconnectReason::from_status(Some(code), None));
        let ready = ConnectionState::Ready;
        let env = Environment::Ephemeral;

        assert_eq!(transition(ready, env, closed(401)), Some(Step::Restart { clear_session: true }));
        assert_eq!(transition(ready, env, closed(515)), Some(Step::Restart { clear_session: false }));
        assert_eq!(
            transition(ready, env, closed(408)),
            Some(Step::MarkClosed(DisconnectReason::ConnectionLost))
        );
    }

    #[test]
    fn credentials_are_stored_in_any_live_state() {
        let update = SessionMaterial::from_files([("creds.json", b"{}".to_vec())]);
        for state in [ConnectionState::Initializing, ConnectionState::Ready, ConnectionState::Closed]
        {
            assert_eq!(
                transition(
                    state,
                    Environment::Interactive,
                    TransportEvent::CredentialsUpdated(update.clone())
                ),
                Some(Step::StoreCredentials(update.clone()))
            );
        }
    }

    #[test]
    fn idle_ignores_everything() {
        assert_eq!(
            transition(ConnectionState::Idle, Environment::Interactive, TransportEvent::Open),
            None
        );
    }
}
