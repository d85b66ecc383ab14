//! Per-proxy TCP conversation state machine (§4.2).

mod handle;
mod state;

pub use handle::SessionHandle;
pub use state::SessionState;

use crate::error::{CoreError, Result};
use crate::model::ClientSlot;

/// One accepted proxy connection. Owns only the handshake/shutdown state
/// machine; the socket read loop and outbound PDU delivery live in the
/// connection handler and the send queue respectively.
#[derive(Debug)]
pub struct Session {
    slot: ClientSlot,
    proxy_id: u32,
    handle: SessionHandle,
    state: SessionState,
}

impl Session {
    pub fn new(handle: SessionHandle) -> Self {
        Session {
            slot: 0,
            proxy_id: 0,
            handle,
            state: SessionState::Accepted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn slot(&self) -> ClientSlot {
        self.slot
    }

    pub fn proxy_id(&self) -> u32 {
        self.proxy_id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// §4.2: "only in `Active` are validation, signing, and delete PDUs
    /// honored". Every handler branch other than HELLO/GOODBYE calls this
    /// first.
    pub fn require_active(&self) -> Result<()> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(CoreError::HandshakeMissing)
        }
    }

    /// Binds the slot chosen by the caller (via the proxy map) and completes
    /// the handshake. The spec names `Hello-Received` as a distinct state but
    /// documents the transition through it as atomic with the move to
    /// `Active`; both transitions happen here so the two states are never
    /// observably different to a caller.
    pub fn complete_handshake(&mut self, slot: ClientSlot, proxy_id: u32) -> Result<()> {
        match self.state {
            SessionState::Accepted => {
                self.slot = slot;
                self.proxy_id = proxy_id;
                self.state = SessionState::HelloReceived;
                self.state = SessionState::Active;
                Ok(())
            }
            SessionState::Active => Err(CoreError::UnexpectedHello),
            _ => Err(CoreError::HandshakeMissing),
        }
    }

    /// §4.2: `GOODBYE` begins orderly shutdown; the caller drains the send
    /// queue before actually closing the socket.
    pub fn begin_goodbye(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(CoreError::HandshakeMissing);
        }
        self.state = SessionState::GoodbyeReceived;
        Ok(())
    }

    pub fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> SessionHandle {
        let (tx, _rx) = mpsc::channel(1);
        SessionHandle::new(tx)
    }

    #[test]
    fn only_hello_is_legal_before_handshake() {
        let session = Session::new(handle());
        assert_eq!(session.state(), SessionState::Accepted);
        assert!(matches!(
            session.require_active(),
            Err(CoreError::HandshakeMissing)
        ));
    }

    #[test]
    fn handshake_moves_straight_to_active() {
        let mut session = Session::new(handle());
        session.complete_handshake(1, 0x0A0B0C0D).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.slot(), 1);
        assert!(session.require_active().is_ok());
    }

    #[test]
    fn second_hello_on_active_session_is_rejected() {
        let mut session = Session::new(handle());
        session.complete_handshake(1, 0x0A0B0C0D).unwrap();
        assert!(matches!(
            session.complete_handshake(1, 0x0A0B0C0D),
            Err(CoreError::UnexpectedHello)
        ));
    }

    #[test]
    fn goodbye_then_close() {
        let mut session = Session::new(handle());
        session.complete_handshake(1, 0x0A0B0C0D).unwrap();
        session.begin_goodbye().unwrap();
        assert_eq!(session.state(), SessionState::GoodbyeReceived);
        session.mark_closed();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
