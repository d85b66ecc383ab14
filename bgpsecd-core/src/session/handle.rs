use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::wire::Pdu;

/// Cheaply clonable reference to a session's outbound send queue. Handed to
/// the proxy map, update-cache listener sets, and the dispatcher so they can
/// deliver PDUs without touching the session's handshake state.
#[derive(Clone)]
pub struct SessionHandle {
    sender: Arc<mpsc::Sender<Pdu>>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<Pdu>) -> Self {
        SessionHandle {
            sender: Arc::new(sender),
        }
    }

    pub async fn send(&self, pdu: Pdu) -> Result<(), mpsc::error::SendError<Pdu>> {
        self.sender.send(pdu).await
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }
}

impl Eq for SessionHandle {}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("strong_count", &Arc::strong_count(&self.sender))
            .finish()
    }
}
