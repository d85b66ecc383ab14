/// §4.2 session lifecycle. `HelloReceived` is transient: the handshake is a
/// single request/response, so a session never observably rests there, but
/// the state is still named because the invariant under test ("no second
/// HELLO once active") needs a value to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    HelloReceived,
    Active,
    GoodbyeReceived,
    Closed,
}
