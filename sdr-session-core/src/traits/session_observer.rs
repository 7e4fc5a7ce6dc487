use crate::models::error::SdrError;
use crate::models::state::SessionState;

/// Event observer for session notifications.
///
/// `on_state_changed` is called on the thread driving the session.
/// `on_stream_fault` is called on the driver's I/O thread, so it must not
/// call back into the session.
pub trait SessionObserver: Send + Sync {
    /// Called after every session state transition.
    fn on_state_changed(&self, state: &SessionState);

    /// Called once when the RX callback fails and the stream disarms.
    fn on_stream_fault(&self, error: &SdrError);
}
