//! The callback surface the application hands to the manager.

use serde_json::value::RawValue;

/// Receives everything the manager has to say. All methods are invoked from
/// the manager's own task, never from raw I/O tasks, so implementations see
/// one concurrent caller and may keep simple interior state.
pub trait EventSubListener: Send + Sync {
    /// Diagnostic, free-form. Includes wire traffic summaries, one-per-run
    /// limit notices (keyed text such as `session.eventsub.limit`) and
    /// revocation reports.
    fn info(&self, text: &str);

    /// A decoded notification: the wire subscription type and the opaque
    /// `payload.event` object.
    fn event(&self, subscription_type: &str, payload: &RawValue);

    /// Connectivity changed; `summary` is a human-readable snapshot of all
    /// sessions. Only called when the summary actually differs from the one
    /// delivered before.
    fn status_changed(&self, summary: &str);
}
