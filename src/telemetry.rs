//! Injectable diagnostics sink.
//!
//! Warnings produced while validating and repairing malformed geometry are
//! routed through a [`DiagnosticSink`] so hosts can collect them per
//! operation. Absence of a sink never changes control flow, it only
//! suppresses the messages.

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Receiver for diagnostics emitted during validation, repair and CSG.
///
/// `origin` names the emitting function, `entity` is an optional mesh or
/// face index the message refers to.
pub trait DiagnosticSink {
    fn report(&self, severity: Severity, origin: &str, entity: Option<usize>, message: &str);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _severity: Severity, _origin: &str, _entity: Option<usize>, _message: &str) {}
}

/// Default sink forwarding to the `tracing` subscriber of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, severity: Severity, origin: &str, entity: Option<usize>, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(origin, ?entity, "{message}"),
            Severity::Info => tracing::info!(origin, ?entity, "{message}"),
            Severity::Warning => tracing::warn!(origin, ?entity, "{message}"),
            Severity::Error => tracing::error!(origin, ?entity, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_is_silent() {
        let sink = NullSink;
        sink.report(Severity::Error, "test", Some(3), "nothing happens");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Debug < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
