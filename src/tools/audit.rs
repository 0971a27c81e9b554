//! Audit side channel for tool invocations.

use serde_json::Value;

/// Receives one record per tool call, before the call is processed.
///
/// Sinks are fire-and-forget: they return nothing, and a failing sink must
/// not change the outcome of the call it records.
pub trait AuditSink: Send + Sync {
    fn record(&self, run_id: i64, action: &str, payload: &Value);
}

/// Emits each invocation as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, run_id: i64, action: &str, payload: &Value) {
        tracing::info!(target: "agent4ba::audit", run_id, action, %payload, "tool invoked");
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn record(&self, _run_id: i64, _action: &str, _payload: &Value) {}
}
