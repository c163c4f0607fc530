//! Lock-free diagnostic counters shared between render and control contexts.
//!
//! The render path only ever increments; the control path reads a
//! [`DiagnosticsSnapshot`] whenever it likes.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::kernel::RenderReport;

#[inline]
fn add(counter: &AtomicU32, count: u32) {
    if count > 0 {
        counter.fetch_add(count, Ordering::Relaxed);
    }
}

/// Counters for non-fatal conditions observed on the render path.
#[derive(Debug, Default)]
pub struct KernelDiagnostics {
    engine_failures: AtomicU32,
    underruns: AtomicU32,
    clamped_events: AtomicU32,
    deferred_events: AtomicU32,
    dropped_messages: AtomicU32,
    rendered_quanta: AtomicU64,
}

/// Plain copy of [`KernelDiagnostics`] at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Engine commands that returned an error.
    pub engine_failures: u32,
    /// Sub-ranges rendered as silence because decode failed.
    pub underruns: u32,
    /// Events whose offsets were out of range or out of order.
    pub clamped_events: u32,
    /// Events at or beyond the quantum end, left for the host.
    pub deferred_events: u32,
    /// Malformed MIDI messages dropped by the translator.
    pub dropped_messages: u32,
    /// Render calls that completed successfully.
    pub rendered_quanta: u64,
}

impl KernelDiagnostics {
    /// Create zeroed counters.
    pub const fn new() -> Self {
        Self {
            engine_failures: AtomicU32::new(0),
            underruns: AtomicU32::new(0),
            clamped_events: AtomicU32::new(0),
            deferred_events: AtomicU32::new(0),
            dropped_messages: AtomicU32::new(0),
            rendered_quanta: AtomicU64::new(0),
        }
    }

    pub(crate) fn quantum_done(&self, report: &RenderReport) {
        add(&self.underruns, report.underruns);
        add(&self.clamped_events, report.schedule.clamped);
        add(&self.deferred_events, report.schedule.deferred);
        add(&self.dropped_messages, report.dropped_messages);
        add(&self.engine_failures, report.engine_failures);
        self.rendered_quanta.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            engine_failures: self.engine_failures.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            clamped_events: self.clamped_events.load(Ordering::Relaxed),
            deferred_events: self.deferred_events.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            rendered_quanta: self.rendered_quanta.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn clear(&self) {
        self.engine_failures.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.clamped_events.store(0, Ordering::Relaxed);
        self.deferred_events.store(0, Ordering::Relaxed);
        self.dropped_messages.store(0, Ordering::Relaxed);
        self.rendered_quanta.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::RenderMode;
    use crate::scheduler::QuantumReport;

    #[test]
    fn counters_accumulate_and_clear() {
        let diag = KernelDiagnostics::new();
        let report = RenderReport {
            frames: 64,
            mode: RenderMode::Synthesis,
            schedule: QuantumReport {
                sub_ranges: 3,
                dispatched: 2,
                deferred: 1,
                clamped: 3,
            },
            underruns: 2,
            synthesized_frames: 0,
            dropped_messages: 1,
            engine_failures: 1,
        };
        diag.quantum_done(&report);
        diag.quantum_done(&RenderReport {
            engine_failures: 1,
            ..RenderReport::default()
        });

        let snap = diag.snapshot();
        assert_eq!(snap.engine_failures, 2);
        assert_eq!(snap.dropped_messages, 1);
        assert_eq!(snap.underruns, 2);
        assert_eq!(snap.clamped_events, 3);
        assert_eq!(snap.deferred_events, 1);
        assert_eq!(snap.rendered_quanta, 2);

        diag.clear();
        assert_eq!(diag.snapshot(), DiagnosticsSnapshot::default());
    }
}
