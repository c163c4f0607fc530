//! Sample-accurate event scheduling within one render quantum.
//!
//! The quantum is split at every distinct event offset. Events at an offset
//! are all dispatched before the audio starting at that offset is rendered,
//! so a note-on at frame 100 sounds from frame 100 and not from the start
//! of the next quantum.
//!
//! ```text
//! events:   @0 CC   @100 note-on   @100 CC   @180 note-off
//! ranges:   [0,100) [100,180) [180,256)
//! ```
//!
//! Host contract violations never panic here. Offsets outside
//! `[0, frame_count]` are clamped, and an offset below the cursor is
//! dispatched at the cursor. Both cases are counted in [`QuantumReport`].

use crate::event::EventRecord;

/// A contiguous slice of a quantum, `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    /// First frame.
    pub start: u32,
    /// Frame count (never zero when produced by [`run_quantum`]).
    pub len: u32,
}

impl SubRange {
    /// Build a sub-range.
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// One past the last frame.
    pub const fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Receiver of the scheduler's interleaved dispatch and render steps.
pub trait QuantumHandler {
    /// Apply `event`, effective at frame `offset`.
    fn dispatch(&mut self, offset: u32, event: &EventRecord);

    /// Produce audio for `range`.
    fn render(&mut self, range: SubRange);
}

/// Bookkeeping for one [`run_quantum`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuantumReport {
    /// Render steps issued.
    pub sub_ranges: u32,
    /// Events dispatched.
    pub dispatched: u32,
    /// Events at or beyond `frame_count`, left for the next quantum.
    pub deferred: u32,
    /// Events whose offset was out of range or out of order.
    pub clamped: u32,
}

fn effective_offset(raw: i64, cursor: u32, frame_count: u32, report: &mut QuantumReport) -> u32 {
    let in_range = raw.clamp(0, i64::from(frame_count)) as u32;
    let offset = in_range.max(cursor);
    if i64::from(offset) != raw {
        report.clamped += 1;
    }
    offset
}

/// Run one quantum: dispatch events and render the sub-ranges between them.
///
/// Events must be ordered by offset; the scheduler does not sort. A quantum
/// with no events renders as one sub-range covering `[0, frame_count)`. A
/// zero-frame quantum renders nothing and dispatches nothing.
pub fn run_quantum<H: QuantumHandler + ?Sized>(
    frame_count: u32,
    events: &[EventRecord],
    handler: &mut H,
) -> QuantumReport {
    let mut report = QuantumReport::default();
    let mut cursor = 0u32;
    let mut idx = 0usize;
    // Effective offset of events[idx], computed once so it is counted once.
    let mut head: Option<u32> = None;

    while cursor < frame_count {
        while let Some(event) = events.get(idx) {
            let offset = match head {
                Some(offset) => offset,
                None => {
                    let offset = effective_offset(event.sample_offset, cursor, frame_count, &mut report);
                    head = Some(offset);
                    offset
                }
            };
            if offset > cursor {
                break;
            }
            handler.dispatch(offset, event);
            report.dispatched += 1;
            idx += 1;
            head = None;
        }

        let boundary = match head {
            Some(offset) if offset < frame_count => offset,
            _ => frame_count,
        };
        handler.render(SubRange::new(cursor, boundary - cursor));
        report.sub_ranges += 1;
        cursor = boundary;
    }

    if idx < events.len() {
        if head.is_some() {
            idx += 1;
            report.deferred += 1;
        }
        for event in &events[idx..] {
            effective_offset(event.sample_offset, frame_count, frame_count, &mut report);
            report.deferred += 1;
        }
    }

    #[cfg(feature = "tracing")]
    if report.clamped > 0 {
        tracing::debug!(
            clamped = report.clamped,
            frame_count,
            "event offsets violated quantum ordering"
        );
    }

    report
}
