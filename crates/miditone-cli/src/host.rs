//! Offline host loop.
//!
//! Behaves like a plugin host would: the timeline is cut into quanta of
//! `block_size` frames and each render call gets only the events that fall
//! inside it, with offsets relative to the quantum start.

use miditone_core::{
    ChannelPair, EventKind, EventRecord, RenderError, RenderQuantum, SynthEngine, SynthKernel,
};

/// Totals over a whole offline render.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    /// Render calls made.
    pub quanta: u64,
    /// Frames written per channel.
    pub frames: u64,
    /// Events handed to the kernel.
    pub events: u64,
    /// Sub-ranges replaced by silence.
    pub underruns: u64,
    /// Malformed MIDI dropped by the kernel.
    pub dropped_messages: u64,
    /// Engine commands that failed.
    pub engine_failures: u64,
}

/// Render `total_frames` of `timeline` through `kernel`.
///
/// `timeline` must be sorted by frame. With `input`, each channel gets the
/// matching input channel (zero-padded past its end) as an `InputOutput`
/// pair; otherwise outputs are `OutputOnly`.
pub fn render_offline<E: SynthEngine>(
    kernel: &mut SynthKernel<E>,
    timeline: &[(u64, EventKind)],
    total_frames: u64,
    block_size: u32,
    input: Option<&[Vec<f32>]>,
) -> Result<(Vec<Vec<f32>>, RenderSummary), RenderError> {
    let channels = kernel.config().channel_count;
    let block = block_size as usize;
    let mut output: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(total_frames as usize))
        .collect();
    let mut out_blocks = vec![vec![0.0f32; block]; channels];
    let mut in_blocks = vec![vec![0.0f32; block]; channels];
    let mut events: Vec<EventRecord> = Vec::new();
    let mut summary = RenderSummary::default();
    let mut next_event = 0;
    let mut start = 0u64;

    while start < total_frames {
        let frames = (total_frames - start).min(u64::from(block_size)) as u32;
        let end = start + u64::from(frames);

        events.clear();
        while let Some((frame, kind)) = timeline.get(next_event) {
            if *frame >= end {
                break;
            }
            events.push(EventRecord {
                sample_offset: (*frame - start) as i64,
                kind: *kind,
            });
            next_event += 1;
        }

        let n = frames as usize;
        if let Some(input) = input {
            for (ch, block) in in_blocks.iter_mut().enumerate() {
                block.fill(0.0);
                if let Some(source) = input.get(ch) {
                    let from = (start as usize).min(source.len());
                    let to = (from + n).min(source.len());
                    block[..to - from].copy_from_slice(&source[from..to]);
                }
            }
        }

        let report = {
            let mut io: Vec<ChannelPair<'_>> = match input {
                Some(_) => in_blocks
                    .iter()
                    .zip(out_blocks.iter_mut())
                    .map(|(i, o)| ChannelPair::InputOutput(&i[..n], &mut o[..n]))
                    .collect(),
                None => out_blocks
                    .iter_mut()
                    .map(|o| ChannelPair::OutputOnly(&mut o[..n]))
                    .collect(),
            };
            let quantum = RenderQuantum::new(frames, channels).at(start as i64);
            kernel.render(&quantum, &events, &mut io[..], None)?
        };

        for (dest, block) in output.iter_mut().zip(&out_blocks) {
            dest.extend_from_slice(&block[..n]);
        }

        summary.quanta += 1;
        summary.frames += u64::from(frames);
        summary.events += events.len() as u64;
        summary.underruns += u64::from(report.underruns);
        summary.dropped_messages += u64::from(report.dropped_messages);
        summary.engine_failures += u64::from(report.engine_failures);
        start = end;
    }

    tracing::debug!(
        quanta = summary.quanta,
        frames = summary.frames,
        events = summary.events,
        "offline render finished"
    );
    Ok((output, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use miditone_core::{KernelConfig, MidiMessage, NullEngine};

    fn kernel(channels: usize) -> SynthKernel<NullEngine> {
        let mut kernel = SynthKernel::new(NullEngine);
        kernel
            .allocate_render_resources(KernelConfig::with_channels(channels))
            .unwrap();
        kernel.prepare("").unwrap();
        kernel
    }

    #[test]
    fn slices_timeline_into_quanta() {
        let mut kernel = kernel(2);
        let timeline = [
            (0, EventKind::Midi(MidiMessage::note_on(0, 60, 100))),
            (300, EventKind::Midi(MidiMessage::note_off(0, 60, 0))),
            (256, EventKind::Other),
        ];
        let mut sorted = timeline.to_vec();
        sorted.sort_by_key(|(f, _)| *f);

        let (output, summary) = render_offline(&mut kernel, &sorted, 600, 256, None).unwrap();
        assert_eq!(summary.quanta, 3);
        assert_eq!(summary.frames, 600);
        assert_eq!(summary.events, 3);
        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|ch| ch.len() == 600));
        assert_eq!(kernel.diagnostics().snapshot().rendered_quanta, 3);
    }

    #[test]
    fn bypass_copies_input_with_zero_padding() {
        let mut kernel = kernel(1);
        kernel.parameters().set_bypassed(true);
        let input = vec![vec![0.5f32; 100]];
        let (output, _) = render_offline(&mut kernel, &[], 150, 64, Some(&input)).unwrap();
        assert!(output[0][..100].iter().all(|&s| s == 0.5));
        assert!(output[0][100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn zero_length_render_makes_no_calls() {
        let mut kernel = kernel(2);
        let (output, summary) = render_offline(&mut kernel, &[], 0, 256, None).unwrap();
        assert_eq!(summary.quanta, 0);
        assert!(output.iter().all(Vec::is_empty));
    }
}
