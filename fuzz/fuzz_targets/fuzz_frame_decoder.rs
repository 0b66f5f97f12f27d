//! Fuzz target: `FrameAssembler::drain_frames`
//!
//! Feeds arbitrary bytes into the receive assembler, first whole and then
//! split at a fuzzer-chosen point, and asserts that it never panics,
//! never hands out a frame larger than the input and sees the same
//! frames both ways.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use core::ops::ControlFlow;

use apilink::api::assembler::{DrainOutcome, FrameAssembler};
use libfuzzer_sys::fuzz_target;

const LIMIT: usize = 4096;

fn drain(asm: &mut FrameAssembler, seen: &mut Vec<(u32, Vec<u8>)>) -> DrainOutcome {
    asm.drain_frames(|frame| {
        seen.push((frame.msg_type, frame.payload.to_vec()));
        ControlFlow::Continue(())
    })
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };

    let mut whole = FrameAssembler::new(0, LIMIT);
    let mut expected = Vec::new();
    whole.extend(data);
    let outcome = drain(&mut whole, &mut expected);
    let total: usize = expected.iter().map(|(_, p)| p.len()).sum();
    assert!(total <= data.len(), "frames exceed input");

    // Overflow depends on how much was buffered at once; only compare
    // runs that ended cleanly or on bad framing.
    if matches!(outcome, DrainOutcome::Overflow(_)) {
        return;
    }

    let at = usize::from(split) % (data.len() + 1);
    let mut parts = FrameAssembler::new(0, LIMIT);
    let mut seen = Vec::new();
    parts.extend(&data[..at]);
    let first = drain(&mut parts, &mut seen);
    if matches!(first, DrainOutcome::Malformed(_)) {
        assert_eq!(first, outcome);
        assert_eq!(seen, expected);
        return;
    }
    parts.extend(&data[at..]);
    let second = drain(&mut parts, &mut seen);
    assert_eq!(second, outcome);
    assert_eq!(seen, expected);
});
