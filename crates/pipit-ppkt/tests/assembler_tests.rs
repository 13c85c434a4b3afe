use pipit_ppkt::{Dtype, FrameAssembler, FrameFlags, PpktHeader, RecvState};

const RATE: f64 = 48_000.0;
const TS: u64 = 1_000_000;

fn f32_payload(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn ramp(start: f32, n: usize) -> Vec<f32> {
    (0..n).map(|i| start + i as f32).collect()
}

fn packet(
    channel: u16,
    seq: u32,
    iter: u64,
    samples: &[f32],
    flags: FrameFlags,
) -> Vec<u8> {
    let payload = f32_payload(samples);
    PpktHeader {
        dtype: Dtype::F32,
        flags,
        channel_id: channel,
        sequence: seq,
        sample_count: samples.len() as u32,
        payload_bytes: payload.len() as u32,
        iteration_index: iter,
        timestamp_ns: TS,
        sample_rate_hz: RATE,
    }
    .encode(&payload)
}

#[test]
fn test_three_chunk_frame_commits_once() {
    let asm = FrameAssembler::new(4096);
    let mut recv = RecvState::new();

    let chunk0 = ramp(0.0, 256);
    let chunk1 = ramp(256.0, 256);
    let chunk2 = ramp(512.0, 256);

    asm.ingest(&packet(7, 10, 0, &chunk0, FrameFlags::FRAME_START), &mut recv);
    asm.ingest(&packet(7, 11, 256, &chunk1, FrameFlags::empty()), &mut recv);
    asm.ingest(&packet(7, 12, 512, &chunk2, FrameFlags::FRAME_END), &mut recv);

    let stats = asm.channel_stats(7).unwrap();
    assert_eq!(stats.accepted_frames, 1);
    assert_eq!(stats.drops(), 0);
    assert_eq!(stats.inter_frame_gaps, 0);

    let snap = asm.snapshot(7, 1024);
    assert_eq!(snap.len(), 768);
    assert_eq!(snap, ramp(0.0, 768));
}

#[test]
fn test_sequence_gap_then_orphan_end() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(&packet(1, 10, 0, &ramp(0.0, 16), FrameFlags::FRAME_START), &mut recv);
    // seq 11 lost; 12 arrives.
    asm.ingest(&packet(1, 12, 16, &ramp(16.0, 16), FrameFlags::empty()), &mut recv);

    let stats = asm.channel_stats(1).unwrap();
    assert_eq!(stats.seq_gaps, 1);
    assert_eq!(stats.accepted_frames, 0);

    // The accumulator was reset, so an END without a new START is a
    // boundary violation.
    asm.ingest(&packet(1, 13, 32, &ramp(32.0, 16), FrameFlags::FRAME_END), &mut recv);
    let stats = asm.channel_stats(1).unwrap();
    assert_eq!(stats.boundary, 1);
    assert_eq!(stats.accepted_frames, 0);
    assert!(asm.snapshot(1, 64).is_empty());
}

#[test]
fn test_iteration_gap_within_frame() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(&packet(2, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START), &mut recv);
    // Sequence is consecutive but the iteration index skips ahead.
    asm.ingest(&packet(2, 1, 99, &ramp(8.0, 8), FrameFlags::empty()), &mut recv);

    let stats = asm.channel_stats(2).unwrap();
    assert_eq!(stats.iter_gaps, 1);
    assert_eq!(stats.accepted_frames, 0);
}

#[test]
fn test_metadata_mismatch_within_frame() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(&packet(2, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START), &mut recv);

    // Same channel, right sequence and iteration, different timestamp.
    let payload = f32_payload(&ramp(8.0, 8));
    let bad = PpktHeader {
        dtype: Dtype::F32,
        flags: FrameFlags::empty(),
        channel_id: 2,
        sequence: 1,
        sample_count: 8,
        payload_bytes: payload.len() as u32,
        iteration_index: 8,
        timestamp_ns: TS + 1,
        sample_rate_hz: RATE,
    }
    .encode(&payload);
    asm.ingest(&bad, &mut recv);

    let stats = asm.channel_stats(2).unwrap();
    assert_eq!(stats.meta_mismatch, 1);
    assert_eq!(stats.accepted_frames, 0);
}

#[test]
fn test_start_over_open_frame_is_boundary_drop() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(&packet(3, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START), &mut recv);
    // New START before the previous frame closed: the partial is lost,
    // the new frame proceeds.
    asm.ingest(
        &packet(3, 1, 8, &ramp(100.0, 8), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );

    let stats = asm.channel_stats(3).unwrap();
    assert_eq!(stats.boundary, 1);
    assert_eq!(stats.accepted_frames, 1);
    assert_eq!(asm.snapshot(3, 64), ramp(100.0, 8));
}

#[test]
fn test_inter_frame_gap_clears_buffer() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    // First frame: iterations 0..8. Tracking becomes enabled.
    asm.ingest(
        &packet(4, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );
    assert_eq!(asm.snapshot(4, 64).len(), 8);

    // Next frame should start at iteration 8 but starts at 64.
    asm.ingest(
        &packet(4, 1, 64, &ramp(64.0, 8), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );

    let stats = asm.channel_stats(4).unwrap();
    assert_eq!(stats.inter_frame_gaps, 1);
    assert_eq!(stats.accepted_frames, 2);
    // The stale window was cleared; only the new frame remains.
    assert_eq!(asm.snapshot(4, 64), ramp(64.0, 8));
}

#[test]
fn test_first_frame_resets_tracking_without_gap() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(
        &packet(5, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );

    // Stream restart: iteration index jumps back to 0, but FIRST_FRAME
    // makes that legitimate.
    asm.ingest(
        &packet(
            5,
            1,
            0,
            &ramp(200.0, 8),
            FrameFlags::FRAME_START | FrameFlags::FRAME_END | FrameFlags::FIRST_FRAME,
        ),
        &mut recv,
    );

    let stats = asm.channel_stats(5).unwrap();
    assert_eq!(stats.inter_frame_gaps, 0);
    assert_eq!(stats.accepted_frames, 2);
}

#[test]
fn test_contiguous_frames_track_iterations() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    for frame in 0..4u64 {
        let start = frame * 8;
        asm.ingest(
            &packet(
                6,
                frame as u32,
                start,
                &ramp(start as f32, 8),
                FrameFlags::FRAME_START | FrameFlags::FRAME_END,
            ),
            &mut recv,
        );
    }

    let stats = asm.channel_stats(6).unwrap();
    assert_eq!(stats.accepted_frames, 4);
    assert_eq!(stats.inter_frame_gaps, 0);
    assert_eq!(asm.snapshot(6, 64), ramp(0.0, 32));
}

#[test]
fn test_malformed_datagrams_counted_not_fatal() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(&[0u8; 20], &mut recv); // too short
    asm.ingest(&[0u8; 80], &mut recv); // bad magic

    assert_eq!(asm.malformed_count(), 2);
    assert!(asm.summaries().is_empty());

    // The stream still works afterwards.
    asm.ingest(
        &packet(0, 0, 0, &ramp(0.0, 4), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );
    assert_eq!(asm.channel_stats(0).unwrap().accepted_frames, 1);
}

#[test]
fn test_clear_resets_channels_and_recv_state() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(
        &packet(9, 0, 0, &ramp(0.0, 8), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );
    assert_eq!(asm.snapshot(9, 64).len(), 8);

    asm.clear();
    assert!(asm.snapshot(9, 64).is_empty());
    assert!(asm.channel_stats(9).is_none());
    recv.clear();

    // Fresh stream starts clean.
    asm.ingest(
        &packet(
            9,
            0,
            0,
            &ramp(1.0, 8),
            FrameFlags::FRAME_START | FrameFlags::FRAME_END | FrameFlags::FIRST_FRAME,
        ),
        &mut recv,
    );
    assert_eq!(asm.channel_stats(9).unwrap().accepted_frames, 1);
}

#[test]
fn test_channels_created_lazily_and_summarized() {
    let asm = FrameAssembler::new(1024);
    let mut recv = RecvState::new();

    asm.ingest(
        &packet(2, 5, 0, &ramp(0.0, 4), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );
    asm.ingest(
        &packet(1, 3, 0, &ramp(0.0, 4), FrameFlags::FRAME_START | FrameFlags::FRAME_END),
        &mut recv,
    );

    let summaries = asm.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].channel_id, 1);
    assert_eq!(summaries[0].last_sequence, 3);
    assert_eq!(summaries[1].channel_id, 2);
    assert_eq!(summaries[1].packets, 1);
    assert_eq!(summaries[1].sample_rate_hz, RATE);
}
