use pipit_ppkt::{Dtype, FrameAssembler, FrameFlags, PpktHeader, PpktReceiver};
use pipit_rt::StopFlag;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn frame_packet(seq: u32, iter: u64, samples: &[f32], flags: FrameFlags) -> Vec<u8> {
    let payload: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
    PpktHeader {
        dtype: Dtype::F32,
        flags,
        channel_id: 0,
        sequence: seq,
        sample_count: samples.len() as u32,
        payload_bytes: payload.len() as u32,
        iteration_index: iter,
        timestamp_ns: 42,
        sample_rate_hz: 8_000.0,
    }
    .encode(&payload)
}

/// Polls until `pred` holds or the deadline passes. Loopback UDP is
/// reliable in practice but not instantaneous.
fn wait_for(pred: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    pred()
}

#[test]
fn test_udp_round_trip() {
    let assembler = Arc::new(FrameAssembler::new(4096));
    let stop = Arc::new(StopFlag::new());
    let mut receiver =
        PpktReceiver::bind("127.0.0.1:0", Arc::clone(&assembler), Arc::clone(&stop)).unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    let dest = receiver.local_addr();

    let samples: Vec<f32> = (0..64).map(|i| i as f32).collect();
    sender
        .send_to(
            &frame_packet(
                0,
                0,
                &samples[..32],
                FrameFlags::FRAME_START | FrameFlags::FIRST_FRAME,
            ),
            dest,
        )
        .unwrap();
    sender
        .send_to(&frame_packet(1, 32, &samples[32..], FrameFlags::FRAME_END), dest)
        .unwrap();

    assert!(
        wait_for(
            || assembler
                .channel_stats(0)
                .is_some_and(|s| s.accepted_frames == 1),
            Duration::from_secs(2),
        ),
        "frame never arrived"
    );
    assert_eq!(assembler.snapshot(0, 128), samples);

    receiver.shutdown();
}

#[test]
fn test_receiver_observes_stop_flag() {
    let assembler = Arc::new(FrameAssembler::new(64));
    let stop = Arc::new(StopFlag::new());
    let mut receiver =
        PpktReceiver::bind("127.0.0.1:0", Arc::clone(&assembler), Arc::clone(&stop)).unwrap();

    stop.raise();
    // shutdown() joins; with the stop flag raised the loop exits within
    // one poll timeout, so this returns promptly.
    let start = Instant::now();
    receiver.shutdown();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_reset_between_streams() {
    let assembler = Arc::new(FrameAssembler::new(4096));
    let stop = Arc::new(StopFlag::new());
    let receiver =
        PpktReceiver::bind("127.0.0.1:0", Arc::clone(&assembler), Arc::clone(&stop)).unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    let dest = receiver.local_addr();
    let samples: Vec<f32> = (0..16).map(|i| i as f32).collect();

    sender
        .send_to(
            &frame_packet(
                0,
                0,
                &samples,
                FrameFlags::FRAME_START | FrameFlags::FRAME_END | FrameFlags::FIRST_FRAME,
            ),
            dest,
        )
        .unwrap();
    assert!(wait_for(
        || assembler.channel_stats(0).is_some(),
        Duration::from_secs(2)
    ));

    // Consumer-side reconnect: everything forgotten.
    assembler.clear();
    assert!(assembler.snapshot(0, 16).is_empty());

    // A restarted stream is accepted cleanly after the reset.
    sender
        .send_to(
            &frame_packet(
                0,
                0,
                &samples,
                FrameFlags::FRAME_START | FrameFlags::FRAME_END | FrameFlags::FIRST_FRAME,
            ),
            dest,
        )
        .unwrap();
    assert!(wait_for(
        || assembler
            .channel_stats(0)
            .is_some_and(|s| s.accepted_frames == 1 && s.inter_frame_gaps == 0),
        Duration::from_secs(2)
    ));
}
