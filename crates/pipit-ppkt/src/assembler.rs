use crate::decode::decode_to_f32;
use crate::sample_buffer::SampleBuffer;
use crate::wire::{Dtype, FrameFlags, PpktHeader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Per-channel integrity counters.
///
/// Every way a packet can fail gets its own counter; a failure costs a
/// bump and the stream continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames committed to the sample buffer.
    pub accepted_frames: u64,
    /// Continuation packet with a non-consecutive sequence.
    pub seq_gaps: u64,
    /// Continuation packet with a non-contiguous iteration index.
    pub iter_gaps: u64,
    /// Frame-boundary violations: a start packet interrupting an active
    /// frame, or a continuation with no frame open.
    pub boundary: u64,
    /// Continuation packet whose dtype/timestamp/sample-rate differ
    /// from the frame opener.
    pub meta_mismatch: u64,
    /// Gap in the iteration index between consecutive accepted frames.
    pub inter_frame_gaps: u64,
}

impl FrameStats {
    /// Total dropped packets across all causes.
    pub fn drops(&self) -> u64 {
        self.seq_gaps + self.iter_gaps + self.boundary + self.meta_mismatch
    }
}

/// Consumer-facing view of one channel's bookkeeping.
#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub channel_id: u16,
    pub sample_rate_hz: f64,
    pub packets: u64,
    pub last_sequence: u32,
    pub buffered_samples: usize,
    pub stats: FrameStats,
}

/// Shared per-channel record: created lazily on the first parseable
/// packet, destroyed by `clear()`.
struct ChannelState {
    sample_rate_hz: f64,
    last_sequence: u32,
    packets: u64,
    samples: SampleBuffer,
    stats: FrameStats,
}

impl ChannelState {
    fn new(capacity: usize) -> Self {
        Self {
            sample_rate_hz: 0.0,
            last_sequence: 0,
            packets: 0,
            samples: SampleBuffer::new(capacity),
            stats: FrameStats::default(),
        }
    }
}

/// Receive-thread-local frame accumulator for one channel.
struct PendingFrame {
    expected_sequence: u32,
    start_timestamp_ns: u64,
    next_iter: u64,
    dtype: Dtype,
    sample_rate_hz: f64,
    staged: Vec<f32>,
}

#[derive(Default)]
struct ChannelRecvState {
    pending: Option<PendingFrame>,
    /// Enabled by the first accepted frame; disabled again by
    /// `FIRST_FRAME` (stream restart).
    iter_tracking: bool,
    next_expected_iter: u64,
}

/// Receive-thread-local state: accumulators and decode scratch. Not
/// shared, so frame accumulation costs no lock.
#[derive(Default)]
pub struct RecvState {
    channels: HashMap<u16, ChannelRecvState>,
    scratch: Vec<f32>,
}

impl RecvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every accumulator (stream reset).
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

/// Turns a stream of PPKT datagrams into per-channel sample buffers.
///
/// Shared between one receive thread (which calls [`ingest`]) and any
/// number of consumer tasks (which call [`snapshot`]). The mutex guards
/// only the channel map; accumulation happens on the receive thread's
/// own [`RecvState`].
///
/// [`ingest`]: FrameAssembler::ingest
/// [`snapshot`]: FrameAssembler::snapshot
pub struct FrameAssembler {
    channels: Mutex<HashMap<u16, ChannelState>>,
    /// Signals the receive thread to drop its local accumulators.
    recv_reset: AtomicBool,
    /// Datagrams rejected before reaching the frame state machine.
    malformed: AtomicU64,
    channel_capacity: usize,
}

impl FrameAssembler {
    /// `channel_capacity` is the per-channel sample buffer size.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            recv_reset: AtomicBool::new(false),
            malformed: AtomicU64::new(0),
            channel_capacity,
        }
    }

    /// Feeds one datagram through the frame state machine.
    ///
    /// Validation failures and integrity violations are recorded as
    /// counters and the packet is discarded; this function never fails.
    pub fn ingest(&self, datagram: &[u8], recv: &mut RecvState) {
        let (header, payload) = match PpktHeader::parse(datagram) {
            Ok(ok) => ok,
            Err(err) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(error = %err, "ppkt datagram rejected");
                return;
            }
        };

        recv.scratch.clear();
        decode_to_f32(header.dtype, payload, &mut recv.scratch);

        let rs = recv.channels.entry(header.channel_id).or_default();

        // Effects to apply under the mutex once the state machine has
        // decided what this packet means.
        let mut boundary = 0u64;
        let mut seq_gaps = 0u64;
        let mut iter_gaps = 0u64;
        let mut meta_mismatch = 0u64;
        let mut inter_frame_gap = false;
        let mut commit: Option<Vec<f32>> = None;

        if header.flags.contains(FrameFlags::FRAME_START) {
            if rs.pending.take().is_some() {
                // A start packet landed on an open frame; the partial
                // frame is lost.
                boundary += 1;
            }
            if header.flags.contains(FrameFlags::FIRST_FRAME) {
                // Stream (re)start: forget the old iteration position.
                rs.iter_tracking = false;
            } else if rs.iter_tracking && header.iteration_index != rs.next_expected_iter {
                inter_frame_gap = true;
            }

            rs.pending = Some(PendingFrame {
                expected_sequence: header.sequence.wrapping_add(1),
                start_timestamp_ns: header.timestamp_ns,
                next_iter: header.iteration_index + u64::from(header.sample_count),
                dtype: header.dtype,
                sample_rate_hz: header.sample_rate_hz,
                staged: recv.scratch.clone(),
            });

            if header.flags.contains(FrameFlags::FRAME_END) {
                // Single-packet frame.
                let frame = rs.pending.take().expect("frame just opened");
                rs.iter_tracking = true;
                rs.next_expected_iter =
                    header.iteration_index + u64::from(header.sample_count);
                commit = Some(frame.staged);
            }
        } else if rs.pending.is_none() {
            // Continuation with no frame open.
            boundary += 1;
        } else {
            let p = rs.pending.as_mut().expect("checked above");
            if header.sequence != p.expected_sequence {
                seq_gaps += 1;
                rs.pending = None;
            } else if header.iteration_index != p.next_iter {
                iter_gaps += 1;
                rs.pending = None;
            } else if header.dtype != p.dtype
                || header.timestamp_ns != p.start_timestamp_ns
                || header.sample_rate_hz != p.sample_rate_hz
            {
                meta_mismatch += 1;
                rs.pending = None;
            } else {
                p.staged.extend_from_slice(&recv.scratch);
                p.expected_sequence = header.sequence.wrapping_add(1);
                p.next_iter = header.iteration_index + u64::from(header.sample_count);

                if header.flags.contains(FrameFlags::FRAME_END) {
                    let frame = rs.pending.take().expect("frame is open");
                    rs.iter_tracking = true;
                    rs.next_expected_iter =
                        header.iteration_index + u64::from(header.sample_count);
                    commit = Some(frame.staged);
                }
            }
        }

        // Single short critical section per packet.
        let mut channels = self.channels.lock().expect("assembler mutex poisoned");
        let state = channels
            .entry(header.channel_id)
            .or_insert_with(|| ChannelState::new(self.channel_capacity));

        state.stats.boundary += boundary;
        state.stats.seq_gaps += seq_gaps;
        state.stats.iter_gaps += iter_gaps;
        state.stats.meta_mismatch += meta_mismatch;
        if inter_frame_gap {
            state.samples.clear();
            state.stats.inter_frame_gaps += 1;
        }
        if let Some(frame) = commit {
            state.samples.push(&frame);
            state.stats.accepted_frames += 1;
        }
        state.packets += 1;
        state.last_sequence = header.sequence;
        state.sample_rate_hz = header.sample_rate_hz;
    }

    /// Point-in-time copy of the newest `max_n` samples of a channel.
    /// Unknown channels yield an empty buffer.
    pub fn snapshot(&self, channel_id: u16, max_n: usize) -> Vec<f32> {
        let channels = self.channels.lock().expect("assembler mutex poisoned");
        channels
            .get(&channel_id)
            .map(|c| c.samples.snapshot(max_n))
            .unwrap_or_default()
    }

    /// Integrity counters for one channel.
    pub fn channel_stats(&self, channel_id: u16) -> Option<FrameStats> {
        let channels = self.channels.lock().expect("assembler mutex poisoned");
        channels.get(&channel_id).map(|c| c.stats)
    }

    /// Bookkeeping for every known channel, ordered by id.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        let channels = self.channels.lock().expect("assembler mutex poisoned");
        let mut out: Vec<ChannelSummary> = channels
            .iter()
            .map(|(&channel_id, c)| ChannelSummary {
                channel_id,
                sample_rate_hz: c.sample_rate_hz,
                packets: c.packets,
                last_sequence: c.last_sequence,
                buffered_samples: c.samples.len(),
                stats: c.stats,
            })
            .collect();
        out.sort_by_key(|s| s.channel_id);
        out
    }

    /// Datagrams rejected before the frame state machine.
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Full reset (e.g. on reconnect): drops every channel record and
    /// tells the receive thread to drop its accumulators.
    pub fn clear(&self) {
        self.channels
            .lock()
            .expect("assembler mutex poisoned")
            .clear();
        self.recv_reset.store(true, Ordering::Release);
    }

    /// Consumed by the receive thread at the top of its loop.
    pub(crate) fn take_recv_reset(&self) -> bool {
        self.recv_reset.swap(false, Ordering::AcqRel)
    }
}
