use crate::assembler::{FrameAssembler, RecvState};
use crate::wire::MAX_DATAGRAM;
use pipit_rt::StopFlag;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Poll timeout; bounds how long shutdown takes to observe.
const POLL_TIMEOUT_MS: i32 = 1;

/// Datagrams drained per readiness event before re-checking the run and
/// reset flags.
const RECV_BATCH: usize = 64;

/// Background UDP receive thread feeding a [`FrameAssembler`].
///
/// One receiver per datagram-bound source. The thread exits on the stop
/// flag, on [`shutdown`], or on a fatal socket error; tasks keep running
/// in the fatal case and subsequent snapshots simply return empty
/// buffers once the channel map is cleared.
///
/// [`shutdown`]: PpktReceiver::shutdown
pub struct PpktReceiver {
    run: Arc<AtomicBool>,
    assembler: Arc<FrameAssembler>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl PpktReceiver {
    /// Binds `addr` and starts the receive thread.
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        assembler: Arc<FrameAssembler>,
        stop: Arc<StopFlag>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let run = Arc::new(AtomicBool::new(true));
        let thread_run = Arc::clone(&run);
        let thread_assembler = Arc::clone(&assembler);
        let thread = thread::Builder::new()
            .name(format!("ppkt-recv:{local_addr}"))
            .spawn(move || receive_loop(&socket, &thread_run, &thread_assembler, &stop))?;

        Ok(Self {
            run,
            assembler,
            local_addr,
            thread: Some(thread),
        })
    }

    /// Address the socket actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn assembler(&self) -> &Arc<FrameAssembler> {
        &self.assembler
    }

    /// Stops and joins the receive thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.run.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PpktReceiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(
    socket: &UdpSocket,
    run: &AtomicBool,
    assembler: &FrameAssembler,
    stop: &StopFlag,
) {
    let mut recv = RecvState::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let fd = socket.as_raw_fd();

    tracing::debug!(addr = %socket.local_addr().map(|a| a.to_string()).unwrap_or_default(), "ppkt receiver started");

    while run.load(Ordering::Acquire) && !stop.is_raised() {
        if assembler.take_recv_reset() {
            recv.clear();
        }

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd points to one valid pollfd for the duration of
        // the call.
        let ready = unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(error = %err, "ppkt poll failed; receiver exiting");
            return;
        }
        if ready == 0 {
            continue;
        }

        // Drain a bounded batch, then come back up for the flags.
        for _ in 0..RECV_BATCH {
            match socket.recv(&mut buf) {
                Ok(len) => assembler.ingest(&buf[..len], &mut recv),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!(error = %e, "ppkt recv failed; receiver exiting");
                    return;
                }
            }
        }
    }

    tracing::debug!("ppkt receiver stopped");
}
