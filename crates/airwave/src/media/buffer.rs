//! Network read-ahead
//!
//! A producer thread pulls the HTTP response in fixed-size chunks and queues
//! them on a bounded channel. The decoder reads from the `ChunkReader` end,
//! so a slow network read stalls the producer instead of the audio thread.
//!
//!   Response → producer thread → bounded channel → ChunkReader → SymphoniaSource

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::debug;

use crate::config::buffer::{CONSUMER_WAIT_TIMEOUT_MS, PRODUCER_CHUNK_SIZE, PRODUCER_QUEUE_CHUNKS};
use crate::error::{PlayerError, Result};

type Chunk = io::Result<Vec<u8>>;

/// Consumer side of the read-ahead, handed to the decoder
pub struct ChunkReader {
    rx: Receiver<Chunk>,
    current: Vec<u8>,
    pos: usize,
    cancel: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    finished: bool,
}

impl ChunkReader {
    /// Times the decoder found the queue empty and had to wait
    pub fn underrun_counter(&self) -> Arc<AtomicU64> {
        self.underruns.clone()
    }

    /// Chunks queued ahead of the decoder
    pub fn queued_chunks(&self) -> usize {
        self.rx.len()
    }

    /// Pull the next chunk. `Ok(false)` means the producer is done.
    fn refill(&mut self) -> io::Result<bool> {
        if self.finished {
            return Ok(false);
        }
        if self.rx.is_empty() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
        let wait = Duration::from_millis(CONSUMER_WAIT_TIMEOUT_MS);
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(io::Error::other("stream closed"));
            }
            // A timeout is not end of stream; symphonia would stop on Ok(0)
            match self.rx.recv_timeout(wait) {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                    return Ok(true);
                }
                Ok(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.finished = true;
                    return Ok(false);
                }
            }
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(io::Error::other("stream closed"));
        }
        while self.pos >= self.current.len() {
            if !self.refill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.current.len() - self.pos);
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Start the producer thread over `reader`.
///
/// Raising `cancel` stops both ends: the producer exits at its next chunk and
/// the reader fails its next read.
pub fn spawn_producer<R>(reader: R, cancel: Arc<AtomicBool>) -> Result<ChunkReader>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(PRODUCER_QUEUE_CHUNKS);
    let producer_cancel = cancel.clone();
    thread::Builder::new()
        .name("stream-producer".to_string())
        .spawn(move || produce(reader, tx, producer_cancel))
        .map_err(|e| PlayerError::Output(format!("Failed to spawn producer thread: {}", e)))?;

    Ok(ChunkReader {
        rx,
        current: Vec::new(),
        pos: 0,
        cancel,
        underruns: Arc::new(AtomicU64::new(0)),
        finished: false,
    })
}

fn produce<R: Read>(mut reader: R, tx: Sender<Chunk>, cancel: Arc<AtomicBool>) {
    let mut total: u64 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let mut chunk = vec![0u8; PRODUCER_CHUNK_SIZE];
        let item = match reader.read(&mut chunk) {
            // EOF: dropping the sender tells the reader
            Ok(0) => break,
            Ok(n) => {
                chunk.truncate(n);
                total += n as u64;
                Ok(chunk)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if !push(&tx, item, &cancel) || failed {
            break;
        }
    }
    debug!("stream producer finished after {} bytes", total);
}

/// Queue one chunk, waiting for space. False once nobody is listening.
fn push(tx: &Sender<Chunk>, mut item: Chunk, cancel: &AtomicBool) -> bool {
    let wait = Duration::from_millis(CONSUMER_WAIT_TIMEOUT_MS);
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        match tx.send_timeout(item, wait) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => item = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
