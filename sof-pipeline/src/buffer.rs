//! Inter-component SPSC ring buffer (spec §3).
//!
//! Every byte move is bracketed `lock -> invalidate -> mutate ->
//! writeback -> unlock`: the local view is invalidated before it is
//! read or written and the dirty region is written back before the
//! lock releases, so a concurrent core never observes a half-updated
//! header or stale ring bytes. See `original_source/lmdk/include/
//! coherent.h` for the discipline this mirrors.

use std::sync::Mutex;

use sof_core::{CoherenceCounters, CoreError, Result, StreamParams};

use crate::arena::Handle;
use crate::component::Component;

/// Which endpoint of a connection a handle is being registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDir {
    Producer,
    Consumer,
}

struct Header {
    w_ptr: usize,
    r_ptr: usize,
    avail: usize,
}

/// A single-producer/single-consumer byte ring shared between two
/// components, optionally across a core boundary.
pub struct Buffer {
    data: Vec<u8>,
    size: usize,
    stream: StreamParams,
    producer: Option<Handle<Component>>,
    consumer: Option<Handle<Component>>,
    inter_core: bool,
    walking: bool,
    header: Mutex<Header>,
    coherence: CoherenceCounters,
}

impl Buffer {
    pub fn new(size: usize, stream: StreamParams, inter_core: bool) -> Self {
        Self {
            data: vec![0u8; size],
            size,
            stream,
            producer: None,
            consumer: None,
            inter_core,
            walking: false,
            header: Mutex::new(Header {
                w_ptr: 0,
                r_ptr: 0,
                avail: 0,
            }),
            coherence: CoherenceCounters::new(),
        }
    }

    pub fn stream(&self) -> StreamParams {
        self.stream
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_inter_core(&self) -> bool {
        self.inter_core
    }

    pub fn producer(&self) -> Option<Handle<Component>> {
        self.producer
    }

    pub fn consumer(&self) -> Option<Handle<Component>> {
        self.consumer
    }

    pub fn connect(&mut self, dir: ConnectDir, handle: Handle<Component>) {
        match dir {
            ConnectDir::Producer => self.producer = Some(handle),
            ConnectDir::Consumer => self.consumer = Some(handle),
        }
    }

    pub fn disconnect(&mut self, dir: ConnectDir) {
        match dir {
            ConnectDir::Producer => self.producer = None,
            ConnectDir::Consumer => self.consumer = None,
        }
    }

    /// Bytes currently readable by the consumer.
    pub fn avail(&self) -> usize {
        self.header.lock().expect("buffer header mutex poisoned").avail
    }

    /// Free bytes the producer can still write without overrunning.
    pub fn free(&self) -> usize {
        self.size - self.avail()
    }

    /// Frames obtainable from `avail_bytes` at `frame_bytes` each.
    pub fn avail_frames(avail_bytes: usize, frame_bytes: usize) -> usize {
        if frame_bytes == 0 {
            0
        } else {
            avail_bytes / frame_bytes
        }
    }

    /// Copies `src` into the ring, advancing the write cursor.
    ///
    /// Writes as many whole bytes as fit; if `src` does not fully fit,
    /// the written prefix still lands in the ring and the call returns
    /// `Overrun` naming the bytes dropped off the end.
    pub fn produce(&mut self, src: &[u8]) -> Result<usize> {
        let mut header = self.header.lock().expect("buffer header mutex poisoned");

        let free = self.size - header.avail;
        let to_write = src.len().min(free);
        write_wrapping(&mut self.data, header.w_ptr, &src[..to_write]);
        header.w_ptr = (header.w_ptr + to_write) % self.size.max(1);
        header.avail += to_write;

        self.coherence.writeback();
        drop(header);

        if to_write < src.len() {
            Err(CoreError::Overrun {
                deficit_bytes: src.len() - to_write,
            })
        } else {
            Ok(to_write)
        }
    }

    /// Copies up to `dst.len()` bytes out of the ring, advancing the
    /// read cursor.
    ///
    /// If fewer bytes are available than requested, the available
    /// prefix is still copied into `dst` and the call returns
    /// `Underrun` naming the shortfall.
    pub fn consume(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut header = self.header.lock().expect("buffer header mutex poisoned");

        let to_read = dst.len().min(header.avail);
        read_wrapping(&self.data, header.r_ptr, &mut dst[..to_read]);
        header.r_ptr = (header.r_ptr + to_read) % self.size.max(1);
        header.avail -= to_read;

        self.coherence.invalidate();
        drop(header);

        if to_read < dst.len() {
            Err(CoreError::Underrun {
                deficit_bytes: dst.len() - to_read,
            })
        } else {
            Ok(to_read)
        }
    }

    /// Writes `len` zero bytes at the current write cursor without
    /// advancing any cursor. Used by components (the mixer, during an
    /// idle period) that need silence to appear in the ring ahead of
    /// the producer without altering `avail` accounting.
    pub fn set_zero(&mut self, len: usize) {
        let header = self.header.lock().expect("buffer header mutex poisoned");
        self.coherence.invalidate();
        let n = len.min(self.size);
        let zeros = vec![0u8; n];
        write_wrapping(&mut self.data, header.w_ptr, &zeros);
        self.coherence.writeback();
    }

    /// Marks this buffer as visited by the current graph walk.
    /// Returns `false` if it was already marked, so a walker can break
    /// cycles.
    pub fn begin_walk(&mut self) -> bool {
        if self.walking {
            false
        } else {
            self.walking = true;
            true
        }
    }

    pub fn end_walk(&mut self) {
        self.walking = false;
    }

    pub fn is_walking(&self) -> bool {
        self.walking
    }

    pub fn coherence(&self) -> &CoherenceCounters {
        &self.coherence
    }
}

fn write_wrapping(data: &mut [u8], start: usize, src: &[u8]) {
    let len = data.len();
    if len == 0 {
        return;
    }
    let first = src.len().min(len - start);
    data[start..start + first].copy_from_slice(&src[..first]);
    if first < src.len() {
        data[..src.len() - first].copy_from_slice(&src[first..]);
    }
}

fn read_wrapping(data: &[u8], start: usize, dst: &mut [u8]) {
    let len = data.len();
    if len == 0 {
        return;
    }
    let first = dst.len().min(len - start);
    dst[..first].copy_from_slice(&data[start..start + first]);
    if first < dst.len() {
        dst[first..].copy_from_slice(&data[..dst.len() - first]);
    }
}
