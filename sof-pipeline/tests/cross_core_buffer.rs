//! Cross-core buffer property test (spec §8 scenario 4): two real OS
//! threads stand in for a producer core and a consumer core sharing
//! one ring, and every frame that crosses it must leave behind exactly
//! one writeback (producer side) and one invalidate (consumer side).

use std::sync::{Arc, Mutex};
use std::thread;

use sof_pipeline::buffer::Buffer;
use sof_core::{Direction, Interleaving, SampleFormat, StreamParams};

const FRAME_BYTES: usize = 4;
const FRAME_COUNT: u64 = 1_000_000;
const RING_BYTES: usize = 256;

fn stream() -> StreamParams {
    StreamParams {
        format: SampleFormat::S16Le,
        channels: 2,
        rate_hz: 48_000,
        interleaving: Interleaving::Interleaved,
        direction: Direction::Playback,
    }
}

#[test]
fn a_million_frames_cross_two_real_threads_with_matching_coherence_counts() {
    let buf = Arc::new(Mutex::new(Buffer::new(RING_BYTES, stream(), true)));

    let producer_buf = Arc::clone(&buf);
    let producer = thread::spawn(move || {
        let frame = [0xAAu8; FRAME_BYTES];
        let mut written = 0u64;
        while written < FRAME_COUNT {
            let has_room = {
                let mut buf = producer_buf.lock().expect("buffer mutex poisoned");
                if buf.free() >= FRAME_BYTES {
                    buf.produce(&frame).expect("ring has room, checked above");
                    written += 1;
                    true
                } else {
                    false
                }
            };
            if !has_room {
                thread::yield_now();
            }
        }
    });

    let consumer_buf = Arc::clone(&buf);
    let consumer = thread::spawn(move || {
        let mut scratch = [0u8; FRAME_BYTES];
        let mut read = 0u64;
        while read < FRAME_COUNT {
            let got_frame = {
                let mut buf = consumer_buf.lock().expect("buffer mutex poisoned");
                if buf.avail() >= FRAME_BYTES {
                    buf.consume(&mut scratch).expect("ring has data, checked above");
                    read += 1;
                    true
                } else {
                    false
                }
            };
            if got_frame {
                assert_eq!(scratch, [0xAAu8; FRAME_BYTES]);
            } else {
                thread::yield_now();
            }
        }
    });

    producer.join().expect("producer thread panicked");
    consumer.join().expect("consumer thread panicked");

    let buf = buf.lock().expect("buffer mutex poisoned");
    assert_eq!(buf.coherence().writeback_count(), FRAME_COUNT);
    assert_eq!(buf.coherence().invalidate_count(), FRAME_COUNT);
}
