use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use firstream_core::{ChunkAdapter, StereoFrame, Stream, StreamFn};
use rand::{rngs::StdRng, Rng, SeedableRng};

const TOTAL: usize = 131_072;
const CHUNK: usize = 64;
const MAX_REQUEST: usize = 512;

fn reference() -> Vec<StereoFrame> {
    (0..CHUNK).map(|i| StereoFrame::mono(i as f64)).collect()
}

/// Producer that only accepts `CHUNK`-frame reads and repeats `reference()`.
fn block_producer(pulls: Arc<AtomicUsize>) -> impl Stream {
    let reference = reference();
    let mut avail = TOTAL;
    StreamFn(move |frames: &mut [StereoFrame]| {
        assert_eq!(frames.len(), CHUNK, "producer read with non-block length");
        pulls.fetch_add(1, Ordering::Relaxed);
        if avail == 0 {
            return (0, false);
        }
        let n = avail.min(CHUNK);
        frames[..n].copy_from_slice(&reference[..n]);
        avail -= n;
        (n, true)
    })
}

fn run_random_requests(seed: u64) {
    let reference = reference();
    let pulls = Arc::new(AtomicUsize::new(0));
    let mut adapter = ChunkAdapter::new(block_producer(Arc::clone(&pulls)), CHUNK).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![StereoFrame::SILENCE; MAX_REQUEST];

    let mut s = 0;
    while s < TOTAL {
        let request = rng.gen_range(0..MAX_REQUEST);
        let (n, more) = adapter.read(&mut buf[..request]);
        assert!(more, "exhaustion reported early at offset {s}");
        assert_eq!(n, request.min(TOTAL - s), "short read at offset {s}");
        for (i, frame) in buf[..n].iter().enumerate() {
            assert_eq!(*frame, reference[(s + i) % CHUNK], "frame {}", s + i);
        }
        s += n;
    }

    assert_eq!(adapter.read(&mut buf), (0, false));
    assert_eq!(adapter.read(&mut buf[..1]), (0, false));
    assert_eq!(adapter.read(&mut buf[..0]), (0, true));
    // Every block pulled exactly once, plus the single exhausted pull.
    assert_eq!(pulls.load(Ordering::Relaxed), TOTAL / CHUNK + 1);
}

#[test]
fn random_request_lengths_reproduce_producer_sequence() {
    run_random_requests(0x5eed);
}

#[test]
fn reproduction_holds_for_several_seeds() {
    for seed in [1, 42, 1_000_003] {
        run_random_requests(seed);
    }
}

#[test]
fn zero_length_requests_never_reach_the_producer() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let mut adapter = ChunkAdapter::new(block_producer(Arc::clone(&pulls)), CHUNK).unwrap();

    for _ in 0..10 {
        assert_eq!(adapter.read(&mut []), (0, true));
    }
    assert_eq!(pulls.load(Ordering::Relaxed), 0);
}
