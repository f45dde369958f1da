mod common;

use std::thread;

use common::{generate_large_map, rng};
use hessian2::{Decoder, Encoder};

#[test]
fn independent_codecs_run_in_parallel() {
    let handles: Vec<_> = (0..8u64)
        .map(|seed| {
            thread::spawn(move || {
                let mut rng = rng(seed);
                let value = generate_large_map(&mut rng, 2, 4);
                let mut encoder = Encoder::new();
                encoder.encode(&value).unwrap();
                let bytes = encoder.into_bytes();
                let back = Decoder::new(&bytes).decode().unwrap();
                assert_eq!(back, value);
                bytes
            })
        })
        .collect();

    let outputs: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Same seed, same bytes, whichever thread produced them.
    let mut rng = rng(3);
    let again = common::encode(&generate_large_map(&mut rng, 2, 4));
    assert_eq!(outputs[3], again);
}

#[test]
fn encoded_bytes_can_be_shared_across_threads() {
    let mut rng = rng(42);
    let bytes = std::sync::Arc::new(common::encode(&generate_large_map(&mut rng, 2, 3)));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bytes = bytes.clone();
            thread::spawn(move || {
                let value = Decoder::new(&bytes).decode().unwrap();
                common::encode(&value)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), *bytes);
    }
}
