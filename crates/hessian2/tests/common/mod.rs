#![allow(dead_code)]

use hessian2::{Decoder, Encoder, ListRef, MapRef, Value};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn rng(seed: u64) -> Xoshiro256StarStar {
    Xoshiro256StarStar::seed_from_u64(seed)
}

/// Builds the benchmark map: `size` nested maps (`m0..`) and `size` lists of
/// `size` maps (`l0..`) one level down, plus `size` strings (`s0..`), ints
/// (`i0..`) and floats (`f0..`) at every level.
pub fn generate_large_map(rng: &mut Xoshiro256StarStar, depth: usize, size: usize) -> Value {
    let map = MapRef::new();
    if depth != 0 {
        for i in 0..size {
            map.insert(format!("m{i}"), generate_large_map(rng, depth - 1, size));
        }
        for i in 0..size {
            let list = ListRef::with_capacity(size);
            for _ in 0..size {
                list.push(generate_large_map(rng, depth - 1, size));
            }
            map.insert(format!("l{i}"), list);
        }
    }
    for i in 0..size {
        let start = rng.gen_range(0..20);
        map.insert(format!("s{i}"), &ALPHANUMERIC[start..]);
    }
    for i in 0..size {
        map.insert(format!("i{i}"), rng.gen_range(0..=i32::MAX));
    }
    for i in 0..size {
        map.insert(format!("f{i}"), rng.gen::<f32>() as f64);
    }
    Value::Map(map)
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.encode(value).unwrap();
    encoder.into_bytes()
}

pub fn decode(bytes: &[u8]) -> Value {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode().unwrap();
    assert_eq!(decoder.remaining(), 0, "trailing bytes after value");
    value
}

pub fn roundtrip(value: &Value) -> Value {
    decode(&encode(value))
}
