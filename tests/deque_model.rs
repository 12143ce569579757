// Randomized deque traffic checked against an in-memory model, with periodic reopen.
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use ringstash::api::{Engine, EngineOptions, ErrorKind, Framing, MemoryStoreFactory, StoreFactory};

struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as usize
    }
}

fn payload(rng: &mut XorShift64, framing: Framing) -> Vec<u8> {
    let len = match framing.record_len() {
        Some(len) => len as usize,
        None => 1 + rng.next_range(24),
    };
    (0..len).map(|_| rng.next_u64() as u8).collect()
}

fn open(path: &Path, options: EngineOptions, factory: &Arc<MemoryStoreFactory>) -> Engine {
    let factory: Arc<dyn StoreFactory> = factory.clone();
    Engine::open_with(path, options, factory).expect("open")
}

fn check(engine: &Engine, model: &VecDeque<Vec<u8>>, framing: Framing) {
    let bytes: u64 = model.iter().map(|item| item.len() as u64).sum();
    assert_eq!(engine.size(), model.len() as u64);
    assert_eq!(engine.byte_length(), bytes);
    assert_eq!(
        engine.storage_length(),
        bytes + model.len() as u64 * framing.overhead()
    );
}

fn run_model(seed: u64, options: EngineOptions) {
    let framing = options.framing;
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("model.ring");
    let factory = Arc::new(MemoryStoreFactory::new());
    let mut engine = open(&path, options, &factory);
    let mut model: VecDeque<Vec<u8>> = VecDeque::new();
    let mut rng = XorShift64::new(seed);

    for step in 0..4000 {
        match rng.next_range(6) {
            0 | 1 => {
                let item = payload(&mut rng, framing);
                let front = rng.next_range(2) == 0;
                let fits = engine.can_push(item.len() as u64);
                let result = if front {
                    engine.push_front(&item)
                } else {
                    engine.push_back(&item)
                };
                match result {
                    Ok(()) => {
                        assert!(fits, "step {step}: push succeeded without room");
                        if front {
                            model.push_front(item);
                        } else {
                            model.push_back(item);
                        }
                    }
                    Err(err) => {
                        assert!(!fits, "step {step}: unexpected {err}");
                        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
                    }
                }
            }
            2 => match model.pop_front() {
                Some(expected) => assert_eq!(engine.pop_front().expect("pop front"), expected),
                None => assert_eq!(engine.pop_front().expect_err("empty").kind(), ErrorKind::Empty),
            },
            3 => match model.pop_back() {
                Some(expected) => assert_eq!(engine.pop_back().expect("pop back"), expected),
                None => assert_eq!(engine.pop_back().expect_err("empty").kind(), ErrorKind::Empty),
            },
            4 => {
                assert_eq!(engine.peek_front().expect("peek"), model.front().cloned());
                assert_eq!(engine.peek_back().expect("peek"), model.back().cloned());
            }
            _ => {
                if step % 7 == 0 {
                    engine.close().expect("close");
                    engine = open(&path, options, &factory);
                } else {
                    let seen: Vec<Vec<u8>> = engine
                        .iter_forward()
                        .expect("iter")
                        .collect::<Result<_, _>>()
                        .expect("records");
                    assert_eq!(seen, model.iter().cloned().collect::<Vec<_>>());
                }
            }
        }
        check(&engine, &model, framing);
    }
    engine.close().expect("close");
}

#[test]
fn mirrored_deque_matches_model() {
    for seed in [0x9e37_79b9_7f4a_7c15, 0x1234_5678, 42] {
        run_model(seed, EngineOptions::deque(97));
    }
}

#[test]
fn fixed_deque_matches_model() {
    for seed in [0xdead_beef, 7] {
        run_model(seed, EngineOptions::fixed(50, 6));
    }
}
