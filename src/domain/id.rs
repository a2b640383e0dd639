use std::sync::OnceLock;

use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use uuid::Uuid;

/// Time-ordered identifier generator (UUID version 7).
///
/// Layout, most significant bits first:
/// - 48 bits: Unix milliseconds
/// - 4 bits: version (0x7)
/// - 12 bits: per-millisecond monotonic counter
/// - 2 bits: variant (0b10)
/// - 62 bits: cryptographically random
///
/// Identifiers generated in the same process within the same millisecond
/// are strictly increasing, which makes them a stable sort key without a
/// database round-trip.
pub struct IdGenerator {
    state: Mutex<CounterState>,
}

struct CounterState {
    last_millis: u64,
    counter: u16,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator {
            state: Mutex::new(CounterState {
                last_millis: 0,
                counter: 0,
            }),
        }
    }

    /// Generate the next identifier.
    ///
    /// If the 12-bit counter overflows within a single millisecond the
    /// generator spins to the next millisecond rather than emitting an
    /// out-of-order value.
    pub fn next(&self) -> Uuid {
        let (millis, counter) = {
            let mut state = self.state.lock();
            let mut now = Utc::now().timestamp_millis() as u64;

            if now <= state.last_millis {
                now = state.last_millis;
                if state.counter == 0x0FFF {
                    now += 1;
                    state.counter = 0;
                } else {
                    state.counter += 1;
                }
            } else {
                state.counter = 0;
            }

            state.last_millis = now;
            (now, state.counter)
        };

        let mut random = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut random);
        let random62 = u64::from_be_bytes(random) & 0x3FFF_FFFF_FFFF_FFFF;

        let high: u64 = (millis << 16) | 0x7000 | u64::from(counter & 0x0FFF);
        let low: u64 = 0x8000_0000_0000_0000 | random62;

        Uuid::from_u128((u128::from(high) << 64) | u128::from(low))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::new()
    }
}

static PROCESS_GENERATOR: OnceLock<IdGenerator> = OnceLock::new();

/// Generate a time-ordered identifier from the process-wide generator.
pub fn ordered_uuid() -> Uuid {
    PROCESS_GENERATOR.get_or_init(IdGenerator::new).next()
}
