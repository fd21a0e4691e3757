use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use std::sync::Mutex;

const BATCH_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

static BATCH_IDS: Lazy<BatchIdGenerator> = Lazy::new(BatchIdGenerator::default);

/// Second-resolution batch ids stamped in local time. Ids generated within the
/// same second get a `_N` suffix so they stay unique for the life of the
/// process.
#[derive(Default)]
pub struct BatchIdGenerator {
    last: Mutex<(String, u32)>,
}

impl BatchIdGenerator {
    pub fn next_at(&self, now: NaiveDateTime) -> String {
        let stamp = now.format(BATCH_ID_FORMAT).to_string();
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if last.0 == stamp {
            last.1 += 1;
            format!("{}_{}", stamp, last.1)
        } else {
            *last = (stamp.clone(), 0);
            stamp
        }
    }
}

/// Next process-wide batch id, e.g. `20260220_103000`.
pub fn generate_batch_id() -> String {
    BATCH_IDS.next_at(Local::now().naive_local())
}
