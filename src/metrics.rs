// src/metrics.rs
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub msgs_total: AtomicU64,
    pub decode_err: AtomicU64,
    pub apply_err: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_total(&self) {
        self.msgs_total.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_decode_err(&self) {
        self.decode_err.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_apply_err(&self) {
        self.apply_err.fetch_add(1, Ordering::Relaxed);
    }

    pub fn prometheus_text(&self) -> String {
        let total = self.msgs_total.load(Ordering::Relaxed);
        let decode = self.decode_err.load(Ordering::Relaxed);
        let apply = self.apply_err.load(Ordering::Relaxed);

        format!(
            "\
# TYPE itchbook_msgs_total counter
itchbook_msgs_total {total}
# TYPE itchbook_decode_err_total counter
itchbook_decode_err_total {decode}
# TYPE itchbook_apply_err_total counter
itchbook_apply_err_total {apply}
"
        )
    }
}
