// Copyright @yucwang 2026

use std::sync::atomic::{AtomicU64, Ordering};

static PRIMITIVE_RAY_TESTS: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static SPLIT_COUNT: AtomicU64 = AtomicU64::new(0);
static UPOLY_GEN_COUNT: AtomicU64 = AtomicU64::new(0);

/// Global render counters, accumulated across threads.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub primitive_ray_tests: u64,
    pub cache_misses: u64,
    pub split_count: u64,
    pub upoly_gen_count: u64,
}

pub fn add_primitive_ray_test() {
    PRIMITIVE_RAY_TESTS.fetch_add(1, Ordering::Relaxed);
}

pub fn add_cache_miss() {
    CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub fn add_split() {
    SPLIT_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn add_upolys_generated(count: u64) {
    UPOLY_GEN_COUNT.fetch_add(count, Ordering::Relaxed);
}

pub fn snapshot() -> StatsSnapshot {
    StatsSnapshot {
        primitive_ray_tests: PRIMITIVE_RAY_TESTS.load(Ordering::Relaxed),
        cache_misses: CACHE_MISSES.load(Ordering::Relaxed),
        split_count: SPLIT_COUNT.load(Ordering::Relaxed),
        upoly_gen_count: UPOLY_GEN_COUNT.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    PRIMITIVE_RAY_TESTS.store(0, Ordering::Relaxed);
    CACHE_MISSES.store(0, Ordering::Relaxed);
    SPLIT_COUNT.store(0, Ordering::Relaxed);
    UPOLY_GEN_COUNT.store(0, Ordering::Relaxed);
}
