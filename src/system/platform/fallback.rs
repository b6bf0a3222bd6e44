use super::PlatformConstants;

pub struct Platform;

impl PlatformConstants for Platform {
    // procfs counters are Linux-only; callers fall back to the defaults.
    fn clock_ticks_per_second() -> Option<u64> {
        None
    }

    fn page_size() -> Option<u64> {
        None
    }
}
