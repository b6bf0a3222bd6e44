use super::PlatformConstants;

pub struct Platform;

impl PlatformConstants for Platform {
    fn clock_ticks_per_second() -> Option<u64> {
        // sysconf returns -1 when the limit is indeterminate
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        u64::try_from(ticks).ok().filter(|&t| t > 0)
    }

    fn page_size() -> Option<u64> {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        u64::try_from(size).ok().filter(|&s| s > 0)
    }
}
