use std::{
    io::Write,
    sync::{Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// copy from https://github.com/tikv/tikv/blob/b15ea3b1cd766375cb52019e35c195ed797124df/components/tikv_util/src/lib.rs#L171-L186
///
/// A handy shortcut to replace `RwLock` write/read().unwrap() pattern to
/// shortcut wl and rl.
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

static INIT_LOG: Once = Once::new();

/// Set up the logger. Safe to call more than once, only the first call
/// takes effect.
pub fn init_log() {
    INIT_LOG.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();

        builder
            .format_timestamp_secs()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} - {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .is_test(true)
            .try_init()
            .ok();
    });
}

/// Integer ceiling of a / b.
pub fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
