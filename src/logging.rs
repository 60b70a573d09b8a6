//! Log facade setup
//!
//! Native: env_logger (defaults to `info`, override with RUST_LOG).
//! WASM: forwards records to the browser console through `web/soundtrack.js`,
//! since wasm-bindgen based loggers conflict with macroquad's JS bundle.

/// Install the platform logger. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(target_arch = "wasm32")]
pub fn init() {
    if log::set_logger(&console::CONSOLE).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};

    extern "C" {
        fn tc_console_log(level: u32, ptr: *const u8, len: usize);
    }

    pub struct ConsoleLogger;

    pub static CONSOLE: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let line = format!("[{}] {}", record.target(), record.args());
            // 1 = error, 2 = warn, 3 = info (console.error / warn / log)
            let level = match record.level() {
                Level::Error => 1,
                Level::Warn => 2,
                _ => 3,
            };
            unsafe { tc_console_log(level, line.as_ptr(), line.len()) }
        }

        fn flush(&self) {}
    }
}
