// Logging bootstrap for binaries and demos embedding the controller.
//
// Library code only talks to the `log` facade; this picks the sink.
// On desktop targets env_logger writes to stderr. `PENLIGHT_LOG` (env_logger filter
// syntax, e.g. `penlight=trace`) overrides the level passed in.
// Level defaults to Warn if None is used.

pub const LOG_ENV: &str = "PENLIGHT_LOG";

pub struct Logger;

impl Logger {
    pub fn start(level: Option<log::Level>) {
        let level = level.unwrap_or(log::Level::Warn);

        #[cfg(not(any(target_os = "android", target_arch = "wasm32")))]
        {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(level.to_level_filter());
            if let Ok(filters) = std::env::var(LOG_ENV) {
                builder.parse_filters(&filters);
            }
            // A host application may already own the logger.
            if builder.try_init().is_err() {
                log::debug!("logger already initialised");
            }
        }

        #[cfg(any(target_os = "android", target_arch = "wasm32"))]
        log::set_max_level(level.to_level_filter());
    }
}
