use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Installs the stderr logger. `RUST_LOG` overrides `level`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(level: LevelFilter) {
    let env = Env::default().default_filter_or(level.as_str());
    let result = Builder::from_env(env)
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if result.is_ok() {
        log::debug!("Logging initialized at {}", level);
    }
}
