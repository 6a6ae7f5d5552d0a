use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize structured logging once. Safe to call repeatedly; later calls
/// are no-ops because the global default is already set.
pub fn init(level: Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
