use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine};

use crate::config::RhaiConfig;

/// Creates a Rhai engine with security features and custom configurations.
pub fn create_engine(rhai_config: &RhaiConfig) -> Engine {
    let mut engine = Engine::new();

    // Apply security limits
    engine.set_max_operations(rhai_config.max_operations);
    engine.set_max_call_levels(rhai_config.max_call_levels);
    engine.set_max_string_size(rhai_config.max_string_size);
    engine.set_max_array_size(rhai_config.max_array_size);
    engine.set_max_map_size(rhai_config.max_map_size);

    // Disable dangerous language features
    const DANGEROUS_SYMBOLS: &[&str] =
        &["eval", "import", "export", "File", "file", "http", "net", "system", "process", "thread", "spawn"];
    for &symbol in DANGEROUS_SYMBOLS {
        engine.disable_symbol(symbol);
    }

    engine.on_print(|text| tracing::info!(target: "vigil::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: "vigil::script", source = source.unwrap_or_default(), %pos, "{text}")
    });

    engine
}

/// Stops evaluation once `timeout` has elapsed from now. The engine reports
/// this as `ErrorTerminated`.
pub fn set_deadline(engine: &mut Engine, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    engine.on_progress(move |_| (Instant::now() >= deadline).then_some(Dynamic::UNIT));
}
