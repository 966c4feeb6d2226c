// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {slog::Drain, thiserror::Error};

#[derive(Debug, Error)]
#[error("unknown log level {0:?}; expected one of trace, debug, info, warn, error")]
pub struct UnknownLevel(pub String);

/// A slog Drain that uses eprintln!.
///
/// Standard output is reserved for progress messages.
pub struct StderrDrain {
    /// Minimum logging level that we're emitting.
    pub min_level: slog::Level,
}

impl slog::Drain for StderrDrain {
    type Ok = ();
    type Err = std::io::Error;

    fn log(
        &self,
        record: &slog::Record,
        values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.min_level) {
            let mut context = KeyValues::default();
            slog::KV::serialize(values, record, &mut context).ok();
            slog::KV::serialize(&record.kv(), record, &mut context).ok();

            eprintln!(
                "[{}] {}{}",
                record.level().as_short_str(),
                record.msg(),
                context.0
            );
        }

        Ok(())
    }
}

/// Renders key-value pairs as ` key=value` suffixes.
#[derive(Default)]
struct KeyValues(String);

impl slog::Serializer for KeyValues {
    fn emit_arguments(&mut self, key: slog::Key, val: &std::fmt::Arguments) -> slog::Result {
        self.0.push_str(&format!(" {}={}", key, val));
        Ok(())
    }
}

/// Parse a log level name.
pub fn parse_level(name: &str) -> Result<slog::Level, UnknownLevel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(slog::Level::Trace),
        "debug" => Ok(slog::Level::Debug),
        "info" => Ok(slog::Level::Info),
        "warn" | "warning" => Ok(slog::Level::Warning),
        "error" => Ok(slog::Level::Error),
        _ => Err(UnknownLevel(name.to_string())),
    }
}

/// Construct a logger for an optional level name.
///
/// Without a level, all log records are discarded.
pub fn logger_for_level(level: Option<&str>) -> Result<slog::Logger, UnknownLevel> {
    Ok(match level {
        Some(level) => slog::Logger::root(
            StderrDrain {
                min_level: parse_level(level)?,
            }
            .fuse(),
            slog::o!(),
        ),
        None => slog::Logger::root(slog::Discard, slog::o!()),
    })
}
