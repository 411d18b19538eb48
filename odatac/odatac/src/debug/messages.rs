use log::{Metadata, Record};

use super::{log_entry, log_is_enabled, DebugEntryKind, Message};

/// Routes `log` records of the compiler crates into the debug log while it
/// is started, and onto stderr otherwise.
///
/// Filtering by level is left to `log::set_max_level`.
pub struct MessageLogger;

impl MessageLogger {
    fn is_compiler_record(metadata: &Metadata) -> bool {
        let target = metadata.target();
        target.starts_with("odatac")
    }
}

impl log::Log for MessageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        Self::is_compiler_record(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if !log_is_enabled() {
            anstream::eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
            return;
        }

        log_entry(|| {
            DebugEntryKind::Message(Message {
                level: record.level().to_string(),
                file: record.file().map(str::to_string),
                line: record.line(),
                module_path: record.module_path().map(str::to_string),
                text: record.args().to_string(),
            })
        });
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod test {
    use log::{Level, Log};

    use super::*;

    #[test]
    fn test_compiler_records_only() {
        let logger = MessageLogger;
        let ours = Metadata::builder().target("odatac::sql").level(Level::Debug).build();
        let parser = Metadata::builder().target("odatac_parser::lexer").level(Level::Trace).build();
        let theirs = Metadata::builder().target("clap_builder").level(Level::Error).build();

        assert!(logger.enabled(&ours));
        assert!(logger.enabled(&parser));
        assert!(!logger.enabled(&theirs));
    }
}
