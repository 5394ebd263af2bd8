use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let mut redacted = s.to_string();
        for (re, replacement) in &self.patterns {
            redacted = re.replace_all(&redacted, replacement.as_str()).to_string();
        }
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Logs share stderr with the human decorations; stdout carries artifacts only.
struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

fn compile_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    if !config.redaction.enabled {
        return Vec::new();
    }
    let mut patterns = Vec::new();
    for p in &config.redaction.patterns {
        match Regex::new(&p.regex) {
            Ok(re) => patterns.push((re, p.placeholder.clone())),
            Err(e) => eprintln!("warning: ignoring redaction pattern '{}': {}", p.name, e),
        }
    }
    patterns
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level;
/// each `-v` raises it one step.
pub fn init_logging(config: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => config.levels.directive(),
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let show_file = config.format.location.show_file;
    let show_line = config.format.location.show_line;
    let make_writer = RedactingMakeWriter {
        patterns: compile_patterns(config),
    };

    let base = fmt::layer()
        .with_writer(make_writer)
        .with_target(show_file)
        .with_file(show_file)
        .with_line_number(show_line)
        .with_thread_ids(false);

    // Layer::boxed() unifies the branch types
    let fmt_layer = match (config.format.json, config.format.show_time) {
        (true, true) => base.json().boxed(),
        (true, false) => base.json().without_time().boxed(),
        (false, true) => base.boxed(),
        (false, false) => base.without_time().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedactionPattern;
    use std::io::Write;

    fn config_with(patterns: Vec<RedactionPattern>) -> LoggingConfig {
        let mut config = LoggingConfig::default();
        config.redaction.patterns = patterns;
        config
    }

    #[test]
    fn test_redacting_writer_replaces_matches() {
        let config = config_with(vec![RedactionPattern {
            name: "home".into(),
            regex: r"/home/[a-z]+".into(),
            placeholder: "/home/<user>".into(),
        }]);
        let mut writer = RedactingWriter {
            inner: Vec::new(),
            patterns: compile_patterns(&config),
        };
        let line = b"reading /home/alice/input.txt\n";
        assert_eq!(writer.write(line).unwrap(), line.len());
        assert_eq!(
            String::from_utf8(writer.inner).unwrap(),
            "reading /home/<user>/input.txt\n"
        );
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let config = config_with(vec![
            RedactionPattern {
                name: "broken".into(),
                regex: "(".into(),
                placeholder: "x".into(),
            },
            RedactionPattern {
                name: "digits".into(),
                regex: r"\d+".into(),
                placeholder: "#".into(),
            },
        ]);
        assert_eq!(compile_patterns(&config).len(), 1);
    }

    #[test]
    fn test_redaction_can_be_disabled() {
        let mut config = config_with(vec![RedactionPattern {
            name: "digits".into(),
            regex: r"\d+".into(),
            placeholder: "#".into(),
        }]);
        config.redaction.enabled = false;
        assert!(compile_patterns(&config).is_empty());
    }
}
