use exthost_core::compile_when_clause;
use exthost_core::when::context_from_json;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::sync::{Mutex, Once};

/// Keeps every warning emitted in this test binary.
struct CapturingLogger {
    warnings: Mutex<Vec<String>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() == Level::Warn {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    warnings: Mutex::new(Vec::new()),
};
static INSTALL: Once = Once::new();

fn install_logger() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in this binary");
        log::set_max_level(LevelFilter::Warn);
    });
}

fn fault_warnings_for(clause: &str) -> usize {
    let needle = format!("clause={clause:?}");
    LOGGER
        .warnings
        .lock()
        .expect("warnings lock")
        .iter()
        .filter(|message| message.contains("event=when_eval") && message.contains(&needle))
        .count()
}

#[test]
fn runtime_faults_are_logged_once_per_clause() {
    install_logger();
    let ctx = context_from_json(json!({ "label": "text", "count": 3 }));

    let membership = compile_when_clause("'needle' in label").expect("compiles");
    for _ in 0..5 {
        assert!(!membership.evaluate(&ctx));
    }
    assert_eq!(fault_warnings_for("'needle' in label"), 1);

    // Recompiling the same text reuses the predicate, and with it the flag.
    let again = compile_when_clause("'needle' in label").expect("compiles");
    assert!(!again.evaluate(&ctx));
    assert_eq!(fault_warnings_for("'needle' in label"), 1);

    let call = compile_when_clause("count(1) && label").expect("compiles");
    for _ in 0..3 {
        assert!(!call.evaluate(&ctx));
    }
    assert_eq!(fault_warnings_for("count(1) && label"), 1);
    assert_eq!(fault_warnings_for("'needle' in label"), 1);
}
