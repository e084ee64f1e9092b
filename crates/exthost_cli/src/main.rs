//! Command-line front end for the extension host.
//!
//! # Responsibility
//! - Verify `exthost_core` linkage (`ping`, no arguments).
//! - Start file logging when a log directory is given (`--log-dir` or
//!   `EXTHOST_LOG_DIR`).
//! - Load a directory of manifests and print what the host derived from them.
//! - Evaluate a single when clause against an optional JSON context.

use exthost_core::when::context_from_json;
use exthost_core::{
    register_builtin_points, ExtensionHost, ExtensionManifest, HostConfig, RegisterOptions,
    StaticModuleLoader,
};
use log::warn;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

const USAGE: &str = "usage: exthost_cli [--config <file>] [--log-dir <abs-dir>] [--log-level <level>] \
[ping | inspect <dir> | when <clause> [context-json]]";

const LOG_DIR_ENV: &str = "EXTHOST_LOG_DIR";

/// Leading `--flag value` options.
#[derive(Debug, Default)]
struct Options {
    config: HostConfig,
    log_dir: Option<String>,
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let (options, rest) = split_options(args)?;
    start_logging(&options)?;
    let config = options.config;
    match rest {
        [] => {
            ping();
            Ok(())
        }
        [command] if command == "ping" => {
            ping();
            Ok(())
        }
        [command, dir] if command == "inspect" => inspect(config, Path::new(dir)),
        [command, clause] if command == "when" => evaluate(config, clause, None),
        [command, clause, context] if command == "when" => {
            evaluate(config, clause, Some(context))
        }
        _ => Err(USAGE.to_string()),
    }
}

fn ping() {
    println!("exthost_core ping={}", exthost_core::ping());
    println!("exthost_core version={}", exthost_core::core_version());
}

fn split_options(args: &[String]) -> Result<(Options, &[String]), String> {
    let mut options = Options::default();
    let mut rest = args;
    loop {
        match rest {
            [flag, path, tail @ ..] if flag == "--config" => {
                options.config = HostConfig::load(Path::new(path)).map_err(describe)?;
                rest = tail;
            }
            [flag, dir, tail @ ..] if flag == "--log-dir" => {
                options.log_dir = Some(dir.clone());
                rest = tail;
            }
            [flag, level, tail @ ..] if flag == "--log-level" => {
                options.log_level = Some(level.clone());
                rest = tail;
            }
            [flag, ..] if flag.starts_with("--") => return Err(USAGE.to_string()),
            _ => return Ok((options, rest)),
        }
    }
}

/// Installs the core's rolling file logger when a directory is configured.
fn start_logging(options: &Options) -> Result<(), String> {
    let log_dir = options
        .log_dir
        .clone()
        .or_else(|| std::env::var(LOG_DIR_ENV).ok().filter(|dir| !dir.is_empty()));
    let Some(log_dir) = log_dir else {
        if options.log_level.is_some() {
            return Err(format!("--log-level needs --log-dir or {LOG_DIR_ENV}"));
        }
        return Ok(());
    };
    let level = options
        .log_level
        .as_deref()
        .unwrap_or_else(|| exthost_core::default_log_level());
    exthost_core::init_logging(level, &log_dir).map_err(describe)
}

fn inspect(config: HostConfig, dir: &Path) -> Result<(), String> {
    let host = ExtensionHost::new(config, Rc::new(StaticModuleLoader::new()));
    let _points = register_builtin_points(&host).map_err(describe)?;

    for (path, manifest) in read_manifests(dir)? {
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if let Err(err) =
            host.register_extension(manifest, RegisterOptions::new().with_base_dir(base_dir))
        {
            warn!(
                "event=manifest_register module=cli status=error path={} error={}",
                path.display(),
                err
            );
            println!("{}: {err}", path.display());
        }
    }

    for (id, extension) in host.extensions().iter() {
        println!("{id} [{}]", extension.status);
        for reason in &extension.reasons {
            println!("  reason: {reason}");
        }
        if let Some(context) = host.extension_context(id) {
            let events: Vec<&str> = context.activation_events.iter().map(String::as_str).collect();
            println!("  events: {}", events.join(", "));
            for (point, contribution) in &context.contributions {
                println!("  {point}: {} entries", contribution.entry_count());
            }
        }
    }
    Ok(())
}

/// Reads every `*.json` file directly under `dir`, sorted by file name.
fn read_manifests(dir: &Path) -> Result<Vec<(PathBuf, ExtensionManifest)>, String> {
    let entries = fs::read_dir(dir).map_err(|err| format!("{}: {err}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut manifests = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|err| format!("{}: {err}", path.display()))?;
        match ExtensionManifest::from_json_str(&text) {
            Ok(manifest) => manifests.push((path, manifest)),
            Err(err) => {
                warn!(
                    "event=manifest_read module=cli status=error path={} error={}",
                    path.display(),
                    err
                );
                println!("{}: {err}", path.display());
            }
        }
    }
    Ok(manifests)
}

fn evaluate(config: HostConfig, clause: &str, context: Option<&String>) -> Result<(), String> {
    let host = ExtensionHost::new(config, Rc::new(StaticModuleLoader::new()));
    if let Some(raw) = context {
        let json: serde_json::Value = serde_json::from_str(raw).map_err(describe)?;
        host.replace_framework_context(context_from_json(json));
    }
    let holds = host.evaluate_when(clause).map_err(describe)?;
    println!("{holds}");
    Ok(())
}

fn describe(err: impl Display) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::{read_manifests, run, split_options};
    use std::fs;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn leading_options_are_split_from_the_command() {
        let raw = args(&["--log-level", "warn", "--log-dir", "/var/log/exthost", "when", "a"]);
        let (options, rest) = split_options(&raw).expect("options parse");
        assert_eq!(options.log_dir.as_deref(), Some("/var/log/exthost"));
        assert_eq!(options.log_level.as_deref(), Some("warn"));
        assert_eq!(rest, args(&["when", "a"]).as_slice());

        let err = split_options(&args(&["--log-dir"])).expect_err("missing value");
        assert!(err.starts_with("usage:"));
    }

    #[test]
    fn log_dir_option_starts_file_logging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_dir = dir.path().join("logs");
        let log_dir = log_dir.to_str().expect("utf-8 path").to_string();

        run(&args(&["--log-dir", &log_dir, "--log-level", "info", "ping"]))
            .expect("logging starts");

        let (level, active_dir) = exthost_core::logging_status().expect("logging active");
        assert_eq!(level, "info");
        assert_eq!(active_dir.to_str(), Some(log_dir.as_str()));
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn relative_log_dir_is_refused() {
        let err = run(&args(&["--log-dir", "logs", "ping"])).expect_err("relative dir");
        assert!(err.contains("absolute"));
    }

    #[test]
    fn manifests_are_read_in_name_order_and_bad_files_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("b.json"),
            r#"{"provider":"acme","name":"beta"}"#,
        )
        .expect("write b");
        fs::write(
            dir.path().join("a.json"),
            r#"{"provider":"acme","name":"alpha"}"#,
        )
        .expect("write a");
        fs::write(dir.path().join("broken.json"), "{").expect("write broken");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write txt");

        let manifests = read_manifests(dir.path()).expect("directory readable");
        let ids: Vec<String> = manifests.iter().map(|(_, m)| m.id()).collect();
        assert_eq!(ids, vec!["acme.alpha", "acme.beta"]);
    }

    #[test]
    fn unknown_commands_print_usage() {
        let err = run(&["frobnicate".to_string()]).expect_err("unknown command");
        assert!(err.starts_with("usage:"));
    }

    #[test]
    fn when_command_accepts_a_context() {
        run(&[
            "when".to_string(),
            "view == dataSources".to_string(),
            r#"{"view":"dataSources"}"#.to_string(),
        ])
        .expect("clause evaluates");
        run(&["when".to_string(), "a ==".to_string()]).expect_err("malformed clause");
    }
}
