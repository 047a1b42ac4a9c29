// hts-label: command-line driver for the label pipeline.
//
// Loads a JSON score, builds a phonemizer from a config file (or flags),
// runs set-up over the whole score and prints each note group's phonemes
// with their tick offsets. Score and timing labels are left in the cache
// directory for inspection.
//
// Usage:
//   cargo run -p cantor_hts --bin hts-label -- <score.json> [--config config.json]
//     [--dict dict.json] [--table file.table] [--conf file.conf]
//     [--out cache_dir] [--uniform-ms N]
//
// Flags override the corresponding config fields.

use cantor_hts::config::EngineKind;
use cantor_hts::{HtsConfig, Score};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().collect();

    let Some(score_path) = args.get(1).filter(|s| !s.starts_with("--")) else {
        eprintln!("usage: hts-label <score.json> [--config FILE] [--dict FILE] [--table FILE] [--conf FILE] [--out DIR] [--uniform-ms N]");
        return ExitCode::FAILURE;
    };

    let mut config = match parse_flag::<PathBuf>(&args, "--config") {
        Some(path) => match HtsConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => HtsConfig::default(),
    };
    if let Some(dict) = parse_flag(&args, "--dict") {
        config.voicebank.dictionary = Some(dict);
    }
    if let Some(table) = parse_flag(&args, "--table") {
        config.voicebank.table = Some(table);
    }
    if let Some(conf) = parse_flag(&args, "--conf") {
        config.voicebank.conf = Some(conf);
    }
    if let Some(out) = parse_flag(&args, "--out") {
        config.cache_dir = out;
    }
    if let Some(ms) = parse_flag(&args, "--uniform-ms") {
        config.engine.kind = EngineKind::Uniform;
        config.engine.uniform_phoneme_ms = ms;
    }

    let score = match std::fs::read_to_string(score_path)
        .map_err(|e| e.to_string())
        .and_then(|text| Score::from_json(&text).map_err(|e| e.to_string()))
    {
        Ok(score) => score,
        Err(e) => {
            eprintln!("failed to load {score_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut phonemizer = match config.build_phonemizer() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("=== hts-label ===");
    println!("Score: {}", Path::new(score_path).display());
    println!("Engine: {}", phonemizer.backend_name());
    println!("Cache: {}", config.cache_dir.display());
    println!();

    let groups = score.groups();
    let report = phonemizer.set_up(&groups, &score.time_axis, score.key);
    println!(
        "{} phrase(s), {} failed, {} note group(s)",
        report.phrases,
        report.failed,
        groups.len()
    );
    for group in &groups {
        let Some(lead) = group.first() else { continue };
        if lead.is_continuation() {
            continue;
        }
        let phonemes: Vec<String> = phonemizer
            .process_or_error_phoneme(group)
            .iter()
            .map(|t| format!("{}@{}", t.symbol, t.position))
            .collect();
        println!("{:>7} {:<8} {}", lead.position, lead.lyric, phonemes.join(" "));
    }

    if report.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Parse `--flag value` from the argument list.
fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
