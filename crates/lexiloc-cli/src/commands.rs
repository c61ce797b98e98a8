use std::path::PathBuf;

use color_eyre::eyre::{bail, Result};
use owo_colors::OwoColorize;
use tracing::{debug, info};

use lexiloc_config::LexilocConfig;
use lexiloc_services::{ContextOptions, LocalizationContext};

use crate::Commands;

fn context_options(cfg: &LexilocConfig, app_id: Option<String>) -> ContextOptions {
    ContextOptions {
        app_id: app_id
            .or_else(|| cfg.app_id.clone())
            .unwrap_or_else(|| "app".to_string()),
        default_lang: cfg.default_lang.clone().unwrap_or_else(|| "en".to_string()),
        fallback: cfg.fallback.clone().unwrap_or_default(),
        product_version: cfg.product_version.clone().unwrap_or_else(|| "0".to_string()),
    }
}

fn data_dir(cfg: &LexilocConfig, arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| cfg.data_dir.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn open_context(
    cfg: &LexilocConfig,
    dir: Option<PathBuf>,
    app_id: Option<String>,
) -> Result<LocalizationContext> {
    let dir = data_dir(cfg, dir);
    debug!(dir = %dir.display(), "opening localization context");
    Ok(LocalizationContext::open(&dir, context_options(cfg, app_id))?)
}

pub fn run(cmd: Commands, cfg: &LexilocConfig, use_color: bool) -> Result<()> {
    match cmd {
        Commands::Scan {
            data_dir: dir,
            app_id,
            format,
        } => {
            let ctx = open_context(cfg, dir, app_id)?;
            let entries = ctx.entries();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for e in &entries {
                    let units = e
                        .units
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "not loaded".to_string());
                    println!("{}\t{}\t{}", e.lang, units, e.path);
                }
            }
            Ok(())
        }

        Commands::Resolve {
            data_dir: dir,
            app_id,
            lang,
            id,
            display,
            tooltip,
            shortcut,
        } => {
            let mut ctx = open_context(cfg, dir, app_id)?;
            let value = if tooltip {
                ctx.resolve_tooltip(&lang, &id, display)
            } else if shortcut {
                ctx.resolve_shortcut(&lang, &id, display)
            } else {
                ctx.resolve(&lang, &id, display)
            };
            match value {
                Some(v) => {
                    println!("{v}");
                    Ok(())
                }
                None => bail!("no value for id '{id}' in '{lang}' or any fallback"),
            }
        }

        Commands::Merge {
            new,
            old,
            out,
            format,
        } => {
            let new_doc = lexiloc_parsers_xml::read_document(&new)?;
            let (merged, report) = lexiloc_services::merge_with_baseline(&new_doc, &old)?;
            lexiloc_parsers_xml::write_document(&out, &merged)?;
            info!(out = %out.display(), units = merged.len(), "merged document written");
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_merge_summary(&report, use_color);
            }
            Ok(())
        }

        Commands::Validate {
            data_dir: dir,
            app_id,
            format,
        } => {
            let mut ctx = open_context(cfg, dir, app_id)?;
            let issues = ctx.validate_markers();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("no marker issues found");
            } else {
                for i in &issues {
                    let kind = if i.repairable { "repairable" } else { "invalid" };
                    if use_color {
                        let colored = if i.repairable {
                            format!("{}", kind.yellow())
                        } else {
                            format!("{}", kind.red())
                        };
                        println!("[{colored}] {} ({}) expected {} marker(s): {}", i.id, i.lang, i.expected_arity, i.value);
                    } else {
                        println!("[{kind}] {} ({}) expected {} marker(s): {}", i.id, i.lang, i.expected_arity, i.value);
                    }
                }
            }
            if issues.iter().any(|i| !i.repairable) {
                bail!("unrepairable marker issues found");
            }
            Ok(())
        }

        Commands::Save {
            data_dir: dir,
            app_id,
            force_langs,
        } => {
            let mut ctx = open_context(cfg, dir, app_id)?;
            // Loading every registration surfaces pending repairs to save.
            let tags: Vec<String> = ctx
                .entries()
                .iter()
                .map(|e| e.lang.clone())
                .collect();
            for tag in &tags {
                let _ = ctx.try_get(tag);
            }
            let forced = if force_langs.is_empty() {
                cfg.save
                    .as_ref()
                    .and_then(|s| s.force_langs.clone())
                    .unwrap_or_default()
            } else {
                force_langs
            };
            let report = ctx.save_if_dirty(&forced)?;
            if report.saved.is_empty() && report.skipped.is_empty() {
                println!("nothing to save");
            } else {
                for path in &report.saved {
                    println!("saved {path}");
                }
                for lang in &report.skipped {
                    println!("skipped {lang} (no customized file; use --force-lang)");
                }
            }
            Ok(())
        }
    }
}

fn print_merge_summary(report: &lexiloc_domain::MergeReport, use_color: bool) {
    let line = format!(
        "new: {}  changed: {}  wrong-dynamic: {}  missing: {}  missing-dynamic: {}",
        report.new.len(),
        report.changed.len(),
        report.wrong_dynamic_flag.len(),
        report.missing.len(),
        report.missing_dynamic.len(),
    );
    if use_color {
        println!("{} {line}", "✔".green());
    } else {
        println!("{line}");
    }
    for (label, ids) in [
        ("new", &report.new),
        ("changed", &report.changed),
        ("wrong-dynamic", &report.wrong_dynamic_flag),
        ("missing", &report.missing),
        ("missing-dynamic", &report.missing_dynamic),
    ] {
        for id in ids {
            println!("  [{label}] {id}");
        }
    }
}
