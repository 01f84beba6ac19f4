mod config;
mod error;
mod fetch;
mod images;
mod index;
mod parser;
mod patterns;
mod post;
mod projector;
mod publish;
mod source;
mod utils;
mod verify;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::BlogConfig;
use crate::fetch::HttpFetcher;
use crate::publish::{PublishRequest, PublishSummary};
use crate::source::DocSource;
use crate::verify::{CheckReport, VerificationReport};

#[derive(Parser)]
#[command(name = "publish", about = "Turn an exported Google Doc into a blog post")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a document (share URL or zipped web-page export)
    Publish {
        /// Google Doc URL or path to a .zip export
        source: String,
        /// Description for the header and index (default: opening of the post)
        #[arg(long)]
        subtitle: Option<String>,
        /// Publication date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Overwrite an existing post with the same slug
        #[arg(long)]
        force: bool,
        /// Stop before writing the post or touching the index
        #[arg(long)]
        dry_run: bool,
        /// Blog root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Check environment, template, index and git setup
    Verify {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Blog root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Publish {
            source,
            subtitle,
            date,
            force,
            dry_run,
            root,
        } => {
            let config = BlogConfig::load(root.as_deref()).context("loading configuration")?;
            let fetcher = HttpFetcher::new().context("building HTTP client")?;
            let request = PublishRequest {
                source: DocSource::detect(&source),
                subtitle,
                date,
                force,
                dry_run,
            };
            let summary = publish::publish(&config, &request, &fetcher)?;
            print_summary(&summary, &config);
            Ok(())
        }
        Commands::Verify { json, root } => {
            let config = BlogConfig::load(root.as_deref()).context("loading configuration")?;
            let report = verify::run_full(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if !report.passed {
                std::process::exit(1);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_summary(summary: &PublishSummary, config: &BlogConfig) {
    let meta = &summary.metadata;
    println!("Title:        {}", meta.title);
    println!("Subtitle:     {}", truncate(&meta.subtitle, 60));
    println!("Reading time: ~{} min", meta.reading_time_minutes);
    println!("Images:       {}", summary.image_count);
    for w in &summary.image_warnings {
        println!("  ! {}", w);
    }

    if summary.dry_run {
        println!("\nDry run - would create:");
        println!("  Post:   {}", summary.post_path.display());
        println!("  Images: {}/", summary.asset_dir.display());
        println!("  Index:  would add entry to {}", config.index_file);
        return;
    }

    println!("\nCreated: {}", summary.post_path.display());
    if !summary.projection_warnings.is_empty() {
        println!("Template warnings:");
        for w in &summary.projection_warnings {
            println!("  ! {}", w);
        }
    }
    match (&summary.index_outcome, &summary.index_failure) {
        (Some(outcome), _) => println!("Index: {} ({}.bak kept)", outcome, config.index_file),
        (None, Some(reason)) => println!("Index: {}", reason),
        (None, None) => {}
    }
    if summary.image_count > 0 {
        println!("Images: {}/", summary.asset_dir.display());
    }

    println!("\nWhen ready, run:");
    for cmd in summary.git_commands(config) {
        println!("  {}", cmd);
    }
}

fn print_check(label: &str, check: &CheckReport, ok_line: &str) {
    if check.passed {
        println!("[ok] {}: {}", label, ok_line);
    } else {
        println!("[!!] {} issues:", label);
        for issue in &check.issues {
            println!("   - {}", issue);
        }
    }
    for w in &check.warnings {
        println!("   ~ {}", w);
    }
}

fn print_report(report: &VerificationReport) {
    print_check("Environment", &report.environment, "all paths exist");

    if let Some(template) = &report.template {
        println!();
        print_check("Template", &template.check, "all patterns found");
        for p in &template.patterns {
            println!("      {} {}", if p.found { "+" } else { "-" }, p.name);
        }
    }
    if let Some(index) = &report.index {
        println!();
        print_check("Index", index, "structure valid");
    }
    if let Some(git) = &report.git {
        println!();
        if git.passed {
            println!("[ok] Git: repository ready");
        } else {
            println!("[~~] Git issues (publishing still works, pushing may not):");
            for issue in &git.issues {
                println!("   - {}", issue);
            }
        }
    }

    println!();
    if report.passed {
        println!("All checks passed. Ready to publish.");
    } else {
        println!("Fix the issues above before publishing.");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
