use arachnid_core::crawl::{CrawlOptions, CrawlResult, FollowMode, execute_crawl};
use arachnid_core::report::{
    ReportFormat, generate_crawl_report, generate_json_report, save_report,
};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Split a `Name: value` header argument
pub fn parse_header_arg(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("Invalid header '{}', expected 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid header '{}', missing name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Build crawl options from the `crawl` subcommand's arguments
pub fn crawl_options_from_matches(
    sub_matches: &ArgMatches,
    show_progress_bars: bool,
) -> Result<CrawlOptions, String> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let urls = load_urls_from_source(url, hosts_file)?;

    let headers = sub_matches
        .get_many::<String>("header")
        .into_iter()
        .flatten()
        .map(|raw| parse_header_arg(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let follow_mode = if sub_matches.get_flag("auto-follow") {
        FollowMode::Auto
    } else {
        FollowMode::Disabled
    };

    let defaults = CrawlOptions::default();
    Ok(CrawlOptions {
        urls,
        parallel_connections: sub_matches
            .get_one::<usize>("threads")
            .copied()
            .unwrap_or(defaults.parallel_connections),
        max_depth: sub_matches
            .get_one::<usize>("max-depth")
            .copied()
            .unwrap_or(defaults.max_depth),
        follow_mode,
        session: sub_matches.get_flag("session"),
        max_url_size: sub_matches
            .get_one::<usize>("max-url-size")
            .copied()
            .unwrap_or(defaults.max_url_size),
        headers,
        timeout: sub_matches
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.timeout),
        show_progress_bars,
    })
}

/// Render results in the requested format
pub fn render_report(
    results: &[CrawlResult],
    format: ReportFormat,
    include_sitemap: bool,
) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_crawl_report(results, include_sitemap)),
        ReportFormat::Json => generate_json_report(results, include_sitemap)
            .map_err(|e| format!("Failed to generate JSON report: {}", e)),
    }
}

/// Map `-v` occurrences to a log level
pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(verbosity: u8) {
    // Logs go to stderr so the report on stdout stays clean
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) {
    init_logging(sub_matches.get_count("verbose"));

    let options = match crawl_options_from_matches(sub_matches, !quiet) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let include_sitemap = sub_matches.get_flag("include-sitemap");
    let output = sub_matches.get_one::<PathBuf>("output");

    if !quiet {
        println!("\n{} Crawling {} host(s)", "🕷".bright_cyan(), options.urls.len());
        println!("Connections: {}", options.parallel_connections);
        println!("Max depth: {}", options.max_depth);
        println!("Session: {}", if options.session { "on" } else { "off" });
        let follow_mode_str = match options.follow_mode {
            FollowMode::Auto => "auto (follow all)",
            FollowMode::Disabled => "disabled (same domain only)",
        };
        println!("Cross-domain: {}\n", follow_mode_str);
    }

    let progress_callback = Arc::new(|msg: String| {
        eprintln!("{}", msg);
    });

    let all_results = match execute_crawl(options, Some(progress_callback), None).await {
        Ok(results) => results,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    let report = match render_report(&all_results, format, include_sitemap) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => match save_report(&report, path) {
            Ok(()) => println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            ),
            Err(e) => {
                eprintln!(
                    "{} Failed to save report to {}: {}",
                    "✗".red().bold(),
                    path.display(),
                    e
                );
                std::process::exit(1);
            }
        },
        None => print!("{}", report),
    }
}
