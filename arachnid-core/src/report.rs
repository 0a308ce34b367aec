// Report generation from crawl results

use crate::crawl::{CrawlResult, extract_url_path};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Generate a text crawl report from results
pub fn generate_crawl_report(results: &[CrawlResult], include_sitemap: bool) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages crawled: {}\n", results.len()));

    let total_links: usize = results.iter().map(|r| r.links_found.len()).sum();
    report.push_str(&format!("  Total links found: {}\n", total_links));

    let max_depth = results.iter().map(|r| r.depth).max().unwrap_or(0);
    report.push_str(&format!("  Deepest level: {}\n", max_depth));

    report.push('\n');
    report.push_str(RULE);
    report.push('\n');

    // Group results by host, hosts sorted for stable output
    let mut by_host: BTreeMap<String, Vec<&CrawlResult>> = BTreeMap::new();
    for result in results {
        if let Ok(url) = Url::parse(&result.url)
            && let Some(host) = url.host_str()
        {
            by_host.entry(host.to_string()).or_default().push(result);
        }
    }

    for (host, host_results) in by_host.iter() {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages found\n\n", host_results.len()));

        for result in host_results {
            let path = extract_url_path(&result.url);
            let mut line = format!("  {} {}", colored_status(result.status_code), path);

            if let Some(ref title) = result.title {
                line.push_str(&format!(" \x1b[90m{}\x1b[0m", title));
            }

            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    if include_sitemap {
        report.push_str(RULE);
        report.push_str("SITE MAP\n");
        report.push_str(RULE);
        report.push('\n');
        report.push_str(&generate_sitemap_tree(results));
        report.push('\n');
    }

    report
}

fn colored_status(status_code: u16) -> String {
    match status_code {
        100..=199 => format!("\x1b[37m{}\x1b[0m", status_code), // White
        200..=299 => format!("\x1b[32m{}\x1b[0m", status_code), // Green
        300..=399 => format!("\x1b[36m{}\x1b[0m", status_code), // Cyan
        400..=499 => format!("\x1b[33m{}\x1b[0m", status_code), // Orange/Yellow
        500..=599 => format!("\x1b[31m{}\x1b[0m", status_code), // Red
        _ => format!("{}", status_code),
    }
}

/// Index results by parent. Pages whose parent was never recorded are roots.
fn children_by_parent(results: &[CrawlResult]) -> (Vec<&CrawlResult>, HashMap<&str, Vec<&CrawlResult>>) {
    let known: HashSet<&str> = results.iter().map(|r| r.url.as_str()).collect();
    let mut roots = Vec::new();
    let mut children: HashMap<&str, Vec<&CrawlResult>> = HashMap::new();

    for result in results {
        match result.parent.as_deref() {
            Some(parent) if known.contains(parent) && parent != result.url => {
                children.entry(parent).or_default().push(result)
            }
            _ => roots.push(result),
        }
    }

    roots.sort_by(|a, b| a.url.cmp(&b.url));
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.url.cmp(&b.url));
    }
    (roots, children)
}

/// Render the discovery tree: each page under the page it was first found on.
pub fn generate_sitemap_tree(results: &[CrawlResult]) -> String {
    if results.is_empty() {
        return "  (empty)\n".to_string();
    }

    let (roots, children) = children_by_parent(results);
    let mut tree = String::new();
    for root in roots {
        tree.push_str(&format!("{}  [{}]\n", root.url, root.status_code));
        render_children(&mut tree, root, &children, "");
    }
    tree
}

fn render_children(
    tree: &mut String,
    node: &CrawlResult,
    children: &HashMap<&str, Vec<&CrawlResult>>,
    indent: &str,
) {
    let Some(kids) = children.get(node.url.as_str()) else {
        return;
    };
    for (i, child) in kids.iter().enumerate() {
        let is_last = i == kids.len() - 1;
        let prefix = if is_last { "└── " } else { "├── " };
        tree.push_str(&format!(
            "{}{}{}  [{}]\n",
            indent,
            prefix,
            extract_url_path(&child.url),
            child.status_code
        ));
        let next_indent = format!("{}{}", indent, if is_last { "    " } else { "│   " });
        render_children(tree, child, children, &next_indent);
    }
}

fn sitemap_json(
    node: &CrawlResult,
    children: &HashMap<&str, Vec<&CrawlResult>>,
) -> serde_json::Value {
    let kids: Vec<serde_json::Value> = children
        .get(node.url.as_str())
        .map(|kids| kids.iter().map(|kid| sitemap_json(kid, children)).collect())
        .unwrap_or_default();
    serde_json::json!({
        "url": node.url,
        "status_code": node.status_code,
        "children": kids,
    })
}

pub fn generate_json_report(
    results: &[CrawlResult],
    include_sitemap: bool,
) -> Result<String, serde_json::Error> {
    let hosts: HashSet<String> = results
        .iter()
        .filter_map(|r| Url::parse(&r.url).ok())
        .filter_map(|u| u.host_str().map(String::from))
        .collect();
    let mut hosts: Vec<String> = hosts.into_iter().collect();
    hosts.sort();

    let sitemap = if include_sitemap {
        let (roots, children) = children_by_parent(results);
        Some(
            roots
                .iter()
                .map(|root| sitemap_json(root, &children))
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Arachnid",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": {
                "total_pages": results.len(),
                "total_links": results.iter().map(|r| r.links_found.len()).sum::<usize>(),
                "hosts": hosts
            },
            "pages": results,
            "sitemap": sitemap
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
