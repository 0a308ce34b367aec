pub mod commands;
pub mod handlers;

use colored::Colorize;

pub use commands::command_argument_builder;
pub use handlers::{
    crawl_options_from_matches, load_urls_from_file, load_urls_from_source, parse_header_arg,
    parse_url_line, render_report,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn print_banner() {
    let banner = r#"
                      _           _     _
   __ _ _ __ __ _  ___| |__  _ __ (_) __| |
  / _` | '__/ _` |/ __| '_ \| '_ \| |/ _` |
 | (_| | | | (_| | (__| | | | | | | | (_| |
  \__,_|_|  \__,_|\___|_| |_|_| |_|_|\__,_|
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} {}\n",
        "site traversal engine".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
