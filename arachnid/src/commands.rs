use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("arachnid")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("arachnid")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a host or collection of hosts, visiting every page reachable from \
                the start address.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to crawl")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_CONNECTIONS>)
                        .required(false)
                        .help("Maximum number of downloads in flight at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"session")
                        .required(false)
                        .help("Keep cookies set by the server and send them on later requests")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("How many links deep to follow from the start page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"max-url-size" <BYTES>)
                        .required(false)
                        .help("Ignore discovered links longer than this")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("128"),
                )
                .arg(
                    arg!(--"auto-follow")
                        .required(false)
                        .help("Follow cross-domain links (default: stay on same domain)")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"header" <HEADER>)
                        .required(false)
                        .help("Extra request header as 'Name: value' (repeatable)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"include-sitemap")
                        .required(false)
                        .help("Include a visual sitemap tree in the report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Log each request (repeat for more detail)")
                        .action(clap::ArgAction::Count),
                ),
        )
}
