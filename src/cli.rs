use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::config;
use crate::trace::Trace;

#[derive(Debug, Parser)]
#[command(
    name = "chatcite",
    version,
    about = "Capture ChatGPT conversations as bibliographic records"
)]
struct Cli {
    /// Emit advisory trace lines on stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture one conversation page into a record (JSON on stdout).
    Cite {
        /// Conversation page URL (/c/<id>, /share/<id>, /g/<slug>/c/<id>).
        #[arg(long)]
        url: String,
        /// Saved page markup to scrape instead of a live DOM.
        #[arg(long)]
        page: Option<PathBuf>,
        /// Serialized cookie string for the session (or CHATCITE_COOKIE).
        #[arg(long)]
        cookie: Option<String>,
        /// UI language forwarded as the oai-language header.
        #[arg(long)]
        language: Option<String>,
        /// Skip all network access; resolve from markup and defaults only.
        #[arg(long)]
        offline: bool,
        /// Pretty-print the record JSON.
        #[arg(long)]
        pretty: bool,
        /// Write the record here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Produce only the snapshot document for a conversation.
    Snapshot {
        #[arg(long)]
        url: String,
        #[arg(long)]
        page: Option<PathBuf>,
        /// Render directly from a saved conversation payload (JSON).
        #[arg(long)]
        from_json: Option<PathBuf>,
        #[arg(long)]
        cookie: Option<String>,
        #[arg(long)]
        offline: bool,
        /// Write the document here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List or capture the conversations on a project dashboard page.
    Project {
        #[arg(long)]
        url: String,
        /// Saved dashboard markup (required; the candidate list lives there).
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        cookie: Option<String>,
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        pretty: bool,
        /// Print the numbered candidate list and exit.
        #[arg(long)]
        list: bool,
        /// Capture specific candidates, e.g. --select 1,3.
        #[arg(long)]
        select: Option<String>,
        /// Capture every candidate.
        #[arg(long)]
        all: bool,
    },
    /// Print effective configuration and recognized environment keys.
    Status,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // `status` must stay usable when the config file is broken; it reports
    // the problem instead of failing on it.
    if matches!(cli.command, Command::Status) {
        let report = commands::status::run()?;
        report.print();
        if !report.ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    let cfg = config::load_config()?;
    let trace = Trace::new(cli.verbose || cfg.verbose);

    match cli.command {
        Command::Cite {
            url,
            page,
            cookie,
            language,
            offline,
            pretty,
            out,
        } => {
            let opts = commands::cite::CiteOptions {
                url,
                page,
                cookie,
                language,
                offline,
                pretty,
                out,
            };
            commands::cite::run(&opts, &cfg, &trace)
        }
        Command::Snapshot {
            url,
            page,
            from_json,
            cookie,
            offline,
            out,
        } => {
            let opts = commands::snapshot::SnapshotOptions {
                url,
                page,
                from_json,
                cookie,
                offline,
                out,
            };
            commands::snapshot::run(&opts, &cfg, &trace)
        }
        Command::Project {
            url,
            page,
            cookie,
            offline,
            pretty,
            list,
            select,
            all,
        } => {
            let opts = commands::project::ProjectOptions {
                url,
                page,
                cookie,
                offline,
                pretty,
                list,
                select,
                all,
            };
            commands::project::run(&opts, &cfg, &trace)
        }
        Command::Status => unreachable!("handled before config load"),
    }
}
