use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::capture::{CaptureOverrides, capture_record};
use crate::chatgpt::Backend;
use crate::commands::cite::build_page;
use crate::config::CiteConfig;
use crate::net::client::ApiClient;
use crate::net::http;
use crate::project::project_conversations;
use crate::record::Record;
use crate::trace::Trace;

#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub url: String,
    pub page: PathBuf,
    pub cookie: Option<String>,
    pub offline: bool,
    pub pretty: bool,
    pub list: bool,
    pub select: Option<String>,
    pub all: bool,
}

fn parse_selection(raw: &str, available: usize) -> Result<Vec<usize>> {
    let mut out = Vec::new();
    for token in raw.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let index: usize = trimmed
            .parse()
            .with_context(|| format!("invalid selection index `{trimmed}`"))?;
        if index == 0 || index > available {
            bail!("selection index {index} out of range 1..={available}");
        }
        if !out.contains(&(index - 1)) {
            out.push(index - 1);
        }
    }
    if out.is_empty() {
        bail!("selection `{raw}` named no conversations");
    }
    Ok(out)
}

pub fn run(opts: &ProjectOptions, cfg: &CiteConfig, trace: &Trace) -> Result<()> {
    let mut cfg = cfg.clone();
    if opts.offline {
        cfg.offline = true;
    }

    let page = build_page(&opts.url, Some(&opts.page), opts.cookie.as_deref(), None)?;
    let conversations = project_conversations(&page);
    if conversations.is_empty() {
        bail!("no project conversations found in {}", opts.page.display());
    }

    if opts.list {
        for (index, conversation) in conversations.iter().enumerate() {
            println!(
                "{}. {} {}",
                index + 1,
                conversation.label,
                conversation.absolute_url
            );
        }
        return Ok(());
    }

    let indices: Vec<usize> = if opts.all {
        (0..conversations.len()).collect()
    } else {
        let Some(selection) = &opts.select else {
            bail!("pass --list to inspect candidates, then --select or --all to capture");
        };
        parse_selection(selection, conversations.len())?
    };

    let chain = http::build_chain(&page, &cfg);
    let backend = Backend::new(ApiClient::new(&page, chain, &cfg, trace));

    // One record per chosen conversation, resolved sequentially so each
    // capture can reuse the session auth cached by the previous one.
    let mut records: Vec<Record> = Vec::new();
    for index in indices {
        let conversation = &conversations[index];
        let overrides = CaptureOverrides {
            page_url: Some(conversation.absolute_url.clone()),
            conversation_id: Some(conversation.conversation_id.clone()),
            project_slug: conversation.project_slug.clone(),
            project_url: Some(page.url.clone()),
        };
        records.push(capture_record(&backend, &page, &overrides));
    }

    let serialized = if opts.pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    println!("{serialized}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_selection;

    #[test]
    fn selections_are_one_based_and_deduplicated() {
        assert_eq!(parse_selection("1,3,1", 3).unwrap(), vec![0, 2]);
    }

    #[test]
    fn out_of_range_selection_fails() {
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection(" , ", 3).is_err());
    }
}
