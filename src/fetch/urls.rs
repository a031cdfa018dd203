// src/fetch/urls.rs
use anyhow::{bail, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// One candidate workbook link found on a source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: String,
    pub link_text: String,
}

/// Fetch a source page's HTML with a small retry loop; government pages
/// intermittently drop connections.
pub async fn fetch_page(client: &Client, page_url: &str) -> Result<String> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(page_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(html) => return Ok(html),
                Err(_) if attempt < MAX_RETRIES => sleep(RETRY_DELAY).await,
                Err(e) => return Err(e.into()),
            },
            Ok(resp) if attempt >= MAX_RETRIES => {
                bail!("HTTP error fetching {page_url}: {}", resp.status())
            }
            Ok(_) => sleep(RETRY_DELAY).await,
            Err(_) if attempt < MAX_RETRIES => sleep(RETRY_DELAY).await,
            Err(e) => return Err(e.into()),
        }
    }
}

fn anchors(html: &str, base_url: &str) -> Result<Vec<CandidateLink>> {
    let selector = Selector::parse("a").expect("CSS selector for anchors should be valid");
    let base = Url::parse(base_url)?;
    let doc = Html::parse_document(html);

    let links = doc
        .select(&selector)
        .filter_map(|e| {
            let href = e.value().attr("href")?;
            let url = base.join(href).ok()?;
            let link_text = e.text().collect::<String>().trim().to_string();
            Some(CandidateLink {
                url: url.to_string(),
                link_text,
            })
        })
        .collect();
    Ok(links)
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| *c != ' ' && *c != '　').collect()
}

/// Pick the monthly trend-table workbook from the source page. Preference
/// order: the known stable filename, then an anchor mentioning 推移表, then
/// the first .xlsx as a last resort.
pub fn find_trend_table_url(html: &str, base_url: &str, name_hint: &str) -> Result<String> {
    let links: Vec<CandidateLink> = anchors(html, base_url)?
        .into_iter()
        .filter(|l| l.url.to_lowercase().ends_with(".xlsx"))
        .collect();

    if links.is_empty() {
        bail!("no .xlsx links found on source page (HTML structure may have changed)");
    }

    if let Some(l) = links.iter().find(|l| l.url.contains(name_hint)) {
        return Ok(l.url.clone());
    }
    if let Some(l) = links.iter().find(|l| l.link_text.contains("推移表")) {
        return Ok(l.url.clone());
    }
    Ok(links[0].url.clone())
}

/// Collect the consumption-trend workbook candidates. Two positive hints are
/// OR-combined (tabulation wording in the anchor text, or the publisher's
/// /content/ path in the URL) with one explicit negative override for the
/// per-prefecture reference tables; page wording drifts, so both signals are
/// kept deliberately loose.
pub fn extract_tcd_links(html: &str, base_url: &str) -> Result<Vec<CandidateLink>> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for link in anchors(html, base_url)? {
        let lower_url = link.url.to_lowercase();
        if !(lower_url.ends_with(".xlsx") || lower_url.ends_with(".xls")) {
            continue;
        }

        let compact_text = compact(&link.link_text);
        let has_target_hint =
            compact_text.contains("集計表") || lower_url.contains("/content/");
        if !has_target_hint {
            continue;
        }
        if compact_text.contains("都道府県") && compact_text.contains("参考") {
            continue;
        }

        if seen.insert(link.url.clone()) {
            out.push(link);
        }
    }

    if out.is_empty() {
        bail!("target Excel links were not found on source page");
    }
    Ok(out)
}
