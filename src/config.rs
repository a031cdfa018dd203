// src/config.rs
use std::env;
use std::path::PathBuf;

// 観光庁: 宿泊旅行統計調査 (monthly trend tables)
const MONTHLY_PAGE_URL: &str =
    "https://www.mlit.go.jp/kankocho/tokei_hakusyo/shukuhakutokei.html";

// The trend-table workbook has kept a stable filename across releases;
// matching on it is more robust than anchor text alone.
const MONTHLY_XLSX_NAME_HINT: &str = "001912060.xlsx";

// 観光庁: 旅行・観光消費動向調査 (nights-stayed distribution tables)
const TCD_PAGE_URL: &str =
    "https://www.mlit.go.jp/kankocho/siryou/toukei/shouhidoukou.html";

/// Runtime configuration for an update run. Defaults point at the published
/// source pages; each field can be overridden through the environment so a
/// publisher-side URL move does not require a rebuild.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub monthly_page_url: String,
    pub monthly_name_hint: String,
    pub tcd_page_url: String,
    pub data_dir: PathBuf,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            monthly_page_url: MONTHLY_PAGE_URL.to_string(),
            monthly_name_hint: MONTHLY_XLSX_NAME_HINT.to_string(),
            tcd_page_url: TCD_PAGE_URL.to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl UpdateConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("KANKO_MONTHLY_PAGE_URL") {
            cfg.monthly_page_url = v;
        }
        if let Ok(v) = env::var("KANKO_MONTHLY_NAME_HINT") {
            cfg.monthly_name_hint = v;
        }
        if let Ok(v) = env::var("KANKO_TCD_PAGE_URL") {
            cfg.tcd_page_url = v;
        }
        if let Ok(v) = env::var("KANKO_DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        cfg
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("market_stats.sqlite")
    }
}
