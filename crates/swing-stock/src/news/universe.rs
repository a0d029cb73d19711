//! Tradable universe and headline-to-ticker matching
//!
//! CSV layout (`pe`..`earnings_growth` optional):
//!
//! ```text
//! symbol,name,aliases,pe,debt_to_equity,roe,earnings_growth
//! RELIANCE,Reliance Industries,RIL|Reliance Jio,24.1,0.4,9.2,
//! ```

use super::NewsArticle;
use crate::correction::Fundamentals;
use crate::error::{Result, StockError};
use crate::market::{base_symbol, normalize_symbol};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct UniverseRow {
    symbol: String,
    name: String,
    #[serde(default)]
    aliases: Option<String>,
    #[serde(default)]
    pe: Option<f64>,
    #[serde(default)]
    debt_to_equity: Option<f64>,
    #[serde(default)]
    roe: Option<f64>,
    #[serde(default)]
    earnings_growth: Option<f64>,
}

/// One company in the universe
#[derive(Debug, Clone)]
pub struct UniverseEntry {
    /// Yahoo symbol with exchange suffix
    pub symbol: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub fundamentals: Fundamentals,
    matcher: Option<Regex>,
}

const NAME_SUFFIXES: &[&str] = &[" limited", " ltd.", " ltd"];

fn strip_company_suffix(name: &str) -> &str {
    let lower = name.to_lowercase();
    NAME_SUFFIXES
        .iter()
        .find(|s| lower.ends_with(*s))
        .and_then(|s| name.get(..name.len().checked_sub(s.len())?))
        .map_or(name, str::trim_end)
}

impl UniverseEntry {
    pub fn new(symbol: &str, name: &str, aliases: Vec<String>, default_suffix: &str) -> Self {
        let symbol = normalize_symbol(symbol, default_suffix);
        let mut terms: Vec<String> = Vec::new();

        // short tickers like "M&M" or "LT" collide with ordinary words
        let bare = base_symbol(&symbol);
        if bare.len() >= 3 && !bare.starts_with('^') {
            terms.push(regex::escape(bare));
        }
        for term in std::iter::once(strip_company_suffix(name)).chain(aliases.iter().map(String::as_str)) {
            let term = term.trim();
            if !term.is_empty() {
                terms.push(regex::escape(term));
            }
        }

        let matcher = if terms.is_empty() {
            None
        } else {
            let pattern = format!(r"(?:^|\W)(?:{})(?:\W|$)", terms.join("|"));
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| warn!(symbol = %symbol, error = %e, "Bad matcher pattern"))
                .ok()
        };

        Self {
            symbol,
            name: name.trim().to_string(),
            aliases,
            fundamentals: Fundamentals::default(),
            matcher,
        }
    }

    pub fn mentioned_in(&self, text: &str) -> bool {
        self.matcher.as_ref().is_some_and(|m| m.is_match(text))
    }
}

/// The set of tickers screened in a run
#[derive(Debug, Clone, Default)]
pub struct Universe {
    entries: Vec<UniverseEntry>,
}

impl Universe {
    pub fn new(entries: Vec<UniverseEntry>) -> Self {
        Self { entries }
    }

    /// Load from a CSV file
    pub fn load(path: impl AsRef<Path>, default_suffix: &str) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            StockError::ConfigError(format!(
                "Cannot open universe file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_reader(file, default_suffix)
    }

    pub fn from_reader<R: Read>(reader: R, default_suffix: &str) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for row in csv.deserialize::<UniverseRow>() {
            let row = row?;
            if row.symbol.is_empty() {
                continue;
            }
            let aliases = row
                .aliases
                .unwrap_or_default()
                .split('|')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            let mut entry = UniverseEntry::new(&row.symbol, &row.name, aliases, default_suffix);
            entry.fundamentals = Fundamentals {
                pe: row.pe,
                debt_to_equity: row.debt_to_equity,
                roe: row.roe,
                earnings_growth: row.earnings_growth,
            };
            entries.push(entry);
        }

        debug!(tickers = entries.len(), "Loaded universe");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[UniverseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&UniverseEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    /// Symbols mentioned in `text`
    pub fn match_tickers(&self, text: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.mentioned_in(text))
            .map(|e| e.symbol.clone())
            .collect()
    }

    /// Tag each article with its tickers and bucket them per symbol
    ///
    /// Articles that mention no universe ticker are dropped.
    pub fn group_by_ticker(&self, articles: Vec<NewsArticle>) -> HashMap<String, Vec<NewsArticle>> {
        let mut grouped: HashMap<String, Vec<NewsArticle>> = HashMap::new();
        for mut article in articles {
            article.tickers = self.match_tickers(&article.headline_text());
            for ticker in article.tickers.clone() {
                grouped.entry(ticker).or_default().push(article.clone());
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
symbol,name,aliases,pe,debt_to_equity,roe,earnings_growth
RELIANCE,Reliance Industries Ltd,RIL|Jio,24.1,0.4,9.2,
TCS,Tata Consultancy Services,,30,,,
LT,Larsen & Toubro,L&T,,,,
NSE:INFY,Infosys Limited,,,,,
";

    fn universe() -> Universe {
        Universe::from_reader(CSV.as_bytes(), ".NS").unwrap()
    }

    fn article(title: &str) -> NewsArticle {
        NewsArticle {
            title: title.into(),
            url: format!("https://x.com/{}", title.len()),
            source: "t".into(),
            published: None,
            summary: String::new(),
            body: None,
            tickers: Vec::new(),
        }
    }

    #[test]
    fn test_load_csv() {
        let u = universe();
        assert_eq!(u.len(), 4);
        let reliance = u.get("RELIANCE.NS").unwrap();
        assert_eq!(reliance.aliases, vec!["RIL", "Jio"]);
        assert_eq!(reliance.fundamentals.pe, Some(24.1));
        assert!(reliance.fundamentals.earnings_growth.is_none());
        assert!(u.get("INFY.NS").is_some());
        assert!(u.get("TCS.NS").unwrap().fundamentals.debt_to_equity.is_none());
    }

    #[test]
    fn test_match_tickers() {
        let u = universe();
        assert_eq!(u.match_tickers("RIL shares rally after Jio tariff hike"), vec!["RELIANCE.NS"]);
        assert_eq!(u.match_tickers("L&T bags mega order"), vec!["LT.NS"]);
        assert_eq!(u.match_tickers("tcs and infosys lead IT gains"), vec!["TCS.NS", "INFY.NS"]);
        // symbol too short to match on its own; no word-internal matches
        assert!(u.match_tickers("Volt prices rise; Reliability concerns").is_empty());
    }

    #[test]
    fn test_company_suffix_stripped() {
        let u = universe();
        assert_eq!(u.match_tickers("Reliance Industries to demerge unit"), vec!["RELIANCE.NS"]);
        assert_eq!(u.match_tickers("Infosys wins deal"), vec!["INFY.NS"]);
    }

    #[test]
    fn test_group_by_ticker() {
        let u = universe();
        let grouped = u.group_by_ticker(vec![
            article("TCS and Infosys lead gains"),
            article("Infosys wins deal"),
            article("Monsoon update"),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["INFY.NS"].len(), 2);
        assert_eq!(grouped["TCS.NS"][0].tickers, vec!["TCS.NS", "INFY.NS"]);
    }

    #[test]
    fn test_bad_row_is_error() {
        let bad = "symbol,name,aliases,pe\nX,Co,,not-a-number\n";
        assert!(Universe::from_reader(bad.as_bytes(), ".NS").is_err());
    }
}
