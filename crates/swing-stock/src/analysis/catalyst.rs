//! News catalysts: classification and scoring weights

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Corporate event a headline points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalyst {
    EarningsBeat,
    OrderWin,
    Approval,
    Buyback,
    Upgrade,
    Dividend,
    Expansion,
    Partnership,
    Downgrade,
    EarningsMiss,
    Regulatory,
    Fraud,
    Default,
    PromoterPledge,
}

impl Catalyst {
    pub const ALL: [Catalyst; 14] = [
        Catalyst::EarningsBeat,
        Catalyst::OrderWin,
        Catalyst::Approval,
        Catalyst::Buyback,
        Catalyst::Upgrade,
        Catalyst::Dividend,
        Catalyst::Expansion,
        Catalyst::Partnership,
        Catalyst::Downgrade,
        Catalyst::EarningsMiss,
        Catalyst::Regulatory,
        Catalyst::Fraud,
        Catalyst::Default,
        Catalyst::PromoterPledge,
    ];

    /// Points added to a 0-100 catalyst score
    pub fn weight(&self) -> f64 {
        match self {
            Catalyst::EarningsBeat => 15.0,
            Catalyst::OrderWin => 12.0,
            Catalyst::Approval => 12.0,
            Catalyst::Buyback => 10.0,
            Catalyst::Upgrade => 8.0,
            Catalyst::Dividend => 5.0,
            Catalyst::Expansion => 6.0,
            Catalyst::Partnership => 6.0,
            Catalyst::Downgrade => -10.0,
            Catalyst::EarningsMiss => -15.0,
            Catalyst::Regulatory => -12.0,
            Catalyst::Fraud => -25.0,
            Catalyst::Default => -30.0,
            Catalyst::PromoterPledge => -12.0,
        }
    }

    /// Events that disqualify a ticker outright
    pub fn is_severe(&self) -> bool {
        matches!(self, Catalyst::Fraud | Catalyst::Default)
    }

    pub fn is_positive(&self) -> bool {
        self.weight() > 0.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Catalyst::EarningsBeat => "earnings_beat",
            Catalyst::OrderWin => "order_win",
            Catalyst::Approval => "approval",
            Catalyst::Buyback => "buyback",
            Catalyst::Upgrade => "upgrade",
            Catalyst::Dividend => "dividend",
            Catalyst::Expansion => "expansion",
            Catalyst::Partnership => "partnership",
            Catalyst::Downgrade => "downgrade",
            Catalyst::EarningsMiss => "earnings_miss",
            Catalyst::Regulatory => "regulatory",
            Catalyst::Fraud => "fraud",
            Catalyst::Default => "default",
            Catalyst::PromoterPledge => "promoter_pledge",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            Catalyst::EarningsBeat => {
                r"\bbeats? (estimates|expectations|street)|\bq[1-4]\b.{0,20}\bprofit (jumps|rises|surges|soars|climbs|up)|\bprofit (jumps|surges|soars|doubles)|\brecord (profit|revenue|earnings)"
            }
            Catalyst::OrderWin => {
                r"\b(bags|wins|secures|bagged|won|secured|receives|gets)\b.{0,40}\borders?\b|\border (worth|of|valued)\b|\bcontract worth\b"
            }
            Catalyst::Approval => r"\b(usfda|fda|dcgi|cdsco)\b.{0,20}\b(approval|nod)|\b(approval|nod|clearance)\b",
            Catalyst::Buyback => r"\bbuy-?backs?\b",
            Catalyst::Upgrade => r"\bupgrade[sd]?\b|\braises? target\b|\btarget (price )?(raised|hiked)\b",
            Catalyst::Downgrade => r"\bdowngrade[sd]?\b|\bcuts? target\b|\btarget (price )?cut\b",
            Catalyst::Dividend => r"\bdividends?\b",
            Catalyst::Expansion => r"\bexpansion\b|\bexpands?\b|\bnew plant\b|\bcapacity addition\b|\bcapex\b",
            Catalyst::Partnership => r"\bpartnership\b|\bpartners with\b|\bjoint venture\b|\bjv\b|\btie-?up\b|\bcollaborat",
            Catalyst::EarningsMiss => {
                r"\bmiss(es)? (estimates|expectations)|\bq[1-4]\b.{0,20}\bprofit (falls|drops|declines|slumps|plunges|down)|\bprofit (falls|drops|plunges|slumps)|\bnet loss\b"
            }
            Catalyst::Regulatory => {
                r"\bsebi (probe|order|notice|ban|penalty)|\bprobe\b|\bpenalty\b|\bshow[- ]cause\b|\braids?\b|\binvestigation\b"
            }
            Catalyst::Fraud => r"\bfraud|\bscam\b|\bembezzl|\bforensic audit\b|\baccounting irregularit",
            Catalyst::Default => r"\bdefault(s|ed)?\b|\binsolvency\b|\bbankrupt|\bnclt\b",
            Catalyst::PromoterPledge => r"\bpledg",
        }
    }
}

impl fmt::Display for Catalyst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static MATCHERS: LazyLock<Vec<(Catalyst, Regex)>> = LazyLock::new(|| {
    Catalyst::ALL
        .iter()
        .filter_map(|c| {
            RegexBuilder::new(c.pattern())
                .case_insensitive(true)
                .build()
                .ok()
                .map(|re| (*c, re))
        })
        .collect()
});

/// Catalysts mentioned in `text`, in declaration order
pub fn detect_catalysts(text: &str) -> Vec<Catalyst> {
    MATCHERS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(c, _)| *c)
        .collect()
}

/// Parse a catalyst label as returned by a model
///
/// Accepts the canonical names in any case or separator style
/// (`order_win`, `Order Win`, `ORDER-WIN`) and otherwise falls back to
/// keyword detection on the label text.
pub fn parse_catalyst(label: &str) -> Option<Catalyst> {
    let squashed: String = label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    Catalyst::ALL
        .iter()
        .find(|c| c.as_str().replace('_', "") == squashed)
        .copied()
        .or_else(|| detect_catalysts(label).into_iter().next())
}

/// Merge catalysts keeping first occurrence order
pub fn merge_catalysts(into: &mut Vec<Catalyst>, found: impl IntoIterator<Item = Catalyst>) {
    for c in found {
        if !into.contains(&c) {
            into.push(c);
        }
    }
}
