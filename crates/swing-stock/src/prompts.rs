//! Prompt templates for the AI analyzers
//!
//! Each prompt has a `system` and a `user` part, both MiniJinja templates.

use crate::error::{Result, StockError};
use minijinja::Environment;
use serde::Serialize;

pub const NEWS_ANALYSIS: &str = "news_analysis";
pub const EXIT_ANALYSIS: &str = "exit_analysis";

const NEWS_SYSTEM: &str = "\
You are an equity research analyst covering Indian listed companies (NSE/BSE). \
You read recent news and judge its likely effect on the stock over the next one to four weeks. \
Respond with a single JSON object and nothing else.";

const NEWS_USER: &str = r#"Ticker: {{ ticker }}{% if company %} ({{ company }}){% endif %}

Recent news ({{ articles | length }} items):
{% for a in articles %}
{{ loop.index }}. [{{ a.source }}{% if a.published %}, {{ a.published }}{% endif %}] {{ a.title }}
{%- if a.excerpt %}
   {{ a.excerpt }}
{%- endif %}
{% endfor %}
Return JSON with these fields:
{
  "sentiment": number from -1.0 (very negative) to 1.0 (very positive),
  "score": number from 0 to 100 (50 = neutral outlook for a swing trade),
  "confidence": number from 0 to 100,
  "catalysts": array drawn from [{{ catalysts | join(", ") }}],
  "summary": one or two sentences citing the key facts (amounts, percentages)
}"#;

const EXIT_SYSTEM: &str = "\
You manage open swing-trade positions in Indian equities. \
Given the position, its technical state and recent news, decide whether to HOLD, TRIM or EXIT. \
Protect capital first. Respond with a single JSON object and nothing else.";

const EXIT_USER: &str = r#"Position: {{ ticker }}, {{ quantity }} shares bought at ₹{{ entry_price }} on {{ entry_date }}
Last close: ₹{{ close }} (P&L {{ pnl_pct }}%)
Stop loss: ₹{{ stop_loss }}{% if target %}, target: ₹{{ target }}{% endif %}

Technicals: RSI {{ rsi }}, MACD histogram {{ macd_hist }}, 20-day SMA ₹{{ sma20 }}, 50-day SMA ₹{{ sma50 }}, ATR {{ atr_pct }}% of price
{% if headlines %}
Recent headlines:
{% for h in headlines %}- {{ h }}
{% endfor %}{% endif %}
Rule-based baseline: {{ baseline_action }} (urgency {{ baseline_urgency }}): {{ baseline_reason }}

Return JSON: {"action": "HOLD" | "TRIM" | "EXIT", "urgency": 0-100, "reason": "one sentence"}"#;

/// A rendered prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// All templates used by the analyzers
pub struct PromptSet {
    env: Environment<'static>,
}

impl PromptSet {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("news_analysis.system", NEWS_SYSTEM)?;
        env.add_template("news_analysis.user", NEWS_USER)?;
        env.add_template("exit_analysis.system", EXIT_SYSTEM)?;
        env.add_template("exit_analysis.user", EXIT_USER)?;
        Ok(Self { env })
    }

    /// Render the system and user parts of prompt `name`
    pub fn render<S: Serialize>(&self, name: &str, vars: &S) -> Result<RenderedPrompt> {
        let part = |suffix: &str| -> Result<String> {
            let template = self
                .env
                .get_template(&format!("{name}.{suffix}"))
                .map_err(|_| StockError::NotFound(format!("prompt template '{name}'")))?;
            Ok(template.render(vars)?)
        };
        Ok(RenderedPrompt {
            system: part("system")?,
            user: part("user")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_news_prompt() {
        let prompts = PromptSet::new().unwrap();
        let rendered = prompts
            .render(
                NEWS_ANALYSIS,
                &json!({
                    "ticker": "LT.NS",
                    "company": "Larsen & Toubro",
                    "catalysts": ["order_win", "fraud"],
                    "articles": [
                        {"source": "ET", "published": "2024-06-03", "title": "L&T bags order", "excerpt": "Worth ₹2,500 crore"},
                        {"source": "Mint", "title": "Infra stocks rally"}
                    ]
                }),
            )
            .unwrap();

        assert!(rendered.system.contains("Indian listed companies"));
        assert!(rendered.user.contains("Ticker: LT.NS (Larsen & Toubro)"));
        assert!(rendered.user.contains("1. [ET, 2024-06-03] L&T bags order"));
        assert!(rendered.user.contains("Worth ₹2,500 crore"));
        assert!(rendered.user.contains("2. [Mint] Infra stocks rally"));
        assert!(rendered.user.contains("order_win, fraud"));
    }

    #[test]
    fn test_render_exit_prompt() {
        let prompts = PromptSet::new().unwrap();
        let rendered = prompts
            .render(
                EXIT_ANALYSIS,
                &json!({
                    "ticker": "TCS.NS", "quantity": 10, "entry_price": 3900.0,
                    "entry_date": "2024-05-01", "close": 3700.0, "pnl_pct": -5.1,
                    "stop_loss": 3588.0, "rsi": 38.2, "macd_hist": -4.2,
                    "sma20": 3800.0, "sma50": 3850.0, "atr_pct": 1.9,
                    "headlines": ["TCS wins deal"],
                    "baseline_action": "TRIM", "baseline_urgency": 55,
                    "baseline_reason": "losing position with negative momentum"
                }),
            )
            .unwrap();
        assert!(rendered.user.contains("Stop loss: ₹3588.0"));
        assert!(!rendered.user.contains("target"));
        assert!(rendered.user.contains("- TCS wins deal"));
        assert!(rendered.user.contains("TRIM (urgency 55)"));
    }

    #[test]
    fn test_unknown_prompt() {
        let prompts = PromptSet::new().unwrap();
        assert!(matches!(
            prompts.render("nope", &json!({})),
            Err(StockError::NotFound(_))
        ));
    }
}
