//! Headline classification.
//!
//! Turns a raw news item into a tagged signal independent of any trading
//! logic. Rules are checked in order:
//! 1. pipeline ticker + dollar amount -> `PipelineUpdate`
//! 2. ACTUAL ... FORECAST ... -> `ScheduledReport` (or a parse error)
//! 3. disruption keyword -> `Disruption`
//! 4. anything else -> `Unclassified`

use crate::error::{Result, TradingError};
use crate::exchange::NewsItem;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// What a headline means for the engines.
#[derive(Debug, Clone, PartialEq)]
pub enum NewsSignal {
    /// Weekly inventory report. Draws are negative, builds positive.
    ScheduledReport { actual: Decimal, forecast: Decimal },
    /// Supply disruption (strike, hurricane, ...).
    Disruption { keyword: String },
    /// New lease price for a pipeline.
    PipelineUpdate { route: String, amount: Decimal },
    Unclassified,
}

impl NewsSignal {
    /// Positive when inventories came in tighter than forecast (bullish).
    pub fn report_surprise(actual: Decimal, forecast: Decimal) -> Result<Decimal> {
        forecast.checked_sub(actual).ok_or_else(|| {
            TradingError::Parse(format!(
                "report surprise out of range (actual {}, forecast {})",
                actual, forecast
            ))
        })
    }
}

pub struct HeadlineClassifier {
    number: Regex,
    dollars: Regex,
    pipeline_routes: Vec<String>,
    disruption_keywords: Vec<String>,
}

impl HeadlineClassifier {
    pub fn new(pipeline_routes: Vec<String>, disruption_keywords: Vec<String>) -> Self {
        let number = Regex::new(r"[-+]?\d*\.\d+|\d+").expect("Failed to compile number regex");
        let dollars = Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("Failed to compile dollar regex");

        Self {
            number,
            dollars,
            pipeline_routes: pipeline_routes.into_iter().map(|r| r.to_uppercase()).collect(),
            disruption_keywords: disruption_keywords
                .into_iter()
                .map(|k| k.to_uppercase())
                .collect(),
        }
    }

    pub fn classify(&self, item: &NewsItem) -> Result<NewsSignal> {
        let headline = item.headline.to_uppercase();
        let ticker = item.ticker.to_uppercase();

        if self.pipeline_routes.contains(&ticker) {
            if let Some(amount) = self.dollar_amount(&headline)? {
                return Ok(NewsSignal::PipelineUpdate {
                    route: ticker,
                    amount,
                });
            }
        }

        if headline.contains("ACTUAL") && headline.contains("FORECAST") {
            return self.parse_report(&headline);
        }

        if let Some(keyword) = self
            .disruption_keywords
            .iter()
            .find(|k| headline.contains(k.as_str()))
        {
            return Ok(NewsSignal::Disruption {
                keyword: keyword.clone(),
            });
        }

        Ok(NewsSignal::Unclassified)
    }

    /// "WEEK 1 ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS"
    fn parse_report(&self, headline: &str) -> Result<NewsSignal> {
        let after_actual = headline
            .split_once("ACTUAL")
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let actual_segment = after_actual
            .split_once("VS")
            .map(|(segment, _)| segment)
            .unwrap_or(after_actual);
        let forecast_segment = headline
            .split_once("FORECAST")
            .map(|(_, rest)| rest)
            .unwrap_or_default();

        let actual = self.signed_quantity(actual_segment)?;
        let forecast = self.signed_quantity(forecast_segment)?;

        Ok(NewsSignal::ScheduledReport { actual, forecast })
    }

    /// First number in `segment`, negated for draws.
    fn signed_quantity(&self, segment: &str) -> Result<Decimal> {
        let text = self
            .number
            .find(segment)
            .ok_or_else(|| TradingError::Parse(format!("no number in '{}'", segment.trim())))?
            .as_str();
        let value = Decimal::from_str(text)
            .map_err(|e| TradingError::Parse(format!("bad number '{}': {}", text, e)))?;

        Ok(if segment.contains("DRAW") { -value } else { value })
    }

    fn dollar_amount(&self, headline: &str) -> Result<Option<Decimal>> {
        let Some(captures) = self.dollars.captures(headline) else {
            return Ok(None);
        };
        let digits = captures[1].replace(',', "");
        Decimal::from_str(&digits)
            .map(Some)
            .map_err(|e| TradingError::Parse(format!("bad dollar amount '{}': {}", digits, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn classifier() -> HeadlineClassifier {
        HeadlineClassifier::new(
            vec!["AK-CS-PIPE".to_string(), "CS-NYC-PIPE".to_string()],
            vec!["STRIKE".to_string(), "HURRICANE".to_string()],
        )
    }

    fn item(ticker: &str, headline: &str) -> NewsItem {
        NewsItem {
            news_id: 1,
            ticker: ticker.to_string(),
            headline: headline.to_string(),
            body: String::new(),
            tick: None,
        }
    }

    #[test]
    fn test_scheduled_report_draws() {
        let signal = classifier()
            .classify(&item("CL", "ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS"))
            .unwrap();
        assert_eq!(
            signal,
            NewsSignal::ScheduledReport {
                actual: dec!(-14),
                forecast: dec!(-5)
            }
        );
        assert_eq!(NewsSignal::report_surprise(dec!(-14), dec!(-5)).unwrap(), dec!(9));
    }

    #[test]
    fn test_report_surprise_overflow_is_parse_error() {
        let err = NewsSignal::report_surprise(Decimal::MAX, -Decimal::MAX).unwrap_err();
        assert!(matches!(err, TradingError::Parse(_)));
    }

    #[test]
    fn test_scheduled_report_with_week_prefix_and_build() {
        let signal = classifier()
            .classify(&item("CL", "Week 3 actual build 2.5 MLN BBLS vs forecast draw 1 MLN BBLS"))
            .unwrap();
        assert_eq!(
            signal,
            NewsSignal::ScheduledReport {
                actual: dec!(2.5),
                forecast: dec!(-1)
            }
        );
    }

    #[test]
    fn test_malformed_report_is_parse_error() {
        let err = classifier()
            .classify(&item("CL", "ACTUAL DRAW VS FORECAST DRAW 5 MLN BBLS"))
            .unwrap_err();
        assert!(matches!(err, TradingError::Parse(_)));
    }

    #[test]
    fn test_disruption_keyword() {
        let signal = classifier()
            .classify(&item("CL", "Refinery workers go on strike in the Gulf"))
            .unwrap();
        assert_eq!(
            signal,
            NewsSignal::Disruption {
                keyword: "STRIKE".to_string()
            }
        );
    }

    #[test]
    fn test_pipeline_update() {
        let signal = classifier()
            .classify(&item("AK-CS-PIPE", "AK-CS pipeline lease now costs $35,500 per use"))
            .unwrap();
        assert_eq!(
            signal,
            NewsSignal::PipelineUpdate {
                route: "AK-CS-PIPE".to_string(),
                amount: dec!(35500)
            }
        );
    }

    #[test]
    fn test_pipeline_ticker_without_amount_falls_through() {
        let signal = classifier()
            .classify(&item("CS-NYC-PIPE", "Pipeline maintenance scheduled"))
            .unwrap();
        assert_eq!(signal, NewsSignal::Unclassified);
    }

    #[test]
    fn test_unclassified() {
        let signal = classifier()
            .classify(&item("CL", "Analysts expect a quiet week"))
            .unwrap();
        assert_eq!(signal, NewsSignal::Unclassified);
    }
}
