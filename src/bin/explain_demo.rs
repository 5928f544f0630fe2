//! Demo: explain one ticker/day with the mock news feed and print the JSON,
//! market and news views included.
//!
//! ```text
//! explain_demo AAPL 2025-11-03                 # price from Yahoo
//! explain_demo AAPL 2025-11-03 268.0 275.5     # static open/close, fully offline
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use finexplain::models::Backends;
use finexplain::sources::{MockNewsSource, PriceSource, StaticPriceSource, YahooPriceSource};
use finexplain::{init_tracing, ExplainConfig, Explainer};

fn usage() -> ExitCode {
    eprintln!("usage: explain_demo TICKER YYYY-MM-DD [OPEN CLOSE]");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 2 && args.len() != 4 {
        return usage();
    }
    let ticker = args[0].clone();
    let Ok(date) = NaiveDate::parse_from_str(&args[1], "%Y-%m-%d") else {
        return usage();
    };

    let cfg = match ExplainConfig::from_toml() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let prices: Arc<dyn PriceSource> = if args.len() == 4 {
        let (Ok(open), Ok(close)) = (args[2].parse::<f64>(), args[3].parse::<f64>()) else {
            return usage();
        };
        Arc::new(StaticPriceSource::new().with_open_close(&ticker, date, open, close))
    } else {
        match YahooPriceSource::new(
            &cfg.prices.yahoo_endpoint,
            Duration::from_millis(cfg.prices.timeout_ms),
        ) {
            Ok(src) => Arc::new(src),
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    };

    let backends = match Backends::from_config(&cfg) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("backend error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let explainer = Explainer::from_config(prices, Arc::new(MockNewsSource::new()), backends, &cfg);

    match explainer.explain_report(&ticker, date).await {
        Ok(ex) => match serde_json::to_string_pretty(&ex) {
            Ok(s) => {
                println!("{s}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("serialize: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("{} ({})", e, e.code());
            ExitCode::FAILURE
        }
    }
}
