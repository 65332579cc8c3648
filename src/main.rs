//! Headless dashboard driver: start every panel, log summaries, stop on
//! deadline or Ctrl-C.

use anyhow::Result;
use serde_json::json;
use tokio::time::{interval, sleep, Duration};

use trafficops::config::Config;
use trafficops::dashboard::Dashboard;
use trafficops::logging::{log, obj, tick_aggregator, v_str, Domain, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("seed", cfg.seed.map(|s| json!(s)).unwrap_or(json!(null))),
            ("run_secs", json!(cfg.run_secs)),
            ("override_secs", json!(cfg.override_secs)),
        ]),
    );

    let mut dashboard = Dashboard::new(&cfg);
    dashboard.start_all();

    let deadline = async {
        if cfg.run_secs == 0 {
            std::future::pending::<()>().await
        } else {
            sleep(Duration::from_secs(cfg.run_secs)).await
        }
    };
    tokio::pin!(deadline);

    let mut summaries = interval(Duration::from_secs(cfg.summary_secs));
    summaries.tick().await;

    let reason = loop {
        tokio::select! {
            _ = summaries.tick() => {
                dashboard.log_summary(cfg.summary_secs);
                tick_aggregator();
            }
            _ = &mut deadline => break "deadline",
            res = tokio::signal::ctrl_c() => {
                res?;
                break "interrupt";
            }
        }
    };

    dashboard.stop_all();
    dashboard.log_summary(cfg.summary_secs);
    log(Level::Info, Domain::System, "shutdown", obj(&[("reason", v_str(reason))]));
    Ok(())
}
