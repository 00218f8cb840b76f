//! Replay loop — feeds newline-delimited bus envelopes into the pool.
//!
//! `dea.*` envelopes go through the message bus exactly as live traffic
//! would. `placement.find` and `placement.start` drive the pool's
//! placement and bookkeeping API directly and write one JSON line each.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use dea_placement::PlacementCriteria;
use dea_pool::{DeaPool, InMemoryBus, ZoneMap};

pub const FIND_SUBJECT: &str = "placement.find";
pub const START_SUBJECT: &str = "placement.start";

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub subject: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Bookkeeping for an instance the caller started on a chosen DEA.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub dea_id: String,
    pub app_id: String,
    pub mem: u64,
}

#[derive(Debug, Serialize)]
struct FindResponse<'a> {
    app_id: &'a str,
    dea_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StartResponse<'a> {
    dea_id: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Pool state written at end of input.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub active_deas: Vec<String>,
    pub zones: ZoneMap,
    pub availability_zones: ZoneMap,
}

impl Summary {
    pub fn of(pool: &DeaPool) -> Self {
        Self {
            active_deas: pool
                .get_active_deas()
                .into_iter()
                .map(|ad| ad.dea_id)
                .collect(),
            zones: pool.get_dea_zones(),
            availability_zones: pool.get_dea_availability_zones(),
        }
    }
}

/// Stats for one replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub published: usize,
    pub placements: usize,
    pub skipped: usize,
}

pub struct Replayer {
    pool: Arc<DeaPool>,
    bus: InMemoryBus,
}

impl Replayer {
    pub fn new(pool: Arc<DeaPool>) -> Self {
        let bus = InMemoryBus::new();
        pool.register_subscriptions(&bus);
        Self { pool, bus }
    }

    pub fn pool(&self) -> &Arc<DeaPool> {
        &self.pool
    }

    pub async fn run<R, W>(&self, input: R, output: &mut W) -> anyhow::Result<ReplayStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut stats = ReplayStats::default();
        let mut lines = input.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let envelope: Envelope = match serde_json::from_str(&line) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping malformed envelope");
                    stats.skipped += 1;
                    continue;
                }
            };

            match envelope.subject.as_str() {
                FIND_SUBJECT => {
                    let criteria: PlacementCriteria = match serde_json::from_value(envelope.data) {
                        Ok(criteria) => criteria,
                        Err(e) => {
                            warn!(line = line_no, error = %e, "skipping malformed placement request");
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    let response = FindResponse {
                        app_id: &criteria.app_id,
                        dea_id: self.pool.find_dea(&criteria),
                    };
                    write_json_line(output, &response).await?;
                    stats.placements += 1;
                }
                START_SUBJECT => {
                    let start: StartRequest = match serde_json::from_value(envelope.data) {
                        Ok(start) => start,
                        Err(e) => {
                            warn!(line = line_no, error = %e, "skipping malformed start request");
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    let result = self
                        .pool
                        .mark_app_started(&start.dea_id, &start.app_id)
                        .and_then(|()| self.pool.reserve_app_memory(&start.dea_id, start.mem));
                    let response = StartResponse {
                        dea_id: &start.dea_id,
                        ok: result.is_ok(),
                        error: result.err().map(|e| e.to_string()),
                    };
                    write_json_line(output, &response).await?;
                }
                subject => {
                    let payload = serde_json::to_vec(&envelope.data)?;
                    let delivered = self.bus.publish(subject, &payload);
                    if delivered == 0 {
                        debug!(line = line_no, %subject, "no subscribers for subject");
                        stats.skipped += 1;
                    } else {
                        stats.published += 1;
                    }
                }
            }
        }

        write_json_line(output, &Summary::of(&self.pool)).await?;
        output.flush().await?;
        Ok(stats)
    }
}

async fn write_json_line<W, T>(output: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value).context("encoding output line")?;
    line.push(b'\n');
    output.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dea_core::PoolConfig;

    fn replayer() -> Replayer {
        Replayer::new(Arc::new(DeaPool::new(&PoolConfig::with_timeout_secs(60))))
    }

    async fn run(replayer: &Replayer, input: &str) -> (ReplayStats, Vec<serde_json::Value>) {
        let mut output = Vec::new();
        let stats = replayer.run(input.as_bytes(), &mut output).await.unwrap();
        let lines = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (stats, lines)
    }

    #[tokio::test]
    async fn replays_advertise_find_and_start() {
        let input = r#"
{"subject":"dea.advertise","data":{"id":"dea-1","ip":"10.0.0.1","stacks":["lucid64"],"available_memory":2048}}
{"subject":"placement.find","data":{"app_id":"app-x","mem":1024,"stack":"lucid64"}}
{"subject":"placement.start","data":{"dea_id":"dea-1","app_id":"app-x","mem":1024}}
{"subject":"placement.find","data":{"app_id":"app-y","mem":1025,"stack":"lucid64"}}
"#;
        let replayer = replayer();
        let (stats, lines) = run(&replayer, input).await;

        assert_eq!(stats, ReplayStats { published: 1, placements: 2, skipped: 0 });
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["dea_id"], "dea-1");
        assert_eq!(lines[1]["ok"], true);
        assert!(lines[2]["dea_id"].is_null());
        assert_eq!(lines[3]["active_deas"][0], "dea-1");
        assert_eq!(lines[3]["zones"]["default"][0], "10.0.0.1");

        let ad = &replayer.pool().get_active_deas()[0];
        assert_eq!(ad.available_memory, 1024);
        assert_eq!(ad.num_instances_of("app-x"), 1);
    }

    #[tokio::test]
    async fn shutdown_then_start_reports_error() {
        let input = r#"
{"subject":"dea.advertise","data":{"id":"dea-1","stacks":["lucid64"],"available_memory":2048}}
{"subject":"dea.shutdown","data":{"id":"dea-1"}}
{"subject":"placement.start","data":{"dea_id":"dea-1","app_id":"app-x","mem":1}}
"#;
        let (stats, lines) = run(&replayer(), input).await;

        assert_eq!(stats.published, 2);
        assert_eq!(lines[0]["ok"], false);
        assert_eq!(lines[0]["error"], "dea not found: dea-1");
        assert_eq!(lines[1]["active_deas"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn skips_garbage_and_unknown_subjects() {
        let input = "not json\n{\"subject\":\"router.register\",\"data\":{}}\n{\"subject\":\"placement.find\",\"data\":{}}\n";
        let (stats, lines) = run(&replayer(), input).await;

        assert_eq!(stats, ReplayStats { published: 0, placements: 0, skipped: 3 });
        assert_eq!(lines.len(), 1);
    }
}
