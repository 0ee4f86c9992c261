// =============================================================================
// Replay Source — historical tick file for backtests
// =============================================================================
//
// Input is a headerless tick CSV as exported by MetaTrader-style tools:
//
//   2016-01-04 00:00:00.123000,1.08701,1.08713,0,0
//
// Only the first two columns (UTC timestamp, bid) are used.  The head of the
// file is aggregated into closed candles for the warm-up burst; the rest is
// pushed tick by tick into the feed queue.
// =============================================================================

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Candle;
use crate::feed::FeedMessage;
use crate::types::Tick;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone)]
pub struct ReplaySource {
    ticks: Vec<Tick>,
    cursor: usize,
}

impl ReplaySource {
    /// Read and parse the whole tick file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("opening replay file {}", path.display()))?;

        let mut ticks = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("reading line {}", line + 1))?;
            let tick = parse_record(&record).with_context(|| format!("parsing line {}", line + 1))?;
            ticks.push(tick);
        }

        info!(path = %path.display(), ticks = ticks.len(), "replay file loaded");
        Ok(Self::from_ticks(ticks))
    }

    pub fn from_ticks(ticks: Vec<Tick>) -> Self {
        Self { ticks, cursor: 0 }
    }

    /// Ticks not yet consumed.
    pub fn remaining(&self) -> usize {
        self.ticks.len() - self.cursor
    }

    /// Aggregate up to `count` closed candles from the head of the stream.
    ///
    /// Each window opens at the first unused tick and spans `size_minutes`.
    /// The tick that closes a window is consumed by it.  A trailing partial
    /// window at end of data is dropped.
    pub fn take_candles(&mut self, count: usize, size_minutes: u32) -> Result<Vec<Candle>> {
        let span = f64::from(size_minutes) * 60.0;
        let mut candles = Vec::with_capacity(count);

        while candles.len() < count && self.cursor < self.ticks.len() {
            let first = self.ticks[self.cursor];
            let mut candle = Candle::new(first.timestamp, first.timestamp + span)?;
            while !candle.is_closed && self.cursor < self.ticks.len() {
                candle.update_tick(&self.ticks[self.cursor]);
                self.cursor += 1;
            }
            if candle.is_closed && candle.has_data() {
                candles.push(candle);
            }
        }

        if candles.len() < count {
            warn!(requested = count, built = candles.len(), "replay ran out of ticks during warm-up");
        }
        debug!(candles = candles.len(), size_minutes, "warm-up candles built from replay");
        Ok(candles)
    }

    /// Push the remaining ticks into `sender` from a background task.
    ///
    /// A heartbeat follows every `heartbeat_every` ticks (0 disables).  The
    /// sender is dropped when the file is exhausted, closing the feed.
    pub fn spawn(self, sender: mpsc::Sender<FeedMessage>, heartbeat_every: usize) -> JoinHandle<()> {
        tokio::spawn(async move {
            let total = self.remaining();
            for (i, tick) in self.ticks[self.cursor..].iter().enumerate() {
                if sender.send(FeedMessage::Price(*tick)).await.is_err() {
                    debug!(sent = i, "feed receiver gone, replay stopping");
                    return;
                }
                if heartbeat_every > 0
                    && (i + 1) % heartbeat_every == 0
                    && sender.send(FeedMessage::Heartbeat).await.is_err()
                {
                    return;
                }
            }
            info!(ticks = total, "replay exhausted");
        })
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<Tick> {
    let stamp = record.get(0).ok_or_else(|| anyhow!("missing timestamp column"))?;
    let bid = record.get(1).ok_or_else(|| anyhow!("missing bid column"))?;
    let timestamp = parse_timestamp(stamp)?;
    let price: f64 = bid.parse().with_context(|| format!("bad bid {bid:?}"))?;
    Ok(Tick::new(timestamp, price))
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]` in UTC to fractional unix seconds.
pub fn parse_timestamp(stamp: &str) -> Result<f64> {
    let parsed = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(stamp, fmt).ok())
        .ok_or_else(|| anyhow!("bad timestamp {stamp:?}"))?;
    let utc = parsed.and_utc();
    Ok(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_micros()) / 1_000_000.0)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::feed;

    fn ticks(rows: &[(f64, f64)]) -> ReplaySource {
        ReplaySource::from_ticks(rows.iter().map(|&(t, p)| Tick::new(t, p)).collect())
    }

    #[test]
    fn parses_timestamps_with_and_without_fraction() {
        // 2016-01-04 00:00:00 UTC
        let base = 1_451_865_600.0;
        assert!((parse_timestamp("2016-01-04 00:00:00").unwrap() - base).abs() < 1e-9);
        let frac = parse_timestamp("2016-01-04 00:00:01.250000").unwrap();
        assert!((frac - (base + 1.25)).abs() < 1e-6);
        assert!(parse_timestamp("04/01/2016").is_err());
    }

    #[test]
    fn opens_tick_file() {
        let path = std::env::temp_dir().join(format!("fxbot_replay_{}.csv", uuid::Uuid::new_v4()));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "2016-01-04 00:00:00.000000,1.08701,1.08713,0,0").unwrap();
            writeln!(f, "2016-01-04 00:00:30.500000,1.08710,1.08720,0,0").unwrap();
        }
        let source = ReplaySource::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(source.remaining(), 2);
        assert!((source.ticks[1].price - 1.0871).abs() < 1e-12);
    }

    #[test]
    fn bad_row_reports_line() {
        let path = std::env::temp_dir().join(format!("fxbot_replay_{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, "2016-01-04 00:00:00,1.1,1.1,0,0\nnot-a-date,1.1,1.1,0,0\n").unwrap();
        let err = ReplaySource::open(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn take_candles_consumes_closing_tick() {
        // 1-minute candles
        let mut source = ticks(&[
            (0.0, 1.0),
            (30.0, 1.2),
            (60.0, 1.1), // closes first window, folded in (== close_time)
            (61.0, 1.3),
            (125.0, 1.4), // closes second window, outside it
            (130.0, 1.5),
        ]);
        let candles = source.take_candles(2, 1).unwrap();
        assert_eq!(candles.len(), 2);

        assert!((candles[0].open - 1.0).abs() < 1e-12);
        assert!((candles[0].high - 1.2).abs() < 1e-12);
        assert!((candles[0].close - 1.1).abs() < 1e-12);

        assert!((candles[1].open_time - 61.0).abs() < 1e-12);
        assert!((candles[1].close - 1.3).abs() < 1e-12);
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn partial_window_is_dropped() {
        let mut source = ticks(&[(0.0, 1.0), (10.0, 1.1)]);
        let candles = source.take_candles(3, 1).unwrap();
        assert!(candles.is_empty());
        assert_eq!(source.remaining(), 0);
    }

    #[tokio::test]
    async fn spawn_streams_remaining_ticks_with_heartbeats() {
        let mut source = ticks(&[(0.0, 1.0), (60.0, 1.0), (70.0, 2.0), (80.0, 3.0), (90.0, 4.0)]);
        source.take_candles(1, 1).unwrap();

        let (tx, mut rx) = feed::channel(16);
        source.spawn(tx, 2).await.unwrap();

        let mut got = Vec::new();
        while let Some(msg) = rx.recv().await {
            got.push(msg);
        }
        assert_eq!(
            got,
            vec![
                FeedMessage::Price(Tick::new(70.0, 2.0)),
                FeedMessage::Price(Tick::new(80.0, 3.0)),
                FeedMessage::Heartbeat,
                FeedMessage::Price(Tick::new(90.0, 4.0)),
            ]
        );
    }
}
