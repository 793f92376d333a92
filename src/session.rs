//! Session driver module
//! Batch and realtime orchestration of synthesis, formatting, and output

use crate::event::EventSynthesizer;
use crate::format::LogFormatter;
use crate::identity::Identity;
use crate::net::AddrAllocator;
use crate::output::{Rotation, RotatingLogFile};
use crate::stats::Stats;
use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Batch generation advances in fixed 5-minute slots.
const SLOT_SECONDS: i64 = 300;

/// Events per batch slot, drawn uniformly.
const SLOT_EVENTS_RANGE: std::ops::RangeInclusive<u32> = 10..=50;

/// Events per realtime tick, drawn uniformly.
const TICK_EVENTS_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

/// Fraction of the full pool treated as currently active in realtime mode.
const ACTIVE_FRACTION: f64 = 0.15;

/// How often the active subset is refreshed.
const SUBSET_REFRESH_HOURS: i64 = 4;

/// Share of the previous subset retained on refresh (shift overlap).
const SUBSET_OVERLAP: f64 = 0.5;

/// Batch progress is logged every this many events.
const PROGRESS_INTERVAL: u64 = 1000;

/// Cooperative cancellation handle for the realtime loop.
///
/// Checked once per tick, so the in-flight tick always completes and its
/// events reach the file before shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Assign each identity a stable internal client address for the session.
pub fn assign_internal_ips(
    identities: &mut [Identity],
    allocator: &AddrAllocator,
    rng: &mut StdRng,
) {
    for identity in identities.iter_mut() {
        identity.ip_address = Some(allocator.internal_ip(rng));
    }
}

/// Generates a fixed historical window of events into a single run file.
pub struct BatchDriver {
    synthesizer: EventSynthesizer,
    formatter: Box<dyn LogFormatter>,
    identities: Vec<Identity>,
    output_dir: PathBuf,
    rng: StdRng,
}

impl BatchDriver {
    pub fn new(
        synthesizer: EventSynthesizer,
        formatter: Box<dyn LogFormatter>,
        identities: Vec<Identity>,
        output_dir: &Path,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            synthesizer,
            formatter,
            identities,
            output_dir: output_dir.to_path_buf(),
            rng,
        }
    }

    /// Generate events over `[start, end)` and return the output file path.
    ///
    /// Output is time-ordered at 5-minute slot granularity with jitter
    /// inside each slot.
    pub fn run(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<PathBuf> {
        if self.identities.is_empty() {
            anyhow::bail!("Cannot run a batch session with no identities");
        }
        if start >= end {
            anyhow::bail!("Batch start time must precede end time");
        }

        let run_dir = self.output_dir.join(start.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create output directory: {}", run_dir.display()))?;

        let path = run_dir.join(format!(
            "{}_{}_{}.log",
            self.formatter.tag(),
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        ));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open batch output file: {}", path.display()))?;

        info!(
            "Batch session: {} -> {} ({} users, {} format)",
            start,
            end,
            self.identities.len(),
            self.formatter.tag()
        );

        let stats = Stats::new();
        let mut slot_start = start;
        while slot_start < end {
            for event in self.slot_events(slot_start) {
                let line = self.formatter.format_event(&event);
                writeln!(file, "{}", line)
                    .with_context(|| format!("Failed to write to {}", path.display()))?;
                stats.count_event(line.len() + 1);

                if stats.events() % PROGRESS_INTERVAL == 0 {
                    stats.print_progress();
                }
            }
            slot_start += ChronoDuration::seconds(SLOT_SECONDS);
        }

        file.flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        stats.print_final();

        Ok(path)
    }

    /// Synthesize one slot's worth of events at jittered offsets.
    fn slot_events(&mut self, slot_start: DateTime<Utc>) -> Vec<crate::event::TrafficEvent> {
        let count = self.rng.gen_range(SLOT_EVENTS_RANGE);
        let mut events = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let offset = self.rng.gen_range(0..SLOT_SECONDS);
            let timestamp = slot_start + ChronoDuration::seconds(offset);
            events.push(self.synthesizer.synthesize(&mut self.rng, timestamp, &self.identities));
        }

        events
    }
}

/// The rotating "currently online" slice of the identity pool.
pub struct ActiveSubset {
    members: Vec<Identity>,
    target_size: usize,
    refreshed_at: DateTime<Utc>,
}

impl ActiveSubset {
    /// Sample an initial subset at `fraction` of the pool (at least one).
    pub fn new(pool: &[Identity], fraction: f64, now: DateTime<Utc>, rng: &mut StdRng) -> Self {
        let target_size = ((pool.len() as f64 * fraction).round() as usize)
            .clamp(1, pool.len().max(1));
        let members = pool
            .choose_multiple(rng, target_size)
            .cloned()
            .collect();

        Self {
            members,
            target_size,
            refreshed_at: now,
        }
    }

    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    /// Refresh when the interval elapsed: retain about half the current
    /// members and backfill from the pool, emulating a shift change.
    /// Returns true when a refresh happened.
    pub fn maybe_refresh(
        &mut self,
        pool: &[Identity],
        now: DateTime<Utc>,
        interval: ChronoDuration,
        rng: &mut StdRng,
    ) -> bool {
        if now - self.refreshed_at < interval {
            return false;
        }

        self.members.shuffle(rng);
        let keep = ((self.target_size as f64) * SUBSET_OVERLAP).round() as usize;
        self.members.truncate(keep);

        let mut candidates: Vec<&Identity> = pool
            .iter()
            .filter(|i| !self.members.iter().any(|m| m.email == i.email))
            .collect();
        candidates.shuffle(rng);

        for candidate in candidates {
            if self.members.len() >= self.target_size {
                break;
            }
            self.members.push(candidate.clone());
        }

        self.refreshed_at = now;
        true
    }
}

/// Generates events continuously at wall-clock time until cancelled.
pub struct RealtimeDriver {
    synthesizer: EventSynthesizer,
    formatter: Box<dyn LogFormatter>,
    identities: Vec<Identity>,
    output_dir: PathBuf,
    speed_multiplier: f64,
    rng: StdRng,
}

impl RealtimeDriver {
    pub fn new(
        synthesizer: EventSynthesizer,
        formatter: Box<dyn LogFormatter>,
        identities: Vec<Identity>,
        output_dir: &Path,
        speed_multiplier: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            synthesizer,
            formatter,
            identities,
            output_dir: output_dir.to_path_buf(),
            speed_multiplier: if speed_multiplier > 0.0 {
                speed_multiplier
            } else {
                1.0
            },
            rng,
        }
    }

    /// Run until the token is cancelled; returns the number of events
    /// written. The hour-bucketed output file rotates as wall-clock hours
    /// pass; the tick in flight when cancellation arrives still completes.
    pub fn run(&mut self, cancel: &CancelToken) -> anyhow::Result<u64> {
        if self.identities.is_empty() {
            anyhow::bail!("Cannot run a realtime session with no identities");
        }

        let start = Utc::now();
        let run_dir = self.output_dir.join(start.format("%Y-%m-%d").to_string());
        let mut writer = RotatingLogFile::new(&run_dir, self.formatter.tag(), Rotation::Hourly);

        let mut subset = ActiveSubset::new(&self.identities, ACTIVE_FRACTION, start, &mut self.rng);
        let refresh_interval = ChronoDuration::hours(SUBSET_REFRESH_HOURS);
        let tick_sleep = Duration::from_secs_f64(1.0 / self.speed_multiplier);

        info!(
            "Realtime session: {} active of {} users, speed {}x, {} format",
            subset.members().len(),
            self.identities.len(),
            self.speed_multiplier,
            self.formatter.tag()
        );

        let stats = Stats::new();
        while !cancel.is_cancelled() {
            let now = Utc::now();

            if subset.maybe_refresh(&self.identities, now, refresh_interval, &mut self.rng) {
                info!("Active identity subset refreshed ({} users)", subset.members().len());
            }

            let count = self.rng.gen_range(TICK_EVENTS_RANGE);
            for _ in 0..count {
                let event = self.synthesizer.synthesize(&mut self.rng, now, subset.members());
                let line = self.formatter.format_event(&event);
                writer.write_line(now, &line)?;
                stats.count_event(line.len() + 1);

                if stats.events() % 50 == 0 {
                    stats.print_progress();
                }
            }

            std::thread::sleep(tick_sleep);
        }

        writer.close()?;
        stats.print_final();
        Ok(stats.events())
    }
}
