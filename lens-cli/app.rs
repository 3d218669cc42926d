use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lens_match::{MatchEngine, SpriteLibrary, SpriteMatch};
use lens_meta::{FetchResult, MetadataCache, MetadataRecord, MetadataSource};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::capture::{CaptureRegion, PointerSource, ScreenCapture};
use crate::display::DisplaySink;

/// Loop timing and sizing
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub interval: Duration,
    pub region_size: u32,
    pub workers: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            region_size: 50,
            workers: 2,
        }
    }
}

/// What one detection cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    Paused,
    NoDetection,
    Detected(SpriteMatch),
}

/// A fetch result as seen by the loop when it is drained
#[derive(Debug)]
pub enum FetchOutcome {
    /// Belongs to the item still on display
    Current {
        name: String,
        result: FetchResult<Arc<MetadataRecord>>,
    },
    /// The display moved on since the fetch was issued
    Superseded { name: String, cycle: u64 },
}

struct FetchDone {
    cycle: u64,
    name: String,
    result: FetchResult<Arc<MetadataRecord>>,
}

/// Item currently on display and the cycle it first appeared in
struct OnDisplay {
    name: String,
    since: u64,
    requested: bool,
}

/// Owns every piece of runtime state: the sprite library, the match engine,
/// the metadata cache, the collaborators and the fetch pool.
///
/// Detection runs on the caller's thread; metadata fetches run on the pool
/// and report back over a channel drained at the start of each cycle.
pub struct App<S, C, P, D> {
    library: Arc<SpriteLibrary>,
    engine: MatchEngine,
    cache: Arc<MetadataCache<S>>,
    capture: C,
    pointer: P,
    sink: D,
    settings: LoopSettings,
    pool: ThreadPool,
    tx: Sender<FetchDone>,
    rx: Receiver<FetchDone>,
    in_flight: HashSet<String>,
    paused: Arc<AtomicBool>,
    pause_was_down: bool,
    cycle: u64,
    on_display: Option<OnDisplay>,
}

impl<S, C, P, D> App<S, C, P, D>
where
    S: MetadataSource + 'static,
    C: ScreenCapture,
    P: PointerSource,
    D: DisplaySink,
{
    pub fn new(
        library: Arc<SpriteLibrary>,
        engine: MatchEngine,
        cache: Arc<MetadataCache<S>>,
        capture: C,
        pointer: P,
        sink: D,
        settings: LoopSettings,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("metadata-{i}"))
            .build()?;
        let (tx, rx) = mpsc::channel();

        Ok(Self {
            library,
            engine,
            cache,
            capture,
            pointer,
            sink,
            settings,
            pool,
            tx,
            rx,
            in_flight: HashSet::new(),
            paused: Arc::new(AtomicBool::new(false)),
            pause_was_down: false,
            cycle: 0,
            on_display: None,
        })
    }

    /// Shared pause flag, checked at the top of every cycle
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Poll at a fixed cadence; `max_cycles` of `None` runs until the process ends
    pub fn run(&mut self, max_cycles: Option<u64>) {
        info!(
            sprites = self.library.len(),
            interval_ms = self.settings.interval.as_millis() as u64,
            "detection loop started"
        );
        let mut ticks = 0u64;
        while max_cycles.is_none_or(|max| ticks < max) {
            let started = Instant::now();
            self.poll_pause_key();
            self.drain_metadata();
            self.run_cycle();
            ticks += 1;
            thread::sleep(self.settings.interval.saturating_sub(started.elapsed()));
        }
    }

    /// Toggle pause on the press edge of the pause key
    pub fn poll_pause_key(&mut self) {
        let down = self.pointer.pause_pressed();
        if down && !self.pause_was_down {
            let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
            info!(paused, "pause toggled");
            self.sink.show_paused(paused);
        }
        self.pause_was_down = down;
    }

    /// One capture and match step
    pub fn run_cycle(&mut self) -> Cycle {
        if self.is_paused() {
            return Cycle::Paused;
        }
        self.cycle += 1;

        let (x, y) = self.pointer.position();
        let region = CaptureRegion::centered_on(x, y, self.settings.region_size);
        let hit = match self.capture.capture(region) {
            Ok(img) => self.engine.detect(&img, &self.library),
            Err(err) => {
                warn!(error = %err, ?region, "capture failed");
                None
            }
        };

        let Some(hit) = hit else {
            self.on_display = None;
            self.sink.show_no_detection();
            return Cycle::NoDetection;
        };

        if let Some(entry) = self.library.get(&hit.name) {
            self.sink.show_match(entry, &hit);
        }
        if self.on_display.as_ref().is_none_or(|shown| shown.name != hit.name) {
            self.on_display = Some(OnDisplay {
                name: hit.name.clone(),
                since: self.cycle,
                requested: false,
            });
        }
        self.request_metadata();

        Cycle::Detected(hit)
    }

    /// Ask for the displayed item's record once per display period
    fn request_metadata(&mut self) {
        let Some(shown) = self.on_display.as_mut() else {
            return;
        };
        if shown.requested || self.in_flight.contains(&shown.name) {
            return;
        }
        shown.requested = true;

        if let Some(record) = self.cache.get(&shown.name) {
            self.sink.show_record(&shown.name, &record);
            return;
        }

        let name = shown.name.clone();
        let cycle = shown.since;
        debug!(item = %name, cycle, "dispatching metadata fetch");
        self.in_flight.insert(name.clone());

        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let result = cache.get_or_fetch(&name);
            // The loop may already be gone at shutdown
            let _ = tx.send(FetchDone { cycle, name, result });
        });
    }

    /// Hand finished fetches to the sink without blocking
    pub fn drain_metadata(&mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(done) = self.rx.try_recv() {
            outcomes.push(self.settle(done));
        }
        outcomes
    }

    fn settle(&mut self, done: FetchDone) -> FetchOutcome {
        self.in_flight.remove(&done.name);

        let current = self
            .on_display
            .as_mut()
            .filter(|shown| shown.name == done.name);
        let Some(shown) = current.filter(|shown| shown.since == done.cycle) else {
            debug!(item = %done.name, cycle = done.cycle, "discarding superseded metadata");
            // Same item shown again since; fetch again for this display period
            if let Some(shown) = self.on_display.as_mut().filter(|s| s.name == done.name) {
                shown.requested = false;
            }
            return FetchOutcome::Superseded { name: done.name, cycle: done.cycle };
        };
        shown.requested = true;

        match &done.result {
            Ok(record) => self.sink.show_record(&done.name, record),
            Err(err) => {
                warn!(item = %done.name, error = %err, "metadata unavailable");
                self.sink.show_not_found(&done.name);
            }
        }
        FetchOutcome::Current { name: done.name, result: done.result }
    }
}
