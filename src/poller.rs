//! Scheduled polling of a metadata source

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, after, bounded, select, tick};
use log::{debug, error, info, warn};

use crate::{
    detector::TrackChangeDetector,
    relay::TrackEvent,
    source::MetadataSource,
};

/// Owns a detector and feeds it from a source, one tick at a time
pub struct Poller {
    source: Box<dyn MetadataSource>,
    detector: TrackChangeDetector,
    events: Sender<TrackEvent>,
}

impl Poller {
    pub fn new(
        source: Box<dyn MetadataSource>,
        detector: TrackChangeDetector,
        events: Sender<TrackEvent>,
    ) -> Self {
        Self {
            source,
            detector,
            events,
        }
    }

    /// One check: read, detect, forward. A failed read counts as "nothing playing".
    ///
    /// Returns whether a new track was forwarded.
    pub fn tick(&mut self) -> bool {
        let metadata = match self.source.read() {
            Ok(m) => m,
            Err(e) => {
                warn!("Error during track check: {e}");
                return false;
            }
        };

        let Some(track) = self.detector.poll(metadata.as_ref()) else {
            return false;
        };

        let event = TrackEvent {
            track,
            origin: self.source.describe(),
        };
        if let Err(e) = self.events.try_send(event) {
            error!("Failed to hand track to relay: {e}");
        }
        true
    }

    /// Runs the poller on its own thread until the handle is stopped.
    ///
    /// The first check happens after `initial_delay`, then every `interval`.
    /// Ticks are skipped while `monitoring` is false.
    pub fn spawn(
        self,
        interval: Duration,
        initial_delay: Duration,
        monitoring: Arc<AtomicBool>,
    ) -> PollerHandle {
        let (stop_tx, stop_rx) = bounded(1);

        let join = thread::spawn(move || self.run(interval, initial_delay, monitoring, stop_rx));

        PollerHandle {
            stop: stop_tx,
            join,
        }
    }

    fn run(
        mut self,
        interval: Duration,
        initial_delay: Duration,
        monitoring: Arc<AtomicBool>,
        stop: Receiver<()>,
    ) -> TrackChangeDetector {
        info!(
            "Monitoring {} every {} ms",
            self.source.describe(),
            interval.as_millis()
        );

        let first = after(initial_delay);
        let ticker = tick(interval);

        loop {
            select! {
                recv(stop) -> _ => break,
                recv(first) -> _ => self.tick_if(&monitoring),
                recv(ticker) -> _ => self.tick_if(&monitoring),
            }
        }

        info!("Monitoring stopped");
        self.detector
    }

    fn tick_if(&mut self, monitoring: &AtomicBool) {
        if monitoring.load(Ordering::Relaxed) {
            self.tick();
        } else {
            debug!("Monitoring paused, skipping tick");
        }
    }
}

/// Control side of a running poller
pub struct PollerHandle {
    stop: Sender<()>,
    join: JoinHandle<TrackChangeDetector>,
}

impl PollerHandle {
    /// stops the timer and returns the detector with its final state
    pub fn stop(self) -> thread::Result<TrackChangeDetector> {
        let _ = self.stop.send(());
        self.join.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detector::AbsentPolicy,
        domain::track::{MediaMetadata, TrackKey},
        source::{error::SourceError, shared::SharedSnapshot},
    };
    use crossbeam_channel::unbounded;
    use std::{collections::VecDeque, sync::Mutex};

    /// Replays a fixed list of reads, then reports nothing playing
    struct ScriptedSource {
        reads: Mutex<VecDeque<Result<Option<MediaMetadata>, SourceError>>>,
    }

    impl ScriptedSource {
        fn new(reads: Vec<Result<Option<MediaMetadata>, SourceError>>) -> Self {
            Self {
                reads: Mutex::new(reads.into()),
            }
        }
    }

    impl MetadataSource for ScriptedSource {
        fn read(&self) -> Result<Option<MediaMetadata>, SourceError> {
            self.reads.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn track(title: &str) -> Result<Option<MediaMetadata>, SourceError> {
        Ok(Some(MediaMetadata {
            title: Some(title.to_string()),
            ..Default::default()
        }))
    }

    #[test]
    fn test_failed_read_is_a_missed_tick() {
        let source = ScriptedSource::new(vec![
            track("T1"),
            Err(SourceError::Unavailable("page reloading".to_string())),
            track("T1"),
            track("T2"),
        ]);
        let (tx, rx) = unbounded();
        let mut poller = Poller::new(Box::new(source), TrackChangeDetector::default(), tx);

        let forwarded: Vec<bool> = (0..4).map(|_| poller.tick()).collect();

        assert_eq!(forwarded, vec![true, false, false, true]);

        let titles: Vec<_> = rx.try_iter().map(|e| e.track.title).collect();
        assert_eq!(titles, vec!["T1", "T2"]);
    }

    #[test]
    fn test_events_carry_origin() {
        let source = ScriptedSource::new(vec![track("T1")]);
        let (tx, rx) = unbounded();
        let mut poller = Poller::new(Box::new(source), TrackChangeDetector::default(), tx);

        poller.tick();

        assert_eq!(rx.try_recv().unwrap().origin, "scripted");
    }

    #[test]
    fn test_tick_survives_closed_relay() {
        let source = ScriptedSource::new(vec![track("T1"), track("T2")]);
        let (tx, rx) = unbounded();
        drop(rx);
        let mut poller = Poller::new(Box::new(source), TrackChangeDetector::default(), tx);

        assert!(poller.tick());
        assert!(poller.tick());
    }

    #[test]
    fn test_spawned_poller_reports_and_stops() -> anyhow::Result<()> {
        let snapshot = SharedSnapshot::new();
        snapshot.set(track("Live")?)?;

        let (tx, rx) = unbounded();
        let poller = Poller::new(
            Box::new(snapshot.clone()),
            TrackChangeDetector::new(AbsentPolicy::Keep),
            tx,
        );
        let handle = poller.spawn(
            Duration::from_millis(10),
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(true)),
        );

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(event.track.title, "Live");

        let detector = handle.stop().unwrap();
        assert_eq!(
            detector.state().last_key,
            Some(TrackKey::of("Live", "Unknown", "Unknown"))
        );

        // the same track is never forwarded twice
        assert!(rx.try_iter().all(|e| e.track.title != "Live"));

        Ok(())
    }

    #[test]
    fn test_paused_poller_does_not_read() -> anyhow::Result<()> {
        let source = Arc::new(ScriptedSource::new(vec![track("T1")]));

        let (tx, rx) = unbounded();
        let poller = Poller::new(
            Box::new(Arc::clone(&source)),
            TrackChangeDetector::default(),
            tx,
        );
        let monitoring = Arc::new(AtomicBool::new(false));
        let handle = poller.spawn(
            Duration::from_millis(5),
            Duration::from_millis(1),
            Arc::clone(&monitoring),
        );

        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        monitoring.store(true, Ordering::Relaxed);
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(event.track.title, "T1");
        handle.stop().unwrap();

        assert!(source.reads.lock().unwrap().is_empty());

        Ok(())
    }
}
