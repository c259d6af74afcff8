/// Playback engine - a threaded transport clock that emits timestamped ticks
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::transport::{Subdivision, TransportClock, TransportState};
use super::{sanitize_bpm, DEFAULT_BPM};

/// How far ahead of its timestamp a tick is emitted
pub const LOOKAHEAD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A step is due at this instant
    Tick(Instant),
}

#[derive(Debug)]
struct ClockShared {
    state: TransportState,
    bpm: f32,
    // Bumped on every start so a stale timing thread knows to exit
    generation: u64,
}

pub struct PlaybackEngine {
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    shared: Arc<Mutex<ClockShared>>,
    subdivision: Subdivision,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::with_subdivision(Subdivision::Eighth)
    }

    pub fn with_subdivision(subdivision: Subdivision) -> Self {
        let (sender, receiver) = channel();

        Self {
            sender,
            receiver,
            shared: Arc::new(Mutex::new(ClockShared {
                state: TransportState::Stopped,
                bpm: DEFAULT_BPM,
                generation: 0,
            })),
            subdivision,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.state().is_started()
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drop ticks emitted ahead of time that have not been handled yet.
    fn discard_pending(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    fn halt(&mut self, state: TransportState) {
        {
            let mut shared = self.lock();
            if shared.state == state {
                return;
            }
            shared.state = state;
        }
        self.discard_pending();
        tracing::debug!(?state, "transport halted");
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock for PlaybackEngine {
    fn state(&self) -> TransportState {
        self.lock().state
    }

    fn start(&mut self) {
        let generation = {
            let mut shared = self.lock();
            if shared.state.is_started() {
                return;
            }
            shared.state = TransportState::Started;
            shared.generation += 1;
            shared.generation
        };
        tracing::debug!(generation, "transport started");

        let shared = Arc::clone(&self.shared);
        let sender = self.sender.clone();
        let subdivision = self.subdivision;

        thread::spawn(move || {
            let mut next_tick = Instant::now() + LOOKAHEAD;

            loop {
                {
                    let shared = shared.lock().unwrap_or_else(|e| e.into_inner());
                    if shared.generation != generation || !shared.state.is_started() {
                        break;
                    }
                    // Sent under the lock so a halt never races a late tick
                    if Instant::now() + LOOKAHEAD >= next_tick {
                        if sender.send(PlaybackEvent::Tick(next_tick)).is_err() {
                            break;
                        }
                        next_tick += subdivision.duration(shared.bpm);
                        continue;
                    }
                }

                thread::sleep(Duration::from_millis(1));
            }
        });
    }

    fn pause(&mut self) {
        self.halt(TransportState::Paused);
    }

    fn stop(&mut self) {
        self.halt(TransportState::Stopped);
    }

    fn bpm(&self) -> f32 {
        self.lock().bpm
    }

    fn set_bpm(&mut self, bpm: f32) {
        self.lock().bpm = sanitize_bpm(bpm);
    }

    fn subdivision(&self) -> Subdivision {
        self.subdivision
    }
}
