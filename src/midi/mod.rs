/// MIDI output using midir - mirrors each note row onto its own channel
use midir::{MidiOutput, MidiOutputConnection};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::sequencer::pitch::Pitch;
use crate::sequencer::SynthPool;
use crate::{Error, Result};

const CLIENT_NAME: &str = "TonicTwo MIDI Output";
const VELOCITY: u8 = 100;

type SharedConnection = Arc<Mutex<Option<MidiOutputConnection>>>;

pub fn note_on_message(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
}

pub fn note_off_message(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), note & 0x7F, 0]
}

fn send(connection: &SharedConnection, message: &[u8]) -> Result<()> {
    let mut guard = connection.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(conn) = guard.as_mut() {
        conn.send(message)
            .map_err(|e| Error::Midi(format!("Failed to send message: {}", e)))?;
    }
    Ok(())
}

/// A MIDI message due at `at`. `seq` keeps submission order for equal instants,
/// so a note-off sent at the same moment as the next note-on goes out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimedMessage {
    at: Instant,
    seq: u64,
    bytes: [u8; 3],
}

#[derive(Debug, Default)]
struct MessageQueue {
    heap: BinaryHeap<Reverse<TimedMessage>>,
}

impl MessageQueue {
    fn push(&mut self, message: TimedMessage) {
        self.heap.push(Reverse(message));
    }

    fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(message)| message.at)
    }

    /// Messages due at or before `now`, earliest first
    fn pop_due(&mut self, now: Instant) -> Vec<[u8; 3]> {
        let mut due = Vec::new();
        while self.next_due().is_some_and(|at| at <= now) {
            if let Some(Reverse(message)) = self.heap.pop() {
                due.push(message.bytes);
            }
        }
        due
    }

    /// Pending note-offs, so no note is left hanging when the queue goes away
    fn drain_note_offs(&mut self) -> Vec<[u8; 3]> {
        let mut pending: Vec<TimedMessage> = self.heap.drain().map(|Reverse(m)| m).collect();
        pending.sort();
        pending
            .into_iter()
            .filter(|m| m.bytes[0] & 0xF0 == 0x80)
            .map(|m| m.bytes)
            .collect()
    }
}

/// Single timing thread for all MIDI output, fed through a channel.
fn run_scheduler(receiver: Receiver<TimedMessage>, connection: SharedConnection) {
    let mut queue = MessageQueue::default();

    loop {
        for message in queue.pop_due(Instant::now()) {
            if let Err(e) = send(&connection, &message) {
                tracing::warn!("{}", e);
            }
        }

        let received = match queue.next_due() {
            Some(at) => receiver.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(message) => queue.push(message),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for message in queue.drain_note_offs() {
        let _ = send(&connection, &message);
    }
}

pub struct MidiOutputDevice {
    connection: SharedConnection,
    scheduler: Option<Sender<TimedMessage>>,
    next_seq: u64,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
            scheduler: None,
            next_seq: 0,
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| Error::Midi(format!("Failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Midi(format!("Invalid port index {}", port_index)))?;

        let connection = midi_out
            .connect(port, "tonictwo")
            .map_err(|e| Error::Midi(format!("Failed to connect: {}", e)))?;

        *self.connection.lock().unwrap_or_else(|e| e.into_inner()) = Some(connection);
        if self.scheduler.is_none() {
            let (sender, receiver) = channel();
            let connection = Arc::clone(&self.connection);
            thread::spawn(move || run_scheduler(receiver, connection));
            self.scheduler = Some(sender);
        }
        tracing::info!(port_index, "MIDI output connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthPool for MidiOutputDevice {
    fn unlock(&mut self) -> Result<()> {
        Ok(())
    }

    fn trigger_attack_release(&mut self, voice: usize, pitch: Pitch, duration: Duration, at: Instant) {
        if !self.is_connected() {
            return;
        }

        let Some(scheduler) = self.scheduler.as_ref() else {
            return;
        };

        let channel = voice as u8;
        let note = pitch.midi();
        let messages = [
            (at, note_on_message(channel, note, VELOCITY)),
            (at + duration, note_off_message(channel, note)),
        ];
        for (at, bytes) in messages {
            self.next_seq += 1;
            let message = TimedMessage {
                at,
                seq: self.next_seq,
                bytes,
            };
            if scheduler.send(message).is_err() {
                tracing::warn!("MIDI scheduler has stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_use_row_channel() {
        assert_eq!(note_on_message(0, 60, 100), [0x90, 60, 100]);
        assert_eq!(note_on_message(6, 71, 100), [0x96, 71, 100]);
        assert_eq!(note_off_message(3, 65), [0x83, 65, 0]);
    }

    #[test]
    fn test_messages_mask_out_of_range_bytes() {
        assert_eq!(note_on_message(17, 200, 255), [0x91, 72, 127]);
    }

    #[test]
    fn test_disconnected_device_ignores_notes() {
        let mut device = MidiOutputDevice::new();
        assert!(!device.is_connected());
        device.trigger_attack_release(0, Pitch::C4, Duration::from_millis(10), Instant::now());
        assert_eq!(device.next_seq, 0);
    }

    fn timed(at: Instant, seq: u64, bytes: [u8; 3]) -> TimedMessage {
        TimedMessage { at, seq, bytes }
    }

    #[test]
    fn test_queue_releases_only_due_messages_in_order() {
        let start = Instant::now();
        let mut queue = MessageQueue::default();
        queue.push(timed(start + Duration::from_millis(250), 3, note_on_message(1, 62, 100)));
        queue.push(timed(start, 1, note_on_message(0, 60, 100)));
        queue.push(timed(start + Duration::from_millis(250), 2, note_off_message(0, 60)));

        assert_eq!(queue.pop_due(start), vec![note_on_message(0, 60, 100)]);
        assert_eq!(queue.next_due(), Some(start + Duration::from_millis(250)));
        assert!(queue.pop_due(start + Duration::from_millis(100)).is_empty());
        assert_eq!(
            queue.pop_due(start + Duration::from_millis(250)),
            vec![note_off_message(0, 60), note_on_message(1, 62, 100)]
        );
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn test_drain_keeps_only_note_offs() {
        let start = Instant::now();
        let mut queue = MessageQueue::default();
        queue.push(timed(start + Duration::from_secs(1), 2, note_off_message(4, 67)));
        queue.push(timed(start + Duration::from_secs(2), 3, note_on_message(4, 67, 100)));

        assert_eq!(queue.drain_note_offs(), vec![note_off_message(4, 67)]);
        assert_eq!(queue.next_due(), None);
    }
}
