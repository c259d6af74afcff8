#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use std::path::PathBuf;
#[cfg(feature = "gui")]
use std::time::{Duration, Instant};

#[cfg(feature = "gui")]
use tonictwo::sequencer::{NOTE_ROWS, ROWS, STEPS};
#[cfg(feature = "gui")]
use tonictwo::{
    save_download, AudioOutput, Config, MasterBusRecorder, MidiOutputDevice, Pitch,
    PlaybackEngine, PlaybackEvent, Session, SynthPool, TransportClock,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    init_tracing();
    let config = Config::from_env();
    tracing::info!(export_dir = %config.export_dir.display(), "starting TonicTwo");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 560.0])
            .with_title("TonicTwo - Step Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "TonicTwo",
        options,
        Box::new(move |_cc| Ok(Box::new(SequencerApp::new(config)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    init_tracing();
    tracing::error!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

/// Audio voices, mirrored to MIDI when a port is connected
#[cfg(feature = "gui")]
struct Voices {
    audio: AudioOutput,
    midi: MidiOutputDevice,
}

#[cfg(feature = "gui")]
impl SynthPool for Voices {
    fn unlock(&mut self) -> tonictwo::Result<()> {
        self.audio.unlock()
    }

    fn trigger_attack_release(&mut self, voice: usize, pitch: Pitch, duration: Duration, at: Instant) {
        self.audio.trigger_attack_release(voice, pitch, duration, at);
        self.midi.trigger_attack_release(voice, pitch, duration, at);
    }
}

#[cfg(feature = "gui")]
struct SequencerApp {
    session: Session<PlaybackEngine, Voices, MasterBusRecorder>,
    export_dir: PathBuf,

    // UI state
    track_name: String,
    bpm_text: String,
    transpose: i32,
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    current_visual_step: Option<usize>,
    last_saved: Option<PathBuf>,
}

#[cfg(feature = "gui")]
impl SequencerApp {
    fn new(config: Config) -> Self {
        let audio = AudioOutput::new();
        let recorder = audio.recorder();
        let mut midi = MidiOutputDevice::new();

        let available_midi_ports = MidiOutputDevice::available_ports();
        let selected_port = config.midi_port.and_then(|port| match midi.connect(port) {
            Ok(()) => Some(port),
            Err(e) => {
                tracing::warn!("MIDI output disabled: {}", e);
                None
            }
        });

        let mut session = Session::new(PlaybackEngine::new(), Voices { audio, midi }, recorder);
        session.configure(&config);

        Self {
            bpm_text: session.clock().bpm().to_string(),
            transpose: session.sequencer().transpose(),
            session,
            export_dir: config.export_dir,
            track_name: String::new(),
            available_midi_ports,
            selected_port,
            current_visual_step: None,
            last_saved: None,
        }
    }

    fn handle_playback_events(&mut self) {
        let events = self.session.clock().poll_events();

        for event in events {
            match event {
                PlaybackEvent::Tick(at) => {
                    self.current_visual_step = Some(self.session.on_tick(at));
                }
            }
        }

        self.session.sweep(Instant::now());
    }

    fn toggle_play(&mut self) {
        if let Err(e) = self.session.toggle_play() {
            tracing::warn!("could not start playback: {}", e);
        }
    }

    fn clear_board(&mut self) {
        self.session.clear();
        self.current_visual_step = None;
    }

    fn start_recording(&mut self) {
        if let Err(e) = self.session.start_recording() {
            tracing::warn!("could not start recording: {}", e);
        }
    }

    fn stop_recording(&mut self) {
        let download = match self.session.stop_recording(&self.track_name, Instant::now()) {
            Ok(Some(download)) => download,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("recording failed: {}", e);
                return;
            }
        };

        match save_download(&self.export_dir, &download, self.session.recording().urls()) {
            Ok(path) => self.last_saved = Some(path),
            Err(e) => tracing::warn!("could not save {}: {}", download.filename, e),
        }
    }

    fn play_preview(&mut self) {
        let Some(blob) = self.session.recording().preview_blob().cloned() else {
            return;
        };
        if let Err(e) = self.session.synths_mut().audio.preview(&blob) {
            tracing::warn!("preview failed: {}", e);
        }
    }

    fn connect_midi(&mut self, port_idx: usize) {
        match self.session.synths_mut().midi.connect(port_idx) {
            Ok(()) => self.selected_port = Some(port_idx),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for SequencerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("TonicTwo");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                self.connect_midi(port_idx);
            }

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                let is_playing = self.session.transport_state().is_started();
                let play_label = if is_playing { "⏸ Pause" } else { "▶ Play" };
                if ui.button(play_label).clicked() {
                    self.toggle_play();
                }
                if ui.button("Clear").clicked() {
                    self.clear_board();
                }

                ui.add_space(20.0);

                if ui.button("● Record").clicked() {
                    self.start_recording();
                }
                if ui.button("■ Stop").clicked() {
                    self.stop_recording();
                }
                if self.session.is_recording() {
                    ui.colored_label(egui::Color32::from_rgb(220, 40, 40), "REC");
                }
            });

            ui.add_space(10.0);

            ui.horizontal(|ui| {
                ui.label("BPM:");
                if ui
                    .add(egui::TextEdit::singleline(&mut self.bpm_text).desired_width(50.0))
                    .changed()
                {
                    self.session.set_bpm_input(&self.bpm_text);
                }

                ui.add_space(20.0);

                ui.label("Transpose:");
                if ui
                    .add(egui::Slider::new(&mut self.transpose, -12..=12).show_value(false))
                    .changed()
                {
                    self.session.set_transpose_input(&self.transpose.to_string());
                }
                ui.label(self.session.transpose_label());

                ui.add_space(20.0);

                ui.label("Track:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.track_name)
                        .hint_text("tonictwo")
                        .desired_width(160.0),
                );
            });

            ui.add_space(20.0);

            // Step grid: one row per note, one column per step
            let is_playing = self.session.transport_state().is_started();
            let current = self.current_visual_step.filter(|_| is_playing);

            egui::Grid::new("board").spacing([8.0, 6.0]).show(ui, |ui| {
                ui.label("");
                for step in 0..STEPS {
                    let text = format!("{}", step + 1);
                    if current == Some(step) {
                        ui.colored_label(egui::Color32::from_rgb(100, 200, 100), format!("● {}", text));
                    } else {
                        ui.label(text);
                    }
                }
                ui.end_row();

                for row in 0..ROWS {
                    let pitch = NOTE_ROWS[row].transpose(self.session.sequencer().transpose());
                    ui.label(pitch.name());
                    for step in 0..STEPS {
                        let mut checked = self.session.grid().get(row, step);
                        if ui.checkbox(&mut checked, "").changed() {
                            self.session.set_cell(row, step, checked);
                        }
                    }
                    ui.end_row();
                }
            });

            // Preview and info
            ui.separator();
            ui.horizontal(|ui| {
                let has_preview = self.session.recording().preview_blob().is_some();
                if ui
                    .add_enabled(has_preview, egui::Button::new("▶ Preview"))
                    .clicked()
                {
                    self.play_preview();
                }
                if let Some(path) = &self.last_saved {
                    ui.label(format!("Saved {}", path.display()));
                }
            });
            ui.label("Click cells to enable/disable notes");
            if self.selected_port.is_none() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - audio playback only",
                );
            }
        });
    }
}
