// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-frame orchestration: hand roles, chord tracking, strum detection, and
//! playback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, span, Level};

use crate::audio;
use crate::chords::{ChordClassifier, ChordStabilizer, ChordSymbol};
use crate::clock::Clock;
use crate::config::{ConfigError, InstrumentConfig};
use crate::landmarks::{Hand, HandFrame};
use crate::samples::{AudioEngine, Playback};
use crate::strum::OnsetDetector;

/// Default wrist x that separates the chord hand (left) from the strum hand.
pub const DEFAULT_SPLIT: f32 = 0.5;

/// Lifecycle of the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Ready,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PipelineState::Initializing => "initializing",
            PipelineState::Ready => "ready",
            PipelineState::Stopped => "stopped",
        };
        write!(f, "{}", state)
    }
}

/// What a UI needs to show. Published after every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub stable_chord: Option<ChordSymbol>,
    /// Time of the most recent strike that played a chord.
    pub last_strum: Option<Duration>,
}

/// The hands of one frame, by role.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Roles<'a> {
    pub chord: Option<&'a Hand>,
    pub strum: Option<&'a Hand>,
}

/// Splits hands by wrist position: left of `split` is the chord hand,
/// everything else strums. When several hands land on one side, the last wins.
pub fn assign_roles(hands: &[Hand], split: f32) -> Roles<'_> {
    let mut roles = Roles::default();
    for hand in hands {
        if hand.wrist().x < split {
            roles.chord = Some(hand);
        } else {
            roles.strum = Some(hand);
        }
    }
    roles
}

/// The outcome of processing one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Time the frame was processed at.
    pub at: Duration,
    /// Per-frame classification of the chord hand.
    pub raw_chord: Option<ChordSymbol>,
    /// The chord that will sound on the next strike.
    pub stable_chord: Option<ChordSymbol>,
    /// True if the stable chord changed on this frame.
    pub chord_changed: bool,
    /// True if the strum hand struck on this frame.
    pub strummed: bool,
    /// How the strike was rendered, if anything was played.
    pub played: Option<Playback>,
}

/// Turns hand frames into chord playback.
pub struct Orchestrator {
    state: PipelineState,
    classifier: ChordClassifier,
    stabilizer: ChordStabilizer,
    detector: OnsetDetector,
    engine: Arc<AudioEngine>,
    clock: Arc<dyn Clock>,
    split: f32,
    auto_resume: bool,
    stable_chord: Option<ChordSymbol>,
    last_strum: Option<Duration>,
    status_tx: watch::Sender<PipelineStatus>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<AudioEngine>,
        classifier: ChordClassifier,
        stabilizer: ChordStabilizer,
        detector: OnsetDetector,
        split: f32,
        clock: Arc<dyn Clock>,
    ) -> Orchestrator {
        let (status_tx, _) = watch::channel(PipelineStatus {
            state: PipelineState::Initializing,
            stable_chord: None,
            last_strum: None,
        });
        Orchestrator {
            state: PipelineState::Initializing,
            classifier,
            stabilizer,
            detector,
            engine,
            clock,
            split,
            auto_resume: true,
            stable_chord: None,
            last_strum: None,
            status_tx,
        }
    }

    /// Builds the orchestrator and its audio engine from the configuration.
    pub fn from_config(
        config: &InstrumentConfig,
        device: Option<Arc<dyn audio::Device>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Orchestrator, ConfigError> {
        let samples = config.samples();
        let engine = AudioEngine::new(
            device,
            Arc::new(samples.asset_source(config.base_path())),
            samples.volume(),
            config.synth().settings()?,
        );

        let orchestrator = Orchestrator::new(
            Arc::new(engine),
            config.classifier().classifier(),
            config.stabilizer().stabilizer(),
            config.strum().detector()?,
            config.roles().split(),
            clock,
        );
        Ok(orchestrator.with_auto_resume(config.audio().is_some_and(|audio| audio.auto_resume())))
    }

    /// Whether `start` resumes audio output on its own.
    pub fn with_auto_resume(mut self, auto_resume: bool) -> Orchestrator {
        self.auto_resume = auto_resume;
        self
    }

    /// Preloads samples and becomes ready for frames.
    pub async fn start(&mut self) {
        if self.state != PipelineState::Initializing {
            return;
        }

        let loaded = self.engine.preload().await;
        if self.auto_resume {
            self.engine.resume();
        }

        self.state = PipelineState::Ready;
        info!(samples = loaded, "Pipeline ready");
        self.publish();
    }

    /// Runs one frame through the pipeline. Frames are ignored unless the
    /// pipeline is ready.
    pub fn process_frame(&mut self, frame: &HandFrame) -> FrameReport {
        if self.state != PipelineState::Ready {
            debug!(state = %self.state, "Ignoring frame");
            return FrameReport::default();
        }

        let span = span!(Level::TRACE, "frame");
        let _enter = span.enter();

        let now = frame.timestamp.unwrap_or_else(|| self.clock.now());
        let roles = assign_roles(&frame.hands, self.split);
        let mut report = FrameReport {
            at: now,
            ..Default::default()
        };

        if let Some(hand) = roles.chord {
            report.raw_chord = self.classifier.classify(hand);
            if let Some(stable) = self.stabilizer.observe(report.raw_chord) {
                if self.stable_chord != Some(stable) {
                    info!(chord = %stable, "Chord changed");
                    report.chord_changed = true;
                }
                self.stable_chord = Some(stable);
            }
        }

        if let Some(hand) = roles.strum {
            if self.detector.detect(hand, now) {
                report.strummed = true;
                // A strike only counts when there is a chord to sound.
                if let Some(chord) = self.stable_chord {
                    self.last_strum = Some(now);
                    report.played = Some(self.engine.play(chord));
                }
            }
        }

        report.stable_chord = self.stable_chord;
        self.publish();
        report
    }

    /// A user gesture happened, which allows audio output on most platforms.
    pub fn interaction(&self) {
        self.engine.resume();
    }

    /// Stops the pipeline and closes audio output. Idempotent.
    pub fn stop(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.engine.close();
        self.state = PipelineState::Stopped;
        info!("Pipeline stopped");
        self.publish();
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stable_chord(&self) -> Option<ChordSymbol> {
        self.stable_chord
    }

    pub fn last_strum(&self) -> Option<Duration> {
        self.last_strum
    }

    pub fn engine(&self) -> &Arc<AudioEngine> {
        &self.engine
    }

    /// Subscribes to status updates.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status_tx.subscribe()
    }

    fn publish(&self) {
        self.status_tx.send_replace(PipelineStatus {
            state: self.state,
            stable_chord: self.stable_chord,
            last_strum: self.last_strum,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{mock, Device as _, DeviceState, SynthSettings};
    use crate::clock::ManualClock;
    use crate::landmarks::FingerState;
    use crate::samples::MemoryAssetSource;
    use crate::testutil::{hand_at, hand_with_fingers};

    const FRAME: Duration = Duration::from_millis(33);

    fn orchestrator(device: Option<mock::Device>) -> Orchestrator {
        let engine = AudioEngine::new(
            device.map(|device| Arc::new(device) as Arc<dyn audio::Device>),
            Arc::new(MemoryAssetSource::default()),
            1.0,
            SynthSettings::default(),
        );
        Orchestrator::new(
            Arc::new(engine),
            ChordClassifier::default(),
            ChordStabilizer::default(),
            OnsetDetector::default(),
            DEFAULT_SPLIT,
            Arc::new(ManualClock::new()),
        )
    }

    fn chord_hand(chord: ChordSymbol) -> Hand {
        hand_with_fingers(chord.fingerprint(), 0.2, 0.8)
    }

    /// A hand shape at least two fingers away from every chord.
    fn no_chord_hand() -> Hand {
        hand_with_fingers(FingerState::new(false, false, true, false, true), 0.2, 0.8)
    }

    fn frame(i: u32, hands: Vec<Hand>) -> HandFrame {
        HandFrame::at(FRAME * i, hands)
    }

    #[test]
    fn test_assign_roles() {
        let left = hand_at(0.2, 0.5);
        let right = hand_at(0.8, 0.5);
        let hands = [right.clone(), left.clone()];
        let roles = assign_roles(&hands, 0.5);
        assert_eq!(roles.chord, Some(&left));
        assert_eq!(roles.strum, Some(&right));

        assert_eq!(assign_roles(&[], 0.5), Roles::default());
    }

    #[test]
    fn test_split_boundary_is_strum_hand() {
        let hand = hand_at(0.5, 0.5);
        let roles = assign_roles(std::slice::from_ref(&hand), 0.5);
        assert_eq!(roles.chord, None);
        assert_eq!(roles.strum, Some(&hand));

        let hand = hand_at(0.4999, 0.5);
        let roles = assign_roles(std::slice::from_ref(&hand), 0.5);
        assert_eq!(roles.chord, Some(&hand));
    }

    #[test]
    fn test_last_hand_wins_a_side() {
        let first = hand_at(0.1, 0.5);
        let second = hand_at(0.3, 0.5);
        let hands = [first, second.clone()];
        let roles = assign_roles(&hands, 0.5);
        assert_eq!(roles.chord, Some(&second));
        assert_eq!(roles.strum, None);
    }

    #[tokio::test]
    async fn test_frames_ignored_until_started() {
        let mut orchestrator = orchestrator(None);
        assert_eq!(orchestrator.state(), PipelineState::Initializing);
        for i in 0..5 {
            let report = orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::C)]));
            assert_eq!(report, FrameReport::default());
        }

        orchestrator.start().await;
        assert_eq!(orchestrator.state(), PipelineState::Ready);
        assert_eq!(orchestrator.stable_chord(), None);
    }

    #[tokio::test]
    async fn test_chord_then_strum_plays() {
        let device = mock::Device::get("mock", 8000);
        let mut orchestrator = orchestrator(Some(device.clone()));
        orchestrator.start().await;
        assert_eq!(device.state(), DeviceState::Running);

        let mut i = 0;
        for _ in 0..3 {
            orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::G)]));
            i += 1;
        }
        assert_eq!(orchestrator.stable_chord(), Some(ChordSymbol::G));

        // Strum hand rests, then moves down quickly.
        orchestrator.process_frame(&frame(
            i,
            vec![chord_hand(ChordSymbol::G), hand_at(0.8, 0.2)],
        ));
        let report = orchestrator.process_frame(&frame(
            i + 1,
            vec![chord_hand(ChordSymbol::G), hand_at(0.8, 0.35)],
        ));

        assert!(report.strummed);
        assert_eq!(report.played, Some(Playback::Synthesized));
        assert_eq!(orchestrator.last_strum(), Some(FRAME * (i + 1)));
        let frequencies: Vec<f32> = device
            .voices_played()
            .iter()
            .map(|voice| voice.frequency)
            .collect();
        assert_eq!(frequencies, ChordSymbol::G.triad().to_vec());
    }

    #[tokio::test]
    async fn test_strum_without_chord_is_silent() {
        let device = mock::Device::get("mock", 8000);
        let mut orchestrator = orchestrator(Some(device.clone()));
        orchestrator.start().await;
        let status = orchestrator.subscribe();

        orchestrator.process_frame(&frame(0, vec![hand_at(0.8, 0.2)]));
        let report = orchestrator.process_frame(&frame(1, vec![hand_at(0.8, 0.4)]));

        assert!(report.strummed);
        assert_eq!(report.played, None);
        assert!(device.voices_played().is_empty());
        assert_eq!(orchestrator.last_strum(), None);
        assert_eq!(status.borrow().last_strum, None);
    }

    #[tokio::test]
    async fn test_stable_chord_is_sticky() {
        let mut orchestrator = orchestrator(None);
        orchestrator.start().await;

        for i in 0..5 {
            orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::Em)]));
        }
        assert_eq!(orchestrator.stable_chord(), Some(ChordSymbol::Em));

        // Frames with no hands, or a chord hand that matches nothing, change nothing.
        for i in 5..10 {
            let report = orchestrator.process_frame(&frame(i, vec![]));
            assert_eq!(report.stable_chord, Some(ChordSymbol::Em));
        }
        assert_eq!(ChordClassifier::default().classify(&no_chord_hand()), None);
        for i in 10..20 {
            orchestrator.process_frame(&frame(i, vec![no_chord_hand()]));
        }
        assert_eq!(orchestrator.stable_chord(), Some(ChordSymbol::Em));
    }

    #[tokio::test]
    async fn test_chord_change_needs_votes() {
        let mut orchestrator = orchestrator(None);
        orchestrator.start().await;
        for i in 0..3 {
            orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::C)]));
        }

        let mut changed_at = None;
        for i in 3..8 {
            let report = orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::F)]));
            if report.chord_changed {
                changed_at = Some(i);
                break;
            }
        }
        // The window holds [C, C, C, F, F] and then [C, C, F, F, F].
        assert_eq!(changed_at, Some(5));
        assert_eq!(orchestrator.stable_chord(), Some(ChordSymbol::F));
    }

    #[tokio::test]
    async fn test_interaction_resumes() {
        let device = mock::Device::get("mock", 8000);
        let mut orchestrator = orchestrator(Some(device.clone())).with_auto_resume(false);
        orchestrator.start().await;
        assert_eq!(device.state(), DeviceState::Suspended);

        orchestrator.interaction();
        assert_eq!(device.state(), DeviceState::Running);
    }

    #[tokio::test]
    async fn test_stop() {
        let device = mock::Device::get("mock", 8000);
        let mut orchestrator = orchestrator(Some(device.clone()));
        let mut status = orchestrator.subscribe();
        orchestrator.start().await;
        assert_eq!(status.borrow_and_update().state, PipelineState::Ready);

        orchestrator.stop();
        orchestrator.stop();
        assert_eq!(orchestrator.state(), PipelineState::Stopped);
        assert_eq!(device.state(), DeviceState::Closed);
        assert_eq!(status.borrow_and_update().state, PipelineState::Stopped);

        let report = orchestrator.process_frame(&frame(0, vec![chord_hand(ChordSymbol::C)]));
        assert_eq!(report, FrameReport::default());
    }

    #[tokio::test]
    async fn test_status_published_per_frame() {
        let mut orchestrator = orchestrator(None);
        let status = orchestrator.subscribe();
        orchestrator.start().await;
        for i in 0..3 {
            orchestrator.process_frame(&frame(i, vec![chord_hand(ChordSymbol::Rock)]));
        }
        assert_eq!(status.borrow().stable_chord, Some(ChordSymbol::Rock));
    }

    #[tokio::test]
    async fn test_clock_used_without_timestamps() {
        let clock = ManualClock::new();
        let engine = AudioEngine::new(
            None,
            Arc::new(MemoryAssetSource::default()),
            1.0,
            SynthSettings::default(),
        );
        let mut orchestrator = Orchestrator::new(
            Arc::new(engine),
            ChordClassifier::default(),
            ChordStabilizer::default(),
            OnsetDetector::default(),
            DEFAULT_SPLIT,
            Arc::new(clock.clone()),
        );
        orchestrator.start().await;

        orchestrator.process_frame(&HandFrame::new(vec![hand_at(0.7, 0.1)]));
        clock.advance(Duration::from_millis(20));
        let report = orchestrator.process_frame(&HandFrame::new(vec![hand_at(0.7, 0.2)]));
        assert!(report.strummed);
        assert_eq!(report.at, Duration::from_millis(20));
    }

    #[test]
    fn test_from_config() {
        let config = InstrumentConfig::from_yaml(
            "audio: { device: mock, auto_resume: false }\nroles: { split: 0.3 }",
        )
        .unwrap();
        let device = audio::get_device(config.audio()).unwrap();
        let orchestrator =
            Orchestrator::from_config(&config, device, Arc::new(ManualClock::new())).unwrap();
        assert!(!orchestrator.auto_resume);
        assert_eq!(orchestrator.split, 0.3);
        assert!(orchestrator.engine().device().is_some());
    }
}
