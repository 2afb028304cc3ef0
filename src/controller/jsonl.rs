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

//! Reads landmark frames as newline-delimited JSON, one message per line:
//!
//! ```text
//! {"type":"frame","timestamp_ms":12.5,"hands":[[[0.1,0.8,0.0], ...]]}
//! {"type":"interaction"}
//! {"type":"stop"}
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, info, span, warn, Level};

use super::Event;
use crate::landmarks::{Hand, HandFrame};

/// One line of input.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Message {
    Frame {
        timestamp_ms: Option<f64>,
        #[serde(default)]
        hands: Vec<Vec<[f32; 3]>>,
    },
    Interaction,
    Stop,
}

/// Nominal spacing of recorded frames, about 30 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Where to read messages from.
#[derive(Clone, Debug)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

/// A driver that reads landmark messages from a file or stdin.
pub struct Driver {
    input: Input,
    frame_interval: Option<Duration>,
}

impl Driver {
    pub fn new(input: Input) -> Driver {
        Driver {
            input,
            frame_interval: None,
        }
    }

    /// Stamps frames that carry no timestamp with the previous frame's time
    /// plus `interval`, so recordings replay the same regardless of how fast
    /// they are read.
    pub fn with_frame_interval(mut self, interval: Duration) -> Driver {
        self.frame_interval = Some(interval);
        self
    }

    /// Reads messages until the input ends, a stop message is read, or the
    /// controller goes away.
    fn monitor_io<R>(
        events_tx: &Sender<Event>,
        reader: R,
        frame_interval: Option<Duration>,
    ) -> Result<(), io::Error>
    where
        R: BufRead,
    {
        let mut last_timestamp: Option<Duration> = None;
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut event = match parse_line(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(line = number + 1, err = %e, "Skipping malformed message");
                    continue;
                }
            };

            if let Event::Frame(frame) = &mut event {
                if let (None, Some(interval)) = (frame.timestamp, frame_interval) {
                    frame.timestamp =
                        Some(last_timestamp.map_or(Duration::ZERO, |last| last + interval));
                }
                if frame.timestamp.is_some() {
                    last_timestamp = frame.timestamp;
                }
            }

            let stop = event == Event::Stop;
            if events_tx.blocking_send(event).is_err() {
                debug!("Controller closed, no longer reading input");
                return Ok(());
            }
            if stop {
                return Ok(());
            }
        }

        info!("Input finished.");
        Ok(())
    }
}

/// Parses one message. Hands with bad landmarks are dropped from the frame.
fn parse_line(line: &str) -> Result<Event, serde_json::Error> {
    Ok(match serde_json::from_str::<Message>(line)? {
        Message::Frame {
            timestamp_ms,
            hands,
        } => {
            let hands = hands
                .into_iter()
                .filter_map(|raw| match Hand::try_from(raw) {
                    Ok(hand) => Some(hand),
                    Err(e) => {
                        warn!(err = %e, "Skipping hand");
                        None
                    }
                })
                .collect();
            let timestamp =
                timestamp_ms.and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok());
            HandFrame { timestamp, hands }.into()
        }
        Message::Interaction => Event::Interaction,
        Message::Stop => Event::Stop,
    })
}

impl From<HandFrame> for Event {
    fn from(frame: HandFrame) -> Self {
        Event::Frame(frame)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let input = self.input.clone();
        let frame_interval = self.frame_interval;
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "jsonl driver");
            let _enter = span.enter();

            info!(input = ?input, "JSONL driver started.");

            match input {
                Input::Stdin => Self::monitor_io(&events_tx, io::stdin().lock(), frame_interval),
                Input::File(path) => Self::monitor_io(
                    &events_tx,
                    BufReader::new(File::open(path)?),
                    frame_interval,
                ),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, Write};

    use tokio::sync::mpsc;

    use super::*;
    use crate::controller::Driver as _;

    fn hand_json(wrist_x: f32) -> String {
        let points: Vec<String> = (0..21)
            .map(|i| format!("[{},{},0.0]", wrist_x, 0.8 - i as f32 * 0.01))
            .collect();
        format!("[{}]", points.join(","))
    }

    fn events(input: &str) -> Result<Vec<Event>, io::Error> {
        events_with_interval(input, None)
    }

    fn events_with_interval(
        input: &str,
        frame_interval: Option<Duration>,
    ) -> Result<Vec<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(16);
        Driver::monitor_io(&sender, BufReader::new(input.as_bytes()), frame_interval)?;

        // Force the sender to close.
        drop(sender);
        let mut events = Vec::new();
        while let Some(event) = receiver.blocking_recv() {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_messages() -> Result<(), io::Error> {
        let input = format!(
            "{}\n{}\n{}\n",
            r#"{"type":"interaction"}"#,
            format!(
                r#"{{"type":"frame","timestamp_ms":12.5,"hands":[{},{}]}}"#,
                hand_json(0.2),
                hand_json(0.7)
            ),
            r#"{"type":"stop"}"#,
        );
        let events = events(&input)?;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::Interaction);
        match &events[1] {
            Event::Frame(frame) => {
                assert_eq!(frame.timestamp, Some(Duration::from_micros(12500)));
                assert_eq!(frame.hands.len(), 2);
                assert_eq!(frame.hands[1].wrist().x, 0.7);
            }
            other => panic!("expected a frame, got {:?}", other),
        }
        assert_eq!(events[2], Event::Stop);
        Ok(())
    }

    #[test]
    fn test_malformed_lines_are_skipped() -> Result<(), io::Error> {
        let input = [
            "not json",
            r#"{"type":"wave"}"#,
            "",
            r#"{"type":"frame","hands":[[[0.1,0.2,0.3]]]}"#,
            r#"{"type":"frame"}"#,
        ]
        .join("\n");
        let events = events(&input)?;

        // The short hand is dropped but its frame survives.
        assert_eq!(
            events,
            vec![
                Event::Frame(HandFrame::default()),
                Event::Frame(HandFrame::default())
            ]
        );
        Ok(())
    }

    #[test]
    fn test_stop_ends_input() -> Result<(), io::Error> {
        let input = format!(
            "{}\n{}\n",
            r#"{"type":"stop"}"#, r#"{"type":"interaction"}"#
        );
        assert_eq!(events(&input)?, vec![Event::Stop]);
        Ok(())
    }

    #[test]
    fn test_negative_timestamp_is_ignored() -> Result<(), io::Error> {
        let events = events(r#"{"type":"frame","timestamp_ms":-5,"hands":[]}"#)?;
        assert_eq!(events, vec![Event::Frame(HandFrame::default())]);
        Ok(())
    }

    #[test]
    fn test_frame_interval_stamps_missing_timestamps() -> Result<(), io::Error> {
        let input = [
            r#"{"type":"frame"}"#,
            r#"{"type":"frame"}"#,
            r#"{"type":"frame","timestamp_ms":500}"#,
            r#"{"type":"frame"}"#,
        ]
        .join("\n");
        let timestamps: Vec<Option<Duration>> =
            events_with_interval(&input, Some(DEFAULT_FRAME_INTERVAL))?
                .into_iter()
                .map(|event| match event {
                    Event::Frame(frame) => frame.timestamp,
                    other => panic!("expected a frame, got {:?}", other),
                })
                .collect();

        assert_eq!(
            timestamps,
            vec![
                Some(Duration::ZERO),
                Some(Duration::from_millis(33)),
                Some(Duration::from_millis(500)),
                Some(Duration::from_millis(533)),
            ]
        );

        // Without an interval, missing timestamps are left for the clock.
        assert_eq!(
            events(r#"{"type":"frame"}"#)?,
            vec![Event::Frame(HandFrame::default())]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"interaction"}}"#).unwrap();
        writeln!(file, r#"{{"type":"stop"}}"#).unwrap();

        let driver = Driver::new(Input::File(file.path().to_path_buf()));
        let (sender, mut receiver) = mpsc::channel::<Event>(4);
        let handle = driver.monitor_events(sender);

        assert_eq!(receiver.recv().await, Some(Event::Interaction));
        assert_eq!(receiver.recv().await, Some(Event::Stop));
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_file() {
        let driver = Driver::new(Input::File(PathBuf::from("/nonexistent/frames.jsonl")));
        let (sender, _receiver) = mpsc::channel::<Event>(4);
        assert!(driver.monitor_events(sender).await.unwrap().is_err());
    }
}
