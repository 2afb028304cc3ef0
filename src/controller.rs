// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, trace, Instrument, Level};

use crate::landmarks::HandFrame;
use crate::pipeline::{FrameReport, Orchestrator};

pub mod jsonl;

/// Number of events that may queue up before a driver blocks.
const EVENT_BUFFER: usize = 8;

/// Events that drive the pipeline.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// A new frame of hand landmarks.
    Frame(HandFrame),

    /// A user gesture. Audio output may only start after one of these on
    /// most platforms.
    Interaction,

    /// Stops the pipeline and the controller.
    Stop,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds driver events to the orchestrator, one at a time.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(orchestrator: Orchestrator, driver: Arc<dyn Driver>) -> Controller {
        Controller::spawn(orchestrator, driver, None)
    }

    /// Creates a new controller that also forwards every frame report.
    pub fn with_reports(
        orchestrator: Orchestrator,
        driver: Arc<dyn Driver>,
        reports_tx: mpsc::UnboundedSender<FrameReport>,
    ) -> Controller {
        Controller::spawn(orchestrator, driver, Some(reports_tx))
    }

    fn spawn(
        orchestrator: Orchestrator,
        driver: Arc<dyn Driver>,
        reports_tx: Option<mpsc::UnboundedSender<FrameReport>>,
    ) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(
                Controller::handle_events(orchestrator, driver, reports_tx).instrument(span),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Starts the orchestrator, then handles events from the driver until it
    /// stops or asks to stop.
    async fn handle_events(
        mut orchestrator: Orchestrator,
        driver: Arc<dyn Driver>,
        reports_tx: Option<mpsc::UnboundedSender<FrameReport>>,
    ) {
        orchestrator.start().await;

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            match event {
                Event::Frame(frame) => {
                    trace!(hands = frame.hands.len(), "Received frame.");
                    let report = orchestrator.process_frame(&frame);
                    if let Some(reports_tx) = &reports_tx {
                        // Nobody listening is fine.
                        let _ = reports_tx.send(report);
                    }
                }
                Event::Interaction => {
                    info!("Received interaction.");
                    orchestrator.interaction();
                }
                Event::Stop => {
                    info!("Received stop.");
                    break;
                }
            }
        }

        info!("Controller closing.");
        orchestrator.stop();
        // Dropping the receiver unblocks a driver waiting to send.
        drop(events_rx);
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
    }
}
