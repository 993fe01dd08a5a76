// EventLoopBridge - Feeds terminal input and timer ticks into the controller
//
// Input arrives on a spawned tokio task that reads lines, parses them and
// forwards the resulting AppMessages over a bounded mpsc channel. The loop
// itself runs on the caller's task and selects between that channel and a
// periodic tick, so every message reaches the GameController one at a time.

use crate::state::{StateChange, StateManager};
use crate::ui::controller::{Flow, GameController};
use crate::ui::input::{AppMessage, InputParser};
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Capacity of the input channel
pub const INPUT_CHANNEL_CAPACITY: usize = 100;

/// Owns the receiving end of the input channel and drives the controller
///
/// # Example
/// ```ignore
/// let bridge = EventLoopBridge::new();
/// bridge.spawn_input_reader(BufReader::new(tokio::io::stdin()), parser);
/// bridge.run(&mut controller).await?;
/// ```
pub struct EventLoopBridge {
    message_tx: mpsc::Sender<AppMessage>,
    message_rx: mpsc::Receiver<AppMessage>,
}

impl EventLoopBridge {
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        Self {
            message_tx,
            message_rx,
        }
    }

    /// Cloneable sender for producers of messages
    pub fn clone_handle(&self) -> EventLoopBridgeHandle {
        EventLoopBridgeHandle {
            message_tx: self.message_tx.clone(),
        }
    }

    /// Spawn a task that reads `reader` line by line until EOF.
    ///
    /// EOF closes the channel, which ends [`run()`](Self::run).
    pub fn spawn_input_reader<R>(&self, reader: R, parser: InputParser) -> JoinHandle<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let handle = self.clone_handle();
        tokio::spawn(async move {
            tracing::debug!("Input reader task started");
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        for message in parser.parse_or_invalid(&line) {
                            if !handle.send_message(message) {
                                tracing::debug!("Input reader task stopping: loop has exited");
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }

            tracing::debug!("Input reader task terminated");
        })
    }

    /// Process messages and ticks until quit or until every sender is gone.
    pub async fn run<W: Write>(self, controller: &mut GameController<W>) -> Result<()> {
        let Self {
            message_tx,
            mut message_rx,
        } = self;
        // Only the spawned producers keep the channel open from here on.
        drop(message_tx);

        let mut ticker = time::interval(controller.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        controller.render()?;

        loop {
            let message = tokio::select! {
                received = message_rx.recv() => match received {
                    Some(message) => message,
                    None => {
                        tracing::info!("All input sources closed, leaving event loop");
                        break;
                    }
                },
                _ = ticker.tick(), if controller.wants_ticks() => AppMessage::Tick,
            };

            if controller.handle(message)? == Flow::Quit {
                break;
            }
        }

        Ok(())
    }
}

impl Default for EventLoopBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle that can be cloned into producer tasks
#[derive(Clone)]
pub struct EventLoopBridgeHandle {
    message_tx: mpsc::Sender<AppMessage>,
}

impl EventLoopBridgeHandle {
    /// Queue a message for the loop without waiting.
    ///
    /// Returns false once the loop has gone away. A full channel drops the
    /// message with a warning.
    pub fn send_message(&self, message: AppMessage) -> bool {
        match self.message_tx.try_send(message) {
            Ok(_) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!("Input channel full - dropping {:?}", message);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send input - event loop has stopped");
                false
            }
        }
    }
}

/// Spawn a task that logs every state change until the channel closes.
pub fn spawn_state_logger(state_manager: &StateManager) -> JoinHandle<()> {
    let mut rx = state_manager.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => match &change {
                    StateChange::RoundResolved {
                        result,
                        player_wins,
                        ai_wins,
                    } => tracing::info!(
                        "Round resolved: {:?} (player {} - AI {})",
                        result,
                        player_wins,
                        ai_wins
                    ),
                    StateChange::NoticeRaised { message } => {
                        tracing::debug!("Notice: {}", message)
                    }
                    StateChange::QuitRequested => {
                        tracing::debug!("Quit event received");
                    }
                    other => tracing::trace!("State change: {:?}", other),
                },
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("State broadcast channel closed - stopping state logger");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("State logger lagged - {} events were skipped", skipped);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_reports_closed_loop() {
        let bridge = EventLoopBridge::new();
        let handle = bridge.clone_handle();
        assert!(handle.send_message(AppMessage::Help));

        drop(bridge);
        assert!(!handle.send_message(AppMessage::Help));
    }

    #[tokio::test]
    async fn test_full_channel_drops_message() {
        let bridge = EventLoopBridge::new();
        let handle = bridge.clone_handle();
        for _ in 0..INPUT_CHANNEL_CAPACITY {
            assert!(handle.send_message(AppMessage::Tick));
        }
        // Still reported as delivered; the loop is alive.
        assert!(handle.send_message(AppMessage::Tick));
    }

    #[tokio::test]
    async fn test_input_reader_parses_lines() {
        let mut bridge = EventLoopBridge::new();
        let parser = InputParser::solver().unwrap();
        let input: &'static [u8] = b"setup\n1 2\nbogus\n";

        let task = bridge.spawn_input_reader(input, parser);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        let mut received = Vec::new();
        while let Ok(message) = bridge.message_rx.try_recv() {
            received.push(message);
        }
        assert_eq!(received.len(), 3);
        assert_eq!(received[0], AppMessage::BeginSetup);
        assert!(matches!(received[2], AppMessage::Invalid(_)));
    }
}
