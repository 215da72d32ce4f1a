use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// One line of user input, without the trailing newline
  Line(String),
  /// Periodic tick for query polling
  Tick,
  /// Input closed
  Eof,
}

/// Event handler that produces events from line input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Read lines from stdin, ticking at `tick_rate`
  pub fn stdin(tick_rate: Duration) -> Self {
    Self::with_reader(BufReader::new(tokio::io::stdin()), tick_rate)
  }

  pub fn with_reader<R>(reader: R, tick_rate: Duration) -> Self
  where
    R: AsyncBufRead + Unpin + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut lines = reader.lines();
      let mut ticker = tokio::time::interval(tick_rate);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

      loop {
        let event = tokio::select! {
          line = lines.next_line() => match line {
            Ok(Some(line)) => Event::Line(line),
            Ok(None) => Event::Eof,
            Err(e) => {
              tracing::warn!(error = %e, "failed to read input");
              Event::Eof
            }
          },
          _ = ticker.tick() => Event::Tick,
        };

        let done = event == Event::Eof;
        if tx.send(event).is_err() || done {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_lines_then_eof() {
    let input: &'static [u8] = b"popular\nsearch batman\n";
    let mut events = EventHandler::with_reader(BufReader::new(input), Duration::from_secs(3600));

    let mut lines = Vec::new();
    while let Some(event) = events.next().await {
      match event {
        Event::Line(line) => lines.push(line),
        Event::Tick => {}
        Event::Eof => break,
      }
    }

    assert_eq!(lines, vec!["popular", "search batman"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_ticks_while_idle() {
    let (_writer, reader) = tokio::io::duplex(64);
    let mut events = EventHandler::with_reader(BufReader::new(reader), Duration::from_millis(100));

    assert_eq!(events.next().await, Some(Event::Tick));
    assert_eq!(events.next().await, Some(Event::Tick));
  }
}
