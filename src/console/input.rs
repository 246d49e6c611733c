//! Console input source

use std::io::BufRead;
use tokio::sync::mpsc;

/// Read stdin lines on a dedicated thread
///
/// A plain thread instead of `tokio::io::stdin` so a pending read never
/// holds up runtime shutdown. The channel closes at end of input.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || read_lines(std::io::stdin().lock(), sender));
    if let Err(e) = spawned {
        tracing::warn!("Could not start console input thread: {}", e);
    }
    receiver
}

fn read_lines<R: BufRead>(reader: R, sender: mpsc::UnboundedSender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if sender.send(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read console input: {}", e);
                return;
            }
        }
    }
    tracing::debug!("Console input reached end of file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lines_should_forward_until_eof() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        read_lines(&b"/list\n/view 2\n"[..], sender);

        assert_eq!(receiver.try_recv().unwrap(), "/list");
        assert_eq!(receiver.try_recv().unwrap(), "/view 2");
        assert!(receiver.try_recv().is_err());
    }
}
