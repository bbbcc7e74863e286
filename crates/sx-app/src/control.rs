use std::io::BufRead;
use std::thread;

use sx_core::protocol::ControlMessage;

/// Parse one line of the control stream. Blank lines yield `None`.
///
/// # Errors
/// Returns the JSON error for a malformed message.
pub fn parse_line(line: &str) -> Result<Option<ControlMessage>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Read control messages from stdin on a dedicated thread.
///
/// The thread ends when stdin closes or the receiver is dropped.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_stdin_reader() -> anyhow::Result<flume::Receiver<ControlMessage>> {
    let (tx, rx) = flume::unbounded();

    thread::Builder::new()
        .name("sx-control".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(msg)) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("Ignoring malformed control message: {e}"),
                }
            }
            log::debug!("Control input closed");
        })?;

    Ok(rx)
}
