use std::sync::{Arc, Mutex, PoisonError};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::watch,
    task::JoinHandle,
};

/// Markers observed so far in a process's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub ready: bool,
    pub kill: bool,
}

/// Output buffer shared between a reader task and its process
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Text to watch for while reading a stream
#[derive(Debug, Clone, Default)]
pub struct Markers {
    pub ready: Option<String>,
    pub kill: Option<String>,
}

/// Read `reader` line by line into `buffer` until EOF, flagging markers
///
/// The task owns one reference to `signals`; once every reader has hit EOF
/// the sender is dropped and receivers observe the channel as closed.
pub fn spawn_reader<R>(
    endpoint: String,
    reader: R,
    buffer: SharedBuffer,
    markers: Markers,
    signals: Arc<watch::Sender<Signals>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    buffer.append(&line);
                    let text = String::from_utf8_lossy(&line);
                    if let Some(marker) = &markers.ready
                        && text.contains(marker.as_str())
                    {
                        tracing::debug!(%endpoint, %marker, "readiness marker seen");
                        signals.send_modify(|s| s.ready = true);
                    }
                    if let Some(marker) = &markers.kill
                        && text.contains(marker.as_str())
                    {
                        tracing::debug!(%endpoint, %marker, "kill marker seen");
                        signals.send_modify(|s| s.kill = true);
                    }
                }
                Err(err) => {
                    tracing::debug!(%endpoint, "output stream error: {err}");
                    break;
                }
            }
        }
    })
}
