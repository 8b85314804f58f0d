//! Follow an access log from its current end, like `tail -F`
//!
//! Waits for the file to exist, starts at the end so history is ignored,
//! and only yields complete lines. A file that shrinks (truncated by log
//! rotation) is re-read from the start.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{info, warn};

/// Delay between existence checks while the log file is missing
pub const WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// Delay between reads once the end of the file is reached
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    poll_interval: Duration,
    partial: Vec<u8>,
}

impl LogTailer {
    /// Open `path` with the default intervals
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::open_with(path, WAIT_INTERVAL, POLL_INTERVAL).await
    }

    pub async fn open_with(
        path: impl AsRef<Path>,
        wait_interval: Duration,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        while !tokio::fs::try_exists(&path).await? {
            info!(path = %path.display(), "Waiting for log file to be created");
            tokio::time::sleep(wait_interval).await;
        }

        let mut file = File::open(&path).await?;
        let position = file.seek(SeekFrom::End(0)).await?;
        info!(path = %path.display(), offset = position, "Watching log file");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            position,
            poll_interval,
            partial: Vec::new(),
        })
    }

    /// Next complete line without its line ending
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> std::io::Result<String> {
        loop {
            let read = self.reader.read_until(b'\n', &mut self.partial).await?;
            if read == 0 {
                self.rewind_if_truncated().await?;
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            self.position += read as u64;

            if self.partial.ends_with(b"\n") {
                let bytes = std::mem::take(&mut self.partial);
                let line = String::from_utf8_lossy(&bytes);
                return Ok(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }
    }

    async fn rewind_if_truncated(&mut self) -> std::io::Result<()> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            // Mid-rotation; keep reading the old handle until a new file appears
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        if len < self.position {
            warn!(
                path = %self.path.display(),
                old_offset = self.position,
                new_len = len,
                "Log file truncated, reading from start"
            );
            self.reader.seek(SeekFrom::Start(0)).await?;
            self.position = 0;
            self.partial.clear();
        }
        Ok(())
    }
}
