use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

const HEADER_LEN: usize = 4;
const TRAILER_LEN: usize = 4;
/// Anything longer can only come from a damaged length header.
const MAX_PAYLOAD_LEN: u32 = 1 << 20;

/// One log entry: `[u32 le: payload len][bincode Event][u32 le: crc32 of payload]`.
fn frame(event: &Event) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(buf)
}

/// `read_exact` that reports a short read instead of failing on it.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

enum Frame {
    Event(Event),
    End,
    /// Short, oversized, checksum-failing or undecodable entry.
    Torn,
}

fn read_frame(reader: &mut impl Read) -> io::Result<(Frame, usize)> {
    let mut header = [0u8; HEADER_LEN];
    match fill(reader, &mut header)? {
        0 => return Ok((Frame::End, 0)),
        n if n < HEADER_LEN => return Ok((Frame::Torn, 0)),
        _ => {}
    }
    let len = u32::from_le_bytes(header);
    if len > MAX_PAYLOAD_LEN {
        return Ok((Frame::Torn, 0));
    }
    let mut body = vec![0u8; len as usize + TRAILER_LEN];
    if fill(reader, &mut body)? < body.len() {
        return Ok((Frame::Torn, 0));
    }
    let (payload, trailer) = body.split_at(len as usize);
    let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc != crc32fast::hash(payload) {
        return Ok((Frame::Torn, 0));
    }
    match bincode::deserialize(payload) {
        Ok(event) => Ok((Frame::Event(event), HEADER_LEN + body.len())),
        Err(_) => Ok((Frame::Torn, 0)),
    }
}

/// What survived in a log file.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
    /// Bytes after `valid_len` that could not be read back (crash mid-append).
    pub torn_tail: bool,
}

/// Append-only log of item, booking and comment events.
///
/// Appends are buffered and become durable on `flush_sync`, which the store's
/// writer task calls once per batch. A torn final entry is detected on replay
/// and cut off with `discard_tail` before the log is reopened for appending.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    compact_path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: Self::append_handle(path)?,
            path: path.to_path_buf(),
            compact_path: path.with_extension("wal.compact"),
            appends_since_compact: 0,
        })
    }

    fn append_handle(path: &Path) -> io::Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.writer.write_all(&frame(event)?)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Count `entries` already in the file that a compaction would drop,
    /// so the threshold holds across reopens.
    pub fn carry_backlog(&mut self, entries: u64) {
        self.appends_since_compact += entries;
    }

    /// Replace the log with `events`: write them beside it, fsync, rename
    /// over it, and continue appending to the new file.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        self.flush_sync()?;
        {
            let mut out = BufWriter::new(File::create(&self.compact_path)?);
            for event in events {
                out.write_all(&frame(event)?)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&self.compact_path, &self.path)?;
        self.writer = Self::append_handle(&self.path)?;
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Read every intact entry. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        loop {
            match read_frame(&mut reader)? {
                (Frame::Event(event), n) => {
                    replay.events.push(event);
                    replay.valid_len += n as u64;
                }
                (Frame::End, _) | (Frame::Torn, _) => break,
            }
        }
        replay.torn_tail = replay.valid_len < total;
        Ok(replay)
    }

    /// Truncate the log to its intact prefix.
    pub fn discard_tail(path: &Path, valid_len: u64) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid_len)?;
        file.sync_all()
    }
}
