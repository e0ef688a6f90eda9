use std::collections::{BTreeMap, VecDeque};

/// Host I/O services used by the monitor traps.
///
/// Return values follow the POSIX convention: a byte count or descriptor on success,
/// a negative value on failure.
pub trait HostCallbacks {
    /// Opens `path` with target `flags`.
    fn open(&mut self, path: &[u8], flags: i32) -> i64;

    /// Reads up to `buf.len()` bytes from `fd`.
    fn read(&mut self, fd: i32, buf: &mut [u8]) -> i64;

    /// Writes `data` to `fd`.
    fn write(&mut self, fd: i32, data: &[u8]) -> i64;

    /// Closes `fd`.
    fn close(&mut self, fd: i32) -> i64;

    /// Reads one byte of console input.
    fn read_stdin(&mut self) -> Option<u8>;

    /// Writes console output.
    fn write_stdout(&mut self, data: &[u8]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenFile {
    path: Vec<u8>,
    position: usize,
}

/// In-memory host: console buffers plus a flat file namespace.
///
/// Descriptors 0, 1 and 2 are the console. Files opened by path get descriptors from 3.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferedHost {
    stdin: VecDeque<u8>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    files: BTreeMap<Vec<u8>, Vec<u8>>,
    open: BTreeMap<i32, OpenFile>,
}

const FIRST_FILE_FD: i32 = 3;

impl BufferedHost {
    /// Creates a host with empty console buffers and no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to console input.
    pub fn push_stdin(&mut self, data: &[u8]) {
        self.stdin.extend(data);
    }

    /// Console output written so far, through `write_stdout` or descriptor 1.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Bytes written to descriptor 2.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Creates or replaces a file.
    pub fn insert_file(&mut self, path: &[u8], contents: &[u8]) {
        self.files.insert(path.to_vec(), contents.to_vec());
    }

    /// Contents of the file at `path`.
    #[must_use]
    pub fn file(&self, path: &[u8]) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    fn next_fd(&self) -> i32 {
        self.open
            .keys()
            .next_back()
            .map_or(FIRST_FILE_FD, |fd| fd.saturating_add(1))
    }
}

/// Target `O_CREAT` as used by the monitor library.
const O_CREAT: i32 = 0x0200;
/// Target `O_TRUNC`.
const O_TRUNC: i32 = 0x0400;

impl HostCallbacks for BufferedHost {
    fn open(&mut self, path: &[u8], flags: i32) -> i64 {
        if !self.files.contains_key(path) {
            if flags & O_CREAT == 0 {
                return -1;
            }
            self.files.insert(path.to_vec(), Vec::new());
        } else if flags & O_TRUNC != 0 {
            self.files.insert(path.to_vec(), Vec::new());
        }
        let fd = self.next_fd();
        self.open.insert(
            fd,
            OpenFile {
                path: path.to_vec(),
                position: 0,
            },
        );
        i64::from(fd)
    }

    fn read(&mut self, fd: i32, buf: &mut [u8]) -> i64 {
        if fd == 0 {
            let count = buf.len().min(self.stdin.len());
            for (slot, byte) in buf.iter_mut().zip(self.stdin.drain(..count)) {
                *slot = byte;
            }
            return count as i64;
        }
        let Some(file) = self.open.get_mut(&fd) else {
            return -1;
        };
        let Some(contents) = self.files.get(&file.path) else {
            return -1;
        };
        let available = contents.get(file.position..).unwrap_or_default();
        let count = buf.len().min(available.len());
        buf[..count].copy_from_slice(&available[..count]);
        file.position += count;
        count as i64
    }

    fn write(&mut self, fd: i32, data: &[u8]) -> i64 {
        match fd {
            1 => self.stdout.extend_from_slice(data),
            2 => self.stderr.extend_from_slice(data),
            _ => {
                let Some(file) = self.open.get_mut(&fd) else {
                    return -1;
                };
                let Some(contents) = self.files.get_mut(&file.path) else {
                    return -1;
                };
                let end = file.position + data.len();
                if contents.len() < end {
                    contents.resize(end, 0);
                }
                contents[file.position..end].copy_from_slice(data);
                file.position = end;
            }
        }
        data.len() as i64
    }

    fn close(&mut self, fd: i32) -> i64 {
        if (0..FIRST_FILE_FD).contains(&fd) || self.open.remove(&fd).is_some() {
            0
        } else {
            -1
        }
    }

    fn read_stdin(&mut self) -> Option<u8> {
        self.stdin.pop_front()
    }

    fn write_stdout(&mut self, data: &[u8]) {
        self.stdout.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedHost, HostCallbacks, O_CREAT};

    #[test]
    fn console_descriptors_reach_the_buffers() {
        let mut host = BufferedHost::new();
        assert_eq!(host.write(1, b"out"), 3);
        assert_eq!(host.write(2, b"err"), 3);
        host.write_stdout(b"!");
        assert_eq!(host.stdout(), b"out!");
        assert_eq!(host.stderr(), b"err");

        host.push_stdin(b"ab");
        let mut buf = [0u8; 4];
        assert_eq!(host.read(0, &mut buf), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(host.read_stdin(), None);
    }

    #[test]
    fn files_keep_a_read_write_position() {
        let mut host = BufferedHost::new();
        host.insert_file(b"in.txt", b"hello");
        let fd = host.open(b"in.txt", 0) as i32;
        assert_eq!(fd, 3);
        let mut buf = [0u8; 3];
        assert_eq!(host.read(fd, &mut buf), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(host.read(fd, &mut buf), 2);
        assert_eq!(host.close(fd), 0);
        assert_eq!(host.close(fd), -1);

        assert_eq!(host.open(b"missing", 0), -1);
        let out = host.open(b"new.txt", O_CREAT) as i32;
        assert_eq!(host.write(out, b"data"), 4);
        assert_eq!(host.file(b"new.txt"), Some(&b"data"[..]));
    }
}
