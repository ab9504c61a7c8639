//! ファイルI/Oユーティリティ（"-" で標準入出力）

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const READER_BUF_CAP: usize = 64 * 1024; // 64 KiB

fn is_stdio(p: &Path) -> bool {
    p.to_string_lossy() == "-"
}

pub fn open_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let p = path.as_ref();
    if is_stdio(p) {
        return Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, io::stdin())));
    }
    let f = File::open(p)?;
    Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, f)))
}

/// ファイル全体を文字列として読む（"-" なら標準入力）
pub fn read_to_string<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut reader = open_reader(path)?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Writer wrapper to propagate flush/close errors.
#[must_use = "call .close() to propagate IO errors"]
pub enum Writer {
    Plain(BufWriter<File>),
    Stdout(io::Stdout),
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Writer::Plain(f) => f.write(buf),
            Writer::Stdout(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Writer::Plain(f) => f.flush(),
            Writer::Stdout(s) => s.flush(),
        }
    }
}

impl Writer {
    /// Finalize the stream and flush underlying file/stdout.
    pub fn close(self) -> io::Result<()> {
        match self {
            Writer::Plain(f) => {
                let mut file = f.into_inner().map_err(|e| e.into_error())?;
                file.flush()
            }
            Writer::Stdout(mut s) => s.flush(),
        }
    }
}

pub fn open_writer<P: AsRef<Path>>(path: P) -> io::Result<Writer> {
    let p = path.as_ref();
    if is_stdio(p) {
        return Ok(Writer::Stdout(io::stdout()));
    }
    let f = File::create(p)?;
    Ok(Writer::Plain(BufWriter::new(f)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut w = open_writer(&path).unwrap();
        writeln!(w, "score = -70.23").unwrap();
        w.close().unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "score = -70.23\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_reader(dir.path().join("missing.toml")).is_err());
    }
}
