use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::write::GzEncoder;
use flate2::Compression;

/// A rotating file writer for a single stream's transcoder stdout/stderr. Rotates
/// when the current file exceeds `max_size_bytes` or `max_age`, whichever comes
/// first, keeping at most `max_backups` numbered files and optionally gzipping
/// rotated-out files. `tracing-appender`'s rolling writer only rotates on a fixed
/// time schedule; child-process logs need a size bound too, so this is hand-rolled.
pub struct RotatingWriter {
    dir: PathBuf,
    stem: String,
    file: File,
    bytes_written: u64,
    opened_at: SystemTime,
    max_size_bytes: u64,
    max_age: Duration,
    max_backups: u32,
    compress: bool,
}

impl RotatingWriter {
    pub fn create(
        dir: &Path,
        stem: &str,
        max_size_bytes: u64,
        max_age: Duration,
        max_backups: u32,
        compress: bool,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{stem}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(RotatingWriter {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
            file,
            bytes_written,
            opened_at: SystemTime::now(),
            max_size_bytes,
            max_age,
            max_backups,
            compress,
        })
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        if self.compress {
            self.dir.join(format!("{}.log.{n}.gz", self.stem))
        } else {
            self.dir.join(format!("{}.log.{n}", self.stem))
        }
    }

    fn should_rotate(&self) -> bool {
        self.bytes_written >= self.max_size_bytes
            || self.opened_at.elapsed().unwrap_or(Duration::ZERO) >= self.max_age
    }

    fn rotate(&mut self) -> io::Result<()> {
        // Shift existing backups up by one; renaming onto an existing higher-numbered
        // backup replaces it, so the topmost one is dropped implicitly.
        for n in (1..self.max_backups).rev() {
            let from = self.backup_path(n);
            let to = self.backup_path(n + 1);
            if from.exists() {
                let _ = fs::rename(&from, &to);
            }
        }

        let current = self.current_path();
        if self.max_backups > 0 {
            if self.compress {
                let compressed = self.backup_path(1);
                compress_file(&current, &compressed)?;
                fs::remove_file(&current)?;
            } else {
                fs::rename(&current, self.backup_path(1))?;
            }
        } else {
            fs::remove_file(&current)?;
        }

        self.file = OpenOptions::new().create(true).append(true).open(&current)?;
        self.bytes_written = 0;
        self.opened_at = SystemTime::now();
        Ok(())
    }
}

fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let out = File::create(dst)?;
    let mut encoder = GzEncoder::new(out, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate() {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
