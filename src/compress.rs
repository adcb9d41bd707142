use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;

/// Gzip backend used to merge FASTQ channels, fastest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compressor {
    Pigz(PathBuf),
    Gzip(PathBuf),
    Builtin,
}

impl Compressor {
    pub fn name(&self) -> &'static str {
        match self {
            Compressor::Pigz(_) => "pigz",
            Compressor::Gzip(_) => "gzip",
            Compressor::Builtin => "flate2",
        }
    }

    /// Concatenates `sources` in order, gzip-compresses the stream and
    /// returns the result as an unpersisted temporary file inside `dir`.
    pub fn concat_to_temp(
        &self,
        sources: &[PathBuf],
        dir: &Path,
        prefix: &str,
        threads: usize,
    ) -> io::Result<NamedTempFile> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".partial")
            .tempfile_in(dir)?;
        match self {
            Compressor::Pigz(program) => {
                let args = ["-c".to_string(), "-p".to_string(), threads.max(1).to_string()];
                run_external(program, &args, sources, temp.as_file())?;
            }
            Compressor::Gzip(program) => {
                run_external(program, &["-c".to_string()], sources, temp.as_file())?;
            }
            Compressor::Builtin => {
                let writer = BufWriter::new(temp.as_file().try_clone()?);
                let mut encoder = GzEncoder::new(writer, Compression::fast());
                for source in sources {
                    let mut input = File::open(source)?;
                    io::copy(&mut input, &mut encoder)?;
                }
                encoder.finish()?.flush()?;
            }
        }
        temp.as_file().sync_all()?;
        Ok(temp)
    }
}

fn run_external(program: &Path, args: &[String], sources: &[PathBuf], out: &File) -> io::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(out.try_clone()?))
        .stderr(Stdio::piped())
        .spawn()?;
    let feed = (|| -> io::Result<()> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("compressor stdin unavailable"))?;
        for source in sources {
            let mut input = File::open(source)?;
            io::copy(&mut input, &mut stdin)?;
        }
        Ok(())
    })();
    let output = child.wait_with_output()?;
    feed?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(io::Error::other(format!(
            "{} exited with {}: {stderr}",
            program.display(),
            output.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::MultiGzDecoder;

    use super::*;

    #[test]
    fn builtin_concatenates_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.fastq");
        let b = temp.path().join("b.fastq");
        std::fs::write(&a, b"@a\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(&b, b"@b\nTTTT\n+\nIIII\n").unwrap();

        let out = Compressor::Builtin
            .concat_to_temp(&[a, b], temp.path(), ".merged", 1)
            .unwrap();
        let mut text = String::new();
        MultiGzDecoder::new(File::open(out.path()).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "@a\nACGT\n+\nIIII\n@b\nTTTT\n+\nIIII\n");
    }
}
