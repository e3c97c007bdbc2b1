//! Output sinks: a rotating, compressing file writer and an in-memory
//! collector.
//!
//! The file sink writes into a dedicated output directory. Identity mode
//! appends one canonical identity per line; structure mode appends
//! coordinate-free V2000 blocks. When a file reaches its rotation cap it is
//! closed, gzip-compressed, and replaced by the next numbered file.

use crate::molecule::Molecule;
use crate::ports::Sink;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// What the file sink writes per accepted molecule.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OutputMode {
    /// One canonical identity per line (`.smi` files).
    #[default]
    IdentityOnly,
    /// One V2000 structure block per molecule (`.sdf` files).
    Structures,
}

impl OutputMode {
    fn extension(self) -> &'static str {
        match self {
            OutputMode::IdentityOnly => "smi",
            OutputMode::Structures => "sdf",
        }
    }
}

/// Rotating file sink with gzip compression of finished files.
pub struct RotatingFileSink {
    dir: PathBuf,
    mode: OutputMode,
    cap: u64,
    written_in_file: u64,
    total_written: u64,
    writer: Option<BufWriter<File>>,
    current_path: PathBuf,
}

impl RotatingFileSink {
    /// Creates the output directory (if needed) and opens the first file.
    ///
    /// # Arguments
    ///
    /// * `dir` - Output directory; created on demand.
    /// * `mode` - Identity lines or structure blocks.
    /// * `cap` - Molecules per file before rotation; must be non-zero.
    pub fn create(dir: impl Into<PathBuf>, mode: OutputMode, cap: u64) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let cap = cap.max(1);
        let mut sink = Self {
            dir,
            mode,
            cap,
            written_in_file: 0,
            total_written: 0,
            writer: None,
            current_path: PathBuf::new(),
        };
        sink.open_next_file()?;
        Ok(sink)
    }

    /// Closes and compresses the final file. Call once after the run.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.close_current(true)
    }

    fn open_next_file(&mut self) -> std::io::Result<()> {
        let lo = self.total_written + 1;
        let hi = self.total_written + self.cap;
        let file_name = format!("molecules-{lo}-{hi}.{}", self.mode.extension());
        self.current_path = self.dir.join(file_name);
        self.writer = Some(BufWriter::new(File::create(&self.current_path)?));
        self.written_in_file = 0;
        Ok(())
    }

    fn close_current(&mut self, compress: bool) -> std::io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            drop(writer);
            if compress && self.written_in_file > 0 {
                compress_file(&self.current_path)?;
            }
        }
        Ok(())
    }

    fn rotate_if_full(&mut self) -> std::io::Result<()> {
        if self.written_in_file < self.cap {
            return Ok(());
        }
        info!(path = %self.current_path.display(), "rotating output file");
        self.close_current(true)?;
        self.open_next_file()
    }
}

impl Sink for RotatingFileSink {
    fn emit(&mut self, identity: &str, molecule: &Molecule) -> Result<(), std::io::Error> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("sink already finished"))?;

        match self.mode {
            OutputMode::IdentityOnly => writeln!(writer, "{identity}")?,
            OutputMode::Structures => writer.write_all(render_v2000(identity, molecule).as_bytes())?,
        }

        self.written_in_file += 1;
        self.total_written += 1;
        self.rotate_if_full()
    }

    fn flush(&mut self) -> Result<(), std::io::Error> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Replaces `path` with `path.gz`.
fn compress_file(path: &Path) -> std::io::Result<()> {
    let contents = std::fs::read(path)?;

    let mut compressed = path.as_os_str().to_owned();
    compressed.push(".gz");
    let mut encoder = GzEncoder::new(File::create(PathBuf::from(compressed))?, Compression::default());
    encoder.write_all(&contents)?;
    encoder.finish()?;

    std::fs::remove_file(path)
}

/// Renders a coordinate-free V2000 block; the identity travels in the title
/// line so downstream tooling can cross-reference the `.smi` output.
fn render_v2000(identity: &str, molecule: &Molecule) -> String {
    let mut block = String::new();

    let _ = writeln!(block, "{identity}");
    let _ = writeln!(block, " synthesized");
    block.push('\n');

    let _ = write!(block, "{:>3}{:>3}", molecule.atoms().len(), molecule.bonds().len());
    for _ in 0..7 {
        let _ = write!(block, "{:>3}", 0);
    }
    let _ = writeln!(block, "{:>6}{:>6}", "0999", "V2000");

    for atom in molecule.atoms() {
        let _ = write!(block, "{:>10}{:>10}{:>10}", "0.0000", "0.0000", "0.0000");
        let symbol = atom.atom_type().element.symbol();
        let _ = write!(block, " {symbol}");
        if symbol.len() == 1 {
            block.push(' ');
        }
        for _ in 0..12 {
            let _ = write!(block, "{:>3}", 0);
        }
        block.push('\n');
    }

    for bond in molecule.bonds() {
        let _ = write!(
            block,
            "{:>3}{:>3}{:>3}",
            bond.origin + 1,
            bond.target + 1,
            bond.order.order()
        );
        for _ in 0..4 {
            let _ = write!(block, "{:>3}", 0);
        }
        block.push('\n');
    }

    block.push_str("M  END\n$$$$\n");
    block
}

/// Shared view over the identities collected by a [`CollectingSink`].
#[derive(Clone, Default)]
pub struct CollectingHandle {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectingHandle {
    /// Copies out everything collected so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of identities collected so far.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// In-memory sink used by tests and validation-only runs.
#[derive(Default)]
pub struct CollectingSink {
    handle: CollectingHandle,
}

impl CollectingSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that stays readable after the sink moves into the
    /// enumeration engine.
    pub fn handle(&self) -> CollectingHandle {
        self.handle.clone()
    }
}

impl Sink for CollectingSink {
    fn emit(&mut self, identity: &str, _molecule: &Molecule) -> Result<(), std::io::Error> {
        self.handle.lines.lock().push(identity.to_string());
        Ok(())
    }
}
