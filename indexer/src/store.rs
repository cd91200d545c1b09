// SPDX-License-Identifier: CC0-1.0

//! Persisted state layout.
//!
//! One directory per indexed tip under
//! `<data_root>/<network>/v1/<genesis_hash>/states/<tip_hash>/`, plus a
//! `state_at_tip` pointer file naming the current tip. Both the state file
//! and the pointer are written to a temporary file and renamed into place,
//! so readers never observe a half-written tip. The per-tip directories
//! double as the undo log for shallow reorg step-back.

use core::fmt;
use std::fs;
use std::io::{self, BufReader, Write as _};
use std::path::{Path, PathBuf};

use bitcoin::{BlockHash, Network};
use pixelplot_protocol::{CanvasState, RecordError, StateRecord};
use tempfile::NamedTempFile;

const STATE_FILE: &str = "state.json";
const TIP_POINTER: &str = "state_at_tip";

/// On-disk store of per-tip canvas states.
#[derive(Clone, Debug)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Opens (creating if needed) the store for one `(network, genesis)` lineage.
    pub fn open(data_dir: &Path, network: Network, genesis: &BlockHash) -> Result<Self, Error> {
        let root = data_dir.join(network.to_string()).join("v1").join(genesis.to_string());
        fs::create_dir_all(root.join("states"))?;
        Ok(StateStore { root })
    }

    fn state_path(&self, hash: &BlockHash) -> PathBuf {
        self.root.join("states").join(hash.to_string()).join(STATE_FILE)
    }

    /// The current tip, or `None` if nothing has been indexed yet.
    pub fn tip(&self) -> Result<Option<BlockHash>, Error> {
        match fs::read_to_string(self.root.join(TIP_POINTER)) {
            Ok(contents) =>
                Ok(Some(contents.trim().parse().map_err(|_| Error::CorruptTipPointer)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a state is stored for the given tip.
    pub fn contains(&self, hash: &BlockHash) -> bool { self.state_path(hash).exists() }

    /// Loads the state stored for the given tip.
    pub fn load(&self, hash: &BlockHash) -> Result<CanvasState, Error> {
        let file = fs::File::open(self.state_path(hash))?;
        let record: StateRecord = serde_json::from_reader(BufReader::new(file))?;
        Ok(CanvasState::try_from(record)?)
    }

    /// Writes the state for its tip; does not move the tip pointer.
    pub fn save(&self, state: &CanvasState) -> Result<(), Error> {
        let dir = self.root.join("states").join(state.block_hash().to_string());
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(tmp.as_file_mut(), &StateRecord::from(state))?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(dir.join(STATE_FILE)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Atomically repoints `state_at_tip` at the given tip.
    pub fn advance_tip(&self, hash: &BlockHash) -> Result<(), Error> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{}", hash)?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(self.root.join(TIP_POINTER)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// A storage error; fatal for the indexer run, the tip pointer is never
/// advanced past one.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Filesystem failure.
    Io(io::Error),
    /// A stored state does not parse.
    Json(serde_json::Error),
    /// A stored state parses but is internally inconsistent.
    Record(RecordError),
    /// The tip pointer does not name a block hash.
    CorruptTipPointer,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self { Error::Io(e) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Error::Json(e) }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self { Error::Record(e) }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match *self {
            Io(ref e) => write!(f, "storage I/O error: {}", e),
            Json(ref e) => write!(f, "stored state does not parse: {}", e),
            Record(ref e) => write!(f, "stored state is inconsistent: {}", e),
            CorruptTipPointer => write!(f, "tip pointer does not name a block hash"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            Io(ref e) => Some(e),
            Json(ref e) => Some(e),
            Record(ref e) => Some(e),
            CorruptTipPointer => None,
        }
    }
}
