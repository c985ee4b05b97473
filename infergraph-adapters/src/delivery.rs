//! Delivery handlers for the terminal pipeline stage

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use infergraph_core::adapter::{Delivery, TensorShape};
use infergraph_core::error::{Error, Result};
use infergraph_core::message::Message;

/// Writes each delivered f32 tensor to a labelled text file
///
/// The file lists the rank and dimensions followed by one `label/value`
/// line per element, so results can be inspected without tooling. Each
/// delivery overwrites the file.
pub struct TensorFileDump {
    /// Output file path
    path: PathBuf,

    /// Shape the delivered payload must fill
    shape: TensorShape,
}

impl TensorFileDump {
    /// Create a dump writing to `path`, expecting `shape`-sized payloads
    pub fn new(path: impl Into<PathBuf>, shape: TensorShape) -> Self {
        Self {
            path: path.into(),
            shape,
        }
    }
}

impl Delivery for TensorFileDump {
    fn deliver(&mut self, message: &Message) -> Result<()> {
        let values: Vec<f32> = message.payload().to_typed_vec()?;
        if values.len() != self.shape.num_elements() {
            return Err(Error::InvalidInput(format!(
                "payload holds {} values, shape {} needs {}",
                values.len(),
                self.shape,
                self.shape.num_elements()
            )));
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        write!(writer, "rank: {} dim: ", self.shape.rank())?;
        for dim in self.shape.dims() {
            write!(writer, "{dim} ")?;
        }
        writeln!(writer, "data: ")?;
        for (index, value) in values.iter().enumerate() {
            writeln!(writer, "label:{}     value:{value:>10.6}", index + 1)?;
        }
        writer.flush()?;

        debug!(path = %self.path.display(), values = values.len(), "tensor dumped");
        Ok(())
    }
}

/// Collects delivered messages in memory
///
/// Clones share the same backing store, so a driver can keep one handle
/// while the sink owns the other.
#[derive(Clone, Default)]
pub struct MemoryDelivery {
    received: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemoryDelivery {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, as `(type_tag, bytes)`
    pub fn received(&self) -> Vec<(String, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }

    /// Number of deliveries so far
    pub fn len(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Whether nothing has been delivered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Delivery for MemoryDelivery {
    fn deliver(&mut self, message: &Message) -> Result<()> {
        self.received.lock().unwrap().push((
            message.type_tag().to_string(),
            message.payload().as_slice().to_vec(),
        ));
        Ok(())
    }
}
