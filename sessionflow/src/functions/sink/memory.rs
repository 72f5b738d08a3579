use std::sync::{Arc, Mutex};

use crate::api::element::Emission;
use crate::api::function::{Context, NamedFunction, OutputFormat};

pub fn memory_sink<K, A>() -> MemoryOutputFormat<K, A> {
    MemoryOutputFormat::new()
}

/// Collects emissions into a shared buffer. Clones share the same buffer, so one clone can be
/// handed to the runtime while another is kept to read the results.
#[derive(Debug)]
pub struct MemoryOutputFormat<K, A> {
    emissions: Arc<Mutex<Vec<Emission<K, A>>>>,
}

impl<K, A> MemoryOutputFormat<K, A> {
    pub fn new() -> Self {
        MemoryOutputFormat {
            emissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Takes every emission collected so far.
    pub fn drain(&self) -> Vec<Emission<K, A>> {
        match self.emissions.lock() {
            Ok(mut emissions) => emissions.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self.emissions.lock() {
            Ok(emissions) => emissions.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, A> Clone for MemoryOutputFormat<K, A> {
    fn clone(&self) -> Self {
        MemoryOutputFormat {
            emissions: self.emissions.clone(),
        }
    }
}

impl<K, A> Default for MemoryOutputFormat<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> OutputFormat<K, A> for MemoryOutputFormat<K, A> {
    fn open(&mut self, _context: &Context) -> crate::api::Result<()> {
        Ok(())
    }

    fn write_emission(&mut self, emission: Emission<K, A>) {
        match self.emissions.lock() {
            Ok(mut emissions) => emissions.push(emission),
            Err(poisoned) => poisoned.into_inner().push(emission),
        }
    }

    fn close(&mut self) -> crate::api::Result<()> {
        Ok(())
    }
}

impl<K, A> NamedFunction for MemoryOutputFormat<K, A> {
    fn name(&self) -> &str {
        "MemoryOutputFormat"
    }
}
