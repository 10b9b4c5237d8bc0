//! Persistence of the servo handle.
//!
//! - [`record`] packs a [`ServoHandle`] into a fixed byte image and back.
//! - [`KvStore`] is the byte store underneath; the firmware binds it to flash.
//! - [`CalibrationStore`] decides what happens when there is nothing usable stored.
pub mod record;

use log::{error, info, warn};

use crate::config::{STORE_KEY, STORE_NAMESPACE};
use crate::error::StorageError;
use crate::robot::state::ServoHandle;
use record::{Record, RECORD_LEN};

/// Persistent key-value byte store.
pub trait KvStore {
    /// Copies the value for `key` into `buf`, returning its length.
    fn load(&mut self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn save(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

pub struct CalibrationStore<S> {
    backend: S,
}

impl<S: KvStore> CalibrationStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// The stored handle, or defaults written back immediately when the record is
    /// missing or unreadable.
    pub fn load(&mut self) -> ServoHandle {
        let mut buf = [0u8; RECORD_LEN];
        let stored = self
            .backend
            .load(STORE_NAMESPACE, STORE_KEY, &mut buf)
            .and_then(|len| record::decode(&buf[..len]));

        match stored {
            Ok(handle) => {
                info!("[STORE] restored calibration");
                handle
            }
            Err(e) => {
                warn!("[STORE] {e}, falling back to defaults");
                let handle = ServoHandle::defaults();
                if let Err(e) = self.save_all(&handle) {
                    error!("[STORE] could not persist defaults: {e}");
                }
                handle
            }
        }
    }

    pub fn save_all(&mut self, handle: &ServoHandle) -> Result<(), StorageError> {
        self.save_record(&record::encode(handle))
    }

    pub fn save_record(&mut self, image: &Record) -> Result<(), StorageError> {
        self.backend.save(STORE_NAMESPACE, STORE_KEY, image)
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }
}
