//! Key-value store on raw SPI flash.
//!
//! A few erase sectors past the application image hold one value each. A key picks
//! its sector by hash; the sector starts with a small header so a stale or foreign
//! sector reads as "not found".
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use esp_storage::FlashStorage;
use log::debug;

use crate::error::StorageError;
use crate::storage::KvStore;

const STORE_FLASH_OFFSET: u32 = 0x3F_0000;
const SECTOR_SIZE: u32 = 0x1000;
const SLOT_COUNT: u32 = 4;
const SLOT_MAGIC: u32 = 0xA5C3_0001;
const HEADER_LEN: usize = 12;
/// Largest value a slot takes.
const MAX_VALUE_LEN: usize = 256;

/// FNV-1a over `namespace`, a separator and `key`.
fn key_hash(namespace: &str, key: &str) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    let bytes = namespace.bytes().chain(core::iter::once(b'/')).chain(key.bytes());
    for byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

pub struct FlashKvStore {
    flash: FlashStorage,
}

impl FlashKvStore {
    pub fn new(flash: FlashStorage) -> Self {
        Self { flash }
    }

    fn slot_offset(hash: u32) -> u32 {
        STORE_FLASH_OFFSET + (hash % SLOT_COUNT) * SECTOR_SIZE
    }
}

impl KvStore for FlashKvStore {
    fn load(&mut self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let hash = key_hash(namespace, key);
        let offset = Self::slot_offset(hash);

        let mut header = [0u8; HEADER_LEN];
        self.flash
            .read(offset, &mut header)
            .map_err(|_| StorageError::Io)?;
        let word = |i: usize| {
            u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]])
        };
        if word(0) != SLOT_MAGIC || word(4) != hash {
            return Err(StorageError::NotFound);
        }

        let len = word(8) as usize;
        if len > MAX_VALUE_LEN {
            return Err(StorageError::Corrupt);
        }
        let dst = buf.get_mut(..len).ok_or(StorageError::Capacity)?;
        self.flash
            .read(offset + HEADER_LEN as u32, dst)
            .map_err(|_| StorageError::Io)?;
        Ok(len)
    }

    fn save(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(StorageError::Capacity);
        }
        let hash = key_hash(namespace, key);
        let offset = Self::slot_offset(hash);

        // Writes go out in whole words.
        let mut image = [0xFFu8; HEADER_LEN + MAX_VALUE_LEN];
        image[0..4].copy_from_slice(&SLOT_MAGIC.to_le_bytes());
        image[4..8].copy_from_slice(&hash.to_le_bytes());
        image[8..12].copy_from_slice(&(value.len() as u32).to_le_bytes());
        image[HEADER_LEN..HEADER_LEN + value.len()].copy_from_slice(value);
        let len = (HEADER_LEN + value.len()).next_multiple_of(4);

        self.flash
            .erase(offset, offset + SECTOR_SIZE)
            .map_err(|_| StorageError::Io)?;
        self.flash
            .write(offset, &image[..len])
            .map_err(|_| StorageError::Io)?;
        debug!("[FLASH] {namespace}/{key}: {} bytes at {offset:#x}", value.len());
        Ok(())
    }
}
