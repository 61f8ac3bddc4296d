//! Product nameplate: the flash-mapped identity block read via
//! `read-flash`/`write-flash` (C9, §6).

use heapless::Vec as HVec;
use protocol::constants::{
    NAMEPLATE_PRODUCTION_DATA, NAMEPLATE_TYPE_EXTRA, PRODUCTION_DATA_LEN,
};
use protocol::{FirmwareVersion, ProductString};

use crate::error::PeripheralError;

/// Durable storage backing the nameplate block. Hardware builds implement
/// this over on-chip flash; `crates/sim` implements it over a plain byte
/// array so controller/peripheral integration tests don't need real NVM.
pub trait NvmStore {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<(), ()>;
    /// Write `bytes` starting at `addr`.
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), ()>;
}

/// Everything a peripheral reports about itself beyond the single wire type
/// byte: firmware version, the 32-byte production-data block, and the
/// one-byte type-extra discriminator used to disambiguate `Custom` families.
pub struct Nameplate<S> {
    /// Build version, answered by `get-version`.
    pub version: FirmwareVersion,
    /// Human-readable product identity, resolved by the controller via this block.
    pub product: ProductString,
    store: S,
}

impl<S: NvmStore> Nameplate<S> {
    /// Build a nameplate for a given product string, version, and backing store.
    #[must_use]
    pub fn new(product: ProductString, version: FirmwareVersion, store: S) -> Self {
        Self { version, product, store }
    }

    /// Service a `read-flash` request.
    pub fn read(&self, addr: u16, len: usize) -> Result<HVec<u8, 45>, PeripheralError> {
        let end = match addr {
            NAMEPLATE_PRODUCTION_DATA => len.min(PRODUCTION_DATA_LEN),
            NAMEPLATE_TYPE_EXTRA => len.min(1),
            _ => return Err(PeripheralError::IndexOutOfRange),
        };
        let mut buf = [0u8; PRODUCTION_DATA_LEN];
        let dst = buf.get_mut(..end).ok_or(PeripheralError::IndexOutOfRange)?;
        self.store.read(addr, dst).map_err(|()| PeripheralError::IndexOutOfRange)?;
        HVec::from_slice(dst).map_err(|_| PeripheralError::CapacityExceeded)
    }

    /// Service a `write-flash` request.
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), PeripheralError> {
        match addr {
            NAMEPLATE_PRODUCTION_DATA => {
                let end = data.len().min(PRODUCTION_DATA_LEN);
                let src = data.get(..end).ok_or(PeripheralError::IndexOutOfRange)?;
                self.store.write(addr, src).map_err(|()| PeripheralError::IndexOutOfRange)
            }
            NAMEPLATE_TYPE_EXTRA => {
                let byte = data.first().ok_or(PeripheralError::IndexOutOfRange)?;
                self.store
                    .write(addr, core::slice::from_ref(byte))
                    .map_err(|()| PeripheralError::IndexOutOfRange)
            }
            _ => Err(PeripheralError::IndexOutOfRange),
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use in_memory::InMemoryNvm;

#[cfg(any(test, feature = "std"))]
mod in_memory {
    use super::NvmStore;

    /// A flat byte array standing in for flash, for tests and the `sim` crate.
    pub struct InMemoryNvm {
        bytes: [u8; 0x2000],
    }

    impl Default for InMemoryNvm {
        fn default() -> Self {
            Self { bytes: [0u8; 0x2000] }
        }
    }

    impl NvmStore for InMemoryNvm {
        fn read(&self, addr: u16, buf: &mut [u8]) -> Result<(), ()> {
            let addr = usize::from(addr);
            let src = self.bytes.get(addr..addr + buf.len()).ok_or(())?;
            buf.copy_from_slice(src);
            Ok(())
        }

        fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), ()> {
            let addr = usize::from(addr);
            let dst = self.bytes.get_mut(addr..addr + bytes.len()).ok_or(())?;
            dst.copy_from_slice(bytes);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Nameplate<InMemoryNvm> {
        Nameplate::new(
            ProductString::try_from("expansion-analog-v1").unwrap(),
            FirmwareVersion { major: 1, minor: 2, release: 3 },
            InMemoryNvm::default(),
        )
    }

    #[test]
    fn write_then_read_production_data_round_trips() {
        let mut np = sample();
        let data = [0xAAu8; PRODUCTION_DATA_LEN];
        np.write(NAMEPLATE_PRODUCTION_DATA, &data).unwrap();
        assert_eq!(
            np.read(NAMEPLATE_PRODUCTION_DATA, PRODUCTION_DATA_LEN).unwrap().as_slice(),
            &data
        );
    }

    #[test]
    fn type_extra_is_a_single_byte() {
        let mut np = sample();
        np.write(NAMEPLATE_TYPE_EXTRA, &[0x07]).unwrap();
        assert_eq!(np.read(NAMEPLATE_TYPE_EXTRA, 1).unwrap().as_slice(), &[0x07]);
    }

    #[test]
    fn unknown_address_is_rejected() {
        let np = sample();
        assert_eq!(np.read(0x0000, 1), Err(PeripheralError::IndexOutOfRange));
    }
}
