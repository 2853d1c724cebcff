//! Coalescing of concurrent lookups for the same block.
//!
//! At most one in-progress fetch ("flight") exists per block number; every
//! caller that misses the cache while it is pending awaits the same shared
//! future. The flight removes itself from the map when it resolves, so a
//! flight abandoned by its creator is simply resumed by the next interested
//! caller.

use crate::{
    service::LookupError,
    types::BlockRecord,
};
use futures::{
    FutureExt,
    future::{
        BoxFuture,
        Shared,
    },
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt,
};

pub(super) type FlightFuture = Shared<BoxFuture<'static, Result<BlockRecord, LookupError>>>;

#[derive(Default)]
pub(super) struct FlightMap {
    inner: Mutex<HashMap<u64, FlightFuture>>,
}

impl fmt::Debug for FlightMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightMap")
            .field("in_flight", &self.inner.lock().len())
            .finish()
    }
}

impl FlightMap {
    /// Joins the pending flight for `block_number`, or installs the one built
    /// by `make`. Returns the flight and whether this call created it.
    pub fn join_or_start<F>(&self, block_number: u64, make: F) -> (FlightFuture, bool)
    where
        F: FnOnce() -> BoxFuture<'static, Result<BlockRecord, LookupError>>,
    {
        let mut inner = self.inner.lock();
        if let Some(flight) = inner.get(&block_number) {
            return (flight.clone(), false);
        }

        let flight = make().shared();
        inner.insert(block_number, flight.clone());
        (flight, true)
    }

    /// Drops the entry for a resolved flight.
    pub fn complete(&self, block_number: u64) {
        self.inner.lock().remove(&block_number);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
