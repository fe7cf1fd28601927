use crate::{ParsedUid, Result};

/// A minimal interface for generating and decoding UIDs.
pub trait UidGenerator {
    /// Returns the next unique ID.
    ///
    /// # Errors
    ///
    /// See [`crate::Error`]; use [`crate::Error::is_transient`] to decide
    /// whether to retry.
    fn get_uid(&self) -> Result<u64>;

    /// Decodes a UID produced by a generator with the same layout and epoch.
    fn parse_uid(&self, uid: u64) -> ParsedUid;
}

impl<G: UidGenerator + ?Sized> UidGenerator for &G {
    fn get_uid(&self) -> Result<u64> {
        (**self).get_uid()
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        (**self).parse_uid(uid)
    }
}

impl<G: UidGenerator + ?Sized> UidGenerator for std::sync::Arc<G> {
    fn get_uid(&self) -> Result<u64> {
        (**self).get_uid()
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        (**self).parse_uid(uid)
    }
}
