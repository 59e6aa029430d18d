use crate::application::requests::ProductRequest;
use crate::error::{PharmacyError, Result};
use std::io::Read;

/// Reads catalog rows from a CSV source.
///
/// Expects the header `name,price,description,image_link,expiry_date,manufacturer`.
/// Fields are trimmed and an empty `image_link` reads as absent.
pub struct ProductReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ProductReader<R> {
    /// Creates a new `ProductReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one `ProductRequest` per row.
    pub fn products(self) -> impl Iterator<Item = Result<ProductRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PharmacyError::from))
    }
}
