//! Vertiport records: the physical facilities coordination happens over.

use uuid::Uuid;

/// A physical landing and parking facility. The FATO zone has an implicit
/// capacity of 1; parking capacity is configured per vertiport.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertiport {
    pub id: Uuid,
    pub parking_capacity: i32,
}
