//! Domain layer: entities, value objects and the ports the engines consume.

pub mod cart;
pub mod ids;
pub mod money;
pub mod person;
pub mod ports;
pub mod product;
pub mod sale;
