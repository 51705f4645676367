//! Cart domain: the reducer, its value objects and the events it reports.
pub mod aggregates;
pub mod events;
pub mod value_objects;
