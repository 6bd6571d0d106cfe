// src/matching/mod.rs
pub mod blocking;
pub mod breakdown;
pub mod edges;
pub mod manager;
pub mod normalize;
pub mod rules;
pub mod similarity;
