// src/quiz/mod.rs

//! Quiz attempt engine: lifecycle, scoring, presentation order and projection.

pub mod lifecycle;
pub mod projector;
pub mod randomizer;
pub mod scoring;
