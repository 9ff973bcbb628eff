// src/models/mod.rs

pub mod actor;
pub mod answer;
pub mod attempt;
pub mod question;
pub mod quiz;
