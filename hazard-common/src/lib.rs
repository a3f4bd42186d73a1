//! # Hazard Common Library
//!
//! Shared code for the hazard crates including:
//! - Error type and result alias
//! - Calculation configuration loading
//! - Tracing bootstrap
//! - Progress events (CalculationEvent enum, EventBus)
//! - Intensity measure types, geodesy and site collections

pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod imt;
pub mod logging;
pub mod site;

pub use error::{Error, Result};
pub use imt::Imt;
