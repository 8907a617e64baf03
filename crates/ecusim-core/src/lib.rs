//! # ecusim Core Library
//!
//! Core functionality for the ecusim vehicle diagnostic bus simulator.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Diagnostic telegram codecs (BMW-FAST, KWP2000*, DS2)
//! - ISO-TP segmentation over classic CAN
//! - ENET diagnostic framing and discovery
//! - Simulated control units (built-in vehicle profiles and
//!   user-supplied response tables)
//! - Session loops for serial, CAN and ENET endpoints
//!
//! ## Example
//!
//! ```rust,ignore
//! use ecusim_core::config::{AdapterFlags, ConceptType, ConfigData, Profile};
//! use ecusim_core::session::{Endpoint, Session};
//!
//! let config = ConfigData::from_file("e61.json")?;
//! let handle = Session::start(
//!     Endpoint::Serial("/dev/ttyUSB0".into()),
//!     ConceptType::BmwFast,
//!     AdapterFlags::default(),
//!     Profile::E61,
//!     config,
//! );
//!
//! // flip the simulated ignition while the session runs
//! handle.toggles().set_ignition_on(false);
//! handle.stop();
//! ```

pub mod codec;
pub mod config;
pub mod enet;
pub mod error;
pub mod isotp;
pub mod session;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{Frame, MAX_TELEGRAM_SIZE, TESTER_ADDR};
    pub use crate::config::{AdapterFlags, ConceptType, ConfigData, Profile};
    pub use crate::error::{Result, SimError};
    pub use crate::session::{Endpoint, Session, SessionHandle};
    pub use crate::sim::{EcuSimulator, Toggles};
}
