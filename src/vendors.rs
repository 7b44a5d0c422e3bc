//! Vendor register maps and constructors
//!
//! Each module contributes a [`crate::map::VendorSpec`] plus a constructor
//! that runs whatever probing the hardware needs (firmware capability bits,
//! operating-mode validation, standby configuration) before handing the
//! connection to the generic engine.

pub mod abb;
pub mod alfen;
pub mod bender;
pub mod heidelberg;
pub mod wallbe;
