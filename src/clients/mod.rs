//! External-effect clients invoked once per eligible order.
//!
//! The specific external systems are pluggable: anything implementing
//! [`EffectClient`] can stand in for the ERP, loyalty or shipping side. The
//! clients shipped here only log, and they are the defaults for the binary.

pub mod effect_client;
pub mod erp_client;
pub mod error;
pub mod loyalty_client;
pub mod shipping_client;

pub use effect_client::*;
pub use erp_client::*;
pub use error::*;
pub use loyalty_client::*;
pub use shipping_client::*;
