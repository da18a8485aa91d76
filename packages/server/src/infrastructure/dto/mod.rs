//! Data Transfer Objects (DTOs) for the HTTP gateway.
//!
//! - `http`: request / response bodies shared by the gateway and its client
//! - `conversion`: mapping between DTOs and domain entities

pub mod conversion;
pub mod http;
