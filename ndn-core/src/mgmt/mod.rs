//! Forwarder management: signed command Interests and ControlResponse replies.

mod command;
mod controller;
mod parameters;
mod response;

pub use command::{ArgumentError, ControlCommand, FieldSpec, StandardCommand};
pub use controller::{
    process_response, CommandError, CommandOptions, ERROR_LBOUND, ERROR_NACK, ERROR_SERVER,
    ERROR_TIMEOUT,
};
pub use parameters::{
    ControlParameters, Field, ALL_FIELDS, ROUTE_FLAG_CAPTURE, ROUTE_FLAG_CHILD_INHERIT,
    ROUTE_ORIGIN_APP,
};
pub use response::ControlResponse;
