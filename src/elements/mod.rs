pub mod checkpoint;
pub mod contracts;
pub mod manifest;
pub mod output;
pub mod parameters;
pub mod upgrade;
