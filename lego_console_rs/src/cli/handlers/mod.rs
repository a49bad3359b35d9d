//! Command handlers of the main console.
//!
//! Each handler receives the shell and either parsed arguments or the raw
//! remainder of the line, as declared in the console's command table.

pub mod fs;
pub mod session;
pub mod transfer;
