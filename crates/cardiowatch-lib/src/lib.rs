pub mod alert;
pub mod analysis;
pub mod config;
pub mod error;
pub mod io;
pub mod plot;
pub mod signal;
pub mod source;

pub use alert::*;
pub use analysis::*;
pub use config::*;
pub use error::*;
pub use signal::*;
pub use source::*;
