pub mod config;
pub mod errors;
pub mod filter;
pub mod params;
pub mod search;

pub use config::*;
pub use errors::*;
pub use filter::*;
pub use params::*;
pub use search::*;
