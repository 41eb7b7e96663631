pub mod error;
pub mod server;

pub use server::{router, AppState};
