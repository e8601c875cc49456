pub mod codec;
pub mod descriptor;
pub mod error;
pub mod models;
pub mod session;
pub mod settings;
pub mod transport;
