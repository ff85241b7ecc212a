pub mod server;
pub mod steamid;
