pub mod client;
pub mod packet;

pub use client::{RconClient, RemoteExec};
