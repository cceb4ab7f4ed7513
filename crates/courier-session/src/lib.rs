pub mod client;
pub mod controller;
pub mod inbound;

pub use client::{ChatClient, ClientFactory, ClientSession, ConnectError};
pub use controller::{ControllerConfig, LifecycleController, SessionHandle};
pub use inbound::InboundRouter;
