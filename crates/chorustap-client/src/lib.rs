mod client;
mod mock;

pub use client::{ChorusClient, ChorusPages};
pub use mock::{MockClient, MockRequest};
