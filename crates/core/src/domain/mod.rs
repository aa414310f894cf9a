pub mod agent;
pub mod conversation;
pub mod intent;
pub mod params;
pub mod search;
pub mod thread;
