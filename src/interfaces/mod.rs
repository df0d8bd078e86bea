pub mod providers;
pub mod search;
pub mod services;
pub mod status;
pub mod system;
