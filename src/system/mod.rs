pub mod launcher;

pub use launcher::SystemLauncher;
