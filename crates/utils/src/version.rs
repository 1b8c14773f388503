/// Defines the application version, taken from the `VERSION` build variable.
pub const VERSION: &str = env!("IMAGE_VERSION");
