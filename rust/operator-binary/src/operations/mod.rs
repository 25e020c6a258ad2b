pub mod finalizer;
pub mod teardown;
