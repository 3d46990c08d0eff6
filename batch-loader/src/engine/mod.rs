mod batch_loader;
mod pending;

pub use batch_loader::BatchLoader;
