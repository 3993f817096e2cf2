pub mod trainjob;

pub use trainjob::TrainJobController;
