pub mod matcher;
pub mod poller;
pub mod status;
pub mod usecase;

pub use matcher::FindOpts;
pub use poller::{PollerSettings, StatePoller};
pub use usecase::StateUsecase;
