mod service;
mod view;

pub use service::ProgressService;
pub use view::ScenarioProgressItem;
