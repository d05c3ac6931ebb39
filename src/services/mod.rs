pub mod orchestrator;
pub mod reconcile;
pub mod resolver;
pub mod subsonic;
