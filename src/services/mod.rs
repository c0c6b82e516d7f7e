pub mod dispatcher;
pub mod ml_client;
pub mod queue;
pub mod worker;
