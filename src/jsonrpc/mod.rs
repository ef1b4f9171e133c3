// JSON-RPC envelopes and the dispatcher that serves them.
pub mod dispatcher;
pub mod protocol;

pub use dispatcher::Dispatcher;
