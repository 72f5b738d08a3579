#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate sessionflow_derive;

// lets `#[derive(Function)]` resolve `sessionflow::...` paths inside this crate
extern crate self as sessionflow;

pub mod api;
pub mod channel;
pub mod functions;
pub mod metrics;
pub mod runtime;
pub mod storage;
pub mod utils;
