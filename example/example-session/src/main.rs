#[macro_use]
extern crate log;
#[macro_use]
extern crate sessionflow_derive;

mod app;
mod sink;

pub fn main() -> anyhow::Result<()> {
    crate::app::run()
}
