#[macro_use]
extern crate log;

use std::time::Duration;

use sessionflow::api::config::{LateDataPolicy, WindowingConfig};
use sessionflow::functions::combiner::collect;
use sessionflow::functions::sink::print_sink;
use sessionflow::functions::source::vec_source;
use sessionflow::runtime::logger::{init_log, LogTarget};
use sessionflow::runtime::Driver;
use sessionflow::utils::parse_arg_with;
use sessionflow_example_utils::animals::animal_elements;

pub fn main() -> anyhow::Result<()> {
    init_log(&LogTarget::Console, parse_arg_with("log_level", "INFO").as_str())?;

    let config = WindowingConfig::new(Duration::from_secs(120))
        .with_late_data_policy(LateDataPolicy::Discard);
    let mut driver = Driver::new(config, collect::<String>())?;

    let report = driver.run(&mut vec_source(animal_elements()), &mut print_sink())?;
    info!("grouped {} kinds", report.emitted);
    Ok(())
}
