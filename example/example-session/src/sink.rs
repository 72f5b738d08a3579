use sessionflow::api::element::Emission;
use sessionflow::api::function::{Context, OutputFormat};
use sessionflow::utils::date_time::timestamp_str;

/// Logs how many passengers each ride status carried per session.
#[derive(Debug, Function)]
pub struct RideStatusLog {
    written: u64,
}

impl RideStatusLog {
    pub fn new() -> Self {
        RideStatusLog { written: 0 }
    }
}

impl OutputFormat<String, i64> for RideStatusLog {
    fn open(&mut self, _context: &Context) -> sessionflow::api::Result<()> {
        Ok(())
    }

    fn write_emission(&mut self, emission: Emission<String, i64>) {
        self.written += 1;
        info!(
            "Ride status {} carried {} passengers between {} and {}{}",
            emission.key,
            emission.aggregate,
            timestamp_str(emission.window.start()),
            timestamp_str(emission.window.end()),
            if emission.is_late { ", corrected" } else { "" }
        );
    }

    fn close(&mut self) -> sessionflow::api::Result<()> {
        info!("{} sessions logged", self.written);
        Ok(())
    }
}
