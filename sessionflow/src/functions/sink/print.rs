use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use crate::api::element::Emission;
use crate::api::function::{Context, NamedFunction, OutputFormat};
use crate::api::window::{TWindow, TimeWindow};
use crate::utils::date_time::fmt_date_time;

pub fn print_sink<K, A>() -> PrintOutputFormat<K, A> {
    PrintOutputFormat::new()
}

/// Logs every emission at `info` level.
#[derive(Debug)]
pub struct PrintOutputFormat<K, A> {
    partition: u16,
    written: u64,
    a: PhantomData<(K, A)>,
}

impl<K, A> PrintOutputFormat<K, A> {
    pub fn new() -> Self {
        PrintOutputFormat {
            partition: 0,
            written: 0,
            a: PhantomData,
        }
    }
}

/// Half-open, like `TimeWindow`'s `Display`, with wall-clock times.
fn window_str(window: &TimeWindow) -> String {
    format!(
        "[{}, {})",
        fmt_date_time(Duration::from_millis(window.min_timestamp()), "%T%.3f"),
        fmt_date_time(Duration::from_millis(window.max_timestamp()), "%T%.3f")
    )
}

impl<K, A> Default for PrintOutputFormat<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> OutputFormat<K, A> for PrintOutputFormat<K, A>
where
    K: Debug,
    A: Debug,
{
    fn open(&mut self, context: &Context) -> crate::api::Result<()> {
        self.partition = context.partition;
        Ok(())
    }

    fn write_emission(&mut self, emission: Emission<K, A>) {
        info!(
            "partition: {}, key: {:?}, window: {}, aggregate: {:?}{}",
            self.partition,
            emission.key,
            window_str(&emission.window),
            emission.aggregate,
            if emission.is_late { " (late)" } else { "" }
        );
        self.written += 1;
    }

    fn close(&mut self) -> crate::api::Result<()> {
        info!(
            "print sink closed, partition: {}, written: {}",
            self.partition, self.written
        );
        Ok(())
    }
}

impl<K, A> NamedFunction for PrintOutputFormat<K, A> {
    fn name(&self) -> &str {
        "PrintOutputFormat"
    }
}

#[cfg(test)]
mod tests {
    use crate::api::window::TimeWindow;
    use crate::functions::sink::print::window_str;

    #[test]
    pub fn window_str_test() {
        let window = TimeWindow::new(0, 125);
        assert_eq!(window_str(&window), "[00:00:00.000, 00:00:00.125)");
    }
}
