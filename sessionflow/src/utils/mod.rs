pub mod date_time;
pub mod hash;
pub mod thread;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

pub fn parse_arg_with(arg_key: &str, default_value: &str) -> String {
    parse_arg(arg_key).unwrap_or(default_value.to_string())
}

/// Looks up a `key=value` process argument.
pub fn parse_arg(arg_key: &str) -> anyhow::Result<String> {
    find_arg(std::env::args(), arg_key)
}

fn find_arg<I>(args: I, arg_key: &str) -> anyhow::Result<String>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            if key.eq(arg_key) {
                return Ok(value.to_string());
            }
        }
    }

    Err(anyhow!("`{}` argument is not found", arg_key))
}

#[cfg(test)]
mod tests {
    use crate::utils::find_arg;

    #[test]
    pub fn find_arg_test() {
        let args = vec!["bin".to_string(), "gap=120".to_string()];
        assert_eq!(find_arg(args.clone(), "gap").unwrap(), "120");
        assert!(find_arg(args, "lateness").is_err());
    }
}
