//! Optional `env_logger` setup for binaries and examples.

/// Installs an `env_logger` reading `RUST_LOG`.
///
/// Returns `false` when a logger was already installed, so repeated calls are harmless.
pub fn init_logging() -> bool {
    env_logger::Builder::from_default_env().try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::init_logging;

    #[test]
    fn second_init_is_a_no_op() {
        init_logging();
        assert!(!init_logging());
    }
}
