//! Shared setup for the scenario tests.
//!
//! Every test binds its own registry to its own [`SimulatedPcnt`], so tests
//! running in parallel never share units or interrupt routines.
//!
//! [`SimulatedPcnt`]: esp_pcnt::sim::SimulatedPcnt

pub use esp_pcnt;

/// GPIO used as signal input.
pub const SIGNAL: u8 = 2;
/// GPIO used as control input.
pub const CONTROL: u8 = 3;

/// Glitch-free pulse width in APB cycles.
pub const WIDTH: u32 = 1000;

/// Routes driver logs to the test output. `RUST_LOG=debug` shows them.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Declares a registry type `$name` and a `SIM` peripheral bound to it.
#[macro_export]
macro_rules! test_registry {
    ($name:ident) => {
        $crate::test_registry!($name, $crate::esp_pcnt::sim::Routing::PerUnit);
    };
    ($name:ident, $routing:expr) => {
        struct $name;

        impl $crate::esp_pcnt::RegistryHandle for $name {
            fn registry() -> &'static $crate::esp_pcnt::Registry {
                static REGISTRY: $crate::esp_pcnt::Registry = $crate::esp_pcnt::Registry::new();
                &REGISTRY
            }
        }

        static SIM: $crate::esp_pcnt::sim::SimulatedPcnt =
            $crate::esp_pcnt::sim::SimulatedPcnt::new($routing);

        $crate::init_logger();
        $crate::esp_pcnt::init_registry::<$name>(&SIM).unwrap();
    };
}
