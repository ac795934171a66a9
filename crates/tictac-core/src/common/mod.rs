pub mod config;
pub mod constants;
pub mod kinematics;

pub use config::{ConfigError, EnergySettings, RunConfig, parse_energy_list, read_energy_list};
pub use kinematics::{EnergyFrame, EnergyPoint, on_shell_momentum};
