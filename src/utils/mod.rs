/// TOML configuration (`lumen.toml`) with hot reloading.
pub mod toml_config;
