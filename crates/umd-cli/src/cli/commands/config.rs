//! `umd config` – show where the config lives and what it resolves to.

use anyhow::Result;
use umd_core::config;

pub fn run_config() -> Result<()> {
    let cfg = config::load_or_init()?;
    println!("# {}", config::config_path()?.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
