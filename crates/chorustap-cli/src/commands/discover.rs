use anyhow::Result;
use chorustap_core::Registry;

/// Print the stream catalog as JSON.
pub fn cmd_discover() -> Result<()> {
    let registry = Registry::new()?;
    println!("{}", serde_json::to_string_pretty(&registry.catalog())?);
    Ok(())
}
